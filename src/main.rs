// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2012-2025 Andrei Maltsev

use std::{path::Path, sync::Arc};

use anyhow::{Context, Result};
use irods_client_rs::{
    cfg::{cli::resolve_config_path, config::Config, logger::init_logger},
    client::auth::AuthEnv,
    fs::Filesystem,
    transfer::{self, TransferOptions},
};
use tokio_util::sync::CancellationToken;
use tracing::info;

#[tokio::main]
async fn main() -> Result<()> {
    let _init_logger = init_logger("tests/config_logger.yaml")?;

    // Load config
    let cfg = resolve_config_path("tests/config.yaml")
        .and_then(Config::load_from_file)
        .map(Arc::new)
        .context("failed to resolve or load config")?;

    let token = CancellationToken::new();

    // Dial, negotiate and authenticate one session eagerly.
    let fs = Filesystem::connect(cfg.clone(), AuthEnv::default())
        .await
        .context("failed to connect")?;
    info!("connected to {}:{}", cfg.connection.host, cfg.connection.port);

    let home = format!(
        "/{}/home/{}",
        cfg.connection.zone, cfg.connection.username
    );
    let stat = fs.stat(&token, &home).await.context("stat home failed")?;
    info!("{home}: owner={} type={:?}", stat.owner_name, stat.obj_type);

    // Round-trip a small file through the parallel transfer engine.
    let local = Path::new("README.md");
    if local.exists() {
        let remote = format!("{home}/irods-client-rs-demo");
        let opts = TransferOptions {
            lanes: 2,
            verify_checksum: true,
            ..TransferOptions::default()
        };
        let sent = transfer::upload(&fs, &token, local, &remote, &opts).await?;
        info!("uploaded {sent} bytes to {remote}");

        let back = std::env::temp_dir().join("irods-client-rs-demo");
        let got = transfer::download(&fs, &token, &remote, &back, &opts).await?;
        info!("downloaded {got} bytes to {}", back.display());

        fs.remove_data_object(&token, &remote, true).await?;
    }

    fs.close().await.context("pool close failed")?;
    Ok(())
}
