// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2012-2025 Andrei Maltsev

use std::sync::Arc;

use anyhow::Result;
use irods_client_rs::{
    client::auth::AuthEnv,
    fs::Filesystem,
    transfer::{self, TransferOptions},
};
use serial_test::serial;
use tokio_util::sync::CancellationToken;

use crate::integration_tests::common::{spawn_data_server, test_config};

fn pattern(len: usize) -> Vec<u8> {
    (0..len).map(|i| (i % 251) as u8).collect()
}

/// Uploading with K lanes and downloading with M lanes reproduces the
/// original bytes, and the checksum verification pass agrees.
#[tokio::test]
#[serial]
async fn test_upload_download_roundtrip() -> Result<()> {
    let (addr, state) = spawn_data_server().await?;
    let cfg = Arc::new(test_config(addr.port(), 3));
    let token = CancellationToken::new();

    let content = pattern(1000);
    let source = std::env::temp_dir().join(format!(
        "irods-client-rs-rt-src-{}",
        std::process::id()
    ));
    let sink = std::env::temp_dir().join(format!(
        "irods-client-rs-rt-dst-{}",
        std::process::id()
    ));
    std::fs::write(&source, &content)?;

    let fs = Filesystem::connect(cfg, AuthEnv::default()).await?;
    let remote = "/tempZone/home/rods/roundtrip.dat";

    let up = TransferOptions {
        lanes: 3,
        buffer_size: 128,
        min_range_size: 100,
        verify_checksum: true,
        ..TransferOptions::default()
    };
    let sent = transfer::upload(&fs, &token, &source, remote, &up).await?;
    assert_eq!(sent, 1000);
    assert_eq!(state.object(remote), Some(content.clone()));

    let down = TransferOptions {
        lanes: 2,
        buffer_size: 256,
        min_range_size: 100,
        verify_checksum: true,
        ..TransferOptions::default()
    };
    let got = transfer::download(&fs, &token, remote, &sink, &down).await?;
    assert_eq!(got, 1000);
    assert_eq!(std::fs::read(&sink)?, content);

    fs.close().await?;
    std::fs::remove_file(&source)?;
    std::fs::remove_file(&sink)?;
    Ok(())
}

/// A single-lane transfer degrades to a plain streaming copy.
#[tokio::test]
#[serial]
async fn test_single_lane_roundtrip() -> Result<()> {
    let (addr, _state) = spawn_data_server().await?;
    let cfg = Arc::new(test_config(addr.port(), 1));
    let token = CancellationToken::new();

    let content = pattern(333);
    let source = std::env::temp_dir().join(format!(
        "irods-client-rs-one-src-{}",
        std::process::id()
    ));
    let sink = std::env::temp_dir().join(format!(
        "irods-client-rs-one-dst-{}",
        std::process::id()
    ));
    std::fs::write(&source, &content)?;

    let fs = Filesystem::connect(cfg, AuthEnv::default()).await?;
    let remote = "/tempZone/home/rods/single.dat";

    let opts = TransferOptions {
        lanes: 4, // clamped to one by pool capacity
        buffer_size: 100,
        min_range_size: 100,
        ..TransferOptions::default()
    };
    transfer::upload(&fs, &token, &source, remote, &opts).await?;
    transfer::download(&fs, &token, remote, &sink, &opts).await?;
    assert_eq!(std::fs::read(&sink)?, content);

    fs.close().await?;
    std::fs::remove_file(&source)?;
    std::fs::remove_file(&sink)?;
    Ok(())
}
