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

/// Two-lane upload of 400 bytes with a 100-byte buffer and a 200-byte
/// minimum range. Expected wire trace on the primary session:
/// open → descriptor-info → two writes → close; on the secondary session:
/// open → seek(200) → two writes → replica-close.
#[tokio::test]
#[serial]
async fn test_two_lane_upload_wire_trace() -> Result<()> {
    let (addr, state) = spawn_data_server().await?;
    let cfg = Arc::new(test_config(addr.port(), 2));
    let token = CancellationToken::new();

    let local = std::env::temp_dir().join(format!(
        "irods-client-rs-upload-{}",
        std::process::id()
    ));
    let content = "test".repeat(100);
    std::fs::write(&local, &content)?;

    let fs = Filesystem::connect(cfg, AuthEnv::default()).await?;
    let opts = TransferOptions {
        lanes: 2,
        buffer_size: 100,
        min_range_size: 200,
        ..TransferOptions::default()
    };
    let remote = "/tempZone/home/rods/upload.dat";
    let sent = transfer::upload(&fs, &token, &local, remote, &opts).await?;
    assert_eq!(sent, 400);

    // The server object is byte-identical to the source.
    assert_eq!(state.object(remote), Some(content.into_bytes()));

    // Connection 0 is the pool's eagerly dialed session: the primary lane.
    assert_eq!(
        state.trace_for(0),
        vec!["open", "descriptor_info", "write:100", "write:100", "close"]
    );
    // Connection 1 is the reserved lane session.
    assert_eq!(
        state.trace_for(1),
        vec!["open", "seek:200@0", "write:100", "write:100", "replica_close"]
    );

    fs.close().await?;
    std::fs::remove_file(&local)?;
    Ok(())
}
