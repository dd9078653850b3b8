// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2012-2025 Andrei Maltsev

use std::sync::Arc;

use anyhow::{Result, ensure};
use irods_client_rs::{
    client::auth::AuthEnv,
    fs::Filesystem,
    models::{
        api::{RM_COLL_AN, SYS_CLI_TO_SVR_COLL_STAT_REPLY, SYS_SVR_TO_CLI_COLL_STAT},
        message::read_frame,
    },
};
use tokio::{io::AsyncReadExt, net::TcpListener};
use tokio_util::sync::CancellationToken;

use crate::integration_tests::common::{
    reply, serve_native_auth, serve_startup, test_config,
};

/// Collection removal with streamed progress: the server sends the
/// `SYS_SVR_TO_CLI_COLL_STAT` sentinel, the client acknowledges with four
/// big-endian bytes, and the second frame carries the real statistics.
#[tokio::test]
async fn test_rmcoll_streaming_statistics() -> Result<()> {
    let listener = TcpListener::bind("127.0.0.1:0").await?;
    let addr = listener.local_addr()?;

    let server = tokio::spawn(async move {
        let (mut stream, _) = listener.accept().await?;
        serve_startup(&mut stream, "rods4.3.2").await?;
        serve_native_auth(&mut stream).await?;

        let frame = read_frame(&mut stream, None).await?;
        ensure!(frame.header.int_info == RM_COLL_AN, "expected RmColl");

        // First reply: the sentinel, empty body.
        reply(&mut stream, SYS_SVR_TO_CLI_COLL_STAT, &[], &[]).await?;

        // The acknowledgement is four raw big-endian bytes, not a frame.
        let mut ack = [0u8; 4];
        stream.read_exact(&mut ack).await?;
        ensure!(
            i32::from_be_bytes(ack) == SYS_CLI_TO_SVR_COLL_STAT_REPLY,
            "bad ack {ack:?}"
        );

        let stat = "<CollOprStat_PI>\n<filesCnt>10</filesCnt>\n\
                    <totalFileCnt>10</totalFileCnt>\n<bytesWritten>0</bytesWritten>\n\
                    <lastObjPath>/tempZone/trash/x</lastObjPath>\n</CollOprStat_PI>\n";
        reply(&mut stream, 0, stat.as_bytes(), &[]).await?;

        let _ = read_frame(&mut stream, None).await; // disconnect
        Ok::<_, anyhow::Error>(())
    });

    let cfg = Arc::new(test_config(addr.port(), 1));
    let token = CancellationToken::new();
    let fs = Filesystem::connect(cfg, AuthEnv::default()).await?;

    let stat = fs
        .remove_collection(&token, "/tempZone/home/rods/scratch", true, false)
        .await?;
    assert_eq!(stat.files_cnt, 10);
    assert_eq!(stat.total_file_cnt, 10);
    assert_eq!(stat.last_obj_path, "/tempZone/trash/x");

    fs.close().await?;
    server.await??;
    Ok(())
}
