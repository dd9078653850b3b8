// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2012-2025 Andrei Maltsev

use std::sync::Arc;

use anyhow::{Result, ensure};
use irods_client_rs::{
    client::{auth::AuthEnv, conn::Connection},
    models::{
        api::GEN_QUERY_AN,
        header::RODS_DISCONNECT,
        message::read_frame,
        query::{GenQueryInp, column},
    },
};
use tokio::net::TcpListener;
use tokio_util::sync::CancellationToken;

use crate::integration_tests::common::{
    reply, serve_native_auth, serve_startup, test_config,
};

/// Native auth against a scripted server, then a trivial query: all three
/// round-trips succeed and the negotiated version is visible.
#[tokio::test]
async fn test_native_auth_and_trivial_query() -> Result<()> {
    let listener = TcpListener::bind("127.0.0.1:0").await?;
    let addr = listener.local_addr()?;

    let server = tokio::spawn(async move {
        let (mut stream, _) = listener.accept().await?;
        serve_startup(&mut stream, "rods4.3.2").await?;
        serve_native_auth(&mut stream).await?;

        let frame = read_frame(&mut stream, None).await?;
        ensure!(frame.header.int_info == GEN_QUERY_AN, "expected GenQuery");
        reply(&mut stream, 0, &[], &[]).await?;

        let frame = read_frame(&mut stream, None).await?;
        ensure!(frame.header.msg_type == RODS_DISCONNECT);
        Ok::<_, anyhow::Error>(())
    });

    let cfg = Arc::new(test_config(addr.port(), 1));
    let token = CancellationToken::new();

    let conn = Connection::connect(cfg, &AuthEnv::default()).await?;
    assert_eq!(conn.server_version().to_string(), "4.3.2");
    assert!(!conn.client_signature().is_empty());
    assert!(!conn.is_tls());

    let inp = GenQueryInp::select(&[column::COL_DATA_NAME]);
    let res = conn.request::<_, ()>(&token, GEN_QUERY_AN, &inp).await?;
    assert_eq!(res.int_info, 0);

    conn.close().await?;
    // Close is idempotent.
    conn.close().await?;

    server.await??;
    Ok(())
}
