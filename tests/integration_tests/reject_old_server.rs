// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2012-2025 Andrei Maltsev

use std::sync::Arc;

use anyhow::Result;
use irods_client_rs::{
    client::{auth::AuthEnv, conn::Connection},
    error::IrodsError,
    models::message::read_frame,
};
use tokio::net::TcpListener;

use crate::integration_tests::common::{serve_startup, test_config};

/// A pre-4.3.2 server is rejected during the handshake and the transport is
/// torn down before any auth bytes are sent.
#[tokio::test]
async fn test_old_server_rejected_before_auth() -> Result<()> {
    let listener = TcpListener::bind("127.0.0.1:0").await?;
    let addr = listener.local_addr()?;

    let server = tokio::spawn(async move {
        let (mut stream, _) = listener.accept().await?;
        serve_startup(&mut stream, "rods4.2.9").await?;
        // The client must hang up without authenticating.
        let auth_attempt = read_frame(&mut stream, None).await;
        Ok::<_, anyhow::Error>(auth_attempt.is_err())
    });

    let cfg = Arc::new(test_config(addr.port(), 1));
    let err = Connection::connect(cfg, &AuthEnv::default())
        .await
        .expect_err("old server must be rejected");
    assert!(
        matches!(err, IrodsError::UnsupportedVersion(ref v) if v == "rods4.2.9"),
        "unexpected error: {err}"
    );

    let no_auth_seen = server.await??;
    assert!(no_auth_seen, "client sent bytes after the version check failed");
    Ok(())
}

/// A garbled release string is just as fatal.
#[tokio::test]
async fn test_malformed_version_rejected() -> Result<()> {
    let listener = TcpListener::bind("127.0.0.1:0").await?;
    let addr = listener.local_addr()?;

    tokio::spawn(async move {
        let (mut stream, _) = listener.accept().await?;
        serve_startup(&mut stream, "4.3.2").await?;
        Ok::<_, anyhow::Error>(())
    });

    let cfg = Arc::new(test_config(addr.port(), 1));
    let err = Connection::connect(cfg, &AuthEnv::default())
        .await
        .expect_err("malformed version must be rejected");
    assert!(matches!(err, IrodsError::Protocol(_)), "unexpected error: {err}");
    Ok(())
}
