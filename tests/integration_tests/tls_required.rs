// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2012-2025 Andrei Maltsev

use std::sync::Arc;

use anyhow::Result;
use irods_client_rs::{
    cfg::enums::{AuthScheme, CsNegPolicy, CsNegotiation},
    client::{auth::AuthEnv, conn::Connection},
    error::IrodsError,
};

use crate::integration_tests::common::test_config;

/// PAM credentials must never travel over plaintext: with negotiation
/// disabled the connect fails before any bytes hit the wire. Port 1 has no
/// listener, so a dial attempt would surface as a transport error instead.
#[tokio::test]
async fn test_pam_without_negotiation_fails_early() -> Result<()> {
    let mut cfg = test_config(1, 1);
    cfg.auth.scheme = AuthScheme::PamPassword;
    cfg.ssl.negotiation = CsNegotiation::Off;

    let err = Connection::connect(Arc::new(cfg), &AuthEnv::default())
        .await
        .expect_err("must fail before dialing");
    assert!(matches!(err, IrodsError::TlsRequired), "unexpected error: {err}");
    Ok(())
}

/// Requesting negotiation but refusing TLS is the same contradiction.
#[tokio::test]
async fn test_pam_with_refuse_policy_fails_early() -> Result<()> {
    let mut cfg = test_config(1, 1);
    cfg.auth.scheme = AuthScheme::PamInteractive;
    cfg.ssl.negotiation = CsNegotiation::RequestServerNegotiation;
    cfg.ssl.policy = CsNegPolicy::Refuse;

    let err = Connection::connect(Arc::new(cfg), &AuthEnv::default())
        .await
        .expect_err("must fail before dialing");
    assert!(matches!(err, IrodsError::TlsRequired), "unexpected error: {err}");
    Ok(())
}
