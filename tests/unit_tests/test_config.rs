// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2012-2025 Andrei Maltsev

use anyhow::Result;
use irods_client_rs::cfg::{
    config::Config,
    enums::{AuthScheme, CsNegPolicy, CsNegotiation, SslVerify},
};

fn minimal_yaml() -> &'static str {
    r#"
connection:
  Host: irods.example.org
  Port: 1247
  Zone: tempZone
  Username: alice
auth:
  AuthScheme: native
  Password: secret
ssl: {}
encryption: {}
timeouts: {}
pool: {}
"#
}

#[test]
fn test_minimal_config_normalizes() -> Result<()> {
    let mut cfg: Config = serde_yaml::from_str(minimal_yaml())?;
    cfg.validate_and_normalize()?;
    // Proxy identity defaults to the client identity.
    assert_eq!(cfg.connection.proxy_username, "alice");
    assert_eq!(cfg.connection.proxy_zone, "tempZone");
    // The verification name defaults to the host.
    assert_eq!(cfg.ssl.server_name, "irods.example.org");
    assert_eq!(cfg.auth.scheme, AuthScheme::Native);
    assert_eq!(cfg.ssl.verify_server, SslVerify::Cert);
    assert_eq!(cfg.pool.max_conns, 4);
    Ok(())
}

#[test]
fn test_negotiation_option_string() -> Result<()> {
    let mut cfg: Config = serde_yaml::from_str(minimal_yaml())?;
    cfg.validate_and_normalize()?;
    assert_eq!(
        cfg.startup_option(),
        "irods-client-rs;request_server_negotiation"
    );

    let yaml = minimal_yaml().replace(
        "ssl: {}",
        "ssl:\n  ClientServerNegotiation: dont_negotiate",
    );
    let mut cfg: Config = serde_yaml::from_str(&yaml)?;
    cfg.validate_and_normalize()?;
    assert_eq!(cfg.ssl.negotiation, CsNegotiation::Off);
    assert_eq!(cfg.startup_option(), "irods-client-rs");
    Ok(())
}

#[test]
fn test_pam_and_policy_values() -> Result<()> {
    let yaml = minimal_yaml()
        .replace("AuthScheme: native", "AuthScheme: pam_password")
        .replace(
            "ssl: {}",
            "ssl:\n  ClientServerNegotiationPolicy: CS_NEG_REQUIRE\n  \
             SSLVerifyServer: none",
        );
    let mut cfg: Config = serde_yaml::from_str(&yaml)?;
    cfg.validate_and_normalize()?;
    assert!(cfg.auth.scheme.requires_tls());
    assert_eq!(cfg.ssl.policy, CsNegPolicy::Require);
    assert_eq!(cfg.ssl.verify_server, SslVerify::None);
    Ok(())
}

#[test]
fn test_validation_rejects_bad_values() {
    let cases = [
        ("Host: irods.example.org", "Host: \"\""),
        ("Port: 1247", "Port: 0"),
        ("Username: alice", "Username: \"\""),
    ];
    for (from, to) in cases {
        let yaml = minimal_yaml().replace(from, to);
        let mut cfg: Config = serde_yaml::from_str(&yaml).expect("parse failed");
        assert!(cfg.validate_and_normalize().is_err(), "{to} must be rejected");
    }
}
