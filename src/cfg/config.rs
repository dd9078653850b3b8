// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2012-2025 Andrei Maltsev

use std::{fs, path::Path, time::Duration};

use anyhow::{Context, ensure};
use serde::{Deserialize, Serialize};

use crate::cfg::enums::{
    AuthScheme, CsNegPolicy, CsNegotiation, ProtocolVariant, SslVerify,
};

/// The release string the client advertises in the startup pack.
pub const CLIENT_RELEASE_VERSION: &str = "rods4.3.0";
/// The API version the client advertises in the startup pack.
pub const CLIENT_API_VERSION: &str = "d";

#[derive(Deserialize, Serialize, Debug, Clone)]
pub struct Config {
    /// Connection target and identity.
    pub connection: ConnectionConfig,
    /// Authentication scheme and credentials.
    pub auth: AuthConfig,
    /// Client/server SSL negotiation plus certificate verification.
    pub ssl: SslConfig,
    /// Session-level payload encryption parameters announced after the TLS
    /// handshake.
    pub encryption: EncryptionConfig,
    /// Dial/handshake/cancellation timing knobs.
    pub timeouts: TimeoutConfig,
    /// Connection pool sizing and discard policy.
    pub pool: PoolConfig,
}

/// Connection target plus the proxy/client identity pair.
#[derive(Deserialize, Serialize, Debug, Clone)]
pub struct ConnectionConfig {
    #[serde(rename = "Host")]
    pub host: String,
    #[serde(rename = "Port")]
    pub port: u16,
    #[serde(rename = "Zone")]
    pub zone: String,
    #[serde(rename = "Username")]
    pub username: String,
    /// The authenticated principal; defaults to `Username` when empty.
    #[serde(default, rename = "ProxyUsername")]
    pub proxy_username: String,
    /// Defaults to `Zone` when empty.
    #[serde(default, rename = "ProxyZone")]
    pub proxy_zone: String,
    /// Free-form client name carried in the startup options field.
    #[serde(default = "default_client_name", rename = "ClientName")]
    pub client_name: String,
    #[serde(default, rename = "Protocol")]
    pub protocol: ProtocolVariant,
}

#[derive(Deserialize, Serialize, Debug, Clone)]
pub struct AuthConfig {
    #[serde(rename = "AuthScheme")]
    pub scheme: AuthScheme,
    #[serde(default, rename = "Password")]
    pub password: String,
    /// TTL (hours) requested for PAM-minted ephemeral passwords.
    #[serde(default = "default_pam_ttl", rename = "GeneratedPasswordTimeout")]
    pub generated_password_ttl: u32,
}

#[derive(Deserialize, Serialize, Debug, Clone, Default)]
pub struct SslConfig {
    #[serde(default, rename = "ClientServerNegotiation")]
    pub negotiation: CsNegotiation,
    #[serde(default, rename = "ClientServerNegotiationPolicy")]
    pub policy: CsNegPolicy,
    #[serde(default, rename = "SSLVerifyServer")]
    pub verify_server: SslVerify,
    #[serde(default, rename = "SSLCACertificateFile")]
    pub ca_certificate_file: String,
    /// Overrides the SNI/verification name; defaults to `Host`.
    #[serde(default, rename = "SSLServerName")]
    pub server_name: String,
}

/// Parameters of the shared-secret frame sent right after the TLS handshake.
#[derive(Deserialize, Serialize, Debug, Clone)]
pub struct EncryptionConfig {
    #[serde(default = "default_enc_algorithm", rename = "EncryptionAlgorithm")]
    pub algorithm: String,
    #[serde(default = "default_enc_key_size", rename = "EncryptionKeySize")]
    pub key_size: u32,
    #[serde(default = "default_enc_salt_size", rename = "EncryptionSaltSize")]
    pub salt_size: u32,
    #[serde(default = "default_enc_hash_rounds", rename = "EncryptionNumHashRounds")]
    pub num_hash_rounds: u32,
}

#[derive(Deserialize, Serialize, Debug, Clone)]
pub struct TimeoutConfig {
    #[serde(default = "default_dial_timeout", rename = "DialTimeout", with = "serde_secs")]
    pub dial: Duration,
    #[serde(
        default = "default_handshake_timeout",
        rename = "HandshakeTimeout",
        with = "serde_secs"
    )]
    pub handshake: Duration,
    /// How long a cancelled request may keep running before the transport is
    /// force-closed.
    #[serde(
        default = "default_cancel_grace",
        rename = "CancelGracePeriod",
        with = "serde_secs"
    )]
    pub cancel_grace: Duration,
    /// Per-operation transport read/write timeout.
    #[serde(default = "default_io_timeout", rename = "IoTimeout", with = "serde_secs")]
    pub io: Duration,
}

#[derive(Deserialize, Serialize, Debug, Clone)]
pub struct PoolConfig {
    #[serde(default = "default_max_conns", rename = "MaxConns")]
    pub max_conns: u32,
    /// Rotate busy sessions instead of blocking when saturated. The session
    /// write lock still serialises wire traffic.
    #[serde(default, rename = "AllowConcurrentUse")]
    pub allow_concurrent_use: bool,
    /// Idle sessions older than this are closed instead of reused.
    /// Zero disables age-based discard.
    #[serde(default, rename = "DiscardConnectionAge", with = "serde_secs")]
    pub discard_connection_age: Duration,
    /// Skip the eager credential-validating dial on pool creation.
    #[serde(default, rename = "DeferConnectionToFirstUse")]
    pub defer_connection_to_first_use: bool,
}

fn default_client_name() -> String {
    "irods-client-rs".to_string()
}

fn default_pam_ttl() -> u32 {
    1
}

fn default_enc_algorithm() -> String {
    "AES-256-CBC".to_string()
}

fn default_enc_key_size() -> u32 {
    32
}

fn default_enc_salt_size() -> u32 {
    8
}

fn default_enc_hash_rounds() -> u32 {
    16
}

fn default_dial_timeout() -> Duration {
    Duration::from_secs(10)
}

fn default_handshake_timeout() -> Duration {
    Duration::from_secs(30)
}

fn default_cancel_grace() -> Duration {
    Duration::from_secs(10)
}

fn default_io_timeout() -> Duration {
    Duration::from_secs(60)
}

fn default_max_conns() -> u32 {
    4
}

impl Default for TimeoutConfig {
    fn default() -> Self {
        Self {
            dial: default_dial_timeout(),
            handshake: default_handshake_timeout(),
            cancel_grace: default_cancel_grace(),
            io: default_io_timeout(),
        }
    }
}

impl Default for PoolConfig {
    fn default() -> Self {
        Self {
            max_conns: default_max_conns(),
            allow_concurrent_use: false,
            discard_connection_age: Duration::ZERO,
            defer_connection_to_first_use: false,
        }
    }
}

impl Default for EncryptionConfig {
    fn default() -> Self {
        Self {
            algorithm: default_enc_algorithm(),
            key_size: default_enc_key_size(),
            salt_size: default_enc_salt_size(),
            num_hash_rounds: default_enc_hash_rounds(),
        }
    }
}

impl Config {
    /// Loads the configuration from YAML, validates it, and returns the
    /// ready-to-use value.
    pub fn load_from_file<P: AsRef<Path>>(path: P) -> anyhow::Result<Self> {
        let s = fs::read_to_string(path)?;
        let mut cfg: Config =
            serde_yaml::from_str(&s).context("failed to parse config YAML")?;
        cfg.validate_and_normalize()?;
        Ok(cfg)
    }

    /// Validates invariants and normalizes derived fields.
    pub fn validate_and_normalize(&mut self) -> anyhow::Result<()> {
        ensure!(!self.connection.host.is_empty(), "Host must not be empty");
        ensure!(self.connection.port != 0, "Port must not be 0");
        ensure!(!self.connection.zone.is_empty(), "Zone must not be empty");
        ensure!(
            !self.connection.username.is_empty(),
            "Username must not be empty"
        );

        if self.connection.proxy_username.is_empty() {
            self.connection.proxy_username = self.connection.username.clone();
        }
        if self.connection.proxy_zone.is_empty() {
            self.connection.proxy_zone = self.connection.zone.clone();
        }
        if self.ssl.server_name.is_empty() {
            self.ssl.server_name = self.connection.host.clone();
        }

        ensure!(self.pool.max_conns >= 1, "MaxConns must be >= 1");
        ensure!(
            self.encryption.key_size >= 16,
            "EncryptionKeySize must be >= 16"
        );
        ensure!(
            self.auth.generated_password_ttl >= 1,
            "GeneratedPasswordTimeout must be >= 1 hour"
        );

        Ok(())
    }

    /// The startup options field: `"<clientName>;<negotiationMode>"`.
    pub fn startup_option(&self) -> String {
        if self.ssl.negotiation.is_requested() {
            format!(
                "{};request_server_negotiation",
                self.connection.client_name
            )
        } else {
            self.connection.client_name.clone()
        }
    }
}

/// Serde helpers for representing `Duration` as a number of seconds.
mod serde_secs {
    use std::time::Duration;

    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(d: &Duration, s: S) -> Result<S::Ok, S::Error> {
        s.serialize_u64(d.as_secs())
    }
    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<Duration, D::Error> {
        let secs = u64::deserialize(d)?;
        Ok(Duration::from_secs(secs))
    }
}
