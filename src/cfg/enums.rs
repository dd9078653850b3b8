// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2012-2025 Andrei Maltsev

use core::fmt;

use serde::{Deserialize, Serialize};

/// Authentication scheme selected for the session.
///
/// `Native` uses the configured password directly; the PAM schemes obtain a
/// server-minted ephemeral native password first and therefore require TLS.
#[derive(Deserialize, Serialize, Debug, Clone, Copy, PartialEq, Eq)]
pub enum AuthScheme {
    #[serde(rename = "native", alias = "Native", alias = "NATIVE")]
    Native,
    #[serde(rename = "pam_password", alias = "PamPassword", alias = "pam")]
    PamPassword,
    #[serde(rename = "pam_interactive", alias = "PamInteractive")]
    PamInteractive,
}

impl fmt::Display for AuthScheme {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            AuthScheme::Native => "native",
            AuthScheme::PamPassword => "pam_password",
            AuthScheme::PamInteractive => "pam_interactive",
        })
    }
}

impl AuthScheme {
    /// PAM credentials travel in cleartext inside the request body, so both
    /// PAM schemes refuse to run over an unencrypted transport.
    pub fn requires_tls(self) -> bool {
        !matches!(self, AuthScheme::Native)
    }
}

/// Client-side SSL negotiation policy, sent to the server during startup.
#[derive(Deserialize, Serialize, Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum CsNegPolicy {
    #[serde(rename = "CS_NEG_REFUSE")]
    Refuse,
    #[serde(rename = "CS_NEG_REQUIRE")]
    Require,
    #[default]
    #[serde(rename = "CS_NEG_DONT_CARE")]
    DontCare,
}

impl fmt::Display for CsNegPolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            CsNegPolicy::Refuse => "CS_NEG_REFUSE",
            CsNegPolicy::Require => "CS_NEG_REQUIRE",
            CsNegPolicy::DontCare => "CS_NEG_DONT_CARE",
        })
    }
}

/// Whether the startup options field asks the server to negotiate SSL.
/// Anything other than `request_server_negotiation` means "do not negotiate".
#[derive(Serialize, Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum CsNegotiation {
    #[default]
    #[serde(rename = "request_server_negotiation")]
    RequestServerNegotiation,
    #[serde(rename = "off")]
    Off,
}

impl<'de> serde::Deserialize<'de> for CsNegotiation {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where D: serde::Deserializer<'de> {
        let raw = String::deserialize(deserializer)?;
        Ok(if raw == "request_server_negotiation" {
            CsNegotiation::RequestServerNegotiation
        } else {
            CsNegotiation::Off
        })
    }
}

impl CsNegotiation {
    pub fn is_requested(self) -> bool {
        matches!(self, CsNegotiation::RequestServerNegotiation)
    }
}

/// Server certificate verification mode for the TLS upgrade.
#[derive(Deserialize, Serialize, Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SslVerify {
    /// Full chain + hostname verification.
    #[default]
    #[serde(rename = "cert")]
    Cert,
    /// Chain verification against the configured CA bundle, hostname check
    /// skipped.
    #[serde(rename = "host")]
    Host,
    /// No verification at all.
    #[serde(rename = "none")]
    None,
}

impl fmt::Display for SslVerify {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            SslVerify::Cert => "cert",
            SslVerify::Host => "host",
            SslVerify::None => "none",
        })
    }
}

/// Wire marshalling variant chosen at dial time and carried in the startup
/// pack's `irodsProt` field.
#[derive(Deserialize, Serialize, Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ProtocolVariant {
    #[default]
    #[serde(rename = "xml", alias = "XML")]
    Xml,
    #[serde(rename = "native")]
    Native,
}

impl ProtocolVariant {
    /// The `irodsProt` integer the startup pack advertises.
    pub fn irods_prot(self) -> i32 {
        match self {
            ProtocolVariant::Native => 0,
            ProtocolVariant::Xml => 1,
        }
    }

    /// The XML variant applies the server's entity-substitution pass; the
    /// native variant writes text through untouched.
    pub fn escapes_xml(self) -> bool {
        matches!(self, ProtocolVariant::Xml)
    }
}
