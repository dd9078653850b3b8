// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2012-2025 Andrei Maltsev

//! Authentication message bodies: the classic challenge-response pair, the
//! PAM password exchange, and the JSON frames of the 4.3 auth framework used
//! by interactive PAM.

use bytes::Bytes;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::{
    cfg::enums::ProtocolVariant,
    error::{IrodsError, Result},
    models::{
        common::{FromWire, ToWire, json_wire},
        xml::{Elem, XmlWriter},
    },
};

/// `authRequestOut_PI`: the base64 challenge minted by the server.
#[derive(Debug, Clone)]
pub struct AuthChallenge {
    pub challenge: String,
}

impl FromWire for AuthChallenge {
    fn from_wire(body: &[u8], variant: ProtocolVariant) -> Result<Self> {
        let root = Elem::parse(body, variant)?;
        if root.name != "authRequestOut_PI" {
            return Err(IrodsError::Protocol(format!(
                "expected <authRequestOut_PI>, got <{}>",
                root.name
            )));
        }
        Ok(Self {
            challenge: root.str_of("challenge")?.trim().to_string(),
        })
    }
}

/// `authResponseInp_PI`: the scrambled challenge response plus the proxy
/// principal it authenticates.
#[derive(Debug, Clone)]
pub struct AuthResponse {
    pub response: String,
    pub username: String,
}

impl ToWire for AuthResponse {
    fn to_wire(&self, variant: ProtocolVariant) -> Result<Bytes> {
        let mut w = XmlWriter::new(variant);
        w.open("authResponseInp_PI");
        w.tag_str("response", &self.response);
        w.tag_str("username", &self.username);
        w.close("authResponseInp_PI");
        Ok(w.into_bytes())
    }
}

/// `pamAuthRequestInp_PI`: PAM credentials plus the requested TTL (hours)
/// for the minted native password.
#[derive(Debug, Clone)]
pub struct PamAuthRequest {
    pub user: String,
    pub password: String,
    pub ttl: i32,
}

impl ToWire for PamAuthRequest {
    fn to_wire(&self, variant: ProtocolVariant) -> Result<Bytes> {
        let mut w = XmlWriter::new(variant);
        w.open("pamAuthRequestInp_PI");
        w.tag_str("pamUser", &self.user);
        w.tag_str("pamPassword", &self.password);
        w.tag_num("timeToLive", self.ttl);
        w.close("pamAuthRequestInp_PI");
        Ok(w.into_bytes())
    }
}

/// `pamAuthRequestOut_PI`: the server-minted ephemeral native password.
#[derive(Debug, Clone)]
pub struct PamAuthResult {
    pub password: String,
}

impl FromWire for PamAuthResult {
    fn from_wire(body: &[u8], variant: ProtocolVariant) -> Result<Self> {
        let root = Elem::parse(body, variant)?;
        if root.name != "pamAuthRequestOut_PI" {
            return Err(IrodsError::Protocol(format!(
                "expected <pamAuthRequestOut_PI>, got <{}>",
                root.name
            )));
        }
        Ok(Self {
            password: root.str_of("irodsPamPassword")?.trim().to_string(),
        })
    }
}

/// One step of the 4.3 auth-framework dialogue: a free-form JSON state map
/// the server reads, patches and steers via `next_operation`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuthPluginStep {
    #[serde(flatten)]
    pub state: Value,
}

json_wire!(AuthPluginStep);

impl AuthPluginStep {
    pub fn new(state: Value) -> Self {
        Self { state }
    }
}
