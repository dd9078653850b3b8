// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2012-2025 Andrei Maltsev

use std::fmt;

use bytes::Bytes;

use crate::{
    cfg::{
        config::{CLIENT_API_VERSION, CLIENT_RELEASE_VERSION, Config},
        enums::ProtocolVariant,
    },
    error::{IrodsError, Result},
    models::{
        common::{FromWire, ToWire},
        xml::{Elem, XmlWriter},
    },
};

/// The oldest server release the client will talk to.
pub const MIN_SERVER_VERSION: ServerVersion = ServerVersion {
    major: 4,
    minor: 3,
    release: 2,
};

/// `StartupPack_PI`, the first message of every session.
#[derive(Debug, Clone)]
pub struct StartupPack {
    pub irods_prot: i32,
    pub reconn_flag: i32,
    pub connect_cnt: i32,
    pub proxy_user: String,
    pub proxy_zone: String,
    pub client_user: String,
    pub client_zone: String,
    pub rel_version: String,
    pub api_version: String,
    pub option: String,
}

impl StartupPack {
    pub fn from_config(cfg: &Config) -> Self {
        Self {
            irods_prot: cfg.connection.protocol.irods_prot(),
            reconn_flag: 0,
            connect_cnt: 0,
            proxy_user: cfg.connection.proxy_username.clone(),
            proxy_zone: cfg.connection.proxy_zone.clone(),
            client_user: cfg.connection.username.clone(),
            client_zone: cfg.connection.zone.clone(),
            rel_version: CLIENT_RELEASE_VERSION.to_string(),
            api_version: CLIENT_API_VERSION.to_string(),
            option: cfg.startup_option(),
        }
    }
}

impl ToWire for StartupPack {
    fn to_wire(&self, variant: ProtocolVariant) -> Result<Bytes> {
        let mut w = XmlWriter::new(variant);
        w.open("StartupPack_PI");
        w.tag_num("irodsProt", self.irods_prot);
        w.tag_num("reconnFlag", self.reconn_flag);
        w.tag_num("connectCnt", self.connect_cnt);
        w.tag_str("proxyUser", &self.proxy_user);
        w.tag_str("proxyRcatZone", &self.proxy_zone);
        w.tag_str("clientUser", &self.client_user);
        w.tag_str("clientRcatZone", &self.client_zone);
        w.tag_str("relVersion", &self.rel_version);
        w.tag_str("apiVersion", &self.api_version);
        w.tag_str("option", &self.option);
        w.close("StartupPack_PI");
        Ok(w.into_bytes())
    }
}

/// `Version_PI`, the server's half of the startup exchange.
#[derive(Debug, Clone)]
pub struct Version {
    pub status: i32,
    pub rel_version: String,
    pub api_version: String,
    pub reconn_port: i32,
    pub reconn_addr: String,
    pub cookie: i32,
}

impl FromWire for Version {
    fn from_wire(body: &[u8], variant: ProtocolVariant) -> Result<Self> {
        let root = Elem::parse(body, variant)?;
        if root.name != "Version_PI" {
            return Err(IrodsError::Protocol(format!(
                "expected <Version_PI>, got <{}>",
                root.name
            )));
        }
        Ok(Self {
            status: root.i32_of("status")?,
            rel_version: root.str_of("relVersion")?.trim().to_string(),
            api_version: root
                .text_of("apiVersion")
                .unwrap_or_default()
                .trim()
                .to_string(),
            reconn_port: root.child("reconnPort").map_or(Ok(0), |_| {
                root.i32_of("reconnPort")
            })?,
            reconn_addr: root
                .text_of("reconnAddr")
                .unwrap_or_default()
                .trim()
                .to_string(),
            cookie: root.child("cookie").map_or(Ok(0), |_| root.i32_of("cookie"))?,
        })
    }
}

/// A parsed `rodsX.Y.Z` release string.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub struct ServerVersion {
    pub major: u32,
    pub minor: u32,
    pub release: u32,
}

impl ServerVersion {
    /// Parses the mandatory `rods` prefix plus a three-part version. Any
    /// deviation is fatal for the handshake.
    pub fn parse(rel_version: &str) -> Result<Self> {
        let bad =
            || IrodsError::Protocol(format!("malformed release version {rel_version:?}"));
        let rest = rel_version.strip_prefix("rods").ok_or_else(bad)?;
        let mut parts = rest.split('.');
        let major = parts.next().and_then(|p| p.parse().ok()).ok_or_else(bad)?;
        let minor = parts.next().and_then(|p| p.parse().ok()).ok_or_else(bad)?;
        let release = parts.next().and_then(|p| p.parse().ok()).ok_or_else(bad)?;
        if parts.next().is_some() {
            return Err(bad());
        }
        Ok(Self {
            major,
            minor,
            release,
        })
    }

    /// Parses and enforces the minimum supported release.
    pub fn parse_supported(rel_version: &str) -> Result<Self> {
        let v = Self::parse(rel_version)?;
        if v < MIN_SERVER_VERSION {
            return Err(IrodsError::UnsupportedVersion(rel_version.to_string()));
        }
        Ok(v)
    }
}

impl fmt::Display for ServerVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}.{}", self.major, self.minor, self.release)
    }
}
