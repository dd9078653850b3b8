// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2012-2025 Andrei Maltsev

use base64::{Engine, engine::general_purpose::STANDARD};
use bytes::Bytes;
use serde::{Serialize, de::DeserializeOwned};

use crate::{
    cfg::enums::ProtocolVariant,
    error::{IrodsError, Result},
    models::{
        common::{FromWire, ToWire},
        xml::{Elem, XmlWriter},
    },
};

/// `BinBytesBuf_PI`: the two-field wrapper carrying base64 payloads, used by
/// the JSON-over-XML APIs (auth plugin, descriptor info, replica close,
/// touch).
#[derive(Debug, Clone, Default)]
pub struct BinBytesBuf {
    /// Decoded payload bytes.
    pub buf: Vec<u8>,
}

impl BinBytesBuf {
    pub fn new(buf: Vec<u8>) -> Self {
        Self { buf }
    }

    pub fn from_json<T: Serialize>(value: &T) -> Result<Self> {
        let raw = serde_json::to_vec(value).map_err(|e| {
            IrodsError::Protocol(format!("JSON body serialisation failed: {e}"))
        })?;
        Ok(Self { buf: raw })
    }

    pub fn into_json<T: DeserializeOwned>(self) -> Result<T> {
        // Servers occasionally NUL-terminate the embedded document.
        let trimmed: &[u8] = match self.buf.iter().position(|&b| b == 0) {
            Some(end) => &self.buf[..end],
            None => &self.buf,
        };
        serde_json::from_slice(trimmed).map_err(|e| {
            IrodsError::Protocol(format!("JSON body deserialisation failed: {e}"))
        })
    }
}

impl ToWire for BinBytesBuf {
    fn to_wire(&self, variant: ProtocolVariant) -> Result<Bytes> {
        let encoded = STANDARD.encode(&self.buf);
        let mut w = XmlWriter::new(variant);
        w.open("BinBytesBuf_PI");
        w.tag_num("buflen", encoded.len());
        w.tag_str("buf", &encoded);
        w.close("BinBytesBuf_PI");
        Ok(w.into_bytes())
    }
}

impl FromWire for BinBytesBuf {
    fn from_wire(body: &[u8], variant: ProtocolVariant) -> Result<Self> {
        let root = Elem::parse(body, variant)?;
        if root.name != "BinBytesBuf_PI" {
            return Err(IrodsError::Protocol(format!(
                "expected <BinBytesBuf_PI>, got <{}>",
                root.name
            )));
        }
        let encoded: String = root
            .str_of("buf")?
            .chars()
            .filter(|c| !c.is_whitespace())
            .collect();
        let buf = STANDARD
            .decode(&encoded)
            .map_err(|e| IrodsError::Protocol(format!("bad base64 in buf: {e}")))?;
        Ok(Self { buf })
    }
}
