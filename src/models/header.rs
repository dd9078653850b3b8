// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2012-2025 Andrei Maltsev

use bytes::Bytes;

use crate::{
    cfg::enums::ProtocolVariant,
    error::{IrodsError, Result},
    models::xml::{Elem, XmlWriter},
};

/// Frame type tags. The encryption-parameter frame abuses the type field to
/// carry the algorithm name, so [`MsgHeader::msg_type`] stays a `String`.
pub const RODS_CONNECT: &str = "RODS_CONNECT";
pub const RODS_VERSION: &str = "RODS_VERSION";
pub const RODS_CS_NEG_T: &str = "RODS_CS_NEG_T";
pub const RODS_API_REQ: &str = "RODS_API_REQ";
pub const RODS_API_REPLY: &str = "RODS_API_REPLY";
pub const RODS_DISCONNECT: &str = "RODS_DISCONNECT";
pub const SHARED_SECRET: &str = "SHARED_SECRET";

/// Refuse to parse headers longer than this; a longer announcement means the
/// peer is not speaking the protocol.
pub const MAX_HEADER_LEN: usize = 1024;

/// The fixed five-field frame header (`MsgHeader_PI`).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MsgHeader {
    pub msg_type: String,
    pub msg_len: u32,
    pub error_len: u32,
    pub bs_len: u32,
    pub int_info: i32,
}

impl MsgHeader {
    pub fn new(
        msg_type: &str,
        msg_len: u32,
        error_len: u32,
        bs_len: u32,
        int_info: i32,
    ) -> Self {
        Self {
            msg_type: msg_type.to_string(),
            msg_len,
            error_len,
            bs_len,
            int_info,
        }
    }

    /// The header itself is always XML, for both protocol variants.
    pub fn encode(&self) -> Bytes {
        let mut w = XmlWriter::new(ProtocolVariant::Xml);
        w.open("MsgHeader_PI");
        w.tag_str("type", &self.msg_type);
        w.tag_num("msgLen", self.msg_len);
        w.tag_num("errorLen", self.error_len);
        w.tag_num("bsLen", self.bs_len);
        w.tag_num("intInfo", self.int_info);
        w.close("MsgHeader_PI");
        w.into_bytes()
    }

    pub fn decode(bytes: &[u8]) -> Result<Self> {
        let root = Elem::parse(bytes, ProtocolVariant::Xml)?;
        if root.name != "MsgHeader_PI" {
            return Err(IrodsError::Protocol(format!(
                "expected <MsgHeader_PI>, got <{}>",
                root.name
            )));
        }
        Ok(Self {
            msg_type: root.str_of("type")?.trim().to_string(),
            msg_len: root.u32_of("msgLen")?,
            error_len: root.u32_of("errorLen")?,
            bs_len: root.u32_of("bsLen")?,
            int_info: root.i32_of("intInfo")?,
        })
    }

    pub fn expect_type(&self, expected: &str) -> Result<()> {
        if self.msg_type == expected {
            Ok(())
        } else {
            Err(IrodsError::UnexpectedMessage {
                expected: expected.to_string(),
                got: self.msg_type.clone(),
            })
        }
    }
}
