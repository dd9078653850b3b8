// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2012-2025 Andrei Maltsev

use bytes::Bytes;

use crate::{
    cfg::enums::{CsNegPolicy, ProtocolVariant},
    error::{IrodsError, Result},
    models::{
        common::{FromWire, ToWire},
        xml::{Elem, XmlWriter},
    },
};

pub const CS_NEG_REFUSE: &str = "CS_NEG_REFUSE";
pub const CS_NEG_REQUIRE: &str = "CS_NEG_REQUIRE";
pub const CS_NEG_DONT_CARE: &str = "CS_NEG_DONT_CARE";
pub const CS_NEG_FAILURE: &str = "CS_NEG_FAILURE";
pub const CS_NEG_USE_SSL: &str = "CS_NEG_USE_SSL";
pub const CS_NEG_USE_TCP: &str = "CS_NEG_USE_TCP";

const CS_NEG_RESULT_KW: &str = "cs_neg_result_kw";
pub const CS_NEG_STATUS_SUCCESS: i32 = 1;
pub const CS_NEG_STATUS_FAILURE: i32 = 0;

/// `CS_NEG_PI`: the server's advertised policy, and the client's verdict.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CsNeg {
    pub status: i32,
    pub result: String,
}

impl CsNeg {
    pub fn success(outcome: &str) -> Self {
        Self {
            status: CS_NEG_STATUS_SUCCESS,
            result: format!("{CS_NEG_RESULT_KW}={outcome};"),
        }
    }

    pub fn failure() -> Self {
        Self {
            status: CS_NEG_STATUS_FAILURE,
            result: CS_NEG_FAILURE.to_string(),
        }
    }
}

impl ToWire for CsNeg {
    fn to_wire(&self, variant: ProtocolVariant) -> Result<Bytes> {
        let mut w = XmlWriter::new(variant);
        w.open("CS_NEG_PI");
        w.tag_num("status", self.status);
        w.tag_str("result", &self.result);
        w.close("CS_NEG_PI");
        Ok(w.into_bytes())
    }
}

impl FromWire for CsNeg {
    fn from_wire(body: &[u8], variant: ProtocolVariant) -> Result<Self> {
        let root = Elem::parse(body, variant)?;
        if root.name != "CS_NEG_PI" {
            return Err(IrodsError::Protocol(format!(
                "expected <CS_NEG_PI>, got <{}>",
                root.name
            )));
        }
        Ok(Self {
            status: root.i32_of("status")?,
            result: root.str_of("result")?.trim().to_string(),
        })
    }
}

/// Joint outcome of the server's policy against ours. `Ok(true)` means TLS,
/// `Ok(false)` plain TCP; `Err` is a policy mismatch the caller reports to
/// the server with a failure frame.
pub fn negotiate_outcome(server: &str, client: CsNegPolicy) -> Result<bool> {
    let mismatch = || {
        Err(IrodsError::Negotiation(format!(
            "server policy {server} conflicts with client policy {client}"
        )))
    };
    match (server, client) {
        (CS_NEG_REFUSE, CsNegPolicy::Refuse | CsNegPolicy::DontCare) => Ok(false),
        (CS_NEG_REFUSE, CsNegPolicy::Require) => mismatch(),
        (CS_NEG_REQUIRE, CsNegPolicy::Refuse) => mismatch(),
        (CS_NEG_REQUIRE, CsNegPolicy::Require | CsNegPolicy::DontCare) => Ok(true),
        (CS_NEG_DONT_CARE, CsNegPolicy::Refuse) => Ok(false),
        (CS_NEG_DONT_CARE, CsNegPolicy::Require | CsNegPolicy::DontCare) => Ok(true),
        _ => Err(IrodsError::Negotiation(format!(
            "unknown server negotiation policy {server:?}"
        ))),
    }
}
