// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2012-2025 Andrei Maltsev

use anyhow::Result;
use irods_client_rs::{
    cfg::enums::{CsNegPolicy, ProtocolVariant},
    models::{
        common::{FromWire, ToWire},
        negotiation::{
            CS_NEG_DONT_CARE, CS_NEG_REFUSE, CS_NEG_REQUIRE, CsNeg, negotiate_outcome,
        },
    },
};

#[test]
fn test_outcome_matrix() {
    use CsNegPolicy::{DontCare, Refuse, Require};

    // Server REFUSE row.
    assert_eq!(negotiate_outcome(CS_NEG_REFUSE, Refuse).ok(), Some(false));
    assert!(negotiate_outcome(CS_NEG_REFUSE, Require).is_err());
    assert_eq!(negotiate_outcome(CS_NEG_REFUSE, DontCare).ok(), Some(false));

    // Server REQUIRE row.
    assert!(negotiate_outcome(CS_NEG_REQUIRE, Refuse).is_err());
    assert_eq!(negotiate_outcome(CS_NEG_REQUIRE, Require).ok(), Some(true));
    assert_eq!(negotiate_outcome(CS_NEG_REQUIRE, DontCare).ok(), Some(true));

    // Server DONT_CARE row.
    assert_eq!(negotiate_outcome(CS_NEG_DONT_CARE, Refuse).ok(), Some(false));
    assert_eq!(negotiate_outcome(CS_NEG_DONT_CARE, Require).ok(), Some(true));
    assert_eq!(negotiate_outcome(CS_NEG_DONT_CARE, DontCare).ok(), Some(true));
}

#[test]
fn test_unknown_server_policy_is_rejected() {
    assert!(negotiate_outcome("CS_NEG_MAYBE", CsNegPolicy::DontCare).is_err());
}

#[test]
fn test_cs_neg_wire_roundtrip() -> Result<()> {
    let sent = CsNeg::success("CS_NEG_USE_SSL");
    let body = sent.to_wire(ProtocolVariant::Xml)?;
    let parsed = CsNeg::from_wire(&body, ProtocolVariant::Xml)?;
    assert_eq!(parsed.status, 1);
    assert_eq!(parsed.result, "cs_neg_result_kw=CS_NEG_USE_SSL;");

    let failure = CsNeg::failure();
    assert_eq!(failure.status, 0);
    Ok(())
}
