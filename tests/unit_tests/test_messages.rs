// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2012-2025 Andrei Maltsev

use anyhow::Result;
use base64::{Engine, engine::general_purpose::STANDARD};
use irods_client_rs::{
    cfg::enums::ProtocolVariant,
    models::{
        auth::{AuthChallenge, AuthResponse, PamAuthRequest, PamAuthResult},
        common::{FromWire, ToWire},
        data_obj::{DataObjInp, OpenFlags, OpenedDataObjInp},
        descriptor::{DescriptorInfo, FdRequest},
        startup::{ServerVersion, StartupPack, Version},
        xml::Elem,
    },
};

const XML: ProtocolVariant = ProtocolVariant::Xml;

#[test]
fn test_startup_pack_fields() -> Result<()> {
    let pack = StartupPack {
        irods_prot: 1,
        reconn_flag: 0,
        connect_cnt: 0,
        proxy_user: "rods".into(),
        proxy_zone: "tempZone".into(),
        client_user: "alice".into(),
        client_zone: "tempZone".into(),
        rel_version: "rods4.3.0".into(),
        api_version: "d".into(),
        option: "irods-client-rs;request_server_negotiation".into(),
    };
    let body = pack.to_wire(XML)?;
    let root = Elem::parse(&body, XML)?;
    assert_eq!(root.name, "StartupPack_PI");
    assert_eq!(root.text_of("irodsProt"), Some("1"));
    assert_eq!(root.text_of("proxyUser"), Some("rods"));
    assert_eq!(root.text_of("clientUser"), Some("alice"));
    assert_eq!(
        root.text_of("option"),
        Some("irods-client-rs;request_server_negotiation")
    );
    Ok(())
}

#[test]
fn test_version_parse() -> Result<()> {
    let raw = "<Version_PI>\n<status>0</status>\n<relVersion>rods4.3.2</relVersion>\n\
               <apiVersion>d</apiVersion>\n<reconnPort>0</reconnPort>\n\
               <reconnAddr></reconnAddr>\n<cookie>400</cookie>\n</Version_PI>\n";
    let version = Version::from_wire(raw.as_bytes(), XML)?;
    assert_eq!(version.status, 0);
    assert_eq!(version.rel_version, "rods4.3.2");
    assert_eq!(version.cookie, 400);
    Ok(())
}

#[test]
fn test_server_version_ordering() -> Result<()> {
    let v = ServerVersion::parse("rods4.3.2")?;
    assert_eq!(v.to_string(), "4.3.2");
    assert!(ServerVersion::parse("rods4.3.10")? > v);
    assert!(ServerVersion::parse("rods5.0.0")? > v);
    Ok(())
}

#[test]
fn test_server_version_rejects_malformed() {
    for bad in ["4.3.2", "rods4.3", "rods4.3.2.1", "rodsx.y.z", ""] {
        assert!(ServerVersion::parse(bad).is_err(), "{bad:?} must not parse");
    }
}

#[test]
fn test_server_version_minimum() {
    assert!(ServerVersion::parse_supported("rods4.2.9").is_err());
    assert!(ServerVersion::parse_supported("rods4.3.1").is_err());
    assert!(ServerVersion::parse_supported("rods4.3.2").is_ok());
    assert!(ServerVersion::parse_supported("rods4.4.0").is_ok());
}

#[test]
fn test_auth_bodies() -> Result<()> {
    let raw = format!(
        "<authRequestOut_PI>\n<challenge>{}</challenge>\n</authRequestOut_PI>\n",
        STANDARD.encode([0x11u8; 64])
    );
    let challenge = AuthChallenge::from_wire(raw.as_bytes(), XML)?;
    assert_eq!(STANDARD.decode(&challenge.challenge)?, vec![0x11u8; 64]);

    let resp = AuthResponse {
        response: "c2NyYW1ibGVk".into(),
        username: "rods".into(),
    };
    let body = resp.to_wire(XML)?;
    let root = Elem::parse(&body, XML)?;
    assert_eq!(root.name, "authResponseInp_PI");
    assert_eq!(root.text_of("username"), Some("rods"));

    let pam = PamAuthRequest {
        user: "alice".into(),
        password: "secret'with\"quotes".into(),
        ttl: 24,
    };
    let body = pam.to_wire(XML)?;
    let root = Elem::parse(&body, XML)?;
    // The dialect escape pass must survive a parse roundtrip.
    assert_eq!(root.text_of("pamPassword"), Some("secret'with\"quotes"));
    assert_eq!(root.text_of("timeToLive"), Some("24"));

    let raw = "<pamAuthRequestOut_PI>\n<irodsPamPassword>ephemeral123\
               </irodsPamPassword>\n</pamAuthRequestOut_PI>\n";
    let minted = PamAuthResult::from_wire(raw.as_bytes(), XML)?;
    assert_eq!(minted.password, "ephemeral123");
    Ok(())
}

#[test]
fn test_data_obj_inp_shape() -> Result<()> {
    let mut inp = DataObjInp::open(
        "/tempZone/home/rods/file.dat",
        OpenFlags::WRITE_ONLY | OpenFlags::CREATE | OpenFlags::TRUNCATE,
    );
    inp.cond_input.set("resc_hier", "demoResc");
    let body = inp.to_wire(XML)?;
    let root = Elem::parse(&body, XML)?;
    assert_eq!(root.name, "DataObjInp_PI");
    assert_eq!(root.text_of("objPath"), Some("/tempZone/home/rods/file.dat"));
    assert_eq!(root.text_of("openFlags"), Some("577"));
    let kv = root.require("KeyValPair_PI")?;
    assert_eq!(kv.text_of("ssLen"), Some("1"));
    assert_eq!(kv.text_of("keyWord"), Some("resc_hier"));
    assert_eq!(kv.text_of("svalue"), Some("demoResc"));
    Ok(())
}

#[test]
fn test_opened_data_obj_inp_seek() -> Result<()> {
    let inp = OpenedDataObjInp::seek(5, 200, 0);
    let body = inp.to_wire(XML)?;
    let root = Elem::parse(&body, XML)?;
    assert_eq!(root.text_of("l1descInx"), Some("5"));
    assert_eq!(root.text_of("offset"), Some("200"));
    assert_eq!(root.text_of("whence"), Some("0"));
    Ok(())
}

#[test]
fn test_json_body_roundtrip() -> Result<()> {
    let body = FdRequest { fd: 7 }.to_wire(XML)?;
    let root = Elem::parse(&body, XML)?;
    assert_eq!(root.name, "BinBytesBuf_PI");
    let decoded = STANDARD.decode(root.text_of("buf").unwrap_or_default())?;
    assert_eq!(serde_json::from_slice::<serde_json::Value>(&decoded)?["fd"], 7);

    let info = serde_json::json!({
        "data_object_info": {
            "replica_number": 3,
            "resource_hierarchy": "root;storage",
        },
        "replica_token": "tok",
        "some_future_field": true,
    });
    let encoded = STANDARD.encode(serde_json::to_vec(&info)?);
    let wrapped = format!(
        "<BinBytesBuf_PI>\n<buflen>{}</buflen>\n<buf>{}</buf>\n</BinBytesBuf_PI>\n",
        encoded.len(),
        encoded
    );
    let parsed = DescriptorInfo::from_wire(wrapped.as_bytes(), XML)?;
    assert_eq!(parsed.data_object_info.replica_number, 3);
    assert_eq!(parsed.data_object_info.resource_hierarchy, "root;storage");
    Ok(())
}
