// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2012-2025 Andrei Maltsev

use bytes::Bytes;

use crate::{
    cfg::enums::ProtocolVariant,
    error::{IrodsError, Result},
    models::{
        common::{FromWire, ToWire},
        xml::{Elem, XmlWriter},
    },
};

/// Catalog object kinds reported by `RodsObjStat_PI.objType`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ObjType {
    Unknown,
    DataObj,
    Coll,
}

impl From<i32> for ObjType {
    fn from(raw: i32) -> Self {
        match raw {
            1 => ObjType::DataObj,
            2 => ObjType::Coll,
            _ => ObjType::Unknown,
        }
    }
}

/// `RodsObjStat_PI`: catalog metadata of a path.
#[derive(Debug, Clone)]
pub struct RodsObjStat {
    pub obj_size: i64,
    pub obj_type: ObjType,
    pub data_mode: u32,
    pub data_id: String,
    pub checksum: String,
    pub owner_name: String,
    pub owner_zone: String,
    /// Seconds since the epoch, as the catalog stores them (decimal string).
    pub create_time: i64,
    pub modify_time: i64,
}

impl FromWire for RodsObjStat {
    fn from_wire(body: &[u8], variant: ProtocolVariant) -> Result<Self> {
        let root = Elem::parse(body, variant)?;
        if root.name != "RodsObjStat_PI" {
            return Err(IrodsError::Protocol(format!(
                "expected <RodsObjStat_PI>, got <{}>",
                root.name
            )));
        }
        Ok(Self {
            obj_size: root.i64_of("objSize")?,
            obj_type: ObjType::from(root.i32_of("objType")?),
            data_mode: root.child("dataMode").map_or(Ok(0), |_| {
                root.u32_of("dataMode")
            })?,
            data_id: root.text_of("dataId").unwrap_or_default().trim().to_string(),
            checksum: root.text_of("chksum").unwrap_or_default().trim().to_string(),
            owner_name: root
                .text_of("ownerName")
                .unwrap_or_default()
                .trim()
                .to_string(),
            owner_zone: root
                .text_of("ownerZone")
                .unwrap_or_default()
                .trim()
                .to_string(),
            create_time: parse_catalog_time(root.text_of("createTime").unwrap_or("0")),
            modify_time: parse_catalog_time(root.text_of("modifyTime").unwrap_or("0")),
        })
    }
}

/// Catalog timestamps are zero-padded decimal strings; unparsable values
/// degrade to zero rather than failing the stat.
fn parse_catalog_time(raw: &str) -> i64 {
    raw.trim().trim_start_matches('0').parse::<i64>().unwrap_or(0)
}

/// `STR_PI`: a single string, e.g. the checksum reply.
#[derive(Debug, Clone)]
pub struct Str {
    pub value: String,
}

impl FromWire for Str {
    fn from_wire(body: &[u8], variant: ProtocolVariant) -> Result<Self> {
        let root = Elem::parse(body, variant)?;
        if root.name != "STR_PI" {
            return Err(IrodsError::Protocol(format!(
                "expected <STR_PI>, got <{}>",
                root.name
            )));
        }
        Ok(Self {
            value: root.str_of("myStr")?.trim().to_string(),
        })
    }
}

/// `ModAVUMetadataInp_PI`: the ten-argument metadata mutation input.
#[derive(Debug, Clone, Default)]
pub struct ModAvuMetadataInp {
    pub args: [String; 10],
}

impl ModAvuMetadataInp {
    /// `operation` is `add` or `rm`; `obj_type` is `-d` (data object) or
    /// `-C` (collection).
    pub fn new(
        operation: &str,
        obj_type: &str,
        path: &str,
        attr: &str,
        value: &str,
        unit: &str,
    ) -> Self {
        let mut args: [String; 10] = Default::default();
        args[0] = operation.to_string();
        args[1] = obj_type.to_string();
        args[2] = path.to_string();
        args[3] = attr.to_string();
        args[4] = value.to_string();
        args[5] = unit.to_string();
        Self { args }
    }
}

impl ToWire for ModAvuMetadataInp {
    fn to_wire(&self, variant: ProtocolVariant) -> Result<Bytes> {
        let mut w = XmlWriter::new(variant);
        w.open("ModAVUMetadataInp_PI");
        for (i, arg) in self.args.iter().enumerate() {
            w.tag_str(&format!("arg{i}"), arg);
        }
        w.close("ModAVUMetadataInp_PI");
        Ok(w.into_bytes())
    }
}

/// `modAccessControlInp_PI`: ACL mutation input.
#[derive(Debug, Clone)]
pub struct ModAccessControlInp {
    pub recursive: bool,
    pub access_level: String,
    pub user_name: String,
    pub zone: String,
    pub path: String,
}

impl ToWire for ModAccessControlInp {
    fn to_wire(&self, variant: ProtocolVariant) -> Result<Bytes> {
        let mut w = XmlWriter::new(variant);
        w.open("modAccessControlInp_PI");
        w.tag_num("recursiveFlag", i32::from(self.recursive));
        w.tag_str("accessLevel", &self.access_level);
        w.tag_str("userName", &self.user_name);
        w.tag_str("zone", &self.zone);
        w.tag_str("path", &self.path);
        w.close("modAccessControlInp_PI");
        Ok(w.into_bytes())
    }
}
