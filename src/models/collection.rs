// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2012-2025 Andrei Maltsev

use bytes::Bytes;

use crate::{
    cfg::enums::ProtocolVariant,
    error::{IrodsError, Result},
    models::{
        common::{FromWire, ToWire},
        data_obj::KeyValPair,
        xml::{Elem, XmlWriter},
    },
};

/// `CollInpNew_PI`: create/remove input for collections.
#[derive(Debug, Clone, Default)]
pub struct CollInp {
    pub coll_name: String,
    pub flags: i32,
    pub opr_type: i32,
    pub cond_input: KeyValPair,
}

impl CollInp {
    pub fn named(path: &str) -> Self {
        Self {
            coll_name: path.to_string(),
            ..Self::default()
        }
    }
}

impl ToWire for CollInp {
    fn to_wire(&self, variant: ProtocolVariant) -> Result<Bytes> {
        let mut w = XmlWriter::new(variant);
        w.open("CollInpNew_PI");
        w.tag_str("collName", &self.coll_name);
        w.tag_num("flags", self.flags);
        w.tag_num("oprType", self.opr_type);
        self.cond_input.write_xml(&mut w);
        w.close("CollInpNew_PI");
        Ok(w.into_bytes())
    }
}

/// `CollOprStat_PI`: progress statistics streamed during collection removal.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CollOprStat {
    pub files_cnt: i32,
    pub total_file_cnt: i32,
    pub bytes_written: i64,
    pub last_obj_path: String,
}

impl FromWire for CollOprStat {
    fn from_wire(body: &[u8], variant: ProtocolVariant) -> Result<Self> {
        if body.is_empty() {
            // Removal of an already-empty collection replies with no stat.
            return Ok(Self::default());
        }
        let root = Elem::parse(body, variant)?;
        if root.name != "CollOprStat_PI" {
            return Err(IrodsError::Protocol(format!(
                "expected <CollOprStat_PI>, got <{}>",
                root.name
            )));
        }
        Ok(Self {
            files_cnt: root.i32_of("filesCnt")?,
            total_file_cnt: root.i32_of("totalFileCnt")?,
            bytes_written: root.i64_of("bytesWritten")?,
            last_obj_path: root
                .text_of("lastObjPath")
                .unwrap_or_default()
                .trim()
                .to_string(),
        })
    }
}
