// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2012-2025 Andrei Maltsev

//! Data-object message bodies: open/create inputs, ranged I/O on open
//! descriptors, seek results, and the rename pair.

use bitflags::bitflags;
use bytes::Bytes;

use crate::{
    cfg::enums::ProtocolVariant,
    error::{IrodsError, Result},
    models::{
        common::{FromWire, ToWire},
        xml::{Elem, XmlWriter},
    },
};

/// Condition-input keywords the client uses.
pub mod keyword {
    pub const FORCE_FLAG: &str = "forceFlag";
    pub const DEST_RESC_NAME: &str = "destRescName";
    pub const RESC_HIER: &str = "resc_hier";
    pub const REPL_NUM: &str = "replNum";
    pub const DATA_TYPE: &str = "dataType";
    pub const RECURSIVE_OPR: &str = "recursiveOpr";
    pub const CHKSUM_ALL: &str = "ChksumAll";
}

/// Operation types carried in `oprType`.
pub mod opr_type {
    pub const NO_OPR: i32 = 0;
    pub const PUT_OPR: i32 = 1;
    pub const GET_OPR: i32 = 2;
    pub const RENAME_DATA_OBJ: i32 = 11;
    pub const RENAME_COLL: i32 = 12;
}

/// Seek origins, matching the POSIX values the server expects.
pub mod whence {
    pub const SEEK_SET: i32 = 0;
    pub const SEEK_CUR: i32 = 1;
    pub const SEEK_END: i32 = 2;
}

bitflags! {
    /// POSIX-style open flags carried in `openFlags`. Read-only is the empty
    /// set.
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct OpenFlags: i32 {
        const WRITE_ONLY = 0o1;
        const READ_WRITE = 0o2;
        const CREATE     = 0o100;
        const EXCL       = 0o200;
        const TRUNCATE   = 0o1000;
    }
}

impl OpenFlags {
    pub const READ_ONLY: OpenFlags = OpenFlags::empty();

    pub fn is_write(self) -> bool {
        self.intersects(OpenFlags::WRITE_ONLY | OpenFlags::READ_WRITE)
    }
}

/// `KeyValPair_PI`: ordered condition-input options.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct KeyValPair(Vec<(String, String)>);

impl KeyValPair {
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets a keyword, replacing any previous value.
    pub fn set(&mut self, key: &str, value: &str) {
        if let Some(slot) = self.0.iter_mut().find(|(k, _)| k == key) {
            slot.1 = value.to_string();
        } else {
            self.0.push((key.to_string(), value.to_string()));
        }
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.0
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.as_str())
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub(crate) fn write_xml(&self, w: &mut XmlWriter) {
        w.open("KeyValPair_PI");
        w.tag_num("ssLen", self.0.len());
        for (k, _) in &self.0 {
            w.tag_str("keyWord", k);
        }
        for (_, v) in &self.0 {
            w.tag_str("svalue", v);
        }
        w.close("KeyValPair_PI");
    }

    pub(crate) fn parse_xml(elem: &Elem) -> Result<Self> {
        let keys: Vec<&Elem> = elem.children_named("keyWord").collect();
        let vals: Vec<&Elem> = elem.children_named("svalue").collect();
        if keys.len() != vals.len() {
            return Err(IrodsError::Protocol(format!(
                "KeyValPair_PI with {} keys but {} values",
                keys.len(),
                vals.len()
            )));
        }
        Ok(Self(
            keys.into_iter()
                .zip(vals)
                .map(|(k, v)| (k.text.clone(), v.text.clone()))
                .collect(),
        ))
    }
}

impl<const N: usize> From<[(&str, &str); N]> for KeyValPair {
    fn from(items: [(&str, &str); N]) -> Self {
        let mut kv = Self::new();
        for (k, v) in items {
            kv.set(k, v);
        }
        kv
    }
}

/// `DataObjInp_PI`: the open/create/unlink/checksum/stat input.
#[derive(Debug, Clone, Default)]
pub struct DataObjInp {
    pub obj_path: String,
    pub create_mode: i32,
    pub open_flags: i32,
    pub offset: i64,
    pub data_size: i64,
    pub num_threads: i32,
    pub opr_type: i32,
    pub cond_input: KeyValPair,
}

impl DataObjInp {
    pub fn open(path: &str, flags: OpenFlags) -> Self {
        Self {
            obj_path: path.to_string(),
            create_mode: if flags.contains(OpenFlags::CREATE) {
                0o644
            } else {
                0
            },
            open_flags: flags.bits(),
            ..Self::default()
        }
    }

    pub fn path_only(path: &str) -> Self {
        Self {
            obj_path: path.to_string(),
            ..Self::default()
        }
    }
}

impl ToWire for DataObjInp {
    fn to_wire(&self, variant: ProtocolVariant) -> Result<Bytes> {
        let mut w = XmlWriter::new(variant);
        write_data_obj_inp(&mut w, self);
        Ok(w.into_bytes())
    }
}

fn write_data_obj_inp(w: &mut XmlWriter, inp: &DataObjInp) {
    w.open("DataObjInp_PI");
    w.tag_str("objPath", &inp.obj_path);
    w.tag_num("createMode", inp.create_mode);
    w.tag_num("openFlags", inp.open_flags);
    w.tag_num("offset", inp.offset);
    w.tag_num("dataSize", inp.data_size);
    w.tag_num("numThreads", inp.num_threads);
    w.tag_num("oprType", inp.opr_type);
    inp.cond_input.write_xml(w);
    w.close("DataObjInp_PI");
}

/// `OpenedDataObjInp_PI`: read/write/seek/close against an open descriptor.
#[derive(Debug, Clone, Default)]
pub struct OpenedDataObjInp {
    pub l1_desc_inx: i32,
    pub len: i32,
    pub whence: i32,
    pub opr_type: i32,
    pub offset: i64,
    pub bytes_written: i64,
    pub cond_input: KeyValPair,
}

impl OpenedDataObjInp {
    pub fn descriptor(fd: i32) -> Self {
        Self {
            l1_desc_inx: fd,
            ..Self::default()
        }
    }

    pub fn io(fd: i32, len: i32) -> Self {
        Self {
            l1_desc_inx: fd,
            len,
            ..Self::default()
        }
    }

    pub fn seek(fd: i32, offset: i64, whence: i32) -> Self {
        Self {
            l1_desc_inx: fd,
            offset,
            whence,
            ..Self::default()
        }
    }
}

impl ToWire for OpenedDataObjInp {
    fn to_wire(&self, variant: ProtocolVariant) -> Result<Bytes> {
        let mut w = XmlWriter::new(variant);
        w.open("OpenedDataObjInp_PI");
        w.tag_num("l1descInx", self.l1_desc_inx);
        w.tag_num("len", self.len);
        w.tag_num("whence", self.whence);
        w.tag_num("oprType", self.opr_type);
        w.tag_num("offset", self.offset);
        w.tag_num("bytesWritten", self.bytes_written);
        self.cond_input.write_xml(&mut w);
        w.close("OpenedDataObjInp_PI");
        Ok(w.into_bytes())
    }
}

/// `fileLseekOut_PI`: the resulting absolute offset of a seek.
#[derive(Debug, Clone, Copy)]
pub struct FileLseekOut {
    pub offset: i64,
}

impl FromWire for FileLseekOut {
    fn from_wire(body: &[u8], variant: ProtocolVariant) -> Result<Self> {
        let root = Elem::parse(body, variant)?;
        if root.name != "fileLseekOut_PI" {
            return Err(IrodsError::Protocol(format!(
                "expected <fileLseekOut_PI>, got <{}>",
                root.name
            )));
        }
        Ok(Self {
            offset: root.i64_of("offset")?,
        })
    }
}

/// `DataObjCopyInp_PI`: rename input, two `DataObjInp_PI` halves.
#[derive(Debug, Clone)]
pub struct DataObjCopyInp {
    pub src: DataObjInp,
    pub dst: DataObjInp,
}

impl DataObjCopyInp {
    pub fn rename(src: &str, dst: &str, collection: bool) -> Self {
        let opr = if collection {
            opr_type::RENAME_COLL
        } else {
            opr_type::RENAME_DATA_OBJ
        };
        let mut src_inp = DataObjInp::path_only(src);
        src_inp.opr_type = opr;
        let mut dst_inp = DataObjInp::path_only(dst);
        dst_inp.opr_type = opr;
        Self {
            src: src_inp,
            dst: dst_inp,
        }
    }
}

impl ToWire for DataObjCopyInp {
    fn to_wire(&self, variant: ProtocolVariant) -> Result<Bytes> {
        let mut w = XmlWriter::new(variant);
        w.open("DataObjCopyInp_PI");
        write_data_obj_inp(&mut w, &self.src);
        write_data_obj_inp(&mut w, &self.dst);
        w.close("DataObjCopyInp_PI");
        Ok(w.into_bytes())
    }
}
