// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2012-2025 Andrei Maltsev

//! Thin GenQuery marshalling. Query construction beyond selects/conditions
//! lives with the caller; this module only moves `GenQueryInp_PI` and
//! `GenQueryOut_PI` across the wire.

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

/// Catalog columns used by the thin query helpers.
pub mod column {
    pub const COL_D_DATA_ID: i32 = 401;
    pub const COL_DATA_NAME: i32 = 403;
    pub const COL_DATA_REPL_NUM: i32 = 404;
    pub const COL_DATA_SIZE: i32 = 407;
    pub const COL_D_MODIFY_TIME: i32 = 420;
    pub const COL_COLL_ID: i32 = 500;
    pub const COL_COLL_NAME: i32 = 501;
}

/// Select aggregate: plain projection.
pub const SELECT_NORMAL: i32 = 1;

/// `GenQueryInp_PI`.
#[derive(Debug, Clone, Default)]
pub struct GenQueryInp {
    pub max_rows: i32,
    pub continue_inx: i32,
    pub partial_start_index: i32,
    pub options: i32,
    pub cond_input: KeyValPair,
    /// Selected columns with their aggregate values.
    pub selects: Vec<(i32, i32)>,
    /// Column conditions, e.g. `(COL_COLL_NAME, "= '/zone/home'")`.
    pub conditions: Vec<(i32, String)>,
}

impl GenQueryInp {
    pub fn select(columns: &[i32]) -> Self {
        Self {
            max_rows: 500,
            selects: columns.iter().map(|&c| (c, SELECT_NORMAL)).collect(),
            ..Self::default()
        }
    }

    pub fn condition(mut self, column: i32, expr: &str) -> Self {
        self.conditions.push((column, expr.to_string()));
        self
    }
}

impl ToWire for GenQueryInp {
    fn to_wire(&self, variant: ProtocolVariant) -> Result<Bytes> {
        let mut w = XmlWriter::new(variant);
        w.open("GenQueryInp_PI");
        w.tag_num("maxRows", self.max_rows);
        w.tag_num("continueInx", self.continue_inx);
        w.tag_num("partialStartIndex", self.partial_start_index);
        w.tag_num("options", self.options);
        self.cond_input.write_xml(&mut w);
        w.open("InxIvalPair_PI");
        w.tag_num("iiLen", self.selects.len());
        for (inx, _) in &self.selects {
            w.tag_num("inx", *inx);
        }
        for (_, ival) in &self.selects {
            w.tag_num("ivalue", *ival);
        }
        w.close("InxIvalPair_PI");
        w.open("InxValPair_PI");
        w.tag_num("isLen", self.conditions.len());
        for (inx, _) in &self.conditions {
            w.tag_num("inx", *inx);
        }
        for (_, value) in &self.conditions {
            w.tag_str("svalue", value);
        }
        w.close("InxValPair_PI");
        w.close("GenQueryInp_PI");
        Ok(w.into_bytes())
    }
}

/// One column of a query result page.
#[derive(Debug, Clone)]
pub struct SqlResult {
    pub attri_inx: i32,
    pub values: Vec<String>,
}

/// `GenQueryOut_PI`: one page of results, column-major.
#[derive(Debug, Clone, Default)]
pub struct GenQueryOut {
    pub row_cnt: i32,
    pub attri_cnt: i32,
    pub continue_inx: i32,
    pub total_row_count: i32,
    pub columns: Vec<SqlResult>,
}

impl GenQueryOut {
    /// Values of a selected column, if present in the page.
    pub fn column(&self, attri_inx: i32) -> Option<&[String]> {
        self.columns
            .iter()
            .find(|c| c.attri_inx == attri_inx)
            .map(|c| c.values.as_slice())
    }
}

impl FromWire for GenQueryOut {
    fn from_wire(body: &[u8], variant: ProtocolVariant) -> Result<Self> {
        let root = Elem::parse(body, variant)?;
        if root.name != "GenQueryOut_PI" {
            return Err(IrodsError::Protocol(format!(
                "expected <GenQueryOut_PI>, got <{}>",
                root.name
            )));
        }
        let row_cnt = root.i32_of("rowCnt")?;
        let attri_cnt = root.i32_of("attriCnt")?;
        let mut columns = Vec::with_capacity(attri_cnt.max(0) as usize);
        for sql in root.children_named("SqlResult_PI").take(attri_cnt.max(0) as usize)
        {
            let attri_inx = sql.i32_of("attriInx")?;
            let values = sql
                .children_named("value")
                .take(row_cnt.max(0) as usize)
                .map(|v| v.text.clone())
                .collect();
            columns.push(SqlResult { attri_inx, values });
        }
        Ok(Self {
            row_cnt,
            attri_cnt,
            continue_inx: root.i32_of("continueInx")?,
            total_row_count: root
                .child("totalRowCount")
                .map_or(Ok(0), |_| root.i32_of("totalRowCount"))?,
            columns,
        })
    }
}
