// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2012-2025 Andrei Maltsev

use anyhow::Result;
use irods_client_rs::{
    cfg::enums::ProtocolVariant,
    models::{
        common::{FromWire, ToWire},
        query::{GenQueryInp, GenQueryOut, column},
        xml::Elem,
    },
};

const XML: ProtocolVariant = ProtocolVariant::Xml;

#[test]
fn test_gen_query_inp_shape() -> Result<()> {
    let inp = GenQueryInp::select(&[column::COL_DATA_NAME, column::COL_DATA_SIZE])
        .condition(column::COL_COLL_NAME, "= '/tempZone/home/rods'");
    let body = inp.to_wire(XML)?;
    let root = Elem::parse(&body, XML)?;
    assert_eq!(root.name, "GenQueryInp_PI");
    assert_eq!(root.text_of("maxRows"), Some("500"));

    let selects = root.require("InxIvalPair_PI")?;
    assert_eq!(selects.text_of("iiLen"), Some("2"));
    let select_cols: Vec<&str> =
        selects.children_named("inx").map(|e| e.text.as_str()).collect();
    assert_eq!(select_cols, vec!["403", "407"]);

    let conds = root.require("InxValPair_PI")?;
    assert_eq!(conds.text_of("isLen"), Some("1"));
    assert_eq!(conds.text_of("svalue"), Some("= '/tempZone/home/rods'"));
    Ok(())
}

#[test]
fn test_gen_query_out_parse() -> Result<()> {
    let raw = "<GenQueryOut_PI>\n<rowCnt>2</rowCnt>\n<attriCnt>2</attriCnt>\n\
               <continueInx>0</continueInx>\n<totalRowCount>2</totalRowCount>\n\
               <SqlResult_PI>\n<attriInx>403</attriInx>\n<reslen>64</reslen>\n\
               <value>a.dat</value>\n<value>b.dat</value>\n</SqlResult_PI>\n\
               <SqlResult_PI>\n<attriInx>407</attriInx>\n<reslen>32</reslen>\n\
               <value>100</value>\n<value>2048</value>\n</SqlResult_PI>\n\
               </GenQueryOut_PI>\n";
    let out = GenQueryOut::from_wire(raw.as_bytes(), XML)?;
    assert_eq!(out.row_cnt, 2);
    assert_eq!(out.attri_cnt, 2);
    assert_eq!(
        out.column(column::COL_DATA_NAME),
        Some(["a.dat".to_string(), "b.dat".to_string()].as_slice())
    );
    assert_eq!(
        out.column(column::COL_DATA_SIZE),
        Some(["100".to_string(), "2048".to_string()].as_slice())
    );
    assert_eq!(out.column(column::COL_COLL_NAME), None);
    Ok(())
}
