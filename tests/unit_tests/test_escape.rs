// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2012-2025 Andrei Maltsev

use irods_client_rs::models::escape::{is_valid_xml_char, postprocess, preprocess};

#[test]
fn test_preprocess_uses_named_entities() {
    assert_eq!(preprocess(r#"a"b'c"#), "a&quot;b&apos;c");
    assert_eq!(preprocess("a<b>c&d"), "a&lt;b&gt;c&amp;d");
}

#[test]
fn test_preprocess_keeps_whitespace_controls_literal() {
    // The server rejects numeric references, so these must stay raw bytes.
    assert_eq!(preprocess("a\tb\nc\rd"), "a\tb\nc\rd");
}

#[test]
fn test_postprocess_named_and_numeric_forms() {
    assert_eq!(postprocess("a&quot;b&apos;c"), r#"a"b'c"#);
    assert_eq!(postprocess("&#34;&#39;"), r#""'"#);
    assert_eq!(postprocess("&#x9;&#xA;&#xD;"), "\t\n\r");
    assert_eq!(postprocess("&amp;&lt;&gt;"), "&<>");
}

#[test]
fn test_postprocess_preserves_unknown_entities() {
    assert_eq!(postprocess("&bogus;"), "&bogus;");
    assert_eq!(postprocess("dangling &"), "dangling &");
}

#[test]
fn test_postprocess_replaces_invalid_chars() {
    assert_eq!(postprocess("a\u{0}b"), "a\u{FFFD}b");
    assert_eq!(postprocess("&#1;"), "\u{FFFD}");
    assert!(!is_valid_xml_char('\u{0B}'));
    assert!(is_valid_xml_char('\t'));
    assert!(is_valid_xml_char('\u{10FFFF}'));
}

#[test]
fn test_roundtrip_identity_for_valid_text() {
    let cases = [
        "plain",
        r#"quotes " and ' here"#,
        "tabs\tand\nnewlines\rtoo",
        "mixed <tags> & entities",
        "unicode: \u{4E2D}\u{6587} \u{1F600}",
        "",
    ];
    for s in cases {
        assert_eq!(postprocess(&preprocess(s)), s, "roundtrip failed for {s:?}");
    }
}
