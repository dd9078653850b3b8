// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2012-2025 Andrei Maltsev

use std::io::ErrorKind;

use irods_client_rs::error::{
    CAT_NO_ACCESS_PERMISSION, CAT_UNKNOWN_COLLECTION, IrodsError, error_name,
    is_sql_error, rounded_code,
};

#[test]
fn test_rounded_code_strips_errno() {
    assert_eq!(rounded_code(-818_000), -818_000);
    // The server composes `base - errno`.
    assert_eq!(rounded_code(-818_013), -818_000);
    assert_eq!(rounded_code(-1_803_021), -1_803_000);
}

#[test]
fn test_error_names() {
    assert_eq!(error_name(-808_000), Some("CAT_NO_ROWS_FOUND"));
    assert_eq!(error_name(CAT_UNKNOWN_COLLECTION), Some("CAT_UNKNOWN_COLLECTION"));
    assert_eq!(error_name(-818_002), Some("CAT_NO_ACCESS_PERMISSION"));
    assert_eq!(error_name(-1), None);
}

#[test]
fn test_sql_error_band() {
    assert!(is_sql_error(-806_000));
    assert!(is_sql_error(-806_017));
    assert!(!is_sql_error(-808_000));
    assert!(!is_sql_error(0));
}

#[test]
fn test_os_analogues() {
    let not_found = IrodsError::server(-817_000, "no such data object");
    assert_eq!(not_found.io_kind(), Some(ErrorKind::NotFound));
    assert!(not_found.is_not_found());

    let exists = IrodsError::server(-803_000, "");
    assert!(exists.is_already_exists());

    let denied = IrodsError::server(CAT_NO_ACCESS_PERMISSION - 13, "");
    assert!(denied.is_permission_denied());

    let not_empty = IrodsError::server(-821_000, "");
    assert!(not_empty.is_not_empty());

    let unmapped = IrodsError::server(-130_000, "");
    assert_eq!(unmapped.io_kind(), None);
}

#[test]
fn test_server_error_display_includes_name() {
    let err = IrodsError::server(-826_000, "login failed");
    let text = err.to_string();
    assert!(text.contains("CAT_INVALID_AUTHENTICATION"), "{text}");
    assert!(text.contains("-826000"), "{text}");

    let unknown = IrodsError::server(-999_999, "");
    assert!(unknown.to_string().contains("IRODS_ERROR_999999"));
}

#[test]
fn test_hierarchy_error_detection() {
    assert!(IrodsError::server(-1_803_000, "").is_hierarchy_error());
    assert!(IrodsError::server(-1_803_004, "").is_hierarchy_error());
    assert!(!IrodsError::server(-818_000, "").is_hierarchy_error());
}
