// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2012-2025 Andrei Maltsev

use crate::{cfg::enums::ProtocolVariant, models::xml::Elem};

/// Best-effort parse of a reply's error segment (`RError_PI` holding
/// `RErrMsg_PI` entries). Falls back to the raw text when the segment is not
/// the expected shape, and to `None` when it is empty.
pub fn parse_error_segment(segment: &[u8], variant: ProtocolVariant) -> Option<String> {
    if segment.is_empty() {
        return None;
    }
    let Ok(root) = Elem::parse(segment, variant) else {
        return fallback(segment);
    };
    if root.name != "RError_PI" {
        return fallback(segment);
    }
    let messages: Vec<String> = root
        .children_named("RErrMsg_PI")
        .filter_map(|m| m.text_of("msg"))
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
        .collect();
    if messages.is_empty() {
        None
    } else {
        Some(messages.join("; "))
    }
}

fn fallback(segment: &[u8]) -> Option<String> {
    let text = String::from_utf8_lossy(segment).trim().to_string();
    if text.is_empty() { None } else { Some(text) }
}
