//! The parallel transfer engine and checksum verification.

// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2012-2025 Andrei Maltsev

/// Local hashing and remote checksum comparison.
pub mod checksum;
/// Ranged parallel upload/download.
pub mod engine;

pub use engine::{
    DEFAULT_BUFFER_SIZE, DEFAULT_MIN_RANGE_SIZE, TransferOptions, download, upload,
};
