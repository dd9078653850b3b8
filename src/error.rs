// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2012-2025 Andrei Maltsev

//! Error taxonomy for the iRODS client.
//!
//! Server-returned failures carry the signed catalog code plus the symbolic
//! name resolved from a fixed table; a handful of catalog codes additionally
//! expose a host-OS analogue (`std::io::ErrorKind`) so callers can treat
//! "collection does not exist" like any other not-found condition.

use std::{collections::HashMap, io, sync::Arc};

use once_cell::sync::Lazy;
use thiserror::Error;

pub type Result<T, E = IrodsError> = std::result::Result<T, E>;

// Catalog codes the client inspects. The server composes codes as
// `base - errno`, so comparisons go through [`rounded_code`].
pub const CAT_NO_ROWS_FOUND: i32 = -808_000;
pub const CAT_NAME_EXISTS_AS_DATAOBJ: i32 = -803_000;
pub const CAT_SQL_ERR: i32 = -806_000;
pub const CAT_NAME_EXISTS_AS_COLLECTION: i32 = -809_000;
pub const CAT_UNKNOWN_COLLECTION: i32 = -813_000;
pub const CAT_UNKNOWN_FILE: i32 = -817_000;
pub const CAT_NO_ACCESS_PERMISSION: i32 = -818_000;
pub const CAT_COLLECTION_NOT_EMPTY: i32 = -821_000;
pub const CAT_INVALID_AUTHENTICATION: i32 = -826_000;
pub const USER_CHKSUM_MISMATCH: i32 = -314_000;
pub const USER_FILE_DOES_NOT_EXIST: i32 = -317_000;
pub const OVERWRITE_WITHOUT_FORCE_FLAG: i32 = -312_000;
pub const PAM_AUTH_PASSWORD_FAILED: i32 = -993_000;
pub const SYS_INVALID_INPUT_PARAM: i32 = -130_000;
pub const HIERARCHY_ERROR: i32 = -1_803_000;

static ERROR_NAMES: Lazy<HashMap<i32, &'static str>> = Lazy::new(|| {
    HashMap::from([
        (CAT_NO_ROWS_FOUND, "CAT_NO_ROWS_FOUND"),
        (CAT_NAME_EXISTS_AS_DATAOBJ, "CAT_NAME_EXISTS_AS_DATAOBJ"),
        (CAT_SQL_ERR, "CAT_SQL_ERR"),
        (
            CAT_NAME_EXISTS_AS_COLLECTION,
            "CAT_NAME_EXISTS_AS_COLLECTION",
        ),
        (CAT_UNKNOWN_COLLECTION, "CAT_UNKNOWN_COLLECTION"),
        (CAT_UNKNOWN_FILE, "CAT_UNKNOWN_FILE"),
        (CAT_NO_ACCESS_PERMISSION, "CAT_NO_ACCESS_PERMISSION"),
        (CAT_COLLECTION_NOT_EMPTY, "CAT_COLLECTION_NOT_EMPTY"),
        (CAT_INVALID_AUTHENTICATION, "CAT_INVALID_AUTHENTICATION"),
        (USER_CHKSUM_MISMATCH, "USER_CHKSUM_MISMATCH"),
        (USER_FILE_DOES_NOT_EXIST, "USER_FILE_DOES_NOT_EXIST"),
        (
            OVERWRITE_WITHOUT_FORCE_FLAG,
            "OVERWRITE_WITHOUT_FORCE_FLAG",
        ),
        (PAM_AUTH_PASSWORD_FAILED, "PAM_AUTH_PASSWORD_FAILED"),
        (SYS_INVALID_INPUT_PARAM, "SYS_INVALID_INPUT_PARAM"),
        (HIERARCHY_ERROR, "HIERARCHY_ERROR"),
    ])
});

/// Strips the embedded errno from a composed server code (`base - errno`).
pub fn rounded_code(code: i32) -> i32 {
    (code / 1000) * 1000
}

/// Resolves the symbolic name of a catalog code, if the client knows it.
pub fn error_name(code: i32) -> Option<&'static str> {
    ERROR_NAMES.get(&rounded_code(code)).copied()
}

/// Whether a server code falls into the catalog SQL-error millenium.
/// The pool discards sessions that accumulated SQL errors.
pub fn is_sql_error(code: i32) -> bool {
    rounded_code(code) == CAT_SQL_ERR
}

#[derive(Debug, Error)]
pub enum IrodsError {
    #[error("{op}: {source}")]
    Transport {
        op: &'static str,
        #[source]
        source: io::Error,
    },

    #[error("{op} timed out")]
    Timeout { op: &'static str },

    #[error("protocol error: {0}")]
    Protocol(String),

    #[error("unexpected message type {got:?}, expected {expected:?}")]
    UnexpectedMessage { expected: String, got: String },

    #[error("unsupported server version {0:?}, need rods4.3.2 or newer")]
    UnsupportedVersion(String),

    #[error("client/server SSL negotiation failed: {0}")]
    Negotiation(String),

    #[error("TLS is required for this auth scheme but negotiation is disabled")]
    TlsRequired,

    #[error("TLS configuration error: {0}")]
    SslConfig(String),

    #[error("TLS handshake failed: {0}")]
    TlsHandshake(#[source] io::Error),

    #[error("authentication failed: {0}")]
    Authentication(String),

    #[error("server returned {name} ({code}): {message}")]
    Server {
        code: i32,
        name: String,
        message: String,
    },

    #[error("no connections available: {0}")]
    PoolExhausted(String),

    #[error("pool is closed")]
    PoolClosed,

    #[error("connection dial failed earlier: {0}")]
    DialLatched(Arc<IrodsError>),

    #[error("local {op}: {source}")]
    Local {
        op: &'static str,
        #[source]
        source: io::Error,
    },

    #[error("checksum mismatch: local {local}, remote {remote}")]
    ChecksumMismatch { local: String, remote: String },

    #[error("session is closed")]
    SessionClosed,

    #[error("operation cancelled")]
    Cancelled,
}

impl IrodsError {
    /// Builds a server error from a reply code plus the best-effort message
    /// recovered from the error segment.
    pub fn server(code: i32, message: impl Into<String>) -> Self {
        let name = error_name(code)
            .map(str::to_owned)
            .unwrap_or_else(|| format!("IRODS_ERROR_{}", -code));
        Self::Server {
            code,
            name,
            message: message.into(),
        }
    }

    pub fn transport(op: &'static str, source: io::Error) -> Self {
        Self::Transport { op, source }
    }

    /// The raw server code, when this is a server-returned error.
    pub fn code(&self) -> Option<i32> {
        match self {
            Self::Server { code, .. } => Some(*code),
            _ => None,
        }
    }

    /// Host-OS analogue for selected catalog codes.
    pub fn io_kind(&self) -> Option<io::ErrorKind> {
        let code = rounded_code(self.code()?);
        match code {
            CAT_UNKNOWN_FILE | CAT_UNKNOWN_COLLECTION | CAT_NO_ROWS_FOUND
            | USER_FILE_DOES_NOT_EXIST => Some(io::ErrorKind::NotFound),
            CAT_NAME_EXISTS_AS_DATAOBJ
            | CAT_NAME_EXISTS_AS_COLLECTION
            | OVERWRITE_WITHOUT_FORCE_FLAG => Some(io::ErrorKind::AlreadyExists),
            CAT_NO_ACCESS_PERMISSION => Some(io::ErrorKind::PermissionDenied),
            CAT_COLLECTION_NOT_EMPTY => Some(io::ErrorKind::DirectoryNotEmpty),
            _ => None,
        }
    }

    pub fn is_not_found(&self) -> bool {
        self.io_kind() == Some(io::ErrorKind::NotFound)
    }

    pub fn is_already_exists(&self) -> bool {
        self.io_kind() == Some(io::ErrorKind::AlreadyExists)
    }

    pub fn is_permission_denied(&self) -> bool {
        self.io_kind() == Some(io::ErrorKind::PermissionDenied)
    }

    pub fn is_not_empty(&self) -> bool {
        self.io_kind() == Some(io::ErrorKind::DirectoryNotEmpty)
    }

    /// True for failures that poison the session transport. The pool drops
    /// such sessions instead of returning them to the idle queue.
    pub fn is_transport(&self) -> bool {
        matches!(
            self,
            Self::Transport { .. } | Self::Timeout { .. } | Self::TlsHandshake(_)
        )
    }

    pub fn is_hierarchy_error(&self) -> bool {
        self.code().map(rounded_code) == Some(HIERARCHY_ERROR)
    }
}
