// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2012-2025 Andrei Maltsev

use std::path::Path;

use base64::{Engine, engine::general_purpose::STANDARD};
use sha2::{Digest, Sha256};
use tokio::{fs::File, io::AsyncReadExt};
use tokio_util::sync::CancellationToken;

use crate::{
    error::{IrodsError, Result},
    fs::Filesystem,
};

const HASH_CHUNK: usize = 256 * 1024;

/// Streaming SHA-256 of a local file, checked against the cancellation token
/// between chunks.
pub async fn local_sha256(path: &Path, token: &CancellationToken) -> Result<[u8; 32]> {
    let mut file = File::open(path)
        .await
        .map_err(|e| IrodsError::Local {
            op: "open file for hashing",
            source: e,
        })?;
    let mut hasher = Sha256::new();
    let mut buf = vec![0u8; HASH_CHUNK];
    loop {
        if token.is_cancelled() {
            return Err(IrodsError::Cancelled);
        }
        let n = file.read(&mut buf).await.map_err(|e| IrodsError::Local {
            op: "read file for hashing",
            source: e,
        })?;
        if n == 0 {
            break;
        }
        hasher.update(&buf[..n]);
    }
    Ok(hasher.finalize().into())
}

/// Compares the local file hash with the server's checksum of the object.
/// The catalog form is `sha2:<base64>`; a mismatch carries both digests.
pub async fn verify(
    fs: &Filesystem,
    token: &CancellationToken,
    local_path: &Path,
    remote_path: &str,
) -> Result<()> {
    let digest = local_sha256(local_path, token).await?;
    let local = STANDARD.encode(digest);

    let remote_raw = fs.checksum(token, remote_path).await?;
    let remote = remote_raw
        .strip_prefix("sha2:")
        .unwrap_or(remote_raw.as_str())
        .to_string();

    if local == remote {
        Ok(())
    } else {
        Err(IrodsError::ChecksumMismatch { local, remote })
    }
}
