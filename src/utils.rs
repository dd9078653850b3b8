// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2012-2025 Andrei Maltsev

use std::fmt::Write;

use base64::{Engine, engine::general_purpose::STANDARD};
use md5::{Digest, Md5};
use rand::RngExt;

/// Server challenges are always this long once base64-decoded.
pub const CHALLENGE_LEN: usize = 64;
/// Passwords are zero-padded (or truncated) to this length before hashing.
pub const MAX_PASSWORD_LEN: usize = 50;
/// The client signature covers the first 16 challenge bytes.
pub const SIGNATURE_LEN: usize = 16;

/// Computes the challenge-response for native authentication:
/// `md5(challenge[..64] ‖ password padded to 50)`, with zero bytes in the
/// digest bumped to 0x01 (the server treats the response as a C string),
/// base64-encoded.
pub fn auth_response(challenge: &[u8], password: &str) -> String {
    let mut buf = [0u8; CHALLENGE_LEN + MAX_PASSWORD_LEN];
    let n = challenge.len().min(CHALLENGE_LEN);
    buf[..n].copy_from_slice(&challenge[..n]);
    let pw = password.as_bytes();
    let m = pw.len().min(MAX_PASSWORD_LEN);
    buf[CHALLENGE_LEN..CHALLENGE_LEN + m].copy_from_slice(&pw[..m]);

    let mut hasher = Md5::new();
    hasher.update(buf);
    let mut digest = hasher.finalize();
    for b in digest.iter_mut() {
        if *b == 0 {
            *b = 1;
        }
    }
    STANDARD.encode(digest)
}

/// Hex of the first 16 challenge bytes; kept on the session as an opaque
/// identity token for password-changing operations.
pub fn client_signature(challenge: &[u8]) -> String {
    let n = challenge.len().min(SIGNATURE_LEN);
    let mut hex = String::with_capacity(SIGNATURE_LEN * 2);
    for byte in &challenge[..n] {
        write!(&mut hex, "{byte:02x}").expect("Writing to String cannot fail");
    }
    hex
}

/// Generates `n` random bytes for the TLS session shared secret.
pub fn random_key(n: usize) -> Vec<u8> {
    let mut key = vec![0u8; n];
    rand::rng().fill(key.as_mut_slice());
    key
}
