// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2012-2025 Andrei Maltsev

//! Frame I/O: `u32_be(header_len) ‖ xml_header ‖ body ‖ error ‖ bs`.
//!
//! The header's length fields are authoritative. Reading fewer or more bytes
//! than announced is a protocol error, so every segment goes through
//! `read_exact`.

use bytes::{Bytes, BytesMut};
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};
use tracing::warn;

use crate::{
    error::{IrodsError, Result},
    models::header::{MAX_HEADER_LEN, MsgHeader},
};

/// Cap on body/error segments; anything larger means a desynchronised stream.
const MAX_SEGMENT_LEN: u32 = 64 * 1024 * 1024;

/// A frame as read off the wire. `bs` holds the binary side-channel only when
/// the caller did not supply its own buffer.
#[derive(Debug)]
pub struct Frame {
    pub header: MsgHeader,
    pub body: Bytes,
    pub error: Bytes,
    pub bs: Bytes,
}

/// Writes one frame. The four segments are coalesced into a single buffer so
/// the transport sees one write per frame.
pub async fn write_frame<W: AsyncWrite + Unpin>(
    w: &mut W,
    header: &MsgHeader,
    body: &[u8],
    error: &[u8],
    bs: &[u8],
) -> std::io::Result<()> {
    let header_bytes = header.encode();
    let mut out =
        BytesMut::with_capacity(4 + header_bytes.len() + body.len() + error.len());
    out.extend_from_slice(&(header_bytes.len() as u32).to_be_bytes());
    out.extend_from_slice(&header_bytes);
    out.extend_from_slice(body);
    out.extend_from_slice(error);
    w.write_all(&out).await?;
    // Large payloads skip the coalescing copy.
    if !bs.is_empty() {
        w.write_all(bs).await?;
    }
    w.flush().await
}

/// Reads one frame. When `bin` is given, the binary segment lands in it; the
/// buffer is grown (with a log line) if the announced length does not fit.
pub async fn read_frame<R: AsyncRead + Unpin>(
    r: &mut R,
    mut bin: Option<&mut BytesMut>,
) -> Result<Frame> {
    let mut len_buf = [0u8; 4];
    r.read_exact(&mut len_buf)
        .await
        .map_err(|e| IrodsError::transport("read header length", e))?;
    let header_len = u32::from_be_bytes(len_buf) as usize;
    if header_len == 0 || header_len > MAX_HEADER_LEN {
        return Err(IrodsError::Protocol(format!(
            "implausible header length {header_len}"
        )));
    }

    let mut header_buf = vec![0u8; header_len];
    r.read_exact(&mut header_buf)
        .await
        .map_err(|e| IrodsError::transport("read header", e))?;
    let header = MsgHeader::decode(&header_buf)?;

    if header.msg_len > MAX_SEGMENT_LEN
        || header.error_len > MAX_SEGMENT_LEN
        || header.bs_len > MAX_SEGMENT_LEN
    {
        return Err(IrodsError::Protocol(format!(
            "implausible segment lengths msgLen={} errorLen={} bsLen={}",
            header.msg_len, header.error_len, header.bs_len
        )));
    }

    let body = read_segment(r, header.msg_len as usize, "read body").await?;
    let error = read_segment(r, header.error_len as usize, "read error segment").await?;

    let bs_len = header.bs_len as usize;
    let bs = if bs_len == 0 {
        Bytes::new()
    } else if let Some(buf) = bin.as_deref_mut() {
        if buf.len() < bs_len {
            warn!(
                "binary buffer too small ({} < {bs_len}), reallocating",
                buf.len()
            );
            buf.resize(bs_len, 0);
        }
        r.read_exact(&mut buf[..bs_len])
            .await
            .map_err(|e| IrodsError::transport("read binary segment", e))?;
        buf.truncate(bs_len);
        Bytes::new()
    } else {
        warn!("no binary buffer supplied for {bs_len} announced bytes, allocating");
        read_segment(r, bs_len, "read binary segment").await?
    };

    Ok(Frame {
        header,
        body,
        error,
        bs,
    })
}

async fn read_segment<R: AsyncRead + Unpin>(
    r: &mut R,
    len: usize,
    op: &'static str,
) -> Result<Bytes> {
    if len == 0 {
        return Ok(Bytes::new());
    }
    let mut buf = BytesMut::zeroed(len);
    r.read_exact(&mut buf)
        .await
        .map_err(|e| IrodsError::transport(op, e))?;
    Ok(buf.freeze())
}
