// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2012-2025 Andrei Maltsev

//! Parallel ranged copy between a local file and a remote data object.
//!
//! The byte range splits into contiguous pieces, one per lane. The first
//! lane writes through the handle that opened the object; every other lane
//! reopens the same replica on its own session reserved from the pool, so
//! ranged writes never fork across replicas. Lanes are serial on their own
//! session; the pool is the unit of concurrency.

use std::{
    io::SeekFrom,
    path::{Path, PathBuf},
    sync::Arc,
    time::{Duration, UNIX_EPOCH},
};

use bytes::BytesMut;
use tokio::{
    fs::File,
    io::{AsyncReadExt, AsyncSeekExt, AsyncWriteExt},
    task::JoinSet,
};
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use crate::{
    client::pool::Pool,
    error::{IrodsError, Result},
    fs::{FileHandle, Filesystem},
    models::data_obj::{KeyValPair, OpenFlags, whence},
    transfer::checksum,
};

pub const DEFAULT_BUFFER_SIZE: usize = 32 * 1024 * 1024;
pub const DEFAULT_MIN_RANGE_SIZE: usize = 8 * 1024 * 1024;

/// Tuning knobs of a transfer. Buffer size bounds each read/write RPC
/// payload; the minimum range size keeps partitions from degenerating.
#[derive(Debug, Clone)]
pub struct TransferOptions {
    pub lanes: usize,
    pub buffer_size: usize,
    pub min_range_size: usize,
    pub sync_mtime: bool,
    pub verify_checksum: bool,
    /// Refuse to overwrite an existing object on upload.
    pub exclusive: bool,
}

impl Default for TransferOptions {
    fn default() -> Self {
        Self {
            lanes: 4,
            buffer_size: DEFAULT_BUFFER_SIZE,
            min_range_size: DEFAULT_MIN_RANGE_SIZE,
            sync_mtime: false,
            verify_checksum: false,
            exclusive: false,
        }
    }
}

/// Lane count: `min(requested, capacity, size/min-range, size/buffer + 1)`,
/// clamped to at least one.
fn lane_count(
    requested: usize,
    capacity: usize,
    size: u64,
    buffer_size: usize,
    min_range_size: usize,
) -> usize {
    let by_min_range = (size / min_range_size.max(1) as u64) as usize;
    let by_buffer = (size / buffer_size.max(1) as u64) as usize + 1;
    requested
        .min(capacity)
        .min(by_min_range)
        .min(by_buffer)
        .max(1)
}

/// Contiguous `(offset, len)` pieces; the remainder lands in the last one.
fn partition(size: u64, lanes: usize) -> Vec<(u64, u64)> {
    let lanes = lanes.max(1) as u64;
    let base = size / lanes;
    let mut pieces = Vec::with_capacity(lanes as usize);
    let mut offset = 0u64;
    for i in 0..lanes {
        let len = if i == lanes - 1 { size - offset } else { base };
        pieces.push((offset, len));
        offset += len;
    }
    pieces
}

/// Uploads a local file to `remote_path`. Returns the byte count shipped.
pub async fn upload(
    fs: &Filesystem,
    token: &CancellationToken,
    local_path: &Path,
    remote_path: &str,
    opts: &TransferOptions,
) -> Result<u64> {
    let meta = tokio::fs::metadata(local_path)
        .await
        .map_err(|e| IrodsError::Local {
            op: "stat source file",
            source: e,
        })?;
    let size = meta.len();

    let mut primary = open_for_upload(fs, token, remote_path, opts.exclusive).await?;

    let capacity = 1 + fs.pool().free_capacity();
    let lanes = lane_count(
        opts.lanes,
        capacity,
        size,
        opts.buffer_size,
        opts.min_range_size,
    );
    debug!("uploading {size} bytes over {lanes} lane(s)");

    let result = if lanes <= 1 {
        write_range_through(
            &mut primary,
            token,
            local_path,
            0,
            size,
            opts.buffer_size,
        )
        .await
    } else {
        parallel_upload(
            fs,
            token,
            &mut primary,
            local_path,
            remote_path,
            size,
            lanes,
            opts.buffer_size,
        )
        .await
    };

    match result {
        Ok(()) => {
            if opts.sync_mtime {
                let mtime = meta
                    .modified()
                    .ok()
                    .and_then(|t| t.duration_since(UNIX_EPOCH).ok())
                    .map(|d| d.as_secs() as i64);
                fs.touch(token, remote_path, mtime).await?;
            }
            primary.close(token).await?;
            if opts.verify_checksum {
                checksum::verify(fs, token, local_path, remote_path).await?;
            }
            Ok(size)
        },
        Err(e) => {
            teardown_upload(fs, token, primary, remote_path).await;
            Err(e)
        },
    }
}

/// Downloads `remote_path` into a local file. Returns the byte count.
pub async fn download(
    fs: &Filesystem,
    token: &CancellationToken,
    remote_path: &str,
    local_path: &Path,
    opts: &TransferOptions,
) -> Result<u64> {
    let mut primary = fs
        .open(token, remote_path, OpenFlags::READ_ONLY, KeyValPair::new())
        .await?;

    // The object size is discovered on the open descriptor.
    let size = primary.seek(token, 0, whence::SEEK_END).await?.max(0) as u64;
    primary.seek(token, 0, whence::SEEK_SET).await?;

    let sink = File::create(local_path)
        .await
        .map_err(|e| IrodsError::Local {
            op: "create sink file",
            source: e,
        })?;
    sink.set_len(size).await.map_err(|e| IrodsError::Local {
        op: "size sink file",
        source: e,
    })?;
    drop(sink);

    let capacity = 1 + fs.pool().free_capacity();
    let lanes = lane_count(
        opts.lanes,
        capacity,
        size,
        opts.buffer_size,
        opts.min_range_size,
    );
    debug!("downloading {size} bytes over {lanes} lane(s)");

    let result = if lanes <= 1 {
        read_range_through(
            &mut primary,
            token,
            local_path,
            0,
            size,
            opts.buffer_size,
        )
        .await
    } else {
        parallel_download(
            fs,
            token,
            &mut primary,
            local_path,
            remote_path,
            size,
            lanes,
            opts.buffer_size,
        )
        .await
    };

    match result {
        Ok(()) => {
            primary.close(token).await?;
            if opts.sync_mtime {
                sync_local_mtime(fs, token, remote_path, local_path).await?;
            }
            if opts.verify_checksum {
                checksum::verify(fs, token, local_path, remote_path).await?;
            }
            Ok(size)
        },
        Err(e) => {
            let _ = primary.close(token).await;
            let _ = tokio::fs::remove_file(local_path).await;
            Err(e)
        },
    }
}

/// Opens the upload target write-only/truncate/create. A hierarchy error
/// means a previous upload left a replica stranded on an unreachable
/// resource: the object is renamed aside and the create retried exclusively.
async fn open_for_upload(
    fs: &Filesystem,
    token: &CancellationToken,
    remote_path: &str,
    exclusive: bool,
) -> Result<FileHandle> {
    let mut flags = OpenFlags::WRITE_ONLY | OpenFlags::CREATE | OpenFlags::TRUNCATE;
    if exclusive {
        flags |= OpenFlags::EXCL;
    }
    match fs
        .open(token, remote_path, flags, KeyValPair::new())
        .await
    {
        Ok(handle) => Ok(handle),
        Err(e) if e.is_hierarchy_error() => {
            let aside = format!("{remote_path}.bad");
            warn!("hierarchy error opening {remote_path}, renaming to {aside}");
            fs.rename(token, remote_path, &aside, false).await?;
            fs.open(
                token,
                remote_path,
                flags | OpenFlags::EXCL,
                KeyValPair::new(),
            )
            .await
        },
        Err(e) => Err(e),
    }
}

#[allow(clippy::too_many_arguments)]
async fn parallel_upload(
    fs: &Filesystem,
    token: &CancellationToken,
    primary: &mut FileHandle,
    local_path: &Path,
    remote_path: &str,
    size: u64,
    lanes: usize,
    buffer_size: usize,
) -> Result<()> {
    primary.descriptor_info(token).await?;
    let reopen_options = primary.reopen_options()?;
    let pieces = partition(size, lanes);

    let sub = Arc::new(fs.pool().reserve(lanes - 1)?);
    let mut set: JoinSet<Result<()>> = JoinSet::new();
    for (offset, len) in pieces.iter().skip(1).copied() {
        set.spawn(upload_lane(
            sub.clone(),
            token.clone(),
            local_path.to_path_buf(),
            remote_path.to_string(),
            reopen_options.clone(),
            offset,
            len,
            buffer_size,
        ));
    }

    let (first_offset, first_len) = pieces[0];
    let mut first_err = write_range_through(
        primary,
        token,
        local_path,
        first_offset,
        first_len,
        buffer_size,
    )
    .await
    .err();

    while let Some(joined) = set.join_next().await {
        let lane_result = joined.unwrap_or_else(|e| {
            Err(IrodsError::Protocol(format!("transfer lane panicked: {e}")))
        });
        if let (None, Err(e)) = (&first_err, lane_result) {
            first_err = Some(e);
        }
    }

    let close_result = sub.close().await;
    if let (None, Err(e)) = (&first_err, close_result) {
        first_err = Some(e);
    }
    first_err.map_or(Ok(()), Err)
}

/// One secondary upload lane: reopen on a reserved session, seek to the
/// piece, ship it in buffer-sized writes, replica-close.
#[allow(clippy::too_many_arguments)]
async fn upload_lane(
    sub: Arc<Pool>,
    token: CancellationToken,
    local_path: PathBuf,
    remote_path: String,
    reopen_options: KeyValPair,
    offset: u64,
    len: u64,
    buffer_size: usize,
) -> Result<()> {
    let conn = sub.acquire(&token).await?;
    let mut handle = FileHandle::open_on(
        conn,
        &token,
        &remote_path,
        OpenFlags::WRITE_ONLY,
        reopen_options,
        true,
    )
    .await?;
    let res = async {
        handle.seek(&token, offset as i64, whence::SEEK_SET).await?;
        let mut source = File::open(&local_path)
            .await
            .map_err(|e| IrodsError::Local {
                op: "open source file",
                source: e,
            })?;
        source
            .seek(SeekFrom::Start(offset))
            .await
            .map_err(|e| IrodsError::Local {
                op: "seek source file",
                source: e,
            })?;
        copy_to_remote(&mut source, &mut handle, &token, len, buffer_size).await
    }
    .await;
    match res {
        Ok(()) => handle.close(&token).await,
        Err(e) => {
            let _ = handle.close(&token).await;
            Err(e)
        },
    }
}

#[allow(clippy::too_many_arguments)]
async fn parallel_download(
    fs: &Filesystem,
    token: &CancellationToken,
    primary: &mut FileHandle,
    local_path: &Path,
    remote_path: &str,
    size: u64,
    lanes: usize,
    buffer_size: usize,
) -> Result<()> {
    primary.descriptor_info(token).await?;
    let reopen_options = primary.reopen_options()?;
    let pieces = partition(size, lanes);

    let sub = Arc::new(fs.pool().reserve(lanes - 1)?);
    let mut set: JoinSet<Result<()>> = JoinSet::new();
    for (offset, len) in pieces.iter().skip(1).copied() {
        set.spawn(download_lane(
            sub.clone(),
            token.clone(),
            local_path.to_path_buf(),
            remote_path.to_string(),
            reopen_options.clone(),
            offset,
            len,
            buffer_size,
        ));
    }

    let (first_offset, first_len) = pieces[0];
    let mut first_err = read_range_through(
        primary,
        token,
        local_path,
        first_offset,
        first_len,
        buffer_size,
    )
    .await
    .err();

    while let Some(joined) = set.join_next().await {
        let lane_result = joined.unwrap_or_else(|e| {
            Err(IrodsError::Protocol(format!("transfer lane panicked: {e}")))
        });
        if let (None, Err(e)) = (&first_err, lane_result) {
            first_err = Some(e);
        }
    }

    let close_result = sub.close().await;
    if let (None, Err(e)) = (&first_err, close_result) {
        first_err = Some(e);
    }
    first_err.map_or(Ok(()), Err)
}

#[allow(clippy::too_many_arguments)]
async fn download_lane(
    sub: Arc<Pool>,
    token: CancellationToken,
    local_path: PathBuf,
    remote_path: String,
    reopen_options: KeyValPair,
    offset: u64,
    len: u64,
    buffer_size: usize,
) -> Result<()> {
    let conn = sub.acquire(&token).await?;
    let mut handle = FileHandle::open_on(
        conn,
        &token,
        &remote_path,
        OpenFlags::READ_ONLY,
        reopen_options,
        true,
    )
    .await?;
    let res = async {
        handle.seek(&token, offset as i64, whence::SEEK_SET).await?;
        let mut sink = File::options()
            .write(true)
            .open(&local_path)
            .await
            .map_err(|e| IrodsError::Local {
                op: "open sink file",
                source: e,
            })?;
        sink.seek(SeekFrom::Start(offset))
            .await
            .map_err(|e| IrodsError::Local {
                op: "seek sink file",
                source: e,
            })?;
        copy_from_remote(&mut handle, &mut sink, &token, len, buffer_size).await
    }
    .await;
    match res {
        Ok(()) => handle.close(&token).await,
        Err(e) => {
            let _ = handle.close(&token).await;
            Err(e)
        },
    }
}

/// Primary-lane upload: seek only when the piece does not start at zero.
async fn write_range_through(
    handle: &mut FileHandle,
    token: &CancellationToken,
    local_path: &Path,
    offset: u64,
    len: u64,
    buffer_size: usize,
) -> Result<()> {
    if offset > 0 {
        handle.seek(token, offset as i64, whence::SEEK_SET).await?;
    }
    let mut source = File::open(local_path)
        .await
        .map_err(|e| IrodsError::Local {
            op: "open source file",
            source: e,
        })?;
    if offset > 0 {
        source
            .seek(SeekFrom::Start(offset))
            .await
            .map_err(|e| IrodsError::Local {
                op: "seek source file",
                source: e,
            })?;
    }
    copy_to_remote(&mut source, handle, token, len, buffer_size).await
}

async fn read_range_through(
    handle: &mut FileHandle,
    token: &CancellationToken,
    local_path: &Path,
    offset: u64,
    len: u64,
    buffer_size: usize,
) -> Result<()> {
    if offset > 0 {
        handle.seek(token, offset as i64, whence::SEEK_SET).await?;
    }
    let mut sink = File::options()
        .write(true)
        .open(local_path)
        .await
        .map_err(|e| IrodsError::Local {
            op: "open sink file",
            source: e,
        })?;
    if offset > 0 {
        sink.seek(SeekFrom::Start(offset))
            .await
            .map_err(|e| IrodsError::Local {
                op: "seek sink file",
                source: e,
            })?;
    }
    copy_from_remote(handle, &mut sink, token, len, buffer_size).await
}

async fn copy_to_remote(
    source: &mut File,
    handle: &mut FileHandle,
    token: &CancellationToken,
    len: u64,
    buffer_size: usize,
) -> Result<()> {
    let mut buf = vec![0u8; buffer_size.min(len.max(1) as usize)];
    let mut remaining = len;
    while remaining > 0 {
        let n = (buffer_size as u64).min(remaining) as usize;
        source
            .read_exact(&mut buf[..n])
            .await
            .map_err(|e| IrodsError::Local {
                op: "read source file",
                source: e,
            })?;
        handle.write(token, &buf[..n]).await?;
        remaining -= n as u64;
    }
    Ok(())
}

async fn copy_from_remote(
    handle: &mut FileHandle,
    sink: &mut File,
    token: &CancellationToken,
    len: u64,
    buffer_size: usize,
) -> Result<()> {
    let mut buf = BytesMut::with_capacity(buffer_size.min(len.max(1) as usize));
    let mut remaining = len;
    while remaining > 0 {
        let want = (buffer_size as u64).min(remaining) as usize;
        let n = handle.read(token, &mut buf, want).await?;
        if n == 0 {
            return Err(IrodsError::Protocol(format!(
                "short read: {remaining} bytes missing"
            )));
        }
        sink.write_all(&buf[..n])
            .await
            .map_err(|e| IrodsError::Local {
                op: "write sink file",
                source: e,
            })?;
        remaining -= n as u64;
    }
    sink.flush().await.map_err(|e| IrodsError::Local {
        op: "flush sink file",
        source: e,
    })
}

async fn teardown_upload(
    fs: &Filesystem,
    token: &CancellationToken,
    primary: FileHandle,
    remote_path: &str,
) {
    if let Err(e) = primary.close(token).await {
        warn!("teardown close failed: {e}");
    }
    if let Err(e) = fs.remove_data_object(token, remote_path, true).await {
        warn!("teardown unlink of {remote_path} failed: {e}");
    }
}

/// Syncs the local file's mtime from the catalog record.
async fn sync_local_mtime(
    fs: &Filesystem,
    token: &CancellationToken,
    remote_path: &str,
    local_path: &Path,
) -> Result<()> {
    let stat = fs.stat(token, remote_path).await?;
    if stat.modify_time <= 0 {
        return Ok(());
    }
    let mtime = UNIX_EPOCH + Duration::from_secs(stat.modify_time as u64);
    let file = std::fs::File::options()
        .write(true)
        .open(local_path)
        .map_err(|e| IrodsError::Local {
            op: "open sink file",
            source: e,
        })?;
    file.set_modified(mtime).map_err(|e| IrodsError::Local {
        op: "set sink mtime",
        source: e,
    })
}
