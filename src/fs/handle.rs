// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2012-2025 Andrei Maltsev

use bytes::BytesMut;
use tokio_util::sync::CancellationToken;

use crate::{
    client::pool::PooledConn,
    error::{IrodsError, Result},
    models::{
        api::{
            DATA_OBJ_CLOSE_AN, DATA_OBJ_LSEEK_AN, DATA_OBJ_OPEN_AN, DATA_OBJ_READ_AN,
            DATA_OBJ_WRITE_AN, GET_FILE_DESCRIPTOR_INFO_APN, REPLICA_CLOSE_APN,
        },
        data_obj::{
            DataObjInp, FileLseekOut, KeyValPair, OpenFlags, OpenedDataObjInp, keyword,
        },
        descriptor::{DescriptorInfo, FdRequest, ReplicaCloseInput},
    },
};

/// The replica a handle is bound to; reopens target it explicitly so
/// parallel lanes never fork onto a different replica.
#[derive(Debug, Clone)]
pub struct ReplicaInfo {
    pub replica_number: i32,
    pub resource_hierarchy: String,
}

/// An open data object on one pooled session. The descriptor is only valid
/// on the session it was opened through, so the handle owns its session for
/// its whole lifetime.
pub struct FileHandle {
    conn: PooledConn,
    fd: i32,
    path: String,
    replica: Option<ReplicaInfo>,
    /// Reopened lane handles must close via the replica-close API so only
    /// the primary close updates the catalog.
    use_replica_close: bool,
}

impl FileHandle {
    /// Opens `path` on the given session. `options` carries replica hints
    /// for reopens.
    pub async fn open_on(
        conn: PooledConn,
        token: &CancellationToken,
        path: &str,
        flags: OpenFlags,
        options: KeyValPair,
        use_replica_close: bool,
    ) -> Result<Self> {
        let mut inp = DataObjInp::open(path, flags);
        inp.cond_input = options;
        let reply = conn
            .request::<_, ()>(token, DATA_OBJ_OPEN_AN, &inp)
            .await?;
        let fd = reply.int_info;
        if fd < 3 {
            return Err(IrodsError::Protocol(format!(
                "implausible descriptor {fd} for {path}"
            )));
        }
        Ok(Self {
            conn,
            fd,
            path: path.to_string(),
            replica: None,
            use_replica_close,
        })
    }

    pub fn descriptor(&self) -> i32 {
        self.fd
    }

    pub fn path(&self) -> &str {
        &self.path
    }

    pub fn replica(&self) -> Option<&ReplicaInfo> {
        self.replica.as_ref()
    }

    /// Reads up to `len` bytes into `buf` (resized to fit up front so the
    /// codec never reallocates). Returns the byte count reported by the
    /// server; zero means end of data.
    pub async fn read(
        &mut self,
        token: &CancellationToken,
        buf: &mut BytesMut,
        len: usize,
    ) -> Result<usize> {
        buf.resize(len, 0);
        let inp = OpenedDataObjInp::io(self.fd, len as i32);
        let reply = self
            .conn
            .request_with_buffers::<_, ()>(token, DATA_OBJ_READ_AN, &inp, &[], Some(buf))
            .await?;
        let n = reply.int_info.max(0) as usize;
        buf.truncate(n);
        Ok(n)
    }

    /// Writes the whole buffer as one ranged write RPC.
    pub async fn write(&mut self, token: &CancellationToken, data: &[u8]) -> Result<()> {
        let inp = OpenedDataObjInp::io(self.fd, data.len() as i32);
        self.conn
            .request_with_buffers::<_, ()>(token, DATA_OBJ_WRITE_AN, &inp, data, None)
            .await?;
        Ok(())
    }

    /// Seeks and returns the resulting absolute offset.
    pub async fn seek(
        &mut self,
        token: &CancellationToken,
        offset: i64,
        whence: i32,
    ) -> Result<i64> {
        let inp = OpenedDataObjInp::seek(self.fd, offset, whence);
        let reply = self
            .conn
            .request::<_, FileLseekOut>(token, DATA_OBJ_LSEEK_AN, &inp)
            .await?;
        Ok(reply.body.offset)
    }

    /// Queries the server for the replica this descriptor is bound to and
    /// caches the answer on the handle.
    pub async fn descriptor_info(
        &mut self,
        token: &CancellationToken,
    ) -> Result<ReplicaInfo> {
        let reply = self
            .conn
            .request::<_, DescriptorInfo>(
                token,
                GET_FILE_DESCRIPTOR_INFO_APN,
                &FdRequest { fd: self.fd },
            )
            .await?;
        let info = ReplicaInfo {
            replica_number: reply.body.data_object_info.replica_number,
            resource_hierarchy: reply.body.data_object_info.resource_hierarchy,
        };
        self.replica = Some(info.clone());
        Ok(info)
    }

    /// Condition-input options directing a reopen at this handle's replica.
    pub fn reopen_options(&self) -> Result<KeyValPair> {
        let replica = self.replica.as_ref().ok_or_else(|| {
            IrodsError::Protocol(
                "descriptor info has not been fetched for this handle".to_string(),
            )
        })?;
        let mut kv = KeyValPair::new();
        kv.set(keyword::RESC_HIER, &replica.resource_hierarchy);
        kv.set(keyword::REPL_NUM, &replica.replica_number.to_string());
        Ok(kv)
    }

    /// Closes the descriptor and releases the session back to its pool.
    pub async fn close(mut self, token: &CancellationToken) -> Result<()> {
        let res = if self.use_replica_close {
            self.conn
                .request::<_, ()>(
                    token,
                    REPLICA_CLOSE_APN,
                    &ReplicaCloseInput::silent(self.fd),
                )
                .await
                .map(|_| ())
        } else {
            let inp = OpenedDataObjInp::descriptor(self.fd);
            self.conn
                .request::<_, ()>(token, DATA_OBJ_CLOSE_AN, &inp)
                .await
                .map(|_| ())
        };
        self.fd = -1;
        res
    }
}
