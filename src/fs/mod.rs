//! The filesystem-like façade: thin request/reply mappings over the pool.

// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2012-2025 Andrei Maltsev

/// Open data-object handles.
pub mod handle;

use std::sync::Arc;

use tokio_util::sync::CancellationToken;

use crate::{
    cfg::config::Config,
    client::{auth::AuthEnv, pool::Pool},
    error::{CAT_NO_ROWS_FOUND, Result, rounded_code},
    models::{
        api::{
            COLL_CREATE_AN, DATA_OBJ_CHKSUM_AN, DATA_OBJ_RENAME_AN, DATA_OBJ_UNLINK_AN,
            GEN_QUERY_AN, MOD_ACCESS_CONTROL_AN, MOD_AVU_METADATA_AN, OBJ_STAT_AN,
            RM_COLL_AN, TOUCH_APN,
        },
        collection::{CollInp, CollOprStat},
        data_obj::{DataObjCopyInp, DataObjInp, KeyValPair, OpenFlags, keyword},
        descriptor::{TouchInput, TouchOptions},
        query::{GenQueryInp, GenQueryOut},
        stat::{ModAccessControlInp, ModAvuMetadataInp, RodsObjStat, Str},
    },
};

pub use self::handle::{FileHandle, ReplicaInfo};

/// One attribute-value-unit metadata triple.
#[derive(Debug, Clone)]
pub struct Avu {
    pub attribute: String,
    pub value: String,
    pub unit: String,
}

/// Catalog object kind selector for metadata operations.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MetaTarget {
    DataObject,
    Collection,
}

impl MetaTarget {
    fn flag(self) -> &'static str {
        match self {
            MetaTarget::DataObject => "-d",
            MetaTarget::Collection => "-C",
        }
    }
}

/// The consumer-visible surface: filesystem-like operations mapped onto
/// request/reply pairs.
pub struct Filesystem {
    pool: Pool,
}

impl Filesystem {
    /// Builds the pool (dialing eagerly unless deferred) and wraps it.
    pub async fn connect(cfg: Arc<Config>, env: AuthEnv) -> Result<Self> {
        let pool = Pool::new(cfg, env).await?;
        Ok(Self { pool })
    }

    pub fn from_pool(pool: Pool) -> Self {
        Self { pool }
    }

    pub fn pool(&self) -> &Pool {
        &self.pool
    }

    pub async fn close(&self) -> Result<()> {
        self.pool.close().await
    }

    /// Catalog metadata of a path.
    pub async fn stat(
        &self,
        token: &CancellationToken,
        path: &str,
    ) -> Result<RodsObjStat> {
        let conn = self.pool.acquire(token).await?;
        let reply = conn
            .request::<_, RodsObjStat>(token, OBJ_STAT_AN, &DataObjInp::path_only(path))
            .await?;
        Ok(reply.body)
    }

    pub async fn make_collection(
        &self,
        token: &CancellationToken,
        path: &str,
    ) -> Result<()> {
        let conn = self.pool.acquire(token).await?;
        conn.request::<_, ()>(token, COLL_CREATE_AN, &CollInp::named(path))
            .await?;
        Ok(())
    }

    /// Removes a collection. The server may stream progress statistics
    /// (acknowledged inside the session); the final stat is surfaced.
    pub async fn remove_collection(
        &self,
        token: &CancellationToken,
        path: &str,
        recursive: bool,
        force: bool,
    ) -> Result<CollOprStat> {
        let mut inp = CollInp::named(path);
        if recursive {
            inp.cond_input.set(keyword::RECURSIVE_OPR, "");
        }
        if force {
            inp.cond_input.set(keyword::FORCE_FLAG, "");
        }
        let conn = self.pool.acquire(token).await?;
        let reply = conn
            .request::<_, CollOprStat>(token, RM_COLL_AN, &inp)
            .await?;
        Ok(reply.body)
    }

    pub async fn rename(
        &self,
        token: &CancellationToken,
        src: &str,
        dst: &str,
        collection: bool,
    ) -> Result<()> {
        let conn = self.pool.acquire(token).await?;
        conn.request::<_, ()>(
            token,
            DATA_OBJ_RENAME_AN,
            &DataObjCopyInp::rename(src, dst, collection),
        )
        .await?;
        Ok(())
    }

    pub async fn remove_data_object(
        &self,
        token: &CancellationToken,
        path: &str,
        force: bool,
    ) -> Result<()> {
        let mut inp = DataObjInp::path_only(path);
        if force {
            inp.cond_input.set(keyword::FORCE_FLAG, "");
        }
        let conn = self.pool.acquire(token).await?;
        conn.request::<_, ()>(token, DATA_OBJ_UNLINK_AN, &inp)
            .await?;
        Ok(())
    }

    /// Sets the catalog mtime of a path; `seconds` defaults to "now" on the
    /// server when absent.
    pub async fn touch(
        &self,
        token: &CancellationToken,
        path: &str,
        seconds: Option<i64>,
    ) -> Result<()> {
        let inp = TouchInput {
            logical_path: path.to_string(),
            options: TouchOptions {
                seconds_since_epoch: seconds,
                no_create: true,
            },
        };
        let conn = self.pool.acquire(token).await?;
        conn.request::<_, ()>(token, TOUCH_APN, &inp).await?;
        Ok(())
    }

    /// Asks the server for (or to compute) the object checksum, returned in
    /// its catalog form, e.g. `sha2:<base64>`.
    pub async fn checksum(
        &self,
        token: &CancellationToken,
        path: &str,
    ) -> Result<String> {
        let conn = self.pool.acquire(token).await?;
        let reply = conn
            .request::<_, Str>(token, DATA_OBJ_CHKSUM_AN, &DataObjInp::path_only(path))
            .await?;
        Ok(reply.body.value)
    }

    pub async fn add_metadata(
        &self,
        token: &CancellationToken,
        target: MetaTarget,
        path: &str,
        avu: &Avu,
    ) -> Result<()> {
        self.mod_metadata(token, "add", target, path, avu).await
    }

    pub async fn remove_metadata(
        &self,
        token: &CancellationToken,
        target: MetaTarget,
        path: &str,
        avu: &Avu,
    ) -> Result<()> {
        self.mod_metadata(token, "rm", target, path, avu).await
    }

    async fn mod_metadata(
        &self,
        token: &CancellationToken,
        operation: &str,
        target: MetaTarget,
        path: &str,
        avu: &Avu,
    ) -> Result<()> {
        let inp = ModAvuMetadataInp::new(
            operation,
            target.flag(),
            path,
            &avu.attribute,
            &avu.value,
            &avu.unit,
        );
        let conn = self.pool.acquire(token).await?;
        conn.request::<_, ()>(token, MOD_AVU_METADATA_AN, &inp)
            .await?;
        Ok(())
    }

    /// Grants or revokes access; `level` is a catalog access level such as
    /// `read`, `write`, `own` or `null`.
    pub async fn set_access(
        &self,
        token: &CancellationToken,
        path: &str,
        level: &str,
        user: &str,
        zone: &str,
        recursive: bool,
    ) -> Result<()> {
        let inp = ModAccessControlInp {
            recursive,
            access_level: level.to_string(),
            user_name: user.to_string(),
            zone: zone.to_string(),
            path: path.to_string(),
        };
        let conn = self.pool.acquire(token).await?;
        conn.request::<_, ()>(token, MOD_ACCESS_CONTROL_AN, &inp)
            .await?;
        Ok(())
    }

    /// One GenQuery page. `CAT_NO_ROWS_FOUND` degrades to an empty page
    /// rather than an error.
    pub async fn query(
        &self,
        token: &CancellationToken,
        inp: &GenQueryInp,
    ) -> Result<GenQueryOut> {
        let conn = self.pool.acquire(token).await?;
        match conn.request::<_, GenQueryOut>(token, GEN_QUERY_AN, inp).await {
            Ok(reply) => Ok(reply.body),
            Err(e) if e.code().map(rounded_code) == Some(CAT_NO_ROWS_FOUND) => {
                Ok(GenQueryOut::default())
            },
            Err(e) => Err(e),
        }
    }

    /// Opens a data object on a session acquired from the pool.
    pub async fn open(
        &self,
        token: &CancellationToken,
        path: &str,
        flags: OpenFlags,
        options: KeyValPair,
    ) -> Result<FileHandle> {
        let conn = self.pool.acquire(token).await?;
        FileHandle::open_on(conn, token, path, flags, options, false).await
    }
}

impl Filesystem {
    /// Existence probe built on `stat`.
    pub async fn exists(&self, token: &CancellationToken, path: &str) -> Result<bool> {
        match self.stat(token, path).await {
            Ok(_) => Ok(true),
            Err(e) if e.is_not_found() => Ok(false),
            Err(e) => Err(e),
        }
    }
}

