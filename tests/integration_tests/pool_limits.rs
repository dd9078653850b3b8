// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2012-2025 Andrei Maltsev

use std::{sync::Arc, time::Duration};

use anyhow::Result;
use irods_client_rs::{
    client::{auth::AuthEnv, pool::Pool},
    error::IrodsError,
};
use tokio::time::timeout;
use tokio_util::sync::CancellationToken;

use crate::integration_tests::common::{spawn_data_server, test_config};

/// MaxConns=1: a second caller blocks until the first returns its handle,
/// then receives the very same session.
#[tokio::test]
async fn test_exhausted_pool_unblocks_on_return() -> Result<()> {
    let (addr, _state) = spawn_data_server().await?;
    let cfg = Arc::new(test_config(addr.port(), 1));
    let token = CancellationToken::new();

    let pool = Pool::new(cfg, AuthEnv::default()).await?;
    let first = pool.acquire(&token).await?;
    let first_session = first.connection().clone();

    let contender = {
        let pool = pool.clone();
        let token = token.clone();
        tokio::spawn(async move { pool.acquire(&token).await })
    };

    // The pool is saturated, so the contender must still be waiting.
    tokio::time::sleep(Duration::from_millis(100)).await;
    assert!(!contender.is_finished());

    drop(first);
    let second = timeout(Duration::from_secs(2), contender).await???;
    assert!(
        Arc::ptr_eq(&first_session, second.connection()),
        "the returned session must be handed to the waiter"
    );

    drop(second);
    pool.close().await?;
    Ok(())
}

/// Sub-pool reservation transfers capacity to the child and closing the
/// child restores it exactly.
#[tokio::test]
async fn test_subpool_capacity_accounting() -> Result<()> {
    let mut cfg = test_config(1, 3);
    cfg.pool.defer_connection_to_first_use = true;
    let pool = Pool::new(Arc::new(cfg), AuthEnv::default()).await?;

    assert_eq!(pool.free_capacity(), 3);
    assert!(matches!(
        pool.reserve(4).expect_err("over-reservation must fail"),
        IrodsError::PoolExhausted(_)
    ));

    let child = pool.reserve(2)?;
    assert_eq!(pool.max_conns(), 1);
    assert_eq!(pool.reserved_capacity(), 2);
    assert_eq!(child.max_conns(), 2);

    // Parent capacity is spoken for while the child lives.
    assert!(pool.reserve(2).is_err());

    child.close().await?;
    assert_eq!(pool.max_conns(), 3);
    assert_eq!(pool.reserved_capacity(), 0);
    assert_eq!(pool.free_capacity(), 3);

    // No leak, no double-count: the full capacity reserves again.
    let child = pool.reserve(3)?;
    child.close().await?;
    assert_eq!(pool.max_conns(), 3);

    pool.close().await?;
    Ok(())
}

/// The first dial failure is latched: later acquires fail fast with the
/// same error instead of re-dialing.
#[tokio::test]
async fn test_dial_error_is_latched() -> Result<()> {
    // Port 1: nothing listens there.
    let mut cfg = test_config(1, 2);
    cfg.pool.defer_connection_to_first_use = true;
    let token = CancellationToken::new();

    let pool = Pool::new(Arc::new(cfg), AuthEnv::default()).await?;
    let first = pool.acquire(&token).await.expect_err("dial must fail");
    assert!(matches!(first, IrodsError::DialLatched(_)));

    let second = pool.acquire(&token).await.expect_err("latched error");
    assert!(matches!(second, IrodsError::DialLatched(_)));

    pool.close().await?;
    Ok(())
}

/// A cancelled waiter leaves other callers untouched.
#[tokio::test]
async fn test_cancelled_waiter_does_not_disturb_pool() -> Result<()> {
    let (addr, _state) = spawn_data_server().await?;
    let cfg = Arc::new(test_config(addr.port(), 1));
    let token = CancellationToken::new();

    let pool = Pool::new(cfg, AuthEnv::default()).await?;
    let held = pool.acquire(&token).await?;

    let waiter_token = CancellationToken::new();
    let waiter = {
        let pool = pool.clone();
        let waiter_token = waiter_token.clone();
        tokio::spawn(async move { pool.acquire(&waiter_token).await })
    };
    tokio::time::sleep(Duration::from_millis(50)).await;
    waiter_token.cancel();
    let res = timeout(Duration::from_secs(2), waiter).await??;
    assert!(matches!(res, Err(IrodsError::Cancelled)));

    // The held session is unaffected and returns to the pool normally.
    drop(held);
    let again = pool.acquire(&token).await?;
    drop(again);
    pool.close().await?;
    Ok(())
}
