// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2012-2025 Andrei Maltsev

//! Bounded multiplexing of callers over long-lived authenticated sessions.
//!
//! Sessions live in an insertion-ordered list owned by the pool; the idle
//! FIFO holds the subset no caller currently uses. The mutex guards only
//! bookkeeping and is never held across I/O: dialing and closing happen
//! outside the lock. Parent/child capacity transfers take the parent lock
//! first, then the child's.

use std::{
    collections::VecDeque,
    ops::Deref,
    sync::{Arc, Mutex, MutexGuard},
};

use tokio::sync::Notify;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use crate::{
    cfg::config::Config,
    client::{auth::AuthEnv, conn::Connection},
    error::{IrodsError, Result},
};

#[derive(Debug)]
struct PoolState {
    max_conns: usize,
    in_use: usize,
    dialing: usize,
    idle: VecDeque<Arc<Connection>>,
    /// Every live session, in creation order; `Close` walks it.
    all: Vec<Arc<Connection>>,
    dial_error: Option<Arc<IrodsError>>,
    closed: bool,
    /// Capacity currently lent to child pools.
    reserved: usize,
    rotate_idx: usize,
}

#[derive(Debug)]
struct PoolShared {
    cfg: Arc<Config>,
    env: AuthEnv,
    state: Mutex<PoolState>,
    notify: Notify,
    parent: Option<Arc<PoolShared>>,
    /// For child pools, the capacity to hand back on close.
    reservation: usize,
}

impl PoolShared {
    fn lock(&self) -> MutexGuard<'_, PoolState> {
        self.state.lock().expect("pool mutex poisoned")
    }

    fn should_discard(&self, conn: &Connection) -> bool {
        if conn.is_stale() {
            return true;
        }
        let age_limit = self.cfg.pool.discard_connection_age;
        !age_limit.is_zero() && conn.age() > age_limit
    }

    fn remove_from_all(state: &mut PoolState, conn: &Arc<Connection>) {
        state.all.retain(|c| !Arc::ptr_eq(c, conn));
    }

    fn close_in_background(conn: Arc<Connection>) {
        if let Ok(handle) = tokio::runtime::Handle::try_current() {
            handle.spawn(async move {
                let _ = conn.close().await;
            });
        } else {
            // No runtime (late drop): the transport closes with the socket.
            conn.abort();
        }
    }

    /// Return path for handles. Inspects error counters and age before the
    /// session may rejoin the idle FIFO.
    fn release(self: &Arc<Self>, conn: Arc<Connection>, exclusive: bool) {
        let mut state = self.lock();
        if exclusive {
            state.in_use -= 1;
        }
        let discard = state.closed || self.should_discard(&conn);
        if discard {
            Self::remove_from_all(&mut state, &conn);
            state.idle.retain(|c| !Arc::ptr_eq(c, &conn));
            drop(state);
            debug!("discarding session on return");
            Self::close_in_background(conn);
        } else if exclusive {
            state.idle.push_back(conn);
            drop(state);
        } else {
            drop(state);
        }
        self.notify.notify_one();
    }
}

enum Acquired {
    Exclusive(Arc<Connection>),
    Shared(Arc<Connection>),
    Dial,
    Wait,
}

/// A bounded pool of authenticated sessions. Cloning yields another handle
/// to the same pool; [`Pool::reserve`] carves out a child with its own
/// capacity.
#[derive(Clone, Debug)]
pub struct Pool {
    shared: Arc<PoolShared>,
}

impl Pool {
    /// Creates the pool and, unless `DeferConnectionToFirstUse` is set,
    /// dials one session eagerly so configuration and credential problems
    /// surface immediately.
    pub async fn new(cfg: Arc<Config>, env: AuthEnv) -> Result<Self> {
        let pool = Self {
            shared: Arc::new(PoolShared {
                state: Mutex::new(PoolState {
                    max_conns: cfg.pool.max_conns as usize,
                    in_use: 0,
                    dialing: 0,
                    idle: VecDeque::new(),
                    all: Vec::new(),
                    dial_error: None,
                    closed: false,
                    reserved: 0,
                    rotate_idx: 0,
                }),
                notify: Notify::new(),
                parent: None,
                reservation: 0,
                cfg,
                env,
            }),
        };
        if !pool.shared.cfg.pool.defer_connection_to_first_use {
            let conn = Arc::new(
                Connection::connect(pool.shared.cfg.clone(), &pool.shared.env).await?,
            );
            let mut state = pool.shared.lock();
            state.all.push(conn.clone());
            state.idle.push_back(conn);
        }
        Ok(pool)
    }

    /// Checks a session out. Blocks when the pool is saturated, unless
    /// `AllowConcurrentUse` rotates a busy session instead (its write lock
    /// still serialises wire traffic).
    pub async fn acquire(&self, token: &CancellationToken) -> Result<PooledConn> {
        loop {
            let action = self.try_acquire()?;
            match action {
                Acquired::Exclusive(conn) => {
                    return Ok(PooledConn {
                        shared: self.shared.clone(),
                        conn: Some(conn),
                        exclusive: true,
                    });
                },
                Acquired::Shared(conn) => {
                    return Ok(PooledConn {
                        shared: self.shared.clone(),
                        conn: Some(conn),
                        exclusive: false,
                    });
                },
                Acquired::Dial => return self.dial_one().await,
                Acquired::Wait => {
                    tokio::select! {
                        _ = self.shared.notify.notified() => {},
                        _ = token.cancelled() => return Err(IrodsError::Cancelled),
                    }
                },
            }
        }
    }

    fn try_acquire(&self) -> Result<Acquired> {
        let mut to_close = Vec::new();
        let action = {
            let mut state = self.shared.lock();
            if state.closed {
                return Err(IrodsError::PoolClosed);
            }
            if let Some(err) = &state.dial_error {
                return Err(IrodsError::DialLatched(err.clone()));
            }

            let mut picked = None;
            while let Some(conn) = state.idle.pop_front() {
                if self.shared.should_discard(&conn) {
                    PoolShared::remove_from_all(&mut state, &conn);
                    to_close.push(conn);
                    continue;
                }
                picked = Some(conn);
                break;
            }

            if let Some(conn) = picked {
                state.in_use += 1;
                Acquired::Exclusive(conn)
            } else if state.all.len() + state.dialing < state.max_conns {
                state.dialing += 1;
                Acquired::Dial
            } else if self.shared.cfg.pool.allow_concurrent_use && !state.all.is_empty()
            {
                let idx = state.rotate_idx % state.all.len();
                state.rotate_idx = state.rotate_idx.wrapping_add(1);
                Acquired::Shared(state.all[idx].clone())
            } else {
                Acquired::Wait
            }
        };
        for conn in to_close {
            debug!("discarding idle session before hand-out");
            PoolShared::close_in_background(conn);
        }
        Ok(action)
    }

    /// Dials outside the lock; the first failure is latched so later
    /// acquires fail fast instead of hammering the server.
    async fn dial_one(&self) -> Result<PooledConn> {
        let dialed =
            Connection::connect(self.shared.cfg.clone(), &self.shared.env).await;
        let mut state = self.shared.lock();
        state.dialing -= 1;
        match dialed {
            Ok(conn) => {
                if state.closed {
                    drop(state);
                    PoolShared::close_in_background(Arc::new(conn));
                    return Err(IrodsError::PoolClosed);
                }
                let conn = Arc::new(conn);
                state.all.push(conn.clone());
                state.in_use += 1;
                Ok(PooledConn {
                    shared: self.shared.clone(),
                    conn: Some(conn),
                    exclusive: true,
                })
            },
            Err(e) => {
                let latched = Arc::new(e);
                state.dial_error = Some(latched.clone());
                drop(state);
                self.shared.notify.notify_one();
                Err(IrodsError::DialLatched(latched))
            },
        }
    }

    /// Capacity currently available for reservation or dialing.
    pub fn free_capacity(&self) -> usize {
        let state = self.shared.lock();
        state.max_conns.saturating_sub(state.in_use + state.dialing)
    }

    pub fn max_conns(&self) -> usize {
        self.shared.lock().max_conns
    }

    /// Capacity currently lent out to child pools.
    pub fn reserved_capacity(&self) -> usize {
        self.shared.lock().reserved
    }

    /// Carves `k` sessions' worth of capacity out of this pool into a child.
    /// Idle sessions move over immediately; the rest are dialed by the child
    /// on demand. Closing the child restores the capacity.
    pub fn reserve(&self, k: usize) -> Result<Pool> {
        let mut to_close = Vec::new();
        let child = {
            let mut state = self.shared.lock();
            if state.closed {
                return Err(IrodsError::PoolClosed);
            }
            let free = state.max_conns.saturating_sub(state.in_use + state.dialing);
            if k > free {
                return Err(IrodsError::PoolExhausted(format!(
                    "reservation of {k} exceeds free capacity {free}"
                )));
            }
            state.max_conns -= k;
            state.reserved += k;

            let mut moved = Vec::new();
            while moved.len() < k {
                let Some(conn) = state.idle.pop_front() else { break };
                PoolShared::remove_from_all(&mut state, &conn);
                if self.shared.should_discard(&conn) {
                    to_close.push(conn);
                } else {
                    moved.push(conn);
                }
            }

            Pool {
                shared: Arc::new(PoolShared {
                    state: Mutex::new(PoolState {
                        max_conns: k,
                        in_use: 0,
                        dialing: 0,
                        idle: moved.iter().cloned().collect(),
                        all: moved,
                        dial_error: None,
                        closed: false,
                        reserved: 0,
                        rotate_idx: 0,
                    }),
                    notify: Notify::new(),
                    parent: Some(self.shared.clone()),
                    reservation: k,
                    cfg: self.shared.cfg.clone(),
                    env: self.shared.env.clone(),
                }),
            }
        };
        for conn in to_close {
            PoolShared::close_in_background(conn);
        }
        Ok(child)
    }

    /// Closes the pool. A child returns its sessions and capacity to the
    /// parent; a root closes every session in creation order, aggregating
    /// failures. Idempotent.
    pub async fn close(&self) -> Result<()> {
        if let Some(parent) = self.shared.parent.clone() {
            // Lock order: parent first, then child.
            let mut parent_state = parent.lock();
            let mut state = self.shared.lock();
            if state.closed {
                return Ok(());
            }
            state.closed = true;
            parent_state.max_conns += self.shared.reservation;
            parent_state.reserved -= self.shared.reservation;
            while let Some(conn) = state.idle.pop_front() {
                PoolShared::remove_from_all(&mut state, &conn);
                parent_state.all.push(conn.clone());
                parent_state.idle.push_back(conn);
            }
            drop(state);
            drop(parent_state);
            parent.notify.notify_one();
            return Ok(());
        }

        let sessions = {
            let mut state = self.shared.lock();
            if state.closed {
                return Ok(());
            }
            state.closed = true;
            state.idle.clear();
            std::mem::take(&mut state.all)
        };
        self.shared.notify.notify_waiters();

        let mut failures = Vec::new();
        for conn in sessions {
            if let Err(e) = conn.close().await {
                warn!("session close failed: {e}");
                failures.push(e);
            }
        }
        match failures.len() {
            0 => Ok(()),
            1 => Err(failures.swap_remove(0)),
            n => Err(IrodsError::Protocol(format!(
                "{n} sessions failed to close cleanly"
            ))),
        }
    }

    /// Periodic maintenance: drops idle sessions that went stale or exceeded
    /// the age threshold.
    pub fn maintain(&self) {
        let mut to_close = Vec::new();
        {
            let mut state = self.shared.lock();
            let keep: VecDeque<Arc<Connection>> = state
                .idle
                .drain(..)
                .filter(|conn| {
                    if self.shared.should_discard(conn) {
                        to_close.push(conn.clone());
                        false
                    } else {
                        true
                    }
                })
                .collect();
            state.idle = keep;
            for conn in &to_close {
                PoolShared::remove_from_all(&mut state, conn);
            }
        }
        for conn in to_close {
            debug!("maintenance discarding idle session");
            PoolShared::close_in_background(conn);
        }
        self.shared.notify.notify_one();
    }
}

/// A checked-out session. Dropping (or explicitly releasing) the handle
/// returns the session to the pool exactly once.
#[derive(Debug)]
pub struct PooledConn {
    shared: Arc<PoolShared>,
    conn: Option<Arc<Connection>>,
    exclusive: bool,
}

impl PooledConn {
    pub fn connection(&self) -> &Arc<Connection> {
        self.conn
            .as_ref()
            .expect("connection already released")
    }

    /// Explicit early return; equivalent to dropping the handle.
    pub fn release(mut self) {
        if let Some(conn) = self.conn.take() {
            self.shared.release(conn, self.exclusive);
        }
    }
}

impl Deref for PooledConn {
    type Target = Connection;

    fn deref(&self) -> &Self::Target {
        self.connection()
    }
}

impl Drop for PooledConn {
    fn drop(&mut self) {
        if let Some(conn) = self.conn.take() {
            self.shared.release(conn, self.exclusive);
        }
    }
}
