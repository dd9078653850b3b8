// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2012-2025 Andrei Maltsev

//! A single authenticated session. One request at a time: the transport
//! mutex is held from the first wire byte of a request to the last byte of
//! its reply, which is what gives concurrent callers a total order on wire
//! traffic.

use std::{
    sync::{
        Arc,
        atomic::{AtomicBool, AtomicU8, AtomicU32, Ordering},
    },
    time::{Duration, Instant},
};

use bytes::BytesMut;
use tokio::{sync::Mutex, time::timeout};
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use crate::{
    cfg::{config::Config, enums::ProtocolVariant},
    client::{
        auth::{self, AuthEnv},
        common::{Transport, io_with_timeout},
        handshake::Handshaker,
    },
    error::{IrodsError, Result, is_sql_error},
    models::{
        api::{
            ApiNumber, SYS_CLI_SVR_SENTINEL_MIN, SYS_CLI_TO_SVR_COLL_STAT_REPLY,
            SYS_SVR_TO_CLI_COLL_STAT,
        },
        common::{FromWire, ToWire},
        header::{MsgHeader, RODS_API_REPLY, RODS_API_REQ, RODS_DISCONNECT},
        message::{Frame, read_frame, write_frame},
        rerror::parse_error_segment,
        startup::ServerVersion,
    },
};

/// Session lifecycle, mirrored into an atomic for observers (the mutex is
/// what actually enforces it).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum SessionState {
    Ready = 0,
    InFlight = 1,
    Closed = 2,
}

/// A successful reply: the deserialised body plus the header's `intInfo`,
/// which carries integer results (descriptor numbers, byte counts) for some
/// APIs.
#[derive(Debug)]
pub struct Reply<T> {
    pub int_info: i32,
    pub body: T,
}

/// One authenticated connection to a catalog server.
#[derive(Debug)]
pub struct Connection {
    cfg: Arc<Config>,
    io: Mutex<Transport>,
    variant: ProtocolVariant,
    version: ServerVersion,
    native_password: String,
    client_signature: String,
    created_at: Instant,
    transport_errors: AtomicU32,
    sql_errors: AtomicU32,
    tls: bool,
    state: AtomicU8,
    closed: AtomicBool,
    /// Kill token: cancelling it makes any outstanding transport operation
    /// fail promptly, which is the only way to pre-empt an in-flight request.
    cancel: CancellationToken,
}

impl Connection {
    /// Dials, negotiates, optionally upgrades to TLS and authenticates.
    ///
    /// PAM schemes are rejected before any bytes hit the wire when the
    /// configuration cannot possibly yield an encrypted transport.
    pub async fn connect(cfg: Arc<Config>, env: &AuthEnv) -> Result<Self> {
        Self::connect_with_token(cfg, env, CancellationToken::new()).await
    }

    pub async fn connect_with_token(
        cfg: Arc<Config>,
        env: &AuthEnv,
        cancel: CancellationToken,
    ) -> Result<Self> {
        if cfg.auth.scheme.requires_tls()
            && (!cfg.ssl.negotiation.is_requested()
                || cfg.ssl.policy == crate::cfg::enums::CsNegPolicy::Refuse)
        {
            return Err(IrodsError::TlsRequired);
        }

        let mut h = Handshaker::dial(cfg.clone(), cancel.clone()).await?;
        let version = h.startup().await?;
        let outcome = auth::authenticate(&mut h, env).await?;

        let variant = cfg.connection.protocol;
        let tls = h.is_tls();
        Ok(Self {
            cfg,
            io: Mutex::new(h.into_transport()?),
            variant,
            version,
            native_password: outcome.native_password,
            client_signature: outcome.client_signature,
            created_at: Instant::now(),
            transport_errors: AtomicU32::new(0),
            sql_errors: AtomicU32::new(0),
            tls,
            state: AtomicU8::new(SessionState::Ready as u8),
            closed: AtomicBool::new(false),
            cancel,
        })
    }

    /// One request/reply round trip, without binary side channels.
    pub async fn request<Req: ToWire, Resp: FromWire>(
        &self,
        token: &CancellationToken,
        api: ApiNumber,
        body: &Req,
    ) -> Result<Reply<Resp>> {
        self.request_with_buffers(token, api, body, &[], None).await
    }

    /// One round trip with optional binary buffers. `req_bin` rides behind
    /// the request frame; `resp_bin`, when given, receives the reply's
    /// binary segment without an intermediate copy.
    pub async fn request_with_buffers<Req: ToWire, Resp: FromWire>(
        &self,
        token: &CancellationToken,
        api: ApiNumber,
        body: &Req,
        req_bin: &[u8],
        resp_bin: Option<&mut BytesMut>,
    ) -> Result<Reply<Resp>> {
        if self.closed.load(Ordering::SeqCst) || self.cancel.is_cancelled() {
            return Err(IrodsError::SessionClosed);
        }
        let body_bytes = body.to_wire(self.variant)?;

        let mut io = tokio::select! {
            guard = self.io.lock() => guard,
            _ = token.cancelled() => return Err(IrodsError::Cancelled),
        };
        self.state
            .store(SessionState::InFlight as u8, Ordering::SeqCst);

        let result = {
            let fut = self.round_trip(&mut io, api, &body_bytes, req_bin, resp_bin);
            tokio::pin!(fut);

            tokio::select! {
                res = &mut fut => res,
                _ = token.cancelled() => {
                    // Give a nearly-complete exchange a chance to land before
                    // sacrificing the transport.
                    debug!("request cancelled, waiting up to {:?} for the reply",
                        self.cfg.timeouts.cancel_grace);
                    match timeout(self.cfg.timeouts.cancel_grace, &mut fut).await {
                        Ok(res) => res,
                        Err(_) => {
                            self.cancel.cancel();
                            let _ = fut.await;
                            self.transport_errors.fetch_add(1, Ordering::SeqCst);
                            self.state
                                .store(SessionState::Closed as u8, Ordering::SeqCst);
                            return Err(IrodsError::Cancelled);
                        },
                    }
                },
            }
        };
        drop(io);

        self.state.store(
            if result.is_err() && self.cancel.is_cancelled() {
                SessionState::Closed as u8
            } else {
                SessionState::Ready as u8
            },
            Ordering::SeqCst,
        );

        let frame = result?;
        if frame.header.int_info < 0 {
            let code = frame.header.int_info;
            if is_sql_error(code) {
                self.sql_errors.fetch_add(1, Ordering::SeqCst);
            }
            let message =
                parse_error_segment(&frame.error, self.variant).unwrap_or_default();
            return Err(IrodsError::server(code, message));
        }

        Ok(Reply {
            int_info: frame.header.int_info,
            body: Resp::from_wire(&frame.body, self.variant)?,
        })
    }

    async fn round_trip(
        &self,
        io: &mut Transport,
        api: ApiNumber,
        body: &[u8],
        req_bin: &[u8],
        mut resp_bin: Option<&mut BytesMut>,
    ) -> Result<Frame> {
        let io_timeout = self.cfg.timeouts.io;
        let header = MsgHeader::new(
            RODS_API_REQ,
            body.len() as u32,
            0,
            req_bin.len() as u32,
            api,
        );
        let write = io_with_timeout(
            "write request",
            async {
                write_frame(&mut *io, &header, body, &[], req_bin)
                    .await
                    .map_err(|e| IrodsError::transport("write request", e))
            },
            io_timeout,
            &self.cancel,
        )
        .await;
        if let Err(e) = write {
            self.note_io_failure(&e);
            return Err(e);
        }

        let mut frame = match io_with_timeout(
            "read reply",
            read_frame(&mut *io, resp_bin.as_deref_mut()),
            io_timeout,
            &self.cancel,
        )
        .await
        {
            Ok(f) => f,
            Err(e) => {
                self.note_io_failure(&e);
                return Err(e);
            },
        };
        frame.header.expect_type(RODS_API_REPLY)?;

        if frame.header.int_info >= SYS_CLI_SVR_SENTINEL_MIN {
            if frame.header.int_info != SYS_SVR_TO_CLI_COLL_STAT {
                return Err(IrodsError::Protocol(format!(
                    "unexpected reply sentinel {}",
                    frame.header.int_info
                )));
            }
            // Streaming collection statistics: acknowledge, then the next
            // frame carries the real reply.
            frame = self.coll_stat_ack(io, resp_bin).await?;
        }

        Ok(frame)
    }

    async fn coll_stat_ack(
        &self,
        io: &mut Transport,
        resp_bin: Option<&mut BytesMut>,
    ) -> Result<Frame> {
        let io_timeout = self.cfg.timeouts.io;
        let ack = SYS_CLI_TO_SVR_COLL_STAT_REPLY.to_be_bytes();
        let write = io_with_timeout(
            "write coll-stat ack",
            async {
                use tokio::io::AsyncWriteExt;
                (&mut *io)
                    .write_all(&ack)
                    .await
                    .map_err(|e| IrodsError::transport("write coll-stat ack", e))?;
                (&mut *io)
                    .flush()
                    .await
                    .map_err(|e| IrodsError::transport("write coll-stat ack", e))
            },
            io_timeout,
            &self.cancel,
        )
        .await;
        if let Err(e) = write {
            self.note_io_failure(&e);
            return Err(e);
        }

        let frame = match io_with_timeout(
            "read coll-stat reply",
            read_frame(&mut *io, resp_bin),
            io_timeout,
            &self.cancel,
        )
        .await
        {
            Ok(f) => f,
            Err(e) => {
                self.note_io_failure(&e);
                return Err(e);
            },
        };
        frame.header.expect_type(RODS_API_REPLY)?;
        if frame.header.int_info >= SYS_CLI_SVR_SENTINEL_MIN {
            return Err(IrodsError::Protocol(format!(
                "nested reply sentinel {}",
                frame.header.int_info
            )));
        }
        Ok(frame)
    }

    fn note_io_failure(&self, err: &IrodsError) {
        if err.is_transport() || matches!(err, IrodsError::Cancelled) {
            self.transport_errors.fetch_add(1, Ordering::SeqCst);
        }
    }

    /// Writes the disconnect frame and tears the transport down. Idempotent;
    /// safe concurrently with an in-flight request because the transport
    /// mutex serialises the two.
    pub async fn close(&self) -> Result<()> {
        if self.closed.swap(true, Ordering::SeqCst) {
            return Ok(());
        }
        self.state
            .store(SessionState::Closed as u8, Ordering::SeqCst);

        let mut io = self.io.lock().await;
        if !self.cancel.is_cancelled() {
            let header = MsgHeader::new(RODS_DISCONNECT, 0, 0, 0, 0);
            let res = timeout(
                Duration::from_secs(5),
                write_frame(&mut *io, &header, &[], &[], &[]),
            )
            .await;
            if let Ok(Err(e)) = res {
                warn!("disconnect frame failed: {e}");
            }
        }
        use tokio::io::AsyncWriteExt;
        let _ = io.shutdown().await;
        self.cancel.cancel();
        Ok(())
    }

    /// Force-closes the transport without the disconnect courtesy. Any
    /// outstanding read fails promptly, releasing the request lock.
    pub fn abort(&self) {
        self.closed.store(true, Ordering::SeqCst);
        self.state
            .store(SessionState::Closed as u8, Ordering::SeqCst);
        self.cancel.cancel();
    }

    pub fn state(&self) -> SessionState {
        match self.state.load(Ordering::SeqCst) {
            0 => SessionState::Ready,
            1 => SessionState::InFlight,
            _ => SessionState::Closed,
        }
    }

    pub fn server_version(&self) -> ServerVersion {
        self.version
    }

    /// The password the challenge-response ran with; for PAM schemes this is
    /// the server-minted ephemeral.
    pub fn native_password(&self) -> &str {
        &self.native_password
    }

    /// Hex of the first 16 bytes of the most recent auth challenge.
    pub fn client_signature(&self) -> &str {
        &self.client_signature
    }

    pub fn is_tls(&self) -> bool {
        self.tls
    }

    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::SeqCst)
    }

    pub fn age(&self) -> Duration {
        self.created_at.elapsed()
    }

    pub fn transport_errors(&self) -> u32 {
        self.transport_errors.load(Ordering::SeqCst)
    }

    pub fn sql_errors(&self) -> u32 {
        self.sql_errors.load(Ordering::SeqCst)
    }

    /// Whether the pool must discard this session instead of reusing it.
    pub fn is_stale(&self) -> bool {
        self.is_closed() || self.transport_errors() > 0 || self.sql_errors() > 0
    }
}
