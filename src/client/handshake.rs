// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2012-2025 Andrei Maltsev

//! Session establishment: startup pack, client/server SSL negotiation, the
//! TLS upgrade with its shared-secret frame, and the framed round-trip
//! helper the authentication flows run on before the session is frozen.

use std::{fs::File, io::BufReader, sync::Arc, time::Duration};

use tokio::net::TcpStream;
use tokio_rustls::{
    TlsConnector,
    rustls::{
        self, CertificateError, ClientConfig, DigitallySignedStruct, RootCertStore,
        SignatureScheme,
        client::{
            WebPkiServerVerifier,
            danger::{HandshakeSignatureValid, ServerCertVerified, ServerCertVerifier},
        },
        pki_types::{CertificateDer, ServerName, UnixTime},
    },
};
use tokio_util::sync::CancellationToken;
use tracing::debug;

use crate::{
    cfg::{config::Config, enums::SslVerify},
    client::common::{Transport, io_with_timeout},
    error::{IrodsError, Result},
    models::{
        common::{FromWire, ToWire},
        header::{
            self, MsgHeader, RODS_API_REPLY, RODS_API_REQ, RODS_CONNECT, RODS_CS_NEG_T,
            RODS_VERSION,
        },
        message::{Frame, read_frame, write_frame},
        negotiation::{CS_NEG_USE_SSL, CS_NEG_USE_TCP, CsNeg, negotiate_outcome},
        rerror::parse_error_segment,
        startup::{ServerVersion, StartupPack, Version},
    },
    utils::random_key,
};

/// Owns the transport from dial until authentication completes; the outcome
/// is frozen into a `Connection` by the caller.
pub(crate) struct Handshaker {
    io: Option<Transport>,
    pub(crate) cfg: Arc<Config>,
    pub(crate) cancel: CancellationToken,
    io_timeout: Duration,
}

impl Handshaker {
    pub(crate) async fn dial(
        cfg: Arc<Config>,
        cancel: CancellationToken,
    ) -> Result<Self> {
        let addr = format!("{}:{}", cfg.connection.host, cfg.connection.port);
        let dial = TcpStream::connect(&addr);
        let stream = tokio::select! {
            _ = cancel.cancelled() => return Err(IrodsError::Cancelled),
            res = tokio::time::timeout(cfg.timeouts.dial, dial) => match res {
                Ok(Ok(s)) => s,
                Ok(Err(e)) => return Err(IrodsError::transport("connect", e)),
                Err(_) => return Err(IrodsError::Timeout { op: "connect" }),
            },
        };
        stream
            .set_nodelay(true)
            .map_err(|e| IrodsError::transport("set_nodelay", e))?;

        let io_timeout = cfg.timeouts.handshake;
        Ok(Self {
            io: Some(Transport::Tcp(stream)),
            cfg,
            cancel,
            io_timeout,
        })
    }

    fn io_mut(&mut self) -> Result<&mut Transport> {
        self.io.as_mut().ok_or(IrodsError::SessionClosed)
    }

    pub(crate) async fn send_frame(
        &mut self,
        header: &MsgHeader,
        body: &[u8],
    ) -> Result<()> {
        let io_timeout = self.io_timeout;
        let cancel = self.cancel.clone();
        let io = self.io_mut()?;
        io_with_timeout(
            "write frame",
            async {
                write_frame(io, header, body, &[], &[])
                    .await
                    .map_err(|e| IrodsError::transport("write frame", e))
            },
            io_timeout,
            &cancel,
        )
        .await
    }

    pub(crate) async fn recv_frame(&mut self) -> Result<Frame> {
        let io_timeout = self.io_timeout;
        let cancel = self.cancel.clone();
        let io = self.io_mut()?;
        io_with_timeout("read frame", read_frame(io, None), io_timeout, &cancel).await
    }

    /// One API request/reply pair on the half-built session. Negative
    /// `intInfo` surfaces as a server error with the error segment attached.
    pub(crate) async fn api_request<Req: ToWire, Resp: FromWire>(
        &mut self,
        api: i32,
        req: &Req,
    ) -> Result<Resp> {
        let variant = self.cfg.connection.protocol;
        let body = req.to_wire(variant)?;
        let header = MsgHeader::new(RODS_API_REQ, body.len() as u32, 0, 0, api);
        self.send_frame(&header, &body).await?;
        let frame = self.recv_frame().await?;
        frame.header.expect_type(RODS_API_REPLY)?;
        if frame.header.int_info < 0 {
            let message =
                parse_error_segment(&frame.error, variant).unwrap_or_default();
            return Err(IrodsError::server(frame.header.int_info, message));
        }
        Resp::from_wire(&frame.body, variant)
    }

    /// Startup-pack exchange plus negotiation and, when agreed, the TLS
    /// upgrade. Returns the verified server version.
    pub(crate) async fn startup(&mut self) -> Result<ServerVersion> {
        let variant = self.cfg.connection.protocol;
        let pack = StartupPack::from_config(&self.cfg);
        let body = pack.to_wire(variant)?;
        let header = MsgHeader::new(RODS_CONNECT, body.len() as u32, 0, 0, 0);
        self.send_frame(&header, &body).await?;

        let mut use_tls = false;
        if self.cfg.ssl.negotiation.is_requested() {
            let frame = self.recv_frame().await?;
            frame.header.expect_type(RODS_CS_NEG_T)?;
            let neg = CsNeg::from_wire(&frame.body, variant)?;
            debug!("server negotiation policy: {}", neg.result);
            match negotiate_outcome(&neg.result, self.cfg.ssl.policy) {
                Ok(tls) => {
                    use_tls = tls;
                    let outcome = if tls { CS_NEG_USE_SSL } else { CS_NEG_USE_TCP };
                    self.send_cs_neg(&CsNeg::success(outcome)).await?;
                },
                Err(e) => {
                    self.send_cs_neg(&CsNeg::failure()).await?;
                    return Err(e);
                },
            }
        }

        let frame = self.recv_frame().await?;
        frame.header.expect_type(RODS_VERSION)?;
        let version = Version::from_wire(&frame.body, variant)?;
        if version.status < 0 {
            return Err(IrodsError::server(version.status, "startup rejected"));
        }
        let server_version = ServerVersion::parse_supported(&version.rel_version)?;
        debug!("connected to server {server_version}");

        if use_tls {
            self.upgrade_tls().await?;
            self.send_shared_secret().await?;
        }

        Ok(server_version)
    }

    async fn send_cs_neg(&mut self, neg: &CsNeg) -> Result<()> {
        let body = neg.to_wire(self.cfg.connection.protocol)?;
        let header = MsgHeader::new(RODS_CS_NEG_T, body.len() as u32, 0, 0, 0);
        self.send_frame(&header, &body).await
    }

    async fn upgrade_tls(&mut self) -> Result<()> {
        let config = client_tls_config(&self.cfg)?;
        let name = ServerName::try_from(self.cfg.ssl.server_name.clone())
            .map_err(|_| {
                IrodsError::SslConfig(format!(
                    "invalid server name {:?}",
                    self.cfg.ssl.server_name
                ))
            })?;
        let connector = TlsConnector::from(Arc::new(config));

        let tcp = match self.io.take() {
            Some(Transport::Tcp(s)) => s,
            Some(tls @ Transport::Tls(_)) => {
                self.io = Some(tls);
                return Err(IrodsError::Protocol(
                    "transport already upgraded to TLS".to_string(),
                ));
            },
            None => return Err(IrodsError::SessionClosed),
        };
        let stream = tokio::select! {
            _ = self.cancel.cancelled() => return Err(IrodsError::Cancelled),
            res = tokio::time::timeout(self.io_timeout, connector.connect(name, tcp)) => {
                match res {
                    Ok(Ok(s)) => s,
                    Ok(Err(e)) => return Err(IrodsError::TlsHandshake(e)),
                    Err(_) => return Err(IrodsError::Timeout { op: "tls handshake" }),
                }
            },
        };
        self.io = Some(Transport::Tls(Box::new(stream)));
        Ok(())
    }

    /// Announces the session encryption parameters in a header-shaped frame,
    /// then ships the freshly generated key as a `SHARED_SECRET` message.
    async fn send_shared_secret(&mut self) -> Result<()> {
        let params = {
            let enc = &self.cfg.encryption;
            MsgHeader::new(
                &enc.algorithm,
                enc.key_size,
                enc.salt_size,
                enc.num_hash_rounds,
                0,
            )
        };
        self.send_frame(&params, &[]).await?;

        let key = random_key(self.cfg.encryption.key_size as usize);
        let header =
            MsgHeader::new(header::SHARED_SECRET, key.len() as u32, 0, 0, 0);
        self.send_frame(&header, &key).await
    }

    pub(crate) fn is_tls(&self) -> bool {
        self.io.as_ref().is_some_and(Transport::is_tls)
    }

    /// Hands the transport over to the frozen session.
    pub(crate) fn into_transport(mut self) -> Result<Transport> {
        self.io.take().ok_or(IrodsError::SessionClosed)
    }
}

fn client_tls_config(cfg: &Config) -> Result<ClientConfig> {
    let roots = root_store(cfg)?;
    let builder = ClientConfig::builder();
    let config = match cfg.ssl.verify_server {
        SslVerify::Cert => builder
            .with_root_certificates(roots)
            .with_no_client_auth(),
        SslVerify::Host => {
            let inner = WebPkiServerVerifier::builder(Arc::new(roots))
                .build()
                .map_err(|e| IrodsError::SslConfig(e.to_string()))?;
            builder
                .dangerous()
                .with_custom_certificate_verifier(Arc::new(SkipHostnameVerifier {
                    inner,
                }))
                .with_no_client_auth()
        },
        SslVerify::None => builder
            .dangerous()
            .with_custom_certificate_verifier(Arc::new(AcceptAnyCertificate))
            .with_no_client_auth(),
    };
    Ok(config)
}

fn root_store(cfg: &Config) -> Result<RootCertStore> {
    let mut roots = RootCertStore::empty();
    if cfg.ssl.ca_certificate_file.is_empty() {
        let native = rustls_native_certs::load_native_certs()
            .map_err(|e| IrodsError::SslConfig(e.to_string()))?;
        for cert in native {
            roots
                .add(cert)
                .map_err(|e| IrodsError::SslConfig(e.to_string()))?;
        }
    } else {
        let file = File::open(&cfg.ssl.ca_certificate_file).map_err(|e| {
            IrodsError::SslConfig(format!(
                "cannot open CA bundle {:?}: {e}",
                cfg.ssl.ca_certificate_file
            ))
        })?;
        let mut reader = BufReader::new(file);
        for cert in rustls_pemfile::certs(&mut reader) {
            let cert = cert.map_err(|e| IrodsError::SslConfig(e.to_string()))?;
            roots
                .add(cert)
                .map_err(|e| IrodsError::SslConfig(e.to_string()))?;
        }
    }
    if roots.is_empty() {
        return Err(IrodsError::SslConfig("no trusted CA certificates".to_string()));
    }
    Ok(roots)
}

/// Chain verification via webpki with the hostname check suppressed
/// (`SSLVerifyServer=host`).
#[derive(Debug)]
struct SkipHostnameVerifier {
    inner: Arc<WebPkiServerVerifier>,
}

impl ServerCertVerifier for SkipHostnameVerifier {
    fn verify_server_cert(
        &self,
        end_entity: &CertificateDer<'_>,
        intermediates: &[CertificateDer<'_>],
        server_name: &ServerName<'_>,
        ocsp_response: &[u8],
        now: UnixTime,
    ) -> std::result::Result<ServerCertVerified, rustls::Error> {
        match self.inner.verify_server_cert(
            end_entity,
            intermediates,
            server_name,
            ocsp_response,
            now,
        ) {
            Err(rustls::Error::InvalidCertificate(
                CertificateError::NotValidForName
                | CertificateError::NotValidForNameContext { .. },
            )) => Ok(ServerCertVerified::assertion()),
            other => other,
        }
    }

    fn verify_tls12_signature(
        &self,
        message: &[u8],
        cert: &CertificateDer<'_>,
        dss: &DigitallySignedStruct,
    ) -> std::result::Result<HandshakeSignatureValid, rustls::Error> {
        self.inner.verify_tls12_signature(message, cert, dss)
    }

    fn verify_tls13_signature(
        &self,
        message: &[u8],
        cert: &CertificateDer<'_>,
        dss: &DigitallySignedStruct,
    ) -> std::result::Result<HandshakeSignatureValid, rustls::Error> {
        self.inner.verify_tls13_signature(message, cert, dss)
    }

    fn supported_verify_schemes(&self) -> Vec<SignatureScheme> {
        self.inner.supported_verify_schemes()
    }
}

/// No verification at all (`SSLVerifyServer=none`).
#[derive(Debug)]
struct AcceptAnyCertificate;

impl ServerCertVerifier for AcceptAnyCertificate {
    fn verify_server_cert(
        &self,
        _end_entity: &CertificateDer<'_>,
        _intermediates: &[CertificateDer<'_>],
        _server_name: &ServerName<'_>,
        _ocsp_response: &[u8],
        _now: UnixTime,
    ) -> std::result::Result<ServerCertVerified, rustls::Error> {
        Ok(ServerCertVerified::assertion())
    }

    fn verify_tls12_signature(
        &self,
        _message: &[u8],
        _cert: &CertificateDer<'_>,
        _dss: &DigitallySignedStruct,
    ) -> std::result::Result<HandshakeSignatureValid, rustls::Error> {
        Ok(HandshakeSignatureValid::assertion())
    }

    fn verify_tls13_signature(
        &self,
        _message: &[u8],
        _cert: &CertificateDer<'_>,
        _dss: &DigitallySignedStruct,
    ) -> std::result::Result<HandshakeSignatureValid, rustls::Error> {
        Ok(HandshakeSignatureValid::assertion())
    }

    fn supported_verify_schemes(&self) -> Vec<SignatureScheme> {
        rustls::crypto::aws_lc_rs::default_provider()
            .signature_verification_algorithms
            .supported_schemes()
    }
}

