// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2012-2025 Andrei Maltsev

//! Scheme dispatch plus the challenge-response exchange shared by the native
//! and PAM flows.

use std::sync::Arc;

use base64::{Engine, engine::general_purpose::STANDARD};
use serde_json::Value;
use tracing::debug;

use crate::{
    cfg::enums::AuthScheme,
    client::{handshake::Handshaker, pam_interactive},
    error::{IrodsError, Result},
    models::{
        api::{AUTH_REQUEST_AN, AUTH_RESPONSE_AN, PAM_AUTH_REQUEST_AN},
        auth::{AuthChallenge, AuthResponse, PamAuthRequest, PamAuthResult},
    },
    utils::{CHALLENGE_LEN, auth_response, client_signature},
};

/// Asks the user a question during interactive PAM. Prompting happens
/// between round trips, never while the session lock is held.
pub trait Prompt: Send + Sync {
    fn prompt(&self, message: &str, echo: bool) -> Result<String>;
}

/// Persists the interactive-PAM state map between sessions.
pub trait StateStore: Send + Sync {
    fn load(&self) -> Result<Option<Value>>;
    fn save(&self, state: &Value) -> Result<()>;
}

/// External collaborators of the authentication flows. Both are optional;
/// interactive PAM fails cleanly without a prompt when the server asks a
/// question.
#[derive(Clone, Default)]
pub struct AuthEnv {
    pub prompt: Option<Arc<dyn Prompt>>,
    pub store: Option<Arc<dyn StateStore>>,
}

impl std::fmt::Debug for AuthEnv {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AuthEnv")
            .field("prompt", &self.prompt.as_ref().map(|_| "Prompt"))
            .field("store", &self.store.as_ref().map(|_| "StateStore"))
            .finish()
    }
}

/// Credentials derived during the handshake, frozen into the session.
#[derive(Debug, Clone)]
pub(crate) struct AuthOutcome {
    pub native_password: String,
    pub client_signature: String,
}

pub(crate) async fn authenticate(
    h: &mut Handshaker,
    env: &AuthEnv,
) -> Result<AuthOutcome> {
    let scheme = h.cfg.auth.scheme;
    if scheme.requires_tls() && !h.is_tls() {
        return Err(IrodsError::TlsRequired);
    }
    match scheme {
        AuthScheme::Native => {
            let password = h.cfg.auth.password.clone();
            challenge_response(h, password).await
        },
        AuthScheme::PamPassword => {
            let req = PamAuthRequest {
                user: h.cfg.connection.proxy_username.clone(),
                password: h.cfg.auth.password.clone(),
                ttl: h.cfg.auth.generated_password_ttl as i32,
            };
            let minted: PamAuthResult =
                h.api_request(PAM_AUTH_REQUEST_AN, &req).await?;
            if minted.password.is_empty() {
                return Err(IrodsError::Authentication(
                    "server minted an empty PAM password".to_string(),
                ));
            }
            debug!("PAM password exchanged for an ephemeral native password");
            challenge_response(h, minted.password).await
        },
        AuthScheme::PamInteractive => {
            let minted = pam_interactive::run(h, env).await?;
            challenge_response(h, minted).await
        },
    }
}

/// `AUTH_REQUEST` → challenge → `AUTH_RESPONSE`. The first 16 challenge
/// bytes become the session's client signature.
async fn challenge_response(
    h: &mut Handshaker,
    password: String,
) -> Result<AuthOutcome> {
    let challenge: AuthChallenge = h.api_request(AUTH_REQUEST_AN, &()).await?;
    let raw = STANDARD
        .decode(challenge.challenge.trim())
        .map_err(|e| IrodsError::Authentication(format!("bad challenge: {e}")))?;
    if raw.len() < CHALLENGE_LEN {
        return Err(IrodsError::Authentication(format!(
            "challenge too short: {} bytes",
            raw.len()
        )));
    }

    let signature = client_signature(&raw);
    let response = AuthResponse {
        response: auth_response(&raw, &password),
        username: h.cfg.connection.proxy_username.clone(),
    };
    let () = h.api_request(AUTH_RESPONSE_AN, &response).await?;

    Ok(AuthOutcome {
        native_password: password,
        client_signature: signature,
    })
}
