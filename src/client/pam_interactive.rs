// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2012-2025 Andrei Maltsev

//! The interactive PAM dialogue: a small interpreter over server-directed
//! steps. Each round trip carries the JSON state map and a `next_operation`
//! hint; the server answers with an optional JSON-Patch against the state
//! plus one of `prompt` (ask the user), `retrieve` (read a state path and
//! submit it) or the `authenticated` terminal carrying the minted native
//! password.

use json_patch::Patch;
use serde_json::{Map, Value, json};
use tracing::debug;

use crate::{
    client::{auth::AuthEnv, handshake::Handshaker},
    error::{IrodsError, Result},
    models::{api::AUTH_PLUGIN_REQ_AN, auth::AuthPluginStep},
};

const SCHEME: &str = "pam_interactive";
const OP_START: &str = "auth_agent_start";
const OP_AUTHENTICATED: &str = "authenticated";
const OP_PROMPT: &str = "prompt";
const OP_RETRIEVE: &str = "retrieve";

/// Caps the dialogue; a server looping forever is a protocol error, not a
/// hang.
const MAX_ROUNDS: usize = 64;

pub(crate) async fn run(h: &mut Handshaker, env: &AuthEnv) -> Result<String> {
    let mut pstate = match &env.store {
        Some(store) => store.load()?.unwrap_or_else(|| json!({})),
        None => json!({}),
    };
    if !pstate.is_object() {
        pstate = json!({});
    }

    let mut next_operation = OP_START.to_string();
    let mut response: Option<String> = None;

    for round in 0..MAX_ROUNDS {
        let mut msg = Map::new();
        msg.insert("scheme".to_string(), json!(SCHEME));
        msg.insert("next_operation".to_string(), json!(next_operation));
        msg.insert("pstate".to_string(), pstate.clone());
        if let Some(resp) = response.take() {
            msg.insert("resp".to_string(), json!(resp));
        }
        msg.insert(
            "user_name".to_string(),
            json!(h.cfg.connection.proxy_username),
        );
        msg.insert("zone_name".to_string(), json!(h.cfg.connection.proxy_zone));

        let step: AuthPluginStep = h
            .api_request(AUTH_PLUGIN_REQ_AN, &AuthPluginStep::new(Value::Object(msg)))
            .await?;
        let reply = step.state;
        debug!("pam_interactive round {round}: {}",
            reply.get("next_operation").and_then(serde_json::Value::as_str).unwrap_or("?"));

        if let Some(ops) = reply.get("patch") {
            apply_patch(&mut pstate, ops, reply.get("default"))?;
            if let Some(store) = &env.store {
                store.save(&pstate)?;
            }
        }

        let op = reply
            .get("next_operation")
            .and_then(Value::as_str)
            .ok_or_else(|| {
                IrodsError::Authentication(
                    "pam_interactive reply missing next_operation".to_string(),
                )
            })?;

        match op {
            OP_AUTHENTICATED => {
                let password = reply
                    .get("request_result")
                    .and_then(Value::as_str)
                    .ok_or_else(|| {
                        IrodsError::Authentication(
                            "authenticated reply without a password".to_string(),
                        )
                    })?;
                return Ok(password.to_string());
            },
            OP_PROMPT => {
                let message = reply
                    .get("prompt")
                    .and_then(Value::as_str)
                    .unwrap_or("password");
                let echo = reply.get("echo").and_then(Value::as_bool).unwrap_or(false);
                let prompt = env.prompt.as_ref().ok_or_else(|| {
                    IrodsError::Authentication(
                        "server asked a question but no prompt collaborator is \
                         configured"
                            .to_string(),
                    )
                })?;
                response = Some(prompt.prompt(message, echo)?);
            },
            OP_RETRIEVE => {
                let pointer = reply
                    .get("retrieve")
                    .and_then(Value::as_str)
                    .ok_or_else(|| {
                        IrodsError::Authentication(
                            "retrieve step without a path".to_string(),
                        )
                    })?;
                let value = pstate.pointer(pointer).and_then(Value::as_str).ok_or_else(
                    || {
                        IrodsError::Authentication(format!(
                            "retrieve path {pointer:?} not present in state"
                        ))
                    },
                )?;
                response = Some(value.to_string());
            },
            other => {
                // Server-chosen intermediate step; echo it back unchanged.
                next_operation = other.to_string();
                continue;
            },
        }
        next_operation = op.to_string();
    }

    Err(IrodsError::Authentication(format!(
        "pam_interactive did not terminate within {MAX_ROUNDS} rounds"
    )))
}

/// Applies the server's `add`/`replace` ops. Ops without a `value` inherit
/// the reply's `default` field.
fn apply_patch(pstate: &mut Value, ops: &Value, default: Option<&Value>) -> Result<()> {
    let Some(list) = ops.as_array() else {
        return Err(IrodsError::Authentication(
            "pam_interactive patch is not an array".to_string(),
        ));
    };
    let mut filled = Vec::with_capacity(list.len());
    for op in list {
        let mut op = op.clone();
        if let Some(obj) = op.as_object_mut() {
            let kind = obj.get("op").and_then(Value::as_str).unwrap_or_default();
            if matches!(kind, "add" | "replace") && !obj.contains_key("value") {
                obj.insert(
                    "value".to_string(),
                    default.cloned().unwrap_or(Value::Null),
                );
            }
        }
        filled.push(op);
    }
    let patch: Patch = serde_json::from_value(Value::Array(filled)).map_err(|e| {
        IrodsError::Authentication(format!("malformed pam_interactive patch: {e}"))
    })?;
    json_patch::patch(pstate, &patch).map_err(|e| {
        IrodsError::Authentication(format!("pam_interactive patch failed: {e}"))
    })
}
