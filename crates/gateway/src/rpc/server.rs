//! Length-prefixed RPC server over TCP.
//!
//! Each connection gets its own task; each frame is one prost-encoded
//! [`RpcRequest`] envelope answered by exactly one [`RpcResponse`].

use std::sync::Arc;
use std::time::Duration;

use bytes::Bytes;
use futures_util::{SinkExt, StreamExt};
use prost::Message;
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::Notify;
use tokio_util::codec::LengthDelimitedCodec;
use uuid::Uuid;

use agw_credentials::{sha256_hex, TokenService};
use agw_store::ActorStore;
use agw_protocol::{
    CheckPermissionRequest, CheckPermissionResponse, GetUserRequest, GetUserResponse,
    IntrospectTokenRequest, IntrospectTokenResponse, Method, RpcRequest, RpcResponse, RpcUser,
    ValidateTokenRequest, ValidateTokenResponse, MAX_FRAME_BYTES,
};

use crate::api::error::wire_status;
use crate::state::AppState;
use crate::validate::resolve_bearer;

/// Per-call deadline, matching the interactive HTTP routes.
const CALL_TIMEOUT: Duration = Duration::from_secs(10);

/// Accept loop. Runs until `shutdown` fires.
pub async fn serve(state: AppState, listener: TcpListener, shutdown: Arc<Notify>) {
    loop {
        tokio::select! {
            _ = shutdown.notified() => break,
            accepted = listener.accept() => match accepted {
                Ok((stream, peer)) => {
                    tracing::debug!(peer = %peer, "rpc connection accepted");
                    let state = state.clone();
                    let shutdown = shutdown.clone();
                    tokio::spawn(handle_connection(state, stream, shutdown));
                }
                Err(e) => {
                    tracing::warn!(error = %e, "rpc accept failed");
                }
            },
        }
    }
    tracing::info!("rpc listener stopped");
}

async fn handle_connection(state: AppState, stream: TcpStream, shutdown: Arc<Notify>) {
    let mut framed = LengthDelimitedCodec::builder()
        .max_frame_length(MAX_FRAME_BYTES)
        .new_framed(stream);

    loop {
        let frame = tokio::select! {
            _ = shutdown.notified() => break,
            frame = framed.next() => frame,
        };
        let Some(frame) = frame else { break };
        let frame = match frame {
            Ok(frame) => frame,
            Err(e) => {
                tracing::debug!(error = %e, "rpc frame error, closing connection");
                break;
            }
        };

        let response = match RpcRequest::decode(frame.as_ref()) {
            Ok(request) => {
                match tokio::time::timeout(CALL_TIMEOUT, dispatch(&state, &request)).await {
                    Ok(response) => response,
                    Err(_) => RpcResponse::error(
                        &request.request_id,
                        503,
                        "upstream_unavailable",
                        "call deadline exceeded",
                    ),
                }
            }
            Err(_) => RpcResponse::error("", 400, "validation", "undecodable request envelope"),
        };

        if let Err(e) = framed.send(Bytes::from(response.encode_to_vec())).await {
            tracing::debug!(error = %e, "rpc send failed, closing connection");
            break;
        }
    }
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Dispatch
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

async fn dispatch(state: &AppState, request: &RpcRequest) -> RpcResponse {
    match Method::try_from(request.method) {
        Ok(Method::ValidateToken) => validate_token(state, request).await,
        Ok(Method::GetUser) => get_user(state, request).await,
        Ok(Method::CheckPermission) => check_permission(state, request).await,
        Ok(Method::IntrospectToken) => introspect_token(state, request).await,
        _ => RpcResponse::error(&request.request_id, 400, "validation", "unknown method"),
    }
}

fn bad_payload(request: &RpcRequest) -> RpcResponse {
    RpcResponse::error(&request.request_id, 400, "validation", "undecodable payload")
}

fn domain_error(request: &RpcRequest, err: agw_domain::Error) -> RpcResponse {
    RpcResponse::error(
        &request.request_id,
        wire_status(&err).as_u16() as u32,
        err.code(),
        &err.to_string(),
    )
}

/// The caller's own credential, from the envelope metadata.
async fn authenticate_caller(
    state: &AppState,
    request: &RpcRequest,
) -> Result<crate::validate::AuthContext, RpcResponse> {
    let bearer = request
        .authorization
        .strip_prefix("Bearer ")
        .unwrap_or(&request.authorization);
    resolve_bearer(state, Some(bearer).filter(|b| !b.is_empty()))
        .await
        .map_err(|e| domain_error(request, e))
}

// ── ValidateToken ───────────────────────────────────────────────────

async fn validate_token(state: &AppState, request: &RpcRequest) -> RpcResponse {
    let Ok(payload) = request.decode_payload::<ValidateTokenRequest>() else {
        return bad_payload(request);
    };

    let response = match resolve_bearer(state, Some(&payload.access_token)).await {
        Ok(ctx) => ValidateTokenResponse {
            valid: true,
            user_id: ctx.actor_id.to_string(),
            email: ctx.email.unwrap_or_default(),
            username: ctx.username,
            roles: vec![ctx.role],
            error_message: String::new(),
            expires_at: ctx.token_exp.unwrap_or_default(),
            is_active: true,
        },
        Err(err) => ValidateTokenResponse {
            valid: false,
            error_message: err.to_string(),
            ..Default::default()
        },
    };
    RpcResponse::ok(&request.request_id, &response)
}

// ── GetUser ─────────────────────────────────────────────────────────

async fn get_user(state: &AppState, request: &RpcRequest) -> RpcResponse {
    if let Err(response) = authenticate_caller(state, request).await {
        return response;
    }
    let Ok(payload) = request.decode_payload::<GetUserRequest>() else {
        return bad_payload(request);
    };
    let Ok(user_id) = payload.user_id.parse::<Uuid>() else {
        return RpcResponse::error(&request.request_id, 422, "validation", "user_id is not a uuid");
    };

    match state.actors.get(user_id).await {
        Ok(Some(actor)) => {
            let role = state.authz.role_name(actor.role_id, actor.legacy_role());
            let user = RpcUser {
                id: actor.id.to_string(),
                email: actor.email.unwrap_or_default(),
                username: actor.username,
                display_name: actor.display_name.unwrap_or_default(),
                roles: vec![role],
                kind: match actor.kind {
                    agw_domain::model::ActorKind::Human => "human".to_string(),
                    agw_domain::model::ActorKind::Service => "service".to_string(),
                },
                email_verified: actor.email_verified,
                is_active: actor.is_active,
                totp_enabled: actor.totp_enabled,
                created_at: actor.created_at.timestamp(),
            };
            RpcResponse::ok(
                &request.request_id,
                &GetUserResponse {
                    user: Some(user),
                    error_message: String::new(),
                },
            )
        }
        Ok(None) => RpcResponse::error(&request.request_id, 404, "not_found", "user not found"),
        Err(err) => domain_error(request, err),
    }
}

// ── CheckPermission ─────────────────────────────────────────────────

async fn check_permission(state: &AppState, request: &RpcRequest) -> RpcResponse {
    if let Err(response) = authenticate_caller(state, request).await {
        return response;
    }
    let Ok(payload) = request.decode_payload::<CheckPermissionRequest>() else {
        return bad_payload(request);
    };
    let Ok(user_id) = payload.user_id.parse::<Uuid>() else {
        return RpcResponse::error(&request.request_id, 422, "validation", "user_id is not a uuid");
    };

    match state.actors.get(user_id).await {
        Ok(Some(actor)) => {
            let allowed = actor.is_active
                && state.authz.can(
                    actor.role_id,
                    actor.legacy_role(),
                    &payload.resource,
                    &payload.action,
                );
            let role = state.authz.role_name(actor.role_id, actor.legacy_role());
            RpcResponse::ok(
                &request.request_id,
                &CheckPermissionResponse {
                    allowed,
                    roles: vec![role],
                    error_message: String::new(),
                },
            )
        }
        Ok(None) => RpcResponse::error(&request.request_id, 404, "not_found", "user not found"),
        Err(err) => domain_error(request, err),
    }
}

// ── IntrospectToken ─────────────────────────────────────────────────

async fn introspect_token(state: &AppState, request: &RpcRequest) -> RpcResponse {
    let Ok(payload) = request.decode_payload::<IntrospectTokenRequest>() else {
        return bad_payload(request);
    };
    let token = &payload.access_token;

    let response = match state.tokens.verify_access(token) {
        Ok(claims) => {
            let blacklisted = state
                .blacklist
                .contains(&sha256_hex(token))
                .await
                .unwrap_or(false);
            let actor = match state.actors.get(claims.sub).await {
                Ok(actor) => actor,
                Err(_) => None,
            };
            let inactive = actor.as_ref().map(|a| !a.is_active).unwrap_or(true);
            IntrospectTokenResponse {
                active: !blacklisted && !inactive,
                user_id: claims.sub.to_string(),
                email: claims.email.unwrap_or_default(),
                username: claims.username,
                roles: vec![claims.role],
                issued_at: claims.iat,
                expires_at: claims.exp,
                not_before: claims.iat,
                subject: claims.sub.to_string(),
                blacklisted,
                error_message: if blacklisted {
                    "credential revoked".to_string()
                } else if inactive {
                    "account is inactive".to_string()
                } else {
                    String::new()
                },
            }
        }
        Err(err) => {
            // Expired tokens still expose their (unverified) claims for
            // diagnostics, the way an introspection endpoint is expected
            // to.
            let peeked = TokenService::peek_claims(token).unwrap_or_default();
            IntrospectTokenResponse {
                active: false,
                user_id: peeked["sub"].as_str().unwrap_or_default().to_string(),
                username: peeked["username"].as_str().unwrap_or_default().to_string(),
                issued_at: peeked["iat"].as_i64().unwrap_or_default(),
                expires_at: peeked["exp"].as_i64().unwrap_or_default(),
                not_before: peeked["iat"].as_i64().unwrap_or_default(),
                subject: peeked["sub"].as_str().unwrap_or_default().to_string(),
                error_message: err.to_string(),
                ..Default::default()
            }
        }
    };

    // Introspection is metadata, not a gate; it always answers 0 with
    // the verdict in the payload.
    RpcResponse::ok(&request.request_id, &response)
}
