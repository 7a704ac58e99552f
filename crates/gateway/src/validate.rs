//! Credential validator fast path.
//!
//! Runs on every protected request on both transports. Budget is
//! single-digit milliseconds on a cache hit: an API key costs one prefix
//! lookup plus a constant-time digest compare; an access assertion costs
//! one signature verification plus one blacklist probe.

use axum::body::Body;
use axum::extract::State;
use axum::http::Request;
use axum::middleware::Next;
use axum::response::{IntoResponse, Response};
use chrono::Utc;
use uuid::Uuid;

use agw_credentials::{constant_time_eq, sha256_hex, TokenError};
use agw_domain::model::{ADMIN_ROLE, API_KEY_PREFIX, API_KEY_PREFIX_LEN, SERVICE_ROLE};
use agw_domain::{CredentialFault, Error, Result};
use agw_store::{ActorStore, ApiKeyStore};

use crate::api::error::ApiError;
use crate::state::AppState;

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Capability bundle
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// What a resolved bearer credential is allowed to do.
#[derive(Debug, Clone)]
pub struct AuthContext {
    pub actor_id: Uuid,
    pub username: String,
    pub email: Option<String>,
    pub role_id: Option<Uuid>,
    pub role: String,
    /// `Some` for API-key principals: permission names the key may
    /// exercise. `None` means role-based authorization.
    pub scopes: Option<Vec<String>>,
    /// Digest and expiry of the presented access assertion; absent for
    /// API keys. Logout blacklists through these.
    pub token_digest: Option<String>,
    pub token_exp: Option<i64>,
}

impl AuthContext {
    pub fn is_admin(&self) -> bool {
        self.scopes.is_none() && self.role == ADMIN_ROLE
    }
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Resolution
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

fn fault(f: CredentialFault) -> Error {
    Error::Unauthenticated(f)
}

/// Resolve a bearer string to a capability bundle.
///
/// The `agw_` prefix discriminates: API keys go through prefix lookup +
/// digest compare, anything else is treated as an access assertion.
pub async fn resolve_bearer(state: &AppState, bearer: Option<&str>) -> Result<AuthContext> {
    let bearer = bearer
        .map(str::trim)
        .filter(|b| !b.is_empty())
        .ok_or_else(|| fault(CredentialFault::Missing))?;

    if bearer.starts_with(API_KEY_PREFIX) {
        resolve_api_key(state, bearer).await
    } else {
        resolve_access_token(state, bearer).await
    }
}

async fn resolve_api_key(state: &AppState, bearer: &str) -> Result<AuthContext> {
    // Keys are ASCII by construction; anything else cannot be ours and
    // must not panic the prefix slice below.
    if bearer.len() <= API_KEY_PREFIX_LEN || !bearer.is_ascii() {
        return Err(fault(CredentialFault::Malformed));
    }
    let prefix = &bearer[..API_KEY_PREFIX_LEN];

    let key = state
        .api_keys
        .find_by_prefix(prefix)
        .await?
        .ok_or_else(|| fault(CredentialFault::Malformed))?;

    if !constant_time_eq(&key.digest, &sha256_hex(bearer)) {
        return Err(fault(CredentialFault::Malformed));
    }
    let now = Utc::now();
    if !key.is_active {
        return Err(fault(CredentialFault::Revoked));
    }
    if key.expires_at.map(|exp| exp <= now).unwrap_or(false) {
        return Err(fault(CredentialFault::Expired));
    }

    let actor = state
        .actors
        .get(key.actor_id)
        .await?
        .ok_or_else(|| fault(CredentialFault::Revoked))?;
    if !actor.is_active {
        return Err(fault(CredentialFault::ActorInactive));
    }

    // Last-seen is bookkeeping; do it off the fast path.
    {
        let api_keys = state.api_keys.clone();
        let key_id = key.id;
        tokio::spawn(async move {
            if let Err(e) = api_keys.touch_last_used(key_id, Utc::now()).await {
                tracing::debug!(error = %e, "api key last-used touch failed");
            }
        });
    }

    let role = if actor.legacy_role().is_empty() {
        SERVICE_ROLE.to_string()
    } else {
        state.authz.role_name(actor.role_id, actor.legacy_role())
    };
    Ok(AuthContext {
        actor_id: actor.id,
        username: actor.username,
        email: actor.email,
        role_id: actor.role_id,
        role,
        scopes: Some(key.scopes),
        token_digest: None,
        token_exp: None,
    })
}

async fn resolve_access_token(state: &AppState, bearer: &str) -> Result<AuthContext> {
    let claims = state.tokens.verify_access(bearer).map_err(|e| match e {
        TokenError::Expired => fault(CredentialFault::Expired),
        TokenError::Malformed | TokenError::BadSignature => fault(CredentialFault::Malformed),
    })?;

    // The single expected suspension on this path.
    let digest = sha256_hex(bearer);
    if state.blacklist.contains(&digest).await? {
        return Err(fault(CredentialFault::Revoked));
    }

    let actor = state
        .actors
        .get(claims.sub)
        .await?
        .ok_or_else(|| fault(CredentialFault::Revoked))?;
    if !actor.is_active {
        return Err(fault(CredentialFault::ActorInactive));
    }

    // Resolve the role from the actor row, not the claims: a demotion
    // must bite before the token's natural expiry.
    let role = state.authz.role_name(actor.role_id, actor.legacy_role());
    Ok(AuthContext {
        actor_id: actor.id,
        username: actor.username,
        email: actor.email,
        role_id: actor.role_id,
        role,
        scopes: None,
        token_digest: Some(digest),
        token_exp: Some(claims.exp),
    })
}

/// Authorization check shared by both transports: API keys answer from
/// their scope set, everyone else from the role matrix.
pub fn permitted(state: &AppState, ctx: &AuthContext, resource: &str, action: &str) -> bool {
    match &ctx.scopes {
        Some(scopes) => state.authz.scopes_allow(scopes, resource, action),
        None => state.authz.can(ctx.role_id, &ctx.role, resource, action),
    }
}

/// `permitted` or `Forbidden`.
pub fn require_permission(
    state: &AppState,
    ctx: &AuthContext,
    resource: &str,
    action: &str,
) -> Result<()> {
    if permitted(state, ctx, resource, action) {
        Ok(())
    } else {
        Err(Error::Forbidden(format!("{resource}:{action}")))
    }
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Middleware
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

pub fn bearer_from_headers(headers: &axum::http::HeaderMap) -> Option<&str> {
    let raw = headers.get("authorization")?.to_str().ok()?;
    // Accept both `Bearer <cred>` and a bare credential; the RPC side
    // sends the same shapes.
    Some(raw.strip_prefix("Bearer ").unwrap_or(raw))
}

/// Gate protected routes: resolve the bearer and stash the capability
/// bundle in request extensions.
pub async fn require_auth(
    State(state): State<AppState>,
    mut req: Request<Body>,
    next: Next,
) -> Response {
    match resolve_bearer(&state, bearer_from_headers(req.headers())).await {
        Ok(ctx) => {
            req.extensions_mut().insert(ctx);
            next.run(req).await
        }
        Err(err) => ApiError::from(err).into_response(),
    }
}

/// Gate admin routes: protected + admin role. API keys never reach the
/// admin surface, whatever their scopes.
pub async fn require_admin(
    State(state): State<AppState>,
    mut req: Request<Body>,
    next: Next,
) -> Response {
    match resolve_bearer(&state, bearer_from_headers(req.headers())).await {
        Ok(ctx) if ctx.is_admin() => {
            req.extensions_mut().insert(ctx);
            next.run(req).await
        }
        Ok(_) => ApiError::from(Error::Forbidden("admin role required".into())).into_response(),
        Err(err) => ApiError::from(err).into_response(),
    }
}
