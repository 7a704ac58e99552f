//! API key management (protected).
//!
//! The plaintext key is part of the creation response and never appears
//! again; only the prefix and digest are stored.

use axum::extract::{Path, State};
use axum::{Extension, Json};
use chrono::{DateTime, Utc};
use serde::Deserialize;
use uuid::Uuid;

use agw_credentials::mint_api_key;
use agw_domain::model::{ApiKey, AuditEvent, AuditOutcome};
use agw_domain::{Error, Result};
use agw_store::{ApiKeyStore, RoleStore};

use crate::api::error::ApiResult;
use crate::guard::ClientInfo;
use crate::state::AppState;
use crate::validate::AuthContext;

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// GET /api/api-keys
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

pub async fn list(
    State(state): State<AppState>,
    Extension(ctx): Extension<AuthContext>,
) -> ApiResult<Json<serde_json::Value>> {
    let keys = state.api_keys.list_for_actor(ctx.actor_id).await?;
    Ok(Json(serde_json::json!({ "api_keys": keys })))
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// POST /api/api-keys
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

#[derive(Debug, Deserialize)]
pub struct CreateBody {
    pub name: String,
    #[serde(default)]
    pub description: String,
    /// Permission machine names this key may exercise.
    #[serde(default)]
    pub scopes: Vec<String>,
    #[serde(default)]
    pub expires_at: Option<DateTime<Utc>>,
}

pub async fn create(
    State(state): State<AppState>,
    Extension(ctx): Extension<AuthContext>,
    Extension(client): Extension<ClientInfo>,
    Json(body): Json<CreateBody>,
) -> ApiResult<Json<serde_json::Value>> {
    if body.name.trim().is_empty() {
        return Err(Error::Validation("name is required".into()).into());
    }
    validate_scopes(&state, &body.scopes).await?;

    let minted = mint_api_key();
    let key = ApiKey {
        id: Uuid::new_v4(),
        actor_id: ctx.actor_id,
        name: body.name.trim().to_string(),
        description: body.description,
        prefix: minted.prefix.clone(),
        digest: minted.digest,
        scopes: body.scopes,
        expires_at: body.expires_at,
        last_used_at: None,
        is_active: true,
        created_at: Utc::now(),
    };
    state.api_keys.insert(key.clone()).await?;

    state.audit.record(
        AuditEvent::new("api-key.create", "api-key", AuditOutcome::Success)
            .actor(ctx.actor_id)
            .resource(key.id.to_string())
            .client(client.ip_string(), client.user_agent.clone()),
    );

    // The one and only appearance of the plaintext.
    Ok(Json(serde_json::json!({
        "api_key": key,
        "plaintext": minted.plaintext,
    })))
}

/// Every requested scope must name an existing permission.
async fn validate_scopes(state: &AppState, scopes: &[String]) -> Result<()> {
    for scope in scopes {
        if state.roles.find_permission_by_name(scope).await?.is_none() {
            return Err(Error::Validation(format!("unknown scope '{scope}'")));
        }
    }
    Ok(())
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// GET / PUT / DELETE /api/api-keys/:id
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

pub async fn get(
    State(state): State<AppState>,
    Extension(ctx): Extension<AuthContext>,
    Path(id): Path<Uuid>,
) -> ApiResult<Json<serde_json::Value>> {
    let key = state
        .api_keys
        .get(id)
        .await?
        .filter(|k| k.actor_id == ctx.actor_id)
        .ok_or_else(|| Error::NotFound("api key".into()))?;
    Ok(Json(serde_json::json!({ "api_key": key })))
}

#[derive(Debug, Deserialize)]
pub struct UpdateBody {
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub is_active: Option<bool>,
}

pub async fn update(
    State(state): State<AppState>,
    Extension(ctx): Extension<AuthContext>,
    Path(id): Path<Uuid>,
    Json(body): Json<UpdateBody>,
) -> ApiResult<Json<serde_json::Value>> {
    let mut key = state
        .api_keys
        .get(id)
        .await?
        .filter(|k| k.actor_id == ctx.actor_id)
        .ok_or_else(|| Error::NotFound("api key".into()))?;

    if let Some(name) = body.name {
        key.name = name;
    }
    if let Some(description) = body.description {
        key.description = description;
    }
    if let Some(is_active) = body.is_active {
        key.is_active = is_active;
    }
    state.api_keys.update(&key).await?;
    Ok(Json(serde_json::json!({ "api_key": key })))
}

pub async fn remove(
    State(state): State<AppState>,
    Extension(ctx): Extension<AuthContext>,
    Extension(client): Extension<ClientInfo>,
    Path(id): Path<Uuid>,
) -> ApiResult<Json<serde_json::Value>> {
    if !state.api_keys.delete(id, ctx.actor_id).await? {
        return Err(Error::NotFound("api key".into()).into());
    }
    state.audit.record(
        AuditEvent::new("api-key.delete", "api-key", AuditOutcome::Success)
            .actor(ctx.actor_id)
            .resource(id.to_string())
            .client(client.ip_string(), client.user_agent.clone()),
    );
    Ok(Json(serde_json::json!({ "deleted": true })))
}
