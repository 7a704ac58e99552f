//! Self-service session endpoints (protected).

use axum::extract::{Path, Query, State};
use axum::{Extension, Json};
use serde::Deserialize;
use uuid::Uuid;

use agw_credentials::sha256_hex;
use agw_domain::model::PageRequest;
use agw_domain::Error;

use crate::api::error::ApiResult;
use crate::state::AppState;
use crate::validate::AuthContext;

#[derive(Debug, Deserialize)]
pub struct ListQuery {
    #[serde(default = "d_page")]
    pub page: u64,
    #[serde(default = "d_per_page")]
    pub per_page: u64,
    /// Default: live sessions only.
    #[serde(default = "d_true")]
    pub live_only: bool,
}

fn d_page() -> u64 {
    1
}
fn d_per_page() -> u64 {
    20
}
fn d_true() -> bool {
    true
}

/// GET /api/sessions — the caller's sessions, newest activity first.
pub async fn list(
    State(state): State<AppState>,
    Extension(ctx): Extension<AuthContext>,
    Query(query): Query<ListQuery>,
) -> ApiResult<Json<serde_json::Value>> {
    let page = state
        .sessions
        .list_for_actor(
            ctx.actor_id,
            query.live_only,
            PageRequest {
                page: query.page,
                per_page: query.per_page,
            },
        )
        .await?;
    Ok(Json(serde_json::json!(page)))
}

#[derive(Debug, Deserialize)]
pub struct RenameBody {
    pub label: String,
}

/// PUT /api/sessions/:id — user-visible label only.
pub async fn rename(
    State(state): State<AppState>,
    Extension(ctx): Extension<AuthContext>,
    Path(id): Path<Uuid>,
    Json(body): Json<RenameBody>,
) -> ApiResult<Json<serde_json::Value>> {
    state.sessions.rename(id, ctx.actor_id, &body.label).await?;
    Ok(Json(serde_json::json!({ "renamed": true })))
}

/// DELETE /api/sessions/:id — revoke one of the caller's sessions.
pub async fn revoke(
    State(state): State<AppState>,
    Extension(ctx): Extension<AuthContext>,
    Path(id): Path<Uuid>,
) -> ApiResult<Json<serde_json::Value>> {
    // Ownership check before the revocation touches anything.
    let session = state
        .sessions
        .list_for_actor(ctx.actor_id, false, PageRequest { page: 1, per_page: 100 })
        .await?
        .items
        .into_iter()
        .find(|s| s.id == id)
        .ok_or_else(|| Error::NotFound("session".into()))?;
    state.sessions.revoke(session.id).await?;
    Ok(Json(serde_json::json!({ "revoked": true })))
}

#[derive(Debug, Default, Deserialize)]
pub struct RevokeAllBody {
    /// The refresh token of the session to keep (normally the caller's
    /// own).
    #[serde(default)]
    pub keep_refresh_token: Option<String>,
}

/// DELETE /api/sessions — revoke everything, optionally sparing the
/// presented session.
pub async fn revoke_all(
    State(state): State<AppState>,
    Extension(ctx): Extension<AuthContext>,
    body: Option<Json<RevokeAllBody>>,
) -> ApiResult<Json<serde_json::Value>> {
    let body = body.map(|Json(b)| b).unwrap_or_default();
    let spared = match body.keep_refresh_token.as_deref() {
        Some(token) => state
            .sessions
            .find_live(&sha256_hex(token))
            .await?
            .filter(|s| s.actor_id == ctx.actor_id)
            .map(|s| s.id),
        None => None,
    };
    let revoked = state.sessions.revoke_all_except(ctx.actor_id, spared).await?;
    Ok(Json(serde_json::json!({ "revoked": revoked })))
}
