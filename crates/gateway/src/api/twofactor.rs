//! Second-factor management endpoints (protected).

use axum::extract::State;
use axum::{Extension, Json};
use serde::Deserialize;

use crate::api::error::ApiResult;
use crate::flows;
use crate::guard::ClientInfo;
use crate::state::AppState;
use crate::validate::AuthContext;

pub async fn setup(
    State(state): State<AppState>,
    Extension(ctx): Extension<AuthContext>,
) -> ApiResult<Json<flows::twofactor::TotpSetup>> {
    Ok(Json(flows::twofactor::setup(&state, ctx.actor_id).await?))
}

#[derive(Debug, Deserialize)]
pub struct VerifyBody {
    pub code: String,
}

pub async fn verify(
    State(state): State<AppState>,
    Extension(ctx): Extension<AuthContext>,
    Extension(client): Extension<ClientInfo>,
    Json(body): Json<VerifyBody>,
) -> ApiResult<Json<serde_json::Value>> {
    flows::twofactor::verify_enable(&state, ctx.actor_id, &body.code, &client).await?;
    Ok(Json(serde_json::json!({ "totp_enabled": true })))
}

#[derive(Debug, Deserialize)]
pub struct DisableBody {
    #[serde(default)]
    pub password: Option<String>,
    #[serde(default)]
    pub code: Option<String>,
}

pub async fn disable(
    State(state): State<AppState>,
    Extension(ctx): Extension<AuthContext>,
    Extension(client): Extension<ClientInfo>,
    Json(body): Json<DisableBody>,
) -> ApiResult<Json<serde_json::Value>> {
    flows::twofactor::disable(
        &state,
        ctx.actor_id,
        body.password.as_deref(),
        body.code.as_deref(),
        &client,
    )
    .await?;
    Ok(Json(serde_json::json!({ "totp_enabled": false })))
}

pub async fn status(
    State(state): State<AppState>,
    Extension(ctx): Extension<AuthContext>,
) -> ApiResult<Json<flows::twofactor::TotpStatus>> {
    Ok(Json(flows::twofactor::status(&state, ctx.actor_id).await?))
}

pub async fn regenerate_backup_codes(
    State(state): State<AppState>,
    Extension(ctx): Extension<AuthContext>,
    Extension(client): Extension<ClientInfo>,
) -> ApiResult<Json<serde_json::Value>> {
    let codes =
        flows::twofactor::regenerate_backup_codes(&state, ctx.actor_id, &client).await?;
    Ok(Json(serde_json::json!({ "backup_codes": codes })))
}
