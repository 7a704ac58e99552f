//! Profile, password change, and email verification endpoints.

use axum::extract::State;
use axum::{Extension, Json};
use serde::Deserialize;

use agw_domain::model::{AuditOutcome, OtpPurpose};
use agw_domain::{validate, Error};
use agw_store::ActorStore;

use crate::api::error::ApiResult;
use crate::flows;
use crate::guard::ClientInfo;
use crate::state::AppState;
use crate::validate::AuthContext;

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// GET /api/auth/profile
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

pub async fn get_profile(
    State(state): State<AppState>,
    Extension(ctx): Extension<AuthContext>,
) -> ApiResult<Json<serde_json::Value>> {
    let actor = state
        .actors
        .get(ctx.actor_id)
        .await?
        .ok_or_else(|| Error::NotFound("actor".into()))?;
    Ok(Json(serde_json::json!({ "user": actor })))
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// PUT /api/auth/profile
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

#[derive(Debug, Deserialize)]
pub struct UpdateProfileBody {
    #[serde(default)]
    pub display_name: Option<String>,
    #[serde(default)]
    pub avatar_url: Option<String>,
    /// Changing the address resets its verified flag.
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub phone: Option<String>,
}

pub async fn update_profile(
    State(state): State<AppState>,
    Extension(ctx): Extension<AuthContext>,
    Extension(client): Extension<ClientInfo>,
    Json(body): Json<UpdateProfileBody>,
) -> ApiResult<Json<serde_json::Value>> {
    let mut actor = state
        .actors
        .get(ctx.actor_id)
        .await?
        .ok_or_else(|| Error::NotFound("actor".into()))?;

    if let Some(display_name) = body.display_name {
        actor.display_name = Some(display_name);
    }
    if let Some(avatar_url) = body.avatar_url {
        actor.avatar_url = Some(avatar_url);
    }
    if let Some(email) = body.email {
        validate::email(&email)?;
        let normalized = validate::normalize_email(&email);
        if actor.email.as_deref() != Some(normalized.as_str()) {
            actor.email = Some(normalized);
            actor.email_verified = false;
        }
    }
    if let Some(phone) = body.phone {
        validate::phone(&phone)?;
        if actor.phone.as_deref() != Some(phone.as_str()) {
            actor.phone = Some(phone);
            actor.phone_verified = false;
        }
    }

    state.actors.update(&actor).await?;
    flows::audit_auth(
        &state,
        "profile.update",
        AuditOutcome::Success,
        Some(actor.id),
        &client,
        serde_json::Value::Null,
    );
    Ok(Json(serde_json::json!({ "user": actor })))
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// POST /api/auth/change-password
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

#[derive(Debug, Deserialize)]
pub struct ChangePasswordBody {
    pub old_password: String,
    pub new_password: String,
    /// Identifies the session performing the change; it is the one
    /// spared by the bulk revocation.
    #[serde(default)]
    pub refresh_token: Option<String>,
}

pub async fn change_password(
    State(state): State<AppState>,
    Extension(ctx): Extension<AuthContext>,
    Extension(client): Extension<ClientInfo>,
    Json(body): Json<ChangePasswordBody>,
) -> ApiResult<Json<serde_json::Value>> {
    flows::password::change_password(
        &state,
        ctx.actor_id,
        &body.old_password,
        &body.new_password,
        body.refresh_token.as_deref(),
        &client,
    )
    .await?;
    Ok(Json(serde_json::json!({ "changed": true })))
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Email verification (public)
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

#[derive(Debug, Deserialize)]
pub struct ResendBody {
    pub email: String,
}

/// POST /api/auth/verify/resend. The response does not reveal whether
/// the address has an account.
pub async fn resend_verification(
    State(state): State<AppState>,
    Extension(client): Extension<ClientInfo>,
    Json(body): Json<ResendBody>,
) -> ApiResult<Json<serde_json::Value>> {
    flows::otp::send(&state, &body.email, OtpPurpose::VerifyEmail, &client).await?;
    Ok(Json(serde_json::json!({ "sent": true })))
}

#[derive(Debug, Deserialize)]
pub struct VerifyEmailBody {
    pub email: String,
    pub code: String,
}

/// POST /api/auth/verify/email — consume the code and mark the address
/// verified.
pub async fn verify_email(
    State(state): State<AppState>,
    Extension(client): Extension<ClientInfo>,
    Json(body): Json<VerifyEmailBody>,
) -> ApiResult<Json<serde_json::Value>> {
    let record =
        flows::otp::verify(&state, &body.email, OtpPurpose::VerifyEmail, &body.code, &client)
            .await?;
    if let Some(mut actor) = state.actors.find_by_email(&record.target).await? {
        actor.email_verified = true;
        state.actors.update(&actor).await?;
    }
    Ok(Json(serde_json::json!({ "verified": true })))
}
