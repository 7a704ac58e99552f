//! Generic OTP endpoints plus the password-reset and passwordless
//! surfaces built on them.

use std::time::Duration;

use axum::extract::State;
use axum::{Extension, Json};
use serde::Deserialize;

use agw_cache::{keys, Cache as _};
use agw_domain::model::{AuditOutcome, OtpPurpose};
use agw_domain::{validate, CredentialFault, Error};
use agw_store::ActorStore;

use crate::api::error::ApiResult;
use crate::flows;
use crate::guard::ClientInfo;
use crate::state::AppState;

const RESET_TICKET_TTL: Duration = Duration::from_secs(600);

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// POST /api/otp/send
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

#[derive(Debug, Deserialize)]
pub struct SendBody {
    /// Email address or E.164 phone number.
    pub target: String,
    pub purpose: OtpPurpose,
}

pub async fn send(
    State(state): State<AppState>,
    Extension(client): Extension<ClientInfo>,
    Json(body): Json<SendBody>,
) -> ApiResult<Json<serde_json::Value>> {
    if body.purpose == OtpPurpose::SecondFactorLogin {
        return Err(Error::Validation(
            "second-factor codes are issued by the signin flow".into(),
        )
        .into());
    }
    flows::otp::send(&state, &body.target, body.purpose, &client).await?;
    Ok(Json(serde_json::json!({ "sent": true })))
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// POST /api/otp/verify
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

#[derive(Debug, Deserialize)]
pub struct VerifyBody {
    pub target: String,
    pub purpose: OtpPurpose,
    pub code: String,
}

/// Consume a code; the response depends on the purpose. Verification
/// purposes flip the matching flag, reset-password returns a scoped
/// ticket, passwordless issues a token pair.
pub async fn verify(
    State(state): State<AppState>,
    Extension(client): Extension<ClientInfo>,
    Json(body): Json<VerifyBody>,
) -> ApiResult<Json<serde_json::Value>> {
    match body.purpose {
        OtpPurpose::Passwordless => {
            let (actor, tokens) =
                flows::passwordless::verify(&state, &body.target, &body.code, &client).await?;
            Ok(Json(serde_json::json!({
                "user": actor,
                "access_token": tokens.access_token,
                "refresh_token": tokens.refresh_token,
                "token_type": tokens.token_type,
                "expires_in": tokens.expires_in,
            })))
        }
        OtpPurpose::ResetPassword => {
            let record =
                flows::otp::verify(&state, &body.target, body.purpose, &body.code, &client)
                    .await?;
            let ticket = issue_reset_ticket(&state, &record.target).await?;
            Ok(Json(serde_json::json!({ "reset_ticket": ticket })))
        }
        OtpPurpose::VerifyEmail | OtpPurpose::VerifyPhone => {
            let record =
                flows::otp::verify(&state, &body.target, body.purpose, &body.code, &client)
                    .await?;
            let actor = if body.purpose == OtpPurpose::VerifyEmail {
                state.actors.find_by_email(&record.target).await?
            } else {
                state.actors.find_by_phone(&record.target).await?
            };
            if let Some(mut actor) = actor {
                if body.purpose == OtpPurpose::VerifyEmail {
                    actor.email_verified = true;
                } else {
                    actor.phone_verified = true;
                }
                state.actors.update(&actor).await?;
            }
            Ok(Json(serde_json::json!({ "verified": true })))
        }
        OtpPurpose::SecondFactorLogin => Err(Error::Validation(
            "second-factor codes are verified by /auth/2fa/login/verify".into(),
        )
        .into()),
    }
}

async fn issue_reset_ticket(state: &AppState, target: &str) -> Result<String, Error> {
    let ticket = agw_credentials::random_alphanumeric(32);
    state
        .cache
        .set(&keys::state("reset", &ticket), target, Some(RESET_TICKET_TTL))
        .await?;
    Ok(ticket)
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Password reset
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

#[derive(Debug, Deserialize)]
pub struct ResetRequestBody {
    pub target: String,
}

/// POST /api/auth/password/reset/request. Same response whether or not
/// the target has an account.
pub async fn reset_request(
    State(state): State<AppState>,
    Extension(client): Extension<ClientInfo>,
    Json(body): Json<ResetRequestBody>,
) -> ApiResult<Json<serde_json::Value>> {
    flows::otp::send(&state, &body.target, OtpPurpose::ResetPassword, &client).await?;
    Ok(Json(serde_json::json!({ "sent": true })))
}

#[derive(Debug, Deserialize)]
pub struct ResetCompleteBody {
    /// Either a ticket from /otp/verify …
    #[serde(default)]
    pub reset_ticket: Option<String>,
    /// … or the target+code pair directly.
    #[serde(default)]
    pub target: Option<String>,
    #[serde(default)]
    pub code: Option<String>,
    pub new_password: String,
}

/// POST /api/auth/password/reset/complete — set the new password and
/// revoke every session of the actor.
pub async fn reset_complete(
    State(state): State<AppState>,
    Extension(client): Extension<ClientInfo>,
    Json(body): Json<ResetCompleteBody>,
) -> ApiResult<Json<serde_json::Value>> {
    validate::password(&body.new_password)?;

    let target = match (&body.reset_ticket, &body.target, &body.code) {
        (Some(ticket), _, _) => state
            .cache
            .take(&keys::state("reset", ticket))
            .await?
            .ok_or(Error::Unauthenticated(CredentialFault::Expired))?,
        (None, Some(target), Some(code)) => {
            flows::otp::verify(&state, target, OtpPurpose::ResetPassword, code, &client)
                .await?
                .target
        }
        _ => {
            return Err(Error::Validation(
                "provide reset_ticket, or target and code".into(),
            )
            .into())
        }
    };

    let actor = if target.contains('@') {
        state.actors.find_by_email(&target).await?
    } else {
        state.actors.find_by_phone(&target).await?
    };
    let Some(mut actor) = actor else {
        // The code proved channel ownership, but nothing is attached to
        // it; answer like a bad code to keep account presence hidden.
        return Err(Error::Unauthenticated(CredentialFault::BadCredentials).into());
    };

    actor.password_hash = Some(state.hasher.hash(&body.new_password)?);
    state.actors.update(&actor).await?;
    state.sessions.revoke_all_except(actor.id, None).await?;

    flows::audit_auth(
        &state,
        "password.reset",
        AuditOutcome::Success,
        Some(actor.id),
        &client,
        serde_json::Value::Null,
    );
    Ok(Json(serde_json::json!({ "reset": true })))
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Passwordless
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

#[derive(Debug, Deserialize)]
pub struct PasswordlessRequestBody {
    pub target: String,
}

pub async fn passwordless_request(
    State(state): State<AppState>,
    Extension(client): Extension<ClientInfo>,
    Json(body): Json<PasswordlessRequestBody>,
) -> ApiResult<Json<serde_json::Value>> {
    flows::passwordless::request(&state, &body.target, &client).await?;
    Ok(Json(serde_json::json!({ "sent": true })))
}

#[derive(Debug, Deserialize)]
pub struct PasswordlessVerifyBody {
    pub target: String,
    pub code: String,
}

pub async fn passwordless_verify(
    State(state): State<AppState>,
    Extension(client): Extension<ClientInfo>,
    Json(body): Json<PasswordlessVerifyBody>,
) -> ApiResult<Json<serde_json::Value>> {
    let (actor, tokens) =
        flows::passwordless::verify(&state, &body.target, &body.code, &client).await?;
    Ok(Json(serde_json::json!({
        "user": actor,
        "access_token": tokens.access_token,
        "refresh_token": tokens.refresh_token,
        "token_type": tokens.token_type,
        "expires_in": tokens.expires_in,
    })))
}
