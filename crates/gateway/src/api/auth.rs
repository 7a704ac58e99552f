//! Core authentication endpoints: signup, signin, refresh, logout, the
//! second-factor login step, and the third-party provider redirects.

use axum::extract::{Path, Query, State};
use axum::response::{IntoResponse, Redirect, Response};
use axum::{Extension, Json};
use serde::Deserialize;

use crate::api::error::ApiResult;
use crate::flows;
use crate::guard::ClientInfo;
use crate::state::AppState;
use crate::validate::AuthContext;

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// POST /api/auth/signup
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

pub async fn signup(
    State(state): State<AppState>,
    Extension(client): Extension<ClientInfo>,
    Json(body): Json<flows::password::SignupInput>,
) -> ApiResult<Json<serde_json::Value>> {
    let outcome = flows::password::signup(&state, body, &client).await?;
    Ok(Json(serde_json::json!({
        "user": outcome.actor,
        "access_token": outcome.tokens.access_token,
        "refresh_token": outcome.tokens.refresh_token,
        "token_type": outcome.tokens.token_type,
        "expires_in": outcome.tokens.expires_in,
    })))
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// POST /api/auth/signin
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

#[derive(Debug, Deserialize)]
pub struct SigninBody {
    /// Email address or E.164 phone number.
    pub identifier: String,
    pub password: String,
}

pub async fn signin(
    State(state): State<AppState>,
    Extension(client): Extension<ClientInfo>,
    Json(body): Json<SigninBody>,
) -> ApiResult<Json<serde_json::Value>> {
    match flows::password::signin(&state, &body.identifier, &body.password, &client).await? {
        flows::password::SigninOutcome::Tokens(tokens) => Ok(Json(serde_json::json!(tokens))),
        flows::password::SigninOutcome::SecondFactor { two_factor_token } => {
            Ok(Json(serde_json::json!({
                "requires_2fa": true,
                "two_factor_token": two_factor_token,
            })))
        }
    }
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// POST /api/auth/2fa/login/verify
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

#[derive(Debug, Deserialize)]
pub struct TwoFaLoginBody {
    pub two_factor_token: String,
    /// 6-digit TOTP code or a backup code.
    pub code: String,
}

pub async fn twofa_login_verify(
    State(state): State<AppState>,
    Extension(client): Extension<ClientInfo>,
    Json(body): Json<TwoFaLoginBody>,
) -> ApiResult<Json<flows::TokenPair>> {
    let tokens =
        flows::twofactor::login_verify(&state, &body.two_factor_token, &body.code, &client)
            .await?;
    Ok(Json(tokens))
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// POST /api/auth/refresh
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

#[derive(Debug, Deserialize)]
pub struct RefreshBody {
    pub refresh_token: String,
}

pub async fn refresh(
    State(state): State<AppState>,
    Extension(client): Extension<ClientInfo>,
    Json(body): Json<RefreshBody>,
) -> ApiResult<Json<flows::TokenPair>> {
    let tokens = flows::refresh::refresh(&state, &body.refresh_token, &client).await?;
    Ok(Json(tokens))
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// POST /api/auth/logout
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

#[derive(Debug, Default, Deserialize)]
pub struct LogoutBody {
    #[serde(default)]
    pub refresh_token: Option<String>,
}

pub async fn logout(
    State(state): State<AppState>,
    Extension(client): Extension<ClientInfo>,
    Extension(ctx): Extension<AuthContext>,
    body: Option<Json<LogoutBody>>,
) -> ApiResult<Json<serde_json::Value>> {
    let body = body.map(|Json(b)| b).unwrap_or_default();
    flows::refresh::logout(&state, &ctx, body.refresh_token.as_deref(), &client).await?;
    Ok(Json(serde_json::json!({ "logged_out": true })))
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Third-party providers
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

pub async fn providers(State(state): State<AppState>) -> Json<serde_json::Value> {
    Json(serde_json::json!({ "providers": state.providers.idp_names() }))
}

/// GET /api/auth/:provider — redirect the browser to the provider.
pub async fn provider_start(
    State(state): State<AppState>,
    Path(provider): Path<String>,
) -> ApiResult<Response> {
    let url = flows::oauth::start(&state, &provider).await?;
    Ok(Redirect::temporary(&url).into_response())
}

#[derive(Debug, Deserialize)]
pub struct CallbackQuery {
    pub code: String,
    pub state: String,
}

/// GET /api/auth/:provider/callback — complete the redirect flow.
pub async fn provider_callback(
    State(state): State<AppState>,
    Extension(client): Extension<ClientInfo>,
    Path(provider): Path<String>,
    Query(query): Query<CallbackQuery>,
) -> ApiResult<Json<serde_json::Value>> {
    let (actor, tokens) =
        flows::oauth::callback(&state, &provider, &query.state, &query.code, &client).await?;
    Ok(Json(serde_json::json!({
        "user": actor,
        "access_token": tokens.access_token,
        "refresh_token": tokens.refresh_token,
        "token_type": tokens.token_type,
        "expires_in": tokens.expires_in,
    })))
}
