//! Health probes, maintenance status, and CSRF token issuance.

use axum::extract::State;
use axum::http::header::SET_COOKIE;
use axum::response::{IntoResponse, Response};
use axum::Json;

use agw_cache::Cache as _;
use agw_store::ActorStore;

use crate::state::AppState;

pub async fn health(State(state): State<AppState>) -> Json<serde_json::Value> {
    Json(serde_json::json!({
        "status": "ok",
        "version": env!("CARGO_PKG_VERSION"),
        "env": state.config.server.env,
    }))
}

/// Readiness: the process is wired and its ports answer.
pub async fn ready(State(state): State<AppState>) -> Json<serde_json::Value> {
    let cache_ok = state.cache.get("readiness-probe").await.is_ok();
    let store_ok = state
        .actors
        .list(agw_domain::model::PageRequest { page: 1, per_page: 1 })
        .await
        .is_ok();
    Json(serde_json::json!({
        "status": if cache_ok && store_ok { "ready" } else { "degraded" },
        "cache": cache_ok,
        "store": store_ok,
        "audit_backlog": state.audit.pending(),
        "audit_dropped": state.audit.dropped(),
    }))
}

pub async fn live() -> Json<serde_json::Value> {
    Json(serde_json::json!({ "status": "alive" }))
}

pub async fn maintenance_status(State(state): State<AppState>) -> Json<serde_json::Value> {
    let status = state.maintenance.status().await;
    Json(serde_json::json!({
        "enabled": status.enabled,
        "message": status.message,
    }))
}

/// Issue a CSRF double-submit token: one value, as cookie and in the
/// body. Clients echo it in the configured header on state-changing
/// requests.
pub async fn csrf_token(State(state): State<AppState>) -> Response {
    let config = &state.config.server.csrf;
    let token = agw_credentials::random_alphanumeric(32);
    let cookie = format!(
        "{}={}; Path=/; SameSite=Strict; HttpOnly",
        config.cookie_name, token
    );

    let mut response = Json(serde_json::json!({
        "token": token,
        "header": config.header_name,
        "enabled": config.enabled,
    }))
    .into_response();
    if let Ok(value) = cookie.parse() {
        response.headers_mut().insert(SET_COOKIE, value);
    }
    response
}
