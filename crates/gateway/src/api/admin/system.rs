//! System administration: statistics, audit listing, IP filter rules,
//! maintenance mode, branding, and session administration.

use axum::extract::{Path, Query, State};
use axum::{Extension, Json};
use serde::Deserialize;
use uuid::Uuid;

use agw_cache::keys;
use agw_domain::model::{
    AuditEvent, AuditOutcome, IpRuleKind, PageRequest,
};
use agw_store::{ActorStore, AuditFilter, AuditStore};

use crate::api::error::ApiResult;
use crate::guard::ClientInfo;
use crate::state::AppState;
use crate::validate::AuthContext;

fn system_audit(
    state: &AppState,
    ctx: &AuthContext,
    client: &ClientInfo,
    action: &str,
    resource_kind: &str,
    resource_id: String,
) {
    state.audit.record(
        AuditEvent::new(action, resource_kind, AuditOutcome::Success)
            .actor(ctx.actor_id)
            .resource(resource_id)
            .client(client.ip_string(), client.user_agent.clone()),
    );
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// GET /api/admin/stats
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

pub async fn stats(State(state): State<AppState>) -> ApiResult<Json<serde_json::Value>> {
    let sessions = state.sessions.stats().await?;
    let actors = state
        .actors
        .list(PageRequest { page: 1, per_page: 1 })
        .await?;
    Ok(Json(serde_json::json!({
        "actors_total": actors.total,
        "sessions": sessions,
        "audit_backlog": state.audit.pending(),
        "audit_dropped": state.audit.dropped(),
    })))
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Audit listing
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

#[derive(Debug, Deserialize)]
pub struct AuditQuery {
    #[serde(default = "d_page")]
    pub page: u64,
    #[serde(default = "d_per_page")]
    pub per_page: u64,
    #[serde(default)]
    pub actor_id: Option<Uuid>,
    #[serde(default)]
    pub action: Option<String>,
}

fn d_page() -> u64 {
    1
}
fn d_per_page() -> u64 {
    20
}

pub async fn list_audit(
    State(state): State<AppState>,
    Query(query): Query<AuditQuery>,
) -> ApiResult<Json<serde_json::Value>> {
    let page = state
        .audit_store
        .list(
            AuditFilter {
                actor_id: query.actor_id,
                action: query.action,
                outcome: None,
            },
            PageRequest {
                page: query.page,
                per_page: query.per_page,
            },
        )
        .await?;
    Ok(Json(serde_json::json!(page)))
}

/// GET /api/admin/audit/geo — country → event count.
pub async fn geo_distribution(
    State(state): State<AppState>,
) -> ApiResult<Json<serde_json::Value>> {
    let counts = state.audit_store.geo_counts().await?;
    Ok(Json(serde_json::json!({ "countries": counts })))
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// IP filter rules
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

pub async fn list_ip_rules(State(state): State<AppState>) -> ApiResult<Json<serde_json::Value>> {
    Ok(Json(serde_json::json!({ "rules": *state.ip_filter.rules() })))
}

#[derive(Debug, Deserialize)]
pub struct CreateIpRuleBody {
    pub cidr: String,
    pub kind: IpRuleKind,
    #[serde(default)]
    pub description: String,
}

pub async fn create_ip_rule(
    State(state): State<AppState>,
    Extension(ctx): Extension<AuthContext>,
    Extension(client): Extension<ClientInfo>,
    Json(body): Json<CreateIpRuleBody>,
) -> ApiResult<Json<serde_json::Value>> {
    let rule = state
        .ip_filter
        .add_rule(&body.cidr, body.kind, &body.description)
        .await?;
    system_audit(&state, &ctx, &client, "ip-rule.create", "ip-filter", rule.id.to_string());
    Ok(Json(serde_json::json!({ "rule": rule })))
}

pub async fn delete_ip_rule(
    State(state): State<AppState>,
    Extension(ctx): Extension<AuthContext>,
    Extension(client): Extension<ClientInfo>,
    Path(id): Path<Uuid>,
) -> ApiResult<Json<serde_json::Value>> {
    state.ip_filter.delete_rule(id).await?;
    system_audit(&state, &ctx, &client, "ip-rule.delete", "ip-filter", id.to_string());
    Ok(Json(serde_json::json!({ "deleted": true })))
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Maintenance & branding
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

#[derive(Debug, Deserialize)]
pub struct MaintenanceBody {
    pub enabled: bool,
    #[serde(default)]
    pub message: String,
}

pub async fn set_maintenance(
    State(state): State<AppState>,
    Extension(ctx): Extension<AuthContext>,
    Extension(client): Extension<ClientInfo>,
    Json(body): Json<MaintenanceBody>,
) -> ApiResult<Json<serde_json::Value>> {
    state.maintenance.set(body.enabled, &body.message).await?;
    system_audit(
        &state,
        &ctx,
        &client,
        "maintenance.set",
        "system",
        body.enabled.to_string(),
    );
    Ok(Json(serde_json::json!({ "enabled": body.enabled })))
}

/// Branding is a small JSON document the login UI reads; the gateway
/// only stores and serves it.
pub async fn get_branding(State(state): State<AppState>) -> ApiResult<Json<serde_json::Value>> {
    let branding = state
        .cache
        .get(&keys::state("branding", "current"))
        .await?
        .and_then(|raw| serde_json::from_str(&raw).ok())
        .unwrap_or_else(|| serde_json::json!({}));
    Ok(Json(serde_json::json!({ "branding": branding })))
}

pub async fn set_branding(
    State(state): State<AppState>,
    Extension(ctx): Extension<AuthContext>,
    Extension(client): Extension<ClientInfo>,
    Json(body): Json<serde_json::Value>,
) -> ApiResult<Json<serde_json::Value>> {
    state
        .cache
        .set(&keys::state("branding", "current"), &body.to_string(), None)
        .await?;
    system_audit(&state, &ctx, &client, "branding.set", "system", String::new());
    Ok(Json(serde_json::json!({ "branding": body })))
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Session administration
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

pub async fn list_sessions(
    State(state): State<AppState>,
    Query(page): Query<PageRequest>,
) -> ApiResult<Json<serde_json::Value>> {
    let page = state.sessions.list_all(page).await?;
    Ok(Json(serde_json::json!(page)))
}

pub async fn revoke_session(
    State(state): State<AppState>,
    Extension(ctx): Extension<AuthContext>,
    Extension(client): Extension<ClientInfo>,
    Path(id): Path<Uuid>,
) -> ApiResult<Json<serde_json::Value>> {
    state.sessions.revoke(id).await?;
    system_audit(&state, &ctx, &client, "session.revoke", "sessions", id.to_string());
    Ok(Json(serde_json::json!({ "revoked": true })))
}

/// DELETE /api/admin/users/:id/sessions — kick an actor everywhere.
pub async fn revoke_actor_sessions(
    State(state): State<AppState>,
    Extension(ctx): Extension<AuthContext>,
    Extension(client): Extension<ClientInfo>,
    Path(id): Path<Uuid>,
) -> ApiResult<Json<serde_json::Value>> {
    let revoked = state.sessions.revoke_all_except(id, None).await?;
    system_audit(&state, &ctx, &client, "session.revoke-all", "sessions", id.to_string());
    Ok(Json(serde_json::json!({ "revoked": revoked })))
}
