//! Role and permission administration.

use axum::extract::{Path, State};
use axum::{Extension, Json};
use serde::Deserialize;
use uuid::Uuid;

use agw_domain::model::{AuditEvent, AuditOutcome};
use agw_store::RoleStore;

use crate::api::error::ApiResult;
use crate::guard::ClientInfo;
use crate::state::AppState;
use crate::validate::AuthContext;

fn rbac_audit(
    state: &AppState,
    ctx: &AuthContext,
    client: &ClientInfo,
    action: &str,
    resource_id: String,
) {
    state.audit.record(
        AuditEvent::new(action, "rbac", AuditOutcome::Success)
            .actor(ctx.actor_id)
            .resource(resource_id)
            .client(client.ip_string(), client.user_agent.clone()),
    );
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Roles
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

pub async fn list_roles(State(state): State<AppState>) -> ApiResult<Json<serde_json::Value>> {
    let roles = state.roles.list_roles().await?;
    Ok(Json(serde_json::json!({ "roles": roles })))
}

#[derive(Debug, Deserialize)]
pub struct CreateRoleBody {
    pub name: String,
    pub display_name: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub permission_ids: Vec<Uuid>,
}

pub async fn create_role(
    State(state): State<AppState>,
    Extension(ctx): Extension<AuthContext>,
    Extension(client): Extension<ClientInfo>,
    Json(body): Json<CreateRoleBody>,
) -> ApiResult<Json<serde_json::Value>> {
    let role = state
        .authz
        .create_role(&body.name, &body.display_name, &body.description, body.permission_ids)
        .await?;
    rbac_audit(&state, &ctx, &client, "role.create", role.id.to_string());
    Ok(Json(serde_json::json!({ "role": role })))
}

#[derive(Debug, Deserialize)]
pub struct UpdateRoleBody {
    #[serde(default)]
    pub display_name: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub permission_ids: Option<Vec<Uuid>>,
}

pub async fn update_role(
    State(state): State<AppState>,
    Extension(ctx): Extension<AuthContext>,
    Extension(client): Extension<ClientInfo>,
    Path(id): Path<Uuid>,
    Json(body): Json<UpdateRoleBody>,
) -> ApiResult<Json<serde_json::Value>> {
    let role = state
        .authz
        .update_role(id, body.display_name, body.description, body.permission_ids)
        .await?;
    rbac_audit(&state, &ctx, &client, "role.update", id.to_string());
    Ok(Json(serde_json::json!({ "role": role })))
}

pub async fn delete_role(
    State(state): State<AppState>,
    Extension(ctx): Extension<AuthContext>,
    Extension(client): Extension<ClientInfo>,
    Path(id): Path<Uuid>,
) -> ApiResult<Json<serde_json::Value>> {
    state.authz.delete_role(id).await?;
    rbac_audit(&state, &ctx, &client, "role.delete", id.to_string());
    Ok(Json(serde_json::json!({ "deleted": true })))
}

pub async fn grant_permission(
    State(state): State<AppState>,
    Extension(ctx): Extension<AuthContext>,
    Extension(client): Extension<ClientInfo>,
    Path((id, permission_id)): Path<(Uuid, Uuid)>,
) -> ApiResult<Json<serde_json::Value>> {
    let role = state.authz.set_role_permission(id, permission_id, true).await?;
    rbac_audit(&state, &ctx, &client, "role.grant", format!("{id}:{permission_id}"));
    Ok(Json(serde_json::json!({ "role": role })))
}

pub async fn revoke_permission(
    State(state): State<AppState>,
    Extension(ctx): Extension<AuthContext>,
    Extension(client): Extension<ClientInfo>,
    Path((id, permission_id)): Path<(Uuid, Uuid)>,
) -> ApiResult<Json<serde_json::Value>> {
    let role = state.authz.set_role_permission(id, permission_id, false).await?;
    rbac_audit(&state, &ctx, &client, "role.revoke", format!("{id}:{permission_id}"));
    Ok(Json(serde_json::json!({ "role": role })))
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Permissions
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

pub async fn list_permissions(
    State(state): State<AppState>,
) -> ApiResult<Json<serde_json::Value>> {
    let permissions = state.roles.list_permissions().await?;
    Ok(Json(serde_json::json!({ "permissions": permissions })))
}

#[derive(Debug, Deserialize)]
pub struct CreatePermissionBody {
    pub name: String,
    pub resource: String,
    pub action: String,
    #[serde(default)]
    pub description: String,
}

pub async fn create_permission(
    State(state): State<AppState>,
    Extension(ctx): Extension<AuthContext>,
    Extension(client): Extension<ClientInfo>,
    Json(body): Json<CreatePermissionBody>,
) -> ApiResult<Json<serde_json::Value>> {
    let permission = state
        .authz
        .create_permission(&body.name, &body.resource, &body.action, &body.description)
        .await?;
    rbac_audit(&state, &ctx, &client, "permission.create", permission.id.to_string());
    Ok(Json(serde_json::json!({ "permission": permission })))
}

#[derive(Debug, Deserialize)]
pub struct UpdatePermissionBody {
    #[serde(default)]
    pub description: Option<String>,
}

pub async fn update_permission(
    State(state): State<AppState>,
    Extension(ctx): Extension<AuthContext>,
    Extension(client): Extension<ClientInfo>,
    Path(id): Path<Uuid>,
    Json(body): Json<UpdatePermissionBody>,
) -> ApiResult<Json<serde_json::Value>> {
    let permission = state.authz.update_permission(id, body.description).await?;
    rbac_audit(&state, &ctx, &client, "permission.update", id.to_string());
    Ok(Json(serde_json::json!({ "permission": permission })))
}

pub async fn delete_permission(
    State(state): State<AppState>,
    Extension(ctx): Extension<AuthContext>,
    Extension(client): Extension<ClientInfo>,
    Path(id): Path<Uuid>,
) -> ApiResult<Json<serde_json::Value>> {
    state.authz.delete_permission(id).await?;
    rbac_audit(&state, &ctx, &client, "permission.delete", id.to_string());
    Ok(Json(serde_json::json!({ "deleted": true })))
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Assignment & export
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

#[derive(Debug, Deserialize)]
pub struct AssignRoleBody {
    pub role_id: Uuid,
}

/// PUT /api/admin/users/:id/role
pub async fn assign_role(
    State(state): State<AppState>,
    Extension(ctx): Extension<AuthContext>,
    Extension(client): Extension<ClientInfo>,
    Path(id): Path<Uuid>,
    Json(body): Json<AssignRoleBody>,
) -> ApiResult<Json<serde_json::Value>> {
    state.authz.assign_role(id, body.role_id).await?;
    rbac_audit(&state, &ctx, &client, "role.assign", format!("{id}:{}", body.role_id));
    Ok(Json(serde_json::json!({ "assigned": true })))
}

/// GET /api/admin/matrix — full role→permission export.
pub async fn export_matrix(State(state): State<AppState>) -> ApiResult<Json<serde_json::Value>> {
    let export = state.authz.export().await?;
    Ok(Json(serde_json::json!(export)))
}
