//! Admin user management.

use axum::extract::{Path, Query, State};
use axum::{Extension, Json};
use serde::Deserialize;
use uuid::Uuid;

use agw_domain::model::{
    ActorKind, AuditEvent, AuditOutcome, NewActor, PageRequest, DEFAULT_ROLE,
};
use agw_domain::{validate, Error};
use agw_store::{ActorStore, RoleStore};

use crate::api::error::ApiResult;
use crate::guard::ClientInfo;
use crate::state::AppState;
use crate::validate::AuthContext;

fn admin_audit(
    state: &AppState,
    ctx: &AuthContext,
    client: &ClientInfo,
    action: &str,
    resource_id: String,
) {
    state.audit.record(
        AuditEvent::new(action, "users", AuditOutcome::Success)
            .actor(ctx.actor_id)
            .resource(resource_id)
            .client(client.ip_string(), client.user_agent.clone()),
    );
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// GET /api/admin/users
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

pub async fn list(
    State(state): State<AppState>,
    Query(page): Query<PageRequest>,
) -> ApiResult<Json<serde_json::Value>> {
    let page = state.actors.list(page).await?;
    Ok(Json(serde_json::json!(page)))
}

pub async fn get(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> ApiResult<Json<serde_json::Value>> {
    let actor = state
        .actors
        .get(id)
        .await?
        .ok_or_else(|| Error::NotFound("actor".into()))?;
    Ok(Json(serde_json::json!({ "user": actor })))
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// POST /api/admin/users — admin import
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

#[derive(Debug, Deserialize)]
pub struct CreateUserBody {
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub phone: Option<String>,
    pub username: String,
    #[serde(default)]
    pub password: Option<String>,
    #[serde(default)]
    pub display_name: Option<String>,
    #[serde(default)]
    pub kind: ActorKind,
    /// Admin-created accounts may arrive pre-verified (directory
    /// imports).
    #[serde(default)]
    pub email_verified: bool,
    #[serde(default)]
    pub role: Option<String>,
}

pub async fn create(
    State(state): State<AppState>,
    Extension(ctx): Extension<AuthContext>,
    Extension(client): Extension<ClientInfo>,
    Json(body): Json<CreateUserBody>,
) -> ApiResult<Json<serde_json::Value>> {
    validate::username(&body.username)?;
    let email = match body.email.as_deref() {
        Some(raw) => {
            validate::email(raw)?;
            Some(validate::normalize_email(raw))
        }
        None => None,
    };
    if let Some(phone) = body.phone.as_deref() {
        validate::phone(phone)?;
    }
    let password_hash = match body.password.as_deref() {
        Some(password) => {
            validate::password(password)?;
            Some(state.hasher.hash(password)?)
        }
        None => None,
    };

    let role_name = body.role.as_deref().unwrap_or(DEFAULT_ROLE);
    let role = state
        .roles
        .find_role_by_name(role_name)
        .await?
        .ok_or_else(|| Error::NotFound(format!("role '{role_name}'")))?;

    let actor = state
        .actors
        .insert(NewActor {
            email,
            phone: body.phone,
            username: body.username,
            password_hash,
            display_name: body.display_name,
            avatar_url: None,
            role_id: Some(role.id),
            role: role.name,
            kind: body.kind,
            email_verified: body.email_verified,
            phone_verified: false,
        })
        .await?;

    admin_audit(&state, &ctx, &client, "user.create", actor.id.to_string());
    Ok(Json(serde_json::json!({ "user": actor })))
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// PUT /api/admin/users/:id
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

#[derive(Debug, Deserialize)]
pub struct UpdateUserBody {
    #[serde(default)]
    pub display_name: Option<String>,
    #[serde(default)]
    pub is_active: Option<bool>,
    #[serde(default)]
    pub email_verified: Option<bool>,
    #[serde(default)]
    pub phone_verified: Option<bool>,
}

pub async fn update(
    State(state): State<AppState>,
    Extension(ctx): Extension<AuthContext>,
    Extension(client): Extension<ClientInfo>,
    Path(id): Path<Uuid>,
    Json(body): Json<UpdateUserBody>,
) -> ApiResult<Json<serde_json::Value>> {
    let mut actor = state
        .actors
        .get(id)
        .await?
        .ok_or_else(|| Error::NotFound("actor".into()))?;

    if let Some(display_name) = body.display_name {
        actor.display_name = Some(display_name);
    }
    if let Some(is_active) = body.is_active {
        actor.is_active = is_active;
    }
    if let Some(email_verified) = body.email_verified {
        actor.email_verified = email_verified;
    }
    if let Some(phone_verified) = body.phone_verified {
        actor.phone_verified = phone_verified;
    }
    state.actors.update(&actor).await?;

    admin_audit(&state, &ctx, &client, "user.update", id.to_string());
    Ok(Json(serde_json::json!({ "user": actor })))
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// DELETE /api/admin/users/:id — deactivate, never delete
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

pub async fn deactivate(
    State(state): State<AppState>,
    Extension(ctx): Extension<AuthContext>,
    Extension(client): Extension<ClientInfo>,
    Path(id): Path<Uuid>,
) -> ApiResult<Json<serde_json::Value>> {
    if id == ctx.actor_id {
        return Err(Error::Conflict("cannot deactivate your own account".into()).into());
    }
    let mut actor = state
        .actors
        .get(id)
        .await?
        .ok_or_else(|| Error::NotFound("actor".into()))?;
    actor.is_active = false;
    state.actors.update(&actor).await?;

    // A deactivated actor keeps no live sessions.
    state.sessions.revoke_all_except(id, None).await?;

    admin_audit(&state, &ctx, &client, "user.deactivate", id.to_string());
    Ok(Json(serde_json::json!({ "deactivated": true })))
}
