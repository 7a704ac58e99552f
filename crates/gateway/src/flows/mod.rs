//! Authentication flows.
//!
//! Each flow orchestrates the token service, session registry, stores,
//! and outbound providers. Handlers stay thin: parse the request, call
//! the flow, map the response.

pub mod oauth;
pub mod otp;
pub mod password;
pub mod passwordless;
pub mod refresh;
pub mod twofactor;

use chrono::Utc;
use serde::Serialize;
use uuid::Uuid;

use agw_domain::model::{Actor, AuditEvent, AuditOutcome};
use agw_domain::Result;
use agw_sessions::parse_user_agent;

use crate::guard::ClientInfo;
use crate::state::AppState;

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Token pair issuance
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// The access+refresh pair returned by every successful login-shaped
/// flow.
#[derive(Debug, Clone, Serialize)]
pub struct TokenPair {
    pub access_token: String,
    pub refresh_token: String,
    pub token_type: &'static str,
    /// Access-token lifetime in seconds.
    pub expires_in: i64,
}

/// Mint an access+refresh pair and bind the refresh to a session,
/// rotating `rotate_from` when this is a refresh flow.
pub async fn issue_pair(
    state: &AppState,
    actor: &Actor,
    client: &ClientInfo,
    rotate_from: Option<Uuid>,
) -> Result<TokenPair> {
    let role = state.authz.role_name(actor.role_id, actor.legacy_role());
    let (access_token, _claims) =
        state
            .tokens
            .mint_access(actor.id, &actor.username, actor.email.as_deref(), &role)?;
    let refresh = state.tokens.mint_refresh(actor.id)?;

    let device = client
        .user_agent
        .as_deref()
        .map(parse_user_agent)
        .unwrap_or_default();
    state
        .sessions
        .create(
            actor.id,
            device,
            client.ip_string(),
            client.user_agent.clone(),
            refresh.digest,
            refresh.expires_at,
            rotate_from,
        )
        .await?;

    Ok(TokenPair {
        access_token,
        refresh_token: refresh.token,
        token_type: "Bearer",
        expires_in: state.tokens.access_ttl_secs(),
    })
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Audit shorthand
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// Record an authentication-surface audit event.
pub fn audit_auth(
    state: &AppState,
    action: &str,
    outcome: AuditOutcome,
    actor_id: Option<Uuid>,
    client: &ClientInfo,
    details: serde_json::Value,
) {
    let mut event = AuditEvent::new(action, "auth", outcome)
        .client(client.ip_string(), client.user_agent.clone())
        .details(details);
    event.actor_id = actor_id;
    event.created_at = Utc::now();
    state.audit.record(event);
}
