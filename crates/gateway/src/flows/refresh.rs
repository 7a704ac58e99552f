//! Refresh rotation, reuse detection, and logout.

use std::time::Duration;

use chrono::Utc;

use agw_credentials::{sha256_hex, TokenError};
use agw_domain::model::AuditOutcome;
use agw_domain::{CredentialFault, Error, Result};
use agw_store::ActorStore;

use crate::guard::ClientInfo;
use crate::state::AppState;
use crate::validate::AuthContext;

use super::{audit_auth, issue_pair, TokenPair};

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Refresh
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// Exchange a refresh token for a fresh pair, rotating the session.
///
/// Rotation is mandatory: the presented session is revoked and replaced
/// in one store transaction. A digest that matches a *revoked* session
/// is a reuse — someone is replaying a stolen token — so every session
/// of that actor is revoked and a `refresh-reuse` event is recorded.
pub async fn refresh(
    state: &AppState,
    refresh_token: &str,
    client: &ClientInfo,
) -> Result<TokenPair> {
    state.tokens.verify_refresh(refresh_token).map_err(|e| match e {
        TokenError::Expired => Error::Unauthenticated(CredentialFault::Expired),
        _ => Error::Unauthenticated(CredentialFault::Malformed),
    })?;

    let digest = sha256_hex(refresh_token);
    if let Some(session) = state.sessions.find_live(&digest).await? {
        let actor = state
            .actors
            .get(session.actor_id)
            .await?
            .ok_or_else(|| Error::Unauthenticated(CredentialFault::Revoked))?;
        if !actor.is_active {
            return Err(Error::Unauthenticated(CredentialFault::ActorInactive));
        }

        let tokens = issue_pair(state, &actor, client, Some(session.id)).await?;
        audit_auth(
            state,
            "refresh",
            AuditOutcome::Success,
            Some(actor.id),
            client,
            serde_json::Value::Null,
        );
        return Ok(tokens);
    }

    // Signature was ours but no live session holds the digest: replayed
    // after rotation, or after logout/expiry.
    if let Some(stale) = state.sessions.find_any(&digest).await? {
        let revoked = state
            .sessions
            .revoke_all_except(stale.actor_id, None)
            .await?;
        tracing::warn!(
            actor_id = %stale.actor_id,
            sessions_revoked = revoked,
            "refresh token reuse detected"
        );
        audit_auth(
            state,
            "refresh-reuse",
            AuditOutcome::Blocked,
            Some(stale.actor_id),
            client,
            serde_json::json!({ "sessions_revoked": revoked }),
        );
    }
    Err(Error::Unauthenticated(CredentialFault::Revoked))
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Logout
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// Blacklist the presented access assertion for its remaining lifetime
/// and revoke the session behind the presented refresh token.
pub async fn logout(
    state: &AppState,
    ctx: &AuthContext,
    refresh_token: Option<&str>,
    client: &ClientInfo,
) -> Result<()> {
    if let (Some(digest), Some(exp)) = (&ctx.token_digest, ctx.token_exp) {
        let remaining = (exp - Utc::now().timestamp()).max(0) as u64;
        state
            .blacklist
            .revoke(digest, Duration::from_secs(remaining))
            .await?;
    }

    if let Some(token) = refresh_token {
        let digest = sha256_hex(token);
        if let Some(session) = state.sessions.find_live(&digest).await? {
            if session.actor_id == ctx.actor_id {
                // Idempotent: a parallel logout may have won the race.
                let _ = state.sessions.revoke(session.id).await;
            }
        }
    }

    audit_auth(
        state,
        "logout",
        AuditOutcome::Success,
        Some(ctx.actor_id),
        client,
        serde_json::Value::Null,
    );
    Ok(())
}
