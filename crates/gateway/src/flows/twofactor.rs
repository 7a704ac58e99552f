//! TOTP second factor: enrollment, login verification, backup codes.

use chrono::Utc;
use serde::Serialize;
use uuid::Uuid;

use agw_credentials::{backup, totp};
use agw_domain::model::{Actor, AuditOutcome};
use agw_domain::{CredentialFault, Error, Result};
use agw_store::{ActorStore, BackupCodeStore};

use crate::guard::ClientInfo;
use crate::state::AppState;

use super::{audit_auth, issue_pair, TokenPair};

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Enrollment
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

#[derive(Debug, Serialize)]
pub struct TotpSetup {
    pub secret: String,
    pub otpauth_url: String,
    /// Shown exactly once; only digests are stored.
    pub backup_codes: Vec<String>,
}

async fn load_actor(state: &AppState, actor_id: Uuid) -> Result<Actor> {
    state
        .actors
        .get(actor_id)
        .await?
        .ok_or_else(|| Error::NotFound("actor".into()))
}

/// Stage a new shared secret and a fresh backup-code set. The factor is
/// not live until [`verify_enable`] confirms the authenticator works.
pub async fn setup(state: &AppState, actor_id: Uuid) -> Result<TotpSetup> {
    let mut actor = load_actor(state, actor_id).await?;
    if actor.totp_enabled {
        return Err(Error::Conflict("two-factor authentication is already enabled".into()));
    }

    let enrollment = totp::enroll(&state.config.tokens.issuer, &actor.username)?;
    actor.totp_secret = Some(enrollment.secret_base32.clone());
    state.actors.update(&actor).await?;

    let codes = backup::generate_backup_codes(state.config.auth.backup_code_count);
    state
        .backup_codes
        .replace_for_actor(actor_id, codes.iter().map(|c| c.digest.clone()).collect())
        .await?;

    Ok(TotpSetup {
        secret: enrollment.secret_base32,
        otpauth_url: enrollment.otpauth_url,
        backup_codes: codes.into_iter().map(|c| c.plaintext).collect(),
    })
}

/// Confirm the staged secret with a live code and flip the factor on.
pub async fn verify_enable(
    state: &AppState,
    actor_id: Uuid,
    code: &str,
    client: &ClientInfo,
) -> Result<()> {
    let mut actor = load_actor(state, actor_id).await?;
    let secret = actor
        .totp_secret
        .clone()
        .ok_or_else(|| Error::Conflict("run setup first".into()))?;

    if !totp::verify(&secret, &state.config.tokens.issuer, &actor.username, code) {
        audit_auth(
            state,
            "2fa.enable",
            AuditOutcome::Failed,
            Some(actor_id),
            client,
            serde_json::Value::Null,
        );
        return Err(Error::Unauthenticated(CredentialFault::BadCredentials));
    }

    actor.totp_enabled = true;
    actor.totp_enabled_at = Some(Utc::now());
    state.actors.update(&actor).await?;

    audit_auth(
        state,
        "2fa.enable",
        AuditOutcome::Success,
        Some(actor_id),
        client,
        serde_json::Value::Null,
    );
    Ok(())
}

/// Turn the factor off. Requires the current password (or, for
/// password-less accounts, a live TOTP code).
pub async fn disable(
    state: &AppState,
    actor_id: Uuid,
    password: Option<&str>,
    code: Option<&str>,
    client: &ClientInfo,
) -> Result<()> {
    let mut actor = load_actor(state, actor_id).await?;
    if !actor.totp_enabled {
        return Err(Error::Conflict("two-factor authentication is not enabled".into()));
    }

    let authorized = match (&actor.password_hash, password, code) {
        (Some(phc), Some(password), _) => state.hasher.verify(password, phc),
        (None, _, Some(code)) => actor
            .totp_secret
            .as_deref()
            .map(|secret| totp::verify(secret, &state.config.tokens.issuer, &actor.username, code))
            .unwrap_or(false),
        _ => false,
    };
    if !authorized {
        audit_auth(
            state,
            "2fa.disable",
            AuditOutcome::Failed,
            Some(actor_id),
            client,
            serde_json::Value::Null,
        );
        return Err(Error::Unauthenticated(CredentialFault::BadCredentials));
    }

    actor.totp_enabled = false;
    actor.totp_enabled_at = None;
    actor.totp_secret = None;
    state.actors.update(&actor).await?;
    state.backup_codes.clear(actor_id).await?;

    audit_auth(
        state,
        "2fa.disable",
        AuditOutcome::Success,
        Some(actor_id),
        client,
        serde_json::Value::Null,
    );
    Ok(())
}

/// Mint a replacement backup-code set, retiring every old code.
pub async fn regenerate_backup_codes(
    state: &AppState,
    actor_id: Uuid,
    client: &ClientInfo,
) -> Result<Vec<String>> {
    let actor = load_actor(state, actor_id).await?;
    if !actor.totp_enabled {
        return Err(Error::Conflict("two-factor authentication is not enabled".into()));
    }

    let codes = backup::generate_backup_codes(state.config.auth.backup_code_count);
    state
        .backup_codes
        .replace_for_actor(actor_id, codes.iter().map(|c| c.digest.clone()).collect())
        .await?;

    audit_auth(
        state,
        "2fa.backup-codes.regenerate",
        AuditOutcome::Success,
        Some(actor_id),
        client,
        serde_json::Value::Null,
    );
    Ok(codes.into_iter().map(|c| c.plaintext).collect())
}

#[derive(Debug, Serialize)]
pub struct TotpStatus {
    pub enabled: bool,
    pub enabled_at: Option<chrono::DateTime<Utc>>,
    pub backup_codes_remaining: usize,
}

pub async fn status(state: &AppState, actor_id: Uuid) -> Result<TotpStatus> {
    let actor = load_actor(state, actor_id).await?;
    Ok(TotpStatus {
        enabled: actor.totp_enabled,
        enabled_at: actor.totp_enabled_at,
        backup_codes_remaining: state.backup_codes.remaining(actor_id).await?,
    })
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Login second step
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// Complete a signin that answered with a second-factor challenge.
///
/// Accepts a 6-digit TOTP code or a backup code; backup codes consume
/// atomically, so exactly one concurrent submission of the same code
/// can win.
pub async fn login_verify(
    state: &AppState,
    challenge_token: &str,
    code: &str,
    client: &ClientInfo,
) -> Result<TokenPair> {
    let claims = state
        .tokens
        .verify_challenge(challenge_token)
        .map_err(|e| match e {
            agw_credentials::TokenError::Expired => {
                Error::Unauthenticated(CredentialFault::Expired)
            }
            _ => Error::Unauthenticated(CredentialFault::Malformed),
        })?;

    let actor = load_actor(state, claims.sub).await?;
    if !actor.totp_enabled || !actor.is_active {
        return Err(Error::Unauthenticated(CredentialFault::Revoked));
    }

    let code = code.trim();
    let is_totp_shaped = code.len() == 6 && code.chars().all(|c| c.is_ascii_digit());
    let accepted = if is_totp_shaped {
        actor
            .totp_secret
            .as_deref()
            .map(|secret| totp::verify(secret, &state.config.tokens.issuer, &actor.username, code))
            .unwrap_or(false)
    } else {
        let digest = agw_credentials::sha256_hex(&backup::normalize_code(code));
        state.backup_codes.consume(actor.id, &digest).await?
    };

    if !accepted {
        audit_auth(
            state,
            "signin.2fa",
            AuditOutcome::Failed,
            Some(actor.id),
            client,
            serde_json::Value::Null,
        );
        return Err(Error::Unauthenticated(CredentialFault::BadCredentials));
    }

    audit_auth(
        state,
        "signin.2fa",
        AuditOutcome::Success,
        Some(actor.id),
        client,
        serde_json::json!({ "method": if is_totp_shaped { "totp" } else { "backup-code" } }),
    );
    issue_pair(state, &actor, client, None).await
}
