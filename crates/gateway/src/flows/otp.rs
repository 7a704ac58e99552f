//! One-time-code send and verify, shared by email verification,
//! password reset, passwordless login, and the second factor.

use std::time::Duration;

use chrono::Utc;
use uuid::Uuid;

use agw_cache::{keys, Cache as _};
use agw_domain::model::{AuditOutcome, OtpPurpose, OtpRecord};
use agw_domain::{validate, CredentialFault, Error, Result};
use agw_providers::{Mailer as _, SmsSender as _};
use agw_store::OtpStore;

use crate::guard::ClientInfo;
use crate::state::AppState;

use super::audit_auth;

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Send
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

fn subject_for(purpose: OtpPurpose) -> &'static str {
    match purpose {
        OtpPurpose::VerifyEmail => "Verify your email address",
        OtpPurpose::VerifyPhone => "Verify your phone number",
        OtpPurpose::ResetPassword => "Your password reset code",
        OtpPurpose::Passwordless => "Your sign-in code",
        OtpPurpose::SecondFactorLogin => "Your login code",
    }
}

/// Generate, persist, and dispatch a 6-digit code.
///
/// The per-target cool-down and the per-principal window are enforced
/// here. Dispatch failures are logged but not surfaced: the caller's
/// response must not reveal whether the target exists.
pub async fn send(
    state: &AppState,
    target: &str,
    purpose: OtpPurpose,
    client: &ClientInfo,
) -> Result<()> {
    let is_email = target.contains('@');
    let target = if is_email {
        let normalized = validate::normalize_email(target);
        validate::email(&normalized)?;
        normalized
    } else {
        validate::phone(target)?;
        target.to_string()
    };

    state
        .limiter
        .check("otp_send", &client.principal(), state.config.limits.otp_send)
        .await?;

    // Per-target cool-down between sends.
    let cooldown = state.config.auth.otp.cooldown_secs;
    let claimed = state
        .cache
        .set_if_absent(
            &keys::otp_cooldown(purpose.as_str(), &target),
            "1",
            Duration::from_secs(cooldown),
        )
        .await?;
    if !claimed {
        return Err(Error::RateLimited {
            retry_after_secs: cooldown,
        });
    }

    // One outstanding code per (target, purpose): the previous one is
    // superseded, not left racing the new one.
    state.otps.invalidate(&target, purpose).await?;

    let code = agw_credentials::otp::generate_code();
    let record = OtpRecord {
        id: Uuid::new_v4(),
        target: target.clone(),
        purpose,
        code_digest: agw_credentials::otp::code_digest(&code),
        expires_at: Utc::now() + chrono::Duration::seconds(state.config.auth.otp.ttl_secs as i64),
        consumed: false,
        attempts: 0,
        created_at: Utc::now(),
    };
    state.otps.insert(record).await?;

    let body = format!(
        "Your code is {code}. It expires in {} minutes.",
        state.config.auth.otp.ttl_secs / 60
    );
    let dispatch = if is_email {
        state
            .providers
            .mailer
            .send(&target, subject_for(purpose), &body)
            .await
    } else {
        state.providers.sms.send(&target, &body).await
    };
    if let Err(e) = dispatch {
        tracing::warn!(purpose = purpose.as_str(), error = %e, "otp dispatch failed");
    }

    audit_auth(
        state,
        "otp.send",
        AuditOutcome::Success,
        None,
        client,
        serde_json::json!({ "purpose": purpose.as_str() }),
    );
    Ok(())
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Verify
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// Check a code against the most recent unconsumed record.
///
/// The consume happens before the caller applies any side effect, so a
/// crash mid-flow can never leave a reusable code behind. Returns the
/// consumed record.
pub async fn verify(
    state: &AppState,
    target: &str,
    purpose: OtpPurpose,
    code: &str,
    client: &ClientInfo,
) -> Result<OtpRecord> {
    let target = if target.contains('@') {
        validate::normalize_email(target)
    } else {
        target.to_string()
    };

    let invalid = || Error::Unauthenticated(CredentialFault::BadCredentials);

    let record = state
        .otps
        .latest_unconsumed(&target, purpose)
        .await?
        .ok_or_else(invalid)?;

    let now = Utc::now();
    let max_attempts = state.config.auth.otp.max_attempts;
    if !record.is_usable(now, max_attempts) {
        return Err(invalid());
    }

    if !agw_credentials::constant_time_eq(
        &record.code_digest,
        &agw_credentials::otp::code_digest(code),
    ) {
        let attempts = state.otps.record_attempt(record.id).await?;
        if attempts >= max_attempts {
            // Exhausted: retire the record so guessing cannot continue.
            state.otps.consume(record.id).await?;
        }
        audit_auth(
            state,
            "otp.verify",
            AuditOutcome::Failed,
            None,
            client,
            serde_json::json!({ "purpose": purpose.as_str(), "attempts": attempts }),
        );
        return Err(invalid());
    }

    // Exactly-once: a concurrent verify of the same record loses here.
    if !state.otps.consume(record.id).await? {
        return Err(Error::Conflict("code already used".into()));
    }

    audit_auth(
        state,
        "otp.verify",
        AuditOutcome::Success,
        None,
        client,
        serde_json::json!({ "purpose": purpose.as_str() }),
    );
    Ok(record)
}
