//! Password signup, signin, and password change.

use serde::Deserialize;
use uuid::Uuid;

use agw_domain::model::{
    ActorKind, AuditOutcome, NewActor, OtpPurpose, DEFAULT_ROLE,
};
use agw_domain::{validate, CredentialFault, Error, Result};
use agw_store::{ActorStore, OtpStore};

use crate::guard::ClientInfo;
use crate::state::AppState;

use super::{audit_auth, issue_pair, otp, TokenPair};

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Signup
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

#[derive(Debug, Deserialize)]
pub struct SignupInput {
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub phone: Option<String>,
    pub username: String,
    pub password: String,
    #[serde(default)]
    pub display_name: Option<String>,
}

pub struct SignupOutcome {
    pub actor: agw_domain::model::Actor,
    pub tokens: TokenPair,
}

/// Create an actor from email/username/password and return a token pair
/// immediately; email verification is orthogonal to login.
pub async fn signup(
    state: &AppState,
    input: SignupInput,
    client: &ClientInfo,
) -> Result<SignupOutcome> {
    state
        .limiter
        .check("signup", &client.principal(), state.config.limits.signup)
        .await?;

    validate::username(&input.username)?;
    validate::password(&input.password)?;
    let email = match input.email.as_deref() {
        Some(raw) => {
            validate::email(raw)?;
            Some(validate::normalize_email(raw))
        }
        None => None,
    };
    if let Some(phone) = input.phone.as_deref() {
        validate::phone(phone)?;
    }

    let password_hash = state.hasher.hash(&input.password)?;
    let role_id = state.authz.matrix().role_id(DEFAULT_ROLE);
    let actor = state
        .actors
        .insert(NewActor {
            email: email.clone(),
            phone: input.phone,
            username: input.username,
            password_hash: Some(password_hash),
            display_name: input.display_name,
            avatar_url: None,
            role_id,
            role: DEFAULT_ROLE.to_string(),
            kind: ActorKind::Human,
            email_verified: false,
            phone_verified: false,
        })
        .await?;

    // Kick off address verification; a mailer outage must not fail the
    // signup itself.
    if let Some(email) = &email {
        if let Err(e) = otp::send(state, email, OtpPurpose::VerifyEmail, client).await {
            tracing::warn!(error = %e, "verify-email OTP enqueue failed");
        }
    }

    audit_auth(
        state,
        "signup",
        AuditOutcome::Success,
        Some(actor.id),
        client,
        serde_json::json!({ "username": actor.username }),
    );

    let tokens = issue_pair(state, &actor, client, None).await?;
    Ok(SignupOutcome { actor, tokens })
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Signin
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

pub enum SigninOutcome {
    Tokens(TokenPair),
    /// TOTP is enabled: no access pair yet, only the short-lived
    /// second-factor challenge.
    SecondFactor { two_factor_token: String },
}

/// Locate the actor by email or phone and verify the password. Timing
/// and the error message are identical whether the account exists or
/// the password is wrong.
pub async fn signin(
    state: &AppState,
    identifier: &str,
    password: &str,
    client: &ClientInfo,
) -> Result<SigninOutcome> {
    state
        .limiter
        .check("signin", &client.principal(), state.config.limits.signin)
        .await?;

    let actor = if identifier.contains('@') {
        state
            .actors
            .find_by_email(&validate::normalize_email(identifier))
            .await?
    } else {
        state.actors.find_by_phone(identifier).await?
    };

    let Some(actor) = actor else {
        // Burn the same KDF work an existing account would cost.
        let _ = state.hasher.hash(password);
        audit_auth(state, "signin", AuditOutcome::Failed, None, client, serde_json::Value::Null);
        return Err(Error::Unauthenticated(CredentialFault::BadCredentials));
    };

    let password_ok = actor
        .password_hash
        .as_deref()
        .map(|phc| state.hasher.verify(password, phc))
        .unwrap_or_else(|| {
            let _ = state.hasher.hash(password);
            false
        });
    if !password_ok || !actor.is_active || !actor.has_verified_identity() {
        audit_auth(
            state,
            "signin",
            AuditOutcome::Failed,
            Some(actor.id),
            client,
            serde_json::Value::Null,
        );
        return Err(Error::Unauthenticated(CredentialFault::BadCredentials));
    }

    if actor.totp_enabled {
        let two_factor_token = state.tokens.mint_challenge(actor.id)?;
        audit_auth(
            state,
            "signin.2fa-challenge",
            AuditOutcome::Success,
            Some(actor.id),
            client,
            serde_json::Value::Null,
        );
        return Ok(SigninOutcome::SecondFactor { two_factor_token });
    }

    audit_auth(
        state,
        "signin",
        AuditOutcome::Success,
        Some(actor.id),
        client,
        serde_json::Value::Null,
    );
    let tokens = issue_pair(state, &actor, client, None).await?;
    Ok(SigninOutcome::Tokens(tokens))
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Password change
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// Verify the old password, swap in the new one, revoke every other
/// session, and invalidate outstanding reset codes.
///
/// `presented_refresh` identifies the session performing the change; it
/// is the one spared by the bulk revocation.
pub async fn change_password(
    state: &AppState,
    actor_id: Uuid,
    old_password: &str,
    new_password: &str,
    presented_refresh: Option<&str>,
    client: &ClientInfo,
) -> Result<()> {
    validate::password(new_password)?;

    let mut actor = state
        .actors
        .get(actor_id)
        .await?
        .ok_or_else(|| Error::NotFound("actor".into()))?;

    let old_ok = actor
        .password_hash
        .as_deref()
        .map(|phc| state.hasher.verify(old_password, phc))
        .unwrap_or(false);
    if !old_ok {
        audit_auth(
            state,
            "password.change",
            AuditOutcome::Failed,
            Some(actor_id),
            client,
            serde_json::Value::Null,
        );
        return Err(Error::Unauthenticated(CredentialFault::BadCredentials));
    }

    actor.password_hash = Some(state.hasher.hash(new_password)?);
    state.actors.update(&actor).await?;

    let spared = match presented_refresh {
        Some(token) => {
            let digest = agw_credentials::sha256_hex(token);
            state.sessions.find_live(&digest).await?.map(|s| s.id)
        }
        None => None,
    };
    state.sessions.revoke_all_except(actor_id, spared).await?;

    // A reset code requested before the change must not survive it.
    if let Some(email) = &actor.email {
        state.otps.invalidate(email, OtpPurpose::ResetPassword).await?;
    }
    if let Some(phone) = &actor.phone {
        state.otps.invalidate(phone, OtpPurpose::ResetPassword).await?;
    }

    audit_auth(
        state,
        "password.change",
        AuditOutcome::Success,
        Some(actor_id),
        client,
        serde_json::Value::Null,
    );
    Ok(())
}
