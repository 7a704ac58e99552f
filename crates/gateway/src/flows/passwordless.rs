//! Passwordless login: an OTP to a known (or brand-new) email/phone is
//! the whole credential.

use agw_domain::model::{Actor, ActorKind, AuditOutcome, NewActor, OtpPurpose, DEFAULT_ROLE};
use agw_domain::{CredentialFault, Error, Result};
use agw_store::ActorStore;

use crate::guard::ClientInfo;
use crate::state::AppState;

use super::{audit_auth, issue_pair, otp, TokenPair};

/// Send a passwordless sign-in code. The response is identical whether
/// the target has an account or not.
pub async fn request(state: &AppState, target: &str, client: &ClientInfo) -> Result<()> {
    otp::send(state, target, OtpPurpose::Passwordless, client).await
}

/// Verify the code and issue tokens, creating the actor on first sight
/// when policy allows.
pub async fn verify(
    state: &AppState,
    target: &str,
    code: &str,
    client: &ClientInfo,
) -> Result<(Actor, TokenPair)> {
    let record = otp::verify(state, target, OtpPurpose::Passwordless, code, client).await?;
    let target = record.target;
    let is_email = target.contains('@');

    let existing = if is_email {
        state.actors.find_by_email(&target).await?
    } else {
        state.actors.find_by_phone(&target).await?
    };

    let actor = match existing {
        Some(mut actor) => {
            if !actor.is_active {
                return Err(Error::Unauthenticated(CredentialFault::ActorInactive));
            }
            // The code proved ownership of the channel.
            if is_email {
                actor.email_verified = true;
            } else {
                actor.phone_verified = true;
            }
            state.actors.update(&actor).await?;
            actor
        }
        None => {
            if !state.config.auth.passwordless_signup {
                return Err(Error::NotFound("account".into()));
            }
            let actor = create_first_see(state, &target, is_email).await?;
            audit_auth(
                state,
                "signup.passwordless",
                AuditOutcome::Success,
                Some(actor.id),
                client,
                serde_json::Value::Null,
            );
            actor
        }
    };

    audit_auth(
        state,
        "signin.passwordless",
        AuditOutcome::Success,
        Some(actor.id),
        client,
        serde_json::Value::Null,
    );
    let tokens = issue_pair(state, &actor, client, None).await?;
    Ok((actor, tokens))
}

/// First-see signup: derive a username from the target and retry past
/// collisions with a random suffix.
async fn create_first_see(state: &AppState, target: &str, is_email: bool) -> Result<Actor> {
    let base: String = target
        .split('@')
        .next()
        .unwrap_or(target)
        .chars()
        .filter(|c| c.is_ascii_alphanumeric() || *c == '_' || *c == '-')
        .take(40)
        .collect();
    let base = if base.len() < 3 { format!("user-{base}") } else { base };

    let role_id = state.authz.matrix().role_id(DEFAULT_ROLE);
    let mut username = base.clone();
    for _ in 0..5 {
        let result = state
            .actors
            .insert(NewActor {
                email: is_email.then(|| target.to_string()),
                phone: (!is_email).then(|| target.to_string()),
                username: username.clone(),
                password_hash: None,
                display_name: None,
                avatar_url: None,
                role_id,
                role: DEFAULT_ROLE.to_string(),
                kind: ActorKind::Human,
                email_verified: is_email,
                phone_verified: !is_email,
            })
            .await;
        match result {
            Ok(actor) => return Ok(actor),
            Err(Error::Conflict(msg)) if msg.contains("username") => {
                username = format!("{base}-{}", agw_credentials::random_alphanumeric(6).to_lowercase());
            }
            Err(err) => return Err(err),
        }
    }
    Err(Error::Internal("could not derive a unique username".into()))
}
