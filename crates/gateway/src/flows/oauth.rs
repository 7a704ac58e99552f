//! Third-party provider callback flow.
//!
//! State-carrying redirect: a one-shot state value is parked in the
//! cache before the browser leaves, and consumed exactly once on the
//! way back. The callback exchanges the code, fetches the external
//! profile, and links or creates the actor.

use std::time::Duration;

use agw_cache::{keys, Cache as _};
use agw_domain::model::{Actor, ActorKind, AuditOutcome, NewActor, DEFAULT_ROLE};
use agw_domain::{validate, CredentialFault, Error, Result};
use agw_providers::{ExternalProfile, IdentityProvider as _};
use agw_store::ActorStore;

use crate::guard::ClientInfo;
use crate::state::AppState;

use super::{audit_auth, issue_pair, TokenPair};

const STATE_TTL: Duration = Duration::from_secs(600);

/// Begin the redirect flow: mint the state and build the provider URL.
pub async fn start(state: &AppState, provider: &str) -> Result<String> {
    let idp = state
        .providers
        .idp(provider)
        .ok_or_else(|| Error::NotFound(format!("provider '{provider}'")))?;

    let oauth_state = agw_credentials::random_alphanumeric(32);
    state
        .cache
        .set(&keys::state("oauth", &oauth_state), provider, Some(STATE_TTL))
        .await?;
    Ok(idp.authorize_url(&oauth_state))
}

/// Handle the provider callback: consume the state, exchange the code,
/// and sign the external identity in.
pub async fn callback(
    state: &AppState,
    provider: &str,
    oauth_state: &str,
    code: &str,
    client: &ClientInfo,
) -> Result<(Actor, TokenPair)> {
    let idp = state
        .providers
        .idp(provider)
        .ok_or_else(|| Error::NotFound(format!("provider '{provider}'")))?;

    // One-shot: a replayed state reads as absent.
    let parked = state
        .cache
        .take(&keys::state("oauth", oauth_state))
        .await?;
    if parked.as_deref() != Some(provider) {
        return Err(Error::Unauthenticated(CredentialFault::Malformed));
    }

    let profile = idp.exchange(code).await?;
    let actor = link_or_create(state, &profile).await?;
    if !actor.is_active {
        return Err(Error::Unauthenticated(CredentialFault::ActorInactive));
    }

    audit_auth(
        state,
        "signin.oauth",
        AuditOutcome::Success,
        Some(actor.id),
        client,
        serde_json::json!({ "provider": provider }),
    );
    let tokens = issue_pair(state, &actor, client, None).await?;
    Ok((actor, tokens))
}

/// Link by verified email when possible, otherwise create a new actor.
async fn link_or_create(state: &AppState, profile: &ExternalProfile) -> Result<Actor> {
    if let Some(email) = profile.email.as_deref().filter(|_| profile.email_verified) {
        let email = validate::normalize_email(email);
        if let Some(mut actor) = state.actors.find_by_email(&email).await? {
            // The provider vouched for the address.
            actor.email_verified = true;
            if actor.display_name.is_none() {
                actor.display_name = profile.name.clone();
            }
            if actor.avatar_url.is_none() {
                actor.avatar_url = profile.avatar_url.clone();
            }
            state.actors.update(&actor).await?;
            return Ok(actor);
        }
    }

    let base: String = profile
        .email
        .as_deref()
        .and_then(|e| e.split('@').next())
        .unwrap_or(&profile.subject)
        .chars()
        .filter(|c| c.is_ascii_alphanumeric() || *c == '_' || *c == '-')
        .take(40)
        .collect();
    let base = if base.len() < 3 {
        format!("{}-{}", profile.provider, &profile.subject)
    } else {
        base
    };

    let role_id = state.authz.matrix().role_id(DEFAULT_ROLE);
    let mut username = base.clone();
    for _ in 0..5 {
        let result = state
            .actors
            .insert(NewActor {
                email: profile
                    .email
                    .as_deref()
                    .map(validate::normalize_email),
                phone: None,
                username: username.clone(),
                password_hash: None,
                display_name: profile.name.clone(),
                avatar_url: profile.avatar_url.clone(),
                role_id,
                role: DEFAULT_ROLE.to_string(),
                kind: ActorKind::Human,
                email_verified: profile.email_verified,
                phone_verified: false,
            })
            .await;
        match result {
            Ok(actor) => return Ok(actor),
            Err(Error::Conflict(msg)) if msg.contains("username") => {
                username = format!(
                    "{base}-{}",
                    agw_credentials::random_alphanumeric(6).to_lowercase()
                );
            }
            Err(err) => return Err(err),
        }
    }
    Err(Error::Internal("could not derive a unique username".into()))
}
