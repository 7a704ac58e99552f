//! HS256 token service for access, refresh, and second-factor challenge
//! assertions.
//!
//! Each signer holds a keyring: an ordered list of secrets, oldest →
//! newest. The newest secret signs; every secret verifies. Rotating a
//! key is therefore a config append plus a restart, and outstanding
//! tokens stay valid until their natural expiry.

use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine;
use chrono::Utc;
use jsonwebtoken::errors::ErrorKind;
use jsonwebtoken::{decode, encode, Algorithm, DecodingKey, EncodingKey, Header, Validation};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use agw_domain::config::TokenConfig;
use agw_domain::{Error, Result};

use crate::digest::{random_alphanumeric, sha256_hex};

/// Purpose claim carried by the short-lived second-factor challenge.
const CHALLENGE_PURPOSE: &str = "2fa";

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Claims
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AccessClaims {
    pub sub: Uuid,
    pub email: Option<String>,
    pub username: String,
    pub role: String,
    pub iat: i64,
    pub exp: i64,
    pub iss: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RefreshClaims {
    pub sub: Uuid,
    pub iat: i64,
    pub exp: i64,
    pub iss: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChallengeClaims {
    pub sub: Uuid,
    pub purpose: String,
    pub iat: i64,
    pub exp: i64,
    pub iss: String,
}

/// A freshly minted refresh credential: the serialized token handed to
/// the client and the digest the session row is keyed on.
#[derive(Debug, Clone)]
pub struct MintedRefresh {
    pub token: String,
    pub digest: String,
    pub expires_at: chrono::DateTime<Utc>,
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Errors
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// Why a token failed verification.
#[derive(thiserror::Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum TokenError {
    #[error("token malformed")]
    Malformed,
    #[error("token signature invalid")]
    BadSignature,
    #[error("token expired")]
    Expired,
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Keyring
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

struct Keyring {
    signing: EncodingKey,
    verifying: Vec<DecodingKey>,
}

impl Keyring {
    /// Build from configured secrets. An empty list mints a random
    /// per-boot secret, which keeps development working but invalidates
    /// tokens on restart; config validation flags this for production.
    fn from_secrets(secrets: &[String], label: &str) -> Self {
        let secrets: Vec<String> = if secrets.is_empty() {
            tracing::warn!(signer = label, "no signing secret configured, using a random per-boot secret");
            vec![random_alphanumeric(64)]
        } else {
            secrets.to_vec()
        };
        let newest = secrets.last().expect("at least one secret");
        Self {
            signing: EncodingKey::from_secret(newest.as_bytes()),
            verifying: secrets
                .iter()
                .map(|s| DecodingKey::from_secret(s.as_bytes()))
                .collect(),
        }
    }

    fn sign<C: Serialize>(&self, claims: &C) -> Result<String> {
        encode(&Header::new(Algorithm::HS256), claims, &self.signing)
            .map_err(|e| Error::Internal(format!("token signing: {e}")))
    }

    fn verify<C: DeserializeOwned>(&self, token: &str) -> std::result::Result<C, TokenError> {
        let mut validation = Validation::new(Algorithm::HS256);
        validation.leeway = 0;
        validation.set_required_spec_claims(&["exp"]);

        let mut saw_bad_signature = false;
        for key in &self.verifying {
            match decode::<C>(token, key, &validation) {
                Ok(data) => return Ok(data.claims),
                Err(e) => match e.kind() {
                    ErrorKind::ExpiredSignature => return Err(TokenError::Expired),
                    ErrorKind::InvalidSignature => {
                        saw_bad_signature = true;
                        continue;
                    }
                    _ => return Err(TokenError::Malformed),
                },
            }
        }
        if saw_bad_signature {
            Err(TokenError::BadSignature)
        } else {
            Err(TokenError::Malformed)
        }
    }
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Token service
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

pub struct TokenService {
    access: Keyring,
    refresh: Keyring,
    access_ttl_secs: i64,
    refresh_ttl_secs: i64,
    challenge_ttl_secs: i64,
    issuer: String,
}

impl TokenService {
    pub fn from_config(config: &TokenConfig) -> Self {
        Self {
            access: Keyring::from_secrets(&config.access_secrets, "access"),
            refresh: Keyring::from_secrets(&config.refresh_secrets, "refresh"),
            access_ttl_secs: config.access_ttl_secs as i64,
            refresh_ttl_secs: config.refresh_ttl_secs as i64,
            challenge_ttl_secs: config.challenge_ttl_secs as i64,
            issuer: config.issuer.clone(),
        }
    }

    pub fn access_ttl_secs(&self) -> i64 {
        self.access_ttl_secs
    }

    /// Mint a short-lived access assertion for an actor.
    pub fn mint_access(
        &self,
        actor_id: Uuid,
        username: &str,
        email: Option<&str>,
        role: &str,
    ) -> Result<(String, AccessClaims)> {
        let now = Utc::now().timestamp();
        let claims = AccessClaims {
            sub: actor_id,
            email: email.map(str::to_string),
            username: username.to_string(),
            role: role.to_string(),
            iat: now,
            exp: now + self.access_ttl_secs,
            iss: self.issuer.clone(),
        };
        let token = self.access.sign(&claims)?;
        Ok((token, claims))
    }

    /// Mint a long-lived refresh assertion plus the digest its session
    /// row is keyed on.
    pub fn mint_refresh(&self, actor_id: Uuid) -> Result<MintedRefresh> {
        let now = Utc::now();
        let claims = RefreshClaims {
            sub: actor_id,
            iat: now.timestamp(),
            exp: now.timestamp() + self.refresh_ttl_secs,
            iss: self.issuer.clone(),
        };
        let token = self.refresh.sign(&claims)?;
        let digest = sha256_hex(&token);
        Ok(MintedRefresh {
            token,
            digest,
            expires_at: now + chrono::Duration::seconds(self.refresh_ttl_secs),
        })
    }

    /// Mint the 5-minute second-factor challenge returned by signin when
    /// TOTP is enabled.
    pub fn mint_challenge(&self, actor_id: Uuid) -> Result<String> {
        let now = Utc::now().timestamp();
        let claims = ChallengeClaims {
            sub: actor_id,
            purpose: CHALLENGE_PURPOSE.to_string(),
            iat: now,
            exp: now + self.challenge_ttl_secs,
            iss: self.issuer.clone(),
        };
        self.access.sign(&claims)
    }

    pub fn verify_access(&self, token: &str) -> std::result::Result<AccessClaims, TokenError> {
        self.access.verify(token)
    }

    pub fn verify_refresh(&self, token: &str) -> std::result::Result<RefreshClaims, TokenError> {
        self.refresh.verify(token)
    }

    pub fn verify_challenge(&self, token: &str) -> std::result::Result<ChallengeClaims, TokenError> {
        let claims: ChallengeClaims = self.access.verify(token)?;
        if claims.purpose != CHALLENGE_PURPOSE {
            return Err(TokenError::Malformed);
        }
        Ok(claims)
    }

    /// Decode the payload **without** verifying the signature.
    ///
    /// For diagnostics and log enrichment only; authorization decisions
    /// never touch this.
    pub fn peek_claims(token: &str) -> Option<serde_json::Value> {
        let payload = token.split('.').nth(1)?;
        let bytes = URL_SAFE_NO_PAD.decode(payload).ok()?;
        serde_json::from_slice(&bytes).ok()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use agw_domain::config::TokenConfig;

    fn config() -> TokenConfig {
        TokenConfig {
            access_secrets: vec!["an-access-secret-of-decent-length!".into()],
            refresh_secrets: vec!["a-refresh-secret-of-decent-length".into()],
            ..TokenConfig::default()
        }
    }

    #[test]
    fn mint_then_verify_round_trip() {
        let svc = TokenService::from_config(&config());
        let actor = Uuid::new_v4();
        let (token, minted) = svc
            .mint_access(actor, "alice", Some("a@x.test"), "user")
            .unwrap();

        let claims = svc.verify_access(&token).unwrap();
        assert_eq!(claims.sub, actor);
        assert_eq!(claims.username, "alice");
        assert_eq!(claims.role, "user");
        assert!(claims.exp > claims.iat);
        assert_eq!(minted.exp, claims.exp);
    }

    #[test]
    fn expired_token_is_rejected_as_expired() {
        let svc = TokenService::from_config(&config());
        let now = Utc::now().timestamp();
        let stale = AccessClaims {
            sub: Uuid::new_v4(),
            email: None,
            username: "alice".into(),
            role: "user".into(),
            iat: now - 120,
            exp: now - 60,
            iss: "authgate".into(),
        };
        let token = encode(
            &Header::new(Algorithm::HS256),
            &stale,
            &EncodingKey::from_secret(config().access_secrets[0].as_bytes()),
        )
        .unwrap();
        assert_eq!(svc.verify_access(&token), Err(TokenError::Expired));
    }

    #[test]
    fn garbage_is_malformed_and_wrong_key_is_bad_signature() {
        let svc = TokenService::from_config(&config());
        assert_eq!(svc.verify_access("not-a-token"), Err(TokenError::Malformed));

        let other = TokenService::from_config(&TokenConfig {
            access_secrets: vec!["a-completely-different-secret-value".into()],
            ..TokenConfig::default()
        });
        let (token, _) = other
            .mint_access(Uuid::new_v4(), "alice", None, "user")
            .unwrap();
        assert_eq!(svc.verify_access(&token), Err(TokenError::BadSignature));
    }

    #[test]
    fn rotation_keeps_old_tokens_valid_and_signs_with_newest() {
        let old_secret = "old-secret-old-secret-old-secret".to_string();
        let new_secret = "new-secret-new-secret-new-secret".to_string();

        let old_svc = TokenService::from_config(&TokenConfig {
            access_secrets: vec![old_secret.clone()],
            ..TokenConfig::default()
        });
        let rotated = TokenService::from_config(&TokenConfig {
            access_secrets: vec![old_secret, new_secret],
            ..TokenConfig::default()
        });

        let (old_token, _) = old_svc
            .mint_access(Uuid::new_v4(), "alice", None, "user")
            .unwrap();
        assert!(rotated.verify_access(&old_token).is_ok());

        let (new_token, _) = rotated
            .mint_access(Uuid::new_v4(), "bob", None, "user")
            .unwrap();
        assert!(rotated.verify_access(&new_token).is_ok());
        // The pre-rotation service must not accept tokens signed by the
        // new key.
        assert_eq!(
            old_svc.verify_access(&new_token),
            Err(TokenError::BadSignature)
        );
    }

    #[test]
    fn challenge_purpose_is_enforced() {
        let svc = TokenService::from_config(&config());
        let challenge = svc.mint_challenge(Uuid::new_v4()).unwrap();
        assert!(svc.verify_challenge(&challenge).is_ok());

        // An access token is not a challenge token.
        let (access, _) = svc
            .mint_access(Uuid::new_v4(), "alice", None, "user")
            .unwrap();
        assert!(svc.verify_challenge(&access).is_err());
    }

    #[test]
    fn peek_decodes_without_verifying() {
        let svc = TokenService::from_config(&config());
        let (token, _) = svc
            .mint_access(Uuid::new_v4(), "alice", None, "user")
            .unwrap();
        let peeked = TokenService::peek_claims(&token).unwrap();
        assert_eq!(peeked["username"], "alice");
        assert!(TokenService::peek_claims("garbage").is_none());
    }
}
