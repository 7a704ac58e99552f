use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Literal prefix that discriminates API keys from access tokens in a
/// bearer header.
pub const API_KEY_PREFIX: &str = "agw_";

/// Total length of the lookup prefix, `agw_` included.
pub const API_KEY_PREFIX_LEN: usize = 12;

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// API key
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// A long-lived bearer secret owned by one actor.
///
/// The plaintext is returned exactly once at creation. Lookup uses only
/// the 12-character prefix; the stored digest is compared in constant
/// time.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApiKey {
    pub id: Uuid,
    pub actor_id: Uuid,
    pub name: String,
    #[serde(default)]
    pub description: String,
    /// First 12 characters of the plaintext, `agw_` included.
    pub prefix: String,
    #[serde(skip_serializing)]
    pub digest: String,
    /// Permission machine names this key may exercise.
    pub scopes: Vec<String>,
    pub expires_at: Option<DateTime<Utc>>,
    pub last_used_at: Option<DateTime<Utc>>,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
}

impl ApiKey {
    pub fn is_usable(&self, now: DateTime<Utc>) -> bool {
        self.is_active && self.expires_at.map(|exp| exp > now).unwrap_or(true)
    }
}
