use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Actor
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// Whether a principal is a person or a machine identity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ActorKind {
    Human,
    Service,
}

impl Default for ActorKind {
    fn default() -> Self {
        ActorKind::Human
    }
}

/// A principal to whom credentials are issued.
///
/// Actors are deactivated, never deleted. `password_hash` is a PHC string
/// (self-identifying KDF output) and is absent for passwordless-only and
/// service accounts. `totp_secret` never leaves the process.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Actor {
    pub id: Uuid,
    pub email: Option<String>,
    pub phone: Option<String>,
    pub username: String,
    #[serde(skip_serializing)]
    pub password_hash: Option<String>,
    #[serde(default)]
    pub display_name: Option<String>,
    #[serde(default)]
    pub avatar_url: Option<String>,
    /// Preferred role reference. Wins over `role` when both are present.
    pub role_id: Option<Uuid>,
    /// Legacy single role name. Still written on every update; read only
    /// when `role_id` is absent.
    #[deprecated(note = "resolve through role_id; kept until the role migration completes")]
    pub role: String,
    #[serde(default)]
    pub kind: ActorKind,
    pub email_verified: bool,
    pub phone_verified: bool,
    pub is_active: bool,
    #[serde(skip_serializing)]
    pub totp_secret: Option<String>,
    pub totp_enabled: bool,
    pub totp_enabled_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Actor {
    /// The role name used for claims and legacy fallback.
    #[allow(deprecated)]
    pub fn legacy_role(&self) -> &str {
        &self.role
    }

    /// At least one reachable, verified contact point (or a username,
    /// which needs no verification) must exist before password flows may
    /// succeed.
    pub fn has_verified_identity(&self) -> bool {
        !self.username.is_empty()
            || (self.email.is_some() && self.email_verified)
            || (self.phone.is_some() && self.phone_verified)
    }
}

/// Input for actor creation. Stores assign id and timestamps.
#[derive(Debug, Clone)]
pub struct NewActor {
    pub email: Option<String>,
    pub phone: Option<String>,
    pub username: String,
    pub password_hash: Option<String>,
    pub display_name: Option<String>,
    pub avatar_url: Option<String>,
    pub role_id: Option<Uuid>,
    pub role: String,
    pub kind: ActorKind,
    pub email_verified: bool,
    pub phone_verified: bool,
}
