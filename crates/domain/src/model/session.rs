use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Device descriptor
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DeviceKind {
    Mobile,
    Desktop,
    Tablet,
    Bot,
    Unknown,
}

impl Default for DeviceKind {
    fn default() -> Self {
        DeviceKind::Unknown
    }
}

impl DeviceKind {
    pub fn as_str(self) -> &'static str {
        match self {
            DeviceKind::Mobile => "mobile",
            DeviceKind::Desktop => "desktop",
            DeviceKind::Tablet => "tablet",
            DeviceKind::Bot => "bot",
            DeviceKind::Unknown => "unknown",
        }
    }
}

/// What kind of device a session was opened from.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct DeviceDescriptor {
    #[serde(default)]
    pub kind: DeviceKind,
    #[serde(default)]
    pub os: String,
    #[serde(default)]
    pub browser: String,
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Session
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// The persistent record backing one refresh credential.
///
/// Only the SHA-256 digest of the refresh secret is ever stored. A session
/// is live iff `revoked_at` is `None` and `expires_at` is in the future;
/// refresh digests are unique across live sessions.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Session {
    pub id: Uuid,
    pub actor_id: Uuid,
    #[serde(skip_serializing)]
    pub refresh_digest: String,
    pub device: DeviceDescriptor,
    pub ip: Option<String>,
    pub user_agent: Option<String>,
    /// Human-assigned label ("work laptop").
    pub label: Option<String>,
    pub last_active_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
    pub created_at: DateTime<Utc>,
    pub revoked_at: Option<DateTime<Utc>>,
}

impl Session {
    pub fn is_live(&self, now: DateTime<Utc>) -> bool {
        self.revoked_at.is_none() && self.expires_at > now
    }
}
