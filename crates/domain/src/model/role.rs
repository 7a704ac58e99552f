use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Machine name of the role that matches every resource and action.
pub const ADMIN_ROLE: &str = "admin";

/// Default role granted on self-service signup.
pub const DEFAULT_ROLE: &str = "user";

/// Role granted to service accounts authenticating with API keys.
pub const SERVICE_ROLE: &str = "service";

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Role / Permission
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// A named bundle of permissions assignable to actors.
///
/// System roles cannot be deleted; any role still assigned to an actor
/// cannot be deleted either.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Role {
    pub id: Uuid,
    /// Unique machine name, e.g. `"auditor"`.
    pub name: String,
    pub display_name: String,
    #[serde(default)]
    pub description: String,
    pub is_system: bool,
    /// Permission references granted to this role.
    pub permission_ids: Vec<Uuid>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// A single (resource, action) grant.
///
/// The authorization engine matches on `resource` + `action`; `name` is a
/// unique convenience handle (`"users.read"`) used for API-key scopes.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Permission {
    pub id: Uuid,
    pub name: String,
    pub resource: String,
    pub action: String,
    #[serde(default)]
    pub description: String,
    pub created_at: DateTime<Utc>,
}
