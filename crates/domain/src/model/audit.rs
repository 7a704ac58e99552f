use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Audit events
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AuditOutcome {
    Success,
    Failed,
    Blocked,
}

/// One append-only audit record.
///
/// Events are enqueued by handlers and written asynchronously; they are
/// optionally enriched with country/region derived from `ip`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuditEvent {
    pub id: Uuid,
    pub actor_id: Option<Uuid>,
    /// Action tag, e.g. `"signin"`, `"refresh-reuse"`, `"role.update"`.
    pub action: String,
    pub resource_kind: String,
    pub resource_id: Option<String>,
    pub ip: Option<String>,
    pub user_agent: Option<String>,
    pub outcome: AuditOutcome,
    #[serde(default)]
    pub details: serde_json::Value,
    pub country: Option<String>,
    pub region: Option<String>,
    pub created_at: DateTime<Utc>,
}

impl AuditEvent {
    /// A minimal event; callers fill in what they know.
    pub fn new(action: impl Into<String>, resource_kind: impl Into<String>, outcome: AuditOutcome) -> Self {
        Self {
            id: Uuid::new_v4(),
            actor_id: None,
            action: action.into(),
            resource_kind: resource_kind.into(),
            resource_id: None,
            ip: None,
            user_agent: None,
            outcome,
            details: serde_json::Value::Null,
            country: None,
            region: None,
            created_at: Utc::now(),
        }
    }

    pub fn actor(mut self, actor_id: Uuid) -> Self {
        self.actor_id = Some(actor_id);
        self
    }

    pub fn resource(mut self, id: impl Into<String>) -> Self {
        self.resource_id = Some(id.into());
        self
    }

    pub fn client(mut self, ip: Option<String>, user_agent: Option<String>) -> Self {
        self.ip = ip;
        self.user_agent = user_agent;
        self
    }

    pub fn details(mut self, details: serde_json::Value) -> Self {
        self.details = details;
        self
    }
}
