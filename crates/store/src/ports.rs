use chrono::{DateTime, Duration, Utc};
use uuid::Uuid;

use agw_domain::model::{
    Actor, ApiKey, AuditEvent, AuditOutcome, IpRule, NewActor, OtpPurpose, OtpRecord, Page,
    PageRequest, Permission, Role, Session,
};
use agw_domain::Result;

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Actors
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

#[async_trait::async_trait]
pub trait ActorStore: Send + Sync {
    /// Insert a new actor. Uniqueness of email, phone, and username is
    /// enforced here; collisions surface as `Error::Conflict` naming the
    /// offending field.
    async fn insert(&self, actor: NewActor) -> Result<Actor>;

    async fn get(&self, id: Uuid) -> Result<Option<Actor>>;
    async fn find_by_email(&self, email: &str) -> Result<Option<Actor>>;
    async fn find_by_phone(&self, phone: &str) -> Result<Option<Actor>>;
    async fn find_by_username(&self, username: &str) -> Result<Option<Actor>>;

    /// Full-row update. Re-checks unique fields against other rows and
    /// bumps `updated_at`.
    async fn update(&self, actor: &Actor) -> Result<()>;

    async fn list(&self, page: PageRequest) -> Result<Page<Actor>>;

    /// How many actors reference a role. Guards role deletion.
    async fn count_with_role(&self, role_id: Uuid) -> Result<u64>;
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Sessions
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

#[async_trait::async_trait]
pub trait SessionStore: Send + Sync {
    /// Insert a session. Fails with `Conflict` when another live session
    /// already holds the same refresh digest.
    async fn insert(&self, session: Session) -> Result<()>;

    /// Atomically revoke `old_id` and insert `replacement`. Either both
    /// land or neither does.
    async fn rotate(&self, old_id: Uuid, replacement: Session) -> Result<()>;

    async fn get(&self, id: Uuid) -> Result<Option<Session>>;

    /// Lookup by refresh digest, live rows only.
    async fn find_live_by_digest(&self, digest: &str, now: DateTime<Utc>)
        -> Result<Option<Session>>;

    /// Lookup by refresh digest including revoked rows. Reuse detection
    /// needs to see the corpse.
    async fn find_by_digest(&self, digest: &str) -> Result<Option<Session>>;

    /// Best-effort last-activity bump.
    async fn touch(&self, id: Uuid, now: DateTime<Utc>) -> Result<()>;

    /// Update the user-visible label. `false` when the session does not
    /// exist or belongs to someone else.
    async fn rename(&self, id: Uuid, actor_id: Uuid, label: &str) -> Result<bool>;

    /// Set the revocation timestamp. `false` when already revoked or
    /// missing (idempotent from the caller's view).
    async fn revoke(&self, id: Uuid, now: DateTime<Utc>) -> Result<bool>;

    /// Revoke every live session of an actor, sparing `except` when
    /// given. Returns how many were revoked.
    async fn revoke_all_for_actor(
        &self,
        actor_id: Uuid,
        except: Option<Uuid>,
        now: DateTime<Utc>,
    ) -> Result<usize>;

    /// Paged listing ordered by last activity, newest first.
    async fn list_for_actor(
        &self,
        actor_id: Uuid,
        live_only: bool,
        now: DateTime<Utc>,
        page: PageRequest,
    ) -> Result<Page<Session>>;

    async fn list_all(&self, page: PageRequest) -> Result<Page<Session>>;

    /// All live rows; input for the statistics breakdowns.
    async fn live_sessions(&self, now: DateTime<Utc>) -> Result<Vec<Session>>;

    /// Delete rows with expiry in the past or revoked longer than
    /// `retention` ago. Returns how many were removed.
    async fn gc(&self, now: DateTime<Utc>, retention: Duration) -> Result<usize>;
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Roles & permissions
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

#[async_trait::async_trait]
pub trait RoleStore: Send + Sync {
    async fn insert_role(&self, role: Role) -> Result<()>;
    async fn update_role(&self, role: &Role) -> Result<()>;
    async fn delete_role(&self, id: Uuid) -> Result<()>;
    async fn get_role(&self, id: Uuid) -> Result<Option<Role>>;
    async fn find_role_by_name(&self, name: &str) -> Result<Option<Role>>;
    async fn list_roles(&self) -> Result<Vec<Role>>;

    async fn insert_permission(&self, permission: Permission) -> Result<()>;
    async fn update_permission(&self, permission: &Permission) -> Result<()>;
    async fn delete_permission(&self, id: Uuid) -> Result<()>;
    async fn get_permission(&self, id: Uuid) -> Result<Option<Permission>>;
    async fn find_permission_by_name(&self, name: &str) -> Result<Option<Permission>>;
    async fn list_permissions(&self) -> Result<Vec<Permission>>;
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// API keys
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

#[async_trait::async_trait]
pub trait ApiKeyStore: Send + Sync {
    async fn insert(&self, key: ApiKey) -> Result<()>;
    async fn get(&self, id: Uuid) -> Result<Option<ApiKey>>;
    async fn find_by_prefix(&self, prefix: &str) -> Result<Option<ApiKey>>;
    async fn list_for_actor(&self, actor_id: Uuid) -> Result<Vec<ApiKey>>;
    async fn update(&self, key: &ApiKey) -> Result<()>;
    async fn delete(&self, id: Uuid, actor_id: Uuid) -> Result<bool>;
    /// Fire-and-forget last-seen bump off the validation fast path.
    async fn touch_last_used(&self, id: Uuid, now: DateTime<Utc>) -> Result<()>;
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// OTP records & backup codes
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

#[async_trait::async_trait]
pub trait OtpStore: Send + Sync {
    async fn insert(&self, record: OtpRecord) -> Result<()>;

    /// Most recent unconsumed record for `(target, purpose)`, expired or
    /// not; the flow decides what an expired record means.
    async fn latest_unconsumed(
        &self,
        target: &str,
        purpose: OtpPurpose,
    ) -> Result<Option<OtpRecord>>;

    /// Bump the attempt counter; returns the new value.
    async fn record_attempt(&self, id: Uuid) -> Result<u32>;

    /// Conditional consume: `true` exactly once, `false` when the record
    /// is already consumed or missing.
    async fn consume(&self, id: Uuid) -> Result<bool>;

    /// Mark every outstanding record for `(target, purpose)` consumed.
    async fn invalidate(&self, target: &str, purpose: OtpPurpose) -> Result<usize>;

    /// Drop expired and consumed rows. Returns how many were removed.
    async fn purge_expired(&self, now: DateTime<Utc>) -> Result<usize>;
}

#[async_trait::async_trait]
pub trait BackupCodeStore: Send + Sync {
    /// Replace an actor's whole code set (2FA enable / regenerate).
    async fn replace_for_actor(&self, actor_id: Uuid, digests: Vec<String>) -> Result<()>;

    /// Conditional consume of one code. `true` exactly once per code,
    /// also under concurrent submission.
    async fn consume(&self, actor_id: Uuid, digest: &str) -> Result<bool>;

    async fn remaining(&self, actor_id: Uuid) -> Result<usize>;
    async fn clear(&self, actor_id: Uuid) -> Result<()>;
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// IP rules & audit log
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

#[async_trait::async_trait]
pub trait IpRuleStore: Send + Sync {
    async fn list(&self) -> Result<Vec<IpRule>>;
    async fn insert(&self, rule: IpRule) -> Result<()>;
    async fn delete(&self, id: Uuid) -> Result<bool>;
}

/// Filter for audit listings. Empty filter = everything.
#[derive(Debug, Clone, Default)]
pub struct AuditFilter {
    pub actor_id: Option<Uuid>,
    pub action: Option<String>,
    pub outcome: Option<AuditOutcome>,
}

#[async_trait::async_trait]
pub trait AuditStore: Send + Sync {
    async fn append(&self, event: AuditEvent) -> Result<()>;
    async fn list(&self, filter: AuditFilter, page: PageRequest) -> Result<Page<AuditEvent>>;
    /// Country → event count, for the geo-distribution admin view.
    async fn geo_counts(&self) -> Result<Vec<(String, u64)>>;
}
