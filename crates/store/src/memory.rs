use std::collections::HashMap;

use chrono::{DateTime, Duration, Utc};
use parking_lot::RwLock;
use uuid::Uuid;

use agw_domain::model::{
    Actor, ApiKey, AuditEvent, BackupCode, IpRule, NewActor, OtpPurpose, OtpRecord, Page,
    PageRequest, Permission, Role, Session,
};
use agw_domain::{Error, Result};

use crate::ports::*;

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Memory store
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

#[derive(Default)]
struct Inner {
    actors: HashMap<Uuid, Actor>,
    sessions: HashMap<Uuid, Session>,
    roles: HashMap<Uuid, Role>,
    permissions: HashMap<Uuid, Permission>,
    api_keys: HashMap<Uuid, ApiKey>,
    otps: Vec<OtpRecord>,
    backup_codes: Vec<BackupCode>,
    ip_rules: Vec<IpRule>,
    audit: Vec<AuditEvent>,
}

/// All identity-store ports behind one `RwLock`.
///
/// Holding a single write lock across a multi-step operation is what a
/// row store does with a transaction; rotation and the conditional
/// consumes rely on it.
#[derive(Default)]
pub struct MemoryStore {
    inner: RwLock<Inner>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

fn page_of<T: Clone>(items: &[T], page: PageRequest) -> Page<T> {
    let total = items.len() as u64;
    let start = page.offset().min(total) as usize;
    let end = page.offset().saturating_add(page.limit()).min(total) as usize;
    Page {
        items: items[start..end].to_vec(),
        total,
        page: page.page.max(1),
        per_page: page.limit(),
    }
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Actors
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

fn check_actor_unique(inner: &Inner, actor_id: Option<Uuid>, email: Option<&str>, phone: Option<&str>, username: &str) -> Result<()> {
    for other in inner.actors.values() {
        if Some(other.id) == actor_id {
            continue;
        }
        if let (Some(a), Some(b)) = (email, other.email.as_deref()) {
            if a.eq_ignore_ascii_case(b) {
                return Err(Error::Conflict("email already in use".into()));
            }
        }
        if let (Some(a), Some(b)) = (phone, other.phone.as_deref()) {
            if a == b {
                return Err(Error::Conflict("phone already in use".into()));
            }
        }
        if username.eq_ignore_ascii_case(&other.username) {
            return Err(Error::Conflict("username already in use".into()));
        }
    }
    Ok(())
}

#[async_trait::async_trait]
impl ActorStore for MemoryStore {
    async fn insert(&self, new: NewActor) -> Result<Actor> {
        let mut inner = self.inner.write();
        check_actor_unique(&inner, None, new.email.as_deref(), new.phone.as_deref(), &new.username)?;

        let now = Utc::now();
        #[allow(deprecated)]
        let actor = Actor {
            id: Uuid::new_v4(),
            email: new.email,
            phone: new.phone,
            username: new.username,
            password_hash: new.password_hash,
            display_name: new.display_name,
            avatar_url: new.avatar_url,
            role_id: new.role_id,
            role: new.role,
            kind: new.kind,
            email_verified: new.email_verified,
            phone_verified: new.phone_verified,
            is_active: true,
            totp_secret: None,
            totp_enabled: false,
            totp_enabled_at: None,
            created_at: now,
            updated_at: now,
        };
        inner.actors.insert(actor.id, actor.clone());
        Ok(actor)
    }

    async fn get(&self, id: Uuid) -> Result<Option<Actor>> {
        Ok(self.inner.read().actors.get(&id).cloned())
    }

    async fn find_by_email(&self, email: &str) -> Result<Option<Actor>> {
        Ok(self
            .inner
            .read()
            .actors
            .values()
            .find(|a| a.email.as_deref().map_or(false, |e| e.eq_ignore_ascii_case(email)))
            .cloned())
    }

    async fn find_by_phone(&self, phone: &str) -> Result<Option<Actor>> {
        Ok(self
            .inner
            .read()
            .actors
            .values()
            .find(|a| a.phone.as_deref() == Some(phone))
            .cloned())
    }

    async fn find_by_username(&self, username: &str) -> Result<Option<Actor>> {
        Ok(self
            .inner
            .read()
            .actors
            .values()
            .find(|a| a.username.eq_ignore_ascii_case(username))
            .cloned())
    }

    async fn update(&self, actor: &Actor) -> Result<()> {
        let mut inner = self.inner.write();
        if !inner.actors.contains_key(&actor.id) {
            return Err(Error::NotFound("actor".into()));
        }
        check_actor_unique(
            &inner,
            Some(actor.id),
            actor.email.as_deref(),
            actor.phone.as_deref(),
            &actor.username,
        )?;
        let mut updated = actor.clone();
        updated.updated_at = Utc::now();
        inner.actors.insert(actor.id, updated);
        Ok(())
    }

    async fn list(&self, page: PageRequest) -> Result<Page<Actor>> {
        let inner = self.inner.read();
        let mut actors: Vec<Actor> = inner.actors.values().cloned().collect();
        actors.sort_by_key(|a| std::cmp::Reverse(a.created_at));
        Ok(page_of(&actors, page))
    }

    async fn count_with_role(&self, role_id: Uuid) -> Result<u64> {
        Ok(self
            .inner
            .read()
            .actors
            .values()
            .filter(|a| a.role_id == Some(role_id))
            .count() as u64)
    }
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Sessions
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

fn live_digest_taken(inner: &Inner, digest: &str, now: DateTime<Utc>) -> bool {
    inner
        .sessions
        .values()
        .any(|s| s.refresh_digest == digest && s.is_live(now))
}

#[async_trait::async_trait]
impl SessionStore for MemoryStore {
    async fn insert(&self, session: Session) -> Result<()> {
        let mut inner = self.inner.write();
        if live_digest_taken(&inner, &session.refresh_digest, Utc::now()) {
            return Err(Error::Conflict("refresh digest already bound to a live session".into()));
        }
        inner.sessions.insert(session.id, session);
        Ok(())
    }

    async fn rotate(&self, old_id: Uuid, replacement: Session) -> Result<()> {
        let mut inner = self.inner.write();
        let now = Utc::now();

        // All checks precede all writes; a failed rotation leaves the old
        // session untouched.
        if live_digest_taken(&inner, &replacement.refresh_digest, now) {
            return Err(Error::Conflict("refresh digest already bound to a live session".into()));
        }
        let old = inner
            .sessions
            .get_mut(&old_id)
            .ok_or_else(|| Error::NotFound("session".into()))?;
        if old.revoked_at.is_some() {
            return Err(Error::Conflict("session already revoked".into()));
        }
        old.revoked_at = Some(now);
        inner.sessions.insert(replacement.id, replacement);
        Ok(())
    }

    async fn get(&self, id: Uuid) -> Result<Option<Session>> {
        Ok(self.inner.read().sessions.get(&id).cloned())
    }

    async fn find_live_by_digest(
        &self,
        digest: &str,
        now: DateTime<Utc>,
    ) -> Result<Option<Session>> {
        Ok(self
            .inner
            .read()
            .sessions
            .values()
            .find(|s| s.refresh_digest == digest && s.is_live(now))
            .cloned())
    }

    async fn find_by_digest(&self, digest: &str) -> Result<Option<Session>> {
        Ok(self
            .inner
            .read()
            .sessions
            .values()
            .find(|s| s.refresh_digest == digest)
            .cloned())
    }

    async fn touch(&self, id: Uuid, now: DateTime<Utc>) -> Result<()> {
        if let Some(session) = self.inner.write().sessions.get_mut(&id) {
            session.last_active_at = now;
        }
        Ok(())
    }

    async fn rename(&self, id: Uuid, actor_id: Uuid, label: &str) -> Result<bool> {
        let mut inner = self.inner.write();
        match inner.sessions.get_mut(&id) {
            Some(session) if session.actor_id == actor_id => {
                session.label = Some(label.to_string());
                Ok(true)
            }
            _ => Ok(false),
        }
    }

    async fn revoke(&self, id: Uuid, now: DateTime<Utc>) -> Result<bool> {
        let mut inner = self.inner.write();
        match inner.sessions.get_mut(&id) {
            Some(session) if session.revoked_at.is_none() => {
                session.revoked_at = Some(now);
                Ok(true)
            }
            _ => Ok(false),
        }
    }

    async fn revoke_all_for_actor(
        &self,
        actor_id: Uuid,
        except: Option<Uuid>,
        now: DateTime<Utc>,
    ) -> Result<usize> {
        let mut inner = self.inner.write();
        let mut revoked = 0;
        for session in inner.sessions.values_mut() {
            if session.actor_id == actor_id
                && Some(session.id) != except
                && session.revoked_at.is_none()
            {
                session.revoked_at = Some(now);
                revoked += 1;
            }
        }
        Ok(revoked)
    }

    async fn list_for_actor(
        &self,
        actor_id: Uuid,
        live_only: bool,
        now: DateTime<Utc>,
        page: PageRequest,
    ) -> Result<Page<Session>> {
        let inner = self.inner.read();
        let mut sessions: Vec<Session> = inner
            .sessions
            .values()
            .filter(|s| s.actor_id == actor_id && (!live_only || s.is_live(now)))
            .cloned()
            .collect();
        sessions.sort_by_key(|s| std::cmp::Reverse(s.last_active_at));
        Ok(page_of(&sessions, page))
    }

    async fn list_all(&self, page: PageRequest) -> Result<Page<Session>> {
        let inner = self.inner.read();
        let mut sessions: Vec<Session> = inner.sessions.values().cloned().collect();
        sessions.sort_by_key(|s| std::cmp::Reverse(s.last_active_at));
        Ok(page_of(&sessions, page))
    }

    async fn live_sessions(&self, now: DateTime<Utc>) -> Result<Vec<Session>> {
        Ok(self
            .inner
            .read()
            .sessions
            .values()
            .filter(|s| s.is_live(now))
            .cloned()
            .collect())
    }

    async fn gc(&self, now: DateTime<Utc>, retention: Duration) -> Result<usize> {
        let mut inner = self.inner.write();
        let before = inner.sessions.len();
        inner.sessions.retain(|_, s| {
            let expired = s.expires_at <= now;
            let stale_revoked = s
                .revoked_at
                .map(|at| now - at > retention)
                .unwrap_or(false);
            !(expired || stale_revoked)
        });
        Ok(before - inner.sessions.len())
    }
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Roles & permissions
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

#[async_trait::async_trait]
impl RoleStore for MemoryStore {
    async fn insert_role(&self, role: Role) -> Result<()> {
        let mut inner = self.inner.write();
        if inner.roles.values().any(|r| r.name == role.name) {
            return Err(Error::Conflict(format!("role '{}' already exists", role.name)));
        }
        inner.roles.insert(role.id, role);
        Ok(())
    }

    async fn update_role(&self, role: &Role) -> Result<()> {
        let mut inner = self.inner.write();
        if inner
            .roles
            .values()
            .any(|r| r.id != role.id && r.name == role.name)
        {
            return Err(Error::Conflict(format!("role '{}' already exists", role.name)));
        }
        if !inner.roles.contains_key(&role.id) {
            return Err(Error::NotFound("role".into()));
        }
        let mut updated = role.clone();
        updated.updated_at = Utc::now();
        inner.roles.insert(role.id, updated);
        Ok(())
    }

    async fn delete_role(&self, id: Uuid) -> Result<()> {
        let mut inner = self.inner.write();
        inner
            .roles
            .remove(&id)
            .map(|_| ())
            .ok_or_else(|| Error::NotFound("role".into()))
    }

    async fn get_role(&self, id: Uuid) -> Result<Option<Role>> {
        Ok(self.inner.read().roles.get(&id).cloned())
    }

    async fn find_role_by_name(&self, name: &str) -> Result<Option<Role>> {
        Ok(self
            .inner
            .read()
            .roles
            .values()
            .find(|r| r.name == name)
            .cloned())
    }

    async fn list_roles(&self) -> Result<Vec<Role>> {
        let mut roles: Vec<Role> = self.inner.read().roles.values().cloned().collect();
        roles.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(roles)
    }

    async fn insert_permission(&self, permission: Permission) -> Result<()> {
        let mut inner = self.inner.write();
        if inner.permissions.values().any(|p| p.name == permission.name) {
            return Err(Error::Conflict(format!(
                "permission '{}' already exists",
                permission.name
            )));
        }
        inner.permissions.insert(permission.id, permission);
        Ok(())
    }

    async fn update_permission(&self, permission: &Permission) -> Result<()> {
        let mut inner = self.inner.write();
        if inner
            .permissions
            .values()
            .any(|p| p.id != permission.id && p.name == permission.name)
        {
            return Err(Error::Conflict(format!(
                "permission '{}' already exists",
                permission.name
            )));
        }
        if !inner.permissions.contains_key(&permission.id) {
            return Err(Error::NotFound("permission".into()));
        }
        inner.permissions.insert(permission.id, permission.clone());
        Ok(())
    }

    async fn delete_permission(&self, id: Uuid) -> Result<()> {
        let mut inner = self.inner.write();
        if inner.permissions.remove(&id).is_none() {
            return Err(Error::NotFound("permission".into()));
        }
        // Drop dangling references from roles.
        for role in inner.roles.values_mut() {
            role.permission_ids.retain(|pid| *pid != id);
        }
        Ok(())
    }

    async fn get_permission(&self, id: Uuid) -> Result<Option<Permission>> {
        Ok(self.inner.read().permissions.get(&id).cloned())
    }

    async fn find_permission_by_name(&self, name: &str) -> Result<Option<Permission>> {
        Ok(self
            .inner
            .read()
            .permissions
            .values()
            .find(|p| p.name == name)
            .cloned())
    }

    async fn list_permissions(&self) -> Result<Vec<Permission>> {
        let mut permissions: Vec<Permission> =
            self.inner.read().permissions.values().cloned().collect();
        permissions.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(permissions)
    }
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// API keys
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

#[async_trait::async_trait]
impl ApiKeyStore for MemoryStore {
    async fn insert(&self, key: ApiKey) -> Result<()> {
        let mut inner = self.inner.write();
        if inner.api_keys.values().any(|k| k.prefix == key.prefix) {
            return Err(Error::Conflict("api key prefix collision".into()));
        }
        inner.api_keys.insert(key.id, key);
        Ok(())
    }

    async fn get(&self, id: Uuid) -> Result<Option<ApiKey>> {
        Ok(self.inner.read().api_keys.get(&id).cloned())
    }

    async fn find_by_prefix(&self, prefix: &str) -> Result<Option<ApiKey>> {
        Ok(self
            .inner
            .read()
            .api_keys
            .values()
            .find(|k| k.prefix == prefix)
            .cloned())
    }

    async fn list_for_actor(&self, actor_id: Uuid) -> Result<Vec<ApiKey>> {
        let mut keys: Vec<ApiKey> = self
            .inner
            .read()
            .api_keys
            .values()
            .filter(|k| k.actor_id == actor_id)
            .cloned()
            .collect();
        keys.sort_by_key(|k| std::cmp::Reverse(k.created_at));
        Ok(keys)
    }

    async fn update(&self, key: &ApiKey) -> Result<()> {
        let mut inner = self.inner.write();
        if !inner.api_keys.contains_key(&key.id) {
            return Err(Error::NotFound("api key".into()));
        }
        inner.api_keys.insert(key.id, key.clone());
        Ok(())
    }

    async fn delete(&self, id: Uuid, actor_id: Uuid) -> Result<bool> {
        let mut inner = self.inner.write();
        match inner.api_keys.get(&id) {
            Some(key) if key.actor_id == actor_id => {
                inner.api_keys.remove(&id);
                Ok(true)
            }
            _ => Ok(false),
        }
    }

    async fn touch_last_used(&self, id: Uuid, now: DateTime<Utc>) -> Result<()> {
        if let Some(key) = self.inner.write().api_keys.get_mut(&id) {
            key.last_used_at = Some(now);
        }
        Ok(())
    }
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// OTP records
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

#[async_trait::async_trait]
impl OtpStore for MemoryStore {
    async fn insert(&self, record: OtpRecord) -> Result<()> {
        self.inner.write().otps.push(record);
        Ok(())
    }

    async fn latest_unconsumed(
        &self,
        target: &str,
        purpose: OtpPurpose,
    ) -> Result<Option<OtpRecord>> {
        Ok(self
            .inner
            .read()
            .otps
            .iter()
            .filter(|r| r.target == target && r.purpose == purpose && !r.consumed)
            .max_by_key(|r| r.created_at)
            .cloned())
    }

    async fn record_attempt(&self, id: Uuid) -> Result<u32> {
        let mut inner = self.inner.write();
        let record = inner
            .otps
            .iter_mut()
            .find(|r| r.id == id)
            .ok_or_else(|| Error::NotFound("otp record".into()))?;
        record.attempts += 1;
        Ok(record.attempts)
    }

    async fn consume(&self, id: Uuid) -> Result<bool> {
        let mut inner = self.inner.write();
        match inner.otps.iter_mut().find(|r| r.id == id) {
            Some(record) if !record.consumed => {
                record.consumed = true;
                Ok(true)
            }
            _ => Ok(false),
        }
    }

    async fn invalidate(&self, target: &str, purpose: OtpPurpose) -> Result<usize> {
        let mut inner = self.inner.write();
        let mut invalidated = 0;
        for record in inner
            .otps
            .iter_mut()
            .filter(|r| r.target == target && r.purpose == purpose && !r.consumed)
        {
            record.consumed = true;
            invalidated += 1;
        }
        Ok(invalidated)
    }

    async fn purge_expired(&self, now: DateTime<Utc>) -> Result<usize> {
        let mut inner = self.inner.write();
        let before = inner.otps.len();
        inner.otps.retain(|r| !r.consumed && r.expires_at > now);
        Ok(before - inner.otps.len())
    }
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Backup codes
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

#[async_trait::async_trait]
impl BackupCodeStore for MemoryStore {
    async fn replace_for_actor(&self, actor_id: Uuid, digests: Vec<String>) -> Result<()> {
        let mut inner = self.inner.write();
        inner.backup_codes.retain(|c| c.actor_id != actor_id);
        let now = Utc::now();
        inner.backup_codes.extend(digests.into_iter().map(|digest| BackupCode {
            actor_id,
            code_digest: digest,
            consumed: false,
            created_at: now,
        }));
        Ok(())
    }

    async fn consume(&self, actor_id: Uuid, digest: &str) -> Result<bool> {
        // Single write lock: the check and the flip are one step, so two
        // concurrent submissions of the same code cannot both win.
        let mut inner = self.inner.write();
        match inner
            .backup_codes
            .iter_mut()
            .find(|c| c.actor_id == actor_id && c.code_digest == digest && !c.consumed)
        {
            Some(code) => {
                code.consumed = true;
                Ok(true)
            }
            None => Ok(false),
        }
    }

    async fn remaining(&self, actor_id: Uuid) -> Result<usize> {
        Ok(self
            .inner
            .read()
            .backup_codes
            .iter()
            .filter(|c| c.actor_id == actor_id && !c.consumed)
            .count())
    }

    async fn clear(&self, actor_id: Uuid) -> Result<()> {
        self.inner
            .write()
            .backup_codes
            .retain(|c| c.actor_id != actor_id);
        Ok(())
    }
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// IP rules
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

#[async_trait::async_trait]
impl IpRuleStore for MemoryStore {
    async fn list(&self) -> Result<Vec<IpRule>> {
        Ok(self.inner.read().ip_rules.clone())
    }

    async fn insert(&self, rule: IpRule) -> Result<()> {
        self.inner.write().ip_rules.push(rule);
        Ok(())
    }

    async fn delete(&self, id: Uuid) -> Result<bool> {
        let mut inner = self.inner.write();
        let before = inner.ip_rules.len();
        inner.ip_rules.retain(|r| r.id != id);
        Ok(inner.ip_rules.len() < before)
    }
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Audit log
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

#[async_trait::async_trait]
impl AuditStore for MemoryStore {
    async fn append(&self, event: AuditEvent) -> Result<()> {
        self.inner.write().audit.push(event);
        Ok(())
    }

    async fn list(&self, filter: AuditFilter, page: PageRequest) -> Result<Page<AuditEvent>> {
        let inner = self.inner.read();
        let mut events: Vec<AuditEvent> = inner
            .audit
            .iter()
            .filter(|e| {
                filter.actor_id.map_or(true, |id| e.actor_id == Some(id))
                    && filter.action.as_deref().map_or(true, |a| e.action == a)
                    && filter.outcome.map_or(true, |o| e.outcome == o)
            })
            .cloned()
            .collect();
        events.sort_by_key(|e| std::cmp::Reverse(e.created_at));
        Ok(page_of(&events, page))
    }

    async fn geo_counts(&self) -> Result<Vec<(String, u64)>> {
        let inner = self.inner.read();
        let mut counts: HashMap<String, u64> = HashMap::new();
        for event in &inner.audit {
            if let Some(country) = &event.country {
                *counts.entry(country.clone()).or_default() += 1;
            }
        }
        let mut counts: Vec<(String, u64)> = counts.into_iter().collect();
        counts.sort_by(|a, b| b.1.cmp(&a.1).then_with(|| a.0.cmp(&b.0)));
        Ok(counts)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use agw_domain::model::{DeviceDescriptor, DEFAULT_ROLE};

    fn new_actor(username: &str, email: Option<&str>) -> NewActor {
        NewActor {
            email: email.map(str::to_string),
            phone: None,
            username: username.to_string(),
            password_hash: None,
            display_name: None,
            avatar_url: None,
            role_id: None,
            role: DEFAULT_ROLE.to_string(),
            kind: Default::default(),
            email_verified: false,
            phone_verified: false,
        }
    }

    fn session(actor_id: Uuid, digest: &str, ttl_secs: i64) -> Session {
        let now = Utc::now();
        Session {
            id: Uuid::new_v4(),
            actor_id,
            refresh_digest: digest.to_string(),
            device: DeviceDescriptor::default(),
            ip: None,
            user_agent: None,
            label: None,
            last_active_at: now,
            expires_at: now + Duration::seconds(ttl_secs),
            created_at: now,
            revoked_at: None,
        }
    }

    #[tokio::test]
    async fn duplicate_email_conflicts() {
        let store = MemoryStore::new();
        ActorStore::insert(&store, new_actor("alice", Some("a@x.test")))
            .await
            .unwrap();
        let err = ActorStore::insert(&store, new_actor("bob", Some("A@X.TEST")))
            .await
            .unwrap_err();
        assert!(matches!(err, Error::Conflict(msg) if msg.contains("email")));
    }

    #[tokio::test]
    async fn duplicate_username_conflicts() {
        let store = MemoryStore::new();
        ActorStore::insert(&store, new_actor("alice", None)).await.unwrap();
        let err = ActorStore::insert(&store, new_actor("Alice", None))
            .await
            .unwrap_err();
        assert!(matches!(err, Error::Conflict(msg) if msg.contains("username")));
    }

    #[tokio::test]
    async fn live_digest_is_unique() {
        let store = MemoryStore::new();
        let actor = Uuid::new_v4();
        SessionStore::insert(&store, session(actor, "d1", 3600)).await.unwrap();
        let err = SessionStore::insert(&store, session(actor, "d1", 3600))
            .await
            .unwrap_err();
        assert!(matches!(err, Error::Conflict(_)));
    }

    #[tokio::test]
    async fn rotate_revokes_old_and_frees_digest() {
        let store = MemoryStore::new();
        let actor = Uuid::new_v4();
        let old = session(actor, "d1", 3600);
        let old_id = old.id;
        SessionStore::insert(&store, old).await.unwrap();

        store.rotate(old_id, session(actor, "d2", 3600)).await.unwrap();

        let now = Utc::now();
        assert!(SessionStore::get(&store, old_id)
            .await
            .unwrap()
            .unwrap()
            .revoked_at
            .is_some());
        assert!(store.find_live_by_digest("d1", now).await.unwrap().is_none());
        assert!(store.find_live_by_digest("d2", now).await.unwrap().is_some());

        // A revoked session cannot be rotated again.
        let err = store.rotate(old_id, session(actor, "d3", 3600)).await.unwrap_err();
        assert!(matches!(err, Error::Conflict(_)));
        // The same digest is insertable again after rotation retired it.
        SessionStore::insert(&store, session(actor, "d1", 3600)).await.unwrap();
    }

    #[tokio::test]
    async fn revoke_all_spares_the_exception() {
        let store = MemoryStore::new();
        let actor = Uuid::new_v4();
        let keep = session(actor, "keep", 3600);
        let keep_id = keep.id;
        SessionStore::insert(&store, keep).await.unwrap();
        SessionStore::insert(&store, session(actor, "d2", 3600)).await.unwrap();
        SessionStore::insert(&store, session(actor, "d3", 3600)).await.unwrap();

        let revoked = store
            .revoke_all_for_actor(actor, Some(keep_id), Utc::now())
            .await
            .unwrap();
        assert_eq!(revoked, 2);
        assert!(SessionStore::get(&store, keep_id)
            .await
            .unwrap()
            .unwrap()
            .revoked_at
            .is_none());
    }

    #[tokio::test]
    async fn gc_drops_expired_and_stale_revoked() {
        let store = MemoryStore::new();
        let actor = Uuid::new_v4();
        SessionStore::insert(&store, session(actor, "expired", -10)).await.unwrap();
        let revoked = session(actor, "revoked", 3600);
        let revoked_id = revoked.id;
        SessionStore::insert(&store, revoked).await.unwrap();
        store.revoke(revoked_id, Utc::now() - Duration::days(90)).await.unwrap();
        SessionStore::insert(&store, session(actor, "live", 3600)).await.unwrap();

        let removed = store.gc(Utc::now(), Duration::days(30)).await.unwrap();
        assert_eq!(removed, 2);
        assert_eq!(store.live_sessions(Utc::now()).await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn backup_code_consumes_exactly_once() {
        let store = MemoryStore::new();
        let actor = Uuid::new_v4();
        store
            .replace_for_actor(actor, vec!["h1".into(), "h2".into()])
            .await
            .unwrap();

        assert!(BackupCodeStore::consume(&store, actor, "h1").await.unwrap());
        assert!(!BackupCodeStore::consume(&store, actor, "h1").await.unwrap());
        assert_eq!(store.remaining(actor).await.unwrap(), 1);
    }

    #[tokio::test]
    async fn otp_conditional_consume_and_invalidate() {
        let store = MemoryStore::new();
        let record = OtpRecord {
            id: Uuid::new_v4(),
            target: "a@x.test".into(),
            purpose: OtpPurpose::VerifyEmail,
            code_digest: "digest".into(),
            expires_at: Utc::now() + Duration::minutes(5),
            consumed: false,
            attempts: 0,
            created_at: Utc::now(),
        };
        let id = record.id;
        OtpStore::insert(&store, record).await.unwrap();

        assert!(store
            .latest_unconsumed("a@x.test", OtpPurpose::VerifyEmail)
            .await
            .unwrap()
            .is_some());
        assert!(OtpStore::consume(&store, id).await.unwrap());
        assert!(!OtpStore::consume(&store, id).await.unwrap());
        assert!(store
            .latest_unconsumed("a@x.test", OtpPurpose::VerifyEmail)
            .await
            .unwrap()
            .is_none());
    }

    #[tokio::test]
    async fn audit_filter_and_geo_counts() {
        let store = MemoryStore::new();
        let actor = Uuid::new_v4();
        let mut e1 = AuditEvent::new("signin", "auth", agw_domain::model::AuditOutcome::Success)
            .actor(actor);
        e1.country = Some("DE".into());
        let mut e2 = AuditEvent::new("signup", "auth", agw_domain::model::AuditOutcome::Success);
        e2.country = Some("DE".into());
        store.append(e1).await.unwrap();
        store.append(e2).await.unwrap();

        let page = AuditStore::list(
            &store,
            AuditFilter {
                actor_id: Some(actor),
                ..Default::default()
            },
            PageRequest::default(),
        )
        .await
        .unwrap();
        assert_eq!(page.total, 1);
        assert_eq!(store.geo_counts().await.unwrap(), vec![("DE".into(), 2)]);
    }
}
