use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use chrono::Utc;
use parking_lot::RwLock;
use uuid::Uuid;

use agw_domain::model::{
    Permission, Role, ADMIN_ROLE, DEFAULT_ROLE, SERVICE_ROLE,
};
use agw_domain::{Error, Result};
use agw_store::{ActorStore, RoleStore};

use crate::matrix::{Matrix, MatrixExport};

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Engine
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// Authorization engine with a version-bumped in-process matrix.
///
/// Reads never block on writes: `can()` clones the current `Arc`
/// snapshot out of the lock and works on that. Every mutation rebuilds
/// the snapshot from the store.
pub struct AuthzEngine {
    roles: Arc<dyn RoleStore>,
    actors: Arc<dyn ActorStore>,
    snapshot: RwLock<Arc<Matrix>>,
    version: AtomicU64,
}

impl AuthzEngine {
    /// Build the engine and load the initial snapshot.
    pub async fn load(roles: Arc<dyn RoleStore>, actors: Arc<dyn ActorStore>) -> Result<Self> {
        let engine = Self {
            roles,
            actors,
            snapshot: RwLock::new(Arc::new(Matrix::build(&[], &[], 0))),
            version: AtomicU64::new(0),
        };
        engine.reload().await?;
        Ok(engine)
    }

    /// Rebuild the snapshot from the store and bump the version.
    pub async fn reload(&self) -> Result<()> {
        let roles = self.roles.list_roles().await?;
        let permissions = self.roles.list_permissions().await?;
        let version = self.version.fetch_add(1, Ordering::SeqCst) + 1;
        let matrix = Arc::new(Matrix::build(&roles, &permissions, version));
        *self.snapshot.write() = matrix;
        tracing::debug!(version, roles = roles.len(), permissions = permissions.len(), "authorization matrix reloaded");
        Ok(())
    }

    /// The current snapshot. Cheap; callers may hold it across awaits.
    pub fn matrix(&self) -> Arc<Matrix> {
        self.snapshot.read().clone()
    }

    /// May an actor with this role perform `action` on `resource`?
    pub fn can(
        &self,
        role_id: Option<Uuid>,
        legacy_role: &str,
        resource: &str,
        action: &str,
    ) -> bool {
        self.matrix().role_allows(role_id, legacy_role, resource, action)
    }

    /// Scope check for API-key principals.
    pub fn scopes_allow(&self, scopes: &[String], resource: &str, action: &str) -> bool {
        self.matrix().scopes_allow(scopes, resource, action)
    }

    /// Resolve the display role name for claims: reference first, legacy
    /// string as fallback.
    pub fn role_name(&self, role_id: Option<Uuid>, legacy_role: &str) -> String {
        role_id
            .and_then(|id| self.matrix().role_name(id).map(str::to_string))
            .unwrap_or_else(|| legacy_role.to_string())
    }

    pub async fn export(&self) -> Result<MatrixExport> {
        let roles = self.roles.list_roles().await?;
        let permissions = self.roles.list_permissions().await?;
        let grants = roles
            .iter()
            .map(|r| (r.id, r.permission_ids.clone()))
            .collect();
        Ok(MatrixExport {
            roles,
            permissions,
            grants,
            version: self.version.load(Ordering::SeqCst),
        })
    }

    // ── Mutations ───────────────────────────────────────────────────

    pub async fn create_role(
        &self,
        name: &str,
        display_name: &str,
        description: &str,
        permission_ids: Vec<Uuid>,
    ) -> Result<Role> {
        let now = Utc::now();
        let role = Role {
            id: Uuid::new_v4(),
            name: name.to_string(),
            display_name: display_name.to_string(),
            description: description.to_string(),
            is_system: false,
            permission_ids,
            created_at: now,
            updated_at: now,
        };
        self.roles.insert_role(role.clone()).await?;
        self.reload().await?;
        Ok(role)
    }

    pub async fn update_role(
        &self,
        id: Uuid,
        display_name: Option<String>,
        description: Option<String>,
        permission_ids: Option<Vec<Uuid>>,
    ) -> Result<Role> {
        let mut role = self
            .roles
            .get_role(id)
            .await?
            .ok_or_else(|| Error::NotFound("role".into()))?;
        if role.is_system && permission_ids.is_some() && role.name == ADMIN_ROLE {
            return Err(Error::Forbidden("the admin role grant set is immutable".into()));
        }
        if let Some(display_name) = display_name {
            role.display_name = display_name;
        }
        if let Some(description) = description {
            role.description = description;
        }
        if let Some(permission_ids) = permission_ids {
            role.permission_ids = permission_ids;
        }
        self.roles.update_role(&role).await?;
        self.reload().await?;
        Ok(role)
    }

    /// Delete a role. System roles and roles still assigned to actors
    /// are protected.
    pub async fn delete_role(&self, id: Uuid) -> Result<()> {
        let role = self
            .roles
            .get_role(id)
            .await?
            .ok_or_else(|| Error::NotFound("role".into()))?;
        if role.is_system {
            return Err(Error::Forbidden(format!("system role '{}' cannot be deleted", role.name)));
        }
        let assigned = self.actors.count_with_role(id).await?;
        if assigned > 0 {
            return Err(Error::Conflict(format!(
                "role '{}' is still assigned to {assigned} actor(s)",
                role.name
            )));
        }
        self.roles.delete_role(id).await?;
        self.reload().await
    }

    pub async fn create_permission(
        &self,
        name: &str,
        resource: &str,
        action: &str,
        description: &str,
    ) -> Result<Permission> {
        let permission = Permission {
            id: Uuid::new_v4(),
            name: name.to_string(),
            resource: resource.to_string(),
            action: action.to_string(),
            description: description.to_string(),
            created_at: Utc::now(),
        };
        self.roles.insert_permission(permission.clone()).await?;
        self.reload().await?;
        Ok(permission)
    }

    pub async fn update_permission(
        &self,
        id: Uuid,
        description: Option<String>,
    ) -> Result<Permission> {
        let mut permission = self
            .roles
            .get_permission(id)
            .await?
            .ok_or_else(|| Error::NotFound("permission".into()))?;
        if let Some(description) = description {
            permission.description = description;
        }
        self.roles.update_permission(&permission).await?;
        self.reload().await?;
        Ok(permission)
    }

    pub async fn delete_permission(&self, id: Uuid) -> Result<()> {
        self.roles.delete_permission(id).await?;
        self.reload().await
    }

    /// Grant or revoke one permission on a role.
    pub async fn set_role_permission(&self, role_id: Uuid, permission_id: Uuid, granted: bool) -> Result<Role> {
        let mut role = self
            .roles
            .get_role(role_id)
            .await?
            .ok_or_else(|| Error::NotFound("role".into()))?;
        if role.name == ADMIN_ROLE {
            return Err(Error::Forbidden("the admin role grant set is immutable".into()));
        }
        if self.roles.get_permission(permission_id).await?.is_none() {
            return Err(Error::NotFound("permission".into()));
        }
        if granted {
            if !role.permission_ids.contains(&permission_id) {
                role.permission_ids.push(permission_id);
            }
        } else {
            role.permission_ids.retain(|id| *id != permission_id);
        }
        self.roles.update_role(&role).await?;
        self.reload().await?;
        Ok(role)
    }

    /// Point an actor at a role. Writes both the reference and the
    /// legacy role string.
    pub async fn assign_role(&self, actor_id: Uuid, role_id: Uuid) -> Result<()> {
        let role = self
            .roles
            .get_role(role_id)
            .await?
            .ok_or_else(|| Error::NotFound("role".into()))?;
        let mut actor = self
            .actors
            .get(actor_id)
            .await?
            .ok_or_else(|| Error::NotFound("actor".into()))?;
        actor.role_id = Some(role.id);
        #[allow(deprecated)]
        {
            actor.role = role.name.clone();
        }
        self.actors.update(&actor).await
    }

    /// Seed the system roles and the baseline permission set on first
    /// boot. Idempotent.
    pub async fn ensure_defaults(&self) -> Result<()> {
        let baseline: [(&str, &str, &str); 6] = [
            ("users.read", "users", "read"),
            ("users.write", "users", "write"),
            ("users.delete", "users", "delete"),
            ("sessions.read", "sessions", "read"),
            ("sessions.revoke", "sessions", "revoke"),
            ("audit.read", "audit", "read"),
        ];
        for (name, resource, action) in baseline {
            if self.roles.find_permission_by_name(name).await?.is_none() {
                let now = Utc::now();
                self.roles
                    .insert_permission(Permission {
                        id: Uuid::new_v4(),
                        name: name.to_string(),
                        resource: resource.to_string(),
                        action: action.to_string(),
                        description: String::new(),
                        created_at: now,
                    })
                    .await?;
            }
        }

        let read_ids: Vec<Uuid> = {
            let mut ids = Vec::new();
            for name in ["users.read", "sessions.read"] {
                if let Some(p) = self.roles.find_permission_by_name(name).await? {
                    ids.push(p.id);
                }
            }
            ids
        };

        for (name, display, permission_ids) in [
            (ADMIN_ROLE, "Administrator", Vec::new()),
            (DEFAULT_ROLE, "User", Vec::new()),
            (SERVICE_ROLE, "Service Account", read_ids),
        ] {
            if self.roles.find_role_by_name(name).await?.is_none() {
                let now = Utc::now();
                self.roles
                    .insert_role(Role {
                        id: Uuid::new_v4(),
                        name: name.to_string(),
                        display_name: display.to_string(),
                        description: String::new(),
                        is_system: true,
                        permission_ids,
                        created_at: now,
                        updated_at: now,
                    })
                    .await?;
            }
        }
        self.reload().await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use agw_domain::model::{ActorKind, NewActor};
    use agw_store::MemoryStore;

    async fn engine() -> (AuthzEngine, Arc<MemoryStore>) {
        let store = Arc::new(MemoryStore::new());
        let engine = AuthzEngine::load(store.clone(), store.clone()).await.unwrap();
        engine.ensure_defaults().await.unwrap();
        (engine, store)
    }

    async fn seed_actor(store: &MemoryStore, role: &str, role_id: Option<Uuid>) -> Uuid {
        ActorStore::insert(
            store,
            NewActor {
                email: None,
                phone: None,
                username: format!("user-{}", Uuid::new_v4().simple()),
                password_hash: None,
                display_name: None,
                avatar_url: None,
                role_id,
                role: role.to_string(),
                kind: ActorKind::Human,
                email_verified: false,
                phone_verified: false,
            },
        )
        .await
        .unwrap()
        .id
    }

    #[tokio::test]
    async fn admin_matches_everything() {
        let (engine, _) = engine().await;
        let admin_id = engine.matrix().role_id(ADMIN_ROLE);
        assert!(engine.can(admin_id, ADMIN_ROLE, "anything", "at-all"));
    }

    #[tokio::test]
    async fn grants_are_exact_and_default_deny() {
        let (engine, _) = engine().await;
        let service_id = engine.matrix().role_id(SERVICE_ROLE);
        assert!(engine.can(service_id, SERVICE_ROLE, "users", "read"));
        assert!(!engine.can(service_id, SERVICE_ROLE, "users", "delete"));
        assert!(!engine.can(None, "nonexistent-role", "users", "read"));
    }

    #[tokio::test]
    async fn legacy_role_string_is_the_fallback() {
        let (engine, _) = engine().await;
        // No reference: the legacy string resolves the role.
        assert!(engine.can(None, SERVICE_ROLE, "users", "read"));
        // Reference wins over a stale legacy string.
        let user_id = engine.matrix().role_id(DEFAULT_ROLE);
        assert!(!engine.can(user_id, SERVICE_ROLE, "users", "read"));
    }

    #[tokio::test]
    async fn scope_check_resolves_permission_names() {
        let (engine, _) = engine().await;
        let scopes = vec!["users.read".to_string()];
        assert!(engine.scopes_allow(&scopes, "users", "read"));
        assert!(!engine.scopes_allow(&scopes, "users", "delete"));
        assert!(!engine.scopes_allow(&[], "users", "read"));
    }

    #[tokio::test]
    async fn mutations_invalidate_the_snapshot() {
        let (engine, _) = engine().await;
        let before = engine.matrix().version;

        let permission = engine
            .create_permission("reports.read", "reports", "read", "")
            .await
            .unwrap();
        let role = engine
            .create_role("analyst", "Analyst", "", vec![permission.id])
            .await
            .unwrap();

        assert!(engine.matrix().version > before);
        assert!(engine.can(Some(role.id), "analyst", "reports", "read"));

        engine
            .set_role_permission(role.id, permission.id, false)
            .await
            .unwrap();
        assert!(!engine.can(Some(role.id), "analyst", "reports", "read"));
    }

    #[tokio::test]
    async fn system_and_assigned_roles_are_protected() {
        let (engine, store) = engine().await;
        let admin_id = engine.matrix().role_id(ADMIN_ROLE).unwrap();
        assert!(matches!(
            engine.delete_role(admin_id).await,
            Err(Error::Forbidden(_))
        ));

        let role = engine.create_role("temp", "Temp", "", vec![]).await.unwrap();
        seed_actor(&store, "temp", Some(role.id)).await;
        assert!(matches!(
            engine.delete_role(role.id).await,
            Err(Error::Conflict(_))
        ));
    }

    #[tokio::test]
    async fn assign_role_writes_reference_and_legacy_string() {
        let (engine, store) = engine().await;
        let actor_id = seed_actor(&store, DEFAULT_ROLE, None).await;
        let admin_id = engine.matrix().role_id(ADMIN_ROLE).unwrap();

        engine.assign_role(actor_id, admin_id).await.unwrap();
        let actor = ActorStore::get(&*store, actor_id).await.unwrap().unwrap();
        assert_eq!(actor.role_id, Some(admin_id));
        assert_eq!(actor.legacy_role(), ADMIN_ROLE);
    }
}
