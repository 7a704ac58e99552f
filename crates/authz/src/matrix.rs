use std::collections::{HashMap, HashSet};

use serde::Serialize;
use uuid::Uuid;

use agw_domain::model::{Permission, Role, ADMIN_ROLE};

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Snapshot
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

struct RoleEntry {
    name: String,
    grants: HashSet<(String, String)>,
}

/// Immutable role→permission snapshot answering membership queries.
pub struct Matrix {
    roles_by_id: HashMap<Uuid, RoleEntry>,
    role_ids_by_name: HashMap<String, Uuid>,
    /// Permission machine name → (resource, action); resolves API-key
    /// scopes.
    grants_by_permission: HashMap<String, (String, String)>,
    pub version: u64,
}

impl Matrix {
    pub fn build(roles: &[Role], permissions: &[Permission], version: u64) -> Self {
        let by_perm_id: HashMap<Uuid, &Permission> =
            permissions.iter().map(|p| (p.id, p)).collect();

        let mut roles_by_id = HashMap::new();
        let mut role_ids_by_name = HashMap::new();
        for role in roles {
            let grants = role
                .permission_ids
                .iter()
                .filter_map(|pid| by_perm_id.get(pid))
                .map(|p| (p.resource.clone(), p.action.clone()))
                .collect();
            roles_by_id.insert(
                role.id,
                RoleEntry {
                    name: role.name.clone(),
                    grants,
                },
            );
            role_ids_by_name.insert(role.name.clone(), role.id);
        }

        Self {
            roles_by_id,
            role_ids_by_name,
            grants_by_permission: permissions
                .iter()
                .map(|p| (p.name.clone(), (p.resource.clone(), p.action.clone())))
                .collect(),
            version,
        }
    }

    pub fn role_name(&self, id: Uuid) -> Option<&str> {
        self.roles_by_id.get(&id).map(|r| r.name.as_str())
    }

    pub fn role_id(&self, name: &str) -> Option<Uuid> {
        self.role_ids_by_name.get(name).copied()
    }

    /// Does the role (by reference, falling back to the legacy name)
    /// grant `action` on `resource`? The admin role grants everything.
    pub fn role_allows(
        &self,
        role_id: Option<Uuid>,
        legacy_role: &str,
        resource: &str,
        action: &str,
    ) -> bool {
        let entry = role_id
            .and_then(|id| self.roles_by_id.get(&id))
            .or_else(|| {
                self.role_ids_by_name
                    .get(legacy_role)
                    .and_then(|id| self.roles_by_id.get(id))
            });
        let Some(entry) = entry else {
            // Unknown role: the only thing the legacy string can still
            // vouch for is admin itself.
            return legacy_role == ADMIN_ROLE;
        };
        if entry.name == ADMIN_ROLE {
            return true;
        }
        entry
            .grants
            .contains(&(resource.to_string(), action.to_string()))
    }

    /// Do the given API-key scopes (permission machine names) cover
    /// `action` on `resource`?
    pub fn scopes_allow(&self, scopes: &[String], resource: &str, action: &str) -> bool {
        scopes.iter().any(|scope| {
            self.grants_by_permission
                .get(scope)
                .map(|(r, a)| r == resource && a == action)
                .unwrap_or(false)
        })
    }
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Export
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// Full matrix dump for the admin UI.
#[derive(Debug, Clone, Serialize)]
pub struct MatrixExport {
    pub roles: Vec<Role>,
    pub permissions: Vec<Permission>,
    /// role id → granted permission ids.
    pub grants: HashMap<Uuid, Vec<Uuid>>,
    pub version: u64,
}
