use std::sync::Arc;

use agw_authz::AuthzEngine;
use agw_cache::{Blacklist, Cache, RateLimiter};
use agw_credentials::{PasswordHasher, TokenService};
use agw_domain::config::Config;
use agw_providers::ProviderRegistry;
use agw_sessions::SessionRegistry;
use agw_store::{
    ActorStore, ApiKeyStore, AuditStore, BackupCodeStore, IpRuleStore, OtpStore, RoleStore,
};

use crate::audit::AuditHandle;
use crate::ipfilter::IpFilterCache;
use crate::maintenance::Maintenance;

/// Shared application state passed to all handlers.
///
/// Fields are grouped by concern:
/// - **Config** — the immutable boot-time configuration
/// - **Stores** — identity-store ports (actors, sessions, roles, …)
/// - **Credentials** — token signers, password hasher
/// - **Control plane** — authorization engine, session registry
/// - **Abuse control** — cache, blacklist, rate limiter, IP filter,
///   maintenance switch
/// - **Collaborators** — mail/SMS/IdP/geo registry, audit pipeline
#[derive(Clone)]
pub struct AppState {
    // ── Config ───────────────────────────────────────────────────────
    pub config: Arc<Config>,

    // ── Stores ───────────────────────────────────────────────────────
    pub actors: Arc<dyn ActorStore>,
    pub roles: Arc<dyn RoleStore>,
    pub api_keys: Arc<dyn ApiKeyStore>,
    pub otps: Arc<dyn OtpStore>,
    pub backup_codes: Arc<dyn BackupCodeStore>,
    pub ip_rules: Arc<dyn IpRuleStore>,
    pub audit_store: Arc<dyn AuditStore>,

    // ── Credentials ──────────────────────────────────────────────────
    pub tokens: Arc<TokenService>,
    pub hasher: PasswordHasher,

    // ── Control plane ────────────────────────────────────────────────
    pub authz: Arc<AuthzEngine>,
    pub sessions: Arc<SessionRegistry>,

    // ── Abuse control ────────────────────────────────────────────────
    pub cache: Arc<dyn Cache>,
    pub blacklist: Blacklist,
    pub limiter: RateLimiter,
    pub ip_filter: Arc<IpFilterCache>,
    pub maintenance: Maintenance,

    // ── Collaborators ────────────────────────────────────────────────
    pub providers: Arc<ProviderRegistry>,
    pub audit: AuditHandle,

    // ── Shutdown ─────────────────────────────────────────────────────
    pub shutdown: Arc<tokio::sync::Notify>,
}
