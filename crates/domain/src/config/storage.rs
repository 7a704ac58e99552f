use serde::{Deserialize, Serialize};

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Database (external row store)
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// Connection settings handed to the external identity-store backend.
/// The in-memory store ignores them; a networked backend consumes the
/// full set.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatabaseConfig {
    #[serde(default = "d_db_host")]
    pub host: String,
    #[serde(default = "d_db_port")]
    pub port: u16,
    #[serde(default = "d_db_user")]
    pub user: String,
    #[serde(default)]
    pub password: String,
    #[serde(default = "d_db_name")]
    pub database: String,
    #[serde(default)]
    pub ssl: bool,
    #[serde(default = "d_max_open")]
    pub max_open_conns: u32,
    #[serde(default = "d_max_idle")]
    pub max_idle_conns: u32,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            host: d_db_host(),
            port: d_db_port(),
            user: d_db_user(),
            password: String::new(),
            database: d_db_name(),
            ssl: false,
            max_open_conns: d_max_open(),
            max_idle_conns: d_max_idle(),
        }
    }
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Cache (external key/value store)
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// `memory://` selects the in-process cache; anything else is handed to
/// the networked cache client.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CacheConfig {
    #[serde(default = "d_cache_url")]
    pub url: String,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self { url: d_cache_url() }
    }
}

// ── serde default helpers ───────────────────────────────────────────

fn d_db_host() -> String {
    "127.0.0.1".into()
}
fn d_db_port() -> u16 {
    5432
}
fn d_db_user() -> String {
    "authgate".into()
}
fn d_db_name() -> String {
    "authgate".into()
}
fn d_max_open() -> u32 {
    25
}
fn d_max_idle() -> u32 {
    10
}
fn d_cache_url() -> String {
    "memory://".into()
}
