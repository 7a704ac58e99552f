use serde::{Deserialize, Serialize};

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Authentication flows
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuthConfig {
    #[serde(default)]
    pub kdf: KdfConfig,
    #[serde(default)]
    pub otp: OtpConfig,
    /// Whether a passwordless verify against an unknown target creates a
    /// new actor on first sight.
    #[serde(default = "d_true")]
    pub passwordless_signup: bool,
    #[serde(default = "d_backup_codes")]
    pub backup_code_count: usize,
    /// Days a revoked session row is kept before GC removes it.
    #[serde(default = "d_retention_days")]
    pub session_retention_days: u32,
}

impl Default for AuthConfig {
    fn default() -> Self {
        Self {
            kdf: KdfConfig::default(),
            otp: OtpConfig::default(),
            passwordless_signup: d_true(),
            backup_code_count: d_backup_codes(),
            session_retention_days: d_retention_days(),
        }
    }
}

/// Argon2id cost parameters. The defaults follow the OWASP low-memory
/// profile; production deployments raise `memory_kib`.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct KdfConfig {
    #[serde(default = "d_kdf_memory")]
    pub memory_kib: u32,
    #[serde(default = "d_kdf_iterations")]
    pub iterations: u32,
    #[serde(default = "d_kdf_parallelism")]
    pub parallelism: u32,
}

impl Default for KdfConfig {
    fn default() -> Self {
        Self {
            memory_kib: d_kdf_memory(),
            iterations: d_kdf_iterations(),
            parallelism: d_kdf_parallelism(),
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct OtpConfig {
    #[serde(default = "d_otp_ttl")]
    pub ttl_secs: u64,
    #[serde(default = "d_otp_attempts")]
    pub max_attempts: u32,
    /// Minimum seconds between two sends to the same target.
    #[serde(default = "d_otp_cooldown")]
    pub cooldown_secs: u64,
}

impl Default for OtpConfig {
    fn default() -> Self {
        Self {
            ttl_secs: d_otp_ttl(),
            max_attempts: d_otp_attempts(),
            cooldown_secs: d_otp_cooldown(),
        }
    }
}

// ── serde default helpers ───────────────────────────────────────────

fn d_true() -> bool {
    true
}
fn d_backup_codes() -> usize {
    10
}
fn d_retention_days() -> u32 {
    30
}
fn d_kdf_memory() -> u32 {
    19 * 1024
}
fn d_kdf_iterations() -> u32 {
    2
}
fn d_kdf_parallelism() -> u32 {
    1
}
fn d_otp_ttl() -> u64 {
    300
}
fn d_otp_attempts() -> u32 {
    5
}
fn d_otp_cooldown() -> u64 {
    60
}
