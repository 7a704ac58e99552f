use serde::{Deserialize, Serialize};

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Token signing
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// Keys and lifetimes for the access/refresh signers.
///
/// Each secret list is ordered oldest → newest; the newest signs, all
/// verify. Appending a secret rotates the signing key without breaking
/// tokens minted under the previous one.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TokenConfig {
    #[serde(default)]
    pub access_secrets: Vec<String>,
    #[serde(default)]
    pub refresh_secrets: Vec<String>,
    #[serde(default = "d_access_ttl")]
    pub access_ttl_secs: u64,
    #[serde(default = "d_refresh_ttl")]
    pub refresh_ttl_secs: u64,
    /// Lifetime of the second-factor challenge token issued mid-signin.
    #[serde(default = "d_challenge_ttl")]
    pub challenge_ttl_secs: u64,
    #[serde(default = "d_issuer")]
    pub issuer: String,
}

impl Default for TokenConfig {
    fn default() -> Self {
        Self {
            access_secrets: Vec::new(),
            refresh_secrets: Vec::new(),
            access_ttl_secs: d_access_ttl(),
            refresh_ttl_secs: d_refresh_ttl(),
            challenge_ttl_secs: d_challenge_ttl(),
            issuer: d_issuer(),
        }
    }
}

// ── serde default helpers ───────────────────────────────────────────

fn d_access_ttl() -> u64 {
    900 // 15 min
}
fn d_refresh_ttl() -> u64 {
    30 * 24 * 3600
}
fn d_challenge_ttl() -> u64 {
    300
}
fn d_issuer() -> String {
    "authgate".into()
}
