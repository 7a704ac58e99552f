use serde::{Deserialize, Serialize};

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Sliding-window rate limits
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// One (max, window) pair for a rate-limited action.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct WindowLimit {
    pub max: u64,
    pub window_secs: u64,
}

/// Per-action limits keyed by the principal (pre-auth: client IP).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LimitsConfig {
    #[serde(default = "d_signup")]
    pub signup: WindowLimit,
    #[serde(default = "d_signin")]
    pub signin: WindowLimit,
    #[serde(default = "d_otp_send")]
    pub otp_send: WindowLimit,
    /// General API limit applied per authenticated principal.
    #[serde(default = "d_api")]
    pub api: WindowLimit,
}

impl Default for LimitsConfig {
    fn default() -> Self {
        Self {
            signup: d_signup(),
            signin: d_signin(),
            otp_send: d_otp_send(),
            api: d_api(),
        }
    }
}

// ── serde default helpers ───────────────────────────────────────────

fn d_signup() -> WindowLimit {
    WindowLimit { max: 5, window_secs: 3600 }
}
fn d_signin() -> WindowLimit {
    WindowLimit { max: 10, window_secs: 900 }
}
fn d_otp_send() -> WindowLimit {
    WindowLimit { max: 3, window_secs: 600 }
}
fn d_api() -> WindowLimit {
    WindowLimit { max: 100, window_secs: 60 }
}
