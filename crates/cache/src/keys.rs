//! Cache key namespaces, one per concern.

/// Revoked-credential digests. TTL = remaining token lifetime.
pub fn blacklist(digest: &str) -> String {
    format!("blacklist:{digest}")
}

/// Sliding-window counter for `(action, principal)`.
pub fn rate(action: &str, principal: &str) -> String {
    format!("rate:{action}:{principal}")
}

/// Cool-down marker between OTP sends to one target.
pub fn otp_cooldown(purpose: &str, target: &str) -> String {
    format!("otp:cooldown:{purpose}:{target}")
}

/// One-shot state values (OAuth redirect state, reset tickets).
pub fn state(kind: &str, value: &str) -> String {
    format!("state:{kind}:{value}")
}

/// The single maintenance-mode switch.
pub const MAINTENANCE: &str = "state:maintenance";
