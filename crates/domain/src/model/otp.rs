use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// One-time codes
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// What an OTP code is allowed to prove.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum OtpPurpose {
    VerifyEmail,
    VerifyPhone,
    ResetPassword,
    Passwordless,
    SecondFactorLogin,
}

impl OtpPurpose {
    pub fn as_str(self) -> &'static str {
        match self {
            OtpPurpose::VerifyEmail => "verify-email",
            OtpPurpose::VerifyPhone => "verify-phone",
            OtpPurpose::ResetPassword => "reset-password",
            OtpPurpose::Passwordless => "passwordless",
            OtpPurpose::SecondFactorLogin => "second-factor-login",
        }
    }
}

/// A pending 6-digit code bound to one target and purpose.
///
/// Only the code digest is stored. A record is valid while unconsumed,
/// unexpired, and under the attempt limit.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OtpRecord {
    pub id: Uuid,
    /// Email address or E.164 phone number the code was sent to.
    pub target: String,
    pub purpose: OtpPurpose,
    #[serde(skip_serializing)]
    pub code_digest: String,
    pub expires_at: DateTime<Utc>,
    pub consumed: bool,
    pub attempts: u32,
    pub created_at: DateTime<Utc>,
}

impl OtpRecord {
    pub fn is_usable(&self, now: DateTime<Utc>, max_attempts: u32) -> bool {
        !self.consumed && self.expires_at > now && self.attempts < max_attempts
    }
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Backup codes
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// A pre-issued single-use second factor.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BackupCode {
    pub actor_id: Uuid,
    #[serde(skip_serializing)]
    pub code_digest: String,
    pub consumed: bool,
    pub created_at: DateTime<Utc>,
}
