//! RFC 6238 TOTP second factor: SHA-1, 6 digits, 30-second step, ±1 step
//! skew.

use totp_rs::{Algorithm, Secret, TOTP};

use agw_domain::{Error, Result};

/// Secret and provisioning URI returned once at 2FA setup. Rendering the
/// QR image from the URI is a client concern.
#[derive(Debug, Clone)]
pub struct TotpEnrollment {
    pub secret_base32: String,
    pub otpauth_url: String,
}

fn build(secret_base32: &str, issuer: &str, account: &str) -> Result<TOTP> {
    let bytes = Secret::Encoded(secret_base32.to_string())
        .to_bytes()
        .map_err(|e| Error::Internal(format!("totp secret: {e:?}")))?;
    TOTP::new(
        Algorithm::SHA1,
        6,
        1,
        30,
        bytes,
        Some(issuer.to_string()),
        account.to_string(),
    )
    .map_err(|e| Error::Internal(format!("totp: {e}")))
}

/// Generate a fresh shared secret for an actor.
pub fn enroll(issuer: &str, account: &str) -> Result<TotpEnrollment> {
    let Secret::Encoded(secret_base32) = Secret::generate_secret().to_encoded() else {
        return Err(Error::Internal("totp secret encoding".into()));
    };
    let totp = build(&secret_base32, issuer, account)?;
    Ok(TotpEnrollment {
        otpauth_url: totp.get_url(),
        secret_base32,
    })
}

/// Check a 6-digit code against the stored secret, allowing one step of
/// clock skew in either direction.
pub fn verify(secret_base32: &str, issuer: &str, account: &str, code: &str) -> bool {
    if code.len() != 6 || !code.chars().all(|c| c.is_ascii_digit()) {
        return false;
    }
    match build(secret_base32, issuer, account) {
        Ok(totp) => totp.check_current(code).unwrap_or(false),
        Err(_) => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn current_code_verifies_and_garbage_does_not() {
        let enrollment = enroll("authgate", "alice").unwrap();
        let totp = build(&enrollment.secret_base32, "authgate", "alice").unwrap();
        let code = totp.generate_current().unwrap();

        assert!(verify(&enrollment.secret_base32, "authgate", "alice", &code));
        assert!(!verify(&enrollment.secret_base32, "authgate", "alice", "000000"));
        assert!(!verify(&enrollment.secret_base32, "authgate", "alice", "12345"));
        assert!(!verify(&enrollment.secret_base32, "authgate", "alice", "abcdef"));
    }

    #[test]
    fn provisioning_url_names_issuer_and_account() {
        let enrollment = enroll("authgate", "alice").unwrap();
        assert!(enrollment.otpauth_url.starts_with("otpauth://totp/"));
        assert!(enrollment.otpauth_url.contains("authgate"));
    }
}
