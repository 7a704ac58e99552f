//! Input shape checks shared by the signup, profile, and admin flows.

use std::sync::OnceLock;

use regex::Regex;

use crate::error::{Error, Result};

pub const USERNAME_MIN: usize = 3;
pub const USERNAME_MAX: usize = 100;
pub const PASSWORD_MIN: usize = 8;
pub const PASSWORD_MAX: usize = 128;

fn username_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"^[A-Za-z0-9_-]+$").expect("static regex"))
}

fn e164_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"^\+[1-9][0-9]{6,14}$").expect("static regex"))
}

/// 3–100 chars from `[A-Za-z0-9_-]`.
pub fn username(value: &str) -> Result<()> {
    if value.len() < USERNAME_MIN || value.len() > USERNAME_MAX {
        return Err(Error::Validation(format!(
            "username must be {USERNAME_MIN}-{USERNAME_MAX} characters"
        )));
    }
    if !username_re().is_match(value) {
        return Err(Error::Validation(
            "username may only contain letters, digits, '_' and '-'".into(),
        ));
    }
    Ok(())
}

/// Minimal RFC-5321-ish shape check; deliverability is the mailer's
/// problem. The address is case-normalized by [`normalize_email`] before
/// storage.
pub fn email(value: &str) -> Result<()> {
    let ok = value.len() <= 254
        && value.split_once('@').map_or(false, |(local, domain)| {
            !local.is_empty() && domain.contains('.') && !domain.starts_with('.') && !domain.ends_with('.')
        })
        && !value.contains(char::is_whitespace);
    if ok {
        Ok(())
    } else {
        Err(Error::Validation("invalid email address".into()))
    }
}

pub fn normalize_email(value: &str) -> String {
    value.trim().to_ascii_lowercase()
}

/// E.164: `+` then 7–15 digits, no leading zero.
pub fn phone(value: &str) -> Result<()> {
    if e164_re().is_match(value) {
        Ok(())
    } else {
        Err(Error::Validation("phone must be E.164, e.g. +14155550123".into()))
    }
}

pub fn password(value: &str) -> Result<()> {
    if value.len() < PASSWORD_MIN {
        return Err(Error::Validation(format!(
            "password must be at least {PASSWORD_MIN} characters"
        )));
    }
    if value.len() > PASSWORD_MAX {
        return Err(Error::Validation(format!(
            "password must be at most {PASSWORD_MAX} characters"
        )));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn username_boundaries() {
        assert!(username("ab").is_err());
        assert!(username("abc").is_ok());
        assert!(username(&"a".repeat(100)).is_ok());
        assert!(username(&"a".repeat(101)).is_err());
        assert!(username("has space").is_err());
        assert!(username("ok_name-1").is_ok());
    }

    #[test]
    fn password_boundaries() {
        assert!(password("seven77").is_err());
        assert!(password("eight888").is_ok());
    }

    #[test]
    fn email_shapes() {
        assert!(email("a@x.test").is_ok());
        assert!(email("nope").is_err());
        assert!(email("a b@x.test").is_err());
        assert_eq!(normalize_email(" A@X.Test "), "a@x.test");
    }

    #[test]
    fn phone_shapes() {
        assert!(phone("+14155550123").is_ok());
        assert!(phone("14155550123").is_err());
        assert!(phone("+0123").is_err());
    }
}
