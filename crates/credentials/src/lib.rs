//! Credential primitives: password hashing, token signing, one-time
//! codes, TOTP, API keys, and the digest/compare helpers shared by all
//! of them.

pub mod apikey;
pub mod backup;
pub mod digest;
pub mod otp;
pub mod password;
pub mod token;
pub mod totp;

pub use apikey::{mint_api_key, MintedApiKey};
pub use digest::{constant_time_eq, random_alphanumeric, sha256_hex};
pub use password::PasswordHasher;
pub use token::{AccessClaims, MintedRefresh, RefreshClaims, TokenError, TokenService};
