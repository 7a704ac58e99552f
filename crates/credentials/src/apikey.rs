use agw_domain::model::{API_KEY_PREFIX, API_KEY_PREFIX_LEN};

use crate::digest::{random_alphanumeric, sha256_hex};

/// Length of the random secret following the lookup prefix.
const SECRET_LEN: usize = 32;

/// A freshly minted API key. `plaintext` is shown to the caller exactly
/// once; only `prefix` and `digest` are persisted.
#[derive(Debug, Clone)]
pub struct MintedApiKey {
    pub plaintext: String,
    pub prefix: String,
    pub digest: String,
}

/// Mint a new key: `agw_` + 8 random chars of lookup prefix + 32 random
/// chars of secret. The digest covers the full plaintext so a stolen
/// prefix alone is useless.
pub fn mint_api_key() -> MintedApiKey {
    let prefix = format!(
        "{API_KEY_PREFIX}{}",
        random_alphanumeric(API_KEY_PREFIX_LEN - API_KEY_PREFIX.len())
    );
    let plaintext = format!("{prefix}{}", random_alphanumeric(SECRET_LEN));
    MintedApiKey {
        digest: sha256_hex(&plaintext),
        prefix,
        plaintext,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::digest::constant_time_eq;

    #[test]
    fn minted_key_shape() {
        let key = mint_api_key();
        assert!(key.plaintext.starts_with(API_KEY_PREFIX));
        assert_eq!(key.prefix.len(), API_KEY_PREFIX_LEN);
        assert_eq!(key.plaintext.len(), API_KEY_PREFIX_LEN + SECRET_LEN);
        assert!(key.plaintext.starts_with(&key.prefix));
        assert!(constant_time_eq(&key.digest, &sha256_hex(&key.plaintext)));
    }

    #[test]
    fn prefixes_are_distinct() {
        assert_ne!(mint_api_key().prefix, mint_api_key().prefix);
    }
}
