use rand::Rng;

use crate::digest::sha256_hex;

/// Alphabet for backup codes. Ambiguous glyphs (0/O, 1/I/L) are left out
/// so codes survive being read over the phone.
const ALPHABET: &[u8] = b"ABCDEFGHJKMNPQRSTUVWXYZ23456789";

/// One generated backup code: the plaintext shown once and the digest
/// that is stored.
#[derive(Debug, Clone)]
pub struct GeneratedBackupCode {
    pub plaintext: String,
    pub digest: String,
}

fn one_code() -> String {
    let mut rng = rand::thread_rng();
    let mut chunk = || -> String {
        (0..4)
            .map(|_| ALPHABET[rng.gen_range(0..ALPHABET.len())] as char)
            .collect()
    };
    let a = chunk();
    let b = chunk();
    format!("{a}-{b}")
}

/// Generate `count` single-use codes in `XXXX-XXXX` form.
pub fn generate_backup_codes(count: usize) -> Vec<GeneratedBackupCode> {
    (0..count)
        .map(|_| {
            let plaintext = one_code();
            GeneratedBackupCode {
                digest: sha256_hex(&plaintext),
                plaintext,
            }
        })
        .collect()
}

/// Normalize user input before digesting: trim, uppercase, tolerate a
/// missing dash.
pub fn normalize_code(input: &str) -> String {
    let cleaned: String = input
        .trim()
        .chars()
        .filter(|c| c.is_ascii_alphanumeric())
        .map(|c| c.to_ascii_uppercase())
        .collect();
    if cleaned.len() == 8 {
        format!("{}-{}", &cleaned[..4], &cleaned[4..])
    } else {
        input.trim().to_ascii_uppercase()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn codes_have_expected_shape() {
        let codes = generate_backup_codes(10);
        assert_eq!(codes.len(), 10);
        for code in &codes {
            assert_eq!(code.plaintext.len(), 9);
            assert_eq!(&code.plaintext[4..5], "-");
            assert_eq!(code.digest, sha256_hex(&code.plaintext));
        }
    }

    #[test]
    fn normalize_tolerates_user_formatting() {
        assert_eq!(normalize_code(" abcd efgh "), "ABCD-EFGH");
        assert_eq!(normalize_code("ABCD-EFGH"), "ABCD-EFGH");
        assert_eq!(normalize_code("abcdefgh"), "ABCD-EFGH");
    }
}
