use rand::Rng;

use crate::digest::sha256_hex;

/// Generate a 6-digit one-time code, zero-padded.
pub fn generate_code() -> String {
    let n: u32 = rand::thread_rng().gen_range(0..1_000_000);
    format!("{n:06}")
}

/// Digest stored for a code. Codes are low-entropy so the attempt limit,
/// not the hash, is the real defense; the digest just keeps plaintext
/// codes out of the store.
pub fn code_digest(code: &str) -> String {
    sha256_hex(code)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn codes_are_six_digits() {
        for _ in 0..100 {
            let code = generate_code();
            assert_eq!(code.len(), 6);
            assert!(code.chars().all(|c| c.is_ascii_digit()));
        }
    }
}
