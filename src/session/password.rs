//! Password digests

use secrecy::{ExposeSecret, SecretString};
use sha2::{Digest, Sha256};
use subtle::ConstantTimeEq;

/// SHA-256 over the UTF-8 bytes, rendered as lowercase hex
pub fn hash_password(password: &SecretString) -> String {
    let digest = Sha256::digest(password.expose_secret().as_bytes());
    hex::encode(digest)
}

/// Compare `password` against a stored hex digest in constant time.
///
/// A stored value that isn't a 32-byte hex digest never matches.
pub fn verify_password(password: &SecretString, stored_hex: &str) -> bool {
    let Ok(stored) = hex::decode(stored_hex.trim()) else {
        return false;
    };
    if stored.len() != 32 {
        return false;
    }
    let computed = Sha256::digest(password.expose_secret().as_bytes());
    computed.as_slice().ct_eq(&stored).into()
}

#[cfg(test)]
mod tests {
    use super::*;

    const ABC123_SHA256: &str = "6ca13d52ca70c883e0f0bb101e425a89e8624de51db2d2392593af6a84118090";

    fn secret(s: &str) -> SecretString {
        SecretString::from(s.to_string())
    }

    #[test]
    fn test_hash_is_lowercase_hex_sha256() {
        assert_eq!(hash_password(&secret("abc123")), ABC123_SHA256);
    }

    #[test]
    fn test_verify_matches_only_exact_password() {
        assert!(verify_password(&secret("abc123"), ABC123_SHA256));
        assert!(!verify_password(&secret("ABC123"), ABC123_SHA256));
        assert!(!verify_password(&secret("abc123 "), ABC123_SHA256));
        assert!(!verify_password(&secret(""), ABC123_SHA256));
    }

    #[test]
    fn test_verify_accepts_uppercase_stored_hex() {
        assert!(verify_password(
            &secret("abc123"),
            &ABC123_SHA256.to_uppercase()
        ));
    }

    #[test]
    fn test_verify_rejects_malformed_stored_hash() {
        assert!(!verify_password(&secret("abc123"), "zz"));
        assert!(!verify_password(&secret("abc123"), "abcd"));
    }
}
