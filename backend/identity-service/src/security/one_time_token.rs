/// Single-use tokens for email confirmation and password reset
///
/// The raw value goes to the user by mail. Only its SHA-256 digest is stored,
/// so a database dump cannot be replayed.
use base64::{engine::general_purpose::URL_SAFE_NO_PAD, Engine};
use rand::{rngs::OsRng, RngCore};
use sha2::{Digest, Sha256};

/// Email confirmation tokens live 24 hours
pub const EMAIL_CONFIRM_LIFETIME_SECS: i64 = 24 * 3600;
/// Password reset tokens live 1 hour
pub const PASSWORD_RESET_LIFETIME_SECS: i64 = 3600;

const TOKEN_BYTES: usize = 16;

#[derive(Debug, Clone)]
pub struct OneTimeToken {
    /// base64url, sent to the user
    pub raw: String,
    /// base64url SHA-256 of `raw`, stored
    pub hash: String,
}

impl OneTimeToken {
    pub fn generate() -> Self {
        let mut bytes = [0u8; TOKEN_BYTES];
        OsRng.fill_bytes(&mut bytes);
        let raw = URL_SAFE_NO_PAD.encode(bytes);
        let hash = hash_token(&raw);
        Self { raw, hash }
    }
}

pub fn hash_token(raw: &str) -> String {
    URL_SAFE_NO_PAD.encode(Sha256::digest(raw.as_bytes()))
}

/// True once more than `lifetime_secs` have passed since `issued_at`.
pub fn is_expired(issued_at: i64, lifetime_secs: i64, now: i64) -> bool {
    now > issued_at + lifetime_secs
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_generated_tokens_are_unique_and_hashed() {
        let a = OneTimeToken::generate();
        let b = OneTimeToken::generate();

        assert_ne!(a.raw, b.raw);
        assert_eq!(a.raw.len(), 22);
        assert_eq!(a.hash, hash_token(&a.raw));
        assert_ne!(a.hash, a.raw);
    }

    #[test]
    fn test_expiry_boundary() {
        assert!(!is_expired(1_000, PASSWORD_RESET_LIFETIME_SECS, 4_600));
        assert!(is_expired(1_000, PASSWORD_RESET_LIFETIME_SECS, 4_601));
    }
}
