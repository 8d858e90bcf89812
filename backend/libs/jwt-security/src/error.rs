//! Error types for token encoding, validation and revocation

use crate::claims::TokenKind;
use thiserror::Error;

pub type Result<T> = std::result::Result<T, TokenError>;

#[derive(Debug, Error)]
pub enum TokenError {
    #[error("Malformed token")]
    MalformedToken,

    #[error("Token signature mismatch")]
    SignatureMismatch,

    #[error("Token expired")]
    Expired,

    #[error("Wrong token kind: expected {expected}, got {actual}")]
    WrongTokenKind {
        expected: TokenKind,
        actual: TokenKind,
    },

    #[error("Token revoked")]
    Revoked,

    #[error("Revocation storage unavailable: {0}")]
    StorageUnavailable(String),

    #[error("Signing secret too short: {0} bytes (minimum 32)")]
    WeakSecret(usize),

    #[error("Token encoding failed: {0}")]
    Encoding(String),
}

impl From<jsonwebtoken::errors::Error> for TokenError {
    fn from(err: jsonwebtoken::errors::Error) -> Self {
        use jsonwebtoken::errors::ErrorKind;

        match err.kind() {
            ErrorKind::InvalidSignature => TokenError::SignatureMismatch,
            ErrorKind::ExpiredSignature => TokenError::Expired,
            ErrorKind::InvalidKeyFormat
            | ErrorKind::InvalidEcdsaKey
            | ErrorKind::InvalidRsaKey(_)
            | ErrorKind::RsaFailedSigning
            | ErrorKind::Crypto(_) => TokenError::Encoding(err.to_string()),
            _ => TokenError::MalformedToken,
        }
    }
}

impl From<redis::RedisError> for TokenError {
    fn from(err: redis::RedisError) -> Self {
        tracing::error!("Redis error: {}", err);
        TokenError::StorageUnavailable(err.to_string())
    }
}
