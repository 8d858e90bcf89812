use jwt_security::TokenError;
use thiserror::Error;

pub type Result<T> = std::result::Result<T, IdentityError>;

const GENERIC_CREDENTIALS_MESSAGE: &str = "Invalid credentials";

#[derive(Debug, Error)]
pub enum IdentityError {
    #[error("Malformed token")]
    MalformedToken,

    #[error("Token signature mismatch")]
    SignatureMismatch,

    #[error("Token expired")]
    Expired,

    #[error("Wrong token kind")]
    WrongTokenKind,

    #[error("Token revoked")]
    Revoked,

    #[error("Storage unavailable: {0}")]
    StorageUnavailable(String),

    #[error("Account locked until: {locked_until}")]
    AccountLocked { locked_until: i64 },

    #[error("Invalid credentials")]
    InvalidCredentials,

    #[error("Email not confirmed")]
    EmailNotConfirmed,

    #[error("Password too weak: {0}")]
    WeakPassword(String),

    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Internal server error: {0}")]
    Internal(String),
}

impl IdentityError {
    /// Errors that must surface to clients as a single 401
    pub fn is_credential_error(&self) -> bool {
        matches!(
            self,
            IdentityError::MalformedToken
                | IdentityError::SignatureMismatch
                | IdentityError::Expired
                | IdentityError::WrongTokenKind
                | IdentityError::Revoked
                | IdentityError::InvalidCredentials
                | IdentityError::EmailNotConfirmed
        )
    }

    /// HTTP-equivalent status for the transport layer
    pub fn status_code(&self) -> u16 {
        match self {
            e if e.is_credential_error() => 401,
            IdentityError::AccountLocked { .. } => 423,
            IdentityError::WeakPassword(_) | IdentityError::Validation(_) => 400,
            _ => 500,
        }
    }

    /// Message safe to return to clients.
    ///
    /// Credential failures all read the same so callers cannot tell an
    /// unknown email from a wrong password or a revoked token.
    pub fn client_message(&self) -> String {
        match self {
            e if e.is_credential_error() => GENERIC_CREDENTIALS_MESSAGE.to_string(),
            IdentityError::AccountLocked { locked_until } => {
                format!("Account locked until: {}", locked_until)
            }
            IdentityError::WeakPassword(msg) => format!("Password too weak: {}", msg),
            IdentityError::Validation(msg) => format!("Validation error: {}", msg),
            // Don't leak internal details
            _ => "Internal server error".to_string(),
        }
    }
}

impl From<TokenError> for IdentityError {
    fn from(err: TokenError) -> Self {
        match err {
            TokenError::MalformedToken => IdentityError::MalformedToken,
            TokenError::SignatureMismatch => IdentityError::SignatureMismatch,
            TokenError::Expired => IdentityError::Expired,
            TokenError::WrongTokenKind { .. } => IdentityError::WrongTokenKind,
            TokenError::Revoked => IdentityError::Revoked,
            TokenError::StorageUnavailable(msg) => IdentityError::StorageUnavailable(msg),
            TokenError::WeakSecret(_) | TokenError::Encoding(_) => {
                tracing::error!("Token error: {}", err);
                IdentityError::Internal(err.to_string())
            }
        }
    }
}

impl From<sqlx::Error> for IdentityError {
    fn from(err: sqlx::Error) -> Self {
        tracing::error!("Database error: {}", err);
        IdentityError::StorageUnavailable(err.to_string())
    }
}

impl From<tokio::task::JoinError> for IdentityError {
    fn from(err: tokio::task::JoinError) -> Self {
        tracing::error!("Background task failed: {}", err);
        IdentityError::Internal(err.to_string())
    }
}
