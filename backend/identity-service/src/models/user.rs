use jwt_security::TokenSubject;
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

/// Role assigned at registration
pub const DEFAULT_ROLE: &str = "user";

/// User model - core identity entity
///
/// Timestamps are Unix seconds. Never serialize this type to clients, use
/// [`PublicUser`].
#[derive(Debug, Clone, FromRow)]
pub struct User {
    pub id: Uuid,
    pub username: String,
    pub email: String,
    pub password_hash: String,
    pub role: String,
    pub created_at: i64,
    pub email_confirmed: bool,
    /// SHA-256 of the outstanding confirmation token
    pub email_confirm_token: Option<String>,
    pub email_confirm_issued_at: Option<i64>,
    /// SHA-256 of the outstanding password reset token
    pub password_reset_token: Option<String>,
    pub password_reset_issued_at: Option<i64>,
    /// Bumped on every logout-everywhere or password change
    pub session_epoch: i64,
    /// Tokens with `iat` below this are dead
    pub sessions_valid_after: i64,
}

impl User {
    /// Build an unconfirmed account with the default role.
    pub fn new(username: &str, email: &str, password_hash: String, now: i64) -> Self {
        Self {
            id: Uuid::new_v4(),
            username: username.to_string(),
            email: email.to_string(),
            password_hash,
            role: DEFAULT_ROLE.to_string(),
            created_at: now,
            email_confirmed: false,
            email_confirm_token: None,
            email_confirm_issued_at: None,
            password_reset_token: None,
            password_reset_issued_at: None,
            session_epoch: 0,
            sessions_valid_after: 0,
        }
    }

    pub fn is_email_confirmed(&self) -> bool {
        self.email_confirmed
    }

    pub fn token_subject(&self) -> TokenSubject<'_> {
        TokenSubject {
            user_id: self.id,
            email: &self.email,
            role: &self.role,
            not_before: self.sessions_valid_after,
        }
    }
}

/// Fields of a user that may leave the service
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PublicUser {
    pub id: Uuid,
    pub username: String,
    pub email: String,
    pub role: String,
    pub created_at: i64,
}

impl From<&User> for PublicUser {
    fn from(user: &User) -> Self {
        Self {
            id: user.id,
            username: user.username.clone(),
            email: user.email.clone(),
            role: user.role.clone(),
            created_at: user.created_at,
        }
    }
}
