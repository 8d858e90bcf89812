/// Persistence for identity service
///
/// The authentication flow talks to storage only through [`UserStore`] and
/// [`LockoutStore`]. Postgres implementations live in [`postgres`], an
/// in-process one for tests and single-node use in [`memory`].
use crate::error::Result;
use crate::models::{Lockout, User};
use async_trait::async_trait;
use uuid::Uuid;

pub mod lockouts;
pub mod memory;
pub mod postgres;
pub mod token_revocation;
pub mod users;

pub use memory::MemoryStore;
pub use postgres::PgStore;
pub use token_revocation::PgRevocationStore;

/// User records, including the per-user session epoch
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait UserStore: Send + Sync {
    async fn get_user_by_email(&self, email: &str) -> Result<Option<User>>;

    async fn get_user_by_id(&self, user_id: Uuid) -> Result<Option<User>>;

    /// Fails with `Validation` when the email or username is taken.
    async fn create_user(&self, user: &User) -> Result<()>;

    /// Atomically bump the session epoch and move the watermark to
    /// `max(sessions_valid_after + 1, now + 1)`. Returns the new epoch.
    async fn increment_session_epoch(&self, user_id: Uuid, now: i64) -> Result<i64>;

    /// Store a new password hash and drop any outstanding reset token.
    async fn change_password_hash(&self, user_id: Uuid, password_hash: &str) -> Result<()>;

    /// Mark the email confirmed and drop the confirmation token.
    async fn mark_email_confirmed(&self, user_id: Uuid) -> Result<()>;

    async fn set_confirmation_token(
        &self,
        user_id: Uuid,
        token_hash: &str,
        issued_at: i64,
    ) -> Result<()>;

    async fn get_user_by_confirmation_token(&self, token_hash: &str) -> Result<Option<User>>;

    async fn set_reset_token(&self, user_id: Uuid, token_hash: &str, issued_at: i64)
        -> Result<()>;

    async fn get_user_by_reset_token(&self, token_hash: &str) -> Result<Option<User>>;
}

/// Failed login history and lockouts, keyed by (user, address)
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait LockoutStore: Send + Sync {
    /// Failures with `attempted_at >= window_start`.
    ///
    /// Older failures can never count again and may be discarded.
    async fn count_recent_failures(
        &self,
        user_id: Uuid,
        address: &str,
        window_start: i64,
    ) -> Result<i64>;

    async fn insert_failed_login(&self, user_id: Uuid, address: &str, attempted_at: i64)
        -> Result<()>;

    async fn insert_lockout(&self, lockout: &Lockout) -> Result<()>;

    /// Latest `locked_until` still in force at `now`, if any.
    ///
    /// A lockout is in force while `locked_until >= now`, so an attempt in
    /// the final second is still refused.
    async fn active_lockout(&self, user_id: Uuid, address: &str, now: i64)
        -> Result<Option<i64>>;

    /// Remove lockouts and failure history for the pair.
    async fn unlock_account(&self, user_id: Uuid, address: &str) -> Result<()>;

    async fn clear_failed_logins(&self, user_id: Uuid, address: &str) -> Result<()>;
}
