/// Authentication flows: login, logout, refresh, registration and password management
///
/// Orchestrates the user store, the lockout guard and the session manager.
/// Every credential failure is reported through [`IdentityError`] and mapped
/// to a status by the transport layer.
use crate::db::{LockoutStore, UserStore};
use crate::error::{IdentityError, Result};
use crate::models::{PublicUser, User};
use crate::security::lockout::{run_detached, FailureOutcome, LockoutGuard, LockoutPolicy};
use crate::security::one_time_token::{
    self, OneTimeToken, EMAIL_CONFIRM_LIFETIME_SECS, PASSWORD_RESET_LIFETIME_SECS,
};
use crate::security::password::{hash_password_blocking, verify_password_blocking};
use crate::validators;
use chrono::Utc;
use jwt_security::{Claims, SessionManager, TokenKind, TokenPair};
use std::sync::Arc;
use tracing::{info, instrument, warn};
use uuid::Uuid;

/// A freshly registered account and the confirmation token to mail out
#[derive(Debug, Clone)]
pub struct Registration {
    pub user: PublicUser,
    pub confirmation_token: String,
}

#[derive(Clone)]
pub struct AuthenticationFlow {
    users: Arc<dyn UserStore>,
    sessions: SessionManager,
    lockout: LockoutGuard,
}

impl AuthenticationFlow {
    pub fn new(
        users: Arc<dyn UserStore>,
        lockouts: Arc<dyn LockoutStore>,
        sessions: SessionManager,
        policy: LockoutPolicy,
    ) -> Self {
        Self {
            users,
            sessions,
            lockout: LockoutGuard::new(lockouts, policy),
        }
    }

    pub fn sessions(&self) -> &SessionManager {
        &self.sessions
    }

    pub fn lockout(&self) -> &LockoutGuard {
        &self.lockout
    }

    /// Exchange email and password for a token pair.
    ///
    /// Unknown email and wrong password both yield `InvalidCredentials`.
    /// The lockout check runs before the password is looked at, so a locked
    /// pair is refused even with the right password.
    #[instrument(skip_all, fields(address = %address))]
    pub async fn login(&self, email: &str, password: &str, address: &str) -> Result<TokenPair> {
        let email = validators::normalize_email(email);
        let Some(user) = self.users.get_user_by_email(&email).await? else {
            info!("Login failed: unknown email");
            return Err(IdentityError::InvalidCredentials);
        };

        self.lockout.check_lockout(user.id, address).await?;

        if !verify_password_blocking(password, &user.password_hash).await? {
            return match self.lockout.record_failure(user.id, address).await? {
                FailureOutcome::Locked { locked_until } => {
                    Err(IdentityError::AccountLocked { locked_until })
                }
                FailureOutcome::Recorded { recent_failures } => {
                    info!(user_id = %user.id, recent_failures, "Login failed: wrong password");
                    Err(IdentityError::InvalidCredentials)
                }
            };
        }

        if !user.is_email_confirmed() {
            info!(user_id = %user.id, "Login refused: email not confirmed");
            return Err(IdentityError::EmailNotConfirmed);
        }

        self.lockout.record_success(user.id, address).await?;
        let pair = self.sessions.issue_pair(&user.token_subject())?;

        info!(user_id = %user.id, "User logged in");
        Ok(pair)
    }

    /// Validate an access token and load its user.
    ///
    /// Tokens minted before the user's last logout-everywhere or password
    /// change are rejected as `Revoked`.
    pub async fn authenticate(&self, access_token: &str) -> Result<(Claims, User)> {
        let claims = self
            .sessions
            .validate(access_token, TokenKind::Credential)
            .await?;
        let user = self.load_token_owner(&claims).await?;
        Ok((claims, user))
    }

    /// Revoke the presented access token.
    #[instrument(skip_all)]
    pub async fn logout(&self, access_token: &str) -> Result<()> {
        let (claims, user) = self.authenticate(access_token).await?;
        self.sessions.revoke(&claims).await?;

        info!(user_id = %user.id, jti = %claims.jti, "User logged out");
        Ok(())
    }

    /// Invalidate every token issued to the user so far. Returns the new epoch.
    #[instrument(skip_all)]
    pub async fn logout_everywhere(&self, access_token: &str) -> Result<i64> {
        let (_, user) = self.authenticate(access_token).await?;
        let epoch = self.bump_session_epoch(user.id).await?;

        info!(user_id = %user.id, epoch, "All sessions revoked");
        Ok(epoch)
    }

    /// Rotate a refresh token into a new pair.
    ///
    /// The presented token is revoked first. Only the call that performed the
    /// revocation gets a new pair, so a replayed or concurrently reused
    /// refresh token fails with `Revoked`.
    #[instrument(skip_all)]
    pub async fn refresh(&self, refresh_token: &str) -> Result<TokenPair> {
        let claims = self
            .sessions
            .validate(refresh_token, TokenKind::Refresh)
            .await?;
        let user = self.load_token_owner(&claims).await?;

        if !self.sessions.revoke(&claims).await? {
            warn!(user_id = %user.id, jti = %claims.jti, "Refresh token reused");
            return Err(IdentityError::Revoked);
        }

        let pair = self.sessions.issue_pair(&user.token_subject())?;
        info!(user_id = %user.id, "Refresh token rotated");
        Ok(pair)
    }

    /// Public profile of the token's owner
    pub async fn profile(&self, access_token: &str) -> Result<PublicUser> {
        let (_, user) = self.authenticate(access_token).await?;
        Ok(PublicUser::from(&user))
    }

    /// Change password for an authenticated user.
    ///
    /// Ends every existing session and lifts any lockout for `address`.
    #[instrument(skip_all, fields(address = %address))]
    pub async fn change_password(
        &self,
        access_token: &str,
        old_password: &str,
        new_password: &str,
        address: &str,
    ) -> Result<()> {
        let (_, user) = self.authenticate(access_token).await?;

        if !verify_password_blocking(old_password, &user.password_hash).await? {
            return Err(IdentityError::InvalidCredentials);
        }

        if old_password == new_password {
            return Err(IdentityError::Validation(
                "New password must differ from the current one".to_string(),
            ));
        }

        self.apply_new_password(&user, new_password, address).await?;
        info!(user_id = %user.id, "Password changed");
        Ok(())
    }

    /// Create an unconfirmed account.
    #[instrument(skip_all, fields(username = %username))]
    pub async fn register(
        &self,
        username: &str,
        email: &str,
        password: &str,
    ) -> Result<Registration> {
        let email = validators::validate_registration(username, email)?;
        let password_hash = hash_password_blocking(password).await?;

        let now = Utc::now().timestamp();
        let token = OneTimeToken::generate();
        let mut user = User::new(username, &email, password_hash, now);
        user.email_confirm_token = Some(token.hash);
        user.email_confirm_issued_at = Some(now);

        self.users.create_user(&user).await?;

        info!(user_id = %user.id, "User registered");
        Ok(Registration {
            user: PublicUser::from(&user),
            confirmation_token: token.raw,
        })
    }

    /// Consume a confirmation token and mark the email confirmed.
    #[instrument(skip_all)]
    pub async fn confirm_email(&self, raw_token: &str) -> Result<()> {
        let token_hash = one_time_token::hash_token(raw_token);
        let user = self
            .users
            .get_user_by_confirmation_token(&token_hash)
            .await?
            .ok_or(IdentityError::InvalidCredentials)?;

        if user.is_email_confirmed() {
            return Err(IdentityError::InvalidCredentials);
        }

        let issued_at = user.email_confirm_issued_at.unwrap_or(0);
        if one_time_token::is_expired(issued_at, EMAIL_CONFIRM_LIFETIME_SECS, Utc::now().timestamp())
        {
            return Err(IdentityError::Expired);
        }

        self.users.mark_email_confirmed(user.id).await?;
        info!(user_id = %user.id, "Email confirmed");
        Ok(())
    }

    /// Issue a new confirmation token.
    ///
    /// `None` for unknown or already confirmed emails, indistinguishable to
    /// the caller's client.
    #[instrument(skip_all)]
    pub async fn resend_confirmation(&self, email: &str) -> Result<Option<String>> {
        let email = validators::normalize_email(email);
        let Some(user) = self.users.get_user_by_email(&email).await? else {
            return Ok(None);
        };
        if user.is_email_confirmed() {
            return Ok(None);
        }

        let token = OneTimeToken::generate();
        self.users
            .set_confirmation_token(user.id, &token.hash, Utc::now().timestamp())
            .await?;

        info!(user_id = %user.id, "Confirmation token reissued");
        Ok(Some(token.raw))
    }

    /// Issue a password reset token, `None` for unknown emails.
    #[instrument(skip_all)]
    pub async fn request_password_reset(&self, email: &str) -> Result<Option<String>> {
        let email = validators::normalize_email(email);
        let Some(user) = self.users.get_user_by_email(&email).await? else {
            return Ok(None);
        };

        let token = OneTimeToken::generate();
        self.users
            .set_reset_token(user.id, &token.hash, Utc::now().timestamp())
            .await?;

        info!(user_id = %user.id, "Password reset requested");
        Ok(Some(token.raw))
    }

    /// Set a new password with a reset token.
    #[instrument(skip_all, fields(address = %address))]
    pub async fn reset_password(
        &self,
        raw_token: &str,
        new_password: &str,
        address: &str,
    ) -> Result<()> {
        let token_hash = one_time_token::hash_token(raw_token);
        let user = self
            .users
            .get_user_by_reset_token(&token_hash)
            .await?
            .ok_or(IdentityError::InvalidCredentials)?;

        let issued_at = user.password_reset_issued_at.unwrap_or(0);
        if one_time_token::is_expired(
            issued_at,
            PASSWORD_RESET_LIFETIME_SECS,
            Utc::now().timestamp(),
        ) {
            return Err(IdentityError::Expired);
        }

        self.apply_new_password(&user, new_password, address).await?;
        info!(user_id = %user.id, "Password reset");
        Ok(())
    }

    async fn load_token_owner(&self, claims: &Claims) -> Result<User> {
        let user = self
            .users
            .get_user_by_id(claims.sub)
            .await?
            .ok_or(IdentityError::InvalidCredentials)?;

        self.sessions
            .ensure_issued_after(claims, user.sessions_valid_after)?;
        Ok(user)
    }

    /// Store a new hash, end all sessions and unlock the pair.
    ///
    /// The three writes run as one detached task: once the new hash is
    /// stored, the epoch bump and unlock complete even if the caller goes away.
    async fn apply_new_password(&self, user: &User, new_password: &str, address: &str) -> Result<()> {
        let password_hash = hash_password_blocking(new_password).await?;

        let users = Arc::clone(&self.users);
        let lockout = self.lockout.clone();
        let user_id = user.id;
        let address = address.to_owned();
        run_detached(async move {
            users.change_password_hash(user_id, &password_hash).await?;
            users
                .increment_session_epoch(user_id, Utc::now().timestamp())
                .await?;
            lockout.unlock(user_id, &address).await
        })
        .await
    }

    async fn bump_session_epoch(&self, user_id: Uuid) -> Result<i64> {
        let users = Arc::clone(&self.users);
        run_detached(async move {
            users
                .increment_session_epoch(user_id, Utc::now().timestamp())
                .await
        })
        .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::{MemoryStore, MockLockoutStore, MockUserStore};
    use jwt_security::{MemoryRevocationStore, TokenCodec};

    const SECRET: &[u8] = b"authentication-flow-unit-secret!";

    fn sessions() -> SessionManager {
        SessionManager::new(
            TokenCodec::new(SECRET).unwrap(),
            Arc::new(MemoryRevocationStore::new()),
        )
    }

    fn confirmed_user(password: &str) -> User {
        let hash = crate::security::hash_password(password).unwrap();
        let mut user = User::new("alice", "alice@example.com", hash, 0);
        user.email_confirmed = true;
        user
    }

    #[tokio::test]
    async fn test_unknown_email_is_generic() {
        let mut users = MockUserStore::new();
        users.expect_get_user_by_email().returning(|_| Ok(None));

        let flow = AuthenticationFlow::new(
            Arc::new(users),
            Arc::new(MemoryStore::new()),
            sessions(),
            LockoutPolicy::default(),
        );

        assert!(matches!(
            flow.login("nobody@example.com", "Tz9!mQ4#vLx2Rk", "127.0.0.1").await,
            Err(IdentityError::InvalidCredentials)
        ));
    }

    #[tokio::test]
    async fn test_lockout_storage_failure_fails_closed() {
        let user = confirmed_user("Tz9!mQ4#vLx2Rk");
        let mut users = MockUserStore::new();
        users
            .expect_get_user_by_email()
            .returning(move |_| Ok(Some(user.clone())));

        let mut lockouts = MockLockoutStore::new();
        lockouts
            .expect_active_lockout()
            .returning(|_, _, _| Err(IdentityError::StorageUnavailable("timeout".into())));
        lockouts.expect_insert_failed_login().never();

        let flow = AuthenticationFlow::new(
            Arc::new(users),
            Arc::new(lockouts),
            sessions(),
            LockoutPolicy::default(),
        );

        assert!(matches!(
            flow.login("alice@example.com", "Tz9!mQ4#vLx2Rk", "127.0.0.1").await,
            Err(IdentityError::StorageUnavailable(_))
        ));
    }

    #[tokio::test]
    async fn test_failure_recording_error_does_not_authenticate() {
        let user = confirmed_user("Tz9!mQ4#vLx2Rk");
        let mut users = MockUserStore::new();
        users
            .expect_get_user_by_email()
            .returning(move |_| Ok(Some(user.clone())));

        let mut lockouts = MockLockoutStore::new();
        lockouts.expect_active_lockout().returning(|_, _, _| Ok(None));
        lockouts
            .expect_insert_failed_login()
            .times(1)
            .returning(|_, _, _| Err(IdentityError::StorageUnavailable("timeout".into())));

        let flow = AuthenticationFlow::new(
            Arc::new(users),
            Arc::new(lockouts),
            sessions(),
            LockoutPolicy::default(),
        );

        assert!(matches!(
            flow.login("alice@example.com", "Wrong-Passw0rd", "127.0.0.1").await,
            Err(IdentityError::StorageUnavailable(_))
        ));
    }

    #[tokio::test]
    async fn test_deleted_user_token_rejected() {
        let mut users = MockUserStore::new();
        users.expect_get_user_by_id().returning(|_| Ok(None));

        let sessions = sessions();
        let ghost = User::new("ghost", "ghost@example.com", "hash".into(), 0);
        let pair = sessions.issue_pair(&ghost.token_subject()).unwrap();

        let flow = AuthenticationFlow::new(
            Arc::new(users),
            Arc::new(MemoryStore::new()),
            sessions,
            LockoutPolicy::default(),
        );

        assert!(matches!(
            flow.authenticate(&pair.access_token).await,
            Err(IdentityError::InvalidCredentials)
        ));
    }
}
