/// Account lockout after repeated failed logins
///
/// State is kept per (user, address) pair and derived from an append-only
/// failure log: Clear, then Accumulating while failures are inside the
/// trailing window, then Locked once the count passes the threshold. Only a
/// successful password change leaves Locked early.
use crate::db::LockoutStore;
use crate::error::{IdentityError, Result};
use crate::models::Lockout;
use chrono::Utc;
use std::future::Future;
use std::sync::Arc;
use tracing::{debug, info, warn};
use uuid::Uuid;

pub const DEFAULT_LOCKOUT_THRESHOLD: i64 = 5;
pub const DEFAULT_LOCKOUT_WINDOW_SECS: i64 = 1800;
pub const DEFAULT_LOCKOUT_DURATION_SECS: i64 = 3600;

const LOCKOUT_REASON: &str = "failed logins";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LockoutPolicy {
    /// Free retries. The (threshold + 1)-th recent failure locks.
    pub threshold: i64,
    /// Trailing window for counting failures
    pub window_secs: i64,
    pub duration_secs: i64,
}

impl Default for LockoutPolicy {
    fn default() -> Self {
        Self {
            threshold: DEFAULT_LOCKOUT_THRESHOLD,
            window_secs: DEFAULT_LOCKOUT_WINDOW_SECS,
            duration_secs: DEFAULT_LOCKOUT_DURATION_SECS,
        }
    }
}

/// Result of recording a failed password check
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailureOutcome {
    Recorded { recent_failures: i64 },
    Locked { locked_until: i64 },
}

#[derive(Clone)]
pub struct LockoutGuard {
    store: Arc<dyn LockoutStore>,
    policy: LockoutPolicy,
}

impl LockoutGuard {
    pub fn new(store: Arc<dyn LockoutStore>, policy: LockoutPolicy) -> Self {
        Self { store, policy }
    }

    pub fn policy(&self) -> LockoutPolicy {
        self.policy
    }

    /// Fails with `AccountLocked` while a lockout is in force for the pair.
    pub async fn check_lockout(&self, user_id: Uuid, address: &str) -> Result<()> {
        self.check_lockout_at(user_id, address, Utc::now().timestamp())
            .await
    }

    pub async fn check_lockout_at(&self, user_id: Uuid, address: &str, now: i64) -> Result<()> {
        match self.store.active_lockout(user_id, address, now).await? {
            Some(locked_until) => {
                debug!(user_id = %user_id, address, locked_until, "Login refused, account locked");
                Err(IdentityError::AccountLocked { locked_until })
            }
            None => Ok(()),
        }
    }

    /// Record a failed attempt, then decide whether to lock.
    ///
    /// The failure is always written before the count is read, so racing
    /// attempts may both lock but none goes uncounted.
    pub async fn record_failure(&self, user_id: Uuid, address: &str) -> Result<FailureOutcome> {
        self.record_failure_at(user_id, address, Utc::now().timestamp())
            .await
    }

    pub async fn record_failure_at(
        &self,
        user_id: Uuid,
        address: &str,
        now: i64,
    ) -> Result<FailureOutcome> {
        let store = Arc::clone(&self.store);
        let addr = address.to_owned();
        run_detached(async move { store.insert_failed_login(user_id, &addr, now).await }).await?;

        let window_start = now - self.policy.window_secs;
        let recent_failures = self
            .store
            .count_recent_failures(user_id, address, window_start)
            .await?;

        if recent_failures <= self.policy.threshold {
            debug!(user_id = %user_id, address, recent_failures, "Failed login recorded");
            return Ok(FailureOutcome::Recorded { recent_failures });
        }

        let locked_until = now + self.policy.duration_secs;
        let lockout = Lockout {
            user_id,
            address: address.to_owned(),
            locked_until,
            reason: LOCKOUT_REASON.to_string(),
            created_at: now,
        };
        let store = Arc::clone(&self.store);
        run_detached(async move { store.insert_lockout(&lockout).await }).await?;

        warn!(
            user_id = %user_id,
            address,
            recent_failures,
            locked_until,
            "Account locked after repeated failed logins"
        );
        Ok(FailureOutcome::Locked { locked_until })
    }

    /// Successful login: forget earlier failures for the pair.
    pub async fn record_success(&self, user_id: Uuid, address: &str) -> Result<()> {
        self.store.clear_failed_logins(user_id, address).await
    }

    /// Lift any lockout and clear failure history for the pair.
    pub async fn unlock(&self, user_id: Uuid, address: &str) -> Result<()> {
        self.store.unlock_account(user_id, address).await?;
        info!(user_id = %user_id, address, "Account unlocked");
        Ok(())
    }
}

/// Run a storage write on its own task so dropping the caller does not abort it.
pub(crate) async fn run_detached<T, F>(fut: F) -> Result<T>
where
    F: Future<Output = Result<T>> + Send + 'static,
    T: Send + 'static,
{
    tokio::spawn(fut).await?
}
