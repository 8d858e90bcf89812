/// In-process stores backed by `DashMap`
use super::{LockoutStore, UserStore};
use crate::error::{IdentityError, Result};
use crate::models::{FailedLogin, Lockout, User};
use async_trait::async_trait;
use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use uuid::Uuid;

type PairKey = (Uuid, String);

fn pair(user_id: Uuid, address: &str) -> PairKey {
    (user_id, address.to_string())
}

/// Implements both [`UserStore`] and [`LockoutStore`] for tests and
/// single-node deployments. Nothing survives a restart.
#[derive(Debug, Default)]
pub struct MemoryStore {
    users: DashMap<Uuid, User>,
    emails: DashMap<String, Uuid>,
    usernames: DashMap<String, Uuid>,
    failed_logins: DashMap<PairKey, Vec<FailedLogin>>,
    lockouts: DashMap<PairKey, Vec<Lockout>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn find_user(&self, predicate: impl Fn(&User) -> bool) -> Option<User> {
        self.users
            .iter()
            .find(|entry| predicate(entry.value()))
            .map(|entry| entry.value().clone())
    }

    fn update_user(&self, user_id: Uuid, f: impl FnOnce(&mut User)) -> Result<()> {
        match self.users.get_mut(&user_id) {
            Some(mut user) => {
                f(&mut user);
                Ok(())
            }
            None => Err(IdentityError::InvalidCredentials),
        }
    }
}

#[async_trait]
impl UserStore for MemoryStore {
    async fn get_user_by_email(&self, email: &str) -> Result<Option<User>> {
        let Some(user_id) = self.emails.get(email).map(|id| *id) else {
            return Ok(None);
        };
        Ok(self.users.get(&user_id).map(|user| user.clone()))
    }

    async fn get_user_by_id(&self, user_id: Uuid) -> Result<Option<User>> {
        Ok(self.users.get(&user_id).map(|user| user.clone()))
    }

    async fn create_user(&self, user: &User) -> Result<()> {
        let duplicate =
            || IdentityError::Validation("Email or username already registered".to_string());

        // Lock order: emails, then usernames
        let Entry::Vacant(email_slot) = self.emails.entry(user.email.clone()) else {
            return Err(duplicate());
        };
        let Entry::Vacant(username_slot) = self.usernames.entry(user.username.clone()) else {
            return Err(duplicate());
        };

        self.users.insert(user.id, user.clone());
        username_slot.insert(user.id);
        email_slot.insert(user.id);
        Ok(())
    }

    async fn increment_session_epoch(&self, user_id: Uuid, now: i64) -> Result<i64> {
        let mut epoch = 0;
        self.update_user(user_id, |user| {
            user.session_epoch += 1;
            user.sessions_valid_after = (user.sessions_valid_after + 1).max(now + 1);
            epoch = user.session_epoch;
        })?;
        Ok(epoch)
    }

    async fn change_password_hash(&self, user_id: Uuid, password_hash: &str) -> Result<()> {
        self.update_user(user_id, |user| {
            user.password_hash = password_hash.to_string();
            user.password_reset_token = None;
            user.password_reset_issued_at = None;
        })
    }

    async fn mark_email_confirmed(&self, user_id: Uuid) -> Result<()> {
        self.update_user(user_id, |user| {
            user.email_confirmed = true;
            user.email_confirm_token = None;
            user.email_confirm_issued_at = None;
        })
    }

    async fn set_confirmation_token(
        &self,
        user_id: Uuid,
        token_hash: &str,
        issued_at: i64,
    ) -> Result<()> {
        self.update_user(user_id, |user| {
            user.email_confirm_token = Some(token_hash.to_string());
            user.email_confirm_issued_at = Some(issued_at);
        })
    }

    async fn get_user_by_confirmation_token(&self, token_hash: &str) -> Result<Option<User>> {
        Ok(self.find_user(|user| user.email_confirm_token.as_deref() == Some(token_hash)))
    }

    async fn set_reset_token(
        &self,
        user_id: Uuid,
        token_hash: &str,
        issued_at: i64,
    ) -> Result<()> {
        self.update_user(user_id, |user| {
            user.password_reset_token = Some(token_hash.to_string());
            user.password_reset_issued_at = Some(issued_at);
        })
    }

    async fn get_user_by_reset_token(&self, token_hash: &str) -> Result<Option<User>> {
        Ok(self.find_user(|user| user.password_reset_token.as_deref() == Some(token_hash)))
    }
}

#[async_trait]
impl LockoutStore for MemoryStore {
    async fn count_recent_failures(
        &self,
        user_id: Uuid,
        address: &str,
        window_start: i64,
    ) -> Result<i64> {
        // Drop what fell out of the window while counting
        let count = match self.failed_logins.get_mut(&pair(user_id, address)) {
            Some(mut failures) => {
                failures.retain(|f| f.attempted_at >= window_start);
                failures.len()
            }
            None => 0,
        };
        Ok(count as i64)
    }

    async fn insert_failed_login(
        &self,
        user_id: Uuid,
        address: &str,
        attempted_at: i64,
    ) -> Result<()> {
        self.failed_logins
            .entry(pair(user_id, address))
            .or_default()
            .push(FailedLogin {
                user_id,
                address: address.to_string(),
                attempted_at,
            });
        Ok(())
    }

    async fn insert_lockout(&self, lockout: &Lockout) -> Result<()> {
        self.lockouts
            .entry(pair(lockout.user_id, &lockout.address))
            .or_default()
            .push(lockout.clone());
        Ok(())
    }

    async fn active_lockout(&self, user_id: Uuid, address: &str, now: i64) -> Result<Option<i64>> {
        Ok(self
            .lockouts
            .get(&pair(user_id, address))
            .and_then(|locks| {
                locks
                    .iter()
                    .map(|lock| lock.locked_until)
                    .filter(|&until| until >= now)
                    .max()
            }))
    }

    async fn unlock_account(&self, user_id: Uuid, address: &str) -> Result<()> {
        let key = pair(user_id, address);
        self.lockouts.remove(&key);
        self.failed_logins.remove(&key);
        Ok(())
    }

    async fn clear_failed_logins(&self, user_id: Uuid, address: &str) -> Result<()> {
        self.failed_logins.remove(&pair(user_id, address));
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn user(username: &str, email: &str) -> User {
        User::new(username, email, "hash".into(), 1_000)
    }

    #[tokio::test]
    async fn test_create_rejects_duplicates() {
        let store = MemoryStore::new();
        store.create_user(&user("alice", "alice@example.com")).await.unwrap();

        assert!(matches!(
            store.create_user(&user("alice2", "alice@example.com")).await,
            Err(IdentityError::Validation(_))
        ));
        assert!(matches!(
            store.create_user(&user("alice", "other@example.com")).await,
            Err(IdentityError::Validation(_))
        ));
        // The failed username insert must not leave the email reserved
        store.create_user(&user("carol", "other@example.com")).await.unwrap();
    }

    #[tokio::test]
    async fn test_epoch_increment_moves_watermark() {
        let store = MemoryStore::new();
        let u = user("alice", "alice@example.com");
        store.create_user(&u).await.unwrap();

        assert_eq!(store.increment_session_epoch(u.id, 5_000).await.unwrap(), 1);
        assert_eq!(store.increment_session_epoch(u.id, 5_000).await.unwrap(), 2);

        let stored = store.get_user_by_id(u.id).await.unwrap().unwrap();
        assert_eq!(stored.session_epoch, 2);
        assert_eq!(stored.sessions_valid_after, 5_002);

        assert!(matches!(
            store.increment_session_epoch(Uuid::new_v4(), 5_000).await,
            Err(IdentityError::InvalidCredentials)
        ));
    }

    #[tokio::test]
    async fn test_concurrent_epoch_increments_are_not_lost() {
        let store = std::sync::Arc::new(MemoryStore::new());
        let u = user("alice", "alice@example.com");
        store.create_user(&u).await.unwrap();
        let user_id = u.id;

        let handles: Vec<_> = (0..20)
            .map(|_| {
                let store = store.clone();
                tokio::spawn(async move { store.increment_session_epoch(user_id, 1).await })
            })
            .collect();
        for handle in handles {
            handle.await.unwrap().unwrap();
        }

        let stored = store.get_user_by_id(u.id).await.unwrap().unwrap();
        assert_eq!(stored.session_epoch, 20);
    }

    #[tokio::test]
    async fn test_failure_window_and_unlock() {
        let store = MemoryStore::new();
        let id = Uuid::new_v4();

        store.insert_failed_login(id, "10.0.0.1", 100).await.unwrap();
        store.insert_failed_login(id, "10.0.0.1", 200).await.unwrap();
        store.insert_failed_login(id, "10.0.0.2", 200).await.unwrap();

        assert_eq!(store.count_recent_failures(id, "10.0.0.1", 100).await.unwrap(), 2);
        assert_eq!(store.count_recent_failures(id, "10.0.0.1", 101).await.unwrap(), 1);

        store
            .insert_lockout(&Lockout {
                user_id: id,
                address: "10.0.0.1".into(),
                locked_until: 900,
                reason: "failed logins".into(),
                created_at: 300,
            })
            .await
            .unwrap();
        assert_eq!(store.active_lockout(id, "10.0.0.1", 900).await.unwrap(), Some(900));
        assert_eq!(store.active_lockout(id, "10.0.0.1", 901).await.unwrap(), None);
        assert_eq!(store.active_lockout(id, "10.0.0.2", 500).await.unwrap(), None);

        store.unlock_account(id, "10.0.0.1").await.unwrap();
        assert_eq!(store.active_lockout(id, "10.0.0.1", 500).await.unwrap(), None);
        assert_eq!(store.count_recent_failures(id, "10.0.0.1", 0).await.unwrap(), 0);
        // Other addresses keep their history
        assert_eq!(store.count_recent_failures(id, "10.0.0.2", 0).await.unwrap(), 1);
    }

    #[tokio::test]
    async fn test_counting_discards_stale_failures() {
        let store = MemoryStore::new();
        let id = Uuid::new_v4();

        for t in [100, 200, 3_000] {
            store.insert_failed_login(id, "10.0.0.1", t).await.unwrap();
        }
        assert_eq!(store.count_recent_failures(id, "10.0.0.1", 1_200).await.unwrap(), 1);

        let kept = store.failed_logins.get(&pair(id, "10.0.0.1")).unwrap();
        assert_eq!(kept.len(), 1);
        assert_eq!(kept[0].attempted_at, 3_000);
    }
}
