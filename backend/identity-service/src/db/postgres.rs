/// Postgres-backed stores
use super::{lockouts, users, LockoutStore, UserStore};
use crate::error::Result;
use crate::models::{Lockout, User};
use async_trait::async_trait;
use sqlx::PgPool;
use uuid::Uuid;

#[derive(Clone)]
pub struct PgStore {
    pool: PgPool,
}

impl PgStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl UserStore for PgStore {
    async fn get_user_by_email(&self, email: &str) -> Result<Option<User>> {
        users::find_by_email(&self.pool, email).await
    }

    async fn get_user_by_id(&self, user_id: Uuid) -> Result<Option<User>> {
        users::find_by_id(&self.pool, user_id).await
    }

    async fn create_user(&self, user: &User) -> Result<()> {
        users::create_user(&self.pool, user).await
    }

    async fn increment_session_epoch(&self, user_id: Uuid, now: i64) -> Result<i64> {
        users::increment_session_epoch(&self.pool, user_id, now).await
    }

    async fn change_password_hash(&self, user_id: Uuid, password_hash: &str) -> Result<()> {
        users::change_password_hash(&self.pool, user_id, password_hash).await
    }

    async fn mark_email_confirmed(&self, user_id: Uuid) -> Result<()> {
        users::mark_email_confirmed(&self.pool, user_id).await
    }

    async fn set_confirmation_token(
        &self,
        user_id: Uuid,
        token_hash: &str,
        issued_at: i64,
    ) -> Result<()> {
        users::set_confirmation_token(&self.pool, user_id, token_hash, issued_at).await
    }

    async fn get_user_by_confirmation_token(&self, token_hash: &str) -> Result<Option<User>> {
        users::find_by_confirmation_token(&self.pool, token_hash).await
    }

    async fn set_reset_token(
        &self,
        user_id: Uuid,
        token_hash: &str,
        issued_at: i64,
    ) -> Result<()> {
        users::set_reset_token(&self.pool, user_id, token_hash, issued_at).await
    }

    async fn get_user_by_reset_token(&self, token_hash: &str) -> Result<Option<User>> {
        users::find_by_reset_token(&self.pool, token_hash).await
    }
}

#[async_trait]
impl LockoutStore for PgStore {
    async fn count_recent_failures(
        &self,
        user_id: Uuid,
        address: &str,
        window_start: i64,
    ) -> Result<i64> {
        lockouts::count_recent_failures(&self.pool, user_id, address, window_start).await
    }

    async fn insert_failed_login(
        &self,
        user_id: Uuid,
        address: &str,
        attempted_at: i64,
    ) -> Result<()> {
        lockouts::insert_failed_login(&self.pool, user_id, address, attempted_at).await
    }

    async fn insert_lockout(&self, lockout: &Lockout) -> Result<()> {
        lockouts::insert_lockout(&self.pool, lockout).await
    }

    async fn active_lockout(&self, user_id: Uuid, address: &str, now: i64) -> Result<Option<i64>> {
        lockouts::active_lockout(&self.pool, user_id, address, now).await
    }

    async fn unlock_account(&self, user_id: Uuid, address: &str) -> Result<()> {
        lockouts::unlock_account(&self.pool, user_id, address).await
    }

    async fn clear_failed_logins(&self, user_id: Uuid, address: &str) -> Result<()> {
        lockouts::clear_failed_logins(&self.pool, user_id, address).await
    }
}
