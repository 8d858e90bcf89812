/// Token revocation database operations
///
/// Persistent alternative to the Redis blacklist when no Redis is configured.
use async_trait::async_trait;
use chrono::Utc;
use jwt_security::{RevocationRecord, RevocationStore, TokenError};
use sqlx::PgPool;
use tracing::info;

#[derive(Clone)]
pub struct PgRevocationStore {
    pool: PgPool,
}

impl PgRevocationStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

fn storage_error(err: sqlx::Error) -> TokenError {
    tracing::error!("Database error: {}", err);
    TokenError::StorageUnavailable(err.to_string())
}

#[async_trait]
impl RevocationStore for PgRevocationStore {
    async fn revoke(&self, record: &RevocationRecord) -> jwt_security::Result<bool> {
        let now = Utc::now().timestamp();

        // A stale record for the same identifier may be overwritten, a live one never.
        let result = sqlx::query(
            r#"
            INSERT INTO jwt_blacklist (token_id, user_id, expires_at)
            VALUES ($1, $2, $3)
            ON CONFLICT (token_id) DO UPDATE SET
                user_id = EXCLUDED.user_id,
                expires_at = EXCLUDED.expires_at
            WHERE jwt_blacklist.expires_at < $4
            "#,
        )
        .bind(&record.token_id)
        .bind(record.user_id)
        .bind(record.expires_at)
        .bind(now)
        .execute(&self.pool)
        .await
        .map_err(storage_error)?;

        Ok(result.rows_affected() == 1)
    }

    async fn is_revoked(&self, token_id: &str) -> jwt_security::Result<bool> {
        let revoked = sqlx::query_scalar::<_, bool>(
            r#"
            SELECT EXISTS(
                SELECT 1 FROM jwt_blacklist
                WHERE token_id = $1 AND expires_at >= $2
            )
            "#,
        )
        .bind(token_id)
        .bind(Utc::now().timestamp())
        .fetch_one(&self.pool)
        .await
        .map_err(storage_error)?;

        Ok(revoked)
    }

    async fn purge_expired(&self) -> jwt_security::Result<u64> {
        let result = sqlx::query("DELETE FROM jwt_blacklist WHERE expires_at < $1")
            .bind(Utc::now().timestamp())
            .execute(&self.pool)
            .await
            .map_err(storage_error)?;

        info!(removed = result.rows_affected(), "Deleted expired revocation records");
        Ok(result.rows_affected())
    }
}
