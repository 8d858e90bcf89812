/// Failed login and lockout database operations
use crate::error::Result;
use crate::models::Lockout;
use sqlx::PgPool;
use uuid::Uuid;

/// Count failures for the pair at or after `window_start`
pub async fn count_recent_failures(
    pool: &PgPool,
    user_id: Uuid,
    address: &str,
    window_start: i64,
) -> Result<i64> {
    let count = sqlx::query_scalar::<_, i64>(
        r#"
        SELECT COUNT(*) FROM failed_logins
        WHERE user_id = $1 AND address = $2 AND attempted_at >= $3
        "#,
    )
    .bind(user_id)
    .bind(address)
    .bind(window_start)
    .fetch_one(pool)
    .await?;

    Ok(count)
}

pub async fn insert_failed_login(
    pool: &PgPool,
    user_id: Uuid,
    address: &str,
    attempted_at: i64,
) -> Result<()> {
    sqlx::query("INSERT INTO failed_logins (user_id, address, attempted_at) VALUES ($1, $2, $3)")
        .bind(user_id)
        .bind(address)
        .bind(attempted_at)
        .execute(pool)
        .await?;

    Ok(())
}

pub async fn insert_lockout(pool: &PgPool, lockout: &Lockout) -> Result<()> {
    sqlx::query(
        r#"
        INSERT INTO lockouts (user_id, address, locked_until, reason, created_at)
        VALUES ($1, $2, $3, $4, $5)
        "#,
    )
    .bind(lockout.user_id)
    .bind(&lockout.address)
    .bind(lockout.locked_until)
    .bind(&lockout.reason)
    .bind(lockout.created_at)
    .execute(pool)
    .await?;

    Ok(())
}

/// Latest lockout for the pair that is still in force at `now`, inclusive
pub async fn active_lockout(
    pool: &PgPool,
    user_id: Uuid,
    address: &str,
    now: i64,
) -> Result<Option<i64>> {
    let locked_until = sqlx::query_scalar::<_, Option<i64>>(
        r#"
        SELECT MAX(locked_until) FROM lockouts
        WHERE user_id = $1 AND address = $2 AND locked_until >= $3
        "#,
    )
    .bind(user_id)
    .bind(address)
    .bind(now)
    .fetch_one(pool)
    .await?;

    Ok(locked_until)
}

/// Clear lockouts and failure history for the pair in one transaction
pub async fn unlock_account(pool: &PgPool, user_id: Uuid, address: &str) -> Result<()> {
    let mut tx = pool.begin().await?;

    sqlx::query("DELETE FROM lockouts WHERE user_id = $1 AND address = $2")
        .bind(user_id)
        .bind(address)
        .execute(&mut *tx)
        .await?;

    sqlx::query("DELETE FROM failed_logins WHERE user_id = $1 AND address = $2")
        .bind(user_id)
        .bind(address)
        .execute(&mut *tx)
        .await?;

    tx.commit().await?;
    Ok(())
}

pub async fn clear_failed_logins(pool: &PgPool, user_id: Uuid, address: &str) -> Result<()> {
    sqlx::query("DELETE FROM failed_logins WHERE user_id = $1 AND address = $2")
        .bind(user_id)
        .bind(address)
        .execute(pool)
        .await?;

    Ok(())
}
