/// User database operations for identity-service
use crate::error::{IdentityError, Result};
use crate::models::User;
use sqlx::PgPool;
use uuid::Uuid;

const USER_COLUMNS: &str = "id, username, email, password_hash, role, created_at, \
     email_confirmed, email_confirm_token, email_confirm_issued_at, \
     password_reset_token, password_reset_issued_at, session_epoch, sessions_valid_after";

/// Find user by email
pub async fn find_by_email(pool: &PgPool, email: &str) -> Result<Option<User>> {
    let user = sqlx::query_as::<_, User>(&format!(
        "SELECT {} FROM users WHERE email = $1",
        USER_COLUMNS
    ))
    .bind(email)
    .fetch_optional(pool)
    .await?;

    Ok(user)
}

/// Find user by ID
pub async fn find_by_id(pool: &PgPool, user_id: Uuid) -> Result<Option<User>> {
    let user = sqlx::query_as::<_, User>(&format!(
        "SELECT {} FROM users WHERE id = $1",
        USER_COLUMNS
    ))
    .bind(user_id)
    .fetch_optional(pool)
    .await?;

    Ok(user)
}

/// Find user by the hash of an outstanding confirmation token
pub async fn find_by_confirmation_token(pool: &PgPool, token_hash: &str) -> Result<Option<User>> {
    let user = sqlx::query_as::<_, User>(&format!(
        "SELECT {} FROM users WHERE email_confirm_token = $1",
        USER_COLUMNS
    ))
    .bind(token_hash)
    .fetch_optional(pool)
    .await?;

    Ok(user)
}

/// Find user by the hash of an outstanding password reset token
pub async fn find_by_reset_token(pool: &PgPool, token_hash: &str) -> Result<Option<User>> {
    let user = sqlx::query_as::<_, User>(&format!(
        "SELECT {} FROM users WHERE password_reset_token = $1",
        USER_COLUMNS
    ))
    .bind(token_hash)
    .fetch_optional(pool)
    .await?;

    Ok(user)
}

/// Insert a new user
pub async fn create_user(pool: &PgPool, user: &User) -> Result<()> {
    let result = sqlx::query(
        r#"
        INSERT INTO users (
            id, username, email, password_hash, role, created_at,
            email_confirmed, email_confirm_token, email_confirm_issued_at,
            password_reset_token, password_reset_issued_at,
            session_epoch, sessions_valid_after
        )
        VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13)
        "#,
    )
    .bind(user.id)
    .bind(&user.username)
    .bind(&user.email)
    .bind(&user.password_hash)
    .bind(&user.role)
    .bind(user.created_at)
    .bind(user.email_confirmed)
    .bind(&user.email_confirm_token)
    .bind(user.email_confirm_issued_at)
    .bind(&user.password_reset_token)
    .bind(user.password_reset_issued_at)
    .bind(user.session_epoch)
    .bind(user.sessions_valid_after)
    .execute(pool)
    .await;

    match result {
        Ok(_) => Ok(()),
        Err(sqlx::Error::Database(db_err)) if db_err.is_unique_violation() => Err(
            IdentityError::Validation("Email or username already registered".to_string()),
        ),
        Err(e) => Err(e.into()),
    }
}

/// Bump the session epoch and advance the validity watermark in one statement
pub async fn increment_session_epoch(pool: &PgPool, user_id: Uuid, now: i64) -> Result<i64> {
    let epoch = sqlx::query_scalar::<_, i64>(
        r#"
        UPDATE users
        SET session_epoch = session_epoch + 1,
            sessions_valid_after = GREATEST(sessions_valid_after + 1, $2 + 1)
        WHERE id = $1
        RETURNING session_epoch
        "#,
    )
    .bind(user_id)
    .bind(now)
    .fetch_optional(pool)
    .await?;

    epoch.ok_or(IdentityError::InvalidCredentials)
}

/// Update password hash, consuming any reset token
pub async fn change_password_hash(pool: &PgPool, user_id: Uuid, password_hash: &str) -> Result<()> {
    sqlx::query(
        r#"
        UPDATE users
        SET password_hash = $2,
            password_reset_token = NULL,
            password_reset_issued_at = NULL
        WHERE id = $1
        "#,
    )
    .bind(user_id)
    .bind(password_hash)
    .execute(pool)
    .await?;

    Ok(())
}

/// Mark email as confirmed
pub async fn mark_email_confirmed(pool: &PgPool, user_id: Uuid) -> Result<()> {
    sqlx::query(
        r#"
        UPDATE users
        SET email_confirmed = TRUE,
            email_confirm_token = NULL,
            email_confirm_issued_at = NULL
        WHERE id = $1
        "#,
    )
    .bind(user_id)
    .execute(pool)
    .await?;

    Ok(())
}

pub async fn set_confirmation_token(
    pool: &PgPool,
    user_id: Uuid,
    token_hash: &str,
    issued_at: i64,
) -> Result<()> {
    sqlx::query(
        "UPDATE users SET email_confirm_token = $2, email_confirm_issued_at = $3 WHERE id = $1",
    )
    .bind(user_id)
    .bind(token_hash)
    .bind(issued_at)
    .execute(pool)
    .await?;

    Ok(())
}

pub async fn set_reset_token(
    pool: &PgPool,
    user_id: Uuid,
    token_hash: &str,
    issued_at: i64,
) -> Result<()> {
    sqlx::query(
        "UPDATE users SET password_reset_token = $2, password_reset_issued_at = $3 WHERE id = $1",
    )
    .bind(user_id)
    .bind(token_hash)
    .bind(issued_at)
    .execute(pool)
    .await?;

    Ok(())
}
