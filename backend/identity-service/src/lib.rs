/// Identity Service Library
///
/// Session and credential management: login with account lockout, access and
/// refresh token pairs, logout, logout-everywhere, refresh rotation,
/// registration with email confirmation and password reset.
///
/// ## Modules
///
/// - `config`: Service configuration
/// - `db`: Storage traits with Postgres and in-memory implementations
/// - `error`: Error types
/// - `models`: Data models
/// - `security`: Password hashing, account lockout, one-time tokens
/// - `services`: Authentication flows
/// - `telemetry`: Logging setup
/// - `validators`: Input validation
pub mod config;
pub mod db;
pub mod error;
pub mod models;
pub mod security;
pub mod services;
pub mod telemetry;
pub mod validators;

use anyhow::Context;
use jwt_security::{RedisRevocationStore, RevocationStore, SessionManager, TokenCodec};
use sqlx::postgres::PgPoolOptions;
use std::sync::Arc;
use std::time::Duration;
use tracing::info;

// Re-export commonly used types
pub use config::Settings;
pub use error::{IdentityError, Result};
pub use services::{AuthenticationFlow, Registration};

/// Connect to Postgres (and Redis when configured), run migrations and build
/// the authentication flow.
pub async fn connect(settings: &Settings) -> anyhow::Result<AuthenticationFlow> {
    let database = settings
        .database
        .as_ref()
        .context("DATABASE_URL must be set")?;

    let pool = PgPoolOptions::new()
        .max_connections(database.max_connections)
        .acquire_timeout(Duration::from_secs(database.acquire_timeout))
        .connect(&database.url)
        .await
        .context("Failed to connect to database")?;

    sqlx::migrate!("./migrations")
        .run(&pool)
        .await
        .context("Failed to run database migrations")?;
    info!("Database migrations applied");

    let revocations: Arc<dyn RevocationStore> = match &settings.redis_url {
        Some(url) => {
            let client = redis::Client::open(url.as_str()).context("Invalid REDIS_URL")?;
            let manager = redis::aio::ConnectionManager::new(client)
                .await
                .context("Failed to connect to Redis")?;
            info!("Token revocations stored in Redis");
            Arc::new(RedisRevocationStore::new(manager))
        }
        None => {
            info!("Token revocations stored in Postgres");
            Arc::new(db::PgRevocationStore::new(pool.clone()))
        }
    };

    let codec = TokenCodec::new(&settings.jwt_secret).context("Invalid JWT_SECRET")?;
    let store = Arc::new(db::PgStore::new(pool));

    Ok(AuthenticationFlow::new(
        store.clone(),
        store,
        SessionManager::new(codec, revocations),
        settings.lockout,
    ))
}
