//! Configuration management for Identity Service
//!
//! Loads settings from environment variables, with a `.env` file picked up in
//! debug builds for local development.
//!
//! # Example
//!
//! ```no_run
//! use identity_service::config::Settings;
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let settings = Settings::from_env()?;
//!     let flow = identity_service::connect(&settings).await?;
//!     Ok(())
//! }
//! ```

use crate::security::LockoutPolicy;
use anyhow::{bail, Context, Result};
use base64::{engine::general_purpose::STANDARD, Engine};
use jwt_security::{validate_secret_strength, SecretStrength, MIN_SECRET_LENGTH};
use std::env;
use std::fmt;
use std::str::FromStr;
use tracing::{info, warn};
use zeroize::Zeroizing;

/// Application settings
#[derive(Clone)]
pub struct Settings {
    /// Decoded HS256 signing secret, wiped on drop
    pub jwt_secret: Zeroizing<Vec<u8>>,
    pub lockout: LockoutPolicy,
    pub database: Option<DatabaseSettings>,
    /// When set, revoked tokens are kept in Redis instead of Postgres
    pub redis_url: Option<String>,
}

impl Settings {
    pub fn from_env() -> Result<Self> {
        if cfg!(debug_assertions) && dotenvy::dotenv().is_ok() {
            info!("Loaded .env file for development");
        }

        Ok(Settings {
            jwt_secret: load_jwt_secret()?,
            lockout: load_lockout_policy()?,
            database: DatabaseSettings::from_env()?,
            redis_url: env::var("REDIS_URL").ok().filter(|url| !url.is_empty()),
        })
    }
}

impl fmt::Debug for Settings {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Settings")
            .field("jwt_secret", &"[REDACTED]")
            .field("lockout", &self.lockout)
            .field("database", &self.database)
            .field("redis_url", &self.redis_url.as_ref().map(|_| "[REDACTED]"))
            .finish()
    }
}

/// Database connection settings
#[derive(Clone)]
pub struct DatabaseSettings {
    pub url: String,
    pub max_connections: u32,
    pub acquire_timeout: u64,
}

impl fmt::Debug for DatabaseSettings {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DatabaseSettings")
            .field("url", &"[REDACTED]")
            .field("max_connections", &self.max_connections)
            .field("acquire_timeout", &self.acquire_timeout)
            .finish()
    }
}

impl DatabaseSettings {
    /// `None` when `DATABASE_URL` is unset
    fn from_env() -> Result<Option<Self>> {
        let Ok(url) = env::var("DATABASE_URL") else {
            return Ok(None);
        };

        Ok(Some(Self {
            url,
            max_connections: parse_env("DATABASE_MAX_CONNECTIONS", 20)?,
            acquire_timeout: parse_env("DATABASE_ACQUIRE_TIMEOUT", 5)?,
        }))
    }
}

/// `JWT_SECRET` is standard base64 of at least 32 raw bytes
fn load_jwt_secret() -> Result<Zeroizing<Vec<u8>>> {
    let encoded = Zeroizing::new(env::var("JWT_SECRET").context("JWT_SECRET must be set")?);
    let secret = Zeroizing::new(
        STANDARD
            .decode(encoded.trim())
            .context("JWT_SECRET must be valid base64")?,
    );

    match validate_secret_strength(&secret) {
        SecretStrength::TooShort => bail!(
            "JWT_SECRET decodes to {} bytes, at least {} required",
            secret.len(),
            MIN_SECRET_LENGTH
        ),
        SecretStrength::LowEntropy => {
            warn!("JWT_SECRET has low entropy - generate a random secret for production")
        }
        SecretStrength::Acceptable | SecretStrength::Strong => {}
    }

    Ok(secret)
}

fn load_lockout_policy() -> Result<LockoutPolicy> {
    let defaults = LockoutPolicy::default();
    let policy = LockoutPolicy {
        threshold: parse_env("LOCKOUT_THRESHOLD", defaults.threshold)?,
        window_secs: parse_env("LOCKOUT_WINDOW_SECS", defaults.window_secs)?,
        duration_secs: parse_env("LOCKOUT_DURATION_SECS", defaults.duration_secs)?,
    };

    if policy.threshold < 0 || policy.window_secs <= 0 || policy.duration_secs <= 0 {
        bail!("Lockout settings must be positive: {:?}", policy);
    }

    Ok(policy)
}

fn parse_env<T>(key: &str, default: T) -> Result<T>
where
    T: FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
{
    match env::var(key) {
        Ok(raw) => raw
            .trim()
            .parse()
            .with_context(|| format!("Invalid {}", key)),
        Err(_) => Ok(default),
    }
}
