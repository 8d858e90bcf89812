//! Test utilities for the Redis-backed revocation store
//!
//! Tests that need Redis call [`get_test_redis_connection`] and skip when it
//! fails, so the suite still passes on machines without a server.

use anyhow::{Context, Result};
use redis::aio::ConnectionManager;
use redis::Client;
use std::env;

/// Uses REDIS_TEST_URL or defaults to localhost
pub async fn get_test_redis_connection() -> Result<ConnectionManager> {
    let redis_url =
        env::var("REDIS_TEST_URL").unwrap_or_else(|_| "redis://127.0.0.1:6379".to_string());

    let client = Client::open(redis_url).context("Failed to create Redis client")?;

    let connect = ConnectionManager::new(client);
    let manager = tokio::time::timeout(std::time::Duration::from_secs(2), connect)
        .await
        .context("Timed out connecting to Redis")?
        .context("Failed to connect to Redis")?;

    Ok(manager)
}
