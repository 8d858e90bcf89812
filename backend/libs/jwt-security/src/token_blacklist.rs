//! Revoked token registry
//!
//! A revoked token identifier stays registered until the token's own expiry,
//! after which the token is rejected by the codec anyway and the record may
//! be pruned.

use crate::error::Result;
use async_trait::async_trait;
use chrono::Utc;
use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use redis::aio::ConnectionManager;
use redis::AsyncCommands;
use tracing::{debug, info};
use uuid::Uuid;

/// A single revoked token identifier
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RevocationRecord {
    pub token_id: String,
    pub user_id: Uuid,
    /// Unix seconds, the revoked token's `exp`
    pub expires_at: i64,
}

impl RevocationRecord {
    fn is_live_at(&self, now: i64) -> bool {
        now <= self.expires_at
    }
}

/// Durable set of revoked token identifiers, shared by every validator.
///
/// Implementations must be safe for concurrent use. Storage failures are
/// reported as `TokenError::StorageUnavailable` and never as "not revoked".
#[async_trait]
pub trait RevocationStore: Send + Sync {
    /// Register a token identifier as revoked.
    ///
    /// Returns `true` when this call created the record and `false` when a
    /// live record already existed. Revoking twice is not an error.
    async fn revoke(&self, record: &RevocationRecord) -> Result<bool>;

    /// Whether a live record exists for `token_id`.
    async fn is_revoked(&self, token_id: &str) -> Result<bool>;

    /// Drop records whose expiry has passed. Returns the number removed.
    async fn purge_expired(&self) -> Result<u64>;
}

/// In-process store for tests and single-node deployments
#[derive(Debug, Default)]
pub struct MemoryRevocationStore {
    entries: DashMap<String, RevocationRecord>,
}

impl MemoryRevocationStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

#[async_trait]
impl RevocationStore for MemoryRevocationStore {
    async fn revoke(&self, record: &RevocationRecord) -> Result<bool> {
        let now = Utc::now().timestamp();
        if !record.is_live_at(now) {
            return Ok(true);
        }

        let created = match self.entries.entry(record.token_id.clone()) {
            Entry::Occupied(mut existing) => {
                if existing.get().is_live_at(now) {
                    false
                } else {
                    existing.insert(record.clone());
                    true
                }
            }
            Entry::Vacant(slot) => {
                slot.insert(record.clone());
                true
            }
        };

        debug!(jti = %record.token_id, created, "Token revoked");
        Ok(created)
    }

    async fn is_revoked(&self, token_id: &str) -> Result<bool> {
        let now = Utc::now().timestamp();
        self.entries
            .remove_if(token_id, |_, record| !record.is_live_at(now));
        Ok(self.entries.contains_key(token_id))
    }

    async fn purge_expired(&self) -> Result<u64> {
        let now = Utc::now().timestamp();
        let before = self.entries.len();
        self.entries.retain(|_, record| record.is_live_at(now));
        Ok(before.saturating_sub(self.entries.len()) as u64)
    }
}

/// Redis-backed store. Keys expire with the token, so nothing needs purging.
///
/// **Key format**: `token:blacklist:{jti}`, value is the owning user ID
#[derive(Clone)]
pub struct RedisRevocationStore {
    redis: ConnectionManager,
}

impl RedisRevocationStore {
    pub fn new(redis: ConnectionManager) -> Self {
        Self { redis }
    }

    fn key(token_id: &str) -> String {
        format!("token:blacklist:{}", token_id)
    }
}

#[async_trait]
impl RevocationStore for RedisRevocationStore {
    async fn revoke(&self, record: &RevocationRecord) -> Result<bool> {
        // Inclusive expiry: the record must outlive the final valid second.
        let ttl = record.expires_at - Utc::now().timestamp() + 1;
        if ttl <= 0 {
            return Ok(true);
        }

        let mut conn = self.redis.clone();
        let reply: Option<String> = redis::cmd("SET")
            .arg(Self::key(&record.token_id))
            .arg(record.user_id.to_string())
            .arg("NX")
            .arg("EX")
            .arg(ttl)
            .query_async(&mut conn)
            .await?;

        let created = reply.is_some();
        info!(jti = %record.token_id, ttl, created, "Token added to blacklist");
        Ok(created)
    }

    async fn is_revoked(&self, token_id: &str) -> Result<bool> {
        let mut conn = self.redis.clone();
        let exists: bool = conn.exists(Self::key(token_id)).await?;
        Ok(exists)
    }

    async fn purge_expired(&self) -> Result<u64> {
        Ok(0)
    }
}
