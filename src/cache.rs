//! TTL cache for computed recommendation lists.
//!
//! Two implementations: an in-process [`MemoryCache`] over a concurrent map,
//! and a [`RedisCache`] for deployments that share results across instances.
//! Cache failures are never fatal — [`lookup`] and [`store`] log a warning and
//! let the caller recompute.

use crate::types::RecommendationScore;
use async_trait::async_trait;
use dashmap::DashMap;
use redis::aio::ConnectionManager;
use redis::AsyncCommands;
use std::time::{Duration, Instant};
use tracing::{debug, warn};
use uuid::Uuid;

/// Cache key: one entry per (namespace, user, limit) triple.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CacheKey {
    pub namespace: String,
    pub user_id: Uuid,
    pub limit: usize,
}

impl CacheKey {
    pub fn new(namespace: impl Into<String>, user_id: Uuid, limit: usize) -> Self {
        Self {
            namespace: namespace.into(),
            user_id,
            limit,
        }
    }

    /// Flat rendering used as the Redis key.
    pub fn render(&self) -> String {
        format!("{}:{}:{}", self.namespace, self.user_id, self.limit)
    }
}

#[async_trait]
pub trait RecommendationCache: Send + Sync {
    async fn get(&self, key: &CacheKey) -> anyhow::Result<Option<Vec<RecommendationScore>>>;

    async fn put(
        &self,
        key: CacheKey,
        value: Vec<RecommendationScore>,
        ttl: Duration,
    ) -> anyhow::Result<()>;

    /// Drop every cached list for one user, across namespaces and limits.
    /// Called when the user's visits or follows change.
    async fn invalidate_user(&self, user_id: Uuid) -> anyhow::Result<()>;
}

/// Fetch from the cache, degrading to a miss on backend failure.
pub async fn lookup(
    cache: &dyn RecommendationCache,
    key: &CacheKey,
) -> Option<Vec<RecommendationScore>> {
    match cache.get(key).await {
        Ok(Some(hit)) => {
            debug!(key = %key.render(), "cache hit");
            Some(hit)
        }
        Ok(None) => None,
        Err(e) => {
            warn!(key = %key.render(), error = %e, "cache read failed, recomputing");
            None
        }
    }
}

/// Write to the cache, logging instead of propagating backend failure.
pub async fn store(
    cache: &dyn RecommendationCache,
    key: CacheKey,
    value: &[RecommendationScore],
    ttl: Duration,
) {
    let rendered = key.render();
    if let Err(e) = cache.put(key, value.to_vec(), ttl).await {
        warn!(key = %rendered, error = %e, "cache write failed");
    }
}

struct MemoryEntry {
    value: Vec<RecommendationScore>,
    expires_at: Instant,
}

/// In-process cache keyed by the full [`CacheKey`]. Expiry is checked lazily
/// on read; [`MemoryCache::sweep_expired`] reclaims entries that are never
/// read again.
#[derive(Default)]
pub struct MemoryCache {
    entries: DashMap<CacheKey, MemoryEntry>,
}

impl MemoryCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Remove every expired entry. Embedders running long-lived processes
    /// should call this periodically; entry count is otherwise unbounded.
    pub fn sweep_expired(&self) {
        let now = Instant::now();
        self.entries.retain(|_, entry| entry.expires_at > now);
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

#[async_trait]
impl RecommendationCache for MemoryCache {
    async fn get(&self, key: &CacheKey) -> anyhow::Result<Option<Vec<RecommendationScore>>> {
        // The guard from `get` must be dropped before touching the map again.
        let expired = match self.entries.get(key) {
            Some(entry) if entry.expires_at > Instant::now() => {
                return Ok(Some(entry.value.clone()));
            }
            Some(_) => true,
            None => false,
        };
        if expired {
            self.entries.remove(key);
        }
        Ok(None)
    }

    async fn put(
        &self,
        key: CacheKey,
        value: Vec<RecommendationScore>,
        ttl: Duration,
    ) -> anyhow::Result<()> {
        self.entries.insert(
            key,
            MemoryEntry {
                value,
                expires_at: Instant::now() + ttl,
            },
        );
        Ok(())
    }

    async fn invalidate_user(&self, user_id: Uuid) -> anyhow::Result<()> {
        self.entries.retain(|key, _| key.user_id != user_id);
        Ok(())
    }
}

/// Redis-backed cache; values are serialized as JSON and expired server-side
/// via `SET EX`.
pub struct RedisCache {
    conn: ConnectionManager,
}

impl RedisCache {
    pub async fn connect(url: &str) -> anyhow::Result<Self> {
        let client = redis::Client::open(url)?;
        let conn = ConnectionManager::new(client).await?;
        Ok(Self { conn })
    }

    pub fn from_manager(conn: ConnectionManager) -> Self {
        Self { conn }
    }
}

#[async_trait]
impl RecommendationCache for RedisCache {
    async fn get(&self, key: &CacheKey) -> anyhow::Result<Option<Vec<RecommendationScore>>> {
        let mut conn = self.conn.clone();
        let raw: Option<String> = conn.get(key.render()).await?;
        match raw {
            Some(json) => Ok(Some(serde_json::from_str(&json)?)),
            None => Ok(None),
        }
    }

    async fn put(
        &self,
        key: CacheKey,
        value: Vec<RecommendationScore>,
        ttl: Duration,
    ) -> anyhow::Result<()> {
        let mut conn = self.conn.clone();
        let json = serde_json::to_string(&value)?;
        let _: () = conn.set_ex(key.render(), json, ttl.as_secs()).await?;
        Ok(())
    }

    async fn invalidate_user(&self, user_id: Uuid) -> anyhow::Result<()> {
        // SCAN walks the keyspace incrementally; KEYS would block the server.
        let mut scan_conn = self.conn.clone();
        let mut keys: Vec<String> = Vec::new();
        {
            let mut iter: redis::AsyncIter<'_, String> =
                scan_conn.scan_match(user_pattern(user_id)).await?;
            while let Some(key) = iter.next_item().await {
                keys.push(key);
            }
        }
        if !keys.is_empty() {
            let mut conn = self.conn.clone();
            let _: () = conn.del(keys).await?;
        }
        Ok(())
    }
}

/// Match pattern covering one user's entries across every namespace and limit.
fn user_pattern(user_id: Uuid) -> String {
    format!("*:{user_id}:*")
}
