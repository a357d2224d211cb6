//! Remote KV decision-cache backend, used when `REDIS_URL` is configured.
//!
//! Serialization is redundant here — values are already a single ASCII
//! digit — so this is a thin wrapper over `redis::aio::ConnectionManager`.
//! Runtime `get`/`set` errors are logged and swallowed rather than
//! propagated — a cache miss is always a safe fallback, a cache outage
//! should never be.

use async_trait::async_trait;
use redis::AsyncCommands;
use redis::aio::ConnectionManager;

use super::{CacheError, DecisionCache};

/// Remote KV-backed decision cache.
pub struct RedisDecisionCache {
    manager: ConnectionManager,
    ttl_secs: u64,
}

impl RedisDecisionCache {
    /// Connects to `url` and floors `ttl_ms` to whole seconds, clamped to at
    /// least 1.
    pub async fn connect(url: &str, ttl_ms: u64) -> Result<Self, CacheError> {
        let client =
            redis::Client::open(url).map_err(|e| CacheError::ConnectionFailed(e.to_string()))?;
        let manager = client
            .get_connection_manager()
            .await
            .map_err(|e| CacheError::ConnectionFailed(e.to_string()))?;

        Ok(Self {
            manager,
            ttl_secs: ttl_secs_from_ms(ttl_ms),
        })
    }
}

fn ttl_secs_from_ms(ttl_ms: u64) -> u64 {
    (ttl_ms / 1000).max(1)
}

#[async_trait]
impl DecisionCache for RedisDecisionCache {
    async fn get(&self, key: &str) -> Option<String> {
        let mut conn = self.manager.clone();
        match conn.get::<_, Option<String>>(key).await {
            Ok(value) => value,
            Err(e) => {
                tracing::warn!(error = %e, "decision cache remote get failed");
                None
            }
        }
    }

    async fn set(&self, key: &str, value: &str) {
        let mut conn = self.manager.clone();
        if let Err(e) = conn
            .set_ex::<_, _, ()>(key, value, self.ttl_secs)
            .await
        {
            tracing::warn!(error = %e, "decision cache remote set failed");
        }
    }
}
