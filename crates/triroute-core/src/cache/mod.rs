//! Decision cache: three interchangeable backends behind one narrow
//! capability — `get(key) -> Option<String>` / `set(key, value)` — so the
//! routing handler never branches on which backend is active.
//!
//! Collapsed to the single `get`/`set` contract the routing layer actually
//! needs: the cache is advisory, a miss simply triggers reclassification,
//! and no cross-instance coordination is required beyond read-your-writes
//! within one backend.

mod memory;
mod noop;
mod redis_backend;

#[cfg(test)]
mod tests;

pub use memory::MemoryDecisionCache;
pub use noop::NoopDecisionCache;
pub use redis_backend::RedisDecisionCache;

use std::sync::Arc;

use async_trait::async_trait;
use thiserror::Error;

use crate::config::CacheConfig;

/// Errors surfaced by cache construction. Runtime `get`/`set` errors never
/// propagate — they are logged and treated as a miss/no-op instead.
#[derive(Debug, Error)]
pub enum CacheError {
    /// The remote KV backend could not be reached at construction time.
    #[error("remote cache connection failed: {0}")]
    ConnectionFailed(String),
}

/// The narrow capability every decision-cache backend satisfies.
#[async_trait]
pub trait DecisionCache: Send + Sync {
    /// Looks up `key`, returning the cached decision digit string if present
    /// and not expired.
    async fn get(&self, key: &str) -> Option<String>;

    /// Stores `value` under `key`.
    async fn set(&self, key: &str, value: &str);
}

/// Which concrete backend a [`DecisionCacheHandle`] actually ended up using.
///
/// Distinct from `CacheConfig` because a configured `Redis` backend can fall
/// back to `Memory` at construction time if the connection fails — this is
/// the value that should be reported back to an operator, not the config.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CacheBackendKind {
    /// The cache is disabled; every lookup misses and every store is a no-op.
    Disabled,
    /// In-process `moka` LRU+TTL cache.
    Memory,
    /// Remote KV backend reachable at construction time.
    Redis,
}

impl CacheBackendKind {
    /// A short lowercase name suitable for status endpoints.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Disabled => "disabled",
            Self::Memory => "memory",
            Self::Redis => "redis",
        }
    }
}

impl std::fmt::Display for CacheBackendKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A shared, cloneable handle to whichever [`DecisionCache`] backend was
/// selected, so callers never need to know which concrete type is behind it.
#[derive(Clone)]
pub struct DecisionCacheHandle {
    inner: Arc<dyn DecisionCache>,
    backend: CacheBackendKind,
}

impl DecisionCacheHandle {
    /// Wraps any concrete backend in a shared handle.
    pub fn new(inner: Arc<dyn DecisionCache>, backend: CacheBackendKind) -> Self {
        Self { inner, backend }
    }

    /// Selects a backend from [`CacheConfig`]: no-op when disabled, remote KV
    /// when a URL is configured (falling back to in-process on connection
    /// failure, with a warning logged), in-process otherwise.
    pub async fn from_config(config: &CacheConfig) -> Self {
        if !config.enabled {
            return Self::new(Arc::new(NoopDecisionCache), CacheBackendKind::Disabled);
        }

        if let Some(url) = &config.redis_url {
            match RedisDecisionCache::connect(url, config.ttl_ms).await {
                Ok(backend) => return Self::new(Arc::new(backend), CacheBackendKind::Redis),
                Err(e) => {
                    tracing::warn!(
                        error = %e,
                        "remote decision cache unreachable, falling back to in-process"
                    );
                }
            }
        }

        Self::new(
            Arc::new(MemoryDecisionCache::new(config.max_entries, config.ttl_ms)),
            CacheBackendKind::Memory,
        )
    }

    /// Looks up `key`.
    pub async fn get(&self, key: &str) -> Option<String> {
        self.inner.get(key).await
    }

    /// Stores `value` under `key`.
    pub async fn set(&self, key: &str, value: &str) {
        self.inner.set(key, value).await;
    }

    /// Which concrete backend is actually active, including any
    /// fallback-to-memory that happened at construction time.
    pub fn backend(&self) -> CacheBackendKind {
        self.backend
    }
}

impl std::fmt::Debug for DecisionCacheHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DecisionCacheHandle")
            .field("backend", &self.backend)
            .finish_non_exhaustive()
    }
}
