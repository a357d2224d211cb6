//! In-process fixed-capacity LRU with a per-entry TTL, wrapping
//! `moka::sync::Cache` behind the [`DecisionCache`] contract, keyed by the
//! fingerprint hex string.

use std::time::Duration;

use async_trait::async_trait;
use moka::sync::Cache;

use super::DecisionCache;

/// In-process decision cache: bounded capacity, per-entry TTL.
pub struct MemoryDecisionCache {
    entries: Cache<String, String>,
}

impl MemoryDecisionCache {
    /// Builds a cache with the given `capacity` (entries) and `ttl_ms`.
    pub fn new(capacity: u64, ttl_ms: u64) -> Self {
        Self {
            entries: Cache::builder()
                .max_capacity(capacity)
                .time_to_live(Duration::from_millis(ttl_ms))
                .build(),
        }
    }

    /// Current entry count, mostly useful for tests.
    pub fn len(&self) -> u64 {
        self.entries.entry_count()
    }

    /// `true` if empty.
    pub fn is_empty(&self) -> bool {
        self.entries.entry_count() == 0
    }
}

#[async_trait]
impl DecisionCache for MemoryDecisionCache {
    async fn get(&self, key: &str) -> Option<String> {
        self.entries.get(key)
    }

    async fn set(&self, key: &str, value: &str) {
        self.entries.insert(key.to_string(), value.to_string());
    }
}
