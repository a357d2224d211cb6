//! No-op backend selected when caching is disabled; both operations are
//! inert, one stub type per backend trait.

use async_trait::async_trait;

use super::DecisionCache;

/// A decision cache that never stores anything and never returns a hit.
pub struct NoopDecisionCache;

#[async_trait]
impl DecisionCache for NoopDecisionCache {
    async fn get(&self, _key: &str) -> Option<String> {
        None
    }

    async fn set(&self, _key: &str, _value: &str) {}
}
