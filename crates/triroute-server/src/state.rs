//! Shared, read-only-after-startup handler state.

use std::sync::Arc;

use triroute::{ClassifierClient, Config, DecisionCacheHandle, UsageAggregator};

/// Cloneable handle to every piece of state a request handler needs.
///
/// Config and the cache handle are created once at startup; the usage
/// aggregator is the one piece of process-wide mutable state handlers touch.
#[derive(Clone)]
pub struct AppState {
    /// Frozen routing configuration.
    pub config: Arc<Config>,
    /// Classifier client, `None` when the classifier is disabled.
    pub classifier: Option<Arc<ClassifierClient>>,
    /// Decision cache handle (no-op, in-process, or remote).
    pub cache: DecisionCacheHandle,
    /// Process-wide usage counters.
    pub usage: Arc<UsageAggregator>,
    /// Shared, connection-pooled HTTP client for outbound provider calls.
    pub http: reqwest::Client,
}

impl AppState {
    /// Builds handler state from a loaded, validated [`Config`].
    pub fn new(config: Config, cache: DecisionCacheHandle) -> Self {
        let classifier = config
            .classifier
            .enabled
            .then(|| Arc::new(ClassifierClient::new(config.classifier.clone())));

        Self {
            config: Arc::new(config),
            classifier,
            cache,
            usage: Arc::new(UsageAggregator::new()),
            http: reqwest::Client::new(),
        }
    }
}
