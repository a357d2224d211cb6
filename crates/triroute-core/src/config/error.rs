//! Configuration error types.

use thiserror::Error;

/// Errors that can occur while loading and validating [`super::Config`].
#[derive(Debug, Error)]
pub enum ConfigError {
    /// Port value failed to parse as `u16`.
    #[error("failed to parse PORT '{value}': {source}")]
    PortParseError {
        /// Raw env value.
        value: String,
        #[source]
        source: std::num::ParseIntError,
    },

    /// `UPSTREAMS_FILE` was set but could not be read.
    #[error("failed to read upstreams file '{path}': {source}")]
    UpstreamsFileUnreadable {
        /// Path that was configured.
        path: String,
        #[source]
        source: std::io::Error,
    },

    /// `UPSTREAMS_FILE` or `UPSTREAMS_JSON` contained invalid JSON.
    #[error("failed to parse upstreams JSON: {0}")]
    UpstreamsJsonInvalid(#[source] serde_json::Error),

    /// `CLASSIFIER_LOGIT_BIAS` contained invalid JSON.
    #[error("failed to parse CLASSIFIER_LOGIT_BIAS: {0}")]
    LogitBiasInvalid(#[source] serde_json::Error),

    /// `CLASSIFIER_SYSTEM_PROMPT` spanned more than one line.
    #[error("CLASSIFIER_SYSTEM_PROMPT must be a single line")]
    SystemPromptMultiline,

    /// `frontier.baseUrl` was not set.
    #[error("frontier upstream requires a base URL")]
    MissingFrontierBaseUrl,

    /// The classifier is enabled but `cheap.baseUrl` or `medium.baseUrl` is unset.
    #[error("classifier is enabled but '{tier}' upstream requires a base URL")]
    MissingTierBaseUrl {
        /// `"cheap"` or `"medium"`.
        tier: &'static str,
    },

    /// An upstream was explicitly suppressed (`null`) while required.
    #[error("upstream '{tier}' cannot be null while the classifier is enabled")]
    TierSuppressedWhileRequired {
        /// `"cheap"` or `"medium"`.
        tier: &'static str,
    },
}
