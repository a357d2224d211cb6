//! # triroute-core
//!
//! The routing core behind an OpenAI-compatible gateway that classifies each
//! inbound chat-completion request into one of three upstream tiers —
//! `cheap`, `medium`, `frontier` — and translates between the canonical
//! OpenAI wire shape and four foreign vendor dialects.
//!
//! ```text
//! Request → fingerprint → cache lookup → (miss) classifier → tier → adapter → upstream
//! ```
//!
//! ## Modules
//!
//! - [`payload`] - canonical chat-completion request/response shape and text coercion
//! - [`fingerprint`] - stable hashing of the routing-relevant request subset
//! - [`cache`] - decision cache (in-process LRU+TTL, remote KV, no-op)
//! - [`classifier`] - classifier prompt construction, transport, retry policy
//! - [`providers`] - per-vendor dialect adapters plus provider resolution
//! - [`usage`] - process-wide per-route token usage aggregation
//! - [`config`] - environment + file-backed configuration loading
//!
//! Repository/issues at the crate `repository` URL.

#![warn(missing_docs)]

pub mod cache;
pub mod classifier;
pub mod config;
pub mod constants;
pub mod fingerprint;
pub mod payload;
pub mod providers;
pub mod usage;
mod sse;
mod util;

pub use cache::{
    CacheBackendKind, DecisionCache, DecisionCacheHandle, MemoryDecisionCache, NoopDecisionCache,
};
pub use classifier::{ClassifierClient, ClassifierError, ClassifierKind};
pub use config::{ClassifierConfig, Config, ConfigError, ProviderTag, UpstreamDescriptor};
pub use fingerprint::{build_classifier_input, coerce_content, extract_decision, hash_payload};
pub use payload::{ChatCompletionRequest, Decision, Route};
pub use providers::{
    Adapter, AdapterError, BufferedReply, ChunkStream, ProxyContext, StreamingReply, UsageSink,
    adapter_for, resolve_provider,
};
pub use usage::{RouteBucket, RouteKey, UsageAggregator, UsageSnapshot};
