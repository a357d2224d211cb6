//! Shared default values referenced by more than one module.

/// Default header carrying the routing decision digit ("0" | "1" | "2").
pub const DEFAULT_DECISION_HEADER: &str = "x-openrouter-decision";

/// Default header carrying the upstream name that served the request.
pub const DEFAULT_UPSTREAM_HEADER: &str = "x-openrouter-upstream";

/// Default Anthropic API version sent as the `anthropic-version` header.
pub const DEFAULT_ANTHROPIC_VERSION: &str = "2023-06-01";

/// Default Azure OpenAI API version query parameter.
pub const DEFAULT_AZURE_API_VERSION: &str = "2024-10-21";

/// Default `max_tokens` sent to Anthropic when the inbound request omits one.
pub const DEFAULT_ANTHROPIC_MAX_TOKENS: u32 = 1024;

/// Default classifier char cap before truncation.
pub const DEFAULT_CLASSIFIER_MAX_CHARS: usize = 8000;

/// Default classifier `max_tokens`.
pub const DEFAULT_CLASSIFIER_MAX_TOKENS: u32 = 1;

/// Default classifier temperature.
pub const DEFAULT_CLASSIFIER_TEMPERATURE: f64 = 0.0;

/// Default classifier timeout, milliseconds.
pub const DEFAULT_CLASSIFIER_TIMEOUT_MS: u64 = 800;

/// Floor applied to a doubled classifier retry timeout.
pub const MIN_CLASSIFIER_RETRY_TIMEOUT_MS: u64 = 8_000;

/// Floor applied to the warmup call's timeout.
pub const MIN_WARMUP_TIMEOUT_MS: u64 = 10_000;

/// Default loading-retry delay, milliseconds.
pub const DEFAULT_LOADING_RETRY_MS: u64 = 1_200;

/// Default cap on loading-retry attempts.
pub const DEFAULT_LOADING_MAX_RETRIES: u32 = 2;

/// Default in-process cache entry TTL, milliseconds (1 hour).
pub const DEFAULT_CACHE_TTL_MS: u64 = 60 * 60 * 1000;

/// Default in-process cache capacity.
pub const DEFAULT_CACHE_MAX: u64 = 50_000;

/// Hard ceiling on in-process cache capacity.
pub const MAX_CACHE_CAPACITY: u64 = 50_000;

/// Default upstream timeouts, milliseconds, per tier.
pub const DEFAULT_CHEAP_TIMEOUT_MS: u64 = 30_000;
/// See [`DEFAULT_CHEAP_TIMEOUT_MS`].
pub const DEFAULT_MEDIUM_TIMEOUT_MS: u64 = 45_000;
/// See [`DEFAULT_CHEAP_TIMEOUT_MS`].
pub const DEFAULT_FRONTIER_TIMEOUT_MS: u64 = 60_000;
