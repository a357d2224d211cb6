//! Environment- and file-backed configuration loading.
//!
//! [`Config::from_env`] merges `std::env` with an optional `upstreams.json`
//! overlay (`UPSTREAMS_FILE` or the inline `UPSTREAMS_JSON`) into a single
//! frozen [`Config`]; [`Config::validate`] then enforces the required-field
//! invariants every deployment must satisfy.

pub mod error;

#[cfg(test)]
mod tests;

pub use error::ConfigError;

use std::collections::HashMap;
use std::env;

use crate::fingerprint::ClassifierStrategy;
use crate::util::normalize_base_url;

/// A vendor tag naming which adapter should handle an upstream.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ProviderTag {
    /// Generic OpenAI-compatible dialect (also covers the named aliases below).
    OpenAiCompatible,
    /// <https://openrouter.ai>
    OpenRouter,
    /// <https://api.openai.com>
    OpenAi,
    /// <https://api.mistral.ai>
    Mistral,
    /// <https://api.groq.com>
    Groq,
    /// <https://api.together.xyz>
    Together,
    /// <https://api.perplexity.ai>
    Perplexity,
    /// Anthropic messages API.
    Anthropic,
    /// Google Gemini `generateContent` API.
    Gemini,
    /// Cohere chat v2 API.
    Cohere,
    /// Azure OpenAI deployment routing.
    AzureOpenAi,
    /// Infer the provider from base URL host or API key prefix.
    Auto,
}

impl ProviderTag {
    /// Parses the literal config value; unknown/empty values are not handled
    /// here — callers that need the `auto`-fallback behavior should treat a
    /// parse failure or an explicit [`ProviderTag::Auto`] as "infer me".
    pub fn parse(raw: &str) -> Option<Self> {
        Some(match raw {
            "openai_compatible" => Self::OpenAiCompatible,
            "openrouter" => Self::OpenRouter,
            "openai" => Self::OpenAi,
            "mistral" => Self::Mistral,
            "groq" => Self::Groq,
            "together" => Self::Together,
            "perplexity" => Self::Perplexity,
            "anthropic" => Self::Anthropic,
            "gemini" => Self::Gemini,
            "cohere" => Self::Cohere,
            "azure_openai" => Self::AzureOpenAi,
            "auto" | "" => Self::Auto,
            _ => return None,
        })
    }

    /// `true` for every alias that shares the passthrough adapter.
    pub fn is_openai_family(self) -> bool {
        matches!(
            self,
            Self::OpenAiCompatible
                | Self::OpenRouter
                | Self::OpenAi
                | Self::Mistral
                | Self::Groq
                | Self::Together
                | Self::Perplexity
        )
    }
}

/// One configured upstream tier (cheap, medium, or frontier).
#[derive(Debug, Clone, Default)]
pub struct UpstreamDescriptor {
    /// Human-readable name, echoed in the `x-openrouter-upstream` header.
    pub name: String,
    /// Vendor tag; `None` means "infer" (equivalent to `ProviderTag::Auto`).
    pub provider: Option<ProviderTag>,
    /// Base URL of the upstream endpoint.
    pub base_url: Option<String>,
    /// API key, if the upstream requires one.
    pub api_key: Option<String>,
    /// Overrides the inbound `model` field when set.
    pub model: Option<String>,
    /// Azure deployment name.
    pub deployment: Option<String>,
    /// Azure API version.
    pub api_version: Option<String>,
    /// Extra headers sent on every outbound request to this upstream.
    pub extra_headers: HashMap<String, String>,
    /// Per-request timeout.
    pub timeout_ms: u64,
}

impl UpstreamDescriptor {
    /// The base URL with trailing slashes stripped, for stable comparisons.
    pub fn normalized_base_url(&self) -> Option<String> {
        self.base_url.as_deref().map(normalize_base_url)
    }
}

/// Classifier client configuration.
#[derive(Debug, Clone)]
pub struct ClassifierConfig {
    /// Whether the classifier pipeline is active at all.
    pub enabled: bool,
    /// Base URL of the classifier's OpenAI-compatible endpoint.
    pub base_url: String,
    /// API key, if required.
    pub api_key: Option<String>,
    /// Model id passed in the classification request.
    pub model: String,
    /// System prompt (must be single-line).
    pub system_prompt: String,
    /// Input-construction strategy.
    pub strategy: ClassifierStrategy,
    /// Char cap applied to the constructed input.
    pub max_chars: usize,
    /// `max_tokens` sent to the classifier.
    pub max_tokens: u32,
    /// Sampling temperature sent to the classifier.
    pub temperature: f64,
    /// Per-attempt timeout, milliseconds.
    pub timeout_ms: u64,
    /// Optional logit bias map.
    pub logit_bias: Option<serde_json::Value>,
    /// Attempt streaming first (`true`, the default) or buffered first.
    pub force_stream: bool,
    /// Issue a synthetic warmup call after startup.
    pub warmup: bool,
    /// Delay before the warmup call, milliseconds.
    pub warmup_delay_ms: u64,
    /// Interval between keep-alive calls after warmup, milliseconds (`0` disables).
    pub keep_alive_ms: u64,
    /// Delay between model-loading retries, milliseconds.
    pub loading_retry_ms: u64,
    /// Cap on model-loading retry attempts.
    pub loading_max_retries: u32,
}

impl ClassifierConfig {
    /// The base URL with trailing slashes stripped.
    pub fn normalized_base_url(&self) -> String {
        normalize_base_url(&self.base_url)
    }
}

/// Decision-cache configuration.
#[derive(Debug, Clone)]
pub struct CacheConfig {
    /// Whether caching is enabled at all.
    pub enabled: bool,
    /// Remote KV URL (e.g. a `redis://` URL); selects the remote backend.
    pub redis_url: Option<String>,
    /// Entry TTL, milliseconds.
    pub ttl_ms: u64,
    /// In-process backend capacity.
    pub max_entries: u64,
}

/// The fully merged, validated, immutable routing configuration.
#[derive(Debug, Clone)]
pub struct Config {
    /// Listen port.
    pub port: u16,
    /// Listen address.
    pub host: String,
    /// Max inbound body size, bytes.
    pub body_limit: usize,
    /// Bearer token required on every request, if set.
    pub router_api_key: Option<String>,
    /// Header name carrying the decision digit.
    pub decision_header: String,
    /// Header name carrying the upstream name.
    pub upstream_header: String,
    /// Classifier configuration.
    pub classifier: ClassifierConfig,
    /// Decision-cache configuration.
    pub cache: CacheConfig,
    /// Cheap-tier upstream, `None` when suppressed.
    pub cheap: Option<UpstreamDescriptor>,
    /// Medium-tier upstream, `None` when suppressed.
    pub medium: Option<UpstreamDescriptor>,
    /// Frontier-tier upstream; always present after [`Config::validate`].
    pub frontier: Option<UpstreamDescriptor>,
    /// Default Anthropic API version for the Anthropic adapter.
    pub anthropic_version: String,
    /// Default Anthropic `max_tokens` when the inbound request omits one.
    pub anthropic_max_tokens: u32,
    /// Default Azure API version for the Azure adapter.
    pub azure_api_version: String,
}

impl Config {
    /// Loads configuration from the environment, merging an optional
    /// `upstreams.json` (`UPSTREAMS_FILE` path or inline `UPSTREAMS_JSON`).
    pub fn from_env() -> Result<Self, ConfigError> {
        let port = match env::var("PORT") {
            Ok(v) => v
                .parse::<u16>()
                .map_err(|source| ConfigError::PortParseError { value: v, source })?,
            Err(_) => 8080,
        };
        let host = env::var("HOST").unwrap_or_else(|_| "0.0.0.0".to_string());
        let body_limit = env::var("BODY_LIMIT")
            .ok()
            .and_then(|v| v.parse().ok())
            .unwrap_or(10 * 1024 * 1024);
        let router_api_key = non_empty_env("ROUTER_API_KEY");
        let decision_header = env::var("DECISION_HEADER")
            .unwrap_or_else(|_| crate::constants::DEFAULT_DECISION_HEADER.to_string());
        let upstream_header = env::var("UPSTREAM_HEADER")
            .unwrap_or_else(|_| crate::constants::DEFAULT_UPSTREAM_HEADER.to_string());

        let classifier = Self::classifier_from_env()?;
        let cache = Self::cache_from_env();

        let mut cheap = Self::tier_from_env("CHEAP", crate::constants::DEFAULT_CHEAP_TIMEOUT_MS);
        let mut medium = Self::tier_from_env("MEDIUM", crate::constants::DEFAULT_MEDIUM_TIMEOUT_MS);
        let mut frontier =
            Self::tier_from_env("FRONTIER", crate::constants::DEFAULT_FRONTIER_TIMEOUT_MS);

        if let Some(overlay) = Self::upstreams_overlay()? {
            apply_overlay(&mut cheap, overlay.cheap);
            apply_overlay(&mut medium, overlay.medium);
            apply_overlay(&mut frontier, overlay.frontier);
        }

        // Co-locate cheap with the classifier: if they share a normalized base
        // URL, force cheap's model to the classifier's model so a single local
        // engine isn't thrashed between two sets of weights.
        if let Some(cheap) = cheap.as_mut()
            && cheap.normalized_base_url() == Some(classifier.normalized_base_url())
        {
            cheap.model = Some(classifier.model.clone());
        }

        Ok(Self {
            port,
            host,
            body_limit,
            router_api_key,
            decision_header,
            upstream_header,
            classifier,
            cache,
            cheap,
            medium,
            frontier,
            anthropic_version: env::var("ANTHROPIC_VERSION")
                .unwrap_or_else(|_| crate::constants::DEFAULT_ANTHROPIC_VERSION.to_string()),
            anthropic_max_tokens: env::var("ANTHROPIC_MAX_TOKENS")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(crate::constants::DEFAULT_ANTHROPIC_MAX_TOKENS),
            azure_api_version: env::var("AZURE_API_VERSION")
                .unwrap_or_else(|_| crate::constants::DEFAULT_AZURE_API_VERSION.to_string()),
        })
    }

    /// Enforces the required-field invariants: `frontier.baseUrl`
    /// must be set; if the classifier is enabled, `cheap.baseUrl` and
    /// `medium.baseUrl` must also be set (an explicit `null` tier is only
    /// permitted for cheap/medium when the classifier is disabled).
    pub fn validate(&self) -> Result<(), ConfigError> {
        let frontier_ok = self
            .frontier
            .as_ref()
            .is_some_and(|u| u.base_url.is_some());
        if !frontier_ok {
            return Err(ConfigError::MissingFrontierBaseUrl);
        }

        if self.classifier.enabled {
            match &self.cheap {
                Some(u) if u.base_url.is_some() => {}
                Some(_) => return Err(ConfigError::MissingTierBaseUrl { tier: "cheap" }),
                None => return Err(ConfigError::TierSuppressedWhileRequired { tier: "cheap" }),
            }
            match &self.medium {
                Some(u) if u.base_url.is_some() => {}
                Some(_) => return Err(ConfigError::MissingTierBaseUrl { tier: "medium" }),
                None => return Err(ConfigError::TierSuppressedWhileRequired { tier: "medium" }),
            }
        }

        Ok(())
    }

    /// `"{host}:{port}"` socket address string.
    pub fn socket_addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    fn classifier_from_env() -> Result<ClassifierConfig, ConfigError> {
        let enabled = env::var("CLASSIFIER_ENABLED")
            .map(|v| v == "true" || v == "1")
            .unwrap_or(false);
        let base_url =
            env::var("CLASSIFIER_BASE_URL").unwrap_or_else(|_| "http://localhost:8000".to_string());
        let api_key = non_empty_env("CLASSIFIER_API_KEY");
        let model = env::var("CLASSIFIER_MODEL").unwrap_or_else(|_| "classifier".to_string());
        let system_prompt = env::var("CLASSIFIER_SYSTEM_PROMPT").unwrap_or_else(|_| {
            "Classify the task complexity as 0 (cheap), 1 (medium), or 2 (frontier).".to_string()
        });
        if system_prompt.contains('\n') {
            return Err(ConfigError::SystemPromptMultiline);
        }
        let strategy = env::var("CLASSIFIER_STRATEGY")
            .ok()
            .and_then(|v| v.parse().ok())
            .unwrap_or(ClassifierStrategy::LastUser);
        let max_chars = env::var("CLASSIFIER_MAX_CHARS")
            .ok()
            .and_then(|v| v.parse().ok())
            .unwrap_or(crate::constants::DEFAULT_CLASSIFIER_MAX_CHARS);
        let max_tokens = env::var("CLASSIFIER_MAX_TOKENS")
            .ok()
            .and_then(|v| v.parse().ok())
            .unwrap_or(crate::constants::DEFAULT_CLASSIFIER_MAX_TOKENS);
        let temperature = env::var("CLASSIFIER_TEMPERATURE")
            .ok()
            .and_then(|v| v.parse().ok())
            .unwrap_or(crate::constants::DEFAULT_CLASSIFIER_TEMPERATURE);
        let timeout_ms = env::var("CLASSIFIER_TIMEOUT_MS")
            .ok()
            .and_then(|v| v.parse().ok())
            .unwrap_or(crate::constants::DEFAULT_CLASSIFIER_TIMEOUT_MS);
        let logit_bias = match env::var("CLASSIFIER_LOGIT_BIAS") {
            Ok(raw) if !raw.trim().is_empty() => {
                Some(serde_json::from_str(&raw).map_err(ConfigError::LogitBiasInvalid)?)
            }
            _ => None,
        };
        let force_stream = env::var("CLASSIFIER_FORCE_STREAM")
            .map(|v| v != "false" && v != "0")
            .unwrap_or(true);
        let warmup = env::var("CLASSIFIER_WARMUP")
            .map(|v| v == "true" || v == "1")
            .unwrap_or(false);
        let warmup_delay_ms = env::var("CLASSIFIER_WARMUP_DELAY_MS")
            .ok()
            .and_then(|v| v.parse().ok())
            .unwrap_or(0);
        let keep_alive_ms = env::var("CLASSIFIER_KEEP_ALIVE_MS")
            .ok()
            .and_then(|v| v.parse().ok())
            .unwrap_or(0);
        let loading_retry_ms = env::var("CLASSIFIER_LOADING_RETRY_MS")
            .ok()
            .and_then(|v| v.parse().ok())
            .unwrap_or(crate::constants::DEFAULT_LOADING_RETRY_MS);
        let loading_max_retries = env::var("CLASSIFIER_LOADING_MAX_RETRIES")
            .ok()
            .and_then(|v| v.parse().ok())
            .unwrap_or(crate::constants::DEFAULT_LOADING_MAX_RETRIES);

        Ok(ClassifierConfig {
            enabled,
            base_url,
            api_key,
            model,
            system_prompt,
            strategy,
            max_chars,
            max_tokens,
            temperature,
            timeout_ms,
            logit_bias,
            force_stream,
            warmup,
            warmup_delay_ms,
            keep_alive_ms,
            loading_retry_ms,
            loading_max_retries,
        })
    }

    fn cache_from_env() -> CacheConfig {
        let redis_url = non_empty_env("REDIS_URL");
        let enabled = env::var("CACHE_ENABLED")
            .map(|v| v != "false" && v != "0")
            .unwrap_or(true);
        let ttl_ms = env::var("CACHE_TTL_MS")
            .ok()
            .and_then(|v| v.parse().ok())
            .unwrap_or(crate::constants::DEFAULT_CACHE_TTL_MS);
        let max_entries = env::var("CACHE_MAX")
            .ok()
            .and_then(|v| v.parse().ok())
            .unwrap_or(crate::constants::DEFAULT_CACHE_MAX)
            .min(crate::constants::MAX_CACHE_CAPACITY);
        CacheConfig {
            enabled,
            redis_url,
            ttl_ms,
            max_entries,
        }
    }

    fn tier_from_env(prefix: &str, default_timeout_ms: u64) -> Option<UpstreamDescriptor> {
        let base_url = non_empty_env(&format!("{prefix}_BASE_URL"));
        let name = env::var(format!("{prefix}_NAME")).unwrap_or_else(|_| prefix.to_lowercase());
        let provider = non_empty_env(&format!("{prefix}_PROVIDER")).and_then(|p| ProviderTag::parse(&p));
        let api_key = non_empty_env(&format!("{prefix}_API_KEY"));
        let model = non_empty_env(&format!("{prefix}_MODEL"));
        let deployment = non_empty_env(&format!("{prefix}_DEPLOYMENT"));
        let api_version = non_empty_env(&format!("{prefix}_API_VERSION"));
        let extra_headers = non_empty_env(&format!("{prefix}_HEADERS"))
            .and_then(|raw| serde_json::from_str::<HashMap<String, String>>(&raw).ok())
            .unwrap_or_default();
        let timeout_ms = env::var(format!("{prefix}_TIMEOUT_MS"))
            .ok()
            .and_then(|v| v.parse().ok())
            .unwrap_or(default_timeout_ms);

        Some(UpstreamDescriptor {
            name,
            provider,
            base_url,
            api_key,
            model,
            deployment,
            api_version,
            extra_headers,
            timeout_ms,
        })
    }

    fn upstreams_overlay() -> Result<Option<UpstreamsOverlay>, ConfigError> {
        if let Some(path) = non_empty_env("UPSTREAMS_FILE") {
            let raw =
                std::fs::read_to_string(&path).map_err(|source| ConfigError::UpstreamsFileUnreadable {
                    path: path.clone(),
                    source,
                })?;
            let overlay = serde_json::from_str(&raw).map_err(ConfigError::UpstreamsJsonInvalid)?;
            return Ok(Some(overlay));
        }
        if let Some(raw) = non_empty_env("UPSTREAMS_JSON") {
            let overlay = serde_json::from_str(&raw).map_err(ConfigError::UpstreamsJsonInvalid)?;
            return Ok(Some(overlay));
        }
        Ok(None)
    }
}

/// Raw shape of `upstreams.json`: each tier is either absent (inherit
/// environment defaults, `None`), explicit `null` (suppress the tier,
/// `Some(None)`), or a partial upstream descriptor overlay (`Some(Some(_))`).
#[derive(Debug, Clone, Default, serde::Deserialize)]
struct UpstreamsOverlay {
    #[serde(default)]
    cheap: Option<Option<UpstreamOverlayFields>>,
    #[serde(default)]
    medium: Option<Option<UpstreamOverlayFields>>,
    #[serde(default)]
    frontier: Option<Option<UpstreamOverlayFields>>,
}

#[derive(Debug, Clone, Default, serde::Deserialize)]
struct UpstreamOverlayFields {
    name: Option<String>,
    provider: Option<String>,
    #[serde(rename = "baseUrl")]
    base_url: Option<String>,
    #[serde(rename = "apiKey")]
    api_key: Option<String>,
    model: Option<String>,
    deployment: Option<String>,
    #[serde(rename = "apiVersion")]
    api_version: Option<String>,
    #[serde(rename = "extraHeaders")]
    extra_headers: Option<HashMap<String, String>>,
    #[serde(rename = "timeoutMs")]
    timeout_ms: Option<u64>,
}

fn apply_overlay(slot: &mut Option<UpstreamDescriptor>, overlay: Option<Option<UpstreamOverlayFields>>) {
    match overlay {
        None => {}
        Some(None) => *slot = None,
        Some(Some(fields)) => {
            let base = slot.take().unwrap_or_default();
            *slot = Some(UpstreamDescriptor {
                name: fields.name.unwrap_or(base.name),
                provider: fields
                    .provider
                    .and_then(|p| ProviderTag::parse(&p))
                    .or(base.provider),
                base_url: fields.base_url.or(base.base_url),
                api_key: fields.api_key.or(base.api_key),
                model: fields.model.or(base.model),
                deployment: fields.deployment.or(base.deployment),
                api_version: fields.api_version.or(base.api_version),
                extra_headers: fields.extra_headers.unwrap_or(base.extra_headers),
                timeout_ms: fields.timeout_ms.unwrap_or(base.timeout_ms),
            });
        }
    }
}

fn non_empty_env(name: &str) -> Option<String> {
    env::var(name)
        .ok()
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}
