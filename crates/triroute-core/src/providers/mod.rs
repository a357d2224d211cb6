//! Provider-adapter layer: dialect translation between the canonical OpenAI
//! chat-completion shape and five upstream wire formats, all emitting
//! OpenAI-shaped buffered JSON or SSE chunks regardless of the upstream's own
//! dialect.
//!
//! Each adapter owns the upstream HTTP exchange for one request; the caller
//! (the server crate's routing handler) is only responsible for picking the
//! adapter via [`resolve_provider`]/[`adapter_for`], setting the two decision
//! headers, and forwarding whatever the adapter returns to the client.

mod anthropic;
mod azure;
mod cohere;
mod gemini;
mod openai_compat;

#[cfg(test)]
mod tests;

use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use bytes::Bytes;
use futures_util::stream::BoxStream;
use serde_json::Value;
use thiserror::Error;

use crate::config::{ProviderTag, UpstreamDescriptor};
use crate::payload::ChatCompletionRequest;

/// Everything an adapter needs to serve one request, borrowed for the
/// duration of the call.
pub struct ProxyContext<'a> {
    /// Shared HTTP client (connection-pooled; cheap to hold by reference).
    pub http: &'a reqwest::Client,
    /// The inbound request, already routed to a tier.
    pub request: &'a ChatCompletionRequest,
    /// The upstream descriptor for the chosen tier.
    pub upstream: &'a UpstreamDescriptor,
    /// Default `anthropic-version` header when the upstream doesn't override it.
    pub anthropic_version: &'a str,
    /// Default Anthropic `max_tokens` when the inbound request omits one.
    pub anthropic_max_tokens: u32,
    /// Default Azure `api-version` query parameter.
    pub azure_api_version: &'a str,
}

/// Outcome of a buffered (non-streaming) proxy call.
pub struct BufferedReply {
    /// HTTP status the client should see (the upstream's own status for
    /// errors/passthrough, 200 on a successfully translated reply).
    pub status: u16,
    /// Response body. For the passthrough adapter this is the upstream body
    /// relayed verbatim; for translating adapters it's the OpenAI-shaped
    /// `chat.completion` object.
    pub body: Value,
    /// Raw vendor usage object, if one was present, for the caller to hand to
    /// the usage aggregator.
    pub usage: Option<Value>,
}

/// A side channel an adapter writes usage into once it's decoded, since a
/// streaming reply can only report usage after the stream finishes relaying
/// chunks to the client.
#[derive(Clone, Default)]
pub struct UsageSink(Arc<Mutex<Option<Value>>>);

impl UsageSink {
    /// Records `usage`, overwriting any previous value (an adapter should
    /// only ever call this once per request).
    pub fn set(&self, usage: Value) {
        *self.0.lock().unwrap() = Some(usage);
    }

    /// Takes whatever usage was recorded, if any. Intended to be called by
    /// the caller once the chunk stream has been fully drained.
    pub fn take(&self) -> Option<Value> {
        self.0.lock().unwrap().take()
    }
}

/// A stream of already SSE-framed bytes (`data: {...}\n\n`, terminated by
/// `data: [DONE]\n\n`), ready to be written to the client socket as-is.
pub type ChunkStream = BoxStream<'static, Result<Bytes, AdapterError>>;

/// Outcome of a streaming proxy call.
pub struct StreamingReply {
    /// HTTP status for the initial response (200 once the upstream accepts
    /// the stream; adapters surface a non-2xx status via [`AdapterError`]
    /// before any chunk is produced instead).
    pub status: u16,
    /// The chunk stream itself.
    pub chunks: ChunkStream,
    /// Usage sink the stream populates as a side effect while draining.
    pub usage: UsageSink,
}

/// Every way a provider exchange can fail.
#[derive(Debug, Error)]
pub enum AdapterError {
    /// The upstream responded with a non-2xx status; `details` is the raw
    /// body. Translating adapters surface this as `{"error":"upstream_error"}`;
    /// the passthrough adapter instead relays the status/body directly as a
    /// [`BufferedReply`] and never raises this variant for upstream errors.
    #[error("upstream error {status}: {details}")]
    Upstream {
        /// The upstream's reported HTTP status.
        status: u16,
        /// The raw upstream response body.
        details: String,
    },
    /// A connection-level failure (DNS, TLS, timeout, reset).
    #[error("transport error: {0}")]
    Transport(String),
    /// A required field was missing from the upstream descriptor (e.g. Azure
    /// needs `deployment`).
    #[error("missing required field: {0}")]
    MissingField(&'static str),
    /// The resolved provider tag has no adapter implementation.
    #[error("provider not supported")]
    ProviderNotSupported,
}

/// Uniform contract every dialect adapter satisfies.
#[async_trait]
pub trait Adapter: Send + Sync {
    /// Serves one buffered (non-streaming) request.
    async fn buffered(&self, ctx: &ProxyContext<'_>) -> Result<BufferedReply, AdapterError>;

    /// Serves one streaming request. The returned stream MUST write each
    /// translated chunk as soon as the corresponding upstream delta is
    /// decoded — it must not buffer the full response before emitting.
    async fn streaming(&self, ctx: &ProxyContext<'_>) -> Result<StreamingReply, AdapterError>;
}

/// Resolves the concrete [`ProviderTag`] for an upstream: the configured tag
/// taken literally unless it is `auto`, in which case it's inferred from the
/// base URL host, then from the API key prefix, finally falling back to the
/// OpenAI-compatible adapter.
pub fn resolve_provider(upstream: &UpstreamDescriptor) -> ProviderTag {
    match upstream.provider {
        Some(tag) if !matches!(tag, ProviderTag::Auto) => tag,
        _ => infer_from_host(upstream.base_url.as_deref())
            .or_else(|| infer_from_api_key(upstream.api_key.as_deref()))
            .unwrap_or(ProviderTag::OpenAiCompatible),
    }
}

/// The Cohere host is matched against both `api.cohere.ai` and
/// `api.cohere.com` (the documented default Cohere base URL) since vendor
/// documentation is inconsistent about which one is canonical — detection
/// is widened to accept both rather than picking one.
fn infer_from_host(base_url: Option<&str>) -> Option<ProviderTag> {
    let host = base_url?.to_ascii_lowercase();
    let pairs: &[(&str, ProviderTag)] = &[
        ("anthropic.com", ProviderTag::Anthropic),
        ("generativelanguage.googleapis.com", ProviderTag::Gemini),
        ("api.cohere.ai", ProviderTag::Cohere),
        ("api.cohere.com", ProviderTag::Cohere),
        ("openai.azure.com", ProviderTag::AzureOpenAi),
        ("api.mistral.ai", ProviderTag::Mistral),
        ("api.groq.com", ProviderTag::Groq),
        ("api.together.xyz", ProviderTag::Together),
        ("api.perplexity.ai", ProviderTag::Perplexity),
        ("openrouter.ai", ProviderTag::OpenRouter),
        ("api.openai.com", ProviderTag::OpenAi),
    ];
    pairs
        .iter()
        .find(|(needle, _)| host.contains(needle))
        .map(|(_, tag)| *tag)
}

fn infer_from_api_key(api_key: Option<&str>) -> Option<ProviderTag> {
    let key = api_key?;
    if key.starts_with("sk-ant-") {
        return Some(ProviderTag::Anthropic);
    }
    if key.starts_with("AIza") {
        return Some(ProviderTag::Gemini);
    }
    if key.to_ascii_lowercase().contains("cohere") {
        return Some(ProviderTag::Cohere);
    }
    None
}

/// Selects the adapter implementation for a resolved provider tag.
pub fn adapter_for(tag: ProviderTag) -> Result<Box<dyn Adapter>, AdapterError> {
    if tag.is_openai_family() {
        return Ok(Box::new(openai_compat::OpenAiCompatAdapter));
    }
    match tag {
        ProviderTag::Anthropic => Ok(Box::new(anthropic::AnthropicAdapter)),
        ProviderTag::Gemini => Ok(Box::new(gemini::GeminiAdapter)),
        ProviderTag::Cohere => Ok(Box::new(cohere::CohereAdapter)),
        ProviderTag::AzureOpenAi => Ok(Box::new(azure::AzureAdapter)),
        // `resolve_provider` never returns `Auto` — this arm exists so the
        // match stays exhaustive as new tags are added.
        ProviderTag::Auto => Err(AdapterError::ProviderNotSupported),
        _ => Err(AdapterError::ProviderNotSupported),
    }
}

/// Builds the OpenAI buffered `chat.completion` shape.
pub(crate) fn openai_completion(model: &str, content: &str, usage: Option<Value>) -> Value {
    serde_json::json!({
        "id": format!("chatcmpl-{}", uuid::Uuid::new_v4()),
        "object": "chat.completion",
        "created": chrono::Utc::now().timestamp(),
        "model": model,
        "choices": [{
            "index": 0,
            "message": {"role": "assistant", "content": content},
            "finish_reason": "stop",
        }],
        "usage": usage,
    })
}

/// Builds one OpenAI `chat.completion.chunk` SSE payload. `finish_reason`
/// `None` with non-empty `delta_content` is a content chunk; `Some("stop")`
/// with empty delta is the terminator chunk.
pub(crate) fn openai_chunk(model: &str, delta_content: Option<&str>, finish_reason: Option<&str>) -> Value {
    let delta = match delta_content {
        Some(text) => serde_json::json!({"role": "assistant", "content": text}),
        None => serde_json::json!({}),
    };
    serde_json::json!({
        "id": format!("chatcmpl-{}", uuid::Uuid::new_v4()),
        "object": "chat.completion.chunk",
        "created": chrono::Utc::now().timestamp(),
        "model": model,
        "choices": [{
            "index": 0,
            "delta": delta,
            "finish_reason": finish_reason,
        }],
    })
}

/// Frames a JSON value as one `data: <json>\n\n` SSE event.
pub(crate) fn sse_frame(value: &Value) -> Bytes {
    Bytes::from(format!("data: {value}\n\n"))
}

/// The literal `data: [DONE]\n\n` terminator line.
pub(crate) fn sse_done() -> Bytes {
    Bytes::from_static(b"data: [DONE]\n\n")
}

/// Flattens a `Result<Vec<Bytes>, AdapterError>` stream (one fallible decode
/// step per upstream chunk, each step possibly producing zero or more framed
/// SSE events) into the flat `Result<Bytes, AdapterError>` stream
/// [`ChunkStream`] expects.
pub(crate) fn flatten_frame_results<S>(stream: S) -> ChunkStream
where
    S: futures_util::Stream<Item = Result<Vec<Bytes>, AdapterError>> + Send + 'static,
{
    Box::pin(stream.flat_map(|result| {
        let items: Vec<Result<Bytes, AdapterError>> = match result {
            Ok(frames) => frames.into_iter().map(Ok).collect(),
            Err(e) => vec![Err(e)],
        };
        futures_util::stream::iter(items)
    }))
}

/// Flattens a request's messages to `(role, text)` pairs via the shared
/// content-coercion rule, used by every translating adapter.
pub(crate) fn flatten_messages(request: &ChatCompletionRequest) -> Vec<(String, String)> {
    request
        .messages
        .iter()
        .map(|m| {
            (
                m.role.clone(),
                crate::fingerprint::coerce_content(m.content.as_ref()),
            )
        })
        .collect()
}
