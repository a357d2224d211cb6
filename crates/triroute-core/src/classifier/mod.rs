//! Classifier client: builds a compact classification prompt, calls a remote
//! chat-completion endpoint in either transport mode, and parses a single
//! decision digit out of the reply — with a retry/fallback policy layered
//! on top.

mod error;


pub use error::{ClassifierError, ClassifierKind};

use std::sync::Arc;
use std::time::Duration;

use serde_json::{Value, json};

use crate::config::ClassifierConfig;
use crate::constants::{MIN_CLASSIFIER_RETRY_TIMEOUT_MS, MIN_WARMUP_TIMEOUT_MS};
use crate::fingerprint::{build_classifier_input, extract_decision};
use crate::payload::{ChatCompletionRequest, Decision};
use crate::sse::SseLineBuffer;
use crate::util::chat_completions_url;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Mode {
    Streaming,
    Buffered,
}

impl Mode {
    fn other(self) -> Self {
        match self {
            Self::Streaming => Self::Buffered,
            Self::Buffered => Self::Streaming,
        }
    }
}

/// Calls the classifier's OpenAI-compatible chat-completion endpoint and
/// extracts a routing decision.
pub struct ClassifierClient {
    http: reqwest::Client,
    config: ClassifierConfig,
}

impl ClassifierClient {
    /// Builds a client for the given configuration. Cheap: `reqwest::Client`
    /// is itself a cheap-to-clone connection-pool handle.
    pub fn new(config: ClassifierConfig) -> Self {
        Self {
            http: reqwest::Client::new(),
            config,
        }
    }

    /// The configuration this client was built from.
    pub fn config(&self) -> &ClassifierConfig {
        &self.config
    }

    /// Classifies one inbound request, returning a routing decision.
    ///
    /// Builds the classifier input from `request`, then attempts the
    /// configured transport mode first, falling back to the other mode once
    /// if the first yields a response with no decision digit. Timeout and
    /// model-loading retries happen within a single mode attempt and do not
    /// themselves trigger a mode switch.
    pub async fn classify(&self, request: &ChatCompletionRequest) -> Result<Decision, ClassifierError> {
        let input = build_classifier_input(request, self.config.strategy, self.config.max_chars);
        self.classify_text(&input, Duration::from_millis(self.config.timeout_ms))
            .await
    }

    async fn classify_text(&self, input: &str, timeout: Duration) -> Result<Decision, ClassifierError> {
        let primary = if self.config.force_stream {
            Mode::Streaming
        } else {
            Mode::Buffered
        };
        let secondary = primary.other();

        if let Some(decision) = self.attempt_with_retries(primary, input, timeout).await? {
            return Ok(decision);
        }
        self.attempt_with_retries(secondary, input, timeout)
            .await?
            .ok_or(ClassifierError::NoDecision)
    }

    /// Retries one transport mode: at most one retry on timeout
    /// (with the timeout doubled, floored at [`MIN_CLASSIFIER_RETRY_TIMEOUT_MS`]),
    /// and up to `loadingMaxRetries` retries on a detected model-loading
    /// response, spaced `loadingRetryMs` apart. `Ok(None)` means the call
    /// succeeded but no decision digit was found — the caller falls back to
    /// the other transport mode for that, not a retry here.
    async fn attempt_with_retries(
        &self,
        mode: Mode,
        input: &str,
        timeout: Duration,
    ) -> Result<Option<Decision>, ClassifierError> {
        let mut current_timeout = timeout;
        let mut timed_out_once = false;
        let mut loading_attempts = 0u32;

        loop {
            match self.attempt_once(mode, input, current_timeout).await {
                Ok(outcome) => return Ok(outcome),
                Err(ClassifierError::Timeout) if !timed_out_once => {
                    timed_out_once = true;
                    current_timeout = std::cmp::max(
                        current_timeout * 2,
                        Duration::from_millis(MIN_CLASSIFIER_RETRY_TIMEOUT_MS),
                    );
                    tracing::warn!(?mode, "classifier timeout, retrying once");
                }
                Err(ClassifierError::ModelLoading) if loading_attempts < self.config.loading_max_retries => {
                    loading_attempts += 1;
                    tracing::warn!(
                        ?mode,
                        attempt = loading_attempts,
                        "classifier model loading, retrying"
                    );
                    tokio::time::sleep(Duration::from_millis(self.config.loading_retry_ms)).await;
                }
                Err(other) => return Err(other),
            }
        }
    }

    async fn attempt_once(
        &self,
        mode: Mode,
        input: &str,
        timeout: Duration,
    ) -> Result<Option<Decision>, ClassifierError> {
        match tokio::time::timeout(timeout, self.send_and_decode(mode, input)).await {
            Ok(result) => result,
            Err(_) => Err(ClassifierError::Timeout),
        }
    }

    fn request_body(&self, input: &str, stream: bool) -> Value {
        let mut body = json!({
            "model": self.config.model,
            "messages": [
                {"role": "system", "content": self.config.system_prompt},
                {"role": "user", "content": format!("Return only 0, 1, or 2. Input:\n{input}")},
            ],
            "temperature": self.config.temperature,
            "max_tokens": self.config.max_tokens,
            "stream": stream,
        });
        if let Some(bias) = &self.config.logit_bias {
            body["logit_bias"] = bias.clone();
        }
        body
    }

    async fn send_and_decode(&self, mode: Mode, input: &str) -> Result<Option<Decision>, ClassifierError> {
        let body = self.request_body(input, mode == Mode::Streaming);
        let url = chat_completions_url(&self.config.base_url);
        let mut req = self.http.post(url).json(&body);
        if let Some(key) = &self.config.api_key {
            req = req.bearer_auth(key);
        }

        let response = req
            .send()
            .await
            .map_err(|e| ClassifierError::Transport(e.to_string()))?;
        let status = response.status();

        match mode {
            Mode::Streaming => {
                if !status.is_success() {
                    let body = response.text().await.unwrap_or_default();
                    return Err(classify_http_error(status.as_u16(), &body));
                }
                decode_stream(response).await
            }
            Mode::Buffered => {
                let text = response
                    .text()
                    .await
                    .map_err(|e| ClassifierError::Transport(e.to_string()))?;
                if !status.is_success() {
                    return Err(classify_http_error(status.as_u16(), &text));
                }
                Ok(decode_buffered(&text))
            }
        }
    }

    /// Spawns the warmup (and, if configured, recurring keep-alive) task as
    /// a detached background task that runs independently of any inbound
    /// request. This must not block shutdown — the caller simply drops the
    /// returned handle rather than awaiting it.
    pub fn spawn_warmup(self: Arc<Self>) -> Option<tokio::task::JoinHandle<()>> {
        if !self.config.warmup {
            return None;
        }
        Some(tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(self.config.warmup_delay_ms)).await;
            loop {
                let timeout = std::cmp::max(
                    Duration::from_millis(self.config.timeout_ms),
                    Duration::from_millis(MIN_WARMUP_TIMEOUT_MS),
                );
                if let Err(e) = self.classify_text("Warmup.", timeout).await {
                    tracing::warn!(error = %e, "classifier warmup call failed");
                }
                if self.config.keep_alive_ms == 0 {
                    break;
                }
                tokio::time::sleep(Duration::from_millis(self.config.keep_alive_ms)).await;
            }
        }))
    }
}

fn classify_http_error(status: u16, body: &str) -> ClassifierError {
    let lower = body.to_ascii_lowercase();
    if lower.contains("model loading") || lower.contains("loading model") || status == 503 {
        ClassifierError::ModelLoading
    } else {
        ClassifierError::Transport(format!("http {status}: {body}"))
    }
}

fn decode_buffered(text: &str) -> Option<Decision> {
    let value: Value = serde_json::from_str(text).ok()?;
    let choice = value.get("choices")?.get(0)?;
    let text = choice
        .get("message")
        .and_then(|m| m.get("content"))
        .and_then(Value::as_str)
        .or_else(|| choice.get("text").and_then(Value::as_str))?;
    Decision::from_digit(extract_decision(text)?)
}

async fn decode_stream(response: reqwest::Response) -> Result<Option<Decision>, ClassifierError> {
    use futures_util::StreamExt;

    let mut stream = response.bytes_stream();
    let mut buffer = SseLineBuffer::new();

    while let Some(chunk) = stream.next().await {
        let chunk = chunk.map_err(|e| ClassifierError::Transport(e.to_string()))?;
        for payload in buffer.push(&chunk) {
            if payload == "[DONE]" {
                return Ok(None);
            }
            let Ok(value) = serde_json::from_str::<Value>(&payload) else {
                continue;
            };
            let Some(choice) = value.get("choices").and_then(|c| c.get(0)) else {
                continue;
            };
            let text = choice
                .get("delta")
                .and_then(|d| d.get("content"))
                .and_then(Value::as_str)
                .or_else(|| choice.get("text").and_then(Value::as_str));
            if let Some(text) = text
                && let Some(digit) = extract_decision(text)
                && let Some(decision) = Decision::from_digit(digit)
            {
                // Dropping `stream`/`response` here aborts the outbound
                // connection as soon as a decision is known.
                return Ok(Some(decision));
            }
        }
    }

    Ok(None)
}
