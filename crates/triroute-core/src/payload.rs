//! Canonical OpenAI chat-completion shape shared by the classifier, the cache
//! fingerprint, and every provider adapter.
//!
//! Requests are kept as [`serde_json::Value`] at the edges so that the
//! passthrough adapter can relay unrecognized vendor fields verbatim;
//! [`ChatMessage`] gives typed access to the handful of fields every other
//! component actually needs to read.

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// One message in an inbound chat-completion request.
///
/// `content` is left as a raw [`Value`] — it may be a plain string or a
/// heterogeneous array of parts — and is only flattened to text on demand via
/// [`crate::fingerprint::coerce_content`].
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatMessage {
    /// One of `system`, `user`, `assistant`, `tool` (not enforced; unknown
    /// roles are passed through untouched).
    pub role: String,
    /// String, array-of-parts, or absent/null.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub content: Option<Value>,
    /// Any other fields on the message (`tool_call_id`, `tool_calls`, `name`, ...).
    #[serde(flatten)]
    pub extra: serde_json::Map<String, Value>,
}

impl ChatMessage {
    /// `true` for `role == "user"`.
    pub fn is_user(&self) -> bool {
        self.role == "user"
    }

    /// `true` for `role == "system"`.
    pub fn is_system(&self) -> bool {
        self.role == "system"
    }

    /// `true` for `role == "assistant"`.
    pub fn is_assistant(&self) -> bool {
        self.role == "assistant"
    }
}

/// Inbound chat-completion request, parsed loosely enough to preserve
/// unrecognized vendor/OpenAI fields for the passthrough adapter.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct ChatCompletionRequest {
    /// Model name; overridable by the chosen upstream's configured model.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub model: Option<String>,
    /// Ordered conversation turns.
    #[serde(default)]
    pub messages: Vec<ChatMessage>,
    /// Requests an SSE stream when `true`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub stream: Option<bool>,
    /// Sampling temperature.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub temperature: Option<f64>,
    /// Nucleus sampling threshold.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub top_p: Option<f64>,
    /// Legacy max-token cap.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_tokens: Option<u32>,
    /// Current max-token cap (supersedes `max_tokens` on OpenAI's own API).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_completion_tokens: Option<u32>,
    /// Stop sequence(s); string or array.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub stop: Option<Value>,
    /// Tool/function declarations.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tools: Option<Value>,
    /// Tool-choice directive.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tool_choice: Option<Value>,
    /// Structured-output format directive.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub response_format: Option<Value>,
    /// Every other field the request carried (`n`, `seed`, `user`, ...), kept
    /// so passthrough adapters can relay them unmodified.
    #[serde(flatten)]
    pub extra: serde_json::Map<String, Value>,
}

impl ChatCompletionRequest {
    /// `true` when the client asked for a streamed response.
    pub fn wants_stream(&self) -> bool {
        self.stream.unwrap_or(false)
    }

    /// The effective max-output-tokens value, preferring the newer field name.
    pub fn effective_max_tokens(&self) -> Option<u32> {
        self.max_completion_tokens.or(self.max_tokens)
    }

    /// Returns the content of the last message with `role == "user"`, if any.
    pub fn last_user_content(&self) -> Option<&Value> {
        self.messages
            .iter()
            .rev()
            .find(|m| m.is_user())
            .and_then(|m| m.content.as_ref())
    }
}

/// A routing decision: which tier a request was sent to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Decision {
    /// Tier 0.
    Cheap,
    /// Tier 1.
    Medium,
    /// Tier 2 (the default/fallback tier).
    Frontier,
}

impl Decision {
    /// Parses the canonical single-digit cache/wire representation.
    pub fn from_digit(digit: u8) -> Option<Self> {
        match digit {
            0 => Some(Self::Cheap),
            1 => Some(Self::Medium),
            2 => Some(Self::Frontier),
            _ => None,
        }
    }

    /// The canonical single digit ("0" | "1" | "2").
    pub fn digit(self) -> u8 {
        match self {
            Self::Cheap => 0,
            Self::Medium => 1,
            Self::Frontier => 2,
        }
    }

    /// The digit rendered as a `&'static str`, for headers and cache values.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Cheap => "0",
            Self::Medium => "1",
            Self::Frontier => "2",
        }
    }

    /// Maps this decision onto a [`Route`].
    pub fn route(self) -> Route {
        match self {
            Self::Cheap => Route::Cheap,
            Self::Medium => Route::Medium,
            Self::Frontier => Route::Frontier,
        }
    }
}

impl std::fmt::Display for Decision {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// The three upstream tiers a request can be routed to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Route {
    /// Cheapest tier; chosen by decision 0.
    Cheap,
    /// Middle tier; chosen by decision 1.
    Medium,
    /// Most capable (and default/fallback) tier; chosen by decision 2.
    Frontier,
}

impl Route {
    /// Lowercase name, used for usage-bucket keys and logging.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Cheap => "cheap",
            Self::Medium => "medium",
            Self::Frontier => "frontier",
        }
    }
}

impl std::fmt::Display for Route {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn decision_roundtrips_through_digit() {
        for d in [Decision::Cheap, Decision::Medium, Decision::Frontier] {
            assert_eq!(Decision::from_digit(d.digit()), Some(d));
        }
    }

    #[test]
    fn decision_out_of_range_is_none() {
        assert_eq!(Decision::from_digit(3), None);
        assert_eq!(Decision::from_digit(9), None);
    }

    #[test]
    fn decision_maps_to_expected_route() {
        assert_eq!(Decision::Cheap.route(), Route::Cheap);
        assert_eq!(Decision::Medium.route(), Route::Medium);
        assert_eq!(Decision::Frontier.route(), Route::Frontier);
    }

    #[test]
    fn request_prefers_max_completion_tokens() {
        let mut req = ChatCompletionRequest::default();
        req.max_tokens = Some(10);
        req.max_completion_tokens = Some(20);
        assert_eq!(req.effective_max_tokens(), Some(20));
    }

    #[test]
    fn request_falls_back_to_legacy_max_tokens() {
        let mut req = ChatCompletionRequest::default();
        req.max_tokens = Some(10);
        assert_eq!(req.effective_max_tokens(), Some(10));
    }

    #[test]
    fn last_user_content_finds_most_recent_user_turn() {
        let req: ChatCompletionRequest = serde_json::from_value(serde_json::json!({
            "messages": [
                {"role": "user", "content": "first"},
                {"role": "assistant", "content": "reply"},
                {"role": "user", "content": "second"},
            ]
        }))
        .unwrap();

        assert_eq!(req.last_user_content().unwrap().as_str(), Some("second"));
    }

    #[test]
    fn unknown_fields_are_preserved_via_flatten() {
        let req: ChatCompletionRequest = serde_json::from_value(serde_json::json!({
            "messages": [],
            "seed": 42,
            "user": "abc"
        }))
        .unwrap();

        assert_eq!(req.extra.get("seed").and_then(|v| v.as_i64()), Some(42));
        assert_eq!(req.extra.get("user").and_then(|v| v.as_str()), Some("abc"));
    }
}
