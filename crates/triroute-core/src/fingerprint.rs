//! Stable request hashing and content flattening.
//!
//! [`hash_payload`] is the sole definition of "two requests ask the same
//! question" used by the decision cache; [`coerce_content`] is the sole
//! definition of "message text" used by the classifier input builder and by
//! every adapter that needs to flatten a message to a plain string.

use serde_json::Value;
use sha2::{Digest, Sha256};

use crate::payload::ChatCompletionRequest;

/// Produces a hex SHA-256 digest over the routing-relevant subset of
/// `request`: `messages`, `tools`, `tool_choice`, and `response_format`.
///
/// `model`, `stream`, and sampling parameters are deliberately excluded — the
/// classifier decision depends only on task shape, so two otherwise-equal
/// requests collide on this hash even if they name different models or
/// sampling parameters: two requests asking the same question from
/// different client-chosen models collapse to one cached decision.
#[inline]
pub fn hash_payload(request: &ChatCompletionRequest) -> String {
    let subset = routing_subset(request);
    let canonical =
        serde_json::to_vec(&subset).expect("routing subset always serializes to JSON");
    let digest = Sha256::digest(&canonical);
    hex::encode(digest)
}

fn routing_subset(request: &ChatCompletionRequest) -> Value {
    let mut root = serde_json::Map::new();
    root.insert(
        "messages".to_string(),
        serde_json::to_value(&request.messages).unwrap_or(Value::Array(Vec::new())),
    );
    root.insert(
        "tools".to_string(),
        request.tools.clone().unwrap_or(Value::Null),
    );
    root.insert(
        "tool_choice".to_string(),
        request.tool_choice.clone().unwrap_or(Value::Null),
    );
    root.insert(
        "response_format".to_string(),
        request.response_format.clone().unwrap_or(Value::Null),
    );
    Value::Object(root)
}

/// Flattens a message's `content` field (string, array-of-parts, or absent)
/// to plain text.
///
/// Precedence for each part in an array: the part itself if it is already a
/// string; else `part.text`; else `part.input_text`; else a recursive coerce
/// of `part.content`; otherwise the part is serialized to JSON verbatim. Null
/// or absent content coerces to the empty string.
pub fn coerce_content(content: Option<&Value>) -> String {
    match content {
        None | Some(Value::Null) => String::new(),
        Some(Value::String(s)) => s.clone(),
        Some(Value::Array(parts)) => parts.iter().map(coerce_part).collect::<Vec<_>>().join(""),
        Some(other) => coerce_part(other),
    }
}

fn coerce_part(part: &Value) -> String {
    if let Value::String(s) = part {
        return s.clone();
    }
    if let Some(text) = part.get("text").and_then(Value::as_str) {
        return text.to_string();
    }
    if let Some(text) = part.get("input_text").and_then(Value::as_str) {
        return text.to_string();
    }
    if let Some(nested) = part.get("content") {
        return coerce_content(Some(nested));
    }
    serde_json::to_string(part).unwrap_or_default()
}

/// Scans `text` for the first character in `['0', '1', '2']` and returns it
/// as a digit, or `None` if no such character appears.
pub fn extract_decision(text: &str) -> Option<u8> {
    text.chars()
        .find(|c| matches!(c, '0' | '1' | '2'))
        .map(|c| c as u8 - b'0')
}

/// Strategy for building the classifier's input text from the full request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ClassifierStrategy {
    /// Use the flattened content of the last `user` message; falls back to
    /// [`ClassifierStrategy::FullMessages`] when there is no `user` turn.
    LastUser,
    /// Serialize every message as `[{role, content}]` JSON.
    FullMessages,
}

impl std::str::FromStr for ClassifierStrategy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "last_user" => Ok(Self::LastUser),
            "full_messages" => Ok(Self::FullMessages),
            other => Err(format!("unknown classifier strategy: {other}")),
        }
    }
}

/// Builds the text handed to the classifier model, truncated to `max_chars`
/// with a trailing `\n[TRUNCATED]` marker when cut.
pub fn build_classifier_input(
    request: &ChatCompletionRequest,
    strategy: ClassifierStrategy,
    max_chars: usize,
) -> String {
    let full = truncate(&full_messages_json(request), max_chars);

    let text = match strategy {
        ClassifierStrategy::FullMessages => return full,
        ClassifierStrategy::LastUser => match request.last_user_content() {
            Some(content) => coerce_content(Some(content)),
            None => return full,
        },
    };

    truncate(&text, max_chars)
}

fn full_messages_json(request: &ChatCompletionRequest) -> String {
    let flattened: Vec<Value> = request
        .messages
        .iter()
        .map(|m| {
            serde_json::json!({
                "role": m.role,
                "content": coerce_content(m.content.as_ref()),
            })
        })
        .collect();
    serde_json::to_string(&flattened).unwrap_or_else(|_| "[]".to_string())
}

fn truncate(text: &str, max_chars: usize) -> String {
    if text.chars().count() <= max_chars {
        return text.to_string();
    }
    let truncated: String = text.chars().take(max_chars).collect();
    format!("{truncated}\n[TRUNCATED]")
}
