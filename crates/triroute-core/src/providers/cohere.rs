//! Cohere chat v2 adapter.

use async_trait::async_trait;
use bytes::Bytes;
use futures_util::StreamExt;
use serde_json::Value;

use super::{
    Adapter, AdapterError, BufferedReply, ChunkStream, ProxyContext, StreamingReply, UsageSink,
    flatten_frame_results, flatten_messages, openai_chunk, openai_completion, sse_done, sse_frame,
};
use crate::util::normalize_base_url;

pub struct CohereAdapter;

fn resolved_model(ctx: &ProxyContext<'_>) -> String {
    ctx.upstream
        .model
        .clone()
        .or_else(|| ctx.request.model.clone())
        .unwrap_or_default()
}

/// Preserves an already-pathed base URL (`.../v2/chat` or `.../chat`) rather
/// than appending a second `/v2/chat` onto it.
fn chat_url(base_url: &str) -> String {
    let normalized = normalize_base_url(base_url);
    if normalized.ends_with("/v2/chat") || normalized.ends_with("/chat") {
        normalized
    } else {
        format!("{normalized}/v2/chat")
    }
}

fn build_body(ctx: &ProxyContext<'_>, stream: bool) -> Value {
    let messages: Vec<Value> = flatten_messages(ctx.request)
        .into_iter()
        .map(|(role, text)| {
            let role = match role.as_str() {
                "system" => "system",
                "assistant" => "assistant",
                "tool" => "tool",
                _ => "user",
            };
            serde_json::json!({"role": role, "content": text})
        })
        .collect();

    let mut body = serde_json::json!({
        "model": resolved_model(ctx),
        "messages": messages,
        "stream": stream,
    });
    if let Some(temperature) = ctx.request.temperature {
        body["temperature"] = serde_json::json!(temperature);
    }
    if let Some(max_tokens) = ctx.request.effective_max_tokens() {
        body["max_tokens"] = serde_json::json!(max_tokens);
    }
    body
}

fn extract_text(message: &Value) -> String {
    message
        .get("content")
        .and_then(Value::as_array)
        .map(|parts| {
            parts
                .iter()
                .filter_map(|p| p.get("text").and_then(Value::as_str))
                .collect::<Vec<_>>()
                .join("")
        })
        .unwrap_or_default()
}

fn extract_usage(value: &Value) -> Option<Value> {
    value
        .get("usage")
        .and_then(|u| u.get("tokens"))
        .or_else(|| value.get("meta").and_then(|m| m.get("tokens")))
        .or_else(|| {
            value
                .get("response")
                .and_then(|r| r.get("meta"))
                .and_then(|m| m.get("tokens"))
        })
        .cloned()
        .filter(|u| !u.is_null())
}

#[async_trait]
impl Adapter for CohereAdapter {
    async fn buffered(&self, ctx: &ProxyContext<'_>) -> Result<BufferedReply, AdapterError> {
        let body = build_body(ctx, false);
        let response = ctx
            .http
            .post(chat_url(ctx.upstream.base_url.as_deref().unwrap_or_default()))
            .bearer_auth(ctx.upstream.api_key.as_deref().unwrap_or_default())
            .json(&body)
            .send()
            .await
            .map_err(|e| AdapterError::Transport(e.to_string()))?;

        let status = response.status();
        let text = response
            .text()
            .await
            .map_err(|e| AdapterError::Transport(e.to_string()))?;
        if !status.is_success() {
            return Err(AdapterError::Upstream {
                status: status.as_u16(),
                details: text,
            });
        }

        let value: Value =
            serde_json::from_str(&text).map_err(|e| AdapterError::Transport(e.to_string()))?;
        let content = value
            .get("message")
            .map(extract_text)
            .unwrap_or_default();
        let usage = extract_usage(&value);

        Ok(BufferedReply {
            status: 200,
            body: openai_completion(&resolved_model(ctx), &content, usage.clone()),
            usage,
        })
    }

    async fn streaming(&self, ctx: &ProxyContext<'_>) -> Result<StreamingReply, AdapterError> {
        let body = build_body(ctx, true);
        let response = ctx
            .http
            .post(chat_url(ctx.upstream.base_url.as_deref().unwrap_or_default()))
            .bearer_auth(ctx.upstream.api_key.as_deref().unwrap_or_default())
            .json(&body)
            .send()
            .await
            .map_err(|e| AdapterError::Transport(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let text = response.text().await.unwrap_or_default();
            return Err(AdapterError::Upstream {
                status: status.as_u16(),
                details: text,
            });
        }

        let model = resolved_model(ctx);
        let usage = UsageSink::default();
        let usage_for_scan = usage.clone();
        let mut buffer = crate::sse::SseLineBuffer::new();
        let done = std::sync::Arc::new(std::sync::atomic::AtomicBool::new(false));
        let done_for_scan = done.clone();
        let done_for_flush = done.clone();
        let model_for_flush = model.clone();

        let body = response.bytes_stream().map(
            move |result| -> Result<Vec<Bytes>, AdapterError> {
                let raw = result.map_err(|e| AdapterError::Transport(e.to_string()))?;
                if done_for_scan.load(std::sync::atomic::Ordering::Relaxed) {
                    return Ok(Vec::new());
                }
                let mut out = Vec::new();
                for payload in buffer.push(&raw) {
                    let Ok(value) = serde_json::from_str::<Value>(&payload) else {
                        continue;
                    };
                    match value.get("type").and_then(Value::as_str) {
                        Some("content-delta") => {
                            if let Some(text) = value
                                .get("delta")
                                .and_then(|d| d.get("message"))
                                .and_then(|m| m.get("content"))
                                .and_then(|c| c.get("text"))
                                .and_then(Value::as_str)
                            {
                                out.push(sse_frame(&openai_chunk(&model, Some(text), None)));
                            }
                        }
                        Some("message-end") => {
                            if let Some(found) = extract_usage(&value) {
                                usage_for_scan.set(found);
                            }
                            out.push(sse_frame(&openai_chunk(&model, None, Some("stop"))));
                            out.push(sse_done());
                            done_for_scan.store(true, std::sync::atomic::Ordering::Relaxed);
                        }
                        _ => {}
                    }
                }
                Ok(out)
            },
        );

        // Cohere can close the stream without ever sending `message-end`.
        // Flush the terminator + [DONE] here so the translated stream still
        // ends with exactly one of each.
        let flush = futures_util::stream::once(async move {
            if done_for_flush.load(std::sync::atomic::Ordering::Relaxed) {
                Ok(Vec::new())
            } else {
                Ok(vec![
                    sse_frame(&openai_chunk(&model_for_flush, None, Some("stop"))),
                    sse_done(),
                ])
            }
        });

        let chunks: ChunkStream = flatten_frame_results(body.chain(flush));

        Ok(StreamingReply {
            status: 200,
            chunks,
            usage,
        })
    }
}
