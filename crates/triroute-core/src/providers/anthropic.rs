//! Anthropic messages API adapter.

use async_trait::async_trait;
use bytes::Bytes;
use futures_util::StreamExt;
use serde_json::Value;

use super::{
    Adapter, AdapterError, BufferedReply, ChunkStream, ProxyContext, StreamingReply, UsageSink,
    flatten_frame_results, flatten_messages, openai_chunk, openai_completion, sse_done, sse_frame,
};
use crate::util::normalize_base_url;

pub struct AnthropicAdapter;

fn messages_url(base_url: &str) -> String {
    format!("{}/v1/messages", normalize_base_url(base_url))
}

fn resolved_model(ctx: &ProxyContext<'_>) -> String {
    ctx.upstream
        .model
        .clone()
        .or_else(|| ctx.request.model.clone())
        .unwrap_or_default()
}

fn stop_sequences(stop: Option<&Value>) -> Option<Value> {
    match stop? {
        Value::Array(items) => Some(Value::Array(items.clone())),
        Value::String(s) => Some(Value::Array(vec![Value::String(s.clone())])),
        _ => None,
    }
}

fn build_body(ctx: &ProxyContext<'_>, stream: bool) -> Value {
    let flattened = flatten_messages(ctx.request);
    let system: Vec<&str> = flattened
        .iter()
        .filter(|(role, _)| role == "system")
        .map(|(_, text)| text.as_str())
        .collect();
    let messages: Vec<Value> = flattened
        .iter()
        .filter(|(role, _)| role != "system")
        .map(|(role, text)| {
            let role = if role == "assistant" { "assistant" } else { "user" };
            serde_json::json!({"role": role, "content": text})
        })
        .collect();

    let max_tokens = ctx
        .request
        .effective_max_tokens()
        .unwrap_or(ctx.anthropic_max_tokens);

    let mut body = serde_json::json!({
        "model": resolved_model(ctx),
        "messages": messages,
        "max_tokens": max_tokens,
        "stream": stream,
    });
    if !system.is_empty() {
        body["system"] = Value::String(system.join("\n"));
    }
    if let Some(temperature) = ctx.request.temperature {
        body["temperature"] = serde_json::json!(temperature);
    }
    if let Some(top_p) = ctx.request.top_p {
        body["top_p"] = serde_json::json!(top_p);
    }
    if let Some(stop) = stop_sequences(ctx.request.stop.as_ref()) {
        body["stop_sequences"] = stop;
    }
    body
}

fn anthropic_version(ctx: &ProxyContext<'_>) -> String {
    ctx.upstream
        .extra_headers
        .get("anthropic-version")
        .cloned()
        .unwrap_or_else(|| ctx.anthropic_version.to_string())
}

#[async_trait]
impl Adapter for AnthropicAdapter {
    async fn buffered(&self, ctx: &ProxyContext<'_>) -> Result<BufferedReply, AdapterError> {
        let body = build_body(ctx, false);
        let response = ctx
            .http
            .post(messages_url(ctx.upstream.base_url.as_deref().unwrap_or_default()))
            .header("x-api-key", ctx.upstream.api_key.as_deref().unwrap_or_default())
            .header("anthropic-version", anthropic_version(ctx))
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
            .get("content")
            .and_then(Value::as_array)
            .map(|parts| {
                parts
                    .iter()
                    .filter_map(|p| p.get("text").and_then(Value::as_str))
                    .collect::<Vec<_>>()
                    .join("")
            })
            .unwrap_or_default();
        let usage = value.get("usage").cloned().filter(|u| !u.is_null());

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
            .post(messages_url(ctx.upstream.base_url.as_deref().unwrap_or_default()))
            .header("x-api-key", ctx.upstream.api_key.as_deref().unwrap_or_default())
            .header("anthropic-version", anthropic_version(ctx))
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

        let body = response
            .bytes_stream()
            .map(move |result| -> Result<Vec<Bytes>, AdapterError> {
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
                        Some("message_start") => {
                            if let Some(msg_usage) =
                                value.get("message").and_then(|m| m.get("usage"))
                            {
                                usage_for_scan.set(msg_usage.clone());
                            }
                        }
                        Some("content_block_delta") => {
                            if let Some(text) = value
                                .get("delta")
                                .and_then(|d| d.get("text"))
                                .and_then(Value::as_str)
                            {
                                out.push(sse_frame(&openai_chunk(&model, Some(text), None)));
                            }
                        }
                        Some("message_stop") => {
                            out.push(sse_frame(&openai_chunk(&model, None, Some("stop"))));
                            out.push(sse_done());
                            done_for_scan.store(true, std::sync::atomic::Ordering::Relaxed);
                        }
                        _ => {}
                    }
                }
                Ok(out)
            });

        // Anthropic can close the stream without ever sending `message_stop`
        // (e.g. an abrupt disconnect). Flush the terminator + [DONE] here so
        // the translated stream still ends with exactly one of each.
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
