//! Google Gemini `generateContent`/`streamGenerateContent` adapter.

use async_trait::async_trait;
use bytes::Bytes;
use futures_util::StreamExt;
use percent_encoding::{NON_ALPHANUMERIC, utf8_percent_encode};
use serde_json::Value;

use super::{
    Adapter, AdapterError, BufferedReply, ChunkStream, ProxyContext, StreamingReply, UsageSink,
    flatten_frame_results, flatten_messages, openai_chunk, openai_completion, sse_done, sse_frame,
};
use crate::util::normalize_base_url;

pub struct GeminiAdapter;

fn resolved_model(ctx: &ProxyContext<'_>) -> String {
    ctx.upstream
        .model
        .clone()
        .or_else(|| ctx.request.model.clone())
        .unwrap_or_default()
}

fn endpoint_url(ctx: &ProxyContext<'_>, stream: bool) -> String {
    let base = normalize_base_url(ctx.upstream.base_url.as_deref().unwrap_or_default());
    let model = utf8_percent_encode(&resolved_model(ctx), NON_ALPHANUMERIC).to_string();
    let method = if stream {
        "streamGenerateContent"
    } else {
        "generateContent"
    };
    let mut url = format!("{base}/models/{model}:{method}");
    if stream {
        url.push_str("?alt=sse");
    }
    if let Some(key) = &ctx.upstream.api_key {
        let sep = if url.contains('?') { '&' } else { '?' };
        url.push(sep);
        url.push_str("key=");
        url.push_str(&utf8_percent_encode(key, NON_ALPHANUMERIC).to_string());
    }
    url
}

fn build_body(ctx: &ProxyContext<'_>) -> Value {
    let flattened = flatten_messages(ctx.request);
    let system: Vec<&str> = flattened
        .iter()
        .filter(|(role, _)| role == "system")
        .map(|(_, text)| text.as_str())
        .collect();
    let contents: Vec<Value> = flattened
        .iter()
        .filter(|(role, _)| role != "system")
        .map(|(role, text)| {
            let role = if role == "assistant" { "model" } else { "user" };
            serde_json::json!({"role": role, "parts": [{"text": text}]})
        })
        .collect();

    let mut generation_config = serde_json::Map::new();
    if let Some(temperature) = ctx.request.temperature {
        generation_config.insert("temperature".into(), serde_json::json!(temperature));
    }
    if let Some(top_p) = ctx.request.top_p {
        generation_config.insert("topP".into(), serde_json::json!(top_p));
    }
    if let Some(max_tokens) = ctx.request.effective_max_tokens() {
        generation_config.insert("maxOutputTokens".into(), serde_json::json!(max_tokens));
    }
    if let Some(stop) = &ctx.request.stop {
        let sequences = match stop {
            Value::Array(items) => Value::Array(items.clone()),
            Value::String(s) => Value::Array(vec![Value::String(s.clone())]),
            _ => Value::Null,
        };
        if !sequences.is_null() {
            generation_config.insert("stopSequences".into(), sequences);
        }
    }

    let mut body = serde_json::json!({ "contents": contents });
    if !system.is_empty() {
        body["systemInstruction"] = serde_json::json!({"parts": [{"text": system.join("\n")}]});
    }
    if !generation_config.is_empty() {
        body["generationConfig"] = Value::Object(generation_config);
    }
    body
}

fn extract_text(candidate: &Value) -> String {
    candidate
        .get("content")
        .and_then(|c| c.get("parts"))
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

#[async_trait]
impl Adapter for GeminiAdapter {
    async fn buffered(&self, ctx: &ProxyContext<'_>) -> Result<BufferedReply, AdapterError> {
        let body = build_body(ctx);
        let response = ctx
            .http
            .post(endpoint_url(ctx, false))
            .header("x-goog-api-key", ctx.upstream.api_key.as_deref().unwrap_or_default())
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
            .get("candidates")
            .and_then(|c| c.get(0))
            .map(extract_text)
            .unwrap_or_default();
        let usage = value.get("usageMetadata").cloned().filter(|u| !u.is_null());

        Ok(BufferedReply {
            status: 200,
            body: openai_completion(&resolved_model(ctx), &content, usage.clone()),
            usage,
        })
    }

    async fn streaming(&self, ctx: &ProxyContext<'_>) -> Result<StreamingReply, AdapterError> {
        let body = build_body(ctx);
        let response = ctx
            .http
            .post(endpoint_url(ctx, true))
            .header("x-goog-api-key", ctx.upstream.api_key.as_deref().unwrap_or_default())
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
                    if payload == "[DONE]" {
                        continue;
                    }
                    let Ok(value) = serde_json::from_str::<Value>(&payload) else {
                        continue;
                    };
                    if let Some(found) = value.get("usageMetadata").filter(|u| !u.is_null()) {
                        usage_for_scan.set(found.clone());
                    }
                    if let Some(candidate) = value.get("candidates").and_then(|c| c.get(0)) {
                        let text = extract_text(candidate);
                        if !text.is_empty() {
                            out.push(sse_frame(&openai_chunk(&model, Some(&text), None)));
                        }
                        if candidate.get("finishReason").and_then(Value::as_str).is_some() {
                            out.push(sse_frame(&openai_chunk(&model, None, Some("stop"))));
                            out.push(sse_done());
                            done_for_scan.store(true, std::sync::atomic::Ordering::Relaxed);
                        }
                    }
                }
                Ok(out)
            },
        );

        // Gemini can close the stream without a candidate ever carrying a
        // `finishReason`. Flush the terminator + [DONE] here so the
        // translated stream still ends with exactly one of each.
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
