//! Transparent OpenAI-compatible passthrough: covers the literal
//! `openai_compatible` tag plus every alias that shares its wire shape
//! (`openrouter`, `openai`, `mistral`, `groq`, `together`, `perplexity`).
//!
//! The inbound payload is forwarded verbatim except `model`, which is
//! overridden with the upstream's configured model when set. Unlike every
//! other adapter, a non-2xx upstream reply is relayed to the client as-is
//! rather than translated into a structured `upstream_error` body.

use async_trait::async_trait;
use bytes::Bytes;
use futures_util::StreamExt;
use reqwest::RequestBuilder;
use serde_json::Value;

use super::{Adapter, AdapterError, BufferedReply, ChunkStream, ProxyContext, StreamingReply, UsageSink};
use crate::config::UpstreamDescriptor;
use crate::util::chat_completions_url;

pub struct OpenAiCompatAdapter;

fn apply_headers(mut req: RequestBuilder, upstream: &UpstreamDescriptor) -> RequestBuilder {
    if let Some(key) = &upstream.api_key {
        req = req.bearer_auth(key);
    }
    for (name, value) in &upstream.extra_headers {
        req = req.header(name, value);
    }
    req
}

fn build_outbound_body(ctx: &ProxyContext<'_>, stream: bool) -> Value {
    let mut body = serde_json::to_value(ctx.request).unwrap_or(Value::Null);
    if let Some(model) = &ctx.upstream.model {
        body["model"] = Value::String(model.clone());
    }
    body["stream"] = Value::Bool(stream);
    body
}

#[async_trait]
impl Adapter for OpenAiCompatAdapter {
    async fn buffered(&self, ctx: &ProxyContext<'_>) -> Result<BufferedReply, AdapterError> {
        let url = chat_completions_url(ctx.upstream.base_url.as_deref().unwrap_or_default());
        let body = build_outbound_body(ctx, false);
        let req = apply_headers(ctx.http.post(url).json(&body), ctx.upstream);
        let response = req
            .send()
            .await
            .map_err(|e| AdapterError::Transport(e.to_string()))?;
        let status = response.status().as_u16();
        let text = response
            .text()
            .await
            .map_err(|e| AdapterError::Transport(e.to_string()))?;

        let value: Value = serde_json::from_str(&text).unwrap_or(Value::String(text));
        let usage = value.get("usage").cloned().filter(|u| !u.is_null());

        Ok(BufferedReply {
            status,
            body: value,
            usage,
        })
    }

    async fn streaming(&self, ctx: &ProxyContext<'_>) -> Result<StreamingReply, AdapterError> {
        let url = chat_completions_url(ctx.upstream.base_url.as_deref().unwrap_or_default());
        let body = build_outbound_body(ctx, true);
        let req = apply_headers(ctx.http.post(url).json(&body), ctx.upstream);
        let response = req
            .send()
            .await
            .map_err(|e| AdapterError::Transport(e.to_string()))?;
        let status = response.status();

        if !status.is_success() {
            let text = response.text().await.unwrap_or_default();
            let chunk: ChunkStream = Box::pin(futures_util::stream::once(async move {
                Ok(Bytes::from(text))
            }));
            return Ok(StreamingReply {
                status: status.as_u16(),
                chunks: chunk,
                usage: UsageSink::default(),
            });
        }

        let usage = UsageSink::default();
        let usage_for_scan = usage.clone();
        let mut buffer = crate::sse::SseLineBuffer::new();

        let chunks: ChunkStream = Box::pin(response.bytes_stream().map(move |result| {
            let bytes = result.map_err(|e| AdapterError::Transport(e.to_string()))?;
            for payload in buffer.push(&bytes) {
                if payload == "[DONE]" {
                    continue;
                }
                if let Ok(value) = serde_json::from_str::<Value>(&payload)
                    && let Some(found) = value.get("usage")
                    && !found.is_null()
                {
                    usage_for_scan.set(found.clone());
                }
            }
            Ok(bytes)
        }));

        Ok(StreamingReply {
            status: status.as_u16(),
            chunks,
            usage,
        })
    }
}
