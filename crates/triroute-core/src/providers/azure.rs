//! Azure OpenAI deployment-routing adapter.
//!
//! Unlike the other translating adapters, the wire body is the inbound
//! payload itself (minus `model`, which Azure resolves from the deployment
//! path instead) — only the URL and auth header differ from a plain OpenAI
//! call.

use async_trait::async_trait;
use bytes::Bytes;
use futures_util::StreamExt;
use percent_encoding::{NON_ALPHANUMERIC, utf8_percent_encode};
use reqwest::RequestBuilder;
use serde_json::Value;

use super::{Adapter, AdapterError, BufferedReply, ChunkStream, ProxyContext, StreamingReply, UsageSink};
use crate::util::normalize_base_url;

pub struct AzureAdapter;

fn endpoint_url(ctx: &ProxyContext<'_>) -> Result<String, AdapterError> {
    let deployment = ctx
        .upstream
        .deployment
        .as_deref()
        .ok_or(AdapterError::MissingField("deployment"))?;
    let base = normalize_base_url(ctx.upstream.base_url.as_deref().unwrap_or_default());
    let api_version = ctx
        .upstream
        .api_version
        .as_deref()
        .unwrap_or(ctx.azure_api_version);

    let url = if base.contains("/openai/deployments/") {
        if base.ends_with("/chat/completions") {
            base
        } else {
            format!("{base}/chat/completions")
        }
    } else {
        let encoded = utf8_percent_encode(deployment, NON_ALPHANUMERIC).to_string();
        format!("{base}/openai/deployments/{encoded}/chat/completions")
    };

    Ok(format!("{url}?api-version={api_version}"))
}

fn apply_auth(req: RequestBuilder, api_key: Option<&str>) -> RequestBuilder {
    match api_key {
        Some(key) if key.starts_with("Bearer ") => req.header("authorization", key),
        Some(key) => req.header("api-key", key),
        None => req,
    }
}

fn build_body(ctx: &ProxyContext<'_>, stream: bool) -> Value {
    let mut body = serde_json::to_value(ctx.request).unwrap_or(Value::Null);
    if let Value::Object(map) = &mut body {
        map.remove("model");
    }
    body["stream"] = Value::Bool(stream);
    body
}

#[async_trait]
impl Adapter for AzureAdapter {
    async fn buffered(&self, ctx: &ProxyContext<'_>) -> Result<BufferedReply, AdapterError> {
        let url = endpoint_url(ctx)?;
        let body = build_body(ctx, false);
        let req = apply_auth(ctx.http.post(url).json(&body), ctx.upstream.api_key.as_deref());
        let response = req
            .send()
            .await
            .map_err(|e| AdapterError::Transport(e.to_string()))?;
        let status = response.status().as_u16();
        let content_type = response
            .headers()
            .get("content-type")
            .and_then(|v| v.to_str().ok())
            .unwrap_or_default()
            .to_string();
        let text = response
            .text()
            .await
            .map_err(|e| AdapterError::Transport(e.to_string()))?;

        let body = if content_type.contains("json") {
            serde_json::from_str(&text).unwrap_or(Value::String(text))
        } else {
            Value::String(text)
        };
        let usage = body.get("usage").cloned().filter(|u| !u.is_null());

        Ok(BufferedReply { status, body, usage })
    }

    async fn streaming(&self, ctx: &ProxyContext<'_>) -> Result<StreamingReply, AdapterError> {
        let url = endpoint_url(ctx)?;
        let body = build_body(ctx, true);
        let req = apply_auth(ctx.http.post(url).json(&body), ctx.upstream.api_key.as_deref());
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
