//! The routing entry point plus the three read-only status endpoints.

use std::pin::Pin;
use std::sync::Arc;
use std::task::{Context, Poll};

use axum::Json;
use axum::http::{HeaderName, HeaderValue, StatusCode, header};
use axum::response::{IntoResponse, Response};
use bytes::Bytes;
use futures_util::Stream;
use serde_json::{Value, json};

use triroute::{
    ChatCompletionRequest, ChunkStream, Config, Decision, ProxyContext, Route, RouteKey,
    UsageAggregator, UsageSink, adapter_for, hash_payload, resolve_provider,
};

use crate::error::RouterError;
use crate::state::AppState;

/// `POST /v1/chat/completions`.
#[tracing::instrument(skip(state, body), fields(fingerprint, decision, route))]
pub async fn chat_completions_handler(
    state: axum::extract::State<AppState>,
    body: Bytes,
) -> Response {
    match route_chat_completion(&state.0, body).await {
        Ok(response) => response,
        Err(err) => err.into_response(),
    }
}

async fn route_chat_completion(state: &AppState, body: Bytes) -> Result<Response, RouterError> {
    let raw: Value = serde_json::from_slice(&body).map_err(|_| RouterError::InvalidRequest)?;
    if raw.get("messages").is_none() {
        return Err(RouterError::InvalidRequest);
    }
    let request: ChatCompletionRequest =
        serde_json::from_value(raw).map_err(|_| RouterError::InvalidRequest)?;

    let decision = decide(state, &request).await;
    let route = decision.route();

    let span = tracing::Span::current();
    span.record("decision", decision.as_str());
    span.record("route", route.as_str());

    let upstream = upstream_for(&state.config, route).ok_or_else(|| {
        RouterError::Internal(format!("no upstream configured for route {route}"))
    })?;

    let tag = resolve_provider(upstream);
    let adapter = adapter_for(tag)?;

    let ctx = ProxyContext {
        http: &state.http,
        request: &request,
        upstream,
        anthropic_version: &state.config.anthropic_version,
        anthropic_max_tokens: state.config.anthropic_max_tokens,
        azure_api_version: &state.config.azure_api_version,
    };

    if request.wants_stream() {
        serve_streaming(state, adapter.as_ref(), &ctx, decision, route, upstream).await
    } else {
        serve_buffered(state, adapter.as_ref(), &ctx, decision, route, upstream).await
    }
}

/// Fingerprint → cache lookup → (miss) classify → cache store, degrading to
/// `Decision::Frontier` on a disabled classifier or any classifier failure.
async fn decide(state: &AppState, request: &ChatCompletionRequest) -> Decision {
    let Some(classifier) = &state.classifier else {
        return Decision::Frontier;
    };

    let fingerprint = hash_payload(request);
    tracing::Span::current().record("fingerprint", fingerprint.as_str());

    if let Some(cached) = state.cache.get(&fingerprint).await
        && let Some(decision) = cached.parse::<u8>().ok().and_then(Decision::from_digit)
    {
        return decision;
    }

    match classifier.classify(request).await {
        Ok(decision) => {
            state.cache.set(&fingerprint, decision.as_str()).await;
            decision
        }
        Err(err) => {
            tracing::warn!(error = %err, "classifier failed, falling back to frontier");
            Decision::Frontier
        }
    }
}

fn upstream_for(config: &Config, route: Route) -> Option<&triroute::UpstreamDescriptor> {
    match route {
        Route::Cheap => config.cheap.as_ref(),
        Route::Medium => config.medium.as_ref(),
        Route::Frontier => config.frontier.as_ref(),
    }
}

async fn serve_buffered(
    state: &AppState,
    adapter: &dyn triroute::Adapter,
    ctx: &ProxyContext<'_>,
    decision: Decision,
    route: Route,
    upstream: &triroute::UpstreamDescriptor,
) -> Result<Response, RouterError> {
    let reply = adapter.buffered(ctx).await?;
    state
        .usage
        .record(RouteKey::from(route), reply.usage.as_ref());

    let status = StatusCode::from_u16(reply.status).unwrap_or(StatusCode::OK);
    let mut response = (status, Json(reply.body)).into_response();
    set_decision_headers(&mut response, &state.config, decision, upstream);
    Ok(response)
}

async fn serve_streaming(
    state: &AppState,
    adapter: &dyn triroute::Adapter,
    ctx: &ProxyContext<'_>,
    decision: Decision,
    route: Route,
    upstream: &triroute::UpstreamDescriptor,
) -> Result<Response, RouterError> {
    let reply = adapter.streaming(ctx).await?;
    let status = StatusCode::from_u16(reply.status).unwrap_or(StatusCode::OK);

    let recording = UsageRecordingStream {
        inner: reply.chunks,
        sink: reply.usage,
        aggregator: state.usage.clone(),
        route: RouteKey::from(route),
    };

    let mut response = Response::builder()
        .status(status)
        .header(header::CONTENT_TYPE, "text/event-stream")
        .body(axum::body::Body::from_stream(recording))
        .map_err(|e| RouterError::Internal(e.to_string()))?;
    set_decision_headers(&mut response, &state.config, decision, upstream);
    Ok(response)
}

fn set_decision_headers(
    response: &mut Response,
    config: &Config,
    decision: Decision,
    upstream: &triroute::UpstreamDescriptor,
) {
    let headers = response.headers_mut();
    if let Ok(name) = HeaderName::from_bytes(config.decision_header.as_bytes())
        && let Ok(value) = HeaderValue::from_str(decision.as_str())
    {
        headers.insert(name, value);
    }
    if let Ok(name) = HeaderName::from_bytes(config.upstream_header.as_bytes())
        && let Ok(value) = HeaderValue::from_str(&upstream.name)
    {
        headers.insert(name, value);
    }
}

/// Wraps a [`ChunkStream`] so that, once the stream is fully dropped (drained
/// by the client or the connection closed early), whatever usage the adapter
/// recorded into its [`UsageSink`] is folded into the aggregator exactly once.
///
/// `ChunkStream` is `Pin<Box<dyn Stream + Send>>`, and `Box` is always
/// `Unpin`, so this wrapper is trivially `Unpin` too and needs no
/// `pin-project`-style machinery to implement `poll_next`.
struct UsageRecordingStream {
    inner: ChunkStream,
    sink: UsageSink,
    aggregator: Arc<UsageAggregator>,
    route: RouteKey,
}

impl Stream for UsageRecordingStream {
    type Item = Result<Bytes, triroute::AdapterError>;

    fn poll_next(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        let this = self.get_mut();
        this.inner.as_mut().poll_next(cx)
    }
}

impl Drop for UsageRecordingStream {
    fn drop(&mut self) {
        let usage = self.sink.take();
        self.aggregator.record(self.route, usage.as_ref());
    }
}

/// `GET /health`: liveness plus a config echo.
pub async fn health_handler(state: axum::extract::State<AppState>) -> Response {
    let state = &state.0;
    let body = json!({
        "status": "ok",
        "classifier": {
            "enabled": state.config.classifier.enabled,
            "base_url": state.config.classifier.base_url,
        },
        "upstreams": {
            "cheap": state.config.cheap.as_ref().and_then(|u| u.base_url.clone()),
            "medium": state.config.medium.as_ref().and_then(|u| u.base_url.clone()),
            "frontier": state.config.frontier.as_ref().and_then(|u| u.base_url.clone()),
        },
        "cache": {
            "enabled": state.config.cache.enabled,
            "backend": state.cache.backend().as_str(),
        },
    });
    (StatusCode::OK, Json(body)).into_response()
}

/// `GET /usage`: `UsageAggregator::snapshot()`.
pub async fn usage_handler(state: axum::extract::State<AppState>) -> Response {
    (StatusCode::OK, Json(state.0.usage.snapshot())).into_response()
}

const DASHBOARD_HTML: &str = r#"<!doctype html>
<html lang="en">
<head>
<meta charset="utf-8">
<title>triroute</title>
</head>
<body>
<h1>triroute</h1>
<p>Read-only status. See <code>GET /health</code> for configuration and
<code>GET /usage</code> for live per-route token counters.</p>
</body>
</html>
"#;

/// `GET /dashboard`: static HTML page.
pub async fn dashboard_handler() -> Response {
    (
        StatusCode::OK,
        [(header::CONTENT_TYPE, "text/html; charset=utf-8")],
        DASHBOARD_HTML,
    )
        .into_response()
}
