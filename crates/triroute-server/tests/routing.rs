//! In-process HTTP integration tests for the routing entry point and the
//! read-only status endpoints, driven through `tower::ServiceExt::oneshot`
//! against `create_router` with a real `axum::Router` but stubbed vendor
//! endpoints (`wiremock`) standing in for the classifier and upstreams.

use std::time::Duration;

use http_body_util::BodyExt;
use hyper::{Request, StatusCode};
use serde_json::{Value, json};
use tower::ServiceExt;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

use triroute::config::{CacheConfig, ClassifierConfig, ProviderTag, UpstreamDescriptor};
use triroute::fingerprint::ClassifierStrategy;
use triroute::{Config, DecisionCacheHandle};
use triroute_server::{AppState, create_router};

fn upstream(name: &str, base_url: &str) -> UpstreamDescriptor {
    UpstreamDescriptor {
        name: name.to_string(),
        provider: Some(ProviderTag::OpenAiCompatible),
        base_url: Some(base_url.to_string()),
        api_key: None,
        model: None,
        deployment: None,
        api_version: None,
        extra_headers: Default::default(),
        timeout_ms: 5_000,
    }
}

fn base_config(frontier_url: &str) -> Config {
    Config {
        port: 8080,
        host: "0.0.0.0".to_string(),
        body_limit: 1024 * 1024,
        router_api_key: None,
        decision_header: "x-openrouter-decision".to_string(),
        upstream_header: "x-openrouter-upstream".to_string(),
        classifier: ClassifierConfig {
            enabled: false,
            base_url: "http://127.0.0.1:1".to_string(),
            api_key: None,
            model: "classifier".to_string(),
            system_prompt: "Classify.".to_string(),
            strategy: ClassifierStrategy::LastUser,
            max_chars: 8000,
            max_tokens: 1,
            temperature: 0.0,
            timeout_ms: 200,
            logit_bias: None,
            force_stream: false,
            warmup: false,
            warmup_delay_ms: 0,
            keep_alive_ms: 0,
            loading_retry_ms: 50,
            loading_max_retries: 0,
        },
        cache: CacheConfig {
            enabled: false,
            redis_url: None,
            ttl_ms: 60_000,
            max_entries: 100,
        },
        cheap: Some(upstream("cheap", frontier_url)),
        medium: Some(upstream("medium", frontier_url)),
        frontier: Some(upstream("frontier", frontier_url)),
        anthropic_version: "2023-06-01".to_string(),
        anthropic_max_tokens: 1024,
        azure_api_version: "2024-10-21".to_string(),
    }
}

async fn app_with_config(config: Config) -> axum::Router {
    let cache = DecisionCacheHandle::from_config(&config.cache).await;
    create_router(AppState::new(config, cache))
}

fn chat_body() -> Value {
    json!({"messages": [{"role": "user", "content": "hello there"}]})
}

#[tokio::test]
async fn unauthenticated_request_is_rejected_when_a_key_is_configured() {
    let mock = MockServer::start().await;
    let mut config = base_config(&mock.uri());
    config.router_api_key = Some("secret-key".to_string());
    let app = app_with_config(config).await;

    let response = app
        .oneshot(
            Request::post("/v1/chat/completions")
                .header("content-type", "application/json")
                .body(axum::body::Body::from(chat_body().to_string()))
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn request_with_correct_bearer_token_is_admitted() {
    let mock = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/v1/chat/completions"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "choices": [{"message": {"role": "assistant", "content": "hi"}}],
            "usage": {"prompt_tokens": 3, "completion_tokens": 2, "total_tokens": 5},
        })))
        .mount(&mock)
        .await;

    let mut config = base_config(&mock.uri());
    config.router_api_key = Some("secret-key".to_string());
    let app = app_with_config(config).await;

    let response = app
        .oneshot(
            Request::post("/v1/chat/completions")
                .header("content-type", "application/json")
                .header("authorization", "Bearer secret-key")
                .body(axum::body::Body::from(chat_body().to_string()))
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
}

#[tokio::test]
async fn missing_messages_field_yields_bad_request() {
    let mock = MockServer::start().await;
    let app = app_with_config(base_config(&mock.uri())).await;

    let response = app
        .oneshot(
            Request::post("/v1/chat/completions")
                .header("content-type", "application/json")
                .body(axum::body::Body::from(json!({}).to_string()))
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn malformed_json_yields_bad_request() {
    let mock = MockServer::start().await;
    let app = app_with_config(base_config(&mock.uri())).await;

    let response = app
        .oneshot(
            Request::post("/v1/chat/completions")
                .header("content-type", "application/json")
                .body(axum::body::Body::from("not json"))
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn disabled_classifier_routes_to_frontier_and_stamps_decision_headers() {
    let mock = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/v1/chat/completions"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "choices": [{"message": {"role": "assistant", "content": "hi"}}],
            "usage": {"prompt_tokens": 3, "completion_tokens": 2, "total_tokens": 5},
        })))
        .mount(&mock)
        .await;

    let app = app_with_config(base_config(&mock.uri())).await;

    let response = app
        .oneshot(
            Request::post("/v1/chat/completions")
                .header("content-type", "application/json")
                .body(axum::body::Body::from(chat_body().to_string()))
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(
        response.headers().get("x-openrouter-decision").unwrap(),
        "2"
    );
    assert_eq!(
        response.headers().get("x-openrouter-upstream").unwrap(),
        "frontier"
    );
}

#[tokio::test]
async fn cached_decision_is_honored_without_calling_the_classifier() {
    // The classifier base URL points nowhere reachable; if `decide` ever
    // called it, the request would time out and fall back to frontier
    // rather than the cached `medium` decision asserted below.
    let mock = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/v1/chat/completions"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "choices": [{"message": {"role": "assistant", "content": "hi"}}],
        })))
        .mount(&mock)
        .await;

    let mut config = base_config(&mock.uri());
    config.classifier.enabled = true;
    let cache = DecisionCacheHandle::from_config(&config.cache).await;

    let fingerprint = {
        let request: triroute::ChatCompletionRequest =
            serde_json::from_value(chat_body()).unwrap();
        triroute::hash_payload(&request)
    };
    cache.set(&fingerprint, "1").await;

    let app = create_router(AppState::new(config, cache));

    let response = app
        .oneshot(
            Request::post("/v1/chat/completions")
                .header("content-type", "application/json")
                .body(axum::body::Body::from(chat_body().to_string()))
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(
        response.headers().get("x-openrouter-decision").unwrap(),
        "1"
    );
    assert_eq!(
        response.headers().get("x-openrouter-upstream").unwrap(),
        "medium"
    );
}

#[tokio::test]
async fn classifier_failure_degrades_to_frontier() {
    let mock = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/v1/chat/completions"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "choices": [{"message": {"role": "assistant", "content": "hi"}}],
        })))
        .mount(&mock)
        .await;

    let mut config = base_config(&mock.uri());
    config.classifier.enabled = true;
    config.classifier.base_url = "http://127.0.0.1:1".to_string();
    config.classifier.timeout_ms = 100;
    let app = app_with_config(config).await;

    let response = app
        .oneshot(
            Request::post("/v1/chat/completions")
                .header("content-type", "application/json")
                .body(axum::body::Body::from(chat_body().to_string()))
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(
        response.headers().get("x-openrouter-decision").unwrap(),
        "2"
    );
}

#[tokio::test]
async fn health_endpoint_reports_configuration() {
    let mock = MockServer::start().await;
    let app = app_with_config(base_config(&mock.uri())).await;

    let response = app
        .oneshot(Request::get("/health").body(axum::body::Body::empty()).unwrap())
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    let body: Value = serde_json::from_slice(&bytes).unwrap();
    assert_eq!(body["status"], "ok");
    assert_eq!(body["classifier"]["enabled"], false);
    assert_eq!(body["cache"]["backend"], "disabled");
}

#[tokio::test]
async fn usage_endpoint_reflects_a_completed_request() {
    let mock = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/v1/chat/completions"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "choices": [{"message": {"role": "assistant", "content": "hi"}}],
            "usage": {"prompt_tokens": 10, "completion_tokens": 4, "total_tokens": 14},
        })))
        .mount(&mock)
        .await;

    let app = app_with_config(base_config(&mock.uri())).await;

    let chat_response = app
        .clone()
        .oneshot(
            Request::post("/v1/chat/completions")
                .header("content-type", "application/json")
                .body(axum::body::Body::from(chat_body().to_string()))
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(chat_response.status(), StatusCode::OK);

    let usage_response = app
        .oneshot(Request::get("/usage").body(axum::body::Body::empty()).unwrap())
        .await
        .unwrap();
    assert_eq!(usage_response.status(), StatusCode::OK);
    let bytes = usage_response.into_body().collect().await.unwrap().to_bytes();
    let body: Value = serde_json::from_slice(&bytes).unwrap();
    assert_eq!(body["frontier"]["requests"], 1);
    assert_eq!(body["frontier"]["total_tokens"], 14);
}

#[tokio::test]
async fn dashboard_serves_html() {
    let mock = MockServer::start().await;
    let app = app_with_config(base_config(&mock.uri())).await;

    let response = app
        .oneshot(
            Request::get("/dashboard")
                .body(axum::body::Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(
        response.headers().get("content-type").unwrap(),
        "text/html; charset=utf-8"
    );
}

#[tokio::test]
async fn upstream_error_is_relayed_as_is_for_the_openai_compatible_adapter() {
    let mock = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/v1/chat/completions"))
        .respond_with(
            ResponseTemplate::new(429)
                .set_body_json(json!({"error": {"message": "rate limited"}}))
                .set_delay(Duration::from_millis(0)),
        )
        .mount(&mock)
        .await;

    let app = app_with_config(base_config(&mock.uri())).await;

    let response = app
        .oneshot(
            Request::post("/v1/chat/completions")
                .header("content-type", "application/json")
                .body(axum::body::Body::from(chat_body().to_string()))
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::TOO_MANY_REQUESTS);
}
