use super::*;
use crate::config::UpstreamDescriptor;

fn upstream(base_url: &str, api_key: Option<&str>) -> UpstreamDescriptor {
    UpstreamDescriptor {
        base_url: Some(base_url.to_string()),
        api_key: api_key.map(str::to_string),
        ..Default::default()
    }
}

#[test]
fn resolve_provider_takes_explicit_tag_literally_even_with_a_mismatched_host() {
    let mut u = upstream("https://api.anthropic.com", None);
    u.provider = Some(ProviderTag::OpenAi);
    assert_eq!(resolve_provider(&u), ProviderTag::OpenAi);
}

#[test]
fn resolve_provider_infers_from_host_when_auto() {
    let mut u = upstream("https://api.anthropic.com", None);
    u.provider = Some(ProviderTag::Auto);
    assert_eq!(resolve_provider(&u), ProviderTag::Anthropic);
}

#[test]
fn resolve_provider_accepts_both_cohere_hosts() {
    let ai = upstream("https://api.cohere.ai", None);
    let com = upstream("https://api.cohere.com", None);
    assert_eq!(resolve_provider(&ai), ProviderTag::Cohere);
    assert_eq!(resolve_provider(&com), ProviderTag::Cohere);
}

#[test]
fn resolve_provider_falls_back_to_api_key_prefix() {
    let u = upstream("https://my-proxy.internal", Some("sk-ant-abc123"));
    assert_eq!(resolve_provider(&u), ProviderTag::Anthropic);
}

#[test]
fn resolve_provider_falls_back_to_gemini_api_key_prefix() {
    let u = upstream("https://my-proxy.internal", Some("AIzaSyFoo"));
    assert_eq!(resolve_provider(&u), ProviderTag::Gemini);
}

#[test]
fn resolve_provider_defaults_to_openai_compatible() {
    let u = upstream("https://my-proxy.internal", None);
    assert_eq!(resolve_provider(&u), ProviderTag::OpenAiCompatible);
}

#[test]
fn adapter_for_every_resolvable_tag_succeeds() {
    for tag in [
        ProviderTag::OpenAiCompatible,
        ProviderTag::OpenRouter,
        ProviderTag::OpenAi,
        ProviderTag::Mistral,
        ProviderTag::Groq,
        ProviderTag::Together,
        ProviderTag::Perplexity,
        ProviderTag::Anthropic,
        ProviderTag::Gemini,
        ProviderTag::Cohere,
        ProviderTag::AzureOpenAi,
    ] {
        assert!(adapter_for(tag).is_ok(), "{tag:?} should resolve an adapter");
    }
}

#[test]
fn adapter_for_auto_is_unsupported() {
    assert!(matches!(
        adapter_for(ProviderTag::Auto),
        Err(AdapterError::ProviderNotSupported)
    ));
}

#[test]
fn openai_completion_wraps_content_and_usage() {
    let usage = serde_json::json!({"total_tokens": 5});
    let value = openai_completion("gpt-test", "hello", Some(usage.clone()));
    assert_eq!(value["object"], "chat.completion");
    assert_eq!(value["model"], "gpt-test");
    assert_eq!(value["choices"][0]["message"]["content"], "hello");
    assert_eq!(value["usage"], usage);
}

#[test]
fn openai_chunk_content_delta_has_no_finish_reason() {
    let value = openai_chunk("gpt-test", Some("hi"), None);
    assert_eq!(value["object"], "chat.completion.chunk");
    assert_eq!(value["choices"][0]["delta"]["content"], "hi");
    assert!(value["choices"][0]["finish_reason"].is_null());
}

#[test]
fn openai_chunk_terminator_has_empty_delta() {
    let value = openai_chunk("gpt-test", None, Some("stop"));
    assert_eq!(value["choices"][0]["delta"], serde_json::json!({}));
    assert_eq!(value["choices"][0]["finish_reason"], "stop");
}

#[test]
fn sse_frame_wraps_json_as_one_data_line() {
    let bytes = sse_frame(&serde_json::json!({"a": 1}));
    assert_eq!(&bytes[..], b"data: {\"a\":1}\n\n");
}

#[test]
fn sse_done_is_the_literal_terminator() {
    assert_eq!(&sse_done()[..], b"data: [DONE]\n\n");
}

#[test]
fn flatten_messages_coerces_array_content_to_text() {
    let request: ChatCompletionRequest = serde_json::from_value(serde_json::json!({
        "messages": [
            {"role": "system", "content": "be terse"},
            {"role": "user", "content": [{"type": "text", "text": "hi"}]},
        ]
    }))
    .unwrap();
    let flattened = flatten_messages(&request);
    assert_eq!(flattened[0], ("system".to_string(), "be terse".to_string()));
    assert_eq!(flattened[1].0, "user");
    assert!(flattened[1].1.contains("hi"));
}

#[tokio::test]
async fn flatten_frame_results_unwraps_ok_frames_into_the_flat_stream() {
    use futures_util::StreamExt;

    let source = futures_util::stream::iter(vec![
        Ok::<_, AdapterError>(vec![Bytes::from_static(b"a"), Bytes::from_static(b"b")]),
        Ok(vec![]),
        Ok(vec![Bytes::from_static(b"c")]),
    ]);
    let flat: Vec<_> = flatten_frame_results(source).collect().await;
    let bytes: Vec<Bytes> = flat.into_iter().map(|r| r.unwrap()).collect();
    assert_eq!(bytes, vec![Bytes::from_static(b"a"), Bytes::from_static(b"b"), Bytes::from_static(b"c")]);
}

#[tokio::test]
async fn flatten_frame_results_surfaces_errors() {
    use futures_util::StreamExt;

    let source = futures_util::stream::iter(vec![Err::<Vec<Bytes>, _>(AdapterError::Transport(
        "boom".into(),
    ))]);
    let flat: Vec<_> = flatten_frame_results(source).collect().await;
    assert_eq!(flat.len(), 1);
    assert!(flat[0].is_err());
}
