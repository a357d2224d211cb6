use super::*;

#[test]
fn provider_tag_parses_known_aliases() {
    assert_eq!(ProviderTag::parse("anthropic"), Some(ProviderTag::Anthropic));
    assert_eq!(ProviderTag::parse("gemini"), Some(ProviderTag::Gemini));
    assert_eq!(ProviderTag::parse("cohere"), Some(ProviderTag::Cohere));
    assert_eq!(ProviderTag::parse("azure_openai"), Some(ProviderTag::AzureOpenAi));
    assert_eq!(ProviderTag::parse("auto"), Some(ProviderTag::Auto));
    assert_eq!(ProviderTag::parse(""), Some(ProviderTag::Auto));
}

#[test]
fn provider_tag_rejects_unknown() {
    assert_eq!(ProviderTag::parse("not-a-provider"), None);
}

#[test]
fn openai_family_covers_all_aliases() {
    for tag in [
        ProviderTag::OpenAiCompatible,
        ProviderTag::OpenRouter,
        ProviderTag::OpenAi,
        ProviderTag::Mistral,
        ProviderTag::Groq,
        ProviderTag::Together,
        ProviderTag::Perplexity,
    ] {
        assert!(tag.is_openai_family());
    }
    assert!(!ProviderTag::Anthropic.is_openai_family());
}

#[test]
fn validate_requires_frontier_base_url() {
    let config = Config {
        port: 8080,
        host: "0.0.0.0".into(),
        body_limit: 1024,
        router_api_key: None,
        decision_header: "x".into(),
        upstream_header: "y".into(),
        classifier: test_classifier(false),
        cache: test_cache(),
        cheap: None,
        medium: None,
        frontier: None,
        anthropic_version: "2023-06-01".into(),
        anthropic_max_tokens: 1024,
        azure_api_version: "2024-10-21".into(),
    };
    assert!(matches!(
        config.validate(),
        Err(ConfigError::MissingFrontierBaseUrl)
    ));
}

#[test]
fn validate_requires_cheap_and_medium_when_classifier_enabled() {
    let mut config = base_config();
    config.classifier.enabled = true;
    config.cheap = None;
    assert!(matches!(
        config.validate(),
        Err(ConfigError::TierSuppressedWhileRequired { tier: "cheap" })
    ));

    config.cheap = Some(UpstreamDescriptor::default());
    assert!(matches!(
        config.validate(),
        Err(ConfigError::MissingTierBaseUrl { tier: "cheap" })
    ));
}

#[test]
fn validate_passes_with_frontier_only_and_classifier_disabled() {
    let config = base_config();
    assert!(config.validate().is_ok());
}

#[test]
fn co_located_cheap_model_is_forced_to_classifier_model() {
    // This mirrors Config::from_env's co-location step directly, since
    // constructing it via from_env would require mutating process env vars.
    let classifier = test_classifier(true);
    let mut cheap = UpstreamDescriptor {
        base_url: Some("http://localhost:8000/".to_string()),
        model: Some("some-other-weights".to_string()),
        ..Default::default()
    };

    if cheap.normalized_base_url() == Some(classifier.normalized_base_url()) {
        cheap.model = Some(classifier.model.clone());
    }

    assert_eq!(cheap.model.as_deref(), Some("classifier-model"));
}

fn test_classifier(enabled: bool) -> ClassifierConfig {
    ClassifierConfig {
        enabled,
        base_url: "http://localhost:8000".to_string(),
        api_key: None,
        model: "classifier-model".to_string(),
        system_prompt: "classify".to_string(),
        strategy: ClassifierStrategy::LastUser,
        max_chars: 8000,
        max_tokens: 1,
        temperature: 0.0,
        timeout_ms: 800,
        logit_bias: None,
        force_stream: true,
        warmup: false,
        warmup_delay_ms: 0,
        keep_alive_ms: 0,
        loading_retry_ms: 1200,
        loading_max_retries: 2,
    }
}

fn test_cache() -> CacheConfig {
    CacheConfig {
        enabled: true,
        redis_url: None,
        ttl_ms: 3_600_000,
        max_entries: 50_000,
    }
}

fn base_config() -> Config {
    Config {
        port: 8080,
        host: "0.0.0.0".into(),
        body_limit: 1024,
        router_api_key: None,
        decision_header: "x".into(),
        upstream_header: "y".into(),
        classifier: test_classifier(false),
        cache: test_cache(),
        cheap: None,
        medium: None,
        frontier: Some(UpstreamDescriptor {
            base_url: Some("http://frontier.example".to_string()),
            ..Default::default()
        }),
        anthropic_version: "2023-06-01".into(),
        anthropic_max_tokens: 1024,
        azure_api_version: "2024-10-21".into(),
    }
}
