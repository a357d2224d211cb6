use super::*;

fn disabled_config() -> CacheConfig {
    CacheConfig {
        enabled: false,
        redis_url: None,
        ttl_ms: 60_000,
        max_entries: 100,
    }
}

fn memory_config() -> CacheConfig {
    CacheConfig {
        enabled: true,
        redis_url: None,
        ttl_ms: 60_000,
        max_entries: 100,
    }
}

#[tokio::test]
async fn disabled_cache_is_inert() {
    let handle = DecisionCacheHandle::from_config(&disabled_config()).await;
    handle.set("fp", "1").await;
    assert_eq!(handle.get("fp").await, None);
}

#[tokio::test]
async fn memory_backend_is_read_your_writes() {
    let handle = DecisionCacheHandle::from_config(&memory_config()).await;
    assert_eq!(handle.get("fp").await, None);
    handle.set("fp", "1").await;
    assert_eq!(handle.get("fp").await, Some("1".to_string()));
}

#[tokio::test]
async fn unreachable_remote_falls_back_to_memory() {
    let config = CacheConfig {
        enabled: true,
        redis_url: Some("redis://127.0.0.1:1/".to_string()),
        ttl_ms: 60_000,
        max_entries: 100,
    };
    // Connecting should fail fast (nothing listens on DB index 1 of a bogus
    // port in test environments); the handle should still be usable because
    // construction falls back to the in-process backend rather than erroring.
    let handle = DecisionCacheHandle::from_config(&config).await;
    handle.set("fp", "2").await;
    assert_eq!(handle.get("fp").await, Some("2".to_string()));
    assert_eq!(handle.backend(), CacheBackendKind::Memory);
}

#[tokio::test]
async fn backend_kind_reflects_disabled_and_memory_selection() {
    let disabled = DecisionCacheHandle::from_config(&disabled_config()).await;
    assert_eq!(disabled.backend(), CacheBackendKind::Disabled);

    let memory = DecisionCacheHandle::from_config(&memory_config()).await;
    assert_eq!(memory.backend(), CacheBackendKind::Memory);
}

#[test]
fn backend_kind_as_str_matches_display() {
    assert_eq!(CacheBackendKind::Disabled.as_str(), "disabled");
    assert_eq!(CacheBackendKind::Memory.to_string(), "memory");
    assert_eq!(CacheBackendKind::Redis.to_string(), "redis");
}
