//! Process-wide per-route token usage aggregation.
//!
//! [`UsageAggregator`] owns four buckets — one per route plus `unknown` — and
//! is the single place usage is ever mutated. Every vendor usage object that
//! reaches [`UsageAggregator::record`] is normalized against one of three
//! recognized schemas before being folded in; unrecognized or absent usage
//! still counts the request but never fails.

use std::sync::Mutex;

use serde::Serialize;
use serde_json::Value;

use crate::payload::Route;

/// Which bucket a usage record lands in. Mirrors [`Route`] plus an `Unknown`
/// catch-all for callers that can't attribute a request to a tier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RouteKey {
    /// See [`Route::Cheap`].
    Cheap,
    /// See [`Route::Medium`].
    Medium,
    /// See [`Route::Frontier`].
    Frontier,
    /// No route could be attributed to this request.
    Unknown,
}

impl From<Route> for RouteKey {
    fn from(route: Route) -> Self {
        match route {
            Route::Cheap => Self::Cheap,
            Route::Medium => Self::Medium,
            Route::Frontier => Self::Frontier,
        }
    }
}

/// One bucket's counters.
#[derive(Debug, Clone, Copy, Default, Serialize)]
pub struct RouteBucket {
    /// Summed prompt/input tokens across every usage-bearing request.
    pub prompt_tokens: u64,
    /// Summed completion/output tokens across every usage-bearing request.
    pub completion_tokens: u64,
    /// Summed total tokens (vendor-reported, or `prompt + completion` when absent).
    pub total_tokens: u64,
    /// Every request recorded for this route, with or without usage.
    pub requests: u64,
    /// Requests whose usage object was successfully normalized.
    pub with_usage: u64,
    /// Unix epoch milliseconds of the last mutation, `None` if never touched.
    pub last_updated: Option<i64>,
}

impl RouteBucket {
    fn add(&mut self, usage: &NormalizedUsage, now_ms: i64) {
        self.prompt_tokens += usage.prompt;
        self.completion_tokens += usage.completion;
        self.total_tokens += usage.total;
        self.with_usage += 1;
        self.last_updated = Some(now_ms);
    }

    fn touch(&mut self, now_ms: i64) {
        self.requests += 1;
        self.last_updated = Some(now_ms);
    }
}

struct NormalizedUsage {
    prompt: u64,
    completion: u64,
    total: u64,
}

/// Recognizes one of the three vendor usage schemas (OpenAI, Anthropic,
/// Gemini) and normalizes it; returns `None` for anything else (never
/// panics/throws).
fn normalize(usage: &Value) -> Option<NormalizedUsage> {
    let obj = usage.as_object()?;

    let (prompt, completion) = if let Some(p) = obj.get("prompt_tokens") {
        (as_u64(p), as_u64(obj.get("completion_tokens")?))
    } else if let Some(p) = obj.get("input_tokens") {
        (as_u64(p), as_u64(obj.get("output_tokens")?))
    } else if let Some(p) = obj.get("promptTokenCount") {
        (as_u64(p), as_u64(obj.get("candidatesTokenCount")?))
    } else {
        return None;
    };

    let total = obj
        .get("total_tokens")
        .or_else(|| obj.get("totalTokenCount"))
        .map(as_u64)
        .unwrap_or(prompt + completion);

    Some(NormalizedUsage {
        prompt,
        completion,
        total,
    })
}

fn as_u64(value: &Value) -> u64 {
    value.as_u64().unwrap_or(0)
}

/// Process-wide usage counters. Cheap to share: wrap in `Arc` and clone the
/// `Arc`, never the aggregator itself.
#[derive(Default)]
pub struct UsageAggregator {
    cheap: Mutex<RouteBucket>,
    medium: Mutex<RouteBucket>,
    frontier: Mutex<RouteBucket>,
    unknown: Mutex<RouteBucket>,
}

impl UsageAggregator {
    /// A fresh aggregator with every bucket zeroed.
    pub fn new() -> Self {
        Self::default()
    }

    fn bucket(&self, route: RouteKey) -> &Mutex<RouteBucket> {
        match route {
            RouteKey::Cheap => &self.cheap,
            RouteKey::Medium => &self.medium,
            RouteKey::Frontier => &self.frontier,
            RouteKey::Unknown => &self.unknown,
        }
    }

    /// Records one request against `route`. Always increments `requests`;
    /// when `usage` recognizably matches one of the three vendor schemas,
    /// also folds its token counts in and increments `with_usage`. A missing
    /// or unrecognized `usage` is not an error — the request still counts.
    pub fn record(&self, route: RouteKey, usage: Option<&Value>) {
        let now_ms = chrono::Utc::now().timestamp_millis();
        let mut bucket = self.bucket(route).lock().expect("usage bucket mutex poisoned");
        bucket.touch(now_ms);
        if let Some(normalized) = usage.and_then(normalize) {
            bucket.add(&normalized, now_ms);
        }
    }

    /// Resets every bucket to zero. Library-level only (no HTTP route names
    /// this) — counters otherwise only ever grow, never reset implicitly.
    pub fn reset(&self) {
        *self.cheap.lock().expect("usage bucket mutex poisoned") = RouteBucket::default();
        *self.medium.lock().expect("usage bucket mutex poisoned") = RouteBucket::default();
        *self.frontier.lock().expect("usage bucket mutex poisoned") = RouteBucket::default();
        *self.unknown.lock().expect("usage bucket mutex poisoned") = RouteBucket::default();
    }

    /// A consistent, deep-copied snapshot of all four buckets plus
    /// cheap/medium/frontier percentages of their combined total (`unknown`
    /// is excluded from the percentage base).
    pub fn snapshot(&self) -> UsageSnapshot {
        let cheap = *self.cheap.lock().expect("usage bucket mutex poisoned");
        let medium = *self.medium.lock().expect("usage bucket mutex poisoned");
        let frontier = *self.frontier.lock().expect("usage bucket mutex poisoned");
        let unknown = *self.unknown.lock().expect("usage bucket mutex poisoned");

        let tracked_total = cheap.total_tokens + medium.total_tokens + frontier.total_tokens;
        let pct = |tokens: u64| -> f64 {
            if tracked_total == 0 {
                0.0
            } else {
                (tokens as f64 / tracked_total as f64) * 100.0
            }
        };

        let last_updated = [cheap.last_updated, medium.last_updated, frontier.last_updated, unknown.last_updated]
            .into_iter()
            .flatten()
            .max();

        UsageSnapshot {
            cheap_pct: pct(cheap.total_tokens),
            medium_pct: pct(medium.total_tokens),
            frontier_pct: pct(frontier.total_tokens),
            cheap,
            medium,
            frontier,
            unknown,
            total_tokens: tracked_total,
            last_updated,
        }
    }
}

/// Deep-copied snapshot returned by [`UsageAggregator::snapshot`], shaped for
/// direct JSON serialization at `GET /usage`.
#[derive(Debug, Clone, Copy, Serialize)]
pub struct UsageSnapshot {
    /// Cheap-tier bucket.
    pub cheap: RouteBucket,
    /// Medium-tier bucket.
    pub medium: RouteBucket,
    /// Frontier-tier bucket.
    pub frontier: RouteBucket,
    /// Requests that couldn't be attributed to a route.
    pub unknown: RouteBucket,
    /// `cheap.total_tokens` as a percentage of `cheap+medium+frontier` totals.
    pub cheap_pct: f64,
    /// See [`UsageSnapshot::cheap_pct`].
    pub medium_pct: f64,
    /// See [`UsageSnapshot::cheap_pct`].
    pub frontier_pct: f64,
    /// `cheap+medium+frontier` total tokens (the percentage base).
    pub total_tokens: u64,
    /// The most recent `last_updated` across all four buckets.
    pub last_updated: Option<i64>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn records_request_without_usage() {
        let agg = UsageAggregator::new();
        agg.record(RouteKey::Cheap, None);
        let snap = agg.snapshot();
        assert_eq!(snap.cheap.requests, 1);
        assert_eq!(snap.cheap.with_usage, 0);
        assert_eq!(snap.cheap.total_tokens, 0);
    }

    #[test]
    fn normalizes_openai_schema() {
        let agg = UsageAggregator::new();
        let usage = serde_json::json!({"prompt_tokens": 10, "completion_tokens": 5, "total_tokens": 15});
        agg.record(RouteKey::Frontier, Some(&usage));
        let snap = agg.snapshot();
        assert_eq!(snap.frontier.prompt_tokens, 10);
        assert_eq!(snap.frontier.completion_tokens, 5);
        assert_eq!(snap.frontier.total_tokens, 15);
        assert_eq!(snap.frontier.with_usage, 1);
    }

    #[test]
    fn normalizes_anthropic_schema_and_computes_total_when_absent() {
        let agg = UsageAggregator::new();
        let usage = serde_json::json!({"input_tokens": 7, "output_tokens": 3});
        agg.record(RouteKey::Medium, Some(&usage));
        let snap = agg.snapshot();
        assert_eq!(snap.medium.prompt_tokens, 7);
        assert_eq!(snap.medium.completion_tokens, 3);
        assert_eq!(snap.medium.total_tokens, 10);
    }

    #[test]
    fn normalizes_gemini_schema() {
        let agg = UsageAggregator::new();
        let usage =
            serde_json::json!({"promptTokenCount": 4, "candidatesTokenCount": 6, "totalTokenCount": 10});
        agg.record(RouteKey::Cheap, Some(&usage));
        let snap = agg.snapshot();
        assert_eq!(snap.cheap.prompt_tokens, 4);
        assert_eq!(snap.cheap.completion_tokens, 6);
        assert_eq!(snap.cheap.total_tokens, 10);
    }

    #[test]
    fn unrecognized_usage_counts_the_request_but_not_tokens() {
        let agg = UsageAggregator::new();
        let usage = serde_json::json!({"weird_field": 1});
        agg.record(RouteKey::Frontier, Some(&usage));
        let snap = agg.snapshot();
        assert_eq!(snap.frontier.requests, 1);
        assert_eq!(snap.frontier.with_usage, 0);
    }

    #[test]
    fn null_usage_does_not_panic() {
        let agg = UsageAggregator::new();
        agg.record(RouteKey::Frontier, Some(&Value::Null));
        let snap = agg.snapshot();
        assert_eq!(snap.frontier.requests, 1);
        assert_eq!(snap.frontier.with_usage, 0);
    }

    #[test]
    fn percentages_are_computed_over_cheap_medium_frontier_only() {
        let agg = UsageAggregator::new();
        agg.record(
            RouteKey::Cheap,
            Some(&serde_json::json!({"prompt_tokens": 50, "completion_tokens": 50, "total_tokens": 100})),
        );
        agg.record(
            RouteKey::Frontier,
            Some(&serde_json::json!({"prompt_tokens": 100, "completion_tokens": 100, "total_tokens": 200})),
        );
        agg.record(
            RouteKey::Unknown,
            Some(&serde_json::json!({"prompt_tokens": 1000, "completion_tokens": 0, "total_tokens": 1000})),
        );

        let snap = agg.snapshot();
        assert_eq!(snap.total_tokens, 300);
        assert!((snap.cheap_pct - 33.333).abs() < 0.01);
        assert!((snap.frontier_pct - 66.667).abs() < 0.01);
        assert_eq!(snap.medium_pct, 0.0);
    }

    #[test]
    fn zero_total_yields_zero_percentages_without_dividing_by_zero() {
        let agg = UsageAggregator::new();
        agg.record(RouteKey::Cheap, None);
        let snap = agg.snapshot();
        assert_eq!(snap.cheap_pct, 0.0);
        assert_eq!(snap.medium_pct, 0.0);
        assert_eq!(snap.frontier_pct, 0.0);
    }

    #[test]
    fn reset_zeroes_every_bucket() {
        let agg = UsageAggregator::new();
        agg.record(
            RouteKey::Cheap,
            Some(&serde_json::json!({"prompt_tokens": 1, "completion_tokens": 1, "total_tokens": 2})),
        );
        agg.reset();
        let snap = agg.snapshot();
        assert_eq!(snap.cheap.requests, 0);
        assert_eq!(snap.cheap.total_tokens, 0);
        assert_eq!(snap.last_updated, None);
    }

    #[test]
    fn route_key_from_route_maps_each_tier() {
        assert_eq!(RouteKey::from(Route::Cheap), RouteKey::Cheap);
        assert_eq!(RouteKey::from(Route::Medium), RouteKey::Medium);
        assert_eq!(RouteKey::from(Route::Frontier), RouteKey::Frontier);
    }
}
