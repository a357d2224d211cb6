//! Small shared helpers that don't deserve their own module.

/// Strips trailing slashes from a base URL, for stable comparison and
/// consistent path joining.
pub fn normalize_base_url(base_url: &str) -> String {
    base_url.trim_end_matches('/').to_string()
}

/// Appends `/v1/chat/completions` to a base URL, inserting `/v1` first if the
/// normalized base URL doesn't already end in it.
pub fn chat_completions_url(base_url: &str) -> String {
    let normalized = normalize_base_url(base_url);
    if normalized.ends_with("/v1") {
        format!("{normalized}/chat/completions")
    } else {
        format!("{normalized}/v1/chat/completions")
    }
}
