/// Rough estimate: GPT-style token ≈ 4 chars (good enough for UI)
pub fn approx_tokens(s: &str) -> usize {
    s.chars().count() / 4
}

/// Last `/`-separated segment, used for chips and the frequent list.
pub fn short_name(path: &str) -> &str {
    path.rsplit('/').next().unwrap_or(path)
}
