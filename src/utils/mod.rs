use std::sync::OnceLock;

use regex_lite::Regex;

fn identifier_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"^[A-Za-z0-9_-]+$").expect("identifier pattern is valid"))
}

/// Validate a node or link identifier.
/// Allows ASCII alphanumerics, underscores and hyphens; must be non-empty.
pub fn is_valid_identifier(id: &str) -> bool {
    identifier_re().is_match(id)
}

/// Current time in milliseconds since the Unix epoch
pub fn now_millis() -> i64 {
    chrono::Utc::now().timestamp_millis()
}
