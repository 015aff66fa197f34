// ABOUTME: Utility functions for slugging, timestamps, and markup escaping
// ABOUTME: Provides deterministic text helpers shared by transform and publish

use chrono::Utc;

pub fn slugify(text: &str) -> String {
    slug::slugify(text)
}

/// Current wall-clock time as epoch milliseconds.
pub fn now_millis() -> i64 {
    Utc::now().timestamp_millis()
}

/// Escapes text for use inside element content or a double-quoted attribute.
pub fn escape_html(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            _ => out.push(c),
        }
    }
    out
}

/// Shows the first few characters of a secret, masking the rest.
pub fn mask_secret(secret: &str) -> String {
    if secret.is_empty() {
        return "(not set)".into();
    }
    let visible: String = secret.chars().take(4).collect();
    format!("{}****", visible)
}
