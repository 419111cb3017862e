//! Formatting utilities for CLI output.

/// Truncate to at most `max_len` characters, ending in `...` when cut.
///
/// ```ignore
/// use crate::ui::format::truncate_str;
///
/// assert_eq!(truncate_str("hello", 10), "hello");
/// assert_eq!(truncate_str("hello world", 8), "hello...");
/// ```
pub fn truncate_str(s: &str, max_len: usize) -> String {
    if s.chars().count() <= max_len {
        return s.to_string();
    }
    if max_len <= 3 {
        return ".".repeat(max_len);
    }
    let kept: String = s.chars().take(max_len - 3).collect();
    format!("{}...", kept)
}

/// Collapse whitespace runs (newlines included) into single spaces, then
/// truncate. Used for chunk previews in tables.
pub fn one_line(text: &str, max_len: usize) -> String {
    let joined = text.split_whitespace().collect::<Vec<_>>().join(" ");
    truncate_str(&joined, max_len)
}

/// Milliseconds with one decimal, e.g. `"12.3 ms"`.
pub fn format_ms(ms: f64) -> String {
    format!("{:.1} ms", ms)
}

/// Percentage with no decimals, e.g. `"67%"`.
pub fn format_percent(value: f64) -> String {
    format!("{:.0}%", value)
}
