/// Longest stored message body, in Unicode code points, before the ellipsis.
pub const STORED_CONTENT_MAX_CHARS: usize = 200;

/// Cut `s` to its first `max_chars` code points and append `...`.
///
/// The cut is exact: no trailing whitespace is trimmed, so a truncated
/// result is always `max_chars + 3` code points long.
#[must_use]
pub fn truncate_with_ellipsis(s: &str, max_chars: usize) -> String {
    match s.char_indices().nth(max_chars) {
        Some((idx, _)) => format!("{}...", &s[..idx]),
        None => s.to_string(),
    }
}

/// Truncation applied to every message row written to the relational store.
#[must_use]
pub fn truncate_stored_content(s: &str) -> String {
    truncate_with_ellipsis(s, STORED_CONTENT_MAX_CHARS)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn truncate_ascii_no_truncation() {
        assert_eq!(truncate_with_ellipsis("hello", 10), "hello");
        assert_eq!(truncate_with_ellipsis("hello world", 50), "hello world");
    }

    #[test]
    fn truncate_ascii_with_truncation() {
        assert_eq!(truncate_with_ellipsis("hello world", 5), "hello...");
        assert_eq!(
            truncate_with_ellipsis("This is a long message", 10),
            "This is a ..."
        );
    }

    #[test]
    fn truncate_empty_string() {
        assert_eq!(truncate_with_ellipsis("", 10), "");
    }

    #[test]
    fn truncate_at_exact_boundary() {
        assert_eq!(truncate_with_ellipsis("hello", 5), "hello");
    }

    #[test]
    fn truncate_emoji_multiple() {
        let s = "😀😀😀😀";
        assert_eq!(truncate_with_ellipsis(s, 2), "😀😀...");
        assert_eq!(truncate_with_ellipsis(s, 3), "😀😀😀...");
    }

    #[test]
    fn truncate_three_byte_chars_by_code_point() {
        let s = "中".repeat(500);
        let result = truncate_stored_content(&s);
        assert_eq!(result.chars().count(), 203);
        assert_eq!(result, format!("{}...", "中".repeat(200)));
    }

    #[test]
    fn stored_content_under_limit_is_untouched() {
        let s = "x".repeat(200);
        assert_eq!(truncate_stored_content(&s), s);
    }

    #[test]
    fn truncate_zero_max_chars() {
        assert_eq!(truncate_with_ellipsis("hello", 0), "...");
    }
}
