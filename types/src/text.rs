//! Small pure text helpers.

/// First `max` characters of `raw`, never splitting a Unicode scalar value.
#[must_use]
pub fn take_chars(raw: &str, max: usize) -> &str {
    match raw.char_indices().nth(max) {
        Some((idx, _)) => &raw[..idx],
        None => raw,
    }
}

/// Keep up to `max_content` characters of `raw`, appending `suffix` only when
/// something was cut.
///
/// The suffix does NOT count toward the budget.
#[must_use]
pub fn truncate_preview(raw: &str, max_content: usize, suffix: &str) -> String {
    let head = take_chars(raw, max_content);
    if head.len() == raw.len() {
        return raw.to_string();
    }
    format!("{head}{suffix}")
}

#[cfg(test)]
mod tests {
    use super::{take_chars, truncate_preview};

    #[test]
    fn take_chars_short_string_unchanged() {
        assert_eq!(take_chars("hello", 10), "hello");
    }

    #[test]
    fn take_chars_respects_multibyte_boundaries() {
        assert_eq!(take_chars("héllo wörld", 7), "héllo w");
        assert_eq!(take_chars("日本語テキスト", 3), "日本語");
    }

    #[test]
    fn preview_appends_suffix_only_when_cut() {
        assert_eq!(truncate_preview("short", 50, "..."), "short");
        assert_eq!(truncate_preview("abcdefgh", 4, "..."), "abcd...");
    }
}
