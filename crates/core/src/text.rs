//! Small string helpers shared by message formatting code.

/// Truncate `text` to at most `max_chars` characters, appending `…` when cut.
///
/// Works on `char` boundaries so multi-byte content is never split.
pub fn truncate_chars(text: &str, max_chars: usize) -> String {
    if text.chars().count() <= max_chars {
        return text.to_string();
    }
    let keep = max_chars.saturating_sub(1);
    let mut out: String = text.chars().take(keep).collect();
    out.push('…');
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn short_text_is_unchanged() {
        assert_eq!(truncate_chars("hello", 10), "hello");
    }

    #[test]
    fn long_text_is_cut_with_ellipsis() {
        let out = truncate_chars("abcdefghij", 5);
        assert_eq!(out, "abcd…");
        assert_eq!(out.chars().count(), 5);
    }

    #[test]
    fn multibyte_is_not_split() {
        let out = truncate_chars("ééééé", 3);
        assert_eq!(out, "éé…");
    }
}
