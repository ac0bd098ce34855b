//! Terminal column width of styled text.

use once_cell::sync::Lazy;
use regex::Regex;
use unicode_width::UnicodeWidthStr;

/// CSI and OSC escape sequences emitted by terminal styling.
static ANSI_ESCAPE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"\x1b\[[0-9;?]*[ -/]*[@-~]|\x1b\][^\x07\x1b]*(?:\x07|\x1b\\)")
        .expect("valid ANSI escape pattern")
});

/// Remove ANSI styling from `text`.
pub fn strip_ansi(text: &str) -> std::borrow::Cow<'_, str> {
    ANSI_ESCAPE.replace_all(text, "")
}

/// Number of terminal columns `text` occupies once printed.
///
/// Styling sequences take no space and East Asian wide characters
/// count as two columns.
pub fn display_width(text: &str) -> usize {
    UnicodeWidthStr::width(strip_ansi(text).as_ref())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_plain_ascii() {
        assert_eq!(display_width("clear"), 5);
        assert_eq!(display_width(""), 0);
    }

    #[test]
    fn test_ansi_is_ignored() {
        assert_eq!(display_width("\x1b[90m(propertyName)\x1b[39m"), 14);
        assert_eq!(strip_ansi("\x1b[1;33mhi\x1b[0m"), "hi");
    }

    #[test]
    fn test_wide_characters() {
        assert_eq!(display_width("爻象"), 4);
        assert_eq!(display_width("a爻"), 3);
    }
}
