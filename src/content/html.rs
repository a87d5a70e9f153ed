//! HTML entity escaping shared by the markdown renderer, template helpers
//! and the search results page.

use std::borrow::Cow;

/// Escape text content: `&`, `<` and `>`.
pub fn escape_text(value: &str) -> Cow<'_, str> {
    escape_with(value, false)
}

/// Escape a double-quoted attribute value: text escapes plus `"`.
pub fn escape_attr(value: &str) -> Cow<'_, str> {
    escape_with(value, true)
}

fn escape_with(value: &str, quotes: bool) -> Cow<'_, str> {
    let needs = |c: char| matches!(c, '&' | '<' | '>') || (quotes && c == '"');
    if !value.contains(needs) {
        return Cow::Borrowed(value);
    }

    let mut out = String::with_capacity(value.len() + 8);
    for c in value.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' if quotes => out.push_str("&quot;"),
            _ => out.push(c),
        }
    }
    Cow::Owned(out)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_escape_text() {
        assert_eq!(escape_text("a < b && \"c\""), "a &lt; b &amp;&amp; \"c\"");
    }

    #[test]
    fn test_escape_attr() {
        assert_eq!(escape_attr("/a?x=\"1\"&y=<2>"), "/a?x=&quot;1&quot;&amp;y=&lt;2&gt;");
    }

    #[test]
    fn test_plain_input_borrowed() {
        assert!(matches!(escape_attr("guide/install"), Cow::Borrowed(_)));
    }
}
