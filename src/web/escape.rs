//! Escaping for safe embedding of text in URLs and markup.

use askama::{Html, MarkupDisplay};
use percent_encoding::{percent_decode_str, utf8_percent_encode, AsciiSet, NON_ALPHANUMERIC};

/// Characters left as-is in URL components; everything else is percent-encoded.
const URL_COMPONENT: &AsciiSet = &NON_ALPHANUMERIC
    .remove(b'_')
    .remove(b'.')
    .remove(b'-')
    .remove(b'~');

/// Encode text for use as a URL query value. Spaces become `+`.
pub fn url_escape(input: &str) -> String {
    utf8_percent_encode(input, URL_COMPONENT)
        .to_string()
        .replace("%20", "+")
}

/// Reverse [`url_escape`]. Invalid UTF-8 sequences are replaced.
pub fn url_unescape(input: &str) -> String {
    let spaced = input.replace('+', " ");
    percent_decode_str(&spaced).decode_utf8_lossy().into_owned()
}

/// Escape text for inclusion in HTML/XML content or attribute values,
/// with the same escaper the page templates use.
pub fn xml_escape(input: &str) -> String {
    MarkupDisplay::new_unsafe(input, Html).to_string()
}

/// Reverse [`xml_escape`]. `&amp;` is resolved last so `&amp;lt;` yields `&lt;`.
pub fn xml_unescape(input: &str) -> String {
    if !input.contains('&') {
        return input.to_string();
    }
    input
        .replace("&lt;", "<")
        .replace("&gt;", ">")
        .replace("&quot;", "\"")
        .replace("&#34;", "\"")
        .replace("&#x27;", "'")
        .replace("&#39;", "'")
        .replace("&apos;", "'")
        .replace("&#x2F;", "/")
        .replace("&#x2f;", "/")
        .replace("&amp;", "&")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_xml_escape_all_specials() {
        let escaped = xml_escape(r#"<a href="x">Tom & 'Jerry'</a>"#);
        assert!(escaped.starts_with("&lt;a href="));
        assert!(escaped.contains("Tom &amp; "));
        for raw in ['<', '>', '"', '\''] {
            assert!(!escaped.contains(raw), "{raw} left unescaped in {escaped}");
        }
        assert_eq!(xml_escape("plain text"), "plain text");
    }

    #[test]
    fn test_xml_roundtrip() {
        for text in [
            "plain",
            "a & b < c > d",
            r#"quote " apostrophe ' slash /"#,
            "&amp; already escaped",
            "&lt;&gt;",
            "mixed ünïcödé & <tags/>",
            "",
        ] {
            assert_eq!(xml_unescape(&xml_escape(text)), text, "input: {text:?}");
        }
    }

    #[test]
    fn test_url_escape_quote_plus_style() {
        assert_eq!(url_escape("a b"), "a+b");
        assert_eq!(url_escape("x@example.com"), "x%40example.com");
        assert_eq!(url_escape("a&b?c=d/e"), "a%26b%3Fc%3Dd%2Fe");
        assert_eq!(url_escape("safe-_.~"), "safe-_.~");
        assert_eq!(url_escape("1+1"), "1%2B1");
    }

    #[test]
    fn test_url_roundtrip() {
        for text in [
            "amqp 1.0",
            "<msg001@example.com>",
            "a&b?c=d#e/f",
            "plus+sign and %25 literal",
            "café señor 山田",
            "",
        ] {
            assert_eq!(url_unescape(&url_escape(text)), text, "input: {text:?}");
        }
    }

    #[test]
    fn test_url_unescape_lenient() {
        assert_eq!(url_unescape("100%"), "100%");
        assert_eq!(url_unescape("a+b%20c"), "a b c");
    }
}
