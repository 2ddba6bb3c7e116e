//! Text formatting shared by the archive pages.

use chrono::{DateTime, Utc};

use crate::web::escape::xml_escape;
use crate::web::html::html_span;

/// Column at which message text is wrapped.
pub const WRAP_WIDTH: usize = 80;

fn utc(timestamp: i64) -> DateTime<Utc> {
    DateTime::from_timestamp(timestamp, 0).unwrap_or(DateTime::UNIX_EPOCH)
}

/// RFC 2822 date without the zone, for listings.
pub fn listing_date(timestamp: Option<i64>) -> String {
    utc(timestamp.unwrap_or(0))
        .format("%a, %d %b %Y %H:%M:%S")
        .to_string()
}

/// Full RFC 2822 date.
pub fn full_date(timestamp: Option<i64>) -> String {
    utc(timestamp.unwrap_or(0))
        .format("%a, %d %b %Y %H:%M:%S -0000")
        .to_string()
}

/// Day-month-year, for the thread index.
pub fn short_date(timestamp: Option<i64>) -> String {
    utc(timestamp.unwrap_or(0)).format("%d %b %Y").to_string()
}

/// Greedy word wrap.
///
/// Whitespace runs collapse to one space. Words longer than `width` are
/// split. Blank input yields no lines.
pub fn wrap(text: &str, width: usize) -> Vec<String> {
    let mut lines = Vec::new();
    let mut current = String::new();
    let mut current_len = 0;

    for word in text.split_whitespace() {
        let mut chars: Vec<char> = word.chars().collect();

        while !chars.is_empty() {
            let space = usize::from(current_len > 0);
            if current_len + space + chars.len() <= width {
                if space == 1 {
                    current.push(' ');
                }
                current.extend(chars.iter());
                current_len += space + chars.len();
                break;
            }
            if current_len > 0 {
                lines.push(std::mem::take(&mut current));
                current_len = 0;
                continue;
            }
            // The word alone does not fit.
            let rest = chars.split_off(width.max(1));
            lines.push(chars.into_iter().collect());
            chars = rest;
        }
    }

    if current_len > 0 {
        lines.push(current);
    }
    lines
}

/// Render a message body for a `<pre>` block.
///
/// Lines are trimmed and wrapped at [`WRAP_WIDTH`]. Quoted lines keep their
/// `>` prefix on every wrapped piece and are marked with the `quoted`
/// class. All text is escaped.
pub fn render_content(content: &str) -> String {
    content
        .lines()
        .map(str::trim)
        .map(|line| {
            if line.starts_with('>') {
                let prefix_len = line
                    .find(|c: char| c != '>' && c != ' ')
                    .unwrap_or(line.len());
                let separator = format!("\n{}", &line[..prefix_len]);
                let wrapped = wrap(line, WRAP_WIDTH).join(&separator);
                html_span(&xml_escape(&wrapped), "quoted")
            } else {
                xml_escape(&wrap(line, WRAP_WIDTH).join("\n"))
            }
        })
        .collect::<Vec<_>>()
        .join("\n")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_dates() {
        let ts = Some(1_704_362_400);
        assert_eq!(listing_date(ts), "Thu, 04 Jan 2024 10:00:00");
        assert_eq!(full_date(ts), "Thu, 04 Jan 2024 10:00:00 -0000");
        assert_eq!(short_date(ts), "04 Jan 2024");
        assert_eq!(short_date(None), "01 Jan 1970");
    }

    #[test]
    fn test_wrap_at_width() {
        let text = "aaaa bbbb cccc";
        assert_eq!(wrap(text, 9), ["aaaa bbbb", "cccc"]);
        assert_eq!(wrap("   ", 9), Vec::<String>::new());
        assert_eq!(wrap("abcdefghij", 4), ["abcd", "efgh", "ij"]);
    }

    #[test]
    fn test_wrap_lines_fit() {
        let text = "word ".repeat(40);
        for line in wrap(&text, WRAP_WIDTH) {
            assert!(line.chars().count() <= WRAP_WIDTH);
        }
    }

    #[test]
    fn test_render_content_quotes() {
        let long_quote = format!("> {}", "quoted ".repeat(20));
        let content = format!("  Hello <world>  \n{long_quote}\n\nBye");
        let html = render_content(&content);

        assert!(html.starts_with("Hello &lt;world&gt;\n<span class=\"quoted\">&gt; quoted"));
        assert!(html.contains("\n&gt; quoted"));
        assert!(html.ends_with("</span>\n\nBye"));
    }
}
