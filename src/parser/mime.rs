//! MIME body resolution and HTML-to-text conversion.

use mail_parser::{MessagePart, MessageParser, MimeHeaders};
use tracing::debug;

/// The part of a message that gets archived.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedBody {
    /// `type/subtype` of the chosen part, lowercase.
    pub content_type: String,
    /// Decoded text. HTML has already been reduced to plain text.
    pub content: String,
}

/// Pick the archived body of a raw message.
///
/// The first `text/plain` part wins. Otherwise the top-level payload is
/// used. Transfer encodings (quoted-printable, base64) and charsets are
/// decoded by `mail-parser`; `text/html` is stripped to text.
pub fn resolve_body(raw_message: &[u8]) -> ResolvedBody {
    let message_bytes = skip_from_line(raw_message);

    let Some(msg) = MessageParser::default().parse(message_bytes) else {
        debug!("mail-parser rejected message, using raw body");
        return ResolvedBody {
            content_type: "text/plain".to_string(),
            content: extract_body_fallback(message_bytes),
        };
    };

    if let Some(part) = msg.parts.iter().find(|p| mime_type(p) == "text/plain") {
        return ResolvedBody {
            content_type: "text/plain".to_string(),
            content: part_text(part),
        };
    }

    let Some(root) = msg.parts.first() else {
        return ResolvedBody {
            content_type: "text/plain".to_string(),
            content: extract_body_fallback(message_bytes),
        };
    };

    let content_type = mime_type(root);
    let content = if content_type.starts_with("multipart/") {
        // No plain part anywhere: fall back to the first HTML part, else the raw payload.
        msg.parts
            .iter()
            .find(|p| mime_type(p) == "text/html")
            .map(|p| html_to_text(&part_text(p)))
            .unwrap_or_else(|| extract_body_fallback(message_bytes))
    } else if content_type == "text/html" {
        html_to_text(&part_text(root))
    } else {
        part_text(root)
    };

    ResolvedBody {
        content_type,
        content,
    }
}

/// `type/subtype` of a part; parts without a `Content-Type` are `text/plain`.
fn mime_type(part: &MessagePart<'_>) -> String {
    part.content_type()
        .map(|ct| match ct.subtype() {
            Some(sub) => format!("{}/{}", ct.ctype(), sub),
            None => ct.ctype().to_string(),
        })
        .unwrap_or_else(|| "text/plain".to_string())
        .to_lowercase()
}

fn part_text(part: &MessagePart<'_>) -> String {
    part.text_contents()
        .map(str::to_string)
        .unwrap_or_else(|| String::from_utf8_lossy(part.contents()).into_owned())
}

/// Skip the `From ` separator line at the start of an mbox message.
pub fn skip_from_line(data: &[u8]) -> &[u8] {
    let data = data.strip_prefix(&[0xEF, 0xBB, 0xBF]).unwrap_or(data);

    if data.starts_with(b"From ") {
        if let Some(pos) = data.iter().position(|&b| b == b'\n') {
            return &data[pos + 1..];
        }
    }
    data
}

/// Everything after the first blank line, for messages `mail-parser`
/// cannot handle.
fn extract_body_fallback(data: &[u8]) -> String {
    let text = String::from_utf8_lossy(data);
    if let Some(pos) = text.find("\n\n") {
        text[pos + 2..].to_string()
    } else if let Some(pos) = text.find("\r\n\r\n") {
        text[pos + 4..].to_string()
    } else {
        String::new()
    }
}

/// Reduce HTML to plain text.
///
/// Block elements become line breaks, scripts and styles are dropped, the
/// remaining tags are removed and common entities decoded. Runs of blank
/// lines collapse to one.
pub fn html_to_text(html: &str) -> String {
    let mut text = remove_tag_block(html, "script");
    text = remove_tag_block(&text, "style");

    for tag in ["br", "br/", "br /"] {
        text = text.replace(&format!("<{tag}>"), "\n");
        text = text.replace(&format!("<{}>", tag.to_uppercase()), "\n");
    }
    for tag in ["p", "div", "tr", "li", "h1", "h2", "h3", "h4", "h5", "h6", "blockquote"] {
        let upper = tag.to_uppercase();
        text = text.replace(&format!("<{tag}>"), "\n");
        text = text.replace(&format!("<{tag} "), "\n<");
        text = text.replace(&format!("<{upper}>"), "\n");
        text = text.replace(&format!("</{tag}>"), "\n");
        text = text.replace(&format!("</{upper}>"), "\n");
    }

    let mut stripped = String::with_capacity(text.len());
    let mut in_tag = false;
    for ch in text.chars() {
        match ch {
            '<' => in_tag = true,
            '>' => in_tag = false,
            _ if !in_tag => stripped.push(ch),
            _ => {}
        }
    }

    for (entity, replacement) in [
        ("&lt;", "<"),
        ("&gt;", ">"),
        ("&quot;", "\""),
        ("&#39;", "'"),
        ("&apos;", "'"),
        ("&nbsp;", " "),
        ("&#160;", " "),
        ("&amp;", "&"),
    ] {
        stripped = stripped.replace(entity, replacement);
    }

    let mut cleaned = String::with_capacity(stripped.len());
    let mut prev_was_blank = false;
    for line in stripped.lines() {
        let line = line.trim();
        if line.is_empty() {
            if !prev_was_blank {
                cleaned.push('\n');
            }
            prev_was_blank = true;
        } else {
            cleaned.push_str(line);
            cleaned.push('\n');
            prev_was_blank = false;
        }
    }

    cleaned.trim().to_string()
}

/// Remove `<tag ...>...</tag>` blocks, case-insensitively.
fn remove_tag_block(html: &str, tag: &str) -> String {
    let open = format!("<{tag}");
    let close = format!("</{tag}>");
    let mut result = String::with_capacity(html.len());
    let mut remaining = html;

    // ASCII lowercasing keeps byte offsets aligned with the original.
    while let Some(start) = remaining.to_ascii_lowercase().find(&open) {
        result.push_str(&remaining[..start]);
        let after = &remaining[start..];
        match after.to_ascii_lowercase().find(&close) {
            Some(end) => remaining = &after[end + close.len()..],
            None => {
                remaining = "";
                break;
            }
        }
    }
    result.push_str(remaining);
    result
}
