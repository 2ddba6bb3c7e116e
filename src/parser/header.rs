//! RFC 5322 header parsing: folding, encoded-words (RFC 2047), message ids
//! and dates.

use chrono::{DateTime, NaiveDateTime, TimeZone, Utc};
use tracing::warn;

/// The unfolded header section of one message.
///
/// Names are stored lowercase; values are raw (not yet RFC 2047 decoded).
#[derive(Debug, Clone, Default)]
pub struct HeaderBlock {
    fields: Vec<(String, String)>,
}

impl HeaderBlock {
    /// Parse the header section of a raw message.
    ///
    /// Reads up to the first blank line. A leading mbox `From ` line is
    /// skipped.
    pub fn parse(raw_message: &[u8]) -> Self {
        let text = decode_header_bytes(header_section(raw_message));
        Self {
            fields: unfold_headers(&text),
        }
    }

    /// First raw value for a header name (case-insensitive).
    pub fn get(&self, name: &str) -> Option<&str> {
        self.fields
            .iter()
            .find(|(k, _)| k.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }

    /// First value with encoded-words decoded.
    pub fn text(&self, name: &str) -> Option<String> {
        self.get(name).map(decode_encoded_words)
    }

    /// `Message-ID`, angle brackets kept.
    pub fn message_id(&self) -> Option<String> {
        self.get("message-id")
            .map(extract_angle_bracket)
            .filter(|id| !id.is_empty())
    }

    /// `In-Reply-To`, angle brackets kept.
    pub fn in_reply_to(&self) -> Option<String> {
        self.get("in-reply-to")
            .map(extract_angle_bracket)
            .filter(|id| !id.is_empty())
    }

    /// Every id in `References`, oldest first.
    pub fn references(&self) -> Vec<String> {
        self.get("references")
            .map(extract_all_angle_brackets)
            .unwrap_or_default()
    }

    /// The parent this message answers: `In-Reply-To`, or else the last
    /// `References` entry.
    pub fn parent_id(&self) -> Option<String> {
        self.in_reply_to().or_else(|| self.references().pop())
    }

    /// Parsed `Date`, if present and understood.
    pub fn date(&self) -> Option<DateTime<Utc>> {
        self.get("date").and_then(parse_date)
    }

    pub fn len(&self) -> usize {
        self.fields.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }
}

/// Bytes of the header section, excluding the mbox separator line and the
/// blank line that ends the headers.
fn header_section(data: &[u8]) -> &[u8] {
    let data = super::mime::skip_from_line(data);
    let mut pos = 0;
    while pos < data.len() {
        let end = data[pos..]
            .iter()
            .position(|&b| b == b'\n')
            .map_or(data.len(), |p| pos + p + 1);
        let line = &data[pos..end];
        if line.iter().all(|&b| b == b'\r' || b == b'\n') {
            return &data[..pos];
        }
        pos = end;
    }
    data
}

/// Decode raw header bytes to a string.
///
/// UTF-8 when valid, Windows-1252 otherwise (it accepts every byte).
fn decode_header_bytes(bytes: &[u8]) -> String {
    let bytes = bytes.strip_prefix(&[0xEF, 0xBB, 0xBF]).unwrap_or(bytes);
    match std::str::from_utf8(bytes) {
        Ok(s) => s.to_string(),
        Err(_) => encoding_rs::WINDOWS_1252.decode(bytes).0.into_owned(),
    }
}

/// Join continuation lines with the header they belong to.
///
/// Returns `(lowercase_name, value)` pairs in order of appearance.
fn unfold_headers(text: &str) -> Vec<(String, String)> {
    let mut result: Vec<(String, String)> = Vec::new();

    for line in text.lines() {
        if line.starts_with([' ', '\t']) {
            if let Some((_, value)) = result.last_mut() {
                value.push(' ');
                value.push_str(line.trim());
            }
        } else if let Some((name, value)) = line.split_once(':') {
            result.push((name.trim().to_lowercase(), value.trim().to_string()));
        }
    }

    result
}

/// Decode RFC 2047 encoded-words in a header value.
///
/// Whitespace between two adjacent encoded words is dropped. Words that
/// fail to decode are kept verbatim.
pub fn decode_encoded_words(input: &str) -> String {
    let mut result = String::with_capacity(input.len());
    let mut remaining = input;
    let mut last_was_encoded = false;

    while let Some(start) = remaining.find("=?") {
        let before = &remaining[..start];
        if !last_was_encoded || !before.trim().is_empty() {
            result.push_str(before);
        }

        match decode_word(&remaining[start + 2..]) {
            Some((text, consumed)) => {
                result.push_str(&text);
                remaining = &remaining[start + 2 + consumed..];
                last_was_encoded = true;
            }
            None => {
                result.push_str("=?");
                remaining = &remaining[start + 2..];
                last_was_encoded = false;
            }
        }
    }

    result.push_str(remaining);
    result
}

/// Decode `charset?enc?text?=`, returning the text and the bytes consumed.
fn decode_word(s: &str) -> Option<(String, usize)> {
    let mut pieces = s.splitn(3, '?');
    let charset = pieces.next()?;
    let encoding = pieces.next()?;
    let rest = pieces.next()?;
    let end = rest.find("?=")?;
    let encoded = &rest[..end];
    if encoded.contains(char::is_whitespace) {
        return None;
    }

    let bytes = match encoding {
        "B" | "b" => decode_base64(encoded)?,
        "Q" | "q" => decode_q_encoding(encoded),
        _ => return None,
    };

    let consumed = charset.len() + encoding.len() + 2 + end + 2;
    Some((decode_charset(charset, &bytes), consumed))
}

/// Standard-alphabet base64 with optional padding.
fn decode_base64(input: &str) -> Option<Vec<u8>> {
    fn value(c: u8) -> Option<u32> {
        match c {
            b'A'..=b'Z' => Some(u32::from(c - b'A')),
            b'a'..=b'z' => Some(u32::from(c - b'a') + 26),
            b'0'..=b'9' => Some(u32::from(c - b'0') + 52),
            b'+' => Some(62),
            b'/' => Some(63),
            _ => None,
        }
    }

    let mut out = Vec::with_capacity(input.len() * 3 / 4);
    let mut acc: u32 = 0;
    let mut bits = 0;
    for &c in input.trim_end_matches('=').as_bytes() {
        acc = (acc << 6) | value(c)?;
        bits += 6;
        if bits >= 8 {
            bits -= 8;
            out.push((acc >> bits) as u8);
            acc &= (1 << bits) - 1;
        }
    }
    Some(out)
}

/// Q-encoding: `_` is a space, `=XX` a byte.
fn decode_q_encoding(input: &str) -> Vec<u8> {
    let bytes = input.as_bytes();
    let mut result = Vec::with_capacity(bytes.len());
    let mut i = 0;
    while i < bytes.len() {
        match bytes[i] {
            b'_' => result.push(b' '),
            b'=' if i + 2 < bytes.len() => {
                let hex = std::str::from_utf8(&bytes[i + 1..i + 3])
                    .ok()
                    .and_then(|h| u8::from_str_radix(h, 16).ok());
                match hex {
                    Some(byte) => {
                        result.push(byte);
                        i += 3;
                        continue;
                    }
                    None => result.push(b'='),
                }
            }
            b => result.push(b),
        }
        i += 1;
    }
    result
}

fn decode_charset(charset: &str, bytes: &[u8]) -> String {
    // RFC 2231 language suffix: "utf-8*en".
    let label = charset.split('*').next().unwrap_or(charset);
    match encoding_rs::Encoding::for_label(label.as_bytes()) {
        Some(encoding) => encoding.decode(bytes).0.into_owned(),
        None => {
            warn!(charset = charset, "Unknown charset, decoding as UTF-8");
            String::from_utf8_lossy(bytes).into_owned()
        }
    }
}

/// The first `<...>` token of a value, or the trimmed value itself.
pub fn extract_angle_bracket(s: &str) -> String {
    let trimmed = s.trim();
    if let Some(start) = trimmed.find('<') {
        if let Some(len) = trimmed[start..].find('>') {
            return trimmed[start..=start + len].to_string();
        }
    }
    trimmed.to_string()
}

/// Every `<...>` token of a value, in order.
pub fn extract_all_angle_brackets(s: &str) -> Vec<String> {
    let mut result = Vec::new();
    let mut remaining = s;
    while let Some(start) = remaining.find('<') {
        let Some(len) = remaining[start..].find('>') else {
            break;
        };
        result.push(remaining[start..=start + len].to_string());
        remaining = &remaining[start + len + 1..];
    }
    result
}

const DATE_FORMATS: &[&str] = &[
    "%d %b %Y %H:%M:%S %z",
    "%d %b %Y %H:%M %z",
    "%d %b %Y %H:%M:%S",
    "%b %d %H:%M:%S %Y",
    "%Y-%m-%dT%H:%M:%S%z",
    "%Y-%m-%d %H:%M:%S %z",
    "%Y-%m-%d %H:%M:%S",
];

const NAMED_ZONES: &[(&str, &str)] = &[
    ("EST", "-0500"),
    ("EDT", "-0400"),
    ("CST", "-0600"),
    ("CDT", "-0500"),
    ("MST", "-0700"),
    ("MDT", "-0600"),
    ("PST", "-0800"),
    ("PDT", "-0700"),
    ("GMT", "+0000"),
    ("UT", "+0000"),
    ("UTC", "+0000"),
    ("CET", "+0100"),
    ("CEST", "+0200"),
];

/// Parse a `Date` header in RFC 2822 form or one of the common broken
/// variants seen in list archives.
pub fn parse_date(date_str: &str) -> Option<DateTime<Utc>> {
    let trimmed = date_str.trim();
    if trimmed.is_empty() {
        return None;
    }

    if let Ok(dt) = DateTime::parse_from_rfc2822(trimmed) {
        return Some(dt.with_timezone(&Utc));
    }
    if let Ok(dt) = DateTime::parse_from_rfc3339(trimmed) {
        return Some(dt.with_timezone(&Utc));
    }

    // Drop a trailing "(PDT)" comment, the weekday, and map zone names.
    let mut candidate = match trimmed.find(" (") {
        Some(pos) => trimmed[..pos].to_string(),
        None => trimmed.to_string(),
    };
    if let Some((head, rest)) = candidate.split_once([',', ' ']) {
        if head.len() == 3 && head.chars().all(|c| c.is_ascii_alphabetic()) {
            candidate = rest.trim().to_string();
        }
    }
    for (name, offset) in NAMED_ZONES {
        if let Some(head) = candidate.strip_suffix(name) {
            if head.ends_with(' ') {
                candidate = format!("{head}{offset}");
                break;
            }
        }
    }

    for fmt in DATE_FORMATS {
        if let Ok(dt) = DateTime::parse_from_str(&candidate, fmt) {
            return Some(dt.with_timezone(&Utc));
        }
        if let Ok(ndt) = NaiveDateTime::parse_from_str(&candidate, fmt) {
            return Some(Utc.from_utc_datetime(&ndt));
        }
    }

    warn!(date = trimmed, "Could not parse date");
    None
}
