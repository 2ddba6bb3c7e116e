//! Fully formed HTTP responses.
//!
//! A response always carries `Content-Length`. A body can only be attached
//! together with its content type, so a typed body without `Content-Type`
//! cannot be built.

use axum::http::StatusCode;
use chrono::{DateTime, Utc};

/// `strftime` pattern for HTTP dates (RFC 1123, always GMT).
pub const HTTP_DATE_FORMAT: &str = "%a, %d %b %Y %H:%M:%S GMT";

/// Status line, headers, and body bytes of one response.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Response {
    status: StatusCode,
    headers: Vec<(String, String)>,
    body: Vec<u8>,
}

impl Response {
    /// A response with no content: only `Content-Length: 0` is emitted.
    pub fn empty(status: StatusCode) -> Self {
        Self {
            status,
            headers: vec![("Content-Length".to_string(), "0".to_string())],
            body: Vec::new(),
        }
    }

    /// A response with content. `String` content is sent as UTF-8 bytes.
    pub fn with_content(
        status: StatusCode,
        content: impl Into<Vec<u8>>,
        content_type: &str,
    ) -> Self {
        let body = content.into();
        Self {
            status,
            headers: vec![
                ("Content-Length".to_string(), body.len().to_string()),
                ("Content-Type".to_string(), content_type.to_string()),
            ],
            body,
        }
    }

    /// `200 OK` with content.
    pub fn ok(content: impl Into<Vec<u8>>, content_type: &str) -> Self {
        Self::with_content(StatusCode::OK, content, content_type)
    }

    /// `304 Not Modified`.
    pub fn not_modified() -> Self {
        Self::empty(StatusCode::NOT_MODIFIED)
    }

    /// `404 Not Found` with a plain-text body.
    pub fn not_found() -> Self {
        Self::with_content(StatusCode::NOT_FOUND, "404 Not Found", "text/plain")
    }

    /// `400 Bad Request` describing what was wrong with the client's input.
    pub fn bad_request(message: &str) -> Self {
        Self::with_content(
            StatusCode::BAD_REQUEST,
            format!("Error! {message}"),
            "text/plain",
        )
    }

    /// `500 Internal Server Error` whose body is a diagnostic trace.
    pub fn unexpected_error(trace: &str) -> Self {
        Self::with_content(
            StatusCode::INTERNAL_SERVER_ERROR,
            trace.to_string(),
            "text/plain",
        )
    }

    /// Append a header.
    pub fn with_header(mut self, name: &str, value: &str) -> Self {
        self.headers.push((name.to_string(), value.to_string()));
        self
    }

    /// Append a `Last-Modified` header.
    pub fn with_last_modified(self, time: DateTime<Utc>) -> Self {
        let value = time.format(HTTP_DATE_FORMAT).to_string();
        self.with_header("Last-Modified", &value)
    }

    pub fn status(&self) -> StatusCode {
        self.status
    }

    /// First value of a header, compared case-insensitively.
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(k, _)| k.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }

    pub fn headers(&self) -> &[(String, String)] {
        &self.headers
    }

    pub fn body(&self) -> &[u8] {
        &self.body
    }

    /// Body decoded as UTF-8 (lossy). Mostly useful for tests and logs.
    pub fn body_text(&self) -> String {
        String::from_utf8_lossy(&self.body).into_owned()
    }

    /// Split into parts for handing to the HTTP layer.
    pub fn into_parts(self) -> (StatusCode, Vec<(String, String)>, Vec<u8>) {
        (self.status, self.headers, self.body)
    }
}
