//! Inbound request abstraction: path segments, parameters, and conditional GET.

use std::collections::HashMap;

use axum::http::Method;
use chrono::{DateTime, Utc};
use tracing::debug;

use percent_encoding::percent_decode_str;

use super::escape::url_unescape;
use crate::error::RequestError;

/// The only body type accepted on POST.
const FORM_CONTENT_TYPE: &str = "application/x-www-form-urlencoded";

/// An inbound HTTP exchange before any parsing has happened.
///
/// The hosting layer fills this in; [`Request::load`] turns it into a
/// [`Request`] inside the dispatcher so that parse failures go through the
/// same error translation as handler failures.
#[derive(Debug, Clone)]
pub struct RawRequest {
    pub method: Method,
    /// Path component, still percent-encoded.
    pub path: String,
    pub query: Option<String>,
    pub content_type: Option<String>,
    pub if_modified_since: Option<String>,
    pub body: Vec<u8>,
}

impl RawRequest {
    /// A bare GET for `target` (`/path?query`).
    pub fn get(target: &str) -> Self {
        let (path, query) = match target.split_once('?') {
            Some((path, query)) => (path.to_string(), Some(query.to_string())),
            None => (target.to_string(), None),
        };
        Self {
            method: Method::GET,
            path,
            query,
            content_type: None,
            if_modified_since: None,
            body: Vec::new(),
        }
    }

    /// A POST for `path` with a body of the given type.
    pub fn post(path: &str, content_type: &str, body: impl Into<Vec<u8>>) -> Self {
        Self {
            method: Method::POST,
            path: path.to_string(),
            query: None,
            content_type: Some(content_type.to_string()),
            if_modified_since: None,
            body: body.into(),
        }
    }

    /// Attach an `If-Modified-Since` header value.
    pub fn with_if_modified_since(mut self, value: &str) -> Self {
        self.if_modified_since = Some(value.to_string());
        self
    }
}

/// A parsed request. One per inbound call.
#[derive(Debug, Clone)]
pub struct Request {
    method: Method,
    path: String,
    segments: Vec<String>,
    parameters: HashMap<String, Vec<String>>,
    if_modified_since: Option<String>,
}

impl Request {
    /// Parse the path and the parameters of a raw request.
    pub fn load(raw: RawRequest) -> Result<Self, RequestError> {
        let segments = parse_path(&raw.path);

        let parameters = if raw.method == Method::POST {
            let content_type = raw.content_type.as_deref().unwrap_or("");
            let essence = content_type.split(';').next().unwrap_or("").trim();
            if !essence.eq_ignore_ascii_case(FORM_CONTENT_TYPE) {
                return Err(RequestError::UnsupportedContentType(content_type.to_string()));
            }
            let body = std::str::from_utf8(&raw.body).map_err(|_| RequestError::MalformedQuery)?;
            parse_query_string(body)?
        } else {
            parse_query_string(raw.query.as_deref().unwrap_or(""))?
        };

        debug!(method = %raw.method, path = %raw.path, params = parameters.len(), "Loaded request");

        Ok(Self {
            method: raw.method,
            path: raw.path,
            segments,
            parameters,
            if_modified_since: raw.if_modified_since,
        })
    }

    pub fn method(&self) -> &Method {
        &self.method
    }

    /// The raw (still percent-encoded) path.
    pub fn path(&self) -> &str {
        &self.path
    }

    /// Path segments with URL escapes resolved.
    pub fn segments(&self) -> &[String] {
        &self.segments
    }

    /// The path rebuilt from its unescaped segments. Pages and static
    /// files are looked up by this.
    pub fn unescaped_path(&self) -> String {
        format!("/{}", self.segments().join("/"))
    }

    /// First value of a parameter.
    ///
    /// Fails when the name is absent or carries no value; call sites that
    /// tolerate absence use [`Request::get_or`].
    pub fn get(&self, name: &str) -> Result<&str, RequestError> {
        self.parameters
            .get(name)
            .and_then(|values| values.first())
            .map(String::as_str)
            .ok_or_else(|| RequestError::MissingParameter(name.to_string()))
    }

    /// First value of a parameter, or `default`.
    pub fn get_or<'a>(&'a self, name: &str, default: &'a str) -> &'a str {
        self.get(name).unwrap_or(default)
    }

    /// Whether a resource last modified at `modified` should be sent again.
    ///
    /// Returns `true` unless both the modification time and a parseable
    /// `If-Modified-Since` header are present and the resource is not newer
    /// than the header, compared at second precision.
    pub fn is_resource_modified(&self, modified: Option<DateTime<Utc>>) -> bool {
        let (Some(modified), Some(header)) = (modified, self.if_modified_since.as_deref()) else {
            return true;
        };

        match parse_http_date(header) {
            Some(since) => modified.timestamp() > since.timestamp(),
            None => {
                debug!(header = header, "Ignoring unparseable If-Modified-Since");
                true
            }
        }
    }
}

/// Split a path on `/` and percent-decode each segment. The leading `/` is
/// dropped. A `+` in a path is a literal plus.
fn parse_path(path: &str) -> Vec<String> {
    let trimmed = path.strip_prefix('/').unwrap_or(path);
    trimmed
        .split('/')
        .map(|segment| percent_decode_str(segment).decode_utf8_lossy().into_owned())
        .collect()
}

/// Strict `application/x-www-form-urlencoded` parsing.
///
/// Every non-empty field must contain `=`. Fields with blank values are dropped.
fn parse_query_string(query: &str) -> Result<HashMap<String, Vec<String>>, RequestError> {
    let mut parameters: HashMap<String, Vec<String>> = HashMap::new();

    for field in query.split('&') {
        if field.is_empty() {
            continue;
        }
        let (name, value) = field.split_once('=').ok_or(RequestError::MalformedQuery)?;
        if value.is_empty() {
            continue;
        }
        parameters
            .entry(url_unescape(name))
            .or_default()
            .push(url_unescape(value));
    }

    Ok(parameters)
}

/// Parse an HTTP date (RFC 1123, which is a profile of RFC 2822).
fn parse_http_date(value: &str) -> Option<DateTime<Utc>> {
    DateTime::parse_from_rfc2822(value.trim())
        .ok()
        .map(|dt| dt.with_timezone(&Utc))
}
