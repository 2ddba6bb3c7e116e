//! Request dispatch: a path→page table, a path→file table, and the single
//! place where errors become responses.

use std::collections::HashMap;
use std::fmt::Write as _;
use std::panic::{self, AssertUnwindSafe};
use std::path::Path;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use tracing::{debug, error, info, warn};
use walkdir::WalkDir;

use super::page::Page;
use super::request::{RawRequest, Request};
use super::response::Response;
use crate::error::{ArchiveError, Result};

/// Document served for `/`.
pub const DEFAULT_DOCUMENT: &str = "/index.html";

/// Fixed extension → content-type table for static files.
const CONTENT_TYPES: &[(&str, &str)] = &[
    ("css", "text/css"),
    ("html", "application/xhtml+xml; charset=utf-8"),
    ("ico", "image/x-icon"),
    ("jpeg", "image/jpeg"),
    ("jpg", "image/jpeg"),
    ("js", "application/javascript"),
    ("pdf", "application/pdf"),
    ("png", "image/png"),
    ("svg", "image/svg+xml"),
    ("txt", "text/plain; charset=utf-8"),
    ("woff", "application/font-woff"),
];

/// Look up the content type for a file path by its extension.
pub fn content_type_for(path: &str) -> Option<&'static str> {
    let name = path.rsplit('/').next().unwrap_or(path);
    let (_, ext) = name.rsplit_once('.')?;
    CONTENT_TYPES
        .iter()
        .find(|(known, _)| known.eq_ignore_ascii_case(ext))
        .map(|(_, content_type)| *content_type)
}

/// One static asset.
#[derive(Debug, Clone)]
pub struct StaticFile {
    pub content: Vec<u8>,
    pub content_type: &'static str,
}

/// Static assets captured once at startup.
#[derive(Debug, Clone)]
pub struct StaticFiles {
    files: HashMap<String, StaticFile>,
    loaded_at: DateTime<Utc>,
}

impl Default for StaticFiles {
    fn default() -> Self {
        Self {
            files: HashMap::new(),
            loaded_at: Utc::now(),
        }
    }
}

impl StaticFiles {
    /// Read every file below `dir`, keyed by `/`-prefixed relative path.
    ///
    /// A missing directory yields an empty set. A file whose extension is
    /// not in the content-type table fails the whole load.
    pub fn load(dir: &Path) -> Result<Self> {
        let mut files = Self::default();

        if !dir.is_dir() {
            info!(dir = %dir.display(), "No static files directory, serving pages only");
            return Ok(files);
        }

        for entry in WalkDir::new(dir).follow_links(true) {
            let entry = entry.map_err(|e| {
                let path = e.path().unwrap_or(dir).to_path_buf();
                ArchiveError::io(path, std::io::Error::other(e.to_string()))
            })?;
            if !entry.file_type().is_file() {
                continue;
            }

            let relative = entry
                .path()
                .strip_prefix(dir)
                .map_err(|_| ArchiveError::io(entry.path(), std::io::Error::other("outside root")))?;
            let key = relative
                .components()
                .map(|c| c.as_os_str().to_string_lossy())
                .fold(String::new(), |mut acc, part| {
                    acc.push('/');
                    acc.push_str(&part);
                    acc
                });

            let content = std::fs::read(entry.path()).map_err(|e| ArchiveError::io(entry.path(), e))?;
            files.insert(&key, content)?;
        }

        info!(dir = %dir.display(), count = files.len(), "Loaded static files");
        Ok(files)
    }

    /// Register one file. Fails on an unknown extension.
    pub fn insert(&mut self, path: &str, content: Vec<u8>) -> Result<()> {
        let content_type =
            content_type_for(path).ok_or_else(|| ArchiveError::UnknownFileType(path.to_string()))?;
        debug!(path = path, bytes = content.len(), "Static file");
        self.files.insert(
            path.to_string(),
            StaticFile {
                content,
                content_type,
            },
        );
        Ok(())
    }

    pub fn get(&self, path: &str) -> Option<&StaticFile> {
        self.files.get(path)
    }

    pub fn len(&self) -> usize {
        self.files.len()
    }

    pub fn is_empty(&self) -> bool {
        self.files.is_empty()
    }

    /// Last-modified time reported for every file.
    pub fn loaded_at(&self) -> DateTime<Utc> {
        self.loaded_at
    }
}

/// Immutable routing tables. `R` identifies which handler serves a page.
#[derive(Debug)]
pub struct Router<R> {
    pages: HashMap<String, (Arc<Page>, R)>,
    files: StaticFiles,
}

impl<R: Copy> Router<R> {
    pub fn new(files: StaticFiles) -> Self {
        Self {
            pages: HashMap::new(),
            files,
        }
    }

    /// Register a page under its path. Startup only.
    pub fn add_page(&mut self, page: Arc<Page>, route: R) {
        self.pages.insert(page.path().to_string(), (page, route));
    }

    pub fn files(&self) -> &StaticFiles {
        &self.files
    }

    /// Handle one request.
    ///
    /// `handle` is called for registered pages. Every failure, including a
    /// panic inside `handle`, comes back as a response.
    pub fn dispatch<F>(&self, raw: RawRequest, handle: F) -> Response
    where
        F: FnOnce(R, &Page, &Request) -> Result<Response>,
    {
        let path = raw.path.clone();
        let outcome = panic::catch_unwind(AssertUnwindSafe(|| self.process(raw, handle)));

        match outcome {
            Ok(Ok(response)) => response,
            Ok(Err(err)) => error_response(&path, &err),
            Err(payload) => {
                let message = payload
                    .downcast_ref::<&str>()
                    .map(|s| s.to_string())
                    .or_else(|| payload.downcast_ref::<String>().cloned())
                    .unwrap_or_else(|| "unknown panic".to_string());
                error!(path = %path, panic = %message, "Handler panicked");
                Response::unexpected_error(&format!("Error: handler panicked: {message}\n"))
            }
        }
    }

    fn process<F>(&self, raw: RawRequest, handle: F) -> Result<Response>
    where
        F: FnOnce(R, &Page, &Request) -> Result<Response>,
    {
        let request = Request::load(raw)?;
        let unescaped = request.unescaped_path();
        let path = match unescaped.as_str() {
            "/" => DEFAULT_DOCUMENT,
            other => other,
        };
        debug!(method = %request.method(), raw = request.path(), path = path, "Dispatching");

        match self.pages.get(path) {
            Some((page, route)) => handle(*route, page, &request),
            None => Ok(self.send_file(&request, path)),
        }
    }

    /// Serve a static file, honouring `If-Modified-Since`.
    pub fn send_file(&self, request: &Request, path: &str) -> Response {
        let Some(file) = self.files.get(path) else {
            debug!(path = path, "No page or file");
            return Response::not_found();
        };

        let loaded_at = self.files.loaded_at();
        if !request.is_resource_modified(Some(loaded_at)) {
            return Response::not_modified();
        }

        Response::ok(file.content.clone(), file.content_type).with_last_modified(loaded_at)
    }
}

/// Translate an error into the response the client sees.
pub fn error_response(path: &str, err: &ArchiveError) -> Response {
    match err {
        ArchiveError::Request(e) => {
            warn!(path = path, error = %e, "Bad request");
            Response::bad_request(&e.to_string())
        }
        ArchiveError::NotFound { kind, id } => {
            debug!(path = path, kind = kind, id = %id, "Object not found");
            Response::not_found()
        }
        other => {
            error!(path = path, error = %other, "Request failed");
            Response::unexpected_error(&diagnostic_trace(other))
        }
    }
}

/// The error followed by its chain of causes.
pub fn diagnostic_trace(err: &dyn std::error::Error) -> String {
    let mut out = format!("Error: {err}\n");
    let mut source = err.source();
    if source.is_some() {
        out.push_str("\nCaused by:\n");
    }
    let mut depth = 0;
    while let Some(cause) = source {
        let _ = writeln!(out, "    {depth}: {cause}");
        depth += 1;
        source = cause.source();
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::RequestError;
    use axum::http::StatusCode;

    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    enum Route {
        Index,
        Boom,
        Panic,
        Missing,
    }

    fn router() -> Router<Route> {
        let mut files = StaticFiles::default();
        files.insert("/site.css", b"body { color: black; }".to_vec()).unwrap();
        files.insert("/img/logo.png", vec![0x89, b'P', b'N', b'G', 0, 1, 2]).unwrap();

        let root = Arc::new(Page::new(None, "Home", "/index.html"));
        let boom = Arc::new(Page::new(Some(root.clone()), "Boom", "/boom.html"));
        let panic = Arc::new(Page::new(Some(root.clone()), "Panic", "/panic.html"));
        let missing = Arc::new(Page::new(Some(root.clone()), "Missing", "/missing.html?id={}"));

        let mut router = Router::new(files);
        router.add_page(root, Route::Index);
        router.add_page(boom, Route::Boom);
        router.add_page(panic, Route::Panic);
        router.add_page(missing, Route::Missing);
        router
    }

    fn handle(route: Route, page: &Page, request: &Request) -> Result<Response> {
        match route {
            Route::Index => Ok(page.send_response("hello", None)?),
            Route::Boom => Err(ArchiveError::InvalidRecord {
                table: "messages",
                reason: "boom".into(),
            }),
            Route::Panic => panic!("kaboom"),
            Route::Missing => {
                let id = request.get("id")?;
                Err(ArchiveError::not_found("Message", id))
            }
        }
    }

    fn get(router: &Router<Route>, target: &str) -> Response {
        router.dispatch(RawRequest::get(target), handle)
    }

    #[test]
    fn test_content_type_table() {
        assert_eq!(content_type_for("/site.css"), Some("text/css"));
        assert_eq!(content_type_for("/a/b/photo.JPG"), Some("image/jpeg"));
        assert_eq!(content_type_for("/archive.tar.gz"), None);
        assert_eq!(content_type_for("/README"), None);
    }

    #[test]
    fn test_root_maps_to_index() {
        let router = router();
        let resp = get(&router, "/");
        assert_eq!(resp.status(), StatusCode::OK);
        assert!(resp.body_text().contains("hello"));
    }

    #[test]
    fn test_unknown_path_is_404() {
        let router = router();
        for target in ["/nope.html", "/site.css/extra", "/img/other.png", "/SITE.CSS"] {
            let resp = get(&router, target);
            assert_eq!(resp.status(), StatusCode::NOT_FOUND, "target: {target}");
            assert_eq!(resp.body_text(), "404 Not Found");
        }
    }

    #[test]
    fn test_static_file_exact_bytes() {
        let router = router();
        let resp = get(&router, "/img/logo.png");
        assert_eq!(resp.status(), StatusCode::OK);
        assert_eq!(resp.header("Content-Type"), Some("image/png"));
        assert_eq!(resp.body(), &[0x89, b'P', b'N', b'G', 0, 1, 2]);
        assert_eq!(resp.header("Content-Length"), Some("7"));
        assert!(resp.header("Last-Modified").is_some());
    }

    #[test]
    fn test_static_file_with_escaped_name() {
        let mut files = StaticFiles::default();
        files.insert("/Open Sans.css", b"a{}".to_vec()).unwrap();
        files.insert("/café.png", vec![1, 2, 3]).unwrap();
        let router = Router::<Route>::new(files);

        let resp = get(&router, "/Open%20Sans.css");
        assert_eq!(resp.status(), StatusCode::OK);
        assert_eq!(resp.body(), b"a{}");

        let resp = get(&router, "/caf%C3%A9.png");
        assert_eq!(resp.status(), StatusCode::OK);
        assert_eq!(resp.header("Content-Type"), Some("image/png"));
    }

    #[test]
    fn test_static_file_not_modified() {
        let router = router();
        let since = (router.files().loaded_at() + chrono::Duration::seconds(5))
            .format(super::super::response::HTTP_DATE_FORMAT)
            .to_string();
        let raw = RawRequest::get("/site.css").with_if_modified_since(&since);
        let resp = router.dispatch(raw, handle);
        assert_eq!(resp.status(), StatusCode::NOT_MODIFIED);
        assert!(resp.body().is_empty());
    }

    #[test]
    fn test_unexpected_error_is_500_with_trace() {
        let router = router();
        let resp = get(&router, "/boom.html");
        assert_eq!(resp.status(), StatusCode::INTERNAL_SERVER_ERROR);
        assert!(resp.body_text().starts_with("Error: Malformed 'messages' row: boom"));
    }

    #[test]
    fn test_panic_is_500() {
        let router = router();
        let resp = get(&router, "/panic.html");
        assert_eq!(resp.status(), StatusCode::INTERNAL_SERVER_ERROR);
        assert!(resp.body_text().contains("kaboom"));
    }

    #[test]
    fn test_not_found_error_is_404() {
        let router = router();
        let resp = get(&router, "/missing.html?id=abc");
        assert_eq!(resp.status(), StatusCode::NOT_FOUND);
    }

    #[test]
    fn test_request_errors_are_400() {
        let router = router();

        let resp = get(&router, "/missing.html");
        assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
        assert_eq!(resp.body_text(), "Error! Missing parameter 'id'");

        let resp = get(&router, "/missing.html?id");
        assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
        assert_eq!(resp.body_text(), "Error! Failed to parse query string");
    }

    #[test]
    fn test_unknown_extension_rejected_at_load() {
        let mut files = StaticFiles::default();
        let err = files.insert("/notes.md", b"# hi".to_vec()).unwrap_err();
        assert!(matches!(err, ArchiveError::UnknownFileType(p) if p == "/notes.md"));
    }

    #[test]
    fn test_load_directory_tree() {
        let tmp = tempfile::tempdir().unwrap();
        std::fs::create_dir_all(tmp.path().join("css")).unwrap();
        std::fs::write(tmp.path().join("site.css"), "a{}").unwrap();
        std::fs::write(tmp.path().join("css").join("extra.css"), "b{}").unwrap();

        let files = StaticFiles::load(tmp.path()).unwrap();
        assert_eq!(files.len(), 2);
        assert_eq!(files.get("/site.css").unwrap().content, b"a{}");
        assert_eq!(files.get("/css/extra.css").unwrap().content_type, "text/css");
    }

    #[test]
    fn test_load_missing_directory_is_empty() {
        let tmp = tempfile::tempdir().unwrap();
        let files = StaticFiles::load(&tmp.path().join("absent")).unwrap();
        assert!(files.is_empty());
    }

    #[test]
    fn test_load_unknown_extension_fails() {
        let tmp = tempfile::tempdir().unwrap();
        std::fs::write(tmp.path().join("data.bin"), [0u8; 4]).unwrap();
        let err = StaticFiles::load(tmp.path()).unwrap_err();
        assert!(matches!(err, ArchiveError::UnknownFileType(_)));
    }

    #[test]
    fn test_diagnostic_trace_includes_causes() {
        let err = ArchiveError::io("/tmp/x", std::io::Error::other("disk on fire"));
        let trace = diagnostic_trace(&err);
        assert!(trace.starts_with("Error: I/O error reading '/tmp/x'"));
        assert!(trace.contains("Caused by:"));
        assert!(trace.contains("0: disk on fire"));
    }

    #[test]
    fn test_request_error_variant_maps_to_400() {
        let resp = error_response("/x", &ArchiveError::Request(RequestError::MalformedQuery));
        assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
    }
}
