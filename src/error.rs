//! Centralized error types for haystack.

use std::path::PathBuf;
use thiserror::Error;

/// All errors produced by the haystack library.
#[derive(Error, Debug)]
pub enum ArchiveError {
    /// I/O error with the associated file path.
    #[error("I/O error reading '{path}': {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },

    /// The specified file does not exist.
    #[error("File not found: {0}")]
    FileNotFound(PathBuf),

    /// The inbound request could not be interpreted.
    #[error(transparent)]
    Request(#[from] RequestError),

    /// A primary-key lookup found no row.
    #[error("{kind} '{id}' not found")]
    NotFound { kind: &'static str, id: String },

    /// The message store rejected a statement.
    #[error("Database error: {0}")]
    Database(#[from] rusqlite::Error),

    /// A stored row did not have the expected shape.
    #[error("Malformed '{table}' row: {reason}")]
    InvalidRecord { table: &'static str, reason: String },

    /// A page template failed to render.
    #[error(transparent)]
    Template(#[from] TemplateError),

    /// A static file has an extension missing from the content-type table.
    #[error("Unknown file type: {0}")]
    UnknownFileType(String),

    /// A message in an mbox file could not be used.
    #[error("Unreadable message at offset {offset}: {reason}")]
    Mbox { offset: u64, reason: String },
}

/// Problems with the client's input. Rendered as `400 Bad Request`.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum RequestError {
    /// The query string or form body is not valid `application/x-www-form-urlencoded`.
    #[error("Failed to parse query string")]
    MalformedQuery,

    /// A POST arrived with a body type other than a URL-encoded form.
    #[error("Unsupported content type: {0}")]
    UnsupportedContentType(String),

    /// A required parameter is absent or has no value.
    #[error("Missing parameter '{0}'")]
    MissingParameter(String),
}

/// Template rendering failures.
#[derive(Error, Debug)]
pub enum TemplateError {
    /// askama could not render a view model.
    #[error("Failed to render {view}")]
    Render {
        view: &'static str,
        #[source]
        source: askama::Error,
    },
}

/// Convenience alias for `Result<T, ArchiveError>`.
pub type Result<T> = std::result::Result<T, ArchiveError>;

impl ArchiveError {
    /// Create an `Io` variant from a path and an `io::Error`.
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }

    /// Create a `NotFound` variant for an entity kind and id.
    pub fn not_found(kind: &'static str, id: impl Into<String>) -> Self {
        Self::NotFound {
            kind,
            id: id.into(),
        }
    }
}

/// Allow `?` on `std::io::Error` when no path context is available
/// (rare, prefer `ArchiveError::io`).
impl From<std::io::Error> for ArchiveError {
    fn from(source: std::io::Error) -> Self {
        Self::Io {
            path: PathBuf::from("<unknown>"),
            source,
        }
    }
}
