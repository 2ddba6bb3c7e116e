//! SQLite-backed message store.
//!
//! The store itself only knows where the database lives. Callers open one
//! [`Connection`] per unit of work and pass it to every query; dropping the
//! connection closes it.

pub mod queries;
pub mod schema;

use std::path::{Path, PathBuf};

use rusqlite::types::Value;
use rusqlite::{Connection, Params};
use tracing::{debug, info};

use crate::error::{ArchiveError, Result};

pub use queries::ArchiveStats;

/// Ordered column values of one result row.
pub type Record = Vec<Value>;

/// A row type that can be loaded by primary key.
pub trait DatabaseObject: Sized {
    /// Table the rows live in.
    const TABLE: &'static str;
    /// Human-readable kind, used in not-found errors.
    const KIND: &'static str;

    /// Column list matching the positional order of [`from_record`](Self::from_record).
    fn columns() -> String;

    fn from_record(record: Record) -> Result<Self>;
}

/// Handle on the archive database file.
#[derive(Debug, Clone)]
pub struct MessageStore {
    path: PathBuf,
}

impl MessageStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        let path = path.into();
        info!(path = %path.display(), "Using database");
        Self { path }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Open a connection. The caller owns it; it closes on drop.
    pub fn connect(&self) -> Result<Connection> {
        let conn = Connection::open(&self.path)?;
        debug!(path = %self.path.display(), "Opened connection");
        Ok(conn)
    }

    /// Create the `messages` table, its index, and the search index.
    pub fn create_schema(&self) -> Result<()> {
        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent).map_err(|e| ArchiveError::io(parent, e))?;
        }
        let conn = self.connect()?;
        schema::create_schema(&conn)
    }

    /// Merge the search index segments.
    pub fn optimize(&self) -> Result<()> {
        let conn = self.connect()?;
        schema::optimize(&conn)
    }

    /// Run a statement and collect every row.
    pub fn query<P: Params>(conn: &Connection, sql: &str, params: P) -> Result<Vec<Record>> {
        let mut stmt = conn.prepare(sql)?;
        let width = stmt.column_count();
        let rows = stmt.query_map(params, |row| {
            (0..width)
                .map(|i| row.get::<_, Value>(i))
                .collect::<rusqlite::Result<Record>>()
        })?;

        let records = rows.collect::<rusqlite::Result<Vec<_>>>()?;
        debug!(rows = records.len(), "Query finished");
        Ok(records)
    }

    /// Load one row by primary key.
    pub fn get<T: DatabaseObject>(conn: &Connection, id: &str) -> Result<Option<T>> {
        debug!(kind = T::KIND, id = id, "Getting object");
        let sql = format!("select {} from {} where id = ?1", T::columns(), T::TABLE);
        Self::query(conn, &sql, [id])?
            .into_iter()
            .next()
            .map(T::from_record)
            .transpose()
    }

    /// Load one row by primary key, failing with `NotFound` when absent.
    pub fn require<T: DatabaseObject>(conn: &Connection, id: &str) -> Result<T> {
        Self::get(conn, id)?.ok_or_else(|| ArchiveError::not_found(T::KIND, id))
    }
}
