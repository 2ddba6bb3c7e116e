//! The archived message record.

use std::hash::{DefaultHasher, Hash, Hasher};

use rusqlite::types::Value;
use rusqlite::{params_from_iter, Connection};
use serde::Serialize;
use tracing::trace;

use super::address::EmailAddress;
use crate::error::{ArchiveError, Result};
use crate::parser::{resolve_body, HeaderBlock};
use crate::store::{DatabaseObject, Record};
use crate::web::Entity;

/// Storage class of a column.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ColumnType {
    Text,
    Integer,
}

impl ColumnType {
    pub fn sql(self) -> &'static str {
        match self {
            Self::Text => "text",
            Self::Integer => "integer",
        }
    }
}

/// Columns of the `messages` table, in positional order.
pub const FIELDS: &[(&str, ColumnType)] = &[
    ("id", ColumnType::Text),
    ("in_reply_to_id", ColumnType::Text),
    ("from_name", ColumnType::Text),
    ("from_address", ColumnType::Text),
    ("list_id", ColumnType::Text),
    ("date", ColumnType::Integer),
    ("subject", ColumnType::Text),
    ("content_type", ColumnType::Text),
    ("content", ColumnType::Text),
    ("authored_content", ColumnType::Text),
    ("authored_words", ColumnType::Integer),
    ("thread_id", ColumnType::Text),
    ("thread_position", ColumnType::Integer),
];

/// Columns of the `messages_fts` search index.
pub const FTS_FIELDS: &[&str] = &["id", "thread_id", "subject", "authored_content"];

/// Comma-separated column list, for `select` statements.
pub fn column_list() -> String {
    FIELDS.iter().map(|(name, _)| *name).collect::<Vec<_>>().join(", ")
}

/// One archived email.
///
/// `content`, `authored_content` and `authored_words` are only ever set
/// together, so the word count always matches the authored text.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Message {
    pub id: String,
    pub in_reply_to_id: Option<String>,
    pub from_name: Option<String>,
    pub from_address: Option<String>,
    pub list_id: Option<String>,
    /// Seconds since the epoch.
    pub date: Option<i64>,
    pub subject: Option<String>,
    pub content_type: Option<String>,
    content: String,
    authored_content: String,
    authored_words: i64,
    pub thread_id: Option<String>,
    pub thread_position: Option<i64>,
}

impl Message {
    /// A message with only an id and a body.
    pub fn new(id: impl Into<String>, content: impl Into<String>) -> Self {
        let content = content.into();
        let authored_content = authored_content(&content);
        let authored_words = authored_content.split_whitespace().count() as i64;
        Self {
            id: id.into(),
            in_reply_to_id: None,
            from_name: None,
            from_address: None,
            list_id: None,
            date: None,
            subject: None,
            content_type: None,
            content,
            authored_content,
            authored_words,
            thread_id: None,
            thread_position: None,
        }
    }

    /// Build a message from a raw RFC 5322 message (an mbox `From ` line
    /// may precede it).
    pub fn from_raw(raw: &[u8]) -> Self {
        let headers = HeaderBlock::parse(raw);
        let body = resolve_body(raw);

        let from = EmailAddress::parse(&headers.text("from").unwrap_or_default());
        let date = headers.date().map_or(0, |d| d.timestamp());
        let subject = headers.text("subject");

        let id = headers
            .message_id()
            .unwrap_or_else(|| synthetic_id(date, &from.address, subject.as_deref()));

        let mut message = Self::new(id, body.content);
        message.in_reply_to_id = headers.in_reply_to();
        message.from_name = Some(from.name);
        message.from_address = Some(from.address);
        message.list_id = headers.text("list-id");
        message.date = Some(date);
        message.subject = subject;
        message.content_type = Some(body.content_type);

        trace!(id = %message.id, words = message.authored_words, "Parsed message");
        message
    }

    pub fn content(&self) -> &str {
        &self.content
    }

    /// The body without quoted lines.
    pub fn authored_content(&self) -> &str {
        &self.authored_content
    }

    pub fn authored_words(&self) -> i64 {
        self.authored_words
    }

    /// Display name of the sender, falling back to the address.
    pub fn sender_label(&self) -> &str {
        match (self.from_name.as_deref(), self.from_address.as_deref()) {
            (Some(name), _) if !name.is_empty() => name,
            (_, Some(address)) => address,
            _ => "",
        }
    }

    /// Column values in [`FIELDS`] order.
    pub fn to_record(&self) -> Record {
        fn text(v: &Option<String>) -> Value {
            v.clone().map_or(Value::Null, Value::Text)
        }
        fn int(v: Option<i64>) -> Value {
            v.map_or(Value::Null, Value::Integer)
        }

        vec![
            Value::Text(self.id.clone()),
            text(&self.in_reply_to_id),
            text(&self.from_name),
            text(&self.from_address),
            text(&self.list_id),
            int(self.date),
            text(&self.subject),
            text(&self.content_type),
            Value::Text(self.content.clone()),
            Value::Text(self.authored_content.clone()),
            Value::Integer(self.authored_words),
            text(&self.thread_id),
            int(self.thread_position),
        ]
    }

    /// Insert the row and its search-index row.
    pub fn save(&self, conn: &Connection) -> Result<()> {
        let placeholders = vec!["?"; FIELDS.len()].join(", ");
        let dml = format!("insert into messages ({}) values ({placeholders})", column_list());
        conn.execute(&dml, params_from_iter(self.to_record()))?;

        let fts_columns = FTS_FIELDS.join(", ");
        let placeholders = vec!["?"; FTS_FIELDS.len()].join(", ");
        let dml = format!("insert into messages_fts ({fts_columns}) values ({placeholders})");
        conn.execute(
            &dml,
            rusqlite::params![
                self.id,
                self.thread_id,
                self.subject,
                self.authored_content
            ],
        )?;

        Ok(())
    }
}

impl DatabaseObject for Message {
    const TABLE: &'static str = "messages";
    const KIND: &'static str = "Message";

    fn columns() -> String {
        column_list()
    }

    fn from_record(record: Record) -> Result<Self> {
        if record.len() != FIELDS.len() {
            return Err(ArchiveError::InvalidRecord {
                table: Self::TABLE,
                reason: format!("expected {} columns, got {}", FIELDS.len(), record.len()),
            });
        }

        let mut values = record.into_iter();
        let mut text = || text_value(values.next().unwrap_or(Value::Null));

        let id = text().ok_or_else(|| ArchiveError::InvalidRecord {
            table: Self::TABLE,
            reason: "null id".into(),
        })?;
        let in_reply_to_id = text();
        let from_name = text();
        let from_address = text();
        let list_id = text();
        let date = text();
        let subject = text();
        let content_type = text();
        let content = text().unwrap_or_default();
        let authored_content = text().unwrap_or_default();
        let authored_words = text();
        let thread_id = text();
        let thread_position = text();

        Ok(Self {
            id,
            in_reply_to_id,
            from_name,
            from_address,
            list_id,
            date: int_value("date", date)?,
            subject,
            content_type,
            content,
            authored_content,
            authored_words: int_value("authored_words", authored_words)?.unwrap_or(0),
            thread_id,
            thread_position: int_value("thread_position", thread_position)?,
        })
    }
}

impl Entity for Message {
    fn id(&self) -> &str {
        &self.id
    }

    fn name(&self) -> &str {
        self.subject.as_deref().unwrap_or("")
    }
}

/// Text form of a stored value. NULL stays `None`.
fn text_value(value: Value) -> Option<String> {
    match value {
        Value::Null => None,
        Value::Integer(i) => Some(i.to_string()),
        Value::Real(f) => Some(f.to_string()),
        Value::Text(s) => Some(s),
        Value::Blob(b) => Some(String::from_utf8_lossy(&b).into_owned()),
    }
}

/// Coerce an integer column. Reals are truncated.
fn int_value(column: &str, value: Option<String>) -> Result<Option<i64>> {
    let Some(raw) = value else {
        return Ok(None);
    };
    raw.parse::<i64>()
        .or_else(|_| raw.parse::<f64>().map(|f| f as i64))
        .map(Some)
        .map_err(|_| ArchiveError::InvalidRecord {
            table: "messages",
            reason: format!("{column} is not an integer: {raw:?}"),
        })
}

/// Every trimmed line that does not start with `>`, joined with `\n`.
pub fn authored_content(content: &str) -> String {
    content
        .lines()
        .map(str::trim)
        .filter(|line| !line.starts_with('>'))
        .collect::<Vec<_>>()
        .join("\n")
}

/// Stand-in id for a message without `Message-ID`.
fn synthetic_id(date: i64, address: &str, subject: Option<&str>) -> String {
    let mut hasher = DefaultHasher::new();
    address.hash(&mut hasher);
    subject.hash(&mut hasher);
    format!("<{date}.{:016x}@haystack.invalid>", hasher.finish())
}
