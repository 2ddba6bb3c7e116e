//! Schema creation and index maintenance.

use rusqlite::Connection;
use tracing::info;

use crate::error::Result;
use crate::model::message::{FIELDS, FTS_FIELDS};

/// DDL for the archive, derived from the message field table.
pub fn schema_statements() -> Vec<String> {
    let columns = FIELDS
        .iter()
        .map(|(name, ty)| {
            if *name == "id" {
                format!("{name} {} primary key", ty.sql())
            } else {
                format!("{name} {}", ty.sql())
            }
        })
        .collect::<Vec<_>>()
        .join(", ");

    let fts_columns = FTS_FIELDS
        .iter()
        .map(|name| match *name {
            "id" | "thread_id" => format!("{name} UNINDEXED"),
            other => other.to_string(),
        })
        .collect::<Vec<_>>()
        .join(", ");

    vec![
        format!("create table if not exists messages ({columns})"),
        "create index if not exists messages_from_address_idx on messages (from_address)".into(),
        "create index if not exists messages_thread_id_idx on messages (thread_id)".into(),
        format!(
            "create virtual table if not exists messages_fts using fts5 ({fts_columns}, tokenize='porter')"
        ),
    ]
}

pub fn create_schema(conn: &Connection) -> Result<()> {
    for ddl in schema_statements() {
        conn.execute(&ddl, [])?;
    }
    info!("Schema ready");
    Ok(())
}

pub fn optimize(conn: &Connection) -> Result<()> {
    conn.execute("insert into messages_fts (messages_fts) values ('optimize')", [])?;
    info!("Search index optimized");
    Ok(())
}
