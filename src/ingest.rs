//! Offline import of mbox files into the message store.
//!
//! Messages are read in file order. A reply joins the thread of the message
//! it answers when that message has already been seen (in this run or in
//! the store); otherwise it starts a thread of its own.

use std::collections::HashMap;
use std::io::BufRead;
use std::path::PathBuf;

use anyhow::Context;
use rusqlite::{Connection, Transaction};
use serde::Serialize;
use tracing::{debug, info, warn};

use crate::error::{ArchiveError, Result};
use crate::model::Message;
use crate::parser::{HeaderBlock, MboxReader, RawMessage};
use crate::store::MessageStore;

/// Counters reported at the end of an import.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct IngestSummary {
    pub files: usize,
    pub bytes: u64,
    pub messages: usize,
    pub threads: usize,
    pub duplicates: usize,
    pub skipped: usize,
}

/// Thread membership of every known message id.
#[derive(Debug, Default)]
pub struct ThreadAssigner {
    thread_of: HashMap<String, String>,
    sizes: HashMap<String, i64>,
}

impl ThreadAssigner {
    pub fn new() -> Self {
        Self::default()
    }

    /// Seed with the messages already in the store.
    pub fn load(conn: &Connection) -> Result<Self> {
        let mut assigner = Self::new();
        let mut stmt = conn.prepare("select id, coalesce(thread_id, id) from messages")?;
        let rows = stmt.query_map([], |row| Ok((row.get::<_, String>(0)?, row.get::<_, String>(1)?)))?;
        for row in rows {
            let (id, thread_id) = row?;
            assigner.record(id, thread_id);
        }
        debug!(known = assigner.thread_of.len(), "Loaded existing threads");
        Ok(assigner)
    }

    pub fn contains(&self, id: &str) -> bool {
        self.thread_of.contains_key(id)
    }

    /// Set `thread_id` and `thread_position`. Returns true when the message
    /// starts a new thread.
    pub fn assign(&mut self, message: &mut Message, parent_id: Option<&str>) -> bool {
        let joined = parent_id
            .filter(|parent| *parent != message.id)
            .and_then(|parent| self.thread_of.get(parent))
            .cloned();
        let starts_thread = joined.is_none();
        let thread_id = joined.unwrap_or_else(|| message.id.clone());

        message.thread_position = Some(self.sizes.get(&thread_id).copied().unwrap_or(0));
        message.thread_id = Some(thread_id.clone());
        self.record(message.id.clone(), thread_id);
        starts_thread
    }

    fn record(&mut self, id: String, thread_id: String) {
        *self.sizes.entry(thread_id.clone()).or_insert(0) += 1;
        self.thread_of.insert(id, thread_id);
    }
}

/// One import run. Everything is written in a single transaction that is
/// committed by [`finish`](Self::finish); dropping the ingester rolls back.
pub struct Ingester<'conn> {
    tx: Transaction<'conn>,
    threads: ThreadAssigner,
    summary: IngestSummary,
}

impl<'conn> Ingester<'conn> {
    pub fn begin(conn: &'conn mut Connection) -> Result<Self> {
        let tx = conn.transaction()?;
        let threads = ThreadAssigner::load(&tx)?;
        Ok(Self {
            tx,
            threads,
            summary: IngestSummary::default(),
        })
    }

    /// Import every message of one mbox stream. `progress` receives the
    /// reader's byte position after each message.
    pub fn read_mbox<R: BufRead>(
        &mut self,
        reader: &mut MboxReader<R>,
        progress: &mut dyn FnMut(u64),
    ) -> Result<()> {
        let start = reader.offset();
        while let Some(item) = reader.next() {
            match item {
                Ok(raw) => self.add(&raw)?,
                Err(e) => {
                    warn!(error = %e, "Stopping at unreadable input");
                    break;
                }
            }
            progress(reader.offset());
        }
        self.summary.files += 1;
        self.summary.bytes += reader.offset() - start;
        Ok(())
    }

    /// Import one message. Unusable messages and duplicate ids are counted
    /// and skipped.
    pub fn add(&mut self, raw: &RawMessage) -> Result<()> {
        let (mut message, parent_id) = match parse_message(raw) {
            Ok(parsed) => parsed,
            Err(e) => {
                warn!(error = %e, "Skipping message");
                self.summary.skipped += 1;
                return Ok(());
            }
        };

        if self.threads.contains(&message.id) {
            warn!(id = %message.id, offset = raw.offset, "Duplicate message id, skipping");
            self.summary.duplicates += 1;
            return Ok(());
        }

        if self.threads.assign(&mut message, parent_id.as_deref()) {
            self.summary.threads += 1;
        }
        message.save(&self.tx)?;
        self.summary.messages += 1;
        Ok(())
    }

    pub fn summary(&self) -> &IngestSummary {
        &self.summary
    }

    /// Commit the run.
    pub fn finish(self) -> Result<IngestSummary> {
        self.tx.commit()?;
        Ok(self.summary)
    }
}

/// The message and the id of the message it answers.
fn parse_message(raw: &RawMessage) -> Result<(Message, Option<String>)> {
    let headers = HeaderBlock::parse(&raw.bytes);
    if headers.is_empty() {
        return Err(ArchiveError::Mbox {
            offset: raw.offset,
            reason: "no header fields".into(),
        });
    }
    Ok((Message::from_raw(&raw.bytes), headers.parent_id()))
}

/// Import mbox files into the store, creating the schema if needed, then
/// merge the search index.
///
/// `progress` is called with `(bytes_done, bytes_total)` across all files.
pub fn ingest_files(
    store: &MessageStore,
    paths: &[PathBuf],
    progress: Option<&dyn Fn(u64, u64)>,
) -> anyhow::Result<IngestSummary> {
    for path in paths {
        if !path.exists() {
            anyhow::bail!("File not found: {}", path.display());
        }
    }
    let total: u64 = paths
        .iter()
        .filter_map(|p| std::fs::metadata(p).ok())
        .map(|m| m.len())
        .sum();

    store.create_schema()?;
    let mut conn = store.connect()?;
    let mut ingester = Ingester::begin(&mut conn)?;

    let mut done = 0;
    for path in paths {
        info!(path = %path.display(), "Ingesting");
        let mut reader = MboxReader::open(path)
            .with_context(|| format!("Failed to open {}", path.display()))?;
        ingester.read_mbox(&mut reader, &mut |position| {
            if let Some(cb) = progress {
                cb(done + position, total);
            }
        })?;
        done += reader.offset();
    }

    let summary = ingester.finish()?;
    drop(conn);
    store.optimize()?;

    info!(
        files = summary.files,
        messages = summary.messages,
        threads = summary.threads,
        duplicates = summary.duplicates,
        skipped = summary.skipped,
        "Ingestion finished"
    );
    Ok(summary)
}

#[cfg(test)]
mod tests {
    use super::*;

    const MBOX: &[u8] = b"From ann@example.org Thu Jan  4 10:00:00 2024
Message-ID: <root@example.org>
From: Ann <ann@example.org>
Subject: Broker restarts
Date: Thu, 4 Jan 2024 10:00:00 +0000

The broker restarts every hour.

From bo@example.org Thu Jan  4 11:00:00 2024
Message-ID: <reply@example.org>
In-Reply-To: <root@example.org>
From: Bo <bo@example.org>
Subject: Re: Broker restarts
Date: Thu, 4 Jan 2024 11:00:00 +0000

> The broker restarts every hour.
Check the heartbeat setting.

From cy@example.org Thu Jan  4 12:00:00 2024
Message-ID: <deep@example.org>
References: <root@example.org> <reply@example.org>
From: cy@example.org
Subject: Re: Broker restarts
Date: Thu, 4 Jan 2024 12:00:00 +0000

Same here.

From ann@example.org Thu Jan  4 13:00:00 2024
Message-ID: <root@example.org>
From: Ann <ann@example.org>
Subject: Broker restarts
Date: Thu, 4 Jan 2024 10:00:00 +0000

Sent twice.

From dee@example.org Thu Jan  4 14:00:00 2024
Message-ID: <other@example.org>
In-Reply-To: <unknown@example.org>
From: dee@example.org
Subject: New topic
Date: Thu, 4 Jan 2024 14:00:00 +0000

Unrelated.
";

    fn run(conn: &mut Connection, data: &[u8]) -> IngestSummary {
        let mut ingester = Ingester::begin(conn).unwrap();
        let mut reader = MboxReader::new(data);
        ingester.read_mbox(&mut reader, &mut |_| {}).unwrap();
        ingester.finish().unwrap()
    }

    fn schema_conn() -> Connection {
        let conn = Connection::open_in_memory().unwrap();
        crate::store::schema::create_schema(&conn).unwrap();
        conn
    }

    #[test]
    fn test_threads_and_duplicates() {
        let mut conn = schema_conn();
        let summary = run(&mut conn, MBOX);

        assert_eq!(summary.messages, 4);
        assert_eq!(summary.duplicates, 1);
        assert_eq!(summary.threads, 2);
        assert_eq!(summary.files, 1);
        assert_eq!(summary.bytes, MBOX.len() as u64);

        let deep: Message = MessageStore::require(&conn, "<deep@example.org>").unwrap();
        assert_eq!(deep.thread_id.as_deref(), Some("<root@example.org>"));
        assert_eq!(deep.thread_position, Some(2));

        let root: Message = MessageStore::require(&conn, "<root@example.org>").unwrap();
        assert_eq!(root.thread_id.as_deref(), Some("<root@example.org>"));
        assert_eq!(root.thread_position, Some(0));
        assert!(root.content().contains("every hour"));

        let other: Message = MessageStore::require(&conn, "<other@example.org>").unwrap();
        assert_eq!(other.thread_id.as_deref(), Some("<other@example.org>"));
        assert_eq!(other.thread_position, Some(0));
    }

    #[test]
    fn test_second_run_continues_threads() {
        let mut conn = schema_conn();
        run(&mut conn, MBOX);

        let later = b"From eve@example.org Fri Jan  5 09:00:00 2024
Message-ID: <late@example.org>
In-Reply-To: <reply@example.org>
From: eve@example.org
Subject: Re: Broker restarts

Fixed in the next release.
";
        let summary = run(&mut conn, later);
        assert_eq!(summary.messages, 1);
        assert_eq!(summary.threads, 0);

        let late: Message = MessageStore::require(&conn, "<late@example.org>").unwrap();
        assert_eq!(late.thread_id.as_deref(), Some("<root@example.org>"));
        assert_eq!(late.thread_position, Some(3));
    }

    #[test]
    fn test_dropped_ingester_rolls_back() {
        let mut conn = schema_conn();
        {
            let mut ingester = Ingester::begin(&mut conn).unwrap();
            let mut reader = MboxReader::new(MBOX);
            ingester.read_mbox(&mut reader, &mut |_| {}).unwrap();
        }
        let found: Option<Message> = MessageStore::get(&conn, "<root@example.org>").unwrap();
        assert!(found.is_none());
    }

    #[test]
    fn test_assigner_ignores_self_reference() {
        let mut threads = ThreadAssigner::new();
        let mut message = Message::new("<a@x>", "");
        assert!(threads.assign(&mut message, Some("<a@x>")));
        assert_eq!(message.thread_id.as_deref(), Some("<a@x>"));
        assert!(threads.contains("<a@x>"));
    }

    #[test]
    fn test_ingest_files_missing_file() {
        let tmp = tempfile::tempdir().unwrap();
        let store = MessageStore::new(tmp.path().join("data.sqlite"));
        let err = ingest_files(&store, &[tmp.path().join("nope.mbox")], None).unwrap_err();
        assert!(err.to_string().contains("File not found"));
    }

    #[test]
    fn test_ingest_files_reports_progress() {
        let tmp = tempfile::tempdir().unwrap();
        let mbox = tmp.path().join("list.mbox");
        std::fs::write(&mbox, MBOX).unwrap();
        let store = MessageStore::new(tmp.path().join("data").join("data.sqlite"));

        let last = std::cell::Cell::new((0, 0));
        let summary = ingest_files(&store, &[mbox], Some(&|done, total| last.set((done, total)))).unwrap();

        assert_eq!(summary.messages, 4);
        assert_eq!(last.get(), (MBOX.len() as u64, MBOX.len() as u64));
        let conn = store.connect().unwrap();
        let stats = crate::store::queries::stats(&conn).unwrap();
        assert_eq!(stats.messages, 4);
        assert_eq!(stats.threads, 2);
    }
}
