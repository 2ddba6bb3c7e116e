//! Named queries over the archive.

use rusqlite::types::Value;
use rusqlite::Connection;
use serde::Serialize;
use tracing::debug;

use super::{DatabaseObject, MessageStore, Record};
use crate::error::Result;
use crate::model::message::column_list;
use crate::model::Message;

/// Turn user input into an FTS5 query: every whitespace-separated word
/// becomes its own quoted string, so all words must match but need not be
/// adjacent.
///
/// Embedded double quotes are doubled, so operator syntax in the input is
/// matched literally. Words without any letter or digit index to nothing
/// and are dropped. Input with no words left yields `None`.
pub fn fts_terms(query: &str) -> Option<String> {
    let terms: Vec<String> = query
        .split_whitespace()
        .filter(|word| word.chars().any(char::is_alphanumeric))
        .map(|word| format!("\"{}\"", word.replace('"', "\"\"")))
        .collect();
    if terms.is_empty() {
        return None;
    }
    Some(terms.join(" "))
}

fn messages(records: Vec<Record>) -> Result<Vec<Message>> {
    records.into_iter().map(Message::from_record).collect()
}

/// Addresses with more than `threshold` messages, case-insensitively sorted.
pub fn senders(conn: &Connection, threshold: u32) -> Result<Vec<String>> {
    let sql = "select from_address from messages \
               where from_address is not null and from_address != '' \
               group by from_address having count(id) > ?1 \
               order by from_address collate nocase";
    let records = MessageStore::query(conn, sql, [threshold])?;
    Ok(records
        .into_iter()
        .filter_map(|record| match record.into_iter().next() {
            Some(Value::Text(address)) => Some(address),
            _ => None,
        })
        .collect())
}

/// Messages whose subject or authored text match, newest first.
pub fn search(conn: &Connection, query: &str, limit: u32) -> Result<Vec<Message>> {
    let Some(terms) = fts_terms(query) else {
        return Ok(Vec::new());
    };
    debug!(terms = %terms, limit = limit, "Searching messages");

    let sql = format!(
        "select {} from messages where id in \
         (select id from messages_fts where messages_fts match ?1 limit ?2) \
         order by date desc",
        column_list()
    );
    messages(MessageStore::query(conn, &sql, rusqlite::params![terms, limit])?)
}

/// Head messages of threads containing a match, newest first.
pub fn search_threads(conn: &Connection, query: &str, limit: u32) -> Result<Vec<Message>> {
    let Some(terms) = fts_terms(query) else {
        return Ok(Vec::new());
    };
    debug!(terms = %terms, limit = limit, "Searching threads");

    let sql = format!(
        "select {} from messages where id in \
         (select distinct thread_id from messages_fts where messages_fts match ?1 limit ?2) \
         order by date desc",
        column_list()
    );
    messages(MessageStore::query(conn, &sql, rusqlite::params![terms, limit])?)
}

/// Messages sent by `address`, newest first.
pub fn messages_from(conn: &Connection, address: &str, limit: u32) -> Result<Vec<Message>> {
    let sql = format!(
        "select {} from messages where from_address = ?1 order by date desc limit ?2",
        column_list()
    );
    messages(MessageStore::query(conn, &sql, rusqlite::params![address, limit])?)
}

/// Members of a thread in reading order.
pub fn thread_messages(conn: &Connection, thread_id: &str, limit: u32) -> Result<Vec<Message>> {
    let sql = format!(
        "select {} from messages where thread_id = ?1 \
         order by thread_position, date asc limit ?2",
        column_list()
    );
    messages(MessageStore::query(conn, &sql, rusqlite::params![thread_id, limit])?)
}

/// Archive-wide counts.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ArchiveStats {
    pub messages: i64,
    pub senders: i64,
    pub threads: i64,
    pub first_date: Option<i64>,
    pub last_date: Option<i64>,
}

pub fn stats(conn: &Connection) -> Result<ArchiveStats> {
    let stats = conn.query_row(
        &format!(
            "select count(*), count(distinct from_address), count(distinct thread_id), \
             min(date), max(date) from {}",
            Message::TABLE
        ),
        [],
        |row| {
            Ok(ArchiveStats {
                messages: row.get(0)?,
                senders: row.get(1)?,
                threads: row.get(2)?,
                first_date: row.get(3)?,
                last_date: row.get(4)?,
            })
        },
    )?;
    Ok(stats)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::schema::create_schema;

    fn store() -> Connection {
        let conn = Connection::open_in_memory().unwrap();
        create_schema(&conn).unwrap();
        conn
    }

    fn add(conn: &Connection, id: &str, from: &str, date: i64, subject: &str, body: &str, thread: (&str, i64)) {
        let mut message = Message::new(id, body);
        message.from_address = Some(from.to_string());
        message.date = Some(date);
        message.subject = Some(subject.to_string());
        message.thread_id = Some(thread.0.to_string());
        message.thread_position = Some(thread.1);
        message.save(conn).unwrap();
    }

    #[test]
    fn test_fts_terms() {
        assert_eq!(fts_terms("  "), None);
        assert_eq!(fts_terms("( * )"), None);
        assert_eq!(fts_terms("broker"), Some("\"broker\"".into()));
        assert_eq!(fts_terms("say \"hi\""), Some("\"say\" \"\"\"hi\"\"\"".into()));
        assert_eq!(fts_terms("a OR b*"), Some("\"a\" \"OR\" \"b*\"".into()));
    }

    #[test]
    fn test_search_words_need_not_be_adjacent() {
        let conn = store();
        add(&conn, "<1>", "a@x", 100, "Design", "The client uses side-channel persistence on the broker.", ("<1>", 0));
        add(&conn, "<2>", "b@x", 200, "Other", "The client reconnects.", ("<2>", 0));

        let ids = |query: &str| -> Vec<String> {
            search(&conn, query, 10).unwrap().into_iter().map(|m| m.id).collect()
        };
        assert_eq!(ids("broker client"), ["<1>"]);
        assert_eq!(ids("client side persistence"), ["<1>"]);
        assert_eq!(ids("client"), ["<2>", "<1>"]);
        assert!(ids("client zeppelin").is_empty());
    }

    #[test]
    fn test_senders_threshold_and_order() {
        let conn = store();
        for i in 0..3 {
            add(&conn, &format!("<b{i}>"), "bob@x.org", i, "s", "x", ("<b0>", i));
            add(&conn, &format!("<a{i}>"), "Alice@x.org", i, "s", "x", ("<a0>", i));
        }
        add(&conn, "<c0>", "carol@x.org", 0, "s", "x", ("<c0>", 0));

        assert_eq!(senders(&conn, 2).unwrap(), ["Alice@x.org", "bob@x.org"]);
        assert!(senders(&conn, 3).unwrap().is_empty());
    }

    #[test]
    fn test_search_body_and_subject() {
        let conn = store();
        add(&conn, "<1>", "a@x", 100, "Routing", "The dispatcher handles failover.\n> quoted zebra", ("<1>", 0));
        add(&conn, "<2>", "b@x", 200, "failover plans", "nothing here", ("<2>", 0));

        let hits = search(&conn, "failover", 10).unwrap();
        let ids: Vec<_> = hits.iter().map(|m| m.id.as_str()).collect();
        assert_eq!(ids, ["<2>", "<1>"]);

        // Porter stemming.
        assert_eq!(search(&conn, "dispatchers", 10).unwrap().len(), 1);
        // Quoted text is not authored text.
        assert!(search(&conn, "zebra", 10).unwrap().is_empty());
        assert!(search(&conn, "", 10).unwrap().is_empty());
        // Operator characters are harmless.
        assert!(search(&conn, "\"unbalanced AND (", 10).unwrap().is_empty());
        assert_eq!(search(&conn, "failover", 1).unwrap().len(), 1);
    }

    #[test]
    fn test_search_threads_returns_heads() {
        let conn = store();
        add(&conn, "<root>", "a@x", 100, "Question", "how do I configure", ("<root>", 0));
        add(&conn, "<reply>", "b@x", 200, "Re: Question", "use the heartbeat option", ("<root>", 1));
        add(&conn, "<other>", "c@x", 300, "Other", "heartbeat again", ("<other>", 0));

        let heads = search_threads(&conn, "heartbeat", 10).unwrap();
        let ids: Vec<_> = heads.iter().map(|m| m.id.as_str()).collect();
        assert_eq!(ids, ["<other>", "<root>"]);
    }

    #[test]
    fn test_messages_from_newest_first() {
        let conn = store();
        add(&conn, "<1>", "a@x", 100, "one", "x", ("<1>", 0));
        add(&conn, "<2>", "a@x", 300, "two", "x", ("<2>", 0));
        add(&conn, "<3>", "b@x", 200, "three", "x", ("<3>", 0));

        let ids: Vec<_> = messages_from(&conn, "a@x", 10)
            .unwrap()
            .into_iter()
            .map(|m| m.id)
            .collect();
        assert_eq!(ids, ["<2>", "<1>"]);
    }

    #[test]
    fn test_thread_messages_order() {
        let conn = store();
        add(&conn, "<r2>", "b@x", 300, "Re", "x", ("<t>", 1));
        add(&conn, "<t>", "a@x", 100, "Topic", "x", ("<t>", 0));
        add(&conn, "<r1>", "c@x", 200, "Re", "x", ("<t>", 1));

        let ids: Vec<_> = thread_messages(&conn, "<t>", 10)
            .unwrap()
            .into_iter()
            .map(|m| m.id)
            .collect();
        assert_eq!(ids, ["<t>", "<r1>", "<r2>"]);
    }

    #[test]
    fn test_stats() {
        let conn = store();
        assert_eq!(stats(&conn).unwrap(), ArchiveStats::default());

        add(&conn, "<1>", "a@x", 100, "one", "x", ("<1>", 0));
        add(&conn, "<2>", "a@x", 300, "two", "x", ("<1>", 1));
        add(&conn, "<3>", "b@x", 200, "three", "x", ("<3>", 0));

        let stats = stats(&conn).unwrap();
        assert_eq!(stats.messages, 3);
        assert_eq!(stats.senders, 2);
        assert_eq!(stats.threads, 2);
        assert_eq!(stats.first_date, Some(100));
        assert_eq!(stats.last_date, Some(300));
    }
}
