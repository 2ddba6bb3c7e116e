//! Page handlers. Each one runs its queries on the request's connection,
//! formats a content fragment, and renders it into its page.

use std::collections::HashMap;

use rusqlite::Connection;
use tracing::debug;

use super::render::{full_date, listing_date, render_content, short_date};
use super::views::{IndexView, MessageView, SearchView, SenderView, ThreadEntry, ThreadView};
use super::Pages;
use crate::config::ArchiveConfig;
use crate::error::{RequestError, Result};
use crate::model::{Message, Object};
use crate::store::{queries, MessageStore};
use crate::web::escape::xml_escape;
use crate::web::html::{html_a, html_table, html_ul, TableStyle};
use crate::web::{render, Page, Request, Response};

/// Everything a handler may touch while serving one request.
pub struct Context<'a> {
    pub pages: &'a Pages,
    pub settings: &'a ArchiveConfig,
    pub conn: &'a Connection,
    pub page: &'a Page,
    pub request: &'a Request,
}

impl Context<'_> {
    fn message_link(&self, message: &Message) -> String {
        html_a(
            &xml_escape(message.subject.as_deref().unwrap_or("")),
            &self.pages.message.get_href(Some(message)),
        )
    }

    fn thread_link(&self, head: &Message) -> String {
        html_a(
            &xml_escape(head.subject.as_deref().unwrap_or("")),
            &self.pages.thread.get_href(Some(head)),
        )
    }
}

/// Sender and topic directory.
pub fn index(ctx: &Context<'_>) -> Result<Response> {
    let senders = queries::senders(ctx.conn, ctx.settings.sender_threshold)?;
    debug!(count = senders.len(), "Listing senders");

    let sender_links = senders.iter().map(|address| {
        let sender = Object::new(address.clone(), xml_escape(address));
        ctx.pages.sender.render_brief_link(Some(&sender))
    });

    let topic_links = ctx.settings.topics.iter().map(|topic| {
        html_a(&xml_escape(topic), &ctx.pages.search.get_href_for_key(topic))
    });

    let view = IndexView {
        senders: html_ul(sender_links, &[("class", "three-column")]),
        topics: html_ul(topic_links, &[("class", "four-column")]),
    };

    let content = render(&view)?;
    Ok(ctx.page.send_response(&content, None)?)
}

/// One message with its headers and formatted body.
pub fn message(ctx: &Context<'_>) -> Result<Response> {
    let id = ctx.request.get("id")?;
    let message: Message = MessageStore::require(ctx.conn, id)?;

    let in_reply_to_link = match message.in_reply_to_id.as_deref() {
        None => "[None]".to_string(),
        Some(parent_id) => match MessageStore::get::<Message>(ctx.conn, parent_id)? {
            Some(parent) => html_a(
                &xml_escape(parent_id),
                &ctx.pages.message.get_href(Some(&parent)),
            ),
            None => xml_escape(parent_id),
        },
    };

    let thread_link = match message.thread_id.as_deref() {
        None => "[None]".to_string(),
        Some(thread_id) if thread_id == message.id => ctx.thread_link(&message),
        Some(thread_id) => match MessageStore::get::<Message>(ctx.conn, thread_id)? {
            Some(head) => ctx.thread_link(&head),
            None => xml_escape(thread_id),
        },
    };

    let from = format!(
        "{} <{}>",
        message.from_name.as_deref().unwrap_or(""),
        message.from_address.as_deref().unwrap_or("")
    );

    let rows = vec![
        vec!["ID".to_string(), xml_escape(&message.id)],
        vec!["List".to_string(), xml_escape(message.list_id.as_deref().unwrap_or(""))],
        vec!["From".to_string(), xml_escape(from.trim())],
        vec!["Date".to_string(), xml_escape(&full_date(message.date))],
        vec!["Subject".to_string(), xml_escape(message.subject.as_deref().unwrap_or(""))],
        vec!["In reply to".to_string(), in_reply_to_link],
        vec!["Thread".to_string(), thread_link],
    ];

    let view = MessageView {
        headers: html_table(
            rows,
            TableStyle {
                row_headings: true,
                class: Some("headers"),
                ..TableStyle::default()
            },
        ),
        content: render_content(message.content()),
    };

    let mut entity = Object::new(message.id.clone(), message.subject.clone().unwrap_or_default());
    // Without an address the sender crumb keeps its static link.
    if let Some(address) = message.from_address.as_deref().filter(|a| !a.is_empty()) {
        entity = entity.with_parent(Object::named(address));
    }

    let content = render(&view)?;
    Ok(ctx.page.send_response(&content, Some(&entity))?)
}

/// Full-text search, by message or by thread.
pub fn search(ctx: &Context<'_>) -> Result<Response> {
    let query = ctx.request.get_or("query", "");
    let threads = ctx.request.get_or("threads", "") == "1";
    let limit = ctx.settings.result_limit;

    let (results, count) = if threads {
        let heads = queries::search_threads(ctx.conn, query, limit)?;
        let rows = heads.iter().map(|head| {
            vec![
                ctx.thread_link(head),
                xml_escape(head.from_address.as_deref().unwrap_or("")),
                head.authored_words().to_string(),
                xml_escape(&listing_date(head.date)),
            ]
        });
        (messages_table(rows, "messages four"), heads.len())
    } else {
        let messages = queries::search(ctx.conn, query, limit)?;
        let rows = messages.iter().map(|message| {
            vec![
                ctx.message_link(message),
                xml_escape(message.from_address.as_deref().unwrap_or("")),
                message.authored_words().to_string(),
                xml_escape(&listing_date(message.date)),
            ]
        });
        (messages_table(rows, "messages four"), messages.len())
    };

    let unit = if threads { "thread" } else { "message" };
    let plural = if count == 1 { "" } else { "s" };

    let view = SearchView {
        query,
        threads,
        searched: !query.trim().is_empty(),
        count,
        noun: format!("{unit}{plural}"),
        results,
    };

    let entity = Object::named(query);
    let content = render(&view)?;
    Ok(ctx.page.send_response(&content, Some(&entity))?)
}

/// Messages from one address.
pub fn sender(ctx: &Context<'_>) -> Result<Response> {
    let address = ctx
        .request
        .get("id")
        .or_else(|_| ctx.request.get("address"))
        .map_err(|_| RequestError::MissingParameter("id".to_string()))?;

    let messages = queries::messages_from(ctx.conn, address, ctx.settings.result_limit)?;
    let rows = messages.iter().map(|message| {
        vec![
            ctx.message_link(message),
            message.authored_words().to_string(),
            xml_escape(&listing_date(message.date)),
        ]
    });

    let view = SenderView {
        address,
        messages: messages_table(rows, "messages"),
    };

    let entity = Object::named(address);
    let content = render(&view)?;
    Ok(ctx.page.send_response(&content, Some(&entity))?)
}

/// A whole thread: an index, then every message in reading order.
pub fn thread(ctx: &Context<'_>) -> Result<Response> {
    let id = ctx.request.get("id")?;
    let head: Message = MessageStore::require(ctx.conn, id)?;
    let messages = queries::thread_messages(ctx.conn, &head.id, ctx.settings.result_limit)?;

    let by_id: HashMap<&str, &Message> = messages.iter().map(|m| (m.id.as_str(), m)).collect();
    let titles: Vec<String> = messages
        .iter()
        .enumerate()
        .map(|(i, message)| thread_entry_title(i + 1, message, &by_id))
        .collect();

    let index_rows = messages.iter().zip(&titles).enumerate().map(|(i, (message, title))| {
        vec![
            html_a(&xml_escape(title), &format!("#{}", i + 1)),
            xml_escape(&short_date(message.date)),
            message.authored_words().to_string(),
        ]
    });

    let view = ThreadView {
        index: messages_table(index_rows, "messages"),
        entries: messages
            .iter()
            .zip(&titles)
            .enumerate()
            .map(|(i, (message, title))| ThreadEntry {
                number: i + 1,
                title: title.clone(),
                content: render_content(message.content()),
            })
            .collect(),
    };

    let entity = Object::new(head.id.clone(), head.subject.clone().unwrap_or_default());
    let content = render(&view)?;
    Ok(ctx.page.send_response(&content, Some(&entity))?)
}

/// `N. sender`, plus ` replying to <name>` when the parent is in the thread.
fn thread_entry_title(number: usize, message: &Message, by_id: &HashMap<&str, &Message>) -> String {
    let mut title = format!("{number}. {}", message.sender_label());
    if let Some(parent) = message
        .in_reply_to_id
        .as_deref()
        .and_then(|id| by_id.get(id))
    {
        title.push_str(" replying to ");
        title.push_str(parent.sender_label());
    }
    title
}

fn messages_table<R>(rows: R, class: &str) -> String
where
    R: IntoIterator<Item = Vec<String>>,
{
    html_table(
        rows,
        TableStyle {
            class: Some(class),
            ..TableStyle::default()
        },
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_thread_entry_title() {
        let mut root = Message::new("<r>", "");
        root.from_name = Some("Ann".into());
        let mut reply = Message::new("<x>", "");
        reply.from_name = Some("Bo".into());
        reply.in_reply_to_id = Some("<r>".into());
        let mut orphan = Message::new("<y>", "");
        orphan.from_address = Some("cy@example.org".into());
        orphan.in_reply_to_id = Some("<gone>".into());

        let by_id: HashMap<&str, &Message> = [("<r>", &root), ("<x>", &reply)].into_iter().collect();
        assert_eq!(thread_entry_title(1, &root, &by_id), "1. Ann");
        assert_eq!(thread_entry_title(2, &reply, &by_id), "2. Bo replying to Ann");
        assert_eq!(thread_entry_title(3, &orphan, &by_id), "3. cy@example.org");
    }
}
