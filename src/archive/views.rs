//! View models for the archive page templates. `String` fields holding
//! markup are emitted with `|safe`; plain text fields are escaped by askama.

use askama::Template;

#[derive(Template)]
#[template(path = "index.html")]
pub struct IndexView {
    pub senders: String,
    pub topics: String,
}

#[derive(Template)]
#[template(path = "message.html")]
pub struct MessageView {
    pub headers: String,
    pub content: String,
}

#[derive(Template)]
#[template(path = "search.html")]
pub struct SearchView<'a> {
    pub query: &'a str,
    pub threads: bool,
    /// Whether a summary line is shown at all.
    pub searched: bool,
    pub count: usize,
    /// `message`, `threads`, ...; already agreeing with `count`.
    pub noun: String,
    pub results: String,
}

#[derive(Template)]
#[template(path = "sender.html")]
pub struct SenderView<'a> {
    pub address: &'a str,
    pub messages: String,
}

/// One message in a thread, numbered from 1.
pub struct ThreadEntry {
    pub number: usize,
    pub title: String,
    pub content: String,
}

#[derive(Template)]
#[template(path = "thread.html")]
pub struct ThreadView {
    pub index: String,
    pub entries: Vec<ThreadEntry>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::web::render;

    #[test]
    fn test_search_summary() {
        let html = render(&SearchView {
            query: "a <b>",
            threads: true,
            searched: true,
            count: 2,
            noun: "threads".into(),
            results: "<table></table>".into(),
        })
        .unwrap();
        assert!(html.contains("<p class=\"summary\">2 threads matching 'a &lt;b&gt;'</p>"));
        assert!(html.contains(" checked=\"checked\"/>"));
        assert!(html.contains("<table></table>"));
    }

    #[test]
    fn test_search_form_only() {
        let html = render(&SearchView {
            query: "",
            threads: false,
            searched: false,
            count: 0,
            noun: "messages".into(),
            results: String::new(),
        })
        .unwrap();
        assert!(html.contains("<p class=\"summary\"></p>"));
        assert!(!html.contains("checked"));
    }

    #[test]
    fn test_sender_address_is_escaped() {
        let html = render(&SenderView {
            address: "<x@example.org>",
            messages: "<table></table>".into(),
        })
        .unwrap();
        assert!(html.contains("Messages from <b>&lt;x@example.org&gt;</b>"));
    }

    #[test]
    fn test_thread_entries_in_order() {
        let html = render(&ThreadView {
            index: String::new(),
            entries: vec![
                ThreadEntry {
                    number: 1,
                    title: "1. Ann".into(),
                    content: "hi".into(),
                },
                ThreadEntry {
                    number: 2,
                    title: "2. Bo replying to Ann".into(),
                    content: "<span class=\"quoted\">&gt; hi</span>".into(),
                },
            ],
        })
        .unwrap();
        let first = html.find("<h2 id=\"1\">1. Ann</h2>").unwrap();
        let second = html.find("<h2 id=\"2\">2. Bo replying to Ann</h2>").unwrap();
        assert!(first < second);
        assert!(html.contains("<pre><span class=\"quoted\">&gt; hi</span></pre>"));
    }
}
