//! HTML fragment builders.
//!
//! Every builder takes content that is already escaped (or is itself markup)
//! and only escapes attribute values it inserts on its own.

use std::fmt::Display;

use super::escape::xml_escape;

/// Render a generic element: `<tag attr="v">content</tag>`.
///
/// Attribute values are escaped; `content` is inserted verbatim.
pub fn html_elem(tag: &str, content: &str, attrs: &[(&str, &str)]) -> String {
    let mut out = String::with_capacity(content.len() + 16);
    out.push('<');
    out.push_str(tag);
    push_attrs(&mut out, attrs);
    out.push('>');
    out.push_str(content);
    out.push_str("</");
    out.push_str(tag);
    out.push('>');
    out
}

/// Render an anchor. The `href` is expected to be URL-escaped already.
pub fn html_a(text: &str, href: &str) -> String {
    format!("<a href=\"{href}\">{text}</a>")
}

/// Render a `<span>` with a class.
pub fn html_span(content: &str, class: &str) -> String {
    html_elem("span", content, &[("class", class)])
}

/// Render an unordered list, one `<li>` per item.
pub fn html_ul<I, S>(items: I, attrs: &[(&str, &str)]) -> String
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    let body: String = items
        .into_iter()
        .map(|item| format!("<li>{}</li>", item.as_ref()))
        .collect();
    html_elem("ul", &body, attrs)
}

/// Layout options for [`html_table`].
#[derive(Debug, Clone, Copy, Default)]
pub struct TableStyle<'a> {
    /// Render the first row as `<th>` headings.
    pub column_headings: bool,
    /// Render the first cell of every row as a `<th>`.
    pub row_headings: bool,
    /// Optional CSS class for the table element.
    pub class: Option<&'a str>,
}

/// Render a table from rows of pre-escaped cells.
pub fn html_table<R, C>(rows: R, style: TableStyle<'_>) -> String
where
    R: IntoIterator<Item = Vec<C>>,
    C: Display,
{
    let mut body = String::new();

    for (row_index, row) in rows.into_iter().enumerate() {
        body.push_str("<tr>");
        for (col_index, cell) in row.iter().enumerate() {
            let heading = (style.column_headings && row_index == 0)
                || (style.row_headings && col_index == 0);
            let tag = if heading { "th" } else { "td" };
            body.push_str(&format!("<{tag}>{cell}</{tag}>"));
        }
        body.push_str("</tr>");
    }

    match style.class {
        Some(class) => html_elem("table", &html_elem("tbody", &body, &[]), &[("class", class)]),
        None => html_elem("table", &html_elem("tbody", &body, &[]), &[]),
    }
}

fn push_attrs(out: &mut String, attrs: &[(&str, &str)]) {
    for (name, value) in attrs {
        out.push(' ');
        out.push_str(name);
        out.push_str("=\"");
        out.push_str(&xml_escape(value));
        out.push('"');
    }
}
