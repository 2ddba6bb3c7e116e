//! Pages: one logical screen each, with title/href patterns and a parent
//! reference used for breadcrumb navigation.

use std::sync::Arc;

use askama::Template;

use super::escape::{url_escape, xml_escape};
use super::html::{html_a, html_ul};
use super::response::Response;
use super::template::{fill, render};
use crate::error::TemplateError;

/// Outer document every page is rendered into. All fields are markup.
#[derive(Template)]
#[template(path = "page.html")]
struct PageTemplate<'a> {
    title: &'a str,
    path_navigation: &'a str,
    content: &'a str,
}

/// Content type of rendered pages.
pub const HTML_CONTENT_TYPE: &str = "text/html; charset=utf-8";

/// Something a page can be about: it has an identity for hrefs, a display
/// name for titles, and optionally a parent for breadcrumbs.
pub trait Entity {
    /// Identity used in hrefs. URL-escaped by the page.
    fn id(&self) -> &str;

    /// Display name used in titles.
    fn name(&self) -> &str;

    /// The entity one breadcrumb level up.
    fn parent(&self) -> Option<&dyn Entity> {
        None
    }
}

/// A static, process-lifetime page descriptor.
#[derive(Debug)]
pub struct Page {
    title: String,
    href: String,
    path: String,
    parent: Option<Arc<Page>>,
}

impl Page {
    /// Create a page. `title` and `href` may contain one `{}` slot that is
    /// filled from an entity.
    pub fn new(parent: Option<Arc<Page>>, title: &str, href: &str) -> Self {
        let path = href.split_once('?').map_or(href, |(path, _)| path).to_string();
        Self {
            title: title.to_string(),
            href: href.to_string(),
            path,
            parent,
        }
    }

    /// The routing key: the href without its query part.
    pub fn path(&self) -> &str {
        &self.path
    }

    /// The bare title pattern.
    pub fn title(&self) -> &str {
        &self.title
    }

    pub fn parent(&self) -> Option<&Arc<Page>> {
        self.parent.as_ref()
    }

    /// The static title, or the title pattern filled with the escaped entity name.
    pub fn get_title(&self, entity: Option<&dyn Entity>) -> String {
        match entity {
            Some(entity) => fill(&self.title, &xml_escape(entity.name())),
            None => self.title.clone(),
        }
    }

    /// The static href, or the href pattern filled with the escaped entity id.
    pub fn get_href(&self, entity: Option<&dyn Entity>) -> String {
        match entity {
            Some(entity) => self.get_href_for_key(entity.id()),
            None => self.href.clone(),
        }
    }

    /// The href pattern filled with an escaped literal key.
    pub fn get_href_for_key(&self, key: &str) -> String {
        fill(&self.href, &url_escape(key))
    }

    /// Anchor whose text is the formatted title.
    pub fn render_link(&self, entity: Option<&dyn Entity>) -> String {
        html_a(&self.get_title(entity), &self.get_href(entity))
    }

    /// Anchor whose text is the bare title, or the entity's own name.
    ///
    /// The entity name is inserted as-is; entities meant for brief links
    /// carry pre-escaped names.
    pub fn render_brief_link(&self, entity: Option<&dyn Entity>) -> String {
        let text = match entity {
            Some(entity) => entity.name().to_string(),
            None => self.title.clone(),
        };
        html_a(&text, &self.get_href(entity))
    }

    /// Breadcrumbs from the root page down to this one.
    ///
    /// The page chain and the entity chain are walked in lock-step. Levels
    /// past the end of the entity chain render the static title and href.
    pub fn render_path_navigation(&self, entity: Option<&dyn Entity>) -> String {
        let mut links = Vec::new();
        let mut page = Some(self);
        let mut entity = entity;

        while let Some(current) = page {
            links.push(current.render_link(entity));
            page = current.parent.as_deref();
            entity = entity.and_then(|e| e.parent());
        }

        links.reverse();
        html_ul(links, &[("id", "-path-navigation")])
    }

    /// Render a complete document around a content fragment.
    pub fn render(&self, content: &str, entity: Option<&dyn Entity>) -> Result<String, TemplateError> {
        let title = self.get_title(entity);
        let path_navigation = self.render_path_navigation(entity);

        render(&PageTemplate {
            title: &title,
            path_navigation: &path_navigation,
            content,
        })
    }

    /// Render and wrap in a `200 OK` HTML response.
    pub fn send_response(&self, content: &str, entity: Option<&dyn Entity>) -> Result<Response, TemplateError> {
        let page = self.render(content, entity)?;
        Ok(Response::ok(page, HTML_CONTENT_TYPE))
    }
}
