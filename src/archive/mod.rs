//! The mail archive viewer: pages, routing, and per-request database access.

pub mod handlers;
pub mod render;
pub mod views;

use std::sync::Arc;

use tracing::{info, warn};

use crate::config::{self, ArchiveConfig, Config};
use crate::error::Result;
use crate::store::MessageStore;
use crate::web::{Page, RawRequest, Response, Router, StaticFiles};
use handlers::Context;

/// Which handler serves a page.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Route {
    Index,
    Message,
    Search,
    Sender,
    Thread,
}

/// The page tree. Index is the root; messages sit below their sender.
#[derive(Debug)]
pub struct Pages {
    pub index: Arc<Page>,
    pub message: Arc<Page>,
    pub search: Arc<Page>,
    pub sender: Arc<Page>,
    pub thread: Arc<Page>,
}

impl Pages {
    pub fn new() -> Self {
        let index = Arc::new(Page::new(None, "Haystack", "/index.html"));
        let sender = Arc::new(Page::new(Some(index.clone()), "Sender '{}'", "/sender.html?id={}"));
        let message = Arc::new(Page::new(
            Some(sender.clone()),
            "Message '{}'",
            "/message.html?id={}",
        ));
        let search = Arc::new(Page::new(Some(index.clone()), "Search '{}'", "/search.html?query={}"));
        let thread = Arc::new(Page::new(Some(index.clone()), "Thread '{}'", "/thread.html?id={}"));

        Self {
            index,
            message,
            search,
            sender,
            thread,
        }
    }

    fn routes(&self) -> [(Arc<Page>, Route); 5] {
        [
            (self.index.clone(), Route::Index),
            (self.message.clone(), Route::Message),
            (self.search.clone(), Route::Search),
            (self.sender.clone(), Route::Sender),
            (self.thread.clone(), Route::Thread),
        ]
    }
}

impl Default for Pages {
    fn default() -> Self {
        Self::new()
    }
}

/// The application: immutable after construction, shared across requests.
pub struct Archive {
    settings: ArchiveConfig,
    store: MessageStore,
    pages: Pages,
    router: Router<Route>,
}

impl Archive {
    /// Build the archive from configuration, loading static files from the
    /// home directory.
    pub fn from_config(config: &Config) -> Result<Self> {
        let database = config::database_path(config);
        if !database.exists() {
            warn!(path = %database.display(), "Database does not exist yet; run `haystack init`");
        }
        let files = StaticFiles::load(&config::files_dir(config))?;
        Ok(Self::new(config.archive.clone(), MessageStore::new(database), files))
    }

    pub fn new(settings: ArchiveConfig, store: MessageStore, files: StaticFiles) -> Self {
        let pages = Pages::new();
        let mut router = Router::new(files);
        let routes = pages.routes();
        let page_count = routes.len();
        for (page, route) in routes {
            router.add_page(page, route);
        }
        info!(
            pages = page_count,
            static_files = router.files().len(),
            "Archive ready"
        );

        Self {
            settings,
            store,
            pages,
            router,
        }
    }

    pub fn store(&self) -> &MessageStore {
        &self.store
    }

    pub fn pages(&self) -> &Pages {
        &self.pages
    }

    /// Serve one request. Page requests get their own connection, closed
    /// when the handler returns or fails.
    pub fn handle(&self, raw: RawRequest) -> Response {
        self.router.dispatch(raw, |route, page, request| {
            let conn = self.store.connect()?;
            let ctx = Context {
                pages: &self.pages,
                settings: &self.settings,
                conn: &conn,
                page,
                request,
            };

            match route {
                Route::Index => handlers::index(&ctx),
                Route::Message => handlers::message(&ctx),
                Route::Search => handlers::search(&ctx),
                Route::Sender => handlers::sender(&ctx),
                Route::Thread => handlers::thread(&ctx),
            }
        })
    }
}
