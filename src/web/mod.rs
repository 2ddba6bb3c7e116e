//! A small page-oriented web framework: requests, responses, templates,
//! pages with breadcrumb navigation, and a router that serves pages and
//! static files.

pub mod escape;
pub mod html;
pub mod page;
pub mod request;
pub mod response;
pub mod router;
pub mod template;

pub use escape::{url_escape, url_unescape, xml_escape, xml_unescape};
pub use page::{Entity, Page, HTML_CONTENT_TYPE};
pub use request::{RawRequest, Request};
pub use response::Response;
pub use router::{Router, StaticFiles};
pub use template::render;
