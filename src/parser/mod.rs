//! Mail parsing for ingestion: mbox splitting, header decoding, and MIME
//! body resolution.

pub mod header;
pub mod mbox;
pub mod mime;

pub use header::HeaderBlock;
pub use mbox::{MboxReader, RawMessage};
pub use mime::{resolve_body, ResolvedBody};
