//! Data model: archived messages, sender addresses, and plain entities.

pub mod address;
pub mod message;
pub mod object;

pub use address::EmailAddress;
pub use message::Message;
pub use object::Object;
