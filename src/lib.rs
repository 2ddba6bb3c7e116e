//! `haystack` — a web viewer for mailing-list archives.
//!
//! This crate provides a small page-oriented web framework, an SQLite
//! message store with full-text search, the archive pages built on both,
//! and the mbox ingestion that fills the store.

pub mod archive;
pub mod config;
pub mod error;
pub mod ingest;
pub mod model;
pub mod parser;
pub mod server;
pub mod store;
pub mod web;
