//! Core domain types and shared logic for the folio archive service.
//!
//! This crate defines the data model used across the other crates:
//! - Folder identifiers validated against traversal
//! - Directory fingerprints and the cache keys derived from them
//! - Download-name sanitizing
//! - Configuration for the server, archive cache, delivery and reaper

pub mod cache_key;
pub mod config;
pub mod error;
pub mod folder;

pub use cache_key::{CacheKey, Fingerprint};
pub use error::{Error, Result};
pub use folder::{FolderName, sanitize_name};

/// File extension of every cached archive.
pub const ARCHIVE_EXTENSION: &str = "zip";

/// MIME type served for archives.
pub const ARCHIVE_CONTENT_TYPE: &str = "application/zip";
