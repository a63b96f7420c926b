//! Source folder access and the on-demand archive cache for folio.
//!
//! This crate provides:
//! - Source folder resolution confined to a base directory (path guard)
//! - Directory fingerprinting for cache-key derivation
//! - Zip archive building with atomic publication
//! - The keyed archive cache with TTL reuse, per-key build locks and sweeping

pub mod builder;
pub mod cache;
pub mod error;
pub mod fingerprint;
pub mod source;
pub mod sweep;

pub use builder::{ArchiveBuilder, ZipBuilder};
pub use cache::{CacheEntry, CacheStore};
pub use error::{StorageError, StorageResult};
pub use fingerprint::fingerprint;
pub use source::{SourceDirectory, remove_source_dir, resolve_source_dir};
pub use sweep::SweepStats;
