//! # GeoMemories Core
//!
//! Shared, I/O-free logic for GeoMemories: the entity model, the entry
//! validator, query filters, the [`store::Store`] abstraction with an
//! in-memory backend, and the storage error type.
//!
//! This crate contains no tokio, sqlx, filesystem or network code. The
//! SQLite backend, the media pipeline and the Wikipedia lookup live in the
//! `geomemories` crate.

pub mod error;
pub mod models;
pub mod query;
pub mod store;
pub mod validate;

pub use error::StorageError;
pub use models::{Coordinate, EntryDraft, MediaItem, MediaKind, MemoryEntry, NewEntry};
pub use query::{EntryFilter, MediaFilter};
