//! Storage abstraction for GeoMemories.
//!
//! The [`Store`] trait defines the record operations the storage service
//! needs, addressed by plain identifiers and [`EntryFilter`] /
//! [`MediaFilter`] predicates. Backends: SQLite (in the `geomemories`
//! crate) and [`memory::InMemoryStore`].
//!
//! Every method is one atomic unit: either all of its mutations commit or
//! none do. Implementations must be `Send + Sync` to work with async
//! runtimes.
//!
//! Lookup misses that abort a write are reported as `Ok(None)` so callers
//! can tell them apart from backend failures, which are `Err`.

pub mod memory;

use anyhow::Result;
use async_trait::async_trait;
use uuid::Uuid;

use crate::models::{MediaItem, MemoryEntry, NewEntry};
use crate::query::{EntryFilter, MediaFilter};

/// Abstract storage backend for memory entries and media items.
///
/// # Operations
///
/// | Method | Purpose |
/// |--------|---------|
/// | [`insert_entries`](Store::insert_entries) | Insert entries and link their media |
/// | [`list_entries`](Store::list_entries) | Fetch entries with their owned media |
/// | [`update_entry`](Store::update_entry) | Overwrite fields and the media set |
/// | [`delete_entries`](Store::delete_entries) | Delete entries, unlinking their media |
/// | [`insert_media`](Store::insert_media) | Insert a media record |
/// | [`link_media`](Store::link_media) | Set a media record's owner |
/// | [`list_media`](Store::list_media) | Fetch media records |
/// | [`delete_media`](Store::delete_media) | Delete media records |
#[async_trait]
pub trait Store: Send + Sync {
    /// Insert a batch of entries in one transaction.
    ///
    /// Each entry's `media_paths` are linked to it; `entry.media` is
    /// ignored. Returns the committed snapshots, or `Ok(None)` if a
    /// referenced media path does not exist. A duplicate entry id (already
    /// stored or repeated in the batch) is an error and nothing from the
    /// batch is committed.
    async fn insert_entries(&self, entries: &[NewEntry]) -> Result<Option<Vec<MemoryEntry>>>;

    /// Fetch entries matching `filter`, each with its owned media.
    async fn list_entries(&self, filter: &EntryFilter) -> Result<Vec<MemoryEntry>>;

    /// Overwrite title, description, coordinate, `updated_at` and the media
    /// association set of an existing entry.
    ///
    /// Returns `Ok(None)` if the entry or one of its media paths is missing.
    async fn update_entry(&self, entry: &MemoryEntry) -> Result<Option<MemoryEntry>>;

    /// Delete entries matching `filter`. Owned media are unlinked, not
    /// deleted. Returns the number of entries removed.
    async fn delete_entries(&self, filter: &EntryFilter) -> Result<u64>;

    /// Insert a media record. Returns `Ok(None)` if `owner_id` names a
    /// missing entry. A duplicate path or id is an error. The owner is
    /// checked first, so an unknown owner wins over a duplicate path.
    async fn insert_media(&self, item: &MediaItem) -> Result<Option<MediaItem>>;

    /// Link the media record at `path` to `owner_id`.
    ///
    /// Returns `Ok(None)` if either the media record or the entry is missing.
    async fn link_media(&self, path: &str, owner_id: Uuid) -> Result<Option<MediaItem>>;

    /// Fetch media records matching `filter`, ordered by path.
    async fn list_media(&self, filter: &MediaFilter) -> Result<Vec<MediaItem>>;

    /// Delete media records matching `filter`. Returns the number removed.
    async fn delete_media(&self, filter: &MediaFilter) -> Result<u64>;
}
