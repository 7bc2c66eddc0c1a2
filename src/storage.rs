//! Validated CRUD over memory entries and media items.
//!
//! [`StorageService`] is the only way the rest of the crate writes records.
//! It runs the validator before touching the store, translates lookup
//! misses into [`StorageError::NotFound`] and wraps every backend failure
//! as [`StorageError::PersistenceFailure`].
//!
//! | Method | Fails with |
//! |--------|------------|
//! | [`create_memory_entry`](StorageService::create_memory_entry) | `InvalidInput`, `NotFound` (unknown media path), `PersistenceFailure` |
//! | [`list_memory_entries`](StorageService::list_memory_entries) | `PersistenceFailure` |
//! | [`get_memory_entry`](StorageService::get_memory_entry) | `NotFound`, `PersistenceFailure` |
//! | [`update_memory_entry`](StorageService::update_memory_entry) | `InvalidInput`, `NotFound`, `PersistenceFailure` |
//! | [`delete_memory_entry`](StorageService::delete_memory_entry) | `PersistenceFailure` (missing id is a no-op) |
//! | [`create_media_item`](StorageService::create_media_item) | `InvalidInput`, `NotFound` (unknown owner), `PersistenceFailure` |
//! | [`link_media_item`](StorageService::link_media_item) | `NotFound`, `PersistenceFailure` |
//! | [`delete_media_item`](StorageService::delete_media_item) | `PersistenceFailure` (missing path is a no-op) |
//! | [`import_memory_entries`](StorageService::import_memory_entries) | `InvalidInput`, `NotFound`, `PersistenceFailure` (duplicate id) |

use std::sync::Arc;

use tracing::{debug, info};
use uuid::Uuid;

use geomemories_core::models::{EntryDraft, MediaItem, MediaKind, MemoryEntry, NewEntry};
use geomemories_core::query::{EntryFilter, MediaFilter};
use geomemories_core::store::Store;
use geomemories_core::validate::{validate_entry, validate_media_path};
use geomemories_core::StorageError;

pub type StorageResult<T> = Result<T, StorageError>;

/// Storage service over any [`Store`] backend.
#[derive(Clone)]
pub struct StorageService {
    store: Arc<dyn Store>,
}

impl StorageService {
    pub fn new(store: Arc<dyn Store>) -> Self {
        Self { store }
    }

    /// Validate and insert a new entry, linking the draft's media paths.
    ///
    /// Returns the committed snapshot including the linked media.
    pub async fn create_memory_entry(&self, draft: EntryDraft) -> StorageResult<MemoryEntry> {
        validate_entry(&draft.title, &draft.coordinate)?;

        let new_entry = draft.into_new_entry();
        let saved = self
            .store
            .insert_entries(std::slice::from_ref(&new_entry))
            .await?
            .ok_or(StorageError::NotFound)?
            .into_iter()
            .next()
            .ok_or(StorageError::NotFound)?;

        info!(entry_id = %saved.id, media = saved.media.len(), "created memory entry");
        Ok(saved)
    }

    /// All entries, in storage iteration order.
    pub async fn list_memory_entries(&self) -> StorageResult<Vec<MemoryEntry>> {
        Ok(self.store.list_entries(&EntryFilter::All).await?)
    }

    pub async fn get_memory_entry(&self, id: Uuid) -> StorageResult<MemoryEntry> {
        self.store
            .list_entries(&EntryFilter::ById(id))
            .await?
            .into_iter()
            .next()
            .ok_or(StorageError::NotFound)
    }

    /// Overwrite an existing entry's mutable fields and media set.
    ///
    /// `created_at` is kept from storage; `updated_at` is set to now.
    pub async fn update_memory_entry(&self, entry: MemoryEntry) -> StorageResult<MemoryEntry> {
        validate_entry(&entry.title, &entry.coordinate)?;

        let mut entry = entry;
        entry.updated_at = chrono::Utc::now().timestamp();

        let updated = self
            .store
            .update_entry(&entry)
            .await?
            .ok_or(StorageError::NotFound)?;

        info!(entry_id = %updated.id, "updated memory entry");
        Ok(updated)
    }

    /// Delete by id. Deleting a missing id succeeds.
    pub async fn delete_memory_entry(&self, id: Uuid) -> StorageResult<()> {
        let removed = self.store.delete_entries(&EntryFilter::ById(id)).await?;
        debug!(entry_id = %id, removed, "deleted memory entry");
        Ok(())
    }

    /// Insert a media record, optionally linked to an existing entry.
    pub async fn create_media_item(
        &self,
        kind: MediaKind,
        path: &str,
        owner_id: Option<Uuid>,
    ) -> StorageResult<MediaItem> {
        validate_media_path(path)?;

        let item = MediaItem::new(kind, path, owner_id);
        let saved = self
            .store
            .insert_media(&item)
            .await?
            .ok_or(StorageError::NotFound)?;

        debug!(path = %saved.path, kind = saved.kind.as_str(), "created media item");
        Ok(saved)
    }

    /// Point the media record at `path` to `owner_id`.
    pub async fn link_media_item(&self, path: &str, owner_id: Uuid) -> StorageResult<MediaItem> {
        self.store
            .link_media(path, owner_id)
            .await?
            .ok_or(StorageError::NotFound)
    }

    /// Delete the media record at `path`. A missing path is a no-op.
    pub async fn delete_media_item(&self, path: &str) -> StorageResult<()> {
        self.store
            .delete_media(&MediaFilter::ByPath(path.to_string()))
            .await?;
        Ok(())
    }

    pub async fn get_media_item(&self, path: &str) -> StorageResult<MediaItem> {
        self.store
            .list_media(&MediaFilter::ByPath(path.to_string()))
            .await?
            .into_iter()
            .next()
            .ok_or(StorageError::NotFound)
    }

    pub async fn list_media_items(&self, filter: &MediaFilter) -> StorageResult<Vec<MediaItem>> {
        Ok(self.store.list_media(filter).await?)
    }

    /// Insert a batch of complete entries (ids included) atomically.
    ///
    /// Each entry's media are relinked by path and must already exist.
    /// Every entry is validated first. A duplicate id, against storage or
    /// within the batch, fails the whole batch.
    pub async fn import_memory_entries(&self, entries: &[MemoryEntry]) -> StorageResult<usize> {
        for entry in entries {
            validate_entry(&entry.title, &entry.coordinate)?;
        }

        let batch: Vec<NewEntry> = entries.iter().cloned().map(NewEntry::from_snapshot).collect();
        let saved = self
            .store
            .insert_entries(&batch)
            .await?
            .ok_or(StorageError::NotFound)?;

        info!(count = saved.len(), "imported memory entries");
        Ok(saved.len())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use geomemories_core::models::Coordinate;
    use geomemories_core::store::memory::InMemoryStore;

    fn service() -> StorageService {
        StorageService::new(Arc::new(InMemoryStore::new()))
    }

    fn draft(title: &str, lat: f64, lon: f64) -> EntryDraft {
        EntryDraft::new(title, Coordinate::new(lat, lon)).with_description("desc")
    }

    #[tokio::test]
    async fn test_create_then_list_contains_entry() {
        let svc = service();
        let created = svc
            .create_memory_entry(draft("Kyoto", 35.0116, 135.7681))
            .await
            .unwrap();

        let all = svc.list_memory_entries().await.unwrap();
        let found = all.iter().find(|e| e.id == created.id).unwrap();
        assert_eq!(found.title, "Kyoto");
        assert_eq!(found.description, "desc");
        assert_eq!(found.coordinate, Coordinate::new(35.0116, 135.7681));
    }

    #[tokio::test]
    async fn test_invalid_input_writes_nothing() {
        let svc = service();
        for d in [
            draft("   ", 0.0, 0.0),
            draft("x", 91.0, 0.0),
            draft("x", -90.1, 0.0),
            draft("x", 0.0, 180.5),
            draft("x", 0.0, -200.0),
        ] {
            let err = svc.create_memory_entry(d).await.unwrap_err();
            assert!(matches!(err, StorageError::InvalidInput(_)));
        }
        assert!(svc.list_memory_entries().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_update_validates_before_storage() {
        let svc = service();
        let mut created = svc.create_memory_entry(draft("a", 1.0, 1.0)).await.unwrap();
        created.title = "\n".to_string();
        let err = svc.update_memory_entry(created.clone()).await.unwrap_err();
        assert!(matches!(err, StorageError::InvalidInput(_)));

        let stored = svc.get_memory_entry(created.id).await.unwrap();
        assert_eq!(stored.title, "a");
    }

    #[tokio::test]
    async fn test_update_missing_is_not_found_and_creates_nothing() {
        let svc = service();
        let ghost = draft("ghost", 0.0, 0.0).into_new_entry().entry;
        let err = svc.update_memory_entry(ghost).await.unwrap_err();
        assert!(matches!(err, StorageError::NotFound));
        assert!(svc.list_memory_entries().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_delete_missing_is_ok() {
        let svc = service();
        svc.delete_memory_entry(Uuid::new_v4()).await.unwrap();
        svc.delete_media_item("nothing.jpg").await.unwrap();
    }

    #[tokio::test]
    async fn test_create_media_then_link() {
        let svc = service();
        let entry = svc.create_memory_entry(draft("e", 0.0, 0.0)).await.unwrap();
        let item = svc
            .create_media_item(MediaKind::Video, "clip.mov", None)
            .await
            .unwrap();
        assert!(item.owner_id.is_none());

        let linked = svc.link_media_item("clip.mov", entry.id).await.unwrap();
        assert_eq!(linked.owner_id, Some(entry.id));

        let entry = svc.get_memory_entry(entry.id).await.unwrap();
        assert_eq!(entry.media_paths(), vec!["clip.mov"]);
    }

    #[tokio::test]
    async fn test_link_missing_path_is_not_found() {
        let svc = service();
        let entry = svc.create_memory_entry(draft("e", 0.0, 0.0)).await.unwrap();
        let err = svc.link_media_item("nope.jpg", entry.id).await.unwrap_err();
        assert!(matches!(err, StorageError::NotFound));
    }

    #[tokio::test]
    async fn test_media_path_must_be_bare_file_name() {
        let svc = service();
        let err = svc
            .create_media_item(MediaKind::Image, "file:///var/a.jpg", None)
            .await
            .unwrap_err();
        assert!(matches!(err, StorageError::InvalidInput(_)));
    }

    #[tokio::test]
    async fn test_duplicate_media_path_is_persistence_failure() {
        let svc = service();
        svc.create_media_item(MediaKind::Image, "a.jpg", None)
            .await
            .unwrap();
        let err = svc
            .create_media_item(MediaKind::Image, "a.jpg", None)
            .await
            .unwrap_err();
        assert!(matches!(err, StorageError::PersistenceFailure(_)));
    }

    #[tokio::test]
    async fn test_import_relinks_exported_media_by_path() {
        let source = service();
        source
            .create_media_item(MediaKind::Video, "ferry.mov", None)
            .await
            .unwrap();
        let exported = source
            .create_memory_entry(draft("Ferry", 60.0, 25.0).with_media(vec!["ferry.mov".into()]))
            .await
            .unwrap();

        let target = service();
        target
            .create_media_item(MediaKind::Video, "ferry.mov", None)
            .await
            .unwrap();
        assert_eq!(target.import_memory_entries(&[exported.clone()]).await.unwrap(), 1);

        let imported = target.get_memory_entry(exported.id).await.unwrap();
        assert_eq!(imported.media_paths(), vec!["ferry.mov"]);
        assert_eq!(imported.media[0].owner_id, Some(exported.id));
    }

    #[tokio::test]
    async fn test_import_duplicate_ids_commits_nothing() {
        let svc = service();
        let a = draft("A", 0.0, 0.0).into_new_entry().entry;
        let mut b = draft("B", 0.0, 0.0).into_new_entry().entry;
        b.id = a.id;

        let err = svc.import_memory_entries(&[a, b]).await.unwrap_err();
        assert!(matches!(err, StorageError::PersistenceFailure(_)));
        assert!(svc.list_memory_entries().await.unwrap().is_empty());
    }
}
