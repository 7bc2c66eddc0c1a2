//! In-memory [`Store`] implementation for tests and embedding.
//!
//! All state sits behind one `std::sync::RwLock`. Each operation checks
//! every precondition before its first mutation while holding the write
//! lock, which gives the same all-or-nothing behavior as a transaction.

use std::collections::HashMap;
use std::sync::{RwLock, RwLockReadGuard, RwLockWriteGuard};

use anyhow::{anyhow, bail, Result};
use async_trait::async_trait;
use uuid::Uuid;

use crate::models::{Coordinate, MediaItem, MemoryEntry, NewEntry};
use crate::query::{EntryFilter, MediaFilter};

use super::Store;

#[derive(Clone)]
struct StoredEntry {
    id: Uuid,
    title: String,
    description: String,
    coordinate: Coordinate,
    created_at: i64,
    updated_at: i64,
}

#[derive(Default)]
struct State {
    entries: HashMap<Uuid, StoredEntry>,
    // keyed by path
    media: HashMap<String, MediaItem>,
}

impl State {
    fn snapshot(&self, stored: &StoredEntry) -> MemoryEntry {
        let mut media: Vec<MediaItem> = self
            .media
            .values()
            .filter(|m| m.owner_id == Some(stored.id))
            .cloned()
            .collect();
        media.sort_by(|a, b| a.path.cmp(&b.path));

        MemoryEntry {
            id: stored.id,
            title: stored.title.clone(),
            description: stored.description.clone(),
            coordinate: stored.coordinate,
            media,
            created_at: stored.created_at,
            updated_at: stored.updated_at,
        }
    }

    fn all_paths_exist(&self, paths: &[String]) -> bool {
        paths.iter().all(|p| self.media.contains_key(p))
    }
}

/// In-memory store for tests.
pub struct InMemoryStore {
    state: RwLock<State>,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self {
            state: RwLock::new(State::default()),
        }
    }

    fn read(&self) -> Result<RwLockReadGuard<'_, State>> {
        self.state
            .read()
            .map_err(|_| anyhow!("in-memory store lock poisoned"))
    }

    fn write(&self) -> Result<RwLockWriteGuard<'_, State>> {
        self.state
            .write()
            .map_err(|_| anyhow!("in-memory store lock poisoned"))
    }
}

impl Default for InMemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Store for InMemoryStore {
    async fn insert_entries(&self, entries: &[NewEntry]) -> Result<Option<Vec<MemoryEntry>>> {
        let mut state = self.write()?;

        let mut seen = std::collections::HashSet::new();
        for NewEntry { entry, media_paths } in entries {
            if state.entries.contains_key(&entry.id) || !seen.insert(entry.id) {
                bail!("UNIQUE constraint failed: memory_entries.id ({})", entry.id);
            }
            if !state.all_paths_exist(media_paths) {
                return Ok(None);
            }
        }

        for NewEntry { entry, media_paths } in entries {
            state.entries.insert(
                entry.id,
                StoredEntry {
                    id: entry.id,
                    title: entry.title.clone(),
                    description: entry.description.clone(),
                    coordinate: entry.coordinate,
                    created_at: entry.created_at,
                    updated_at: entry.updated_at,
                },
            );
            for path in media_paths {
                if let Some(item) = state.media.get_mut(path) {
                    item.owner_id = Some(entry.id);
                }
            }
        }

        let snapshots = entries
            .iter()
            .filter_map(|e| state.entries.get(&e.entry.id).map(|s| state.snapshot(s)))
            .collect();
        Ok(Some(snapshots))
    }

    async fn list_entries(&self, filter: &EntryFilter) -> Result<Vec<MemoryEntry>> {
        let state = self.read()?;
        Ok(state
            .entries
            .values()
            .map(|s| state.snapshot(s))
            .filter(|e| filter.matches(e))
            .collect())
    }

    async fn update_entry(&self, entry: &MemoryEntry) -> Result<Option<MemoryEntry>> {
        let mut state = self.write()?;

        if !state.entries.contains_key(&entry.id) {
            return Ok(None);
        }
        let paths = entry.media_paths();
        if !state.all_paths_exist(&paths) {
            return Ok(None);
        }

        for item in state.media.values_mut() {
            if paths.contains(&item.path) {
                item.owner_id = Some(entry.id);
            } else if item.owner_id == Some(entry.id) {
                item.owner_id = None;
            }
        }

        let Some(stored) = state.entries.get_mut(&entry.id) else {
            return Ok(None);
        };
        stored.title = entry.title.clone();
        stored.description = entry.description.clone();
        stored.coordinate = entry.coordinate;
        stored.updated_at = entry.updated_at;
        let stored = stored.clone();

        Ok(Some(state.snapshot(&stored)))
    }

    async fn delete_entries(&self, filter: &EntryFilter) -> Result<u64> {
        let mut state = self.write()?;

        let doomed: Vec<Uuid> = state
            .entries
            .values()
            .map(|s| state.snapshot(s))
            .filter(|e| filter.matches(e))
            .map(|e| e.id)
            .collect();

        for id in &doomed {
            state.entries.remove(id);
            for item in state.media.values_mut() {
                if item.owner_id == Some(*id) {
                    item.owner_id = None;
                }
            }
        }
        Ok(doomed.len() as u64)
    }

    async fn insert_media(&self, item: &MediaItem) -> Result<Option<MediaItem>> {
        let mut state = self.write()?;

        if let Some(owner) = item.owner_id {
            if !state.entries.contains_key(&owner) {
                return Ok(None);
            }
        }
        if state.media.contains_key(&item.path) {
            bail!("UNIQUE constraint failed: media_items.path ({})", item.path);
        }
        if state.media.values().any(|m| m.id == item.id) {
            bail!("UNIQUE constraint failed: media_items.id ({})", item.id);
        }

        state.media.insert(item.path.clone(), item.clone());
        Ok(Some(item.clone()))
    }

    async fn link_media(&self, path: &str, owner_id: Uuid) -> Result<Option<MediaItem>> {
        let mut state = self.write()?;

        if !state.entries.contains_key(&owner_id) {
            return Ok(None);
        }
        Ok(state.media.get_mut(path).map(|item| {
            item.owner_id = Some(owner_id);
            item.clone()
        }))
    }

    async fn list_media(&self, filter: &MediaFilter) -> Result<Vec<MediaItem>> {
        let state = self.read()?;
        let mut items: Vec<MediaItem> = state
            .media
            .values()
            .filter(|m| filter.matches(m))
            .cloned()
            .collect();
        items.sort_by(|a, b| a.path.cmp(&b.path));
        Ok(items)
    }

    async fn delete_media(&self, filter: &MediaFilter) -> Result<u64> {
        let mut state = self.write()?;
        let before = state.media.len();
        state.media.retain(|_, m| !filter.matches(m));
        Ok((before - state.media.len()) as u64)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{EntryDraft, MediaKind};

    fn draft(title: &str) -> NewEntry {
        EntryDraft::new(title, Coordinate::new(10.0, 20.0)).into_new_entry()
    }

    #[tokio::test]
    async fn test_duplicate_id_in_batch_commits_nothing() {
        let store = InMemoryStore::new();
        let a = draft("A");
        let mut b = draft("B");
        b.entry.id = a.entry.id;

        let result = store.insert_entries(&[a, b]).await;
        assert!(result.is_err());
        assert!(store.list_entries(&EntryFilter::All).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_missing_media_path_aborts_insert() {
        let store = InMemoryStore::new();
        let mut entry = draft("A");
        entry.media_paths = vec!["ghost.jpg".to_string()];

        assert!(store.insert_entries(&[entry]).await.unwrap().is_none());
        assert!(store.list_entries(&EntryFilter::All).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_delete_entry_unlinks_media() {
        let store = InMemoryStore::new();
        store
            .insert_media(&MediaItem::new(MediaKind::Image, "a.jpg", None))
            .await
            .unwrap();
        let mut entry = draft("A");
        entry.media_paths = vec!["a.jpg".to_string()];
        let id = entry.entry.id;
        let saved = store.insert_entries(&[entry]).await.unwrap().unwrap();
        assert_eq!(saved[0].media.len(), 1);
        assert_eq!(saved[0].media[0].owner_id, Some(id));

        assert_eq!(store.delete_entries(&EntryFilter::ById(id)).await.unwrap(), 1);
        let unlinked = store.list_media(&MediaFilter::Unlinked).await.unwrap();
        assert_eq!(unlinked.len(), 1);
    }

    #[tokio::test]
    async fn test_unknown_owner_checked_before_duplicate_path() {
        let store = InMemoryStore::new();
        store
            .insert_media(&MediaItem::new(MediaKind::Image, "a.jpg", None))
            .await
            .unwrap();
        let clash = MediaItem::new(MediaKind::Image, "a.jpg", Some(Uuid::new_v4()));
        assert!(store.insert_media(&clash).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_link_requires_existing_owner() {
        let store = InMemoryStore::new();
        store
            .insert_media(&MediaItem::new(MediaKind::Video, "v.mov", None))
            .await
            .unwrap();
        assert!(store
            .link_media("v.mov", Uuid::new_v4())
            .await
            .unwrap()
            .is_none());
    }
}
