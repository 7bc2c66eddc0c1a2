//! SQLite-backed [`Store`] implementation.
//!
//! Every [`Store`] method runs in its own transaction. Returning early with
//! `Ok(None)` or `Err` drops the transaction, which rolls it back, so a
//! lookup miss halfway through a write leaves the database untouched.

use std::collections::HashMap;

use anyhow::Result;
use async_trait::async_trait;
use sqlx::sqlite::{SqliteConnection, SqliteRow};
use sqlx::{Row, SqlitePool};
use uuid::Uuid;

use geomemories_core::models::{Coordinate, MediaItem, MediaKind, MemoryEntry, NewEntry};
use geomemories_core::query::{EntryFilter, MediaFilter, SqlPredicate};
use geomemories_core::store::Store;

/// SQLite implementation of the [`Store`] trait.
///
/// Wraps a [`SqlitePool`] and maps each operation onto the
/// `memory_entries` and `media_items` tables.
pub struct SqliteStore {
    pool: SqlitePool,
}

impl SqliteStore {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }
}

fn media_from_row(row: &SqliteRow) -> Result<MediaItem> {
    let id: String = row.get("id");
    let owner_id: Option<String> = row.get("owner_id");
    let kind: i64 = row.get("kind");

    Ok(MediaItem {
        id: Uuid::parse_str(&id)?,
        path: row.get("path"),
        kind: MediaKind::from_i64(kind)?,
        owner_id: owner_id.as_deref().map(Uuid::parse_str).transpose()?,
        created_at: row.get("created_at"),
    })
}

async fn fetch_media(conn: &mut SqliteConnection, filter: &MediaFilter) -> Result<Vec<MediaItem>> {
    let SqlPredicate { clause, bind } = filter.sql();
    let sql = format!(
        "SELECT id, path, kind, owner_id, created_at FROM media_items WHERE {} ORDER BY path",
        clause
    );

    let mut query = sqlx::query(&sql);
    if let Some(value) = bind {
        query = query.bind(value);
    }

    let rows = query.fetch_all(&mut *conn).await?;
    rows.iter().map(media_from_row).collect()
}

async fn fetch_entries(
    conn: &mut SqliteConnection,
    filter: &EntryFilter,
) -> Result<Vec<MemoryEntry>> {
    let SqlPredicate { clause, bind } = filter.sql();
    let sql = format!(
        "SELECT id, title, description, latitude, longitude, created_at, updated_at \
         FROM memory_entries WHERE {}",
        clause
    );

    let mut query = sqlx::query(&sql);
    if let Some(value) = &bind {
        query = query.bind(value.clone());
    }
    let rows = query.fetch_all(&mut *conn).await?;
    if rows.is_empty() {
        return Ok(Vec::new());
    }

    // Owned media of the selected entries, grouped by entry
    let media_sql = format!(
        "SELECT id, path, kind, owner_id, created_at FROM media_items \
         WHERE owner_id IN (SELECT id FROM memory_entries WHERE {}) ORDER BY path",
        clause
    );
    let mut media_query = sqlx::query(&media_sql);
    if let Some(value) = bind {
        media_query = media_query.bind(value);
    }
    let owned = media_query.fetch_all(&mut *conn).await?;
    let mut by_owner: HashMap<Uuid, Vec<MediaItem>> = HashMap::new();
    for row in &owned {
        let item = media_from_row(row)?;
        if let Some(owner) = item.owner_id {
            by_owner.entry(owner).or_default().push(item);
        }
    }

    let mut entries = Vec::with_capacity(rows.len());
    for row in &rows {
        let id = Uuid::parse_str(&row.get::<String, _>("id"))?;
        entries.push(MemoryEntry {
            id,
            title: row.get("title"),
            description: row.get("description"),
            coordinate: Coordinate::new(row.get("latitude"), row.get("longitude")),
            media: by_owner.remove(&id).unwrap_or_default(),
            created_at: row.get("created_at"),
            updated_at: row.get("updated_at"),
        });
    }
    Ok(entries)
}

async fn entry_exists(conn: &mut SqliteConnection, id: Uuid) -> Result<bool> {
    let exists: bool = sqlx::query_scalar("SELECT COUNT(*) > 0 FROM memory_entries WHERE id = ?")
        .bind(id.to_string())
        .fetch_one(&mut *conn)
        .await?;
    Ok(exists)
}

/// Point every path at `owner`. Returns `false` if any path has no record.
async fn link_paths(conn: &mut SqliteConnection, owner: Uuid, paths: &[String]) -> Result<bool> {
    for path in paths {
        let result = sqlx::query("UPDATE media_items SET owner_id = ? WHERE path = ?")
            .bind(owner.to_string())
            .bind(path)
            .execute(&mut *conn)
            .await?;
        if result.rows_affected() == 0 {
            return Ok(false);
        }
    }
    Ok(true)
}

#[async_trait]
impl Store for SqliteStore {
    async fn insert_entries(&self, entries: &[NewEntry]) -> Result<Option<Vec<MemoryEntry>>> {
        let mut tx = self.pool.begin().await?;

        for NewEntry { entry, media_paths } in entries {
            sqlx::query(
                r#"
                INSERT INTO memory_entries (id, title, description, latitude, longitude,
                                            created_at, updated_at)
                VALUES (?, ?, ?, ?, ?, ?, ?)
                "#,
            )
            .bind(entry.id.to_string())
            .bind(&entry.title)
            .bind(&entry.description)
            .bind(entry.coordinate.latitude)
            .bind(entry.coordinate.longitude)
            .bind(entry.created_at)
            .bind(entry.updated_at)
            .execute(&mut *tx)
            .await?;

            if !link_paths(&mut tx, entry.id, media_paths).await? {
                return Ok(None);
            }
        }

        let mut snapshots = Vec::with_capacity(entries.len());
        for NewEntry { entry, .. } in entries {
            snapshots.extend(fetch_entries(&mut tx, &EntryFilter::ById(entry.id)).await?);
        }

        tx.commit().await?;
        Ok(Some(snapshots))
    }

    async fn list_entries(&self, filter: &EntryFilter) -> Result<Vec<MemoryEntry>> {
        let mut conn = self.pool.acquire().await?;
        fetch_entries(&mut conn, filter).await
    }

    async fn update_entry(&self, entry: &MemoryEntry) -> Result<Option<MemoryEntry>> {
        let mut tx = self.pool.begin().await?;

        if !entry_exists(&mut tx, entry.id).await? {
            return Ok(None);
        }

        sqlx::query(
            r#"
            UPDATE memory_entries
            SET title = ?, description = ?, latitude = ?, longitude = ?, updated_at = ?
            WHERE id = ?
            "#,
        )
        .bind(&entry.title)
        .bind(&entry.description)
        .bind(entry.coordinate.latitude)
        .bind(entry.coordinate.longitude)
        .bind(entry.updated_at)
        .bind(entry.id.to_string())
        .execute(&mut *tx)
        .await?;

        // Replace the association set
        sqlx::query("UPDATE media_items SET owner_id = NULL WHERE owner_id = ?")
            .bind(entry.id.to_string())
            .execute(&mut *tx)
            .await?;
        if !link_paths(&mut tx, entry.id, &entry.media_paths()).await? {
            return Ok(None);
        }

        let snapshot = fetch_entries(&mut tx, &EntryFilter::ById(entry.id))
            .await?
            .into_iter()
            .next();

        tx.commit().await?;
        Ok(snapshot)
    }

    async fn delete_entries(&self, filter: &EntryFilter) -> Result<u64> {
        let SqlPredicate { clause, bind } = filter.sql();
        let mut tx = self.pool.begin().await?;

        let unlink_sql = format!(
            "UPDATE media_items SET owner_id = NULL \
             WHERE owner_id IN (SELECT id FROM memory_entries WHERE {})",
            clause
        );
        let mut unlink = sqlx::query(&unlink_sql);
        if let Some(ref value) = bind {
            unlink = unlink.bind(value.clone());
        }
        unlink.execute(&mut *tx).await?;

        let delete_sql = format!("DELETE FROM memory_entries WHERE {}", clause);
        let mut delete = sqlx::query(&delete_sql);
        if let Some(value) = bind {
            delete = delete.bind(value);
        }
        let result = delete.execute(&mut *tx).await?;

        tx.commit().await?;
        Ok(result.rows_affected())
    }

    async fn insert_media(&self, item: &MediaItem) -> Result<Option<MediaItem>> {
        let mut tx = self.pool.begin().await?;

        if let Some(owner) = item.owner_id {
            if !entry_exists(&mut tx, owner).await? {
                return Ok(None);
            }
        }

        sqlx::query(
            "INSERT INTO media_items (id, path, kind, owner_id, created_at) VALUES (?, ?, ?, ?, ?)",
        )
        .bind(item.id.to_string())
        .bind(&item.path)
        .bind(item.kind.as_i64())
        .bind(item.owner_id.map(|o| o.to_string()))
        .bind(item.created_at)
        .execute(&mut *tx)
        .await?;

        tx.commit().await?;
        Ok(Some(item.clone()))
    }

    async fn link_media(&self, path: &str, owner_id: Uuid) -> Result<Option<MediaItem>> {
        let mut tx = self.pool.begin().await?;

        if !entry_exists(&mut tx, owner_id).await? {
            return Ok(None);
        }
        if !link_paths(&mut tx, owner_id, &[path.to_string()]).await? {
            return Ok(None);
        }

        let linked = fetch_media(&mut tx, &MediaFilter::ByPath(path.to_string()))
            .await?
            .into_iter()
            .next();

        tx.commit().await?;
        Ok(linked)
    }

    async fn list_media(&self, filter: &MediaFilter) -> Result<Vec<MediaItem>> {
        let mut conn = self.pool.acquire().await?;
        fetch_media(&mut conn, filter).await
    }

    async fn delete_media(&self, filter: &MediaFilter) -> Result<u64> {
        let SqlPredicate { clause, bind } = filter.sql();
        let sql = format!("DELETE FROM media_items WHERE {}", clause);

        let mut tx = self.pool.begin().await?;
        let mut query = sqlx::query(&sql);
        if let Some(value) = bind {
            query = query.bind(value);
        }
        let result = query.execute(&mut *tx).await?;
        tx.commit().await?;

        Ok(result.rows_affected())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::migrate::migrate_pool;
    use geomemories_core::models::EntryDraft;
    use tempfile::TempDir;

    async fn setup() -> (TempDir, SqliteStore) {
        let tmp = TempDir::new().unwrap();
        let pool = crate::db::connect_path(&tmp.path().join("test.sqlite"))
            .await
            .unwrap();
        migrate_pool(&pool).await.unwrap();
        (tmp, SqliteStore::new(pool))
    }

    fn entry(title: &str) -> NewEntry {
        EntryDraft::new(title, Coordinate::new(48.8566, 2.3522))
            .with_description("somewhere")
            .into_new_entry()
    }

    #[tokio::test]
    async fn test_insert_and_list_roundtrip() {
        let (_tmp, store) = setup().await;
        let e = entry("Paris");
        let saved = store.insert_entries(&[e.clone()]).await.unwrap().unwrap();
        assert_eq!(saved.len(), 1);
        assert_eq!(saved[0].title, "Paris");

        let all = store.list_entries(&EntryFilter::All).await.unwrap();
        assert_eq!(all.len(), 1);
        assert_eq!(all[0].id, e.entry.id);
        assert_eq!(all[0].coordinate, e.entry.coordinate);
        assert_eq!(all[0].description, "somewhere");
    }

    #[tokio::test]
    async fn test_duplicate_id_in_same_transaction_rolls_back() {
        let (_tmp, store) = setup().await;
        let a = entry("A");
        let mut b = entry("B");
        b.entry.id = a.entry.id;

        let err = store.insert_entries(&[a, b]).await.unwrap_err();
        assert!(err.to_string().contains("UNIQUE"), "{}", err);
        assert!(store.list_entries(&EntryFilter::All).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_update_replaces_media_set() {
        let (_tmp, store) = setup().await;
        for path in ["a.jpg", "b.jpg"] {
            store
                .insert_media(&MediaItem::new(MediaKind::Image, path, None))
                .await
                .unwrap()
                .unwrap();
        }

        let mut e = entry("Rome");
        e.media_paths = vec!["a.jpg".to_string()];
        let mut saved = store.insert_entries(&[e]).await.unwrap().unwrap().remove(0);
        assert_eq!(saved.media_paths(), vec!["a.jpg"]);

        saved.media = vec![MediaItem::new(MediaKind::Image, "b.jpg", None)];
        let updated = store.update_entry(&saved).await.unwrap().unwrap();
        assert_eq!(updated.media_paths(), vec!["b.jpg"]);

        let loose = store.list_media(&MediaFilter::Unlinked).await.unwrap();
        assert_eq!(loose.len(), 1);
        assert_eq!(loose[0].path, "a.jpg");
    }

    #[tokio::test]
    async fn test_lookup_by_id_returns_only_its_media() {
        let (_tmp, store) = setup().await;
        for path in ["mine.jpg", "theirs.jpg"] {
            store
                .insert_media(&MediaItem::new(MediaKind::Image, path, None))
                .await
                .unwrap()
                .unwrap();
        }
        let mut mine = entry("Mine");
        mine.media_paths = vec!["mine.jpg".to_string()];
        let mut theirs = entry("Theirs");
        theirs.media_paths = vec!["theirs.jpg".to_string()];
        let id = mine.entry.id;
        store.insert_entries(&[mine, theirs]).await.unwrap().unwrap();

        let found = store.list_entries(&EntryFilter::ById(id)).await.unwrap();
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].media_paths(), vec!["mine.jpg"]);

        let all = store.list_entries(&EntryFilter::All).await.unwrap();
        assert_eq!(all.iter().map(|e| e.media.len()).sum::<usize>(), 2);
    }

    #[tokio::test]
    async fn test_unknown_owner_checked_before_duplicate_path() {
        let (_tmp, store) = setup().await;
        store
            .insert_media(&MediaItem::new(MediaKind::Image, "a.jpg", None))
            .await
            .unwrap()
            .unwrap();
        let clash = MediaItem::new(MediaKind::Image, "a.jpg", Some(Uuid::new_v4()));
        assert!(store.insert_media(&clash).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_update_with_missing_media_changes_nothing() {
        let (_tmp, store) = setup().await;
        let saved = store
            .insert_entries(&[entry("Oslo")])
            .await
            .unwrap()
            .unwrap()
            .remove(0);

        let mut changed = saved.clone();
        changed.title = "Bergen".to_string();
        changed.media = vec![MediaItem::new(MediaKind::Image, "nope.jpg", None)];
        assert!(store.update_entry(&changed).await.unwrap().is_none());

        let all = store.list_entries(&EntryFilter::All).await.unwrap();
        assert_eq!(all[0].title, "Oslo");
    }

    #[tokio::test]
    async fn test_unknown_kind_is_read_error() {
        let (_tmp, store) = setup().await;
        sqlx::query(
            "INSERT INTO media_items (id, path, kind, owner_id, created_at) VALUES (?, 'x.bin', 7, NULL, 0)",
        )
        .bind(Uuid::new_v4().to_string())
        .execute(store.pool())
        .await
        .unwrap();

        assert!(store.list_media(&MediaFilter::All).await.is_err());
    }

    #[tokio::test]
    async fn test_delete_missing_is_noop() {
        let (_tmp, store) = setup().await;
        let removed = store
            .delete_entries(&EntryFilter::ById(Uuid::new_v4()))
            .await
            .unwrap();
        assert_eq!(removed, 0);
        let removed = store
            .delete_media(&MediaFilter::ByPath("ghost.jpg".into()))
            .await
            .unwrap();
        assert_eq!(removed, 0);
    }
}
