//! Memory entry commands: `add`, `list`, `show`, `edit`, `delete`.

use anyhow::{Context, Result};
use uuid::Uuid;

use geomemories_core::models::{Coordinate, EntryDraft, MemoryEntry};

use crate::app::App;

/// Field changes requested by `geomem edit`. `None` keeps the stored value.
#[derive(Debug, Default)]
pub struct EntryEdit {
    pub title: Option<String>,
    pub description: Option<String>,
    pub latitude: Option<f64>,
    pub longitude: Option<f64>,
    /// Replacement media set, by path. `None` keeps the current set.
    pub media: Option<Vec<String>>,
}

pub fn parse_id(raw: &str) -> Result<Uuid> {
    Uuid::parse_str(raw.trim()).with_context(|| format!("invalid entry id: {}", raw))
}

pub async fn run_add(app: &App, draft: EntryDraft) -> Result<()> {
    let entry = app.storage.create_memory_entry(draft).await?;
    println!("{}", entry.id);
    Ok(())
}

pub async fn run_list(app: &App) -> Result<()> {
    let entries = app.storage.list_memory_entries().await?;
    if entries.is_empty() {
        println!("No entries.");
        return Ok(());
    }

    println!(
        "{:<36}  {:<28}  {:<24}  {:>5}",
        "ID", "TITLE", "COORDINATE", "MEDIA"
    );
    for e in &entries {
        println!(
            "{:<36}  {:<28}  {:<24}  {:>5}",
            e.id,
            truncate(&e.title, 28),
            e.coordinate.to_string(),
            e.media.len()
        );
    }
    Ok(())
}

pub async fn run_show(app: &App, id: Uuid) -> Result<()> {
    let entry = app.storage.get_memory_entry(id).await?;
    print_entry(&entry);
    Ok(())
}

pub async fn run_edit(app: &App, id: Uuid, edit: EntryEdit) -> Result<()> {
    let mut entry = app.storage.get_memory_entry(id).await?;

    if let Some(title) = edit.title {
        entry.title = title;
    }
    if let Some(description) = edit.description {
        entry.description = description;
    }
    entry.coordinate = Coordinate::new(
        edit.latitude.unwrap_or(entry.coordinate.latitude),
        edit.longitude.unwrap_or(entry.coordinate.longitude),
    );
    if let Some(paths) = edit.media {
        let mut media = Vec::with_capacity(paths.len());
        for path in &paths {
            media.push(
                app.storage
                    .get_media_item(path)
                    .await
                    .with_context(|| format!("media item {}", path))?,
            );
        }
        entry.media = media;
    }

    let updated = app.storage.update_memory_entry(entry).await?;
    print_entry(&updated);
    Ok(())
}

/// Delete an entry. Owned media (records and files) go with it unless
/// `keep_media` is set, in which case they are left unlinked.
pub async fn run_delete(app: &App, id: Uuid, keep_media: bool) -> Result<()> {
    if keep_media {
        app.storage.delete_memory_entry(id).await?;
    } else {
        app.media.delete_entry_with_media(id).await?;
    }
    println!("Deleted {}", id);
    Ok(())
}

fn print_entry(entry: &MemoryEntry) {
    println!("id:           {}", entry.id);
    println!("title:        {}", entry.title);
    println!("coordinate:   {}", entry.coordinate);
    println!("created_at:   {}", format_ts_iso(entry.created_at));
    println!("updated_at:   {}", format_ts_iso(entry.updated_at));
    if !entry.description.is_empty() {
        println!();
        println!("{}", entry.description);
    }
    println!();
    println!("--- Media ({}) ---", entry.media.len());
    for m in &entry.media {
        println!("{:<6} {}", m.kind.as_str(), m.path);
    }
}

fn truncate(s: &str, max: usize) -> String {
    if s.chars().count() <= max {
        return s.to_string();
    }
    let mut out: String = s.chars().take(max.saturating_sub(1)).collect();
    out.push('…');
    out
}

pub(crate) fn format_ts_iso(ts: i64) -> String {
    chrono::DateTime::from_timestamp(ts, 0)
        .map(|dt| dt.format("%Y-%m-%dT%H:%M:%SZ").to_string())
        .unwrap_or_else(|| ts.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_truncate_counts_chars() {
        assert_eq!(truncate("short", 10), "short");
        assert_eq!(truncate("Ünïcödé title", 5), "Ünïc…");
    }

    #[test]
    fn test_parse_id() {
        let id = Uuid::new_v4();
        assert_eq!(parse_id(&format!(" {} ", id)).unwrap(), id);
        assert!(parse_id("not-a-uuid").is_err());
    }

    #[test]
    fn test_format_ts_iso() {
        assert_eq!(format_ts_iso(0), "1970-01-01T00:00:00Z");
    }
}
