//! JSON export and batch import of memory entries.
//!
//! `geomem export` writes every entry (with its media references) as a
//! single JSON document. `geomem import` reads that document back and
//! inserts all entries in one transaction: a duplicate id or invalid entry
//! anywhere in the file rejects the whole file.
//!
//! Media files are not part of the document. Imported entries link media
//! by path, so the referenced media records must already exist unless
//! `--without-media` drops the references.

use anyhow::{bail, Context, Result};
use serde::{Deserialize, Serialize};
use std::path::Path;

use geomemories_core::models::MemoryEntry;

use crate::app::App;

pub const EXPORT_VERSION: u32 = 1;

#[derive(Debug, Serialize, Deserialize)]
pub struct ExportData {
    pub version: u32,
    pub exported_at: i64,
    pub entries: Vec<MemoryEntry>,
}

/// Export all entries as JSON.
///
/// If `output` is `Some`, writes to that file path. Otherwise writes
/// to stdout for piping.
pub async fn run_export(app: &App, output: Option<&Path>) -> Result<()> {
    let entries = app.storage.list_memory_entries().await?;
    let count = entries.len();

    let data = ExportData {
        version: EXPORT_VERSION,
        exported_at: chrono::Utc::now().timestamp(),
        entries,
    };
    let json = serde_json::to_string_pretty(&data)?;

    match output {
        Some(path) => {
            if let Some(parent) = path.parent() {
                std::fs::create_dir_all(parent)?;
            }
            std::fs::write(path, &json)?;
            eprintln!("Exported {} entries to {}", count, path.display());
        }
        None => {
            println!("{}", json);
        }
    }

    Ok(())
}

pub fn read_export(path: &Path) -> Result<ExportData> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read import file: {}", path.display()))?;
    let data: ExportData =
        serde_json::from_str(&content).with_context(|| "Failed to parse import file")?;
    if data.version != EXPORT_VERSION {
        bail!(
            "Unsupported export version {} (expected {})",
            data.version,
            EXPORT_VERSION
        );
    }
    Ok(data)
}

/// Import every entry in `path` atomically.
pub async fn run_import(app: &App, path: &Path, without_media: bool) -> Result<()> {
    let mut data = read_export(path)?;
    if without_media {
        for entry in &mut data.entries {
            entry.media.clear();
        }
    }

    let count = app.storage.import_memory_entries(&data.entries).await?;
    eprintln!("Imported {} entries from {}", count, path.display());
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_read_export_rejects_other_versions() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("dump.json");
        std::fs::write(&path, r#"{"version": 99, "exported_at": 0, "entries": []}"#).unwrap();
        let err = read_export(&path).unwrap_err();
        assert!(err.to_string().contains("Unsupported export version"));
    }

    #[test]
    fn test_read_export_accepts_entries_without_media() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("dump.json");
        std::fs::write(
            &path,
            r#"{
                "version": 1,
                "exported_at": 0,
                "entries": [{
                    "id": "6f1c1f7e-2f4b-4a8e-9b51-0b9f3c1d2e3a",
                    "title": "Harbor",
                    "coordinate": { "latitude": 60.1, "longitude": 24.9 },
                    "created_at": 1,
                    "updated_at": 2
                }]
            }"#,
        )
        .unwrap();

        let data = read_export(&path).unwrap();
        assert_eq!(data.entries.len(), 1);
        assert_eq!(data.entries[0].title, "Harbor");
        assert!(data.entries[0].description.is_empty());
        assert!(data.entries[0].media.is_empty());
    }
}
