//! `geomem media` subcommands.

use std::path::{Path, PathBuf};

use anyhow::{bail, Context, Result};
use futures::future::join_all;
use tokio_util::sync::CancellationToken;
use tracing::error;
use uuid::Uuid;

use crate::app::App;
use crate::media::{MediaError, PickerItem};

/// Import every file concurrently. Per-file failures are reported without
/// stopping the others; the command fails if any file failed.
pub async fn run_import(
    app: &App,
    entry: Option<Uuid>,
    files: &[PathBuf],
    token: &CancellationToken,
) -> Result<()> {
    let imports = files.iter().map(|path| async move {
        let item = PickerItem::from_path(path);
        (path, app.media.import_from_picker(entry, &item, token).await)
    });

    let mut failed = 0usize;
    for (path, result) in join_all(imports).await {
        match result {
            Ok(item) => println!("{}\t{}\t{}", path.display(), item.kind.as_str(), item.path),
            Err(e) if e.is_cancellation() => {}
            Err(e) => {
                failed += 1;
                error!(file = %path.display(), error = %e, "import failed");
                eprintln!("{}: {}", path.display(), e);
            }
        }
    }

    if failed > 0 {
        bail!("{} of {} imports failed", failed, files.len());
    }
    Ok(())
}

pub async fn run_link(app: &App, path: &str, entry: Uuid) -> Result<()> {
    let item = app.storage.link_media_item(path, entry).await?;
    println!("Linked {} to {}", item.path, entry);
    Ok(())
}

pub async fn run_delete(app: &App, path: &str) -> Result<()> {
    let item = app.storage.get_media_item(path).await?;
    app.media.delete_media_item(&item).await;
    println!("Deleted {}", item.path);
    Ok(())
}

/// Decode the item's thumbnail and write it as PNG to `out`.
pub async fn run_thumbnail(
    app: &App,
    path: &str,
    out: &Path,
    token: &CancellationToken,
) -> Result<()> {
    let item = app.storage.get_media_item(path).await?;
    let image = match app.media.load_thumbnail(&item, token).await {
        Ok(image) => image,
        Err(MediaError::Cancelled) => return Ok(()),
        Err(e) => return Err(e.into()),
    };

    if let Some(parent) = out.parent() {
        std::fs::create_dir_all(parent)?;
    }
    let (width, height) = (image.width(), image.height());
    let out_path = out.to_path_buf();
    tokio::task::spawn_blocking(move || image.save_with_format(&out_path, image::ImageFormat::Png))
        .await?
        .with_context(|| format!("failed to write {}", out.display()))?;

    eprintln!("Wrote {}x{} thumbnail to {}", width, height, out.display());
    Ok(())
}

/// Report (and with `prune`, remove) files without records and records
/// without files.
pub async fn run_gc(app: &App, prune: bool) -> Result<()> {
    let report = if prune {
        app.media.prune_orphans().await?
    } else {
        app.media.find_orphans().await?
    };

    if report.is_clean() {
        println!("Media directory is consistent.");
        return Ok(());
    }

    let verb = if prune { "removed" } else { "found" };
    for path in &report.files_without_record {
        println!("file without record ({}): {}", verb, path.display());
    }
    for item in &report.records_without_file {
        println!("record without file ({}): {}", verb, item.path);
    }
    Ok(())
}
