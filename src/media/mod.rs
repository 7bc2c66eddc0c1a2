//! Media import pipeline and thumbnail loading.
//!
//! [`MediaFileWorker`] copies picked or captured media into the flat media
//! directory, creates the matching [`MediaItem`] records through the
//! [`StorageService`], serves thumbnails from a [`ThumbnailCache`], and
//! removes records together with their files.
//!
//! # Import commit order
//!
//! ```text
//! bytes ──▶ .<name>.partial ──▶ create record ──▶ rename to <name>
//!                 │                    │                 │
//!                 ▼ fail               ▼ fail            ▼ fail
//!          remove partial       remove partial    delete record,
//!                                                 remove partial
//! ```
//!
//! No record ever points at a file that was not fully written, and a
//! failed record creation leaves no file behind. `media gc` leaves partial
//! files younger than [`PARTIAL_GRACE`] alone so it can run next to an
//! import.
//!
//! # Cancellation
//!
//! Every async operation takes a [`CancellationToken`]. A cancelled import
//! rolls back whatever it already wrote and returns
//! [`MediaError::Cancelled`], which callers treat as silent.

pub mod cache;
pub mod frame;

use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use image::codecs::jpeg::JpegEncoder;
use image::DynamicImage;
use thiserror::Error;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};
use uuid::Uuid;
use walkdir::WalkDir;

use geomemories_core::models::{MediaItem, MediaKind};
use geomemories_core::query::MediaFilter;
use geomemories_core::StorageError;

use crate::config::MediaConfig;
use crate::storage::StorageService;

pub use cache::ThumbnailCache;
pub use frame::{FfmpegFrameExtractor, FrameExtractor};

/// Offset of the frame used as a video thumbnail.
pub const VIDEO_THUMBNAIL_AT: Duration = Duration::from_secs(1);

/// Partial files younger than this are treated as imports still in flight
/// and are left alone by [`MediaFileWorker::find_orphans`].
pub const PARTIAL_GRACE: Duration = Duration::from_secs(15 * 60);

const DEFAULT_VIDEO_EXTENSION: &str = "mov";
const PARTIAL_SUFFIX: &str = ".partial";

#[derive(Debug, Error)]
pub enum MediaError {
    #[error("The picked item is not a supported format")]
    UnsupportedFormat,

    #[error("Failed to copy file: {0}")]
    CopyError(#[source] std::io::Error),

    #[error(
        "Failed to read media contents{}",
        .0.as_ref().map(|e| format!(": {:#}", e)).unwrap_or_default()
    )]
    ReadingError(Option<anyhow::Error>),

    #[error(transparent)]
    Storage(#[from] StorageError),

    /// The operation's token was cancelled. Not a user-facing failure.
    #[error("operation cancelled")]
    Cancelled,
}

impl MediaError {
    pub fn is_cancellation(&self) -> bool {
        matches!(self, MediaError::Cancelled)
    }
}

pub type MediaResult<T> = Result<T, MediaError>;

/// A file handed over by a media picker.
///
/// `content_type` is the MIME type the picker declared. When absent, the
/// type is sniffed from the file's magic bytes.
#[derive(Debug, Clone)]
pub struct PickerItem {
    pub path: PathBuf,
    pub content_type: Option<String>,
}

impl PickerItem {
    pub fn new(path: impl Into<PathBuf>, content_type: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            content_type: Some(content_type.into()),
        }
    }

    pub fn from_path(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            content_type: None,
        }
    }

    fn declared_type(&self) -> Option<String> {
        if let Some(ref declared) = self.content_type {
            return Some(declared.to_ascii_lowercase());
        }
        infer::get_from_path(&self.path)
            .ok()
            .flatten()
            .map(|t| t.mime_type().to_string())
    }

    fn kind(&self) -> MediaResult<MediaKind> {
        match self.declared_type() {
            Some(t) if t.starts_with("video/") => Ok(MediaKind::Video),
            Some(t) if t.starts_with("image/") => Ok(MediaKind::Image),
            _ => Err(MediaError::UnsupportedFormat),
        }
    }
}

/// Files and records that have lost their counterpart.
#[derive(Debug, Default, Clone, PartialEq)]
pub struct OrphanReport {
    /// Files in the media directory with no record (including partials
    /// older than [`PARTIAL_GRACE`]).
    pub files_without_record: Vec<PathBuf>,
    /// Records whose backing file is missing.
    pub records_without_file: Vec<MediaItem>,
}

impl OrphanReport {
    pub fn is_clean(&self) -> bool {
        self.files_without_record.is_empty() && self.records_without_file.is_empty()
    }
}

pub struct MediaFileWorker {
    storage: StorageService,
    media_dir: PathBuf,
    jpeg_quality: u8,
    cache: ThumbnailCache,
    frames: Arc<dyn FrameExtractor>,
}

impl MediaFileWorker {
    pub fn new(
        storage: StorageService,
        media_dir: impl Into<PathBuf>,
        frames: Arc<dyn FrameExtractor>,
    ) -> Self {
        let defaults = MediaConfig::default();
        Self {
            storage,
            media_dir: media_dir.into(),
            jpeg_quality: defaults.jpeg_quality,
            cache: ThumbnailCache::new(defaults.thumbnail_cache_capacity),
            frames,
        }
    }

    pub fn from_config(
        storage: StorageService,
        config: &MediaConfig,
        frames: Arc<dyn FrameExtractor>,
    ) -> Self {
        Self::new(storage, config.dir.clone(), frames)
            .with_jpeg_quality(config.jpeg_quality)
            .with_cache_capacity(config.thumbnail_cache_capacity)
    }

    /// JPEG quality for re-encoded images, clamped to 90..=95.
    pub fn with_jpeg_quality(mut self, quality: u8) -> Self {
        self.jpeg_quality = quality.clamp(90, 95);
        self
    }

    pub fn with_cache_capacity(mut self, capacity: usize) -> Self {
        self.cache = ThumbnailCache::new(capacity);
        self
    }

    pub fn media_dir(&self) -> &Path {
        &self.media_dir
    }

    pub fn cache(&self) -> &ThumbnailCache {
        &self.cache
    }

    /// Absolute location of an item's backing file.
    pub fn media_path(&self, item: &MediaItem) -> PathBuf {
        self.media_dir.join(&item.path)
    }

    fn partial_path(&self, name: &str) -> PathBuf {
        self.media_dir.join(format!(".{}{}", name, PARTIAL_SUFFIX))
    }

    // ============ Import ============

    /// Import a picked file.
    ///
    /// Videos are copied byte for byte, keeping their extension. Images are
    /// decoded and re-encoded as JPEG. Anything else fails with
    /// [`MediaError::UnsupportedFormat`] before a file or record is created.
    pub async fn import_from_picker(
        &self,
        owner_id: Option<Uuid>,
        item: &PickerItem,
        token: &CancellationToken,
    ) -> MediaResult<MediaItem> {
        if token.is_cancelled() {
            return Err(MediaError::Cancelled);
        }

        match item.kind()? {
            MediaKind::Video => {
                let extension = item
                    .path
                    .extension()
                    .and_then(|e| e.to_str())
                    .map(|e| e.to_ascii_lowercase())
                    .unwrap_or_else(|| DEFAULT_VIDEO_EXTENSION.to_string());
                let name = format!("{}.{}", Uuid::new_v4(), extension);
                let partial = self.prepare_partial(&name).await?;

                if let Err(e) = tokio::fs::copy(&item.path, &partial).await {
                    discard(&partial).await;
                    return Err(MediaError::CopyError(e));
                }

                self.commit(name, partial, MediaKind::Video, owner_id, token)
                    .await
            }
            MediaKind::Image => {
                let bytes = tokio::fs::read(&item.path)
                    .await
                    .map_err(|e| MediaError::ReadingError(Some(e.into())))?;
                let image = decode_image(bytes).await?;
                self.store_image(owner_id, image, token).await
            }
        }
    }

    /// Import a frame captured by a camera.
    pub async fn import_from_camera(
        &self,
        owner_id: Option<Uuid>,
        image: DynamicImage,
        token: &CancellationToken,
    ) -> MediaResult<MediaItem> {
        if token.is_cancelled() {
            return Err(MediaError::Cancelled);
        }
        self.store_image(owner_id, image, token).await
    }

    async fn store_image(
        &self,
        owner_id: Option<Uuid>,
        image: DynamicImage,
        token: &CancellationToken,
    ) -> MediaResult<MediaItem> {
        let quality = self.jpeg_quality;
        let jpeg = tokio::task::spawn_blocking(move || encode_jpeg(&image, quality))
            .await
            .map_err(|e| MediaError::ReadingError(Some(e.into())))??;

        let name = format!("{}.jpg", Uuid::new_v4());
        let partial = self.prepare_partial(&name).await?;
        if let Err(e) = tokio::fs::write(&partial, &jpeg).await {
            discard(&partial).await;
            return Err(MediaError::CopyError(e));
        }

        self.commit(name, partial, MediaKind::Image, owner_id, token)
            .await
    }

    async fn prepare_partial(&self, name: &str) -> MediaResult<PathBuf> {
        tokio::fs::create_dir_all(&self.media_dir)
            .await
            .map_err(MediaError::CopyError)?;
        Ok(self.partial_path(name))
    }

    /// Create the record for a fully written partial file, then move the
    /// file into place.
    async fn commit(
        &self,
        name: String,
        partial: PathBuf,
        kind: MediaKind,
        owner_id: Option<Uuid>,
        token: &CancellationToken,
    ) -> MediaResult<MediaItem> {
        if token.is_cancelled() {
            discard(&partial).await;
            return Err(MediaError::Cancelled);
        }

        let record = match self.storage.create_media_item(kind, &name, owner_id).await {
            Ok(record) => record,
            Err(e) => {
                discard(&partial).await;
                return Err(MediaError::Storage(e));
            }
        };

        let final_path = self.media_dir.join(&name);
        if let Err(e) = tokio::fs::rename(&partial, &final_path).await {
            error!(path = %name, error = %e, "failed to finalize media file");
            self.undo_record(&name).await;
            discard(&partial).await;
            return Err(MediaError::CopyError(e));
        }

        if token.is_cancelled() {
            self.undo_record(&name).await;
            discard(&final_path).await;
            return Err(MediaError::Cancelled);
        }

        info!(path = %record.path, kind = kind.as_str(), owner = ?owner_id, "imported media");
        Ok(record)
    }

    async fn undo_record(&self, name: &str) {
        if let Err(e) = self.storage.delete_media_item(name).await {
            error!(path = %name, error = %e, "failed to roll back media record");
        }
    }

    // ============ Thumbnails ============

    /// Decoded preview of a media item, served from cache when possible.
    ///
    /// Images are decoded from their file; videos use the frame at
    /// [`VIDEO_THUMBNAIL_AT`].
    pub async fn load_thumbnail(
        &self,
        item: &MediaItem,
        token: &CancellationToken,
    ) -> MediaResult<Arc<DynamicImage>> {
        if let Some(hit) = self.cache.get(&item.path) {
            return Ok(hit);
        }
        if token.is_cancelled() {
            return Err(MediaError::Cancelled);
        }

        let path = self.media_path(item);
        let image = match item.kind {
            MediaKind::Image => {
                let bytes = tokio::fs::read(&path)
                    .await
                    .map_err(|e| MediaError::ReadingError(Some(e.into())))?;
                decode_image(bytes).await?
            }
            MediaKind::Video => self
                .frames
                .extract_frame(&path, VIDEO_THUMBNAIL_AT)
                .await
                .map_err(|e| MediaError::ReadingError(Some(e)))?,
        };

        if token.is_cancelled() {
            return Err(MediaError::Cancelled);
        }

        let image = Arc::new(image);
        self.cache.insert(item.path.clone(), Arc::clone(&image));
        debug!(path = %item.path, "cached thumbnail");
        Ok(image)
    }

    pub fn evict_thumbnail(&self, path: &str) {
        self.cache.remove(path);
    }

    // ============ Deletion ============

    /// Delete the record, then its backing file and cached thumbnail.
    ///
    /// Always completes; failures are logged. The file is kept when the
    /// record could not be deleted, so no record loses its file.
    pub async fn delete_media_item(&self, item: &MediaItem) {
        if let Err(e) = self.storage.delete_media_item(&item.path).await {
            error!(path = %item.path, error = %e, "failed to delete media record");
            return;
        }

        self.cache.remove(&item.path);
        match tokio::fs::remove_file(self.media_path(item)).await {
            Ok(()) => debug!(path = %item.path, "deleted media file"),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
            Err(e) => warn!(path = %item.path, error = %e, "failed to delete media file"),
        }
    }

    /// Delete an entry together with every media item it owns.
    pub async fn delete_entry_with_media(&self, entry_id: Uuid) -> MediaResult<()> {
        let owned = self
            .storage
            .list_media_items(&MediaFilter::ByOwner(entry_id))
            .await?;
        for item in &owned {
            self.delete_media_item(item).await;
        }
        self.storage.delete_memory_entry(entry_id).await?;
        info!(entry_id = %entry_id, media = owned.len(), "deleted entry with media");
        Ok(())
    }

    // ============ Maintenance ============

    /// Compare the media directory against the media records.
    ///
    /// A `.partial` file modified within [`PARTIAL_GRACE`] belongs to an
    /// import that may still be running: it is not reported, and neither is
    /// a record whose only file is that partial. Older partials are crash
    /// leftovers and are reported like any other stray file.
    pub async fn find_orphans(&self) -> MediaResult<OrphanReport> {
        let records = self.storage.list_media_items(&MediaFilter::All).await?;

        let mut report = OrphanReport::default();
        let mut in_flight = HashSet::new();
        if self.media_dir.is_dir() {
            for entry in WalkDir::new(&self.media_dir)
                .min_depth(1)
                .max_depth(1)
                .into_iter()
                .filter_map(|e| e.ok())
                .filter(|e| e.file_type().is_file())
            {
                let name = entry.file_name().to_string_lossy();
                if let Some(target) = partial_target(&name) {
                    if is_fresh(&entry) {
                        debug!(path = %name, "skipping in-flight partial file");
                        in_flight.insert(target.to_string());
                        continue;
                    }
                }
                if !records.iter().any(|r| r.path == name) {
                    report.files_without_record.push(entry.path().to_path_buf());
                }
            }
        }
        report.files_without_record.sort();

        report.records_without_file = records
            .into_iter()
            .filter(|r| !in_flight.contains(&r.path) && !self.media_path(r).is_file())
            .collect();

        Ok(report)
    }

    /// Remove orphaned files and records. Returns what was found.
    pub async fn prune_orphans(&self) -> MediaResult<OrphanReport> {
        let report = self.find_orphans().await?;
        for path in &report.files_without_record {
            discard(path).await;
        }
        for item in &report.records_without_file {
            self.storage.delete_media_item(&item.path).await?;
            self.cache.remove(&item.path);
        }
        if !report.is_clean() {
            info!(
                files = report.files_without_record.len(),
                records = report.records_without_file.len(),
                "pruned orphaned media"
            );
        }
        Ok(report)
    }
}

/// `.<name>.partial` → `<name>`.
fn partial_target(file_name: &str) -> Option<&str> {
    file_name
        .strip_prefix('.')?
        .strip_suffix(PARTIAL_SUFFIX)
        .filter(|name| !name.is_empty())
}

fn is_fresh(entry: &walkdir::DirEntry) -> bool {
    let Some(modified) = entry.metadata().ok().and_then(|m| m.modified().ok()) else {
        return false;
    };
    // A timestamp in the future counts as fresh
    modified
        .elapsed()
        .map_or(true, |age| age < PARTIAL_GRACE)
}

async fn discard(path: &Path) {
    match tokio::fs::remove_file(path).await {
        Ok(()) => {}
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
        Err(e) => warn!(path = %path.display(), error = %e, "failed to remove file"),
    }
}

async fn decode_image(bytes: Vec<u8>) -> MediaResult<DynamicImage> {
    tokio::task::spawn_blocking(move || image::load_from_memory(&bytes))
        .await
        .map_err(|e| MediaError::ReadingError(Some(e.into())))?
        .map_err(|e| MediaError::ReadingError(Some(e.into())))
}

fn encode_jpeg(image: &DynamicImage, quality: u8) -> MediaResult<Vec<u8>> {
    let rgb = image.to_rgb8();
    let mut bytes = Vec::new();
    JpegEncoder::new_with_quality(&mut bytes, quality)
        .encode_image(&rgb)
        .map_err(|e| MediaError::ReadingError(Some(e.into())))?;
    Ok(bytes)
}
