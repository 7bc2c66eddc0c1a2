//! Service wiring for CLI commands.
//!
//! [`App::open`] connects to the configured database and builds the
//! storage service and media worker on top of it. Every collaborator is
//! passed in through constructors; there is no global registry.

use std::sync::Arc;

use anyhow::Result;
use sqlx::SqlitePool;

use crate::config::Config;
use crate::db;
use crate::geocode;
use crate::media::{FfmpegFrameExtractor, MediaFileWorker};
use crate::sqlite_store::SqliteStore;
use crate::storage::StorageService;
use crate::wikipedia::WikipediaService;

pub struct App {
    pool: SqlitePool,
    pub storage: StorageService,
    pub media: MediaFileWorker,
}

impl App {
    /// Connect to the database and build the services. The schema must
    /// already exist (`geomem init`).
    pub async fn open(config: &Config) -> Result<Self> {
        let pool = db::connect(config).await?;
        Ok(Self::with_pool(config, pool))
    }

    pub fn with_pool(config: &Config, pool: SqlitePool) -> Self {
        let storage = StorageService::new(Arc::new(SqliteStore::new(pool.clone())));
        let frames = Arc::new(FfmpegFrameExtractor::new(config.media.ffmpeg_path.clone()));
        let media = MediaFileWorker::from_config(storage.clone(), &config.media, frames);
        Self {
            pool,
            storage,
            media,
        }
    }

    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    pub async fn close(self) {
        self.pool.close().await;
    }
}

/// Build the Wikipedia service with the configured reverse geocoder.
pub fn wikipedia_service(config: &Config) -> Result<WikipediaService> {
    let geocoder = geocode::create_geocoder(&config.geocoder)?;
    WikipediaService::new(geocoder, &config.wikipedia)
}
