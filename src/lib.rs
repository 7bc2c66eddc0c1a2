//! # GeoMemories
//!
//! A local-first journal of geotagged memories. Each memory entry carries a
//! title, a description and a coordinate, and owns any number of imported
//! photos and videos. Location descriptions are pulled from Wikipedia.
//!
//! ## Architecture
//!
//! ```text
//! ┌──────────────┐   ┌────────────────┐   ┌──────────┐
//! │ MediaFile    │──▶│ StorageService │──▶│  Store   │
//! │ Worker       │   │ (validation)   │   │ SQLite / │
//! │ files+thumbs │   └────────────────┘   │ memory   │
//! └──────────────┘                        └──────────┘
//!
//! ┌──────────────┐   ┌────────────────┐
//! │ Wikipedia    │──▶│ ReverseGeocoder│
//! │ Service      │   │ (Nominatim)    │
//! └──────────────┘   └────────────────┘
//! ```
//!
//! Records live in SQLite; media files live flat in the media directory and
//! are referenced by bare file name.
//!
//! ## Modules
//!
//! | Module | Purpose |
//! |--------|---------|
//! | [`config`] | TOML configuration parsing |
//! | [`db`] | Database connection |
//! | [`migrate`] | Schema creation |
//! | [`sqlite_store`] | SQLite [`Store`](geomemories_core::store::Store) backend |
//! | [`storage`] | Validated CRUD over entries and media records |
//! | [`media`] | Import pipeline, thumbnails, media deletion |
//! | [`geocode`] | Reverse geocoding |
//! | [`wikipedia`] | Location descriptions |
//! | [`app`] | Service wiring for the CLI |
//! | [`logging`] | `tracing` subscriber setup |

pub mod app;
pub mod config;
pub mod db;
pub mod describe_cmd;
pub mod entries;
pub mod export;
pub mod geocode;
pub mod logging;
pub mod media;
pub mod media_cmd;
pub mod migrate;
pub mod sqlite_store;
pub mod stats;
pub mod storage;
pub mod wikipedia;
