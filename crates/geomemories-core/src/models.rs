//! Core data models: memory entries, their media items, and coordinates.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// A WGS84 coordinate in decimal degrees.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Coordinate {
    pub latitude: f64,
    pub longitude: f64,
}

impl Coordinate {
    pub fn new(latitude: f64, longitude: f64) -> Self {
        Self {
            latitude,
            longitude,
        }
    }
}

impl std::fmt::Display for Coordinate {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{:.6}, {:.6}", self.latitude, self.longitude)
    }
}

/// Kind of a media item. Stored as an integer (`0` image, `1` video).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MediaKind {
    Image,
    Video,
}

impl MediaKind {
    pub fn as_i64(self) -> i64 {
        match self {
            MediaKind::Image => 0,
            MediaKind::Video => 1,
        }
    }

    /// Decode a stored kind. Any value other than `0` or `1` is rejected.
    pub fn from_i64(raw: i64) -> anyhow::Result<Self> {
        match raw {
            0 => Ok(MediaKind::Image),
            1 => Ok(MediaKind::Video),
            other => anyhow::bail!("unknown media kind: {}", other),
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            MediaKind::Image => "image",
            MediaKind::Video => "video",
        }
    }
}

/// An image or video file stored in the media directory.
///
/// `id` is the surrogate primary key. `path` is the bare file name of the
/// backing file inside the media directory and doubles as the unique
/// lookup key for path-addressed operations.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MediaItem {
    pub id: Uuid,
    pub path: String,
    pub kind: MediaKind,
    /// Owning memory entry. `None` until the item is linked.
    pub owner_id: Option<Uuid>,
    pub created_at: i64,
}

impl MediaItem {
    pub fn new(kind: MediaKind, path: impl Into<String>, owner_id: Option<Uuid>) -> Self {
        Self {
            id: Uuid::new_v4(),
            path: path.into(),
            kind,
            owner_id,
            created_at: chrono::Utc::now().timestamp(),
        }
    }
}

/// A geotagged memory with its owned media.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MemoryEntry {
    pub id: Uuid,
    pub title: String,
    #[serde(default)]
    pub description: String,
    pub coordinate: Coordinate,
    /// Owned media, ordered by path.
    #[serde(default)]
    pub media: Vec<MediaItem>,
    pub created_at: i64,
    pub updated_at: i64,
}

impl MemoryEntry {
    /// Paths of the owned media, used as the association set on writes.
    pub fn media_paths(&self) -> Vec<String> {
        self.media.iter().map(|m| m.path.clone()).collect()
    }
}

/// Fields supplied by the user when creating a memory entry.
#[derive(Debug, Clone)]
pub struct EntryDraft {
    pub title: String,
    pub description: String,
    pub coordinate: Coordinate,
    /// Paths of already-imported media items to link to the new entry.
    pub media: Vec<String>,
}

impl EntryDraft {
    pub fn new(title: impl Into<String>, coordinate: Coordinate) -> Self {
        Self {
            title: title.into(),
            description: String::new(),
            coordinate,
            media: Vec::new(),
        }
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }

    pub fn with_media(mut self, media: Vec<String>) -> Self {
        self.media = media;
        self
    }

    /// Materialize the draft into an entry with a fresh identifier.
    ///
    /// The entry itself carries no media; the draft's paths travel next to
    /// it and are resolved by the store when the entry is committed.
    pub fn into_new_entry(self) -> NewEntry {
        let now = chrono::Utc::now().timestamp();
        NewEntry {
            entry: MemoryEntry {
                id: Uuid::new_v4(),
                title: self.title,
                description: self.description,
                coordinate: self.coordinate,
                media: Vec::new(),
                created_at: now,
                updated_at: now,
            },
            media_paths: self.media,
        }
    }
}

/// An entry to insert and the paths of the existing media items to link
/// to it.
#[derive(Debug, Clone)]
pub struct NewEntry {
    pub entry: MemoryEntry,
    pub media_paths: Vec<String>,
}

impl NewEntry {
    /// Re-insert a stored snapshot (e.g. from an export), relinking its
    /// media by path.
    pub fn from_snapshot(mut entry: MemoryEntry) -> Self {
        let media_paths = entry.media_paths();
        entry.media.clear();
        Self { entry, media_paths }
    }
}
