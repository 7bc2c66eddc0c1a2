//! Fetch and delete predicates for the two record kinds.
//!
//! Every store backend addresses records through these filters: the SQLite
//! backend renders them with [`EntryFilter::sql`] / [`MediaFilter::sql`],
//! the in-memory backend evaluates them with `matches`.

use uuid::Uuid;

use crate::models::{MediaItem, MemoryEntry};

/// A rendered SQL `WHERE` fragment with at most one bound parameter.
#[derive(Debug, Clone, PartialEq)]
pub struct SqlPredicate {
    pub clause: &'static str,
    pub bind: Option<String>,
}

/// Selects memory entries.
#[derive(Debug, Clone, PartialEq)]
pub enum EntryFilter {
    All,
    ById(Uuid),
}

impl EntryFilter {
    pub fn sql(&self) -> SqlPredicate {
        match self {
            EntryFilter::All => SqlPredicate {
                clause: "1 = 1",
                bind: None,
            },
            EntryFilter::ById(id) => SqlPredicate {
                clause: "id = ?",
                bind: Some(id.to_string()),
            },
        }
    }

    pub fn matches(&self, entry: &MemoryEntry) -> bool {
        match self {
            EntryFilter::All => true,
            EntryFilter::ById(id) => entry.id == *id,
        }
    }
}

/// Selects media items.
#[derive(Debug, Clone, PartialEq)]
pub enum MediaFilter {
    All,
    ByPath(String),
    ByOwner(Uuid),
    /// Items not linked to any entry yet.
    Unlinked,
}

impl MediaFilter {
    pub fn sql(&self) -> SqlPredicate {
        match self {
            MediaFilter::All => SqlPredicate {
                clause: "1 = 1",
                bind: None,
            },
            MediaFilter::ByPath(path) => SqlPredicate {
                clause: "path = ?",
                bind: Some(path.clone()),
            },
            MediaFilter::ByOwner(owner) => SqlPredicate {
                clause: "owner_id = ?",
                bind: Some(owner.to_string()),
            },
            MediaFilter::Unlinked => SqlPredicate {
                clause: "owner_id IS NULL",
                bind: None,
            },
        }
    }

    pub fn matches(&self, item: &MediaItem) -> bool {
        match self {
            MediaFilter::All => true,
            MediaFilter::ByPath(path) => item.path == *path,
            MediaFilter::ByOwner(owner) => item.owner_id == Some(*owner),
            MediaFilter::Unlinked => item.owner_id.is_none(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::MediaKind;

    #[test]
    fn test_entry_filter_sql() {
        let id = Uuid::new_v4();
        let p = EntryFilter::ById(id).sql();
        assert_eq!(p.clause, "id = ?");
        assert_eq!(p.bind, Some(id.to_string()));
        assert_eq!(EntryFilter::All.sql().bind, None);
    }

    #[test]
    fn test_media_filter_matches() {
        let owner = Uuid::new_v4();
        let linked = MediaItem::new(MediaKind::Image, "a.jpg", Some(owner));
        let loose = MediaItem::new(MediaKind::Video, "b.mov", None);

        assert!(MediaFilter::ByPath("a.jpg".into()).matches(&linked));
        assert!(!MediaFilter::ByPath("a.jpg".into()).matches(&loose));
        assert!(MediaFilter::ByOwner(owner).matches(&linked));
        assert!(!MediaFilter::ByOwner(owner).matches(&loose));
        assert!(MediaFilter::Unlinked.matches(&loose));
        assert!(MediaFilter::All.matches(&linked));
    }
}
