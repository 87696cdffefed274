use chrono::{DateTime, Utc};
use thiserror::Error;

use crate::watcher::DeliveryItem;

// ============================================================================
// Error Types
// ============================================================================

/// Database-specific errors with user-friendly messages
#[derive(Debug, Error)]
pub enum DatabaseError {
    /// Another feedwatch process has locked the database
    #[error("Another instance of feedwatch appears to be running. Please stop it and try again.")]
    InstanceLocked,

    /// Migration failed
    #[error("Database migration failed: {0}")]
    Migration(String),

    /// Generic database error
    #[error("Database error: {0}")]
    Other(#[from] sqlx::Error),
}

impl DatabaseError {
    /// Classify a sqlx error, mapping lock conditions to `InstanceLocked`.
    pub(crate) fn from_sqlx(err: sqlx::Error) -> Self {
        let error_string = err.to_string().to_lowercase();

        // SQLITE_BUSY (5), SQLITE_LOCKED (6), SQLITE_CANTOPEN (14)
        if error_string.contains("database is locked")
            || error_string.contains("database table is locked")
            || error_string.contains("sqlite_busy")
            || error_string.contains("sqlite_locked")
            || error_string.contains("unable to open database file")
        {
            return DatabaseError::InstanceLocked;
        }

        DatabaseError::Other(err)
    }
}

// ============================================================================
// History
// ============================================================================

/// Outcome recorded for a delivery attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum HistoryKind {
    /// Torrent file saved. Counts toward dedup.
    Downloaded,
    /// Download failed. Kept for inspection; the item is retried next tick.
    Failed,
}

impl HistoryKind {
    pub fn as_str(self) -> &'static str {
        match self {
            HistoryKind::Downloaded => "downloaded",
            HistoryKind::Failed => "failed",
        }
    }

    pub(crate) fn parse(s: &str) -> Option<Self> {
        match s {
            "downloaded" => Some(HistoryKind::Downloaded),
            "failed" => Some(HistoryKind::Failed),
            _ => None,
        }
    }
}

/// A history row waiting to be appended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewHistoryEntry {
    pub owner: String,
    pub title: String,
    pub page: Option<String>,
    pub identifier: String,
    pub kind: HistoryKind,
}

impl NewHistoryEntry {
    pub fn from_delivery(item: &DeliveryItem, kind: HistoryKind) -> Self {
        Self {
            owner: item.owner.clone(),
            title: item.item.title.clone(),
            page: item.item.meta.page.clone(),
            identifier: item.item.identifier.clone(),
            kind,
        }
    }
}

/// A stored history row.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HistoryEntry {
    pub id: i64,
    pub owner: String,
    pub title: String,
    pub page: Option<String>,
    pub identifier: String,
    pub kind: HistoryKind,
    pub recorded_at: DateTime<Utc>,
}

/// Row counts per history kind.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct HistoryCounts {
    pub downloaded: i64,
    pub failed: i64,
}
