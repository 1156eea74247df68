//! Database models for persistent storage
//! These models map directly to SQLite tables

use serde::{Deserialize, Serialize};
use sqlx::FromRow;

/// Track identity and play statistics stored in database
#[derive(Debug, Clone, PartialEq, FromRow, Serialize, Deserialize)]
pub struct DbTrack {
    /// Stable identifier, independent of the file location
    pub uuid: String,
    /// File path on disk
    pub path: String,
    /// Number of counted plays
    pub play_count: i64,
    /// Cumulative play time in minutes
    pub play_minutes: f64,
}

/// Applied migration step, one row per version
#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct DbMigration {
    pub version: i64,
    pub name: String,
    /// Unix timestamp when the step was applied
    pub applied_at: i64,
}

/// Outcome of reconciling the table against a scanned path set
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SyncReport {
    /// Rows created for paths that had no track yet
    pub inserted: Vec<DbTrack>,
    /// Number of rows removed because their path vanished
    pub removed: u64,
}
