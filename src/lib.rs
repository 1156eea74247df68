//! track-stats - durable track identity and play statistics
//!
//! A SQLite store that owns the `tracks` table: one row per track, keyed by a
//! stable identifier, carrying the current file path and non-negative play
//! counters. Scanners register tracks, playback engines report plays, and the
//! store keeps the counters consistent under concurrent callers.
//!
//! ```no_run
//! use track_stats::{Database, Settings};
//!
//! # async fn example() -> track_stats::Result<()> {
//! let db = Database::open(&Settings::load()).await?;
//! db.insert_track("t1", "/music/a.mp3").await?;
//! db.record_play("t1", 3.5).await?;
//! # Ok(())
//! # }
//! ```

pub mod database;
pub mod settings;

pub use database::{Database, DbTrack, Result, StoreError};
pub use settings::{DeletePolicy, Settings};
