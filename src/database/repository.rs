//! Database repository - main entry point
//! Delegates to ops modules for actual operations

use std::path::{Path, PathBuf};
use std::time::Duration;

use sqlx::sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePoolOptions, SqliteSynchronous};
use sqlx::{Pool, Sqlite};

use super::{DbMigration, DbTrack, Result, SyncReport, ops, schema};
use crate::settings::{DeletePolicy, Settings};

/// Database connection pool wrapper
#[derive(Debug)]
pub struct Database {
    pool: Pool<Sqlite>,
    delete_policy: DeletePolicy,
}

impl Database {
    /// Create and initialize database at the given path with default settings
    pub async fn new(db_path: &Path) -> Result<Self> {
        Self::open(&Settings::with_database(db_path)).await
    }

    /// Connect and bring the schema up to date
    pub async fn open(settings: &Settings) -> Result<Self> {
        let db = Self::connect(settings).await?;
        db.apply_schema().await?;
        Ok(db)
    }

    /// Connect without touching the schema
    pub async fn connect(settings: &Settings) -> Result<Self> {
        let db_path = settings.database_path();

        // Ensure parent directory exists
        if let Some(parent) = db_path.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }

        // WAL keeps readers unblocked while a play is being recorded;
        // the busy timeout makes concurrent writers queue instead of failing
        let options = SqliteConnectOptions::new()
            .filename(&db_path)
            .create_if_missing(true)
            .journal_mode(SqliteJournalMode::Wal)
            .synchronous(SqliteSynchronous::Normal)
            .busy_timeout(Duration::from_millis(settings.busy_timeout_ms))
            .pragma("cache_size", "-32000");

        let pool = SqlitePoolOptions::new()
            .max_connections(settings.max_connections.max(1))
            .connect_with(options)
            .await?;

        tracing::info!("Opened track database at: {}", db_path.display());

        Ok(Self {
            pool,
            delete_policy: settings.delete_policy,
        })
    }

    /// Underlying pool, for collaborators that run their own queries
    pub fn pool(&self) -> &Pool<Sqlite> {
        &self.pool
    }

    pub fn delete_policy(&self) -> DeletePolicy {
        self.delete_policy
    }

    pub async fn close(&self) {
        self.pool.close().await;
    }

    // ============ Schema Operations ============

    /// Create the `tracks` table if needed; safe to call repeatedly
    pub async fn apply_schema(&self) -> Result<usize> {
        schema::apply_schema(&self.pool).await
    }

    pub async fn revert_schema(&self) -> Result<Option<String>> {
        schema::revert_schema(&self.pool).await
    }

    pub async fn applied_migrations(&self) -> Result<Vec<DbMigration>> {
        schema::applied_migrations(&self.pool).await
    }

    // ============ Track Operations ============

    pub async fn insert_track(&self, uuid: &str, path: &str) -> Result<DbTrack> {
        ops::insert_track(&self.pool, uuid, path).await
    }

    pub async fn record_play(&self, uuid: &str, minutes_played: f64) -> Result<DbTrack> {
        ops::record_play(&self.pool, uuid, minutes_played).await
    }

    pub async fn update_path(&self, uuid: &str, new_path: &str) -> Result<()> {
        ops::update_path(&self.pool, uuid, new_path).await
    }

    pub async fn delete_track(&self, uuid: &str) -> Result<bool> {
        ops::delete_track(&self.pool, uuid, self.delete_policy).await
    }

    pub async fn reset_play_stats(&self, uuid: &str) -> Result<()> {
        ops::reset_play_stats(&self.pool, uuid).await
    }

    pub async fn get_track(&self, uuid: &str) -> Result<Option<DbTrack>> {
        ops::get_track(&self.pool, uuid).await
    }

    pub async fn get_track_by_path(&self, path: &str) -> Result<Option<DbTrack>> {
        ops::get_track_by_path(&self.pool, path).await
    }

    pub async fn get_all_tracks(&self) -> Result<Vec<DbTrack>> {
        ops::get_all_tracks(&self.pool).await
    }

    // ============ Library Sync ============

    pub async fn sync_paths(&self, paths: &[PathBuf]) -> Result<SyncReport> {
        ops::sync_paths(&self.pool, paths).await
    }
}
