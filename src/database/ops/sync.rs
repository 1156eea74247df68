//! Reconcile stored tracks against the set of paths a scanner currently sees

use std::collections::HashSet;
use std::path::PathBuf;

use sqlx::{Pool, Sqlite};

use super::{insert_track_tx, new_track_id};
use crate::database::{Result, StoreError, SyncReport};

/// Make the table mirror `paths`: vanished paths lose their rows, unknown paths
/// get new rows, and surviving rows keep their identity and statistics.
/// Runs in one transaction.
pub async fn sync_paths(pool: &Pool<Sqlite>, paths: &[PathBuf]) -> Result<SyncReport> {
    let paths = paths
        .iter()
        .map(|p| {
            p.to_str()
                .filter(|s| !s.is_empty())
                .ok_or_else(|| {
                    StoreError::InvalidArgument(format!("unusable track path {:?}", p))
                })
        })
        .collect::<Result<Vec<&str>>>()?;

    // Bound as one JSON array instead of splicing paths into the statement
    let wanted = serde_json::to_string(&paths)
        .map_err(|e| StoreError::InvalidArgument(e.to_string()))?;

    let mut tx = pool.begin().await?;

    // Write first so the transaction holds the write lock from the start
    let removed = sqlx::query(
        "DELETE FROM tracks WHERE path NOT IN (SELECT value FROM json_each(?))",
    )
    .bind(&wanted)
    .execute(&mut *tx)
    .await?
    .rows_affected();

    let mut known: HashSet<String> = sqlx::query_scalar::<_, String>("SELECT path FROM tracks")
        .fetch_all(&mut *tx)
        .await?
        .into_iter()
        .collect();

    let mut inserted = Vec::new();
    for path in paths {
        if !known.insert(path.to_string()) {
            continue;
        }
        let track = insert_track_tx(&mut *tx, &new_track_id(), path).await?;
        inserted.push(track);
    }

    tx.commit().await?;

    tracing::info!(
        "Synced tracks: {} inserted, {} removed",
        inserted.len(),
        removed
    );
    Ok(SyncReport { inserted, removed })
}
