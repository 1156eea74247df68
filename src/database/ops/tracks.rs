//! Track CRUD and play statistics operations

use sqlx::{Pool, Sqlite, SqliteConnection};

use crate::database::{DbTrack, Result, StoreError};
use crate::settings::DeletePolicy;

fn require_non_empty(field: &str, value: &str) -> Result<()> {
    if value.is_empty() {
        return Err(StoreError::InvalidArgument(format!("{} must not be empty", field)));
    }
    Ok(())
}

/// Register a new track with zeroed statistics
pub async fn insert_track(pool: &Pool<Sqlite>, uuid: &str, path: &str) -> Result<DbTrack> {
    let mut conn = pool.acquire().await?;
    insert_track_tx(&mut *conn, uuid, path).await
}

/// Register a new track (transaction version for batch operations)
pub async fn insert_track_tx(
    conn: &mut SqliteConnection,
    uuid: &str,
    path: &str,
) -> Result<DbTrack> {
    require_non_empty("uuid", uuid)?;
    require_non_empty("path", path)?;

    let track = sqlx::query_as::<_, DbTrack>(
        r#"
        INSERT INTO tracks (uuid, path, play_count, play_minutes)
        VALUES (?, ?, 0, 0.0)
        RETURNING uuid, path, play_count, play_minutes
        "#,
    )
    .bind(uuid)
    .bind(path)
    .fetch_all(&mut *conn)
    .await
    .map_err(|e| StoreError::from_insert(e, uuid))?
    .pop()
    .ok_or(sqlx::Error::RowNotFound)?;

    tracing::debug!("Inserted track {} at {}", uuid, path);
    Ok(track)
}

/// Count one play and add its duration in a single UPDATE.
/// A play that would overflow the total is rejected.
pub async fn record_play(pool: &Pool<Sqlite>, uuid: &str, minutes_played: f64) -> Result<DbTrack> {
    if !minutes_played.is_finite() || minutes_played < 0.0 {
        return Err(StoreError::InvalidArgument(format!(
            "minutes played must be a non-negative number, got {}",
            minutes_played
        )));
    }

    let track = sqlx::query_as::<_, DbTrack>(
        r#"
        UPDATE tracks SET
            play_count = play_count + 1,
            play_minutes = play_minutes + ?
        WHERE uuid = ? AND play_minutes + ? < 9e999
        RETURNING uuid, path, play_count, play_minutes
        "#,
    )
    .bind(minutes_played)
    .bind(uuid)
    .bind(minutes_played)
    .fetch_all(pool)
    .await?
    .pop();

    // 9e999 is SQLite's infinity, so an unmatched existing row means overflow
    let Some(track) = track else {
        return match get_track(pool, uuid).await? {
            Some(_) => Err(StoreError::InvalidArgument(format!(
                "adding {} minutes to track {} would overflow its total",
                minutes_played, uuid
            ))),
            None => Err(StoreError::NotFound(uuid.to_string())),
        };
    };

    tracing::debug!(
        "Recorded play of {} ({:.2} min), now {} plays / {:.2} min",
        uuid,
        minutes_played,
        track.play_count,
        track.play_minutes
    );
    Ok(track)
}

/// Update track file path (for handling moves and renames)
pub async fn update_path(pool: &Pool<Sqlite>, uuid: &str, new_path: &str) -> Result<()> {
    require_non_empty("path", new_path)?;

    let result = sqlx::query("UPDATE tracks SET path = ? WHERE uuid = ?")
        .bind(new_path)
        .bind(uuid)
        .execute(pool)
        .await?;

    if result.rows_affected() == 0 {
        return Err(StoreError::NotFound(uuid.to_string()));
    }

    tracing::debug!("Moved track {} to {}", uuid, new_path);
    Ok(())
}

/// Delete track and its statistics.
/// Returns whether a row was removed; a missing track is an error only under the strict policy.
pub async fn delete_track(pool: &Pool<Sqlite>, uuid: &str, policy: DeletePolicy) -> Result<bool> {
    let result = sqlx::query("DELETE FROM tracks WHERE uuid = ?")
        .bind(uuid)
        .execute(pool)
        .await?;

    if result.rows_affected() > 0 {
        tracing::debug!("Deleted track {}", uuid);
        return Ok(true);
    }

    match policy {
        DeletePolicy::Strict => Err(StoreError::NotFound(uuid.to_string())),
        DeletePolicy::Lenient => {
            tracing::warn!("Delete of unknown track {} ignored", uuid);
            Ok(false)
        }
    }
}

/// Administrative reset of both counters
pub async fn reset_play_stats(pool: &Pool<Sqlite>, uuid: &str) -> Result<()> {
    let result =
        sqlx::query("UPDATE tracks SET play_count = 0, play_minutes = 0.0 WHERE uuid = ?")
            .bind(uuid)
            .execute(pool)
            .await?;

    if result.rows_affected() == 0 {
        return Err(StoreError::NotFound(uuid.to_string()));
    }

    tracing::info!("Reset play statistics of track {}", uuid);
    Ok(())
}

/// Get track by uuid
pub async fn get_track(pool: &Pool<Sqlite>, uuid: &str) -> Result<Option<DbTrack>> {
    let track = sqlx::query_as::<_, DbTrack>(
        "SELECT uuid, path, play_count, play_minutes FROM tracks WHERE uuid = ?",
    )
    .bind(uuid)
    .fetch_optional(pool)
    .await?;
    Ok(track)
}

/// Get track by file path
pub async fn get_track_by_path(pool: &Pool<Sqlite>, path: &str) -> Result<Option<DbTrack>> {
    let track = sqlx::query_as::<_, DbTrack>(
        "SELECT uuid, path, play_count, play_minutes FROM tracks WHERE path = ? LIMIT 1",
    )
    .bind(path)
    .fetch_optional(pool)
    .await?;
    Ok(track)
}

/// Get all tracks
pub async fn get_all_tracks(pool: &Pool<Sqlite>) -> Result<Vec<DbTrack>> {
    let tracks = sqlx::query_as::<_, DbTrack>(
        "SELECT uuid, path, play_count, play_minutes FROM tracks ORDER BY path, uuid",
    )
    .fetch_all(pool)
    .await?;
    Ok(tracks)
}
