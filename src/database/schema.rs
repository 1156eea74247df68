//! Database schema migrations
//!
//! Each step is a timestamped up/down pair. Applied steps are recorded in
//! `schema_migrations`, and `track_init` is the first entry of that history.

use sqlx::{Pool, Sqlite, SqliteConnection};

use super::error::{Result, StoreError};
use super::models::DbMigration;
use super::ops::current_timestamp;

/// A versioned schema step with its reverse
#[derive(Debug, Clone, Copy)]
pub struct Migration {
    pub version: i64,
    pub name: &'static str,
    pub up: &'static str,
    pub down: &'static str,
}

/// All schema steps, ordered by version
pub const MIGRATIONS: &[Migration] = &[Migration {
    version: 20250124082845,
    name: "track_init",
    up: include_str!("../../migrations/20250124082845_track_init.up.sql"),
    down: include_str!("../../migrations/20250124082845_track_init.down.sql"),
}];

const HISTORY_TABLE: &str = r#"
    CREATE TABLE IF NOT EXISTS schema_migrations (
        version    INTEGER PRIMARY KEY NOT NULL,
        name       TEXT NOT NULL,
        applied_at INTEGER NOT NULL
    )
"#;

const TRACKS_TABLE: &str = "tracks";

/// Expected `tracks` columns: name, declared type, NOT NULL, primary key
const TRACK_COLUMNS: &[(&str, &str, bool, bool)] = &[
    ("uuid", "TEXT", true, true),
    ("path", "TEXT", true, false),
    ("play_count", "INTEGER", true, false),
    ("play_minutes", "REAL", true, false),
];

/// Columns that must carry a non-negativity CHECK
const NON_NEGATIVE_COLUMNS: &[&str] = &["play_count", "play_minutes"];

/// Row shape of `pragma_table_info`: name, type, notnull, pk
type ColumnInfo = (String, String, i64, i64);

/// Bring the schema up to the latest step.
/// Returns how many steps were newly recorded; zero means the store was already current.
pub async fn apply_schema(pool: &Pool<Sqlite>) -> Result<usize> {
    let mut tx = pool.begin().await?;

    sqlx::query(HISTORY_TABLE).execute(&mut *tx).await?;

    // Refuse to adopt a foreign `tracks` table before touching anything
    if let Err(reason) = verify_tracks_table(&mut *tx).await? {
        tracing::warn!("Existing tracks table is incompatible: {}", reason);
        tx.rollback().await?;
        return Err(StoreError::SchemaConflict {
            table: TRACKS_TABLE.to_string(),
            reason,
        });
    }

    let mut applied = 0;
    for migration in MIGRATIONS {
        // Up steps are CREATE ... IF NOT EXISTS, so rerunning them is harmless
        sqlx::query(migration.up).execute(&mut *tx).await?;

        let result = sqlx::query(
            "INSERT OR IGNORE INTO schema_migrations (version, name, applied_at) VALUES (?, ?, ?)",
        )
        .bind(migration.version)
        .bind(migration.name)
        .bind(current_timestamp())
        .execute(&mut *tx)
        .await?;

        if result.rows_affected() > 0 {
            tracing::info!(
                "Applied migration {}_{}",
                migration.version,
                migration.name
            );
            applied += 1;
        }
    }

    tx.commit().await?;
    Ok(applied)
}

/// Undo the most recently applied step.
/// Returns the step name, or `None` when no step is recorded.
pub async fn revert_schema(pool: &Pool<Sqlite>) -> Result<Option<String>> {
    let mut tx = pool.begin().await?;

    sqlx::query(HISTORY_TABLE).execute(&mut *tx).await?;

    let last = sqlx::query_as::<_, DbMigration>(
        "SELECT version, name, applied_at FROM schema_migrations ORDER BY version DESC LIMIT 1",
    )
    .fetch_optional(&mut *tx)
    .await?;

    let Some(last) = last else {
        tx.commit().await?;
        return Ok(None);
    };

    let migration = MIGRATIONS
        .iter()
        .find(|m| m.version == last.version)
        .ok_or_else(|| StoreError::SchemaConflict {
            table: "schema_migrations".to_string(),
            reason: format!(
                "applied step {}_{} is unknown to this build",
                last.version, last.name
            ),
        })?;

    sqlx::query(migration.down).execute(&mut *tx).await?;
    sqlx::query("DELETE FROM schema_migrations WHERE version = ?")
        .bind(migration.version)
        .execute(&mut *tx)
        .await?;

    tx.commit().await?;

    tracing::info!(
        "Reverted migration {}_{}",
        migration.version,
        migration.name
    );
    Ok(Some(migration.name.to_string()))
}

/// List applied steps in version order
pub async fn applied_migrations(pool: &Pool<Sqlite>) -> Result<Vec<DbMigration>> {
    let mut conn = pool.acquire().await?;
    if !table_exists(&mut *conn, "schema_migrations").await? {
        return Ok(Vec::new());
    }

    let migrations = sqlx::query_as::<_, DbMigration>(
        "SELECT version, name, applied_at FROM schema_migrations ORDER BY version",
    )
    .fetch_all(&mut *conn)
    .await?;
    Ok(migrations)
}

async fn table_exists(conn: &mut SqliteConnection, name: &str) -> Result<bool> {
    let count: i64 =
        sqlx::query_scalar("SELECT COUNT(*) FROM sqlite_master WHERE type = 'table' AND name = ?")
            .bind(name)
            .fetch_one(&mut *conn)
            .await?;
    Ok(count > 0)
}

/// Inner `Err` carries the reason the existing object cannot be adopted
async fn verify_tracks_table(
    conn: &mut SqliteConnection,
) -> Result<std::result::Result<(), String>> {
    let objects: Vec<(String, Option<String>)> =
        sqlx::query_as("SELECT type, sql FROM sqlite_master WHERE name = ?")
            .bind(TRACKS_TABLE)
            .fetch_all(&mut *conn)
            .await?;

    if let Some((kind, _)) = objects.iter().find(|(kind, _)| kind != "table") {
        return Ok(Err(format!("`{}` exists as a {}, not a table", TRACKS_TABLE, kind)));
    }

    let Some(sql) = objects.into_iter().find_map(|(_, sql)| sql) else {
        return Ok(Ok(()));
    };

    let columns = sqlx::query_as::<_, ColumnInfo>(
        r#"SELECT name, type, "notnull", pk FROM pragma_table_info(?) ORDER BY cid"#,
    )
    .bind(TRACKS_TABLE)
    .fetch_all(&mut *conn)
    .await?;

    Ok(check_track_shape(&columns, &sql))
}

fn check_track_shape(columns: &[ColumnInfo], create_sql: &str) -> std::result::Result<(), String> {
    for (name, ty, not_null, pk) in TRACK_COLUMNS {
        let Some((_, found_ty, found_not_null, found_pk)) =
            columns.iter().find(|(found, ..)| found == name)
        else {
            return Err(format!("missing column `{}`", name));
        };

        if !found_ty.eq_ignore_ascii_case(ty) {
            return Err(format!(
                "column `{}` has type {}, expected {}",
                name, found_ty, ty
            ));
        }
        if (*found_not_null != 0) != *not_null {
            return Err(format!("column `{}` differs in NOT NULL", name));
        }
        if (*found_pk != 0) != *pk {
            return Err(format!("column `{}` differs in PRIMARY KEY", name));
        }
    }

    if let Some((extra, ..)) = columns
        .iter()
        .find(|(found, ..)| !TRACK_COLUMNS.iter().any(|(name, ..)| name == found))
    {
        return Err(format!("unexpected column `{}`", extra));
    }

    let checks = check_constraints(create_sql);
    for column in NON_NEGATIVE_COLUMNS {
        let guarded = checks.iter().any(|(owner, expr)| {
            owner.as_deref().is_none_or(|owner| owner == *column)
                && guards_non_negative(expr, column)
        });
        if !guarded {
            return Err(format!(
                "column `{}` lacks CHECK ({} >= 0)",
                column, column
            ));
        }
    }

    Ok(())
}

fn strip_comments(sql: &str) -> String {
    let mut out = String::with_capacity(sql.len());
    let mut rest = sql;
    while !rest.is_empty() {
        if let Some(after) = rest.strip_prefix("--") {
            rest = after.find('\n').map_or("", |end| &after[end..]);
        } else if let Some(after) = rest.strip_prefix("/*") {
            rest = after.find("*/").map_or("", |end| &after[end + 2..]);
            out.push(' ');
        } else if rest.starts_with('\'') {
            // Keep string literals whole so `--` inside them survives
            let end = rest[1..].find('\'').map_or(rest.len(), |i| i + 2);
            out.push_str(&rest[..end]);
            rest = &rest[end..];
        } else {
            let ch = rest.chars().next().unwrap_or_default();
            out.push(ch);
            rest = &rest[ch.len_utf8()..];
        }
    }
    out
}

/// Top-level comma separated definitions inside the outer parentheses
fn table_definitions(sql: &str) -> Vec<String> {
    let mut definitions = Vec::new();
    let mut depth = 0usize;
    let mut current = String::new();
    for ch in sql.chars() {
        match ch {
            '(' => {
                depth += 1;
                if depth == 1 {
                    continue;
                }
            }
            ')' => {
                depth = depth.saturating_sub(1);
                if depth == 0 {
                    definitions.push(std::mem::take(&mut current));
                    break;
                }
            }
            ',' if depth == 1 => {
                definitions.push(std::mem::take(&mut current));
                continue;
            }
            _ => {}
        }
        if depth >= 1 {
            current.push(ch);
        }
    }
    definitions
}

/// Body of the parenthesized group starting at `open`
fn balanced_group(text: &str, open: usize) -> Option<&str> {
    let mut depth = 0usize;
    for (i, ch) in text[open..].char_indices() {
        match ch {
            '(' => depth += 1,
            ')' => {
                depth -= 1;
                if depth == 0 {
                    return Some(&text[open + 1..open + i]);
                }
            }
            _ => {}
        }
    }
    None
}

fn unquote(ident: &str) -> &str {
    ident.trim_matches(|c| matches!(c, '"' | '`' | '[' | ']'))
}

/// CHECK expressions with whitespace removed, keyed by owning column
/// (`None` for table constraints)
fn check_constraints(create_sql: &str) -> Vec<(Option<String>, String)> {
    let sql = strip_comments(create_sql).to_ascii_lowercase();
    let mut checks = Vec::new();

    for definition in table_definitions(&sql) {
        let definition = definition.trim();
        let first = definition
            .split(|c: char| c.is_whitespace() || c == '(')
            .next()
            .unwrap_or_default();
        let owner = match first {
            "check" | "constraint" | "primary" | "unique" | "foreign" => None,
            name => Some(unquote(name).to_string()),
        };

        let mut search = 0;
        while let Some(found) = definition[search..].find("check") {
            let start = search + found + "check".len();
            search = start;
            let Some(open) = definition[start..]
                .find(|c: char| !c.is_whitespace())
                .map(|i| start + i)
                .filter(|&i| definition[i..].starts_with('('))
            else {
                continue;
            };
            if let Some(body) = balanced_group(definition, open) {
                let expr: String = body.chars().filter(|c| !c.is_whitespace()).collect();
                checks.push((owner.clone(), expr));
            }
        }
    }

    checks
}

/// Whether `expr` states `column >= 0` in one of its equivalent spellings
fn guards_non_negative(expr: &str, column: &str) -> bool {
    let mut expr = expr;
    while let Some(inner) = expr.strip_prefix('(').and_then(|e| e.strip_suffix(')')) {
        expr = inner;
    }
    let is_zero = |text: &str| text.parse::<f64>().is_ok_and(|v| v == 0.0);

    if let Some((lhs, rhs)) = expr.split_once(">=") {
        return unquote(lhs) == column && is_zero(rhs);
    }
    if let Some((lhs, rhs)) = expr.split_once("<=") {
        return is_zero(lhs) && unquote(rhs) == column;
    }
    false
}

#[cfg(test)]
mod tests {
    use super::*;

    fn expected_columns() -> Vec<ColumnInfo> {
        TRACK_COLUMNS
            .iter()
            .map(|(name, ty, not_null, pk)| {
                (name.to_string(), ty.to_string(), *not_null as i64, *pk as i64)
            })
            .collect()
    }

    #[test]
    fn test_shape_matches_own_migration() {
        assert_eq!(check_track_shape(&expected_columns(), MIGRATIONS[0].up), Ok(()));
    }

    #[test]
    fn test_shape_type_is_case_insensitive() {
        let mut columns = expected_columns();
        columns[3].1 = "real".to_string();
        assert!(check_track_shape(&columns, MIGRATIONS[0].up).is_ok());
    }

    #[test]
    fn test_shape_rejects_wrong_type() {
        let mut columns = expected_columns();
        columns[2].1 = "TEXT".to_string();
        let reason = check_track_shape(&columns, MIGRATIONS[0].up).unwrap_err();
        assert!(reason.contains("play_count"));
    }

    #[test]
    fn test_shape_rejects_missing_and_extra_columns() {
        let mut columns = expected_columns();
        columns.pop();
        assert!(check_track_shape(&columns, MIGRATIONS[0].up).is_err());

        let mut columns = expected_columns();
        columns.push(("rating".to_string(), "INTEGER".to_string(), 0, 0));
        let reason = check_track_shape(&columns, MIGRATIONS[0].up).unwrap_err();
        assert!(reason.contains("rating"));
    }

    #[test]
    fn test_shape_requires_check_constraints() {
        let sql = "CREATE TABLE tracks (uuid TEXT PRIMARY KEY NOT NULL, path TEXT NOT NULL, \
                   play_count INTEGER NOT NULL, play_minutes REAL NOT NULL)";
        let reason = check_track_shape(&expected_columns(), sql).unwrap_err();
        assert!(reason.contains("play_count"));
    }

    #[test]
    fn test_shape_accepts_equivalent_checks() {
        let sql = "CREATE TABLE tracks (uuid TEXT PRIMARY KEY NOT NULL, path TEXT NOT NULL, \
                   play_count INTEGER NOT NULL CHECK ( (play_count >= 0.0) ), \
                   play_minutes REAL NOT NULL, \
                   CONSTRAINT minutes_positive CHECK (0 <= \"play_minutes\"))";
        assert_eq!(check_track_shape(&expected_columns(), sql), Ok(()));
    }

    #[test]
    fn test_shape_ignores_checks_in_comments() {
        let sql = "CREATE TABLE tracks (uuid TEXT PRIMARY KEY NOT NULL, path TEXT NOT NULL, \
                   play_count INTEGER NOT NULL CHECK (play_count >= 0), \
                   -- CHECK (play_minutes >= 0.0)\n\
                   play_minutes REAL NOT NULL /* CHECK (play_minutes >= 0.0) */)";
        let reason = check_track_shape(&expected_columns(), sql).unwrap_err();
        assert!(reason.contains("play_minutes"));
    }

    #[test]
    fn test_shape_rejects_check_on_wrong_column() {
        let sql = "CREATE TABLE tracks (uuid TEXT PRIMARY KEY NOT NULL, path TEXT NOT NULL, \
                   play_count INTEGER NOT NULL CHECK (play_minutes >= 0.0), \
                   play_minutes REAL NOT NULL CHECK (play_minutes >= 0.0))";
        let reason = check_track_shape(&expected_columns(), sql).unwrap_err();
        assert!(reason.contains("play_count"));
    }

    #[test]
    fn test_non_negative_spellings() {
        assert!(guards_non_negative("play_count>=0", "play_count"));
        assert!(guards_non_negative("((play_count>=0.0))", "play_count"));
        assert!(guards_non_negative("0.0<=play_minutes", "play_minutes"));
        assert!(!guards_non_negative("play_count>=1", "play_count"));
        assert!(!guards_non_negative("play_count>0", "play_count"));
        assert!(!guards_non_negative("play_count>=0orplay_count<0", "play_count"));
    }

    #[test]
    fn test_migrations_are_ordered_and_paired() {
        assert!(MIGRATIONS.windows(2).all(|w| w[0].version < w[1].version));
        for migration in MIGRATIONS {
            assert!(migration.up.contains("IF NOT EXISTS"));
            assert!(migration.down.contains("DROP TABLE IF EXISTS"));
        }
    }
}
