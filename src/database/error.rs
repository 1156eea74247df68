//! Error kinds surfaced by the track store

use sqlx::error::ErrorKind;
use thiserror::Error;

pub type Result<T> = std::result::Result<T, StoreError>;

#[derive(Debug, Error)]
pub enum StoreError {
    /// A table with the expected name exists but has a different shape
    #[error("Schema conflict on table `{table}`: {reason}")]
    SchemaConflict { table: String, reason: String },

    #[error("Track `{0}` already exists")]
    DuplicateIdentifier(String),

    #[error("Track `{0}` not found")]
    NotFound(String),

    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    /// A CHECK or NOT NULL constraint rejected the write inside SQLite
    #[error("Constraint violation: {0}")]
    ConstraintViolation(String),

    #[error("Database Error: {0}")]
    Database(#[source] sqlx::Error),

    #[error("IO Error: {0}")]
    Io(#[from] std::io::Error),
}

impl From<sqlx::Error> for StoreError {
    fn from(err: sqlx::Error) -> Self {
        if let sqlx::Error::Database(db_err) = &err {
            match db_err.kind() {
                ErrorKind::CheckViolation | ErrorKind::NotNullViolation => {
                    return StoreError::ConstraintViolation(db_err.message().to_string());
                }
                _ => {}
            }
        }
        StoreError::Database(err)
    }
}

impl StoreError {
    /// Map an insert failure, turning a primary key collision into `DuplicateIdentifier`
    pub(crate) fn from_insert(err: sqlx::Error, uuid: &str) -> Self {
        match &err {
            sqlx::Error::Database(db_err) if db_err.is_unique_violation() => {
                StoreError::DuplicateIdentifier(uuid.to_string())
            }
            _ => err.into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_non_database_errors_pass_through() {
        let err: StoreError = sqlx::Error::RowNotFound.into();
        assert!(matches!(err, StoreError::Database(sqlx::Error::RowNotFound)));

        let err = StoreError::from_insert(sqlx::Error::PoolTimedOut, "t1");
        assert!(matches!(err, StoreError::Database(sqlx::Error::PoolTimedOut)));
    }

    #[test]
    fn test_display() {
        let err = StoreError::SchemaConflict {
            table: "tracks".to_string(),
            reason: "missing column `path`".to_string(),
        };
        assert_eq!(
            err.to_string(),
            "Schema conflict on table `tracks`: missing column `path`"
        );
        assert_eq!(
            StoreError::NotFound("t1".to_string()).to_string(),
            "Track `t1` not found"
        );
    }
}
