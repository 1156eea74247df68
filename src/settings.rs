//! Store settings persistence
//!
//! Handles saving and loading the database location and connection tuning.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// What `delete_track` does when the track does not exist
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum DeletePolicy {
    /// Fail with `NotFound`
    #[default]
    Strict,
    /// Succeed without removing anything
    Lenient,
}

/// Store settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    /// Database file, defaults to the platform data directory
    pub database_path: Option<PathBuf>,
    /// Pool size
    pub max_connections: u32,
    /// How long a writer waits for a locked database before failing
    pub busy_timeout_ms: u64,
    /// Behaviour of deletes that match no track
    pub delete_policy: DeletePolicy,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            database_path: None,
            max_connections: 5,
            busy_timeout_ms: 5_000,
            delete_policy: DeletePolicy::Strict,
        }
    }
}

fn project_dirs() -> Option<directories::ProjectDirs> {
    directories::ProjectDirs::from("com", "track-stats", "TrackStats")
}

impl Settings {
    /// Settings pointing at an explicit database file
    pub fn with_database(path: impl Into<PathBuf>) -> Self {
        Self {
            database_path: Some(path.into()),
            ..Self::default()
        }
    }

    /// Resolve the database file location
    pub fn database_path(&self) -> PathBuf {
        self.database_path.clone().unwrap_or_else(|| {
            project_dirs()
                .map(|dirs| dirs.data_dir().join("tracks.db"))
                .unwrap_or_else(|| PathBuf::from("tracks.db"))
        })
    }

    /// Get the settings file path
    pub fn file_path() -> Option<PathBuf> {
        project_dirs().map(|dirs| dirs.config_dir().join("settings.json"))
    }

    /// Load settings from file, or return defaults if not found
    pub fn load() -> Self {
        let Some(path) = Self::file_path() else {
            return Self::default();
        };
        match Self::load_from_file(&path) {
            Ok(settings) => settings,
            Err(SettingsError::Io(e)) if e.kind() == std::io::ErrorKind::NotFound => {
                Self::default()
            }
            Err(e) => {
                tracing::warn!("Ignoring settings at {}: {}", path.display(), e);
                Self::default()
            }
        }
    }

    /// Load settings from a specific file
    pub fn load_from_file(path: &Path) -> Result<Self, SettingsError> {
        let content = std::fs::read_to_string(path)?;
        Ok(serde_json::from_str(&content)?)
    }

    /// Save settings to the default file
    pub fn save(&self) -> Result<(), SettingsError> {
        let path = Self::file_path().ok_or(SettingsError::NoConfigDir)?;
        self.save_to_file(&path)
    }

    /// Save settings to a specific file
    pub fn save_to_file(&self, path: &Path) -> Result<(), SettingsError> {
        // Ensure parent directory exists
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let content = serde_json::to_string_pretty(self)?;
        std::fs::write(path, content)?;
        Ok(())
    }
}

/// Errors that can occur with settings
#[derive(Debug, Error)]
pub enum SettingsError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("Parse error: {0}")]
    Parse(#[from] serde_json::Error),
    #[error("Could not determine config directory")]
    NoConfigDir,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_round_trip_through_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("settings.json");

        let settings = Settings {
            database_path: Some(PathBuf::from("/var/lib/tracks.db")),
            max_connections: 2,
            busy_timeout_ms: 250,
            delete_policy: DeletePolicy::Lenient,
        };
        settings.save_to_file(&path).unwrap();

        let loaded = Settings::load_from_file(&path).unwrap();
        assert_eq!(loaded, settings);
    }

    #[test]
    fn test_missing_fields_use_defaults() {
        let settings: Settings = serde_json::from_str(r#"{"delete_policy":"lenient"}"#).unwrap();
        assert_eq!(settings.delete_policy, DeletePolicy::Lenient);
        assert_eq!(settings.max_connections, 5);
        assert_eq!(settings.busy_timeout_ms, 5_000);
        assert!(settings.database_path.is_none());
    }

    #[test]
    fn test_malformed_file_is_parse_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("settings.json");
        std::fs::write(&path, "{ not json").unwrap();

        assert!(matches!(
            Settings::load_from_file(&path),
            Err(SettingsError::Parse(_))
        ));
    }

    #[test]
    fn test_explicit_database_path_wins() {
        let settings = Settings::with_database("/tmp/x.db");
        assert_eq!(settings.database_path(), PathBuf::from("/tmp/x.db"));
        assert!(Settings::default().database_path().ends_with("tracks.db"));
    }
}
