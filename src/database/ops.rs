//! Database operations organized by concern

mod sync;
mod tracks;

pub use sync::*;
pub use tracks::*;

use std::time::{SystemTime, UNIX_EPOCH};

use uuid::Uuid;

/// Get current Unix timestamp
pub fn current_timestamp() -> i64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs() as i64)
        .unwrap_or_default()
}

/// Generate a fresh identifier for a newly discovered track
pub fn new_track_id() -> String {
    Uuid::new_v4().to_string()
}
