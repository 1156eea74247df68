//! Database module for persistent storage
//! Uses SQLite via sqlx for storing track identity and play statistics

mod error;
mod models;
mod ops;
mod repository;
mod schema;

pub use error::{Result, StoreError};
pub use models::*;
pub use ops::new_track_id;
pub use repository::Database;
pub use schema::{MIGRATIONS, Migration};
