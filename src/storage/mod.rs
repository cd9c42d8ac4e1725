//! SQLite persistence for scraped races
//!
//! Maps the domain model and scraped rows onto the fixed table layout in
//! [`schema`]. Every write is an upsert keyed by netkeiba identifiers, so
//! registering the same race twice leaves one copy.

mod repository;
pub mod schema;

pub use repository::{
    HorseRecord, PastPerformanceRecord, RaceCardRecord, RaceProgramRecord, Repository, SaveSummary,
};
pub use schema::create_tables;

use thiserror::Error;

/// Storage errors
#[derive(Debug, Error)]
pub enum StorageError {
    #[error("SQLite error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    #[error("Failed to open database {path}: {source}")]
    Open {
        path: String,
        #[source]
        source: rusqlite::Error,
    },
}
