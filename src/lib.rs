//! Baken - netkeiba race scraping and favorite expected-value ranking
//!
//! This library provides:
//! - Race card (出馬表) and race result parsing into a validated domain model
//! - Popularity-based win rates and expected value of win bets
//! - SQLite persistence keyed by netkeiba identifiers
//! - An HTTP fetch layer (feature `fetch`)
//!
//! # Example
//!
//! ```no_run
//! use baken::core::ExpectationEngine;
//! use baken::scraper::{parse_race_card, ListingMode};
//!
//! let html = std::fs::read_to_string("shutuba.html").unwrap();
//! let card = parse_race_card(&html, ListingMode::Final).unwrap();
//!
//! let engine = ExpectationEngine::with_defaults();
//! for ranked in engine.rank(&card.race).unwrap() {
//!     println!("{} EV {:.3}", ranked.entry.horse().name(), ranked.expected_value);
//! }
//! ```

pub mod core;
pub mod error;
pub mod models;
pub mod scraper;
pub mod storage;

// Re-export commonly used types
pub use crate::core::{ExpectationEngine, RankedEntry, WinRateTable, WIN_RATE_TABLE_V1};
pub use error::{DomainError, FailureKind, Field, IncompleteOddsError, RowFailure};
pub use models::{
    FactorValue, Horse, HorseEntry, RaceInfo, TrackCondition, TrackSurface, Trainer,
    TrainingCenter, Weather,
};
pub use storage::{Repository, SaveSummary, StorageError};
