//! Core business logic modules

pub mod expectation;

// Re-export commonly used types
pub use expectation::{ExpectationEngine, RankedEntry, WinRateTable, WIN_RATE_TABLE_V1};
