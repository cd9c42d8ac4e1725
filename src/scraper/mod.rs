//! Web scraper for race.netkeiba.com
//!
//! Parses race cards (出馬表) and race results into the domain model. The
//! parsers work on already-decoded HTML; fetching lives in `client` behind the
//! `fetch` feature.
//!
//! # Example
//!
//! ```no_run
//! use baken::scraper::{RaceScraper, ScraperConfig, ListingMode};
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let scraper = RaceScraper::new(ScraperConfig::default())?;
//!
//!     let card = scraper.fetch_race_card("202405021211", ListingMode::Final).await?;
//!     println!("Found {} entries", card.race.entries().len());
//!
//!     Ok(())
//! }
//! ```

#[cfg(feature = "fetch")]
mod client;
pub mod fields;
mod race_card;
mod race_result;

#[cfg(feature = "fetch")]
pub use client::{decode_page, validate_race_id, RaceScraper, ScraperConfig};
pub use race_card::{
    parse_race_card, EntryRecord, ExtractionOutcome, ListingMode, RaceCardParser, ScrapedRaceCard,
    ScrapedRow, SiteIds,
};
pub use race_result::{parse_race_result, RaceResultParser, ResultRow, ScrapedRaceResult};

use crate::error::FieldError;
use thiserror::Error;

/// Scraper errors
#[derive(Debug, Error)]
pub enum ScraperError {
    #[cfg(feature = "fetch")]
    #[error("HTTP request failed: {0}")]
    RequestFailed(#[from] reqwest::Error),

    #[error("HTTP {status} from {url}")]
    HttpStatus { status: u16, url: String },

    #[error("Invalid race id {0:?}: expected 12 digits")]
    InvalidRaceId(String),

    #[error("Failed to parse HTML: {0}")]
    ParseError(String),

    /// Race header unusable; the whole page is rejected
    #[error("Race header: {0}")]
    RaceLevel(FieldError),
}
