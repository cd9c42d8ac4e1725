//! Popularity-based expected value
//!
//! Entries are ranked by ascending win odds (rank 0 = favorite). Each rank maps
//! to an observed favorite win rate, and the expected value of a win bet is:
//!     ev = odds * win_rate
//!
//! Ranks past the end of the table get no rate and are left out.

use crate::error::IncompleteOddsError;
use crate::models::{HorseEntry, RaceInfo};
use serde::Serialize;

/// Observed win rate by popularity rank
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct WinRateTable {
    pub version: &'static str,
    pub rates: [f64; 18],
}

impl WinRateTable {
    pub fn len(&self) -> usize {
        self.rates.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rates.is_empty()
    }

    /// Rate for a zero-based popularity rank, if the table covers it
    pub fn rate(&self, popularity_rank: usize) -> Option<f64> {
        self.rates.get(popularity_rank).copied()
    }
}

/// Favorite-to-winner frequencies. Kept verbatim; do not smooth.
pub const WIN_RATE_TABLE_V1: WinRateTable = WinRateTable {
    version: "v1",
    rates: [
        0.328, 0.19, 0.133, 0.092, 0.075, 0.055, 0.038, 0.031, 0.022, 0.012, 0.013, 0.009,
        0.007, 0.0001, 0.002, 0.001, 0.0001, 0.0001,
    ],
};

/// One entry's place in the popularity order
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RankedEntry<'a> {
    pub popularity_rank: usize,
    pub entry: &'a HorseEntry,
    pub odds: f64,
    pub win_rate: f64,
    pub expected_value: f64,
}

/// Ranks a race's entries against a win-rate table
#[derive(Debug, Clone, Copy)]
pub struct ExpectationEngine {
    table: WinRateTable,
}

impl ExpectationEngine {
    pub fn new(table: WinRateTable) -> Self {
        Self { table }
    }

    pub fn with_defaults() -> Self {
        Self::new(WIN_RATE_TABLE_V1)
    }

    pub fn table(&self) -> &WinRateTable {
        &self.table
    }

    /// Rank entries by ascending odds and attach win rate and expected value
    ///
    /// Ties keep scraped order. Fails if any entry has no odds, since a
    /// partial field has no meaningful popularity order.
    pub fn rank<'a>(&self, race: &'a RaceInfo) -> Result<Vec<RankedEntry<'a>>, IncompleteOddsError> {
        let missing: Vec<u8> = race
            .entries()
            .iter()
            .filter(|e| e.odds().is_none())
            .map(|e| e.post_position())
            .collect();

        if !missing.is_empty() {
            return Err(IncompleteOddsError { missing });
        }

        let mut priced: Vec<(&HorseEntry, f64)> = race
            .entries()
            .iter()
            .filter_map(|e| e.odds().map(|odds| (e, odds)))
            .collect();

        // sort_by is stable, so equal odds keep insertion order
        priced.sort_by(|a, b| a.1.total_cmp(&b.1));

        let ranked: Vec<RankedEntry<'a>> = priced
            .into_iter()
            .enumerate()
            .map_while(|(rank, (entry, odds))| {
                let win_rate = self.table.rate(rank)?;
                Some(RankedEntry {
                    popularity_rank: rank,
                    entry,
                    odds,
                    win_rate,
                    expected_value: odds * win_rate,
                })
            })
            .collect();

        if race.entries().len() > ranked.len() {
            tracing::debug!(
                "{} entries beyond popularity rank {} have no win rate",
                race.entries().len() - ranked.len(),
                self.table.len() - 1
            );
        }

        Ok(ranked)
    }

    /// Ranked entries whose expected value reaches `threshold`
    pub fn value_bets<'a>(
        &self,
        race: &'a RaceInfo,
        threshold: f64,
    ) -> Result<Vec<RankedEntry<'a>>, IncompleteOddsError> {
        Ok(self
            .rank(race)?
            .into_iter()
            .filter(|r| r.expected_value >= threshold)
            .collect())
    }
}

impl Default for ExpectationEngine {
    fn default() -> Self {
        Self::with_defaults()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{Horse, TrackSurface};

    fn race_with_odds(odds: &[Option<f64>]) -> RaceInfo {
        let mut race = RaceInfo::new(TrackSurface::Turf, 2000).unwrap();
        for (idx, o) in odds.iter().enumerate() {
            let post = (idx + 1) as u8;
            let horse = Horse::new(format!("Horse{}", post), 4, None).unwrap();
            let mut entry = HorseEntry::new(horse, post, "jockey").unwrap();
            if let Some(o) = o {
                entry = entry.with_odds(*o).unwrap();
            }
            race.push_entry(entry).unwrap();
        }
        race
    }

    #[test]
    fn test_table_constants() {
        let table = WIN_RATE_TABLE_V1;
        assert_eq!(table.len(), 18);
        assert_eq!(table.rate(0), Some(0.328));
        assert_eq!(table.rate(9), Some(0.012));
        assert_eq!(table.rate(10), Some(0.013));
        assert_eq!(table.rate(13), Some(0.0001));
        assert_eq!(table.rate(17), Some(0.0001));
        assert_eq!(table.rate(18), None);
    }

    #[test]
    fn test_rank_three_entries() {
        let race = race_with_odds(&[Some(3.1), Some(1.5), Some(8.0)]);
        let ranked = ExpectationEngine::with_defaults().rank(&race).unwrap();

        assert_eq!(ranked.len(), 3);
        let posts: Vec<u8> = ranked.iter().map(|r| r.entry.post_position()).collect();
        assert_eq!(posts, vec![2, 1, 3]);
        assert_eq!(
            ranked.iter().map(|r| r.popularity_rank).collect::<Vec<_>>(),
            vec![0, 1, 2]
        );
        assert_eq!(
            ranked.iter().map(|r| r.win_rate).collect::<Vec<_>>(),
            vec![0.328, 0.19, 0.133]
        );
        assert!((ranked[0].expected_value - 0.492).abs() < 1e-9);
        assert!((ranked[1].expected_value - 0.589).abs() < 1e-9);
        assert!((ranked[2].expected_value - 1.064).abs() < 1e-9);
    }

    #[test]
    fn test_ties_keep_insertion_order() {
        let race = race_with_odds(&[Some(5.0), Some(2.0), Some(5.0), Some(5.0)]);
        let ranked = ExpectationEngine::with_defaults().rank(&race).unwrap();
        let posts: Vec<u8> = ranked.iter().map(|r| r.entry.post_position()).collect();
        assert_eq!(posts, vec![2, 1, 3, 4]);
    }

    #[test]
    fn test_zero_odds_ties_keep_insertion_order() {
        let race = race_with_odds(&[Some(0.0), Some(0.0)]);
        let ranked = ExpectationEngine::with_defaults().rank(&race).unwrap();
        let posts: Vec<u8> = ranked.iter().map(|r| r.entry.post_position()).collect();
        assert_eq!(posts, vec![1, 2]);
        assert!(ranked.iter().all(|r| r.expected_value.is_sign_positive()));

        // Negative zero never reaches the sort
        let horse = Horse::new("Horse3", 4, None).unwrap();
        let entry = HorseEntry::new(horse, 3, "jockey").unwrap();
        assert!(entry.with_odds(-0.0).is_err());
    }

    #[test]
    fn test_rank_is_deterministic() {
        let race = race_with_odds(&[Some(4.0), Some(4.0), Some(1.2), Some(30.5), Some(4.0)]);
        let engine = ExpectationEngine::with_defaults();
        let first = engine.rank(&race).unwrap();
        let second = engine.rank(&race).unwrap();
        assert_eq!(first, second);
    }

    #[test]
    fn test_eighteen_entries_all_ranked() {
        let odds: Vec<Option<f64>> = (1..=18).map(|i| Some(i as f64 * 1.5)).collect();
        let race = race_with_odds(&odds);
        let ranked = ExpectationEngine::with_defaults().rank(&race).unwrap();

        assert_eq!(ranked.len(), 18);
        for r in &ranked {
            assert_eq!(r.win_rate, WIN_RATE_TABLE_V1.rates[r.popularity_rank]);
        }
    }

    #[test]
    fn test_nineteenth_entry_excluded() {
        let odds: Vec<Option<f64>> = (1..=19).rev().map(|i| Some(i as f64)).collect();
        let race = race_with_odds(&odds);
        let ranked = ExpectationEngine::with_defaults().rank(&race).unwrap();

        assert_eq!(ranked.len(), 18);
        // Post 1 carries the longest odds (19.0) and drops out
        assert!(ranked.iter().all(|r| r.entry.post_position() != 1));
        assert_eq!(ranked.last().unwrap().popularity_rank, 17);
    }

    #[test]
    fn test_missing_odds_rejected() {
        let race = race_with_odds(&[Some(3.1), None, Some(8.0), None]);
        let err = ExpectationEngine::with_defaults().rank(&race).unwrap_err();
        assert_eq!(err.missing, vec![2, 4]);
    }

    #[test]
    fn test_empty_race() {
        let race = race_with_odds(&[]);
        let ranked = ExpectationEngine::with_defaults().rank(&race).unwrap();
        assert!(ranked.is_empty());
    }

    #[test]
    fn test_value_bets_threshold() {
        let race = race_with_odds(&[Some(3.1), Some(1.5), Some(8.0)]);
        let bets = ExpectationEngine::with_defaults()
            .value_bets(&race, 1.0)
            .unwrap();
        assert_eq!(bets.len(), 1);
        assert_eq!(bets[0].entry.post_position(), 3);
    }

    #[test]
    fn test_custom_table() {
        let mut rates = [0.0; 18];
        rates[0] = 0.5;
        let engine = ExpectationEngine::new(WinRateTable {
            version: "test",
            rates,
        });
        let race = race_with_odds(&[Some(2.0), Some(4.0)]);
        let ranked = engine.rank(&race).unwrap();
        assert!((ranked[0].expected_value - 1.0).abs() < 1e-9);
        assert_eq!(ranked[1].expected_value, 0.0);
    }
}
