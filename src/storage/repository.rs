//! Upserts by natural key and whole-page saves

use super::schema::create_tables;
use super::StorageError;
use crate::models::{RaceInfo, Trainer};
use crate::scraper::{ScrapedRaceCard, ScrapedRaceResult};
use rusqlite::{params, Connection};
use serde::Serialize;
use std::path::Path;

/// Row of the `horse` table; pedigree and birth date are not on race pages
#[derive(Debug, Clone, PartialEq)]
pub struct HorseRecord {
    pub netkeiba_horse_id: String,
    pub name: String,
    pub lgt: Option<String>,
}

/// Row of the `race_program` table
#[derive(Debug, Clone, PartialEq)]
pub struct RaceProgramRecord {
    pub netkeiba_race_id: String,
    pub race_name: Option<String>,
    pub course: Option<String>,
    pub distance: Option<u32>,
    pub track_surface: Option<String>,
    pub race_date: Option<String>,
}

impl RaceProgramRecord {
    pub fn from_race(race_id: &str, race: &RaceInfo) -> Self {
        Self {
            netkeiba_race_id: race_id.to_string(),
            race_name: race.race_name().map(str::to_string),
            course: race.course().map(str::to_string),
            distance: Some(race.distance_in_meters()),
            track_surface: Some(race.track_surface().code().to_string()),
            race_date: race.race_date().map(|d| d.format("%Y-%m-%d").to_string()),
        }
    }
}

/// Row of the `race_card` table
#[derive(Debug, Clone, PartialEq)]
pub struct RaceCardRecord {
    pub netkeiba_race_id: String,
    pub post_position: u8,
    pub netkeiba_horse_id: String,
    pub weight_to_carry: Option<f64>,
    pub netkeiba_jockey_id: Option<String>,
    pub weight: Option<u16>,
    pub weight_change: Option<i16>,
    pub odds: Option<f64>,
}

/// Row of the `past_performance` table
#[derive(Debug, Clone, PartialEq)]
pub struct PastPerformanceRecord {
    pub netkeiba_horse_id: String,
    pub netkeiba_race_id: String,
    pub finish_position: Option<u8>,
    pub finish_time: Option<String>,
    pub final_3f: Option<String>,
}

/// What a page save wrote
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct SaveSummary {
    pub horses: usize,
    pub jockeys: usize,
    pub trainers: usize,
    pub race_cards: usize,
    pub past_performances: usize,
    /// Rows without a horse id
    pub skipped: usize,
}

/// SQLite-backed store
pub struct Repository {
    conn: Connection,
}

impl Repository {
    /// Open (or create) a database file and make sure the tables exist
    pub fn open(path: impl AsRef<Path>) -> Result<Self, StorageError> {
        let path = path.as_ref();
        let conn = Connection::open(path).map_err(|source| StorageError::Open {
            path: path.display().to_string(),
            source,
        })?;
        Self::from_connection(conn)
    }

    pub fn open_in_memory() -> Result<Self, StorageError> {
        Self::from_connection(Connection::open_in_memory()?)
    }

    fn from_connection(conn: Connection) -> Result<Self, StorageError> {
        create_tables(&conn)?;
        Ok(Self { conn })
    }

    pub fn connection(&self) -> &Connection {
        &self.conn
    }

    pub fn upsert_horse(&self, horse: &HorseRecord) -> Result<(), StorageError> {
        upsert_horse(&self.conn, horse)
    }

    pub fn upsert_jockey(&self, jockey_id: &str, name: &str) -> Result<(), StorageError> {
        upsert_jockey(&self.conn, jockey_id, name)
    }

    pub fn upsert_trainer(&self, trainer_id: &str, trainer: &Trainer) -> Result<(), StorageError> {
        upsert_trainer(&self.conn, trainer_id, trainer)
    }

    pub fn upsert_race_program(&self, program: &RaceProgramRecord) -> Result<(), StorageError> {
        upsert_race_program(&self.conn, program)
    }

    pub fn upsert_race_card(&self, card: &RaceCardRecord) -> Result<(), StorageError> {
        upsert_race_card(&self.conn, card)
    }

    pub fn upsert_past_performance(
        &self,
        performance: &PastPerformanceRecord,
    ) -> Result<(), StorageError> {
        upsert_past_performance(&self.conn, performance)
    }

    /// Persist a race card page in one transaction
    pub fn save_race_card(
        &mut self,
        race_id: &str,
        card: &ScrapedRaceCard,
    ) -> Result<SaveSummary, StorageError> {
        let tx = self.conn.transaction()?;
        let mut summary = SaveSummary::default();

        upsert_race_program(&tx, &RaceProgramRecord::from_race(race_id, &card.race))?;

        for (entry, scraped) in card.entries() {
            let Some(horse_id) = scraped.ids.horse.as_deref() else {
                tracing::warn!(
                    "No horse id for post position {}, not saved",
                    entry.post_position()
                );
                summary.skipped += 1;
                continue;
            };

            upsert_horse(
                &tx,
                &HorseRecord {
                    netkeiba_horse_id: horse_id.to_string(),
                    name: entry.horse().name().to_string(),
                    lgt: scraped.sex.map(String::from),
                },
            )?;
            summary.horses += 1;

            if let Some(jockey_id) = scraped.ids.jockey.as_deref() {
                upsert_jockey(&tx, jockey_id, entry.jockey())?;
                summary.jockeys += 1;
            }

            if let (Some(trainer_id), Some(trainer)) =
                (scraped.ids.trainer.as_deref(), entry.horse().trainer())
            {
                upsert_trainer(&tx, trainer_id, trainer)?;
                summary.trainers += 1;
            }

            upsert_race_card(
                &tx,
                &RaceCardRecord {
                    netkeiba_race_id: race_id.to_string(),
                    post_position: entry.post_position(),
                    netkeiba_horse_id: horse_id.to_string(),
                    weight_to_carry: scraped.weight_to_carry,
                    netkeiba_jockey_id: scraped.ids.jockey.clone(),
                    weight: entry.weight(),
                    weight_change: entry.weight_change(),
                    odds: entry.odds(),
                },
            )?;
            summary.race_cards += 1;
        }

        tx.commit()?;
        tracing::info!("Saved race card {}: {:?}", race_id, summary);
        Ok(summary)
    }

    /// Persist a result page in one transaction
    ///
    /// The race_program row is created bare if the race card was never saved.
    pub fn save_race_result(
        &mut self,
        race_id: &str,
        result: &ScrapedRaceResult,
    ) -> Result<SaveSummary, StorageError> {
        let tx = self.conn.transaction()?;
        let mut summary = SaveSummary::default();

        tx.execute(
            "INSERT INTO race_program (netkeiba_race_id) VALUES (?1)
             ON CONFLICT(netkeiba_race_id) DO NOTHING",
            params![race_id],
        )?;

        for row in &result.rows {
            let Some(horse_id) = row.horse_id.as_deref() else {
                tracing::warn!("No horse id for result row {}, not saved", row.row);
                summary.skipped += 1;
                continue;
            };

            upsert_horse(
                &tx,
                &HorseRecord {
                    netkeiba_horse_id: horse_id.to_string(),
                    name: row.horse_name.clone(),
                    lgt: row.sex.map(String::from),
                },
            )?;
            summary.horses += 1;

            if let (Some(jockey_id), Some(name)) = (row.jockey_id.as_deref(), row.jockey_name.as_deref()) {
                upsert_jockey(&tx, jockey_id, name)?;
                summary.jockeys += 1;
            }

            if let (Some(trainer_id), Some(trainer)) = (row.trainer_id.as_deref(), row.trainer.as_ref()) {
                upsert_trainer(&tx, trainer_id, trainer)?;
                summary.trainers += 1;
            }

            upsert_past_performance(
                &tx,
                &PastPerformanceRecord {
                    netkeiba_horse_id: horse_id.to_string(),
                    netkeiba_race_id: race_id.to_string(),
                    finish_position: row.finish_position,
                    finish_time: row.finish_time.clone(),
                    final_3f: row.final_3f.clone(),
                },
            )?;
            summary.past_performances += 1;
        }

        tx.commit()?;
        tracing::info!("Saved race result {}: {:?}", race_id, summary);
        Ok(summary)
    }
}

fn upsert_horse(conn: &Connection, horse: &HorseRecord) -> Result<(), StorageError> {
    conn.execute(
        "INSERT INTO horse (netkeiba_horse_id, name, lgt)
         VALUES (?1, ?2, ?3)
         ON CONFLICT(netkeiba_horse_id) DO UPDATE SET
             name = excluded.name,
             lgt = COALESCE(excluded.lgt, horse.lgt)",
        params![horse.netkeiba_horse_id, horse.name, horse.lgt],
    )?;
    Ok(())
}

fn upsert_jockey(conn: &Connection, jockey_id: &str, name: &str) -> Result<(), StorageError> {
    conn.execute(
        "INSERT INTO jockey (netkeiba_jockey_id, name)
         VALUES (?1, ?2)
         ON CONFLICT(netkeiba_jockey_id) DO UPDATE SET
             name = excluded.name",
        params![jockey_id, name],
    )?;
    Ok(())
}

fn upsert_trainer(conn: &Connection, trainer_id: &str, trainer: &Trainer) -> Result<(), StorageError> {
    conn.execute(
        "INSERT INTO trainer (netkeiba_trainer_id, name, training_center)
         VALUES (?1, ?2, ?3)
         ON CONFLICT(netkeiba_trainer_id) DO UPDATE SET
             name = excluded.name,
             training_center = excluded.training_center",
        params![trainer_id, trainer.name(), trainer.training_center().code()],
    )?;
    Ok(())
}

fn upsert_race_program(conn: &Connection, program: &RaceProgramRecord) -> Result<(), StorageError> {
    conn.execute(
        "INSERT INTO race_program
             (netkeiba_race_id, race_name, course, distance, track_surface, race_date)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6)
         ON CONFLICT(netkeiba_race_id) DO UPDATE SET
             race_name = COALESCE(excluded.race_name, race_program.race_name),
             course = COALESCE(excluded.course, race_program.course),
             distance = COALESCE(excluded.distance, race_program.distance),
             track_surface = COALESCE(excluded.track_surface, race_program.track_surface),
             race_date = COALESCE(excluded.race_date, race_program.race_date)",
        params![
            program.netkeiba_race_id,
            program.race_name,
            program.course,
            program.distance,
            program.track_surface,
            program.race_date,
        ],
    )?;
    Ok(())
}

fn upsert_race_card(conn: &Connection, card: &RaceCardRecord) -> Result<(), StorageError> {
    conn.execute(
        "INSERT INTO race_card
             (netkeiba_race_id, post_position, netkeiba_horse_id, weight_to_carry,
              netkeiba_jockey_id, weight, weight_change, odds)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)
         ON CONFLICT(netkeiba_race_id, post_position) DO UPDATE SET
             netkeiba_horse_id = excluded.netkeiba_horse_id,
             weight_to_carry = excluded.weight_to_carry,
             netkeiba_jockey_id = excluded.netkeiba_jockey_id,
             weight = excluded.weight,
             weight_change = excluded.weight_change,
             odds = excluded.odds",
        params![
            card.netkeiba_race_id,
            card.post_position,
            card.netkeiba_horse_id,
            card.weight_to_carry,
            card.netkeiba_jockey_id,
            card.weight,
            card.weight_change,
            card.odds,
        ],
    )?;
    Ok(())
}

fn upsert_past_performance(
    conn: &Connection,
    performance: &PastPerformanceRecord,
) -> Result<(), StorageError> {
    conn.execute(
        "INSERT INTO past_performance
             (netkeiba_horse_id, netkeiba_race_id, finish_position, finish_time, final_3f)
         VALUES (?1, ?2, ?3, ?4, ?5)
         ON CONFLICT(netkeiba_horse_id, netkeiba_race_id) DO UPDATE SET
             finish_position = excluded.finish_position,
             finish_time = excluded.finish_time,
             final_3f = excluded.final_3f",
        params![
            performance.netkeiba_horse_id,
            performance.netkeiba_race_id,
            performance.finish_position,
            performance.finish_time,
            performance.final_3f,
        ],
    )?;
    Ok(())
}
