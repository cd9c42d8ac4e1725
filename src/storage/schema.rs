//! SQLite schema for scraped race data
//!
//! Tables:
//! - horse: one row per netkeiba horse id
//! - race_program: race header (name, course, distance, surface, date)
//! - race_card: entries of a race, keyed by post position
//! - past_performance: finishing results per horse and race
//! - jockey / trainer: name lookups by netkeiba id

use rusqlite::{Connection, Result};

/// Names of every table `create_tables` creates
pub const TABLES: [&str; 6] = [
    "horse",
    "race_program",
    "race_card",
    "past_performance",
    "jockey",
    "trainer",
];

/// Create all tables in the database
pub fn create_tables(conn: &Connection) -> Result<()> {
    conn.execute_batch("PRAGMA foreign_keys = ON;")?;

    conn.execute(
        r#"
        CREATE TABLE IF NOT EXISTS horse (
            netkeiba_horse_id TEXT PRIMARY KEY,
            name TEXT,
            birth_date TEXT,
            lgt TEXT,
            sire_netkeiba_horse_id TEXT,
            dam_netkeiba_horse_id TEXT
        )
        "#,
        [],
    )?;

    conn.execute(
        r#"
        CREATE TABLE IF NOT EXISTS race_program (
            netkeiba_race_id TEXT PRIMARY KEY,
            race_name TEXT,
            course TEXT,
            distance INTEGER,
            track_surface TEXT,
            race_date TEXT
        )
        "#,
        [],
    )?;

    conn.execute(
        r#"
        CREATE TABLE IF NOT EXISTS race_card (
            netkeiba_race_id TEXT,
            post_position INTEGER,
            netkeiba_horse_id TEXT,
            weight_to_carry REAL,
            netkeiba_jockey_id TEXT,
            weight INTEGER,
            weight_change INTEGER,
            odds REAL,
            PRIMARY KEY (netkeiba_race_id, post_position),
            FOREIGN KEY (netkeiba_race_id) REFERENCES race_program(netkeiba_race_id),
            FOREIGN KEY (netkeiba_horse_id) REFERENCES horse(netkeiba_horse_id)
        )
        "#,
        [],
    )?;

    conn.execute(
        r#"
        CREATE TABLE IF NOT EXISTS past_performance (
            netkeiba_horse_id TEXT,
            netkeiba_race_id TEXT,
            finish_position INTEGER,
            finish_time TEXT,
            final_3f TEXT,
            PRIMARY KEY (netkeiba_horse_id, netkeiba_race_id),
            FOREIGN KEY (netkeiba_horse_id) REFERENCES horse(netkeiba_horse_id),
            FOREIGN KEY (netkeiba_race_id) REFERENCES race_program(netkeiba_race_id)
        )
        "#,
        [],
    )?;

    conn.execute(
        r#"
        CREATE TABLE IF NOT EXISTS jockey (
            netkeiba_jockey_id TEXT PRIMARY KEY,
            name TEXT
        )
        "#,
        [],
    )?;

    conn.execute(
        r#"
        CREATE TABLE IF NOT EXISTS trainer (
            netkeiba_trainer_id TEXT PRIMARY KEY,
            name TEXT,
            training_center TEXT
        )
        "#,
        [],
    )?;

    Ok(())
}
