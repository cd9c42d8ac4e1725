//! Race card (出馬表) parser for race.netkeiba.com
//!
//! Structure: table.Shutuba_Table > tr.HorseList, one row per runner. The race
//! header (surface, distance, course, going) sits in div.RaceData01/02 above it.

use super::fields::{
    element_text, is_odds_placeholder, link_identifier, parse_age, parse_odds, parse_post_position,
    parse_surface_distance, parse_trainer, parse_weight, parse_weight_to_carry, post_position_slot,
};
use super::ScraperError;
use crate::error::{Field, FieldError, RowFailure};
use crate::models::{Horse, HorseEntry, RaceInfo, TrackCondition, Trainer, Weather};
use chrono::NaiveDate;
use regex::Regex;
use scraper::{ElementRef, Html, Selector};
use serde::Serialize;

/// URL for race card page
const SHUTUBA_URL: &str = "https://race.netkeiba.com/race/shutuba.html";

/// Whether odds are expected on the page
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ListingMode {
    /// Betting may not be open yet: missing odds and weights are allowed
    PreRace,
    /// Every row must be priced
    Final,
}

/// netkeiba identifiers captured from a row's links
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct SiteIds {
    pub horse: Option<String>,
    pub jockey: Option<String>,
    pub trainer: Option<String>,
}

/// Row data that has no place in the domain entry but is persisted
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ScrapedRow {
    pub ids: SiteIds,
    pub sex: Option<char>,
    pub weight_to_carry: Option<f64>,
}

/// Everything extracted from one row, before domain validation
#[derive(Debug, Clone, PartialEq)]
pub struct EntryRecord {
    pub row: usize,
    pub post_position: u8,
    pub horse_name: String,
    pub sex: char,
    pub age: u8,
    pub jockey_name: String,
    pub trainer: Trainer,
    pub weight: Option<(u16, i16)>,
    pub odds: Option<f64>,
    pub weight_to_carry: Option<f64>,
    pub ids: SiteIds,
}

impl EntryRecord {
    /// Build the domain entry; fails on the first broken invariant
    pub fn into_entry(self) -> Result<(HorseEntry, ScrapedRow), RowFailure> {
        let row = self.row;
        let horse = Horse::new(self.horse_name.as_str(), self.age, Some(self.trainer))
            .map_err(|e| FieldError::violation(Field::HorseName, &self.horse_name, e).at_row(row))?;

        let mut entry = HorseEntry::new(horse, self.post_position, self.jockey_name).map_err(|e| {
            FieldError::violation(Field::PostPosition, &self.post_position.to_string(), e).at_row(row)
        })?;

        if let Some((weight, change)) = self.weight {
            entry = entry.with_weight(weight, Some(change)).map_err(|e| {
                FieldError::violation(Field::Weight, &weight.to_string(), e).at_row(row)
            })?;
        }
        if let Some(odds) = self.odds {
            entry = entry
                .with_odds(odds)
                .map_err(|e| FieldError::violation(Field::Odds, &odds.to_string(), e).at_row(row))?;
        }

        Ok((
            entry,
            ScrapedRow {
                ids: self.ids,
                sex: Some(self.sex),
                weight_to_carry: self.weight_to_carry,
            },
        ))
    }
}

/// How a page's rows fared
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum ExtractionOutcome {
    /// Every row produced an entry
    Complete,
    /// Some rows produced entries, `failed` rows were skipped
    Partial { failed: usize },
    /// No entries at all (`failed` is 0 when the table had no rows)
    Empty { failed: usize },
}

impl ExtractionOutcome {
    pub fn from_counts(extracted: usize, failed: usize) -> Self {
        match (extracted, failed) {
            (0, failed) => ExtractionOutcome::Empty { failed },
            (_, 0) => ExtractionOutcome::Complete,
            (_, failed) => ExtractionOutcome::Partial { failed },
        }
    }

    pub fn is_complete(&self) -> bool {
        matches!(self, ExtractionOutcome::Complete)
    }
}

/// Parsed race card: the race aggregate plus per-row extras and failures
#[derive(Debug, Clone)]
pub struct ScrapedRaceCard {
    pub race: RaceInfo,
    /// Aligned with `race.entries()`
    pub rows: Vec<ScrapedRow>,
    pub failures: Vec<RowFailure>,
}

impl ScrapedRaceCard {
    /// Build URL for race card page
    pub fn url(race_id: &str) -> String {
        format!("{}?race_id={}", SHUTUBA_URL, race_id)
    }

    pub fn entries(&self) -> impl Iterator<Item = (&HorseEntry, &ScrapedRow)> {
        self.race.entries().iter().zip(self.rows.iter())
    }

    pub fn outcome(&self) -> ExtractionOutcome {
        ExtractionOutcome::from_counts(self.rows.len(), self.failures.len())
    }
}

/// Compiled selectors and patterns for race card pages
pub struct RaceCardParser {
    rows: Selector,
    rows_fallback: Selector,
    cells: Selector,
    horse_info: Selector,
    horse_name: Selector,
    horse_link: Selector,
    age: Selector,
    jockey: Selector,
    trainer: Selector,
    link: Selector,
    weight: Selector,
    odds: Selector,
    weight_to_carry: Selector,
    race_data01: Selector,
    race_data01_span: Selector,
    race_data02_span: Selector,
    race_name: Selector,
    title: Selector,
    weather_pattern: Regex,
    condition_pattern: Regex,
    date_pattern: Regex,
}

pub(super) fn selector(css: &str) -> Result<Selector, ScraperError> {
    Selector::parse(css).map_err(|e| ScraperError::ParseError(e.to_string()))
}

pub(super) fn pattern(re: &str) -> Result<Regex, ScraperError> {
    Regex::new(re).map_err(|e| ScraperError::ParseError(e.to_string()))
}

impl RaceCardParser {
    pub fn new() -> Result<Self, ScraperError> {
        Ok(Self {
            rows: selector("table.Shutuba_Table tr.HorseList")?,
            rows_fallback: selector("tr.HorseList")?,
            cells: selector("td")?,
            horse_info: selector("td.HorseInfo")?,
            horse_name: selector(".HorseName")?,
            horse_link: selector("a[href*='/horse/']")?,
            age: selector("td.Barei")?,
            jockey: selector("td.Jockey")?,
            trainer: selector("td.Trainer")?,
            link: selector("a[href]")?,
            weight: selector("td.Weight")?,
            odds: selector("[id^='odds-']")?,
            weight_to_carry: selector(".JockeyWeight")?,
            race_data01: selector(".RaceData01")?,
            race_data01_span: selector(".RaceData01 span")?,
            race_data02_span: selector(".RaceData02 span")?,
            race_name: selector(".RaceName")?,
            title: selector("title")?,
            weather_pattern: pattern(r"天候\s*[:：]\s*(晴|曇|小雨|雨|小雪|雪)")?,
            condition_pattern: pattern(r"馬場\s*[:：]\s*(稍重|稍|不良|不|良|重)")?,
            date_pattern: pattern(r"(\d{4})年(\d{1,2})月(\d{1,2})日")?,
        })
    }

    /// Parse a race card page
    ///
    /// Fails only when the race header is unusable. Bad rows are skipped and
    /// reported in `failures`.
    pub fn parse(&self, html: &str, mode: ListingMode) -> Result<ScrapedRaceCard, ScraperError> {
        let document = Html::parse_document(html);
        let mut race = self.parse_header(&document)?;
        let mut rows = Vec::new();
        let mut failures = Vec::new();

        let mut table_rows: Vec<ElementRef> = document.select(&self.rows).collect();
        if table_rows.is_empty() {
            table_rows = document.select(&self.rows_fallback).collect();
        }

        for (ordinal, row) in table_rows.iter().enumerate() {
            let result = self
                .extract_row(row, ordinal, mode)
                .and_then(EntryRecord::into_entry)
                .and_then(|(entry, scraped)| {
                    let post = entry.post_position();
                    race.push_entry(entry)
                        .map(|_| scraped)
                        .map_err(|e| {
                            FieldError::violation(Field::PostPosition, &post.to_string(), e)
                                .at_row(ordinal)
                        })
                });

            match result {
                Ok(scraped) => rows.push(scraped),
                Err(failure) => {
                    tracing::warn!("Skipping race card row: {}", failure);
                    failures.push(failure);
                }
            }
        }

        tracing::info!(
            "Extracted {} of {} race card rows ({} failed)",
            rows.len(),
            table_rows.len(),
            failures.len()
        );

        Ok(ScrapedRaceCard {
            race,
            rows,
            failures,
        })
    }

    /// Extract one tr.HorseList row
    pub fn extract_row(
        &self,
        row: &ElementRef,
        ordinal: usize,
        mode: ListingMode,
    ) -> Result<EntryRecord, RowFailure> {
        self.extract_fields(row, ordinal, mode)
            .map_err(|e| e.at_row(ordinal))
    }

    fn extract_fields(
        &self,
        row: &ElementRef,
        ordinal: usize,
        mode: ListingMode,
    ) -> Result<EntryRecord, FieldError> {
        let post_position = self.post_position(row)?;

        let horse_cell = row
            .select(&self.horse_info)
            .next()
            .ok_or_else(|| FieldError::missing(Field::HorseName))?;
        let horse_name = horse_cell
            .select(&self.horse_name)
            .next()
            .map(|el| element_text(&el))
            .unwrap_or_else(|| element_text(&horse_cell));
        if horse_name.is_empty() {
            return Err(FieldError::unparseable(
                Field::HorseName,
                &horse_name,
                "empty horse name",
            ));
        }
        let horse_id = horse_cell
            .select(&self.horse_link)
            .next()
            .and_then(|a| a.value().attr("href"))
            .and_then(link_identifier);

        let age_text = self.cell_text(row, &self.age, Field::Age)?;
        let (sex, age) = parse_age(&age_text)?;

        let jockey_cell = row
            .select(&self.jockey)
            .next()
            .ok_or_else(|| FieldError::missing(Field::Jockey))?;
        let jockey_name = element_text(&jockey_cell);
        let jockey_id = self.link_id(&jockey_cell);

        let trainer_cell = row
            .select(&self.trainer)
            .next()
            .ok_or_else(|| FieldError::missing(Field::Trainer))?;
        let trainer = parse_trainer(&element_text(&trainer_cell))?;
        let trainer_id = self.link_id(&trainer_cell);

        let weight_text = self.cell_text(row, &self.weight, Field::Weight)?;
        let weight = if weight_text.is_empty() && mode == ListingMode::PreRace {
            None
        } else {
            Some(parse_weight(&weight_text)?)
        };

        let odds = match (row.select(&self.odds).next(), mode) {
            (Some(cell), ListingMode::PreRace) if is_odds_placeholder(&element_text(&cell)) => None,
            (Some(cell), _) => Some(parse_odds(&element_text(&cell))?),
            (None, ListingMode::PreRace) => None,
            (None, ListingMode::Final) => return Err(FieldError::missing(Field::Odds)),
        };

        let weight_to_carry = row
            .select(&self.weight_to_carry)
            .next()
            .and_then(|el| parse_weight_to_carry(&element_text(&el)));

        Ok(EntryRecord {
            row: ordinal,
            post_position,
            horse_name,
            sex,
            age,
            jockey_name,
            trainer,
            weight,
            odds,
            weight_to_carry,
            ids: SiteIds {
                horse: horse_id,
                jockey: jockey_id,
                trainer: trainer_id,
            },
        })
    }

    fn post_position(&self, row: &ElementRef) -> Result<u8, FieldError> {
        let cell = row
            .select(&self.cells)
            .find(|td| td.value().classes().any(|c| post_position_slot(c).is_some()))
            .ok_or_else(|| FieldError::missing(Field::PostPosition))?;
        parse_post_position(&element_text(&cell))
    }

    fn cell_text(&self, row: &ElementRef, selector: &Selector, field: Field) -> Result<String, FieldError> {
        row.select(selector)
            .next()
            .map(|el| element_text(&el))
            .ok_or_else(|| FieldError::missing(field))
    }

    fn link_id(&self, cell: &ElementRef) -> Option<String> {
        cell.select(&self.link)
            .next()
            .and_then(|a| a.value().attr("href"))
            .and_then(link_identifier)
    }

    fn parse_header(&self, document: &Html) -> Result<RaceInfo, ScraperError> {
        let blob = document
            .select(&self.race_data01_span)
            .next()
            .map(|el| element_text(&el))
            .ok_or_else(|| ScraperError::RaceLevel(FieldError::missing(Field::SurfaceDistance)))?;
        let (surface, distance) = parse_surface_distance(&blob).map_err(ScraperError::RaceLevel)?;
        let mut race = RaceInfo::new(surface, distance)
            .map_err(|e| ScraperError::RaceLevel(FieldError::violation(Field::SurfaceDistance, &blob, e)))?;

        if let Some(course) = document
            .select(&self.race_data02_span)
            .nth(1)
            .map(|el| element_text(&el))
            .filter(|s| !s.is_empty())
        {
            race = race.with_course(course);
        }

        if let Some(name) = document
            .select(&self.race_name)
            .next()
            .map(|el| element_text(&el))
            .filter(|s| !s.is_empty())
        {
            race = race.with_race_name(name);
        }

        let data_text: String = document
            .select(&self.race_data01)
            .next()
            .map(|el| el.text().collect())
            .unwrap_or_default();

        if let Some(caps) = self.weather_pattern.captures(&data_text) {
            match Weather::from_label(&caps[1]) {
                Ok(weather) => race = race.with_weather(weather),
                Err(e) => tracing::warn!("Ignoring weather: {}", e),
            }
        }

        if let Some(caps) = self.condition_pattern.captures(&data_text) {
            match TrackCondition::from_label(&caps[1]) {
                Ok(condition) => race = race.with_track_condition(condition),
                Err(e) => tracing::warn!("Ignoring track condition: {}", e),
            }
        }

        if let Some(date) = document
            .select(&self.title)
            .next()
            .and_then(|el| self.parse_date(&element_text(&el)))
        {
            race = race.with_race_date(date);
        }

        Ok(race)
    }

    fn parse_date(&self, text: &str) -> Option<NaiveDate> {
        let caps = self.date_pattern.captures(text)?;
        let year: i32 = caps[1].parse().ok()?;
        let month: u32 = caps[2].parse().ok()?;
        let day: u32 = caps[3].parse().ok()?;
        NaiveDate::from_ymd_opt(year, month, day)
    }
}

/// Parse a race card page with freshly compiled selectors
pub fn parse_race_card(html: &str, mode: ListingMode) -> Result<ScrapedRaceCard, ScraperError> {
    RaceCardParser::new()?.parse(html, mode)
}
