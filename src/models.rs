//! Race, horse, trainer and entry records built from one scraped page
//!
//! Every constructor validates its input, so a value of these types always
//! satisfies the race card invariants (positive distance, known surface and
//! training center codes, unique post positions).

use crate::error::{validate_distance, validate_odds, validate_post_position, DomainError};
use chrono::NaiveDate;
use serde::Serialize;
use std::collections::BTreeMap;

/// Track surface, scraped as a single glyph
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum TrackSurface {
    Dirt,
    Turf,
}

impl TrackSurface {
    pub fn from_code(code: char) -> Result<Self, DomainError> {
        match code {
            'ダ' => Ok(TrackSurface::Dirt),
            '芝' => Ok(TrackSurface::Turf),
            other => Err(DomainError::UnknownSurface(other.to_string())),
        }
    }

    pub fn code(&self) -> char {
        match self {
            TrackSurface::Dirt => 'ダ',
            TrackSurface::Turf => '芝',
        }
    }
}

/// Going, as announced on the race card (良 / 稍重 / 重 / 不良)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum TrackCondition {
    Good,
    Firm,
    Soft,
    Heavy,
}

impl TrackCondition {
    pub fn from_label(label: &str) -> Result<Self, DomainError> {
        match label.trim() {
            "良" => Ok(TrackCondition::Good),
            "稍重" | "稍" => Ok(TrackCondition::Firm),
            "重" => Ok(TrackCondition::Soft),
            "不良" | "不" => Ok(TrackCondition::Heavy),
            other => Err(DomainError::UnknownTrackCondition(other.to_string())),
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            TrackCondition::Good => "良",
            TrackCondition::Firm => "稍重",
            TrackCondition::Soft => "重",
            TrackCondition::Heavy => "不良",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Weather {
    Sunny,
    Cloudy,
    Rainy,
}

impl Weather {
    pub fn from_label(label: &str) -> Result<Self, DomainError> {
        match label.trim() {
            "晴" => Ok(Weather::Sunny),
            "曇" => Ok(Weather::Cloudy),
            "雨" | "小雨" => Ok(Weather::Rainy),
            other => Err(DomainError::UnknownWeather(other.to_string())),
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            Weather::Sunny => "晴",
            Weather::Cloudy => "曇",
            Weather::Rainy => "雨",
        }
    }
}

/// Training center a trainer is registered with
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum TrainingCenter {
    Ritto,
    Miho,
}

impl TrainingCenter {
    pub fn from_code(code: &str) -> Result<Self, DomainError> {
        match code {
            "栗東" => Ok(TrainingCenter::Ritto),
            "美浦" => Ok(TrainingCenter::Miho),
            other => Err(DomainError::UnknownTrainingCenter(other.to_string())),
        }
    }

    pub fn code(&self) -> &'static str {
        match self {
            TrainingCenter::Ritto => "栗東",
            TrainingCenter::Miho => "美浦",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Trainer {
    name: String,
    training_center: TrainingCenter,
}

impl Trainer {
    pub fn new(name: impl Into<String>, training_center: TrainingCenter) -> Result<Self, DomainError> {
        let name = name.into().trim().to_string();
        if name.is_empty() {
            return Err(DomainError::EmptyTrainerName);
        }
        Ok(Self {
            name,
            training_center,
        })
    }

    /// Split "栗東田中" style text: two-character center code, then the name
    pub fn from_combined(text: &str) -> Result<Self, DomainError> {
        let text = text.trim();
        let split = text
            .char_indices()
            .nth(2)
            .map(|(idx, _)| idx)
            .unwrap_or(text.len());
        let (code, name) = text.split_at(split);
        let center = TrainingCenter::from_code(code)?;
        Self::new(name, center)
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn training_center(&self) -> TrainingCenter {
        self.training_center
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Horse {
    name: String,
    age: u8,
    trainer: Option<Trainer>,
}

impl Horse {
    pub fn new(name: impl Into<String>, age: u8, trainer: Option<Trainer>) -> Result<Self, DomainError> {
        let name = name.into().trim().to_string();
        if name.is_empty() {
            return Err(DomainError::EmptyHorseName);
        }
        if age == 0 {
            return Err(DomainError::NonPositiveAge);
        }
        Ok(Self { name, age, trainer })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn age(&self) -> u8 {
        self.age
    }

    pub fn trainer(&self) -> Option<&Trainer> {
        self.trainer.as_ref()
    }
}

/// Value stored in an entry's factor map
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum FactorValue {
    Number(f64),
    Text(String),
    Flag(bool),
}

impl From<f64> for FactorValue {
    fn from(value: f64) -> Self {
        FactorValue::Number(value)
    }
}

impl From<&str> for FactorValue {
    fn from(value: &str) -> Self {
        FactorValue::Text(value.to_string())
    }
}

impl From<String> for FactorValue {
    fn from(value: String) -> Self {
        FactorValue::Text(value)
    }
}

impl From<bool> for FactorValue {
    fn from(value: bool) -> Self {
        FactorValue::Flag(value)
    }
}

/// One horse's line on the race card
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct HorseEntry {
    horse: Horse,
    post_position: u8,
    weight: Option<u16>,
    weight_change: Option<i16>,
    odds: Option<f64>,
    jockey: String,
    factors: BTreeMap<String, FactorValue>,
}

impl HorseEntry {
    pub fn new(horse: Horse, post_position: u8, jockey: impl Into<String>) -> Result<Self, DomainError> {
        validate_post_position(post_position)?;
        Ok(Self {
            horse,
            post_position,
            weight: None,
            weight_change: None,
            odds: None,
            jockey: jockey.into().trim().to_string(),
            factors: BTreeMap::new(),
        })
    }

    /// Body weight in kg and the change since the previous start
    pub fn with_weight(mut self, weight: u16, change: Option<i16>) -> Result<Self, DomainError> {
        if weight == 0 {
            return Err(DomainError::NonPositiveWeight);
        }
        self.weight = Some(weight);
        self.weight_change = change;
        Ok(self)
    }

    pub fn with_odds(mut self, odds: f64) -> Result<Self, DomainError> {
        validate_odds(odds)?;
        self.odds = Some(odds);
        Ok(self)
    }

    pub fn with_factor(mut self, key: impl Into<String>, value: impl Into<FactorValue>) -> Self {
        self.factors.insert(key.into(), value.into());
        self
    }

    pub fn horse(&self) -> &Horse {
        &self.horse
    }

    pub fn post_position(&self) -> u8 {
        self.post_position
    }

    pub fn weight(&self) -> Option<u16> {
        self.weight
    }

    pub fn weight_change(&self) -> Option<i16> {
        self.weight_change
    }

    pub fn odds(&self) -> Option<f64> {
        self.odds
    }

    pub fn jockey(&self) -> &str {
        &self.jockey
    }

    pub fn factors(&self) -> &BTreeMap<String, FactorValue> {
        &self.factors
    }

    pub fn factor(&self, key: &str) -> Option<&FactorValue> {
        self.factors.get(key)
    }
}

/// Race header plus its entries, in scraped order
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RaceInfo {
    course: Option<String>,
    race_name: Option<String>,
    race_date: Option<NaiveDate>,
    track_surface: TrackSurface,
    distance_in_meters: u32,
    track_condition: Option<TrackCondition>,
    weather: Option<Weather>,
    entries: Vec<HorseEntry>,
}

impl RaceInfo {
    pub fn new(track_surface: TrackSurface, distance_in_meters: u32) -> Result<Self, DomainError> {
        validate_distance(distance_in_meters)?;
        Ok(Self {
            course: None,
            race_name: None,
            race_date: None,
            track_surface,
            distance_in_meters,
            track_condition: None,
            weather: None,
            entries: Vec::new(),
        })
    }

    pub fn with_course(mut self, course: impl Into<String>) -> Self {
        self.course = Some(course.into());
        self
    }

    pub fn with_race_name(mut self, race_name: impl Into<String>) -> Self {
        self.race_name = Some(race_name.into());
        self
    }

    pub fn with_race_date(mut self, race_date: NaiveDate) -> Self {
        self.race_date = Some(race_date);
        self
    }

    pub fn with_track_condition(mut self, condition: TrackCondition) -> Self {
        self.track_condition = Some(condition);
        self
    }

    pub fn with_weather(mut self, weather: Weather) -> Self {
        self.weather = Some(weather);
        self
    }

    /// Append an entry; post positions must stay unique
    pub fn push_entry(&mut self, entry: HorseEntry) -> Result<(), DomainError> {
        if self
            .entries
            .iter()
            .any(|e| e.post_position == entry.post_position)
        {
            return Err(DomainError::DuplicatePostPosition(entry.post_position));
        }
        self.entries.push(entry);
        Ok(())
    }

    pub fn course(&self) -> Option<&str> {
        self.course.as_deref()
    }

    pub fn race_name(&self) -> Option<&str> {
        self.race_name.as_deref()
    }

    pub fn race_date(&self) -> Option<NaiveDate> {
        self.race_date
    }

    pub fn track_surface(&self) -> TrackSurface {
        self.track_surface
    }

    pub fn distance_in_meters(&self) -> u32 {
        self.distance_in_meters
    }

    pub fn track_condition(&self) -> Option<TrackCondition> {
        self.track_condition
    }

    pub fn weather(&self) -> Option<Weather> {
        self.weather
    }

    pub fn entries(&self) -> &[HorseEntry] {
        &self.entries
    }

    /// True when every entry carries odds
    pub fn is_fully_priced(&self) -> bool {
        self.entries.iter().all(|e| e.odds.is_some())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn horse(name: &str) -> Horse {
        Horse::new(name, 3, None).unwrap()
    }

    #[test]
    fn test_surface_codes() {
        assert_eq!(TrackSurface::from_code('ダ'), Ok(TrackSurface::Dirt));
        assert_eq!(TrackSurface::from_code('芝'), Ok(TrackSurface::Turf));
        assert!(TrackSurface::from_code('障').is_err());
        assert_eq!(TrackSurface::Turf.code(), '芝');
    }

    #[test]
    fn test_track_condition_labels() {
        assert_eq!(TrackCondition::from_label("良"), Ok(TrackCondition::Good));
        assert_eq!(TrackCondition::from_label("稍重"), Ok(TrackCondition::Firm));
        assert_eq!(TrackCondition::from_label("重"), Ok(TrackCondition::Soft));
        assert_eq!(TrackCondition::from_label("不良"), Ok(TrackCondition::Heavy));
        assert!(TrackCondition::from_label("雪").is_err());
    }

    #[test]
    fn test_weather_labels() {
        assert_eq!(Weather::from_label("晴"), Ok(Weather::Sunny));
        assert_eq!(Weather::from_label("曇"), Ok(Weather::Cloudy));
        assert_eq!(Weather::from_label("小雨"), Ok(Weather::Rainy));
        assert!(Weather::from_label("雪").is_err());
    }

    #[test]
    fn test_trainer_from_combined() {
        let ritto = Trainer::from_combined("栗東田中").unwrap();
        assert_eq!(ritto.training_center(), TrainingCenter::Ritto);
        assert_eq!(ritto.name(), "田中");

        let miho = Trainer::from_combined(" 美浦佐藤 ").unwrap();
        assert_eq!(miho.training_center(), TrainingCenter::Miho);
        assert_eq!(miho.name(), "佐藤");
    }

    #[test]
    fn test_trainer_unknown_center() {
        assert_eq!(
            Trainer::from_combined("大井鈴木"),
            Err(DomainError::UnknownTrainingCenter("大井".to_string()))
        );
        assert!(Trainer::from_combined("栗").is_err());
    }

    #[test]
    fn test_trainer_without_name() {
        assert_eq!(
            Trainer::from_combined("栗東"),
            Err(DomainError::EmptyTrainerName)
        );
    }

    #[test]
    fn test_horse_invariants() {
        assert_eq!(Horse::new("  ", 3, None), Err(DomainError::EmptyHorseName));
        assert_eq!(
            Horse::new("イクイノックス", 0, None),
            Err(DomainError::NonPositiveAge)
        );
        assert_eq!(horse(" イクイノックス ").name(), "イクイノックス");
    }

    #[test]
    fn test_entry_invariants() {
        assert!(HorseEntry::new(horse("A"), 0, "ルメール").is_err());

        let entry = HorseEntry::new(horse("A"), 1, "ルメール").unwrap();
        assert!(entry.clone().with_weight(0, None).is_err());
        assert!(entry.clone().with_odds(-0.1).is_err());

        let entry = entry.with_weight(502, Some(4)).unwrap().with_odds(3.1).unwrap();
        assert_eq!(entry.weight(), Some(502));
        assert_eq!(entry.weight_change(), Some(4));
        assert_eq!(entry.odds(), Some(3.1));
    }

    #[test]
    fn test_entry_factors() {
        let entry = HorseEntry::new(horse("A"), 1, "ルメール")
            .unwrap()
            .with_factor("blinkers", true)
            .with_factor("speed_index", 101.5)
            .with_factor("note", "休み明け");

        assert!(entry.factors().len() == 3);
        assert_eq!(entry.factor("blinkers"), Some(&FactorValue::Flag(true)));
        assert_eq!(entry.factor("speed_index"), Some(&FactorValue::Number(101.5)));
        assert_eq!(
            entry.factor("note"),
            Some(&FactorValue::Text("休み明け".to_string()))
        );
        assert_eq!(entry.factor("missing"), None);
    }

    #[test]
    fn test_race_rejects_zero_distance() {
        assert_eq!(
            RaceInfo::new(TrackSurface::Dirt, 0),
            Err(DomainError::NonPositiveDistance)
        );
    }

    #[test]
    fn test_race_duplicate_post_position() {
        let mut race = RaceInfo::new(TrackSurface::Turf, 2000).unwrap();
        race.push_entry(HorseEntry::new(horse("A"), 1, "x").unwrap())
            .unwrap();
        assert_eq!(
            race.push_entry(HorseEntry::new(horse("B"), 1, "y").unwrap()),
            Err(DomainError::DuplicatePostPosition(1))
        );
        assert_eq!(race.entries().len(), 1);
    }

    #[test]
    fn test_race_fully_priced() {
        let mut race = RaceInfo::new(TrackSurface::Turf, 2000).unwrap();
        race.push_entry(HorseEntry::new(horse("A"), 1, "x").unwrap().with_odds(2.0).unwrap())
            .unwrap();
        assert!(race.is_fully_priced());
        race.push_entry(HorseEntry::new(horse("B"), 2, "y").unwrap())
            .unwrap();
        assert!(!race.is_fully_priced());
    }

    #[test]
    fn test_race_serializes_surface_name() {
        let race = RaceInfo::new(TrackSurface::Dirt, 1600)
            .unwrap()
            .with_course("東京");
        let json = serde_json::to_value(&race).unwrap();
        assert_eq!(json["track_surface"], "DIRT");
        assert_eq!(json["distance_in_meters"], 1600);
        assert_eq!(json["course"], "東京");
    }
}
