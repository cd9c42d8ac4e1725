use serde::{Serialize, Serializer};
use std::fmt;
use thiserror::Error;

/// Invariant violated while constructing a domain entity
#[derive(Debug, Clone, PartialEq, Error)]
pub enum DomainError {
    #[error("distance must be positive")]
    NonPositiveDistance,

    #[error("unknown track surface code {0:?}")]
    UnknownSurface(String),

    #[error("unknown training center code {0:?}")]
    UnknownTrainingCenter(String),

    #[error("unknown track condition {0:?}")]
    UnknownTrackCondition(String),

    #[error("unknown weather {0:?}")]
    UnknownWeather(String),

    #[error("horse name must not be empty")]
    EmptyHorseName,

    #[error("trainer name must not be empty")]
    EmptyTrainerName,

    #[error("age must be positive")]
    NonPositiveAge,

    #[error("post position must be positive")]
    NonPositivePostPosition,

    #[error("weight must be positive")]
    NonPositiveWeight,

    #[error("odds must be finite and non-negative, got {0}")]
    InvalidOdds(f64),

    #[error("post position {0} is already taken in this race")]
    DuplicatePostPosition(u8),
}

/// Scraped field a failure refers to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Field {
    PostPosition,
    HorseName,
    Age,
    Jockey,
    Trainer,
    Weight,
    Odds,
    SurfaceDistance,
    FinishPosition,
    FinishTime,
}

impl Field {
    pub fn as_str(&self) -> &'static str {
        match self {
            Field::PostPosition => "post_position",
            Field::HorseName => "horse_name",
            Field::Age => "age",
            Field::Jockey => "jockey",
            Field::Trainer => "trainer",
            Field::Weight => "weight",
            Field::Odds => "odds",
            Field::SurfaceDistance => "surface_distance",
            Field::FinishPosition => "finish_position",
            Field::FinishTime => "finish_time",
        }
    }
}

impl fmt::Display for Field {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Why a field could not be extracted
#[derive(Debug, Clone, PartialEq, Error)]
pub enum FailureKind {
    /// Selector matched nothing
    #[error("no matching node")]
    MissingNode,

    /// Text did not follow the field's format
    #[error("unparseable: {0}")]
    Unparseable(String),

    /// Text parsed but broke a domain invariant
    #[error("schema violation: {0}")]
    SchemaViolation(#[from] DomainError),
}

/// Field-level failure, before the row ordinal is attached
#[derive(Debug, Clone, PartialEq, Error)]
#[error("{field}: {kind} (raw: {raw:?})")]
pub struct FieldError {
    pub field: Field,
    pub raw: Option<String>,
    pub kind: FailureKind,
}

impl FieldError {
    pub fn missing(field: Field) -> Self {
        Self {
            field,
            raw: None,
            kind: FailureKind::MissingNode,
        }
    }

    pub fn unparseable(field: Field, raw: &str, reason: impl Into<String>) -> Self {
        Self {
            field,
            raw: Some(raw.to_string()),
            kind: FailureKind::Unparseable(reason.into()),
        }
    }

    pub fn violation(field: Field, raw: &str, error: DomainError) -> Self {
        Self {
            field,
            raw: Some(raw.to_string()),
            kind: FailureKind::SchemaViolation(error),
        }
    }

    pub fn at_row(self, row: usize) -> RowFailure {
        RowFailure {
            row,
            field: self.field,
            raw: self.raw,
            kind: self.kind,
        }
    }
}

/// A skipped table row: ordinal, field, raw text and cause
#[derive(Debug, Clone, PartialEq, Error, Serialize)]
#[error("row {row}: {field}: {kind} (raw: {raw:?})")]
pub struct RowFailure {
    pub row: usize,
    pub field: Field,
    pub raw: Option<String>,
    #[serde(serialize_with = "serialize_display")]
    pub kind: FailureKind,
}

fn serialize_display<T: fmt::Display, S: Serializer>(value: &T, serializer: S) -> Result<S::Ok, S::Error> {
    serializer.collect_str(value)
}

impl RowFailure {
    pub fn is_schema_violation(&self) -> bool {
        matches!(self.kind, FailureKind::SchemaViolation(_))
    }
}

/// Ranking requested for a race whose field is not fully priced
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("odds missing for post positions {missing:?}; ranking needs every entry priced")]
pub struct IncompleteOddsError {
    pub missing: Vec<u8>,
}

/// Validation functions
pub fn validate_post_position(post_position: u8) -> Result<(), DomainError> {
    if post_position == 0 {
        return Err(DomainError::NonPositivePostPosition);
    }
    Ok(())
}

pub fn validate_odds(odds: f64) -> Result<(), DomainError> {
    // Sign bit, so -0.0 is rejected as well
    if !odds.is_finite() || odds.is_sign_negative() {
        return Err(DomainError::InvalidOdds(odds));
    }
    Ok(())
}

pub fn validate_distance(distance: u32) -> Result<(), DomainError> {
    if distance == 0 {
        return Err(DomainError::NonPositiveDistance);
    }
    Ok(())
}
