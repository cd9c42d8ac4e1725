//! Per-field parsing rules for netkeiba race tables
//!
//! Each function takes the trimmed text of one cell and returns a typed value
//! or a [`FieldError`] carrying the raw text. Selector work lives in
//! `race_card` / `race_result`; everything here is plain string handling.

use crate::error::{validate_distance, validate_odds, DomainError, Field, FieldError};
use crate::models::{TrackSurface, Trainer};
use scraper::ElementRef;

/// Post position slots are labeled Umaban1..Umaban8
pub const MAX_POST_POSITION: u8 = 8;

const POST_POSITION_CLASS_PREFIX: &str = "Umaban";

/// Trimmed text content of an element
pub fn element_text(element: &ElementRef) -> String {
    element.text().collect::<String>().trim().to_string()
}

/// Slot number encoded in a post position class (e.g. "Umaban3" -> 3)
pub fn post_position_slot(class: &str) -> Option<u8> {
    let digits = class.strip_prefix(POST_POSITION_CLASS_PREFIX)?;
    if digits.is_empty() || !digits.chars().all(|c| c.is_ascii_digit()) {
        return None;
    }
    let slot = digits.parse::<u8>().ok()?;
    (1..=MAX_POST_POSITION).contains(&slot).then_some(slot)
}

/// Parse post position text; must be an integer in 1..=8
pub fn parse_post_position(text: &str) -> Result<u8, FieldError> {
    let text = text.trim();
    if text.is_empty() || !text.chars().all(|c| c.is_ascii_digit()) {
        return Err(FieldError::unparseable(
            Field::PostPosition,
            text,
            "expected an integer",
        ));
    }

    match text.parse::<u8>() {
        Ok(n) if (1..=MAX_POST_POSITION).contains(&n) => Ok(n),
        Ok(0) => Err(FieldError::violation(
            Field::PostPosition,
            text,
            DomainError::NonPositivePostPosition,
        )),
        _ => Err(FieldError::unparseable(
            Field::PostPosition,
            text,
            format!("expected 1-{}", MAX_POST_POSITION),
        )),
    }
}

/// Parse sex/age text such as "牡3" into (sex code, age)
pub fn parse_age(text: &str) -> Result<(char, u8), FieldError> {
    let text = text.trim();
    let mut chars = text.chars();
    let sex = chars
        .next()
        .ok_or_else(|| FieldError::unparseable(Field::Age, text, "empty sex/age cell"))?;
    if sex.is_ascii_digit() {
        return Err(FieldError::unparseable(Field::Age, text, "missing sex code"));
    }

    let age = chars
        .as_str()
        .trim()
        .parse::<u8>()
        .map_err(|e| FieldError::unparseable(Field::Age, text, e.to_string()))?;
    if age == 0 {
        return Err(FieldError::violation(Field::Age, text, DomainError::NonPositiveAge));
    }

    Ok((sex, age))
}

/// Split "栗東田中" style trainer text
pub fn parse_trainer(text: &str) -> Result<Trainer, FieldError> {
    // The center label and the name sit in separate inline elements
    let compact: String = text.split_whitespace().collect();
    Trainer::from_combined(&compact).map_err(|e| FieldError::violation(Field::Trainer, text, e))
}

/// Parse body weight text "502(+4)" into (weight, change)
pub fn parse_weight(text: &str) -> Result<(u16, i16), FieldError> {
    let text = text.trim();
    let (weight, change) = text
        .split_once('(')
        .ok_or_else(|| FieldError::unparseable(Field::Weight, text, "expected <int>(<signed-int>)"))?;
    let change = change
        .strip_suffix(')')
        .ok_or_else(|| FieldError::unparseable(Field::Weight, text, "missing closing parenthesis"))?;

    let weight = weight
        .trim()
        .parse::<u16>()
        .map_err(|e| FieldError::unparseable(Field::Weight, text, e.to_string()))?;
    if weight == 0 {
        return Err(FieldError::violation(
            Field::Weight,
            text,
            DomainError::NonPositiveWeight,
        ));
    }

    let change = change
        .trim()
        .parse::<i16>()
        .map_err(|e| FieldError::unparseable(Field::Weight, text, e.to_string()))?;

    Ok((weight, change))
}

/// Format (weight, change) the way the site prints it; no change is "(0)"
pub fn format_weight(weight: u16, change: i16) -> String {
    if change == 0 {
        format!("{}(0)", weight)
    } else {
        format!("{}({:+})", weight, change)
    }
}

/// Parse win odds text
pub fn parse_odds(text: &str) -> Result<f64, FieldError> {
    let text = text.trim();
    let odds = text
        .replace(',', "")
        .parse::<f64>()
        .map_err(|e| FieldError::unparseable(Field::Odds, text, e.to_string()))?;
    validate_odds(odds).map_err(|e| FieldError::violation(Field::Odds, text, e))?;
    Ok(odds)
}

/// Odds cells show "---.-" (or nothing) until betting opens
pub fn is_odds_placeholder(text: &str) -> bool {
    text.trim().chars().all(|c| c == '-' || c == '.')
}

/// Parse "ダ1600m" / "芝2000m" into (surface, distance)
pub fn parse_surface_distance(text: &str) -> Result<(TrackSurface, u32), FieldError> {
    let text = text.trim();
    let mut chars = text.chars();
    let code = chars
        .next()
        .ok_or_else(|| FieldError::unparseable(Field::SurfaceDistance, text, "empty course text"))?;
    let surface = TrackSurface::from_code(code)
        .map_err(|e| FieldError::violation(Field::SurfaceDistance, text, e))?;

    let rest = chars.as_str();
    // db.netkeiba.com writes the direction first: 芝右2500m
    let rest = rest.strip_prefix(&['右', '左', '直'][..]).unwrap_or(rest);
    let digits = rest.trim().trim_end_matches(|c: char| !c.is_ascii_digit());

    let distance = digits
        .parse::<u32>()
        .map_err(|e| FieldError::unparseable(Field::SurfaceDistance, text, e.to_string()))?;
    validate_distance(distance).map_err(|e| FieldError::violation(Field::SurfaceDistance, text, e))?;

    Ok((surface, distance))
}

/// Parse a finish position; scratches (取消, 除外, 中止, 失格) have none
pub fn parse_finish_position(text: &str) -> Result<Option<u8>, FieldError> {
    let text = text.trim();
    if let Ok(pos) = text.parse::<u8>() {
        if pos > 0 {
            return Ok(Some(pos));
        }
    }
    if ["取消", "除外", "中止", "失格"].iter().any(|s| text.contains(s)) {
        return Ok(None);
    }
    Err(FieldError::unparseable(
        Field::FinishPosition,
        text,
        "expected a finishing place",
    ))
}

/// Weight to carry (斤量), e.g. "57.0"
pub fn parse_weight_to_carry(text: &str) -> Option<f64> {
    let value = text.trim().parse::<f64>().ok()?;
    (value.is_finite() && value > 0.0).then_some(value)
}

/// Site identifier from a link: its last path segment
///
/// A trailing slash or query does not count as a segment, so
/// ".../jockey/result/recent/01167/" yields "01167".
pub fn link_identifier(href: &str) -> Option<String> {
    let path = href.split(&['?', '#'][..]).next()?;
    let segment = path.trim_end_matches('/').rsplit('/').next()?;
    if segment.is_empty() {
        None
    } else {
        Some(segment.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::FailureKind;
    use crate::models::TrainingCenter;
    use proptest::prelude::*;

    #[test]
    fn test_post_position_slot() {
        assert_eq!(post_position_slot("Umaban1"), Some(1));
        assert_eq!(post_position_slot("Umaban8"), Some(8));
        assert_eq!(post_position_slot("Umaban9"), None);
        assert_eq!(post_position_slot("Umaban"), None);
        assert_eq!(post_position_slot("Umaban+1"), None);
        assert_eq!(post_position_slot("Waku1"), None);
    }

    #[test]
    fn test_parse_post_position() {
        for n in 1..=8u8 {
            assert_eq!(parse_post_position(&n.to_string()), Ok(n));
        }
        assert_eq!(parse_post_position(" 3 "), Ok(3));
        assert!(parse_post_position("0").is_err());
        assert!(parse_post_position("9").is_err());
        assert!(parse_post_position("18").is_err());
        assert!(parse_post_position("").is_err());
        assert!(parse_post_position("abc").is_err());
        assert!(parse_post_position("+1").is_err());
    }

    #[test]
    fn test_parse_age() {
        assert_eq!(parse_age("牡3"), Ok(('牡', 3)));
        assert_eq!(parse_age("牝5"), Ok(('牝', 5)));
        assert_eq!(parse_age("セ10"), Ok(('セ', 10)));
        assert!(parse_age("").is_err());
        assert!(parse_age("3").is_err());
        assert!(parse_age("牡").is_err());
        assert!(matches!(
            parse_age("牡0").unwrap_err().kind,
            FailureKind::SchemaViolation(DomainError::NonPositiveAge)
        ));
    }

    #[test]
    fn test_parse_trainer() {
        let trainer = parse_trainer("栗東田中").unwrap();
        assert_eq!(trainer.training_center(), TrainingCenter::Ritto);
        assert_eq!(trainer.name(), "田中");

        let trainer = parse_trainer("美浦\n  佐藤").unwrap();
        assert_eq!(trainer.training_center(), TrainingCenter::Miho);
        assert_eq!(trainer.name(), "佐藤");

        let err = parse_trainer("地方鈴木").unwrap_err();
        assert_eq!(err.field, Field::Trainer);
        assert_eq!(err.raw.as_deref(), Some("地方鈴木"));
        assert!(matches!(
            err.kind,
            FailureKind::SchemaViolation(DomainError::UnknownTrainingCenter(_))
        ));
    }

    #[test]
    fn test_parse_weight() {
        assert_eq!(parse_weight("502(+4)"), Ok((502, 4)));
        assert_eq!(parse_weight("480(-6)"), Ok((480, -6)));
        assert_eq!(parse_weight("466(0)"), Ok((466, 0)));
        assert!(parse_weight("計不").is_err());
        assert!(parse_weight("502").is_err());
        assert!(parse_weight("502(+4").is_err());
        assert!(parse_weight("(+4)").is_err());
        assert!(matches!(
            parse_weight("0(+4)").unwrap_err().kind,
            FailureKind::SchemaViolation(DomainError::NonPositiveWeight)
        ));
    }

    #[test]
    fn test_format_weight() {
        assert_eq!(format_weight(502, 4), "502(+4)");
        assert_eq!(format_weight(480, -6), "480(-6)");
        assert_eq!(format_weight(466, 0), "466(0)");
        assert_eq!(parse_weight("466(0)").map(|(w, c)| format_weight(w, c)), Ok("466(0)".to_string()));
    }

    #[test]
    fn test_parse_odds() {
        assert_eq!(parse_odds("3.1"), Ok(3.1));
        assert_eq!(parse_odds(" 12.5 "), Ok(12.5));
        assert_eq!(parse_odds("1,234.5"), Ok(1234.5));
        assert!(parse_odds("---.-").is_err());
        assert!(parse_odds("-1.0").is_err());
        assert!(parse_odds("NaN").is_err());
        assert!(parse_odds("-0").is_err());
    }

    #[test]
    fn test_odds_placeholder() {
        assert!(is_odds_placeholder("---.-"));
        assert!(is_odds_placeholder(""));
        assert!(!is_odds_placeholder("3.1"));
    }

    #[test]
    fn test_parse_surface_distance() {
        assert_eq!(
            parse_surface_distance("ダ1600m"),
            Ok((TrackSurface::Dirt, 1600))
        );
        assert_eq!(
            parse_surface_distance("芝2000m"),
            Ok((TrackSurface::Turf, 2000))
        );
        assert_eq!(
            parse_surface_distance("芝右2500m"),
            Ok((TrackSurface::Turf, 2500))
        );
        assert!(parse_surface_distance("").is_err());
        assert!(parse_surface_distance("障3000m").is_err());
        assert!(parse_surface_distance("芝m").is_err());
        assert!(matches!(
            parse_surface_distance("ダ0m").unwrap_err().kind,
            FailureKind::SchemaViolation(DomainError::NonPositiveDistance)
        ));
    }

    #[test]
    fn test_parse_finish_position() {
        assert_eq!(parse_finish_position("1"), Ok(Some(1)));
        assert_eq!(parse_finish_position("12"), Ok(Some(12)));
        assert_eq!(parse_finish_position("取消"), Ok(None));
        assert_eq!(parse_finish_position("除外"), Ok(None));
        assert!(parse_finish_position("").is_err());
    }

    #[test]
    fn test_parse_weight_to_carry() {
        assert_eq!(parse_weight_to_carry("57.0"), Some(57.0));
        assert_eq!(parse_weight_to_carry("55"), Some(55.0));
        assert_eq!(parse_weight_to_carry(""), None);
    }

    #[test]
    fn test_link_identifier() {
        assert_eq!(
            link_identifier("https://db.netkeiba.com/horse/2019105219"),
            Some("2019105219".to_string())
        );
        assert_eq!(
            link_identifier("https://db.netkeiba.com/jockey/result/recent/01167/"),
            Some("01167".to_string())
        );
        assert_eq!(
            link_identifier("https://db.netkeiba.com/trainer/result/recent/01070/?rf=shutuba"),
            Some("01070".to_string())
        );
        assert_eq!(link_identifier(""), None);
    }

    proptest! {
        #[test]
        fn prop_weight_round_trip(weight in 1u16..1000, change in -99i16..100) {
            let text = format_weight(weight, change);
            prop_assert_eq!(parse_weight(&text), Ok((weight, change)));
            prop_assert_eq!(format_weight(weight, change), text);
        }

        #[test]
        fn prop_post_position_out_of_range_fails(n in 9u32..10_000) {
            prop_assert!(parse_post_position(&n.to_string()).is_err());
        }
    }
}
