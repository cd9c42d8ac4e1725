//! Race result parser for race.netkeiba.com
//!
//! Parses table#All_Result_Table. The table only exists once the result is
//! confirmed, so its absence means the race has not been run (or published).

use super::fields::{
    element_text, link_identifier, parse_age, parse_finish_position, parse_odds, parse_trainer,
    parse_weight, parse_weight_to_carry,
};
use super::race_card::{selector, ExtractionOutcome};
use super::ScraperError;
use crate::error::{Field, FieldError, RowFailure};
use crate::models::Trainer;
use scraper::{ElementRef, Html, Selector};
use serde::Serialize;

/// URL for race result page
const RESULT_URL: &str = "https://race.netkeiba.com/race/result.html";

/// One finisher (or scratch) from the result table
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ResultRow {
    pub row: usize,
    /// None for scratched / excluded / non-finishing horses
    pub finish_position: Option<u8>,
    pub horse_name: String,
    pub horse_id: Option<String>,
    pub sex: Option<char>,
    pub age: Option<u8>,
    pub weight_to_carry: Option<f64>,
    pub jockey_name: Option<String>,
    pub jockey_id: Option<String>,
    pub finish_time: Option<String>,
    pub margin: Option<String>,
    pub final_3f: Option<String>,
    pub odds: Option<f64>,
    pub trainer: Option<Trainer>,
    pub trainer_id: Option<String>,
    pub weight: Option<(u16, i16)>,
}

#[derive(Debug, Clone)]
pub struct ScrapedRaceResult {
    pub rows: Vec<ResultRow>,
    pub failures: Vec<RowFailure>,
}

impl ScrapedRaceResult {
    /// Build URL for race result page
    pub fn url(race_id: &str) -> String {
        format!("{}?race_id={}", RESULT_URL, race_id)
    }

    pub fn outcome(&self) -> ExtractionOutcome {
        ExtractionOutcome::from_counts(self.rows.len(), self.failures.len())
    }

    /// Finishers in finishing order
    pub fn finishers(&self) -> Vec<&ResultRow> {
        let mut finishers: Vec<&ResultRow> = self
            .rows
            .iter()
            .filter(|r| r.finish_position.is_some())
            .collect();
        finishers.sort_by_key(|r| r.finish_position);
        finishers
    }
}

pub struct RaceResultParser {
    table: Selector,
    rows: Selector,
    rank: Selector,
    horse_info: Selector,
    horse_link: Selector,
    sex_age: Selector,
    weight_to_carry: Selector,
    jockey: Selector,
    link: Selector,
    time: Selector,
    odds: Selector,
    trainer: Selector,
    weight: Selector,
}

impl RaceResultParser {
    pub fn new() -> Result<Self, ScraperError> {
        Ok(Self {
            table: selector("table#All_Result_Table")?,
            rows: selector("tr.HorseList")?,
            rank: selector(".Rank, .Result_Num")?,
            horse_info: selector(".Horse_Info")?,
            horse_link: selector("a[href*='/horse/']")?,
            sex_age: selector(".Lgt_Txt")?,
            weight_to_carry: selector(".JockeyWeight")?,
            jockey: selector(".Jockey")?,
            link: selector("a[href]")?,
            time: selector(".Time")?,
            odds: selector(".Odds")?,
            trainer: selector(".Trainer")?,
            weight: selector(".Weight")?,
        })
    }

    /// Parse a result page; `Ok(None)` when no result table is present
    pub fn parse(&self, html: &str) -> Result<Option<ScrapedRaceResult>, ScraperError> {
        let document = Html::parse_document(html);
        let Some(table) = document.select(&self.table).next() else {
            return Ok(None);
        };

        let mut rows = Vec::new();
        let mut failures = Vec::new();

        for (ordinal, row) in table.select(&self.rows).enumerate() {
            match self.extract_row(&row, ordinal) {
                Ok(result) => rows.push(result),
                Err(failure) => {
                    tracing::warn!("Skipping result row: {}", failure);
                    failures.push(failure);
                }
            }
        }

        tracing::info!(
            "Extracted {} result rows ({} failed)",
            rows.len(),
            failures.len()
        );

        Ok(Some(ScrapedRaceResult { rows, failures }))
    }

    pub fn extract_row(&self, row: &ElementRef, ordinal: usize) -> Result<ResultRow, RowFailure> {
        self.extract_fields(row, ordinal)
            .map_err(|e| e.at_row(ordinal))
    }

    fn extract_fields(&self, row: &ElementRef, ordinal: usize) -> Result<ResultRow, FieldError> {
        let rank_text = row
            .select(&self.rank)
            .next()
            .map(|el| element_text(&el))
            .ok_or_else(|| FieldError::missing(Field::FinishPosition))?;
        let finish_position = parse_finish_position(&rank_text)?;
        let finished = finish_position.is_some();

        let horse_cell = row
            .select(&self.horse_info)
            .next()
            .ok_or_else(|| FieldError::missing(Field::HorseName))?;
        let horse_name = element_text(&horse_cell);
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

        let (sex, age) = match self.optional_text(row, &self.sex_age) {
            Some(text) => {
                let (sex, age) = parse_age(&text)?;
                (Some(sex), Some(age))
            }
            None => (None, None),
        };

        let times: Vec<String> = row.select(&self.time).map(|el| element_text(&el)).collect();
        let (finish_time, margin, final_3f) = match times.as_slice() {
            [time, margin, last] => (non_empty(time), non_empty(margin), non_empty(last)),
            _ if !finished => (None, None, None),
            _ => {
                return Err(FieldError::unparseable(
                    Field::FinishTime,
                    &times.join("|"),
                    format!("expected 3 time cells, found {}", times.len()),
                ))
            }
        };

        let jockey_cell = row.select(&self.jockey).next();
        let jockey_name = jockey_cell.map(|el| element_text(&el)).and_then(|t| non_empty(&t));
        let jockey_id = jockey_cell.and_then(|el| self.link_id(&el));

        let trainer_cell = row.select(&self.trainer).next();
        let trainer = match trainer_cell.map(|el| element_text(&el)) {
            Some(text) if !text.is_empty() => Some(parse_trainer(&text)?),
            _ => None,
        };
        let trainer_id = trainer_cell.and_then(|el| self.link_id(&el));

        // Scratched horses carry placeholders ("計不", "---") in these cells
        let odds = row
            .select(&self.odds)
            .map(|el| element_text(&el))
            .find(|t| t.contains('.'))
            .map(|t| parse_odds(&t))
            .transpose()
            .or_else(|e| if finished { Err(e) } else { Ok(None) })?;

        let weight = self
            .optional_text(row, &self.weight)
            .map(|t| parse_weight(&t))
            .transpose()
            .or_else(|e| if finished { Err(e) } else { Ok(None) })?;

        let weight_to_carry = self
            .optional_text(row, &self.weight_to_carry)
            .and_then(|t| parse_weight_to_carry(&t));

        Ok(ResultRow {
            row: ordinal,
            finish_position,
            horse_name,
            horse_id,
            sex,
            age,
            weight_to_carry,
            jockey_name,
            jockey_id,
            finish_time,
            margin,
            final_3f,
            odds,
            trainer,
            trainer_id,
            weight,
        })
    }

    fn optional_text(&self, row: &ElementRef, selector: &Selector) -> Option<String> {
        row.select(selector)
            .next()
            .map(|el| element_text(&el))
            .filter(|t| !t.is_empty())
    }

    fn link_id(&self, cell: &ElementRef) -> Option<String> {
        cell.select(&self.link)
            .next()
            .and_then(|a| a.value().attr("href"))
            .and_then(link_identifier)
    }
}

fn non_empty(text: &str) -> Option<String> {
    let text = text.trim();
    (!text.is_empty()).then(|| text.to_string())
}

/// Parse a result page with freshly compiled selectors
pub fn parse_race_result(html: &str) -> Result<Option<ScrapedRaceResult>, ScraperError> {
    RaceResultParser::new()?.parse(html)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::TrainingCenter;

    fn result_row(rank: &str, horse_id: &str, name: &str, time: &str, odds: &str, weight: &str) -> String {
        format!(
            r#"<tr class="HorseList">
                <td class="Result_Num"><div class="Rank">{rank}</div></td>
                <td class="Num Waku1"><div>1</div></td>
                <td class="Horse_Info"><span class="Horse_Name">
                    <a href="https://db.netkeiba.com/horse/{horse_id}" target="_blank">{name}</a></span></td>
                <td class="Horse_Info Txt_C"><span class="Lgt_Txt Txt_C">牡3</span></td>
                <td class="Jockey_Info"><span class="JockeyWeight">57.0</span></td>
                <td class="Jockey"><a href="https://db.netkeiba.com/jockey/result/recent/01167/">ルメール</a></td>
                <td class="Time"><span class="RaceTime">{time}</span></td>
                <td class="Time"><span class="RaceTime"></span></td>
                <td class="Odds Txt_C"><span class="OddsPeople">1</span></td>
                <td class="Odds Txt_R"><span class="Odds_Ninki">{odds}</span></td>
                <td class="Time BgBlue02"><span>33.5</span></td>
                <td class="Trainer"><span class="Label1">美浦</span>
                    <a href="https://db.netkeiba.com/trainer/result/recent/01070/">木村</a></td>
                <td class="Weight">{weight}</td>
            </tr>"#
        )
    }

    fn result_page(rows: &[String]) -> String {
        format!(
            r#"<html><body><table id="All_Result_Table"><tbody>{}</tbody></table></body></html>"#,
            rows.join("\n")
        )
    }

    #[test]
    fn test_result_url() {
        assert_eq!(
            ScrapedRaceResult::url("202405021211"),
            "https://race.netkeiba.com/race/result.html?race_id=202405021211"
        );
    }

    #[test]
    fn test_no_result_table() {
        let html = "<html><body><p>結果確定前</p></body></html>";
        assert!(parse_race_result(html).unwrap().is_none());
    }

    #[test]
    fn test_parse_result_rows() {
        let html = result_page(&[
            result_row("2", "2021105898", "ジャスティンミラノ", "2:24.5", "2.2", "480(-6)"),
            result_row("1", "2021104816", "ダノンデサイル", "2:24.3", "46.6", "502(+4)"),
        ]);
        let result = parse_race_result(&html).unwrap().unwrap();

        assert_eq!(result.outcome(), ExtractionOutcome::Complete);
        assert_eq!(result.rows.len(), 2);

        let winner = result.finishers()[0];
        assert_eq!(winner.finish_position, Some(1));
        assert_eq!(winner.horse_name, "ダノンデサイル");
        assert_eq!(winner.horse_id.as_deref(), Some("2021104816"));
        assert_eq!(winner.sex, Some('牡'));
        assert_eq!(winner.age, Some(3));
        assert_eq!(winner.finish_time.as_deref(), Some("2:24.3"));
        assert_eq!(winner.margin, None);
        assert_eq!(winner.final_3f.as_deref(), Some("33.5"));
        assert_eq!(winner.odds, Some(46.6));
        assert_eq!(winner.weight, Some((502, 4)));
        assert_eq!(winner.weight_to_carry, Some(57.0));
        assert_eq!(winner.jockey_id.as_deref(), Some("01167"));
        assert_eq!(winner.trainer_id.as_deref(), Some("01070"));
        assert_eq!(
            winner.trainer.as_ref().map(|t| t.training_center()),
            Some(TrainingCenter::Miho)
        );
    }

    #[test]
    fn test_scratched_row_kept() {
        let html = result_page(&[
            result_row("1", "2021104816", "A", "2:24.3", "46.6", "502(+4)"),
            result_row("取消", "2021100001", "B", "", "---", "計不"),
        ]);
        let result = parse_race_result(&html).unwrap().unwrap();

        assert_eq!(result.outcome(), ExtractionOutcome::Complete);
        let scratched = &result.rows[1];
        assert_eq!(scratched.finish_position, None);
        assert_eq!(scratched.weight, None);
        assert_eq!(scratched.odds, None);
        assert_eq!(result.finishers().len(), 1);
    }

    #[test]
    fn test_bad_finisher_row_reported() {
        let html = result_page(&[
            result_row("1", "2021104816", "A", "2:24.3", "46.6", "502(+4)"),
            result_row("2", "2021105898", "B", "2:24.5", "2.2", "計不"),
        ]);
        let result = parse_race_result(&html).unwrap().unwrap();

        assert_eq!(result.outcome(), ExtractionOutcome::Partial { failed: 1 });
        assert_eq!(result.failures[0].row, 1);
        assert_eq!(result.failures[0].field, Field::Weight);
    }
}
