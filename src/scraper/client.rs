//! HTTP client for race.netkeiba.com

use super::{
    parse_race_card, parse_race_result, ListingMode, ScrapedRaceCard, ScrapedRaceResult,
    ScraperError,
};
use encoding_rs::{Encoding, EUC_JP};
use std::time::Duration;

/// Length of a netkeiba race id (year, course, meeting, day, race number)
const RACE_ID_LEN: usize = 12;

/// Scraper configuration
#[derive(Debug, Clone)]
pub struct ScraperConfig {
    /// Request timeout in seconds
    pub timeout_secs: u64,
    /// User agent string
    pub user_agent: String,
    /// Scheme and host; overridable for tests and mirrors
    pub base_url: String,
}

impl Default for ScraperConfig {
    fn default() -> Self {
        Self {
            timeout_secs: 30,
            user_agent: "Mozilla/5.0 (Macintosh; Intel Mac OS X 10_15_7) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/120.0.0.0 Safari/537.36".to_string(),
            base_url: "https://race.netkeiba.com".to_string(),
        }
    }
}

/// Check that a race id is exactly 12 ASCII digits
pub fn validate_race_id(race_id: &str) -> Result<(), ScraperError> {
    if race_id.len() == RACE_ID_LEN && race_id.bytes().all(|b| b.is_ascii_digit()) {
        Ok(())
    } else {
        Err(ScraperError::InvalidRaceId(race_id.to_string()))
    }
}

/// Decode a page body using the declared charset, falling back to EUC-JP
pub fn decode_page(bytes: &[u8], charset: Option<&str>) -> String {
    let encoding = charset
        .and_then(|label| Encoding::for_label(label.trim().as_bytes()))
        .unwrap_or(EUC_JP);
    let (text, used, had_errors) = encoding.decode(bytes);
    if had_errors {
        tracing::warn!("Malformed {} sequences replaced while decoding", used.name());
    }
    text.into_owned()
}

fn charset_of(content_type: &str) -> Option<&str> {
    content_type
        .split(';')
        .filter_map(|part| part.trim().split_once('='))
        .find(|(key, _)| key.trim().eq_ignore_ascii_case("charset"))
        .map(|(_, value)| value.trim().trim_matches('"'))
}

/// Race page scraper: one request per call, no retries
pub struct RaceScraper {
    client: reqwest::Client,
    config: ScraperConfig,
}

impl RaceScraper {
    /// Create a new scraper with the given configuration
    pub fn new(config: ScraperConfig) -> Result<Self, ScraperError> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .user_agent(&config.user_agent)
            .build()?;

        Ok(Self { client, config })
    }

    pub fn config(&self) -> &ScraperConfig {
        &self.config
    }

    /// Build URL for a race page ("shutuba" or "result")
    fn build_url(&self, page: &str, race_id: &str) -> String {
        format!(
            "{}/race/{}.html?race_id={}",
            self.config.base_url.trim_end_matches('/'),
            page,
            race_id
        )
    }

    /// Fetch a page and decode it to UTF-8
    async fn fetch_page(&self, url: &str) -> Result<String, ScraperError> {
        let response = self.client.get(url).send().await?;
        let status = response.status();
        if !status.is_success() {
            return Err(ScraperError::HttpStatus {
                status: status.as_u16(),
                url: url.to_string(),
            });
        }

        let charset = response
            .headers()
            .get(reqwest::header::CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .and_then(charset_of)
            .map(str::to_string);
        let bytes = response.bytes().await?;

        Ok(decode_page(&bytes, charset.as_deref()))
    }

    /// Fetch and parse the race card for a race
    pub async fn fetch_race_card(
        &self,
        race_id: &str,
        mode: ListingMode,
    ) -> Result<ScrapedRaceCard, ScraperError> {
        validate_race_id(race_id)?;
        let url = self.build_url("shutuba", race_id);
        tracing::info!("Scraping race card: {}", url);

        let html = self.fetch_page(&url).await?;
        parse_race_card(&html, mode)
    }

    /// Fetch and parse the result page; `Ok(None)` until the result is published
    pub async fn fetch_race_result(
        &self,
        race_id: &str,
    ) -> Result<Option<ScrapedRaceResult>, ScraperError> {
        validate_race_id(race_id)?;
        let url = self.build_url("result", race_id);
        tracing::info!("Scraping race result: {}", url);

        let html = self.fetch_page(&url).await?;
        parse_race_result(&html)
    }
}
