use async_trait::async_trait;
use chrono::{Duration, Local, NaiveDate};
use log::{debug, info};
use once_cell::sync::Lazy;
use regex::Regex;
use reqwest::Client;
use serde::Deserialize;

use super::client::{ClientConfig, SourceAdapter, TopicQuery};
use super::http_client::{build_client, get_json_text, with_params};
use super::types::{PublishedAt, RetrievalOutcome, SourceRecord, Speech};
use super::SourceKind;
use crate::error::{PolsigError, Result};

const BASE_URL: &str = "https://kokkai.ndl.go.jp/api/speech";
const DEFAULT_MAX_RECORDS: u32 = 100;
const DEFAULT_LOOKBACK_DAYS: i64 = 365;

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct SpeechResponse {
    #[serde(default)]
    speech_record: Vec<RawSpeech>,
    /// Present only on error envelopes
    message: Option<String>,
    #[serde(default)]
    details: Vec<serde_json::Value>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawSpeech {
    #[serde(rename = "speechID", default)]
    speech_id: String,
    #[serde(default)]
    date: String,
    #[serde(default)]
    name_of_meeting: String,
    #[serde(default)]
    speaker: String,
    #[serde(default)]
    speech: String,
    #[serde(rename = "speechURL")]
    speech_url: Option<String>,
}

impl From<RawSpeech> for Speech {
    fn from(raw: RawSpeech) -> Self {
        Speech {
            id: raw.speech_id,
            date: raw.date,
            meeting: raw.name_of_meeting,
            speaker: raw.speaker,
            text: raw.speech,
            url: raw.speech_url,
        }
    }
}

/// Search conditions for the speech archive
#[derive(Debug, Clone, Default)]
pub struct SpeechQuery {
    pub any: Option<String>,
    pub from: Option<String>,
    pub until: Option<String>,
    pub speaker: Option<String>,
    pub maximum_records: Option<u32>,
}

/// chrono alone accepts single-digit months and days; the API does not
static DATE_SHAPE: Lazy<Option<Regex>> = Lazy::new(|| Regex::new(r"^\d{4}-\d{2}-\d{2}$").ok());

fn validate_date(field: &str, value: &str) -> Result<()> {
    let shaped = DATE_SHAPE.as_ref().map(|re| re.is_match(value)).unwrap_or(true);
    if shaped && NaiveDate::parse_from_str(value, "%Y-%m-%d").is_ok() {
        Ok(())
    } else {
        Err(PolsigError::InvalidInput(format!("{} must be YYYY-MM-DD, got {}", field, value)))
    }
}

pub fn speech_to_record(speech: Speech) -> SourceRecord {
    let title = format!("{} {}", speech.meeting, speech.speaker).trim().to_string();
    let published_at = PublishedAt::parse(&speech.date);
    SourceRecord::new(
        SourceKind::Diet.display_name(),
        title,
        speech.text,
        speech.url,
        published_at,
    )
}

/// Client for the National Diet speech archive
#[derive(Clone)]
pub struct DietClient {
    config: ClientConfig,
    http_client: Client,
    base_url: String,
    lookback_days: i64,
}

impl DietClient {
    pub fn new(config: ClientConfig) -> Result<Self> {
        Self::with_base_url(config, BASE_URL)
    }

    pub fn with_base_url(config: ClientConfig, base_url: impl Into<String>) -> Result<Self> {
        let http_client = build_client(&config)?;
        Ok(Self {
            config,
            http_client,
            base_url: base_url.into(),
            lookback_days: DEFAULT_LOOKBACK_DAYS,
        })
    }

    /// Window used when aggregating, ending at the query's `until`
    pub fn with_lookback_days(mut self, days: i64) -> Self {
        self.lookback_days = days;
        self
    }

    pub async fn fetch_speeches(&self, query: &SpeechQuery) -> Result<Vec<Speech>> {
        let max = query.maximum_records.unwrap_or(DEFAULT_MAX_RECORDS).to_string();
        let mut params: Vec<(&str, String)> = vec![
            ("maximumRecords", max),
            ("recordPacking", "json".to_string()),
        ];
        if let Some(any) = query.any.as_deref().filter(|s| !s.trim().is_empty()) {
            params.push(("any", any.to_string()));
        }
        if let Some(from) = &query.from {
            validate_date("from", from)?;
            params.push(("from", from.clone()));
        }
        if let Some(until) = &query.until {
            validate_date("until", until)?;
            params.push(("until", until.clone()));
        }
        if let Some(speaker) = query.speaker.as_deref().filter(|s| !s.trim().is_empty()) {
            params.push(("speaker", speaker.to_string()));
        }

        let url = reqwest::Url::parse(&self.base_url)
            .map_err(|e| PolsigError::Parse(format!("Invalid URL {}: {}", self.base_url, e)))?;
        let url = with_params(url, &params);
        debug!("Fetching from Diet API: {}", url);

        let text = get_json_text(&self.http_client, &self.config, &url).await?;
        let response: SpeechResponse = serde_json::from_str(&text)
            .map_err(|e| PolsigError::invalid_response("PARSE", format!("speech archive: {}", e)))?;

        if let Some(message) = response.message {
            let detail = if response.details.is_empty() {
                message
            } else {
                let details: Vec<String> = response
                    .details
                    .iter()
                    .map(|d| d.as_str().map(str::to_string).unwrap_or_else(|| d.to_string()))
                    .collect();
                format!("{} ({})", message, details.join(", "))
            };
            return Err(PolsigError::invalid_response("DIET_API", detail));
        }

        let speeches: Vec<Speech> = response.speech_record.into_iter().map(Speech::from).collect();
        info!("Diet API: {} speeches", speeches.len());
        Ok(speeches)
    }

    /// Speeches mentioning `keyword` between two `YYYY-MM-DD` dates
    pub async fn fetch_legislative_speeches(
        &self,
        keyword: &str,
        from_date: &str,
        until_date: &str,
    ) -> RetrievalOutcome<SourceRecord> {
        let query = SpeechQuery {
            any: Some(keyword.to_string()),
            from: Some(from_date.to_string()),
            until: Some(until_date.to_string()),
            ..Default::default()
        };
        self.fetch_speeches(&query)
            .await
            .map(|speeches| speeches.into_iter().map(speech_to_record).collect())
            .into()
    }
}

#[async_trait]
impl SourceAdapter for DietClient {
    async fn retrieve(&self, query: &TopicQuery) -> Result<RetrievalOutcome<SourceRecord>> {
        let until = query.until.unwrap_or_else(|| Local::now().date_naive());
        let from = query
            .from
            .unwrap_or_else(|| until - Duration::days(self.lookback_days));
        let speech_query = SpeechQuery {
            any: Some(query.joined(" ")),
            from: Some(from.format("%Y-%m-%d").to_string()),
            until: Some(until.format("%Y-%m-%d").to_string()),
            ..Default::default()
        };
        let speeches = self.fetch_speeches(&speech_query).await?;
        Ok(RetrievalOutcome::ok(
            speeches.into_iter().map(speech_to_record).collect(),
        ))
    }

    fn kind(&self) -> SourceKind {
        SourceKind::Diet
    }
}
