//! e-Stat statistics client.
//!
//! `getStatsData` is unreliable in two ways: it sometimes serves an HTML
//! page instead of JSON, and it answers overly broad queries with a status
//! code rather than data. `AdaptiveQuery` retries through an ordered list of
//! parameter strategies until one yields values.

use async_trait::async_trait;
use log::{debug, info, warn};
use reqwest::Client;
use serde::Deserialize;
use std::collections::HashSet;
use std::future::Future;

use super::client::{ClientConfig, SourceAdapter, TopicQuery};
use super::deserializers::{single_or_vec, string_or_number, text_or_node};
use super::http_client::{build_client, endpoint, get_json_text, get_text, with_params};
use super::types::{
    IndicatorPoint, IndicatorQuery, PublishedAt, QueryStrategy, RetrievalOutcome, SourceRecord,
    StatsTable,
};
use super::SourceKind;
use crate::error::{PolsigError, Result};

const BASE_URL: &str = "https://www.e-stat.go.jp/api/ex-api/3.0/json";
pub const MAX_ATTEMPTS: usize = 3;
/// Statuses meaning the query matched too much and needs narrowing
const TOO_BROAD_STATUSES: [u32; 2] = [1, 2];
const DEFAULT_DATA_LIMIT: u32 = 5;
const SEARCH_LIMIT: u32 = 10;
const TARGET_UNIQUE_TABLES: usize = 5;

#[derive(Debug, Deserialize)]
struct StatsDataEnvelope {
    #[serde(rename = "GET_STATS_DATA")]
    data: Option<StatsData>,
}

#[derive(Debug, Deserialize)]
struct StatsData {
    #[serde(rename = "RESULT")]
    result: ResultInf,
    #[serde(rename = "STATISTICAL_DATA")]
    statistical_data: Option<StatisticalData>,
}

#[derive(Debug, Deserialize)]
struct ResultInf {
    #[serde(rename = "STATUS", deserialize_with = "string_or_number")]
    status: String,
    #[serde(rename = "ERROR_MSG", default)]
    error_msg: String,
}

#[derive(Debug, Deserialize)]
struct StatisticalData {
    #[serde(rename = "DATA_INF")]
    data_inf: Option<DataInf>,
}

#[derive(Debug, Deserialize)]
struct DataInf {
    #[serde(rename = "VALUE", default, deserialize_with = "single_or_vec")]
    values: Vec<RawValue>,
}

#[derive(Debug, Deserialize)]
struct RawValue {
    #[serde(rename = "@time", default)]
    time: String,
    #[serde(rename = "@unit")]
    unit: Option<String>,
    #[serde(rename = "$", default, deserialize_with = "string_or_number")]
    value: String,
}

#[derive(Debug, Deserialize)]
struct StatsListEnvelope {
    #[serde(rename = "GET_STATS_LIST")]
    list: Option<StatsList>,
}

#[derive(Debug, Deserialize)]
struct StatsList {
    #[serde(rename = "DATALIST_INF")]
    datalist_inf: Option<DatalistInf>,
}

#[derive(Debug, Deserialize)]
struct DatalistInf {
    #[serde(rename = "TABLE_INF", default, deserialize_with = "single_or_vec")]
    tables: Vec<TableInf>,
}

#[derive(Debug, Deserialize)]
struct TableInf {
    #[serde(rename = "@id", default)]
    id: String,
    #[serde(rename = "TITLE", default, deserialize_with = "text_or_node")]
    title: Option<String>,
    #[serde(rename = "STAT_NAME", default, deserialize_with = "text_or_node")]
    stat_name: Option<String>,
    #[serde(rename = "CYCLE", default, deserialize_with = "text_or_node")]
    cycle: Option<String>,
}

impl From<TableInf> for StatsTable {
    fn from(table: TableInf) -> Self {
        StatsTable {
            id: table.id,
            title: table.title.unwrap_or_else(|| "無題".to_string()),
            org: table.stat_name.unwrap_or_else(|| "不明".to_string()),
            cycle: table.cycle.unwrap_or_else(|| "-".to_string()),
        }
    }
}

/// How one `getStatsData` answer was judged
#[derive(Debug, Clone, PartialEq)]
pub enum ResponseClass {
    /// Status 0 with at least one value
    Valid(Vec<IndicatorPoint>),
    /// Status 0 without values
    Empty,
    TooBroad { status: u32, message: String },
    UpstreamError { status: String, message: String },
    /// HTML, empty body, non-JSON, or JSON without the envelope
    Unparseable(String),
    Transport(String),
}

impl ResponseClass {
    pub fn is_valid(&self) -> bool {
        matches!(self, Self::Valid(_))
    }

    pub fn label(&self) -> &'static str {
        match self {
            Self::Valid(_) => "valid",
            Self::Empty => "empty",
            Self::TooBroad { .. } => "too_broad",
            Self::UpstreamError { .. } => "upstream_error",
            Self::Unparseable(_) => "unparseable",
            Self::Transport(_) => "transport",
        }
    }
}

/// Judge a raw `getStatsData` body
pub fn classify(body: &str) -> ResponseClass {
    let trimmed = body.trim_start();
    if trimmed.is_empty() {
        return ResponseClass::Unparseable("empty body".to_string());
    }
    if trimmed.starts_with('<') {
        return ResponseClass::Unparseable("HTML instead of JSON".to_string());
    }

    let envelope: StatsDataEnvelope = match serde_json::from_str(trimmed) {
        Ok(envelope) => envelope,
        Err(e) => return ResponseClass::Unparseable(format!("invalid JSON: {}", e)),
    };
    let Some(data) = envelope.data else {
        return ResponseClass::Unparseable("missing GET_STATS_DATA".to_string());
    };

    let status = data.result.status.trim();
    match status.parse::<u32>() {
        Ok(0) => {
            let values = data
                .statistical_data
                .and_then(|sd| sd.data_inf)
                .map(|di| di.values)
                .unwrap_or_default();
            if values.is_empty() {
                ResponseClass::Empty
            } else {
                ResponseClass::Valid(
                    values
                        .into_iter()
                        .map(|v| IndicatorPoint {
                            time: v.time,
                            value: v.value,
                            unit: v.unit,
                        })
                        .collect(),
                )
            }
        }
        Ok(code) if TOO_BROAD_STATUSES.contains(&code) => ResponseClass::TooBroad {
            status: code,
            message: data.result.error_msg,
        },
        _ => ResponseClass::UpstreamError {
            status: status.to_string(),
            message: data.result.error_msg,
        },
    }
}

/// Ordered strategy list plus the escalation loop
#[derive(Debug, Clone)]
pub struct AdaptiveQuery {
    strategies: Vec<QueryStrategy>,
}

impl Default for AdaptiveQuery {
    fn default() -> Self {
        Self::new(QueryStrategy::ESCALATION.to_vec())
    }
}

impl AdaptiveQuery {
    /// At most `MAX_ATTEMPTS` strategies are kept
    pub fn new(mut strategies: Vec<QueryStrategy>) -> Self {
        strategies.truncate(MAX_ATTEMPTS);
        Self { strategies }
    }

    pub fn strategies(&self) -> &[QueryStrategy] {
        &self.strategies
    }

    /// Try each strategy in order and stop at the first valid answer.
    /// Exhaustion is logged and yields an empty series.
    pub async fn run<F, Fut>(&self, indicator_code: &str, mut attempt: F) -> IndicatorQuery
    where
        F: FnMut(QueryStrategy) -> Fut,
        Fut: Future<Output = ResponseClass>,
    {
        let mut query = IndicatorQuery::new(indicator_code);

        for &strategy in &self.strategies {
            query.strategy_attempted.push(strategy);
            match attempt(strategy).await {
                ResponseClass::Valid(points) => {
                    query.points = if strategy.latest_only() {
                        latest_point(points).into_iter().collect()
                    } else {
                        points
                    };
                    info!(
                        "e-Stat {}: {} points with strategy {}",
                        indicator_code,
                        query.points.len(),
                        strategy
                    );
                    return query;
                }
                ResponseClass::TooBroad { status, message } => {
                    warn!(
                        "e-Stat {}: query too broad with {} (status {}: {}), narrowing",
                        indicator_code, strategy, status, message
                    );
                }
                other => {
                    warn!(
                        "e-Stat {}: {} response with {}: {:?}",
                        indicator_code,
                        other.label(),
                        strategy,
                        other
                    );
                }
            }
        }

        let exhausted = PolsigError::UpstreamExhausted {
            indicator: indicator_code.to_string(),
            attempts: query.strategy_attempted.len(),
        };
        warn!("{}", exhausted);
        query
    }
}

/// Chronologically last point; e-Stat time codes sort lexically
fn latest_point(points: Vec<IndicatorPoint>) -> Option<IndicatorPoint> {
    points.into_iter().fold(None, |best, point| match best {
        Some(b) if b.time > point.time => Some(b),
        _ => Some(point),
    })
}

/// Client for the e-Stat API
#[derive(Clone)]
pub struct StatsClient {
    config: ClientConfig,
    http_client: Client,
    base_url: String,
    app_id: Option<String>,
    data_limit: u32,
    adaptive: AdaptiveQuery,
}

impl StatsClient {
    pub fn new(config: ClientConfig, app_id: Option<String>) -> Result<Self> {
        Self::with_base_url(config, app_id, BASE_URL)
    }

    pub fn with_base_url(
        config: ClientConfig,
        app_id: Option<String>,
        base_url: impl Into<String>,
    ) -> Result<Self> {
        let http_client = build_client(&config)?;
        Ok(Self {
            config,
            http_client,
            base_url: base_url.into(),
            app_id: app_id.filter(|id| !id.trim().is_empty()),
            data_limit: DEFAULT_DATA_LIMIT,
            adaptive: AdaptiveQuery::default(),
        })
    }

    fn app_id(&self) -> Result<&str> {
        self.app_id.as_deref().ok_or(PolsigError::NoApiKey {
            service: "e-Stat",
            key: "estat.app_id",
        })
    }

    /// Statistics tables matching `keyword`
    pub async fn search_stats(&self, keyword: &str) -> Result<Vec<StatsTable>> {
        let app_id = self.app_id()?;
        let limit = SEARCH_LIMIT.to_string();
        let url = with_params(
            endpoint(&self.base_url, "getStatsList")?,
            &[("appId", app_id), ("searchWord", keyword), ("limit", limit.as_str())],
        );

        let text = get_json_text(&self.http_client, &self.config, &url).await?;
        let envelope: StatsListEnvelope = serde_json::from_str(&text)
            .map_err(|e| PolsigError::invalid_response("PARSE", format!("stats list: {}", e)))?;

        let tables: Vec<StatsTable> = envelope
            .list
            .and_then(|l| l.datalist_inf)
            .map(|d| d.tables)
            .unwrap_or_default()
            .into_iter()
            .map(StatsTable::from)
            .collect();
        debug!("e-Stat: {} tables for {}", tables.len(), keyword);
        Ok(tables)
    }

    /// One upstream call for one strategy, classified
    async fn attempt(
        &self,
        app_id: &str,
        indicator_code: &str,
        strategy: QueryStrategy,
    ) -> ResponseClass {
        let url = match endpoint(&self.base_url, "getStatsData") {
            Ok(url) => url,
            Err(e) => return ResponseClass::Transport(e.to_string()),
        };
        let limit = self.data_limit.to_string();
        let mut params: Vec<(&str, &str)> = vec![
            ("appId", app_id),
            ("statsDataId", indicator_code),
            ("limit", limit.as_str()),
        ];
        params.extend_from_slice(strategy.extra_params());
        let url = with_params(url, &params);

        // one request per strategy; escalation replaces retries
        let single_shot = ClientConfig {
            max_retries: 1,
            ..self.config.clone()
        };
        match get_text(&self.http_client, &single_shot, &url).await {
            Ok(body) => classify(&body),
            Err(e) => ResponseClass::Transport(e.to_string()),
        }
    }

    /// Series for one statistics data id, escalating through strategies
    pub async fn get_indicator_data(&self, indicator_code: &str) -> Result<IndicatorQuery> {
        let app_id = self.app_id()?;
        let code = indicator_code.trim();
        if code.is_empty() {
            return Err(PolsigError::InvalidInput("indicator code must not be empty".to_string()));
        }
        Ok(self
            .adaptive
            .run(code, |strategy| self.attempt(app_id, code, strategy))
            .await)
    }

    /// Try keywords in order until enough distinct tables are known
    pub async fn collect_unique_tables(&self, keywords: &[String]) -> Result<Vec<StatsTable>> {
        self.app_id()?;
        let mut seen = HashSet::new();
        let mut tables = Vec::new();
        let mut last_error = None;

        for keyword in keywords {
            match self.search_stats(keyword).await {
                Ok(found) => {
                    for table in found {
                        if seen.insert(table.id.clone()) {
                            tables.push(table);
                        }
                    }
                }
                Err(e) => {
                    warn!("e-Stat search for {} failed: {}", keyword, e);
                    last_error = Some(e);
                }
            }
            if tables.len() >= TARGET_UNIQUE_TABLES {
                break;
            }
        }

        if tables.is_empty() {
            if let Some(e) = last_error {
                return Err(e);
            }
        }
        tables.truncate(TARGET_UNIQUE_TABLES);
        Ok(tables)
    }
}

fn table_to_record(table: StatsTable) -> SourceRecord {
    SourceRecord::new(
        SourceKind::Stats.display_name(),
        table.title,
        table.org,
        None,
        PublishedAt::Unknown,
    )
}

#[async_trait]
impl SourceAdapter for StatsClient {
    async fn retrieve(&self, query: &TopicQuery) -> Result<RetrievalOutcome<SourceRecord>> {
        let tables = self.collect_unique_tables(&query.keywords).await?;
        Ok(RetrievalOutcome::ok(tables.into_iter().map(table_to_record).collect()))
    }

    fn kind(&self) -> SourceKind {
        SourceKind::Stats
    }

    fn is_configured(&self) -> bool {
        self.app_id.is_some()
    }
}
