use async_trait::async_trait;
use chrono::NaiveDate;
use std::time::Duration;

use super::types::{RetrievalOutcome, SourceRecord};
use super::SourceKind;
use crate::error::Result;

/// What one aggregation run is about
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TopicQuery {
    /// Keywords tried in order; sources that search per keyword stop early
    pub keywords: Vec<String>,
    /// Look-back in days for feed sources
    pub days: u32,
    /// Diet window start; `until` minus the adapter's lookback when unset
    pub from: Option<NaiveDate>,
    pub until: Option<NaiveDate>,
    /// Article URL to fetch directly instead of searching the portal
    pub portal_url: Option<String>,
}

impl TopicQuery {
    pub fn new<I, S>(keywords: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            keywords: keywords
                .into_iter()
                .map(Into::into)
                .filter(|k: &String| !k.trim().is_empty())
                .collect(),
            days: 7,
            ..Default::default()
        }
    }

    /// Keywords joined the way a single search box expects them
    pub fn joined(&self, sep: &str) -> String {
        self.keywords.join(sep)
    }
}

/// Trait implemented by every source adapter the aggregator can fan out to
#[async_trait]
pub trait SourceAdapter: Send + Sync {
    /// Retrieve normalized records for one topic. `Err` means the whole
    /// source failed; partial failures travel in the outcome's `error`.
    async fn retrieve(&self, query: &TopicQuery) -> Result<RetrievalOutcome<SourceRecord>>;

    fn kind(&self) -> SourceKind;

    /// Longest this source may legitimately take for `query`, when it knows
    fn time_budget(&self, _query: &TopicQuery) -> Option<Duration> {
        None
    }

    /// Check if the adapter has what it needs (credentials, app id) to run
    fn is_configured(&self) -> bool {
        true
    }
}

/// Client configuration
#[derive(Debug, Clone)]
pub struct ClientConfig {
    /// Request timeout in seconds
    pub timeout: u64,
    /// Maximum number of attempts for 429/5xx/transport failures
    pub max_retries: u32,
    /// Base delay for exponential backoff (milliseconds)
    pub retry_base_delay: u64,
    /// User agent string
    pub user_agent: String,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            timeout: 30,
            max_retries: 3,
            retry_base_delay: 100,
            user_agent: format!("polsig/{}", env!("CARGO_PKG_VERSION")),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_topic_query_drops_blank_keywords() {
        let query = TopicQuery::new(["年金", " ", "少子化"]);
        assert_eq!(query.keywords, vec!["年金".to_string(), "少子化".to_string()]);
        assert_eq!(query.days, 7);
        assert_eq!(query.joined(","), "年金,少子化");
    }

    #[test]
    fn test_default_client_config() {
        let config = ClientConfig::default();
        assert_eq!(config.timeout, 30);
        assert_eq!(config.max_retries, 3);
        assert!(config.user_agent.starts_with("polsig/"));
    }
}
