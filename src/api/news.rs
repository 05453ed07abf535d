use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use log::{debug, info, warn};
use quick_xml::de::from_str;
use reqwest::Client;
use serde::Deserialize;

use super::client::{ClientConfig, SourceAdapter, TopicQuery};
use super::http_client::{build_client, get_text, with_params};
use super::parallel::merge_records;
use super::types::{PublishedAt, RetrievalOutcome, SourceRecord};
use super::SourceKind;
use crate::error::{PolsigError, Result};
use crate::extract::strip_tags;

const SEARCH_SOURCE_NAME: &str = "Googleニュース";
const TOP_STORIES_LIMIT: usize = 10;
const PER_FEED_HEADLINES: usize = 3;

/// A named RSS feed
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FeedSource {
    pub name: String,
    pub url: String,
}

impl FeedSource {
    pub fn new(name: impl Into<String>, url: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            url: url.into(),
        }
    }
}

/// Feed locations; overridable so tests can point at a local server
#[derive(Debug, Clone)]
pub struct NewsEndpoints {
    /// Keyword search feed; `None` disables it
    pub search_url: Option<String>,
    pub top_stories_url: Option<String>,
    pub feeds: Vec<FeedSource>,
}

impl Default for NewsEndpoints {
    fn default() -> Self {
        Self {
            search_url: Some("https://news.google.com/rss/search".to_string()),
            top_stories_url: Some("https://news.google.com/rss?hl=ja&gl=JP&ceid=JP:ja".to_string()),
            feeds: vec![
                FeedSource::new("NHK政治マガジン", "https://www.nhk.or.jp/rss/news/cat5.xml"),
                FeedSource::new("日経新聞(政治)", "https://www.nikkei.com/rss/politics/index.xml"),
                FeedSource::new("読売新聞(政治)", "https://www.yomiuri.co.jp/rss/politics/index.xml"),
                FeedSource::new("産経新聞(政治)", "https://www.sankei.com/rss/news/politics.xml"),
                FeedSource::new("毎日新聞(政治)", "https://mainichi.jp/rss/etc/politics.xml"),
                FeedSource::new("朝日新聞(政治)", "https://www.asahi.com/rss/politics/index.xml"),
            ],
        }
    }
}

// RSS 2.0 keeps items under <channel>; RSS 1.0 (RDF) puts them at the root.
#[derive(Debug, Deserialize)]
struct Feed {
    channel: Option<Channel>,
    #[serde(rename = "item", default)]
    items: Vec<RawItem>,
}

#[derive(Debug, Deserialize)]
struct Channel {
    #[serde(rename = "item", default)]
    items: Vec<RawItem>,
}

#[derive(Debug, Deserialize)]
struct RawItem {
    title: Option<String>,
    link: Option<String>,
    #[serde(rename = "pubDate")]
    pub_date: Option<String>,
    #[serde(rename = "dc:date", alias = "date")]
    dc_date: Option<String>,
    description: Option<String>,
    source: Option<RawSource>,
}

#[derive(Debug, Deserialize)]
struct RawSource {
    #[serde(rename = "$text", default)]
    name: String,
}

/// One parsed feed entry
#[derive(Debug, Clone, PartialEq)]
pub struct FeedItem {
    pub title: String,
    pub link: Option<String>,
    pub summary: String,
    pub published: PublishedAt,
    /// `<source>` of aggregated feeds
    pub publisher: Option<String>,
}

fn scrub_html_entities_for_xml(s: &str) -> String {
    s.replace("&nbsp;", " ")
        .replace("&ndash;", "-")
        .replace("&mdash;", "-")
        .replace("&hellip;", "...")
}

/// Parse an RSS 2.0 or RSS 1.0 document
pub fn parse_feed(xml: &str) -> Result<Vec<FeedItem>> {
    let cleaned = scrub_html_entities_for_xml(xml);
    let feed: Feed =
        from_str(&cleaned).map_err(|e| PolsigError::Parse(format!("Failed to parse feed: {}", e)))?;

    let raw_items = match feed.channel {
        Some(channel) if !channel.items.is_empty() => channel.items,
        _ => feed.items,
    };

    Ok(raw_items
        .into_iter()
        .map(|item| FeedItem {
            title: item.title.map(|t| t.trim().to_string()).unwrap_or_default(),
            link: item.link.map(|l| l.trim().to_string()),
            summary: item.description.as_deref().map(strip_tags).unwrap_or_default(),
            published: PublishedAt::from_optional(
                item.pub_date.as_deref().or(item.dc_date.as_deref()),
            ),
            publisher: item
                .source
                .map(|s| s.name.trim().to_string())
                .filter(|s| !s.is_empty()),
        })
        .collect())
}

/// Drop items dated before `now - (days + 1)`; undated items stay
pub fn filter_window(items: Vec<FeedItem>, now: DateTime<Utc>, days: u32) -> Vec<FeedItem> {
    let cutoff = now - Duration::days(i64::from(days) + 1);
    items
        .into_iter()
        .filter(|item| match item.published.datetime() {
            Some(dt) => dt.with_timezone(&Utc) >= cutoff,
            None => true,
        })
        .collect()
}

fn parse_feed_url(raw: &str) -> Result<reqwest::Url> {
    reqwest::Url::parse(raw)
        .map_err(|e| PolsigError::Parse(format!("Invalid feed URL {}: {}", raw, e)))
}

fn matches_keyword(item: &FeedItem, keyword: &str) -> bool {
    let needle = keyword.to_lowercase();
    format!("{}{}", item.title, item.summary)
        .to_lowercase()
        .contains(&needle)
}

fn into_record(item: FeedItem, source_name: String) -> SourceRecord {
    SourceRecord::new(source_name, item.title, item.summary, item.link, item.published)
}

/// Reader for the search feed and the configured media feeds
#[derive(Clone)]
pub struct NewsClient {
    config: ClientConfig,
    http_client: Client,
    endpoints: NewsEndpoints,
}

impl NewsClient {
    pub fn new(config: ClientConfig) -> Result<Self> {
        Self::with_endpoints(config, NewsEndpoints::default())
    }

    pub fn with_endpoints(config: ClientConfig, endpoints: NewsEndpoints) -> Result<Self> {
        let http_client = build_client(&config)?;
        Ok(Self {
            config,
            http_client,
            endpoints,
        })
    }

    async fn fetch_feed(&self, url: &str) -> Result<Vec<FeedItem>> {
        let url = parse_feed_url(url)?;
        let body = get_text(&self.http_client, &self.config, &url).await?;
        parse_feed(&body)
    }

    async fn search_feed(&self, base: &str, keyword: &str) -> Result<Vec<FeedItem>> {
        let url = parse_feed_url(base)?;
        let query = keyword.replace(',', " ");
        let url = with_params(
            url,
            &[("q", query.as_str()), ("hl", "ja"), ("gl", "JP"), ("ceid", "JP:ja")],
        );
        debug!("Searching news feed for {}", query);
        let body = get_text(&self.http_client, &self.config, &url).await?;
        parse_feed(&body)
    }

    /// Recent items mentioning `keyword`, newest first.
    ///
    /// Feeds fail independently; their errors are joined into the outcome.
    pub async fn fetch_news(&self, keyword: &str, days: u32) -> RetrievalOutcome<SourceRecord> {
        let now = Utc::now();
        let mut records = Vec::new();
        let mut errors = Vec::new();

        if let (Some(search_url), false) = (&self.endpoints.search_url, keyword.trim().is_empty()) {
            match self.search_feed(search_url, keyword).await {
                Ok(items) => {
                    for item in filter_window(items, now, days) {
                        let source = match &item.publisher {
                            Some(publisher) => format!("{} ({})", SEARCH_SOURCE_NAME, publisher),
                            None => SEARCH_SOURCE_NAME.to_string(),
                        };
                        records.push(into_record(item, source));
                    }
                }
                Err(e) => {
                    warn!("News search feed failed: {}", e);
                    errors.push(format!("{}: {}", SEARCH_SOURCE_NAME, e));
                }
            }
        }

        for feed in &self.endpoints.feeds {
            match self.fetch_feed(&feed.url).await {
                Ok(items) => {
                    let before = records.len();
                    records.extend(
                        filter_window(items, now, days)
                            .into_iter()
                            .filter(|item| matches_keyword(item, keyword))
                            .map(|item| into_record(item, feed.name.clone())),
                    );
                    debug!("{}: {} matching items", feed.name, records.len() - before);
                }
                Err(e) => {
                    warn!("Feed {} failed: {}", feed.name, e);
                    errors.push(format!("{}: {}", feed.name, e));
                }
            }
        }

        let records = merge_records(records);
        info!("News: {} items for {}", records.len(), keyword);
        RetrievalOutcome::partial(records, errors)
    }

    /// Top stories plus the first few titles of every media feed.
    /// Errors only when every feed failed.
    pub async fn get_trending_headlines(&self) -> Result<Vec<String>> {
        let mut headlines = Vec::new();
        let mut errors = Vec::new();
        let mut attempted = 0;

        if let Some(url) = &self.endpoints.top_stories_url {
            attempted += 1;
            match self.fetch_feed(url).await {
                Ok(items) => headlines.extend(
                    items
                        .into_iter()
                        .take(TOP_STORIES_LIMIT)
                        .map(|i| i.title)
                        .filter(|t| !t.is_empty()),
                ),
                Err(e) => errors.push(format!("top stories: {}", e)),
            }
        }

        for feed in &self.endpoints.feeds {
            attempted += 1;
            match self.fetch_feed(&feed.url).await {
                Ok(items) => headlines.extend(
                    items
                        .into_iter()
                        .take(PER_FEED_HEADLINES)
                        .map(|i| i.title)
                        .filter(|t| !t.is_empty()),
                ),
                Err(e) => errors.push(format!("{}: {}", feed.name, e)),
            }
        }

        if attempted > 0 && errors.len() == attempted {
            return Err(PolsigError::Other(errors.join("; ")));
        }
        for e in &errors {
            warn!("Headline feed failed: {}", e);
        }
        Ok(headlines)
    }
}

#[async_trait]
impl SourceAdapter for NewsClient {
    async fn retrieve(&self, query: &TopicQuery) -> Result<RetrievalOutcome<SourceRecord>> {
        let keyword = query.keywords.first().cloned().unwrap_or_default();
        Ok(self.fetch_news(&keyword, query.days).await)
    }

    fn kind(&self) -> SourceKind {
        SourceKind::News
    }
}
