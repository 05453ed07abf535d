use async_trait::async_trait;
use log::{debug, info, warn};
use reqwest::Client;
use serde::Deserialize;
use std::collections::HashSet;

use super::client::{ClientConfig, SourceAdapter, TopicQuery};
use super::http_client::{build_client, endpoint, get_json_text, get_text, with_params};
use super::types::{LawExcerpt, LawReference, PublishedAt, RetrievalOutcome, SourceRecord};
use super::SourceKind;
use crate::error::{PolsigError, Result};
use crate::extract::{preview, strip_tags};

const BASE_URL: &str = "https://laws.e-gov.go.jp/api/2";
const LAW_PAGE_URL: &str = "https://laws.e-gov.go.jp/law";
const MAX_SNIPPETS: usize = 3;
const MAX_LAW_TEXT_CHARS: usize = 3000;
/// Aggregation stops once this many distinct laws are known
const TARGET_UNIQUE_LAWS: usize = 5;

#[derive(Debug, Deserialize, Default)]
struct LawInfo {
    law_id: Option<String>,
    law_num: Option<String>,
    promulgation_date: Option<String>,
}

#[derive(Debug, Deserialize, Default)]
struct RevisionInfo {
    law_title: Option<String>,
}

#[derive(Debug, Deserialize)]
struct LawsResponse {
    #[serde(default)]
    laws: Vec<LawItem>,
}

#[derive(Debug, Deserialize)]
struct LawItem {
    #[serde(default)]
    law_info: LawInfo,
    #[serde(default)]
    revision_info: RevisionInfo,
}

#[derive(Debug, Deserialize)]
struct KeywordResponse {
    #[serde(default)]
    items: Vec<KeywordItem>,
}

#[derive(Debug, Deserialize)]
struct KeywordItem {
    #[serde(default)]
    law_info: LawInfo,
    #[serde(default)]
    revision_info: RevisionInfo,
    #[serde(default)]
    sentences: Vec<Sentence>,
}

#[derive(Debug, Deserialize)]
struct Sentence {
    #[serde(default)]
    text: String,
}

pub fn law_page_url(id: &str) -> String {
    format!("{}/{}", LAW_PAGE_URL, id)
}

fn law_to_record(law: LawReference) -> SourceRecord {
    let link = (!law.id.is_empty()).then(|| law_page_url(&law.id));
    let published_at = PublishedAt::from_optional(law.promulgation_date.as_deref());
    SourceRecord::new(SourceKind::Law.display_name(), law.title, law.number, link, published_at)
}

/// Client for the e-Gov law registry (API v2)
#[derive(Clone)]
pub struct LawClient {
    config: ClientConfig,
    http_client: Client,
    base_url: String,
}

impl LawClient {
    pub fn new(config: ClientConfig) -> Result<Self> {
        Self::with_base_url(config, BASE_URL)
    }

    pub fn with_base_url(config: ClientConfig, base_url: impl Into<String>) -> Result<Self> {
        let http_client = build_client(&config)?;
        Ok(Self {
            config,
            http_client,
            base_url: base_url.into(),
        })
    }

    /// Laws whose title contains `keyword`
    pub async fn search_laws(&self, keyword: &str) -> Result<Vec<LawReference>> {
        let url = with_params(endpoint(&self.base_url, "laws")?, &[("law_title", keyword)]);
        let text = get_json_text(&self.http_client, &self.config, &url).await?;
        let response: LawsResponse = serde_json::from_str(&text)
            .map_err(|e| PolsigError::invalid_response("PARSE", format!("law search: {}", e)))?;

        let laws: Vec<LawReference> = response
            .laws
            .into_iter()
            .map(|item| LawReference {
                id: item.law_info.law_id.unwrap_or_default(),
                title: item.revision_info.law_title.unwrap_or_default(),
                number: item.law_info.law_num.unwrap_or_default(),
                promulgation_date: item.law_info.promulgation_date,
            })
            .collect();
        debug!("e-Gov: {} laws for {}", laws.len(), keyword);
        Ok(laws)
    }

    /// Full-text search returning matching sentences per law
    pub async fn search_by_keyword(&self, keyword: &str) -> Result<Vec<LawExcerpt>> {
        let url = with_params(endpoint(&self.base_url, "keyword")?, &[("keyword", keyword)]);
        let text = get_json_text(&self.http_client, &self.config, &url).await?;
        let response: KeywordResponse = serde_json::from_str(&text)
            .map_err(|e| PolsigError::invalid_response("PARSE", format!("keyword search: {}", e)))?;

        Ok(response
            .items
            .into_iter()
            .map(|item| LawExcerpt {
                id: item.law_info.law_id.unwrap_or_default(),
                title: item.revision_info.law_title.unwrap_or_default(),
                number: item.law_info.law_num.unwrap_or_default(),
                snippets: item
                    .sentences
                    .into_iter()
                    .map(|s| s.text.replace("<span>", "").replace("</span>", ""))
                    .filter(|s| !s.is_empty())
                    .take(MAX_SNIPPETS)
                    .collect(),
            })
            .collect())
    }

    /// Plain text of one law, tags stripped and capped
    pub async fn fetch_law_text(&self, law_id: &str) -> Result<String> {
        if law_id.trim().is_empty() {
            return Err(PolsigError::InvalidInput("law id must not be empty".to_string()));
        }
        let url = endpoint(&self.base_url, &format!("lawdata/{}", law_id.trim()))?;
        let body = get_text(&self.http_client, &self.config, &url).await?;
        Ok(preview(&strip_tags(&body), MAX_LAW_TEXT_CHARS))
    }

    /// Try keywords in order until enough distinct laws are known
    pub async fn collect_unique_laws(&self, keywords: &[String]) -> Result<Vec<LawReference>> {
        let mut seen = HashSet::new();
        let mut laws = Vec::new();
        let mut last_error = None;

        for keyword in keywords {
            match self.search_laws(keyword).await {
                Ok(found) => {
                    for law in found {
                        if seen.insert(law.id.clone()) {
                            laws.push(law);
                        }
                    }
                }
                Err(e) => {
                    warn!("e-Gov search for {} failed: {}", keyword, e);
                    last_error = Some(e);
                }
            }
            if laws.len() >= TARGET_UNIQUE_LAWS {
                break;
            }
        }

        if laws.is_empty() {
            if let Some(e) = last_error {
                return Err(e);
            }
        }
        laws.truncate(TARGET_UNIQUE_LAWS);
        info!("e-Gov: {} laws identified", laws.len());
        Ok(laws)
    }
}

#[async_trait]
impl SourceAdapter for LawClient {
    async fn retrieve(&self, query: &TopicQuery) -> Result<RetrievalOutcome<SourceRecord>> {
        let laws = self.collect_unique_laws(&query.keywords).await?;
        Ok(RetrievalOutcome::ok(laws.into_iter().map(law_to_record).collect()))
    }

    fn kind(&self) -> SourceKind {
        SourceKind::Law
    }
}
