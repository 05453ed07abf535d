//! Retrieval facade.
//!
//! One entry point per source plus the "collect everything" fan-out. No
//! method here returns `Err`: failures travel inside the returned outcome.

use log::{info, warn};
use std::sync::Arc;

use crate::api::client::{SourceAdapter, TopicQuery};
use crate::api::egov::LawClient;
use crate::api::estat::StatsClient;
use crate::api::kokkai::DietClient;
use crate::api::news::NewsClient;
use crate::api::parallel::{AggregateReport, Aggregator, AggregatorConfig};
use crate::api::types::{
    IndicatorQuery, LawExcerpt, LawReference, RetrievalOutcome, SourceRecord, StatsEntry,
    StatsRequest, TrendReport,
};
use crate::api::SourceKind;
use crate::cache::key::CacheKeyGenerator;
use crate::cache::TtlCache;
use crate::config::{Config, SourceToggles};
use crate::error::Result;
use crate::portal::{PortalConfig, PortalCredentials, PortalDriver, PortalSource, PortalTarget};
use crate::trend::{collect_trending, HeadlineSource, KeywordExtractor, ProviderContext};

/// The five source clients behind a `Retriever`
pub struct Sources {
    pub news: NewsClient,
    pub diet: DietClient,
    pub portal: PortalDriver,
    pub law: LawClient,
    pub stats: StatsClient,
}

impl Sources {
    /// Production endpoints configured from `config`
    pub fn from_config(config: &Config) -> Result<Self> {
        let client_config = config.client_config();
        Ok(Self {
            news: NewsClient::new(client_config.clone())?,
            diet: DietClient::new(client_config.clone())?
                .with_lookback_days(config.diet.lookback_days),
            portal: PortalDriver::chromium(PortalConfig::default()),
            law: LawClient::new(client_config.clone())?,
            stats: StatsClient::new(client_config, config.estat_app_id())?,
        })
    }
}

pub struct Retriever {
    news: Arc<NewsClient>,
    diet: Arc<DietClient>,
    portal: Arc<PortalDriver>,
    law: Arc<LawClient>,
    stats: Arc<StatsClient>,
    toggles: SourceToggles,
    default_days: u32,
    aggregator_config: AggregatorConfig,
    trend_cache: TtlCache<TrendReport>,
}

impl Retriever {
    pub fn new(sources: Sources, toggles: SourceToggles) -> Self {
        Self {
            news: Arc::new(sources.news),
            diet: Arc::new(sources.diet),
            portal: Arc::new(sources.portal),
            law: Arc::new(sources.law),
            stats: Arc::new(sources.stats),
            toggles,
            default_days: 7,
            aggregator_config: AggregatorConfig::default(),
            trend_cache: TtlCache::default(),
        }
    }

    pub fn from_config(config: &Config) -> Result<Self> {
        let mut retriever = Self::new(Sources::from_config(config)?, config.sources.clone());
        retriever.default_days = config.news.days;
        Ok(retriever)
    }

    pub fn with_aggregator_config(mut self, config: AggregatorConfig) -> Self {
        self.aggregator_config = config;
        self
    }

    pub fn toggles(&self) -> &SourceToggles {
        &self.toggles
    }

    pub async fn fetch_news(&self, keyword: &str, days: u32) -> RetrievalOutcome<SourceRecord> {
        self.news.fetch_news(keyword, days).await
    }

    /// Dates are `YYYY-MM-DD`
    pub async fn fetch_legislative_speeches(
        &self,
        keyword: &str,
        from_date: &str,
        until_date: &str,
    ) -> RetrievalOutcome<SourceRecord> {
        self.diet
            .fetch_legislative_speeches(keyword, from_date, until_date)
            .await
    }

    /// Missing credentials yield an empty outcome without opening a browser
    pub async fn fetch_portal_articles(
        &self,
        credentials: Option<&PortalCredentials>,
        target: &PortalTarget,
    ) -> RetrievalOutcome<SourceRecord> {
        self.portal.collect_articles(credentials, target).await
    }

    /// Landing-page headlines; empty when the flow fails
    pub async fn fetch_portal_headlines(&self) -> Vec<String> {
        self.portal.get_trending_headlines().await
    }

    pub async fn fetch_law_references(&self, keyword: &str) -> RetrievalOutcome<LawReference> {
        self.law.search_laws(keyword).await.into()
    }

    pub async fn fetch_law_excerpts(&self, keyword: &str) -> RetrievalOutcome<LawExcerpt> {
        self.law.search_by_keyword(keyword).await.into()
    }

    pub async fn fetch_law_text(&self, law_id: &str) -> RetrievalOutcome<String> {
        self.law.fetch_law_text(law_id).await.map(|text| vec![text]).into()
    }

    /// Table search for keywords, series lookup for data ids
    pub async fn fetch_statistics(&self, request: &StatsRequest) -> RetrievalOutcome<StatsEntry> {
        match request {
            StatsRequest::Keyword(keyword) => self
                .stats
                .search_stats(keyword)
                .await
                .map(|tables| tables.into_iter().map(StatsEntry::Table).collect())
                .into(),
            StatsRequest::IndicatorCode(code) => self
                .stats
                .get_indicator_data(code)
                .await
                .map(|query| query.points.into_iter().map(StatsEntry::Point).collect())
                .into(),
        }
    }

    /// Series plus the strategies that were tried
    pub async fn fetch_indicator(&self, indicator_code: &str) -> IndicatorQuery {
        match self.stats.get_indicator_data(indicator_code).await {
            Ok(query) => query,
            Err(e) => {
                warn!("e-Stat {}: {}", indicator_code, e);
                IndicatorQuery::new(indicator_code)
            }
        }
    }

    /// Trending keywords per branch, cached for an hour per provider context
    pub async fn fetch_trending(
        &self,
        context: &ProviderContext,
        extractor: Arc<dyn KeywordExtractor>,
    ) -> TrendReport {
        let key = CacheKeyGenerator::trend_key(&context.provider, &context.api_key, &context.model);
        if let Some(report) = self.trend_cache.get(&key) {
            info!("Trending report served from cache");
            return report;
        }

        let general: Arc<dyn HeadlineSource> = self.news.clone();
        let portal: Arc<dyn HeadlineSource> = self.portal.clone();
        let report = collect_trending(general, portal, extractor).await;
        self.trend_cache.put(key, report.clone());
        report
    }

    /// Every enabled source for one topic, merged
    pub async fn collect_all(
        &self,
        query: &TopicQuery,
        credentials: Option<PortalCredentials>,
    ) -> AggregateReport {
        let mut query = query.clone();
        if query.days == 0 {
            query.days = self.default_days;
        }

        let portal: Arc<dyn SourceAdapter> =
            Arc::new(PortalSource::new(self.portal.clone(), credentials));
        let sources: Vec<(Arc<dyn SourceAdapter>, SourceKind)> = vec![
            (self.news.clone() as Arc<dyn SourceAdapter>, SourceKind::News),
            (self.diet.clone() as Arc<dyn SourceAdapter>, SourceKind::Diet),
            (portal, SourceKind::Portal),
            (self.law.clone() as Arc<dyn SourceAdapter>, SourceKind::Law),
            (self.stats.clone() as Arc<dyn SourceAdapter>, SourceKind::Stats),
        ];

        let aggregator = sources
            .into_iter()
            .fold(Aggregator::new(self.aggregator_config.clone()), |agg, (adapter, kind)| {
                agg.with_source(adapter, self.toggles.is_enabled(kind))
            });
        aggregator.collect(&query).await
    }
}
