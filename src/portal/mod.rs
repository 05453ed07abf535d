//! Authenticated newspaper portal.
//!
//! Every flow (login-and-extract, search, headlines) opens its own session
//! from the launcher, walks a linear state machine with a declared timeout at
//! each suspension point, and releases the browser on every exit path.

pub mod browser;
pub mod session;

use async_trait::async_trait;
use chrono::Utc;
use log::{debug, info, warn};
use regex::Regex;
use std::collections::HashSet;
use std::fmt;
use std::sync::Arc;
use std::time::Duration;
use url::Url;

use crate::api::client::{SourceAdapter, TopicQuery};
use crate::api::types::{PublishedAt, RetrievalOutcome, SourceRecord};
use crate::api::SourceKind;
use crate::error::{PolsigError, Result};
use crate::extract::{self, preview, ExtractionProfile};

pub use browser::{BrowserLauncher, BrowserPage, ChromiumLauncher};
pub use session::{FailureReason, FlowReport, Session, SessionState};

const DESKTOP_USER_AGENT: &str = "Mozilla/5.0 (Macintosh; Intel Mac OS X 10_15_7) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/120.0.0.0 Safari/537.36";

/// Everything the driver needs to know about the portal
#[derive(Debug, Clone)]
pub struct PortalConfig {
    pub display_name: String,
    pub login_url: String,
    pub home_url: String,
    pub search_url: String,
    /// Base for resolving relative result links
    pub site_base_url: String,

    pub user_field_selector: String,
    pub password_field_selector: String,
    pub submit_selector: String,
    /// Regex the URL must match once login has gone through
    pub redirect_pattern: String,

    pub search_input_selector: String,
    pub search_button_selector: String,
    pub results_selector: String,

    pub user_agent: String,

    pub navigation_timeout: Duration,
    pub redirect_timeout: Duration,
    pub results_timeout: Duration,
    pub action_timeout: Duration,
    /// Fixed wait on the landing page before reading headlines
    pub settle_delay: Duration,
    pub poll_interval: Duration,

    /// Allowance per session for launching the browser and reading the page
    pub session_overhead: Duration,

    pub max_search_results: usize,
    pub max_articles: usize,
    pub body_preview_chars: usize,
}

impl Default for PortalConfig {
    fn default() -> Self {
        Self {
            display_name: "公明新聞".to_string(),
            login_url: "https://viewer.komei-shimbun.jp/".to_string(),
            home_url: "https://digital.komei-shimbun.jp/".to_string(),
            search_url: "https://digital.komei-shimbun.jp/search".to_string(),
            site_base_url: "https://digital.komei-shimbun.jp/".to_string(),
            user_field_selector: "#userId".to_string(),
            password_field_selector: "#password".to_string(),
            submit_selector: "#login_button".to_string(),
            redirect_pattern: "/NAViH_S/NAViih".to_string(),
            search_input_selector: r#"input[aria-label="キーワードを入力してください"]"#.to_string(),
            search_button_selector: r#"button[aria-label="検索ボタン"]"#.to_string(),
            results_selector: r#"a[href^="/flag/search/"]"#.to_string(),
            user_agent: DESKTOP_USER_AGENT.to_string(),
            navigation_timeout: Duration::from_secs(30),
            redirect_timeout: Duration::from_secs(30),
            results_timeout: Duration::from_secs(15),
            action_timeout: Duration::from_secs(10),
            settle_delay: Duration::from_secs(2),
            poll_interval: Duration::from_millis(250),
            session_overhead: Duration::from_secs(10),
            max_search_results: 3,
            max_articles: 3,
            body_preview_chars: 1000,
        }
    }
}

impl PortalConfig {
    /// Worst case for one search session
    pub fn search_flow_bound(&self) -> Duration {
        self.session_overhead
            + self.navigation_timeout
            + self.action_timeout * 2
            + self.results_timeout
    }

    /// Worst case for one login-and-extract session
    pub fn login_flow_bound(&self) -> Duration {
        self.session_overhead
            + self.navigation_timeout * 2
            + self.action_timeout * 3
            + self.redirect_timeout
    }

    /// Worst case for `collect_articles` over `searches` keywords
    pub fn collection_bound(&self, searches: usize) -> Duration {
        let searches = u32::try_from(searches).unwrap_or(u32::MAX);
        let articles = u32::try_from(self.max_articles).unwrap_or(u32::MAX);
        self.search_flow_bound()
            .saturating_mul(searches)
            .saturating_add(self.login_flow_bound().saturating_mul(articles))
    }
}

/// Login pair for the portal; never logged
#[derive(Clone, PartialEq, Eq)]
pub struct PortalCredentials {
    user: String,
    password: String,
}

impl PortalCredentials {
    /// `None` when either half is blank
    pub fn new(user: impl Into<String>, password: impl Into<String>) -> Option<Self> {
        let user = user.into();
        let password = password.into();
        if user.trim().is_empty() || password.trim().is_empty() {
            return None;
        }
        Some(Self { user, password })
    }

    pub fn user(&self) -> &str {
        &self.user
    }
}

impl fmt::Debug for PortalCredentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PortalCredentials")
            .field("user", &self.user)
            .field("password", &"********")
            .finish()
    }
}

/// Which articles to collect
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PortalTarget {
    /// Search these in order and stop at the first with hits
    Keywords(Vec<String>),
    DirectUrl(String),
}

/// Article text pulled by the login flow
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ArticleText {
    pub url: String,
    pub text: String,
    pub suspiciously_short: bool,
}

pub struct PortalDriver {
    launcher: Arc<dyn BrowserLauncher>,
    config: PortalConfig,
}

impl PortalDriver {
    pub fn new(launcher: Arc<dyn BrowserLauncher>, config: PortalConfig) -> Self {
        Self { launcher, config }
    }

    /// Driver backed by a real headless Chromium
    pub fn chromium(config: PortalConfig) -> Self {
        let launcher = Arc::new(ChromiumLauncher::new(config.user_agent.clone()));
        Self::new(launcher, config)
    }

    pub fn config(&self) -> &PortalConfig {
        &self.config
    }

    async fn open_session(&self) -> std::result::Result<Session, Vec<SessionState>> {
        match Session::open(self.launcher.as_ref(), self.config.poll_interval).await {
            Ok(session) => Ok(session),
            Err(e) => {
                warn!("{}: could not open browser session: {}", self.config.display_name, e);
                Err(vec![
                    SessionState::Start,
                    SessionState::Failed(FailureReason::from_error(&e)),
                ])
            }
        }
    }

    /// Log in and extract the article body at `target_url`
    pub async fn fetch_article_text(
        &self,
        credentials: &PortalCredentials,
        target_url: &str,
    ) -> FlowReport<ArticleText> {
        let mut session = match self.open_session().await {
            Ok(session) => session,
            Err(trail) => return failed_report(trail),
        };
        let outcome = self.login_and_extract(&mut session, credentials, target_url).await;
        let trail = session.release().await;
        FlowReport { outcome, trail }
    }

    async fn login_and_extract(
        &self,
        session: &mut Session,
        credentials: &PortalCredentials,
        target_url: &str,
    ) -> Result<ArticleText> {
        let cfg = &self.config;

        info!("{}: opening login page", cfg.display_name);
        session
            .navigate(&cfg.login_url, cfg.navigation_timeout)
            .await
            .map_err(|e| session.fail(e))?;
        session.advance(SessionState::NavigatedLoginPage);

        session
            .fill(&cfg.user_field_selector, &credentials.user, cfg.action_timeout)
            .await
            .map_err(|e| session.fail(e))?;
        session
            .fill(&cfg.password_field_selector, &credentials.password, cfg.action_timeout)
            .await
            .map_err(|e| session.fail(e))?;
        session
            .click(&cfg.submit_selector, cfg.action_timeout)
            .await
            .map_err(|e| session.fail(e))?;
        session.advance(SessionState::CredentialsSubmitted);

        let redirect_confirmed = match Regex::new(&cfg.redirect_pattern) {
            Ok(pattern) => session.wait_for_url(&pattern, cfg.redirect_timeout).await,
            Err(e) => {
                warn!("invalid redirect pattern {}: {}", cfg.redirect_pattern, e);
                false
            }
        };
        if !redirect_confirmed {
            let current = session.current_url().await.unwrap_or_default();
            let signal = PolsigError::AuthenticationUncertain(format!(
                "no redirect to {} within {:?} (current URL: {})",
                cfg.redirect_pattern,
                cfg.redirect_timeout,
                current
            ));
            warn!("{}: {}", cfg.display_name, signal);
        }
        session.advance(SessionState::Authenticated { redirect_confirmed });

        info!("{}: opening target article {}", cfg.display_name, target_url);
        session
            .navigate(target_url, cfg.navigation_timeout)
            .await
            .map_err(|e| session.fail(e))?;
        session.advance(SessionState::NavigatedTarget);

        let html = session.content().await.map_err(|e| session.fail(e))?;
        let extracted = extract::extract(&html, ExtractionProfile::ArticleBody, None);
        let text = extracted.first().unwrap_or_default().to_string();
        let suspiciously_short = extracted.suspiciously_short || text.is_empty();
        if suspiciously_short {
            let signal = PolsigError::ExtractionEmpty(format!(
                "{} chars from {}",
                text.chars().count(),
                target_url
            ));
            warn!("{}: {}", cfg.display_name, signal);
        } else {
            info!("{}: extracted {} chars", cfg.display_name, text.chars().count());
        }
        session.advance(SessionState::Extracted);

        Ok(ArticleText {
            url: target_url.to_string(),
            text,
            suspiciously_short,
        })
    }

    /// Search the portal and return up to `limit` absolute result URLs
    pub async fn search_articles(&self, keyword: &str, limit: usize) -> FlowReport<Vec<String>> {
        let mut session = match self.open_session().await {
            Ok(session) => session,
            Err(trail) => return failed_report(trail),
        };
        let outcome = self.search(&mut session, keyword, limit).await;
        let trail = session.release().await;
        FlowReport { outcome, trail }
    }

    async fn search(
        &self,
        session: &mut Session,
        keyword: &str,
        limit: usize,
    ) -> Result<Vec<String>> {
        let cfg = &self.config;

        debug!("{}: searching for {}", cfg.display_name, keyword);
        session
            .navigate(&cfg.search_url, cfg.navigation_timeout)
            .await
            .map_err(|e| session.fail(e))?;
        session.advance(SessionState::NavigatedSearch);

        session
            .fill(&cfg.search_input_selector, keyword, cfg.action_timeout)
            .await
            .map_err(|e| session.fail(e))?;
        session
            .click(&cfg.search_button_selector, cfg.action_timeout)
            .await
            .map_err(|e| session.fail(e))?;
        session.advance(SessionState::KeywordSubmitted);

        if !session
            .wait_for_selector(&cfg.results_selector, cfg.results_timeout)
            .await
        {
            return Err(session.fail(PolsigError::ResultsTimeout(cfg.results_timeout)));
        }
        session.advance(SessionState::ResultsReady);

        let html = session.content().await.map_err(|e| session.fail(e))?;
        let base = Url::parse(&cfg.site_base_url).ok();
        let mut links =
            extract::extract(&html, ExtractionProfile::SearchResultLinks, base.as_ref()).items;
        links.truncate(limit);
        info!("{}: {} results for {}", cfg.display_name, links.len(), keyword);
        session.advance(SessionState::LinksExtracted);

        Ok(links)
    }

    /// Landing-page headlines with the failure reason kept in the report
    pub async fn headline_flow(&self) -> FlowReport<Vec<String>> {
        let mut session = match self.open_session().await {
            Ok(session) => session,
            Err(trail) => return failed_report(trail),
        };
        let outcome = self.headlines(&mut session).await;
        let trail = session.release().await;
        FlowReport { outcome, trail }
    }

    async fn headlines(&self, session: &mut Session) -> Result<Vec<String>> {
        let cfg = &self.config;

        session
            .navigate(&cfg.home_url, cfg.navigation_timeout)
            .await
            .map_err(|e| session.fail(e))?;
        session.advance(SessionState::NavigatedLanding);

        tokio::time::sleep(cfg.settle_delay).await;

        let html = session.content().await.map_err(|e| session.fail(e))?;
        let headlines = extract::extract(&html, ExtractionProfile::HeadlineList, None).items;
        session.advance(SessionState::HeadlinesExtracted);
        Ok(headlines)
    }

    /// Up to 10 landing-page headlines; empty on any failure
    pub async fn get_trending_headlines(&self) -> Vec<String> {
        let report = self.headline_flow().await;
        match report.outcome {
            Ok(headlines) => headlines,
            Err(e) => {
                warn!("{}: headline fetch failed: {}", self.config.display_name, e);
                Vec::new()
            }
        }
    }

    /// Resolve the target to article URLs and fetch each with its own session
    pub async fn collect_articles(
        &self,
        credentials: Option<&PortalCredentials>,
        target: &PortalTarget,
    ) -> RetrievalOutcome<SourceRecord> {
        let cfg = &self.config;
        let Some(credentials) = credentials else {
            debug!("{}: no credentials, skipping", cfg.display_name);
            return RetrievalOutcome::ok(Vec::new());
        };

        let mut errors = Vec::new();
        let candidates = match target {
            PortalTarget::DirectUrl(url) => vec![url.clone()],
            PortalTarget::Keywords(keywords) => {
                let mut found = Vec::new();
                for keyword in keywords {
                    match self.search_articles(keyword, cfg.max_search_results).await.outcome {
                        Ok(urls) if !urls.is_empty() => {
                            info!("{}: articles found for {}", cfg.display_name, keyword);
                            found = urls;
                            break;
                        }
                        Ok(_) => debug!("{}: no articles for {}", cfg.display_name, keyword),
                        Err(e) => errors.push(format!("search {}: {}", keyword, e)),
                    }
                }
                found
            }
        };

        let mut seen = HashSet::new();
        let urls: Vec<String> = candidates
            .into_iter()
            .filter(|url| seen.insert(url.clone()))
            .take(cfg.max_articles)
            .collect();

        if urls.is_empty() {
            if !errors.is_empty() {
                warn!("{}: no articles found ({})", cfg.display_name, errors.join("; "));
            }
            return RetrievalOutcome::partial(Vec::new(), errors);
        }
        // Search errors only matter when nothing was found
        errors.clear();

        let mut records = Vec::new();
        for (idx, url) in urls.iter().enumerate() {
            match self.fetch_article_text(credentials, url).await.outcome {
                Ok(article) => records.push(SourceRecord::new(
                    cfg.display_name.clone(),
                    format!("{} 関連記事 {}", cfg.display_name, idx + 1),
                    preview(&article.text, cfg.body_preview_chars),
                    Some(article.url),
                    PublishedAt::At(Utc::now().fixed_offset()),
                )),
                Err(e) => errors.push(format!("{}: {}", url, e)),
            }
        }

        RetrievalOutcome::partial(records, errors)
    }
}

fn failed_report<T>(trail: Vec<SessionState>) -> FlowReport<T> {
    let reason = match trail.last() {
        Some(SessionState::Failed(reason)) => reason.to_string(),
        _ => "session could not be opened".to_string(),
    };
    FlowReport {
        outcome: Err(PolsigError::Browser(reason)),
        trail,
    }
}

fn portal_target(query: &TopicQuery) -> PortalTarget {
    match &query.portal_url {
        Some(url) if !url.trim().is_empty() => PortalTarget::DirectUrl(url.clone()),
        _ => PortalTarget::Keywords(query.keywords.clone()),
    }
}

/// Portal as an aggregation source
pub struct PortalSource {
    driver: Arc<PortalDriver>,
    credentials: Option<PortalCredentials>,
}

impl PortalSource {
    pub fn new(driver: Arc<PortalDriver>, credentials: Option<PortalCredentials>) -> Self {
        Self { driver, credentials }
    }
}

#[async_trait]
impl SourceAdapter for PortalSource {
    async fn retrieve(&self, query: &TopicQuery) -> Result<RetrievalOutcome<SourceRecord>> {
        Ok(self
            .driver
            .collect_articles(self.credentials.as_ref(), &portal_target(query))
            .await)
    }

    fn kind(&self) -> SourceKind {
        SourceKind::Portal
    }

    /// Sessions run one after another, so the budget grows with the number
    /// of searches and articles
    fn time_budget(&self, query: &TopicQuery) -> Option<Duration> {
        self.credentials.as_ref()?;
        let searches = match portal_target(query) {
            PortalTarget::DirectUrl(_) => 0,
            PortalTarget::Keywords(keywords) => keywords.len(),
        };
        Some(self.driver.config().collection_bound(searches))
    }

    fn is_configured(&self) -> bool {
        self.credentials.is_some()
    }
}
