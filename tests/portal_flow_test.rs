use async_trait::async_trait;
use polsig::api::client::TopicQuery;
use polsig::api::parallel::{Aggregator, AggregatorConfig};
use polsig::api::types::RetrievalOutcome;
use polsig::api::SourceKind;
use polsig::error::{PolsigError, Result};
use polsig::portal::{
    BrowserLauncher, BrowserPage, FailureReason, PortalConfig, PortalCredentials, PortalDriver,
    PortalSource, PortalTarget, SessionState,
};
use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

const LOGIN_URL: &str = "https://portal.test/login";
const HOME_URL: &str = "https://portal.test/";
const SEARCH_URL: &str = "https://portal.test/search";
const RESULTS_URL: &str = "https://portal.test/search?done";
const AFTER_LOGIN_URL: &str = "https://portal.test/NAViH_S/NAViih";

/// In-memory site: url -> document, plus the knobs each test flips
#[derive(Default)]
struct Site {
    pages: HashMap<String, String>,
    redirect_after_login: bool,
    hang_on: Option<String>,
    /// Reading the document at this URL fails
    detached_on: Option<String>,
    refuse_open: bool,
}

#[derive(Default)]
struct Counters {
    opens: AtomicUsize,
    closes: AtomicUsize,
}

struct FakeLauncher {
    site: Arc<Site>,
    counters: Arc<Counters>,
}

struct FakePage {
    site: Arc<Site>,
    counters: Arc<Counters>,
    url: String,
}

#[async_trait]
impl BrowserLauncher for FakeLauncher {
    async fn open(&self) -> Result<Box<dyn BrowserPage>> {
        self.counters.opens.fetch_add(1, Ordering::SeqCst);
        if self.site.refuse_open {
            return Err(PolsigError::Browser("launch failed".into()));
        }
        Ok(Box::new(FakePage {
            site: self.site.clone(),
            counters: self.counters.clone(),
            url: "about:blank".into(),
        }))
    }
}

#[async_trait]
impl BrowserPage for FakePage {
    async fn goto(&mut self, url: &str) -> Result<()> {
        if self.site.hang_on.as_deref() == Some(url) {
            tokio::time::sleep(Duration::from_secs(60)).await;
        }
        self.url = url.to_string();
        Ok(())
    }

    async fn fill(&mut self, _selector: &str, _value: &str) -> Result<()> {
        Ok(())
    }

    async fn click(&mut self, selector: &str) -> Result<()> {
        let cfg = PortalConfig::default();
        if selector == cfg.submit_selector && self.site.redirect_after_login {
            self.url = AFTER_LOGIN_URL.to_string();
        } else if selector == cfg.search_button_selector {
            self.url = RESULTS_URL.to_string();
        }
        Ok(())
    }

    async fn current_url(&self) -> Result<String> {
        Ok(self.url.clone())
    }

    async fn content(&self) -> Result<String> {
        if self.site.detached_on.as_deref() == Some(self.url.as_str()) {
            return Err(PolsigError::Browser("detached".into()));
        }
        Ok(self
            .site
            .pages
            .get(&self.url)
            .cloned()
            .unwrap_or_else(|| "<html><body></body></html>".to_string()))
    }

    async fn wait_for_load(&mut self) -> Result<()> {
        Ok(())
    }

    async fn close(self: Box<Self>) -> Result<()> {
        self.counters.closes.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}

fn test_config() -> PortalConfig {
    PortalConfig {
        login_url: LOGIN_URL.into(),
        home_url: HOME_URL.into(),
        search_url: SEARCH_URL.into(),
        site_base_url: HOME_URL.into(),
        navigation_timeout: Duration::from_millis(200),
        redirect_timeout: Duration::from_millis(100),
        results_timeout: Duration::from_millis(150),
        action_timeout: Duration::from_millis(200),
        settle_delay: Duration::ZERO,
        poll_interval: Duration::from_millis(10),
        ..PortalConfig::default()
    }
}

fn driver(site: Site) -> (PortalDriver, Arc<Counters>) {
    let counters = Arc::new(Counters::default());
    let launcher = FakeLauncher {
        site: Arc::new(site),
        counters: counters.clone(),
    };
    (PortalDriver::new(Arc::new(launcher), test_config()), counters)
}

fn article_html(body: &str) -> String {
    format!(r#"<html><body><div class="article-body">{}</div></body></html>"#, body)
}

fn credentials() -> PortalCredentials {
    PortalCredentials::new("member", "secret").unwrap()
}

fn long_body() -> String {
    "社会保障制度の見直しについて党内で議論が続いている。".repeat(10)
}

#[tokio::test]
async fn test_redirect_timeout_still_reaches_extraction() {
    let target = "https://portal.test/article/1";
    let mut pages = HashMap::new();
    pages.insert(target.to_string(), article_html(&long_body()));
    let (driver, counters) = driver(Site {
        pages,
        redirect_after_login: false,
        ..Site::default()
    });

    let report = driver.fetch_article_text(&credentials(), target).await;

    assert!(report
        .trail
        .contains(&SessionState::Authenticated { redirect_confirmed: false }));
    assert_eq!(report.trail.last(), Some(&SessionState::Extracted));
    let article = report.outcome.unwrap();
    assert!(!article.suspiciously_short);
    assert_eq!(counters.closes.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn test_confirmed_redirect_is_recorded() {
    let target = "https://portal.test/article/2";
    let mut pages = HashMap::new();
    pages.insert(target.to_string(), article_html("短い本文"));
    let (driver, _) = driver(Site {
        pages,
        redirect_after_login: true,
        ..Site::default()
    });

    let report = driver.fetch_article_text(&credentials(), target).await;

    assert_eq!(
        report.trail,
        vec![
            SessionState::Start,
            SessionState::NavigatedLoginPage,
            SessionState::CredentialsSubmitted,
            SessionState::Authenticated { redirect_confirmed: true },
            SessionState::NavigatedTarget,
            SessionState::Extracted,
        ]
    );
    let article = report.outcome.unwrap();
    assert_eq!(article.text, "短い本文");
    assert!(article.suspiciously_short);
}

#[tokio::test]
async fn test_navigation_timeout_fails_and_releases() {
    let target = "https://portal.test/article/slow";
    let (driver, counters) = driver(Site {
        hang_on: Some(target.to_string()),
        ..Site::default()
    });

    let report = driver.fetch_article_text(&credentials(), target).await;

    assert_eq!(report.failure_reason(), Some(&FailureReason::NavigationTimeout));
    assert!(matches!(report.outcome, Err(PolsigError::NavigationTimeout { .. })));
    assert_eq!(counters.opens.load(Ordering::SeqCst), 1);
    assert_eq!(counters.closes.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn test_unreadable_document_fails_extraction() {
    let target = "https://portal.test/article/gone";
    let (driver, counters) = driver(Site {
        redirect_after_login: true,
        detached_on: Some(target.to_string()),
        ..Site::default()
    });

    let report = driver.fetch_article_text(&credentials(), target).await;

    assert!(report.trail.contains(&SessionState::NavigatedTarget));
    assert!(!report.trail.contains(&SessionState::Extracted));
    match report.failure_reason() {
        Some(FailureReason::ExtractionError(message)) => assert!(message.contains("detached")),
        other => panic!("expected extraction error, got {:?}", other),
    }
    assert!(matches!(report.outcome, Err(PolsigError::ExtractionError(_))));
    assert_eq!(counters.closes.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn test_cancelled_flow_still_closes_page() {
    let target = "https://portal.test/article/slow";
    let (driver, counters) = driver(Site {
        hang_on: Some(LOGIN_URL.to_string()),
        ..Site::default()
    });

    let cancelled = tokio::time::timeout(
        Duration::from_millis(50),
        driver.fetch_article_text(&credentials(), target),
    )
    .await;
    assert!(cancelled.is_err());

    // the close is scheduled on the runtime when the session is dropped
    tokio::time::sleep(Duration::from_millis(20)).await;
    assert_eq!(counters.opens.load(Ordering::SeqCst), 1);
    assert_eq!(counters.closes.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn test_search_returns_top_results_as_absolute_urls() {
    let links: String = (1..=5)
        .map(|i| format!(r#"<a href="/flag/search/{}">記事{}</a>"#, i, i))
        .collect();
    let mut pages = HashMap::new();
    pages.insert(RESULTS_URL.to_string(), format!("<html><body>{}</body></html>", links));
    let (driver, counters) = driver(Site {
        pages,
        ..Site::default()
    });

    let report = driver.search_articles("物価", 3).await;

    assert_eq!(report.trail.last(), Some(&SessionState::LinksExtracted));
    assert_eq!(
        report.outcome.unwrap(),
        vec![
            "https://portal.test/flag/search/1",
            "https://portal.test/flag/search/2",
            "https://portal.test/flag/search/3",
        ]
    );
    assert_eq!(counters.closes.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn test_search_without_results_times_out() {
    let (driver, counters) = driver(Site::default());

    let report = driver.search_articles("該当なし", 3).await;

    assert_eq!(report.failure_reason(), Some(&FailureReason::ResultsTimeout));
    assert!(report.trail.contains(&SessionState::KeywordSubmitted));
    assert!(!report.trail.contains(&SessionState::ResultsReady));
    assert_eq!(counters.closes.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn test_missing_credentials_open_no_session() {
    let (driver, counters) = driver(Site::default());

    let outcome = driver
        .collect_articles(None, &PortalTarget::Keywords(vec!["年金".into()]))
        .await;

    assert_eq!(outcome, RetrievalOutcome::ok(Vec::new()));
    assert_eq!(counters.opens.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn test_collect_articles_searches_then_fetches_each() {
    let links: String = (1..=4)
        .map(|i| format!(r#"<a href="/flag/search/{}">記事{}</a>"#, i, i))
        .collect();
    let mut pages = HashMap::new();
    pages.insert(RESULTS_URL.to_string(), format!("<html><body>{}</body></html>", links));
    for i in 1..=4 {
        pages.insert(
            format!("https://portal.test/flag/search/{}", i),
            article_html(&long_body()),
        );
    }
    let (driver, counters) = driver(Site {
        pages,
        redirect_after_login: true,
        ..Site::default()
    });

    let outcome = driver
        .collect_articles(
            Some(&credentials()),
            &PortalTarget::Keywords(vec!["物価".into(), "賃上げ".into()]),
        )
        .await;

    assert!(outcome.error.is_none());
    assert_eq!(outcome.records.len(), 3);
    assert_eq!(outcome.records[0].title(), "公明新聞 関連記事 1");
    assert_eq!(outcome.records[2].link(), Some("https://portal.test/flag/search/3"));
    // one search session plus one session per article
    assert_eq!(counters.opens.load(Ordering::SeqCst), 4);
    assert_eq!(counters.closes.load(Ordering::SeqCst), 4);
}

#[tokio::test]
async fn test_headline_failure_yields_empty_list() {
    let (driver, counters) = driver(Site {
        refuse_open: true,
        ..Site::default()
    });

    assert!(driver.get_trending_headlines().await.is_empty());
    assert_eq!(counters.opens.load(Ordering::SeqCst), 1);
    assert_eq!(counters.closes.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn test_headlines_from_landing_page() {
    let mut pages = HashMap::new();
    pages.insert(
        HOME_URL.to_string(),
        r#"<html><body>
            <a href="/article/1">物価高対策の補正予算が成立</a>
            <a href="/article/2">短い</a>
            <a href="/article/3">年金制度改革の議論が本格化</a>
        </body></html>"#
            .to_string(),
    );
    let (driver, _) = driver(Site {
        pages,
        ..Site::default()
    });

    let report = driver.headline_flow().await;

    assert_eq!(report.trail.last(), Some(&SessionState::HeadlinesExtracted));
    assert_eq!(
        report.outcome.unwrap(),
        vec!["物価高対策の補正予算が成立", "年金制度改革の議論が本格化"]
    );
}

#[tokio::test]
async fn test_slow_article_keeps_earlier_records_under_aggregation() {
    let links: String = (1..=3)
        .map(|i| format!(r#"<a href="/flag/search/{}">記事{}</a>"#, i, i))
        .collect();
    let mut pages = HashMap::new();
    pages.insert(RESULTS_URL.to_string(), format!("<html><body>{}</body></html>", links));
    for i in [1, 3] {
        pages.insert(
            format!("https://portal.test/flag/search/{}", i),
            article_html(&long_body()),
        );
    }
    let (driver, counters) = driver(Site {
        pages,
        redirect_after_login: true,
        hang_on: Some("https://portal.test/flag/search/2".to_string()),
        ..Site::default()
    });
    let source = PortalSource::new(Arc::new(driver), Some(credentials()));

    // shorter than the second article's navigation timeout alone
    let aggregator = Aggregator::new(AggregatorConfig {
        request_timeout: Duration::from_millis(100),
    })
    .with_source(Arc::new(source), true);
    let report = aggregator.collect(&TopicQuery::new(["物価"])).await;

    let portal = report.outcome(SourceKind::Portal).unwrap();
    let titles: Vec<_> = portal.records.iter().map(|r| r.title()).collect();
    assert_eq!(titles, vec!["公明新聞 関連記事 1", "公明新聞 関連記事 3"]);
    assert!(portal.error.as_deref().unwrap().contains("flag/search/2"));
    assert_eq!(counters.closes.load(Ordering::SeqCst), 4);
}
