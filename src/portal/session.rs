use log::{debug, warn};
use regex::Regex;
use std::fmt;
use std::time::Duration;
use tokio::time::{sleep, timeout, Instant};

use super::browser::{BrowserLauncher, BrowserPage};
use crate::error::{PolsigError, Result};
use crate::extract;

/// Why a flow ended in `Failed`
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FailureReason {
    NavigationTimeout,
    ResultsTimeout,
    ExtractionError(String),
    Browser(String),
}

impl FailureReason {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::NavigationTimeout => "navigation_timeout",
            Self::ResultsTimeout => "results_timeout",
            Self::ExtractionError(_) => "extraction_error",
            Self::Browser(_) => "browser_error",
        }
    }

    pub fn from_error(error: &PolsigError) -> Self {
        match error {
            PolsigError::NavigationTimeout { .. } => Self::NavigationTimeout,
            PolsigError::ResultsTimeout(_) => Self::ResultsTimeout,
            PolsigError::ExtractionError(msg) => Self::ExtractionError(msg.clone()),
            other => Self::Browser(other.to_string()),
        }
    }
}

impl fmt::Display for FailureReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::ExtractionError(msg) | Self::Browser(msg) => {
                write!(f, "{}: {}", self.as_str(), msg)
            }
            _ => f.write_str(self.as_str()),
        }
    }
}

/// Logical position of a session inside one flow
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionState {
    Start,
    // login flow
    NavigatedLoginPage,
    CredentialsSubmitted,
    Authenticated { redirect_confirmed: bool },
    NavigatedTarget,
    Extracted,
    // search flow
    NavigatedSearch,
    KeywordSubmitted,
    ResultsReady,
    LinksExtracted,
    // headline flow
    NavigatedLanding,
    HeadlinesExtracted,
    Failed(FailureReason),
}

impl SessionState {
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            Self::Extracted | Self::LinksExtracted | Self::HeadlinesExtracted | Self::Failed(_)
        )
    }
}

/// Outcome of one flow plus the states it passed through
#[derive(Debug)]
pub struct FlowReport<T> {
    pub outcome: Result<T>,
    pub trail: Vec<SessionState>,
}

impl<T> FlowReport<T> {
    pub fn failure_reason(&self) -> Option<&FailureReason> {
        match self.trail.last() {
            Some(SessionState::Failed(reason)) => Some(reason),
            _ => None,
        }
    }

    pub fn into_result(self) -> Result<T> {
        self.outcome
    }
}

/// One single-use browser session.
///
/// The page is closed by `release()`; if the session is dropped without it
/// (early return, panic) the close is scheduled on the current runtime.
pub struct Session {
    page: Option<Box<dyn BrowserPage>>,
    trail: Vec<SessionState>,
    poll_interval: Duration,
}

impl Session {
    pub async fn open(launcher: &dyn BrowserLauncher, poll_interval: Duration) -> Result<Self> {
        let page = launcher.open().await?;
        Ok(Self {
            page: Some(page),
            trail: vec![SessionState::Start],
            poll_interval,
        })
    }

    pub fn state(&self) -> &SessionState {
        self.trail.last().unwrap_or(&SessionState::Start)
    }

    pub fn trail(&self) -> &[SessionState] {
        &self.trail
    }

    pub fn advance(&mut self, next: SessionState) {
        debug!("portal session: {:?} -> {:?}", self.state(), next);
        self.trail.push(next);
    }

    /// Record the failure edge for `error` and hand the error back
    pub fn fail(&mut self, error: PolsigError) -> PolsigError {
        let reason = FailureReason::from_error(&error);
        warn!("portal session failed ({}): {}", reason.as_str(), error);
        self.advance(SessionState::Failed(reason));
        error
    }

    fn page_mut(&mut self) -> Result<&mut Box<dyn BrowserPage>> {
        self.page
            .as_mut()
            .ok_or_else(|| PolsigError::Browser("session already released".to_string()))
    }

    fn page(&self) -> Result<&dyn BrowserPage> {
        self.page
            .as_deref()
            .ok_or_else(|| PolsigError::Browser("session already released".to_string()))
    }

    /// Go to `url` and wait for it to settle, bounded by `limit`
    pub async fn navigate(&mut self, url: &str, limit: Duration) -> Result<()> {
        let page = self.page_mut()?;
        let nav = async {
            page.goto(url).await?;
            page.wait_for_load().await
        };
        match timeout(limit, nav).await {
            Ok(result) => result,
            Err(_) => Err(PolsigError::NavigationTimeout {
                url: url.to_string(),
                limit,
            }),
        }
    }

    pub async fn fill(&mut self, selector: &str, value: &str, limit: Duration) -> Result<()> {
        let page = self.page_mut()?;
        timeout(limit, page.fill(selector, value))
            .await
            .map_err(|_| PolsigError::Timeout(limit))?
    }

    pub async fn click(&mut self, selector: &str, limit: Duration) -> Result<()> {
        let page = self.page_mut()?;
        timeout(limit, page.click(selector))
            .await
            .map_err(|_| PolsigError::Timeout(limit))?
    }

    /// Poll the page URL until it matches `pattern`; false on timeout
    pub async fn wait_for_url(&self, pattern: &Regex, limit: Duration) -> bool {
        let deadline = Instant::now() + limit;
        loop {
            if let Ok(page) = self.page() {
                if let Ok(url) = page.current_url().await {
                    if pattern.is_match(&url) {
                        return true;
                    }
                }
            }
            if Instant::now() >= deadline {
                return false;
            }
            sleep(self.poll_interval).await;
        }
    }

    /// Poll the document until `selector` matches; false on timeout
    pub async fn wait_for_selector(&self, selector: &str, limit: Duration) -> bool {
        let deadline = Instant::now() + limit;
        loop {
            if let Ok(page) = self.page() {
                if let Ok(html) = page.content().await {
                    if extract::has_match(&html, selector) {
                        return true;
                    }
                }
            }
            if Instant::now() >= deadline {
                return false;
            }
            sleep(self.poll_interval).await;
        }
    }

    pub async fn current_url(&self) -> Result<String> {
        self.page()?.current_url().await
    }

    /// Document of the current page; failures surface as extraction errors
    pub async fn content(&self) -> Result<String> {
        self.page()?
            .content()
            .await
            .map_err(|e| PolsigError::ExtractionError(e.to_string()))
    }

    /// Close the page and return the trail
    pub async fn release(mut self) -> Vec<SessionState> {
        if let Some(page) = self.page.take() {
            if let Err(e) = page.close().await {
                warn!("failed to close portal session: {}", e);
            }
        }
        std::mem::take(&mut self.trail)
    }
}

impl Drop for Session {
    fn drop(&mut self) {
        if let Some(page) = self.page.take() {
            match tokio::runtime::Handle::try_current() {
                Ok(handle) => {
                    debug!("portal session dropped without release, closing in background");
                    handle.spawn(async move {
                        let _ = page.close().await;
                    });
                }
                Err(_) => warn!("portal session dropped outside a runtime; browser not closed"),
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_failure_reason_names() {
        assert_eq!(FailureReason::NavigationTimeout.as_str(), "navigation_timeout");
        assert_eq!(FailureReason::ResultsTimeout.as_str(), "results_timeout");
        let reason = FailureReason::from_error(&PolsigError::ExtractionError("detached".into()));
        assert_eq!(reason.to_string(), "extraction_error: detached");
    }

    #[test]
    fn test_terminal_states() {
        assert!(SessionState::Extracted.is_terminal());
        assert!(SessionState::Failed(FailureReason::NavigationTimeout).is_terminal());
        assert!(!SessionState::Authenticated { redirect_confirmed: false }.is_terminal());
    }
}
