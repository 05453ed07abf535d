//! Browser seam for the portal session driver.
//!
//! `BrowserLauncher` opens one isolated page per session; the Chromium
//! implementation launches a fresh headless browser every time so no two
//! flows ever share cookies.

use async_trait::async_trait;
use chromiumoxide::browser::{Browser, BrowserConfig};
use chromiumoxide::page::Page;
use futures::StreamExt;
use log::debug;
use std::path::PathBuf;
use tokio::task::JoinHandle;

use crate::error::{PolsigError, Result};

/// Overrides Chromium discovery
pub const CHROMIUM_PATH_ENV: &str = "POLSIG_CHROMIUM_PATH";

/// One open browser page. Implementations do not apply timeouts themselves;
/// the session wraps every call in its own bound.
#[async_trait]
pub trait BrowserPage: Send + Sync {
    async fn goto(&mut self, url: &str) -> Result<()>;

    /// Focus the element and type `value` into it
    async fn fill(&mut self, selector: &str, value: &str) -> Result<()>;

    async fn click(&mut self, selector: &str) -> Result<()>;

    async fn current_url(&self) -> Result<String>;

    /// Serialized DOM of the current document
    async fn content(&self) -> Result<String>;

    /// Wait until the current navigation has settled
    async fn wait_for_load(&mut self) -> Result<()>;

    async fn close(self: Box<Self>) -> Result<()>;
}

#[async_trait]
pub trait BrowserLauncher: Send + Sync {
    async fn open(&self) -> Result<Box<dyn BrowserPage>>;
}

/// Find the Chromium binary, or let chromiumoxide detect it when `None`
pub fn find_chromium() -> Option<PathBuf> {
    std::env::var(CHROMIUM_PATH_ENV)
        .ok()
        .map(PathBuf::from)
        .filter(|path| path.exists())
}

/// Launches a headless Chromium per session
#[derive(Debug, Clone)]
pub struct ChromiumLauncher {
    user_agent: String,
    executable: Option<PathBuf>,
}

impl ChromiumLauncher {
    pub fn new(user_agent: impl Into<String>) -> Self {
        Self {
            user_agent: user_agent.into(),
            executable: find_chromium(),
        }
    }
}

#[async_trait]
impl BrowserLauncher for ChromiumLauncher {
    async fn open(&self) -> Result<Box<dyn BrowserPage>> {
        let mut builder = BrowserConfig::builder()
            .arg("--headless=new")
            .arg("--disable-gpu")
            .arg("--no-sandbox")
            .arg("--disable-dev-shm-usage")
            .arg("--disable-extensions")
            .arg(format!("--user-agent={}", self.user_agent));
        if let Some(path) = &self.executable {
            builder = builder.chrome_executable(path);
        }
        let config = builder
            .build()
            .map_err(|e| PolsigError::Browser(format!("failed to build browser config: {e}")))?;

        let (browser, mut handler) = Browser::launch(config)
            .await
            .map_err(|e| PolsigError::Browser(format!("failed to launch Chromium: {e}")))?;

        let handler_task = tokio::spawn(async move {
            while let Some(event) = handler.next().await {
                let _ = event;
            }
        });

        let page = match browser.new_page("about:blank").await {
            Ok(page) => page,
            Err(e) => {
                handler_task.abort();
                return Err(PolsigError::Browser(format!("failed to create page: {e}")));
            }
        };

        debug!("Chromium session opened");
        Ok(Box::new(ChromiumPage {
            browser,
            page,
            handler_task,
        }))
    }
}

pub struct ChromiumPage {
    browser: Browser,
    page: Page,
    handler_task: JoinHandle<()>,
}

fn browser_err(action: &str, e: impl std::fmt::Display) -> PolsigError {
    PolsigError::Browser(format!("{action}: {e}"))
}

#[async_trait]
impl BrowserPage for ChromiumPage {
    async fn goto(&mut self, url: &str) -> Result<()> {
        self.page
            .goto(url)
            .await
            .map_err(|e| browser_err("navigation failed", e))?;
        Ok(())
    }

    async fn fill(&mut self, selector: &str, value: &str) -> Result<()> {
        self.page
            .find_element(selector)
            .await
            .map_err(|e| browser_err(&format!("element {selector} not found"), e))?
            .click()
            .await
            .map_err(|e| browser_err("focus failed", e))?
            .type_str(value)
            .await
            .map_err(|e| browser_err("typing failed", e))?;
        Ok(())
    }

    async fn click(&mut self, selector: &str) -> Result<()> {
        self.page
            .find_element(selector)
            .await
            .map_err(|e| browser_err(&format!("element {selector} not found"), e))?
            .click()
            .await
            .map_err(|e| browser_err("click failed", e))?;
        Ok(())
    }

    async fn current_url(&self) -> Result<String> {
        Ok(self
            .page
            .url()
            .await
            .map_err(|e| browser_err("failed to read URL", e))?
            .unwrap_or_default())
    }

    async fn content(&self) -> Result<String> {
        self.page
            .content()
            .await
            .map_err(|e| browser_err("failed to read document", e))
    }

    async fn wait_for_load(&mut self) -> Result<()> {
        self.page
            .wait_for_navigation()
            .await
            .map_err(|e| browser_err("page did not settle", e))?;
        Ok(())
    }

    async fn close(self: Box<Self>) -> Result<()> {
        let mut this = *self;
        let _ = this.page.close().await;
        let closed = this.browser.close().await;
        let _ = this.browser.wait().await;
        this.handler_task.abort();
        debug!("Chromium session closed");
        closed.map(|_| ()).map_err(|e| browser_err("failed to close browser", e))
    }
}
