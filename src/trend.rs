//! Trending-keyword fan-out.
//!
//! Two headline branches (general feeds and the member portal) run
//! concurrently. Each branch then hands its headlines to a keyword
//! extractor. A failure at any of the four steps stays in its branch.

use async_trait::async_trait;
use log::{info, warn};
use std::fmt;
use std::sync::Arc;

use crate::api::news::NewsClient;
use crate::api::types::{TrendBranch, TrendReport, TrendSource};
use crate::error::Result;
use crate::portal::PortalDriver;

/// Who extracts keywords from headlines. Implemented outside this crate,
/// typically on top of a language-model API.
#[async_trait]
pub trait KeywordExtractor: Send + Sync {
    async fn extract_keywords(&self, headlines: &[String]) -> anyhow::Result<Vec<String>>;
}

/// A branch's headline supplier
#[async_trait]
pub trait HeadlineSource: Send + Sync {
    async fn headlines(&self) -> Result<Vec<String>>;
}

#[async_trait]
impl HeadlineSource for NewsClient {
    async fn headlines(&self) -> Result<Vec<String>> {
        self.get_trending_headlines().await
    }
}

#[async_trait]
impl HeadlineSource for PortalDriver {
    async fn headlines(&self) -> Result<Vec<String>> {
        self.headline_flow().await.into_result()
    }
}

/// Identifies the extractor configuration a cached report belongs to
#[derive(Clone, PartialEq, Eq)]
pub struct ProviderContext {
    pub provider: String,
    pub api_key: String,
    pub model: String,
}

impl ProviderContext {
    pub fn new(
        provider: impl Into<String>,
        api_key: impl Into<String>,
        model: impl Into<String>,
    ) -> Self {
        Self {
            provider: provider.into(),
            api_key: api_key.into(),
            model: model.into(),
        }
    }
}

impl fmt::Debug for ProviderContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ProviderContext")
            .field("provider", &self.provider)
            .field("api_key", &"***")
            .field("model", &self.model)
            .finish()
    }
}

async fn run_branch(
    source: TrendSource,
    headlines: &dyn HeadlineSource,
    extractor: &dyn KeywordExtractor,
) -> TrendBranch {
    let mut branch = TrendBranch::default();

    match headlines.headlines().await {
        Ok(found) => branch.headlines = found,
        Err(e) => {
            warn!("{:?} headlines failed: {}", source, e);
            branch.error = Some(e.to_string());
        }
    }

    if branch.headlines.is_empty() {
        return branch;
    }

    match extractor.extract_keywords(&branch.headlines).await {
        Ok(tags) => branch.tags = tags,
        Err(e) => {
            warn!("{:?} keyword extraction failed: {}", source, e);
            let tags_error = format!("Tags Error: {}", e);
            branch.error = Some(match branch.error.take() {
                Some(previous) => format!("{} | {}", previous, tags_error),
                None => tags_error,
            });
        }
    }
    branch
}

/// Run both branches concurrently and report each separately
pub async fn collect_trending(
    general: Arc<dyn HeadlineSource>,
    portal: Arc<dyn HeadlineSource>,
    extractor: Arc<dyn KeywordExtractor>,
) -> TrendReport {
    let (general_branch, portal_branch) = tokio::join!(
        run_branch(TrendSource::General, general.as_ref(), extractor.as_ref()),
        run_branch(TrendSource::Portal, portal.as_ref(), extractor.as_ref()),
    );

    info!(
        "Trending: {} general and {} portal tags",
        general_branch.tags.len(),
        portal_branch.tags.len()
    );

    let mut report = TrendReport::default();
    report.per_branch.insert(TrendSource::General, general_branch);
    report.per_branch.insert(TrendSource::Portal, portal_branch);
    report
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::PolsigError;
    use pretty_assertions::assert_eq;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct Fixed(Result<Vec<String>>);

    #[async_trait]
    impl HeadlineSource for Fixed {
        async fn headlines(&self) -> Result<Vec<String>> {
            match &self.0 {
                Ok(v) => Ok(v.clone()),
                Err(e) => Err(PolsigError::Other(e.to_string())),
            }
        }
    }

    struct CountingExtractor {
        calls: AtomicUsize,
        fail: bool,
    }

    #[async_trait]
    impl KeywordExtractor for CountingExtractor {
        async fn extract_keywords(&self, headlines: &[String]) -> anyhow::Result<Vec<String>> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            if self.fail {
                anyhow::bail!("quota exceeded");
            }
            Ok(headlines.iter().map(|h| format!("#{}", h)).collect())
        }
    }

    #[tokio::test]
    async fn test_branches_are_independent() {
        let extractor = Arc::new(CountingExtractor {
            calls: AtomicUsize::new(0),
            fail: false,
        });
        let report = collect_trending(
            Arc::new(Fixed(Ok(vec!["減税".into()]))),
            Arc::new(Fixed(Err(PolsigError::NavigationTimeout {
                url: "https://portal".into(),
                limit: std::time::Duration::from_secs(30),
            }))),
            extractor.clone(),
        )
        .await;

        let general = report.branch(TrendSource::General).unwrap();
        assert_eq!(general.tags, vec!["#減税".to_string()]);
        assert_eq!(general.error, None);

        let portal = report.branch(TrendSource::Portal).unwrap();
        assert!(portal.headlines.is_empty());
        assert!(portal.error.is_some());
        // no headlines, no extraction
        assert_eq!(extractor.calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_tag_error_is_prefixed() {
        let extractor = Arc::new(CountingExtractor {
            calls: AtomicUsize::new(0),
            fail: true,
        });
        let report = collect_trending(
            Arc::new(Fixed(Ok(vec!["補正予算".into()]))),
            Arc::new(Fixed(Ok(Vec::new()))),
            extractor,
        )
        .await;

        let general = report.branch(TrendSource::General).unwrap();
        assert_eq!(general.headlines, vec!["補正予算".to_string()]);
        assert_eq!(general.error.as_deref(), Some("Tags Error: quota exceeded"));
        assert_eq!(report.branch(TrendSource::Portal).unwrap().error, None);
    }

    #[test]
    fn test_provider_context_debug_hides_key() {
        let ctx = ProviderContext::new("openai", "sk-secret", "gpt-4o-mini");
        assert!(!format!("{:?}", ctx).contains("sk-secret"));
    }
}
