use futures::future::join_all;
use log::{debug, info, warn};
use std::any::Any;
use std::collections::HashSet;
use std::sync::Arc;
use std::time::{Duration, Instant};

use super::client::{SourceAdapter, TopicQuery};
use super::types::{RetrievalOutcome, SourceRecord};
use super::SourceKind;
use crate::error::PolsigError;

/// Deduplicate by link (falling back to source and title), keeping the first
/// occurrence, then stable-sort newest first with undated records last.
pub fn merge_records(records: Vec<SourceRecord>) -> Vec<SourceRecord> {
    let mut seen = HashSet::new();
    let mut merged: Vec<SourceRecord> = records
        .into_iter()
        .filter(|record| seen.insert(record.dedup_key()))
        .collect();
    merged.sort_by(|a, b| a.published_at().cmp_recent_first(b.published_at()));
    merged
}

/// Concatenate outcomes in the given order and merge their records
pub fn merge_outcomes<'a, I>(outcomes: I) -> Vec<SourceRecord>
where
    I: IntoIterator<Item = &'a RetrievalOutcome<SourceRecord>>,
{
    merge_records(
        outcomes
            .into_iter()
            .flat_map(|outcome| outcome.records.iter().cloned())
            .collect(),
    )
}

/// Configuration for the fan-out
#[derive(Debug, Clone)]
pub struct AggregatorConfig {
    /// Upper bound for one source's whole retrieval, raised per source when
    /// the adapter declares a longer budget
    pub request_timeout: Duration,
}

impl Default for AggregatorConfig {
    fn default() -> Self {
        Self {
            request_timeout: Duration::from_secs(120),
        }
    }
}

/// Result of one aggregation run
#[derive(Debug, Clone)]
pub struct AggregateReport {
    /// One entry per enabled source, in registration order
    pub per_source: Vec<(SourceKind, RetrievalOutcome<SourceRecord>)>,
    pub records: Vec<SourceRecord>,
    pub execution_time: Duration,
}

impl AggregateReport {
    pub fn outcome(&self, kind: SourceKind) -> Option<&RetrievalOutcome<SourceRecord>> {
        self.per_source
            .iter()
            .find(|(k, _)| *k == kind)
            .map(|(_, outcome)| outcome)
    }

    pub fn failed_sources(&self) -> Vec<SourceKind> {
        self.per_source
            .iter()
            .filter(|(_, outcome)| outcome.is_failed())
            .map(|(kind, _)| *kind)
            .collect()
    }
}

/// Runs every enabled source in its own task and merges what comes back
pub struct Aggregator {
    config: AggregatorConfig,
    sources: Vec<(Arc<dyn SourceAdapter>, bool)>,
}

impl Aggregator {
    pub fn new(config: AggregatorConfig) -> Self {
        Self {
            config,
            sources: Vec::new(),
        }
    }

    pub fn with_source(mut self, adapter: Arc<dyn SourceAdapter>, enabled: bool) -> Self {
        self.sources.push((adapter, enabled));
        self
    }

    pub fn enabled_kinds(&self) -> Vec<SourceKind> {
        self.sources
            .iter()
            .filter(|(_, enabled)| *enabled)
            .map(|(adapter, _)| adapter.kind())
            .collect()
    }

    /// Fan out one query. Errors, timeouts and panics of a source become its
    /// outcome's error; they never reach the other sources.
    pub async fn collect(&self, query: &TopicQuery) -> AggregateReport {
        let start_time = Instant::now();
        let timeout = self.config.request_timeout;

        let handles: Vec<_> = self
            .sources
            .iter()
            .filter(|(_, enabled)| *enabled)
            .map(|(adapter, _)| {
                let adapter = Arc::clone(adapter);
                let kind = adapter.kind();
                let query = query.clone();
                if !adapter.is_configured() {
                    debug!("{} is not configured; running anyway", kind);
                }
                // A source with a longer declared budget is not cut off early
                let limit = adapter
                    .time_budget(&query)
                    .map_or(timeout, |budget| budget.max(timeout));
                let handle = tokio::spawn(async move {
                    match tokio::time::timeout(limit, adapter.retrieve(&query)).await {
                        Ok(Ok(outcome)) => outcome,
                        Ok(Err(e)) => RetrievalOutcome::failed(e.to_string()),
                        Err(_) => RetrievalOutcome::failed(PolsigError::Timeout(limit).to_string()),
                    }
                });
                (kind, handle)
            })
            .collect();

        let (kinds, handles): (Vec<_>, Vec<_>) = handles.into_iter().unzip();
        let joined = join_all(handles).await;

        let per_source: Vec<(SourceKind, RetrievalOutcome<SourceRecord>)> = kinds
            .into_iter()
            .zip(joined)
            .map(|(kind, joined)| {
                let outcome = match joined {
                    Ok(outcome) => outcome,
                    Err(e) if e.is_panic() => {
                        RetrievalOutcome::failed(panic_message(e.into_panic()))
                    }
                    Err(e) => RetrievalOutcome::failed(format!("{} task failed: {}", kind, e)),
                };
                if let Some(error) = &outcome.error {
                    warn!("{}: {}", kind, error);
                }
                (kind, outcome)
            })
            .collect();

        let records = merge_outcomes(per_source.iter().map(|(_, outcome)| outcome));
        let execution_time = start_time.elapsed();
        info!(
            "Collected {} records from {} sources in {:?}",
            records.len(),
            per_source.len(),
            execution_time
        );

        AggregateReport {
            per_source,
            records,
            execution_time,
        }
    }
}

fn panic_message(payload: Box<dyn Any + Send>) -> String {
    if let Some(message) = payload.downcast_ref::<&'static str>() {
        message.to_string()
    } else if let Some(message) = payload.downcast_ref::<String>() {
        message.clone()
    } else {
        "source panicked during retrieval".to_string()
    }
}
