use async_trait::async_trait;
use polsig::api::client::{SourceAdapter, TopicQuery};
use polsig::api::parallel::{merge_records, Aggregator, AggregatorConfig};
use polsig::api::types::{PublishedAt, RetrievalOutcome, SourceRecord};
use polsig::api::SourceKind;
use polsig::error::{PolsigError, Result};
use pretty_assertions::assert_eq;
use std::sync::Arc;
use std::time::Duration;

enum Behavior {
    Records(Vec<SourceRecord>),
    Fail,
    Panic,
}

struct Scripted {
    kind: SourceKind,
    behavior: Behavior,
}

#[async_trait]
impl SourceAdapter for Scripted {
    async fn retrieve(&self, _query: &TopicQuery) -> Result<RetrievalOutcome<SourceRecord>> {
        match &self.behavior {
            Behavior::Records(records) => Ok(RetrievalOutcome::ok(records.clone())),
            Behavior::Fail => Err(PolsigError::ServerError("upstream returned 502".into())),
            Behavior::Panic => panic!("adapter blew up"),
        }
    }

    fn kind(&self) -> SourceKind {
        self.kind
    }
}

fn record(source: &str, title: &str, link: Option<&str>, date: Option<&str>) -> SourceRecord {
    SourceRecord::new(
        source,
        title,
        "本文",
        link.map(str::to_string),
        PublishedAt::from_optional(date),
    )
}

fn aggregator(portal: Behavior) -> Aggregator {
    let sources: Vec<Scripted> = vec![
        Scripted {
            kind: SourceKind::News,
            behavior: Behavior::Records(vec![
                record(
                    "NHK",
                    "年金制度改正案",
                    Some("https://n.test/1"),
                    Some("2024-10-03T09:00:00+09:00"),
                ),
                record("NHK", "日付不明の記事", Some("https://n.test/2"), None),
            ]),
        },
        Scripted {
            kind: SourceKind::Diet,
            behavior: Behavior::Records(vec![record(
                "国会会議録",
                "厚生労働委員会",
                Some("https://kokkai.test/s/1"),
                Some("2024-10-05"),
            )]),
        },
        Scripted {
            kind: SourceKind::Portal,
            behavior: portal,
        },
        Scripted {
            kind: SourceKind::Law,
            behavior: Behavior::Records(vec![record("e-Gov法令", "国民年金法", None, None)]),
        },
        Scripted {
            kind: SourceKind::Stats,
            behavior: Behavior::Records(vec![
                // same link as a news item; the earlier source wins
                record("e-Stat", "重複", Some("https://n.test/1"), Some("2024-10-09")),
            ]),
        },
    ];

    sources
        .into_iter()
        .fold(Aggregator::new(AggregatorConfig::default()), |agg, source| {
            agg.with_source(Arc::new(source), true)
        })
}

#[tokio::test]
async fn test_failing_source_does_not_affect_others() {
    let report = aggregator(Behavior::Fail).collect(&TopicQuery::new(["年金"])).await;

    assert_eq!(report.per_source.len(), 5);
    assert_eq!(report.failed_sources(), vec![SourceKind::Portal]);
    let portal = report.outcome(SourceKind::Portal).unwrap();
    assert!(portal.records.is_empty());
    assert!(portal.error.as_deref().unwrap().contains("502"));

    let titles: Vec<_> = report.records.iter().map(|r| r.title()).collect();
    assert_eq!(
        titles,
        vec!["厚生労働委員会", "年金制度改正案", "日付不明の記事", "国民年金法"]
    );
}

#[tokio::test]
async fn test_panicking_source_is_captured() {
    let report = aggregator(Behavior::Panic).collect(&TopicQuery::new(["年金"])).await;

    let portal = report.outcome(SourceKind::Portal).unwrap();
    assert!(portal.records.is_empty());
    assert!(portal.error.as_deref().unwrap().contains("adapter blew up"));
    assert_eq!(report.records.len(), 4);
    assert!(report.outcome(SourceKind::News).unwrap().error.is_none());
}

#[tokio::test]
async fn test_undated_records_sort_last() {
    let report = aggregator(Behavior::Records(vec![record(
        "公明新聞",
        "ポータル記事",
        Some("https://p.test/1"),
        Some("2024-10-04"),
    )]))
    .collect(&TopicQuery::new(["年金"]))
    .await;

    let first_unknown = report
        .records
        .iter()
        .position(|r| r.published_at().is_unknown())
        .unwrap();
    assert!(report.records[first_unknown..]
        .iter()
        .all(|r| r.published_at().is_unknown()));
    assert_eq!(report.records[0].title(), "厚生労働委員会");
    assert_eq!(report.records[1].title(), "ポータル記事");
}

#[tokio::test]
async fn test_merge_is_idempotent() {
    let report = aggregator(Behavior::Fail).collect(&TopicQuery::new(["年金"])).await;
    let again = merge_records(report.records.clone());
    assert_eq!(again, report.records);
}

#[tokio::test]
async fn test_disabled_sources_are_not_called() {
    let aggregator = Aggregator::new(AggregatorConfig {
        request_timeout: Duration::from_secs(5),
    })
    .with_source(
        Arc::new(Scripted {
            kind: SourceKind::News,
            behavior: Behavior::Records(vec![record("NHK", "記事", None, None)]),
        }),
        true,
    )
    .with_source(
        Arc::new(Scripted {
            kind: SourceKind::Portal,
            behavior: Behavior::Panic,
        }),
        false,
    );

    assert_eq!(aggregator.enabled_kinds(), vec![SourceKind::News]);
    let report = aggregator.collect(&TopicQuery::new(["年金"])).await;
    assert_eq!(report.per_source.len(), 1);
    assert!(report.outcome(SourceKind::Portal).is_none());
}
