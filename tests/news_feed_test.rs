use chrono::{Duration, Utc};
use mockito::Server;
use polsig::api::client::ClientConfig;
use polsig::api::news::{FeedSource, NewsClient, NewsEndpoints};

fn config() -> ClientConfig {
    ClientConfig {
        max_retries: 1,
        timeout: 5,
        ..ClientConfig::default()
    }
}

fn rss(items: &[(String, String, i64)]) -> String {
    let now = Utc::now();
    let body: String = items
        .iter()
        .map(|(title, link, age_hours)| {
            let date = (now - Duration::hours(*age_hours)).to_rfc2822();
            format!(
                "<item><title>{}</title><link>{}</link><pubDate>{}</pubDate><description>&lt;p&gt;{}&lt;/p&gt;</description></item>",
                title, link, date, title
            )
        })
        .collect();
    format!(
        r#"<?xml version="1.0" encoding="UTF-8"?><rss version="2.0"><channel><title>政治</title>{}</channel></rss>"#,
        body
    )
}

fn endpoints(feeds: Vec<FeedSource>) -> NewsEndpoints {
    NewsEndpoints {
        search_url: None,
        top_stories_url: None,
        feeds,
    }
}

#[tokio::test]
async fn test_media_feed_window_and_order() {
    let mut server = Server::new_async().await;

    // 9 items inside the window, 3 older than 8 days, 2 off-topic
    let mut items: Vec<(String, String, i64)> = (0..9)
        .map(|i| {
            (
                format!("年金改革の議論 その{}", i),
                format!("https://paper.test/a/{}", i),
                (i * 12) as i64,
            )
        })
        .collect();
    for (i, days) in [10, 11, 12].iter().enumerate() {
        items.push((
            format!("年金改革 過去記事{}", i),
            format!("https://paper.test/old/{}", i),
            days * 24,
        ));
    }
    items.push(("物価高対策".into(), "https://paper.test/x/1".into(), 1));
    items.push(("補正予算の審議".into(), "https://paper.test/x/2".into(), 2));

    let mock = server
        .mock("GET", "/politics.xml")
        .with_status(200)
        .with_header("content-type", "application/rss+xml")
        .with_body(rss(&items))
        .create_async()
        .await;

    let client = NewsClient::with_endpoints(
        config(),
        endpoints(vec![FeedSource::new(
            "テスト新聞",
            format!("{}/politics.xml", server.url()),
        )]),
    )
    .unwrap();

    let outcome = client.fetch_news("年金改革", 7).await;
    mock.assert_async().await;

    assert!(outcome.error.is_none());
    assert_eq!(outcome.records.len(), 9);
    assert!(outcome.records.iter().all(|r| r.source_name() == "テスト新聞"));
    assert_eq!(outcome.records[0].title(), "年金改革の議論 その0");
    assert_eq!(outcome.records[8].title(), "年金改革の議論 その8");
    assert_eq!(outcome.records[0].body(), "年金改革の議論 その0");

    let dates: Vec<_> = outcome
        .records
        .iter()
        .map(|r| *r.published_at().datetime().unwrap())
        .collect();
    assert!(dates.windows(2).all(|w| w[0] >= w[1]));
}

#[tokio::test]
async fn test_failing_feed_is_reported_inline() {
    let mut server = Server::new_async().await;

    let good = server
        .mock("GET", "/good.xml")
        .with_status(200)
        .with_body(rss(&[(
            "少子化対策の新法案".into(),
            "https://paper.test/b/1".into(),
            3,
        )]))
        .create_async()
        .await;
    let bad = server
        .mock("GET", "/bad.xml")
        .with_status(503)
        .create_async()
        .await;

    let client = NewsClient::with_endpoints(
        config(),
        endpoints(vec![
            FeedSource::new("壊れた新聞", format!("{}/bad.xml", server.url())),
            FeedSource::new("元気な新聞", format!("{}/good.xml", server.url())),
        ]),
    )
    .unwrap();

    let outcome = client.fetch_news("少子化", 7).await;
    good.assert_async().await;
    bad.assert_async().await;

    assert_eq!(outcome.records.len(), 1);
    assert_eq!(outcome.records[0].source_name(), "元気な新聞");
    assert!(outcome.error.unwrap().contains("壊れた新聞"));
}

#[tokio::test]
async fn test_headlines_fail_only_when_every_feed_fails() {
    let mut server = Server::new_async().await;
    let _down = server
        .mock("GET", "/down.xml")
        .with_status(500)
        .expect_at_least(1)
        .create_async()
        .await;

    let client = NewsClient::with_endpoints(
        config(),
        endpoints(vec![FeedSource::new("停止中", format!("{}/down.xml", server.url()))]),
    )
    .unwrap();
    assert!(client.get_trending_headlines().await.is_err());

    let _up = server
        .mock("GET", "/up.xml")
        .with_status(200)
        .with_body(rss(&[
            ("見出し一".into(), "https://paper.test/h/1".into(), 1),
            ("見出し二".into(), "https://paper.test/h/2".into(), 2),
            ("見出し三".into(), "https://paper.test/h/3".into(), 3),
            ("見出し四".into(), "https://paper.test/h/4".into(), 4),
        ]))
        .create_async()
        .await;

    let client = NewsClient::with_endpoints(
        config(),
        endpoints(vec![
            FeedSource::new("停止中", format!("{}/down.xml", server.url())),
            FeedSource::new("稼働中", format!("{}/up.xml", server.url())),
        ]),
    )
    .unwrap();
    let headlines = client.get_trending_headlines().await.unwrap();
    assert_eq!(headlines, vec!["見出し一", "見出し二", "見出し三"]);
}
