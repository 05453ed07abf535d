use serde::Deserialize;
use serde_json::json;

use polsig::api::deserializers::{single_or_vec, string_or_number, text_or_node};
use polsig::api::estat::{classify, ResponseClass};
use polsig::api::news::parse_feed;

#[derive(Debug, Deserialize, PartialEq)]
struct Table {
    #[serde(rename = "@id")]
    id: String,
}

#[derive(Debug, Deserialize)]
struct TableList {
    #[serde(rename = "TABLE_INF", deserialize_with = "single_or_vec")]
    tables: Vec<Table>,
}

#[test]
fn test_single_table_as_object() {
    let list: TableList = serde_json::from_value(json!({
        "TABLE_INF": {"@id": "0003448237"}
    }))
    .expect("Failed to parse single table");
    assert_eq!(list.tables, vec![Table { id: "0003448237".into() }]);
}

#[test]
fn test_tables_as_array() {
    let list: TableList = serde_json::from_value(json!({
        "TABLE_INF": [{"@id": "0001"}, {"@id": "0002"}]
    }))
    .expect("Failed to parse table array");
    assert_eq!(list.tables.len(), 2);
    assert_eq!(list.tables[1].id, "0002");
}

#[derive(Debug, Deserialize)]
struct Value {
    #[serde(rename = "$", deserialize_with = "string_or_number")]
    value: String,
}

#[test]
fn test_values_arrive_as_strings_or_numbers() {
    let text: Value = serde_json::from_value(json!({"$": "124352"})).unwrap();
    let int: Value = serde_json::from_value(json!({"$": 124352})).unwrap();
    let float: Value = serde_json::from_value(json!({"$": 2.5})).unwrap();
    assert_eq!(text.value, "124352");
    assert_eq!(int.value, "124352");
    assert_eq!(float.value, "2.5");
}

#[derive(Debug, Deserialize)]
struct Titled {
    #[serde(rename = "TITLE", default, deserialize_with = "text_or_node")]
    title: Option<String>,
}

#[test]
fn test_titles_as_text_or_node() {
    let bare: Titled = serde_json::from_value(json!({"TITLE": "人口推計"})).unwrap();
    let node: Titled =
        serde_json::from_value(json!({"TITLE": {"@no": "001", "$": "家計調査"}})).unwrap();
    let missing: Titled = serde_json::from_value(json!({})).unwrap();
    assert_eq!(bare.title.as_deref(), Some("人口推計"));
    assert_eq!(node.title.as_deref(), Some("家計調査"));
    assert_eq!(missing.title, None);
}

#[test]
fn test_classify_single_value_object() {
    let body = json!({
        "GET_STATS_DATA": {
            "RESULT": {"STATUS": 0, "ERROR_MSG": ""},
            "STATISTICAL_DATA": {"DATA_INF": {"VALUE": {"@time": "2024000000", "$": "3.1"}}}
        }
    })
    .to_string();
    match classify(&body) {
        ResponseClass::Valid(points) => {
            assert_eq!(points.len(), 1);
            assert_eq!(points[0].value, "3.1");
            assert_eq!(points[0].unit, None);
        }
        other => panic!("expected valid, got {:?}", other),
    }
}

#[test]
fn test_classify_degraded_bodies() {
    assert_eq!(classify("   ").label(), "unparseable");
    assert_eq!(classify("<!DOCTYPE html><html></html>").label(), "unparseable");
    assert_eq!(classify(r#"{"unexpected": true}"#).label(), "unparseable");
    assert_eq!(
        classify(r#"{"GET_STATS_DATA":{"RESULT":{"STATUS":"0"}}}"#),
        ResponseClass::Empty
    );
    assert_eq!(
        classify(r#"{"GET_STATS_DATA":{"RESULT":{"STATUS":100,"ERROR_MSG":"認証に失敗しました"}}}"#).label(),
        "upstream_error"
    );
}

#[test]
fn test_rss1_feed_items_at_root() {
    let xml = r#"<?xml version="1.0" encoding="UTF-8"?>
<rdf:RDF xmlns:rdf="http://www.w3.org/1999/02/22-rdf-syntax-ns#" xmlns="http://purl.org/rss/1.0/" xmlns:dc="http://purl.org/dc/elements/1.1/">
  <channel><title>政治</title></channel>
  <item>
    <title>衆院予算委で論戦</title>
    <link>https://paper.test/rdf/1</link>
    <dc:date>2024-10-14T16:00:00+09:00</dc:date>
  </item>
</rdf:RDF>"#;
    let items = parse_feed(xml).unwrap();
    assert_eq!(items.len(), 1);
    assert_eq!(items[0].title, "衆院予算委で論戦");
    assert!(!items[0].published.is_unknown());
}

#[test]
fn test_aggregated_feed_keeps_publisher() {
    let xml = r#"<rss version="2.0"><channel>
      <item>
        <title>少子化対策 新たな財源案 - 共同通信</title>
        <link>https://news.test/1</link>
        <pubDate>Mon, 14 Oct 2024 07:00:00 GMT</pubDate>
        <description>&lt;a href="x"&gt;少子化対策&lt;/a&gt;&amp;nbsp;共同通信</description>
        <source url="https://kyodo.test">共同通信</source>
      </item>
    </channel></rss>"#;
    let items = parse_feed(xml).unwrap();
    assert_eq!(items[0].publisher.as_deref(), Some("共同通信"));
    assert!(!items[0].summary.contains('<'));
}

#[test]
fn test_broken_feed_is_a_parse_error() {
    assert!(parse_feed("<rss><channel><item><title>unterminated").is_err());
}
