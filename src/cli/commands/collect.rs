use chrono::NaiveDate;
use log::debug;

use crate::api::client::TopicQuery;
use crate::api::SourceKind;
use crate::cli::args::CollectArgs;
use crate::cli::OutputFormat;
use crate::config::Config;
use crate::error::{PolsigError, Result};
use crate::facade::Retriever;
use crate::output;
use crate::progress::SourceProgress;

/// Execute collect command
pub async fn execute(
    args: CollectArgs,
    format: OutputFormat,
    quiet: bool,
    verbose: bool,
) -> Result<()> {
    let mut config = Config::load()?;
    for name in &args.skip {
        let kind = SourceKind::from_str(name.trim()).ok_or_else(|| {
            PolsigError::InvalidInput(format!(
                "Unknown source '{}' (news, diet, portal, law, stats)",
                name
            ))
        })?;
        config.apply(&format!("sources.{}", kind.as_str()), "false")?;
    }

    let query = build_query(&args, &config)?;
    let retriever = Retriever::from_config(&config)?;
    debug!("Collecting {:?} with sources {:?}", query, retriever.toggles());

    let progress = SourceProgress::new(&query.joined(", "), quiet, verbose);
    let report = retriever
        .collect_all(&query, config.portal_credentials())
        .await;
    drop(progress);

    println!("{}", output::format_report(&report, format)?);
    Ok(())
}

fn build_query(args: &CollectArgs, config: &Config) -> Result<TopicQuery> {
    let mut query = TopicQuery::new(args.keywords.iter().cloned());
    if query.keywords.is_empty() {
        return Err(PolsigError::InvalidInput("At least one keyword is required".to_string()));
    }
    query.days = args.days.unwrap_or(config.news.days);
    query.from = args.from.as_deref().map(parse_day).transpose()?;
    query.until = args.until.as_deref().map(parse_day).transpose()?;
    if let (Some(from), Some(until)) = (query.from, query.until) {
        if from > until {
            return Err(PolsigError::InvalidInput(format!(
                "from ({}) must not be after until ({})",
                from, until
            )));
        }
    }
    query.portal_url = args.url.clone().or_else(|| config.portal.article_url.clone());
    Ok(query)
}

fn parse_day(raw: &str) -> Result<NaiveDate> {
    NaiveDate::parse_from_str(raw.trim(), "%Y-%m-%d")
        .map_err(|_| PolsigError::InvalidInput(format!("expected YYYY-MM-DD, got '{}'", raw)))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn args(keywords: &[&str]) -> CollectArgs {
        CollectArgs {
            keywords: keywords.iter().map(|k| k.to_string()).collect(),
            days: None,
            from: None,
            until: Some("2024-10-01".to_string()),
            url: None,
            skip: Vec::new(),
        }
    }

    #[test]
    fn test_build_query_uses_config_defaults() {
        let mut config = Config::default();
        config.news.days = 3;
        config.portal.article_url = Some("https://viewer.example.jp/a/1".to_string());
        let query = build_query(&args(&["年金"]), &config).unwrap();
        assert_eq!(query.days, 3);
        assert_eq!(query.until, NaiveDate::from_ymd_opt(2024, 10, 1));
        assert_eq!(query.portal_url.as_deref(), Some("https://viewer.example.jp/a/1"));
    }

    #[test]
    fn test_explicit_window_start() {
        let mut with_from = args(&["年金"]);
        with_from.from = Some("2024-09-01".to_string());
        let query = build_query(&with_from, &Config::default()).unwrap();
        assert_eq!(query.from, NaiveDate::from_ymd_opt(2024, 9, 1));

        with_from.from = Some("2024-10-02".to_string());
        assert!(build_query(&with_from, &Config::default()).is_err());
    }

    #[test]
    fn test_blank_keywords_rejected() {
        assert!(build_query(&args(&[" "]), &Config::default()).is_err());
    }
}
