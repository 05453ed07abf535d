use crate::api::SourceKind;
use crate::cli::args::NewsArgs;
use crate::cli::OutputFormat;
use crate::error::{PolsigError, Result};
use crate::output;
use crate::progress::{messages, SourceProgress};

/// Execute news command
pub async fn execute(
    args: NewsArgs,
    format: OutputFormat,
    quiet: bool,
    verbose: bool,
) -> Result<()> {
    if args.keyword.trim().is_empty() {
        return Err(PolsigError::InvalidInput("Search keyword cannot be empty".to_string()));
    }
    let (config, retriever) = super::setup()?;
    let days = args.days.unwrap_or(config.news.days);

    let name = SourceKind::News.display_name();
    let progress = SourceProgress::new(name, quiet, verbose);
    progress.set_message(&format!("'{}' ({}日間) を検索中...", args.keyword, days));

    let outcome = retriever.fetch_news(&args.keyword, days).await;
    progress.finish_with_message(&messages::fetched(name, outcome.records.len()));

    println!("{}", output::format_records(name, &outcome, format)?);
    Ok(())
}
