use chrono::{Duration, Local, NaiveDate};

use crate::api::SourceKind;
use crate::cli::args::SpeechArgs;
use crate::cli::OutputFormat;
use crate::error::{PolsigError, Result};
use crate::output;
use crate::progress::{messages, SourceProgress};

/// Execute speech command
pub async fn execute(
    args: SpeechArgs,
    format: OutputFormat,
    quiet: bool,
    verbose: bool,
) -> Result<()> {
    let (config, retriever) = super::setup()?;
    let (from, until) = resolve_window(
        args.from.as_deref(),
        args.until.as_deref(),
        Local::now().date_naive(),
        config.diet.lookback_days,
    )?;

    let name = SourceKind::Diet.display_name();
    let progress = SourceProgress::new(name, quiet, verbose);
    progress.set_message(&format!("'{}' ({} 〜 {}) を検索中...", args.keyword, from, until));

    let outcome = retriever
        .fetch_legislative_speeches(&args.keyword, &from, &until)
        .await;
    progress.finish_with_message(&messages::fetched(name, outcome.records.len()));

    println!("{}", output::format_records(name, &outcome, format)?);
    Ok(())
}

/// Fill in missing window ends: `until` defaults to today and `from` to
/// `until` minus the look-back
fn resolve_window(
    from: Option<&str>,
    until: Option<&str>,
    today: NaiveDate,
    lookback_days: i64,
) -> Result<(String, String)> {
    let until = match until {
        Some(raw) => parse_date(raw)?,
        None => today,
    };
    let from = match from {
        Some(raw) => parse_date(raw)?,
        None => until - Duration::days(lookback_days),
    };
    if from > until {
        return Err(PolsigError::InvalidInput(format!(
            "from ({}) must not be after until ({})",
            from, until
        )));
    }
    Ok((from.format("%Y-%m-%d").to_string(), until.format("%Y-%m-%d").to_string()))
}

fn parse_date(raw: &str) -> Result<NaiveDate> {
    NaiveDate::parse_from_str(raw.trim(), "%Y-%m-%d")
        .map_err(|_| PolsigError::InvalidInput(format!("expected YYYY-MM-DD, got '{}'", raw)))
}
