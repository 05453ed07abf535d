use crate::api::types::StatsRequest;
use crate::api::SourceKind;
use crate::cli::args::StatsArgs;
use crate::cli::OutputFormat;
use crate::error::Result;
use crate::output::Formatter;
use crate::progress::{messages, SourceProgress};

/// Execute stats command
pub async fn execute(
    args: StatsArgs,
    format: OutputFormat,
    quiet: bool,
    verbose: bool,
) -> Result<()> {
    let (_, retriever) = super::setup()?;
    let formatter = Formatter::new(format);
    let name = SourceKind::Stats.display_name();
    let progress = SourceProgress::new(name, quiet, verbose);

    let request = StatsRequest::detect(&args.query);
    let rendered = match (&request, args.trail) {
        (StatsRequest::IndicatorCode(code), true) => {
            let query = retriever.fetch_indicator(code).await;
            progress.finish_with_message(&messages::fetched(name, query.points.len()));
            formatter.format_indicator(&query)?
        }
        _ => {
            let outcome = retriever.fetch_statistics(&request).await;
            progress.finish_with_message(&messages::fetched(name, outcome.records.len()));
            formatter.format_stats(&outcome)?
        }
    };

    println!("{}", rendered);
    Ok(())
}
