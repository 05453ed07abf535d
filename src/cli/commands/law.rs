use crate::api::SourceKind;
use crate::cli::args::{LawArgs, LawCommand};
use crate::cli::OutputFormat;
use crate::error::{PolsigError, Result};
use crate::output::Formatter;
use crate::progress::{messages, SourceProgress};

/// Execute law command
pub async fn execute(
    args: LawArgs,
    format: OutputFormat,
    quiet: bool,
    verbose: bool,
) -> Result<()> {
    let (_, retriever) = super::setup()?;
    let formatter = Formatter::new(format);
    let name = SourceKind::Law.display_name();
    let progress = SourceProgress::new(name, quiet, verbose);

    let rendered = match args.command {
        Some(LawCommand::Search { query }) => {
            let outcome = retriever.fetch_law_references(&non_empty(query)?).await;
            progress.finish_with_message(&messages::fetched(name, outcome.records.len()));
            formatter.format_laws(&outcome)?
        }
        Some(LawCommand::Fulltext { query }) => {
            let outcome = retriever.fetch_law_excerpts(&non_empty(query)?).await;
            progress.finish_with_message(&messages::fetched(name, outcome.records.len()));
            formatter.format_excerpts(&outcome)?
        }
        Some(LawCommand::Text { id }) => {
            progress.set_message(&format!("法令本文を取得中... (ID: {})", id));
            let outcome = retriever.fetch_law_text(&id).await;
            formatter.format_law_text(&id, &outcome)?
        }
        None => match args.query {
            Some(query) => {
                let outcome = retriever.fetch_law_references(&non_empty(query)?).await;
                progress.finish_with_message(&messages::fetched(name, outcome.records.len()));
                formatter.format_laws(&outcome)?
            }
            None => {
                return Err(PolsigError::InvalidInput(
                    "No search query provided. Use 'polsig law <query>' or 'polsig law search <query>'"
                        .to_string(),
                ))
            }
        },
    };

    println!("{}", rendered);
    Ok(())
}

fn non_empty(query: String) -> Result<String> {
    if query.trim().is_empty() {
        Err(PolsigError::InvalidInput("Search query cannot be empty".to_string()))
    } else {
        Ok(query)
    }
}
