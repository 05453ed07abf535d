use colored::*;

use crate::api::SourceKind;
use crate::cli::args::PortalArgs;
use crate::cli::OutputFormat;
use crate::error::{PolsigError, Result};
use crate::output;
use crate::portal::PortalTarget;
use crate::progress::{messages, SourceProgress};

/// Execute portal command
pub async fn execute(
    args: PortalArgs,
    format: OutputFormat,
    quiet: bool,
    verbose: bool,
) -> Result<()> {
    let (config, retriever) = super::setup()?;
    let name = SourceKind::Portal.display_name();

    if args.headlines {
        let progress = SourceProgress::new(name, quiet, verbose);
        let headlines = retriever.fetch_portal_headlines().await;
        progress.finish_with_message(&messages::fetched(name, headlines.len()));
        if format == OutputFormat::Json {
            println!("{}", serde_json::to_string_pretty(&headlines)?);
        } else {
            for headline in headlines {
                println!("- {}", headline);
            }
        }
        return Ok(());
    }

    let target = match (args.url, config.portal.article_url.clone()) {
        (Some(url), _) => PortalTarget::DirectUrl(url),
        (None, _) if !args.keywords.is_empty() => PortalTarget::Keywords(args.keywords),
        (None, Some(url)) => PortalTarget::DirectUrl(url),
        (None, None) => {
            return Err(PolsigError::InvalidInput(
                "Give keywords, --url, or set portal.article_url".to_string(),
            ))
        }
    };

    let credentials = config.portal_credentials();
    if credentials.is_none() {
        eprintln!(
            "{} portal credentials are not configured; nothing to fetch.",
            "Note:".yellow()
        );
        eprintln!("  polsig config set portal.user YOUR_ID");
        eprintln!("  polsig config set portal.password YOUR_PASSWORD");
    }

    let progress = SourceProgress::new(name, quiet, verbose);
    let outcome = retriever
        .fetch_portal_articles(credentials.as_ref(), &target)
        .await;
    progress.finish_with_message(&messages::fetched(name, outcome.records.len()));

    println!("{}", output::format_records(name, &outcome, format)?);
    Ok(())
}
