pub mod args;
pub mod commands;

use clap::{Parser, Subcommand};

/// Political news and background research from the terminal
#[derive(Parser, Debug)]
#[command(
    name = "polsig",
    about = "Collect political news, Diet speeches, laws and statistics for a topic",
    version,
    author,
    long_about = None
)]
pub struct Cli {
    /// Enable verbose output
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Output format
    #[arg(short, long, global = true, value_enum, default_value = "table")]
    pub format: OutputFormat,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, clap::ValueEnum)]
pub enum OutputFormat {
    /// Table format (default)
    Table,
    /// JSON format
    Json,
    /// Markdown format
    Markdown,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Search news feeds (Google News and major papers)
    #[command(alias = "n")]
    News(args::NewsArgs),

    /// Search the Diet speech archive
    #[command(alias = "s")]
    Speech(args::SpeechArgs),

    /// Fetch member-portal articles (requires portal.user/portal.password)
    #[command(alias = "p")]
    Portal(args::PortalArgs),

    /// Search the e-Gov law registry
    #[command(alias = "l")]
    Law(args::LawArgs),

    /// Search e-Stat tables or fetch an indicator series
    Stats(args::StatsArgs),

    /// Collect every enabled source for a topic
    #[command(alias = "c")]
    Collect(args::CollectArgs),

    /// Manage configuration
    Config(args::ConfigArgs),
}

impl Cli {
    /// Run the CLI application
    pub async fn run() -> crate::error::Result<()> {
        let cli = Self::parse();

        let default_filter = if cli.verbose { "debug" } else { "warn" };
        env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(default_filter))
            .init();

        // spinners would corrupt machine-readable output
        let quiet = cli.format != OutputFormat::Table;

        let (format, verbose) = (cli.format, cli.verbose);
        let result = match cli.command {
            Commands::News(args) => commands::news::execute(args, format, quiet, verbose).await,
            Commands::Speech(args) => commands::speech::execute(args, format, quiet, verbose).await,
            Commands::Portal(args) => commands::portal::execute(args, format, quiet, verbose).await,
            Commands::Law(args) => commands::law::execute(args, format, quiet, verbose).await,
            Commands::Stats(args) => commands::stats::execute(args, format, quiet, verbose).await,
            Commands::Collect(args) => {
                commands::collect::execute(args, format, quiet, verbose).await
            }
            Commands::Config(args) => commands::config::execute(args).await,
        };

        if let Err(e) = &result {
            use crate::error::PolsigError;
            match e {
                PolsigError::ApiError { code, message, .. } => {
                    eprintln!("Error: {}", message);
                    if cli.verbose {
                        eprintln!("Code: {}", code);
                    }
                }
                PolsigError::Parse(msg) => {
                    eprintln!("Error parsing response: {}", msg);
                    if !cli.verbose {
                        eprintln!("\nRun with --verbose for more details.");
                    }
                }
                _ => eprintln!("Error: {}", e),
            }
            if let Some(hint) = e.hint() {
                eprintln!("\nHint: {}", hint);
            }
        }
        result
    }
}
