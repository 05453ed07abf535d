use clap::{Args, Subcommand};

/// News command arguments
#[derive(Args, Debug)]
pub struct NewsArgs {
    /// Keyword to search for
    pub keyword: String,

    /// Look-back window in days (defaults to news.days)
    #[arg(short, long)]
    pub days: Option<u32>,
}

/// Diet speech command arguments
#[derive(Args, Debug)]
pub struct SpeechArgs {
    /// Keyword that must appear in the speech
    pub keyword: String,

    /// Start date (YYYY-MM-DD); defaults to `until` minus diet.lookback_days
    #[arg(long)]
    pub from: Option<String>,

    /// End date (YYYY-MM-DD); defaults to today
    #[arg(long)]
    pub until: Option<String>,
}

/// Portal command arguments
#[derive(Args, Debug)]
pub struct PortalArgs {
    /// Keywords tried in order until one has search hits
    pub keywords: Vec<String>,

    /// Fetch this article directly instead of searching
    #[arg(long, conflicts_with = "keywords")]
    pub url: Option<String>,

    /// Show landing-page headlines instead of articles
    #[arg(long, conflicts_with_all = ["keywords", "url"])]
    pub headlines: bool,
}

/// Law command arguments
#[derive(Args, Debug)]
pub struct LawArgs {
    #[command(subcommand)]
    pub command: Option<LawCommand>,

    /// Title search query (can be used directly without subcommand)
    pub query: Option<String>,
}

#[derive(Subcommand, Debug)]
pub enum LawCommand {
    /// Search laws by title
    Search {
        /// Title keyword
        query: String,
    },

    /// Full-text search returning matching sentences
    Fulltext {
        /// Keyword to find in law text
        query: String,
    },

    /// Show the plain text of one law
    Text {
        /// Law ID (e.g. 329AC0000000165)
        id: String,
    },
}

/// Statistics command arguments
#[derive(Args, Debug)]
pub struct StatsArgs {
    /// Keyword for table search, or an all-digit statistics data id
    pub query: String,

    /// For data ids, also show which query strategies were tried
    #[arg(long)]
    pub trail: bool,
}

/// Collect command arguments
#[derive(Args, Debug)]
pub struct CollectArgs {
    /// Topic keywords, tried in order by searching sources
    #[arg(required = true)]
    pub keywords: Vec<String>,

    /// Look-back window for news in days (defaults to news.days)
    #[arg(short, long)]
    pub days: Option<u32>,

    /// Start of the Diet speech window (YYYY-MM-DD); defaults to `until`
    /// minus diet.lookback_days
    #[arg(long)]
    pub from: Option<String>,

    /// End of the Diet speech window (YYYY-MM-DD)
    #[arg(long)]
    pub until: Option<String>,

    /// Portal article to fetch directly (defaults to portal.article_url)
    #[arg(long)]
    pub url: Option<String>,

    /// Sources to skip for this run (news, diet, portal, law, stats)
    #[arg(long, value_delimiter = ',')]
    pub skip: Vec<String>,
}

/// Config command arguments
#[derive(Args, Debug)]
pub struct ConfigArgs {
    #[command(subcommand)]
    pub command: ConfigCommand,
}

#[derive(Subcommand, Debug)]
pub enum ConfigCommand {
    /// Set a configuration value
    Set {
        /// Configuration key (e.g. portal.user, estat.app_id, sources.stats)
        key: String,
        /// Configuration value
        value: String,
    },

    /// Get a configuration value
    Get {
        /// Configuration key
        key: String,
    },

    /// Show configuration file path
    Path,

    /// Initialize configuration
    Init,
}

#[cfg(test)]
mod tests {
    use crate::cli::{Cli, Commands};
    use clap::Parser;

    #[test]
    fn test_collect_parses_skip_list() {
        let cli =
            Cli::try_parse_from(["polsig", "collect", "年金", "少子化", "--skip", "portal,stats"])
                .unwrap();
        match cli.command {
            Commands::Collect(args) => {
                assert_eq!(args.keywords, vec!["年金", "少子化"]);
                assert_eq!(args.skip, vec!["portal", "stats"]);
            }
            other => panic!("unexpected command: {:?}", other),
        }
    }

    #[test]
    fn test_law_direct_query() {
        let cli = Cli::try_parse_from(["polsig", "law", "防衛"]).unwrap();
        match cli.command {
            Commands::Law(args) => {
                assert!(args.command.is_none());
                assert_eq!(args.query.as_deref(), Some("防衛"));
            }
            other => panic!("unexpected command: {:?}", other),
        }
    }

    #[test]
    fn test_portal_url_conflicts_with_keywords() {
        assert!(Cli::try_parse_from(["polsig", "portal", "物価", "--url", "https://x"]).is_err());
    }
}
