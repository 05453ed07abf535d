pub mod client;
pub mod deserializers;
pub mod egov;
pub mod estat;
pub mod http_client;
pub mod kokkai;
pub mod news;
pub mod parallel;
pub mod types;

pub use client::{ClientConfig, SourceAdapter};

/// Sources the retrieval layer can reach
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum SourceKind {
    /// Media and search RSS feeds
    News,
    /// National Diet speech archive (国会会議録検索システム)
    Diet,
    /// Authenticated newspaper portal
    Portal,
    /// e-Gov law registry
    Law,
    /// e-Stat government statistics
    Stats,
}

impl SourceKind {
    /// Aggregation order
    pub const ALL: [SourceKind; 5] = [Self::News, Self::Diet, Self::Portal, Self::Law, Self::Stats];

    pub fn from_str(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "news" | "feed" | "rss" => Some(Self::News),
            "diet" | "kokkai" | "speech" => Some(Self::Diet),
            "portal" | "komei" => Some(Self::Portal),
            "law" | "egov" => Some(Self::Law),
            "stats" | "estat" | "statistics" => Some(Self::Stats),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::News => "news",
            Self::Diet => "diet",
            Self::Portal => "portal",
            Self::Law => "law",
            Self::Stats => "stats",
        }
    }

    pub fn display_name(&self) -> &'static str {
        match self {
            Self::News => "ニュース",
            Self::Diet => "国会会議録",
            Self::Portal => "公明新聞",
            Self::Law => "e-Gov法令",
            Self::Stats => "e-Stat統計",
        }
    }
}

impl std::fmt::Display for SourceKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}
