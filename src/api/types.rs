use chrono::{DateTime, FixedOffset, NaiveDate, NaiveDateTime, TimeZone};
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::cmp::Ordering;
use std::collections::BTreeMap;
use std::fmt;

/// Offset used for date-only values from Japanese sources
const JST_OFFSET_SECS: i32 = 9 * 3600;

/// Publication timestamp of a record.
///
/// Unparsable or missing dates are kept as `Unknown` so a record is never
/// dropped because of its date.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum PublishedAt {
    At(DateTime<FixedOffset>),
    Unknown,
}

impl PublishedAt {
    /// Parse any of the date shapes the upstream services emit
    pub fn parse(raw: &str) -> Self {
        let raw = raw.trim();
        if raw.is_empty() {
            return Self::Unknown;
        }
        if let Ok(dt) = DateTime::parse_from_rfc2822(raw) {
            return Self::At(dt);
        }
        if let Ok(dt) = DateTime::parse_from_rfc3339(raw) {
            return Self::At(dt);
        }
        let jst = match FixedOffset::east_opt(JST_OFFSET_SECS) {
            Some(offset) => offset,
            None => return Self::Unknown,
        };
        if let Ok(naive) = NaiveDateTime::parse_from_str(raw, "%Y-%m-%d %H:%M") {
            if let Some(dt) = jst.from_local_datetime(&naive).single() {
                return Self::At(dt);
            }
        }
        if let Ok(date) = NaiveDate::parse_from_str(raw, "%Y-%m-%d") {
            if let Some(dt) = date
                .and_hms_opt(0, 0, 0)
                .and_then(|naive| jst.from_local_datetime(&naive).single())
            {
                return Self::At(dt);
            }
        }
        Self::Unknown
    }

    pub fn from_optional(raw: Option<&str>) -> Self {
        raw.map(Self::parse).unwrap_or(Self::Unknown)
    }

    pub fn is_unknown(&self) -> bool {
        matches!(self, Self::Unknown)
    }

    pub fn datetime(&self) -> Option<&DateTime<FixedOffset>> {
        match self {
            Self::At(dt) => Some(dt),
            Self::Unknown => None,
        }
    }

    /// Newest first, `Unknown` after every dated value
    pub fn cmp_recent_first(&self, other: &Self) -> Ordering {
        match (self, other) {
            (Self::At(a), Self::At(b)) => b.cmp(a),
            (Self::At(_), Self::Unknown) => Ordering::Less,
            (Self::Unknown, Self::At(_)) => Ordering::Greater,
            (Self::Unknown, Self::Unknown) => Ordering::Equal,
        }
    }
}

impl fmt::Display for PublishedAt {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::At(dt) => write!(f, "{}", dt.to_rfc3339()),
            Self::Unknown => f.write_str("unknown"),
        }
    }
}

impl Serialize for PublishedAt {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.to_string())
    }
}

impl<'de> Deserialize<'de> for PublishedAt {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = Option::<String>::deserialize(deserializer)?;
        Ok(Self::from_optional(raw.as_deref()))
    }
}

/// One normalized item produced by a source adapter
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SourceRecord {
    source_name: String,
    title: String,
    body: String,
    link: Option<String>,
    published_at: PublishedAt,
}

/// Identity used by the aggregator when merging records
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum DedupKey {
    Link(String),
    SourceTitle(String, String),
}

impl SourceRecord {
    pub fn new(
        source_name: impl Into<String>,
        title: impl Into<String>,
        body: impl Into<String>,
        link: Option<String>,
        published_at: PublishedAt,
    ) -> Self {
        Self {
            source_name: source_name.into(),
            title: title.into(),
            body: body.into(),
            link: link.filter(|l| !l.trim().is_empty()),
            published_at,
        }
    }

    pub fn source_name(&self) -> &str {
        &self.source_name
    }

    pub fn title(&self) -> &str {
        &self.title
    }

    /// Article body or feed summary
    pub fn body(&self) -> &str {
        &self.body
    }

    pub fn link(&self) -> Option<&str> {
        self.link.as_deref()
    }

    pub fn published_at(&self) -> &PublishedAt {
        &self.published_at
    }

    pub fn dedup_key(&self) -> DedupKey {
        match &self.link {
            Some(link) => DedupKey::Link(link.clone()),
            None => DedupKey::SourceTitle(self.source_name.clone(), self.title.clone()),
        }
    }
}

/// Result of one per-source call. Failures are carried inline so callers can
/// merge partial results without unwinding.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RetrievalOutcome<T = SourceRecord> {
    pub records: Vec<T>,
    pub error: Option<String>,
}

impl<T> RetrievalOutcome<T> {
    pub fn ok(records: Vec<T>) -> Self {
        Self {
            records,
            error: None,
        }
    }

    pub fn failed(error: impl Into<String>) -> Self {
        Self {
            records: Vec::new(),
            error: Some(error.into()),
        }
    }

    /// Records that were collected before some part of the call failed
    pub fn partial(records: Vec<T>, errors: Vec<String>) -> Self {
        let error = if errors.is_empty() {
            None
        } else {
            Some(errors.join("; "))
        };
        Self { records, error }
    }

    pub fn is_failed(&self) -> bool {
        self.error.is_some()
    }
}

impl<T> Default for RetrievalOutcome<T> {
    fn default() -> Self {
        Self::ok(Vec::new())
    }
}

impl<T> From<crate::error::Result<Vec<T>>> for RetrievalOutcome<T> {
    fn from(result: crate::error::Result<Vec<T>>) -> Self {
        match result {
            Ok(records) => Self::ok(records),
            Err(e) => Self::failed(e.to_string()),
        }
    }
}

/// Law metadata from the e-Gov registry
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LawReference {
    pub id: String,
    pub title: String,
    pub number: String,
    pub promulgation_date: Option<String>,
}

/// Full-text keyword hit with its matching sentences
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LawExcerpt {
    pub id: String,
    pub title: String,
    pub number: String,
    pub snippets: Vec<String>,
}

/// Statistics table found by keyword
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StatsTable {
    pub id: String,
    pub title: String,
    pub org: String,
    pub cycle: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IndicatorPoint {
    pub time: String,
    pub value: String,
    pub unit: Option<String>,
}

/// One named variant of request parameters for the statistics endpoint
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum QueryStrategy {
    /// Only the indicator code
    Plain,
    /// Adds a classification filter that narrows broad tables
    Filtered,
    /// Asks for the most recent value only
    LatestOnly,
}

impl QueryStrategy {
    pub const ESCALATION: [QueryStrategy; 3] = [Self::Plain, Self::Filtered, Self::LatestOnly];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Plain => "plain",
            Self::Filtered => "filtered",
            Self::LatestOnly => "latest_only",
        }
    }

    /// Parameters added on top of the base request
    pub fn extra_params(&self) -> &'static [(&'static str, &'static str)] {
        match self {
            Self::Plain => &[],
            Self::Filtered => &[("lvCat01", "1")],
            Self::LatestOnly => &[("lvCat01", "1"), ("lvTime", "1")],
        }
    }

    pub fn latest_only(&self) -> bool {
        matches!(self, Self::LatestOnly)
    }
}

impl fmt::Display for QueryStrategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IndicatorQuery {
    pub indicator_code: String,
    pub strategy_attempted: Vec<QueryStrategy>,
    pub points: Vec<IndicatorPoint>,
}

impl IndicatorQuery {
    pub fn new(indicator_code: impl Into<String>) -> Self {
        Self {
            indicator_code: indicator_code.into(),
            strategy_attempted: Vec::new(),
            points: Vec::new(),
        }
    }

    /// The strategy that produced `points`, if any did
    pub fn winning_strategy(&self) -> Option<QueryStrategy> {
        if self.points.is_empty() {
            None
        } else {
            self.strategy_attempted.last().copied()
        }
    }
}

/// What the caller asked the statistics source for
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StatsRequest {
    Keyword(String),
    IndicatorCode(String),
}

impl StatsRequest {
    /// All-digit input is treated as a statistics data id
    pub fn detect(input: &str) -> Self {
        let trimmed = input.trim();
        if !trimmed.is_empty() && trimmed.chars().all(|c| c.is_ascii_digit()) {
            Self::IndicatorCode(trimmed.to_string())
        } else {
            Self::Keyword(trimmed.to_string())
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum StatsEntry {
    Table(StatsTable),
    Point(IndicatorPoint),
}

/// Row from the Diet speech archive
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Speech {
    pub id: String,
    pub date: String,
    pub meeting: String,
    pub speaker: String,
    pub text: String,
    pub url: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TrendSource {
    General,
    Portal,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TrendBranch {
    pub tags: Vec<String>,
    pub headlines: Vec<String>,
    pub error: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TrendReport {
    pub per_branch: BTreeMap<TrendSource, TrendBranch>,
}

impl TrendReport {
    pub fn branch(&self, source: TrendSource) -> Option<&TrendBranch> {
        self.per_branch.get(&source)
    }
}
