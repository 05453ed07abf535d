pub mod formatter;

pub use formatter::Formatter;

use crate::api::parallel::AggregateReport;
use crate::api::types::{RetrievalOutcome, SourceRecord};
use crate::cli::OutputFormat;
use crate::error::Result;

/// Format one source's records based on the specified format
pub fn format_records(
    heading: &str,
    outcome: &RetrievalOutcome<SourceRecord>,
    format: OutputFormat,
) -> Result<String> {
    Formatter::new(format).format_records(heading, outcome)
}

/// Format an aggregation run based on the specified format
pub fn format_report(report: &AggregateReport, format: OutputFormat) -> Result<String> {
    Formatter::new(format).format_report(report)
}
