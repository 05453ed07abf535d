use colored::*;
use comfy_table::{Cell, Color, ContentArrangement, Table};
use serde_json::json;

use crate::api::parallel::AggregateReport;
use crate::api::types::{
    IndicatorQuery, LawExcerpt, LawReference, RetrievalOutcome, SourceRecord, StatsEntry,
};
use crate::cli::OutputFormat;
use crate::error::Result;

pub struct Formatter {
    format: OutputFormat,
}

impl Formatter {
    pub fn new(format: OutputFormat) -> Self {
        Self { format }
    }

    /// Normalized records from one source
    pub fn format_records(
        &self,
        heading: &str,
        outcome: &RetrievalOutcome<SourceRecord>,
    ) -> Result<String> {
        match self.format {
            OutputFormat::Table => {
                let mut result = summary_line(heading, outcome);
                if !outcome.records.is_empty() {
                    result.push_str(&records_table(&outcome.records).to_string());
                    result.push('\n');
                }
                Ok(result)
            }
            OutputFormat::Json => to_json(outcome),
            OutputFormat::Markdown => {
                let mut result = format!("# {}\n\n", heading);
                push_error_markdown(&mut result, outcome.error.as_deref());
                push_records_markdown(&mut result, &outcome.records);
                Ok(result)
            }
        }
    }

    pub fn format_laws(&self, outcome: &RetrievalOutcome<LawReference>) -> Result<String> {
        match self.format {
            OutputFormat::Table => {
                let mut result = summary_line("e-Gov法令", outcome);
                if outcome.records.is_empty() {
                    return Ok(result);
                }
                let mut table = Table::new();
                table.set_header(vec![
                    Cell::new("法令ID").fg(Color::Cyan),
                    Cell::new("法令名").fg(Color::Cyan),
                    Cell::new("法令番号").fg(Color::Cyan),
                    Cell::new("公布日").fg(Color::Cyan),
                ]);
                for law in &outcome.records {
                    table.add_row(vec![
                        Cell::new(&law.id),
                        Cell::new(truncate_string(&law.title, 40)),
                        Cell::new(&law.number),
                        Cell::new(law.promulgation_date.as_deref().unwrap_or("-")),
                    ]);
                }
                table.set_content_arrangement(ContentArrangement::Dynamic);
                result.push_str(&table.to_string());
                result.push('\n');
                Ok(result)
            }
            OutputFormat::Json => to_json(outcome),
            OutputFormat::Markdown => {
                let mut result = String::from("# e-Gov法令\n\n");
                push_error_markdown(&mut result, outcome.error.as_deref());
                result.push_str("| 法令ID | 法令名 | 法令番号 | 公布日 |\n");
                result.push_str("|--------|--------|----------|--------|\n");
                for law in &outcome.records {
                    result.push_str(&format!(
                        "| {} | {} | {} | {} |\n",
                        law.id,
                        escape_markdown(&law.title),
                        escape_markdown(&law.number),
                        law.promulgation_date.as_deref().unwrap_or("-"),
                    ));
                }
                Ok(result)
            }
        }
    }

    pub fn format_excerpts(&self, outcome: &RetrievalOutcome<LawExcerpt>) -> Result<String> {
        match self.format {
            OutputFormat::Json => to_json(outcome),
            OutputFormat::Table => {
                let mut result = summary_line("e-Gov法令 (本文検索)", outcome);
                for excerpt in &outcome.records {
                    result.push_str(&format!(
                        "\n{} {}\n",
                        excerpt.title.bold(),
                        excerpt.number.dimmed()
                    ));
                    for snippet in &excerpt.snippets {
                        result.push_str(&format!("  - {}\n", snippet));
                    }
                }
                Ok(result)
            }
            OutputFormat::Markdown => {
                let mut result = String::from("# e-Gov法令 (本文検索)\n\n");
                push_error_markdown(&mut result, outcome.error.as_deref());
                for excerpt in &outcome.records {
                    result.push_str(&format!("## {} ({})\n\n", excerpt.title, excerpt.number));
                    for snippet in &excerpt.snippets {
                        result.push_str(&format!("> {}\n\n", snippet));
                    }
                }
                Ok(result)
            }
        }
    }

    pub fn format_law_text(
        &self,
        law_id: &str,
        outcome: &RetrievalOutcome<String>,
    ) -> Result<String> {
        match self.format {
            OutputFormat::Json => to_json(&json!({
                "law_id": law_id,
                "text": outcome.records.first(),
                "error": outcome.error,
            })),
            OutputFormat::Table | OutputFormat::Markdown => {
                let mut result = match self.format {
                    OutputFormat::Markdown => format!("# {}\n\n", law_id),
                    _ => format!("\n{} {}\n{}\n", "📜".cyan(), law_id.bold(), "=".repeat(80)),
                };
                if let Some(error) = outcome.error.as_deref() {
                    result.push_str(&format!("{}: {}\n", "Error".red(), error));
                }
                if let Some(text) = outcome.records.first() {
                    result.push_str(text);
                    result.push('\n');
                }
                Ok(result)
            }
        }
    }

    pub fn format_stats(&self, outcome: &RetrievalOutcome<StatsEntry>) -> Result<String> {
        match self.format {
            OutputFormat::Json => to_json(outcome),
            OutputFormat::Table => {
                let mut result = summary_line("e-Stat統計", outcome);
                if outcome.records.is_empty() {
                    return Ok(result);
                }
                let mut table = Table::new();
                table.set_header(vec![
                    Cell::new("ID / 時点").fg(Color::Cyan),
                    Cell::new("統計表 / 値").fg(Color::Cyan),
                    Cell::new("作成機関 / 単位").fg(Color::Cyan),
                    Cell::new("周期").fg(Color::Cyan),
                ]);
                for entry in &outcome.records {
                    table.add_row(stats_row(entry));
                }
                table.set_content_arrangement(ContentArrangement::Dynamic);
                result.push_str(&table.to_string());
                result.push('\n');
                Ok(result)
            }
            OutputFormat::Markdown => {
                let mut result = String::from("# e-Stat統計\n\n");
                push_error_markdown(&mut result, outcome.error.as_deref());
                result.push_str("| ID / 時点 | 統計表 / 値 | 作成機関 / 単位 | 周期 |\n");
                result.push_str("|-----------|-------------|-----------------|------|\n");
                for entry in &outcome.records {
                    let row = stats_cells(entry);
                    result.push_str(&format!(
                        "| {} | {} | {} | {} |\n",
                        row[0],
                        escape_markdown(&row[1]),
                        escape_markdown(&row[2]),
                        row[3]
                    ));
                }
                Ok(result)
            }
        }
    }

    /// Series with the strategies that were tried to get it
    pub fn format_indicator(&self, query: &IndicatorQuery) -> Result<String> {
        if let OutputFormat::Json = self.format {
            return to_json(query);
        }
        let trail: Vec<&str> = query.strategy_attempted.iter().map(|s| s.as_str()).collect();
        let mut result = format!(
            "\n{} {} | strategies: {}\n",
            "📈".cyan(),
            query.indicator_code.bold(),
            trail.join(" → ").yellow()
        );
        if query.points.is_empty() {
            result.push_str("No data points returned.\n");
            return Ok(result);
        }
        for point in &query.points {
            result.push_str(&format!(
                "  {}  {} {}\n",
                point.time,
                point.value,
                point.unit.as_deref().unwrap_or("")
            ));
        }
        Ok(result)
    }

    pub fn format_report(&self, report: &AggregateReport) -> Result<String> {
        match self.format {
            OutputFormat::Json => {
                let per_source: Vec<_> = report
                    .per_source
                    .iter()
                    .map(|(kind, outcome)| {
                        json!({
                            "source": kind.as_str(),
                            "count": outcome.records.len(),
                            "error": outcome.error,
                        })
                    })
                    .collect();
                to_json(&json!({
                    "per_source": per_source,
                    "records": report.records,
                    "execution_ms": report.execution_time.as_millis() as u64,
                }))
            }
            OutputFormat::Table => {
                let mut status = Table::new();
                status.set_header(vec![
                    Cell::new("ソース").fg(Color::Cyan),
                    Cell::new("件数").fg(Color::Cyan),
                    Cell::new("状態").fg(Color::Cyan),
                ]);
                for (kind, outcome) in &report.per_source {
                    let state = match &outcome.error {
                        Some(error) => Cell::new(truncate_string(error, 60)).fg(Color::Red),
                        None => Cell::new("OK").fg(Color::Green),
                    };
                    status.add_row(vec![
                        Cell::new(kind.display_name()),
                        Cell::new(outcome.records.len().to_string()),
                        state,
                    ]);
                }
                status.set_content_arrangement(ContentArrangement::Dynamic);

                let mut result = format!(
                    "\n{} Total: {} | Sources: {} | Time: {:.1}s\n\n",
                    "📊".cyan(),
                    report.records.len().to_string().yellow(),
                    report.per_source.len().to_string().yellow(),
                    report.execution_time.as_secs_f64()
                );
                result.push_str(&status.to_string());
                result.push_str("\n\n");
                if !report.records.is_empty() {
                    result.push_str(&records_table(&report.records).to_string());
                    result.push('\n');
                }
                Ok(result)
            }
            OutputFormat::Markdown => {
                let mut result = String::from("# 収集結果\n\n");
                for (kind, outcome) in &report.per_source {
                    match &outcome.error {
                        Some(error) => result.push_str(&format!(
                            "- **{}**: {}件 (エラー: {})\n",
                            kind.display_name(),
                            outcome.records.len(),
                            error
                        )),
                        None => result.push_str(&format!(
                            "- **{}**: {}件\n",
                            kind.display_name(),
                            outcome.records.len()
                        )),
                    }
                }
                result.push('\n');
                push_records_markdown(&mut result, &report.records);
                Ok(result)
            }
        }
    }
}

fn to_json<T: serde::Serialize + ?Sized>(value: &T) -> Result<String> {
    Ok(serde_json::to_string_pretty(value)?)
}

fn summary_line<T>(heading: &str, outcome: &RetrievalOutcome<T>) -> String {
    let mut result = format!(
        "\n{} {} | Results: {}\n",
        "📊".cyan(),
        heading.bold(),
        outcome.records.len().to_string().yellow()
    );
    if let Some(error) = outcome.error.as_deref() {
        result.push_str(&format!("{} {}\n", "⚠".red(), error.red()));
    }
    result.push('\n');
    result
}

fn records_table(records: &[SourceRecord]) -> Table {
    let mut table = Table::new();
    table.set_header(vec![
        Cell::new("番号").fg(Color::Cyan),
        Cell::new("ソース").fg(Color::Cyan),
        Cell::new("タイトル").fg(Color::Cyan),
        Cell::new("日時").fg(Color::Cyan),
        Cell::new("リンク").fg(Color::Cyan),
    ]);
    for (idx, record) in records.iter().enumerate() {
        table.add_row(vec![
            Cell::new((idx + 1).to_string()),
            Cell::new(truncate_string(record.source_name(), 20)),
            Cell::new(truncate_string(record.title(), 50)),
            Cell::new(display_date(record)),
            Cell::new(record.link().unwrap_or("-")),
        ]);
    }
    table.set_content_arrangement(ContentArrangement::Dynamic);
    table
}

fn push_error_markdown(result: &mut String, error: Option<&str>) {
    if let Some(error) = error {
        result.push_str(&format!("> **Error**: {}\n\n", error));
    }
}

fn push_records_markdown(result: &mut String, records: &[SourceRecord]) {
    for record in records {
        match record.link() {
            Some(link) => result.push_str(&format!(
                "## [{}]({})\n\n",
                escape_markdown(record.title()),
                link
            )),
            None => result.push_str(&format!("## {}\n\n", escape_markdown(record.title()))),
        }
        result.push_str(&format!(
            "- **ソース**: {}\n- **日時**: {}\n\n",
            record.source_name(),
            display_date(record)
        ));
        if !record.body().is_empty() {
            result.push_str(&truncate_string(record.body(), 300));
            result.push_str("\n\n");
        }
    }
}

fn display_date(record: &SourceRecord) -> String {
    record
        .published_at()
        .datetime()
        .map(|dt| dt.format("%Y-%m-%d %H:%M").to_string())
        .unwrap_or_else(|| "-".to_string())
}

fn stats_cells(entry: &StatsEntry) -> [String; 4] {
    match entry {
        StatsEntry::Table(table) => [
            table.id.clone(),
            table.title.clone(),
            table.org.clone(),
            table.cycle.clone(),
        ],
        StatsEntry::Point(point) => [
            point.time.clone(),
            point.value.clone(),
            point.unit.clone().unwrap_or_else(|| "-".to_string()),
            "-".to_string(),
        ],
    }
}

fn stats_row(entry: &StatsEntry) -> Vec<Cell> {
    stats_cells(entry)
        .into_iter()
        .map(|cell| Cell::new(truncate_string(&cell, 40)))
        .collect()
}

fn truncate_string(s: &str, max_len: usize) -> String {
    if s.chars().count() <= max_len {
        s.to_string()
    } else {
        let truncated: String = s.chars().take(max_len.saturating_sub(3)).collect();
        format!("{}...", truncated)
    }
}

fn escape_markdown(s: &str) -> String {
    s.replace('|', "\\|").replace('*', "\\*").replace('_', "\\_")
}
