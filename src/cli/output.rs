//! Output formatting for CLI commands.
//!
//! Supports text and JSON output formats. The text rendering of citations
//! follows the numbered, section-labelled layout downstream agents consume.

use crate::edgar::analysis::{Anomaly, RiskReport, YoyChange};
use crate::edgar::facts::{MetricPoint, format_value};
use crate::filing::{Citation, SectionId};
use crate::pipeline::CompanyMatch;
use serde::Serialize;
use std::fmt::Write;

/// Maximum passage characters rendered per citation in text mode.
const PASSAGE_CAP: usize = 600;

/// Output format options.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputFormat {
    /// Human-readable text output.
    Text,
    /// JSON output.
    Json,
}

impl OutputFormat {
    /// Parses format from string.
    #[must_use]
    pub fn parse(s: &str) -> Self {
        match s.to_lowercase().as_str() {
            "json" => Self::Json,
            _ => Self::Text,
        }
    }
}

/// Serializes any value as pretty JSON.
fn format_json<T: Serialize>(value: &T) -> String {
    serde_json::to_string_pretty(value).unwrap_or_else(|e| format!("{{\"error\": \"{e}\"}}"))
}

/// Human label for a section name stored in chunk metadata.
fn section_label(section: &str) -> &str {
    SectionId::ALL
        .iter()
        .find(|id| id.as_str() == section)
        .map_or(section, |id| id.label())
}

/// Formats search results.
#[must_use]
pub fn format_citations(query: &str, citations: &[Citation], format: OutputFormat) -> String {
    match format {
        OutputFormat::Json => format_json(&citations),
        OutputFormat::Text => format_citations_text(query, citations),
    }
}

fn format_citations_text(query: &str, citations: &[Citation]) -> String {
    if citations.is_empty() {
        return "No relevant passages found. The filings may not be available on EDGAR \
                or the sections could not be extracted.\n"
            .to_string();
    }

    let mut output = String::new();
    let _ = writeln!(output, "Query: \"{query}\"");
    output.push_str(&"=".repeat(50));
    output.push_str("\n\n");

    for (i, citation) in citations.iter().enumerate() {
        let _ = writeln!(
            output,
            "[{}] {} - {} {} - {}",
            i + 1,
            citation.company,
            citation.year,
            citation.filing_type,
            section_label(&citation.section),
        );
        if citation.crag_trimmed {
            output.push_str("    (trimmed to most relevant sentences)\n");
        }

        let mut text = citation.text.trim().to_string();
        if text.len() > PASSAGE_CAP {
            let cut = text
                .char_indices()
                .take_while(|(idx, _)| *idx < PASSAGE_CAP)
                .last()
                .map_or(0, |(idx, c)| idx + c.len_utf8());
            text.truncate(cut);
            if let Some(last_space) = text.rfind(' ') {
                text.truncate(last_space);
            }
            text.push_str("...");
        }
        let _ = writeln!(output, "\"{text}\"\n");
    }

    output.push_str(&"=".repeat(50));
    let _ = writeln!(
        output,
        "\nFound {} relevant passage(s) from SEC filings.",
        citations.len()
    );
    output
}

/// Formats company lookup results.
#[must_use]
pub fn format_company_matches(matches: &[CompanyMatch], format: OutputFormat) -> String {
    match format {
        OutputFormat::Json => format_json(&matches),
        OutputFormat::Text => {
            if matches.is_empty() {
                return "No matching companies found.\n".to_string();
            }
            let mut output = String::new();
            let _ = writeln!(output, "{:<12} {:<8} Title", "CIK", "Ticker");
            output.push_str(&"-".repeat(50));
            output.push('\n');
            for hit in matches {
                let _ = writeln!(output, "{:<12} {:<8} {}", hit.cik, hit.ticker, hit.title);
            }
            output
        }
    }
}

/// Index statistics for the status command.
#[derive(Debug, Serialize)]
pub struct StatusReport {
    /// Total chunks stored.
    pub chunk_count: usize,
    /// Index database path.
    pub index_path: String,
    /// Fetch cache database path.
    pub cache_path: String,
}

/// Formats a status report.
#[must_use]
pub fn format_status(status: &StatusReport, format: OutputFormat) -> String {
    match format {
        OutputFormat::Json => format_json(status),
        OutputFormat::Text => {
            let mut output = String::new();
            output.push_str("toshi-rag status\n");
            output.push_str("================\n\n");
            let _ = writeln!(output, "  Indexed chunks:  {}", status.chunk_count);
            let _ = writeln!(output, "  Index:           {}", status.index_path);
            let _ = writeln!(output, "  Fetch cache:     {}", status.cache_path);
            output
        }
    }
}

/// JSON shape for the metric command.
#[derive(Debug, Serialize)]
pub struct MetricReport<'a> {
    /// Metric name.
    pub metric: &'a str,
    /// Annual points, newest first.
    pub points: &'a [MetricPoint],
    /// Year-over-year changes.
    pub changes: &'a [YoyChange],
    /// Flagged anomalies.
    pub anomalies: &'a [Anomaly],
}

/// Formats a metric report.
#[must_use]
pub fn format_metric(report: &MetricReport<'_>, format: OutputFormat) -> String {
    match format {
        OutputFormat::Json => format_json(report),
        OutputFormat::Text => {
            let mut output = String::new();
            let _ = writeln!(output, "{}:", report.metric);
            for point in report.points {
                let change = report
                    .changes
                    .iter()
                    .find(|c| c.year == point.year)
                    .map_or(String::new(), |c| format!("  ({:+.1}% YoY)", c.pct_change));
                let _ = writeln!(
                    output,
                    "  {}  {}{change}",
                    point.year,
                    format_value(point.value, report.metric)
                );
            }
            if !report.anomalies.is_empty() {
                output.push('\n');
                for anomaly in report.anomalies {
                    let _ = writeln!(
                        output,
                        "  [{}] {}",
                        anomaly.severity.label(),
                        anomaly.message
                    );
                }
            }
            output
        }
    }
}

/// Formats a risk report.
#[must_use]
pub fn format_risk(report: &RiskReport, format: OutputFormat) -> String {
    match format {
        OutputFormat::Json => format_json(report),
        OutputFormat::Text => {
            let mut output = String::new();
            match report.score {
                Some(score) => {
                    let _ = writeln!(output, "Risk score: {score:.1}/10 - {}", report.label);
                }
                None => {
                    let _ = writeln!(output, "Risk score: {}", report.label);
                }
            }
            if !report.breakdown.is_empty() {
                output.push('\n');
                for (ratio, value) in &report.breakdown {
                    let _ = writeln!(output, "  {ratio:<18} {value:.1}");
                }
            }
            for explanation in &report.explanations {
                let _ = writeln!(output, "  - {explanation}");
            }
            output
        }
    }
}

/// Formats an error for the selected output format.
#[must_use]
pub fn format_error(error: &crate::Error, format: OutputFormat) -> String {
    match format {
        OutputFormat::Json => {
            format!("{{\"error\": {}}}", serde_json::json!(error.to_string()))
        }
        OutputFormat::Text => error.to_string(),
    }
}
