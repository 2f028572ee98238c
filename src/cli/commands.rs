//! CLI command implementations.
//!
//! Builds the pipeline from the parsed arguments and executes the
//! requested command, returning the formatted output string.

use crate::cli::output::{
    MetricReport, OutputFormat, StatusReport, format_citations, format_company_matches,
    format_metric, format_risk, format_status,
};
use crate::cli::parser::{Cli, Commands};
use crate::edgar::analysis::{detect_anomalies, risk_score, yoy_changes};
use crate::edgar::cache::FetchCache;
use crate::edgar::client::EdgarClient;
use crate::edgar::facts::{extract_metric, known_metrics};
use crate::embedding::create_embedder;
use crate::error::{CommandError, Error, Result};
use crate::index::{SqliteIndex, VectorIndex};
use crate::pipeline::{FilingPipeline, SearchRequest};
use crate::rerank::create_reranker;
use std::collections::BTreeMap;

/// Executes the CLI command.
///
/// # Errors
///
/// Returns an error if the command fails to execute.
pub fn execute(cli: &Cli) -> Result<String> {
    let format = OutputFormat::parse(&cli.format);

    match &cli.command {
        Commands::Search {
            cik,
            query,
            filing_types,
            years,
            quarters,
        } => {
            let mut pipeline = build_pipeline(cli)?;
            let mut request = SearchRequest::new(cik, query)
                .with_filing_types(filing_types.clone())
                .with_years(*years);
            if !quarters.is_empty() {
                request = request.with_quarters(quarters.clone());
            }
            let citations = pipeline.search_filing(&request)?;
            Ok(format_citations(query, &citations, format))
        }

        Commands::Ingest {
            cik,
            filing_types,
            years,
        } => {
            let mut pipeline = build_pipeline(cli)?;
            // The search path's missing-year probe drives ingestion; the
            // empty-query retrieval result is discarded
            let request = SearchRequest::new(cik, "")
                .with_filing_types(filing_types.clone())
                .with_years(*years);
            pipeline.search_filing(&request)?;
            let count = pipeline.index_count()?;
            Ok(format!("Ingestion complete. Index now holds {count} chunks.\n"))
        }

        Commands::Lookup { name } => {
            let mut pipeline = build_pipeline(cli)?;
            let matches = pipeline.search_company(name)?;
            Ok(format_company_matches(&matches, format))
        }

        Commands::Status => {
            let mut index = SqliteIndex::open(cli.get_index_path())?;
            index.init()?;
            let status = StatusReport {
                chunk_count: index.count()?,
                index_path: cli.get_index_path().display().to_string(),
                cache_path: cli.get_cache_path().display().to_string(),
            };
            Ok(format_status(&status, format))
        }

        Commands::Clear { cik, yes } => {
            if !yes {
                return Err(CommandError::InvalidArgument(
                    "pass --yes to confirm removing all stored data for this company".to_string(),
                )
                .into());
            }
            let mut pipeline = build_pipeline(cli)?;
            let removed = pipeline.clear_company(cik)?;
            Ok(format!("Removed {removed} chunks for CIK {cik}.\n"))
        }

        Commands::Metric { cik, metric, years } => {
            if !known_metrics().contains(&metric.as_str())
                && !metric.chars().next().is_some_and(char::is_uppercase)
            {
                return Err(CommandError::InvalidArgument(format!(
                    "unknown metric '{metric}'; known metrics: {}",
                    known_metrics().join(", ")
                ))
                .into());
            }
            let mut pipeline = build_pipeline(cli)?;
            let facts = pipeline.company_facts(cik)?;
            let points = extract_metric(&facts, metric, *years);
            if points.is_empty() {
                return Ok(format!("No annual data found for '{metric}'.\n"));
            }
            let changes = yoy_changes(&points);
            let anomalies = detect_anomalies(metric, &changes);
            let report = MetricReport {
                metric,
                points: &points,
                changes: &changes,
                anomalies: &anomalies,
            };
            Ok(format_metric(&report, format))
        }

        Commands::Risk { cik } => {
            let mut pipeline = build_pipeline(cli)?;
            let facts = pipeline.company_facts(cik)?;

            let mut metrics = BTreeMap::new();
            for name in [
                "revenue",
                "net_income",
                "total_debt",
                "stockholders_equity",
                "cash",
                "operating_cash_flow",
            ] {
                let points = extract_metric(&facts, name, 3);
                if !points.is_empty() {
                    metrics.insert(name.to_string(), points);
                }
            }
            let report = risk_score(&metrics);
            Ok(format_risk(&report, format))
        }
    }
}

/// Assembles the full pipeline from CLI configuration.
///
/// Model loading happens here, before any request runs; a load failure is
/// fatal.
fn build_pipeline(cli: &Cli) -> Result<FilingPipeline> {
    let user_agent = cli.user_agent.as_deref().ok_or_else(|| Error::Config {
        message: "SEC_USER_AGENT is required (e.g. \"toshi-rag admin@example.com\")".to_string(),
    })?;

    let client = EdgarClient::new(user_agent)?;
    let cache = FetchCache::open(cli.get_cache_path())?;
    let index = SqliteIndex::open(cli.get_index_path())?;
    let embedder = create_embedder()?;
    let reranker = create_reranker()?;

    FilingPipeline::new(
        Box::new(client),
        cache,
        Box::new(index),
        embedder,
        reranker,
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cli::parser::Commands;

    fn cli_for(command: Commands) -> Cli {
        Cli {
            user_agent: None,
            cache_path: None,
            index_path: None,
            format: "text".to_string(),
            verbose: false,
            command,
        }
    }

    #[test]
    fn test_missing_user_agent_is_config_error() {
        let cli = cli_for(Commands::Lookup {
            name: "apple".to_string(),
        });
        let result = execute(&cli);
        assert!(matches!(result, Err(Error::Config { .. })));
    }

    #[test]
    fn test_clear_requires_confirmation() {
        let cli = cli_for(Commands::Clear {
            cik: "0000320193".to_string(),
            yes: false,
        });
        let result = execute(&cli);
        assert!(matches!(result, Err(Error::Command(_))));
    }

    #[test]
    fn test_unknown_metric_rejected() {
        let mut cli = cli_for(Commands::Metric {
            cik: "0000320193".to_string(),
            metric: "vibes".to_string(),
            years: 5,
        });
        cli.user_agent = Some("toshi-rag test@example.com".to_string());
        let result = execute(&cli);
        match result {
            Err(Error::Command(CommandError::InvalidArgument(message))) => {
                assert!(message.contains("vibes"));
                assert!(message.contains("revenue"));
            }
            other => panic!("expected invalid argument, got {other:?}"),
        }
    }
}
