//! Command-line argument parsing.
//!
//! Defines the CLI structure using clap derive macros. Configuration comes
//! entirely from flags and their environment fallbacks.

use clap::{Parser, Subcommand};
use std::path::PathBuf;

/// toshi-rag: retrieval core for SEC filing Q&A.
///
/// Ingests filings on demand into a persistent vector index and answers
/// natural-language questions with cited passages.
#[derive(Parser, Debug)]
#[command(name = "toshi-rag")]
#[command(version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    /// User-Agent identifying the caller to EDGAR, e.g.
    /// "toshi-rag admin@example.com". Required by the SEC.
    #[arg(long, env = "SEC_USER_AGENT")]
    pub user_agent: Option<String>,

    /// Path to the fetch cache database.
    #[arg(long, env = "TOSHI_CACHE_PATH")]
    pub cache_path: Option<PathBuf>,

    /// Path to the vector index database.
    #[arg(long, env = "TOSHI_INDEX_PATH")]
    pub index_path: Option<PathBuf>,

    /// Output format (text, json).
    #[arg(long, default_value = "text", global = true)]
    pub format: String,

    /// Enable verbose output.
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// The subcommand to execute.
    #[command(subcommand)]
    pub command: Commands,
}

/// Available CLI commands.
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Search a company's filings with a natural-language query.
    Search {
        /// 10-digit zero-padded CIK, e.g. 0000320193.
        cik: String,

        /// The question to answer.
        query: String,

        /// Filing types to search.
        #[arg(short = 't', long = "type", default_values_t = vec!["10-K".to_string()])]
        filing_types: Vec<String>,

        /// How many recent years to cover.
        #[arg(short, long, default_value = "3")]
        years: usize,

        /// Quarter tags (QTR1..QTR4) to ingest for quarterly filings.
        #[arg(short, long)]
        quarters: Vec<String>,
    },

    /// Ingest a company's filings without querying.
    Ingest {
        /// 10-digit zero-padded CIK.
        cik: String,

        /// Filing types to ingest.
        #[arg(short = 't', long = "type", default_values_t = vec!["10-K".to_string()])]
        filing_types: Vec<String>,

        /// How many recent years to cover.
        #[arg(short, long, default_value = "3")]
        years: usize,
    },

    /// Look up a company's CIK by name or ticker.
    Lookup {
        /// Company name fragment or ticker symbol.
        name: String,
    },

    /// Show index statistics.
    Status,

    /// Remove everything stored for a company.
    Clear {
        /// 10-digit zero-padded CIK.
        cik: String,

        /// Skip confirmation prompt.
        #[arg(short = 'y', long)]
        yes: bool,
    },

    /// Show an annual financial metric with year-over-year changes.
    Metric {
        /// 10-digit zero-padded CIK.
        cik: String,

        /// Metric name, e.g. revenue, net_income, total_debt.
        metric: String,

        /// How many years of history.
        #[arg(short, long, default_value = "5")]
        years: usize,
    },

    /// Score a company's financial risk from its reported facts.
    Risk {
        /// 10-digit zero-padded CIK.
        cik: String,
    },
}

impl Cli {
    /// Returns the cache path, using the default if not specified.
    #[must_use]
    pub fn get_cache_path(&self) -> PathBuf {
        self.cache_path
            .clone()
            .unwrap_or_else(|| PathBuf::from(crate::edgar::DEFAULT_CACHE_PATH))
    }

    /// Returns the index path, using the default if not specified.
    #[must_use]
    pub fn get_index_path(&self) -> PathBuf {
        self.index_path
            .clone()
            .unwrap_or_else(|| PathBuf::from(crate::index::DEFAULT_INDEX_PATH))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_cli_parse() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_default_paths() {
        let cli = Cli {
            user_agent: None,
            cache_path: None,
            index_path: None,
            format: "text".to_string(),
            verbose: false,
            command: Commands::Status,
        };
        assert_eq!(
            cli.get_cache_path(),
            PathBuf::from(crate::edgar::DEFAULT_CACHE_PATH)
        );
        assert_eq!(
            cli.get_index_path(),
            PathBuf::from(crate::index::DEFAULT_INDEX_PATH)
        );
    }

    #[test]
    fn test_custom_paths() {
        let cli = Cli {
            user_agent: Some("app test@example.com".to_string()),
            cache_path: Some(PathBuf::from("/tmp/cache.db")),
            index_path: Some(PathBuf::from("/tmp/index.db")),
            format: "json".to_string(),
            verbose: false,
            command: Commands::Status,
        };
        assert_eq!(cli.get_cache_path(), PathBuf::from("/tmp/cache.db"));
        assert_eq!(cli.get_index_path(), PathBuf::from("/tmp/index.db"));
    }

    #[test]
    fn test_search_defaults() {
        let cli = Cli::parse_from([
            "toshi-rag",
            "search",
            "0000320193",
            "What are the risks in China?",
        ]);
        match cli.command {
            Commands::Search {
                cik,
                years,
                filing_types,
                quarters,
                ..
            } => {
                assert_eq!(cik, "0000320193");
                assert_eq!(years, 3);
                assert_eq!(filing_types, vec!["10-K".to_string()]);
                assert!(quarters.is_empty());
            }
            _ => panic!("expected search command"),
        }
    }
}
