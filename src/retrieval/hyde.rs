//! Offline query expansion into filing register.
//!
//! SEC filings use formal legal language; a conversational query matches it
//! poorly. Expansion prepends canonical clauses in that register for each
//! topic the query touches, then appends the query's own keywords. No
//! generative model is involved.

use crate::retrieval::keywords::extract_keywords;

/// Canonical clause table: a clause is appended when any of its trigger
/// terms appears in the lowercased query.
const EXPANSIONS: [(&[&str], &str); 8] = [
    (
        &["risk", "risks", "danger", "threat"],
        "The Company is subject to various risks and uncertainties that could materially \
         adversely affect its business, financial condition, and results of operations.",
    ),
    (
        &["china", "chinese", "asia", "international"],
        "The Company's operations outside the United States are subject to risks associated \
         with international operations including regulatory, political, and economic risks in \
         foreign jurisdictions.",
    ),
    (
        &["revenue", "sales", "income", "profit", "earnings"],
        "Net revenues and operating income reflect the Company's financial performance across \
         its reportable segments for the fiscal year ended.",
    ),
    (
        &["debt", "borrow", "credit", "loan", "leverage"],
        "The Company's indebtedness and credit facilities may limit its financial flexibility \
         and ability to fund operations and capital expenditures.",
    ),
    (
        &["competition", "competitor", "compete", "market"],
        "The Company faces intense competition from existing and new market participants which \
         may impact pricing, market share, and overall financial performance.",
    ),
    (
        &["ai", "artificial intelligence", "technology", "innovation"],
        "The Company continues to invest in research and development of emerging technologies \
         including artificial intelligence to maintain competitive positioning.",
    ),
    (
        &["supply", "chain", "supplier", "manufacturing"],
        "The Company relies on third-party suppliers and manufacturers which exposes it to \
         supply chain disruptions, component shortages, and quality control risks.",
    ),
    (
        &["regulation", "regulatory", "compliance", "law", "legal"],
        "The Company is subject to extensive government regulation across the jurisdictions in \
         which it operates which may require significant compliance costs.",
    ),
];

/// At most this many canonical clauses are appended, to avoid swamping the
/// true query.
const MAX_CLAUSES: usize = 2;

/// Trait for query expanders.
///
/// The retriever wraps the call in a panic guard and falls back to the raw
/// query, so an expander may do anything; the trait exists so tests can
/// inject a faulty one.
pub trait QueryExpander: Send + Sync {
    /// Maps a user query to an expanded query string.
    fn expand(&self, query: &str) -> String;
}

/// Keyword-table expander over the canonical clause list.
#[derive(Debug, Clone, Copy, Default)]
pub struct HydeExpander;

impl HydeExpander {
    /// Creates the expander.
    #[must_use]
    pub const fn new() -> Self {
        Self
    }
}

impl QueryExpander for HydeExpander {
    fn expand(&self, query: &str) -> String {
        let query_lower = query.to_lowercase();

        let clauses: Vec<&str> = EXPANSIONS
            .iter()
            .filter(|(triggers, _)| triggers.iter().any(|t| query_lower.contains(t)))
            .map(|(_, clause)| *clause)
            .take(MAX_CLAUSES)
            .collect();

        // The original query always leads
        let mut parts = vec![query];
        parts.extend(clauses);

        let keywords = extract_keywords(query);
        let keyword_tail = keywords.join(" ");
        if !keyword_tail.is_empty() {
            parts.push(&keyword_tail);
        }

        parts.join(" ")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_original_query_leads() {
        let expanded = HydeExpander::new().expand("What are the risks in China?");
        assert!(expanded.starts_with("What are the risks in China?"));
    }

    #[test]
    fn test_matching_clauses_appended() {
        let expanded = HydeExpander::new().expand("What are the risks in China?");
        assert!(expanded.contains("various risks and uncertainties"));
        assert!(expanded.contains("operations outside the United States"));
    }

    #[test]
    fn test_at_most_two_clauses() {
        // Triggers risk + china + revenue + debt tables
        let expanded =
            HydeExpander::new().expand("risks to revenue and debt from china operations");
        let clause_count = EXPANSIONS
            .iter()
            .filter(|(_, clause)| expanded.contains(clause))
            .count();
        assert_eq!(clause_count, MAX_CLAUSES);
        // Table order decides which two survive
        assert!(expanded.contains("various risks and uncertainties"));
        assert!(expanded.contains("operations outside the United States"));
    }

    #[test]
    fn test_keywords_appended() {
        let expanded = HydeExpander::new().expand("What are the risks in China?");
        assert!(expanded.ends_with("risks china"));
    }

    #[test]
    fn test_no_trigger_returns_query_plus_keywords() {
        let expanded = HydeExpander::new().expand("Describe the dividend policy");
        assert_eq!(expanded, "Describe the dividend policy describe dividend policy");
    }

    #[test]
    fn test_empty_query_unchanged() {
        assert_eq!(HydeExpander::new().expand(""), "");
    }

    #[test]
    fn test_trigger_matching_is_case_insensitive() {
        let expanded = HydeExpander::new().expand("CHINA RISKS");
        assert!(expanded.contains("operations outside the United States"));
    }
}
