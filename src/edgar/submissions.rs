//! Typed company submissions.
//!
//! EDGAR's submissions endpoint returns company metadata plus a
//! `filings.recent` table of parallel arrays. Parsing happens at the
//! boundary; the core never touches raw untyped maps.

use serde::{Deserialize, Serialize};

/// Company submissions response, parsed.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Submissions {
    /// Company display name.
    #[serde(default)]
    pub name: String,
    /// Ticker symbols.
    #[serde(default)]
    pub tickers: Vec<String>,
    /// Recent filings table.
    #[serde(default)]
    pub filings: Filings,
}

/// Container for the recent-filings table.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Filings {
    /// The parallel-array table of recent filings.
    #[serde(default)]
    pub recent: RecentFilings,
}

/// Parallel arrays describing recent filings; row `i` of each array
/// belongs to the same filing.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RecentFilings {
    /// Form type per filing (e.g. "10-K", "10-Q", "8-K").
    #[serde(default)]
    pub form: Vec<String>,
    /// Filing date per filing, `YYYY-MM-DD`.
    #[serde(default, rename = "filingDate")]
    pub filing_date: Vec<String>,
    /// Accession number per filing, with dashes.
    #[serde(default, rename = "accessionNumber")]
    pub accession_number: Vec<String>,
    /// Primary document filename per filing.
    #[serde(default, rename = "primaryDocument")]
    pub primary_document: Vec<String>,
}

/// One row of the recent-filings table.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FilingRef {
    /// Form type, e.g. "10-K".
    pub form: String,
    /// Filing date, `YYYY-MM-DD`.
    pub filing_date: String,
    /// Accession number with dashes.
    pub accession_number: String,
    /// Primary document filename.
    pub primary_document: String,
}

impl FilingRef {
    /// Four-digit year of the filing date.
    #[must_use]
    pub fn year(&self) -> &str {
        self.filing_date.get(..4).unwrap_or("")
    }

    /// Quarter tag (`QTR1`..`QTR4`) derived from the filing date month.
    #[must_use]
    pub fn quarter(&self) -> Option<&'static str> {
        let month: u32 = self.filing_date.get(5..7)?.parse().ok()?;
        match month {
            1..=3 => Some("QTR1"),
            4..=6 => Some("QTR2"),
            7..=9 => Some("QTR3"),
            10..=12 => Some("QTR4"),
            _ => None,
        }
    }
}

impl Submissions {
    /// Extracts rows of the given form type, newest first, up to `limit`.
    ///
    /// Rows with a missing accession number are skipped; array positions
    /// missing in the shorter parallel arrays are treated as empty.
    #[must_use]
    pub fn filings_of_type(&self, filing_type: &str, limit: usize) -> Vec<FilingRef> {
        let recent = &self.filings.recent;
        let mut results = Vec::new();

        for (i, form) in recent.form.iter().enumerate() {
            if form != filing_type {
                continue;
            }
            let accession = recent
                .accession_number
                .get(i)
                .cloned()
                .unwrap_or_default();
            if accession.is_empty() {
                continue;
            }
            results.push(FilingRef {
                form: form.clone(),
                filing_date: recent.filing_date.get(i).cloned().unwrap_or_default(),
                accession_number: accession,
                primary_document: recent.primary_document.get(i).cloned().unwrap_or_default(),
            });
            if results.len() >= limit {
                break;
            }
        }

        results
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> Submissions {
        serde_json::from_str(
            r#"{
                "name": "Apple Inc.",
                "tickers": ["AAPL"],
                "filings": {
                    "recent": {
                        "form": ["10-K", "8-K", "10-Q", "10-K"],
                        "filingDate": ["2024-11-01", "2024-08-02", "2024-05-03", "2023-11-03"],
                        "accessionNumber": [
                            "0000320193-24-000123",
                            "0000320193-24-000100",
                            "0000320193-24-000081",
                            "0000320193-23-000106"
                        ],
                        "primaryDocument": [
                            "aapl-20240928.htm",
                            "aapl-8k.htm",
                            "aapl-20240330.htm",
                            "aapl-20230930.htm"
                        ]
                    }
                }
            }"#,
        )
        .unwrap()
    }

    #[test]
    fn test_parse_submissions() {
        let subs = sample();
        assert_eq!(subs.name, "Apple Inc.");
        assert_eq!(subs.tickers, vec!["AAPL"]);
        assert_eq!(subs.filings.recent.form.len(), 4);
    }

    #[test]
    fn test_filings_of_type_filters_and_limits() {
        let subs = sample();
        let annuals = subs.filings_of_type("10-K", 10);
        assert_eq!(annuals.len(), 2);
        assert_eq!(annuals[0].accession_number, "0000320193-24-000123");
        assert_eq!(annuals[0].primary_document, "aapl-20240928.htm");
        assert_eq!(annuals[1].year(), "2023");

        let limited = subs.filings_of_type("10-K", 1);
        assert_eq!(limited.len(), 1);
    }

    #[test]
    fn test_filings_of_type_unknown_form() {
        let subs = sample();
        assert!(subs.filings_of_type("S-1", 10).is_empty());
    }

    #[test]
    fn test_filing_ref_year_and_quarter() {
        let filing = FilingRef {
            form: "10-Q".to_string(),
            filing_date: "2024-05-03".to_string(),
            accession_number: "0000320193-24-000081".to_string(),
            primary_document: "aapl.htm".to_string(),
        };
        assert_eq!(filing.year(), "2024");
        assert_eq!(filing.quarter(), Some("QTR2"));
    }

    #[test]
    fn test_filing_ref_malformed_date() {
        let filing = FilingRef {
            form: "10-K".to_string(),
            filing_date: "bad".to_string(),
            accession_number: "x".to_string(),
            primary_document: String::new(),
        };
        assert_eq!(filing.year(), "");
        assert_eq!(filing.quarter(), None);
    }

    #[test]
    fn test_missing_fields_default() {
        let subs: Submissions = serde_json::from_str("{}").unwrap();
        assert!(subs.name.is_empty());
        assert!(subs.filings_of_type("10-K", 5).is_empty());
    }

    #[test]
    fn test_ragged_arrays_tolerated() {
        let subs: Submissions = serde_json::from_str(
            r#"{
                "filings": {
                    "recent": {
                        "form": ["10-K", "10-K"],
                        "filingDate": ["2024-11-01"],
                        "accessionNumber": ["0000320193-24-000123", "0000320193-23-000106"],
                        "primaryDocument": []
                    }
                }
            }"#,
        )
        .unwrap();
        let annuals = subs.filings_of_type("10-K", 10);
        assert_eq!(annuals.len(), 2);
        assert_eq!(annuals[1].filing_date, "");
        assert_eq!(annuals[1].primary_document, "");
    }
}
