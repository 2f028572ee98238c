//! EDGAR REST client.
//!
//! Handles all HTTP communication with the SEC's EDGAR API. No API key is
//! required, but a User-Agent identifying the caller is mandatory and the
//! published rate limit (10 requests/second) is honored with a process-wide
//! pacing guard between requests.

use crate::edgar::facts::CompanyFacts;
use crate::edgar::submissions::Submissions;
use crate::error::{EdgarError, Error, Result};
use std::sync::Mutex;
use std::time::{Duration, Instant};
use tracing::debug;

/// Data API host (submissions, XBRL facts).
pub const BASE_URL: &str = "https://data.sec.gov";

/// Archive host (filing documents, ticker lookup).
pub const SEC_URL: &str = "https://www.sec.gov";

/// Minimum spacing between requests; EDGAR allows at most 10 req/s.
pub const REQUEST_DELAY: Duration = Duration::from_millis(150);

/// Timeout for JSON endpoints (submissions, facts, ticker file).
const JSON_TIMEOUT: Duration = Duration::from_secs(30);

/// Timeout for filing document bodies, which can run to megabytes.
const DOCUMENT_TIMEOUT: Duration = Duration::from_secs(60);

/// Upstream filing source consumed by the pipeline.
///
/// The trait seam lets tests substitute fixture filings for live EDGAR.
pub trait FilingSource: Send + Sync {
    /// Fetches and parses a company's submissions.
    ///
    /// # Errors
    ///
    /// Returns an error on transport failure or an unexpected response.
    fn submissions(&self, cik: &str) -> Result<Submissions>;

    /// Fetches a filing document body.
    ///
    /// Returns `Ok(None)` when EDGAR reports the document missing; callers
    /// treat that as "document absent for this filing", not a failure.
    ///
    /// # Errors
    ///
    /// Returns an error on transport failure.
    fn filing_document(&self, accession: &str, cik: &str, filename: &str)
    -> Result<Option<String>>;

    /// Fetches and parses a company's XBRL facts.
    ///
    /// # Errors
    ///
    /// Returns an error on transport failure or an unexpected response.
    fn company_facts(&self, cik: &str) -> Result<CompanyFacts>;

    /// Fetches the company ticker lookup table.
    ///
    /// # Errors
    ///
    /// Returns an error on transport failure or an unexpected response.
    fn company_tickers(&self) -> Result<serde_json::Value>;
}

/// Blocking EDGAR client.
pub struct EdgarClient {
    /// Shared blocking HTTP client.
    http: reqwest::blocking::Client,
    /// Instant of the most recent request, for pacing.
    last_request: Mutex<Option<Instant>>,
}

impl EdgarClient {
    /// Creates a client with the mandatory User-Agent.
    ///
    /// The agent string should identify the application and a contact
    /// address, e.g. `"toshi-rag admin@example.com"`.
    ///
    /// # Errors
    ///
    /// Returns a configuration error if the agent string is empty, or an
    /// HTTP error if the client cannot be built.
    pub fn new(user_agent: &str) -> Result<Self> {
        if user_agent.trim().is_empty() {
            return Err(Error::Config {
                message: "SEC_USER_AGENT must identify the caller (e.g. \"app contact@example.com\")"
                    .to_string(),
            });
        }

        let http = reqwest::blocking::Client::builder()
            .user_agent(user_agent.to_string())
            .gzip(true)
            .build()
            .map_err(EdgarError::from)?;

        Ok(Self {
            http,
            last_request: Mutex::new(None),
        })
    }

    /// Sleeps until at least [`REQUEST_DELAY`] has passed since the last
    /// request issued through this client.
    fn pace(&self) {
        let Ok(mut last) = self.last_request.lock() else {
            return;
        };
        if let Some(previous) = *last {
            let elapsed = previous.elapsed();
            if elapsed < REQUEST_DELAY {
                std::thread::sleep(REQUEST_DELAY - elapsed);
            }
        }
        *last = Some(Instant::now());
    }

    /// Issues a paced GET and returns the successful response.
    fn get(&self, url: &str, timeout: Duration) -> Result<reqwest::blocking::Response> {
        self.pace();
        debug!(url, "edgar request");
        let response = self
            .http
            .get(url)
            .timeout(timeout)
            .send()
            .map_err(EdgarError::from)?;

        let status = response.status();
        if !status.is_success() {
            return Err(EdgarError::Status {
                status: status.as_u16(),
                url: url.to_string(),
            }
            .into());
        }
        Ok(response)
    }

    /// Issues a paced GET and decodes the JSON body.
    fn get_json(&self, url: &str) -> Result<serde_json::Value> {
        let response = self.get(url, JSON_TIMEOUT)?;
        response
            .json()
            .map_err(|e| EdgarError::Decode(e.to_string()).into())
    }

    /// Strips leading zeros from a padded CIK for archive URLs.
    fn cik_unpadded(cik: &str) -> &str {
        let trimmed = cik.trim_start_matches('0');
        if trimmed.is_empty() { "0" } else { trimmed }
    }
}

impl FilingSource for EdgarClient {
    fn submissions(&self, cik: &str) -> Result<Submissions> {
        let url = format!("{BASE_URL}/submissions/CIK{cik}.json");
        let value = self.get_json(&url)?;
        serde_json::from_value(value).map_err(|e| EdgarError::Decode(e.to_string()).into())
    }

    fn filing_document(
        &self,
        accession: &str,
        cik: &str,
        filename: &str,
    ) -> Result<Option<String>> {
        let accession_clean = accession.replace('-', "");
        let url = format!(
            "{SEC_URL}/Archives/edgar/data/{}/{accession_clean}/{filename}",
            Self::cik_unpadded(cik)
        );

        self.pace();
        debug!(url, "edgar document request");
        let response = self
            .http
            .get(&url)
            .timeout(DOCUMENT_TIMEOUT)
            .send()
            .map_err(EdgarError::from)?;

        // A missing document is absence, not an error: the filing is
        // skipped and ingestion continues
        if !response.status().is_success() {
            return Ok(None);
        }
        let body = response.text().map_err(EdgarError::from)?;
        Ok(Some(body))
    }

    fn company_facts(&self, cik: &str) -> Result<CompanyFacts> {
        let url = format!("{BASE_URL}/api/xbrl/companyfacts/CIK{cik}.json");
        let value = self.get_json(&url)?;
        CompanyFacts::from_json(value).map_err(|e| EdgarError::Decode(e.to_string()).into())
    }

    fn company_tickers(&self) -> Result<serde_json::Value> {
        self.get_json(&format!("{SEC_URL}/files/company_tickers.json"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_user_agent_rejected() {
        assert!(EdgarClient::new("").is_err());
        assert!(EdgarClient::new("   ").is_err());
    }

    #[test]
    fn test_client_builds_with_agent() {
        let client = EdgarClient::new("toshi-rag test@example.com");
        assert!(client.is_ok());
    }

    #[test]
    fn test_cik_unpadded() {
        assert_eq!(EdgarClient::cik_unpadded("0000320193"), "320193");
        assert_eq!(EdgarClient::cik_unpadded("0000000000"), "0");
        assert_eq!(EdgarClient::cik_unpadded("1234567890"), "1234567890");
    }

    #[test]
    fn test_pace_enforces_delay() {
        let client = EdgarClient::new("toshi-rag test@example.com").unwrap();
        client.pace();
        let start = Instant::now();
        client.pace();
        assert!(start.elapsed() >= REQUEST_DELAY);
    }
}
