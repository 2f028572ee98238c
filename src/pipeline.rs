//! Pipeline orchestrator: decides what to ingest, then always retrieves.
//!
//! For each query the orchestrator computes the target years, probes the
//! index for years not yet ingested, runs the fetch -> extract -> chunk ->
//! embed -> add pipeline for the gaps, and hands the query to the
//! retriever. Failures ingesting an individual filing are logged and
//! skipped; an unavailable index aborts.

use crate::edgar::cache::{FetchCache, Namespace};
use crate::edgar::client::FilingSource;
use crate::edgar::facts::CompanyFacts;
use crate::edgar::submissions::{FilingRef, Submissions};
use crate::embedding::Embedder;
use crate::error::{CommandError, IngestError, Result};
use crate::filing::{Citation, Filing, FilingChunker, SectionExtractor};
use crate::index::VectorIndex;
use crate::rerank::Reranker;
use crate::retrieval::{HydeExpander, QueryExpander, Retriever};
use chrono::Datelike;
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

/// How many recent filings of one type to scan when matching target years.
const SCAN_LIMIT: usize = 40;

/// Maximum company matches returned by a name lookup.
const SEARCH_LIMIT: usize = 10;

/// Quarter tags searched when the caller does not restrict quarters.
const ALL_QUARTERS: [&str; 4] = ["QTR1", "QTR2", "QTR3", "QTR4"];

/// A filing search request.
#[derive(Debug, Clone)]
pub struct SearchRequest {
    /// 10-digit zero-padded company identifier.
    pub cik: String,
    /// Natural-language query.
    pub query: String,
    /// Filing types to search.
    pub filing_types: Vec<String>,
    /// How many recent calendar years to cover.
    pub years: usize,
    /// Quarter tags to ingest for quarterly filings; `None` means all.
    pub quarters: Option<Vec<String>>,
}

impl SearchRequest {
    /// Creates a request with the default scope: annual filings, last three
    /// years.
    #[must_use]
    pub fn new(cik: &str, query: &str) -> Self {
        Self {
            cik: cik.to_string(),
            query: query.to_string(),
            filing_types: vec!["10-K".to_string()],
            years: 3,
            quarters: None,
        }
    }

    /// Sets the filing types to search.
    #[must_use]
    pub fn with_filing_types(mut self, filing_types: Vec<String>) -> Self {
        self.filing_types = filing_types;
        self
    }

    /// Sets the number of recent years to cover.
    #[must_use]
    pub const fn with_years(mut self, years: usize) -> Self {
        self.years = years;
        self
    }

    /// Restricts quarterly ingestion to specific quarter tags.
    #[must_use]
    pub fn with_quarters(mut self, quarters: Vec<String>) -> Self {
        self.quarters = Some(quarters);
        self
    }
}

/// One hit from a company-name lookup.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CompanyMatch {
    /// 10-digit zero-padded company identifier.
    pub cik: String,
    /// Ticker symbol.
    pub ticker: String,
    /// Company title as registered.
    pub title: String,
}

/// The assembled retrieval core.
///
/// Owns the process-wide singletons (models, index handle, fetch cache,
/// upstream client); constructed once at startup and passed by handle.
pub struct FilingPipeline {
    source: Box<dyn FilingSource>,
    cache: FetchCache,
    index: Box<dyn VectorIndex>,
    embedder: Box<dyn Embedder>,
    reranker: Box<dyn Reranker>,
    expander: Box<dyn QueryExpander>,
    chunker: FilingChunker,
    extractor: SectionExtractor,
    current_year: i32,
}

impl FilingPipeline {
    /// Assembles the pipeline and initializes its stores.
    ///
    /// # Errors
    ///
    /// Returns an error if cache or index initialization fails.
    pub fn new(
        source: Box<dyn FilingSource>,
        mut cache: FetchCache,
        mut index: Box<dyn VectorIndex>,
        embedder: Box<dyn Embedder>,
        reranker: Box<dyn Reranker>,
    ) -> Result<Self> {
        cache.init()?;
        index.init()?;
        Ok(Self {
            source,
            cache,
            index,
            embedder,
            reranker,
            expander: Box::new(HydeExpander::new()),
            chunker: FilingChunker::new(),
            extractor: SectionExtractor::new(),
            current_year: chrono::Utc::now().year(),
        })
    }

    /// Overrides the calendar year used for target-year computation.
    ///
    /// Tests pin this so fixtures don't age out.
    #[must_use]
    pub const fn with_current_year(mut self, year: i32) -> Self {
        self.current_year = year;
        self
    }

    /// Answers a query with cited passages, ingesting on demand.
    ///
    /// # Errors
    ///
    /// Returns an error for invalid input, an unavailable index, or a model
    /// failure. Per-filing ingestion failures are logged and skipped.
    pub fn search_filing(&mut self, request: &SearchRequest) -> Result<Vec<Citation>> {
        if request.cik.trim().is_empty() {
            return Err(CommandError::InvalidArgument("cik must not be empty".to_string()).into());
        }
        if request.years == 0 {
            return Err(CommandError::InvalidArgument("years must be at least 1".to_string()).into());
        }

        let target_years = self.target_years(request.years);
        let missing_years = self.find_missing_years(&request.cik, &target_years)?;

        if !missing_years.is_empty() {
            info!(
                cik = request.cik.as_str(),
                years = ?missing_years,
                "ingesting missing filings"
            );
            self.ingest(
                &request.cik,
                &request.filing_types,
                &missing_years,
                request.quarters.as_deref(),
            )?;
        }

        let retriever = Retriever::with_expander(
            &*self.index,
            &*self.embedder,
            &*self.reranker,
            &*self.expander,
        );
        let chunks = retriever.retrieve(&request.query, &request.cik, &target_years)?;

        // Internal fields (similarity, parent excerpts) stop here
        Ok(chunks.into_iter().map(Citation::from).collect())
    }

    /// Looks up companies by name or ticker, cached by normalized query.
    ///
    /// # Errors
    ///
    /// Returns an error if the lookup table cannot be fetched.
    pub fn search_company(&mut self, name: &str) -> Result<Vec<CompanyMatch>> {
        let key = name.trim().to_lowercase();
        if let Some(hits) = self.cache.get::<Vec<CompanyMatch>>(
            Namespace::CompanySearch,
            &key,
            Namespace::CompanySearch.ttl(),
        ) {
            return Ok(hits);
        }

        let table = self.source.company_tickers()?;
        let mut hits = Vec::new();
        if let Some(entries) = table.as_object() {
            for entry in entries.values() {
                let title = entry.get("title").and_then(|v| v.as_str()).unwrap_or("");
                let ticker = entry.get("ticker").and_then(|v| v.as_str()).unwrap_or("");
                if !title.to_lowercase().contains(&key) && !ticker.eq_ignore_ascii_case(&key) {
                    continue;
                }
                let cik = entry.get("cik_str").and_then(serde_json::Value::as_u64);
                if let Some(cik) = cik {
                    hits.push(CompanyMatch {
                        cik: format!("{cik:010}"),
                        ticker: ticker.to_string(),
                        title: title.to_string(),
                    });
                }
                if hits.len() >= SEARCH_LIMIT {
                    break;
                }
            }
        }

        self.cache.put(Namespace::CompanySearch, &key, &hits)?;
        Ok(hits)
    }

    /// Fetches company facts through the cache.
    ///
    /// # Errors
    ///
    /// Returns an error if the fetch or a cache write fails.
    pub fn company_facts(&mut self, cik: &str) -> Result<CompanyFacts> {
        if let Some(facts) = self.cache.get::<CompanyFacts>(
            Namespace::CompanyFacts,
            cik,
            Namespace::CompanyFacts.ttl(),
        ) {
            return Ok(facts);
        }
        let facts = self.source.company_facts(cik)?;
        self.cache.put(Namespace::CompanyFacts, cik, &facts)?;
        Ok(facts)
    }

    /// Removes everything stored for a company: index rows and cached
    /// fetches.
    ///
    /// # Errors
    ///
    /// Returns an error if a delete fails.
    pub fn clear_company(&mut self, cik: &str) -> Result<usize> {
        let removed = self.index.clear_company(cik)?;
        self.cache.clear_company(cik)?;
        info!(cik, removed, "cleared company");
        Ok(removed)
    }

    /// Total chunks in the index.
    ///
    /// # Errors
    ///
    /// Returns an error if the count query fails.
    pub fn index_count(&self) -> Result<usize> {
        self.index.count()
    }

    /// The last `n` calendar years as strings, newest first.
    #[allow(clippy::cast_possible_wrap)]
    fn target_years(&self, n: usize) -> Vec<String> {
        (0..n as i32)
            .map(|i| (self.current_year - i).to_string())
            .collect()
    }

    /// Probes the index for years with no stored chunks.
    ///
    /// The probe is a single sentinel id per year (`risk_factors` chunk 0):
    /// a filing that never produced chunks keeps its year "missing", and
    /// deterministic ids make the resulting re-ingest a no-op.
    fn find_missing_years(&self, cik: &str, years: &[String]) -> Result<Vec<String>> {
        let mut missing = Vec::new();
        for year in years {
            let sentinel = format!("{cik}_{year}_risk_factors_0");
            if !self.index.exists(&sentinel)? {
                missing.push(year.clone());
            }
        }
        Ok(missing)
    }

    /// Ingests all requested filing types for the missing years.
    ///
    /// A failure scoped to one filing type is logged and the remaining
    /// types proceed; index errors abort.
    fn ingest(
        &mut self,
        cik: &str,
        filing_types: &[String],
        missing_years: &[String],
        quarters: Option<&[String]>,
    ) -> Result<()> {
        for filing_type in filing_types {
            let type_quarters = if filing_type == "10-Q" {
                Some(quarters.map_or_else(
                    || ALL_QUARTERS.iter().map(ToString::to_string).collect(),
                    <[String]>::to_vec,
                ))
            } else {
                None
            };

            match self.ingest_type(cik, filing_type, missing_years, type_quarters.as_deref()) {
                Ok(indexed) => {
                    info!(cik, filing_type, indexed, "ingestion complete");
                }
                Err(e) if e.is_filing_local() => {
                    warn!(cik, filing_type, error = %e, "skipping filing type");
                }
                Err(e) => return Err(e),
            }
        }
        Ok(())
    }

    /// Ingests one filing type across the missing years; returns chunks
    /// indexed.
    fn ingest_type(
        &mut self,
        cik: &str,
        filing_type: &str,
        missing_years: &[String],
        quarters: Option<&[String]>,
    ) -> Result<usize> {
        let submissions = self.cached_submissions(cik)?;
        let company = if submissions.name.is_empty() {
            format!("CIK {cik}")
        } else {
            submissions.name.clone()
        };

        let refs = submissions.filings_of_type(filing_type, SCAN_LIMIT);
        if refs.is_empty() {
            return Err(IngestError::NoFilings {
                cik: cik.to_string(),
                filing_type: filing_type.to_string(),
            }
            .into());
        }

        let mut filings = Vec::new();
        for filing_ref in refs {
            if !missing_years.iter().any(|y| y == filing_ref.year()) {
                continue;
            }
            if let Some(target_quarters) = quarters {
                match filing_ref.quarter() {
                    Some(q) if target_quarters.iter().any(|t| t == q) => {}
                    _ => continue,
                }
            }

            match self.ingest_filing(cik, &company, filing_type, &filing_ref) {
                Ok(filing) => filings.push(filing),
                Err(e) if e.is_filing_local() => {
                    warn!(
                        accession = filing_ref.accession_number.as_str(),
                        error = %e,
                        "skipping filing"
                    );
                }
                Err(e) => return Err(e),
            }
        }

        let chunks = self.chunker.chunk_filings(&filings);
        if chunks.is_empty() {
            warn!(cik, filing_type, "no chunks produced");
            return Ok(0);
        }

        // Embed only chunks the index does not already hold
        let mut new_chunks = Vec::new();
        for chunk in chunks {
            if !self.index.exists(&chunk.chunk_id)? {
                new_chunks.push(chunk);
            }
        }
        if new_chunks.is_empty() {
            return Ok(0);
        }

        let texts: Vec<&str> = new_chunks.iter().map(|c| c.text.as_str()).collect();
        let embeddings = self.embedder.embed_batch(&texts)?;
        self.index.add(&new_chunks, &embeddings)
    }

    /// Downloads, sections, and caches one filing.
    fn ingest_filing(
        &mut self,
        cik: &str,
        company: &str,
        filing_type: &str,
        filing_ref: &FilingRef,
    ) -> Result<Filing> {
        let cache_key = format!("{cik}_{}", filing_ref.accession_number);
        if let Some(filing) = self.cache.get::<Filing>(
            Namespace::FilingText,
            &cache_key,
            Namespace::FilingText.ttl(),
        ) {
            return Ok(filing);
        }

        let year = filing_ref.year().to_string();
        if filing_ref.primary_document.is_empty() {
            return Err(IngestError::DocumentUnavailable {
                accession: filing_ref.accession_number.clone(),
            }
            .into());
        }

        let body = self.source.filing_document(
            &filing_ref.accession_number,
            cik,
            &filing_ref.primary_document,
        )?;

        let mut filing = body.map_or_else(
            || {
                warn!(
                    accession = filing_ref.accession_number.as_str(),
                    "document absent, keeping empty filing"
                );
                Filing::empty(company, cik, &year, filing_type)
            },
            |raw| Filing {
                company: company.to_string(),
                cik: cik.to_string(),
                year: year.clone(),
                quarter: None,
                filing_type: filing_type.to_string(),
                sections: self.extractor.extract(&raw),
            },
        );
        if filing_type == "10-Q" {
            filing.quarter = filing_ref.quarter().map(ToString::to_string);
        }

        self.cache
            .put(Namespace::FilingText, &cache_key, &filing)?;
        Ok(filing)
    }

    /// Fetches submissions through the cache.
    fn cached_submissions(&mut self, cik: &str) -> Result<Submissions> {
        if let Some(submissions) = self.cache.get::<Submissions>(
            Namespace::CompanySubmissions,
            cik,
            Namespace::CompanySubmissions.ttl(),
        ) {
            return Ok(submissions);
        }
        let submissions = self.source.submissions(cik)?;
        self.cache
            .put(Namespace::CompanySubmissions, cik, &submissions)?;
        Ok(submissions)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::edgar::submissions::{Filings, RecentFilings};
    use crate::embedding::{DIMENSIONS, HashEmbedder};
    use crate::error::Error;
    use crate::index::SqliteIndex;
    use crate::rerank::LexicalReranker;
    use std::collections::HashMap;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::{Arc, Mutex};

    /// Fixture filing source backed by in-memory documents.
    struct FixtureSource {
        submissions: Submissions,
        documents: Mutex<HashMap<String, String>>,
        document_fetches: Arc<AtomicUsize>,
    }

    impl FixtureSource {
        fn new(submissions: Submissions, documents: HashMap<String, String>) -> Self {
            Self {
                submissions,
                documents: Mutex::new(documents),
                document_fetches: Arc::new(AtomicUsize::new(0)),
            }
        }

        fn fetch_counter(&self) -> Arc<AtomicUsize> {
            Arc::clone(&self.document_fetches)
        }
    }

    impl FilingSource for FixtureSource {
        fn submissions(&self, _cik: &str) -> Result<Submissions> {
            Ok(self.submissions.clone())
        }

        fn filing_document(
            &self,
            accession: &str,
            _cik: &str,
            _filename: &str,
        ) -> Result<Option<String>> {
            self.document_fetches.fetch_add(1, Ordering::SeqCst);
            Ok(self.documents.lock().unwrap().get(accession).cloned())
        }

        fn company_facts(&self, _cik: &str) -> Result<CompanyFacts> {
            Ok(CompanyFacts {
                entity_name: "Fixture Corp".to_string(),
                facts: HashMap::new(),
            })
        }

        fn company_tickers(&self) -> Result<serde_json::Value> {
            Ok(serde_json::json!({
                "0": {"cik_str": 320_193, "ticker": "AAPL", "title": "Apple Inc."},
                "1": {"cik_str": 789_019, "ticker": "MSFT", "title": "Microsoft Corp"}
            }))
        }
    }

    /// A 10-K body whose risk-factors section discusses the given topic.
    fn filing_html(topic: &str) -> String {
        let mut section = String::new();
        for i in 0..70 {
            section.push_str(&format!(
                "The company faces {topic} risks item {i} in its operations. "
            ));
        }
        format!(
            "<html><body>\
             <div>Item 1A. Risk Factors</div>\
             <p>Item 1A. Risk Factors</p><p>{section}</p>\
             </body></html>"
        )
    }

    fn submissions_for_years(years: &[i32]) -> Submissions {
        let mut recent = RecentFilings::default();
        for year in years {
            recent.form.push("10-K".to_string());
            recent.filing_date.push(format!("{year}-11-01"));
            recent
                .accession_number
                .push(format!("0000000001-{}-000001", year % 100));
            recent.primary_document.push(format!("corp-{year}.htm"));
        }
        Submissions {
            name: "Fixture Corp".to_string(),
            tickers: vec!["FIX".to_string()],
            filings: Filings { recent },
        }
    }

    fn build_pipeline(years: &[i32]) -> FilingPipeline {
        let mut documents = HashMap::new();
        for year in years {
            documents.insert(
                format!("0000000001-{}-000001", year % 100),
                filing_html(&format!("topic{year}")),
            );
        }
        let source = FixtureSource::new(submissions_for_years(years), documents);
        FilingPipeline::new(
            Box::new(source),
            FetchCache::in_memory().unwrap(),
            Box::new(SqliteIndex::in_memory().unwrap()),
            Box::new(HashEmbedder::new(DIMENSIONS)),
            Box::new(LexicalReranker::new()),
        )
        .unwrap()
        .with_current_year(2024)
    }

    #[test]
    fn test_cold_ingest_then_retrieve() {
        let mut pipeline = build_pipeline(&[2024, 2023]);
        let request = SearchRequest::new("0000000001", "What risks does the company face?")
            .with_years(2);

        let citations = pipeline.search_filing(&request).unwrap();
        assert!(!citations.is_empty());
        assert!(citations.len() <= crate::retrieval::TOP_K);
        assert!(citations.iter().all(|c| c.cik == "0000000001"));
        assert!(citations.iter().all(|c| c.section == "risk_factors"));
        assert!(pipeline.index_count().unwrap() > 0);
    }

    #[test]
    fn test_reingest_is_idempotent() {
        let mut pipeline = build_pipeline(&[2024, 2023]);
        let request = SearchRequest::new("0000000001", "What risks does the company face?")
            .with_years(2);

        pipeline.search_filing(&request).unwrap();
        let count_after_first = pipeline.index_count().unwrap();

        let citations = pipeline.search_filing(&request).unwrap();
        assert_eq!(pipeline.index_count().unwrap(), count_after_first);
        assert!(!citations.is_empty());
        assert!(citations.len() <= crate::retrieval::TOP_K);
    }

    #[test]
    fn test_sentinel_probe_skips_ingested_years() {
        let mut pipeline = build_pipeline(&[2024]);
        let request = SearchRequest::new("0000000001", "risks").with_years(1);

        pipeline.search_filing(&request).unwrap();
        let missing = pipeline
            .find_missing_years("0000000001", &["2024".to_string(), "2023".to_string()])
            .unwrap();
        assert_eq!(missing, vec!["2023".to_string()]);
    }

    #[test]
    fn test_missing_document_is_skipped_not_fatal() {
        // Submissions list two years but only one document exists
        let mut documents = HashMap::new();
        documents.insert(
            "0000000001-24-000001".to_string(),
            filing_html("supply chain"),
        );
        let source = FixtureSource::new(submissions_for_years(&[2024, 2023]), documents);
        let mut pipeline = FilingPipeline::new(
            Box::new(source),
            FetchCache::in_memory().unwrap(),
            Box::new(SqliteIndex::in_memory().unwrap()),
            Box::new(HashEmbedder::new(DIMENSIONS)),
            Box::new(LexicalReranker::new()),
        )
        .unwrap()
        .with_current_year(2024);

        let request = SearchRequest::new("0000000001", "supply chain risks").with_years(2);
        let citations = pipeline.search_filing(&request).unwrap();
        assert!(!citations.is_empty());
        assert!(citations.iter().all(|c| c.year == "2024"));
    }

    #[test]
    fn test_invalid_input_rejected() {
        let mut pipeline = build_pipeline(&[2024]);

        let empty_cik = SearchRequest::new("", "query");
        assert!(matches!(
            pipeline.search_filing(&empty_cik),
            Err(Error::Command(_))
        ));

        let zero_years = SearchRequest::new("0000000001", "query").with_years(0);
        assert!(matches!(
            pipeline.search_filing(&zero_years),
            Err(Error::Command(_))
        ));
    }

    #[test]
    fn test_filing_cache_prevents_refetch() {
        let mut documents = HashMap::new();
        documents.insert("0000000001-24-000001".to_string(), filing_html("tariffs"));
        let source = FixtureSource::new(submissions_for_years(&[2024]), documents);
        let fetches = source.fetch_counter();
        let mut pipeline = FilingPipeline::new(
            Box::new(source),
            FetchCache::in_memory().unwrap(),
            Box::new(SqliteIndex::in_memory().unwrap()),
            Box::new(HashEmbedder::new(DIMENSIONS)),
            Box::new(LexicalReranker::new()),
        )
        .unwrap()
        .with_current_year(2024);

        let request = SearchRequest::new("0000000001", "tariff risks").with_years(1);
        pipeline.search_filing(&request).unwrap();
        assert_eq!(fetches.load(Ordering::SeqCst), 1);

        // Clear the index only; re-ingestion is satisfied from the filing
        // cache without another document fetch
        pipeline.index.clear_company("0000000001").unwrap();
        pipeline.search_filing(&request).unwrap();
        assert_eq!(fetches.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_clear_company_empties_index() {
        let mut pipeline = build_pipeline(&[2024]);
        let request = SearchRequest::new("0000000001", "risks").with_years(1);
        pipeline.search_filing(&request).unwrap();
        assert!(pipeline.index_count().unwrap() > 0);

        pipeline.clear_company("0000000001").unwrap();
        assert_eq!(pipeline.index_count().unwrap(), 0);
    }

    #[test]
    fn test_search_company_matches_and_caches() {
        let mut pipeline = build_pipeline(&[2024]);
        let hits = pipeline.search_company("apple").unwrap();
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].cik, "0000320193");
        assert_eq!(hits[0].ticker, "AAPL");

        let by_ticker = pipeline.search_company("msft").unwrap();
        assert_eq!(by_ticker.len(), 1);
        assert_eq!(by_ticker[0].title, "Microsoft Corp");
    }

    #[test]
    fn test_company_facts_cached() {
        let mut pipeline = build_pipeline(&[2024]);
        let facts = pipeline.company_facts("0000000001").unwrap();
        assert_eq!(facts.entity_name, "Fixture Corp");
        // Second call hits the cache (the fixture would answer anyway; this
        // verifies the parsed value round-trips through storage)
        let again = pipeline.company_facts("0000000001").unwrap();
        assert_eq!(again.entity_name, "Fixture Corp");
    }

    #[test]
    fn test_target_years() {
        let pipeline = build_pipeline(&[2024]);
        assert_eq!(
            pipeline.target_years(3),
            vec!["2024".to_string(), "2023".to_string(), "2022".to_string()]
        );
    }
}
