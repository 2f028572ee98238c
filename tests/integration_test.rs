//! Integration tests for toshi-rag.

#![allow(clippy::expect_used)]

use std::collections::HashMap;
use tempfile::TempDir;
use toshi_rag::edgar::FetchCache;
use toshi_rag::edgar::facts::CompanyFacts;
use toshi_rag::edgar::submissions::{Filings, RecentFilings, Submissions};
use toshi_rag::embedding::{DIMENSIONS, HashEmbedder};
use toshi_rag::error::Result;
use toshi_rag::index::{IndexFilter, SqliteIndex, VectorIndex};
use toshi_rag::rerank::LexicalReranker;
use toshi_rag::{FilingPipeline, FilingSource, SearchRequest, TOP_K};

const APPLE: &str = "0000320193";
const MICROSOFT: &str = "0000789019";

/// Fixture filing source: per-company submissions and document bodies.
struct FixtureSource {
    submissions: HashMap<String, Submissions>,
    documents: HashMap<String, String>,
}

impl FilingSource for FixtureSource {
    fn submissions(&self, cik: &str) -> Result<Submissions> {
        Ok(self.submissions.get(cik).cloned().unwrap_or_default())
    }

    fn filing_document(
        &self,
        accession: &str,
        _cik: &str,
        _filename: &str,
    ) -> Result<Option<String>> {
        Ok(self.documents.get(accession).cloned())
    }

    fn company_facts(&self, _cik: &str) -> Result<CompanyFacts> {
        Ok(CompanyFacts::default())
    }

    fn company_tickers(&self) -> Result<serde_json::Value> {
        Ok(serde_json::json!({}))
    }
}

/// A marked-up 10-K with a table of contents and two real sections.
fn filing_html(topic: &str) -> String {
    let mut risk = String::new();
    for i in 0..70 {
        risk.push_str(&format!(
            "The company faces {topic} risks item {i} in its operations. "
        ));
    }
    let mut mda = String::new();
    for i in 0..70 {
        mda.push_str(&format!(
            "Management discusses liquidity metric {i} for the period. "
        ));
    }
    format!(
        "<html><head><title>FORM 10-K</title></head><body>\
         <div>Item 1A. Risk Factors</div>\
         <div>Item 7. Management's Discussion</div>\
         <p>Item 1A. Risk Factors</p><p>{risk}</p>\
         <p>Item 7. Management's Discussion and Analysis</p><p>{mda}</p>\
         </body></html>"
    )
}

fn submissions_for(cik: &str, years: &[i32]) -> Submissions {
    let mut recent = RecentFilings::default();
    for year in years {
        recent.form.push("10-K".to_string());
        recent.filing_date.push(format!("{year}-11-01"));
        recent
            .accession_number
            .push(format!("{cik}-{}-000001", year % 100));
        recent.primary_document.push(format!("doc-{year}.htm"));
    }
    Submissions {
        name: format!("Company {cik}"),
        tickers: Vec::new(),
        filings: Filings { recent },
    }
}

/// Builds a pipeline over on-disk stores with fixture filings for two
/// companies.
fn create_test_pipeline() -> (FilingPipeline, TempDir) {
    let temp_dir = TempDir::new().expect("Failed to create temp dir");

    let mut submissions = HashMap::new();
    submissions.insert(APPLE.to_string(), submissions_for(APPLE, &[2024, 2023]));
    submissions.insert(MICROSOFT.to_string(), submissions_for(MICROSOFT, &[2024]));

    let mut documents = HashMap::new();
    documents.insert(format!("{APPLE}-24-000001"), filing_html("china supply"));
    documents.insert(format!("{APPLE}-23-000001"), filing_html("china tariffs"));
    documents.insert(format!("{MICROSOFT}-24-000001"), filing_html("cloud capacity"));

    let source = FixtureSource {
        submissions,
        documents,
    };

    let cache = FetchCache::open(temp_dir.path().join("cache.db")).expect("cache open failed");
    let index = SqliteIndex::open(temp_dir.path().join("index.db")).expect("index open failed");

    let pipeline = FilingPipeline::new(
        Box::new(source),
        cache,
        Box::new(index),
        Box::new(HashEmbedder::new(DIMENSIONS)),
        Box::new(LexicalReranker::new()),
    )
    .expect("pipeline build failed")
    .with_current_year(2024);

    (pipeline, temp_dir)
}

#[test]
fn test_cold_ingest_hot_retrieve() {
    let (mut pipeline, _temp) = create_test_pipeline();

    let request = SearchRequest::new(APPLE, "What are the company's risks in China?")
        .with_years(2);
    let citations = pipeline.search_filing(&request).expect("search failed");

    assert!(!citations.is_empty());
    assert!(citations.len() <= TOP_K);
    for citation in &citations {
        assert_eq!(citation.cik, APPLE);
        assert_eq!(citation.section, "risk_factors");
        assert_eq!(citation.filing_type, "10-K");
    }
    assert!(pipeline.index_count().expect("count failed") > 0);
}

#[test]
fn test_idempotent_reingest() {
    let (mut pipeline, _temp) = create_test_pipeline();
    let request = SearchRequest::new(APPLE, "What are the company's risks in China?")
        .with_years(2);

    pipeline.search_filing(&request).expect("first search failed");
    let count = pipeline.index_count().expect("count failed");

    let citations = pipeline.search_filing(&request).expect("second search failed");
    assert_eq!(pipeline.index_count().expect("count failed"), count);
    assert!(!citations.is_empty());
    assert!(citations.len() <= TOP_K);
}

#[test]
fn test_mmr_diversity_across_years() {
    let (mut pipeline, _temp) = create_test_pipeline();
    let request = SearchRequest::new(APPLE, "What are the company's risks in China?")
        .with_years(2);
    let citations = pipeline.search_filing(&request).expect("search failed");

    let years: std::collections::HashSet<&str> =
        citations.iter().map(|c| c.year.as_str()).collect();
    assert!(
        years.len() >= 2,
        "top results should span both indexed years, got {years:?}"
    );
}

#[test]
fn test_filter_isolation_between_companies() {
    let (mut pipeline, _temp) = create_test_pipeline();

    // Ingest both companies
    let apple = SearchRequest::new(APPLE, "china risks").with_years(2);
    pipeline.search_filing(&apple).expect("apple search failed");
    let microsoft = SearchRequest::new(MICROSOFT, "cloud risks").with_years(1);
    pipeline
        .search_filing(&microsoft)
        .expect("microsoft search failed");

    // Query one; no citation may carry the other's identifier
    let citations = pipeline.search_filing(&apple).expect("search failed");
    assert!(!citations.is_empty());
    assert!(citations.iter().all(|c| c.cik == APPLE));
}

#[test]
fn test_results_survive_process_restart() {
    let temp_dir;
    {
        let (mut pipeline, temp) = create_test_pipeline();
        let request = SearchRequest::new(APPLE, "china risks").with_years(2);
        pipeline.search_filing(&request).expect("search failed");
        temp_dir = temp;
    }

    // Reopen the index alone and query it directly
    let index = SqliteIndex::open(temp_dir.path().join("index.db")).expect("reopen failed");
    let embedder = HashEmbedder::new(DIMENSIONS);
    let query = toshi_rag::Embedder::embed(&embedder, "china risks").expect("embed failed");
    let matches = index
        .query(&query, &IndexFilter::company(APPLE), 5)
        .expect("query failed");
    assert!(!matches.is_empty());
}

#[test]
fn test_clear_company_removes_only_that_company() {
    let (mut pipeline, _temp) = create_test_pipeline();
    let apple = SearchRequest::new(APPLE, "china risks").with_years(2);
    pipeline.search_filing(&apple).expect("apple search failed");
    let microsoft = SearchRequest::new(MICROSOFT, "cloud risks").with_years(1);
    pipeline
        .search_filing(&microsoft)
        .expect("microsoft search failed");

    let before = pipeline.index_count().expect("count failed");
    let removed = pipeline.clear_company(APPLE).expect("clear failed");
    assert!(removed > 0);
    assert_eq!(pipeline.index_count().expect("count failed"), before - removed);

    // The other company remains queryable
    let citations = pipeline
        .search_filing(&microsoft)
        .expect("microsoft search after clear failed");
    assert!(citations.iter().all(|c| c.cik == MICROSOFT));
}

mod cli_smoke {
    use assert_cmd::Command;
    use predicates::prelude::*;
    use tempfile::TempDir;

    #[test]
    fn test_status_on_fresh_stores() {
        let temp = TempDir::new().expect("temp dir");
        Command::cargo_bin("toshi-rag")
            .expect("binary exists")
            .args([
                "--index-path",
                temp.path().join("index.db").to_str().expect("utf8 path"),
                "--cache-path",
                temp.path().join("cache.db").to_str().expect("utf8 path"),
                "status",
            ])
            .assert()
            .success()
            .stdout(predicate::str::contains("Indexed chunks:  0"));
    }

    #[test]
    fn test_clear_without_confirmation_fails() {
        let temp = TempDir::new().expect("temp dir");
        Command::cargo_bin("toshi-rag")
            .expect("binary exists")
            .env("SEC_USER_AGENT", "toshi-rag test@example.com")
            .args([
                "--index-path",
                temp.path().join("index.db").to_str().expect("utf8 path"),
                "--cache-path",
                temp.path().join("cache.db").to_str().expect("utf8 path"),
                "clear",
                "0000320193",
            ])
            .assert()
            .failure()
            .stderr(predicate::str::contains("--yes"));
    }
}

mod property_tests {
    use proptest::prelude::*;
    use toshi_rag::embedding::{DIMENSIONS, Embedder, HashEmbedder, cosine_similarity};
    use toshi_rag::filing::{Filing, FilingChunker, SectionId};

    proptest! {
        #[test]
        fn chunking_is_deterministic(words in 50usize..1_500) {
            let text = (0..words).map(|i| format!("w{i}")).collect::<Vec<_>>().join(" ");
            let mut filing = Filing::empty("Corp", "0000000001", "2024", "10-K");
            filing.sections.insert(SectionId::RiskFactors, text);

            let chunker = FilingChunker::new();
            prop_assert_eq!(chunker.chunk_filing(&filing), chunker.chunk_filing(&filing));
        }

        #[test]
        fn nonzero_embeddings_are_unit_norm(text in "[a-z ]{1,200}") {
            let embedder = HashEmbedder::new(DIMENSIONS);
            let embedding = embedder.embed(&text).unwrap();
            let norm: f32 = embedding.iter().map(|x| x * x).sum::<f32>().sqrt();
            // Whitespace-only inputs embed to zero; everything else to unit norm
            prop_assert!(norm.abs() < 1e-4 || (norm - 1.0).abs() < 1e-4);
        }

        #[test]
        fn self_similarity_is_maximal(text in "[a-z]{3,40} [a-z]{3,40}") {
            let embedder = HashEmbedder::new(DIMENSIONS);
            let embedding = embedder.embed(&text).unwrap();
            let sim = cosine_similarity(&embedding, &embedding);
            prop_assert!((sim - 1.0).abs() < 1e-4);
        }
    }
}
