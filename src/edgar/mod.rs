//! EDGAR collaborators: REST client, fetch cache, and typed records.
//!
//! Everything that touches the SEC's wire formats lives here. Responses are
//! parsed into explicit records at this boundary; the retrieval core never
//! sees raw untyped JSON.

pub mod analysis;
pub mod cache;
pub mod client;
pub mod facts;
pub mod submissions;

pub use cache::{DEFAULT_CACHE_PATH, FetchCache, Namespace};
pub use client::{EdgarClient, FilingSource, REQUEST_DELAY};
pub use facts::{CompanyFacts, MetricPoint, extract_metric, known_metrics};
pub use submissions::{FilingRef, Submissions};
