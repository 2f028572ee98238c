//! Query keyword extraction.
//!
//! Shared by HyDE expansion (keyword tail) and CRAG scoring (overlap
//! fraction and sentence trimming).

/// Words too generic to carry retrieval signal.
const STOP_WORDS: [&str; 46] = [
    "what", "how", "did", "does", "is", "are", "was", "were", "the", "a", "an", "in", "on", "at",
    "to", "for", "of", "and", "or", "but", "about", "their", "its", "they", "it", "this", "that",
    "these", "those", "with", "from", "tell", "me", "us", "our", "your", "my", "has", "have",
    "had", "been", "be", "do", "say", "says", "said",
];

/// Extracts meaningful keywords from a query.
///
/// Lowercases, splits on non-alphabetic characters, and drops stop words
/// and tokens shorter than three characters.
///
/// # Examples
///
/// ```
/// use toshi_rag::retrieval::keywords::extract_keywords;
///
/// let keywords = extract_keywords("What are the company's risks in China?");
/// assert_eq!(keywords, vec!["company", "risks", "china"]);
/// ```
#[must_use]
pub fn extract_keywords(query: &str) -> Vec<String> {
    query
        .to_lowercase()
        .split(|c: char| !c.is_ascii_alphabetic())
        .filter(|w| w.len() > 2 && !STOP_WORDS.contains(w))
        .map(ToString::to_string)
        .collect()
}
