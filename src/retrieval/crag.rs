//! Corrective self-critique filter.
//!
//! Scores each MMR-selected chunk against the raw (unexpanded) query and
//! keeps, trims, or discards it. The filter never empties a non-empty
//! candidate set: thresholds relax once, and as a last resort the top three
//! raw-scored chunks pass through unmodified.

use crate::Result;
use crate::embedding::{Embedder, dot};
use crate::retrieval::RetrievedChunk;
use crate::retrieval::keywords::extract_keywords;
use tracing::warn;

/// Score at or above which a chunk is kept with full text.
pub const CRAG_CORRECT: f32 = 0.7;

/// Score at or above which a chunk is kept with only its keyword-bearing
/// sentences.
pub const CRAG_AMBIGUOUS: f32 = 0.3;

/// Relaxed thresholds applied when fewer than two chunks survive.
const RELAXED_THRESHOLDS: (f32, f32) = (0.4, 0.15);

/// Minimum survivors before thresholds relax.
const MIN_SURVIVORS: usize = 2;

/// Fallback size when even relaxed thresholds keep nothing.
const FALLBACK_TOP: usize = 3;

/// Weight of keyword overlap in the composite score.
const KEYWORD_WEIGHT: f32 = 0.4;

/// Weight of embedding similarity in the composite score.
const SIMILARITY_WEIGHT: f32 = 0.6;

/// Filters chunks by composite relevance to the raw query.
///
/// Scoring embeds each chunk text and the raw query once; relaxation
/// reclassifies the already-scored set without re-embedding.
///
/// # Errors
///
/// Returns an error if embedding fails.
pub fn crag_filter(
    embedder: &dyn Embedder,
    raw_query: &str,
    chunks: Vec<RetrievedChunk>,
) -> Result<Vec<RetrievedChunk>> {
    if chunks.is_empty() {
        return Ok(Vec::new());
    }

    let query_embedding = embedder.embed(raw_query)?;
    let query_keywords = extract_keywords(raw_query);

    let texts: Vec<&str> = chunks.iter().map(|c| c.chunk.text.as_str()).collect();
    let chunk_embeddings = embedder.embed_batch(&texts)?;

    let scored: Vec<(f32, RetrievedChunk)> = chunks
        .into_iter()
        .zip(chunk_embeddings)
        .map(|(chunk, embedding)| {
            let score = crag_score(&chunk, &embedding, &query_embedding, &query_keywords);
            (score, chunk)
        })
        .collect();

    let mut result = apply_thresholds(&scored, &query_keywords, CRAG_CORRECT, CRAG_AMBIGUOUS);

    if result.len() < MIN_SURVIVORS {
        warn!(
            survivors = result.len(),
            "relaxing self-critique thresholds"
        );
        let (correct, ambiguous) = RELAXED_THRESHOLDS;
        result = apply_thresholds(&scored, &query_keywords, correct, ambiguous);
    }

    if result.is_empty() {
        // Candidates existed, so something must be returned: the highest
        // scored chunks pass through unmodified.
        let mut ranked = scored;
        ranked.sort_by(|a, b| b.0.partial_cmp(&a.0).unwrap_or(std::cmp::Ordering::Equal));
        result = ranked
            .into_iter()
            .take(FALLBACK_TOP)
            .map(|(_, chunk)| chunk)
            .collect();
    }

    Ok(result)
}

/// Composite relevance: keyword overlap (40%) + embedding similarity (60%).
fn crag_score(
    chunk: &RetrievedChunk,
    chunk_embedding: &[f32],
    query_embedding: &[f32],
    query_keywords: &[String],
) -> f32 {
    let text_lower = chunk.chunk.text.to_lowercase();

    #[allow(clippy::cast_precision_loss)]
    let keyword_score = if query_keywords.is_empty() {
        0.5
    } else {
        let hits = query_keywords
            .iter()
            .filter(|kw| text_lower.contains(kw.as_str()))
            .count();
        hits as f32 / query_keywords.len() as f32
    };

    let similarity = dot(chunk_embedding, query_embedding).clamp(0.0, 1.0);

    KEYWORD_WEIGHT.mul_add(keyword_score, SIMILARITY_WEIGHT * similarity)
}

/// Classifies scored chunks against a threshold pair.
fn apply_thresholds(
    scored: &[(f32, RetrievedChunk)],
    query_keywords: &[String],
    correct_threshold: f32,
    ambiguous_threshold: f32,
) -> Vec<RetrievedChunk> {
    let mut result = Vec::new();
    for (score, chunk) in scored {
        if *score >= correct_threshold {
            result.push(chunk.clone());
        } else if *score >= ambiguous_threshold {
            let trimmed = relevant_sentences(&chunk.chunk.text, query_keywords);
            if !trimmed.is_empty() {
                let mut trimmed_chunk = chunk.clone();
                trimmed_chunk.chunk.text = trimmed;
                trimmed_chunk.crag_trimmed = true;
                result.push(trimmed_chunk);
            }
        }
    }
    result
}

/// Keeps only sentences containing at least one query keyword.
fn relevant_sentences(text: &str, keywords: &[String]) -> String {
    split_sentences(text)
        .into_iter()
        .filter(|sentence| {
            let lower = sentence.to_lowercase();
            keywords.iter().any(|kw| lower.contains(kw.as_str()))
        })
        .collect::<Vec<_>>()
        .join(" ")
        .trim()
        .to_string()
}

/// Splits text after sentence punctuation followed by whitespace.
fn split_sentences(text: &str) -> Vec<&str> {
    let mut sentences = Vec::new();
    let bytes = text.as_bytes();
    let mut start = 0;

    let mut i = 0;
    while i < bytes.len() {
        if matches!(bytes[i], b'.' | b'!' | b'?') {
            // Consume the punctuation run, then split before whitespace
            let mut j = i + 1;
            while j < bytes.len() && matches!(bytes[j], b'.' | b'!' | b'?') {
                j += 1;
            }
            if j < bytes.len() && bytes[j].is_ascii_whitespace() {
                let sentence = text[start..j].trim();
                if !sentence.is_empty() {
                    sentences.push(sentence);
                }
                while j < bytes.len() && bytes[j].is_ascii_whitespace() {
                    j += 1;
                }
                start = j;
            }
            i = j;
        } else {
            i += 1;
        }
    }

    let tail = text[start..].trim();
    if !tail.is_empty() {
        sentences.push(tail);
    }

    sentences
}
