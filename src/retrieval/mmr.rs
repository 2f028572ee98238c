//! Maximal marginal relevance selection.
//!
//! Greedy trade-off between relevance to the query and diversity against
//! the already-selected set:
//!
//! `score = lambda * rel - (1 - lambda) * max_sim_to_selected`

use crate::embedding::dot;
use crate::index::IndexMatch;

/// Relevance/diversity trade-off: 0.7 = 70% relevance, 30% diversity.
pub const MMR_LAMBDA: f32 = 0.7;

/// Selects up to `n_results` candidates maximizing the MMR score.
///
/// Relevance is the dot product of candidate and query embeddings; the
/// diversity penalty is the maximum similarity to any already-selected
/// candidate (zero for the first pick). Ties break toward higher relevance,
/// then toward earlier position in the candidate list. Selection preserves
/// the candidates' stored embeddings; the caller drops them before chunks
/// leave the retriever.
#[must_use]
#[allow(clippy::float_cmp)] // exact tie detection feeds the relevance tie-break
pub fn mmr_select(
    query_embedding: &[f32],
    candidates: Vec<IndexMatch>,
    n_results: usize,
    lambda: f32,
) -> Vec<IndexMatch> {
    if candidates.is_empty() || n_results == 0 {
        return Vec::new();
    }

    let relevance: Vec<f32> = candidates
        .iter()
        .map(|c| dot(&c.embedding, query_embedding))
        .collect();

    let mut selected: Vec<IndexMatch> = Vec::with_capacity(n_results.min(candidates.len()));
    let mut remaining: Vec<(usize, IndexMatch)> = candidates.into_iter().enumerate().collect();

    while !remaining.is_empty() && selected.len() < n_results {
        let mut best: Option<(usize, f32, f32)> = None; // (position, score, rel)

        for (pos, (orig_idx, candidate)) in remaining.iter().enumerate() {
            let rel = relevance[*orig_idx];
            let diversity_penalty = selected
                .iter()
                .map(|s| dot(&candidate.embedding, &s.embedding))
                .fold(0.0f32, f32::max);
            let score = lambda.mul_add(rel, -(1.0 - lambda) * diversity_penalty);

            let better = match best {
                None => true,
                Some((_, best_score, best_rel)) => {
                    score > best_score || (score == best_score && rel > best_rel)
                }
            };
            if better {
                best = Some((pos, score, rel));
            }
        }

        if let Some((pos, _, _)) = best {
            let (_, candidate) = remaining.remove(pos);
            selected.push(candidate);
        }
    }

    selected
}
