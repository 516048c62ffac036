//! Hybrid (semantic + keyword) ranking.
//!
//! Given a query's text and embedding, each candidate record receives two
//! independent relevance signals:
//!
//! - **semantic** — cosine similarity between the query vector and the
//!   record's stored vector (`1 - cosine distance`).
//! - **keyword** — BM25 relevance of the query terms against the record
//!   content, with document statistics computed over the candidate set
//!   (k1 = 1.2, b = 0.75). Always ≥ 0, unbounded above.
//!
//! The blend is `alpha * semantic + (1 - alpha) * keyword`: `alpha = 1`
//! degenerates to pure vector search, `alpha = 0` to pure keyword search.
//! Raw scores are blended directly, not normalized, so component scores
//! stay interpretable on their own.
//!
//! Ordering is descending by hybrid score with ties broken by the
//! candidates' insertion order (stable sort), so identical inputs always
//! produce identical output.

use std::collections::HashMap;

use crate::embedding::cosine_similarity;
use crate::error::{Error, Result};
use crate::models::RankedResult;

const BM25_K1: f64 = 1.2;
const BM25_B: f64 = 0.75;

/// One record eligible for ranking, joined with its owning resource.
/// Candidates must be supplied in record insertion order.
#[derive(Debug, Clone)]
pub struct RankCandidate {
    pub resource_id: String,
    pub resource_name: String,
    pub resource_metadata: serde_json::Value,
    pub content: String,
    pub vector: Vec<f32>,
}

/// Ranking parameters.
#[derive(Debug, Clone, Copy)]
pub struct RankOptions {
    /// Maximum number of results returned.
    pub top_k: usize,
    /// Semantic-vs-keyword weight in `[0, 1]`.
    pub alpha: f64,
}

impl Default for RankOptions {
    fn default() -> Self {
        Self {
            top_k: 5,
            alpha: 0.6,
        }
    }
}

/// Weighted combination of the two component scores.
pub fn hybrid_score(alpha: f64, semantic: f64, keyword: f64) -> f64 {
    alpha * semantic + (1.0 - alpha) * keyword
}

/// Rank `candidates` against the query and return the top-K results.
///
/// An empty candidate set returns an empty vector, not an error.
///
/// # Errors
///
/// `InvalidConfig` if `top_k` is zero or `alpha` is outside `[0, 1]`.
pub fn rank_candidates(
    query_text: &str,
    query_vector: &[f32],
    candidates: &[RankCandidate],
    opts: &RankOptions,
) -> Result<Vec<RankedResult>> {
    if opts.top_k == 0 {
        return Err(Error::InvalidConfig("top_k must be > 0".into()));
    }
    if !(0.0..=1.0).contains(&opts.alpha) {
        return Err(Error::InvalidConfig(format!(
            "alpha must be in [0.0, 1.0], got {}",
            opts.alpha
        )));
    }
    if candidates.is_empty() {
        return Ok(Vec::new());
    }

    let keyword_scores = bm25_scores(query_text, candidates);

    let mut results: Vec<RankedResult> = candidates
        .iter()
        .zip(keyword_scores.iter())
        .map(|(cand, &keyword)| {
            let semantic = f64::from(cosine_similarity(query_vector, &cand.vector));
            RankedResult {
                content: cand.content.clone(),
                resource_id: cand.resource_id.clone(),
                resource_name: cand.resource_name.clone(),
                resource_metadata: cand.resource_metadata.clone(),
                hybrid_score: hybrid_score(opts.alpha, semantic, keyword),
                semantic_score: semantic,
                keyword_score: keyword,
            }
        })
        .collect();

    // Vec::sort_by is stable: equal scores keep insertion order.
    results.sort_by(|a, b| {
        b.hybrid_score
            .partial_cmp(&a.hybrid_score)
            .unwrap_or(std::cmp::Ordering::Equal)
    });
    results.truncate(opts.top_k);

    Ok(results)
}

/// BM25 scores for every candidate, in candidate order.
///
/// Uses the Lucene idf formulation `ln(1 + (N - df + 0.5) / (df + 0.5))`,
/// which is non-negative for any document frequency.
fn bm25_scores(query_text: &str, candidates: &[RankCandidate]) -> Vec<f64> {
    let query_terms: Vec<String> = tokenize(query_text);
    if query_terms.is_empty() {
        return vec![0.0; candidates.len()];
    }

    let docs: Vec<Vec<String>> = candidates.iter().map(|c| tokenize(&c.content)).collect();
    let n = docs.len() as f64;
    let avg_len = docs.iter().map(|d| d.len() as f64).sum::<f64>() / n;

    // Document frequency per query term.
    let mut df: HashMap<&str, usize> = HashMap::new();
    for term in &query_terms {
        let count = docs
            .iter()
            .filter(|doc| doc.iter().any(|t| t == term))
            .count();
        df.insert(term.as_str(), count);
    }

    docs.iter()
        .map(|doc| {
            if doc.is_empty() {
                return 0.0;
            }
            let len_norm = BM25_K1 * (1.0 - BM25_B + BM25_B * doc.len() as f64 / avg_len.max(1.0));
            query_terms
                .iter()
                .map(|term| {
                    let tf = doc.iter().filter(|t| *t == term).count() as f64;
                    if tf == 0.0 {
                        return 0.0;
                    }
                    let dfi = df[term.as_str()] as f64;
                    let idf = (1.0 + (n - dfi + 0.5) / (dfi + 0.5)).ln();
                    idf * (tf * (BM25_K1 + 1.0)) / (tf + len_norm)
                })
                .sum()
        })
        .collect()
}

/// Lowercased alphanumeric terms.
fn tokenize(text: &str) -> Vec<String> {
    text.split(|c: char| !c.is_alphanumeric())
        .filter(|t| !t.is_empty())
        .map(|t| t.to_lowercase())
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn candidate(id: &str, content: &str, vector: Vec<f32>) -> RankCandidate {
        RankCandidate {
            resource_id: id.to_string(),
            resource_name: "docs".to_string(),
            resource_metadata: serde_json::json!({}),
            content: content.to_string(),
            vector,
        }
    }

    fn ids(results: &[RankedResult]) -> Vec<&str> {
        results.iter().map(|r| r.content.as_str()).collect()
    }

    #[test]
    fn test_blend_matches_worked_example() {
        // semantic 0.9 / keyword 0.1 vs semantic 0.2 / keyword 0.8 at α=0.6
        let a = hybrid_score(0.6, 0.9, 0.1);
        let b = hybrid_score(0.6, 0.2, 0.8);
        assert!((a - 0.58).abs() < 1e-9);
        assert!((b - 0.44).abs() < 1e-9);
        assert!(a > b);
    }

    #[test]
    fn test_zero_top_k_rejected() {
        let err = rank_candidates(
            "q",
            &[1.0],
            &[],
            &RankOptions {
                top_k: 0,
                alpha: 0.6,
            },
        )
        .unwrap_err();
        assert_eq!(err.kind(), "invalid_config");
    }

    #[test]
    fn test_alpha_out_of_range_rejected() {
        let err = rank_candidates(
            "q",
            &[1.0],
            &[],
            &RankOptions {
                top_k: 5,
                alpha: 1.5,
            },
        )
        .unwrap_err();
        assert_eq!(err.kind(), "invalid_config");
    }

    #[test]
    fn test_empty_candidates_empty_results() {
        let results = rank_candidates("q", &[1.0], &[], &RankOptions::default()).unwrap();
        assert!(results.is_empty());
    }

    #[test]
    fn test_alpha_one_is_pure_semantic_order() {
        let candidates = vec![
            candidate("a", "nothing relevant here", vec![0.2, 0.98]),
            candidate("b", "query terms query terms", vec![0.99, 0.14]),
        ];
        let results = rank_candidates(
            "query terms",
            &[1.0, 0.0],
            &candidates,
            &RankOptions {
                top_k: 5,
                alpha: 1.0,
            },
        )
        .unwrap();
        // "b" has the higher cosine similarity against [1, 0].
        assert_eq!(ids(&results), vec!["query terms query terms", "nothing relevant here"]);
        assert!((results[0].hybrid_score - results[0].semantic_score).abs() < 1e-9);
    }

    #[test]
    fn test_alpha_zero_is_pure_keyword_order() {
        // "a" is semantically closest but has no keyword match.
        let candidates = vec![
            candidate("a", "unrelated words entirely", vec![1.0, 0.0]),
            candidate("b", "brute force login attack", vec![0.0, 1.0]),
        ];
        let results = rank_candidates(
            "brute force attack",
            &[1.0, 0.0],
            &candidates,
            &RankOptions {
                top_k: 5,
                alpha: 0.0,
            },
        )
        .unwrap();
        assert_eq!(ids(&results)[0], "brute force login attack");
        assert!((results[0].hybrid_score - results[0].keyword_score).abs() < 1e-9);
    }

    #[test]
    fn test_increasing_alpha_moves_toward_semantic_order() {
        let candidates = vec![
            candidate("kw", "exact match exact match exact match", vec![0.1, 0.995]),
            candidate("sem", "different phrasing", vec![1.0, 0.0]),
        ];
        let query_vec = [1.0f32, 0.0];

        let low = rank_candidates(
            "exact match",
            &query_vec,
            &candidates,
            &RankOptions {
                top_k: 5,
                alpha: 0.0,
            },
        )
        .unwrap();
        let high = rank_candidates(
            "exact match",
            &query_vec,
            &candidates,
            &RankOptions {
                top_k: 5,
                alpha: 1.0,
            },
        )
        .unwrap();

        assert_eq!(low[0].content, "exact match exact match exact match");
        assert_eq!(high[0].content, "different phrasing");
    }

    #[test]
    fn test_tie_break_keeps_insertion_order() {
        // Identical contents and vectors: all scores tie.
        let candidates = vec![
            candidate("first", "same text", vec![1.0, 0.0]),
            candidate("second", "same text", vec![1.0, 0.0]),
            candidate("third", "same text", vec![1.0, 0.0]),
        ];
        let run =
            || rank_candidates("same text", &[1.0, 0.0], &candidates, &RankOptions::default());
        let a = run().unwrap();
        let b = run().unwrap();
        let order_a: Vec<&str> = a.iter().map(|r| r.resource_id.as_str()).collect();
        let order_b: Vec<&str> = b.iter().map(|r| r.resource_id.as_str()).collect();
        assert_eq!(order_a, vec!["first", "second", "third"]);
        assert_eq!(order_a, order_b);
    }

    #[test]
    fn test_top_k_bounds_results() {
        let candidates: Vec<RankCandidate> = (0..10)
            .map(|i| candidate(&format!("c{i}"), "query term", vec![1.0, 0.0]))
            .collect();
        let results = rank_candidates(
            "query term",
            &[1.0, 0.0],
            &candidates,
            &RankOptions {
                top_k: 4,
                alpha: 0.6,
            },
        )
        .unwrap();
        assert_eq!(results.len(), 4);
    }

    #[test]
    fn test_bm25_nonnegative_and_rewards_matches() {
        let candidates = vec![
            candidate("a", "failed login attempts detected on host", vec![0.0]),
            candidate("b", "weather is sunny today", vec![0.0]),
        ];
        let scores = bm25_scores("failed login", &candidates);
        assert!(scores[0] > 0.0);
        assert_eq!(scores[1], 0.0);
        assert!(scores.iter().all(|s| *s >= 0.0));
    }
}
