//! Reciprocal Rank Fusion, the pure math half of the hybrid searcher.
//! The orchestration that runs BM25 and vector search concurrently lives in
//! the application crate; this module only combines two already-ranked id
//! lists into one fused ranking.

use std::collections::HashMap;

/// RRF tuning: `alpha` weights toward the vector list (`0` = BM25 only,
/// `1` = vector only), `k` is the RRF constant (default 60).
#[derive(Debug, Clone, Copy)]
pub struct RrfConfig {
    pub alpha: f32,
    pub k: f32,
}

impl Default for RrfConfig {
    fn default() -> Self {
        Self { alpha: 0.5, k: 60.0 }
    }
}

/// Fuses two ranked id lists (best first) into one ranked list of
/// `(id, fused_score)` pairs, sorted by descending fused score.
///
/// `rrf(d) = (1 - alpha) * 1/(k + rank_bm25(d)) + alpha * 1/(k + rank_vector(d))`
/// where `rank` is the 0-based position in each list; a ranking absent from
/// a list contributes `0` for that term.
pub fn reciprocal_rank_fusion(
    bm25_ranked: &[String],
    vector_ranked: &[String],
    config: RrfConfig,
) -> Vec<(String, f32)> {
    let mut scores: HashMap<String, f32> = HashMap::new();
    let mut order: Vec<String> = Vec::new();

    for (rank, id) in bm25_ranked.iter().enumerate() {
        let contribution = (1.0 - config.alpha) * (1.0 / (config.k + rank as f32));
        if !scores.contains_key(id) {
            order.push(id.clone());
        }
        *scores.entry(id.clone()).or_insert(0.0) += contribution;
    }
    for (rank, id) in vector_ranked.iter().enumerate() {
        let contribution = config.alpha * (1.0 / (config.k + rank as f32));
        if !scores.contains_key(id) {
            order.push(id.clone());
        }
        *scores.entry(id.clone()).or_insert(0.0) += contribution;
    }

    let mut fused: Vec<(String, f32)> = order
        .into_iter()
        .map(|id| {
            let score = scores[&id];
            (id, score)
        })
        .collect();
    fused.sort_by(|a, b| b.1.partial_cmp(&a.1).unwrap_or(std::cmp::Ordering::Equal));
    fused
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn alpha_zero_matches_bm25_rank_order() {
        let bm25 = vec!["a".to_string(), "b".to_string(), "c".to_string()];
        let vector = vec!["c".to_string(), "a".to_string(), "b".to_string()];
        let fused = reciprocal_rank_fusion(&bm25, &vector, RrfConfig { alpha: 0.0, k: 60.0 });
        let order: Vec<&str> = fused.iter().map(|(id, _)| id.as_str()).collect();
        assert_eq!(order, vec!["a", "b", "c"]);
    }

    #[test]
    fn alpha_one_matches_vector_rank_order() {
        let bm25 = vec!["a".to_string(), "b".to_string(), "c".to_string()];
        let vector = vec!["c".to_string(), "a".to_string(), "b".to_string()];
        let fused = reciprocal_rank_fusion(&bm25, &vector, RrfConfig { alpha: 1.0, k: 60.0 });
        let order: Vec<&str> = fused.iter().map(|(id, _)| id.as_str()).collect();
        assert_eq!(order, vec!["c", "a", "b"]);
    }

    #[test]
    fn doc_present_in_both_lists_outranks_single_list_docs() {
        let bm25 = vec!["a".to_string(), "b".to_string()];
        let vector = vec!["a".to_string(), "c".to_string()];
        let fused = reciprocal_rank_fusion(&bm25, &vector, RrfConfig::default());
        assert_eq!(fused[0].0, "a");
    }

    #[test]
    fn empty_lists_produce_empty_fusion() {
        let fused = reciprocal_rank_fusion(&[], &[], RrfConfig::default());
        assert!(fused.is_empty());
    }
}
