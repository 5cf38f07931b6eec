//! Hybrid searcher: runs BM25 and vector search concurrently, fuses
//! via RRF, and optionally applies a metadata rerank boost.

use std::collections::HashMap;

use chrono::{Duration, Utc};
use tokio_util::sync::CancellationToken;

use conexus_core::error::{Error, Result};
use conexus_core::fusion::{reciprocal_rank_fusion, RrfConfig};
use conexus_core::hnsw::HnswIndex;
use conexus_core::models::{SearchMethod, SearchOptions, SearchResult};
use conexus_core::store::Store;

use crate::bm25::search_bm25;
use crate::vector_search::search_vector;

#[derive(Debug, Clone)]
pub struct HybridOptions {
    pub base: SearchOptions,
    pub alpha: f32,
    pub k: f32,
    pub rerank: bool,
}

impl Default for HybridOptions {
    fn default() -> Self {
        Self {
            base: SearchOptions::default(),
            alpha: 0.5,
            k: 60.0,
            rerank: false,
        }
    }
}

/// Runs the hybrid search. Requires at least one of `query` (non-empty) or `query_vector`
/// (non-empty) to be present.
pub async fn search_hybrid(
    store: &dyn Store,
    index: Option<&HnswIndex>,
    query: Option<&str>,
    query_vector: Option<&[f32]>,
    opts: &HybridOptions,
    cancel: &CancellationToken,
) -> Result<Vec<SearchResult>> {
    let query_present = query.map(|q| !q.trim().is_empty()).unwrap_or(false);
    let vector_present = query_vector.map(|v| !v.is_empty()).unwrap_or(false);
    if !query_present && !vector_present {
        return Err(Error::validation(
            "hybrid search requires a non-empty query or query vector",
        ));
    }

    let search_limit = 2 * (opts.base.limit.max(1) + opts.base.offset);
    let mut sub_opts = opts.base.clone();
    sub_opts.limit = search_limit;
    sub_opts.offset = 0;

    let bm25_results = if query_present {
        Some(search_bm25(store, query.unwrap(), &sub_opts, cancel).await?)
    } else {
        None
    };
    let vector_results = if vector_present {
        Some(search_vector(store, index, query_vector.unwrap(), &sub_opts, cancel).await?)
    } else {
        None
    };

    let fused = match (bm25_results, vector_results) {
        (Some(bm25), None) => paginate(bm25, opts.base.limit, opts.base.offset),
        (None, Some(vector)) => paginate(vector, opts.base.limit, opts.base.offset),
        (Some(bm25), Some(vector)) => {
            fuse(&bm25, &vector, RrfConfig { alpha: opts.alpha, k: opts.k })
        }
        (None, None) => Vec::new(),
    };

    let mut fused = if opts.rerank {
        apply_rerank_boost(fused, query)
    } else {
        fused
    };

    if opts.base.threshold > 0.0 {
        fused.retain(|r| r.score >= opts.base.threshold);
    }

    Ok(paginate(fused, opts.base.limit, opts.base.offset))
}

fn fuse(bm25: &[SearchResult], vector: &[SearchResult], config: RrfConfig) -> Vec<SearchResult> {
    let bm25_ids: Vec<String> = bm25.iter().map(|r| r.id.clone()).collect();
    let vector_ids: Vec<String> = vector.iter().map(|r| r.id.clone()).collect();
    let fused_scores = reciprocal_rank_fusion(&bm25_ids, &vector_ids, config);

    let mut by_id: HashMap<String, SearchResult> = HashMap::new();
    for r in bm25.iter().chain(vector.iter()) {
        by_id.entry(r.id.clone()).or_insert_with(|| r.clone());
    }

    fused_scores
        .into_iter()
        .filter_map(|(id, score)| {
            by_id.get(&id).map(|base| SearchResult {
                id: base.id.clone(),
                content: base.content.clone(),
                score,
                method: SearchMethod::Hybrid,
                metadata: base.metadata.clone(),
                updated_at: base.updated_at,
            })
        })
        .collect()
}

/// Small metadata boost capped at 0.006 total: filename-token match
/// (+0.0015), recency (+0.003 within 7 days, else +0.0015 within 30 days),
/// and a language substring match (+0.001).
fn apply_rerank_boost(mut results: Vec<SearchResult>, query: Option<&str>) -> Vec<SearchResult> {
    let query_lower = query.map(|q| q.to_lowercase()).unwrap_or_default();
    let query_tokens: Vec<&str> = query_lower.split_whitespace().collect();
    let now = Utc::now().timestamp();

    for result in &mut results {
        let mut boost = 0.0f32;

        let path = result
            .metadata
            .get("path")
            .or_else(|| result.metadata.get("file_path"))
            .and_then(|v| v.as_str());
        if let Some(path) = path {
            let filename = path.rsplit('/').next().unwrap_or(path).to_lowercase();
            if query_tokens.iter().any(|tok| filename.contains(tok)) {
                boost += 0.0015;
            }
        }

        let age = Duration::seconds(now - result.updated_at);
        if age <= Duration::days(7) {
            boost += 0.003;
        } else if age <= Duration::days(30) {
            boost += 0.0015;
        }

        if let Some(lang) = result.metadata.get("language").and_then(|v| v.as_str()) {
            if !query_lower.is_empty() && query_lower.contains(&lang.to_lowercase()) {
                boost += 0.001;
            }
        }

        result.score += boost.min(0.006);
    }

    results.sort_by(|a, b| b.score.partial_cmp(&a.score).unwrap_or(std::cmp::Ordering::Equal));
    results
}

fn paginate(mut results: Vec<SearchResult>, limit: usize, offset: usize) -> Vec<SearchResult> {
    results.sort_by(|a, b| b.score.partial_cmp(&a.score).unwrap_or(std::cmp::Ordering::Equal));
    let limit = if limit == 0 { 10 } else { limit };
    results.into_iter().skip(offset).take(limit).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::BTreeMap;

    fn result(id: &str, score: f32) -> SearchResult {
        SearchResult {
            id: id.to_string(),
            content: String::new(),
            score,
            method: SearchMethod::Bm25,
            metadata: BTreeMap::new(),
            updated_at: 0,
        }
    }

    #[test]
    fn alpha_zero_fused_rank_matches_bm25_rank() {
        let bm25 = vec![result("a", 0.9), result("b", 0.5)];
        let vector = vec![result("b", 0.9), result("a", 0.2)];
        let fused = fuse(&bm25, &vector, RrfConfig { alpha: 0.0, k: 60.0 });
        assert_eq!(fused[0].id, "a");
        assert_eq!(fused[1].id, "b");
    }

    #[test]
    fn alpha_one_fused_rank_matches_vector_rank() {
        let bm25 = vec![result("a", 0.9), result("b", 0.5)];
        let vector = vec![result("b", 0.9), result("a", 0.2)];
        let fused = fuse(&bm25, &vector, RrfConfig { alpha: 1.0, k: 60.0 });
        assert_eq!(fused[0].id, "b");
        assert_eq!(fused[1].id, "a");
    }

    #[test]
    fn doc_present_in_both_lists_ranks_first() {
        let bm25 = vec![result("a", 0.9), result("b", 0.5)];
        let vector = vec![result("a", 0.8), result("c", 0.7)];
        let fused = fuse(&bm25, &vector, RrfConfig::default());
        assert_eq!(fused[0].id, "a");
    }
}
