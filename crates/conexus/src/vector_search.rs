//! Vector searcher: brute-force-with-sampling against the document
//! store by default, or HNSW-backed when a graph index is supplied.

use std::collections::BTreeMap;

use tokio_util::sync::CancellationToken;
use tracing::warn;

use conexus_core::error::{Error, Result};
use conexus_core::hnsw::HnswIndex;
use conexus_core::models::{SearchMethod, SearchOptions, SearchResult};
use conexus_core::store::Store;

/// Runs a vector search. When `index` is `Some`, uses the HNSW-backed
/// strategy (`ef = max(2*limit, 32)`, fetch candidates by id, re-filter,
/// paginate); otherwise delegates to the store's brute-force-with-sampling
/// implementation directly.
pub async fn search_vector(
    store: &dyn Store,
    index: Option<&HnswIndex>,
    query_vector: &[f32],
    opts: &SearchOptions,
    cancel: &CancellationToken,
) -> Result<Vec<SearchResult>> {
    if query_vector.is_empty() {
        return Err(Error::validation("query vector must not be empty"));
    }

    let limit = if opts.limit == 0 { 10 } else { opts.limit };

    let Some(index) = index else {
        return store.search_vector(query_vector, opts, cancel).await;
    };

    let ef = (2 * limit).max(32);
    let hits = index.search(query_vector, limit + opts.offset, ef);

    let mut results = Vec::with_capacity(hits.len());
    for (id, similarity) in hits {
        if cancel.is_cancelled() {
            return Err(Error::Cancelled);
        }
        let doc = match store.get(&id, cancel).await {
            Ok(doc) => doc,
            Err(_) => {
                warn!(%id, "hnsw candidate missing from store, skipping");
                continue;
            }
        };
        if !matches_filters(&doc.metadata, &opts.filters) {
            continue;
        }
        if opts.threshold > 0.0 && similarity < opts.threshold {
            continue;
        }
        results.push(SearchResult {
            id: doc.id,
            content: doc.content,
            score: similarity,
            method: SearchMethod::Vector,
            metadata: doc.metadata,
            updated_at: doc.updated_at,
        });
    }

    results.sort_by(|a, b| b.score.partial_cmp(&a.score).unwrap_or(std::cmp::Ordering::Equal));
    Ok(results.into_iter().skip(opts.offset).take(limit).collect())
}

fn matches_filters(
    metadata: &conexus_core::models::Metadata,
    filters: &BTreeMap<String, conexus_core::models::MetadataValue>,
) -> bool {
    filters
        .iter()
        .all(|(key, value)| metadata.get(key) == Some(value))
}
