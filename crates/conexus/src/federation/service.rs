//! Federation service: discovers active connectors, fans a query out
//! to each of them concurrently under a shared deadline, merges and
//! deduplicates the results, attaches cross-source relationships, and
//! paginates the response.

use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Instant;

use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;
use tracing::warn;

use conexus_core::merger::Merger;
use conexus_core::models::{SearchMethod, SearchResult};
use conexus_core::relationships::{detect_cross_source_relationships, RelatableItem};

use crate::federation::connector::{ConnectorManager, FilesystemConnector, SearchableConnector};
use crate::federation::{SearchRequest, SearchResponse, SearchResultItem};
use crate::metrics::MetricsSink;

pub struct FederationService {
    manager: Arc<dyn ConnectorManager>,
    connectors: BTreeMap<String, Arc<dyn SearchableConnector>>,
    fallback: Arc<dyn SearchableConnector>,
    deadline_ms: u64,
    default_top_k: usize,
    max_top_k: usize,
    metrics: Arc<dyn MetricsSink>,
}

impl FederationService {
    pub fn new(
        manager: Arc<dyn ConnectorManager>,
        connectors: Vec<Arc<dyn SearchableConnector>>,
        fallback: Arc<FilesystemConnector>,
        deadline_ms: u64,
        default_top_k: usize,
        max_top_k: usize,
        metrics: Arc<dyn MetricsSink>,
    ) -> Self {
        let connectors = connectors
            .into_iter()
            .map(|c| (c.id().to_string(), c))
            .collect();
        Self {
            manager,
            connectors,
            fallback,
            deadline_ms,
            default_top_k,
            max_top_k,
            metrics,
        }
    }

    /// Fans the request out to active connectors, merges and deduplicates
    /// their results, attaches cross-source relationships, and paginates.
    pub async fn search(&self, mut request: SearchRequest) -> SearchResponse {
        let start = Instant::now();

        if request.top_k == 0 {
            request.top_k = self.default_top_k;
        }
        request.top_k = request.top_k.clamp(1, self.max_top_k);

        let active = self.manager.list_active();
        let mut to_run: Vec<Arc<dyn SearchableConnector>> = active
            .iter()
            .filter_map(|info| self.connectors.get(&info.id).cloned())
            .collect();
        if to_run.is_empty() {
            to_run.push(self.fallback.clone());
        }
        if !request.filters.source_types.is_empty() {
            to_run.retain(|c| request.filters.source_types.iter().any(|t| t == c.connector_type()));
        }

        let deadline = tokio::time::Duration::from_millis(self.deadline_ms);
        let mut join_set: JoinSet<(String, String, Result<Vec<SearchResultItem>, String>, u64)> =
            JoinSet::new();
        let cancel = CancellationToken::new();

        for connector in &to_run {
            let connector = connector.clone();
            let request = request.clone();
            let child_cancel = cancel.child_token();
            join_set.spawn(async move {
                let call_start = Instant::now();
                let outcome = connector.search(&request, &child_cancel).await;
                let elapsed = call_start.elapsed().as_millis() as u64;
                (
                    connector.id().to_string(),
                    connector.connector_type().to_string(),
                    outcome.map_err(|e| e.to_string()),
                    elapsed,
                )
            });
        }

        let mut merger = Merger::new();
        let mut errors: BTreeMap<String, String> = BTreeMap::new();
        let mut all_items: Vec<(String, SearchResultItem)> = Vec::new();
        let mut timed_out = false;

        let collect = async {
            while let Some(joined) = join_set.join_next().await {
                match joined {
                    Ok((id, connector_type, Ok(items), elapsed_ms)) => {
                        self.metrics.record_duration("connector_search", elapsed_ms);
                        self.metrics.record_connector_outcome(&id, true);
                        let results: Vec<SearchResult> =
                            items.iter().map(|i| to_search_result(i)).collect();
                        merger.add_batch(&id, &results);
                        for item in items {
                            all_items.push((id.clone(), item));
                        }
                        let _ = connector_type;
                    }
                    Ok((id, _connector_type, Err(message), elapsed_ms)) => {
                        self.metrics.record_duration("connector_search", elapsed_ms);
                        self.metrics.record_connector_outcome(&id, false);
                        warn!(connector_id = %id, %message, "connector failed");
                        errors.insert(id, message);
                    }
                    Err(join_err) => {
                        warn!(%join_err, "connector task panicked");
                    }
                }
            }
        };

        if tokio::time::timeout(deadline, collect).await.is_err() {
            timed_out = true;
            cancel.cancel();
            join_set.abort_all();
        }

        let (merged_results, dedup_stats, attribution) = merger.finish();
        self.metrics
            .record_dedup_ratio(dedup_stats.unique, dedup_stats.total);

        // Build relatable items against the merged (deduplicated) set so
        // relationships are reported on ids actually present in the
        // response, using the connector id recorded in the attribution map
        // as each item's source.
        let relatable_owned: Vec<(String, SearchResult)> = merged_results
            .iter()
            .map(|result| {
                let source = attribution
                    .get(&result.id)
                    .and_then(|sources| sources.first())
                    .cloned()
                    .unwrap_or_default();
                (source, result.clone())
            })
            .collect();
        let relatable_items: Vec<RelatableItem<'_>> = relatable_owned
            .iter()
            .map(|(source, result)| RelatableItem {
                id: &result.id,
                source,
                result,
            })
            .collect();
        let relationships = detect_cross_source_relationships(&relatable_items);

        let total_count = merged_results.len();
        let offset = request.offset;
        let limit = request.top_k;
        let page: Vec<SearchResultItem> = merged_results
            .into_iter()
            .skip(offset)
            .take(limit)
            .map(|r| {
                let source_type = all_items
                    .iter()
                    .find(|(_, item)| item.id == r.id)
                    .map(|(_, item)| item.source_type.clone())
                    .unwrap_or_default();
                SearchResultItem {
                    id: r.id,
                    content: r.content,
                    score: r.score,
                    source_type,
                    metadata: r.metadata,
                }
            })
            .collect();
        let has_more = offset + page.len() < total_count;

        if timed_out {
            errors.insert(
                "__deadline__".to_string(),
                format!("federation deadline of {}ms exceeded", self.deadline_ms),
            );
        }

        SearchResponse {
            results: page,
            total_count,
            query_time_ms: start.elapsed().as_millis() as u64,
            offset,
            limit,
            has_more,
            relationships,
            attribution,
            errors,
        }
    }
}

fn to_search_result(item: &SearchResultItem) -> SearchResult {
    SearchResult {
        id: item.id.clone(),
        content: item.content.clone(),
        score: item.score,
        method: SearchMethod::Hybrid,
        metadata: item.metadata.clone(),
        updated_at: 0,
    }
}
