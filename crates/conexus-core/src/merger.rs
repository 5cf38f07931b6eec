//! Federation merger: deduplicates results from multiple sources by
//! content hash and tracks which sources contributed each surviving item.

use std::collections::BTreeMap;

use sha2::{Digest, Sha256};

use crate::models::{ConnectorResult, DedupStats, SearchResult};

/// Accumulates [`ConnectorResult`] batches and emits a deduplicated list.
/// One instance per federation request; no cross-request sharing.
#[derive(Default)]
pub struct Merger {
    /// `digest -> first-seen item`, in first-seen order.
    seen: BTreeMap<String, SearchResult>,
    insertion_order: Vec<String>,
    /// `digest -> [source_id]`, the sources that contributed this digest.
    attribution: BTreeMap<String, Vec<String>>,
    total: usize,
    duplicates_found: usize,
}

impl Merger {
    pub fn new() -> Self {
        Self::default()
    }

    /// Content-derived key for a result: prefer `content`, else a `path`
    /// metadata field, else the id.
    fn content_key(item: &SearchResult) -> String {
        if !item.content.trim().is_empty() {
            return item.content.clone();
        }
        if let Some(path) = item
            .metadata
            .get("file_path")
            .or_else(|| item.metadata.get("path"))
            .and_then(|v| v.as_str())
        {
            return path.to_string();
        }
        item.id.clone()
    }

    fn digest(key: &str) -> String {
        let mut hasher = Sha256::new();
        hasher.update(key.as_bytes());
        format!("{:x}", hasher.finalize())
    }

    /// Feeds one connector's results into the merge, recording attribution
    /// by `source_id`.
    pub fn add_batch(&mut self, source_id: &str, items: &[SearchResult]) {
        for item in items {
            self.total += 1;
            let key = Self::content_key(item);
            let digest = Self::digest(&key);

            let sources = self.attribution.entry(digest.clone()).or_default();
            if sources.contains(&source_id.to_string()) {
                // Same source re-submitting the same item is not a
                // cross-source duplicate; still dedup emission below.
            } else {
                sources.push(source_id.to_string());
            }

            if self.seen.contains_key(&digest) {
                self.duplicates_found += 1;
            } else {
                self.seen.insert(digest.clone(), item.clone());
                self.insertion_order.push(digest);
            }
        }
    }

    /// Emits the deduplicated list sorted by descending number of
    /// contributing sources, preserving insertion order within ties, plus
    /// the final statistics and a `result_id -> [source_id]` attribution
    /// map keyed by the emitted item's own id (not its content digest) so
    /// callers never need to know about digests.
    pub fn finish(self) -> (Vec<SearchResult>, DedupStats, BTreeMap<String, Vec<String>>) {
        let mut ordered: Vec<(String, SearchResult)> = self
            .insertion_order
            .iter()
            .map(|digest| (digest.clone(), self.seen[digest].clone()))
            .collect();

        ordered.sort_by(|(da, _), (db, _)| {
            let sources_a = self.attribution.get(da).map(|v| v.len()).unwrap_or(0);
            let sources_b = self.attribution.get(db).map(|v| v.len()).unwrap_or(0);
            sources_b.cmp(&sources_a)
        });

        let mut attribution_by_id = BTreeMap::new();
        for (digest, item) in &ordered {
            if let Some(sources) = self.attribution.get(digest) {
                attribution_by_id.insert(item.id.clone(), sources.clone());
            }
        }

        let stats = DedupStats {
            total: self.total,
            duplicates_found: self.duplicates_found,
            unique: self.seen.len(),
            merged: self.seen.len(),
        };

        (
            ordered.into_iter().map(|(_, item)| item).collect(),
            stats,
            attribution_by_id,
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::SearchMethod;
    use std::collections::BTreeMap as Map;

    fn result(id: &str, content: &str) -> SearchResult {
        SearchResult {
            id: id.to_string(),
            content: content.to_string(),
            score: 0.5,
            method: SearchMethod::Hybrid,
            metadata: Map::new(),
            updated_at: 0,
        }
    }

    #[test]
    fn identical_content_from_two_sources_is_deduplicated() {
        let mut merger = Merger::new();
        merger.add_batch("source-a", &[result("a1", "same doc")]);
        merger.add_batch("source-b", &[result("b1", "same doc")]);
        let (results, stats, attribution) = merger.finish();
        assert_eq!(results.len(), 1);
        assert_eq!(stats.duplicates_found, 1);
        assert_eq!(stats.total, 2);
        let attributed_sources = attribution.values().next().unwrap();
        assert_eq!(attributed_sources.len(), 2);
    }

    #[test]
    fn distinct_content_is_not_merged() {
        let mut merger = Merger::new();
        merger.add_batch("source-a", &[result("a1", "doc one")]);
        merger.add_batch("source-a", &[result("a2", "doc two")]);
        let (results, stats, _) = merger.finish();
        assert_eq!(results.len(), 2);
        assert_eq!(stats.duplicates_found, 0);
    }

    #[test]
    fn items_from_more_sources_rank_first() {
        let mut merger = Merger::new();
        merger.add_batch("source-a", &[result("a1", "shared")]);
        merger.add_batch("source-b", &[result("b1", "solo")]);
        merger.add_batch("source-c", &[result("c1", "shared")]);
        let (results, _, _) = merger.finish();
        assert_eq!(results[0].content, "shared");
    }

    #[test]
    fn idempotent_when_same_batch_fed_twice() {
        let items = [result("x1", "same doc")];
        let mut merger = Merger::new();
        merger.add_batch("s", &items);
        merger.add_batch("s", &items);
        let (results, stats, _) = merger.finish();
        assert_eq!(results.len(), 1);
        assert_eq!(stats.duplicates_found, 1);
    }

    #[test]
    fn every_emitted_item_has_an_attribution_entry() {
        let mut merger = Merger::new();
        merger.add_batch("source-a", &[result("a1", "alpha"), result("a2", "beta")]);
        let (results, _, attribution) = merger.finish();
        for item in &results {
            assert!(attribution.get(&item.id).is_some_and(|s| !s.is_empty()));
        }
    }
}
