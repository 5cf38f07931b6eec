//! Relationship detector: finds undirected links between items from
//! different sources that, by structural cues, appear to name the same
//! underlying entity.

use std::collections::BTreeMap;

use crate::models::SearchResult;

/// One item as seen by the detector: its id, source, and the metadata
/// fields used to extract an identifier.
#[derive(Debug, Clone)]
pub struct RelatableItem<'a> {
    pub id: &'a str,
    pub source: &'a str,
    pub result: &'a SearchResult,
}

/// Extracts a canonical identifier in priority `id`, `ticket_id`,
/// `issue_id`, `file_path`, falling back to the item's own id.
fn canonical_identifier(item: &RelatableItem<'_>) -> String {
    for key in ["id", "ticket_id", "issue_id", "file_path"] {
        if let Some(value) = item.result.metadata.get(key).and_then(|v| v.as_str()) {
            if !value.is_empty() {
                return value.to_string();
            }
        }
    }
    item.id.to_string()
}

fn normalize(s: &str) -> String {
    s.trim().to_lowercase()
}

/// Longest common substring length between two strings (byte-oriented;
/// identifiers in practice are ASCII).
fn longest_common_substring_len(a: &str, b: &str) -> usize {
    let a_bytes = a.as_bytes();
    let b_bytes = b.as_bytes();
    if a_bytes.is_empty() || b_bytes.is_empty() {
        return 0;
    }
    let mut prev = vec![0usize; b_bytes.len() + 1];
    let mut best = 0;
    for i in 1..=a_bytes.len() {
        let mut curr = vec![0usize; b_bytes.len() + 1];
        for j in 1..=b_bytes.len() {
            if a_bytes[i - 1] == b_bytes[j - 1] {
                curr[j] = prev[j - 1] + 1;
                best = best.max(curr[j]);
            }
        }
        prev = curr;
    }
    best
}

/// Relate if exact match, one contains the other, or normalized forms
/// share a longest common substring covering at least 70% of the shorter
/// string.
fn identifiers_related(a: &str, b: &str) -> bool {
    if a == b {
        return true;
    }
    if a.contains(b) || b.contains(a) {
        return true;
    }
    let na = normalize(a);
    let nb = normalize(b);
    if na.is_empty() || nb.is_empty() {
        return false;
    }
    let shorter = na.len().min(nb.len());
    let lcs = longest_common_substring_len(&na, &nb);
    (lcs as f64) >= 0.7 * (shorter as f64)
}

/// Runs the cross-source detector over `items`, comparing every unordered
/// pair drawn from different sources. Returns an adjacency map
/// `item_id -> [related_item_id]` with entries on both sides of each
/// related pair.
pub fn detect_cross_source_relationships(
    items: &[RelatableItem<'_>],
) -> BTreeMap<String, Vec<String>> {
    let mut adjacency: BTreeMap<String, Vec<String>> = BTreeMap::new();

    for i in 0..items.len() {
        for j in (i + 1)..items.len() {
            let a = &items[i];
            let b = &items[j];
            if a.source == b.source {
                continue;
            }
            let id_a = canonical_identifier(a);
            let id_b = canonical_identifier(b);
            if identifiers_related(&id_a, &id_b) {
                adjacency
                    .entry(a.id.to_string())
                    .or_default()
                    .push(b.id.to_string());
                adjacency
                    .entry(b.id.to_string())
                    .or_default()
                    .push(a.id.to_string());
            }
        }
    }

    adjacency
}

/// Materializes the adjacency mapping into an explicit graph structure,
/// `id -> set of related ids`, for callers that prefer set semantics over
/// the raw (possibly duplicate-containing) vector form.
pub fn as_graph(
    adjacency: &BTreeMap<String, Vec<String>>,
) -> BTreeMap<String, std::collections::BTreeSet<String>> {
    adjacency
        .iter()
        .map(|(id, related)| (id.clone(), related.iter().cloned().collect()))
        .collect()
}

/// Optional intra-source helper: same file path, same ticket id,
/// test-to-source pairing (`_test`/`.test`/`.spec` suffixes), and
/// documentation pairing (`.md`/`.rst`/`.txt`/`.adoc` extensions or
/// `/docs/`/`readme` path tokens). Not used by the federation default; a
/// separate entry point for callers that want same-source linking too.
pub fn detect_intra_source_relationships(
    items: &[RelatableItem<'_>],
) -> BTreeMap<String, Vec<String>> {
    let mut adjacency: BTreeMap<String, Vec<String>> = BTreeMap::new();

    for i in 0..items.len() {
        for j in (i + 1)..items.len() {
            let a = &items[i];
            let b = &items[j];
            if a.source != b.source {
                continue;
            }
            let path_a = a.result.metadata.get("file_path").and_then(|v| v.as_str());
            let path_b = b.result.metadata.get("file_path").and_then(|v| v.as_str());
            let related = match (path_a, path_b) {
                (Some(pa), Some(pb)) => {
                    pa == pb || is_test_pair(pa, pb) || is_doc_pair(pa, pb) || is_doc_pair(pb, pa)
                }
                _ => identifiers_related(&canonical_identifier(a), &canonical_identifier(b)),
            };
            if related {
                adjacency
                    .entry(a.id.to_string())
                    .or_default()
                    .push(b.id.to_string());
                adjacency
                    .entry(b.id.to_string())
                    .or_default()
                    .push(a.id.to_string());
            }
        }
    }

    adjacency
}

fn is_test_pair(a: &str, b: &str) -> bool {
    let is_test = |p: &str| p.contains("_test") || p.contains(".test") || p.contains(".spec");
    let strip_test_suffix = |p: &str| {
        p.replace("_test", "")
            .replace(".test", "")
            .replace(".spec", "")
    };
    (is_test(a) && !is_test(b) && strip_test_suffix(a).contains(b.trim_start_matches("./")))
        || (is_test(b) && !is_test(a) && strip_test_suffix(b).contains(a.trim_start_matches("./")))
}

fn is_doc_pair(doc_candidate: &str, other: &str) -> bool {
    let lower = doc_candidate.to_lowercase();
    let looks_like_doc = lower.ends_with(".md")
        || lower.ends_with(".rst")
        || lower.ends_with(".txt")
        || lower.ends_with(".adoc")
        || lower.contains("/docs/")
        || lower.contains("readme");
    looks_like_doc && stem(&lower) == stem(&other.to_lowercase())
}

fn stem(path: &str) -> String {
    path.rsplit('/')
        .next()
        .unwrap_or(path)
        .split('.')
        .next()
        .unwrap_or(path)
        .to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::SearchMethod;
    use std::collections::BTreeMap as Map;

    fn item_with_metadata<'a>(
        id: &'a str,
        source: &'a str,
        key: &str,
        value: &str,
        result: &'a mut SearchResult,
    ) -> RelatableItem<'a> {
        result
            .metadata
            .insert(key.to_string(), crate::models::MetadataValue::String(value.to_string()));
        RelatableItem { id, source, result }
    }

    fn blank_result() -> SearchResult {
        SearchResult {
            id: String::new(),
            content: String::new(),
            score: 0.0,
            method: SearchMethod::Hybrid,
            metadata: Map::new(),
            updated_at: 0,
        }
    }

    #[test]
    fn shared_ticket_id_links_cross_source_items() {
        let mut ra = blank_result();
        let mut rb = blank_result();
        let a = item_with_metadata("item-a", "source-a", "id", "PROJ-123", &mut ra);
        let b = item_with_metadata("item-b", "source-b", "ticket_id", "PROJ-123", &mut rb);
        let adjacency = detect_cross_source_relationships(&[a, b]);
        assert_eq!(adjacency.get("item-a").unwrap(), &vec!["item-b".to_string()]);
        assert_eq!(adjacency.get("item-b").unwrap(), &vec!["item-a".to_string()]);
    }

    #[test]
    fn same_source_pairs_are_skipped() {
        let mut ra = blank_result();
        let mut rb = blank_result();
        let a = item_with_metadata("item-a", "source-a", "id", "PROJ-123", &mut ra);
        let b = item_with_metadata("item-b", "source-a", "ticket_id", "PROJ-123", &mut rb);
        let adjacency = detect_cross_source_relationships(&[a, b]);
        assert!(adjacency.is_empty());
    }

    #[test]
    fn unrelated_identifiers_produce_no_links() {
        let mut ra = blank_result();
        let mut rb = blank_result();
        let a = item_with_metadata("item-a", "source-a", "id", "PROJ-123", &mut ra);
        let b = item_with_metadata("item-b", "source-b", "ticket_id", "UNREL-999", &mut rb);
        let adjacency = detect_cross_source_relationships(&[a, b]);
        assert!(adjacency.is_empty());
    }

    #[test]
    fn fuzzy_longest_common_substring_match() {
        let mut ra = blank_result();
        let mut rb = blank_result();
        let a = item_with_metadata("item-a", "source-a", "file_path", "src/search/hybrid.rs", &mut ra);
        let b = item_with_metadata(
            "item-b",
            "source-b",
            "file_path",
            "search/hybrid.rs",
            &mut rb,
        );
        let adjacency = detect_cross_source_relationships(&[a, b]);
        assert!(adjacency.contains_key("item-a"));
    }

    #[test]
    fn longest_common_substring_length_is_symmetric() {
        assert_eq!(
            longest_common_substring_len("hello world", "world hello"),
            5
        );
    }
}
