//! In-memory Hierarchical Navigable Small World graph for approximate
//! nearest-neighbor search. Neighbors are stored as ids indexing into a
//! central map rather than as owning references, so the graph has no
//! cyclic `Rc`/`Arc` structure to worry about; soft-delete sets a flag and
//! searches simply skip deleted nodes.

use std::collections::{BinaryHeap, HashMap};
use std::sync::RwLock;

use rand::Rng;

use crate::error::{Error, Result};
use crate::vector::{cosine_distance, normalize};

/// Tuning knobs for graph construction and search. `m_l = 1 / ln(m)` is
/// derived, not stored.
#[derive(Debug, Clone, Copy)]
pub struct HnswParams {
    pub m: usize,
    pub m_max: usize,
    pub m_max0: usize,
    pub ef_construction: usize,
    pub ef_search: usize,
    pub max_level: usize,
}

impl Default for HnswParams {
    fn default() -> Self {
        Self {
            m: 16,
            m_max: 32,
            m_max0: 64,
            ef_construction: 200,
            ef_search: 32,
            max_level: 16,
        }
    }
}

impl HnswParams {
    fn m_l(&self) -> f64 {
        1.0 / (self.m as f64).ln()
    }

    fn m_max_for_layer(&self, layer: usize) -> usize {
        if layer == 0 {
            self.m_max0
        } else {
            self.m_max
        }
    }
}

#[derive(Debug, Clone)]
struct Node {
    id: String,
    vector: Vec<f32>,
    level: usize,
    /// `neighbors[layer]` is that layer's adjacency list, `(node_id, distance)`.
    neighbors: Vec<Vec<(String, f32)>>,
    deleted: bool,
}

struct Inner {
    nodes: HashMap<String, Node>,
    entry_point: Option<String>,
    max_level: usize,
}

/// A graph-backed ANN index, safe to share across threads: a single
/// read-write lock protects all mutation, many concurrent readers are
/// allowed, writers serialize. Searches never observe a half-inserted node.
pub struct HnswIndex {
    params: HnswParams,
    dims: RwLock<Option<usize>>,
    inner: RwLock<Inner>,
}

/// Candidate ordered by ascending distance for a min-heap.
#[derive(PartialEq)]
struct MinCandidate {
    dist: f32,
    id: String,
}
impl Eq for MinCandidate {}
impl Ord for MinCandidate {
    fn cmp(&self, other: &Self) -> std::cmp::Ordering {
        other
            .dist
            .partial_cmp(&self.dist)
            .unwrap_or(std::cmp::Ordering::Equal)
    }
}
impl PartialOrd for MinCandidate {
    fn partial_cmp(&self, other: &Self) -> Option<std::cmp::Ordering> {
        Some(self.cmp(other))
    }
}

/// Candidate ordered by descending distance for a bounded max-heap (so the
/// furthest result is the one popped/peeked first when the heap is full).
#[derive(PartialEq)]
struct MaxCandidate {
    dist: f32,
    id: String,
}
impl Eq for MaxCandidate {}
impl Ord for MaxCandidate {
    fn cmp(&self, other: &Self) -> std::cmp::Ordering {
        self.dist
            .partial_cmp(&other.dist)
            .unwrap_or(std::cmp::Ordering::Equal)
    }
}
impl PartialOrd for MaxCandidate {
    fn partial_cmp(&self, other: &Self) -> Option<std::cmp::Ordering> {
        Some(self.cmp(other))
    }
}

impl HnswIndex {
    pub fn new(params: HnswParams) -> Self {
        Self {
            params,
            dims: RwLock::new(None),
            inner: RwLock::new(Inner {
                nodes: HashMap::new(),
                entry_point: None,
                max_level: 0,
            }),
        }
    }

    pub fn size(&self) -> usize {
        self.inner.read().unwrap().nodes.len()
    }

    pub fn get(&self, id: &str) -> Option<Vec<f32>> {
        self.inner
            .read()
            .unwrap()
            .nodes
            .get(id)
            .filter(|n| !n.deleted)
            .map(|n| n.vector.clone())
    }

    fn sample_level(&self) -> usize {
        let mut rng = rand::thread_rng();
        let m_l = self.params.m_l();
        let mut level = 0;
        while rng.gen::<f64>() < m_l && level < self.params.max_level {
            level += 1;
        }
        level
    }

    /// Inserts `id` with embedding `v`. Validates non-empty and
    /// dimension-consistent (against the first observed dimension),
    /// normalizes, samples a level, and wires bidirectional edges via the
    /// neighbor-selection heuristic.
    pub fn insert(&self, id: &str, v: &[f32]) -> Result<()> {
        if v.is_empty() {
            return Err(Error::validation("hnsw insert: vector must not be empty"));
        }
        {
            let mut dims = self.dims.write().unwrap();
            match *dims {
                None => *dims = Some(v.len()),
                Some(d) if d != v.len() => {
                    return Err(Error::validation(format!(
                        "hnsw insert: dimension mismatch, expected {d} got {}",
                        v.len()
                    )))
                }
                _ => {}
            }
        }

        let normalized = normalize(v);
        let level = self.sample_level();
        let mut inner = self.inner.write().unwrap();

        if inner.nodes.is_empty() {
            inner.nodes.insert(
                id.to_string(),
                Node {
                    id: id.to_string(),
                    vector: normalized,
                    level,
                    neighbors: vec![Vec::new(); level + 1],
                    deleted: false,
                },
            );
            inner.entry_point = Some(id.to_string());
            inner.max_level = level;
            return Ok(());
        }

        let entry_id = inner.entry_point.clone().unwrap();
        let mut current = entry_id;
        let top = inner.max_level;

        // Greedy descent from the entry point down to level+1, taking the
        // single best neighbor at each layer.
        for layer in (level + 1..=top).rev() {
            current = Self::greedy_step(&inner, &current, &normalized, layer);
        }

        let mut neighbors: Vec<Vec<(String, f32)>> = vec![Vec::new(); level + 1];
        for layer in (0..=level.min(top)).rev() {
            let candidates =
                Self::search_layer(&inner, &normalized, &current, layer, self.params.ef_construction);
            let selected = Self::select_neighbors(&inner, &candidates, self.params.m);
            neighbors[layer] = selected.clone();
            if let Some((best_id, _)) = selected.first() {
                current = best_id.clone();
            }

            // Install bidirectional edges and prune neighbors' lists.
            for (neighbor_id, dist) in &selected {
                if let Some(neighbor) = inner.nodes.get_mut(neighbor_id) {
                    if neighbor.neighbors.len() <= layer {
                        continue;
                    }
                    neighbor.neighbors[layer].push((id.to_string(), *dist));
                    let cap = self.params.m_max_for_layer(layer);
                    if neighbor.neighbors[layer].len() > cap {
                        neighbor.neighbors[layer]
                            .sort_by(|a, b| a.1.partial_cmp(&b.1).unwrap_or(std::cmp::Ordering::Equal));
                        neighbor.neighbors[layer].truncate(cap);
                    }
                }
            }
        }

        inner.nodes.insert(
            id.to_string(),
            Node {
                id: id.to_string(),
                vector: normalized,
                level,
                neighbors,
                deleted: false,
            },
        );

        if level > inner.max_level {
            inner.max_level = level;
            inner.entry_point = Some(id.to_string());
        }

        Ok(())
    }

    /// Normalizes the query; greedily descends from `max_level` down to 1
    /// (single best at each layer); at layer 0 runs an `ef`-width BFS and
    /// returns the `k` closest alive nodes as `(id, similarity)` pairs.
    pub fn search(&self, query: &[f32], k: usize, ef: usize) -> Vec<(String, f32)> {
        let inner = self.inner.read().unwrap();
        if inner.nodes.is_empty() {
            return Vec::new();
        }
        let Some(entry) = Self::live_entry_point(&inner) else {
            return Vec::new();
        };

        let normalized = normalize(query);
        let mut current = entry;
        for layer in (1..=inner.max_level).rev() {
            current = Self::greedy_step(&inner, &current, &normalized, layer);
        }

        let candidates = Self::search_layer(&inner, &normalized, &current, 0, ef.max(k));
        candidates
            .into_iter()
            .take(k)
            .map(|(id, dist)| (id, 1.0 - dist))
            .collect()
    }

    pub fn remove(&self, id: &str) {
        if let Some(node) = self.inner.write().unwrap().nodes.get_mut(id) {
            node.deleted = true;
        }
    }

    fn live_entry_point(inner: &Inner) -> Option<String> {
        if let Some(ep) = &inner.entry_point {
            if inner.nodes.get(ep).is_some_and(|n| !n.deleted) {
                return Some(ep.clone());
            }
        }
        inner
            .nodes
            .values()
            .filter(|n| !n.deleted)
            .max_by_key(|n| n.level)
            .map(|n| n.id.clone())
    }

    /// Takes the single best neighbor of `from` at `layer`, relative to
    /// `query`, repeating until no closer neighbor is found.
    fn greedy_step(inner: &Inner, from: &str, query: &[f32], layer: usize) -> String {
        let mut current = from.to_string();
        loop {
            let Some(node) = inner.nodes.get(&current) else {
                return current;
            };
            let current_dist = cosine_distance(query, &node.vector);
            let mut best = current.clone();
            let mut best_dist = current_dist;
            if node.neighbors.len() > layer {
                for (neighbor_id, _) in &node.neighbors[layer] {
                    if let Some(neighbor) = inner.nodes.get(neighbor_id) {
                        if neighbor.deleted {
                            continue;
                        }
                        let d = cosine_distance(query, &neighbor.vector);
                        if d < best_dist {
                            best_dist = d;
                            best = neighbor_id.clone();
                        }
                    }
                }
            }
            if best == current {
                return current;
            }
            current = best;
        }
    }

    /// `ef`-width BFS at `layer`, seeded from `entry`. Returns candidates
    /// sorted by ascending distance.
    fn search_layer(
        inner: &Inner,
        query: &[f32],
        entry: &str,
        layer: usize,
        ef: usize,
    ) -> Vec<(String, f32)> {
        let mut visited: std::collections::HashSet<String> = std::collections::HashSet::new();
        let mut candidates: BinaryHeap<MinCandidate> = BinaryHeap::new();
        let mut results: BinaryHeap<MaxCandidate> = BinaryHeap::new();

        let Some(entry_node) = inner.nodes.get(entry) else {
            return Vec::new();
        };
        let entry_dist = cosine_distance(query, &entry_node.vector);
        visited.insert(entry.to_string());
        candidates.push(MinCandidate {
            dist: entry_dist,
            id: entry.to_string(),
        });
        if !entry_node.deleted {
            results.push(MaxCandidate {
                dist: entry_dist,
                id: entry.to_string(),
            });
        }

        while let Some(MinCandidate { dist, id }) = candidates.pop() {
            if let Some(MaxCandidate { dist: furthest, .. }) = results.peek() {
                if dist > *furthest && results.len() >= ef {
                    break;
                }
            }

            let Some(node) = inner.nodes.get(&id) else {
                continue;
            };
            if node.neighbors.len() <= layer {
                continue;
            }
            for (neighbor_id, _) in &node.neighbors[layer] {
                if visited.contains(neighbor_id) {
                    continue;
                }
                visited.insert(neighbor_id.clone());
                let Some(neighbor) = inner.nodes.get(neighbor_id) else {
                    continue;
                };
                let d = cosine_distance(query, &neighbor.vector);
                let should_add = results.len() < ef
                    || results
                        .peek()
                        .map(|f| d < f.dist)
                        .unwrap_or(true);
                if should_add {
                    candidates.push(MinCandidate {
                        dist: d,
                        id: neighbor_id.clone(),
                    });
                    if !neighbor.deleted {
                        results.push(MaxCandidate {
                            dist: d,
                            id: neighbor_id.clone(),
                        });
                        if results.len() > ef {
                            results.pop();
                        }
                    }
                }
            }
        }

        let mut out: Vec<(String, f32)> = results.into_iter().map(|c| (c.id, c.dist)).collect();
        out.sort_by(|a, b| a.1.partial_cmp(&b.1).unwrap_or(std::cmp::Ordering::Equal));
        out
    }

    /// Given candidates sorted by ascending distance to the insertion
    /// point, keep the closest; for each subsequent candidate keep it only
    /// if its distance to every already-selected neighbor exceeds its
    /// distance to the insertion point (angular diversity heuristic),
    /// stopping once `m` neighbors are selected.
    fn select_neighbors(inner: &Inner, candidates: &[(String, f32)], m: usize) -> Vec<(String, f32)> {
        let mut selected: Vec<(String, f32)> = Vec::new();
        for (id, dist_to_point) in candidates {
            if selected.len() >= m {
                break;
            }
            let Some(node) = inner.nodes.get(id) else {
                continue;
            };
            let diverse = selected.iter().all(|(sel_id, _)| {
                inner
                    .nodes
                    .get(sel_id)
                    .map(|sel_node| cosine_distance(&node.vector, &sel_node.vector) > *dist_to_point)
                    .unwrap_or(true)
            });
            if diverse {
                selected.push((id.clone(), *dist_to_point));
            }
        }
        selected
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn idx() -> HnswIndex {
        HnswIndex::new(HnswParams {
            m: 4,
            m_max: 8,
            m_max0: 16,
            ef_construction: 32,
            ef_search: 16,
            max_level: 4,
        })
    }

    #[test]
    fn empty_index_search_returns_empty() {
        let index = idx();
        assert!(index.search(&[1.0, 0.0, 0.0], 5, 16).is_empty());
    }

    #[test]
    fn single_node_search_finds_itself() {
        let index = idx();
        index.insert("a", &[1.0, 0.0, 0.0]).unwrap();
        let results = index.search(&[1.0, 0.0, 0.0], 1, 16);
        assert_eq!(results[0].0, "a");
        assert!(results[0].1 > 0.99);
    }

    #[test]
    fn nearest_neighbor_ranks_first() {
        let index = idx();
        index.insert("cat", &[1.0, 0.0, 0.0]).unwrap();
        index.insert("dog", &[0.9, 0.1, 0.0]).unwrap();
        index.insert("bird", &[0.0, 1.0, 0.0]).unwrap();
        let results = index.search(&[1.0, 0.0, 0.0], 2, 32);
        assert_eq!(results[0].0, "cat");
        assert!(results[0].1 > results[1].1 || results[0].0 != results[1].0);
    }

    #[test]
    fn dimension_mismatch_is_rejected() {
        let index = idx();
        index.insert("a", &[1.0, 0.0]).unwrap();
        assert!(index.insert("b", &[1.0, 0.0, 0.0]).is_err());
    }

    #[test]
    fn empty_vector_is_rejected() {
        let index = idx();
        assert!(index.insert("a", &[]).is_err());
    }

    #[test]
    fn removed_node_is_excluded_from_search() {
        let index = idx();
        index.insert("a", &[1.0, 0.0, 0.0]).unwrap();
        index.insert("b", &[0.9, 0.1, 0.0]).unwrap();
        index.remove("a");
        let results = index.search(&[1.0, 0.0, 0.0], 2, 32);
        assert!(results.iter().all(|(id, _)| id != "a"));
    }

    #[test]
    fn size_tracks_inserted_nodes() {
        let index = idx();
        index.insert("a", &[1.0, 0.0]).unwrap();
        index.insert("b", &[0.0, 1.0]).unwrap();
        assert_eq!(index.size(), 2);
    }

    #[test]
    fn many_inserts_all_remain_searchable() {
        let index = idx();
        for i in 0..50 {
            let angle = (i as f32) * 0.1;
            index.insert(&format!("n{i}"), &[angle.cos(), angle.sin()]).unwrap();
        }
        assert_eq!(index.size(), 50);
        let results = index.search(&[1.0, 0.0], 10, 64);
        assert_eq!(results.len(), 10);
    }
}
