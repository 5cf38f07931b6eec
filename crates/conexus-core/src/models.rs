//! Shared data model for documents, search results, and federation
//! responses. Kept free of any storage-engine detail so both the pure core
//! and the SQLite-backed application crate agree on one representation.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

/// A JSON primitive, tagged explicitly rather than carried as an untyped
/// `serde_json::Value` everywhere metadata is touched. Filters compare by
/// value-equality against the tag's payload.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum MetadataValue {
    Null,
    Bool(bool),
    Number(serde_json::Number),
    String(String),
    Array(Vec<MetadataValue>),
    Object(BTreeMap<String, MetadataValue>),
}

impl MetadataValue {
    pub fn as_str(&self) -> Option<&str> {
        match self {
            MetadataValue::String(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_i64(&self) -> Option<i64> {
        match self {
            MetadataValue::Number(n) => n.as_i64(),
            _ => None,
        }
    }
}

impl From<serde_json::Value> for MetadataValue {
    fn from(v: serde_json::Value) -> Self {
        match v {
            serde_json::Value::Null => MetadataValue::Null,
            serde_json::Value::Bool(b) => MetadataValue::Bool(b),
            serde_json::Value::Number(n) => MetadataValue::Number(n),
            serde_json::Value::String(s) => MetadataValue::String(s),
            serde_json::Value::Array(a) => {
                MetadataValue::Array(a.into_iter().map(Into::into).collect())
            }
            serde_json::Value::Object(o) => MetadataValue::Object(
                o.into_iter().map(|(k, v)| (k, v.into())).collect(),
            ),
        }
    }
}

impl From<MetadataValue> for serde_json::Value {
    fn from(v: MetadataValue) -> Self {
        match v {
            MetadataValue::Null => serde_json::Value::Null,
            MetadataValue::Bool(b) => serde_json::Value::Bool(b),
            MetadataValue::Number(n) => serde_json::Value::Number(n),
            MetadataValue::String(s) => serde_json::Value::String(s),
            MetadataValue::Array(a) => {
                serde_json::Value::Array(a.into_iter().map(Into::into).collect())
            }
            MetadataValue::Object(o) => {
                serde_json::Value::Object(o.into_iter().map(|(k, v)| (k, v.into())).collect())
            }
        }
    }
}

pub type Metadata = BTreeMap<String, MetadataValue>;

/// The indexed unit. `id` is caller-assigned and must be non-empty and
/// unique; `vector` must be non-empty; all vectors within one store/index
/// share one dimensionality, enforced at insert time.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Document {
    pub id: String,
    pub content: String,
    pub vector: Vec<f32>,
    pub metadata: Metadata,
    pub created_at: i64,
    pub updated_at: i64,
}

impl Document {
    pub fn validate(&self) -> crate::error::Result<()> {
        if self.id.trim().is_empty() {
            return Err(crate::error::Error::validation("document id must not be empty"));
        }
        if self.vector.is_empty() {
            return Err(crate::error::Error::validation(
                "document vector must not be empty",
            ));
        }
        if self.updated_at < self.created_at {
            return Err(crate::error::Error::validation(
                "updated_at must not precede created_at",
            ));
        }
        Ok(())
    }
}

/// Which search method produced a [`SearchResult`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SearchMethod {
    Bm25,
    Vector,
    Hybrid,
}

impl SearchMethod {
    pub fn as_str(&self) -> &'static str {
        match self {
            SearchMethod::Bm25 => "bm25",
            SearchMethod::Vector => "vector",
            SearchMethod::Hybrid => "hybrid",
        }
    }
}

/// One ranked hit: a document plus its score in `[0, 1]` and the method
/// that produced it. Request-scoped; holds an owned copy of document
/// fields so the caller may mutate or drop it without touching storage.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SearchResult {
    pub id: String,
    pub content: String,
    pub score: f32,
    pub method: SearchMethod,
    pub metadata: Metadata,
    pub updated_at: i64,
}

/// Options shared by the BM25, vector, and hybrid searchers.
#[derive(Debug, Clone)]
pub struct SearchOptions {
    pub limit: usize,
    pub offset: usize,
    pub threshold: f32,
    pub filters: BTreeMap<String, MetadataValue>,
}

impl Default for SearchOptions {
    fn default() -> Self {
        Self {
            limit: 10,
            offset: 0,
            threshold: 0.0,
            filters: BTreeMap::new(),
        }
    }
}

/// A batch of [`SearchResult`]s carrying the producing connector's identity.
/// Request-scoped.
#[derive(Debug, Clone)]
pub struct ConnectorResult {
    pub connector_id: String,
    pub connector_type: String,
    pub results: Vec<SearchResult>,
    pub duration_ms: u64,
    pub error: Option<String>,
}

/// Deduplication counters attached to a [`FederatedResult`].
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct DedupStats {
    pub total: usize,
    pub duplicates_found: usize,
    pub unique: usize,
    pub merged: usize,
}

/// The federation response: the merged result list, per-source counts,
/// dedup statistics, cross-source link map, source attribution map,
/// per-connector errors, and total wall-clock duration.
#[derive(Debug, Clone, Default)]
pub struct FederatedResult {
    pub results: Vec<SearchResult>,
    pub dedup_stats: DedupStats,
    pub relationships: BTreeMap<String, Vec<String>>,
    pub attribution: BTreeMap<String, Vec<String>>,
    pub errors: BTreeMap<String, String>,
    pub duration_ms: u64,
    pub has_more: bool,
}
