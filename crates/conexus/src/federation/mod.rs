//! Federation layer: fans a query out to multiple connectors, merges and
//! deduplicates their results, detects cross-source relationships, and
//! paginates the combined response.

pub mod connector;
pub mod service;

use std::collections::BTreeMap;

use conexus_core::models::Metadata;

/// Optional contextual hints passed through to connectors verbatim.
#[derive(Debug, Clone, Default)]
pub struct WorkContext {
    pub active_file: Option<String>,
    pub git_branch: Option<String>,
    pub open_ticket_ids: Vec<String>,
}

#[derive(Debug, Clone, Default)]
pub struct DateRange {
    pub from: Option<i64>,
    pub to: Option<i64>,
}

#[derive(Debug, Clone, Default)]
pub struct SearchFilters {
    pub source_types: Vec<String>,
    pub date_range: Option<DateRange>,
    pub work_context: Option<WorkContext>,
}

#[derive(Debug, Clone)]
pub struct SearchRequest {
    pub query: String,
    pub top_k: usize,
    pub offset: usize,
    pub filters: SearchFilters,
}

impl Default for SearchRequest {
    fn default() -> Self {
        Self {
            query: String::new(),
            top_k: 20,
            offset: 0,
            filters: SearchFilters::default(),
        }
    }
}

#[derive(Debug, Clone)]
pub struct SearchResultItem {
    pub id: String,
    pub content: String,
    pub score: f32,
    pub source_type: String,
    pub metadata: Metadata,
}

#[derive(Debug, Clone)]
pub struct SearchResponse {
    pub results: Vec<SearchResultItem>,
    pub total_count: usize,
    pub query_time_ms: u64,
    pub offset: usize,
    pub limit: usize,
    pub has_more: bool,
    pub relationships: BTreeMap<String, Vec<String>>,
    pub attribution: BTreeMap<String, Vec<String>>,
    pub errors: BTreeMap<String, String>,
}
