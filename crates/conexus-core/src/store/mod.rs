//! The document store abstraction. This module only defines the
//! contract; the SQLite-backed implementation lives in the application
//! crate, which is the only place that can depend on `sqlx`.

use async_trait::async_trait;
use tokio_util::sync::CancellationToken;

use crate::error::Result;
use crate::models::{Document, SearchOptions, SearchResult};

/// Aggregate counters returned by [`Store::stats`].
#[derive(Debug, Clone, Default)]
pub struct StoreStats {
    pub total_documents: usize,
    pub chunks_per_language: std::collections::BTreeMap<String, usize>,
    pub last_indexed_at: Option<i64>,
    pub approx_size_bytes: u64,
}

/// Persistent CRUD plus BM25/vector/hybrid search over the document store.
/// All operations accept a [`CancellationToken`]; in-flight work aborts
/// when the token fires.
#[async_trait]
pub trait Store: Send + Sync {
    /// Inserts or replaces `doc` by id. Fails if `id` or `vector` is empty.
    /// `created_at` defaults to now on insert if unset; `updated_at` is
    /// always set to now unless the caller provides it.
    async fn upsert(&self, doc: Document, cancel: &CancellationToken) -> Result<()>;

    /// Applies every document in `docs`, atomically: either all succeed or
    /// none are applied.
    async fn upsert_batch(&self, docs: Vec<Document>, cancel: &CancellationToken) -> Result<()>;

    /// Fails with `NotFound` if `id` is absent.
    async fn delete(&self, id: &str, cancel: &CancellationToken) -> Result<()>;

    /// Returns the full document, or `NotFound`.
    async fn get(&self, id: &str, cancel: &CancellationToken) -> Result<Document>;

    async fn count(&self, cancel: &CancellationToken) -> Result<usize>;

    async fn stats(&self, cancel: &CancellationToken) -> Result<StoreStats>;

    /// Reverse lookup over metadata: every distinct `file_path` currently
    /// indexed.
    async fn list_indexed_files(&self, cancel: &CancellationToken) -> Result<Vec<String>>;

    /// Every document whose `file_path` metadata equals `path`.
    async fn get_file_chunks(
        &self,
        path: &str,
        cancel: &CancellationToken,
    ) -> Result<Vec<Document>>;

    /// BM25 lexical search, called after the query text has been parsed.
    async fn search_bm25(
        &self,
        fts_expression: &str,
        opts: &SearchOptions,
        cancel: &CancellationToken,
    ) -> Result<Vec<SearchResult>>;

    /// Brute-force vector search over every stored document (the
    /// baseline strategy consults this; the HNSW-backed strategy instead
    /// fetches candidate rows by id after consulting the graph index).
    async fn search_vector(
        &self,
        query_vector: &[f32],
        opts: &SearchOptions,
        cancel: &CancellationToken,
    ) -> Result<Vec<SearchResult>>;

    /// Total document count, used to decide whether to cap the
    /// brute-force scanned set.
    async fn approx_total(&self, cancel: &CancellationToken) -> Result<usize> {
        self.count(cancel).await
    }
}
