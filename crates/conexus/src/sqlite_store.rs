//! SQLite-backed implementation of [`conexus_core::store::Store`].
//! Vectors and metadata are stored as JSON text, parsed on read; metadata
//! filters are pushed down via `json_extract`, using upsert-with-ON-CONFLICT
//! and trigger-based FTS sync rather than manual companion writes.

use std::collections::BTreeMap;

use async_trait::async_trait;
use sqlx::sqlite::SqlitePool;
use sqlx::Row;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use conexus_core::error::{Error, Result};
use conexus_core::models::{
    Document, Metadata, MetadataValue, SearchMethod, SearchOptions, SearchResult,
};
use conexus_core::store::{Store, StoreStats};
use conexus_core::vector::{cosine_similarity, cosine_similarity_with_magnitude, magnitude};

pub struct SqliteStore {
    pool: SqlitePool,
}

impl SqliteStore {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    fn check_cancelled(cancel: &CancellationToken) -> Result<()> {
        if cancel.is_cancelled() {
            return Err(Error::Cancelled);
        }
        Ok(())
    }

    fn metadata_filter_clause(filters: &BTreeMap<String, MetadataValue>) -> (String, Vec<String>) {
        let mut clauses = Vec::new();
        let mut binds = Vec::new();
        for (key, value) in filters {
            clauses.push(format!("CAST(json_extract(metadata, '$.{key}') AS TEXT) = ?"));
            binds.push(match value {
                MetadataValue::String(s) => s.clone(),
                other => serde_json::Value::from(other.clone()).to_string(),
            });
        }
        if clauses.is_empty() {
            (String::new(), binds)
        } else {
            (format!(" AND {}", clauses.join(" AND ")), binds)
        }
    }

    fn row_to_document(row: &sqlx::sqlite::SqliteRow) -> Result<Document> {
        let vector_json: String = row.try_get("vector").map_err(sqlx_err)?;
        let metadata_json: String = row.try_get("metadata").map_err(sqlx_err)?;
        let vector: Vec<f32> = serde_json::from_str(&vector_json)?;
        let metadata = parse_metadata(&metadata_json)?;
        Ok(Document {
            id: row.try_get("id").map_err(sqlx_err)?,
            content: row.try_get("content").map_err(sqlx_err)?,
            vector,
            metadata,
            created_at: row.try_get("created_at").map_err(sqlx_err)?,
            updated_at: row.try_get("updated_at").map_err(sqlx_err)?,
        })
    }
}

fn sqlx_err(e: sqlx::Error) -> Error {
    Error::io_with_source("sqlite query failed", e)
}

fn parse_metadata(json: &str) -> Result<Metadata> {
    let value: serde_json::Value = serde_json::from_str(json)?;
    let object = value.as_object().cloned().unwrap_or_default();
    Ok(object
        .into_iter()
        .map(|(k, v)| (k, MetadataValue::from(v)))
        .collect())
}

fn serialize_metadata(metadata: &Metadata) -> Result<String> {
    let object: serde_json::Map<String, serde_json::Value> = metadata
        .iter()
        .map(|(k, v)| (k.clone(), serde_json::Value::from(v.clone())))
        .collect();
    Ok(serde_json::Value::Object(object).to_string())
}

#[async_trait]
impl Store for SqliteStore {
    async fn upsert(&self, mut doc: Document, cancel: &CancellationToken) -> Result<()> {
        Self::check_cancelled(cancel)?;
        if doc.id.trim().is_empty() {
            return Err(Error::validation("document id must not be empty"));
        }
        if doc.vector.is_empty() {
            return Err(Error::validation("document vector must not be empty"));
        }
        let now = chrono::Utc::now().timestamp();
        if doc.created_at == 0 {
            doc.created_at = now;
        }
        doc.updated_at = now;

        let vector_json = serde_json::to_string(&doc.vector)?;
        let metadata_json = serialize_metadata(&doc.metadata)?;

        debug!(id = %doc.id, "upserting document");
        sqlx::query(
            r#"
            INSERT INTO documents (id, content, vector, metadata, created_at, updated_at)
            VALUES (?, ?, ?, ?, ?, ?)
            ON CONFLICT(id) DO UPDATE SET
                content = excluded.content,
                vector = excluded.vector,
                metadata = excluded.metadata,
                updated_at = excluded.updated_at
            "#,
        )
        .bind(&doc.id)
        .bind(&doc.content)
        .bind(&vector_json)
        .bind(&metadata_json)
        .bind(doc.created_at)
        .bind(doc.updated_at)
        .execute(&self.pool)
        .await
        .map_err(sqlx_err)?;

        Ok(())
    }

    async fn upsert_batch(&self, docs: Vec<Document>, cancel: &CancellationToken) -> Result<()> {
        Self::check_cancelled(cancel)?;
        let mut tx = self.pool.begin().await.map_err(sqlx_err)?;
        let now = chrono::Utc::now().timestamp();
        for mut doc in docs {
            if doc.id.trim().is_empty() {
                return Err(Error::validation("document id must not be empty"));
            }
            if doc.vector.is_empty() {
                return Err(Error::validation("document vector must not be empty"));
            }
            if doc.created_at == 0 {
                doc.created_at = now;
            }
            doc.updated_at = now;
            let vector_json = serde_json::to_string(&doc.vector)?;
            let metadata_json = serialize_metadata(&doc.metadata)?;
            sqlx::query(
                r#"
                INSERT INTO documents (id, content, vector, metadata, created_at, updated_at)
                VALUES (?, ?, ?, ?, ?, ?)
                ON CONFLICT(id) DO UPDATE SET
                    content = excluded.content,
                    vector = excluded.vector,
                    metadata = excluded.metadata,
                    updated_at = excluded.updated_at
                "#,
            )
            .bind(&doc.id)
            .bind(&doc.content)
            .bind(&vector_json)
            .bind(&metadata_json)
            .bind(doc.created_at)
            .bind(doc.updated_at)
            .execute(&mut *tx)
            .await
            .map_err(sqlx_err)?;
        }
        tx.commit().await.map_err(sqlx_err)?;
        Ok(())
    }

    async fn delete(&self, id: &str, cancel: &CancellationToken) -> Result<()> {
        Self::check_cancelled(cancel)?;
        let result = sqlx::query("DELETE FROM documents WHERE id = ?")
            .bind(id)
            .execute(&self.pool)
            .await
            .map_err(sqlx_err)?;
        if result.rows_affected() == 0 {
            return Err(Error::not_found(id));
        }
        Ok(())
    }

    async fn get(&self, id: &str, cancel: &CancellationToken) -> Result<Document> {
        Self::check_cancelled(cancel)?;
        let row = sqlx::query("SELECT * FROM documents WHERE id = ?")
            .bind(id)
            .fetch_optional(&self.pool)
            .await
            .map_err(sqlx_err)?;
        match row {
            Some(row) => Self::row_to_document(&row),
            None => Err(Error::not_found(id)),
        }
    }

    async fn count(&self, cancel: &CancellationToken) -> Result<usize> {
        Self::check_cancelled(cancel)?;
        let row = sqlx::query("SELECT COUNT(*) as c FROM documents")
            .fetch_one(&self.pool)
            .await
            .map_err(sqlx_err)?;
        let c: i64 = row.try_get("c").map_err(sqlx_err)?;
        Ok(c as usize)
    }

    async fn stats(&self, cancel: &CancellationToken) -> Result<StoreStats> {
        Self::check_cancelled(cancel)?;
        let total = self.count(cancel).await?;

        let rows = sqlx::query(
            "SELECT json_extract(metadata, '$.language') as lang, COUNT(*) as c FROM documents GROUP BY lang",
        )
        .fetch_all(&self.pool)
        .await
        .map_err(sqlx_err)?;
        let mut chunks_per_language = BTreeMap::new();
        for row in rows {
            let lang: Option<String> = row.try_get("lang").map_err(sqlx_err)?;
            let c: i64 = row.try_get("c").map_err(sqlx_err)?;
            chunks_per_language.insert(lang.unwrap_or_else(|| "unknown".to_string()), c as usize);
        }

        let last_indexed: Option<i64> = sqlx::query("SELECT MAX(updated_at) as m FROM documents")
            .fetch_one(&self.pool)
            .await
            .map_err(sqlx_err)?
            .try_get("m")
            .map_err(sqlx_err)?;

        let page_count: i64 = sqlx::query("PRAGMA page_count")
            .fetch_one(&self.pool)
            .await
            .map_err(sqlx_err)?
            .try_get(0)
            .unwrap_or(0);
        let page_size: i64 = sqlx::query("PRAGMA page_size")
            .fetch_one(&self.pool)
            .await
            .map_err(sqlx_err)?
            .try_get(0)
            .unwrap_or(4096);

        Ok(StoreStats {
            total_documents: total,
            chunks_per_language,
            last_indexed_at: last_indexed,
            approx_size_bytes: (page_count.max(0) as u64) * (page_size.max(0) as u64),
        })
    }

    async fn list_indexed_files(&self, cancel: &CancellationToken) -> Result<Vec<String>> {
        Self::check_cancelled(cancel)?;
        let rows = sqlx::query(
            "SELECT DISTINCT json_extract(metadata, '$.file_path') as p FROM documents WHERE p IS NOT NULL",
        )
        .fetch_all(&self.pool)
        .await
        .map_err(sqlx_err)?;
        rows.into_iter()
            .map(|row| row.try_get::<String, _>("p").map_err(sqlx_err))
            .collect()
    }

    async fn get_file_chunks(&self, path: &str, cancel: &CancellationToken) -> Result<Vec<Document>> {
        Self::check_cancelled(cancel)?;
        let rows = sqlx::query(
            "SELECT * FROM documents WHERE json_extract(metadata, '$.file_path') = ? ORDER BY id",
        )
        .bind(path)
        .fetch_all(&self.pool)
        .await
        .map_err(sqlx_err)?;
        rows.iter().map(Self::row_to_document).collect()
    }

    async fn search_bm25(
        &self,
        fts_expression: &str,
        opts: &SearchOptions,
        cancel: &CancellationToken,
    ) -> Result<Vec<SearchResult>> {
        Self::check_cancelled(cancel)?;
        if fts_expression.trim().is_empty() {
            return Err(Error::validation("bm25 query must not be empty"));
        }
        let limit = if opts.limit == 0 { 10 } else { opts.limit };
        let (filter_clause, filter_binds) = Self::metadata_filter_clause(&opts.filters);

        let sql = format!(
            "SELECT d.*, bm25(documents_fts) as rank FROM documents_fts \
             JOIN documents d ON d.rowid = documents_fts.rowid \
             WHERE documents_fts MATCH ?{filter_clause} \
             ORDER BY rank ASC LIMIT ? OFFSET ?"
        );
        let mut query = sqlx::query(&sql).bind(fts_expression);
        for bind in &filter_binds {
            query = query.bind(bind);
        }
        query = query.bind(limit as i64).bind(opts.offset as i64);

        let rows = query.fetch_all(&self.pool).await.map_err(sqlx_err)?;

        let mut results = Vec::with_capacity(rows.len());
        for row in &rows {
            let doc = Self::row_to_document(row)?;
            let rank: f64 = row.try_get("rank").map_err(sqlx_err)?;
            let score = ((-rank / 10.0) as f32).clamp(0.0, 1.0);
            if opts.threshold > 0.0 && score < opts.threshold {
                continue;
            }
            results.push(SearchResult {
                id: doc.id,
                content: doc.content,
                score,
                method: SearchMethod::Bm25,
                metadata: doc.metadata,
                updated_at: doc.updated_at,
            });
        }
        Ok(results)
    }

    async fn search_vector(
        &self,
        query_vector: &[f32],
        opts: &SearchOptions,
        cancel: &CancellationToken,
    ) -> Result<Vec<SearchResult>> {
        Self::check_cancelled(cancel)?;
        if query_vector.is_empty() {
            return Err(Error::validation("query vector must not be empty"));
        }
        let query_magnitude = magnitude(query_vector);
        if query_magnitude == 0.0 {
            return Err(Error::validation("query vector must have non-zero magnitude"));
        }

        let limit = if opts.limit == 0 { 10 } else { opts.limit };
        let total = self.count(cancel).await?;

        let (filter_clause, filter_binds) = Self::metadata_filter_clause(&opts.filters);
        let scan_cap = if total > 1000 {
            Some(500.max((20 * (limit + opts.offset)).min(total)))
        } else {
            None
        };

        let sql = format!(
            "SELECT * FROM documents WHERE 1=1{filter_clause}{}",
            scan_cap
                .map(|cap| format!(" LIMIT {cap}"))
                .unwrap_or_default()
        );
        let mut query = sqlx::query(&sql);
        for bind in &filter_binds {
            query = query.bind(bind);
        }
        let rows = query.fetch_all(&self.pool).await.map_err(sqlx_err)?;

        let mut scored = Vec::with_capacity(rows.len());
        let mut checked = 0u32;
        for row in &rows {
            checked += 1;
            if checked % 64 == 0 {
                Self::check_cancelled(cancel)?;
            }
            let doc = Self::row_to_document(row)?;
            if doc.vector.len() != query_vector.len() {
                warn!(id = %doc.id, "skipping document with mismatched vector dimension");
                continue;
            }
            let similarity =
                cosine_similarity_with_magnitude(query_vector, query_magnitude, &doc.vector);
            if opts.threshold > 0.0 && similarity < opts.threshold {
                continue;
            }
            scored.push(SearchResult {
                id: doc.id,
                content: doc.content,
                score: similarity,
                method: SearchMethod::Vector,
                metadata: doc.metadata,
                updated_at: doc.updated_at,
            });
        }

        scored.sort_by(|a, b| b.score.partial_cmp(&a.score).unwrap_or(std::cmp::Ordering::Equal));
        Ok(scored.into_iter().skip(opts.offset).take(limit).collect())
    }
}

/// Brute-force cosine similarity used outside the store's own
/// `search_vector` path (e.g. by the HNSW-backed strategy in
/// `vector_search.rs` once it has fetched candidate documents).
pub fn score_document(query_vector: &[f32], document_vector: &[f32]) -> f32 {
    cosine_similarity(query_vector, document_vector)
}
