//! End-to-end scenarios run against a real in-memory SQLite database.

use std::collections::BTreeMap;
use std::sync::Arc;

use tokio_util::sync::CancellationToken;

use conexus::config::Config;
use conexus::db::connect;
use conexus::hybrid::{search_hybrid, HybridOptions};
use conexus::migrate::run_migrations;
use conexus::sqlite_store::SqliteStore;
use conexus_core::models::{Document, Metadata, SearchOptions};
use conexus_core::store::Store;

async fn fresh_store() -> SqliteStore {
    let mut config = Config::default();
    config.db.path = std::path::PathBuf::from(":memory:");
    let pool = connect(&config).await.expect("connect");
    run_migrations(&pool).await.expect("migrate");
    SqliteStore::new(pool)
}

fn doc(id: &str, content: &str, vector: Vec<f32>) -> Document {
    Document {
        id: id.to_string(),
        content: content.to_string(),
        vector,
        metadata: Metadata::new(),
        created_at: 0,
        updated_at: chrono::Utc::now().timestamp(),
    }
}

#[tokio::test]
async fn pure_vector_search_ranks_nearest_first() {
    let store = fresh_store().await;
    let cancel = CancellationToken::new();
    store.upsert(doc("cat", "cat", vec![1.0, 0.0, 0.0]), &cancel).await.unwrap();
    store.upsert(doc("dog", "dog", vec![0.9, 0.1, 0.0]), &cancel).await.unwrap();
    store.upsert(doc("bird", "bird", vec![0.0, 1.0, 0.0]), &cancel).await.unwrap();

    let opts = SearchOptions { limit: 2, ..Default::default() };
    let results = store.search_vector(&[1.0, 0.0, 0.0], &opts, &cancel).await.unwrap();

    assert_eq!(results.len(), 2);
    assert_eq!(results[0].id, "cat");
    assert!(results[0].score > 0.99);
    assert_eq!(results[1].id, "dog");
    assert!(results[1].score > 0.98 && results[1].score < 1.0);
}

#[tokio::test]
async fn pure_bm25_search_matches_specific_term() {
    let store = fresh_store().await;
    let cancel = CancellationToken::new();
    store.upsert(doc("1", "Go is a programming language", vec![1.0]), &cancel).await.unwrap();
    store.upsert(doc("2", "Python is versatile", vec![1.0]), &cancel).await.unwrap();
    store
        .upsert(doc("3", "Go excels at concurrency with goroutines", vec![1.0]), &cancel)
        .await
        .unwrap();

    let results = conexus::bm25::search_bm25(&store, "goroutines", &SearchOptions::default(), &cancel)
        .await
        .unwrap();
    assert_eq!(results.len(), 1);
    assert!(results[0].content.contains("goroutines"));

    let results = conexus::bm25::search_bm25(&store, "Go", &SearchOptions::default(), &cancel)
        .await
        .unwrap();
    assert!(results.len() >= 2);
    assert!(results[0].score >= results[1].score);
}

#[tokio::test]
async fn hybrid_search_ranks_doc_present_in_both_lists_first() {
    let store = fresh_store().await;
    let cancel = CancellationToken::new();
    store
        .upsert(doc("A", "machine learning", vec![1.0, 0.0]), &cancel)
        .await
        .unwrap();
    store
        .upsert(doc("B", "machine learning", vec![0.0, 1.0]), &cancel)
        .await
        .unwrap();
    store.upsert(doc("C", "database", vec![1.0, 0.0]), &cancel).await.unwrap();

    let opts = HybridOptions {
        base: SearchOptions { limit: 10, ..Default::default() },
        alpha: 0.5,
        k: 60.0,
        rerank: false,
    };
    let results = search_hybrid(&store, None, Some("machine"), Some(&[1.0, 0.0]), &opts, &cancel)
        .await
        .unwrap();

    assert_eq!(results[0].id, "A");
    assert!(results.iter().all(|r| r.method == conexus_core::models::SearchMethod::Hybrid));
}

#[tokio::test]
async fn upsert_then_get_round_trips_modulo_timestamps() {
    let store = fresh_store().await;
    let cancel = CancellationToken::new();
    let mut metadata = Metadata::new();
    metadata.insert(
        "language".to_string(),
        conexus_core::models::MetadataValue::String("rust".to_string()),
    );
    let original = Document {
        id: "doc-1".to_string(),
        content: "fn main() {}".to_string(),
        vector: vec![0.1, 0.2, 0.3],
        metadata,
        created_at: 0,
        updated_at: 0,
    };
    store.upsert(original.clone(), &cancel).await.unwrap();
    let fetched = store.get("doc-1", &cancel).await.unwrap();

    assert_eq!(fetched.id, original.id);
    assert_eq!(fetched.content, original.content);
    assert_eq!(fetched.vector, original.vector);
    assert_eq!(fetched.metadata, original.metadata);
}

#[tokio::test]
async fn delete_removes_document_and_decrements_count() {
    let store = fresh_store().await;
    let cancel = CancellationToken::new();
    store.upsert(doc("a", "alpha", vec![1.0]), &cancel).await.unwrap();
    store.upsert(doc("b", "beta", vec![1.0]), &cancel).await.unwrap();
    assert_eq!(store.count(&cancel).await.unwrap(), 2);

    store.delete("a", &cancel).await.unwrap();
    assert_eq!(store.count(&cancel).await.unwrap(), 1);
    assert!(store.get("a", &cancel).await.is_err());

    let results = conexus::bm25::search_bm25(&store, "alpha", &SearchOptions::default(), &cancel).await.unwrap();
    assert!(results.is_empty());
}

#[tokio::test]
async fn delete_of_absent_id_is_not_found() {
    let store = fresh_store().await;
    let cancel = CancellationToken::new();
    let result = store.delete("absent", &cancel).await;
    assert!(result.is_err());
}

#[tokio::test]
async fn metadata_filter_is_pushed_down_via_json_extract() {
    let store = fresh_store().await;
    let cancel = CancellationToken::new();
    let mut rust_meta = Metadata::new();
    rust_meta.insert(
        "language".to_string(),
        conexus_core::models::MetadataValue::String("rust".to_string()),
    );
    let mut py_meta = Metadata::new();
    py_meta.insert(
        "language".to_string(),
        conexus_core::models::MetadataValue::String("python".to_string()),
    );

    store
        .upsert(
            Document { metadata: rust_meta, ..doc("rust-doc", "fn main", vec![1.0, 0.0]) },
            &cancel,
        )
        .await
        .unwrap();
    store
        .upsert(
            Document { metadata: py_meta, ..doc("py-doc", "def main", vec![1.0, 0.0]) },
            &cancel,
        )
        .await
        .unwrap();

    let mut filters = BTreeMap::new();
    filters.insert(
        "language".to_string(),
        conexus_core::models::MetadataValue::String("rust".to_string()),
    );
    let opts = SearchOptions { limit: 10, filters, ..Default::default() };
    let results = store.search_vector(&[1.0, 0.0], &opts, &cancel).await.unwrap();

    assert_eq!(results.len(), 1);
    assert_eq!(results[0].id, "rust-doc");
}

#[tokio::test]
async fn federation_dedups_identical_content_across_connectors() {
    use conexus::federation::connector::{ConnectorInfo, FilesystemConnector, StaticConnectorManager};
    use conexus::federation::service::FederationService;
    use conexus::federation::SearchRequest;
    use conexus::metrics::NoopMetricsSink;

    let store_a = Arc::new(fresh_store().await);
    let store_b = Arc::new(fresh_store().await);
    let cancel = CancellationToken::new();
    store_a.upsert(doc("a1", "same doc", vec![1.0]), &cancel).await.unwrap();
    store_b.upsert(doc("b1", "same doc", vec![1.0]), &cancel).await.unwrap();

    let connector_a: Arc<dyn conexus::federation::connector::SearchableConnector> =
        Arc::new(FilesystemConnector::new("source-a", store_a.clone(), None));
    let connector_b: Arc<dyn conexus::federation::connector::SearchableConnector> =
        Arc::new(FilesystemConnector::new("source-b", store_b.clone(), None));

    let manager = Arc::new(StaticConnectorManager::new(vec![
        ConnectorInfo {
            id: "source-a".to_string(),
            connector_type: "filesystem".to_string(),
            status: "active".to_string(),
            config: BTreeMap::new(),
        },
        ConnectorInfo {
            id: "source-b".to_string(),
            connector_type: "filesystem".to_string(),
            status: "active".to_string(),
            config: BTreeMap::new(),
        },
    ]));

    let fallback = Arc::new(FilesystemConnector::new("fallback", store_a.clone(), None));
    let service = FederationService::new(
        manager,
        vec![connector_a, connector_b],
        fallback,
        10_000,
        20,
        100,
        Arc::new(NoopMetricsSink),
    );

    let response = service
        .search(SearchRequest { query: "same".to_string(), top_k: 20, offset: 0, ..Default::default() })
        .await;

    assert_eq!(response.results.len(), 1);
    let attributed = response.attribution.values().next().unwrap();
    assert_eq!(attributed.len(), 2);
}

#[tokio::test]
async fn phrase_parsing_matches_spec_examples() {
    assert_eq!(
        conexus_core::fts_query::parse_query("\"hello world\" test").unwrap(),
        "\"hello world\" AND test"
    );
    assert_eq!(
        conexus_core::fts_query::parse_query("python or golang").unwrap(),
        "python OR golang"
    );
}
