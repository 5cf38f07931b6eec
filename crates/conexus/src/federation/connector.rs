//! External collaborator contracts for federation: `SearchableConnector` is
//! the interface every connector implements on the federation side;
//! `ConnectorManager` discovers which connectors are currently active.
//! `FilesystemConnector` is the one concrete implementation provided,
//! wrapping the hybrid searcher over the local store, so the fallback path
//! ("no active connectors means wrap the local filesystem") and the rest of
//! the federation flow are exercisable on their own.

use std::collections::BTreeMap;
use std::sync::Arc;

use async_trait::async_trait;
use tokio_util::sync::CancellationToken;

use conexus_core::error::Result;
use conexus_core::hnsw::HnswIndex;
use conexus_core::models::SearchOptions;
use conexus_core::store::Store;

use crate::hybrid::{search_hybrid, HybridOptions};
use crate::federation::{SearchRequest, SearchResultItem};

/// A connector's identity and activation state, as exposed by a
/// `ConnectorManager`.
#[derive(Debug, Clone)]
pub struct ConnectorInfo {
    pub id: String,
    pub connector_type: String,
    pub status: String,
    pub config: BTreeMap<String, String>,
}

impl ConnectorInfo {
    pub fn is_active(&self) -> bool {
        self.status == "active"
    }
}

/// Discovers connectors. A trait, not a concrete registry, so the
/// federation service stays decoupled from how connectors are configured.
pub trait ConnectorManager: Send + Sync {
    fn list(&self) -> Vec<ConnectorInfo>;

    fn list_active(&self) -> Vec<ConnectorInfo> {
        self.list().into_iter().filter(|c| c.is_active()).collect()
    }
}

/// An in-memory connector manager, the minimum needed to exercise
/// federation without a persistent connector-configuration store.
#[derive(Default)]
pub struct StaticConnectorManager {
    connectors: Vec<ConnectorInfo>,
}

impl StaticConnectorManager {
    pub fn new(connectors: Vec<ConnectorInfo>) -> Self {
        Self { connectors }
    }
}

impl ConnectorManager for StaticConnectorManager {
    fn list(&self) -> Vec<ConnectorInfo> {
        self.connectors.clone()
    }
}

/// The federation-side interface every connector implements.
#[async_trait]
pub trait SearchableConnector: Send + Sync {
    fn id(&self) -> &str;
    fn connector_type(&self) -> &str;
    async fn search(
        &self,
        request: &SearchRequest,
        cancel: &CancellationToken,
    ) -> Result<Vec<SearchResultItem>>;
}

/// Wraps the hybrid searcher over a local [`Store`], optionally consulting
/// an [`HnswIndex`]. Also used as the fallback when no connector is active.
pub struct FilesystemConnector {
    id: String,
    store: Arc<dyn Store>,
    index: Option<Arc<HnswIndex>>,
}

impl FilesystemConnector {
    pub fn new(id: impl Into<String>, store: Arc<dyn Store>, index: Option<Arc<HnswIndex>>) -> Self {
        Self {
            id: id.into(),
            store,
            index,
        }
    }
}

#[async_trait]
impl SearchableConnector for FilesystemConnector {
    fn id(&self) -> &str {
        &self.id
    }

    fn connector_type(&self) -> &str {
        "filesystem"
    }

    async fn search(
        &self,
        request: &SearchRequest,
        cancel: &CancellationToken,
    ) -> Result<Vec<SearchResultItem>> {
        let opts = HybridOptions {
            base: SearchOptions {
                limit: request.top_k,
                offset: request.offset,
                threshold: 0.0,
                filters: BTreeMap::new(),
            },
            alpha: 0.5,
            k: 60.0,
            rerank: false,
        };

        let results = search_hybrid(
            self.store.as_ref(),
            self.index.as_deref(),
            Some(&request.query),
            None,
            &opts,
            cancel,
        )
        .await?;

        Ok(results
            .into_iter()
            .map(|r| SearchResultItem {
                id: r.id,
                content: r.content,
                score: r.score,
                source_type: self.connector_type().to_string(),
                metadata: r.metadata,
            })
            .collect())
    }
}
