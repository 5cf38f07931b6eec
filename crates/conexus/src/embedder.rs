//! `Embedder` is an external collaborator: the core consumes it but does
//! not define a concrete provider. Failures propagate as a hybrid-search
//! error.

use async_trait::async_trait;

use conexus_core::error::Result;

#[async_trait]
pub trait Embedder: Send + Sync {
    /// Produces a fixed-dimension float32 vector for `text`.
    async fn embed(&self, text: &str) -> Result<Vec<f32>>;

    fn dims(&self) -> usize;
}

/// A no-op embedder for tests and for federation paths that only run
/// lexical search; embedding is never reached when only a text query is
/// supplied to the hybrid searcher.
pub struct DisabledEmbedder;

#[async_trait]
impl Embedder for DisabledEmbedder {
    async fn embed(&self, _text: &str) -> Result<Vec<f32>> {
        Err(conexus_core::error::Error::validation(
            "no embedder configured: semantic search is unavailable",
        ))
    }

    fn dims(&self) -> usize {
        0
    }
}
