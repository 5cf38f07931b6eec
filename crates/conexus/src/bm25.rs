//! BM25 searcher: parses the query text and executes it
//! through the document store's FTS capability.

use tokio_util::sync::CancellationToken;

use conexus_core::error::Result;
use conexus_core::fts_query::parse_query;
use conexus_core::models::{SearchOptions, SearchResult};
use conexus_core::store::Store;

pub async fn search_bm25(
    store: &dyn Store,
    query: &str,
    opts: &SearchOptions,
    cancel: &CancellationToken,
) -> Result<Vec<SearchResult>> {
    let expression = parse_query(query)?;
    store.search_bm25(&expression, opts, cancel).await
}
