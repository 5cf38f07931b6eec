//! Pure search algorithms for Conexus: vector math, the HNSW ANN index,
//! the FTS query parser, RRF fusion math, federation merging, and
//! cross-source relationship detection.
//!
//! This crate touches no filesystem, no network, and no database. It has
//! no `tokio` runtime dependency beyond [`tokio_util::sync::CancellationToken`],
//! which works with any executor. The SQLite-backed store, the concrete
//! BM25/vector searchers, and the federation service that wire these
//! algorithms to real I/O live in the `conexus` crate.
//!
//! ```text
//!                conexus (I/O)
//!   federation/service.rs  --fan-out-->  connectors
//!           |                                |
//!        merger.rs <---- conexus-core -----> relationships.rs
//!           |                                |
//!        bm25.rs / vector_search.rs / hybrid.rs
//!           |
//!        sqlite_store.rs  ---owns--->  HnswIndex (conexus-core)
//! ```

pub mod error;
pub mod fts_query;
pub mod fusion;
pub mod hnsw;
pub mod merger;
pub mod models;
pub mod relationships;
pub mod store;
pub mod vector;

pub use error::{Error, Result};
