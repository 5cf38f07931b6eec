//! Conexus's search core: a SQLite-backed document store with BM25 and
//! HNSW/vector search, hybrid RRF fusion, and a federation layer that fans
//! a query out to multiple connectors and merges/deduplicates/relates the
//! results.
//!
//! Pure algorithms (vector math, the HNSW graph, the FTS query parser, RRF
//! fusion, the merger, and the relationship detector) live in
//! [`conexus_core`]; this crate supplies the I/O: the SQLite `Store`
//! implementation, configuration loading, and the federation service.

pub mod bm25;
pub mod config;
pub mod db;
pub mod embedder;
pub mod federation;
pub mod hybrid;
pub mod metrics;
pub mod migrate;
pub mod sqlite_store;
pub mod vector_search;

pub use conexus_core::{error::Error, error::Result, models};
