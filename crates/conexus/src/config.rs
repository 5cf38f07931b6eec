//! Configuration loading via TOML + serde: sections for the database,
//! retrieval tuning, HNSW tuning, and federation tuning, loaded from disk
//! and then range-validated.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use conexus_core::error::{Error, Result};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DbConfig {
    /// `:memory:` selects an in-memory database, pinned to a single pool
    /// connection since separate connections would each see an empty
    /// database.
    #[serde(default = "default_db_path")]
    pub path: PathBuf,
}

fn default_db_path() -> PathBuf {
    PathBuf::from("conexus.db")
}

impl Default for DbConfig {
    fn default() -> Self {
        Self {
            path: default_db_path(),
        }
    }
}

impl DbConfig {
    pub fn is_in_memory(&self) -> bool {
        self.path.as_os_str() == ":memory:"
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RetrievalConfig {
    #[serde(default = "default_hybrid_alpha")]
    pub hybrid_alpha: f32,
    #[serde(default = "default_rrf_k")]
    pub rrf_k: f32,
    #[serde(default = "default_candidate_limit")]
    pub candidate_k_bm25: usize,
    #[serde(default = "default_candidate_limit")]
    pub candidate_k_vector: usize,
    #[serde(default = "default_final_limit")]
    pub final_limit: usize,
    #[serde(default)]
    pub rerank: bool,
}

fn default_hybrid_alpha() -> f32 {
    0.5
}
fn default_rrf_k() -> f32 {
    60.0
}
fn default_candidate_limit() -> usize {
    80
}
fn default_final_limit() -> usize {
    10
}

impl Default for RetrievalConfig {
    fn default() -> Self {
        Self {
            hybrid_alpha: default_hybrid_alpha(),
            rrf_k: default_rrf_k(),
            candidate_k_bm25: default_candidate_limit(),
            candidate_k_vector: default_candidate_limit(),
            final_limit: default_final_limit(),
            rerank: false,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HnswConfig {
    #[serde(default = "default_m")]
    pub m: usize,
    #[serde(default = "default_m_max")]
    pub m_max: usize,
    #[serde(default = "default_m_max0")]
    pub m_max0: usize,
    #[serde(default = "default_ef_construction")]
    pub ef_construction: usize,
    #[serde(default = "default_ef_search")]
    pub ef_search: usize,
    #[serde(default = "default_max_level")]
    pub max_level: usize,
}

fn default_m() -> usize {
    16
}
fn default_m_max() -> usize {
    32
}
fn default_m_max0() -> usize {
    64
}
fn default_ef_construction() -> usize {
    200
}
fn default_ef_search() -> usize {
    32
}
fn default_max_level() -> usize {
    16
}

impl Default for HnswConfig {
    fn default() -> Self {
        Self {
            m: default_m(),
            m_max: default_m_max(),
            m_max0: default_m_max0(),
            ef_construction: default_ef_construction(),
            ef_search: default_ef_search(),
            max_level: default_max_level(),
        }
    }
}

impl From<&HnswConfig> for conexus_core::hnsw::HnswParams {
    fn from(c: &HnswConfig) -> Self {
        conexus_core::hnsw::HnswParams {
            m: c.m,
            m_max: c.m_max,
            m_max0: c.m_max0,
            ef_construction: c.ef_construction,
            ef_search: c.ef_search,
            max_level: c.max_level,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FederationConfig {
    #[serde(default = "default_deadline_ms")]
    pub deadline_ms: u64,
    #[serde(default = "default_top_k")]
    pub default_top_k: usize,
    #[serde(default = "default_max_top_k")]
    pub max_top_k: usize,
}

fn default_deadline_ms() -> u64 {
    10_000
}
fn default_top_k() -> usize {
    20
}
fn default_max_top_k() -> usize {
    100
}

impl Default for FederationConfig {
    fn default() -> Self {
        Self {
            deadline_ms: default_deadline_ms(),
            default_top_k: default_top_k(),
            max_top_k: default_max_top_k(),
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub db: DbConfig,
    #[serde(default)]
    pub retrieval: RetrievalConfig,
    #[serde(default)]
    pub hnsw: HnswConfig,
    #[serde(default)]
    pub federation: FederationConfig,
}

/// Reads `path`, parses it as TOML, then validates range constraints,
/// rather than folding validation into `serde`'s deserialization.
pub fn load_config(path: &Path) -> Result<Config> {
    let raw = std::fs::read_to_string(path)
        .map_err(|e| Error::io_with_source(format!("reading config file {}", path.display()), e))?;
    let config: Config = toml::from_str(&raw)
        .map_err(|e| Error::io_with_source("parsing config TOML", e))?;
    validate(&config)?;
    Ok(config)
}

fn validate(config: &Config) -> Result<()> {
    if !(0.0..=1.0).contains(&config.retrieval.hybrid_alpha) {
        return Err(Error::validation("retrieval.hybrid_alpha must be in [0, 1]"));
    }
    if config.retrieval.final_limit == 0 {
        return Err(Error::validation("retrieval.final_limit must be >= 1"));
    }
    if config.hnsw.m < 2 {
        return Err(Error::validation("hnsw.m must be >= 2"));
    }
    if config.federation.default_top_k == 0 || config.federation.default_top_k > config.federation.max_top_k
    {
        return Err(Error::validation(
            "federation.default_top_k must be in [1, max_top_k]",
        ));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_validates() {
        assert!(validate(&Config::default()).is_ok());
    }

    #[test]
    fn out_of_range_alpha_is_rejected() {
        let mut config = Config::default();
        config.retrieval.hybrid_alpha = 1.5;
        assert!(validate(&config).is_err());
    }

    #[test]
    fn zero_final_limit_is_rejected() {
        let mut config = Config::default();
        config.retrieval.final_limit = 0;
        assert!(validate(&config).is_err());
    }

    #[test]
    fn in_memory_path_is_detected() {
        let config = DbConfig {
            path: PathBuf::from(":memory:"),
        };
        assert!(config.is_in_memory());
    }
}
