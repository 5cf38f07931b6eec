//! Connection setup. File-backed databases use a pooled WAL-mode
//! connection; an in-memory database must pin to a single connection so
//! every reader and writer shares the same database image, per spec
//! §4.2's concurrency rule (SQLite does not multiplex `:memory:` across
//! connections).

use std::str::FromStr;

use sqlx::sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePool, SqlitePoolOptions};

use conexus_core::error::{Error, Result};

use crate::config::Config;

pub async fn connect(config: &Config) -> Result<SqlitePool> {
    if config.db.is_in_memory() {
        let options = SqliteConnectOptions::from_str("sqlite::memory:")
            .map_err(|e| Error::io_with_source("building in-memory connect options", e))?
            .create_if_missing(true);
        return SqlitePoolOptions::new()
            .max_connections(1)
            .connect_with(options)
            .await
            .map_err(|e| Error::io_with_source("opening in-memory sqlite pool", e));
    }

    if let Some(parent) = config.db.path.parent() {
        if !parent.as_os_str().is_empty() {
            std::fs::create_dir_all(parent)
                .map_err(|e| Error::io_with_source("creating database directory", e))?;
        }
    }

    let options = SqliteConnectOptions::from_str(&format!("sqlite:{}", config.db.path.display()))
        .map_err(|e| Error::io_with_source("building connect options", e))?
        .create_if_missing(true)
        .journal_mode(SqliteJournalMode::Wal);

    SqlitePoolOptions::new()
        .max_connections(5)
        .connect_with(options)
        .await
        .map_err(|e| Error::io_with_source("opening sqlite pool", e))
}
