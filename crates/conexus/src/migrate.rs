//! Schema initialization. A single `documents` table holds the primary
//! columns; `documents_fts` is an FTS5 virtual table kept in sync by
//! triggers rather than application-code-issued companion writes.

use sqlx::sqlite::SqlitePool;

use conexus_core::error::{Error, Result};

/// Schema init failure is fatal for the process: it is surfaced as an
/// `Io` error and the caller is expected to abort startup.
pub async fn run_migrations(pool: &SqlitePool) -> Result<()> {
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS documents (
            id TEXT PRIMARY KEY,
            content TEXT NOT NULL,
            vector TEXT NOT NULL,
            metadata TEXT NOT NULL DEFAULT '{}',
            created_at INTEGER NOT NULL,
            updated_at INTEGER NOT NULL
        )
        "#,
    )
    .execute(pool)
    .await
    .map_err(|e| Error::io_with_source("creating documents table", e))?;

    sqlx::query("CREATE INDEX IF NOT EXISTS idx_documents_updated_at ON documents(updated_at DESC)")
        .execute(pool)
        .await
        .map_err(|e| Error::io_with_source("creating updated_at index", e))?;

    let fts_exists: Option<(String,)> = sqlx::query_as(
        "SELECT name FROM sqlite_master WHERE type = 'table' AND name = 'documents_fts'",
    )
    .fetch_optional(pool)
    .await
    .map_err(|e| Error::io_with_source("checking for documents_fts", e))?;

    if fts_exists.is_none() {
        sqlx::query(
            r#"
            CREATE VIRTUAL TABLE documents_fts USING fts5(
                id UNINDEXED,
                content,
                content='documents',
                content_rowid='rowid'
            )
            "#,
        )
        .execute(pool)
        .await
        .map_err(|e| Error::io_with_source("creating documents_fts", e))?;

        sqlx::query(
            r#"
            CREATE TRIGGER documents_ai AFTER INSERT ON documents BEGIN
                INSERT INTO documents_fts(rowid, id, content) VALUES (new.rowid, new.id, new.content);
            END
            "#,
        )
        .execute(pool)
        .await
        .map_err(|e| Error::io_with_source("creating insert trigger", e))?;

        sqlx::query(
            r#"
            CREATE TRIGGER documents_ad AFTER DELETE ON documents BEGIN
                INSERT INTO documents_fts(documents_fts, rowid, id, content)
                VALUES ('delete', old.rowid, old.id, old.content);
            END
            "#,
        )
        .execute(pool)
        .await
        .map_err(|e| Error::io_with_source("creating delete trigger", e))?;

        sqlx::query(
            r#"
            CREATE TRIGGER documents_au AFTER UPDATE ON documents BEGIN
                INSERT INTO documents_fts(documents_fts, rowid, id, content)
                VALUES ('delete', old.rowid, old.id, old.content);
                INSERT INTO documents_fts(rowid, id, content) VALUES (new.rowid, new.id, new.content);
            END
            "#,
        )
        .execute(pool)
        .await
        .map_err(|e| Error::io_with_source("creating update trigger", e))?;
    }

    Ok(())
}
