//! SQLite connection management and schema setup.
//!
//! WAL mode is enabled for all connections so retrieval queries and
//! ingestion writes can overlap. The schema is created idempotently at
//! startup; there is no separate migration tool.

use anyhow::Result;
use sqlx::sqlite::{SqliteConnectOptions, SqlitePool, SqlitePoolOptions};
use std::path::Path;
use std::str::FromStr;

/// Create a connection pool to the SQLite database at `path`.
///
/// Creates the database file and parent directories if they don't exist
/// and enables WAL journal mode.
pub async fn connect(path: &Path) -> Result<SqlitePool> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }

    let options = SqliteConnectOptions::from_str(&format!("sqlite:{}", path.display()))?
        .create_if_missing(true)
        .journal_mode(sqlx::sqlite::SqliteJournalMode::Wal);

    let pool = SqlitePoolOptions::new()
        .max_connections(5)
        .connect_with(options)
        .await?;

    Ok(pool)
}

/// In-memory pool for tests.
pub async fn connect_memory() -> Result<SqlitePool> {
    let options = SqliteConnectOptions::from_str("sqlite::memory:")?;
    let pool = SqlitePoolOptions::new()
        .max_connections(1)
        .connect_with(options)
        .await?;
    Ok(pool)
}

/// Create all tables and indexes. Safe to run on every startup.
pub async fn migrate(pool: &SqlitePool) -> Result<()> {
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS resources (
            id TEXT PRIMARY KEY,
            name TEXT NOT NULL,
            owner_id TEXT NOT NULL,
            metadata_json TEXT NOT NULL DEFAULT '{}',
            created_at TEXT NOT NULL
        )
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query("CREATE INDEX IF NOT EXISTS idx_resources_owner ON resources(owner_id)")
        .execute(pool)
        .await?;

    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS embeddings (
            id TEXT PRIMARY KEY,
            resource_id TEXT NOT NULL REFERENCES resources(id),
            content TEXT NOT NULL,
            vector BLOB NOT NULL
        )
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query("CREATE INDEX IF NOT EXISTS idx_embeddings_resource ON embeddings(resource_id)")
        .execute(pool)
        .await?;

    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS ingestions (
            id TEXT PRIMARY KEY,
            owner_id TEXT NOT NULL,
            source TEXT NOT NULL,
            documents_processed INTEGER NOT NULL,
            embeddings_created INTEGER NOT NULL,
            resource_id TEXT,
            status TEXT NOT NULL,
            error TEXT,
            completed_at TEXT NOT NULL
        )
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query("CREATE INDEX IF NOT EXISTS idx_ingestions_owner ON ingestions(owner_id)")
        .execute(pool)
        .await?;

    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS security_scans (
            id TEXT PRIMARY KEY,
            owner_id TEXT NOT NULL,
            source TEXT NOT NULL,
            severity TEXT NOT NULL,
            issues_found INTEGER NOT NULL,
            logs_analyzed INTEGER NOT NULL,
            analysis_json TEXT NOT NULL DEFAULT '{}',
            alert_sent INTEGER NOT NULL DEFAULT 0,
            status TEXT NOT NULL,
            error TEXT,
            completed_at TEXT NOT NULL
        )
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query("CREATE INDEX IF NOT EXISTS idx_scans_owner ON security_scans(owner_id)")
        .execute(pool)
        .await?;

    Ok(())
}
