use anyhow::Result;
use sqlx::SqlitePool;

use crate::config::Config;
use crate::db;

/// `recall init`: create the database file and schema.
pub async fn run_migrations(config: &Config) -> Result<()> {
    let pool = db::connect(config).await?;
    pool.close().await;
    tracing::info!(path = %config.db.path.display(), "database initialized");
    Ok(())
}

/// Create tables and indexes. Every statement is idempotent.
pub async fn apply(pool: &SqlitePool) -> Result<()> {
    // `seq` is the insertion order used to break score ties; an upsert by id
    // keeps the original row and therefore its seq.
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS chunks (
            seq INTEGER PRIMARY KEY AUTOINCREMENT,
            id TEXT NOT NULL UNIQUE,
            session_id TEXT NOT NULL,
            project TEXT NOT NULL,
            window_start INTEGER NOT NULL,
            chunk_index INTEGER NOT NULL,
            timestamp TEXT,
            text TEXT NOT NULL,
            embedding BLOB NOT NULL,
            model TEXT NOT NULL,
            dims INTEGER NOT NULL,
            UNIQUE(session_id, chunk_index)
        )
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS ingested_sessions (
            session_id TEXT PRIMARY KEY,
            project TEXT NOT NULL,
            chunk_count INTEGER NOT NULL,
            indexed_at INTEGER NOT NULL
        )
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query("CREATE INDEX IF NOT EXISTS idx_chunks_session_id ON chunks(session_id)")
        .execute(pool)
        .await?;

    Ok(())
}
