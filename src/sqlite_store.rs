//! SQLite-backed [`Store`] implementation.
//!
//! Chunks and their vectors share one `chunks` table; ingest state lives in
//! `ingested_sessions`. Vector search loads every stored embedding and ranks
//! by brute-force cosine similarity.

use anyhow::Result;
use async_trait::async_trait;
use sqlx::{Row, SqlitePool};

use crate::embedding::{blob_to_vec, cosine_similarity, vec_to_blob};
use crate::models::{EmbeddedChunk, SearchHit};
use crate::store::{rank, Store};

/// SQLite implementation of the [`Store`] trait.
pub struct SqliteStore {
    pool: SqlitePool,
}

impl SqliteStore {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }
}

#[async_trait]
impl Store for SqliteStore {
    async fn upsert_chunks(&self, chunks: &[EmbeddedChunk]) -> Result<()> {
        let mut tx = self.pool.begin().await?;

        for entry in chunks {
            let chunk = &entry.chunk;
            sqlx::query(
                r#"
                INSERT INTO chunks (id, session_id, project, window_start, chunk_index,
                                    timestamp, text, embedding, model, dims)
                VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
                ON CONFLICT(id) DO UPDATE SET
                    project = excluded.project,
                    window_start = excluded.window_start,
                    timestamp = excluded.timestamp,
                    text = excluded.text,
                    embedding = excluded.embedding,
                    model = excluded.model,
                    dims = excluded.dims
                "#,
            )
            .bind(&chunk.id)
            .bind(&chunk.session_id)
            .bind(&chunk.project)
            .bind(chunk.window_start)
            .bind(chunk.chunk_index)
            .bind(&chunk.timestamp)
            .bind(&chunk.text)
            .bind(vec_to_blob(&entry.vector))
            .bind(&entry.model)
            .bind(entry.vector.len() as i64)
            .execute(&mut *tx)
            .await?;
        }

        tx.commit().await?;
        Ok(())
    }

    async fn vector_search(&self, query_vec: &[f32], limit: i64) -> Result<Vec<SearchHit>> {
        if limit <= 0 {
            return Ok(Vec::new());
        }

        let rows = sqlx::query(
            "SELECT seq, session_id, project, chunk_index, timestamp, text, embedding FROM chunks",
        )
        .fetch_all(&self.pool)
        .await?;

        let scored = rows
            .iter()
            .map(|row| {
                let blob: Vec<u8> = row.get("embedding");
                let seq: i64 = row.get("seq");
                (cosine_similarity(query_vec, &blob_to_vec(&blob)), seq, row)
            })
            .collect();

        Ok(rank(scored, limit)
            .into_iter()
            .map(|(score, row)| SearchHit {
                text: row.get("text"),
                session_id: row.get("session_id"),
                project: row.get("project"),
                timestamp: row.get("timestamp"),
                chunk_index: row.get("chunk_index"),
                score: score as f64,
            })
            .collect())
    }

    async fn is_session_processed(&self, session_id: &str) -> Result<bool> {
        let found: bool =
            sqlx::query_scalar("SELECT COUNT(*) > 0 FROM ingested_sessions WHERE session_id = ?")
                .bind(session_id)
                .fetch_one(&self.pool)
                .await?;
        Ok(found)
    }

    async fn mark_session_processed(
        &self,
        session_id: &str,
        project: &str,
        chunk_count: usize,
    ) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO ingested_sessions (session_id, project, chunk_count, indexed_at)
            VALUES (?, ?, ?, ?)
            ON CONFLICT(session_id) DO UPDATE SET
                project = excluded.project,
                chunk_count = excluded.chunk_count,
                indexed_at = excluded.indexed_at
            "#,
        )
        .bind(session_id)
        .bind(project)
        .bind(chunk_count as i64)
        .bind(chrono::Utc::now().timestamp())
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn count_chunks(&self) -> Result<i64> {
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM chunks")
            .fetch_one(&self.pool)
            .await?;
        Ok(count)
    }

    async fn count_sessions(&self) -> Result<i64> {
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM ingested_sessions")
            .fetch_one(&self.pool)
            .await?;
        Ok(count)
    }
}
