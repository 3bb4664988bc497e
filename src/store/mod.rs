//! Storage abstraction for Session Recall.
//!
//! The [`Store`] trait covers everything the indexer, the ingest tracker and
//! the query engine need from persistence. The store never embeds: callers
//! hand it ready vectors, both for writing and for searching.
//!
//! Two implementations ship with the crate:
//! - [`SqliteStore`](crate::sqlite_store::SqliteStore): the persistent backend.
//! - [`memory::InMemoryStore`]: for tests and throwaway indexes.
//!
//! Implementations must be `Send + Sync` to work with async runtimes.

pub mod memory;

use anyhow::Result;
use async_trait::async_trait;

use crate::models::{EmbeddedChunk, SearchHit};

/// Abstract storage backend.
///
/// # Operations
///
/// | Method | Purpose |
/// |--------|---------|
/// | [`upsert_chunks`](Store::upsert_chunks) | Persist a file's embedded chunks in one unit |
/// | [`vector_search`](Store::vector_search) | Rank stored chunks against a query vector |
/// | [`is_session_processed`](Store::is_session_processed) | Ingest-state lookup |
/// | [`mark_session_processed`](Store::mark_session_processed) | Record a session as indexed |
/// | [`count_chunks`](Store::count_chunks) | Total stored chunks |
/// | [`count_sessions`](Store::count_sessions) | Total indexed sessions |
#[async_trait]
pub trait Store: Send + Sync {
    /// Insert chunks, replacing any stored chunk with the same id.
    ///
    /// All chunks are written or none are. A replaced chunk keeps its
    /// original insertion order.
    async fn upsert_chunks(&self, chunks: &[EmbeddedChunk]) -> Result<()>;

    /// Return up to `limit` chunks by descending cosine similarity to
    /// `query_vec`. Equal scores keep insertion order. `score` on the
    /// returned hits is the raw similarity.
    async fn vector_search(&self, query_vec: &[f32], limit: i64) -> Result<Vec<SearchHit>>;

    async fn is_session_processed(&self, session_id: &str) -> Result<bool>;

    async fn mark_session_processed(
        &self,
        session_id: &str,
        project: &str,
        chunk_count: usize,
    ) -> Result<()>;

    async fn count_chunks(&self) -> Result<i64>;

    async fn count_sessions(&self) -> Result<i64>;
}

/// Order scored candidates best-first, ties by insertion sequence, and cut to `limit`.
pub(crate) fn rank<T>(mut scored: Vec<(f32, i64, T)>, limit: i64) -> Vec<(f32, T)> {
    scored.sort_by(|a, b| {
        b.0.partial_cmp(&a.0)
            .unwrap_or(std::cmp::Ordering::Equal)
            .then(a.1.cmp(&b.1))
    });
    scored
        .into_iter()
        .take(limit.max(0) as usize)
        .map(|(score, _, item)| (score, item))
        .collect()
}
