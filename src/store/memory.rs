//! In-memory [`Store`] implementation for tests and throwaway indexes.
//!
//! Chunks live in a `Vec` (insertion order) behind `std::sync::RwLock`.
//! Vector search is brute-force cosine similarity over every stored vector.

use std::collections::HashMap;
use std::sync::{RwLock, RwLockReadGuard, RwLockWriteGuard};

use anyhow::{anyhow, Result};
use async_trait::async_trait;

use crate::embedding::cosine_similarity;
use crate::models::{EmbeddedChunk, SearchHit};

use super::{rank, Store};

struct StoredChunk {
    seq: i64,
    entry: EmbeddedChunk,
}

#[derive(Default)]
struct Inner {
    chunks: Vec<StoredChunk>,
    next_seq: i64,
    sessions: HashMap<String, usize>,
}

/// In-memory store.
#[derive(Default)]
pub struct InMemoryStore {
    inner: RwLock<Inner>,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn read(&self) -> Result<RwLockReadGuard<'_, Inner>> {
        self.inner
            .read()
            .map_err(|_| anyhow!("in-memory store lock poisoned"))
    }

    fn write(&self) -> Result<RwLockWriteGuard<'_, Inner>> {
        self.inner
            .write()
            .map_err(|_| anyhow!("in-memory store lock poisoned"))
    }
}

#[async_trait]
impl Store for InMemoryStore {
    async fn upsert_chunks(&self, chunks: &[EmbeddedChunk]) -> Result<()> {
        let mut inner = self.write()?;
        let inner = &mut *inner;
        for entry in chunks {
            let existing = inner
                .chunks
                .iter()
                .position(|c| c.entry.chunk.id == entry.chunk.id);
            match existing {
                Some(pos) => inner.chunks[pos].entry = entry.clone(),
                None => {
                    inner.next_seq += 1;
                    inner.chunks.push(StoredChunk {
                        seq: inner.next_seq,
                        entry: entry.clone(),
                    });
                }
            }
        }
        Ok(())
    }

    async fn vector_search(&self, query_vec: &[f32], limit: i64) -> Result<Vec<SearchHit>> {
        let inner = self.read()?;
        let scored = inner
            .chunks
            .iter()
            .map(|c| (cosine_similarity(query_vec, &c.entry.vector), c.seq, c))
            .collect();

        Ok(rank(scored, limit)
            .into_iter()
            .map(|(score, c)| {
                let chunk = &c.entry.chunk;
                SearchHit {
                    text: chunk.text.clone(),
                    session_id: chunk.session_id.clone(),
                    project: chunk.project.clone(),
                    timestamp: chunk.timestamp.clone(),
                    chunk_index: chunk.chunk_index,
                    score: score as f64,
                }
            })
            .collect())
    }

    async fn is_session_processed(&self, session_id: &str) -> Result<bool> {
        Ok(self.read()?.sessions.contains_key(session_id))
    }

    async fn mark_session_processed(
        &self,
        session_id: &str,
        _project: &str,
        chunk_count: usize,
    ) -> Result<()> {
        self.write()?
            .sessions
            .insert(session_id.to_string(), chunk_count);
        Ok(())
    }

    async fn count_chunks(&self) -> Result<i64> {
        Ok(self.read()?.chunks.len() as i64)
    }

    async fn count_sessions(&self) -> Result<i64> {
        Ok(self.read()?.sessions.len() as i64)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::Chunk;

    fn embedded(session: &str, index: i64, vector: Vec<f32>) -> EmbeddedChunk {
        EmbeddedChunk {
            chunk: Chunk {
                id: crate::chunk::chunk_id(session, index),
                session_id: session.to_string(),
                project: "proj".to_string(),
                chunk_index: index,
                window_start: index * 2,
                pair_count: 4,
                timestamp: None,
                text: format!("{} chunk {}", session, index),
            },
            vector,
            model: "test".to_string(),
        }
    }

    #[tokio::test]
    async fn test_upsert_replaces_by_id() {
        let store = InMemoryStore::new();
        store
            .upsert_chunks(&[embedded("s1", 0, vec![1.0, 0.0]), embedded("s1", 1, vec![0.0, 1.0])])
            .await
            .unwrap();
        store
            .upsert_chunks(&[embedded("s1", 0, vec![0.5, 0.5])])
            .await
            .unwrap();
        assert_eq!(store.count_chunks().await.unwrap(), 2);
    }

    #[tokio::test]
    async fn test_vector_search_ranking_and_ties() {
        let store = InMemoryStore::new();
        store
            .upsert_chunks(&[
                embedded("a", 0, vec![0.0, 1.0]),
                embedded("b", 0, vec![1.0, 0.0]),
                embedded("c", 0, vec![1.0, 0.0]),
            ])
            .await
            .unwrap();

        let hits = store.vector_search(&[1.0, 0.0], 2).await.unwrap();
        assert_eq!(hits.len(), 2);
        assert_eq!(hits[0].session_id, "b");
        assert_eq!(hits[1].session_id, "c");
        assert!((hits[0].score - 1.0).abs() < 1e-6);
    }

    #[tokio::test]
    async fn test_empty_store_search() {
        let store = InMemoryStore::new();
        assert!(store.vector_search(&[1.0], 5).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_session_tracking() {
        let store = InMemoryStore::new();
        assert!(!store.is_session_processed("s1").await.unwrap());
        store.mark_session_processed("s1", "proj", 3).await.unwrap();
        assert!(store.is_session_processed("s1").await.unwrap());
        assert_eq!(store.count_sessions().await.unwrap(), 1);
    }
}
