//! Per-session ingest bookkeeping.
//!
//! A session is identified by its log file's stem. Once recorded, a session
//! is never reprocessed: there is no content hash or mtime comparison, so
//! lines appended to an already-indexed log are not picked up.

use anyhow::Result;
use std::path::Path;

use crate::store::Store;

/// Session id for a log file: the file name without its extension.
pub fn session_id_from_path(path: &Path) -> Option<String> {
    path.file_stem()
        .and_then(|s| s.to_str())
        .filter(|s| !s.is_empty())
        .map(str::to_string)
}

/// Decides which sessions still need indexing, backed by a [`Store`].
pub struct IngestTracker<'a> {
    store: &'a dyn Store,
}

impl<'a> IngestTracker<'a> {
    pub fn new(store: &'a dyn Store) -> Self {
        Self { store }
    }

    pub async fn needs_processing(&self, session_id: &str) -> Result<bool> {
        Ok(!self.store.is_session_processed(session_id).await?)
    }

    /// Record a session as indexed. Call only after all its chunks are persisted.
    pub async fn mark_processed(
        &self,
        session_id: &str,
        project: &str,
        chunk_count: usize,
    ) -> Result<()> {
        self.store
            .mark_session_processed(session_id, project, chunk_count)
            .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::memory::InMemoryStore;
    use std::path::PathBuf;

    #[test]
    fn test_session_id_from_path() {
        let p = PathBuf::from("/logs/-home-me-proj/0b6c1a2e-77f1.jsonl");
        assert_eq!(session_id_from_path(&p).as_deref(), Some("0b6c1a2e-77f1"));
        assert_eq!(session_id_from_path(Path::new("/")), None);
    }

    #[tokio::test]
    async fn test_marked_session_is_not_reprocessed() {
        let store = InMemoryStore::new();
        let tracker = IngestTracker::new(&store);
        assert!(tracker.needs_processing("abc").await.unwrap());
        tracker.mark_processed("abc", "proj", 2).await.unwrap();
        assert!(!tracker.needs_processing("abc").await.unwrap());
        assert!(tracker.needs_processing("def").await.unwrap());
    }
}
