//! Query engine: embed a query in query mode and rank stored chunks.

use anyhow::Result;
use serde::Serialize;

use crate::config::{Config, RetrievalConfig};
use crate::db;
use crate::embedding::Embedder;
use crate::models::SearchHit;
use crate::records::truncate_chars;
use crate::sqlite_store::SqliteStore;
use crate::store::Store;

/// Longest excerpt returned per hit.
pub const MAX_RESULT_CHARS: usize = 1500;

/// Response body of the `memory_search` tool.
#[derive(Debug, Clone, Serialize)]
pub struct SearchResponse {
    pub query: String,
    pub total_indexed: i64,
    pub results: Vec<SearchHit>,
}

/// Clamp a requested result count into `[1, max_limit]`; `None` means the default.
pub fn clamp_limit(requested: Option<i64>, retrieval: &RetrievalConfig) -> i64 {
    requested
        .unwrap_or(retrieval.default_limit)
        .clamp(1, retrieval.max_limit)
}

/// Readable project name from a log directory name.
///
/// Log directories encode the working directory with `/` replaced by `-`.
/// A leading `-mnt-c-Users-<name>-` (WSL home) is dropped and the remaining
/// dashes shown as slashes.
pub fn display_project(project: &str) -> String {
    let trimmed = project
        .strip_prefix("-mnt-c-Users-")
        .and_then(|rest| rest.split_once('-').map(|(_, tail)| tail))
        .unwrap_or(project);
    trimmed.replace('-', "/")
}

fn round3(score: f64) -> f64 {
    (score * 1000.0).round() / 1000.0
}

/// Find the stored chunks most similar to `query`.
///
/// A blank query or an empty store returns no hits without touching the
/// embedding model.
pub async fn search(
    store: &dyn Store,
    embedder: &Embedder,
    query: &str,
    limit: Option<i64>,
    retrieval: &RetrievalConfig,
) -> Result<Vec<SearchHit>> {
    if query.trim().is_empty() {
        return Ok(Vec::new());
    }
    if store.count_chunks().await? == 0 {
        return Ok(Vec::new());
    }

    let k = clamp_limit(limit, retrieval);
    let query_vec = embedder.embed_for_query(query).await?;
    let hits = store.vector_search(&query_vec, k).await?;

    Ok(hits
        .into_iter()
        .map(|hit| SearchHit {
            text: truncate_chars(&hit.text, MAX_RESULT_CHARS).to_string(),
            project: display_project(&hit.project),
            score: round3(hit.score),
            ..hit
        })
        .collect())
}

/// [`search`] plus the index size, as returned by the `memory_search` tool.
pub async fn search_response(
    store: &dyn Store,
    embedder: &Embedder,
    query: &str,
    limit: Option<i64>,
    retrieval: &RetrievalConfig,
) -> Result<SearchResponse> {
    let results = search(store, embedder, query, limit, retrieval).await?;
    Ok(SearchResponse {
        query: query.to_string(),
        total_indexed: store.count_chunks().await?,
        results,
    })
}

/// `recall search`: print ranked excerpts.
pub async fn run_search(config: &Config, query: &str, limit: Option<i64>) -> Result<()> {
    if query.trim().is_empty() {
        println!("No results.");
        return Ok(());
    }

    let pool = db::connect(config).await?;
    let store = SqliteStore::new(pool.clone());
    let embedder = Embedder::from_config(&config.embedding)?;
    let hits = search(&store, &embedder, query, limit, &config.retrieval).await?;

    if hits.is_empty() {
        println!("No results.");
    }

    for (i, hit) in hits.iter().enumerate() {
        println!(
            "{}. [{:.3}] {}  session {}  #{}",
            i + 1,
            hit.score,
            hit.project,
            hit.session_id,
            hit.chunk_index
        );
        if let Some(ref ts) = hit.timestamp {
            println!("    at: {}", ts);
        }
        for line in hit.text.lines() {
            println!("    {}", line);
        }
        println!();
    }

    pool.close().await;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_clamp_limit() {
        let r = RetrievalConfig::default();
        assert_eq!(clamp_limit(None, &r), 5);
        assert_eq!(clamp_limit(Some(0), &r), 1);
        assert_eq!(clamp_limit(Some(-3), &r), 1);
        assert_eq!(clamp_limit(Some(7), &r), 7);
        assert_eq!(clamp_limit(Some(100), &r), 20);
    }

    #[test]
    fn test_display_project() {
        assert_eq!(display_project("-mnt-c-Users-alice-dev-app"), "dev/app");
        assert_eq!(display_project("-home-bob-src"), "/home/bob/src");
        assert_eq!(display_project("plain"), "plain");
    }

    #[test]
    fn test_round3() {
        assert_eq!(round3(0.123456), 0.123);
        assert_eq!(round3(0.9996), 1.0);
    }
}
