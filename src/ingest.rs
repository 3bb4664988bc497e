//! Ingestion pipeline orchestration.
//!
//! Coordinates the indexing flow for every session log under the sources
//! root: record filtering → chunking → passage embedding → storage →
//! ingest-state bookkeeping. A session is marked only after all of its
//! chunks are stored, so an interrupted run retries the file cleanly.

use anyhow::{bail, Context, Result};
use globset::{GlobBuilder, GlobSet, GlobSetBuilder};
use serde::Serialize;
use std::path::{Path, PathBuf};
use walkdir::WalkDir;

use crate::chunk::{chunk_messages, ChunkingParams};
use crate::config::{Config, SourcesConfig};
use crate::db;
use crate::embedding::Embedder;
use crate::models::{Chunk, EmbeddedChunk};
use crate::progress::{IngestProgress, IngestProgressEvent, ProgressMode};
use crate::records::parse_session;
use crate::sqlite_store::SqliteStore;
use crate::store::Store;
use crate::tracker::{session_id_from_path, IngestTracker};

/// One discovered session log.
#[derive(Debug, Clone)]
pub struct SourceFile {
    pub path: PathBuf,
    pub session_id: String,
    /// Name of the directory holding the log.
    pub project: String,
}

/// A file that could not be indexed in this run.
#[derive(Debug, Clone, Serialize)]
pub struct FileFailure {
    pub path: String,
    pub error: String,
}

/// Outcome of one [`ingest_all`] run.
#[derive(Debug, Clone, Default, Serialize)]
pub struct IngestReport {
    /// Files indexed and marked in this run.
    #[serde(rename = "newly_indexed_count")]
    pub newly_indexed: usize,
    pub new_chunks: usize,
    /// Files already recorded as indexed.
    pub already_indexed: usize,
    /// Files that produced no chunks; left unmarked.
    pub skipped_files: usize,
    pub failed_files: usize,
    pub total_chunks: i64,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub failures: Vec<FileFailure>,
}

enum FileOutcome {
    Indexed(usize),
    Empty,
}

/// Find session logs under `sources.root`, sorted by path.
///
/// A missing root yields no files.
pub fn discover_sessions(sources: &SourcesConfig) -> Result<Vec<SourceFile>> {
    let root = &sources.root;
    if !root.exists() {
        tracing::warn!(root = %root.display(), "sources root does not exist");
        return Ok(Vec::new());
    }
    if !root.is_dir() {
        bail!("Sources root is not a directory: {}", root.display());
    }

    let include_set = build_globset(&sources.include_globs)?;
    let exclude_set = build_globset(&sources.exclude_globs)?;

    let mut files = Vec::new();
    for entry in WalkDir::new(root).follow_links(sources.follow_symlinks) {
        let entry = match entry {
            Ok(e) => e,
            Err(e) => {
                tracing::warn!(error = %e, "skipping unreadable directory entry");
                continue;
            }
        };
        if !entry.file_type().is_file() {
            continue;
        }

        let path = entry.path();
        let relative = path.strip_prefix(root).unwrap_or(path);
        let rel_str = relative.to_string_lossy().to_string();
        if exclude_set.is_match(&rel_str) || !include_set.is_match(&rel_str) {
            continue;
        }

        let Some(session_id) = session_id_from_path(path) else {
            continue;
        };
        files.push(SourceFile {
            path: path.to_path_buf(),
            session_id,
            project: project_of(path),
        });
    }

    files.sort_by(|a, b| a.path.cmp(&b.path));
    Ok(files)
}

fn project_of(path: &Path) -> String {
    path.parent()
        .and_then(|p| p.file_name())
        .map(|n| n.to_string_lossy().to_string())
        .unwrap_or_else(|| "unknown".to_string())
}

/// `*` stays within one path component, so `*/*.jsonl` only matches logs
/// directly inside a project directory.
fn build_globset(patterns: &[String]) -> Result<GlobSet> {
    let mut builder = GlobSetBuilder::new();
    for pattern in patterns {
        builder.add(GlobBuilder::new(pattern).literal_separator(true).build()?);
    }
    Ok(builder.build()?)
}

/// Read a log and turn it into chunks.
fn chunk_file(file: &SourceFile, params: &ChunkingParams) -> Result<Vec<Chunk>> {
    let bytes = std::fs::read(&file.path)
        .with_context(|| format!("Failed to read {}", file.path.display()))?;
    let content = String::from_utf8_lossy(&bytes);
    let parsed = parse_session(&content);
    if parsed.messages.is_empty() && parsed.malformed_lines > 0 && parsed.dropped_records == 0 {
        bail!(
            "no parseable records ({} malformed lines)",
            parsed.malformed_lines
        );
    }
    if parsed.malformed_lines > 0 {
        tracing::debug!(
            session = %file.session_id,
            malformed = parsed.malformed_lines,
            "skipped malformed lines"
        );
    }
    Ok(chunk_messages(
        &file.session_id,
        &file.project,
        &parsed.messages,
        params,
    ))
}

/// Index every session log that has not been indexed yet.
///
/// Unreadable or wholly malformed files and embedding failures are recorded
/// in the report and leave the file unmarked. Store errors abort the run.
pub async fn ingest_all(
    store: &dyn Store,
    embedder: &Embedder,
    config: &Config,
    progress: &dyn IngestProgress,
) -> Result<IngestReport> {
    let tracker = IngestTracker::new(store);
    let params = ChunkingParams::from(&config.chunking);
    let mut report = IngestReport::default();

    progress.report(IngestProgressEvent::Discovering {
        root: config.sources.root.display().to_string(),
    });
    let files = discover_sessions(&config.sources)?;
    let total = files.len() as u64;

    for (i, file) in files.iter().enumerate() {
        progress.report(IngestProgressEvent::Indexing {
            session_id: file.session_id.clone(),
            n: i as u64 + 1,
            total,
        });

        if !tracker.needs_processing(&file.session_id).await? {
            report.already_indexed += 1;
            continue;
        }

        match index_file(store, &tracker, embedder, file, &params).await {
            Ok(FileOutcome::Indexed(n)) => {
                report.newly_indexed += 1;
                report.new_chunks += n;
            }
            Ok(FileOutcome::Empty) => report.skipped_files += 1,
            Err(FileError::Fatal(e)) => return Err(e),
            Err(FileError::Skip(e)) => {
                tracing::warn!(path = %file.path.display(), error = %e, "failed to index session");
                report.failed_files += 1;
                report.failures.push(FileFailure {
                    path: file.path.display().to_string(),
                    error: e.to_string(),
                });
            }
        }
    }

    report.total_chunks = store.count_chunks().await?;
    tracing::info!(
        newly_indexed = report.newly_indexed,
        new_chunks = report.new_chunks,
        failed = report.failed_files,
        "ingest finished"
    );
    Ok(report)
}

enum FileError {
    /// This file is skipped; the run continues.
    Skip(anyhow::Error),
    /// The store failed; the run stops.
    Fatal(anyhow::Error),
}

async fn index_file(
    store: &dyn Store,
    tracker: &IngestTracker<'_>,
    embedder: &Embedder,
    file: &SourceFile,
    params: &ChunkingParams,
) -> std::result::Result<FileOutcome, FileError> {
    let chunks = chunk_file(file, params).map_err(FileError::Skip)?;
    if chunks.is_empty() {
        tracing::debug!(session = %file.session_id, "no conversational content");
        return Ok(FileOutcome::Empty);
    }

    let texts: Vec<String> = chunks.iter().map(|c| c.text.clone()).collect();
    let vectors = embedder
        .embed_for_storage(&texts)
        .await
        .map_err(FileError::Skip)?;

    let model = embedder.model_name().to_string();
    let embedded: Vec<EmbeddedChunk> = chunks
        .into_iter()
        .zip(vectors)
        .map(|(chunk, vector)| EmbeddedChunk {
            chunk,
            vector,
            model: model.clone(),
        })
        .collect();
    let count = embedded.len();

    store
        .upsert_chunks(&embedded)
        .await
        .map_err(FileError::Fatal)?;
    tracker
        .mark_processed(&file.session_id, &file.project, count)
        .await
        .map_err(FileError::Fatal)?;

    Ok(FileOutcome::Indexed(count))
}

/// `recall ingest`: index new sessions into the configured database.
pub async fn run_ingest(config: &Config, dry_run: bool, mode: ProgressMode) -> Result<()> {
    let pool = db::connect(config).await?;
    let store = SqliteStore::new(pool.clone());

    if dry_run {
        let tracker = IngestTracker::new(&store);
        let params = ChunkingParams::from(&config.chunking);
        let files = discover_sessions(&config.sources)?;
        let mut pending = 0usize;
        let mut estimated_chunks = 0usize;
        for file in &files {
            if tracker.needs_processing(&file.session_id).await? {
                pending += 1;
                estimated_chunks += chunk_file(file, &params).map(|c| c.len()).unwrap_or(0);
            }
        }
        println!("ingest (dry-run)");
        println!("  session files found: {}", files.len());
        println!("  not yet indexed: {}", pending);
        println!("  estimated chunks: {}", estimated_chunks);
        pool.close().await;
        return Ok(());
    }

    let embedder = Embedder::from_config(&config.embedding)?;
    let reporter = mode.reporter();
    let report = ingest_all(&store, &embedder, config, reporter.as_ref()).await?;

    println!("ingest");
    println!("  newly indexed sessions: {}", report.newly_indexed);
    println!("  new chunks: {}", report.new_chunks);
    println!("  already indexed: {}", report.already_indexed);
    println!("  skipped (no content): {}", report.skipped_files);
    println!("  failed: {}", report.failed_files);
    for failure in &report.failures {
        println!("    {}: {}", failure.path, failure.error);
    }
    println!("  total chunks: {}", report.total_chunks);
    println!("ok");

    pool.close().await;
    Ok(())
}
