//! Index statistics for `recall stats` and the `memory_stats` tool.

use anyhow::Result;
use serde::Serialize;
use sqlx::Row;

use crate::config::Config;
use crate::db;
use crate::sqlite_store::SqliteStore;
use crate::store::Store;

#[derive(Debug, Clone, Serialize)]
pub struct IndexStats {
    pub sessions: i64,
    pub chunks: i64,
    pub db_path: String,
}

pub async fn collect(store: &dyn Store, config: &Config) -> Result<IndexStats> {
    Ok(IndexStats {
        sessions: store.count_sessions().await?,
        chunks: store.count_chunks().await?,
        db_path: config.db.path.display().to_string(),
    })
}

struct ProjectStats {
    project: String,
    sessions: i64,
    chunks: i64,
    last_indexed: Option<i64>,
}

/// Run the stats command: query the database and print a summary.
pub async fn run_stats(config: &Config) -> Result<()> {
    let pool = db::connect(config).await?;
    let store = SqliteStore::new(pool.clone());
    let stats = collect(&store, config).await?;

    let db_size = std::fs::metadata(&config.db.path)
        .map(|m| m.len())
        .unwrap_or(0);

    println!("Session Recall: index stats");
    println!("===========================");
    println!();
    println!("  Database:  {}", stats.db_path);
    println!("  Size:      {}", format_bytes(db_size));
    println!();
    println!("  Sessions:  {}", stats.sessions);
    println!("  Chunks:    {}", stats.chunks);

    let rows = sqlx::query(
        r#"
        SELECT project,
               COUNT(*) AS sessions,
               SUM(chunk_count) AS chunks,
               MAX(indexed_at) AS last_indexed
        FROM ingested_sessions
        GROUP BY project
        ORDER BY chunks DESC
        "#,
    )
    .fetch_all(&pool)
    .await?;

    let projects: Vec<ProjectStats> = rows
        .iter()
        .map(|row| ProjectStats {
            project: row.get("project"),
            sessions: row.get("sessions"),
            chunks: row.get::<Option<i64>, _>("chunks").unwrap_or(0),
            last_indexed: row.get("last_indexed"),
        })
        .collect();

    if !projects.is_empty() {
        println!();
        println!("  By project:");
        println!(
            "  {:<40} {:>8} {:>8}   {}",
            "PROJECT", "SESSIONS", "CHUNKS", "LAST INDEXED"
        );
        println!("  {}", "-".repeat(76));
        for p in &projects {
            let when = p
                .last_indexed
                .map(format_ts_relative)
                .unwrap_or_else(|| "never".to_string());
            println!(
                "  {:<40} {:>8} {:>8}   {}",
                p.project, p.sessions, p.chunks, when
            );
        }
    }

    println!();
    pool.close().await;
    Ok(())
}

fn format_bytes(bytes: u64) -> String {
    const KB: f64 = 1024.0;
    let b = bytes as f64;
    if b < KB {
        format!("{} B", bytes)
    } else if b < KB * KB {
        format!("{:.1} KB", b / KB)
    } else if b < KB * KB * KB {
        format!("{:.1} MB", b / (KB * KB))
    } else {
        format!("{:.2} GB", b / (KB * KB * KB))
    }
}

/// "3 hours ago" style, falling back to a date after 30 days.
fn format_ts_relative(ts: i64) -> String {
    let delta = chrono::Utc::now().timestamp() - ts;
    let plural = |n: i64, unit: &str| format!("{} {}{} ago", n, unit, if n == 1 { "" } else { "s" });

    match delta {
        d if d < 0 => format_ts_date(ts),
        d if d < 60 => "just now".to_string(),
        d if d < 3600 => plural(d / 60, "min"),
        d if d < 86_400 => plural(d / 3600, "hour"),
        d if d < 86_400 * 30 => plural(d / 86_400, "day"),
        _ => format_ts_date(ts),
    }
}

fn format_ts_date(ts: i64) -> String {
    chrono::DateTime::from_timestamp(ts, 0)
        .map(|dt| dt.format("%Y-%m-%d %H:%M").to_string())
        .unwrap_or_else(|| ts.to_string())
}
