//! # Session Recall
//!
//! Semantic memory over accumulated AI-assistant session logs.
//!
//! Session logs (one JSONL file per session) are filtered down to user and
//! assistant turns, grouped into overlapping windows of turn pairs, embedded
//! in passage mode and stored in SQLite. Queries are embedded in query mode
//! and ranked by cosine similarity.
//!
//! ## Architecture
//!
//! ```text
//! ┌──────────────┐   ┌──────────────────────┐   ┌──────────┐
//! │ session logs │──▶│ filter → chunk →     │──▶│  SQLite   │
//! │  (*.jsonl)   │   │ embed (passage)      │   │ chunks    │
//! └──────────────┘   └──────────────────────┘   └────┬─────┘
//!                                                    │
//!                      query → embed (query) → rank ─┤
//!                                                    ▼
//!                                  ┌──────────┐  ┌──────────┐
//!                                  │   CLI    │  │ MCP/HTTP │
//!                                  │ (recall) │  │  tools   │
//!                                  └──────────┘  └──────────┘
//! ```
//!
//! ## Modules
//!
//! | Module | Purpose |
//! |--------|---------|
//! | [`config`] | TOML configuration |
//! | [`models`] | Messages, turn pairs, chunks, hits |
//! | [`records`] | Raw record filtering and tool summaries |
//! | [`chunk`] | Sliding-window chunking |
//! | [`tracker`] | Which sessions are already indexed |
//! | [`embedding`] | Embedder and provider backends |
//! | [`store`] | Storage trait and in-memory store |
//! | [`sqlite_store`] | SQLite store |
//! | [`ingest`] | Indexing pipeline |
//! | [`search`] | Query engine |
//! | [`tools`] | Tool trait and registry |
//! | [`server`] | HTTP tool server |
//! | [`mcp`] | MCP stdio bridge |

pub mod chunk;
pub mod config;
pub mod db;
pub mod embedding;
pub mod ingest;
pub mod mcp;
pub mod migrate;
pub mod models;
pub mod progress;
pub mod records;
pub mod search;
pub mod server;
pub mod sqlite_store;
pub mod stats;
pub mod store;
pub mod tools;
pub mod tracker;
