//! Core data models used throughout Session Recall.
//!
//! These types represent the messages, turn pairs, chunks, and search hits
//! that flow through the ingestion and retrieval pipeline.

use serde::Serialize;

/// Who produced a conversational message.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Role {
    User,
    Assistant,
}

impl Role {
    /// Label used when rendering a turn into chunk text.
    pub fn label(&self) -> &'static str {
        match self {
            Role::User => "User",
            Role::Assistant => "Assistant",
        }
    }
}

/// A content-bearing message that survived record filtering.
#[derive(Debug, Clone, PartialEq)]
pub struct Message {
    pub role: Role,
    pub text: String,
    pub timestamp: Option<String>,
}

/// One user message and the assistant reply that followed it, if any.
#[derive(Debug, Clone, PartialEq)]
pub struct TurnPair {
    pub user: Message,
    pub assistant: Option<Message>,
}

/// A bounded window of turn pairs rendered to text, ready for embedding.
#[derive(Debug, Clone)]
pub struct Chunk {
    /// Deterministic id: SHA-256 of `<session_id>:<chunk_index>`.
    pub id: String,
    pub session_id: String,
    pub project: String,
    /// Position of this chunk within its session.
    pub chunk_index: i64,
    /// Index of the first turn pair covered by the window.
    pub window_start: i64,
    /// Number of turn pairs covered by the window.
    pub pair_count: usize,
    /// Timestamp of the window's first user message.
    pub timestamp: Option<String>,
    pub text: String,
}

/// A chunk plus its passage-mode embedding, as handed to a [`Store`](crate::store::Store).
#[derive(Debug, Clone)]
pub struct EmbeddedChunk {
    pub chunk: Chunk,
    pub vector: Vec<f32>,
    pub model: String,
}

/// A ranked match returned by the query engine.
#[derive(Debug, Clone, Serialize)]
pub struct SearchHit {
    pub text: String,
    pub session_id: String,
    pub project: String,
    pub timestamp: Option<String>,
    pub chunk_index: i64,
    pub score: f64,
}
