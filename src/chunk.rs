//! Sliding-window chunker over conversation turn pairs.
//!
//! Filtered messages are grouped into (user, assistant) [`TurnPair`]s, then a
//! window of `window_pairs` pairs slides over them with a step of
//! `step_pairs`. With the defaults (4 and 2) neighbouring chunks share two
//! pairs, so a topic that straddles a window edge is whole in at least one
//! chunk.
//!
//! Each chunk receives a deterministic id derived from its session and
//! index, so re-ingesting a session overwrites rather than duplicates.

use sha2::{Digest, Sha256};

use crate::config::ChunkingConfig;
use crate::models::{Chunk, Message, Role, TurnPair};
use crate::records::truncate_chars;

/// Window and size limits for [`chunk_messages`].
#[derive(Debug, Clone, Copy)]
pub struct ChunkingParams {
    pub window_pairs: usize,
    pub step_pairs: usize,
    pub max_chunk_chars: usize,
    pub max_turn_chars: usize,
}

impl Default for ChunkingParams {
    fn default() -> Self {
        Self::from(&ChunkingConfig::default())
    }
}

impl From<&ChunkingConfig> for ChunkingParams {
    fn from(config: &ChunkingConfig) -> Self {
        Self {
            window_pairs: config.window_pairs,
            step_pairs: config.step_pairs,
            max_chunk_chars: config.max_chunk_chars,
            max_turn_chars: config.max_turn_chars,
        }
    }
}

/// Group messages into turn pairs.
///
/// A user message takes the immediately following assistant message as its
/// reply; a user message with no reply becomes a user-only pair. Assistant
/// messages that do not follow a user message are skipped.
pub fn pair_turns(messages: &[Message]) -> Vec<TurnPair> {
    let mut pairs = Vec::new();
    let mut i = 0;

    while i < messages.len() {
        if messages[i].role != Role::User {
            i += 1;
            continue;
        }

        let user = messages[i].clone();
        let assistant = messages
            .get(i + 1)
            .filter(|next| next.role == Role::Assistant)
            .cloned();
        i += if assistant.is_some() { 2 } else { 1 };
        pairs.push(TurnPair { user, assistant });
    }

    pairs
}

/// Half-open `[start, end)` pair ranges for every window over `n` pairs.
///
/// Windows start at multiples of `step`; emission stops with the first
/// window that reaches the end, so no window is a strict suffix of its
/// predecessor.
pub fn window_bounds(n: usize, window: usize, step: usize) -> Vec<(usize, usize)> {
    let mut bounds = Vec::new();
    if n == 0 || window == 0 || step == 0 {
        return bounds;
    }

    let mut start = 0;
    loop {
        let end = (start + window).min(n);
        bounds.push((start, end));
        if end >= n {
            break;
        }
        start += step;
    }

    bounds
}

/// Render a window of pairs as `User: ...` / `Assistant: ...` lines.
///
/// Each turn is capped at `max_turn_chars`. If the result would exceed
/// `max_chunk_chars`, trailing turns are dropped so the text ends on a turn
/// boundary. A first turn longer than the cap is cut at the cap.
pub fn render_window(pairs: &[TurnPair], params: &ChunkingParams) -> String {
    let mut lines: Vec<String> = Vec::with_capacity(pairs.len() * 2);
    for pair in pairs {
        lines.push(render_turn(&pair.user, params.max_turn_chars));
        if let Some(ref assistant) = pair.assistant {
            lines.push(render_turn(assistant, params.max_turn_chars));
        }
    }

    let mut out = String::new();
    let mut out_chars = 0usize;

    for line in &lines {
        let line_chars = line.chars().count();
        let sep = if out.is_empty() { 0 } else { 1 };

        if out_chars + sep + line_chars > params.max_chunk_chars {
            if out.is_empty() {
                out.push_str(truncate_chars(line, params.max_chunk_chars));
            }
            break;
        }

        if sep == 1 {
            out.push('\n');
        }
        out.push_str(line);
        out_chars += sep + line_chars;
    }

    out
}

fn render_turn(message: &Message, max_turn_chars: usize) -> String {
    format!(
        "{}: {}",
        message.role.label(),
        truncate_chars(&message.text, max_turn_chars)
    )
}

/// Turn one session's filtered messages into chunks.
///
/// Returns an empty vector when the session has no user turns.
pub fn chunk_messages(
    session_id: &str,
    project: &str,
    messages: &[Message],
    params: &ChunkingParams,
) -> Vec<Chunk> {
    let pairs = pair_turns(messages);

    window_bounds(pairs.len(), params.window_pairs, params.step_pairs)
        .into_iter()
        .enumerate()
        .map(|(index, (start, end))| {
            let window = &pairs[start..end];
            Chunk {
                id: chunk_id(session_id, index as i64),
                session_id: session_id.to_string(),
                project: project.to_string(),
                chunk_index: index as i64,
                window_start: start as i64,
                pair_count: window.len(),
                timestamp: window[0].user.timestamp.clone(),
                text: render_window(window, params),
            }
        })
        .collect()
}

/// Deterministic chunk id: hex SHA-256 of `<session_id>:<chunk_index>`.
pub fn chunk_id(session_id: &str, chunk_index: i64) -> String {
    let mut hasher = Sha256::new();
    hasher.update(format!("{}:{}", session_id, chunk_index).as_bytes());
    format!("{:x}", hasher.finalize())
}
