//! Shared fixtures: a deterministic embedder and session-log builders.
#![allow(dead_code)]

use anyhow::Result;
use async_trait::async_trait;
use serde_json::json;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

use session_recall::config::Config;
use session_recall::embedding::{Embedder, EmbeddingBackend, PrefixConvention};

pub const DIMS: usize = 256;

/// Hashes lowercase word tokens into a fixed-size count vector and records
/// every input it sees.
pub struct BagOfWords {
    pub seen: Arc<Mutex<Vec<String>>>,
    pub fail: bool,
}

fn fnv1a(word: &str) -> u64 {
    let mut h: u64 = 0xcbf29ce484222325;
    for b in word.bytes() {
        h ^= b as u64;
        h = h.wrapping_mul(0x100000001b3);
    }
    h
}

pub fn bag_of_words(text: &str) -> Vec<f32> {
    let mut v = vec![0.0f32; DIMS];
    for word in text
        .split(|c: char| !c.is_alphanumeric())
        .filter(|w| w.len() > 2)
    {
        v[(fnv1a(&word.to_lowercase()) % DIMS as u64) as usize] += 1.0;
    }
    v
}

#[async_trait]
impl EmbeddingBackend for BagOfWords {
    fn model_name(&self) -> &str {
        "multilingual-e5-small"
    }

    fn dims(&self) -> usize {
        DIMS
    }

    async fn encode(&self, inputs: Vec<String>) -> Result<Vec<Vec<f32>>> {
        if self.fail {
            anyhow::bail!("embedding service unavailable");
        }
        self.seen.lock().unwrap().extend(inputs.iter().cloned());
        Ok(inputs.iter().map(|s| bag_of_words(s)).collect())
    }
}

pub fn test_embedder() -> (Embedder, Arc<Mutex<Vec<String>>>) {
    let seen = Arc::new(Mutex::new(Vec::new()));
    let backend = BagOfWords {
        seen: seen.clone(),
        fail: false,
    };
    (Embedder::new(Box::new(backend), PrefixConvention::E5, 8), seen)
}

pub fn failing_embedder() -> Embedder {
    let backend = BagOfWords {
        seen: Arc::new(Mutex::new(Vec::new())),
        fail: true,
    };
    Embedder::new(Box::new(backend), PrefixConvention::E5, 8)
}

/// Config pointing at `root/logs` and `root/data/recall.sqlite`.
pub fn test_config(root: &Path) -> Config {
    let mut config = Config::default();
    config.db.path = root.join("data").join("recall.sqlite");
    config.sources.root = root.join("logs");
    config.embedding.provider = "disabled".to_string();
    config
}

pub fn user(text: &str, ts: &str) -> String {
    json!({
        "type": "user",
        "timestamp": ts,
        "message": { "role": "user", "content": text }
    })
    .to_string()
}

pub fn assistant(text: &str, ts: &str) -> String {
    json!({
        "type": "assistant",
        "timestamp": ts,
        "message": { "role": "assistant", "content": [{ "type": "text", "text": text }] }
    })
    .to_string()
}

pub fn noise() -> Vec<String> {
    vec![
        json!({ "type": "system", "content": "session started in /work" }).to_string(),
        json!({ "type": "progress", "data": { "percent": 40 } }).to_string(),
        json!({ "type": "file-history-snapshot", "snapshot": {} }).to_string(),
        json!({ "type": "queue-operation", "operation": "enqueue" }).to_string(),
    ]
}

/// A session log built from (question, answer) pairs.
pub fn session(pairs: &[(&str, &str)]) -> String {
    let mut lines = noise();
    for (i, (q, a)) in pairs.iter().enumerate() {
        let ts = format!("2025-05-01T10:{:02}:00Z", i);
        lines.push(user(q, &ts));
        lines.push(assistant(a, &ts));
    }
    lines.join("\n") + "\n"
}

pub fn write_session(root: &Path, project: &str, session_id: &str, content: &str) -> PathBuf {
    let dir = root.join("logs").join(project);
    std::fs::create_dir_all(&dir).unwrap();
    let path = dir.join(format!("{}.jsonl", session_id));
    std::fs::write(&path, content).unwrap();
    path
}

pub fn parser_crash_session() -> String {
    session(&[
        (
            "The CI run failed again, can you look at the logs",
            "The failure is a null pointer crash in the parser when the token stream ends early.",
        ),
        (
            "How do we fix that parser crash",
            "We resolved it by checking for the end of the token stream before dereferencing the lookahead in the parser.",
        ),
        (
            "Add a regression test for the crash",
            "Added a test that feeds a truncated token stream to the parser and asserts an error instead of a crash.",
        ),
    ])
}

pub fn distractor_sessions() -> Vec<(&'static str, String)> {
    vec![
        (
            "css",
            session(&[
                ("Center the login button horizontally", "Use flexbox with justify-content center on the container."),
                ("Make the header sticky", "Set position sticky and top zero on the header element."),
            ]),
        ),
        (
            "docker",
            session(&[
                ("Shrink the docker image size", "Switch to a multi-stage build and copy only the release binary."),
                ("Pin the base image version", "Reference the image by digest instead of the latest tag."),
            ]),
        ),
        (
            "sql",
            session(&[
                ("The orders query is slow", "Add a composite index on customer id and created date."),
                ("Paginate the orders listing", "Use keyset pagination on created date and id."),
            ]),
        ),
        (
            "auth",
            session(&[
                ("Tokens expire too quickly", "Raise the access token lifetime and add refresh token rotation."),
                ("Log out on all devices", "Revoke every refresh token belonging to the account."),
            ]),
        ),
        (
            "release",
            session(&[
                ("Write the changelog for version two", "Grouped entries into features, fixes and breaking changes."),
                ("Tag the release", "Created an annotated tag and pushed it to origin."),
            ]),
        ),
        (
            "perf",
            session(&[
                ("Profile the image resize endpoint", "Most time is spent decoding; cache decoded thumbnails."),
                ("Reduce memory during uploads", "Stream the upload body to disk instead of buffering it."),
            ]),
        ),
    ]
}
