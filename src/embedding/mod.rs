//! Embedding capability and provider backends.
//!
//! Asymmetric embedding models encode stored passages and search queries
//! differently (e5 models expect `passage: ` / `query: ` prefixes, nomic
//! expects `search_document: ` / `search_query: `, and so on). Vectors are
//! only comparable across the two modes, so the mode is never a parameter
//! callers can forget: [`Embedder`] exposes exactly two entry points,
//! [`Embedder::embed_for_storage`] and [`Embedder::embed_for_query`], and
//! applies the model's [`PrefixConvention`] internally.
//!
//! Backends implement [`EmbeddingBackend`] and only see prepared input:
//! - **[`DisabledBackend`]**: returns errors; used when embeddings are not configured.
//! - **[`OpenAIBackend`]**: calls the OpenAI embeddings API with retry and backoff.
//! - **[`OllamaBackend`]**: calls a local Ollama instance's `/api/embed` endpoint.
//! - **`LocalBackend`**: runs models locally via fastembed (primary) or tract
//!   (musl/Intel Mac); no network calls after model download.
//!
//! Also provides vector utilities for SQLite storage:
//! - [`cosine_similarity`]: similarity between two embedding vectors
//! - [`vec_to_blob`]: encode a `Vec<f32>` as little-endian bytes
//! - [`blob_to_vec`]: decode a BLOB back into a `Vec<f32>`
//!
//! # Retry Strategy
//!
//! The OpenAI and Ollama backends use exponential backoff for transient errors:
//! - HTTP 429 (rate limited) and 5xx (server error) → retry
//! - HTTP 4xx (client error, not 429) → fail immediately
//! - Network errors → retry
//! - Backoff: 1s, 2s, 4s, 8s, 16s, 32s (capped at 2^5)

#[cfg(feature = "local-embeddings-tract")]
mod local_tract;

use anyhow::{anyhow, bail, Result};
use async_trait::async_trait;
use std::time::Duration;

use crate::config::EmbeddingConfig;

/// Default local model: multilingual, 384 dims, passage/query prefixes.
pub const DEFAULT_LOCAL_MODEL: &str = "multilingual-e5-small";

const BGE_QUERY_INSTRUCTION: &str = "Represent this sentence for searching relevant passages: ";

/// Which side of an asymmetric embedding an input belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EmbeddingMode {
    /// Stored chunk text.
    Passage,
    /// Search input.
    Query,
}

/// How a model family marks passage and query inputs.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PrefixConvention {
    /// `passage: ` / `query: ` (intfloat e5 family).
    E5,
    /// `search_document: ` / `search_query: ` (nomic-embed-text).
    Nomic,
    /// Query instruction only (English bge models).
    Bge,
    /// Symmetric models: no prefixes.
    Plain,
}

impl PrefixConvention {
    /// Infer the convention from a model identifier.
    pub fn for_model(model_name: &str) -> Self {
        let name = model_name.to_ascii_lowercase();
        if name.contains("e5-") || name.contains("/e5") {
            PrefixConvention::E5
        } else if name.contains("nomic-embed") {
            PrefixConvention::Nomic
        } else if name.starts_with("bge-") && name.contains("-en") {
            PrefixConvention::Bge
        } else {
            PrefixConvention::Plain
        }
    }

    pub fn prefix(&self, mode: EmbeddingMode) -> &'static str {
        match (self, mode) {
            (PrefixConvention::E5, EmbeddingMode::Passage) => "passage: ",
            (PrefixConvention::E5, EmbeddingMode::Query) => "query: ",
            (PrefixConvention::Nomic, EmbeddingMode::Passage) => "search_document: ",
            (PrefixConvention::Nomic, EmbeddingMode::Query) => "search_query: ",
            (PrefixConvention::Bge, EmbeddingMode::Passage) => "",
            (PrefixConvention::Bge, EmbeddingMode::Query) => BGE_QUERY_INSTRUCTION,
            (PrefixConvention::Plain, _) => "",
        }
    }

    fn prepare(&self, mode: EmbeddingMode, text: &str) -> String {
        format!("{}{}", self.prefix(mode), text)
    }
}

/// A raw encoder: turns prepared strings into vectors, one per input, in order.
///
/// Backends never decide the embedding mode; [`Embedder`] prepares inputs
/// before they arrive here.
#[async_trait]
pub trait EmbeddingBackend: Send + Sync {
    /// Returns the model identifier (e.g. `"multilingual-e5-small"`).
    fn model_name(&self) -> &str;
    /// Returns the embedding vector dimensionality (e.g. `384`).
    fn dims(&self) -> usize;
    /// Encode one batch of prepared inputs.
    async fn encode(&self, inputs: Vec<String>) -> Result<Vec<Vec<f32>>>;
}

/// The embedding capability used by the indexer and the query engine.
pub struct Embedder {
    backend: Box<dyn EmbeddingBackend>,
    convention: PrefixConvention,
    batch_size: usize,
}

impl Embedder {
    pub fn new(
        backend: Box<dyn EmbeddingBackend>,
        convention: PrefixConvention,
        batch_size: usize,
    ) -> Self {
        Self {
            backend,
            convention,
            batch_size: batch_size.max(1),
        }
    }

    /// Build the configured backend and pick the prefix convention from its model.
    pub fn from_config(config: &EmbeddingConfig) -> Result<Self> {
        let backend = create_backend(config)?;
        let convention = PrefixConvention::for_model(backend.model_name());
        Ok(Self::new(backend, convention, config.batch_size))
    }

    pub fn model_name(&self) -> &str {
        self.backend.model_name()
    }

    pub fn dims(&self) -> usize {
        self.backend.dims()
    }

    pub fn convention(&self) -> PrefixConvention {
        self.convention
    }

    /// Embed chunk texts for storage (passage mode).
    pub async fn embed_for_storage(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        self.encode(EmbeddingMode::Passage, texts).await
    }

    /// Embed a search query (query mode).
    pub async fn embed_for_query(&self, text: &str) -> Result<Vec<f32>> {
        self.encode(EmbeddingMode::Query, &[text.to_string()])
            .await?
            .into_iter()
            .next()
            .ok_or_else(|| anyhow!("Empty embedding response"))
    }

    async fn encode(&self, mode: EmbeddingMode, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        let mut vectors = Vec::with_capacity(texts.len());

        for batch in texts.chunks(self.batch_size) {
            let inputs: Vec<String> = batch
                .iter()
                .map(|t| self.convention.prepare(mode, t))
                .collect();
            let encoded = self.backend.encode(inputs).await?;
            if encoded.len() != batch.len() {
                bail!(
                    "Embedding backend returned {} vectors for {} inputs",
                    encoded.len(),
                    batch.len()
                );
            }
            vectors.extend(encoded);
        }

        Ok(vectors)
    }
}

// ============ Disabled Backend ============

/// A no-op backend that always returns errors.
///
/// Used when `embedding.provider = "disabled"` in the configuration.
pub struct DisabledBackend;

#[async_trait]
impl EmbeddingBackend for DisabledBackend {
    fn model_name(&self) -> &str {
        "disabled"
    }
    fn dims(&self) -> usize {
        0
    }
    async fn encode(&self, _inputs: Vec<String>) -> Result<Vec<Vec<f32>>> {
        bail!("Embedding provider is disabled")
    }
}

// ============ OpenAI Backend ============

/// Backend using the OpenAI embeddings API.
///
/// Requires the `OPENAI_API_KEY` environment variable to be set.
pub struct OpenAIBackend {
    model: String,
    dims: usize,
    api_key: String,
    max_retries: u32,
    client: reqwest::Client,
}

impl OpenAIBackend {
    /// # Errors
    ///
    /// Returns an error if `model` or `dims` is not set in config,
    /// or if `OPENAI_API_KEY` is not in the environment.
    pub fn new(config: &EmbeddingConfig) -> Result<Self> {
        let model = config
            .model
            .clone()
            .ok_or_else(|| anyhow!("embedding.model required for OpenAI provider"))?;
        let dims = config
            .dims
            .ok_or_else(|| anyhow!("embedding.dims required for OpenAI provider"))?;
        let api_key = std::env::var("OPENAI_API_KEY")
            .map_err(|_| anyhow!("OPENAI_API_KEY environment variable not set"))?;
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()?;

        Ok(Self {
            model,
            dims,
            api_key,
            max_retries: config.max_retries,
            client,
        })
    }
}

#[async_trait]
impl EmbeddingBackend for OpenAIBackend {
    fn model_name(&self) -> &str {
        &self.model
    }
    fn dims(&self) -> usize {
        self.dims
    }

    async fn encode(&self, inputs: Vec<String>) -> Result<Vec<Vec<f32>>> {
        let body = serde_json::json!({
            "model": self.model,
            "input": inputs,
        });

        let mut last_err = None;

        for attempt in 0..=self.max_retries {
            if attempt > 0 {
                tokio::time::sleep(backoff_delay(attempt)).await;
            }

            let resp = self
                .client
                .post("https://api.openai.com/v1/embeddings")
                .header("Authorization", format!("Bearer {}", self.api_key))
                .header("Content-Type", "application/json")
                .json(&body)
                .send()
                .await;

            match resp {
                Ok(response) => {
                    let status = response.status();

                    if status.is_success() {
                        let json: serde_json::Value = response.json().await?;
                        return parse_openai_response(&json);
                    }

                    let body_text = response.text().await.unwrap_or_default();
                    if status.as_u16() == 429 || status.is_server_error() {
                        tracing::debug!(%status, attempt, "openai embeddings retryable error");
                        last_err = Some(anyhow!("OpenAI API error {}: {}", status, body_text));
                        continue;
                    }

                    bail!("OpenAI API error {}: {}", status, body_text);
                }
                Err(e) => {
                    last_err = Some(e.into());
                    continue;
                }
            }
        }

        Err(last_err.unwrap_or_else(|| anyhow!("Embedding failed after retries")))
    }
}

/// Extract `data[].embedding`, ordered by each item's `index`.
fn parse_openai_response(json: &serde_json::Value) -> Result<Vec<Vec<f32>>> {
    let data = json
        .get("data")
        .and_then(|d| d.as_array())
        .ok_or_else(|| anyhow!("Invalid OpenAI response: missing data array"))?;

    let mut indexed = Vec::with_capacity(data.len());

    for (pos, item) in data.iter().enumerate() {
        let index = item
            .get("index")
            .and_then(|i| i.as_u64())
            .map(|i| i as usize)
            .unwrap_or(pos);
        let embedding = item
            .get("embedding")
            .and_then(|e| e.as_array())
            .ok_or_else(|| anyhow!("Invalid OpenAI response: missing embedding"))?;
        indexed.push((index, json_to_vec(embedding)));
    }

    indexed.sort_by_key(|(i, _)| *i);
    Ok(indexed.into_iter().map(|(_, v)| v).collect())
}

// ============ Ollama Backend ============

/// Backend using a local Ollama instance.
///
/// Calls `POST /api/embed` on the configured URL (default: `http://localhost:11434`).
pub struct OllamaBackend {
    model: String,
    dims: usize,
    url: String,
    max_retries: u32,
    client: reqwest::Client,
}

impl OllamaBackend {
    pub fn new(config: &EmbeddingConfig) -> Result<Self> {
        let model = config
            .model
            .clone()
            .ok_or_else(|| anyhow!("embedding.model required for Ollama provider"))?;
        let dims = config
            .dims
            .ok_or_else(|| anyhow!("embedding.dims required for Ollama provider"))?;
        let url = config
            .url
            .clone()
            .unwrap_or_else(|| "http://localhost:11434".to_string());
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()?;

        Ok(Self {
            model,
            dims,
            url,
            max_retries: config.max_retries,
            client,
        })
    }
}

#[async_trait]
impl EmbeddingBackend for OllamaBackend {
    fn model_name(&self) -> &str {
        &self.model
    }
    fn dims(&self) -> usize {
        self.dims
    }

    async fn encode(&self, inputs: Vec<String>) -> Result<Vec<Vec<f32>>> {
        let body = serde_json::json!({
            "model": self.model,
            "input": inputs,
        });

        let mut last_err = None;

        for attempt in 0..=self.max_retries {
            if attempt > 0 {
                tokio::time::sleep(backoff_delay(attempt)).await;
            }

            let resp = self
                .client
                .post(format!("{}/api/embed", self.url))
                .header("Content-Type", "application/json")
                .json(&body)
                .send()
                .await;

            match resp {
                Ok(response) => {
                    let status = response.status();

                    if status.is_success() {
                        let json: serde_json::Value = response.json().await?;
                        return parse_ollama_response(&json);
                    }

                    let body_text = response.text().await.unwrap_or_default();
                    if status.as_u16() == 429 || status.is_server_error() {
                        last_err = Some(anyhow!("Ollama API error {}: {}", status, body_text));
                        continue;
                    }

                    bail!("Ollama API error {}: {}", status, body_text);
                }
                Err(e) => {
                    last_err = Some(anyhow!(
                        "Ollama connection error (is Ollama running at {}?): {}",
                        self.url,
                        e
                    ));
                    continue;
                }
            }
        }

        Err(last_err.unwrap_or_else(|| anyhow!("Ollama embedding failed after retries")))
    }
}

fn parse_ollama_response(json: &serde_json::Value) -> Result<Vec<Vec<f32>>> {
    let embeddings = json
        .get("embeddings")
        .and_then(|e| e.as_array())
        .ok_or_else(|| anyhow!("Invalid Ollama response: missing embeddings array"))?;

    embeddings
        .iter()
        .map(|embedding| {
            embedding
                .as_array()
                .map(|values| json_to_vec(values))
                .ok_or_else(|| anyhow!("Invalid Ollama response: embedding is not an array"))
        })
        .collect()
}

fn json_to_vec(values: &[serde_json::Value]) -> Vec<f32> {
    values
        .iter()
        .map(|v| v.as_f64().unwrap_or(0.0) as f32)
        .collect()
}

/// Exponential backoff: 1s, 2s, 4s, ... capped at 32s.
fn backoff_delay(attempt: u32) -> Duration {
    Duration::from_secs(1 << (attempt.saturating_sub(1)).min(5))
}

// ============ Local Backend (fastembed or tract) ============

/// Backend for local inference (fastembed on primary platforms, tract on musl/Intel Mac).
///
/// Models are downloaded on first use from Hugging Face and cached. The
/// fastembed model is loaded once and reused for the life of the process.
#[cfg(any(
    feature = "local-embeddings-fastembed",
    feature = "local-embeddings-tract"
))]
pub struct LocalBackend {
    model_name: String,
    dims: usize,
    batch_size: usize,
    #[cfg(feature = "local-embeddings-fastembed")]
    model: std::sync::Arc<std::sync::Mutex<Option<fastembed::TextEmbedding>>>,
}

#[cfg(any(
    feature = "local-embeddings-fastembed",
    feature = "local-embeddings-tract"
))]
impl LocalBackend {
    pub fn new(config: &EmbeddingConfig) -> Result<Self> {
        let (model_name, dims) = resolve_local_model(config);
        #[cfg(feature = "local-embeddings-fastembed")]
        config_to_fastembed_model(&model_name)?;

        Ok(Self {
            model_name,
            dims,
            batch_size: config.batch_size,
            #[cfg(feature = "local-embeddings-fastembed")]
            model: std::sync::Arc::new(std::sync::Mutex::new(None)),
        })
    }
}

#[cfg(any(
    feature = "local-embeddings-fastembed",
    feature = "local-embeddings-tract"
))]
#[async_trait]
impl EmbeddingBackend for LocalBackend {
    fn model_name(&self) -> &str {
        &self.model_name
    }
    fn dims(&self) -> usize {
        self.dims
    }

    #[cfg(feature = "local-embeddings-fastembed")]
    async fn encode(&self, inputs: Vec<String>) -> Result<Vec<Vec<f32>>> {
        let fastembed_model = config_to_fastembed_model(&self.model_name)?;
        let batch_size = self.batch_size;
        let slot = self.model.clone();

        tokio::task::spawn_blocking(move || {
            let mut guard = slot
                .lock()
                .map_err(|_| anyhow!("Local embedding model lock poisoned"))?;

            if guard.is_none() {
                tracing::info!(model = ?fastembed_model, "loading local embedding model");
                let model = fastembed::TextEmbedding::try_new(
                    fastembed::InitOptions::new(fastembed_model).with_show_download_progress(true),
                )
                .map_err(|e| anyhow!("Failed to initialize local embedding model: {}", e))?;
                *guard = Some(model);
            }

            let model = guard
                .as_mut()
                .ok_or_else(|| anyhow!("Local embedding model not initialized"))?;
            model
                .embed(inputs, Some(batch_size))
                .map_err(|e| anyhow!("Local embedding failed: {}", e))
        })
        .await?
    }

    #[cfg(all(
        feature = "local-embeddings-tract",
        not(feature = "local-embeddings-fastembed")
    ))]
    async fn encode(&self, inputs: Vec<String>) -> Result<Vec<Vec<f32>>> {
        local_tract::embed_local_tract(&self.model_name, self.batch_size, inputs).await
    }
}

#[cfg(any(
    feature = "local-embeddings-fastembed",
    feature = "local-embeddings-tract"
))]
fn resolve_local_model(config: &EmbeddingConfig) -> (String, usize) {
    let model_name = config
        .model
        .clone()
        .unwrap_or_else(|| DEFAULT_LOCAL_MODEL.to_string());

    let dims = config.dims.unwrap_or(match model_name.as_str() {
        "all-minilm-l6-v2" => 384,
        "bge-small-en-v1.5" => 384,
        "bge-base-en-v1.5" => 768,
        "bge-large-en-v1.5" => 1024,
        "nomic-embed-text-v1" | "nomic-embed-text-v1.5" => 768,
        "multilingual-e5-small" => 384,
        "multilingual-e5-base" => 768,
        "multilingual-e5-large" => 1024,
        _ => 384,
    });

    (model_name, dims)
}

#[cfg(feature = "local-embeddings-fastembed")]
fn config_to_fastembed_model(name: &str) -> Result<fastembed::EmbeddingModel> {
    match name {
        "all-minilm-l6-v2" => Ok(fastembed::EmbeddingModel::AllMiniLML6V2),
        "bge-small-en-v1.5" => Ok(fastembed::EmbeddingModel::BGESmallENV15),
        "bge-base-en-v1.5" => Ok(fastembed::EmbeddingModel::BGEBaseENV15),
        "bge-large-en-v1.5" => Ok(fastembed::EmbeddingModel::BGELargeENV15),
        "nomic-embed-text-v1" => Ok(fastembed::EmbeddingModel::NomicEmbedTextV1),
        "nomic-embed-text-v1.5" => Ok(fastembed::EmbeddingModel::NomicEmbedTextV15),
        "multilingual-e5-small" => Ok(fastembed::EmbeddingModel::MultilingualE5Small),
        "multilingual-e5-base" => Ok(fastembed::EmbeddingModel::MultilingualE5Base),
        "multilingual-e5-large" => Ok(fastembed::EmbeddingModel::MultilingualE5Large),
        other => bail!(
            "Unknown local embedding model: '{}'. Supported models: \
             all-minilm-l6-v2, bge-small-en-v1.5, bge-base-en-v1.5, bge-large-en-v1.5, \
             nomic-embed-text-v1, nomic-embed-text-v1.5, \
             multilingual-e5-small, multilingual-e5-base, multilingual-e5-large",
            other
        ),
    }
}

/// Create the [`EmbeddingBackend`] named by `config.provider`.
///
/// | Config Value | Backend |
/// |-------------|----------|
/// | `"disabled"` | [`DisabledBackend`] |
/// | `"openai"` | [`OpenAIBackend`] |
/// | `"ollama"` | [`OllamaBackend`] |
/// | `"local"` | `LocalBackend` (fastembed or tract, see features) |
pub fn create_backend(config: &EmbeddingConfig) -> Result<Box<dyn EmbeddingBackend>> {
    match config.provider.as_str() {
        "disabled" => Ok(Box::new(DisabledBackend)),
        "openai" => Ok(Box::new(OpenAIBackend::new(config)?)),
        "ollama" => Ok(Box::new(OllamaBackend::new(config)?)),
        #[cfg(any(feature = "local-embeddings-fastembed", feature = "local-embeddings-tract"))]
        "local" => Ok(Box::new(LocalBackend::new(config)?)),
        #[cfg(not(any(feature = "local-embeddings-fastembed", feature = "local-embeddings-tract")))]
        "local" => bail!(
            "Local embedding provider requires one of: --features local-embeddings-fastembed, --features local-embeddings-tract"
        ),
        other => bail!("Unknown embedding provider: {}", other),
    }
}

/// Encode a float vector as a BLOB (little-endian f32 bytes).
///
/// # Example
///
/// ```rust
/// use session_recall::embedding::{vec_to_blob, blob_to_vec};
///
/// let v = vec![1.0f32, -2.5, 3.125];
/// let blob = vec_to_blob(&v);
/// assert_eq!(blob.len(), 12); // 3 × 4 bytes
/// assert_eq!(blob_to_vec(&blob), v);
/// ```
pub fn vec_to_blob(vec: &[f32]) -> Vec<u8> {
    let mut bytes = Vec::with_capacity(vec.len() * 4);
    for &v in vec {
        bytes.extend_from_slice(&v.to_le_bytes());
    }
    bytes
}

/// Decode a BLOB back into a float vector.
pub fn blob_to_vec(blob: &[u8]) -> Vec<f32> {
    blob.chunks_exact(4)
        .map(|chunk| f32::from_le_bytes([chunk[0], chunk[1], chunk[2], chunk[3]]))
        .collect()
}

/// Compute cosine similarity between two embedding vectors.
///
/// Returns a value in `[-1.0, 1.0]`, or `0.0` for empty vectors, vectors of
/// different lengths, and zero vectors.
///
/// ```text
///            a · b
/// cos(θ) = ─────────
///          ‖a‖ × ‖b‖
/// ```
pub fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    if a.len() != b.len() || a.is_empty() {
        return 0.0;
    }

    let mut dot = 0.0f32;
    let mut norm_a = 0.0f32;
    let mut norm_b = 0.0f32;

    for (x, y) in a.iter().zip(b.iter()) {
        dot += x * y;
        norm_a += x * x;
        norm_b += y * y;
    }

    let denom = norm_a.sqrt() * norm_b.sqrt();
    if denom < f32::EPSILON {
        return 0.0;
    }

    dot / denom
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::{Arc, Mutex};

    /// Records every prepared input and returns one-hot vectors.
    struct RecordingBackend {
        seen: Arc<Mutex<Vec<String>>>,
        calls: Arc<Mutex<usize>>,
    }

    #[async_trait]
    impl EmbeddingBackend for RecordingBackend {
        fn model_name(&self) -> &str {
            "multilingual-e5-small"
        }
        fn dims(&self) -> usize {
            2
        }
        async fn encode(&self, inputs: Vec<String>) -> Result<Vec<Vec<f32>>> {
            *self.calls.lock().unwrap() += 1;
            let out = inputs.iter().map(|_| vec![1.0, 0.0]).collect();
            self.seen.lock().unwrap().extend(inputs);
            Ok(out)
        }
    }

    fn recording_embedder(batch_size: usize) -> (Embedder, Arc<Mutex<Vec<String>>>, Arc<Mutex<usize>>) {
        let seen = Arc::new(Mutex::new(Vec::new()));
        let calls = Arc::new(Mutex::new(0));
        let backend = RecordingBackend {
            seen: seen.clone(),
            calls: calls.clone(),
        };
        let convention = PrefixConvention::for_model(backend.model_name());
        (Embedder::new(Box::new(backend), convention, batch_size), seen, calls)
    }

    #[tokio::test]
    async fn test_storage_uses_passage_prefix() {
        let (embedder, seen, _) = recording_embedder(8);
        let vectors = embedder
            .embed_for_storage(&["chunk one".to_string(), "chunk two".to_string()])
            .await
            .unwrap();
        assert_eq!(vectors.len(), 2);
        assert_eq!(
            *seen.lock().unwrap(),
            vec!["passage: chunk one".to_string(), "passage: chunk two".to_string()]
        );
    }

    #[tokio::test]
    async fn test_query_uses_query_prefix() {
        let (embedder, seen, _) = recording_embedder(8);
        embedder.embed_for_query("parser crash").await.unwrap();
        assert_eq!(*seen.lock().unwrap(), vec!["query: parser crash".to_string()]);
    }

    #[tokio::test]
    async fn test_storage_batches() {
        let (embedder, _, calls) = recording_embedder(2);
        let texts: Vec<String> = (0..5).map(|i| format!("t{}", i)).collect();
        let vectors = embedder.embed_for_storage(&texts).await.unwrap();
        assert_eq!(vectors.len(), 5);
        assert_eq!(*calls.lock().unwrap(), 3);
    }

    #[tokio::test]
    async fn test_disabled_backend_errors() {
        let embedder = Embedder::new(Box::new(DisabledBackend), PrefixConvention::Plain, 4);
        assert!(embedder.embed_for_query("anything").await.is_err());
    }

    #[test]
    fn test_prefix_conventions() {
        assert_eq!(PrefixConvention::for_model("multilingual-e5-small"), PrefixConvention::E5);
        assert_eq!(PrefixConvention::for_model("intfloat/e5-base-v2"), PrefixConvention::E5);
        assert_eq!(PrefixConvention::for_model("nomic-embed-text"), PrefixConvention::Nomic);
        assert_eq!(PrefixConvention::for_model("bge-small-en-v1.5"), PrefixConvention::Bge);
        assert_eq!(PrefixConvention::for_model("all-minilm-l6-v2"), PrefixConvention::Plain);
        assert_eq!(
            PrefixConvention::for_model("text-embedding-3-small"),
            PrefixConvention::Plain
        );
        assert_eq!(PrefixConvention::Bge.prefix(EmbeddingMode::Passage), "");
        assert_ne!(
            PrefixConvention::E5.prefix(EmbeddingMode::Passage),
            PrefixConvention::E5.prefix(EmbeddingMode::Query)
        );
    }

    #[test]
    fn test_parse_openai_response_orders_by_index() {
        let json = serde_json::json!({
            "data": [
                { "index": 1, "embedding": [0.0, 1.0] },
                { "index": 0, "embedding": [1.0, 0.0] }
            ]
        });
        let vectors = parse_openai_response(&json).unwrap();
        assert_eq!(vectors, vec![vec![1.0, 0.0], vec![0.0, 1.0]]);
    }

    #[test]
    fn test_parse_ollama_response() {
        let json = serde_json::json!({ "embeddings": [[0.5, 0.5], [1.0, 0.0]] });
        let vectors = parse_ollama_response(&json).unwrap();
        assert_eq!(vectors.len(), 2);
        assert!(parse_ollama_response(&serde_json::json!({})).is_err());
    }

    #[test]
    fn test_backoff_delay() {
        assert_eq!(backoff_delay(1), Duration::from_secs(1));
        assert_eq!(backoff_delay(3), Duration::from_secs(4));
        assert_eq!(backoff_delay(10), Duration::from_secs(32));
    }

    #[test]
    fn test_vec_blob_roundtrip() {
        let vec = vec![1.0f32, -2.5, 3.125, 0.0, -0.001];
        assert_eq!(blob_to_vec(&vec_to_blob(&vec)), vec);
    }

    #[test]
    fn test_cosine_identical() {
        let v = vec![1.0, 2.0, 3.0];
        assert!((cosine_similarity(&v, &v) - 1.0).abs() < 1e-6);
    }

    #[test]
    fn test_cosine_orthogonal() {
        let sim = cosine_similarity(&[1.0, 0.0, 0.0], &[0.0, 1.0, 0.0]);
        assert!(sim.abs() < 1e-6);
    }

    #[test]
    fn test_cosine_degenerate() {
        assert_eq!(cosine_similarity(&[], &[]), 0.0);
        assert_eq!(cosine_similarity(&[1.0, 2.0], &[1.0]), 0.0);
        assert_eq!(cosine_similarity(&[0.0, 0.0], &[1.0, 1.0]), 0.0);
    }
}
