//! Callable tools shared by the HTTP server and the MCP bridge.
//!
//! ```text
//! ┌──────────────────────────────────────────┐
//! │              ToolRegistry                │
//! │  memory_search  memory_ingest  memory_stats
//! └──────────────┬───────────────────────────┘
//!                ▼
//!     serve http (POST /tools/{name})
//!     serve stdio (MCP tools/call)
//! ```
//!
//! Every tool receives a [`ToolContext`] holding the injected store and
//! embedder, so both transports run exactly the same code paths.

use anyhow::{bail, Result};
use async_trait::async_trait;
use serde_json::{json, Value};
use std::sync::Arc;

use crate::config::Config;
use crate::db;
use crate::embedding::Embedder;
use crate::ingest::ingest_all;
use crate::progress::NoProgress;
use crate::search::search_response;
use crate::sqlite_store::SqliteStore;
use crate::stats;
use crate::store::Store;

/// A tool that agents can discover and call.
#[async_trait]
pub trait Tool: Send + Sync {
    /// Route name (`POST /tools/{name}`) and MCP tool name.
    fn name(&self) -> &str;

    /// One-line description for agent discovery.
    fn description(&self) -> &str;

    /// JSON Schema for the parameters object.
    fn parameters_schema(&self) -> Value;

    /// Whether the tool leaves the index unchanged.
    fn read_only(&self) -> bool {
        true
    }

    /// Execute with parameters already checked by [`validate_params`].
    async fn execute(&self, params: Value, ctx: &ToolContext) -> Result<Value>;
}

/// Shared state handed to every tool invocation.
pub struct ToolContext {
    pub config: Arc<Config>,
    pub store: Arc<dyn Store>,
    pub embedder: Arc<Embedder>,
    /// Serializes ingest runs; the index has a single writer.
    ingest_lock: tokio::sync::Mutex<()>,
}

impl ToolContext {
    pub fn new(config: Arc<Config>, store: Arc<dyn Store>, embedder: Arc<Embedder>) -> Self {
        Self {
            config,
            store,
            embedder,
            ingest_lock: tokio::sync::Mutex::new(()),
        }
    }

    /// Open the configured SQLite index and embedding backend.
    pub async fn open(config: &Config) -> Result<Self> {
        let pool = db::connect(config).await?;
        let store: Arc<dyn Store> = Arc::new(SqliteStore::new(pool));
        let embedder = Arc::new(Embedder::from_config(&config.embedding)?);
        Ok(Self::new(Arc::new(config.clone()), store, embedder))
    }
}

/// `memory_search`: semantic search over indexed conversations.
pub struct MemorySearchTool;

#[async_trait]
impl Tool for MemorySearchTool {
    fn name(&self) -> &str {
        "memory_search"
    }

    fn description(&self) -> &str {
        "Search past conversations by meaning. Returns the most similar conversation excerpts with their session, project, and timestamp."
    }

    fn parameters_schema(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "query": { "type": "string", "description": "What to look for, in natural language", "default": "" },
                "limit": { "type": "integer", "description": "Max results (1-20)", "default": 5 }
            }
        })
    }

    async fn execute(&self, params: Value, ctx: &ToolContext) -> Result<Value> {
        let query = params["query"].as_str().unwrap_or("");
        // Integers past i64::MAX still clamp to the maximum.
        let limit = params["limit"]
            .as_i64()
            .or_else(|| params["limit"].as_u64().map(|_| i64::MAX));

        let response = search_response(
            ctx.store.as_ref(),
            &ctx.embedder,
            query,
            limit,
            &ctx.config.retrieval,
        )
        .await?;
        Ok(serde_json::to_value(&response)?)
    }
}

/// `memory_ingest`: index conversation logs that are not indexed yet.
pub struct MemoryIngestTool;

#[async_trait]
impl Tool for MemoryIngestTool {
    fn name(&self) -> &str {
        "memory_ingest"
    }

    fn description(&self) -> &str {
        "Index new conversation logs. Already indexed sessions are skipped."
    }

    fn read_only(&self) -> bool {
        false
    }

    fn parameters_schema(&self) -> Value {
        json!({ "type": "object", "properties": {} })
    }

    async fn execute(&self, _params: Value, ctx: &ToolContext) -> Result<Value> {
        let _guard = ctx.ingest_lock.lock().await;
        let report = ingest_all(
            ctx.store.as_ref(),
            &ctx.embedder,
            &ctx.config,
            &NoProgress,
        )
        .await?;
        Ok(serde_json::to_value(&report)?)
    }
}

/// `memory_stats`: index size.
pub struct MemoryStatsTool;

#[async_trait]
impl Tool for MemoryStatsTool {
    fn name(&self) -> &str {
        "memory_stats"
    }

    fn description(&self) -> &str {
        "Report how many sessions and chunks are indexed"
    }

    fn parameters_schema(&self) -> Value {
        json!({ "type": "object", "properties": {} })
    }

    async fn execute(&self, _params: Value, ctx: &ToolContext) -> Result<Value> {
        let stats = stats::collect(ctx.store.as_ref(), &ctx.config).await?;
        Ok(serde_json::to_value(&stats)?)
    }
}

/// Registry of callable tools.
pub struct ToolRegistry {
    tools: Vec<Box<dyn Tool>>,
}

impl ToolRegistry {
    pub fn new() -> Self {
        Self { tools: Vec::new() }
    }

    /// `memory_search`, `memory_ingest` and `memory_stats`.
    pub fn with_builtins() -> Self {
        let mut registry = Self::new();
        registry.register(Box::new(MemorySearchTool));
        registry.register(Box::new(MemoryIngestTool));
        registry.register(Box::new(MemoryStatsTool));
        registry
    }

    pub fn register(&mut self, tool: Box<dyn Tool>) {
        self.tools.push(tool);
    }

    pub fn tools(&self) -> &[Box<dyn Tool>] {
        &self.tools
    }

    pub fn find(&self, name: &str) -> Option<&dyn Tool> {
        self.tools
            .iter()
            .find(|t| t.name() == name)
            .map(|t| t.as_ref())
    }

    pub fn is_empty(&self) -> bool {
        self.tools.is_empty()
    }

    pub fn len(&self) -> usize {
        self.tools.len()
    }
}

impl Default for ToolRegistry {
    fn default() -> Self {
        Self::new()
    }
}

/// Check `params` against a tool's schema and fill in declared defaults.
///
/// Supports `required`, per-property `type` and `default`. Unknown
/// properties pass through untouched.
pub fn validate_params(schema: &Value, params: &Value) -> Result<Value> {
    let mut result = match params {
        Value::Object(map) => map.clone(),
        Value::Null => serde_json::Map::new(),
        other => bail!("parameters must be an object, got {}", json_type_name(other)),
    };

    if let Some(required) = schema.get("required").and_then(|r| r.as_array()) {
        for field in required.iter().filter_map(|v| v.as_str()) {
            if !result.contains_key(field) {
                bail!("missing required parameter: {}", field);
            }
        }
    }

    if let Some(properties) = schema.get("properties").and_then(|p| p.as_object()) {
        for (name, prop) in properties {
            match result.get(name) {
                Some(value) => {
                    let Some(expected) = prop.get("type").and_then(|t| t.as_str()) else {
                        continue;
                    };
                    let ok = match expected {
                        "string" => value.is_string(),
                        "integer" => value.is_i64() || value.is_u64(),
                        "number" => value.is_number(),
                        "boolean" => value.is_boolean(),
                        "array" => value.is_array(),
                        "object" => value.is_object(),
                        _ => true,
                    };
                    if !ok {
                        bail!(
                            "parameter '{}' must be of type '{}', got {}",
                            name,
                            expected,
                            json_type_name(value)
                        );
                    }
                }
                None => {
                    if let Some(default) = prop.get("default") {
                        result.insert(name.clone(), default.clone());
                    }
                }
            }
        }
    }

    Ok(Value::Object(result))
}

fn json_type_name(v: &Value) -> &'static str {
    match v {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}
