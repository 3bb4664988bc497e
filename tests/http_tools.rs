mod common;

use std::sync::Arc;

use common::*;
use serde_json::{json, Value};
use session_recall::server::router;
use session_recall::store::memory::InMemoryStore;
use session_recall::tools::{ToolContext, ToolRegistry};
use tempfile::TempDir;

/// Serve the builtin tools over an in-memory index on an ephemeral port.
async fn spawn_server(tmp: &TempDir) -> String {
    let config = Arc::new(test_config(tmp.path()));
    let (embedder, _) = test_embedder();
    let ctx = ToolContext::new(config, Arc::new(InMemoryStore::new()), Arc::new(embedder));
    let app = router(Arc::new(ToolRegistry::with_builtins()), Arc::new(ctx));

    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });
    format!("http://{}", addr)
}

async fn call(base: &str, tool: &str, body: Value) -> (u16, Value) {
    let resp = reqwest::Client::new()
        .post(format!("{}/tools/{}", base, tool))
        .json(&body)
        .send()
        .await
        .unwrap();
    let status = resp.status().as_u16();
    (status, resp.json().await.unwrap())
}

#[tokio::test]
async fn test_ingest_then_search_over_http() {
    let tmp = TempDir::new().unwrap();
    write_session(tmp.path(), "-home-dev-compiler", "s-parser", &parser_crash_session());
    for (name, content) in distractor_sessions() {
        write_session(tmp.path(), "-home-dev-web", name, &content);
    }
    let base = spawn_server(&tmp).await;

    let (status, body) = call(&base, "memory_ingest", json!({})).await;
    assert_eq!(status, 200);
    assert_eq!(body["result"]["newly_indexed_count"], 7);
    assert_eq!(body["result"]["total_chunks"], 7);

    let (status, body) = call(&base, "memory_ingest", json!({})).await;
    assert_eq!(status, 200);
    assert_eq!(body["result"]["newly_indexed_count"], 0);

    let (status, body) = call(
        &base,
        "memory_search",
        json!({ "query": "how did we resolve the parser crash", "limit": 3 }),
    )
    .await;
    assert_eq!(status, 200);
    let result = &body["result"];
    assert_eq!(result["total_indexed"], 7);
    let results = result["results"].as_array().unwrap();
    assert_eq!(results.len(), 3);
    assert_eq!(results[0]["session_id"], "s-parser");
    assert_eq!(results[0]["project"], "/home/dev/compiler");

    let (status, body) = call(&base, "memory_stats", json!({})).await;
    assert_eq!(status, 200);
    assert_eq!(body["result"]["sessions"], 7);
    assert_eq!(body["result"]["chunks"], 7);

    let (status, body) = call(&base, "memory_search", json!({ "limit": 5 })).await;
    assert_eq!(status, 200);
    assert_eq!(body["result"]["results"], json!([]));

    let (status, body) = call(
        &base,
        "memory_search",
        json!({ "query": "parser crash", "limit": u64::MAX }),
    )
    .await;
    assert_eq!(status, 200);
    assert_eq!(body["result"]["results"].as_array().unwrap().len(), 7);
}

#[tokio::test]
async fn test_tool_list_and_errors() {
    let tmp = TempDir::new().unwrap();
    let base = spawn_server(&tmp).await;

    let list: Value = reqwest::get(format!("{}/tools/list", base))
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    let names: Vec<&str> = list["tools"]
        .as_array()
        .unwrap()
        .iter()
        .map(|t| t["name"].as_str().unwrap())
        .collect();
    assert_eq!(names, vec!["memory_search", "memory_ingest", "memory_stats"]);

    let (status, body) = call(&base, "memory_search", json!({ "limit": "ten" })).await;
    assert_eq!(status, 400);
    assert_eq!(body["error"]["code"], "bad_request");

    let (status, body) = call(&base, "nope", json!({})).await;
    assert_eq!(status, 404);
    assert_eq!(body["error"]["code"], "not_found");

    let (status, body) = call(&base, "memory_search", json!({ "query": "" })).await;
    assert_eq!(status, 200);
    assert_eq!(body["result"]["results"], json!([]));

    let (status, body) = call(&base, "memory_search", json!({})).await;
    assert_eq!(status, 200);
    assert_eq!(body["result"]["results"], json!([]));

    let health: Value = reqwest::get(format!("{}/health", base))
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(health["status"], "ok");
}
