use std::sync::Arc;

use async_trait::async_trait;
use axum::{
    body::Body,
    http::{Request, StatusCode},
    Router,
};
use serde_json::{json, Value};
use tempfile::TempDir;
use tower::ServiceExt;
use embedding_store::{create_app, AppState, EmbeddingFunction, EmbeddingRegistry, PersistentStore};

// Mock embedding function: byte values folded into `dimension` buckets
struct MockEmbeddingFunction {
    name: &'static str,
    dimension: usize,
}

#[async_trait]
impl EmbeddingFunction for MockEmbeddingFunction {
    fn name(&self) -> &str {
        self.name
    }

    fn dimension(&self) -> usize {
        self.dimension
    }

    async fn generate_embeddings_batch(
        &self,
        texts: &[String],
    ) -> embedding_store::embeddings::Result<Vec<Vec<f64>>> {
        Ok(texts
            .iter()
            .map(|text| {
                let mut values = vec![0.0; self.dimension];
                for (i, byte) in text.bytes().enumerate() {
                    values[i % self.dimension] += byte as f64;
                }
                values
            })
            .collect())
    }
}

fn create_test_app(dir: &TempDir) -> Router {
    let registry = EmbeddingRegistry::new(Arc::new(MockEmbeddingFunction { name: "default", dimension: 4 }))
        .with_provider(Arc::new(MockEmbeddingFunction { name: "openai", dimension: 8 }));
    let store = PersistentStore::open(dir.path()).unwrap();
    create_app(AppState::new(Arc::new(store), registry))
}

async fn send(app: &Router, method: &str, uri: &str, body: Option<Value>) -> (StatusCode, Value) {
    let builder = Request::builder().method(method).uri(uri);
    let request = match body {
        Some(body) => builder
            .header("content-type", "application/json")
            .body(Body::from(serde_json::to_vec(&body).unwrap()))
            .unwrap(),
        None => builder.body(Body::empty()).unwrap(),
    };

    let response = app.clone().oneshot(request).await.unwrap();
    let status = response.status();
    let body = axum::body::to_bytes(response.into_body(), usize::MAX).await.unwrap();
    let json = serde_json::from_slice(&body).unwrap_or(Value::Null);
    (status, json)
}

#[tokio::test]
async fn test_root_and_health() {
    let dir = TempDir::new().unwrap();
    let app = create_test_app(&dir);

    let (status, json) = send(&app, "GET", "/", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["status"], "ok");
    assert!(json["message"].is_string());

    let (status, json) = send(&app, "GET", "/health", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json, json!({"status": "ok"}));
}

#[tokio::test]
async fn test_list_collections_empty() {
    let dir = TempDir::new().unwrap();
    let app = create_test_app(&dir);

    let (status, json) = send(&app, "GET", "/collections", None).await;
    assert_eq!(status, StatusCode::OK);
    assert!(json["collections"].as_array().unwrap().is_empty());
}

#[tokio::test]
async fn test_embed_then_query_by_text() {
    let dir = TempDir::new().unwrap();
    let app = create_test_app(&dir);

    let (status, json) = send(
        &app,
        "POST",
        "/embed?collection_name=novel",
        Some(json!({
            "id": "ch1",
            "text": "It was a dark and stormy night",
            "metadata": {"k": "v"}
        })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["status"], "success");
    assert!(json["message"].as_str().unwrap().contains("novel"));

    send(
        &app,
        "POST",
        "/embed?collection_name=novel",
        Some(json!({"id": "ch2", "text": "The sun rose over quiet fields"})),
    )
    .await;

    let (status, json) = send(
        &app,
        "POST",
        "/query?collection_name=novel",
        Some(json!({"query_text": "It was a dark and stormy night", "n_results": 2})),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["status"], "success");
    assert_eq!(json["count"], 2);
    assert_eq!(json["results"][0]["id"], "ch1");
    assert_eq!(json["results"][0]["text"], "It was a dark and stormy night");
    assert_eq!(json["results"][0]["metadata"], json!({"k": "v"}));
    assert_eq!(json["results"][0]["distance"], 0.0);
    assert_eq!(json["results"][1]["metadata"], json!({}));
}

#[tokio::test]
async fn test_default_collection_name() {
    let dir = TempDir::new().unwrap();
    let app = create_test_app(&dir);

    let (status, _) = send(&app, "POST", "/embed", Some(json!({"id": "a", "embedding": [1.0, 2.0]}))).await;
    assert_eq!(status, StatusCode::OK);

    let (_, json) = send(&app, "GET", "/collections", None).await;
    assert_eq!(json["collections"], json!(["default"]));
}

#[tokio::test]
async fn test_embed_batch_with_vectors() {
    let dir = TempDir::new().unwrap();
    let app = create_test_app(&dir);

    let (status, json) = send(
        &app,
        "POST",
        "/embed_batch?collection_name=points",
        Some(json!({
            "ids": ["a", "b", "c"],
            "texts": ["first", "second", "third"],
            "metadatas": [{"n": 1}, {"n": 2}, {"n": 3}],
            "embeddings": [[0.0, 0.0], [1.0, 0.0], [5.0, 0.0]]
        })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert!(json["message"].as_str().unwrap().contains('3'));

    let (_, json) = send(
        &app,
        "POST",
        "/query?collection_name=points",
        Some(json!({"embedding": [4.0, 0.0], "n_results": 2})),
    )
    .await;
    assert_eq!(json["count"], 2);
    assert_eq!(json["results"][0]["id"], "c");
    assert_eq!(json["results"][1]["id"], "b");
}

#[tokio::test]
async fn test_batch_length_mismatch_is_bad_request() {
    let dir = TempDir::new().unwrap();
    let app = create_test_app(&dir);

    let (status, json) = send(
        &app,
        "POST",
        "/embed_batch?collection_name=novel",
        Some(json!({"ids": ["a", "b"], "texts": ["only one"]})),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(json["detail"].as_str().unwrap().contains("same length"));
}

#[tokio::test]
async fn test_malformed_body_is_bad_request() {
    let dir = TempDir::new().unwrap();
    let app = create_test_app(&dir);

    let (status, json) = send(&app, "POST", "/query", Some(json!({"n_results": "five"}))).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(json["detail"].is_string());
}

#[tokio::test]
async fn test_duplicate_id_is_server_error() {
    let dir = TempDir::new().unwrap();
    let app = create_test_app(&dir);

    let record = json!({"id": "same", "text": "hello"});
    send(&app, "POST", "/embed", Some(record.clone())).await;
    let (status, json) = send(&app, "POST", "/embed", Some(record)).await;
    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    assert!(json["detail"].as_str().unwrap().contains("same"));
}

#[tokio::test]
async fn test_query_with_where_filter() {
    let dir = TempDir::new().unwrap();
    let app = create_test_app(&dir);

    send(
        &app,
        "POST",
        "/embed_batch?collection_name=novel",
        Some(json!({
            "ids": ["a", "b", "c"],
            "texts": ["castle", "forest", "harbor"],
            "metadatas": [{"chapter": 1}, {"chapter": 2}, {"chapter": 2}]
        })),
    )
    .await;

    let (status, json) = send(
        &app,
        "POST",
        "/query?collection_name=novel",
        Some(json!({"query_text": "castle", "where": {"chapter": {"$gte": 2}}})),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["count"], 2);
    let ids: Vec<&str> = json["results"]
        .as_array()
        .unwrap()
        .iter()
        .map(|r| r["id"].as_str().unwrap())
        .collect();
    assert!(!ids.contains(&"a"));
}

#[tokio::test]
async fn test_delete_records_by_ids_and_where() {
    let dir = TempDir::new().unwrap();
    let app = create_test_app(&dir);

    send(
        &app,
        "POST",
        "/embed_batch?collection_name=novel",
        Some(json!({
            "ids": ["a", "b", "c", "d"],
            "texts": ["one", "two", "three", "four"],
            "metadatas": [{"draft": true}, {"draft": false}, {"draft": true}, {"draft": false}]
        })),
    )
    .await;

    let (status, json) = send(
        &app,
        "POST",
        "/delete?collection_name=novel",
        Some(json!({"ids": ["a", "b"]})),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert!(json["message"].as_str().unwrap().contains('2'));

    let (status, _) = send(
        &app,
        "POST",
        "/delete?collection_name=novel",
        Some(json!({"where": {"draft": true}})),
    )
    .await;
    assert_eq!(status, StatusCode::OK);

    let (_, json) = send(
        &app,
        "POST",
        "/query?collection_name=novel",
        Some(json!({"query_text": "one", "n_results": 10})),
    )
    .await;
    assert_eq!(json["count"], 1);
    assert_eq!(json["results"][0]["id"], "d");
}

#[tokio::test]
async fn test_delete_without_ids_or_where_is_bad_request() {
    let dir = TempDir::new().unwrap();
    let app = create_test_app(&dir);

    let (status, json) = send(&app, "POST", "/delete", Some(json!({"ids": [], "where": {}}))).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(json["detail"].as_str().unwrap().contains("ids or where"));
}

#[tokio::test]
async fn test_drop_collection() {
    let dir = TempDir::new().unwrap();
    let app = create_test_app(&dir);

    send(&app, "POST", "/embed?collection_name=temp", Some(json!({"id": "a", "text": "x"}))).await;
    send(&app, "POST", "/embed?collection_name=kept", Some(json!({"id": "a", "text": "x"}))).await;

    let (status, json) = send(&app, "DELETE", "/collection/temp", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["status"], "success");

    let (_, json) = send(&app, "GET", "/collections", None).await;
    assert_eq!(json["collections"], json!(["kept"]));

    let (status, json) = send(&app, "DELETE", "/collection/temp", None).await;
    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    assert!(json["detail"].as_str().unwrap().contains("temp"));
}

#[tokio::test]
async fn test_embedding_provider_selection() {
    let dir = TempDir::new().unwrap();
    let app = create_test_app(&dir);

    let (status, _) = send(
        &app,
        "POST",
        "/embed?collection_name=hosted&embedding_provider=openai",
        Some(json!({"id": "a", "text": "hosted text"})),
    )
    .await;
    assert_eq!(status, StatusCode::OK);

    // The collection is bound to the 8-wide provider, so a 4-wide vector no longer fits
    let (status, _) = send(
        &app,
        "POST",
        "/embed?collection_name=hosted",
        Some(json!({"id": "b", "embedding": [1.0, 2.0, 3.0, 4.0]})),
    )
    .await;
    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);

    let (status, json) = send(
        &app,
        "POST",
        "/embed?embedding_provider=unknown",
        Some(json!({"id": "a", "text": "x"})),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(json["detail"].as_str().unwrap().contains("unknown"));
}
