//! # HTTP Server Module
//!
//! Axum front end over the ingestion, query and deletion services.
//!
//! # API Endpoints
//!
//! - `GET /` - Liveness message
//! - `GET /health` - Health check
//! - `GET /collections` - List all collections
//! - `POST /embed?collection_name=X` - Add one record
//! - `POST /embed_batch?collection_name=X` - Add a batch of records
//! - `POST /query?collection_name=X` - Similarity query
//! - `POST /delete?collection_name=X` - Delete records by id or by `where`
//! - `DELETE /collection/{name}` - Drop a collection
//!
//! `collection_name` defaults to `default`. The optional `embedding_provider`
//! parameter picks the provider a collection is bound to on first use.
//!
//! ### Add a record
//! ```bash
//! curl -X POST 'http://localhost:8000/embed?collection_name=novel' \
//!      -H 'Content-Type: application/json' \
//!      -d '{"id": "ch1", "text": "It was a dark and stormy night", "metadata": {"chapter": 1}}'
//! ```
//!
//! ### Query
//! ```bash
//! curl -X POST 'http://localhost:8000/query?collection_name=novel' \
//!      -H 'Content-Type: application/json' \
//!      -d '{"query_text": "storm", "n_results": 3, "where": {"chapter": 1}}'
//! ```
//!
//! Failures answer `{"detail": "..."}` with status 400 for malformed requests
//! and 500 for store or provider failures.

use std::sync::Arc;

use axum::{
    extract::{
        rejection::{JsonRejection, QueryRejection},
        Path, Query, State,
    },
    response::{IntoResponse, Json, Response},
    routing::{delete, get, post},
    Router,
};
use tokio::signal;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use tracing::{error, info, warn};

use crate::cache::CollectionCache;
use crate::embeddings::EmbeddingRegistry;
use crate::errors::ServiceError;
use crate::models::{
    BatchEmbeddingRequest, CollectionParams, DeleteAck, DeleteRequest, EmbeddingRecord,
    ErrorResponse, ListCollectionsResponse, MessageResponse, QueryRequest, QueryResponse,
    StatusResponse,
};
use crate::services::{DeletionService, IngestionService, QueryService, ServiceContext};
use crate::store::VectorStore;

/// Process-scoped state handed to every handler
#[derive(Debug, Clone)]
pub struct AppState {
    context: Arc<ServiceContext>,
    pub ingestion: IngestionService,
    pub query: QueryService,
    pub deletion: DeletionService,
}

impl AppState {
    pub fn new(store: Arc<dyn VectorStore>, registry: EmbeddingRegistry) -> Self {
        let cache = CollectionCache::new(store, registry.clone());
        let context = Arc::new(ServiceContext::new(cache, registry));
        Self {
            ingestion: IngestionService::new(Arc::clone(&context)),
            query: QueryService::new(Arc::clone(&context)),
            deletion: DeletionService::new(Arc::clone(&context)),
            context,
        }
    }

    pub fn context(&self) -> &Arc<ServiceContext> {
        &self.context
    }

    /// Release every cached collection handle
    pub fn shutdown(&self) {
        self.context.cache.clear();
    }
}

impl From<JsonRejection> for ServiceError {
    fn from(rejection: JsonRejection) -> Self {
        warn!("Rejected request body: {}", rejection.body_text());
        ServiceError::Validation(rejection.body_text())
    }
}

impl From<QueryRejection> for ServiceError {
    fn from(rejection: QueryRejection) -> Self {
        warn!("Rejected query string: {}", rejection.body_text());
        ServiceError::Validation(rejection.body_text())
    }
}

impl IntoResponse for ServiceError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        let body = Json(ErrorResponse {
            detail: self.to_string(),
        });
        (status, body).into_response()
    }
}

type Params = Result<Query<CollectionParams>, QueryRejection>;

// Handlers
async fn root() -> Json<MessageResponse> {
    Json(MessageResponse::ok("Embedding store service is running"))
}

async fn health_check() -> Json<StatusResponse> {
    Json(StatusResponse {
        status: "ok".to_string(),
    })
}

async fn list_collections(
    State(state): State<AppState>,
) -> Result<Json<ListCollectionsResponse>, ServiceError> {
    let collections = state.deletion.list_collections()?;
    Ok(Json(ListCollectionsResponse { collections }))
}

async fn embed(
    State(state): State<AppState>,
    params: Params,
    payload: Result<Json<EmbeddingRecord>, JsonRejection>,
) -> Result<Json<MessageResponse>, ServiceError> {
    let Query(params) = params?;
    let Json(record) = payload?;
    state
        .ingestion
        .ingest_one(&params.collection_name, record, params.embedding_provider.as_deref())
        .await?;
    Ok(Json(MessageResponse::success(format!(
        "Text embedded and added to {}",
        params.collection_name
    ))))
}

async fn embed_batch(
    State(state): State<AppState>,
    params: Params,
    payload: Result<Json<BatchEmbeddingRequest>, JsonRejection>,
) -> Result<Json<MessageResponse>, ServiceError> {
    let Query(params) = params?;
    let Json(batch) = payload?;
    let ack = state
        .ingestion
        .ingest_batch(&params.collection_name, batch, params.embedding_provider.as_deref())
        .await?;
    Ok(Json(MessageResponse::success(format!(
        "Added {} embeddings to {}",
        ack.count, params.collection_name
    ))))
}

async fn query(
    State(state): State<AppState>,
    params: Params,
    payload: Result<Json<QueryRequest>, JsonRejection>,
) -> Result<Json<QueryResponse>, ServiceError> {
    let Query(params) = params?;
    let Json(request) = payload?;
    let results = state
        .query
        .query(&params.collection_name, request, params.embedding_provider.as_deref())
        .await?;
    Ok(Json(QueryResponse {
        status: "success".to_string(),
        count: results.len(),
        results,
    }))
}

async fn delete_records(
    State(state): State<AppState>,
    params: Params,
    payload: Result<Json<DeleteRequest>, JsonRejection>,
) -> Result<Json<MessageResponse>, ServiceError> {
    let Query(params) = params?;
    let Json(request) = payload?;
    let name = &params.collection_name;
    let message = match state
        .deletion
        .delete_records(name, request, params.embedding_provider.as_deref())?
    {
        DeleteAck::Ids(count) => format!("Deleted {} embeddings from {}", count, name),
        DeleteAck::Predicate(Some(count)) => {
            format!("Deleted {} matching embeddings from {}", count, name)
        }
        DeleteAck::Predicate(None) => format!("Deleted matching embeddings from {}", name),
    };
    Ok(Json(MessageResponse::success(message)))
}

async fn drop_collection(
    State(state): State<AppState>,
    Path(name): Path<String>,
) -> Result<Json<MessageResponse>, ServiceError> {
    state.deletion.drop_collection(&name)?;
    Ok(Json(MessageResponse::success(format!("Deleted collection: {}", name))))
}

pub fn create_app(state: AppState) -> Router {
    Router::new()
        .route("/", get(root))
        .route("/health", get(health_check))
        .route("/collections", get(list_collections))
        .route("/embed", post(embed))
        .route("/embed_batch", post(embed_batch))
        .route("/query", post(query))
        .route("/delete", post(delete_records))
        .route("/collection/:name", delete(drop_collection))
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// Resolves on Ctrl+C or SIGTERM
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            error!("Failed to install Ctrl+C handler: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(e) => {
                error!("Failed to install SIGTERM handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => info!("Received Ctrl+C, shutting down"),
        _ = terminate => info!("Received SIGTERM, shutting down"),
    }
}

pub async fn start_server(
    state: AppState,
    host: &str,
    port: u16,
) -> Result<(), Box<dyn std::error::Error>> {
    let app = create_app(state.clone());

    let listener = tokio::net::TcpListener::bind(format!("{}:{}", host, port)).await?;
    info!("Embedding store server starting on {}:{}", host, port);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    state.shutdown();
    info!("Embedding store server stopped");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::embeddings::testing::MockEmbeddingFunction;
    use crate::errors::StoreError;
    use crate::store::PersistentStore;
    use axum::body::Body;
    use axum::http::{Request, StatusCode};
    use tempfile::TempDir;
    use tower::ServiceExt;

    fn state(dir: &TempDir) -> AppState {
        let registry = EmbeddingRegistry::new(Arc::new(MockEmbeddingFunction::new(4)));
        AppState::new(Arc::new(PersistentStore::open(dir.path()).unwrap()), registry)
    }

    #[test]
    fn test_error_status_mapping() {
        let response = ServiceError::validation("bad").into_response();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);

        let response = ServiceError::from(StoreError::CollectionNotFound { name: "x".into() }).into_response();
        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
    }

    #[tokio::test]
    async fn test_malformed_json_is_bad_request() {
        let dir = TempDir::new().unwrap();
        let app = create_app(state(&dir));

        let response = app
            .oneshot(
                Request::builder()
                    .method("POST")
                    .uri("/embed")
                    .header("content-type", "application/json")
                    .body(Body::from("{not json"))
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn test_malformed_query_string_is_bad_request() {
        let dir = TempDir::new().unwrap();
        let app = create_app(state(&dir));

        let response = app
            .oneshot(
                Request::builder()
                    .method("POST")
                    .uri("/embed?collection_name=a&collection_name=b")
                    .header("content-type", "application/json")
                    .body(Body::from(r#"{"id": "x", "text": "y"}"#))
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        let body = axum::body::to_bytes(response.into_body(), usize::MAX).await.unwrap();
        let json: serde_json::Value = serde_json::from_slice(&body).unwrap();
        assert!(json["detail"].as_str().unwrap().contains("collection_name"));
    }

    #[tokio::test]
    async fn test_shutdown_clears_cache() {
        let dir = TempDir::new().unwrap();
        let state = state(&dir);
        state.context().resolve("warm", None).unwrap();
        assert_eq!(state.context().cache.len(), 1);

        state.shutdown();
        assert!(state.context().cache.is_empty());
    }
}
