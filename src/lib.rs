//! # embedding-store
//!
//! HTTP front end for a persistent vector store. Records are stored under
//! string ids in named collections, either with caller-supplied vectors or
//! with vectors derived from their text by an embedding provider, and can be
//! retrieved with nearest-neighbor similarity queries.
//!
//! Layers, leaves first:
//!
//! - [`embeddings`]: pluggable text-to-vector providers and their registry
//! - [`store`]: the persisted collection store ([`VectorStore`], [`Collection`])
//! - [`cache`]: get-or-create cache of open collection handles
//! - [`services`]: ingestion, query and deletion request handling
//! - [`server`]: the axum HTTP surface
//!
//! # Examples
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use embedding_store::{AppState, EmbeddingRegistry, LocalEmbedder, PersistentStore, start_server};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let store = PersistentStore::open("./vector_db")?;
//!     let registry = EmbeddingRegistry::new(Arc::new(LocalEmbedder::from_dir("./models/all-MiniLM-L6-v2")?));
//!     start_server(AppState::new(Arc::new(store), registry), "127.0.0.1", 8000).await?;
//!     Ok(())
//! }
//! ```

pub mod cache;
pub mod config;
pub mod embeddings;
pub mod errors;
pub mod filter;
pub mod index;
pub mod models;
pub mod persistence;
pub mod server;
pub mod services;
pub mod store;

pub use cache::CollectionCache;
pub use config::Settings;
pub use embeddings::{EmbeddingFunction, EmbeddingRegistry, LocalEmbedder, OpenAIConfig, OpenAIEmbedder};
pub use errors::{ServiceError, ServiceResult, StoreError, StoreResult};
pub use filter::WhereFilter;
pub use index::{DistanceMetric, FlatIndex};
pub use models::{
    BatchEmbeddingRequest, DeleteAck, DeleteRequest, EmbeddingRecord, IngestAck, QueryRequest,
    QueryResultItem,
};
pub use server::{create_app, start_server, AppState};
pub use services::{DeletionService, IngestionService, QueryService, ServiceContext};
pub use store::{Collection, PersistentStore, QueryInput, QueryResult, VectorStore};

use serde::{Deserialize, Serialize};

/// Metadata attached to a record: a JSON object whose values may be strings,
/// numbers, booleans, null or nested structures.
pub type Metadata = serde_json::Map<String, serde_json::Value>;

/// A stored record: its vector plus the document and metadata it was added with.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Record {
    pub id: String,
    pub values: Vec<f64>,
    #[serde(default)]
    pub document: Option<String>,
    #[serde(default)]
    pub metadata: Metadata,
}
