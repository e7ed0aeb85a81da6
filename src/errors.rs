//! # Error Types Module
//!
//! Two layers of errors. [`StoreError`] covers every failure of the collection
//! store and of the embedding providers it calls. [`ServiceError`] is what the
//! services hand back to callers: either the request itself was malformed
//! (`Validation`) or the store failed underneath it (`Store`).

use axum::http::StatusCode;
use thiserror::Error;

use crate::embeddings::EmbeddingError;
use crate::persistence::PersistenceError;

/// Failures raised by the collection store
#[derive(Error, Debug)]
pub enum StoreError {
    /// Collection has no persisted data
    #[error("Collection '{name}' does not exist")]
    CollectionNotFound { name: String },

    /// Collection already persisted under that name
    #[error("Collection '{name}' already exists")]
    CollectionAlreadyExists { name: String },

    #[error("Invalid collection name '{name}': {reason}")]
    InvalidCollectionName { name: String, reason: String },

    /// Record id already present in the collection or repeated in one write
    #[error("ID '{id}' already exists in collection '{collection}'")]
    DuplicateId { collection: String, id: String },

    #[error("Vector dimension mismatch: expected {expected}, got {actual}")]
    DimensionMismatch { expected: usize, actual: usize },

    #[error("Invalid where filter: {0}")]
    InvalidFilter(String),

    #[error("Embedding generation failed: {0}")]
    Embedding(#[from] EmbeddingError),

    #[error("Persistence error: {0}")]
    Persistence(#[from] PersistenceError),

    /// Lock acquisition error
    #[error("Failed to acquire lock: {0}")]
    LockError(String),

    #[error("Internal store error: {0}")]
    Internal(String),
}

pub type StoreResult<T> = Result<T, StoreError>;

/// Errors returned by the ingestion, query and deletion services
#[derive(Error, Debug)]
pub enum ServiceError {
    /// Malformed or inconsistent request; the caller must fix it
    #[error("{0}")]
    Validation(String),

    /// The store or an embedding provider failed; the message is passed through
    #[error(transparent)]
    Store(#[from] StoreError),
}

impl ServiceError {
    pub fn validation(message: impl Into<String>) -> Self {
        ServiceError::Validation(message.into())
    }

    /// Convert the error to an appropriate HTTP status code
    pub fn status_code(&self) -> StatusCode {
        match self {
            ServiceError::Validation(_) => StatusCode::BAD_REQUEST,
            ServiceError::Store(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    pub fn is_client_error(&self) -> bool {
        self.status_code().is_client_error()
    }

    pub fn is_server_error(&self) -> bool {
        self.status_code().is_server_error()
    }
}

pub type ServiceResult<T> = Result<T, ServiceError>;
