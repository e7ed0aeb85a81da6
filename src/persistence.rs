//! # Persistence Module
//!
//! Each collection lives in its own file, `<db_path>/<name>.esc`, rewritten
//! in full after every mutation.
//!
//! ## File Format
//!
//! ```json
//! {
//!   "header": {
//!     "version": "1.0.0",
//!     "format": "embedding-store-collection",
//!     "created_at": "2025-01-21T10:00:00Z"
//!   },
//!   "metadata": {
//!     "name": "collection_name",
//!     "created_at": "2025-01-21T10:00:00Z",
//!     "record_count": 1000,
//!     "dimension": 384,
//!     "embedding_function": "default"
//!   },
//!   "index": {
//!     // Serialized FlatIndex
//!   }
//! }
//! ```

use std::fs;
use std::io;
use std::path::Path;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::index::FlatIndex;

pub const FILE_EXTENSION: &str = "esc";
const FORMAT_VERSION: &str = "1.0.0";
const FORMAT_NAME: &str = "embedding-store-collection";

/// Error types for persistence operations
#[derive(Error, Debug)]
pub enum PersistenceError {
    #[error("File not found: {0}")]
    FileNotFound(String),

    #[error("IO error: {0}")]
    Io(#[from] io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Invalid file format: {0}")]
    InvalidFormat(String),

    #[error("Version mismatch: expected {expected}, got {actual}")]
    VersionMismatch { expected: String, actual: String },
}

/// File header containing version and format information
#[derive(Debug, Serialize, Deserialize)]
pub struct FileHeader {
    pub version: String,
    pub format: String,
    pub created_at: DateTime<Utc>,
}

impl Default for FileHeader {
    fn default() -> Self {
        Self {
            version: FORMAT_VERSION.to_string(),
            format: FORMAT_NAME.to_string(),
            created_at: Utc::now(),
        }
    }
}

/// Collection metadata for persistence
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CollectionMetadata {
    pub name: String,
    pub created_at: DateTime<Utc>,
    pub record_count: usize,
    pub dimension: Option<usize>,
    /// Provider the collection was bound to when written
    pub embedding_function: String,
}

/// Borrowed view of a collection, written on every mutation
#[derive(Debug, Serialize)]
pub struct CollectionSnapshot<'a> {
    pub header: FileHeader,
    pub metadata: CollectionMetadata,
    pub index: &'a FlatIndex,
}

/// Complete collection data as read back from disk
#[derive(Debug, Deserialize)]
pub struct CollectionData {
    pub header: FileHeader,
    pub metadata: CollectionMetadata,
    pub index: FlatIndex,
}

impl<'a> CollectionSnapshot<'a> {
    pub fn new(
        name: &str,
        created_at: DateTime<Utc>,
        embedding_function: &str,
        index: &'a FlatIndex,
    ) -> Self {
        Self {
            header: FileHeader::default(),
            metadata: CollectionMetadata {
                name: name.to_string(),
                created_at,
                record_count: index.len(),
                dimension: index.dimension,
                embedding_function: embedding_function.to_string(),
            },
            index,
        }
    }
}

/// Write a snapshot to `path`, replacing any previous file atomically
pub fn save_snapshot(snapshot: &CollectionSnapshot<'_>, path: &Path) -> Result<(), PersistenceError> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)?;
    }

    // Write to a temporary file first, then rename for atomicity
    let temp_path = path.with_extension("tmp");
    let json_data = serde_json::to_vec(snapshot)?;
    fs::write(&temp_path, json_data)?;
    fs::rename(&temp_path, path)?;

    Ok(())
}

/// Read collection data from `path`
pub fn load_collection_data(path: &Path) -> Result<CollectionData, PersistenceError> {
    let json_data = fs::read(path).map_err(|e| match e.kind() {
        io::ErrorKind::NotFound => PersistenceError::FileNotFound(path.display().to_string()),
        _ => PersistenceError::Io(e),
    })?;
    let data: CollectionData = serde_json::from_slice(&json_data)?;

    if data.header.version != FORMAT_VERSION {
        return Err(PersistenceError::VersionMismatch {
            expected: FORMAT_VERSION.to_string(),
            actual: data.header.version,
        });
    }

    if data.header.format != FORMAT_NAME {
        return Err(PersistenceError::InvalidFormat(format!(
            "Expected format '{}', got '{}'",
            FORMAT_NAME, data.header.format
        )));
    }

    Ok(data)
}
