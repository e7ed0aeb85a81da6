//! # Collection Store
//!
//! The [`VectorStore`] trait is the storage capability the services are
//! written against: open, create, delete and list named collections. A
//! [`Collection`] handle then adds, queries and deletes records.
//!
//! [`PersistentStore`] is the bundled implementation, keeping one file per
//! collection under a root directory.

mod collection;
mod persistent;

pub use collection::{Collection, QueryInput, QueryResult};
pub use persistent::PersistentStore;

use std::sync::Arc;

use crate::embeddings::EmbeddingFunction;
use crate::errors::{StoreError, StoreResult};

const MAX_NAME_LENGTH: usize = 63;

/// Storage for named collections
///
/// Calls are synchronous and run to completion. Callers that need
/// get-or-create semantics serialize them themselves (see
/// [`CollectionCache`](crate::CollectionCache)).
pub trait VectorStore: Send + Sync {
    /// Open an existing collection, `None` if nothing is persisted under `name`
    ///
    /// `select_provider` receives the provider name stored with the
    /// collection and returns the provider to bind the handle to.
    fn get_collection(
        &self,
        name: &str,
        select_provider: &dyn Fn(&str) -> Arc<dyn EmbeddingFunction>,
    ) -> StoreResult<Option<Collection>>;

    /// Create an empty collection; fails if one already exists
    fn create_collection(
        &self,
        name: &str,
        embedding_function: Arc<dyn EmbeddingFunction>,
    ) -> StoreResult<Collection>;

    /// Remove a collection and its data; fails if it does not exist
    fn delete_collection(&self, name: &str) -> StoreResult<()>;

    /// Names of all persisted collections, sorted
    fn list_collections(&self) -> StoreResult<Vec<String>>;
}

/// Collection names are 1-63 characters of `[A-Za-z0-9._-]`, start and end
/// with an alphanumeric, and never contain `..`.
pub fn validate_collection_name(name: &str) -> StoreResult<()> {
    let reason = if name.is_empty() || name.len() > MAX_NAME_LENGTH {
        Some(format!("must be 1-{} characters long", MAX_NAME_LENGTH))
    } else if !name
        .chars()
        .all(|c| c.is_ascii_alphanumeric() || matches!(c, '.' | '_' | '-'))
    {
        Some("may only contain letters, digits, '.', '_' and '-'".to_string())
    } else if !name.starts_with(|c: char| c.is_ascii_alphanumeric())
        || !name.ends_with(|c: char| c.is_ascii_alphanumeric())
    {
        Some("must start and end with a letter or digit".to_string())
    } else if name.contains("..") {
        Some("must not contain '..'".to_string())
    } else {
        None
    };

    match reason {
        Some(reason) => Err(StoreError::InvalidCollectionName {
            name: name.to_string(),
            reason,
        }),
        None => Ok(()),
    }
}
