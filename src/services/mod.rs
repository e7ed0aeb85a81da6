//! # Services
//!
//! Request handling between the HTTP surface and the collection store.
//! Each service validates its input before touching the store, so a
//! rejected request never causes a partial write, and converts every failure
//! into a [`ServiceError`].

mod deletion;
mod ingestion;
mod query;

pub use deletion::DeletionService;
pub use ingestion::IngestionService;
pub use query::{reshape, QueryService};

use std::sync::Arc;

use tracing::{error, warn};

use crate::cache::CollectionCache;
use crate::embeddings::EmbeddingRegistry;
use crate::errors::{ServiceError, ServiceResult};
use crate::store::Collection;

/// Shared state every service works against: the collection cache and the
/// embedding providers available to the process
#[derive(Debug)]
pub struct ServiceContext {
    pub cache: CollectionCache,
    pub registry: EmbeddingRegistry,
}

impl ServiceContext {
    pub fn new(cache: CollectionCache, registry: EmbeddingRegistry) -> Self {
        Self { cache, registry }
    }

    /// Get-or-create `collection`, binding `provider` (by registry name) if
    /// this is the first reference
    pub fn resolve(&self, collection: &str, provider: Option<&str>) -> ServiceResult<Arc<Collection>> {
        let provider = match provider {
            Some(name) => Some(self.registry.get(name).ok_or_else(|| {
                ServiceError::validation(format!(
                    "Unknown embedding provider '{}', available: {}",
                    name,
                    self.registry.names().join(", ")
                ))
            })?),
            None => None,
        };
        Ok(self.cache.resolve(collection, provider)?)
    }
}

/// Log a failed operation; caller faults at warn, store faults at error
pub(crate) fn log_failure<T>(operation: &str, collection: &str, result: ServiceResult<T>) -> ServiceResult<T> {
    if let Err(e) = &result {
        match e {
            ServiceError::Validation(message) => {
                warn!("{} on '{}' rejected: {}", operation, collection, message)
            }
            ServiceError::Store(source) => {
                error!("{} on '{}' failed: {}", operation, collection, source)
            }
        }
    }
    result
}


#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_resolve_with_named_provider() {
        let dir = TempDir::new().unwrap();
        let context = testing::context(&dir);
        let collection = context.resolve("hosted", Some("openai")).unwrap();
        assert_eq!(collection.embedding_function_name(), "openai");
    }

    #[test]
    fn test_resolve_with_unknown_provider_is_validation() {
        let dir = TempDir::new().unwrap();
        let context = testing::context(&dir);
        let result = context.resolve("docs", Some("cohere"));
        assert!(matches!(result, Err(ServiceError::Validation(ref m)) if m.contains("cohere")));
        assert!(context.cache.is_empty());
    }

    #[test]
    fn test_store_failure_maps_to_store_error() {
        let dir = TempDir::new().unwrap();
        let context = testing::context(&dir);
        let result = context.resolve("bad name", None);
        assert!(matches!(result, Err(ServiceError::Store(_))));
    }
}
