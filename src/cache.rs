//! # Collection Cache
//!
//! Process-local map from collection name to its open handle. Reads of a
//! cached name only take the read lock. Resolving a missing name takes the
//! write lock and checks again before opening or creating, so concurrent
//! first references to one name produce a single creation.
//!
//! Lock order is cache lock, then collection lock; never the reverse.

use std::collections::HashMap;
use std::sync::{Arc, RwLock};

use tracing::{debug, info, warn};

use crate::embeddings::{EmbeddingFunction, EmbeddingRegistry};
use crate::errors::{StoreError, StoreResult};
use crate::store::{Collection, VectorStore};

pub struct CollectionCache {
    store: Arc<dyn VectorStore>,
    registry: EmbeddingRegistry,
    collections: RwLock<HashMap<String, Arc<Collection>>>,
}

impl std::fmt::Debug for CollectionCache {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CollectionCache")
            .field("registry", &self.registry)
            .field("cached", &self.cached_names())
            .finish()
    }
}

impl CollectionCache {
    pub fn new(store: Arc<dyn VectorStore>, registry: EmbeddingRegistry) -> Self {
        Self {
            store,
            registry,
            collections: RwLock::new(HashMap::new()),
        }
    }

    /// Get-or-create the collection `name`
    ///
    /// A cached handle is returned unchanged and `provider` is ignored.
    /// A persisted collection is reopened with `provider` when one is given,
    /// otherwise with the provider it was written with. A new collection is
    /// bound to `provider` or the registry default.
    pub fn resolve(
        &self,
        name: &str,
        provider: Option<Arc<dyn EmbeddingFunction>>,
    ) -> StoreResult<Arc<Collection>> {
        {
            let collections = self.collections.read().map_err(|_| {
                StoreError::LockError("Failed to acquire read lock for resolve".to_string())
            })?;
            if let Some(collection) = collections.get(name) {
                debug!("Collection cache hit for '{}'", name);
                return Ok(Arc::clone(collection));
            }
        }

        let mut collections = self.collections.write().map_err(|_| {
            StoreError::LockError("Failed to acquire write lock for resolve".to_string())
        })?;
        if let Some(collection) = collections.get(name) {
            debug!("Collection '{}' resolved by a concurrent request", name);
            return Ok(Arc::clone(collection));
        }

        let select_provider = |stored: &str| match &provider {
            Some(explicit) => Arc::clone(explicit),
            None => self.stored_provider(name, stored),
        };
        let persisted = self.store.get_collection(name, &select_provider)?;
        let collection = match persisted {
            Some(existing) => existing,
            None => {
                let provider = provider.unwrap_or_else(|| self.registry.default_provider());
                self.store.create_collection(name, provider)?
            }
        };
        let collection = Arc::new(collection);
        collections.insert(name.to_string(), Arc::clone(&collection));
        info!(
            "Collection '{}' cached with provider '{}' (metric {}, {} records)",
            name,
            collection.embedding_function_name(),
            collection.metric()?.as_str(),
            collection.count()?
        );
        Ok(collection)
    }

    /// Provider registered under the name a collection was written with,
    /// falling back to the default when this process does not have it
    fn stored_provider(&self, collection: &str, stored: &str) -> Arc<dyn EmbeddingFunction> {
        match self.registry.get(stored) {
            Some(provider) => provider,
            None => {
                let fallback = self.registry.default_provider();
                warn!(
                    "Collection '{}' was written with provider '{}', which is not available; using '{}'",
                    collection,
                    stored,
                    fallback.name()
                );
                fallback
            }
        }
    }

    /// Delete `name` at the store, then evict it
    ///
    /// Dropping an uncached name still deletes at the store. When the store
    /// delete fails the cache is left as it was.
    pub fn drop_collection(&self, name: &str) -> StoreResult<()> {
        let mut collections = self.collections.write().map_err(|_| {
            StoreError::LockError("Failed to acquire write lock for drop".to_string())
        })?;

        match collections.get(name) {
            Some(collection) => collection.retire_with(|| self.store.delete_collection(name))?,
            None => self.store.delete_collection(name)?,
        }
        collections.remove(name);
        Ok(())
    }

    /// The store's authoritative list of collections
    pub fn list_collections(&self) -> StoreResult<Vec<String>> {
        self.store.list_collections()
    }

    /// Names currently held open, sorted
    pub fn cached_names(&self) -> Vec<String> {
        let mut names: Vec<String> = match self.collections.read() {
            Ok(collections) => collections.keys().cloned().collect(),
            Err(_) => Vec::new(),
        };
        names.sort();
        names
    }

    pub fn len(&self) -> usize {
        self.collections.read().map(|c| c.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Release every handle; used at shutdown
    pub fn clear(&self) {
        if let Ok(mut collections) = self.collections.write() {
            let released = collections.len();
            collections.clear();
            info!("Released {} cached collections", released);
        }
    }
}
