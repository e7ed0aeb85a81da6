use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use tracing::{info, warn};

use crate::embeddings::EmbeddingFunction;
use crate::errors::{StoreError, StoreResult};
use crate::index::DistanceMetric;
use crate::persistence::{load_collection_data, PersistenceError, FILE_EXTENSION};

use super::{validate_collection_name, Collection, VectorStore};

/// File-backed store: `<root>/<name>.esc` per collection
#[derive(Debug, Clone)]
pub struct PersistentStore {
    root: PathBuf,
    metric: DistanceMetric,
}

impl PersistentStore {
    /// Open the store rooted at `root`, creating the directory if needed
    pub fn open(root: impl AsRef<Path>) -> StoreResult<Self> {
        let root = root.as_ref().to_path_buf();
        fs::create_dir_all(&root).map_err(PersistenceError::from)?;
        info!("Vector store opened at {}", root.display());
        Ok(Self {
            root,
            metric: DistanceMetric::default(),
        })
    }

    /// Distance metric given to collections created from now on
    pub fn with_metric(mut self, metric: DistanceMetric) -> Self {
        self.metric = metric;
        self
    }

    fn path_for(&self, name: &str) -> PathBuf {
        self.root.join(format!("{}.{}", name, FILE_EXTENSION))
    }
}

impl VectorStore for PersistentStore {
    fn get_collection(
        &self,
        name: &str,
        select_provider: &dyn Fn(&str) -> Arc<dyn EmbeddingFunction>,
    ) -> StoreResult<Option<Collection>> {
        validate_collection_name(name)?;
        let path = self.path_for(name);
        if !path.exists() {
            return Ok(None);
        }

        let data = load_collection_data(&path)?;
        let embedding_function = select_provider(&data.metadata.embedding_function);
        if data.metadata.embedding_function != embedding_function.name() {
            warn!(
                "Collection '{}' was written with embedding provider '{}', opening with '{}'",
                name,
                data.metadata.embedding_function,
                embedding_function.name()
            );
        }
        if let Some(dimension) = data.metadata.dimension {
            if dimension != embedding_function.dimension() {
                warn!(
                    "Collection '{}' holds {}-wide vectors but provider '{}' produces {}-wide ones; text ingest and text queries will fail",
                    name,
                    dimension,
                    embedding_function.name(),
                    embedding_function.dimension()
                );
            }
        }
        info!(
            "Loaded collection '{}' ({} records)",
            name, data.metadata.record_count
        );
        Ok(Some(Collection::restore(path, data, embedding_function)))
    }

    fn create_collection(
        &self,
        name: &str,
        embedding_function: Arc<dyn EmbeddingFunction>,
    ) -> StoreResult<Collection> {
        validate_collection_name(name)?;
        let path = self.path_for(name);
        if path.exists() {
            return Err(StoreError::CollectionAlreadyExists {
                name: name.to_string(),
            });
        }

        let collection = Collection::new(name, path, self.metric, embedding_function);
        collection.persist_current()?;
        info!(
            "Created collection '{}' (metric {}, provider {})",
            name,
            self.metric.as_str(),
            collection.embedding_function_name()
        );
        Ok(collection)
    }

    fn delete_collection(&self, name: &str) -> StoreResult<()> {
        validate_collection_name(name)?;
        let path = self.path_for(name);
        match fs::remove_file(&path) {
            Ok(()) => {
                info!("Deleted collection '{}'", name);
                Ok(())
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Err(StoreError::CollectionNotFound {
                name: name.to_string(),
            }),
            Err(e) => Err(PersistenceError::from(e).into()),
        }
    }

    fn list_collections(&self) -> StoreResult<Vec<String>> {
        let mut names = Vec::new();
        for entry in fs::read_dir(&self.root).map_err(PersistenceError::from)? {
            let path = entry.map_err(PersistenceError::from)?.path();
            if !path.is_file() || path.extension().and_then(|e| e.to_str()) != Some(FILE_EXTENSION) {
                continue;
            }
            if let Some(stem) = path.file_stem().and_then(|s| s.to_str()) {
                names.push(stem.to_string());
            }
        }
        names.sort();
        Ok(names)
    }
}
