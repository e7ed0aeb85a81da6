use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, RwLock, RwLockReadGuard, RwLockWriteGuard};

use chrono::{DateTime, Utc};
use serde::Serialize;
use serde_json::Value;
use tracing::{debug, warn};

use crate::embeddings::EmbeddingFunction;
use crate::errors::{StoreError, StoreResult};
use crate::filter::WhereFilter;
use crate::index::{DistanceMetric, FlatIndex};
use crate::persistence::{save_snapshot, CollectionData, CollectionSnapshot};
use crate::{Metadata, Record};

/// What a similarity query is matched against
#[derive(Debug, Clone, PartialEq)]
pub enum QueryInput {
    /// A pre-computed query vector, used as-is
    Vector(Vec<f64>),
    /// Text embedded with the collection's provider before searching
    Text(String),
}

/// Positional query answer: one row per query vector, entries index-parallel
/// across `ids`, `documents`, `metadatas` and `distances`.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct QueryResult {
    pub ids: Vec<Vec<String>>,
    pub documents: Option<Vec<Vec<Option<String>>>>,
    pub metadatas: Option<Vec<Vec<Option<Metadata>>>>,
    pub distances: Option<Vec<Vec<f64>>>,
}

/// A named, persisted collection of records
///
/// The index sits behind its own lock; embeddings are generated before the
/// write lock is taken so provider latency never blocks readers. Every
/// mutation rewrites the collection file before it becomes visible.
pub struct Collection {
    name: String,
    created_at: DateTime<Utc>,
    path: PathBuf,
    index: RwLock<FlatIndex>,
    embedding_function: Arc<dyn EmbeddingFunction>,
    dropped: AtomicBool,
}

impl std::fmt::Debug for Collection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Collection")
            .field("name", &self.name)
            .field("path", &self.path)
            .field("embedding_function", &self.embedding_function.name())
            .field("dropped", &self.dropped.load(Ordering::Relaxed))
            .finish()
    }
}

impl Collection {
    pub(crate) fn new(
        name: &str,
        path: PathBuf,
        metric: DistanceMetric,
        embedding_function: Arc<dyn EmbeddingFunction>,
    ) -> Self {
        Self {
            name: name.to_string(),
            created_at: Utc::now(),
            path,
            index: RwLock::new(FlatIndex::new(metric)),
            embedding_function,
            dropped: AtomicBool::new(false),
        }
    }

    pub(crate) fn restore(
        path: PathBuf,
        data: CollectionData,
        embedding_function: Arc<dyn EmbeddingFunction>,
    ) -> Self {
        Self {
            name: data.metadata.name,
            created_at: data.metadata.created_at,
            path,
            index: RwLock::new(data.index),
            embedding_function,
            dropped: AtomicBool::new(false),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn embedding_function_name(&self) -> &str {
        self.embedding_function.name()
    }

    pub fn metric(&self) -> StoreResult<DistanceMetric> {
        Ok(self.read_index("metric")?.metric)
    }

    /// Vector width fixed by the first insert, `None` while empty
    pub fn dimension(&self) -> StoreResult<Option<usize>> {
        Ok(self.read_index("dimension")?.dimension)
    }

    pub fn count(&self) -> StoreResult<usize> {
        Ok(self.read_index("count")?.len())
    }

    pub fn get(&self, id: &str) -> StoreResult<Option<Record>> {
        Ok(self.read_index("get")?.get(id).cloned())
    }

    /// The first `limit` records in insertion order
    pub fn peek(&self, limit: usize) -> StoreResult<Vec<Record>> {
        Ok(self
            .read_index("peek")?
            .records
            .iter()
            .take(limit)
            .cloned()
            .collect())
    }

    /// Add records, embedding `documents` when no vectors are supplied
    ///
    /// The write is all-or-nothing: an id already in the collection, an id
    /// repeated in the call or a vector of the wrong width rejects the whole
    /// call and nothing is stored.
    pub async fn add(
        &self,
        ids: Vec<String>,
        embeddings: Option<Vec<Vec<f64>>>,
        documents: Vec<Option<String>>,
        metadatas: Vec<Metadata>,
    ) -> StoreResult<()> {
        if documents.len() != ids.len() || metadatas.len() != ids.len() {
            return Err(StoreError::Internal(format!(
                "add called with {} ids, {} documents and {} metadatas",
                ids.len(),
                documents.len(),
                metadatas.len()
            )));
        }

        let vectors = match embeddings {
            Some(vectors) if vectors.len() == ids.len() => vectors,
            Some(vectors) => {
                return Err(StoreError::Internal(format!(
                    "add called with {} ids and {} embeddings",
                    ids.len(),
                    vectors.len()
                )))
            }
            None => self.embed_documents(&ids, &documents).await?,
        };

        let records: Vec<Record> = ids
            .into_iter()
            .zip(vectors)
            .zip(documents)
            .zip(metadatas)
            .map(|(((id, values), document), metadata)| Record {
                id,
                values,
                document,
                metadata,
            })
            .collect();
        let added = records.len();

        let mut index = self.write_index("add")?;
        self.ensure_live()?;
        let before = index.len();
        index.insert_all(&self.name, records)?;
        if let Err(e) = self.persist(&index) {
            index.truncate(before);
            return Err(e);
        }
        debug!("Added {} records to collection '{}'", added, self.name);
        Ok(())
    }

    async fn embed_documents(
        &self,
        ids: &[String],
        documents: &[Option<String>],
    ) -> StoreResult<Vec<Vec<f64>>> {
        let texts = ids
            .iter()
            .zip(documents)
            .map(|(id, document)| {
                document.clone().ok_or_else(|| {
                    StoreError::Internal(format!("record '{}' has neither text nor embedding", id))
                })
            })
            .collect::<StoreResult<Vec<String>>>()?;

        let vectors = self
            .embedding_function
            .generate_embeddings_batch(&texts)
            .await?;
        if vectors.len() != texts.len() {
            return Err(StoreError::Internal(format!(
                "embedding provider '{}' returned {} vectors for {} texts",
                self.embedding_function.name(),
                vectors.len(),
                texts.len()
            )));
        }
        Ok(vectors)
    }

    /// Nearest records to `input`, at most `n_results`, closest first
    ///
    /// `filter` is a where-filter object; an empty object means no filter.
    pub async fn query(
        &self,
        input: QueryInput,
        n_results: usize,
        filter: Option<&Value>,
    ) -> StoreResult<QueryResult> {
        let filter = match filter {
            Some(value) if !is_empty_object(value) => Some(WhereFilter::parse(value)?),
            _ => None,
        };

        let query_vector = match input {
            QueryInput::Vector(vector) => vector,
            QueryInput::Text(text) => self.embedding_function.generate_embedding(&text).await?,
        };

        let index = self.read_index("query")?;
        let neighbors = index.search(&query_vector, n_results, filter.as_ref())?;

        let mut ids = Vec::with_capacity(neighbors.len());
        let mut documents = Vec::with_capacity(neighbors.len());
        let mut metadatas = Vec::with_capacity(neighbors.len());
        let mut distances = Vec::with_capacity(neighbors.len());
        for neighbor in neighbors {
            ids.push(neighbor.record.id.clone());
            documents.push(neighbor.record.document.clone());
            metadatas.push(Some(neighbor.record.metadata.clone()));
            distances.push(neighbor.distance);
        }

        Ok(QueryResult {
            ids: vec![ids],
            documents: Some(vec![documents]),
            metadatas: Some(vec![metadatas]),
            distances: Some(vec![distances]),
        })
    }

    /// Remove the given ids; unknown ids are ignored. Returns how many were removed.
    pub fn delete_ids(&self, ids: &[String]) -> StoreResult<usize> {
        self.replace_index("delete_ids", |index| Ok(index.without_ids(ids)))
    }

    /// Remove every record whose metadata matches `filter`. Returns how many were removed.
    pub fn delete_where(&self, filter: &Value) -> StoreResult<usize> {
        let filter = WhereFilter::parse(filter)?;
        self.replace_index("delete_where", |index| Ok(index.without_matching(&filter)))
    }

    fn replace_index(
        &self,
        operation: &str,
        build: impl FnOnce(&FlatIndex) -> StoreResult<(FlatIndex, usize)>,
    ) -> StoreResult<usize> {
        let mut index = self.write_index(operation)?;
        self.ensure_live()?;
        let (next, removed) = build(&index)?;
        if removed > 0 {
            self.persist(&next)?;
            *index = next;
        }
        Ok(removed)
    }

    /// Run `delete` under the index write lock and mark the handle dropped
    /// once it succeeds. Writes still in flight on other handles either finish
    /// before the delete or observe the dropped flag and fail.
    pub fn retire_with(&self, delete: impl FnOnce() -> StoreResult<()>) -> StoreResult<()> {
        let _index = self.write_index("drop")?;
        delete()?;
        self.dropped.store(true, Ordering::SeqCst);
        Ok(())
    }

    pub fn is_dropped(&self) -> bool {
        self.dropped.load(Ordering::SeqCst)
    }

    pub(crate) fn persist(&self, index: &FlatIndex) -> StoreResult<()> {
        let snapshot = CollectionSnapshot::new(
            &self.name,
            self.created_at,
            self.embedding_function.name(),
            index,
        );
        save_snapshot(&snapshot, &self.path).map_err(|e| {
            warn!("Failed to persist collection '{}': {}", self.name, e);
            StoreError::from(e)
        })
    }

    pub(crate) fn persist_current(&self) -> StoreResult<()> {
        let index = self.read_index("persist")?;
        self.persist(&index)
    }

    fn ensure_live(&self) -> StoreResult<()> {
        if self.is_dropped() {
            return Err(StoreError::CollectionNotFound {
                name: self.name.clone(),
            });
        }
        Ok(())
    }

    fn read_index(&self, operation: &str) -> StoreResult<RwLockReadGuard<'_, FlatIndex>> {
        self.index.read().map_err(|_| {
            StoreError::LockError(format!("Failed to acquire read lock for {}", operation))
        })
    }

    fn write_index(&self, operation: &str) -> StoreResult<RwLockWriteGuard<'_, FlatIndex>> {
        self.index.write().map_err(|_| {
            StoreError::LockError(format!("Failed to acquire write lock for {}", operation))
        })
    }
}

fn is_empty_object(value: &Value) -> bool {
    value.as_object().is_some_and(|o| o.is_empty())
}
