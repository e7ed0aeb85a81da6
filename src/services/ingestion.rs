use std::collections::HashSet;
use std::sync::Arc;

use tracing::info;

use crate::errors::{ServiceError, ServiceResult};
use crate::models::{BatchEmbeddingRequest, EmbeddingRecord, IngestAck};
use crate::Metadata;

use super::{log_failure, ServiceContext};

/// Validates and stores single records and batches
#[derive(Debug, Clone)]
pub struct IngestionService {
    context: Arc<ServiceContext>,
}

impl IngestionService {
    pub fn new(context: Arc<ServiceContext>) -> Self {
        Self { context }
    }

    /// Store one record, embedding its text when no vector is supplied
    pub async fn ingest_one(
        &self,
        collection: &str,
        record: EmbeddingRecord,
        provider: Option<&str>,
    ) -> ServiceResult<IngestAck> {
        let result = self.store_one(collection, record, provider).await;
        log_failure("ingest", collection, result)
    }

    async fn store_one(
        &self,
        collection_name: &str,
        record: EmbeddingRecord,
        provider: Option<&str>,
    ) -> ServiceResult<IngestAck> {
        if record.id.is_empty() {
            return Err(ServiceError::validation("id must not be empty"));
        }
        if record.text.is_none() && record.vector.is_none() {
            return Err(ServiceError::validation(
                "Either text or embedding must be provided",
            ));
        }

        let collection = self.context.resolve(collection_name, provider)?;
        let id = record.id;
        collection
            .add(
                vec![id.clone()],
                record.vector.map(|vector| vec![vector]),
                vec![record.text],
                vec![record.metadata],
            )
            .await?;

        info!("Added record '{}' to '{}'", id, collection_name);
        Ok(IngestAck { count: 1 })
    }

    /// Store a batch; every length invariant is checked before the store is touched
    pub async fn ingest_batch(
        &self,
        collection: &str,
        batch: BatchEmbeddingRequest,
        provider: Option<&str>,
    ) -> ServiceResult<IngestAck> {
        let result = self.store_batch(collection, batch, provider).await;
        log_failure("ingest_batch", collection, result)
    }

    async fn store_batch(
        &self,
        collection_name: &str,
        batch: BatchEmbeddingRequest,
        provider: Option<&str>,
    ) -> ServiceResult<IngestAck> {
        validate_batch(&batch)?;

        let count = batch.ids.len();
        let metadatas = batch
            .metadatas
            .unwrap_or_else(|| vec![Metadata::new(); count]);
        let documents = batch.texts.into_iter().map(Some).collect();

        let collection = self.context.resolve(collection_name, provider)?;
        collection
            .add(batch.ids, batch.vectors, documents, metadatas)
            .await?;

        info!("Added {} records to '{}'", count, collection_name);
        Ok(IngestAck { count })
    }
}

fn validate_batch(batch: &BatchEmbeddingRequest) -> ServiceResult<()> {
    let count = batch.ids.len();
    if count == 0 {
        return Err(ServiceError::validation("ids must not be empty"));
    }
    if batch.texts.len() != count {
        return Err(ServiceError::validation(format!(
            "ids and texts must have the same length ({} ids, {} texts)",
            count,
            batch.texts.len()
        )));
    }
    if let Some(metadatas) = &batch.metadatas {
        if metadatas.len() != count {
            return Err(ServiceError::validation(format!(
                "metadatas and ids must have the same length ({} ids, {} metadatas)",
                count,
                metadatas.len()
            )));
        }
    }
    if let Some(vectors) = &batch.vectors {
        if vectors.len() != count {
            return Err(ServiceError::validation(format!(
                "embeddings and ids must have the same length ({} ids, {} embeddings)",
                count,
                vectors.len()
            )));
        }
    }

    let mut seen = HashSet::with_capacity(count);
    for id in &batch.ids {
        if id.is_empty() {
            return Err(ServiceError::validation("ids must not contain empty strings"));
        }
        if !seen.insert(id.as_str()) {
            return Err(ServiceError::validation(format!("duplicate id '{}' in batch", id)));
        }
    }
    Ok(())
}
