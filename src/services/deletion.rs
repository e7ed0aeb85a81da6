use std::sync::Arc;

use tracing::info;

use crate::errors::{ServiceError, ServiceResult};
use crate::models::{DeleteAck, DeleteRequest};

use super::{log_failure, ServiceContext};

/// Record deletes, collection drops and collection listing
#[derive(Debug, Clone)]
pub struct DeletionService {
    context: Arc<ServiceContext>,
}

impl DeletionService {
    pub fn new(context: Arc<ServiceContext>) -> Self {
        Self { context }
    }

    /// Delete by ids when any are given, otherwise by the `where` predicate
    ///
    /// A by-id delete reports the number of ids requested, whether or not
    /// they existed.
    pub fn delete_records(
        &self,
        collection: &str,
        request: DeleteRequest,
        provider: Option<&str>,
    ) -> ServiceResult<DeleteAck> {
        let result = self.delete(collection, request, provider);
        log_failure("delete", collection, result)
    }

    fn delete(
        &self,
        collection_name: &str,
        request: DeleteRequest,
        provider: Option<&str>,
    ) -> ServiceResult<DeleteAck> {
        let ids = request.ids.filter(|ids| !ids.is_empty());
        let predicate = request
            .predicate
            .filter(|p| !p.as_object().is_some_and(|o| o.is_empty()));

        match (ids, predicate) {
            (Some(ids), _) => {
                let collection = self.context.resolve(collection_name, provider)?;
                let removed = collection.delete_ids(&ids)?;
                info!(
                    "Deleted {} of {} requested ids from '{}'",
                    removed,
                    ids.len(),
                    collection_name
                );
                Ok(DeleteAck::Ids(ids.len()))
            }
            (None, Some(predicate)) => {
                let collection = self.context.resolve(collection_name, provider)?;
                let removed = collection.delete_where(&predicate)?;
                info!("Deleted {} matching records from '{}'", removed, collection_name);
                Ok(DeleteAck::Predicate(Some(removed)))
            }
            (None, None) => Err(ServiceError::validation("Either ids or where must be provided")),
        }
    }

    /// Delete a collection at the store and evict it from the cache
    pub fn drop_collection(&self, name: &str) -> ServiceResult<()> {
        let result = self
            .context
            .cache
            .drop_collection(name)
            .map_err(ServiceError::from);
        let result = log_failure("drop_collection", name, result);
        if result.is_ok() {
            info!("Dropped collection '{}'", name);
        }
        result
    }

    /// Every collection the store holds, sorted
    pub fn list_collections(&self) -> ServiceResult<Vec<String>> {
        let result = self.context.cache.list_collections().map_err(ServiceError::from);
        log_failure("list_collections", "*", result)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::errors::StoreError;
    use crate::models::{BatchEmbeddingRequest, QueryRequest};
    use crate::services::{testing, IngestionService, QueryService};
    use serde_json::json;
    use tempfile::TempDir;

    async fn seed(context: &Arc<ServiceContext>) {
        IngestionService::new(context.clone())
            .ingest_batch(
                "novel",
                BatchEmbeddingRequest {
                    ids: vec!["a".into(), "b".into(), "c".into()],
                    texts: vec!["alpha".into(), "bravo".into(), "charlie".into()],
                    metadatas: Some(
                        [json!({"act": 1}), json!({"act": 1}), json!({"act": 2})]
                            .iter()
                            .map(|v| v.as_object().cloned().unwrap())
                            .collect(),
                    ),
                    vectors: None,
                },
                None,
            )
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn test_deleted_ids_leave_query_candidates() {
        let dir = TempDir::new().unwrap();
        let context = testing::context(&dir);
        seed(&context).await;
        let service = DeletionService::new(context.clone());

        let ack = service
            .delete_records(
                "novel",
                DeleteRequest {
                    ids: Some(vec!["a".into(), "b".into(), "missing".into()]),
                    predicate: None,
                },
                None,
            )
            .unwrap();
        assert_eq!(ack, DeleteAck::Ids(3));

        let request = QueryRequest {
            query_text: "alpha".into(),
            result_limit: 10,
            ..Default::default()
        };
        let items = QueryService::new(context).query("novel", request, None).await.unwrap();
        let ids: Vec<&str> = items.iter().map(|i| i.id.as_str()).collect();
        assert_eq!(ids, vec!["c"]);
    }

    #[tokio::test]
    async fn test_delete_by_predicate_reports_removed() {
        let dir = TempDir::new().unwrap();
        let context = testing::context(&dir);
        seed(&context).await;
        let service = DeletionService::new(context.clone());

        let ack = service
            .delete_records(
                "novel",
                DeleteRequest {
                    ids: Some(vec![]),
                    predicate: Some(json!({"act": 1})),
                },
                None,
            )
            .unwrap();
        assert_eq!(ack, DeleteAck::Predicate(Some(2)));
        assert_eq!(context.resolve("novel", None).unwrap().count().unwrap(), 1);
    }

    #[test]
    fn test_delete_without_ids_or_predicate_is_validation() {
        let dir = TempDir::new().unwrap();
        let context = testing::context(&dir);
        let service = DeletionService::new(context.clone());

        let request = DeleteRequest {
            ids: None,
            predicate: Some(json!({})),
        };
        let result = service.delete_records("novel", request, None);
        assert!(matches!(result, Err(ServiceError::Validation(_))));
        assert!(context.cache.is_empty());
    }

    #[test]
    fn test_drop_nonexistent_collection_keeps_others() {
        let dir = TempDir::new().unwrap();
        let context = testing::context(&dir);
        context.resolve("kept", None).unwrap();
        let service = DeletionService::new(context.clone());

        let result = service.drop_collection("x");
        assert!(matches!(
            result,
            Err(ServiceError::Store(StoreError::CollectionNotFound { .. }))
        ));
        assert_eq!(context.cache.cached_names(), vec!["kept"]);
        assert_eq!(service.list_collections().unwrap(), vec!["kept"]);
    }

    #[test]
    fn test_drop_then_list() {
        let dir = TempDir::new().unwrap();
        let context = testing::context(&dir);
        context.resolve("first", None).unwrap();
        context.resolve("second", None).unwrap();
        let service = DeletionService::new(context.clone());

        service.drop_collection("first").unwrap();
        assert_eq!(service.list_collections().unwrap(), vec!["second"]);
        assert_eq!(context.cache.cached_names(), vec!["second"]);
    }
}
