use std::sync::Arc;

use serde_json::Value;
use tracing::info;

use crate::errors::{ServiceError, ServiceResult};
use crate::models::{QueryRequest, QueryResultItem};
use crate::store::{QueryInput, QueryResult};

use super::{log_failure, ServiceContext};

/// Runs similarity queries and flattens the store's positional answer
#[derive(Debug, Clone)]
pub struct QueryService {
    context: Arc<ServiceContext>,
}

impl QueryService {
    pub fn new(context: Arc<ServiceContext>) -> Self {
        Self { context }
    }

    /// Closest records to the request's vector, or to its text when no vector
    /// is given, in the order the store ranked them
    pub async fn query(
        &self,
        collection: &str,
        request: QueryRequest,
        provider: Option<&str>,
    ) -> ServiceResult<Vec<QueryResultItem>> {
        let result = self.run(collection, request, provider).await;
        log_failure("query", collection, result)
    }

    async fn run(
        &self,
        collection_name: &str,
        request: QueryRequest,
        provider: Option<&str>,
    ) -> ServiceResult<Vec<QueryResultItem>> {
        if request.result_limit == 0 {
            return Err(ServiceError::validation("n_results must be a positive integer"));
        }
        let input = match request.vector {
            Some(vector) => QueryInput::Vector(vector),
            None if request.query_text.is_empty() => {
                return Err(ServiceError::validation(
                    "Either query_text or embedding must be provided",
                ))
            }
            None => QueryInput::Text(request.query_text),
        };
        let predicate = request.predicate.filter(|p| !is_empty_object(p));

        let collection = self.context.resolve(collection_name, provider)?;
        let result = collection
            .query(input, request.result_limit, predicate.as_ref())
            .await?;

        let items = reshape(result);
        info!("Query on '{}' returned {} results", collection_name, items.len());
        Ok(items)
    }
}

fn is_empty_object(value: &Value) -> bool {
    value.as_object().is_some_and(|o| o.is_empty())
}

/// Flatten the first row of a positional answer into result items
///
/// Missing documents and distances become `None`, missing metadata an empty map.
pub fn reshape(result: QueryResult) -> Vec<QueryResultItem> {
    let QueryResult {
        ids,
        documents,
        metadatas,
        distances,
    } = result;

    let Some(ids) = ids.into_iter().next() else {
        return Vec::new();
    };
    let mut documents = first_row(documents).into_iter();
    let mut metadatas = first_row(metadatas).into_iter();
    let mut distances = first_row(distances).into_iter();

    ids.into_iter()
        .map(|id| QueryResultItem {
            id,
            text: documents.next().flatten(),
            metadata: metadatas.next().flatten().unwrap_or_default(),
            distance: distances.next(),
        })
        .collect()
}

fn first_row<T>(rows: Option<Vec<Vec<T>>>) -> Vec<T> {
    rows.and_then(|rows| rows.into_iter().next()).unwrap_or_default()
}
