//! Request and response bodies of the HTTP API.
//!
//! Wire names follow the public API (`embedding`, `embeddings`, `n_results`,
//! `where`); the Rust field names describe what the value is.

use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;

use crate::Metadata;

pub const DEFAULT_COLLECTION: &str = "default";
pub const DEFAULT_RESULT_LIMIT: usize = 5;

/// `null` and a missing field both mean the type's default
fn null_as_default<'de, D, T>(deserializer: D) -> Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: Default + Deserialize<'de>,
{
    Ok(Option::<T>::deserialize(deserializer)?.unwrap_or_default())
}

/// An empty array means the same as an absent one
fn non_empty<'de, D, T>(deserializer: D) -> Result<Option<Vec<T>>, D::Error>
where
    D: Deserializer<'de>,
    T: Deserialize<'de>,
{
    Ok(Option::<Vec<T>>::deserialize(deserializer)?.filter(|v| !v.is_empty()))
}

fn default_result_limit() -> usize {
    DEFAULT_RESULT_LIMIT
}

fn default_collection() -> String {
    DEFAULT_COLLECTION.to_string()
}

/// A single record to ingest
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct EmbeddingRecord {
    pub id: String,
    #[serde(default)]
    pub text: Option<String>,
    #[serde(default, deserialize_with = "null_as_default")]
    pub metadata: Metadata,
    /// Pre-computed vector; the text is embedded when absent
    #[serde(
        rename = "embedding",
        default,
        deserialize_with = "non_empty",
        skip_serializing_if = "Option::is_none"
    )]
    pub vector: Option<Vec<f64>>,
}

/// Index-parallel batch of records to ingest
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct BatchEmbeddingRequest {
    pub ids: Vec<String>,
    pub texts: Vec<String>,
    #[serde(default, deserialize_with = "non_empty", skip_serializing_if = "Option::is_none")]
    pub metadatas: Option<Vec<Metadata>>,
    #[serde(
        rename = "embeddings",
        default,
        deserialize_with = "non_empty",
        skip_serializing_if = "Option::is_none"
    )]
    pub vectors: Option<Vec<Vec<f64>>>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QueryRequest {
    #[serde(default)]
    pub query_text: String,
    #[serde(
        rename = "embedding",
        default,
        deserialize_with = "non_empty",
        skip_serializing_if = "Option::is_none"
    )]
    pub vector: Option<Vec<f64>>,
    #[serde(rename = "n_results", default = "default_result_limit")]
    pub result_limit: usize,
    #[serde(rename = "where", default, skip_serializing_if = "Option::is_none")]
    pub predicate: Option<Value>,
}

impl Default for QueryRequest {
    fn default() -> Self {
        Self {
            query_text: String::new(),
            vector: None,
            result_limit: DEFAULT_RESULT_LIMIT,
            predicate: None,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DeleteRequest {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ids: Option<Vec<String>>,
    #[serde(rename = "where", default, skip_serializing_if = "Option::is_none")]
    pub predicate: Option<Value>,
}

/// One query match, closest first in a result list
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QueryResultItem {
    pub id: String,
    pub text: Option<String>,
    #[serde(default)]
    pub metadata: Metadata,
    pub distance: Option<f64>,
}

/// Outcome of a successful ingestion
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct IngestAck {
    pub count: usize,
}

/// Outcome of a successful record delete
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeleteAck {
    /// Delete by ids; the count is the number of ids requested
    Ids(usize),
    /// Delete by predicate, with the number removed when the store reports it
    Predicate(Option<usize>),
}

/// `?collection_name=..&embedding_provider=..`
#[derive(Debug, Clone, Deserialize)]
pub struct CollectionParams {
    #[serde(default = "default_collection")]
    pub collection_name: String,
    #[serde(default)]
    pub embedding_provider: Option<String>,
}

impl Default for CollectionParams {
    fn default() -> Self {
        Self {
            collection_name: default_collection(),
            embedding_provider: None,
        }
    }
}

#[derive(Debug, Serialize, Deserialize)]
pub struct StatusResponse {
    pub status: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct MessageResponse {
    pub status: String,
    pub message: String,
}

impl MessageResponse {
    pub fn ok(message: impl Into<String>) -> Self {
        Self {
            status: "ok".to_string(),
            message: message.into(),
        }
    }

    pub fn success(message: impl Into<String>) -> Self {
        Self {
            status: "success".to_string(),
            message: message.into(),
        }
    }
}

#[derive(Debug, Serialize, Deserialize)]
pub struct QueryResponse {
    pub status: String,
    pub results: Vec<QueryResultItem>,
    pub count: usize,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ListCollectionsResponse {
    pub collections: Vec<String>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub detail: String,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_record_wire_names_and_defaults() {
        let record: EmbeddingRecord =
            serde_json::from_value(json!({"id": "r1", "text": "hello", "embedding": [0.5, 1.5]})).unwrap();
        assert_eq!(record.vector, Some(vec![0.5, 1.5]));
        assert!(record.metadata.is_empty());

        let record: EmbeddingRecord =
            serde_json::from_value(json!({"id": "r2", "text": "hi", "metadata": null, "embedding": []}))
                .unwrap();
        assert_eq!(record.vector, None);
        assert!(record.metadata.is_empty());
    }

    #[test]
    fn test_batch_empty_arrays_are_absent() {
        let batch: BatchEmbeddingRequest = serde_json::from_value(json!({
            "ids": ["a"],
            "texts": ["t"],
            "metadatas": [],
            "embeddings": []
        }))
        .unwrap();
        assert_eq!(batch.metadatas, None);
        assert_eq!(batch.vectors, None);
    }

    #[test]
    fn test_query_defaults() {
        let query: QueryRequest = serde_json::from_value(json!({"query_text": "dragons"})).unwrap();
        assert_eq!(query.result_limit, DEFAULT_RESULT_LIMIT);
        assert_eq!(query.vector, None);
        assert_eq!(query.predicate, None);

        let query: QueryRequest =
            serde_json::from_value(json!({"embedding": [1.0], "n_results": 2, "where": {"k": "v"}})).unwrap();
        assert_eq!(query.query_text, "");
        assert_eq!(query.result_limit, 2);
        assert_eq!(query.predicate, Some(json!({"k": "v"})));
    }

    #[test]
    fn test_delete_request_wire_names() {
        let request: DeleteRequest = serde_json::from_value(json!({"where": {"chapter": 3}})).unwrap();
        assert_eq!(request.ids, None);
        assert_eq!(request.predicate, Some(json!({"chapter": 3})));
    }

    #[test]
    fn test_result_item_serializes_nulls() {
        let item = QueryResultItem {
            id: "a".into(),
            text: None,
            metadata: Metadata::new(),
            distance: None,
        };
        assert_eq!(
            serde_json::to_value(&item).unwrap(),
            json!({"id": "a", "text": null, "metadata": {}, "distance": null})
        );
    }
}
