//! # Flat Index Implementation
//!
//! Stores records in insertion order and answers queries by scoring every
//! record against the query vector.
//!
//! ## Performance Characteristics
//!
//! - **Search Complexity**: O(n) - must check every vector
//! - **Insert Complexity**: O(n) - ids are checked for uniqueness
//! - **Accuracy**: 100% - exact search results
//!
//! # Examples
//!
//! ```rust
//! use embedding_store::{DistanceMetric, FlatIndex, Record};
//!
//! # fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let mut index = FlatIndex::new(DistanceMetric::L2);
//! let record = Record { id: "a".into(), values: vec![1.0, 2.0, 3.0], document: None, metadata: Default::default() };
//!
//! index.insert_all("docs", vec![record])?;
//! let neighbors = index.search(&[1.1, 2.1, 3.1], 5, None)?;
//! assert_eq!(neighbors[0].record.id, "a");
//! # Ok(())
//! # }
//! ```

use std::collections::HashSet;

use serde::{Deserialize, Serialize};

use crate::errors::{StoreError, StoreResult};
use crate::filter::WhereFilter;
use crate::index::DistanceMetric;
use crate::Record;

/// Exact vector index over a collection's records
///
/// The dimension is unset until the first record is inserted; every later
/// record and query vector must match it.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct FlatIndex {
    pub dimension: Option<usize>,
    pub metric: DistanceMetric,
    pub records: Vec<Record>,
}

/// A scored match returned by [`FlatIndex::search`]
#[derive(Debug, Clone, Copy)]
pub struct Neighbor<'a> {
    pub record: &'a Record,
    pub distance: f64,
}

impl FlatIndex {
    pub fn new(metric: DistanceMetric) -> Self {
        Self {
            dimension: None,
            metric,
            records: Vec::new(),
        }
    }

    /// Insert all records or none of them
    pub fn insert_all(&mut self, collection: &str, records: Vec<Record>) -> StoreResult<()> {
        let Some(first) = records.first() else {
            return Ok(());
        };
        let expected = self.dimension.unwrap_or(first.values.len());
        if expected == 0 {
            return Err(StoreError::Internal(format!(
                "record '{}' has an empty vector",
                first.id
            )));
        }

        let mut seen: HashSet<&str> = self.records.iter().map(|r| r.id.as_str()).collect();
        for record in &records {
            if record.values.len() != expected {
                return Err(StoreError::DimensionMismatch {
                    expected,
                    actual: record.values.len(),
                });
            }
            if !seen.insert(record.id.as_str()) {
                return Err(StoreError::DuplicateId {
                    collection: collection.to_string(),
                    id: record.id.clone(),
                });
            }
        }

        self.dimension = Some(expected);
        self.records.extend(records);
        Ok(())
    }

    /// Drop every record past `len`; undoes a failed [`insert_all`](Self::insert_all)
    pub fn truncate(&mut self, len: usize) {
        self.records.truncate(len);
        if self.records.is_empty() {
            self.dimension = None;
        }
    }

    /// The `k` closest records, optionally restricted by a metadata filter,
    /// in non-decreasing distance order. Ties keep insertion order.
    pub fn search(
        &self,
        query: &[f64],
        k: usize,
        filter: Option<&WhereFilter>,
    ) -> StoreResult<Vec<Neighbor<'_>>> {
        let Some(dimension) = self.dimension else {
            return Ok(Vec::new());
        };
        if query.len() != dimension {
            return Err(StoreError::DimensionMismatch {
                expected: dimension,
                actual: query.len(),
            });
        }

        let mut neighbors: Vec<Neighbor<'_>> = self
            .records
            .iter()
            .filter(|r| filter.map_or(true, |f| f.matches(&r.metadata)))
            .map(|record| Neighbor {
                record,
                distance: self.metric.distance(&record.values, query),
            })
            .collect();

        neighbors.sort_by(|a, b| a.distance.total_cmp(&b.distance));
        neighbors.truncate(k);
        Ok(neighbors)
    }

    /// Copy of this index without the given ids, plus how many were removed
    pub fn without_ids(&self, ids: &[String]) -> (FlatIndex, usize) {
        let doomed: HashSet<&str> = ids.iter().map(String::as_str).collect();
        self.retain_clone(|r| !doomed.contains(r.id.as_str()))
    }

    /// Copy of this index without records matching `filter`, plus how many were removed
    pub fn without_matching(&self, filter: &WhereFilter) -> (FlatIndex, usize) {
        self.retain_clone(|r| !filter.matches(&r.metadata))
    }

    fn retain_clone(&self, keep: impl Fn(&Record) -> bool) -> (FlatIndex, usize) {
        let records: Vec<Record> = self.records.iter().filter(|r| keep(r)).cloned().collect();
        let removed = self.records.len() - records.len();
        let dimension = if records.is_empty() { None } else { self.dimension };
        (
            FlatIndex {
                dimension,
                metric: self.metric,
                records,
            },
            removed,
        )
    }

    pub fn get(&self, id: &str) -> Option<&Record> {
        self.records.iter().find(|r| r.id == id)
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}
