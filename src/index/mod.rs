//! # Index Module
//!
//! Vector index backing each collection, and the distance metrics it ranks by.
//!
//! ### FlatIndex
//! - **Complexity**: O(n) search, O(n) insert (ids are checked for uniqueness)
//! - **Accuracy**: exact; every stored vector is scored
//!
//! Distances follow the "lower is closer" convention for every metric.

pub mod flat;

pub use flat::{FlatIndex, Neighbor};

use serde::{Deserialize, Serialize};

/// Distance metric a collection ranks its records by
///
/// Fixed when the collection is created and persisted with it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum DistanceMetric {
    /// Squared Euclidean distance
    #[default]
    L2,
    /// One minus cosine similarity
    Cosine,
    /// One minus inner product
    Ip,
}

impl DistanceMetric {
    pub fn distance(&self, a: &[f64], b: &[f64]) -> f64 {
        match self {
            DistanceMetric::L2 => a.iter().zip(b).map(|(x, y)| (x - y) * (x - y)).sum(),
            DistanceMetric::Cosine => 1.0 - cosine_similarity(a, b),
            DistanceMetric::Ip => 1.0 - a.iter().zip(b).map(|(x, y)| x * y).sum::<f64>(),
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            DistanceMetric::L2 => "l2",
            DistanceMetric::Cosine => "cosine",
            DistanceMetric::Ip => "ip",
        }
    }
}

pub fn cosine_similarity(a: &[f64], b: &[f64]) -> f64 {
    let (mut dot, mut norm_a_sq, mut norm_b_sq) = (0.0, 0.0, 0.0);

    for (&x, &y) in a.iter().zip(b.iter()) {
        dot += x * y;
        norm_a_sq += x * x;
        norm_b_sq += y * y;
    }

    let norm_a = f64::sqrt(norm_a_sq);
    let norm_b = f64::sqrt(norm_b_sq);

    if norm_a == 0.0 || norm_b == 0.0 {
        0.0
    } else {
        dot / (norm_a * norm_b)
    }
}
