use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

/// Column holding the element of a single-value dataset.
pub const COLUMN_NAME: &str = "value";

/// The sixteen dataflow operators a worker can run on a partition.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Operation {
    FlatMap,
    MapToPair,
    FlatMapToPair,
    PairFlatMap,
    PairFlatMapToPair,
    FoldByKey,
    Fold,
    GroupBy,
    Sample,
    Intersection,
    Distinct,
    FromTable,
    Join,
    Cogroup,
    Filter,
    MapPartitions,
}

impl Operation {
    pub const ALL: [Operation; 16] = [
        Operation::FlatMap,
        Operation::MapToPair,
        Operation::FlatMapToPair,
        Operation::PairFlatMap,
        Operation::PairFlatMapToPair,
        Operation::FoldByKey,
        Operation::Fold,
        Operation::GroupBy,
        Operation::Sample,
        Operation::Intersection,
        Operation::Distinct,
        Operation::FromTable,
        Operation::Join,
        Operation::Cogroup,
        Operation::Filter,
        Operation::MapPartitions,
    ];

    /// HTTP path of the operator endpoint.
    pub fn path(&self) -> &'static str {
        match self {
            Operation::FlatMap => "/rdd/flatMap",
            Operation::MapToPair => "/rdd/mapToPair",
            Operation::FlatMapToPair => "/rdd/flatMapToPair",
            Operation::PairFlatMap => "/pairRdd/flatMap",
            Operation::PairFlatMapToPair => "/pairRdd/flatMapToPair",
            Operation::FoldByKey => "/pairRdd/foldByKey",
            Operation::Fold => "/rdd/fold",
            Operation::GroupBy => "/rdd/groupBy",
            Operation::Sample => "/rdd/sample",
            Operation::Intersection => "/rdd/intersection",
            Operation::Distinct => "/rdd/distinct",
            Operation::FromTable => "/context/fromTable",
            Operation::Join => "/pairRdd/join",
            Operation::Cogroup => "/pairRdd/cogroup",
            Operation::Filter => "/rdd/filter",
            Operation::MapPartitions => "/rdd/mapPartitions",
        }
    }

    /// Operators that need a zero element.
    pub fn requires_zero(&self) -> bool {
        matches!(self, Operation::Fold | Operation::FoldByKey)
    }
}

/// A `(key, value)` element of a pair dataset.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Pair {
    pub key: String,
    pub value: String,
}

impl Pair {
    pub fn new(key: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            key: key.into(),
            value: value.into(),
        }
    }
}

/// Lowercase hex SHA-256 of `text`.
pub fn hash(text: &str) -> String {
    Sha256::digest(text.as_bytes())
        .iter()
        .map(|b| format!("{:02x}", b))
        .collect()
}

/// Deterministic key for the `i`-th output derived from `key`.
///
/// Re-running an operator over the same partition reproduces the same keys,
/// so retries overwrite instead of duplicating.
pub fn unique_row_key(key: &str, i: usize) -> String {
    hash(&format!("{}!{}", key, i))
}
