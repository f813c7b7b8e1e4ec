//! Core types for mongo-check.
//!
//! This crate holds the data model shared by the samplers, comparators and
//! cluster adapters: documents keyed by `_id` and compared by their exact
//! BSON bytes, sample sizing and strategy selection, the [`ClusterAdapter`]
//! trait every backend implements, and the error taxonomy.

pub mod cluster;
pub mod document;
pub mod error;
pub mod memory;
pub mod report;
pub mod sampling;

pub use cluster::{
    ClusterAdapter, DocumentCursor, OrderedFind, RandomOperator, RandomSample, VecCursor,
};
pub use document::{
    canonical_eq, compare_bson, preview, DocumentKey, IndexDefinition, Namespace,
    SampledDocument, KEY_FIELD,
};
pub use error::{BoxError, CheckError, ClusterError, ConsistencyViolation, Side};
pub use memory::MemoryCluster;
pub use report::{ComparisonOutcome, ComparisonReport, DatabaseReport};
pub use sampling::{RandomMode, SampleSpec, SamplingMode, SamplingStrategy};
