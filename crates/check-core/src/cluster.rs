//! Cluster adapter traits.
//!
//! The checker only ever reads from the clusters. Every operation here maps
//! to a single round trip (or a cursor over one), so callers can bound each
//! call with a timeout.

use async_trait::async_trait;
use bson::RawDocumentBuf;

use crate::document::{DocumentKey, IndexDefinition, Namespace};
use crate::error::ClusterError;

/// A forward-only cursor over raw documents. Dropping it closes it.
#[async_trait]
pub trait DocumentCursor: Send {
    /// Fetch the next document, or `None` once the cursor is exhausted.
    async fn advance(&mut self) -> Result<Option<RawDocumentBuf>, ClusterError>;
}

/// Query for documents in ascending `_id` order.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct OrderedFind {
    /// Only consider documents with `_id >= min_key`.
    pub min_key: Option<DocumentKey>,
    /// Number of matching documents to skip.
    pub skip: u64,
    /// Maximum number of documents to return.
    pub limit: Option<u64>,
}

impl OrderedFind {
    /// The document at `offset` in `_id` order.
    pub fn at_offset(offset: u64) -> Self {
        Self {
            min_key: None,
            skip: offset,
            limit: Some(1),
        }
    }

    /// The document `step` positions after `key` in `_id` order.
    pub fn step_from(key: DocumentKey, step: u64) -> Self {
        Self {
            min_key: Some(key),
            skip: step,
            limit: Some(1),
        }
    }
}

/// Which server-side predicate a Bernoulli sample is evaluated with.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RandomOperator {
    SampleRate,
    Rand,
}

/// A server-side random sample.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum RandomSample {
    /// Exactly `size` documents (fewer if the collection is smaller).
    Reservoir { size: u64 },
    /// Each document independently with `probability`.
    Bernoulli {
        probability: f64,
        operator: RandomOperator,
    },
}

/// Read-only access to one cluster.
///
/// Implementations are used through generics so the orchestration code is
/// compiled once per concrete adapter:
///
/// ```ignore
/// pub async fn check<S: ClusterAdapter, D: ClusterAdapter>(source: &S, destination: &D) {
///     let count = source.estimated_document_count(&ns).await?;
/// }
/// ```
#[async_trait]
pub trait ClusterAdapter: Send + Sync {
    async fn list_database_names(&self) -> Result<Vec<String>, ClusterError>;

    async fn list_collection_names(&self, database: &str) -> Result<Vec<String>, ClusterError>;

    /// Collection size from metadata; cheap but approximate.
    async fn estimated_document_count(&self, ns: &Namespace) -> Result<u64, ClusterError>;

    /// Documents in ascending `_id` order, with optional lower bound, skip and limit.
    async fn find_ordered(
        &self,
        ns: &Namespace,
        query: &OrderedFind,
    ) -> Result<Box<dyn DocumentCursor>, ClusterError>;

    /// Every document in storage order.
    async fn scan(&self, ns: &Namespace) -> Result<Box<dyn DocumentCursor>, ClusterError>;

    /// Point lookup by exact `_id` equality.
    async fn find_by_key(
        &self,
        ns: &Namespace,
        key: &DocumentKey,
    ) -> Result<Option<RawDocumentBuf>, ClusterError>;

    /// Run a server-side random sampling pipeline. Result order is unspecified.
    async fn random_sample(
        &self,
        ns: &Namespace,
        sample: &RandomSample,
    ) -> Result<Box<dyn DocumentCursor>, ClusterError>;

    /// Index specifications exactly as the server encodes them.
    async fn list_indexes(&self, ns: &Namespace) -> Result<Vec<IndexDefinition>, ClusterError>;

    /// Engine version string, e.g. `7.0.5`.
    async fn server_version(&self) -> Result<String, ClusterError>;
}

/// A cursor over documents already held in memory.
pub struct VecCursor {
    documents: std::vec::IntoIter<RawDocumentBuf>,
}

impl VecCursor {
    pub fn new(documents: Vec<RawDocumentBuf>) -> Self {
        Self {
            documents: documents.into_iter(),
        }
    }
}

#[async_trait]
impl DocumentCursor for VecCursor {
    async fn advance(&mut self) -> Result<Option<RawDocumentBuf>, ClusterError> {
        Ok(self.documents.next())
    }
}
