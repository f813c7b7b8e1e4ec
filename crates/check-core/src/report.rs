//! Comparison outcomes and reports.

use bson::RawDocumentBuf;
use serde::Serialize;
use std::time::Duration;

use crate::document::Namespace;
use crate::error::ConsistencyViolation;
use crate::sampling::SamplingStrategy;

/// Result of checking one sampled document against the destination.
#[derive(Debug, Clone, PartialEq)]
pub enum ComparisonOutcome {
    Match,
    Mismatch {
        source: RawDocumentBuf,
        destination: RawDocumentBuf,
    },
    MissingInDestination {
        tolerated: bool,
    },
}

impl ComparisonOutcome {
    pub fn is_fatal(&self) -> bool {
        match self {
            Self::Match => false,
            Self::Mismatch { .. } => true,
            Self::MissingInDestination { tolerated } => !tolerated,
        }
    }
}

/// Report for one collection.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ComparisonReport {
    pub namespace: Namespace,
    pub strategy: Option<SamplingStrategy>,
    pub source_count: u64,
    pub destination_count: u64,
    /// Target number of documents for the chosen strategy.
    pub sample_size: u64,
    /// Documents pulled from the source and looked up in the destination.
    pub attempted: u64,
    pub matched: u64,
    pub tolerated_misses: u64,
    pub indexes_compared: Option<usize>,
    pub first_failure: Option<ConsistencyViolation>,
    #[serde(with = "duration_millis")]
    pub duration: Duration,
}

impl ComparisonReport {
    pub fn new(namespace: Namespace) -> Self {
        Self {
            namespace,
            strategy: None,
            source_count: 0,
            destination_count: 0,
            sample_size: 0,
            attempted: 0,
            matched: 0,
            tolerated_misses: 0,
            indexes_compared: None,
            first_failure: None,
            duration: Duration::ZERO,
        }
    }

    pub fn is_success(&self) -> bool {
        self.first_failure.is_none()
    }

    pub fn record_tolerated_miss(&mut self) {
        self.attempted += 1;
        self.tolerated_misses += 1;
    }

    pub fn summary(&self) -> String {
        match &self.first_failure {
            None => format!(
                "collection {} checked: {} sampled, {} matched, {} missing in destination (tolerated) in {:?}",
                self.namespace, self.attempted, self.matched, self.tolerated_misses, self.duration
            ),
            Some(violation) => format!(
                "collection {} FAILED after {} matched: {}",
                self.namespace, self.matched, violation
            ),
        }
    }
}

/// Report for a whole invocation.
#[derive(Debug, Clone, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DatabaseReport {
    pub database: String,
    pub collections: Vec<ComparisonReport>,
    #[serde(with = "duration_millis")]
    pub duration: Duration,
}

impl DatabaseReport {
    pub fn new(database: impl Into<String>) -> Self {
        Self {
            database: database.into(),
            ..Default::default()
        }
    }

    pub fn total_matched(&self) -> u64 {
        self.collections.iter().map(|c| c.matched).sum()
    }

    pub fn total_tolerated_misses(&self) -> u64 {
        self.collections.iter().map(|c| c.tolerated_misses).sum()
    }

    pub fn summary(&self) -> String {
        format!(
            "all {} collection(s) in '{}' checked: {} documents matched, {} tolerated misses in {:?}",
            self.collections.len(),
            self.database,
            self.total_matched(),
            self.total_tolerated_misses(),
            self.duration
        )
    }
}

mod duration_millis {
    use serde::Serializer;
    use std::time::Duration;

    pub fn serialize<S: Serializer>(d: &Duration, s: S) -> Result<S::Ok, S::Error> {
        s.serialize_u64(d.as_millis() as u64)
    }
}
