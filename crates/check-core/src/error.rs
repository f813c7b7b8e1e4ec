//! Error types for consistency checks.

use std::fmt;
use std::time::Duration;
use thiserror::Error;

use crate::document::{DocumentKey, Namespace};
use crate::report::ComparisonReport;

pub type BoxError = Box<dyn std::error::Error + Send + Sync>;

/// Which side of the migration an operation ran against.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Side {
    Source,
    Destination,
}

impl fmt::Display for Side {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Source => write!(f, "source"),
            Self::Destination => write!(f, "destination"),
        }
    }
}

/// Errors raised by a cluster adapter.
#[derive(Error, Debug)]
pub enum ClusterError {
    /// Could not reach or authenticate against the cluster.
    #[error("connection error: {0}")]
    Connect(#[source] BoxError),

    /// A query, command or cursor advance failed.
    #[error("query error: {0}")]
    Query(#[source] BoxError),

    /// The call did not complete within the per-call timeout.
    #[error("operation timed out after {0:?}")]
    Timeout(Duration),

    /// A returned document could not be decoded.
    #[error("malformed document: {0}")]
    MalformedDocument(String),
}

impl ClusterError {
    pub fn connect(err: impl Into<BoxError>) -> Self {
        Self::Connect(err.into())
    }

    pub fn query(err: impl Into<BoxError>) -> Self {
        Self::Query(err.into())
    }
}

/// The first sign of drift between source and destination.
#[derive(Error, Debug, Clone, PartialEq, serde::Serialize)]
#[serde(tag = "kind", rename_all = "camelCase")]
pub enum ConsistencyViolation {
    #[error("document mismatch for _id {key}{}", render_previews(.source_preview, .destination_preview))]
    DocumentMismatch {
        key: DocumentKey,
        source_preview: Option<String>,
        destination_preview: Option<String>,
    },

    #[error("document with _id {key} missing in destination")]
    MissingInDestination { key: DocumentKey },

    #[error("index count differs: source {source_count}, destination {destination_count}")]
    IndexCountMismatch {
        source_count: usize,
        destination_count: usize,
    },

    #[error("index definitions differ: source {source_index}, destination {destination_index}")]
    IndexMismatch {
        source_index: String,
        destination_index: String,
    },
}

fn render_previews(source: &Option<String>, destination: &Option<String>) -> String {
    match (source, destination) {
        (Some(s), Some(d)) => format!("\nsource:      {s}\ndestination: {d}"),
        _ => String::new(),
    }
}

/// Fatal conditions that stop the whole invocation.
#[derive(Error, Debug)]
pub enum CheckError {
    #[error("failed to connect to {side} cluster: {source}")]
    Connectivity {
        side: Side,
        #[source]
        source: ClusterError,
    },

    #[error("{side} {kind} '{name}' does not exist")]
    NotFound {
        side: Side,
        kind: &'static str,
        name: String,
    },

    #[error("{side} {operation} failed for {target}: {source}")]
    Read {
        side: Side,
        operation: &'static str,
        target: String,
        #[source]
        source: ClusterError,
    },

    #[error(
        "consistency violation in {}: {}",
        .0.namespace,
        .0.first_failure.as_ref().map(ToString::to_string).unwrap_or_default()
    )]
    Consistency(Box<ComparisonReport>),

    #[error("{side} cluster version {version} does not support {feature}: {reason}")]
    Capability {
        side: Side,
        version: String,
        feature: String,
        reason: String,
    },

    #[error("invalid configuration: {0}")]
    InvalidConfig(String),
}

impl CheckError {
    pub fn read(
        side: Side,
        operation: &'static str,
        target: impl fmt::Display,
        source: ClusterError,
    ) -> Self {
        Self::Read {
            side,
            operation,
            target: target.to_string(),
            source,
        }
    }

    pub fn collection_not_found(side: Side, ns: &Namespace) -> Self {
        Self::NotFound {
            side,
            kind: "collection",
            name: ns.to_string(),
        }
    }

    pub fn database_not_found(side: Side, database: &str) -> Self {
        Self::NotFound {
            side,
            kind: "database",
            name: database.to_string(),
        }
    }

    /// The violation that halted the run, if this is a consistency failure.
    pub fn violation(&self) -> Option<&ConsistencyViolation> {
        match self {
            Self::Consistency(report) => report.first_failure.as_ref(),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_mismatch_message_includes_previews() {
        let v = ConsistencyViolation::DocumentMismatch {
            key: DocumentKey::new(7_i32),
            source_preview: Some("{ \"_id\": 7, \"a\": 1 }".to_string()),
            destination_preview: Some("{ \"_id\": 7, \"a\": 2 }".to_string()),
        };
        let msg = v.to_string();
        assert!(msg.contains("_id 7"));
        assert!(msg.contains("\"a\": 2"));
    }

    #[test]
    fn test_mismatch_message_without_previews() {
        let v = ConsistencyViolation::DocumentMismatch {
            key: DocumentKey::new("abc"),
            source_preview: None,
            destination_preview: None,
        };
        assert_eq!(v.to_string(), "document mismatch for _id \"abc\"");
    }

    #[test]
    fn test_consistency_error_names_collection() {
        let mut report = ComparisonReport::new(Namespace::new("db", "users"));
        report.first_failure = Some(ConsistencyViolation::MissingInDestination {
            key: DocumentKey::new(500_i32),
        });
        let err = CheckError::Consistency(Box::new(report));
        let msg = err.to_string();
        assert!(msg.contains("db.users"));
        assert!(msg.contains("500"));
        assert!(err.violation().is_some());
    }

    #[test]
    fn test_read_error_message() {
        let err = CheckError::read(
            Side::Destination,
            "point lookup",
            "db.users",
            ClusterError::Timeout(Duration::from_secs(60)),
        );
        assert_eq!(
            err.to_string(),
            "destination point lookup failed for db.users: operation timed out after 60s"
        );
    }
}
