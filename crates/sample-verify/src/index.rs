//! Index definition comparison.

use check_core::{
    CheckError, ClusterAdapter, ComparisonReport, ConsistencyViolation, IndexDefinition,
    Namespace, Side,
};
use std::time::Duration;
use tracing::info;

use crate::deadline::bounded;

/// Compare two index lists as sets of canonical encodings.
///
/// Returns the number of indexes when both sides agree.
pub fn diff_index_sets(
    mut source: Vec<IndexDefinition>,
    mut destination: Vec<IndexDefinition>,
) -> Result<usize, ConsistencyViolation> {
    if source.len() != destination.len() {
        return Err(ConsistencyViolation::IndexCountMismatch {
            source_count: source.len(),
            destination_count: destination.len(),
        });
    }
    source.sort();
    destination.sort();
    for (s, d) in source.iter().zip(&destination) {
        if s != d {
            return Err(ConsistencyViolation::IndexMismatch {
                source_index: s.to_string(),
                destination_index: d.to_string(),
            });
        }
    }
    Ok(source.len())
}

/// List indexes on both sides and compare them, recording the result in `report`.
pub async fn compare_indexes<S: ClusterAdapter, D: ClusterAdapter>(
    source: &S,
    destination: &D,
    ns: &Namespace,
    call_timeout: Duration,
    mut report: ComparisonReport,
) -> Result<ComparisonReport, CheckError> {
    let source_indexes = bounded(call_timeout, source.list_indexes(ns))
        .await
        .map_err(|e| CheckError::read(Side::Source, "list indexes", ns, e))?;
    let destination_indexes = bounded(call_timeout, destination.list_indexes(ns))
        .await
        .map_err(|e| CheckError::read(Side::Destination, "list indexes", ns, e))?;

    match diff_index_sets(source_indexes, destination_indexes) {
        Ok(count) => {
            info!("{ns}: {count} index(es) identical");
            report.indexes_compared = Some(count);
            Ok(report)
        }
        Err(violation) => {
            report.first_failure = Some(violation);
            Err(CheckError::Consistency(Box::new(report)))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bson::{doc, Document, RawDocumentBuf};
    use check_core::MemoryCluster;

    fn index(spec: Document) -> IndexDefinition {
        IndexDefinition::new(RawDocumentBuf::from_document(&spec).unwrap())
    }

    fn id_index() -> IndexDefinition {
        index(doc! { "v": 2, "key": { "_id": 1 }, "name": "_id_" })
    }

    fn email_index() -> IndexDefinition {
        index(doc! { "v": 2, "key": { "email": 1 }, "name": "email_1", "unique": true })
    }

    #[test]
    fn test_order_does_not_matter() {
        let result = diff_index_sets(
            vec![id_index(), email_index()],
            vec![email_index(), id_index()],
        );
        assert_eq!(result, Ok(2));
    }

    #[test]
    fn test_count_mismatch_reported_before_content() {
        let result = diff_index_sets(vec![id_index(), email_index()], vec![id_index()]);
        assert_eq!(
            result,
            Err(ConsistencyViolation::IndexCountMismatch {
                source_count: 2,
                destination_count: 1,
            })
        );
    }

    #[test]
    fn test_option_difference_is_a_mismatch() {
        let relaxed = index(doc! { "v": 2, "key": { "email": 1 }, "name": "email_1" });
        let result = diff_index_sets(vec![id_index(), email_index()], vec![id_index(), relaxed]);
        assert!(matches!(
            result,
            Err(ConsistencyViolation::IndexMismatch { .. })
        ));
    }

    #[tokio::test]
    async fn test_compare_indexes_records_count() {
        let ns = Namespace::new("db", "users");
        let source = MemoryCluster::new("7.0.0");
        let destination = MemoryCluster::new("7.0.0");
        for cluster in [&source, &destination] {
            cluster.create_collection(&ns).unwrap();
            cluster
                .create_index(&ns, doc! { "v": 2, "key": { "email": 1 }, "name": "email_1" })
                .unwrap();
        }

        let report = compare_indexes(
            &source,
            &destination,
            &ns,
            Duration::from_secs(5),
            ComparisonReport::new(ns.clone()),
        )
        .await
        .unwrap();
        assert_eq!(report.indexes_compared, Some(2));
    }

    #[tokio::test]
    async fn test_compare_indexes_missing_index_fails() {
        let ns = Namespace::new("db", "users");
        let source = MemoryCluster::new("7.0.0");
        let destination = MemoryCluster::new("7.0.0");
        source.create_collection(&ns).unwrap();
        destination.create_collection(&ns).unwrap();
        source
            .create_index(&ns, doc! { "v": 2, "key": { "email": 1 }, "name": "email_1" })
            .unwrap();

        let err = compare_indexes(
            &source,
            &destination,
            &ns,
            Duration::from_secs(5),
            ComparisonReport::new(ns.clone()),
        )
        .await
        .unwrap_err();
        assert!(matches!(
            err.violation(),
            Some(ConsistencyViolation::IndexCountMismatch {
                source_count: 2,
                destination_count: 1
            })
        ));
    }
}
