//! Document comparison against the destination.

use check_core::{
    canonical_eq, preview, CheckError, ClusterAdapter, ComparisonOutcome, ComparisonReport,
    ConsistencyViolation, Namespace, SampledDocument, SamplingStrategy, Side,
};
use std::time::Duration;
use tracing::{debug, info, warn};

use crate::deadline::bounded;
use crate::sampler::SampleStream;

/// Tracks matched documents against the planned total and reports each
/// whole percent above zero once.
#[derive(Debug, Clone)]
pub struct Progress {
    total: u64,
    last_percent: u64,
}

impl Progress {
    pub fn new(total: u64) -> Self {
        Self {
            total,
            last_percent: 0,
        }
    }

    /// Returns the new percentage when `matched` crosses into a higher one.
    pub fn record(&mut self, matched: u64) -> Option<u64> {
        if self.total == 0 {
            return None;
        }
        let percent = (matched.saturating_mul(100) / self.total).min(100);
        if percent <= self.last_percent {
            return None;
        }
        self.last_percent = percent;
        Some(percent)
    }
}

/// Looks up sampled source documents in the destination and compares bytes.
pub struct Comparator<'a, D: ClusterAdapter> {
    destination: &'a D,
    ns: &'a Namespace,
    call_timeout: Duration,
    tolerate_missing: bool,
    preview_limit: usize,
}

impl<'a, D: ClusterAdapter> Comparator<'a, D> {
    pub fn new(
        destination: &'a D,
        ns: &'a Namespace,
        call_timeout: Duration,
        tolerate_missing: bool,
        preview_limit: usize,
    ) -> Self {
        Self {
            destination,
            ns,
            call_timeout,
            tolerate_missing,
            preview_limit,
        }
    }

    /// Compare one source document with its counterpart by `_id`.
    pub async fn compare(&self, sampled: &SampledDocument) -> Result<ComparisonOutcome, CheckError> {
        let found = bounded(
            self.call_timeout,
            self.destination.find_by_key(self.ns, &sampled.key),
        )
        .await
        .map_err(|e| CheckError::read(Side::Destination, "point lookup", self.ns, e))?;

        Ok(match found {
            None => ComparisonOutcome::MissingInDestination {
                tolerated: self.tolerate_missing,
            },
            Some(destination) if canonical_eq(&sampled.document, &destination) => {
                ComparisonOutcome::Match
            }
            Some(destination) => ComparisonOutcome::Mismatch {
                source: sampled.document.clone(),
                destination,
            },
        })
    }

    /// Drain `samples`, comparing each document, and stop at the first fatal outcome.
    ///
    /// `report` arrives with counts and sample size filled in; it is returned
    /// with the tallies, or wrapped in [`CheckError::Consistency`] on failure.
    pub async fn run<S: SampleStream + ?Sized>(
        &self,
        samples: &mut S,
        mut report: ComparisonReport,
    ) -> Result<ComparisonReport, CheckError> {
        let total = match samples.strategy() {
            SamplingStrategy::FullScan => report.source_count,
            _ => report.sample_size,
        };
        let mut progress = Progress::new(total);

        while let Some(sampled) = samples.next().await {
            let sampled = sampled?;
            let outcome = self.compare(&sampled).await?;

            match outcome {
                ComparisonOutcome::Match => {
                    report.attempted += 1;
                    report.matched += 1;
                }
                ComparisonOutcome::MissingInDestination { tolerated: true } => {
                    warn!(
                        "Document with _id {} missing in destination {}, continuing",
                        sampled.key, self.ns
                    );
                    report.record_tolerated_miss();
                }
                ComparisonOutcome::MissingInDestination { tolerated: false } => {
                    report.attempted += 1;
                    report.first_failure = Some(ConsistencyViolation::MissingInDestination {
                        key: sampled.key,
                    });
                    return Err(CheckError::Consistency(Box::new(report)));
                }
                ComparisonOutcome::Mismatch {
                    source,
                    destination,
                } => {
                    report.attempted += 1;
                    let (source_preview, destination_preview) = match (
                        preview(&source, self.preview_limit),
                        preview(&destination, self.preview_limit),
                    ) {
                        (Some(s), Some(d)) => (Some(s), Some(d)),
                        _ => (None, None),
                    };
                    report.first_failure = Some(ConsistencyViolation::DocumentMismatch {
                        key: sampled.key,
                        source_preview,
                        destination_preview,
                    });
                    return Err(CheckError::Consistency(Box::new(report)));
                }
            }

            if let Some(percent) = progress.record(report.matched) {
                info!("{}: {}% ({}/{})", self.ns, percent, report.matched, total);
            }
        }

        debug!(
            "{}: sampler drained after {} documents",
            self.ns, report.attempted
        );
        Ok(report)
    }
}
