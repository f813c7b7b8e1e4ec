//! Sampling strategies.
//!
//! Each strategy is a lazy, finite, single-pass stream of source documents.
//! The comparator pulls from it one document at a time, so at most one
//! round trip to the source is outstanding.

use async_trait::async_trait;
use check_core::{
    CheckError, ClusterAdapter, DocumentCursor, DocumentKey, Namespace, OrderedFind,
    RandomMode, RandomOperator, RandomSample, SampleSpec, SampledDocument, SamplingStrategy,
    Side,
};
use rand::Rng;
use std::time::Duration;
use tracing::{debug, warn};

use crate::deadline::bounded;

/// `$sample` falls back to a top-k sort above this fraction of the collection.
pub const SAMPLE_STAGE_COST_THRESHOLD: f64 = 0.05;

/// A stream of sampled source documents.
#[async_trait]
pub trait SampleStream: Send {
    /// Get the next sampled document, or `None` when the sample is complete.
    async fn next(&mut self) -> Option<Result<SampledDocument, CheckError>>;

    fn strategy(&self) -> SamplingStrategy;
}

/// Open the stream for `spec.strategy` over `ns` on the source cluster.
///
/// `rng` is only consulted here (for the skip walk's start offset); the
/// returned stream is otherwise deterministic given the cluster's contents.
pub fn open_sampler<'a, C: ClusterAdapter, R: Rng>(
    source: &'a C,
    ns: &Namespace,
    spec: &SampleSpec,
    call_timeout: Duration,
    rng: &mut R,
) -> Box<dyn SampleStream + 'a> {
    match spec.strategy {
        SamplingStrategy::SkipWalk => {
            Box::new(SkipWalk::new(source, ns.clone(), spec, call_timeout, rng))
        }
        SamplingStrategy::RandomPredicate(mode) => {
            if mode == RandomMode::Sample
                && spec.estimated_source_size > 0
                && spec.sample_size() as f64 / spec.estimated_source_size as f64
                    > SAMPLE_STAGE_COST_THRESHOLD
            {
                warn!(
                    "$sample of {} from {} documents in {} exceeds {}% of the collection and will use a top-k sort",
                    spec.sample_size(),
                    spec.estimated_source_size,
                    ns,
                    SAMPLE_STAGE_COST_THRESHOLD * 100.0
                );
            }
            Box::new(RandomPredicate::new(source, ns.clone(), mode, spec, call_timeout))
        }
        SamplingStrategy::FullScan => Box::new(FullScan::new(source, ns.clone(), call_timeout)),
    }
}

fn read_error(operation: &'static str, ns: &Namespace, err: check_core::ClusterError) -> CheckError {
    CheckError::read(Side::Source, operation, ns, err)
}

/// A cursor opened on first use and drained one document per call.
struct LazyCursor<'a, C: ClusterAdapter> {
    source: &'a C,
    ns: Namespace,
    call_timeout: Duration,
    cursor: Option<Box<dyn DocumentCursor>>,
    done: bool,
}

impl<'a, C: ClusterAdapter> LazyCursor<'a, C> {
    fn new(source: &'a C, ns: Namespace, call_timeout: Duration) -> Self {
        Self {
            source,
            ns,
            call_timeout,
            cursor: None,
            done: false,
        }
    }

    async fn next_document(
        &mut self,
        sample: Option<&RandomSample>,
    ) -> Result<Option<SampledDocument>, CheckError> {
        if self.done {
            return Ok(None);
        }
        if self.cursor.is_none() {
            let opened = match sample {
                Some(sample) => bounded(
                    self.call_timeout,
                    self.source.random_sample(&self.ns, sample),
                )
                .await
                .map_err(|e| read_error("random sample", &self.ns, e))?,
                None => bounded(self.call_timeout, self.source.scan(&self.ns))
                    .await
                    .map_err(|e| read_error("scan", &self.ns, e))?,
            };
            self.cursor = Some(opened);
        }
        let Some(cursor) = self.cursor.as_mut() else {
            return Ok(None);
        };
        let next = bounded(self.call_timeout, cursor.advance())
            .await
            .map_err(|e| read_error("cursor advance", &self.ns, e))?;
        match next {
            Some(raw) => SampledDocument::from_raw(raw)
                .map(Some)
                .map_err(|e| read_error("cursor advance", &self.ns, e)),
            None => {
                self.done = true;
                self.cursor = None;
                Ok(None)
            }
        }
    }
}

/// Walk the collection in `_id` order, taking one document every `step_size`
/// positions from a random start offset.
pub struct SkipWalk<'a, C: ClusterAdapter> {
    source: &'a C,
    ns: Namespace,
    call_timeout: Duration,
    start_offset: u64,
    step_size: u64,
    remaining: u64,
    last_key: Option<DocumentKey>,
    exhausted: bool,
}

impl<'a, C: ClusterAdapter> SkipWalk<'a, C> {
    pub fn new<R: Rng>(
        source: &'a C,
        ns: Namespace,
        spec: &SampleSpec,
        call_timeout: Duration,
        rng: &mut R,
    ) -> Self {
        let sample_size = spec.sample_size();
        let spread = match sample_size {
            0 => 0,
            n => spec.estimated_source_size % n,
        };
        let start_offset = if spread == 0 {
            0
        } else {
            rng.random_range(0..spread)
        };
        Self {
            source,
            ns,
            call_timeout,
            start_offset,
            step_size: spec.step_size(),
            remaining: sample_size,
            last_key: None,
            exhausted: false,
        }
    }

    pub fn start_offset(&self) -> u64 {
        self.start_offset
    }

    pub fn step_size(&self) -> u64 {
        self.step_size
    }

    async fn fetch_next(&mut self) -> Result<Option<SampledDocument>, CheckError> {
        if self.exhausted || self.remaining == 0 {
            return Ok(None);
        }
        let query = match &self.last_key {
            None => OrderedFind::at_offset(self.start_offset),
            Some(key) => OrderedFind::step_from(key.clone(), self.step_size),
        };

        let mut cursor = bounded(self.call_timeout, self.source.find_ordered(&self.ns, &query))
            .await
            .map_err(|e| read_error("ordered find", &self.ns, e))?;
        let found = bounded(self.call_timeout, cursor.advance())
            .await
            .map_err(|e| read_error("cursor advance", &self.ns, e))?;

        let Some(raw) = found else {
            debug!(
                "Source {} exhausted after key {:?} with {} samples left (step {})",
                self.ns,
                self.last_key.as_ref().map(ToString::to_string),
                self.remaining,
                self.step_size
            );
            self.exhausted = true;
            return Ok(None);
        };

        let sampled =
            SampledDocument::from_raw(raw).map_err(|e| read_error("ordered find", &self.ns, e))?;
        self.remaining -= 1;
        self.last_key = Some(sampled.key.clone());
        Ok(Some(sampled))
    }
}

#[async_trait]
impl<'a, C: ClusterAdapter> SampleStream for SkipWalk<'a, C> {
    async fn next(&mut self) -> Option<Result<SampledDocument, CheckError>> {
        self.fetch_next().await.transpose()
    }

    fn strategy(&self) -> SamplingStrategy {
        SamplingStrategy::SkipWalk
    }
}

/// Let the server choose documents with `$sample`, `$sampleRate` or `$rand`.
///
/// With the predicate modes each document is included independently, so the
/// number of documents returned varies around the sample size.
pub struct RandomPredicate<'a, C: ClusterAdapter> {
    mode: RandomMode,
    sample: RandomSample,
    cursor: LazyCursor<'a, C>,
}

impl<'a, C: ClusterAdapter> RandomPredicate<'a, C> {
    pub fn new(
        source: &'a C,
        ns: Namespace,
        mode: RandomMode,
        spec: &SampleSpec,
        call_timeout: Duration,
    ) -> Self {
        let sample = match mode {
            RandomMode::Sample => RandomSample::Reservoir {
                size: spec.sample_size(),
            },
            RandomMode::SampleRate => RandomSample::Bernoulli {
                probability: spec.inclusion_probability(),
                operator: RandomOperator::SampleRate,
            },
            RandomMode::Rand => RandomSample::Bernoulli {
                probability: spec.inclusion_probability(),
                operator: RandomOperator::Rand,
            },
        };
        Self {
            mode,
            sample,
            cursor: LazyCursor::new(source, ns, call_timeout),
        }
    }

    pub fn sample(&self) -> &RandomSample {
        &self.sample
    }
}

#[async_trait]
impl<'a, C: ClusterAdapter> SampleStream for RandomPredicate<'a, C> {
    async fn next(&mut self) -> Option<Result<SampledDocument, CheckError>> {
        let sample = self.sample;
        self.cursor.next_document(Some(&sample)).await.transpose()
    }

    fn strategy(&self) -> SamplingStrategy {
        SamplingStrategy::RandomPredicate(self.mode)
    }
}

/// Visit every document in storage order.
pub struct FullScan<'a, C: ClusterAdapter> {
    cursor: LazyCursor<'a, C>,
}

impl<'a, C: ClusterAdapter> FullScan<'a, C> {
    pub fn new(source: &'a C, ns: Namespace, call_timeout: Duration) -> Self {
        Self {
            cursor: LazyCursor::new(source, ns, call_timeout),
        }
    }
}

#[async_trait]
impl<'a, C: ClusterAdapter> SampleStream for FullScan<'a, C> {
    async fn next(&mut self) -> Option<Result<SampledDocument, CheckError>> {
        self.cursor.next_document(None).await.transpose()
    }

    fn strategy(&self) -> SamplingStrategy {
        SamplingStrategy::FullScan
    }
}
