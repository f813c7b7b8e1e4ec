//! Sample sizing and strategy selection.

use serde::Serialize;
use std::fmt;

/// Sampling mode as configured by the operator.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum SamplingMode {
    /// Deterministic skip/limit walk over `_id` order with a random start.
    Skip,
    /// Server-side fixed-size `$sample`.
    Sample,
    /// Server-side `$sampleRate` predicate.
    SampleRate,
    /// Server-side `$rand` predicate.
    Rand,
}

impl fmt::Display for SamplingMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Skip => write!(f, "skip"),
            Self::Sample => write!(f, "sample"),
            Self::SampleRate => write!(f, "sampleRate"),
            Self::Rand => write!(f, "rand"),
        }
    }
}

/// Which server-side random primitive a [`SamplingStrategy::RandomPredicate`] uses.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum RandomMode {
    Sample,
    SampleRate,
    Rand,
}

impl fmt::Display for RandomMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Sample => write!(f, "$sample"),
            Self::SampleRate => write!(f, "$sampleRate"),
            Self::Rand => write!(f, "$rand"),
        }
    }
}

/// The strategy actually used to pick documents from one collection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum SamplingStrategy {
    SkipWalk,
    RandomPredicate(RandomMode),
    FullScan,
}

impl SamplingStrategy {
    /// A rate of 1.0 always means a full scan, whatever the configured mode.
    pub fn select(mode: SamplingMode, requested_rate: f64) -> Self {
        if requested_rate >= 1.0 {
            return Self::FullScan;
        }
        match mode {
            SamplingMode::Skip => Self::SkipWalk,
            SamplingMode::Sample => Self::RandomPredicate(RandomMode::Sample),
            SamplingMode::SampleRate => Self::RandomPredicate(RandomMode::SampleRate),
            SamplingMode::Rand => Self::RandomPredicate(RandomMode::Rand),
        }
    }

    pub fn random_mode(&self) -> Option<RandomMode> {
        match self {
            Self::RandomPredicate(mode) => Some(*mode),
            _ => None,
        }
    }
}

impl fmt::Display for SamplingStrategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::SkipWalk => write!(f, "skip walk"),
            Self::RandomPredicate(mode) => write!(f, "random predicate ({mode})"),
            Self::FullScan => write!(f, "full scan"),
        }
    }
}

/// Inputs that determine how many documents are inspected in one collection.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SampleSpec {
    pub requested_count: u64,
    pub requested_rate: f64,
    pub estimated_source_size: u64,
    pub strategy: SamplingStrategy,
}

impl SampleSpec {
    /// `max(1, min(count, floor(size * rate)))`, or 0 for an empty source.
    pub fn sample_size(&self) -> u64 {
        if self.estimated_source_size == 0 {
            return 0;
        }
        let by_rate = (self.estimated_source_size as f64 * self.requested_rate).floor() as u64;
        self.requested_count.min(by_rate).max(1)
    }

    /// Number of documents the strategy is expected to visit.
    pub fn planned_visits(&self) -> u64 {
        match self.strategy {
            SamplingStrategy::FullScan => self.estimated_source_size,
            _ => self.sample_size(),
        }
    }

    /// Distance in `_id` order between two consecutive skip-walk samples.
    pub fn step_size(&self) -> u64 {
        match self.sample_size() {
            0 => 0,
            n => self.estimated_source_size / n,
        }
    }

    /// Per-document inclusion probability for the predicate modes.
    pub fn inclusion_probability(&self) -> f64 {
        if self.estimated_source_size == 0 {
            return 0.0;
        }
        (self.sample_size() as f64 / self.estimated_source_size as f64).min(1.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn spec(count: u64, rate: f64, size: u64) -> SampleSpec {
        SampleSpec {
            requested_count: count,
            requested_rate: rate,
            estimated_source_size: size,
            strategy: SamplingStrategy::SkipWalk,
        }
    }

    #[test]
    fn test_sample_size_rate_bound() {
        assert_eq!(spec(100, 0.1, 500).sample_size(), 50);
    }

    #[test]
    fn test_sample_size_count_bound() {
        assert_eq!(spec(100, 0.1, 1_000_000).sample_size(), 100);
    }

    #[test]
    fn test_sample_size_never_below_one() {
        assert_eq!(spec(100, 0.01, 3).sample_size(), 1);
        assert_eq!(spec(100, 0.5, 1).sample_size(), 1);
    }

    #[test]
    fn test_sample_size_empty_source() {
        assert_eq!(spec(100, 0.1, 0).sample_size(), 0);
        assert_eq!(spec(100, 0.1, 0).step_size(), 0);
    }

    #[test]
    fn test_sample_size_formula_over_grid() {
        for size in [1_u64, 7, 99, 1000, 12_345] {
            for count in [1_u64, 10, 100, 5000] {
                for rate in [0.001, 0.1, 0.5, 0.999] {
                    let expected = count.min((size as f64 * rate).floor() as u64).max(1);
                    assert_eq!(spec(count, rate, size).sample_size(), expected);
                }
            }
        }
    }

    #[test]
    fn test_step_size() {
        assert_eq!(spec(100, 0.1, 1000).step_size(), 10);
        assert_eq!(spec(3, 1.0, 10).step_size(), 3);
    }

    #[test]
    fn test_full_scan_selected_at_rate_one() {
        for mode in [
            SamplingMode::Skip,
            SamplingMode::Sample,
            SamplingMode::SampleRate,
            SamplingMode::Rand,
        ] {
            assert_eq!(SamplingStrategy::select(mode, 1.0), SamplingStrategy::FullScan);
        }
    }

    #[test]
    fn test_mode_selection() {
        assert_eq!(
            SamplingStrategy::select(SamplingMode::Skip, 0.5),
            SamplingStrategy::SkipWalk
        );
        assert_eq!(
            SamplingStrategy::select(SamplingMode::Rand, 0.5),
            SamplingStrategy::RandomPredicate(RandomMode::Rand)
        );
    }

    #[test]
    fn test_full_scan_plans_whole_collection() {
        let spec = SampleSpec {
            requested_count: 100,
            requested_rate: 1.0,
            estimated_source_size: 1000,
            strategy: SamplingStrategy::FullScan,
        };
        assert_eq!(spec.sample_size(), 100);
        assert_eq!(spec.planned_visits(), 1000);
    }

    #[test]
    fn test_inclusion_probability() {
        let p = spec(100, 0.1, 500).inclusion_probability();
        assert!((p - 0.1).abs() < 1e-12);
    }
}
