//! Immutable run configuration.

use check_core::{CheckError, SamplingMode, SamplingStrategy};
use std::time::Duration;

/// Documents at or above this encoded size are not printed on mismatch.
pub const DEFAULT_PREVIEW_LIMIT: usize = 200;

/// Everything a check run needs to know, built once and passed by reference.
#[derive(Debug, Clone, PartialEq)]
pub struct CheckConfig {
    pub database: String,
    /// Check only this collection instead of the whole database.
    pub collection: Option<String>,
    pub requested_count: u64,
    /// Fraction of each collection to sample, in `(0, 1]`.
    pub requested_rate: f64,
    pub mode: SamplingMode,
    pub check_indexes: bool,
    /// Accept documents missing from the destination, e.g. while replication is still catching up.
    pub tolerate_missing: bool,
    /// Upper bound on every individual cluster call.
    pub call_timeout: Duration,
    /// Seed for the sampler's randomness; drawn from the OS when absent.
    pub seed: Option<u64>,
    pub preview_limit: usize,
}

impl CheckConfig {
    pub fn new(database: impl Into<String>) -> Self {
        Self {
            database: database.into(),
            collection: None,
            requested_count: 100,
            requested_rate: 0.1,
            mode: SamplingMode::Skip,
            check_indexes: false,
            tolerate_missing: false,
            call_timeout: Duration::from_secs(60),
            seed: None,
            preview_limit: DEFAULT_PREVIEW_LIMIT,
        }
    }

    pub fn validate(&self) -> Result<(), CheckError> {
        if self.database.is_empty() {
            return Err(CheckError::InvalidConfig(
                "database name must not be empty".to_string(),
            ));
        }
        if matches!(&self.collection, Some(c) if c.is_empty()) {
            return Err(CheckError::InvalidConfig(
                "collection name must not be empty".to_string(),
            ));
        }
        if self.requested_count == 0 {
            return Err(CheckError::InvalidConfig(
                "sample count must be at least 1".to_string(),
            ));
        }
        if !(self.requested_rate > 0.0 && self.requested_rate <= 1.0) {
            return Err(CheckError::InvalidConfig(format!(
                "sample rate must be in (0, 1], got {}",
                self.requested_rate
            )));
        }
        if self.call_timeout.is_zero() {
            return Err(CheckError::InvalidConfig(
                "call timeout must be positive".to_string(),
            ));
        }
        Ok(())
    }

    /// Strategy used for every collection in this run.
    pub fn strategy(&self) -> SamplingStrategy {
        SamplingStrategy::select(self.mode, self.requested_rate)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_are_valid() {
        let config = CheckConfig::new("shop");
        assert!(config.validate().is_ok());
        assert_eq!(config.strategy(), SamplingStrategy::SkipWalk);
    }

    #[test]
    fn test_rejects_bad_rate() {
        for rate in [0.0, -0.5, 1.5, f64::NAN] {
            let config = CheckConfig {
                requested_rate: rate,
                ..CheckConfig::new("shop")
            };
            assert!(matches!(
                config.validate(),
                Err(CheckError::InvalidConfig(_))
            ));
        }
    }

    #[test]
    fn test_rejects_zero_count() {
        let config = CheckConfig {
            requested_count: 0,
            ..CheckConfig::new("shop")
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_rejects_empty_names() {
        assert!(CheckConfig::new("").validate().is_err());
        let config = CheckConfig {
            collection: Some(String::new()),
            ..CheckConfig::new("shop")
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_rate_one_forces_full_scan() {
        let config = CheckConfig {
            requested_rate: 1.0,
            mode: SamplingMode::Rand,
            ..CheckConfig::new("shop")
        };
        assert_eq!(config.strategy(), SamplingStrategy::FullScan);
    }
}
