//! mongo-check library
//!
//! Verifies that a MongoDB replica matches its source after a migration or
//! while replication is running, without scanning every document.
//!
//! # Features
//!
//! - Skip walk sampling: fixed steps in `_id` order from a random start, any server version
//! - Server-side random sampling: `$sample`, `$sampleRate` or `$rand`
//! - Full scan whenever the sample rate is 1
//! - Byte-exact document comparison and optional index comparison
//! - Fail-fast: the first difference ends the run with a non-zero exit status
//!
//! # CLI Usage
//!
//! ```bash
//! # Check one collection with 200 sampled documents
//! mongo-check --src mongodb://src:27017 --dst mongodb://dst:27017 \
//!   --db shop --coll orders --count 200 --rate 0.05
//!
//! # Whole database, server-side sampling, compare indexes, tolerate replication lag
//! mongo-check --src mongodb://src:27017 --dst mongodb://dst:27017 \
//!   --db shop --mode sampleRate --check-index --tolerate-missing
//! ```

use anyhow::Context;
use check_core::SamplingMode;
use clap::{Args, ValueEnum};
use sample_verify::CheckConfig;
use std::path::PathBuf;

pub mod config;
pub mod logging;

pub use config::parse_duration;

/// How documents are picked from each source collection.
#[derive(Clone, Copy, Debug, PartialEq, Eq, ValueEnum)]
pub enum SamplingModeArg {
    /// Walk `_id` order with a fixed step from a random start
    #[value(name = "skip")]
    Skip,
    /// Server-side `$sample` stage (MongoDB 3.2+)
    #[value(name = "sample")]
    Sample,
    /// Server-side `$sampleRate` operator (MongoDB 4.4.2+)
    #[value(name = "sampleRate")]
    SampleRate,
    /// Server-side `$rand` operator (MongoDB 4.4.2+)
    #[value(name = "rand")]
    Rand,
}

impl From<SamplingModeArg> for SamplingMode {
    fn from(arg: SamplingModeArg) -> Self {
        match arg {
            SamplingModeArg::Skip => SamplingMode::Skip,
            SamplingModeArg::Sample => SamplingMode::Sample,
            SamplingModeArg::SampleRate => SamplingMode::SampleRate,
            SamplingModeArg::Rand => SamplingMode::Rand,
        }
    }
}

#[derive(Args, Clone, Debug)]
pub struct CheckArgs {
    /// Source cluster connection string
    #[arg(long, env = "MONGO_CHECK_SRC")]
    pub src: String,

    /// Destination cluster connection string
    #[arg(long, env = "MONGO_CHECK_DST")]
    pub dst: String,

    /// Database to check
    #[arg(long)]
    pub db: String,

    /// Check only this collection (default: every collection in the database)
    #[arg(long)]
    pub coll: Option<String>,

    /// Maximum number of documents sampled per collection
    #[arg(long, default_value = "100")]
    pub count: u64,

    /// Fraction of each collection to sample; 1 checks every document
    #[arg(long, default_value = "0.1")]
    pub rate: f64,

    /// Sampling mode
    #[arg(long, value_enum, default_value = "skip")]
    pub mode: SamplingModeArg,

    /// Also compare index definitions
    #[arg(long)]
    pub check_index: bool,

    /// Keep going when a sampled document is missing in the destination
    #[arg(long, alias = "continue-not-exist")]
    pub tolerate_missing: bool,

    /// Time limit for each individual cluster call (e.g., "300", "300s", "30m", "1h")
    #[arg(long, default_value = "1m")]
    pub timeout: String,

    /// Time limit for connecting to each cluster
    #[arg(long, default_value = "10s")]
    pub connect_timeout: String,

    /// Seed for the sampler's randomness, for reproducible runs
    #[arg(long)]
    pub seed: Option<u64>,

    /// Write the run report as JSON to this file
    #[arg(long)]
    pub report_file: Option<PathBuf>,
}

impl CheckArgs {
    /// Build the immutable run configuration.
    pub fn to_config(&self) -> anyhow::Result<CheckConfig> {
        let call_timeout = parse_duration(&self.timeout)
            .with_context(|| format!("Invalid --timeout value: {}", self.timeout))?;
        Ok(CheckConfig {
            collection: self.coll.clone(),
            requested_count: self.count,
            requested_rate: self.rate,
            mode: self.mode.into(),
            check_indexes: self.check_index,
            tolerate_missing: self.tolerate_missing,
            call_timeout,
            seed: self.seed,
            ..CheckConfig::new(self.db.clone())
        })
    }

    pub fn connect_opts(&self) -> anyhow::Result<mongodb_cluster::ConnectOpts> {
        let connect_timeout = parse_duration(&self.connect_timeout).with_context(|| {
            format!("Invalid --connect-timeout value: {}", self.connect_timeout)
        })?;
        let call_timeout = parse_duration(&self.timeout)
            .with_context(|| format!("Invalid --timeout value: {}", self.timeout))?;
        Ok(mongodb_cluster::ConnectOpts {
            connect_timeout,
            call_timeout,
        })
    }
}
