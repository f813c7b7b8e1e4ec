//! Whole-run orchestration.
//!
//! The verifier owns nothing but references to the two clusters and the
//! configuration. Collections are checked one after another and the first
//! fatal condition ends the run.

use check_core::{
    CheckError, ClusterAdapter, ComparisonReport, DatabaseReport, Namespace, RandomMode,
    SampleSpec, Side,
};
use rand::rngs::StdRng;
use rand::SeedableRng;
use server_version::ServerFeature;
use std::time::Instant;
use tracing::{debug, info, warn};

use crate::compare::Comparator;
use crate::config::CheckConfig;
use crate::deadline::bounded;
use crate::index::compare_indexes;
use crate::sampler::open_sampler;

fn required_feature(mode: RandomMode) -> ServerFeature {
    match mode {
        RandomMode::Sample => ServerFeature::SampleStage,
        RandomMode::SampleRate => ServerFeature::SampleRateOperator,
        RandomMode::Rand => ServerFeature::RandOperator,
    }
}

/// Checks a destination cluster against a source cluster.
pub struct Verifier<'a, S: ClusterAdapter, D: ClusterAdapter> {
    source: &'a S,
    destination: &'a D,
    config: &'a CheckConfig,
    rng: StdRng,
}

impl<'a, S: ClusterAdapter, D: ClusterAdapter> Verifier<'a, S, D> {
    pub fn new(source: &'a S, destination: &'a D, config: &'a CheckConfig) -> Self {
        let rng = match config.seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_os_rng(),
        };
        Self {
            source,
            destination,
            config,
            rng,
        }
    }

    /// Check the configured collection, or every collection of the database.
    pub async fn run(&mut self) -> Result<DatabaseReport, CheckError> {
        self.config.validate()?;
        let started = Instant::now();

        self.ensure_capabilities().await?;
        ensure_database(self.source, Side::Source, self.config).await?;
        ensure_database(self.destination, Side::Destination, self.config).await?;

        let collections = self.collections_to_check().await?;
        info!(
            "Checking {} collection(s) in '{}' with {}",
            collections.len(),
            self.config.database,
            self.config.strategy()
        );

        let mut report = DatabaseReport::new(self.config.database.clone());
        for collection in collections {
            let ns = Namespace::new(self.config.database.clone(), collection);
            let checked = self.check_collection(&ns).await?;
            report.collections.push(checked);
        }
        report.duration = started.elapsed();

        info!("{}", report.summary());
        Ok(report)
    }

    /// Fail before any collection work if the source cannot run the random strategy.
    async fn ensure_capabilities(&self) -> Result<(), CheckError> {
        let Some(mode) = self.config.strategy().random_mode() else {
            return Ok(());
        };
        let feature = required_feature(mode);

        let version = bounded(self.config.call_timeout, self.source.server_version())
            .await
            .map_err(|e| CheckError::read(Side::Source, "server version", "buildInfo", e))?;

        match server_version::ensure_supported(&version, feature) {
            Ok(parsed) => {
                debug!("Source version {parsed} supports {feature}");
                Ok(())
            }
            Err(e) => Err(CheckError::Capability {
                side: Side::Source,
                version,
                feature: feature.to_string(),
                reason: format!("{e:#}"),
            }),
        }
    }

    /// Collection names to check, verified to exist on both sides before any sampling.
    async fn collections_to_check(&self) -> Result<Vec<String>, CheckError> {
        let database = &self.config.database;
        let source_names = list_collections(self.source, Side::Source, self.config).await?;
        let destination_names =
            list_collections(self.destination, Side::Destination, self.config).await?;

        let names = match &self.config.collection {
            Some(collection) => {
                if !source_names.contains(collection) {
                    return Err(CheckError::collection_not_found(
                        Side::Source,
                        &Namespace::new(database.clone(), collection.clone()),
                    ));
                }
                vec![collection.clone()]
            }
            None => source_names,
        };

        for name in &names {
            if !destination_names.contains(name) {
                return Err(CheckError::collection_not_found(
                    Side::Destination,
                    &Namespace::new(database.clone(), name.clone()),
                ));
            }
        }
        Ok(names)
    }

    async fn check_collection(&mut self, ns: &Namespace) -> Result<ComparisonReport, CheckError> {
        let started = Instant::now();
        let timeout = self.config.call_timeout;

        let source_count = bounded(timeout, self.source.estimated_document_count(ns))
            .await
            .map_err(|e| CheckError::read(Side::Source, "estimated count", ns, e))?;
        let destination_count = bounded(timeout, self.destination.estimated_document_count(ns))
            .await
            .map_err(|e| CheckError::read(Side::Destination, "estimated count", ns, e))?;
        if source_count != destination_count {
            warn!(
                "{ns}: estimated counts differ, source {source_count}, destination {destination_count}"
            );
        }

        let mut report = ComparisonReport::new(ns.clone());
        report.source_count = source_count;
        report.destination_count = destination_count;

        if self.config.check_indexes {
            report = compare_indexes(self.source, self.destination, ns, timeout, report).await?;
        }

        let strategy = self.config.strategy();
        let spec = SampleSpec {
            requested_count: self.config.requested_count,
            requested_rate: self.config.requested_rate,
            estimated_source_size: source_count,
            strategy,
        };
        report.strategy = Some(strategy);
        report.sample_size = spec.sample_size();
        info!(
            "Checking {ns}: source {source_count} documents, destination {destination_count}, {strategy}, sample size {}, step {}",
            spec.sample_size(),
            spec.step_size()
        );

        let mut samples = open_sampler(self.source, ns, &spec, timeout, &mut self.rng);
        let comparator = Comparator::new(
            self.destination,
            ns,
            timeout,
            self.config.tolerate_missing,
            self.config.preview_limit,
        );

        match comparator.run(samples.as_mut(), report).await {
            Ok(mut report) => {
                report.duration = started.elapsed();
                info!("{}", report.summary());
                Ok(report)
            }
            Err(CheckError::Consistency(mut report)) => {
                report.duration = started.elapsed();
                Err(CheckError::Consistency(report))
            }
            Err(e) => Err(e),
        }
    }
}

async fn ensure_database<C: ClusterAdapter>(
    cluster: &C,
    side: Side,
    config: &CheckConfig,
) -> Result<(), CheckError> {
    let names = bounded(config.call_timeout, cluster.list_database_names())
        .await
        .map_err(|e| CheckError::read(side, "list databases", "cluster", e))?;
    if names.iter().any(|n| *n == config.database) {
        Ok(())
    } else {
        Err(CheckError::database_not_found(side, &config.database))
    }
}

async fn list_collections<C: ClusterAdapter>(
    cluster: &C,
    side: Side,
    config: &CheckConfig,
) -> Result<Vec<String>, CheckError> {
    bounded(
        config.call_timeout,
        cluster.list_collection_names(&config.database),
    )
    .await
    .map_err(|e| CheckError::read(side, "list collections", &config.database, e))
}
