//! Detect what a MongoDB server can do from its version.
//!
//! The random sampling strategies rely on aggregation features that only
//! exist from a given server release on. The version string comes from the
//! `buildInfo` command and is parsed with `semver`, so release candidates
//! such as `4.4.2-rc0` sort before the final `4.4.2` release.

use semver::Version;

/// Server-side features the sampler may depend on.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ServerFeature {
    /// The `$sample` aggregation stage.
    SampleStage,
    /// The `$sampleRate` query operator.
    SampleRateOperator,
    /// The `$rand` expression operator.
    RandOperator,
}

impl ServerFeature {
    /// First server release that ships the feature.
    pub fn min_version(&self) -> Version {
        match self {
            Self::SampleStage => Version::new(3, 2, 0),
            Self::SampleRateOperator => Version::new(4, 4, 2),
            Self::RandOperator => Version::new(4, 4, 2),
        }
    }
}

impl std::fmt::Display for ServerFeature {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::SampleStage => write!(f, "$sample"),
            Self::SampleRateOperator => write!(f, "$sampleRate"),
            Self::RandOperator => write!(f, "$rand"),
        }
    }
}

/// Parse a MongoDB version string like "7.0.5", "4.4.2-rc0" or "3.6".
///
/// Missing minor/patch components are treated as zero.
pub fn parse_version_string(version_string: &str) -> anyhow::Result<Version> {
    let version_string = version_string.trim();

    tracing::debug!("Parsing MongoDB version string: '{version_string}'");

    let (release, pre) = match version_string.split_once('-') {
        Some((release, pre)) => (release, Some(pre)),
        None => (version_string, None),
    };

    let mut parts = release.split('.');
    let mut component = |name: &str| -> anyhow::Result<u64> {
        match parts.next() {
            Some(p) => p.parse::<u64>().map_err(|e| {
                anyhow::anyhow!("Failed to parse {name} of MongoDB version '{version_string}': {e}")
            }),
            None => Ok(0),
        }
    };
    let major = component("major")?;
    let minor = component("minor")?;
    let patch = component("patch")?;
    if release.is_empty() || parts.next().is_some() {
        anyhow::bail!(
            "Invalid version format: '{version_string}'. Expected format: 'X.Y.Z[-suffix]'"
        );
    }

    let mut version = Version::new(major, minor, patch);
    if let Some(pre) = pre {
        version.pre = semver::Prerelease::new(pre).map_err(|e| {
            anyhow::anyhow!("Failed to parse MongoDB version '{version_string}': {e}")
        })?;
    }

    tracing::debug!("Detected MongoDB server version: {version}");
    Ok(version)
}

/// Whether `version` ships `feature`.
pub fn supports(version: &Version, feature: ServerFeature) -> bool {
    *version >= feature.min_version()
}

/// Parse `version_string` and fail unless it ships `feature`.
pub fn ensure_supported(version_string: &str, feature: ServerFeature) -> anyhow::Result<Version> {
    let version = parse_version_string(version_string)?;
    if !supports(&version, feature) {
        anyhow::bail!(
            "Unsupported MongoDB version: {version}. {feature} requires {} or newer.",
            feature.min_version()
        );
    }
    Ok(version)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_version_stable() {
        let version = parse_version_string("7.0.5").unwrap();
        assert_eq!(version, Version::new(7, 0, 5));
    }

    #[test]
    fn test_parse_version_release_candidate() {
        let version = parse_version_string("4.4.2-rc0").unwrap();
        assert_eq!(version.major, 4);
        assert!(!version.pre.is_empty());
        assert!(version < Version::new(4, 4, 2));
    }

    #[test]
    fn test_parse_version_short() {
        let version = parse_version_string("3.6").unwrap();
        assert_eq!(version, Version::new(3, 6, 0));
    }

    #[test]
    fn test_parse_version_with_whitespace() {
        let version = parse_version_string("  6.0.12 \n").unwrap();
        assert_eq!(version, Version::new(6, 0, 12));
    }

    #[test]
    fn test_parse_version_invalid() {
        let result = parse_version_string("mongodb-x");
        assert!(result.is_err());
        assert!(result.unwrap_err().to_string().contains("Failed to parse"));
    }

    #[test]
    fn test_parse_version_too_many_components() {
        let result = parse_version_string("1.2.3.4");
        assert!(result
            .unwrap_err()
            .to_string()
            .contains("Invalid version format"));
    }

    #[test]
    fn test_sample_stage_gate() {
        assert!(ensure_supported("3.2.0", ServerFeature::SampleStage).is_ok());
        assert!(ensure_supported("3.0.15", ServerFeature::SampleStage).is_err());
    }

    #[test]
    fn test_sample_rate_gate() {
        assert!(ensure_supported("4.4.2", ServerFeature::SampleRateOperator).is_ok());
        assert!(ensure_supported("5.0.0", ServerFeature::RandOperator).is_ok());
        let err = ensure_supported("4.4.1", ServerFeature::RandOperator).unwrap_err();
        assert!(err.to_string().contains("Unsupported MongoDB version"));
        assert!(ensure_supported("4.4.2-rc0", ServerFeature::SampleRateOperator).is_err());
    }

    #[test]
    fn test_feature_display() {
        assert_eq!(ServerFeature::SampleStage.to_string(), "$sample");
        assert_eq!(ServerFeature::RandOperator.to_string(), "$rand");
    }
}
