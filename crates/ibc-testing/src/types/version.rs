// Connection version negotiation

use serde::{Deserialize, Serialize};
use thiserror::Error;

pub const DEFAULT_VERSION_IDENTIFIER: &str = "1";
pub const ORDER_ORDERED: &str = "ORDER_ORDERED";
pub const ORDER_UNORDERED: &str = "ORDER_UNORDERED";

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum VersionError {
    #[error("empty version list")]
    EmptyVersions,

    #[error("version {0} is not supported")]
    VersionNotSupported(String),

    #[error("feature {0} is not supported")]
    FeatureNotSupported(String),

    #[error("no common version between host and counterparty")]
    NoCommonVersion,
}

/// Connection version information
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Version {
    /// Version identifier string
    pub identifier: String,
    /// Supported features for this version
    pub features: Vec<String>,
}

impl Version {
    pub fn new(identifier: String, features: Vec<String>) -> Self {
        Self {
            identifier,
            features,
        }
    }

    /// Returns the list of versions offered by this harness
    pub fn compatibles() -> Vec<Self> {
        vec![Self::default()]
    }

    pub fn verify_feature_supported(&self, feature: &str) -> Result<(), VersionError> {
        if !self.features.iter().any(|f| f == feature) {
            return Err(VersionError::FeatureNotSupported(feature.to_string()));
        }
        Ok(())
    }

    /// Checks that this version, with its whole feature set, is offered by `supported`
    pub fn verify_is_supported(&self, supported: &[Version]) -> Result<(), VersionError> {
        let offered = find_supported_version(self, supported)?;
        for feature in &self.features {
            offered.verify_feature_supported(feature)?;
        }
        Ok(())
    }
}

impl Default for Version {
    fn default() -> Self {
        Self {
            identifier: DEFAULT_VERSION_IDENTIFIER.to_string(),
            features: vec![ORDER_ORDERED.to_string(), ORDER_UNORDERED.to_string()],
        }
    }
}

/// Picks the version both sides support.
///
/// The identifier comes from the counterparty entry and the features are the
/// intersection, ordered as in `supported_versions`. Ties resolve to the
/// lowest identifier.
pub fn pick_version(
    supported_versions: &[Version],
    counterparty_versions: &[Version],
) -> Result<Version, VersionError> {
    if counterparty_versions.is_empty() {
        return Err(VersionError::EmptyVersions);
    }

    let mut intersection: Vec<Version> = supported_versions
        .iter()
        .filter_map(|sv| {
            let cv = find_supported_version(sv, counterparty_versions).ok()?;
            let features = get_feature_set_intersection(&sv.features, &cv.features).ok()?;
            Some(Version::new(cv.identifier, features))
        })
        .collect();

    if intersection.is_empty() {
        return Err(VersionError::NoCommonVersion);
    }

    intersection.sort_by(|a, b| a.identifier.cmp(&b.identifier));
    Ok(intersection.swap_remove(0))
}

fn find_supported_version(
    version: &Version,
    supported_versions: &[Version],
) -> Result<Version, VersionError> {
    supported_versions
        .iter()
        .find(|sv| sv.identifier == version.identifier)
        .cloned()
        .ok_or_else(|| VersionError::VersionNotSupported(version.identifier.clone()))
}

fn get_feature_set_intersection(
    supported_features: &[String],
    counterparty_features: &[String],
) -> Result<Vec<String>, VersionError> {
    let intersection: Vec<String> = supported_features
        .iter()
        .filter(|f| counterparty_features.contains(f))
        .cloned()
        .collect();

    if intersection.is_empty() {
        return Err(VersionError::NoCommonVersion);
    }
    Ok(intersection)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_version_default() {
        let version = Version::default();
        assert_eq!(version.identifier, "1");
        assert!(version.verify_feature_supported(ORDER_ORDERED).is_ok());
        assert!(version.verify_feature_supported(ORDER_UNORDERED).is_ok());
        assert!(version.verify_feature_supported("ORDER_DAG").is_err());
    }

    #[test]
    fn test_pick_version_intersects_features() {
        let supported = Version::compatibles();
        let counterparty = vec![Version::new("1".to_string(), vec![ORDER_UNORDERED.to_string()])];

        let picked = pick_version(&supported, &counterparty).unwrap();
        assert_eq!(picked.identifier, "1");
        assert_eq!(picked.features, vec![ORDER_UNORDERED.to_string()]);
    }

    #[test]
    fn test_pick_version_prefers_lowest_identifier() {
        let supported = vec![
            Version::new("2".to_string(), vec![ORDER_ORDERED.to_string()]),
            Version::default(),
        ];
        let counterparty = supported.clone();

        assert_eq!(pick_version(&supported, &counterparty).unwrap().identifier, "1");
    }

    #[test]
    fn test_pick_version_without_overlap() {
        let supported = Version::compatibles();
        let counterparty = vec![Version::new("2".to_string(), vec![ORDER_ORDERED.to_string()])];

        assert_eq!(pick_version(&supported, &counterparty), Err(VersionError::NoCommonVersion));
        assert_eq!(pick_version(&supported, &[]), Err(VersionError::EmptyVersions));
    }

    #[test]
    fn test_verify_is_supported() {
        let supported = Version::compatibles();
        assert!(Version::default().verify_is_supported(&supported).is_ok());

        let extra = Version::new("1".to_string(), vec!["ORDER_DAG".to_string()]);
        assert_eq!(
            extra.verify_is_supported(&supported),
            Err(VersionError::FeatureNotSupported("ORDER_DAG".to_string()))
        );
    }
}
