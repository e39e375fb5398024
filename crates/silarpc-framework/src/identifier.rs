//! Fully qualified identifiers
//!
//! Every node in a resolved feature graph is addressable by a globally
//! unique string key. The feature-level form is
//! `{originator}/{category}/{identifier}/v{major-version}`; child nodes
//! extend it with a kind keyword and their own identifier, e.g.
//! `org.silastandard/core/SiLAService/v1/Command/GetFeatureDefinition`.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Globally unique identifier of a feature or one of its descendants.
///
/// Used as the key of the flat child index on [`Feature`](crate::Feature)
/// and of the server-wide index, and carried in call metadata and error
/// payloads. Comparison is exact (case-sensitive).
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct FullyQualifiedIdentifier(String);

impl FullyQualifiedIdentifier {
    /// Builds the identifier of a feature from its root attributes.
    ///
    /// `major_version` is the integer prefix of the feature version, so
    /// feature version "2.1" yields a `v2` suffix.
    pub fn feature(originator: &str, category: &str, identifier: &str, major_version: u64) -> Self {
        Self(format!("{originator}/{category}/{identifier}/v{major_version}"))
    }

    pub fn command(&self, identifier: &str) -> Self {
        self.extended("Command", identifier)
    }

    pub fn property(&self, identifier: &str) -> Self {
        self.extended("Property", identifier)
    }

    pub fn metadata(&self, identifier: &str) -> Self {
        self.extended("Metadata", identifier)
    }

    pub fn data_type(&self, identifier: &str) -> Self {
        self.extended("DataType", identifier)
    }

    pub fn defined_execution_error(&self, identifier: &str) -> Self {
        self.extended("DefinedExecutionError", identifier)
    }

    /// Extends a command identifier with one of its parameters.
    pub fn parameter(&self, identifier: &str) -> Self {
        self.extended("Parameter", identifier)
    }

    /// Extends a command identifier with one of its responses.
    pub fn response(&self, identifier: &str) -> Self {
        self.extended("Response", identifier)
    }

    /// Extends a command identifier with one of its intermediate responses.
    pub fn intermediate_response(&self, identifier: &str) -> Self {
        self.extended("IntermediateResponse", identifier)
    }

    /// The identifier of the feature this node belongs to: the first four
    /// `/`-separated segments. Children never hold a parent pointer; this
    /// prefix is the owner handle.
    pub fn feature_prefix(&self) -> FullyQualifiedIdentifier {
        let prefix: Vec<&str> = self.0.splitn(5, '/').take(4).collect();
        Self(prefix.join("/"))
    }

    /// The last `/`-separated segment.
    pub fn leaf(&self) -> &str {
        self.0.rsplit('/').next().unwrap_or(&self.0)
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    fn extended(&self, kind: &str, identifier: &str) -> Self {
        Self(format!("{}/{kind}/{identifier}", self.0))
    }
}

impl fmt::Display for FullyQualifiedIdentifier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for FullyQualifiedIdentifier {
    fn from(value: &str) -> Self {
        Self(value.to_string())
    }
}

impl From<String> for FullyQualifiedIdentifier {
    fn from(value: String) -> Self {
        Self(value)
    }
}

impl AsRef<str> for FullyQualifiedIdentifier {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_feature_identifier_format() {
        let fqi = FullyQualifiedIdentifier::feature("org.silastandard", "core", "SiLAService", 1);
        assert_eq!(fqi.as_str(), "org.silastandard/core/SiLAService/v1");
    }

    #[test]
    fn test_child_extension() {
        let feature = FullyQualifiedIdentifier::feature("org.example", "none", "Pump", 2);
        let command = feature.command("StartFlow");
        assert_eq!(command.as_str(), "org.example/none/Pump/v2/Command/StartFlow");

        let parameter = command.parameter("FlowRate");
        assert_eq!(
            parameter.as_str(),
            "org.example/none/Pump/v2/Command/StartFlow/Parameter/FlowRate"
        );
    }

    #[test]
    fn test_feature_prefix_is_owner_handle() {
        let feature = FullyQualifiedIdentifier::feature("org.example", "none", "Pump", 2);
        let parameter = feature.command("StartFlow").parameter("FlowRate");
        assert_eq!(parameter.feature_prefix(), feature);
        assert_eq!(feature.feature_prefix(), feature);
    }

    #[test]
    fn test_leaf() {
        let feature = FullyQualifiedIdentifier::feature("org.example", "none", "Pump", 1);
        assert_eq!(feature.leaf(), "v1");
        assert_eq!(feature.property("FlowRate").leaf(), "FlowRate");
    }
}
