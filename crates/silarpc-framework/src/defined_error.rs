use crate::errors::Result;
use crate::identifier::FullyQualifiedIdentifier;
use crate::node::NodeInfo;
use roxmltree::Node;
use serde::{Deserialize, Serialize};

/// A declared error kind scoped to a feature.
///
/// Commands, properties, and metadata reference these by identifier to
/// declare which execution errors they may raise.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DefinedExecutionError {
    pub info: NodeInfo,
    pub fully_qualified_identifier: FullyQualifiedIdentifier,
}

impl DefinedExecutionError {
    pub(crate) fn from_element(
        element: Node<'_, '_>,
        feature: &FullyQualifiedIdentifier,
    ) -> Result<Self> {
        let info = NodeInfo::from_element(element, "DefinedExecutionError")?;
        Ok(Self {
            fully_qualified_identifier: feature.defined_execution_error(&info.identifier),
            info,
        })
    }

    pub fn identifier(&self) -> &str {
        &self.info.identifier
    }
}
