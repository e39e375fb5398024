use crate::data_type::{DataType, DataTypeDefinition};
use crate::errors::Result;
use crate::identifier::FullyQualifiedIdentifier;
use crate::node::NodeInfo;
use crate::xml;
use roxmltree::Node;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::sync::Arc;

/// A typed, named side-channel value attached to individual RPC calls
/// (for example an authorization token). Distinct from configuration:
/// metadata travels with each call.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Metadata {
    pub info: NodeInfo,
    pub fully_qualified_identifier: FullyQualifiedIdentifier,
    pub data_type: DataType,
    /// Identifiers of the defined execution errors interception of this
    /// metadata may raise.
    pub defined_execution_errors: Vec<String>,
}

impl Metadata {
    pub(crate) fn from_element(
        element: Node<'_, '_>,
        feature: &FullyQualifiedIdentifier,
        definitions: &BTreeMap<String, Arc<DataTypeDefinition>>,
    ) -> Result<Self> {
        let info = NodeInfo::from_element(element, "Metadata")?;
        let type_el = xml::require_child(element, "DataType", "Metadata")?;
        let data_type = DataType::from_element(type_el, definitions)?;
        let defined_execution_errors = crate::command::error_identifiers(element);
        Ok(Self {
            fully_qualified_identifier: feature.metadata(&info.identifier),
            info,
            data_type,
            defined_execution_errors,
        })
    }

    pub fn identifier(&self) -> &str {
        &self.info.identifier
    }
}
