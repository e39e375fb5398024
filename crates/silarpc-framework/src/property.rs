use crate::data_type::{DataType, DataTypeDefinition};
use crate::errors::Result;
use crate::identifier::FullyQualifiedIdentifier;
use crate::node::NodeInfo;
use crate::xml;
use roxmltree::Node;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::sync::Arc;

/// A schema-derived read endpoint with a typed value.
///
/// An observable property streams value updates to subscribers; an
/// unobservable one answers single reads.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Property {
    pub info: NodeInfo,
    pub fully_qualified_identifier: FullyQualifiedIdentifier,
    pub observable: bool,
    pub data_type: DataType,
    pub defined_execution_errors: Vec<String>,
}

impl Property {
    pub(crate) fn from_element(
        element: Node<'_, '_>,
        feature: &FullyQualifiedIdentifier,
        definitions: &BTreeMap<String, Arc<DataTypeDefinition>>,
    ) -> Result<Self> {
        let info = NodeInfo::from_element(element, "Property")?;
        let observable = xml::yes_no(element, "Observable", "Property")?;
        let type_el = xml::require_child(element, "DataType", "Property")?;
        let data_type = DataType::from_element(type_el, definitions)?;
        let defined_execution_errors = crate::command::error_identifiers(element);
        Ok(Self {
            fully_qualified_identifier: feature.property(&info.identifier),
            info,
            observable,
            data_type,
            defined_execution_errors,
        })
    }

    pub fn identifier(&self) -> &str {
        &self.info.identifier
    }
}
