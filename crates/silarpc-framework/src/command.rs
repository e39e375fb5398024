use crate::data_type::{DataType, DataTypeDefinition};
use crate::errors::{FrameworkError, Result};
use crate::identifier::FullyQualifiedIdentifier;
use crate::node::NodeInfo;
use crate::xml;
use roxmltree::Node;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::sync::Arc;

/// A typed parameter, response, or intermediate response of a command.
///
/// Each field is registered in the feature's flat identifier index under
/// its own fully qualified identifier, not just under its owning command.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CommandField {
    pub info: NodeInfo,
    pub fully_qualified_identifier: FullyQualifiedIdentifier,
    pub data_type: DataType,
}

impl CommandField {
    fn from_element(
        element: Node<'_, '_>,
        fully_qualified_identifier: FullyQualifiedIdentifier,
        context: &str,
        definitions: &BTreeMap<String, Arc<DataTypeDefinition>>,
    ) -> Result<Self> {
        let info = NodeInfo::from_element(element, context)?;
        let type_el = xml::require_child(element, "DataType", context)?;
        let data_type = DataType::from_element(type_el, definitions)?;
        Ok(Self {
            fully_qualified_identifier,
            info,
            data_type,
        })
    }

    pub fn identifier(&self) -> &str {
        &self.info.identifier
    }
}

/// A schema-derived RPC endpoint with typed parameters and responses.
///
/// Observable commands additionally declare intermediate responses and are
/// executed asynchronously with a progress stream; unobservable commands
/// return once.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Command {
    pub info: NodeInfo,
    pub fully_qualified_identifier: FullyQualifiedIdentifier,
    pub observable: bool,
    pub parameters: Vec<Arc<CommandField>>,
    pub responses: Vec<Arc<CommandField>>,
    pub intermediate_responses: Vec<Arc<CommandField>>,
    pub defined_execution_errors: Vec<String>,
}

impl Command {
    pub(crate) fn from_element(
        element: Node<'_, '_>,
        feature: &FullyQualifiedIdentifier,
        definitions: &BTreeMap<String, Arc<DataTypeDefinition>>,
    ) -> Result<Self> {
        let info = NodeInfo::from_element(element, "Command")?;
        let observable = xml::yes_no(element, "Observable", "Command")?;
        let fqi = feature.command(&info.identifier);

        let mut parameters = Vec::new();
        for el in xml::children(element, "Parameter") {
            let id = xml::require_child_text(el, "Identifier", "Command/Parameter")?;
            parameters.push(Arc::new(CommandField::from_element(
                el,
                fqi.parameter(id),
                "Command/Parameter",
                definitions,
            )?));
        }

        let mut responses = Vec::new();
        for el in xml::children(element, "Response") {
            let id = xml::require_child_text(el, "Identifier", "Command/Response")?;
            responses.push(Arc::new(CommandField::from_element(
                el,
                fqi.response(id),
                "Command/Response",
                definitions,
            )?));
        }

        let mut intermediate_responses = Vec::new();
        for el in xml::children(element, "IntermediateResponse") {
            let id = xml::require_child_text(el, "Identifier", "Command/IntermediateResponse")?;
            intermediate_responses.push(Arc::new(CommandField::from_element(
                el,
                fqi.intermediate_response(id),
                "Command/IntermediateResponse",
                definitions,
            )?));
        }

        if !observable && !intermediate_responses.is_empty() {
            return Err(FrameworkError::Parse(format!(
                "unobservable command '{}' declares intermediate responses",
                info.identifier
            )));
        }

        Ok(Self {
            fully_qualified_identifier: fqi,
            info,
            observable,
            parameters,
            responses,
            intermediate_responses,
            defined_execution_errors: error_identifiers(element),
        })
    }

    pub fn identifier(&self) -> &str {
        &self.info.identifier
    }
}

/// Identifiers listed under a node's `DefinedExecutionErrors` element.
pub(crate) fn error_identifiers(element: Node<'_, '_>) -> Vec<String> {
    xml::child(element, "DefinedExecutionErrors")
        .map(|errors| {
            xml::children(errors, "Identifier")
                .into_iter()
                .filter_map(|e| e.text())
                .map(|t| t.trim().to_string())
                .collect()
        })
        .unwrap_or_default()
}
