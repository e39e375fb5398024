//! Feature definition parsing and the resolved object graph.
//!
//! [`Feature::new`] turns one feature-definition document into a fully
//! resolved, addressable graph of typed nodes. Construction either fully
//! succeeds or fails; no partially built feature is ever returned.
//!
//! Resolution order matters: defined execution errors first (no
//! dependencies), then data type definitions (fixed-point iteration over
//! forward references), then properties, commands, and finally metadata.
//! Every node, down to individual command parameters and responses, is
//! registered in a flat index keyed by its fully qualified identifier for
//! O(1) cross-cutting lookup.

use crate::binary::BinaryTransferHandler;
use crate::command::{Command, CommandField};
use crate::data_type::{self, DataTypeDefinition};
use crate::defined_error::DefinedExecutionError;
use crate::errors::{FrameworkError, Result};
use crate::identifier::FullyQualifiedIdentifier;
use crate::metadata::Metadata;
use crate::node::NodeInfo;
use crate::property::Property;
use crate::xml;
use std::collections::{BTreeMap, HashMap};
use std::fmt;
use std::sync::{Arc, RwLock};

/// A node reachable through a feature's flat identifier index.
#[derive(Clone)]
pub enum FeatureNode {
    /// The feature itself, registered under its own identifier.
    Feature,
    DataTypeDefinition(Arc<DataTypeDefinition>),
    DefinedExecutionError(Arc<DefinedExecutionError>),
    Property(Arc<Property>),
    Command(Arc<Command>),
    Parameter(Arc<CommandField>),
    Response(Arc<CommandField>),
    IntermediateResponse(Arc<CommandField>),
    Metadata(Arc<Metadata>),
}

impl FeatureNode {
    /// Node kind as a display keyword.
    pub fn kind(&self) -> &'static str {
        match self {
            FeatureNode::Feature => "Feature",
            FeatureNode::DataTypeDefinition(_) => "DataTypeDefinition",
            FeatureNode::DefinedExecutionError(_) => "DefinedExecutionError",
            FeatureNode::Property(_) => "Property",
            FeatureNode::Command(_) => "Command",
            FeatureNode::Parameter(_) => "Parameter",
            FeatureNode::Response(_) => "Response",
            FeatureNode::IntermediateResponse(_) => "IntermediateResponse",
            FeatureNode::Metadata(_) => "Metadata",
        }
    }
}

impl fmt::Debug for FeatureNode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.kind())
    }
}

/// One parsed feature-definition document: an addressable bundle of
/// commands, properties, metadata, type definitions, and error kinds.
///
/// Read-only after construction, apart from the binary-transfer-handler
/// slot the owning server injects.
pub struct Feature {
    info: NodeInfo,
    sila2_version: String,
    feature_version: String,
    feature_version_major: u64,
    maturity_level: String,
    locale: String,
    originator: String,
    category: String,
    fully_qualified_identifier: FullyQualifiedIdentifier,
    definition: String,

    data_type_definitions: BTreeMap<String, Arc<DataTypeDefinition>>,
    defined_execution_errors: BTreeMap<String, Arc<DefinedExecutionError>>,
    unobservable_properties: BTreeMap<String, Arc<Property>>,
    observable_properties: BTreeMap<String, Arc<Property>>,
    unobservable_commands: BTreeMap<String, Arc<Command>>,
    observable_commands: BTreeMap<String, Arc<Command>>,
    metadata_definitions: BTreeMap<String, Arc<Metadata>>,

    children_by_fully_qualified_identifier: HashMap<FullyQualifiedIdentifier, FeatureNode>,

    binary_transfer_handler: RwLock<Option<Arc<dyn BinaryTransferHandler>>>,
}

impl Feature {
    /// Parses a feature-definition document into a resolved object graph.
    ///
    /// Malformed XML, missing required attributes, cyclic data type
    /// definitions, and references to undeclared execution errors are all
    /// unrecoverable construction failures.
    pub fn new(definition: &str) -> Result<Self> {
        let document = roxmltree::Document::parse(definition)?;
        let root = document.root_element();
        if root.tag_name().name() != "Feature" {
            return Err(FrameworkError::Parse(format!(
                "expected root element 'Feature', got '{}'",
                root.tag_name().name()
            )));
        }

        let sila2_version = required_attribute(root, "SiLA2Version")?;
        let feature_version = required_attribute(root, "FeatureVersion")?;
        let originator = required_attribute(root, "Originator")?;
        let maturity_level = root.attribute("MaturityLevel").unwrap_or("Draft").to_string();
        let locale = root.attribute("Locale").unwrap_or("en-us").to_string();
        let category = root.attribute("Category").unwrap_or("none").to_string();

        let info = NodeInfo::from_element(root, "Feature")?;

        // Only the major component enters the identifier namespace:
        // version "2.1" yields "v2".
        let major = feature_version
            .split('.')
            .next()
            .and_then(|m| m.parse::<u64>().ok())
            .ok_or_else(|| {
                FrameworkError::Parse(format!(
                    "FeatureVersion '{feature_version}' has no integer major component"
                ))
            })?;

        let fqi =
            FullyQualifiedIdentifier::feature(&originator, &category, &info.identifier, major);

        tracing::debug!(feature = %fqi, "parsing feature definition");

        // Execution errors have no dependencies; resolve them first.
        let mut defined_execution_errors = BTreeMap::new();
        for el in xml::children(root, "DefinedExecutionError") {
            let error = Arc::new(DefinedExecutionError::from_element(el, &fqi)?);
            defined_execution_errors.insert(error.identifier().to_string(), error);
        }

        // Data type definitions may reference each other in any order;
        // the fixed-point resolver handles forward references and reports
        // cycles with every unresolved identifier.
        let definition_elements = xml::children(root, "DataTypeDefinition");
        let data_type_definitions = data_type::resolve_definitions(&definition_elements, &fqi)?;

        let mut unobservable_properties = BTreeMap::new();
        let mut observable_properties = BTreeMap::new();
        for el in xml::children(root, "Property") {
            let property = Arc::new(Property::from_element(el, &fqi, &data_type_definitions)?);
            check_error_references(
                &property.defined_execution_errors,
                &defined_execution_errors,
                property.identifier(),
            )?;
            let map = if property.observable {
                &mut observable_properties
            } else {
                &mut unobservable_properties
            };
            map.insert(property.identifier().to_string(), property);
        }

        let mut unobservable_commands = BTreeMap::new();
        let mut observable_commands = BTreeMap::new();
        for el in xml::children(root, "Command") {
            let command = Arc::new(Command::from_element(el, &fqi, &data_type_definitions)?);
            check_error_references(
                &command.defined_execution_errors,
                &defined_execution_errors,
                command.identifier(),
            )?;
            let map = if command.observable {
                &mut observable_commands
            } else {
                &mut unobservable_commands
            };
            map.insert(command.identifier().to_string(), command);
        }

        // Metadata last: it may reference data types but nothing depends
        // on it.
        let mut metadata_definitions = BTreeMap::new();
        for el in xml::children(root, "Metadata") {
            let metadata = Arc::new(Metadata::from_element(el, &fqi, &data_type_definitions)?);
            check_error_references(
                &metadata.defined_execution_errors,
                &defined_execution_errors,
                metadata.identifier(),
            )?;
            metadata_definitions.insert(metadata.identifier().to_string(), metadata);
        }

        let mut children = HashMap::new();
        children.insert(fqi.clone(), FeatureNode::Feature);
        for error in defined_execution_errors.values() {
            children.insert(
                error.fully_qualified_identifier.clone(),
                FeatureNode::DefinedExecutionError(error.clone()),
            );
        }
        for definition in data_type_definitions.values() {
            children.insert(
                definition.fully_qualified_identifier.clone(),
                FeatureNode::DataTypeDefinition(definition.clone()),
            );
        }
        for property in unobservable_properties
            .values()
            .chain(observable_properties.values())
        {
            children.insert(
                property.fully_qualified_identifier.clone(),
                FeatureNode::Property(property.clone()),
            );
        }
        for command in unobservable_commands
            .values()
            .chain(observable_commands.values())
        {
            children.insert(
                command.fully_qualified_identifier.clone(),
                FeatureNode::Command(command.clone()),
            );
            for parameter in &command.parameters {
                children.insert(
                    parameter.fully_qualified_identifier.clone(),
                    FeatureNode::Parameter(parameter.clone()),
                );
            }
            for response in &command.responses {
                children.insert(
                    response.fully_qualified_identifier.clone(),
                    FeatureNode::Response(response.clone()),
                );
            }
            for intermediate in &command.intermediate_responses {
                children.insert(
                    intermediate.fully_qualified_identifier.clone(),
                    FeatureNode::IntermediateResponse(intermediate.clone()),
                );
            }
        }
        for metadata in metadata_definitions.values() {
            children.insert(
                metadata.fully_qualified_identifier.clone(),
                FeatureNode::Metadata(metadata.clone()),
            );
        }

        Ok(Self {
            info,
            sila2_version,
            feature_version,
            feature_version_major: major,
            maturity_level,
            locale,
            originator,
            category,
            fully_qualified_identifier: fqi,
            definition: definition.to_string(),
            data_type_definitions,
            defined_execution_errors,
            unobservable_properties,
            observable_properties,
            unobservable_commands,
            observable_commands,
            metadata_definitions,
            children_by_fully_qualified_identifier: children,
            binary_transfer_handler: RwLock::new(None),
        })
    }

    pub fn identifier(&self) -> &str {
        &self.info.identifier
    }

    pub fn display_name(&self) -> &str {
        &self.info.display_name
    }

    pub fn description(&self) -> &str {
        &self.info.description
    }

    pub fn fully_qualified_identifier(&self) -> &FullyQualifiedIdentifier {
        &self.fully_qualified_identifier
    }

    pub fn sila2_version(&self) -> &str {
        &self.sila2_version
    }

    pub fn feature_version(&self) -> &str {
        &self.feature_version
    }

    pub fn feature_version_major(&self) -> u64 {
        self.feature_version_major
    }

    pub fn maturity_level(&self) -> &str {
        &self.maturity_level
    }

    pub fn locale(&self) -> &str {
        &self.locale
    }

    pub fn originator(&self) -> &str {
        &self.originator
    }

    pub fn category(&self) -> &str {
        &self.category
    }

    /// The raw definition document this feature was built from.
    pub fn definition(&self) -> &str {
        &self.definition
    }

    pub fn data_type_definitions(&self) -> &BTreeMap<String, Arc<DataTypeDefinition>> {
        &self.data_type_definitions
    }

    pub fn defined_execution_errors(&self) -> &BTreeMap<String, Arc<DefinedExecutionError>> {
        &self.defined_execution_errors
    }

    pub fn unobservable_properties(&self) -> &BTreeMap<String, Arc<Property>> {
        &self.unobservable_properties
    }

    pub fn observable_properties(&self) -> &BTreeMap<String, Arc<Property>> {
        &self.observable_properties
    }

    pub fn unobservable_commands(&self) -> &BTreeMap<String, Arc<Command>> {
        &self.unobservable_commands
    }

    pub fn observable_commands(&self) -> &BTreeMap<String, Arc<Command>> {
        &self.observable_commands
    }

    pub fn metadata_definitions(&self) -> &BTreeMap<String, Arc<Metadata>> {
        &self.metadata_definitions
    }

    /// Flat index of every descendant node keyed by its fully qualified
    /// identifier.
    pub fn children(&self) -> &HashMap<FullyQualifiedIdentifier, FeatureNode> {
        &self.children_by_fully_qualified_identifier
    }

    /// Looks up a descendant by its fully qualified identifier.
    pub fn child(&self, identifier: &FullyQualifiedIdentifier) -> Option<&FeatureNode> {
        self.children_by_fully_qualified_identifier.get(identifier)
    }

    /// Looks up a callable child by its short identifier.
    ///
    /// Checked in priority order: unobservable property, observable
    /// property, unobservable command, observable command, metadata.
    pub fn get(&self, identifier: &str) -> Result<FeatureNode> {
        if let Some(property) = self.unobservable_properties.get(identifier) {
            return Ok(FeatureNode::Property(property.clone()));
        }
        if let Some(property) = self.observable_properties.get(identifier) {
            return Ok(FeatureNode::Property(property.clone()));
        }
        if let Some(command) = self.unobservable_commands.get(identifier) {
            return Ok(FeatureNode::Command(command.clone()));
        }
        if let Some(command) = self.observable_commands.get(identifier) {
            return Ok(FeatureNode::Command(command.clone()));
        }
        if let Some(metadata) = self.metadata_definitions.get(identifier) {
            return Ok(FeatureNode::Metadata(metadata.clone()));
        }
        Err(FrameworkError::ChildNotFound {
            feature: self.info.identifier.clone(),
            identifier: identifier.to_string(),
        })
    }

    /// Injects the server's shared binary transfer handler. Called by the
    /// owning server when the feature is registered.
    pub fn set_binary_transfer_handler(&self, handler: Arc<dyn BinaryTransferHandler>) {
        *self
            .binary_transfer_handler
            .write()
            .unwrap_or_else(|e| e.into_inner()) = Some(handler);
    }

    pub fn binary_transfer_handler(&self) -> Option<Arc<dyn BinaryTransferHandler>> {
        self.binary_transfer_handler
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .clone()
    }
}

impl fmt::Debug for Feature {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Feature")
            .field("identifier", &self.info.identifier)
            .field(
                "fully_qualified_identifier",
                &self.fully_qualified_identifier,
            )
            .field("children", &self.children_by_fully_qualified_identifier.len())
            .finish()
    }
}

fn required_attribute(root: roxmltree::Node<'_, '_>, attribute: &str) -> Result<String> {
    root.attribute(attribute)
        .map(str::to_string)
        .ok_or_else(|| FrameworkError::MissingAttribute {
            attribute: attribute.to_string(),
        })
}

fn check_error_references(
    references: &[String],
    declared: &BTreeMap<String, Arc<DefinedExecutionError>>,
    owner: &str,
) -> Result<()> {
    for reference in references {
        if !declared.contains_key(reference) {
            return Err(FrameworkError::Parse(format!(
                "'{owner}' references undeclared execution error '{reference}'"
            )));
        }
    }
    Ok(())
}
