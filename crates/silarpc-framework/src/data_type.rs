//! Data types, constraints, and named type definitions.
//!
//! A feature declares the types of its parameters, responses, properties,
//! and metadata using a small type algebra: basic types, lists, structures,
//! constrained types, and references to named definitions declared in the
//! same feature. Named definitions may reference each other in any
//! declaration order; [`resolve_definitions`] resolves them with a
//! fixed-point worklist and reports cycles as a construction error that
//! names every definition still unresolved.

use crate::errors::{FrameworkError, Result, UnresolvedDefinition};
use crate::identifier::FullyQualifiedIdentifier;
use crate::node::NodeInfo;
use crate::xml;
use roxmltree::Node;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::sync::Arc;

/// Primitive types of the feature definition schema.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum BasicType {
    String,
    Integer,
    Real,
    Boolean,
    Binary,
    Date,
    Time,
    Timestamp,
    Any,
}

impl BasicType {
    fn parse(name: &str) -> Result<Self> {
        match name {
            "String" => Ok(Self::String),
            "Integer" => Ok(Self::Integer),
            "Real" => Ok(Self::Real),
            "Boolean" => Ok(Self::Boolean),
            "Binary" => Ok(Self::Binary),
            "Date" => Ok(Self::Date),
            "Time" => Ok(Self::Time),
            "Timestamp" => Ok(Self::Timestamp),
            "Any" => Ok(Self::Any),
            other => Err(FrameworkError::Parse(format!("unknown basic type '{other}'"))),
        }
    }
}

/// A named element of a structure type.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StructureElement {
    pub info: NodeInfo,
    pub data_type: DataType,
}

/// A value constraint attached to a constrained type.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Constraint {
    Length(u64),
    MinimalLength(u64),
    MaximalLength(u64),
    Pattern(String),
    Set(Vec<String>),
    MinimalElementCount(u64),
    MaximalElementCount(u64),
}

impl Constraint {
    /// Checks a string value against this constraint.
    ///
    /// Only string-shaped constraints apply; element-count constraints are
    /// vacuously satisfied here.
    pub fn check_str(&self, value: &str) -> bool {
        match self {
            Constraint::Length(n) => value.chars().count() as u64 == *n,
            Constraint::MinimalLength(n) => value.chars().count() as u64 >= *n,
            Constraint::MaximalLength(n) => value.chars().count() as u64 <= *n,
            Constraint::Pattern(pattern) => match regex::Regex::new(&format!("^(?:{pattern})$")) {
                Ok(re) => re.is_match(value),
                Err(_) => false,
            },
            Constraint::Set(values) => values.iter().any(|v| v == value),
            Constraint::MinimalElementCount(_) | Constraint::MaximalElementCount(_) => true,
        }
    }

    fn parse_count(element: Node<'_, '_>, name: &str) -> Result<u64> {
        element
            .text()
            .map(str::trim)
            .and_then(|t| t.parse().ok())
            .ok_or_else(|| {
                FrameworkError::InvalidConstraint(format!("{name} requires a non-negative integer"))
            })
    }

    fn from_element(element: Node<'_, '_>) -> Result<Option<Self>> {
        let constraint = match element.tag_name().name() {
            "Length" => Some(Constraint::Length(Self::parse_count(element, "Length")?)),
            "MinimalLength" => Some(Constraint::MinimalLength(Self::parse_count(
                element,
                "MinimalLength",
            )?)),
            "MaximalLength" => Some(Constraint::MaximalLength(Self::parse_count(
                element,
                "MaximalLength",
            )?)),
            "Pattern" => {
                let pattern = element.text().map(str::trim).unwrap_or_default().to_string();
                regex::Regex::new(&pattern).map_err(|e| {
                    FrameworkError::InvalidConstraint(format!("invalid pattern '{pattern}': {e}"))
                })?;
                Some(Constraint::Pattern(pattern))
            }
            "Set" => {
                let values = xml::children(element, "Value")
                    .into_iter()
                    .filter_map(|v| v.text())
                    .map(|v| v.trim().to_string())
                    .collect();
                Some(Constraint::Set(values))
            }
            "MinimalElementCount" => Some(Constraint::MinimalElementCount(Self::parse_count(
                element,
                "MinimalElementCount",
            )?)),
            "MaximalElementCount" => Some(Constraint::MaximalElementCount(Self::parse_count(
                element,
                "MaximalElementCount",
            )?)),
            // Constraints outside the supported subset are carried by the
            // raw definition text but not enforced.
            _ => None,
        };
        Ok(constraint)
    }
}

impl std::fmt::Display for Constraint {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Constraint::Length(n) => write!(f, "Length = {n}"),
            Constraint::MinimalLength(n) => write!(f, "MinimalLength = {n}"),
            Constraint::MaximalLength(n) => write!(f, "MaximalLength = {n}"),
            Constraint::Pattern(p) => write!(f, "Pattern = {p}"),
            Constraint::Set(values) => write!(f, "Set = {{{}}}", values.join(", ")),
            Constraint::MinimalElementCount(n) => write!(f, "MinimalElementCount = {n}"),
            Constraint::MaximalElementCount(n) => write!(f, "MaximalElementCount = {n}"),
        }
    }
}

/// A resolved data type.
///
/// References to named definitions are resolved at construction time; the
/// [`DataType::Definition`] variant retains the alias name next to the
/// resolved type it stands for.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum DataType {
    Basic(BasicType),
    List(Box<DataType>),
    Structure(Vec<StructureElement>),
    Constrained {
        base: Box<DataType>,
        constraints: Vec<Constraint>,
    },
    Definition {
        identifier: String,
        resolved: Box<DataType>,
    },
}

impl DataType {
    /// Parses a `DataType` element, resolving definition references
    /// against `definitions`.
    ///
    /// A reference to an identifier absent from `definitions` yields
    /// [`FrameworkError::UnresolvedTypeReference`]; during definition
    /// resolution this defers the referencing definition to a later pass.
    pub(crate) fn from_element(
        element: Node<'_, '_>,
        definitions: &BTreeMap<String, Arc<DataTypeDefinition>>,
    ) -> Result<Self> {
        if let Some(basic) = xml::child_text(element, "Basic") {
            return Ok(DataType::Basic(BasicType::parse(basic)?));
        }

        if let Some(list) = xml::child(element, "List") {
            let inner = xml::require_child(list, "DataType", "List")?;
            return Ok(DataType::List(Box::new(Self::from_element(
                inner,
                definitions,
            )?)));
        }

        if let Some(structure) = xml::child(element, "Structure") {
            let mut elements = Vec::new();
            for el in xml::children(structure, "Element") {
                let info = NodeInfo::from_element(el, "Structure/Element")?;
                let inner = xml::require_child(el, "DataType", "Structure/Element")?;
                elements.push(StructureElement {
                    info,
                    data_type: Self::from_element(inner, definitions)?,
                });
            }
            if elements.is_empty() {
                return Err(FrameworkError::Parse(
                    "Structure requires at least one Element".to_string(),
                ));
            }
            return Ok(DataType::Structure(elements));
        }

        if let Some(constrained) = xml::child(element, "Constrained") {
            let inner = xml::require_child(constrained, "DataType", "Constrained")?;
            let base = Self::from_element(inner, definitions)?;
            let constraints_el = xml::require_child(constrained, "Constraints", "Constrained")?;
            let mut constraints = Vec::new();
            for el in constraints_el.children().filter(|c| c.is_element()) {
                if let Some(constraint) = Constraint::from_element(el)? {
                    constraints.push(constraint);
                }
            }
            return Ok(DataType::Constrained {
                base: Box::new(base),
                constraints,
            });
        }

        if let Some(reference) = xml::child_text(element, "DataTypeIdentifier") {
            let definition = definitions.get(reference).ok_or_else(|| {
                FrameworkError::UnresolvedTypeReference {
                    identifier: reference.to_string(),
                }
            })?;
            return Ok(DataType::Definition {
                identifier: reference.to_string(),
                resolved: Box::new(definition.data_type.clone()),
            });
        }

        Err(FrameworkError::Parse(
            "DataType requires one of Basic, List, Structure, Constrained, or DataTypeIdentifier"
                .to_string(),
        ))
    }

    /// The constraints of this type, looking through definition aliases.
    /// Empty for unconstrained types.
    pub fn constraints(&self) -> &[Constraint] {
        match self {
            DataType::Constrained { constraints, .. } => constraints,
            DataType::Definition { resolved, .. } => resolved.constraints(),
            _ => &[],
        }
    }

    /// The type with definition aliases and constraint wrappers removed.
    pub fn base(&self) -> &DataType {
        match self {
            DataType::Definition { resolved, .. } => resolved.base(),
            DataType::Constrained { base, .. } => base.base(),
            other => other,
        }
    }
}

/// A named, reusable type alias scoped to one feature.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DataTypeDefinition {
    pub info: NodeInfo,
    pub fully_qualified_identifier: FullyQualifiedIdentifier,
    pub data_type: DataType,
}

impl DataTypeDefinition {
    pub(crate) fn from_element(
        element: Node<'_, '_>,
        feature: &FullyQualifiedIdentifier,
        definitions: &BTreeMap<String, Arc<DataTypeDefinition>>,
    ) -> Result<Self> {
        let info = NodeInfo::from_element(element, "DataTypeDefinition")?;
        let type_el = xml::require_child(element, "DataType", "DataTypeDefinition")?;
        let data_type = DataType::from_element(type_el, definitions)?;
        Ok(Self {
            fully_qualified_identifier: feature.data_type(&info.identifier),
            info,
            data_type,
        })
    }

    pub fn identifier(&self) -> &str {
        &self.info.identifier
    }
}

/// Resolves every `DataTypeDefinition` element of a feature.
///
/// Fixed-point worklist: each pass attempts to construct every definition
/// still unresolved; a definition whose construction fails only because it
/// references a not-yet-resolved sibling is deferred to the next pass. The
/// loop stops when the worklist is empty, or when a full pass makes no
/// progress, which is reported as a cyclic-dependency error naming every
/// definition still unresolved. Resolution order is therefore independent
/// of declaration order.
pub(crate) fn resolve_definitions(
    elements: &[Node<'_, '_>],
    feature: &FullyQualifiedIdentifier,
) -> Result<BTreeMap<String, Arc<DataTypeDefinition>>> {
    let mut resolved: BTreeMap<String, Arc<DataTypeDefinition>> = BTreeMap::new();
    let mut worklist: Vec<Node<'_, '_>> = elements.to_vec();

    while !worklist.is_empty() {
        let mut deferred = Vec::new();
        let mut stalled = Vec::new();
        let before = worklist.len();

        for element in worklist {
            match DataTypeDefinition::from_element(element, feature, &resolved) {
                Ok(definition) => {
                    resolved.insert(definition.identifier().to_string(), Arc::new(definition));
                }
                Err(FrameworkError::UnresolvedTypeReference { identifier }) => {
                    let name = xml::child_text(element, "Identifier")
                        .unwrap_or("<missing identifier>")
                        .to_string();
                    stalled.push(UnresolvedDefinition {
                        identifier: name,
                        missing_reference: identifier,
                    });
                    deferred.push(element);
                }
                Err(other) => return Err(other),
            }
        }

        if deferred.len() == before {
            return Err(FrameworkError::CyclicTypeDefinitions(stalled));
        }
        worklist = deferred;
    }

    Ok(resolved)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse_type(xml: &str) -> Result<DataType> {
        let wrapped = format!("<DataType>{xml}</DataType>");
        let doc = roxmltree::Document::parse(&wrapped).unwrap();
        DataType::from_element(doc.root_element(), &BTreeMap::new())
    }

    #[test]
    fn test_basic_types() {
        assert_eq!(
            parse_type("<Basic>String</Basic>").unwrap(),
            DataType::Basic(BasicType::String)
        );
        assert_eq!(
            parse_type("<Basic>Integer</Basic>").unwrap(),
            DataType::Basic(BasicType::Integer)
        );
        assert!(parse_type("<Basic>Float</Basic>").is_err());
    }

    #[test]
    fn test_list_type() {
        let parsed = parse_type("<List><DataType><Basic>Real</Basic></DataType></List>").unwrap();
        assert_eq!(parsed, DataType::List(Box::new(DataType::Basic(BasicType::Real))));
    }

    #[test]
    fn test_structure_requires_elements() {
        assert!(parse_type("<Structure></Structure>").is_err());
    }

    #[test]
    fn test_constrained_type_constraints() {
        let parsed = parse_type(
            "<Constrained>\
                <DataType><Basic>String</Basic></DataType>\
                <Constraints><MaximalLength>8</MaximalLength><Pattern>[a-z]+</Pattern></Constraints>\
             </Constrained>",
        )
        .unwrap();
        let constraints = parsed.constraints();
        assert_eq!(constraints.len(), 2);
        assert!(constraints[0].check_str("short"));
        assert!(!constraints[0].check_str("muchtoolong"));
        assert!(constraints[1].check_str("abc"));
        assert!(!constraints[1].check_str("ABC"));
    }

    #[test]
    fn test_pattern_is_anchored() {
        let pattern = Constraint::Pattern("[0-9]+".to_string());
        assert!(pattern.check_str("123"));
        assert!(!pattern.check_str("123abc"));
        assert!(!pattern.check_str("abc123"));
    }

    #[test]
    fn test_set_constraint() {
        let set = Constraint::Set(vec!["mm".to_string(), "cm".to_string()]);
        assert!(set.check_str("mm"));
        assert!(!set.check_str("km"));
    }

    #[test]
    fn test_unresolved_reference() {
        let err = parse_type("<DataTypeIdentifier>Missing</DataTypeIdentifier>").unwrap_err();
        match err {
            FrameworkError::UnresolvedTypeReference { identifier } => {
                assert_eq!(identifier, "Missing");
            }
            other => panic!("unexpected error: {other}"),
        }
    }
}
