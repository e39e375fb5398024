use thiserror::Error;

/// A definition whose construction stalled in the fixed-point resolver,
/// together with the first referenced identifier that could not be found.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UnresolvedDefinition {
    pub identifier: String,
    pub missing_reference: String,
}

#[derive(Error, Debug)]
pub enum FrameworkError {
    #[error("Invalid feature definition: {0}")]
    Xml(#[from] roxmltree::Error),

    #[error("Invalid feature definition: {0}")]
    Parse(String),

    #[error("Missing required attribute '{attribute}' on the Feature element")]
    MissingAttribute { attribute: String },

    #[error("Missing element '{element}' in {context}")]
    MissingElement { element: String, context: String },

    #[error("Unresolved data type reference '{identifier}'")]
    UnresolvedTypeReference { identifier: String },

    #[error("Cyclic or unresolvable data type definitions: {}", format_unresolved(.0))]
    CyclicTypeDefinitions(Vec<UnresolvedDefinition>),

    #[error("Feature '{feature}' has no property, command, or metadata named '{identifier}'")]
    ChildNotFound { feature: String, identifier: String },

    #[error("Invalid constraint: {0}")]
    InvalidConstraint(String),
}

fn format_unresolved(unresolved: &[UnresolvedDefinition]) -> String {
    unresolved
        .iter()
        .map(|u| format!("{} -> {}", u.identifier, u.missing_reference))
        .collect::<Vec<_>>()
        .join(", ")
}

impl FrameworkError {
    /// Identifiers of all definitions left unresolved by the fixed-point
    /// resolver, if this is a cyclic-definition error.
    pub fn unresolved_identifiers(&self) -> Option<Vec<&str>> {
        match self {
            FrameworkError::CyclicTypeDefinitions(defs) => {
                Some(defs.iter().map(|d| d.identifier.as_str()).collect())
            }
            _ => None,
        }
    }
}

pub type Result<T> = std::result::Result<T, FrameworkError>;
