use crate::errors::Result;
use crate::xml;
use roxmltree::Node;
use serde::{Deserialize, Serialize};

/// Identity shared by every schema-derived node.
///
/// Each element in a feature definition carries an `Identifier` (unique
/// within its enclosing scope), a human-readable `DisplayName`, and a
/// `Description`. Nodes embed this struct rather than inheriting from a
/// base class; it is created once during feature construction and immutable
/// afterwards.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NodeInfo {
    pub identifier: String,
    pub display_name: String,
    pub description: String,
}

impl NodeInfo {
    pub(crate) fn from_element(element: Node<'_, '_>, context: &str) -> Result<Self> {
        let identifier = xml::require_child_text(element, "Identifier", context)?.to_string();
        let display_name = xml::child_text(element, "DisplayName")
            .filter(|t| !t.is_empty())
            .unwrap_or(&identifier)
            .to_string();
        let description = xml::child_text(element, "Description")
            .unwrap_or_default()
            .to_string();
        Ok(Self {
            identifier,
            display_name,
            description,
        })
    }
}
