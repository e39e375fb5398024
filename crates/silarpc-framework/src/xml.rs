//! Element access helpers over the XML backend.
//!
//! Feature definitions are namespace-qualified XML documents. All lookups
//! here match on the local element name so that documents with or without
//! an explicit namespace prefix parse identically; schema validation proper
//! is out of scope.

use crate::errors::{FrameworkError, Result};
use roxmltree::Node;

/// First child element with the given local name.
pub(crate) fn child<'a, 'input>(node: Node<'a, 'input>, name: &str) -> Option<Node<'a, 'input>> {
    node.children()
        .find(|c| c.is_element() && c.tag_name().name() == name)
}

/// All child elements with the given local name, in document order.
pub(crate) fn children<'a, 'input>(node: Node<'a, 'input>, name: &str) -> Vec<Node<'a, 'input>> {
    node.children()
        .filter(|c| c.is_element() && c.tag_name().name() == name)
        .collect()
}

/// Trimmed text content of the first child element with the given name.
pub(crate) fn child_text<'a>(node: Node<'a, '_>, name: &str) -> Option<&'a str> {
    child(node, name).and_then(|c| c.text()).map(str::trim)
}

pub(crate) fn require_child<'a, 'input>(
    node: Node<'a, 'input>,
    name: &str,
    context: &str,
) -> Result<Node<'a, 'input>> {
    child(node, name).ok_or_else(|| FrameworkError::MissingElement {
        element: name.to_string(),
        context: context.to_string(),
    })
}

pub(crate) fn require_child_text<'a>(node: Node<'a, '_>, name: &str, context: &str) -> Result<&'a str> {
    require_child(node, name, context)?
        .text()
        .map(str::trim)
        .filter(|t| !t.is_empty())
        .ok_or_else(|| FrameworkError::MissingElement {
            element: name.to_string(),
            context: context.to_string(),
        })
}

/// Parses a `Yes`/`No` element (the schema's boolean encoding).
pub(crate) fn yes_no(node: Node<'_, '_>, name: &str, context: &str) -> Result<bool> {
    match require_child_text(node, name, context)? {
        "Yes" => Ok(true),
        "No" => Ok(false),
        other => Err(FrameworkError::Parse(format!(
            "expected 'Yes' or 'No' for {name} in {context}, got '{other}'"
        ))),
    }
}
