//! Node type definitions.
//!
//! The `NodeKind` enum carries the node-type-specific payload (element name
//! and attributes, text content, ...). Navigation links live in `NodeData`.

use super::Attribute;

/// The kind of a built node and its associated data.
///
/// There is no document node: a [`Document`](super::Document) holds any
/// number of independent element roots, one per materialized match.
#[derive(Debug, Clone, PartialEq)]
pub enum NodeKind {
    /// An element node, e.g., `<div class="x">`.
    Element {
        /// The element's local name.
        name: String,
        /// Namespace prefix (e.g., `"svg"` in `svg:rect`), if any.
        prefix: Option<String>,
        /// Namespace URI after resolution, if any.
        namespace: Option<String>,
        /// Attributes on this element, including namespace declarations.
        attributes: Vec<Attribute>,
    },

    /// A text node containing character data.
    Text {
        /// The text content (references already resolved).
        content: String,
    },

    /// A CDATA section, e.g., `<![CDATA[...]]>`.
    CData {
        /// The CDATA content (no escaping applied).
        content: String,
    },

    /// A comment node (without the `<!--` and `-->` delimiters).
    Comment {
        /// The comment text.
        content: String,
    },

    /// A processing instruction, e.g., `<?target data?>`.
    ProcessingInstruction {
        /// The PI target.
        target: String,
        /// The PI data, if any.
        data: Option<String>,
    },

    /// An entity reference the reader did not expand, e.g., `&nbsp;`.
    EntityRef {
        /// The entity name (without `&` and `;`).
        name: String,
    },
}

impl NodeKind {
    /// Creates an element payload with no prefix, namespace or attributes.
    #[must_use]
    pub fn element(name: impl Into<String>) -> Self {
        Self::Element {
            name: name.into(),
            prefix: None,
            namespace: None,
            attributes: Vec::new(),
        }
    }

    /// Creates a text payload.
    #[must_use]
    pub fn text(content: impl Into<String>) -> Self {
        Self::Text {
            content: content.into(),
        }
    }

    /// Returns `true` for element payloads.
    #[must_use]
    pub fn is_element(&self) -> bool {
        matches!(self, Self::Element { .. })
    }
}
