//! XML serializer for built fragments.
//!
//! Writes an element subtree back out as well-formed XML. There is no XML
//! declaration: the output is a fragment, suitable for printing a match or
//! embedding it in another document.

use std::fmt::Write;

use crate::tree::{Document, NodeId, NodeKind};

/// Options controlling XML serialization output.
///
/// # Examples
///
/// ```
/// use xmlscan::Document;
/// use xmlscan::serial::{serialize_node_with_options, SerializeOptions};
///
/// let doc = Document::parse_str("<root><child>Hello</child></root>").unwrap();
/// let xml = serialize_node_with_options(&doc, doc.roots()[0], &SerializeOptions::default().indent(true));
/// assert!(xml.contains("  <child>"));
/// ```
#[derive(Debug, Clone)]
pub struct SerializeOptions {
    /// Whether to produce indented output. Defaults to `false`.
    pub indent: bool,
    /// The string written once per nesting level when `indent` is `true`.
    pub indent_str: String,
}

impl Default for SerializeOptions {
    fn default() -> Self {
        Self {
            indent: false,
            indent_str: "  ".to_string(),
        }
    }
}

impl SerializeOptions {
    /// Enables or disables indented output.
    ///
    /// Only element-only content is re-indented; mixed content is written
    /// as it is.
    #[must_use]
    pub fn indent(mut self, indent: bool) -> Self {
        self.indent = indent;
        self
    }

    /// Sets the indentation string used for each nesting level.
    #[must_use]
    pub fn indent_str(mut self, s: &str) -> Self {
        self.indent_str = s.to_string();
        self
    }
}

/// Serializes the subtree rooted at `node`.
///
/// # Examples
///
/// ```
/// use xmlscan::Document;
/// use xmlscan::serial::serialize_node;
///
/// let doc = Document::parse_str(r#"<a x="1 &amp; 2"><b/>t</a>"#).unwrap();
/// assert_eq!(serialize_node(&doc, doc.roots()[0]), r#"<a x="1 &amp; 2"><b/>t</a>"#);
/// ```
#[must_use]
pub fn serialize_node(doc: &Document, node: NodeId) -> String {
    serialize_node_with_options(doc, node, &SerializeOptions::default())
}

/// Serializes the subtree rooted at `node` with the given options.
#[must_use]
pub fn serialize_node_with_options(
    doc: &Document,
    node: NodeId,
    options: &SerializeOptions,
) -> String {
    let mut out = String::new();
    Writer {
        doc,
        options,
        out: &mut out,
    }
    .node(node, 0, false);
    out
}

/// Serializes every root of `doc`, one per line.
#[must_use]
pub fn serialize(doc: &Document) -> String {
    let mut out = String::new();
    for &root in doc.roots() {
        out.push_str(&serialize_node(doc, root));
        out.push('\n');
    }
    out
}

struct Writer<'a> {
    doc: &'a Document,
    options: &'a SerializeOptions,
    out: &'a mut String,
}

impl Writer<'_> {
    fn pad(&mut self, depth: usize, on_own_line: bool) {
        if self.options.indent && on_own_line {
            for _ in 0..depth {
                self.out.push_str(&self.options.indent_str);
            }
        }
    }

    fn newline(&mut self, on_own_line: bool) {
        if self.options.indent && on_own_line {
            self.out.push('\n');
        }
    }

    fn node(&mut self, id: NodeId, depth: usize, own_line: bool) {
        let doc = self.doc;
        match &doc.node(id).kind {
            NodeKind::Element {
                name,
                prefix,
                attributes,
                ..
            } => {
                self.pad(depth, own_line);
                self.out.push('<');
                write_qname(self.out, prefix.as_deref(), name);
                for attr in attributes {
                    self.out.push(' ');
                    write_qname(self.out, attr.prefix.as_deref(), &attr.name);
                    self.out.push_str("=\"");
                    write_escaped_attr(self.out, &attr.value);
                    self.out.push('"');
                }

                if doc.first_child(id).is_none() {
                    self.out.push_str("/>");
                    self.newline(own_line);
                    return;
                }
                self.out.push('>');
                let element_only = self.options.indent && is_element_only(doc, id);
                if element_only {
                    self.out.push('\n');
                }
                for child in doc.children(id) {
                    if element_only && is_blank_text(doc, child) {
                        continue;
                    }
                    self.node(child, depth + 1, element_only);
                }
                self.pad(depth, element_only);
                self.out.push_str("</");
                write_qname(self.out, prefix.as_deref(), name);
                self.out.push('>');
                self.newline(own_line);
            }
            NodeKind::Text { content } => write_escaped_text(self.out, content),
            NodeKind::CData { content } => {
                // "]]>" cannot appear inside a section; split it across two.
                self.out.push_str("<![CDATA[");
                self.out.push_str(&content.replace("]]>", "]]]]><![CDATA[>"));
                self.out.push_str("]]>");
            }
            NodeKind::Comment { content } => {
                self.pad(depth, own_line);
                self.out.push_str("<!--");
                self.out.push_str(content);
                self.out.push_str("-->");
                self.newline(own_line);
            }
            NodeKind::ProcessingInstruction { target, data } => {
                self.pad(depth, own_line);
                self.out.push_str("<?");
                self.out.push_str(target);
                if let Some(data) = data {
                    self.out.push(' ');
                    self.out.push_str(data);
                }
                self.out.push_str("?>");
                self.newline(own_line);
            }
            NodeKind::EntityRef { name } => {
                self.out.push('&');
                self.out.push_str(name);
                self.out.push(';');
            }
        }
    }
}

fn write_qname(out: &mut String, prefix: Option<&str>, name: &str) {
    if let Some(prefix) = prefix {
        out.push_str(prefix);
        out.push(':');
    }
    out.push_str(name);
}

fn is_blank_text(doc: &Document, id: NodeId) -> bool {
    matches!(&doc.node(id).kind, NodeKind::Text { content } if content.trim().is_empty())
}

/// Returns `true` if the element has element children and otherwise only
/// whitespace text, comments or processing instructions.
fn is_element_only(doc: &Document, id: NodeId) -> bool {
    let mut has_element_child = false;
    for child in doc.children(id) {
        match &doc.node(child).kind {
            NodeKind::Element { .. } => has_element_child = true,
            NodeKind::Text { content } if !content.trim().is_empty() => return false,
            NodeKind::CData { .. } | NodeKind::EntityRef { .. } => return false,
            _ => {}
        }
    }
    has_element_child
}

fn write_char_ref(out: &mut String, ch: char) {
    let _ = write!(out, "&#x{:X};", u32::from(ch));
}

/// Escapes character data. `\r` and other C0 controls are written as
/// character references so they survive a reparse.
fn write_escaped_text(out: &mut String, text: &str) {
    for ch in text.chars() {
        match ch {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '\t' | '\n' => out.push(ch),
            c if u32::from(c) < 0x20 => write_char_ref(out, c),
            _ => out.push(ch),
        }
    }
}

/// Escapes an attribute value for a double-quoted attribute. Whitespace
/// other than space is escaped so attribute normalization keeps it.
fn write_escaped_attr(out: &mut String, value: &str) {
    for ch in value.chars() {
        match ch {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            c if u32::from(c) < 0x20 => write_char_ref(out, c),
            _ => out.push(ch),
        }
    }
}
