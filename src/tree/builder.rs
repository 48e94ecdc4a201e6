//! Event-driven builder for fragment trees.
//!
//! [`FragmentBuilder`] consumes the same [`SaxHandler`] events the scanner
//! sees and appends nodes to a [`Document`] arena. It never creates a
//! container above the outermost element it is fed: each such element
//! becomes an independent root. Character data, comments and processing
//! instructions that arrive while no element is open are dropped.
//!
//! After every `end_element`, [`completed_node`](FragmentBuilder::completed_node)
//! returns the element that was just closed, so callers never have to track
//! node identity themselves.

use super::{Attribute, Document, NodeId, NodeKind};
use crate::parser::ParseOptions;
use crate::sax::{SaxHandler, SaxResult};

/// Builds element subtrees from SAX events into an arena [`Document`].
#[derive(Debug, Default)]
pub struct FragmentBuilder {
    doc: Document,
    /// Elements currently open, innermost last.
    stack: Vec<NodeId>,
    /// The element closed by the most recent `end_element`.
    completed: Option<NodeId>,
    /// In-scope namespace bindings, innermost last. Tracked across the whole
    /// stream so fragment roots can carry the declarations they depend on.
    bindings: Vec<(Option<String>, String)>,
    strip_whitespace: bool,
}

impl FragmentBuilder {
    /// Creates a builder configured from `options`.
    #[must_use]
    pub fn new(options: &ParseOptions) -> Self {
        Self {
            strip_whitespace: options.strip_whitespace,
            ..Self::default()
        }
    }

    /// Returns the arena holding everything built so far.
    #[must_use]
    pub fn document(&self) -> &Document {
        &self.doc
    }

    /// Consumes the builder, returning its arena.
    #[must_use]
    pub fn into_document(self) -> Document {
        self.doc
    }

    /// Returns the element closed by the most recent `end_element` event.
    #[must_use]
    pub fn completed_node(&self) -> Option<NodeId> {
        self.completed
    }

    /// Returns the number of elements currently open in the builder.
    #[must_use]
    pub fn depth(&self) -> usize {
        self.stack.len()
    }

    /// Drops every built node while keeping namespace scope tracking.
    ///
    /// Only valid when no element is open in the builder.
    pub fn recycle(&mut self) {
        debug_assert!(self.stack.is_empty(), "recycling with open elements");
        self.doc.clear();
        self.stack.clear();
        self.completed = None;
    }

    fn append(&mut self, kind: NodeKind) {
        let Some(&parent) = self.stack.last() else {
            return;
        };
        let id = self.doc.create_node(kind);
        self.doc.append_child(parent, id);
    }

    fn append_text(&mut self, content: &str) {
        let Some(&parent) = self.stack.last() else {
            return;
        };
        if let Some(last) = self.doc.last_child(parent) {
            if let Some(text) = self.doc.text_mut(last) {
                text.push_str(content);
                return;
            }
        }
        self.append(NodeKind::text(content));
    }

    /// Returns declarations for every in-scope binding that `attributes`
    /// does not already declare, innermost binding per prefix.
    fn inherited_declarations(&self, attributes: &[Attribute]) -> Vec<Attribute> {
        let mut seen: Vec<Option<&str>> = Vec::new();
        let mut decls = Vec::new();
        for (prefix, uri) in self.bindings.iter().rev() {
            let prefix = prefix.as_deref();
            if seen.contains(&prefix) {
                continue;
            }
            seen.push(prefix);
            let declared = attributes.iter().any(|a| {
                a.is_namespace_decl()
                    && match prefix {
                        Some(p) => a.prefix.is_some() && a.name == p,
                        None => a.prefix.is_none(),
                    }
            });
            if !declared {
                decls.push(match prefix {
                    Some(p) => Attribute {
                        name: p.to_string(),
                        value: uri.clone(),
                        prefix: Some("xmlns".to_string()),
                        namespace: None,
                    },
                    None => Attribute::new("xmlns", uri.clone()),
                });
            }
        }
        decls.reverse();
        decls
    }
}

impl SaxHandler for FragmentBuilder {
    fn start_document(&mut self) -> SaxResult {
        self.doc.clear();
        self.stack.clear();
        self.bindings.clear();
        self.completed = None;
        Ok(())
    }

    fn start_prefix_mapping(&mut self, prefix: Option<&str>, uri: &str) -> SaxResult {
        self.bindings
            .push((prefix.map(str::to_string), uri.to_string()));
        Ok(())
    }

    fn end_prefix_mapping(&mut self, prefix: Option<&str>) -> SaxResult {
        if let Some(pos) = self
            .bindings
            .iter()
            .rposition(|(p, _)| p.as_deref() == prefix)
        {
            self.bindings.remove(pos);
        }
        Ok(())
    }

    fn start_element(
        &mut self,
        local_name: &str,
        prefix: Option<&str>,
        namespace: Option<&str>,
        attributes: &[Attribute],
    ) -> SaxResult {
        let mut attributes = attributes.to_vec();
        let parent = self.stack.last().copied();
        if parent.is_none() {
            let mut inherited = self.inherited_declarations(&attributes);
            inherited.append(&mut attributes);
            attributes = inherited;
        }

        let id = self.doc.create_node(NodeKind::Element {
            name: local_name.to_string(),
            prefix: prefix.map(str::to_string),
            namespace: namespace.map(str::to_string),
            attributes,
        });
        match parent {
            Some(parent) => self.doc.append_child(parent, id),
            None => self.doc.push_root(id),
        }
        self.stack.push(id);
        Ok(())
    }

    fn end_element(
        &mut self,
        _local_name: &str,
        _prefix: Option<&str>,
        _namespace: Option<&str>,
    ) -> SaxResult {
        let closed = self.stack.pop();
        debug_assert!(closed.is_some(), "end_element without open element");
        self.completed = closed;
        Ok(())
    }

    fn characters(&mut self, content: &str) -> SaxResult {
        self.append_text(content);
        Ok(())
    }

    fn ignorable_whitespace(&mut self, content: &str) -> SaxResult {
        if !self.strip_whitespace {
            self.append_text(content);
        }
        Ok(())
    }

    fn cdata(&mut self, content: &str) -> SaxResult {
        self.append(NodeKind::CData {
            content: content.to_string(),
        });
        Ok(())
    }

    fn comment(&mut self, content: &str) -> SaxResult {
        self.append(NodeKind::Comment {
            content: content.to_string(),
        });
        Ok(())
    }

    fn processing_instruction(&mut self, target: &str, data: Option<&str>) -> SaxResult {
        self.append(NodeKind::ProcessingInstruction {
            target: target.to_string(),
            data: data.map(str::to_string),
        });
        Ok(())
    }

    fn skipped_entity(&mut self, name: &str) -> SaxResult {
        self.append(NodeKind::EntityRef {
            name: name.to_string(),
        });
        Ok(())
    }
}
