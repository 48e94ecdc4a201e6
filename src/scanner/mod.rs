//! Selective element scanning.
//!
//! [`ElementScanner`] sits between the event reader and the application. It
//! tracks the path of open elements, matches each newly opened element
//! against the registered [`Pattern`](crate::pattern::Pattern)s and, only
//! while at least one match is pending, feeds events to a
//! [`FragmentBuilder`]. When a matched element closes, its built subtree is
//! handed to every listener registered for it.
//!
//! Elements outside any match are never built, so memory is bounded by the
//! subtrees that are currently open under a match.
//!
//! # Examples
//!
//! ```
//! use std::cell::RefCell;
//! use std::rc::Rc;
//! use xmlscan::ElementScanner;
//!
//! let mut scanner = ElementScanner::new();
//! let titles = Rc::new(RefCell::new(Vec::new()));
//! let sink = Rc::clone(&titles);
//! scanner
//!     .listen("item/title", move |_path, doc, node| {
//!         sink.borrow_mut().push(doc.text_content(node));
//!         Ok(())
//!     })
//!     .unwrap();
//!
//! scanner
//!     .parse_str("<rss><item><title>One</title></item><item><title>Two</title></item></rss>")
//!     .unwrap();
//! assert_eq!(*titles.borrow(), ["One", "Two"]);
//! ```
//!
//! A scanner is not reentrant: one parse at a time per instance. The borrow
//! checker enforces this, and also keeps the registry from being changed
//! while a parse is in progress.

mod active;
mod path;
mod registry;

pub use active::ActiveRules;
pub use path::PathTracker;
pub use registry::{same_listener, Registration, RuleRegistry};

use std::cell::RefCell;
use std::io::Read;
use std::rc::Rc;

use crate::error::{ListenerError, PatternError, ScanError};
use crate::parser::ParseOptions;
use crate::sax::{parse_sax, parse_sax_bytes, SaxHandler, SaxResult};
use crate::tree::{Attribute, Document, FragmentBuilder, NodeId};

/// Receives matched elements.
///
/// `path` is the slash-separated path of local names from the root to the
/// element, e.g. `/root/z/x`. The node lives in `doc` only for the duration
/// of the call; use [`Document::extract_subtree`] to keep it.
pub trait ElementListener {
    /// Called once per matched element, after its end tag.
    ///
    /// # Errors
    ///
    /// Returning an error stops the scan; no further listener is notified.
    fn element_matched(&mut self, path: &str, doc: &Document, node: NodeId)
        -> Result<(), ListenerError>;
}

impl<F> ElementListener for F
where
    F: FnMut(&str, &Document, NodeId) -> Result<(), ListenerError>,
{
    fn element_matched(
        &mut self,
        path: &str,
        doc: &Document,
        node: NodeId,
    ) -> Result<(), ListenerError> {
        self(path, doc, node)
    }
}

/// A listener handle. Registration and removal use `Rc` pointer identity.
pub type SharedListener = Rc<RefCell<dyn ElementListener>>;

/// Counters for one parse.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ScanStats {
    /// Elements opened in the input.
    pub elements: u64,
    /// Elements fed to the tree builder.
    pub materialized: u64,
    /// Listener notifications delivered.
    pub notifications: u64,
}

/// Per-parse state, reset at every `start_document`.
#[derive(Debug, Default)]
struct ScanState {
    path: PathTracker,
    active: ActiveRules,
    builder: FragmentBuilder,
    stats: ScanStats,
}

/// A streaming filter that builds and dispatches only matching elements.
#[derive(Debug, Default)]
pub struct ElementScanner {
    registry: RuleRegistry,
    options: ParseOptions,
    state: ScanState,
}

impl ElementScanner {
    /// Creates a scanner with default options and no listeners.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a scanner with the given options.
    #[must_use]
    pub fn with_options(options: ParseOptions) -> Self {
        Self {
            options,
            ..Self::default()
        }
    }

    // --- Registration ---

    /// Registers `listener` for elements matching `pattern`.
    ///
    /// The same listener may be registered under several patterns; it is
    /// then notified once per matching registration.
    ///
    /// # Errors
    ///
    /// Returns [`PatternError`] if the pattern does not compile.
    pub fn add_listener(
        &mut self,
        listener: SharedListener,
        pattern: &str,
    ) -> Result<(), PatternError> {
        self.registry.add(listener, pattern)?;
        tracing::debug!(pattern, rules = self.registry.len(), "listener registered");
        Ok(())
    }

    /// Registers a closure for `pattern` and returns its handle for removal.
    ///
    /// # Errors
    ///
    /// Returns [`PatternError`] if the pattern does not compile.
    pub fn listen<F>(&mut self, pattern: &str, f: F) -> Result<SharedListener, PatternError>
    where
        F: FnMut(&str, &Document, NodeId) -> Result<(), ListenerError> + 'static,
    {
        let listener: SharedListener = Rc::new(RefCell::new(f));
        self.add_listener(Rc::clone(&listener), pattern)?;
        Ok(listener)
    }

    /// Removes registrations by listener, by pattern string, or both, and
    /// returns how many were removed. `(None, None)` removes nothing.
    pub fn remove_listener(
        &mut self,
        listener: Option<&SharedListener>,
        pattern: Option<&str>,
    ) -> usize {
        let removed = self.registry.remove(listener, pattern);
        tracing::debug!(removed, rules = self.registry.len(), "listeners removed");
        removed
    }

    /// Returns the number of registrations.
    #[must_use]
    pub fn listener_count(&self) -> usize {
        self.registry.len()
    }

    /// Returns the registered pattern strings, in registration order.
    pub fn patterns(&self) -> impl Iterator<Item = &str> {
        self.registry.iter().map(|rule| rule.pattern.as_str())
    }

    /// Returns the registry.
    #[must_use]
    pub fn registry(&self) -> &RuleRegistry {
        &self.registry
    }

    // --- Configuration ---

    /// Returns the parse options.
    #[must_use]
    pub fn options(&self) -> &ParseOptions {
        &self.options
    }

    /// Returns the parse options for modification.
    pub fn options_mut(&mut self) -> &mut ParseOptions {
        &mut self.options
    }

    /// Sets whether whitespace-only text is left out of built elements.
    pub fn set_strip_whitespace(&mut self, yes: bool) {
        self.options.strip_whitespace = yes;
    }

    /// Sets whether internal-subset entities are expanded.
    pub fn set_expand_entities(&mut self, yes: bool) {
        self.options.expand_entities = yes;
    }

    // --- Parsing ---

    /// Scans an XML string.
    ///
    /// # Errors
    ///
    /// Returns [`ScanError::Parse`] for malformed input and
    /// [`ScanError::Listener`] if a listener failed.
    pub fn parse_str(&mut self, input: &str) -> Result<ScanStats, ScanError> {
        let options = self.options.clone();
        parse_sax(input, &options, &mut self.session())?;
        Ok(self.state.stats)
    }

    /// Scans an XML string, passing every event on to `handler` as well.
    ///
    /// # Errors
    ///
    /// Same as [`parse_str`](Self::parse_str), plus any error `handler`
    /// returns.
    pub fn parse_str_with_handler(
        &mut self,
        input: &str,
        handler: &mut dyn SaxHandler,
    ) -> Result<ScanStats, ScanError> {
        let options = self.options.clone();
        parse_sax(input, &options, &mut self.session_with_handler(handler))?;
        Ok(self.state.stats)
    }

    /// Scans raw bytes, detecting their encoding.
    ///
    /// # Errors
    ///
    /// Same as [`parse_str`](Self::parse_str), plus
    /// [`ScanError::Encoding`] if the bytes cannot be decoded.
    pub fn parse_bytes(&mut self, bytes: &[u8]) -> Result<ScanStats, ScanError> {
        let options = self.options.clone();
        parse_sax_bytes(bytes, &options, &mut self.session())?;
        Ok(self.state.stats)
    }

    /// Reads `reader` to the end and scans its content.
    ///
    /// # Errors
    ///
    /// Same as [`parse_bytes`](Self::parse_bytes), plus [`ScanError::Io`]
    /// if reading fails.
    pub fn parse_reader(&mut self, mut reader: impl Read) -> Result<ScanStats, ScanError> {
        let mut bytes = Vec::new();
        reader.read_to_end(&mut bytes)?;
        self.parse_bytes(&bytes)
    }

    /// Returns the counters of the most recent parse.
    #[must_use]
    pub fn stats(&self) -> ScanStats {
        self.state.stats
    }

    /// Returns a [`SaxHandler`] that drives this scanner from any event
    /// source.
    pub fn session(&mut self) -> ScanSession<'_> {
        self.state.builder = FragmentBuilder::new(&self.options);
        ScanSession {
            registry: &self.registry,
            state: &mut self.state,
            downstream: None,
        }
    }

    /// Like [`session`](Self::session), forwarding every event to `handler`.
    pub fn session_with_handler<'a>(
        &'a mut self,
        handler: &'a mut dyn SaxHandler,
    ) -> ScanSession<'a> {
        let mut session = self.session();
        session.downstream = Some(handler);
        session
    }
}

/// The event-driven side of an [`ElementScanner`].
///
/// Feed it a complete event stream, starting with `start_document`.
pub struct ScanSession<'a> {
    registry: &'a RuleRegistry,
    state: &'a mut ScanState,
    downstream: Option<&'a mut dyn SaxHandler>,
}

impl ScanSession<'_> {
    fn forward(&mut self, event: impl FnOnce(&mut dyn SaxHandler) -> SaxResult) -> SaxResult {
        match self.downstream.as_deref_mut() {
            Some(handler) => event(handler),
            None => Ok(()),
        }
    }

    /// Feeds an event to the builder when a match is pending.
    fn build(&mut self, event: impl FnOnce(&mut FragmentBuilder) -> SaxResult) -> SaxResult {
        if self.state.active.is_building() {
            event(&mut self.state.builder)
        } else {
            Ok(())
        }
    }
}

/// Notifies the listeners of `rules` about the element closed at `path`.
fn dispatch(
    registry: &RuleRegistry,
    rules: &[usize],
    path: &str,
    doc: &Document,
    node: NodeId,
    stats: &mut ScanStats,
) -> SaxResult {
    for &index in rules {
        let rule = registry.get(index);
        if !rule.pattern.matches_node(doc, node) {
            tracing::trace!(path, pattern = rule.pattern.as_str(), "predicate rejected match");
            continue;
        }
        let mut listener = rule.listener.try_borrow_mut().map_err(|_| ScanError::Listener {
            path: path.to_string(),
            source: format!("listener for '{}' is already running", rule.pattern).into(),
        })?;
        stats.notifications += 1;
        listener
            .element_matched(path, doc, node)
            .map_err(|source| {
                tracing::debug!(path, pattern = rule.pattern.as_str(), error = %source, "listener failed");
                ScanError::Listener {
                    path: path.to_string(),
                    source,
                }
            })?;
    }
    Ok(())
}

impl SaxHandler for ScanSession<'_> {
    fn start_document(&mut self) -> SaxResult {
        let state = &mut *self.state;
        state.path.clear();
        state.active.clear();
        state.stats = ScanStats::default();
        state.builder.start_document()?;
        tracing::debug!(rules = self.registry.len(), "scan started");
        self.forward(|h| h.start_document())
    }

    fn end_document(&mut self) -> SaxResult {
        let stats = self.state.stats;
        tracing::debug!(
            elements = stats.elements,
            materialized = stats.materialized,
            notifications = stats.notifications,
            "scan finished"
        );
        self.forward(|h| h.end_document())
    }

    fn start_prefix_mapping(&mut self, prefix: Option<&str>, uri: &str) -> SaxResult {
        self.state.builder.start_prefix_mapping(prefix, uri)?;
        self.forward(|h| h.start_prefix_mapping(prefix, uri))
    }

    fn end_prefix_mapping(&mut self, prefix: Option<&str>) -> SaxResult {
        self.state.builder.end_prefix_mapping(prefix)?;
        self.forward(|h| h.end_prefix_mapping(prefix))
    }

    fn start_element(
        &mut self,
        local_name: &str,
        prefix: Option<&str>,
        namespace: Option<&str>,
        attributes: &[Attribute],
    ) -> SaxResult {
        let state = &mut *self.state;
        state.path.push(local_name);
        state.stats.elements += 1;

        if !self.registry.is_empty() {
            let segments: Vec<&str> = state.path.segments().collect();
            let matched = self.registry.matching_rules(&segments, attributes);
            if !matched.is_empty() {
                tracing::debug!(
                    path = state.path.as_str(),
                    rules = matched.len(),
                    "rules activated"
                );
                state.active.insert(state.path.as_str(), matched);
            }
        }
        if state.active.is_building() {
            state.stats.materialized += 1;
        }

        self.build(|b| b.start_element(local_name, prefix, namespace, attributes))?;
        self.forward(|h| h.start_element(local_name, prefix, namespace, attributes))
    }

    fn end_element(
        &mut self,
        local_name: &str,
        prefix: Option<&str>,
        namespace: Option<&str>,
    ) -> SaxResult {
        let state = &mut *self.state;
        let was_building = state.active.is_building();
        let entry = state.active.remove(state.path.as_str());

        if was_building {
            state.builder.end_element(local_name, prefix, namespace)?;
        }
        if let Some(rules) = entry {
            if let Some(node) = state.builder.completed_node() {
                tracing::debug!(
                    path = state.path.as_str(),
                    rules = rules.len(),
                    "dispatching match"
                );
                dispatch(
                    self.registry,
                    &rules,
                    state.path.as_str(),
                    state.builder.document(),
                    node,
                    &mut state.stats,
                )?;
            }
        }
        if was_building && !state.active.is_building() {
            state.builder.recycle();
        }
        state.path.pop(local_name);

        self.forward(|h| h.end_element(local_name, prefix, namespace))
    }

    fn characters(&mut self, content: &str) -> SaxResult {
        self.build(|b| b.characters(content))?;
        self.forward(|h| h.characters(content))
    }

    fn ignorable_whitespace(&mut self, content: &str) -> SaxResult {
        self.build(|b| b.ignorable_whitespace(content))?;
        self.forward(|h| h.ignorable_whitespace(content))
    }

    fn cdata(&mut self, content: &str) -> SaxResult {
        self.build(|b| b.cdata(content))?;
        self.forward(|h| h.cdata(content))
    }

    fn comment(&mut self, content: &str) -> SaxResult {
        self.build(|b| b.comment(content))?;
        self.forward(|h| h.comment(content))
    }

    fn processing_instruction(&mut self, target: &str, data: Option<&str>) -> SaxResult {
        self.build(|b| b.processing_instruction(target, data))?;
        self.forward(|h| h.processing_instruction(target, data))
    }

    fn skipped_entity(&mut self, name: &str) -> SaxResult {
        self.build(|b| b.skipped_entity(name))?;
        self.forward(|h| h.skipped_entity(name))
    }
}
