//! Reader configuration and the upstream event source.
//!
//! Tokenizing is delegated to `quick-xml`'s namespace-aware reader. The
//! internal [`reader`] module turns its events into [`SaxHandler`] calls;
//! [`ParseOptions`] carries the flags that shape both the event stream and
//! the trees built from it.
//!
//! [`SaxHandler`]: crate::sax::SaxHandler

pub(crate) mod reader;

/// Default maximum element nesting depth.
pub const DEFAULT_MAX_DEPTH: u32 = 256;

/// Options controlling the event reader and the tree builder.
///
/// Use the builder pattern to configure options:
///
/// ```
/// use xmlscan::parser::ParseOptions;
///
/// let opts = ParseOptions::default()
///     .strip_whitespace(true)
///     .expand_entities(false)
///     .max_depth(64);
/// assert!(opts.strip_whitespace);
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParseOptions {
    /// If true, whitespace-only text is not materialized in built nodes.
    pub strip_whitespace: bool,
    /// If true, general entities declared with a literal value in the
    /// internal DTD subset are expanded into character data. Otherwise, and
    /// for any entity that cannot be expanded, the reader reports a
    /// `skipped_entity` event.
    pub expand_entities: bool,
    /// Maximum element nesting depth (default: 256).
    pub max_depth: u32,
}

impl Default for ParseOptions {
    fn default() -> Self {
        Self {
            strip_whitespace: false,
            expand_entities: true,
            max_depth: DEFAULT_MAX_DEPTH,
        }
    }
}

impl ParseOptions {
    /// Enables or disables stripping of whitespace-only text from built nodes.
    #[must_use]
    pub fn strip_whitespace(mut self, yes: bool) -> Self {
        self.strip_whitespace = yes;
        self
    }

    /// Enables or disables expansion of internal-subset entities.
    #[must_use]
    pub fn expand_entities(mut self, yes: bool) -> Self {
        self.expand_entities = yes;
        self
    }

    /// Sets the maximum element nesting depth.
    #[must_use]
    pub fn max_depth(mut self, max: u32) -> Self {
        self.max_depth = max;
        self
    }
}
