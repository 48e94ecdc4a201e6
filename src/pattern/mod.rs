//! Path patterns.
//!
//! A pattern has two parts: a node-selection part that is matched against
//! the path of open elements, and an optional test predicate evaluated
//! against the built element.
//!
//! ```text
//! item                 any <item>, at any depth
//! /feed/entry          <entry> children of the root <feed>
//! channel/item         <item> whose parent is <channel>
//! rss//link            <link> anywhere below <rss>
//! */title              <title> with any parent
//! entry[@lang = 'en']  <entry> whose lang attribute is "en"
//! book[price > 30]     <book> with a <price> child above 30
//! ```
//!
//! Selection needs only the path (and, for attribute-only predicates, the
//! start tag's attributes), so an element that cannot match is never built.
//! Predicates that look at content are deferred until the element closes.
//!
//! Names are compared by local name; namespace prefixes in patterns are
//! rejected.

use std::fmt;

use crate::error::PatternError;
use crate::tree::{Attribute, Document, NodeId};
use crate::xpath::ast::{BinaryOp, Expr};
use crate::xpath::{eval, parser, Context};

/// How a step relates to the step before it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StepAxis {
    /// The element is a child of the previous step's element (or the root
    /// element, for the first step).
    Child,
    /// The element is any descendant of the previous step's element (or any
    /// element, for the first step).
    Descendant,
}

/// The name a step selects.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NameTest {
    /// Elements with this local name.
    Name(String),
    /// `*` -- any element.
    Any,
}

impl NameTest {
    fn matches(&self, segment: &str) -> bool {
        match self {
            Self::Name(name) => name == segment,
            Self::Any => true,
        }
    }
}

/// One step of the node-selection part.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PathStep {
    /// Relation to the previous step.
    pub axis: StepAxis,
    /// Which element names match.
    pub test: NameTest,
}

/// A compiled path pattern.
///
/// # Examples
///
/// ```
/// use xmlscan::pattern::Pattern;
///
/// let pattern = Pattern::compile("channel/item").unwrap();
/// assert!(pattern.matches_path(&["rss", "channel", "item"]));
/// assert!(!pattern.matches_path(&["rss", "item"]));
/// ```
#[derive(Debug, Clone)]
pub struct Pattern {
    source: String,
    steps: Vec<PathStep>,
    predicate: Option<Expr>,
    /// The predicate can also be decided from a start tag's attributes.
    attribute_only: bool,
}

impl Pattern {
    /// Compiles a pattern string.
    ///
    /// # Errors
    ///
    /// Returns [`PatternError`] with the byte offset of the problem if the
    /// pattern is not valid.
    pub fn compile(source: &str) -> Result<Self, PatternError> {
        let (selection, predicate_part) = match source.find('[') {
            Some(pos) => source.split_at(pos),
            None => (source, ""),
        };
        let steps = parse_selection(selection)?;
        let predicate = parse_predicates(predicate_part, selection.len())?;
        let attribute_only = predicate.as_ref().is_some_and(Expr::is_attribute_only);

        Ok(Self {
            source: source.to_string(),
            steps,
            predicate,
            attribute_only,
        })
    }

    /// Returns the pattern as written.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.source
    }

    /// Returns the node-selection steps.
    #[must_use]
    pub fn steps(&self) -> &[PathStep] {
        &self.steps
    }

    /// Returns `true` if the pattern has a test predicate.
    #[must_use]
    pub fn has_predicate(&self) -> bool {
        self.predicate.is_some()
    }

    /// Returns `true` if the element must be built before the predicate can
    /// be decided.
    #[must_use]
    pub fn needs_content(&self) -> bool {
        self.predicate.is_some() && !self.attribute_only
    }

    /// Tests the node-selection part against a path of element local names,
    /// outermost first.
    #[must_use]
    pub fn matches_path(&self, segments: &[&str]) -> bool {
        matches_at(&self.steps, segments)
    }

    /// Tests a just-opened element: the path, plus the predicate when it can
    /// be decided from the start tag's attributes.
    #[must_use]
    pub fn matches(&self, segments: &[&str], attributes: &[Attribute]) -> bool {
        if !self.matches_path(segments) {
            return false;
        }
        match &self.predicate {
            Some(expr) if self.attribute_only => {
                eval::evaluate(expr, Context::StartTag(attributes)).to_boolean()
            }
            _ => true,
        }
    }

    /// Tests the predicate against a built element. Patterns without a
    /// predicate always match.
    #[must_use]
    pub fn matches_node(&self, doc: &Document, node: NodeId) -> bool {
        self.predicate.as_ref().map_or(true, |expr| {
            eval::evaluate(expr, Context::Node { doc, node }).to_boolean()
        })
    }
}

impl fmt::Display for Pattern {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.source)
    }
}

impl std::str::FromStr for Pattern {
    type Err = PatternError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::compile(s)
    }
}

/// Matches steps against `segments`, the last step anchored at the last
/// segment.
///
/// Runs one pass over the segments per step, so the cost stays
/// `steps × depth` however many `//` steps the pattern has.
fn matches_at(steps: &[PathStep], segments: &[&str]) -> bool {
    // ends[j]: the steps seen so far can match with the latest one at segment j.
    let mut ends: Vec<bool> = Vec::new();
    for (i, step) in steps.iter().enumerate() {
        let mut next = vec![false; segments.len()];
        let mut earlier = false;
        for (j, segment) in segments.iter().enumerate() {
            let reachable = match (i, step.axis) {
                (0, StepAxis::Child) => j == 0,
                (0, StepAxis::Descendant) => true,
                (_, StepAxis::Child) => j > 0 && ends[j - 1],
                (_, StepAxis::Descendant) => earlier,
            };
            next[j] = reachable && step.test.matches(segment);
            if i > 0 && ends[j] {
                earlier = true;
            }
        }
        ends = next;
    }
    ends.last().copied().unwrap_or(steps.is_empty() && segments.is_empty())
}

fn parse_selection(selection: &str) -> Result<Vec<PathStep>, PatternError> {
    if selection.trim().is_empty() {
        return Err(PatternError::new("pattern selects no element", 0));
    }

    let mut steps = Vec::new();
    let mut pos = 0;
    let mut axis = if let Some(rest) = selection.strip_prefix("//") {
        pos = selection.len() - rest.len();
        StepAxis::Descendant
    } else if selection.starts_with('/') {
        pos = 1;
        StepAxis::Child
    } else {
        StepAxis::Descendant
    };

    loop {
        let rest = &selection[pos..];
        let len = rest.find('/').unwrap_or(rest.len());
        let name = &rest[..len];
        if name.is_empty() {
            let message = if rest.is_empty() {
                "pattern ends with '/'"
            } else {
                "empty step"
            };
            return Err(PatternError::new(message, pos));
        }
        steps.push(PathStep {
            axis,
            test: parse_name_test(name, pos)?,
        });

        pos += len;
        if pos >= selection.len() {
            return Ok(steps);
        }
        if selection[pos..].starts_with("//") {
            axis = StepAxis::Descendant;
            pos += 2;
        } else {
            axis = StepAxis::Child;
            pos += 1;
        }
    }
}

fn parse_name_test(name: &str, pos: usize) -> Result<NameTest, PatternError> {
    let unsupported = |what: &str| PatternError::new(format!("{what} steps are not supported"), pos);
    match name {
        "*" => return Ok(NameTest::Any),
        "." | ".." => return Err(unsupported("relative")),
        _ => {}
    }
    if name.starts_with('@') {
        return Err(unsupported("attribute"));
    }
    if name.contains('(') {
        return Err(unsupported("node type"));
    }
    if name.contains(':') {
        return Err(PatternError::new(
            format!("namespace prefixes are not supported: '{name}'"),
            pos,
        ));
    }
    if let Some(offset) = name.find(|c: char| c.is_whitespace() || "]()@=<>!'\"|$,*".contains(c)) {
        return Err(PatternError::new(
            format!("invalid character in element name '{name}'"),
            pos + offset,
        ));
    }
    Ok(NameTest::Name(name.to_string()))
}

/// Parses `[expr][expr]...`, combining the groups with `and`.
fn parse_predicates(part: &str, base: usize) -> Result<Option<Expr>, PatternError> {
    let mut combined: Option<Expr> = None;
    let mut rest = part;
    let mut offset = base;

    loop {
        let trimmed = rest.trim_start();
        offset += rest.len() - trimmed.len();
        rest = trimmed;
        if rest.is_empty() {
            return Ok(combined);
        }
        if !rest.starts_with('[') {
            return Err(PatternError::new(
                "predicates are only allowed on the last step",
                offset,
            ));
        }
        let close = find_group_end(rest)
            .ok_or_else(|| PatternError::new("unclosed '['", offset))?;
        let inner = &rest[1..close];
        let inner_offset = offset + 1;

        let expr = parser::parse(inner).map_err(|err| {
            PatternError::new(err.message, inner_offset + err.position)
        })?;
        if matches!(expr, Expr::Number(_)) {
            return Err(PatternError::new(
                "positional predicates are not supported",
                inner_offset,
            ));
        }
        combined = Some(match combined {
            Some(left) => Expr::BinaryOp {
                op: BinaryOp::And,
                left: Box::new(left),
                right: Box::new(expr),
            },
            None => expr,
        });

        rest = &rest[close + 1..];
        offset += close + 1;
    }
}

/// Returns the index of the `]` closing the group opened at index 0,
/// skipping string literals.
fn find_group_end(group: &str) -> Option<usize> {
    let mut depth = 0usize;
    let mut quote: Option<char> = None;
    for (i, c) in group.char_indices() {
        match (quote, c) {
            (Some(q), _) if c == q => quote = None,
            (Some(_), _) => {}
            (None, '\'' | '"') => quote = Some(c),
            (None, '[') => depth += 1,
            (None, ']') => {
                depth -= 1;
                if depth == 0 {
                    return Some(i);
                }
            }
            _ => {}
        }
    }
    None
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn matches(pattern: &str, path: &str) -> bool {
        let segments: Vec<&str> = path.split('/').filter(|s| !s.is_empty()).collect();
        Pattern::compile(pattern).unwrap().matches_path(&segments)
    }

    #[test]
    fn test_bare_name_matches_at_any_depth() {
        assert!(matches("x", "/x"));
        assert!(matches("x", "/root/x"));
        assert!(matches("x", "/root/z/x"));
        assert!(!matches("x", "/root/x/y"));
        assert!(!matches("x", "/root/xx"));
    }

    #[test]
    fn test_child_steps() {
        assert!(matches("a/b", "/a/b"));
        assert!(matches("a/b", "/root/a/b"));
        assert!(!matches("a/b", "/a/c/b"));
        assert!(!matches("a/b", "/b"));
    }

    #[test]
    fn test_descendant_steps() {
        assert!(matches("a//b", "/a/b"));
        assert!(matches("a//b", "/a/c/d/b"));
        assert!(matches("a//b", "/r/a/c/b"));
        assert!(!matches("a//b", "/b/a"));
        assert!(matches("a//b//c", "/a/x/b/y/c"));
        assert!(!matches("a//b//c", "/a/x/c"));
    }

    #[test]
    fn test_many_descendant_steps_on_deep_path() {
        let deep = vec!["a"; 200];
        let pattern = Pattern::compile("b//a//a//a//a//a//a").unwrap();
        assert!(!pattern.matches_path(&deep));

        let pattern = Pattern::compile("a//a//a//a//a//a").unwrap();
        assert!(pattern.matches_path(&deep));
        assert!(pattern.matches_path(&deep[..6]));
        assert!(!pattern.matches_path(&deep[..5]));

        let mut path = deep.clone();
        path.insert(100, "b");
        assert!(Pattern::compile("b//a//a//a//a//a//a").unwrap().matches_path(&path));
        assert!(!Pattern::compile("/b//a").unwrap().matches_path(&path));
    }

    #[test]
    fn test_anchored_patterns() {
        assert!(matches("/feed/entry", "/feed/entry"));
        assert!(!matches("/feed/entry", "/rss/feed/entry"));
        assert!(matches("/feed", "/feed"));
        assert!(matches("//entry", "/feed/x/entry"));
    }

    #[test]
    fn test_wildcards() {
        assert!(matches("*", "/anything"));
        assert!(matches("*/title", "/book/title"));
        assert!(!matches("/*/title", "/lib/book/title"));
        assert!(matches("/*/*/title", "/lib/book/title"));
    }

    #[test]
    fn test_steps_are_exposed() {
        let pattern = Pattern::compile("/a//b").unwrap();
        assert_eq!(
            pattern.steps(),
            &[
                PathStep {
                    axis: StepAxis::Child,
                    test: NameTest::Name("a".to_string()),
                },
                PathStep {
                    axis: StepAxis::Descendant,
                    test: NameTest::Name("b".to_string()),
                },
            ]
        );
        assert_eq!(pattern.to_string(), "/a//b");
    }

    #[test]
    fn test_attribute_predicate_is_decided_at_open() {
        let pattern = Pattern::compile("entry[@lang = 'en']").unwrap();
        assert!(pattern.has_predicate());
        assert!(!pattern.needs_content());
        assert!(pattern.matches(&["feed", "entry"], &[Attribute::new("lang", "en")]));
        assert!(!pattern.matches(&["feed", "entry"], &[Attribute::new("lang", "de")]));
        assert!(!pattern.matches(&["feed", "entry"], &[]));
    }

    #[test]
    fn test_content_predicate_is_deferred() {
        let pattern = Pattern::compile("book[price > 30]").unwrap();
        assert!(pattern.needs_content());
        assert!(pattern.matches(&["book"], &[]));

        let doc = Document::parse_str("<book><price>42</price></book>").unwrap();
        assert!(pattern.matches_node(&doc, doc.roots()[0]));
        let doc = Document::parse_str("<book><price>12</price></book>").unwrap();
        assert!(!pattern.matches_node(&doc, doc.roots()[0]));
    }

    #[test]
    fn test_multiple_predicate_groups_are_combined() {
        let pattern = Pattern::compile("a[@x][@y = ']']").unwrap();
        assert!(pattern.matches(&["a"], &[Attribute::new("x", "1"), Attribute::new("y", "]")]));
        assert!(!pattern.matches(&["a"], &[Attribute::new("x", "1")]));
    }

    #[test]
    fn test_syntax_errors() {
        let cases = [
            ("", 0),
            ("/", 1),
            ("a/", 2),
            ("a///b", 3),
            ("a/./b", 2),
            ("../a", 0),
            ("@id", 0),
            ("a/node()", 2),
            ("p:a", 0),
            ("a b", 1),
            ("a[1]", 2),
            ("a[@x]/b", 5),
            ("a[@x", 1),
            ("a[foo()]", 2),
            ("a[b[c]]", 3),
        ];
        for (pattern, position) in cases {
            let err = Pattern::compile(pattern).unwrap_err();
            assert_eq!(err.position, position, "{pattern}: {}", err.message);
        }
    }
}
