//! Ordered (pattern, listener) registrations.

use std::rc::Rc;

use super::SharedListener;
use crate::error::PatternError;
use crate::pattern::Pattern;
use crate::tree::Attribute;

/// A compiled pattern and the listener it notifies.
#[derive(Clone)]
pub struct Registration {
    /// The compiled pattern.
    pub pattern: Pattern,
    /// The listener to notify on a match.
    pub listener: SharedListener,
}

impl std::fmt::Debug for Registration {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Registration")
            .field("pattern", &self.pattern.as_str())
            .field("listener", &Rc::as_ptr(&self.listener).cast::<()>())
            .finish()
    }
}

/// The set of registrations, in registration order.
///
/// A listener may be registered under many patterns and a pattern may be
/// shared by many listeners. Listener identity is `Rc` pointer identity.
#[derive(Debug, Default, Clone)]
pub struct RuleRegistry {
    rules: Vec<Registration>,
}

impl RuleRegistry {
    /// Creates an empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Compiles `pattern` and appends a registration for `listener`.
    ///
    /// # Errors
    ///
    /// Returns [`PatternError`] if the pattern does not compile; the registry
    /// is left unchanged.
    pub fn add(&mut self, listener: SharedListener, pattern: &str) -> Result<(), PatternError> {
        let pattern = Pattern::compile(pattern)?;
        self.rules.push(Registration { pattern, listener });
        Ok(())
    }

    /// Removes registrations and returns how many were removed.
    ///
    /// With both arguments, removes registrations matching both. With only
    /// a listener, removes all of its registrations. With only a pattern,
    /// removes every registration under that pattern string. With neither,
    /// does nothing.
    pub fn remove(&mut self, listener: Option<&SharedListener>, pattern: Option<&str>) -> usize {
        if listener.is_none() && pattern.is_none() {
            return 0;
        }
        let before = self.rules.len();
        self.rules.retain(|rule| {
            let listener_hit = listener.map_or(true, |l| same_listener(l, &rule.listener));
            let pattern_hit = pattern.map_or(true, |p| rule.pattern.as_str() == p);
            !(listener_hit && pattern_hit)
        });
        before - self.rules.len()
    }

    /// Returns the indices of every registration whose selection part
    /// matches the element just opened, in registration order.
    #[must_use]
    pub fn matching_rules(&self, segments: &[&str], attributes: &[Attribute]) -> Vec<usize> {
        self.rules
            .iter()
            .enumerate()
            .filter(|(_, rule)| rule.pattern.matches(segments, attributes))
            .map(|(index, _)| index)
            .collect()
    }

    /// Returns the registration at `index`.
    ///
    /// # Panics
    ///
    /// Panics if `index` is out of range.
    #[must_use]
    pub fn get(&self, index: usize) -> &Registration {
        &self.rules[index]
    }

    /// Returns the number of registrations.
    #[must_use]
    pub fn len(&self) -> usize {
        self.rules.len()
    }

    /// Returns `true` if nothing is registered.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }

    /// Returns an iterator over the registrations in order.
    pub fn iter(&self) -> impl Iterator<Item = &Registration> {
        self.rules.iter()
    }
}

/// Returns `true` if both handles point to the same listener.
#[must_use]
pub fn same_listener(a: &SharedListener, b: &SharedListener) -> bool {
    Rc::as_ptr(a).cast::<()>() == Rc::as_ptr(b).cast::<()>()
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::error::ListenerError;
    use crate::tree::{Document, NodeId};
    use std::cell::RefCell;

    fn listener() -> SharedListener {
        Rc::new(RefCell::new(
            |_: &str, _: &Document, _: NodeId| -> Result<(), ListenerError> { Ok(()) },
        ))
    }

    fn registry(entries: &[(&SharedListener, &str)]) -> RuleRegistry {
        let mut registry = RuleRegistry::new();
        for (listener, pattern) in entries {
            registry.add(Rc::clone(listener), pattern).unwrap();
        }
        registry
    }

    #[test]
    fn test_add_rejects_bad_pattern() {
        let mut registry = RuleRegistry::new();
        assert!(registry.add(listener(), "a/").is_err());
        assert!(registry.is_empty());
    }

    #[test]
    fn test_remove_combinations() {
        let (l1, l2) = (listener(), listener());
        let entries = [(&l1, "a"), (&l1, "b"), (&l2, "a"), (&l2, "c")];

        let mut r = registry(&entries);
        assert_eq!(r.remove(None, None), 0);
        assert_eq!(r.len(), 4);

        assert_eq!(r.remove(Some(&l1), None), 2);
        assert_eq!(r.len(), 2);

        let mut r = registry(&entries);
        assert_eq!(r.remove(None, Some("a")), 2);
        let left: Vec<&str> = r.iter().map(|rule| rule.pattern.as_str()).collect();
        assert_eq!(left, vec!["b", "c"]);

        let mut r = registry(&entries);
        assert_eq!(r.remove(Some(&l2), Some("a")), 1);
        assert_eq!(r.len(), 3);
        assert_eq!(r.remove(Some(&l2), Some("b")), 0);
    }

    #[test]
    fn test_matching_rules_in_registration_order() {
        let l = listener();
        let r = registry(&[(&l, "y"), (&l, "x"), (&l, "root/x"), (&l, "/x")]);
        assert_eq!(r.matching_rules(&["root", "x"], &[]), vec![1, 2]);
        assert!(r.matching_rules(&["root"], &[]).is_empty());
    }

    #[test]
    fn test_listener_identity() {
        let (a, b) = (listener(), listener());
        assert!(same_listener(&a, &Rc::clone(&a)));
        assert!(!same_listener(&a, &b));
    }
}
