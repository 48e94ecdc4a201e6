//! Open paths with pending matches.

use std::collections::HashMap;

/// Maps each open path that matched at least one rule to the indices of the
/// rules it matched, in registration order.
///
/// The table being non-empty is what puts the scanner in building mode.
#[derive(Debug, Default, Clone)]
pub struct ActiveRules {
    entries: HashMap<String, Vec<usize>>,
}

impl ActiveRules {
    /// Records the rules matched by the element just opened at `path`.
    pub fn insert(&mut self, path: &str, rules: Vec<usize>) {
        debug_assert!(!rules.is_empty(), "activating an empty rule list");
        let previous = self.entries.insert(path.to_string(), rules);
        debug_assert!(previous.is_none(), "path '{path}' is already active");
    }

    /// Removes and returns the entry for the element closing at `path`.
    pub fn remove(&mut self, path: &str) -> Option<Vec<usize>> {
        self.entries.remove(path)
    }

    /// Returns `true` while at least one match is pending.
    #[must_use]
    pub fn is_building(&self) -> bool {
        !self.entries.is_empty()
    }

    /// Returns the number of pending matches.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Returns `true` if no match is pending.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Drops every pending match.
    pub fn clear(&mut self) {
        self.entries.clear();
    }
}
