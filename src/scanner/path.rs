//! The path of currently open elements.

/// Tracks the open-element path as `/a/b/c` in a single buffer.
///
/// Each [`push`](Self::push) records the buffer length before appending, and
/// [`pop`](Self::pop) truncates back to it, so closing an element restores
/// exactly the bytes its opening added.
#[derive(Debug, Default, Clone)]
pub struct PathTracker {
    buf: String,
    /// Buffer length before each open segment was appended.
    marks: Vec<usize>,
}

impl PathTracker {
    /// Creates an empty tracker.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends a segment for an element being opened.
    pub fn push(&mut self, name: &str) {
        self.marks.push(self.buf.len());
        self.buf.push('/');
        self.buf.push_str(name);
    }

    /// Removes the segment of the element being closed.
    ///
    /// # Panics
    ///
    /// Panics if no element is open. In debug builds, also panics if `name`
    /// is not the innermost open segment.
    pub fn pop(&mut self, name: &str) {
        let Some(mark) = self.marks.pop() else {
            panic!("unbalanced end_element for '{name}': no element is open");
        };
        debug_assert_eq!(
            &self.buf[mark + 1..],
            name,
            "end_element does not match the innermost open element"
        );
        self.buf.truncate(mark);
    }

    /// Returns the current path, e.g. `/root/x`. Empty at document level.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.buf
    }

    /// Returns the segment names, outermost first.
    pub fn segments(&self) -> impl Iterator<Item = &str> {
        self.marks.iter().enumerate().map(move |(i, &mark)| {
            let end = self.marks.get(i + 1).copied().unwrap_or(self.buf.len());
            &self.buf[mark + 1..end]
        })
    }

    /// Returns the number of open elements.
    #[must_use]
    pub fn depth(&self) -> usize {
        self.marks.len()
    }

    /// Forgets every open element.
    pub fn clear(&mut self) {
        self.buf.clear();
        self.marks.clear();
    }
}
