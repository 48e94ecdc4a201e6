//! Error types for scanning.
//!
//! Errors fall into three groups, matching where they can originate:
//!
//! - [`PatternError`]: a path pattern failed to compile. Reported by
//!   [`ElementScanner::add_listener`](crate::scanner::ElementScanner::add_listener)
//!   before any event stream starts.
//! - [`ParseError`]: the upstream reader found malformed input. Carries the
//!   source location of the failure.
//! - [`ScanError`]: anything that terminates a scan in progress, including
//!   listener failures raised during dispatch.

use std::fmt;

use crate::encoding::EncodingError;

/// The error type a listener callback returns to abort the scan.
pub type ListenerError = Box<dyn std::error::Error + Send + Sync + 'static>;

/// Source location within an XML document.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct SourceLocation {
    /// 1-based line number.
    pub line: u32,
    /// 1-based column number (in characters, not bytes).
    pub column: u32,
    /// 0-based byte offset from the start of the input.
    pub byte_offset: usize,
}

impl SourceLocation {
    /// Computes the line and column of `byte_offset` within `input`.
    ///
    /// Offsets past the end of the input are clamped to the end.
    #[must_use]
    pub fn from_offset(input: &str, byte_offset: usize) -> Self {
        let mut end = byte_offset.min(input.len());
        while !input.is_char_boundary(end) {
            end -= 1;
        }
        let before = &input[..end];
        let line_start = before.rfind('\n').map_or(0, |pos| pos + 1);
        let line = before.matches('\n').count() + 1;
        let column = before[line_start..].chars().count() + 1;
        Self {
            line: u32::try_from(line).unwrap_or(u32::MAX),
            column: u32::try_from(column).unwrap_or(u32::MAX),
            byte_offset,
        }
    }
}

impl fmt::Display for SourceLocation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.line, self.column)
    }
}

/// The error returned when the input is not well-formed XML.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("parse error at {location}: {message}")]
pub struct ParseError {
    /// The primary error message.
    pub message: String,
    /// Where in the source the error occurred.
    pub location: SourceLocation,
}

/// The error returned when a path pattern cannot be compiled.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("invalid pattern at position {position}: {message}")]
pub struct PatternError {
    /// Human-readable error message.
    pub message: String,
    /// 0-based byte offset in the pattern where the error was detected.
    pub position: usize,
}

impl PatternError {
    pub(crate) fn new(message: impl Into<String>, position: usize) -> Self {
        Self {
            message: message.into(),
            position,
        }
    }
}

/// An error that terminates a scan.
#[derive(Debug, thiserror::Error)]
pub enum ScanError {
    /// The input is not well-formed.
    #[error(transparent)]
    Parse(#[from] ParseError),

    /// The raw input bytes could not be decoded.
    #[error(transparent)]
    Encoding(#[from] EncodingError),

    /// Reading the input failed.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// A listener failed while being notified of a matched element.
    #[error("listener failed on {path}: {source}")]
    Listener {
        /// The path of the element being dispatched.
        path: String,
        /// The error returned by the listener.
        #[source]
        source: ListenerError,
    },

    /// A downstream event handler stopped the scan.
    #[error("scan aborted: {0}")]
    Aborted(#[source] ListenerError),
}

impl ScanError {
    /// Creates an [`Aborted`](Self::Aborted) error from any error value.
    ///
    /// Downstream [`SaxHandler`](crate::sax::SaxHandler) implementations use
    /// this to stop the event stream.
    pub fn aborted(err: impl Into<ListenerError>) -> Self {
        Self::Aborted(err.into())
    }

    /// Returns `true` if this error was raised by a listener or handler
    /// rather than by the input.
    #[must_use]
    pub fn is_application_error(&self) -> bool {
        matches!(self, Self::Listener { .. } | Self::Aborted(_))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_source_location_display() {
        let loc = SourceLocation {
            line: 10,
            column: 5,
            byte_offset: 42,
        };
        assert_eq!(loc.to_string(), "10:5");
    }

    #[test]
    fn test_source_location_from_offset() {
        let input = "<a>\n  <b/>\n</c>";
        let loc = SourceLocation::from_offset(input, 13);
        assert_eq!(loc.line, 3);
        assert_eq!(loc.column, 3);
        assert_eq!(loc.byte_offset, 13);
    }

    #[test]
    fn test_source_location_counts_characters() {
        let input = "<é>x";
        let loc = SourceLocation::from_offset(input, 4);
        assert_eq!(loc.line, 1);
        assert_eq!(loc.column, 4);
    }

    #[test]
    fn test_source_location_clamps_past_end() {
        let loc = SourceLocation::from_offset("ab", 99);
        assert_eq!(loc.column, 3);
    }

    #[test]
    fn test_parse_error_display() {
        let err = ParseError {
            message: "unexpected end of input".to_string(),
            location: SourceLocation {
                line: 1,
                column: 15,
                byte_offset: 14,
            },
        };
        assert_eq!(
            err.to_string(),
            "parse error at 1:15: unexpected end of input"
        );
    }

    #[test]
    fn test_pattern_error_display() {
        let err = PatternError::new("empty step", 3);
        assert_eq!(err.to_string(), "invalid pattern at position 3: empty step");
    }

    #[test]
    fn test_listener_error_keeps_source() {
        let err = ScanError::Listener {
            path: "/root/x".to_string(),
            source: "boom".into(),
        };
        assert_eq!(err.to_string(), "listener failed on /root/x: boom");
        assert!(err.is_application_error());
        assert!(std::error::Error::source(&err).is_some());
    }

    #[test]
    fn test_parse_error_is_not_application_error() {
        let err = ScanError::from(ParseError {
            message: "bad".to_string(),
            location: SourceLocation::default(),
        });
        assert!(!err.is_application_error());
    }
}
