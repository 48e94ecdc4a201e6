//! SAX2 streaming event handler API.
//!
//! The reader fires one callback per construct it encounters; nothing is
//! kept in memory unless a handler chooses to. Every callback is fallible:
//! returning `Err` stops the reader at that event and the error is handed
//! back unchanged from [`parse_sax`]. This is how a handler (or a scanner
//! listener) aborts a scan in progress.
//!
//! # Examples
//!
//! ```
//! use xmlscan::sax::{parse_sax, SaxHandler, SaxResult};
//! use xmlscan::parser::ParseOptions;
//! use xmlscan::Attribute;
//!
//! struct Counter {
//!     element_count: usize,
//! }
//!
//! impl SaxHandler for Counter {
//!     fn start_element(
//!         &mut self,
//!         _local_name: &str,
//!         _prefix: Option<&str>,
//!         _namespace: Option<&str>,
//!         _attributes: &[Attribute],
//!     ) -> SaxResult {
//!         self.element_count += 1;
//!         Ok(())
//!     }
//! }
//!
//! let mut handler = Counter { element_count: 0 };
//! parse_sax("<root><a/><b/><c/></root>", &ParseOptions::default(), &mut handler).unwrap();
//! assert_eq!(handler.element_count, 4);
//! ```

use crate::encoding::decode_to_utf8;
use crate::error::ScanError;
use crate::parser::reader::EventReader;
use crate::parser::ParseOptions;
use crate::tree::Attribute;

/// The result of a SAX callback.
pub type SaxResult = Result<(), ScanError>;

/// A SAX2 event handler trait.
///
/// Implement the callbacks you care about; all methods default to `Ok(())`.
#[allow(unused_variables)]
pub trait SaxHandler {
    /// Called at the start of the document, before any other events.
    fn start_document(&mut self) -> SaxResult {
        Ok(())
    }

    /// Called at the end of the document, after all other events.
    fn end_document(&mut self) -> SaxResult {
        Ok(())
    }

    /// Called before the `start_element` of an element that declares a
    /// namespace. `prefix` is `None` for the default namespace.
    fn start_prefix_mapping(&mut self, prefix: Option<&str>, uri: &str) -> SaxResult {
        Ok(())
    }

    /// Called after the `end_element` of an element that declared `prefix`.
    fn end_prefix_mapping(&mut self, prefix: Option<&str>) -> SaxResult {
        Ok(())
    }

    /// Called when an element start tag is encountered.
    ///
    /// `attributes` includes namespace declarations as written.
    fn start_element(
        &mut self,
        local_name: &str,
        prefix: Option<&str>,
        namespace: Option<&str>,
        attributes: &[Attribute],
    ) -> SaxResult {
        Ok(())
    }

    /// Called when an element end tag is encountered (or a self-closing tag ends).
    fn end_element(
        &mut self,
        local_name: &str,
        prefix: Option<&str>,
        namespace: Option<&str>,
    ) -> SaxResult {
        Ok(())
    }

    /// Called for character data (text content).
    fn characters(&mut self, content: &str) -> SaxResult {
        Ok(())
    }

    /// Called for text runs made only of whitespace.
    fn ignorable_whitespace(&mut self, content: &str) -> SaxResult {
        Ok(())
    }

    /// Called for CDATA sections.
    fn cdata(&mut self, content: &str) -> SaxResult {
        Ok(())
    }

    /// Called for XML comments.
    fn comment(&mut self, content: &str) -> SaxResult {
        Ok(())
    }

    /// Called for processing instructions.
    fn processing_instruction(&mut self, target: &str, data: Option<&str>) -> SaxResult {
        Ok(())
    }

    /// Called for an entity reference the reader did not expand.
    fn skipped_entity(&mut self, name: &str) -> SaxResult {
        Ok(())
    }
}

/// A default no-op SAX handler. Useful as a base or for testing.
#[derive(Debug, Default, Clone, Copy)]
pub struct DefaultHandler;

impl SaxHandler for DefaultHandler {}

/// Parses XML from a string, firing SAX events on the provided handler.
///
/// # Errors
///
/// Returns `ScanError::Parse` if the input is not well-formed XML, or
/// whatever error a handler callback returned.
///
/// # Examples
///
/// ```
/// use xmlscan::sax::{parse_sax, DefaultHandler};
/// use xmlscan::parser::ParseOptions;
///
/// let mut handler = DefaultHandler;
/// parse_sax("<root/>", &ParseOptions::default(), &mut handler).unwrap();
/// ```
pub fn parse_sax(
    input: &str,
    options: &ParseOptions,
    handler: &mut dyn SaxHandler,
) -> Result<(), ScanError> {
    EventReader::new(input, options, handler).run()
}

/// Decodes raw bytes to UTF-8, then parses them like [`parse_sax`].
///
/// The encoding is taken from a byte order mark or the `encoding`
/// pseudo-attribute of the XML declaration, defaulting to UTF-8.
///
/// # Errors
///
/// Returns `ScanError::Encoding` if the bytes cannot be decoded, otherwise
/// the same errors as [`parse_sax`].
pub fn parse_sax_bytes(
    bytes: &[u8],
    options: &ParseOptions,
    handler: &mut dyn SaxHandler,
) -> Result<(), ScanError> {
    let input = decode_to_utf8(bytes)?;
    parse_sax(&input, options, handler)
}
