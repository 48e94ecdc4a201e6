//! # xmlscan
//!
//! A streaming XML element scanner. Register listeners for path patterns
//! such as `item`, `channel/item` or `/feed/entry[@lang = 'en']`; the
//! scanner reads the input as a stream of events and builds a tree only for
//! the elements that match, handing each one to its listeners once its end
//! tag has been read. Everything else passes through without being
//! materialized, so large documents can be processed in bounded memory.
//!
//! ## Quick Start
//!
//! ```
//! use xmlscan::ElementScanner;
//!
//! let mut scanner = ElementScanner::new();
//! scanner
//!     .listen("x", |path, doc, node| {
//!         println!("{path}: {} children", doc.children(node).count());
//!         Ok(())
//!     })
//!     .unwrap();
//!
//! let stats = scanner.parse_str("<root><x><y/></x><z><x/></z></root>").unwrap();
//! assert_eq!(stats.notifications, 2);
//! ```
//!
//! ## Modules
//!
//! - [`scanner`]: the [`ElementScanner`] and its listener registry
//! - [`pattern`]: path pattern compilation and matching
//! - [`xpath`]: the expression language used in pattern predicates
//! - [`sax`]: the event handler trait and the event reader entry points
//! - [`tree`]: the arena [`Document`] that holds built elements
//! - [`serial`]: writing built elements back out as XML

pub mod encoding;
pub mod error;
pub mod parser;
pub mod pattern;
pub mod sax;
pub mod scanner;
pub mod serial;
pub mod tree;
pub mod xpath;

// Re-export primary types at the crate root for convenience.
pub use error::{ListenerError, ParseError, PatternError, ScanError};
pub use parser::ParseOptions;
pub use pattern::Pattern;
pub use scanner::{ElementListener, ElementScanner, ScanStats, SharedListener};
pub use tree::{Attribute, Document, NodeId, NodeKind};
