//! XML serialization of built fragments.
//!
//! Matched elements are handed to listeners as nodes in an arena
//! [`Document`](crate::Document); this module turns them back into text for
//! printing, logging or forwarding.

pub mod xml;

pub use xml::{serialize, serialize_node, serialize_node_with_options, SerializeOptions};
