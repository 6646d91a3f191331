//! Parse, query, edit and write XML documents.
//!
//! A [`Document`] owns every node. [`Element`]s are small `Copy` handles into it,
//! so methods take the document as their first argument.
//!
//! Besides plain tree editing, [`Document`] has tag-level helpers that work on every
//! element with a given name: [`Document::tag_exists()`], [`Document::replace_tag_value()`],
//! [`Document::insert_or_update_tag_value()`], [`Document::delete_tag()`] and friends.
//!
//! ```
//! use xml_util::Document;
//!
//! let mut doc = Document::parse_str("<config><name>old</name></config>").unwrap();
//! doc.insert_or_update_tag_value("name", "new").unwrap();
//! doc.insert_or_update_tag_value("port", "8080").unwrap();
//! assert_eq!(
//!     doc.to_pretty_string().unwrap(),
//!     "<config>\n  <name>new</name>\n  <port>8080</port>\n</config>"
//! );
//! ```
mod document;
mod edit;
mod element;
mod error;
mod mapping;
mod parser;

pub use crate::document::{Document, Node, WriteOptions};
pub use crate::element::{Element, ElementBuilder};
pub use crate::error::{Error, ParseError, Result};
pub use crate::mapping::map_to_xml_string;
pub use crate::parser::ReadOptions;
