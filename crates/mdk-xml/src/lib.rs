//! MDK XML
//!
//! Mutable, namespace-aware XML tree used to read and rewrite project files
//! and toolkit option descriptors in place.
//!
//! # Example
//!
//! ```rust
//! use mdk_xml::{Document, Element};
//!
//! let mut doc = Document::parse(r#"<Project xmlns="urn:msbuild"><ItemGroup /></Project>"#).unwrap();
//! let group = doc.root_mut().child_mut("ItemGroup").unwrap();
//! group.push_element(Element::new("None").with_attribute("Include", "readme.txt"));
//!
//! assert_eq!(
//!     doc.to_string(),
//!     r#"<Project xmlns="urn:msbuild"><ItemGroup><None Include="readme.txt" /></ItemGroup></Project>"#
//! );
//! ```

#![warn(missing_docs)]
#![warn(unreachable_pub)]

pub mod document;
pub mod element;
pub mod error;

pub use document::{Declaration, Document};
pub use element::{Attribute, Element, ElementPath, Node};
pub use error::{XmlError, XmlResult};
