//! Header property files
//!
//! - **tree**: [`ParameterTree`] / [`PropertyNode`] with typed accessors and deep merge
//! - **parser**: `dotted.key=value` text into a tree
//! - **date**: best-effort timestamp from the header comment line
//! - **links**: shared-header link resolution

mod date;
pub mod links;
mod parser;
mod tree;

pub use date::HeaderDate;
pub use links::{LINK_MARKER, count_link_markers, find_links, resolve_links};
pub use parser::{DATE_KEY, parse_properties, parse_properties_bytes};
pub use tree::{ParameterTree, PropertyNode};
