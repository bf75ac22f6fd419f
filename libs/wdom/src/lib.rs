//! A small mutable HTML DOM: reference counted nodes with parent
//! links, fragment parsing via html5gum, serialisation.

pub mod meta;
pub mod node;
pub mod parse;
pub mod print;

pub use node::{Node, NodeKind, insert_node_before, insert_node_after};
pub use parse::{parse_fragment, element, single_root};
pub use print::{Print, html_escape, html_escape_string};
