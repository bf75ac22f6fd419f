//! Element name tables needed for parsing and serialisation.

use std::collections::HashSet;
use kstring::KString;
use lazy_static::lazy_static;

// https://html.spec.whatwg.org/multipage/syntax.html#void-elements
// These never have a closing tag nor any children.
const VOID_ELEMENT_NAMES: &[&str] = &[
    "area",
    "base",
    "br",
    "col",
    "embed",
    "hr",
    "img",
    "input",
    "link",
    "meta",
    "source",
    "track",
    "wbr",
];

// XX the tokenizer is not switched into its raw text states for
// these, so markup-like content inside them is parsed as markup.
const RAW_TEXT_ELEMENT_NAMES: &[&str] = &[
    "script",
    "style",
    "textarea",
    "title",
];

lazy_static!{
    static ref VOID_ELEMENTS: HashSet<KString> =
        VOID_ELEMENT_NAMES.iter().map(|s| KString::from_static(*s)).collect();
    static ref RAW_TEXT_ELEMENTS: HashSet<KString> =
        RAW_TEXT_ELEMENT_NAMES.iter().map(|s| KString::from_static(*s)).collect();
}

/// `tag_name` must be lowercase.
pub fn is_void_element(tag_name: &str) -> bool {
    VOID_ELEMENTS.contains(tag_name)
}

pub fn is_raw_text_element(tag_name: &str) -> bool {
    RAW_TEXT_ELEMENTS.contains(tag_name)
}
