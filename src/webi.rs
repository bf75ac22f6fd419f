//! The directive registry, and the entry points for compiling and
//! rendering.

use std::{collections::HashMap, rc::Rc};
use anyhow::{Context, Result};
use kstring::KString;
use serde::Deserialize;

use wdom::Node;

use crate::{compiler::Compiler,
            directive::{AttributeHandler, Handler, TagHandler},
            observable::Observable,
            template::Template};

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct WebiOptions {
    /// Text of the comment that stands in for scoped elements.
    pub placeholder: String,
    /// Element used to hold fragments that do not have a single root
    /// element.
    pub wrapper_tag: String,
    /// Enables `trace!` output.
    pub trace: bool,
}

impl Default for WebiOptions {
    fn default() -> Self {
        WebiOptions {
            placeholder: "scoped".into(),
            wrapper_tag: "div".into(),
            trace: false,
        }
    }
}

impl WebiOptions {
    pub fn from_json_str(s: &str) -> Result<WebiOptions> {
        serde_json::from_str(s).with_context(|| format!("parsing webi options {s:?}"))
    }
}

/// Wildcard for attribute directives applying to all tags.
const ANY_TAG: &str = "*";

#[derive(Default)]
pub struct WebiBuilder {
    options: WebiOptions,
    tags: HashMap<KString, Rc<TagHandler>>,
    attributes: HashMap<(KString, KString), Rc<AttributeHandler>>,
}

impl WebiBuilder {
    pub fn new() -> WebiBuilder {
        WebiBuilder::default()
    }

    pub fn options(mut self, options: WebiOptions) -> Self {
        self.options = options;
        self
    }

    /// Registers `handler` for elements named `tag_name`, replacing a
    /// previous registration.
    pub fn add_tag(mut self, tag_name: &str, mut handler: TagHandler) -> Self {
        let name = KString::from_string(tag_name.to_ascii_lowercase());
        handler.name = name.clone();
        self.tags.insert(name, Rc::new(handler));
        self
    }

    /// Registers `handler` for attributes named `name` on the elements
    /// named in `tags`, or on all elements if `tags` is empty (or
    /// contains `"*"`).
    pub fn add_attribute(mut self, name: &str, mut handler: AttributeHandler, tags: &[&str])
                         -> Self
    {
        let name = KString::from_string(name.to_ascii_lowercase());
        handler.name = name.clone();
        let handler = Rc::new(handler);
        let tags = if tags.is_empty() { &[ANY_TAG][..] } else { tags };
        for tag in tags {
            self.attributes.insert(
                (KString::from_string(tag.to_ascii_lowercase()), name.clone()),
                handler.clone());
        }
        self
    }

    pub fn build(self) -> Rc<Webi> {
        if self.options.trace {
            webi_util::set_trace(true);
        }
        Rc::new(Webi {
            options: self.options,
            tags: self.tags,
            attributes: self.attributes,
        })
    }
}

/// Immutable once built. Compilers refer to it weakly, keep the `Rc`
/// alive while compiling or rendering.
#[derive(Debug)]
pub struct Webi {
    options: WebiOptions,
    tags: HashMap<KString, Rc<TagHandler>>,
    attributes: HashMap<(KString, KString), Rc<AttributeHandler>>,
}

impl Webi {
    pub fn builder() -> WebiBuilder {
        WebiBuilder::new()
    }

    /// A registry without any directives.
    pub fn new() -> Rc<Webi> {
        WebiBuilder::new().build()
    }

    pub fn options(&self) -> &WebiOptions {
        &self.options
    }

    pub fn tag_handler(&self, tag_name: &str) -> Option<Handler> {
        self.tags.get(tag_name.to_ascii_lowercase().as_str())
            .map(|h| Handler::Tag(h.clone()))
    }

    /// The directive for attribute `name` on `tag_name`, falling back
    /// to one registered for all tags.
    pub fn attribute_handler(&self, tag_name: &str, name: &str) -> Option<Handler> {
        let name = KString::from_string(name.to_ascii_lowercase());
        let tag = KString::from_string(tag_name.to_ascii_lowercase());
        self.attributes.get(&(tag, name.clone()))
            .or_else(|| self.attributes.get(&(KString::from_static(ANY_TAG), name)))
            .map(|h| Handler::Attribute(h.clone()))
    }

    pub fn compiler(self: &Rc<Self>) -> Compiler {
        Compiler::new(self)
    }

    pub fn compile(self: &Rc<Self>, src: &str) -> Result<Template> {
        self.compiler().compile(src)
    }

    /// Compiles and renders in one go.
    pub fn render(self: &Rc<Self>, src: &str, scope: &Observable) -> Result<Node> {
        self.compile(src)?.render(scope)
    }
}
