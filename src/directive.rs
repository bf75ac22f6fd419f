//! Directive definitions: what custom tags and attributes do at
//! compile time (`preprocess`, `expression`) and at render time
//! (`bind`).

use std::{fmt::Debug, rc::Rc};
use anyhow::Result;
use indexmap::IndexMap;
use kstring::KString;

use wdom::Node;

use crate::{compiler::Compiler,
            error::{webi_error, WebiErrorKind},
            expr::Expr,
            observable::Observable};

/// The attributes of the element being compiled. Changes made through
/// the view are applied to the element as well, and the compiler
/// picks them up: attributes added by a `preprocess` hook are
/// compiled too, removed ones are skipped.
pub struct AttributeView<'n> {
    node: &'n Node,
    attributes: IndexMap<KString, KString>,
}

impl<'n> AttributeView<'n> {
    pub(crate) fn new(node: &'n Node) -> AttributeView<'n> {
        AttributeView {
            node,
            attributes: node.attributes().into_iter().collect(),
        }
    }

    pub fn node(&self) -> &Node {
        self.node
    }

    pub fn get(&self, name: &str) -> Option<&str> {
        self.attributes.get(name).map(|v| v.as_str())
    }

    pub fn contains(&self, name: &str) -> bool {
        self.attributes.contains_key(name)
    }

    /// Names are lowercased, like on elements.
    pub fn set(&mut self, name: &str, value: &str) -> Result<()> {
        self.node.set_attribute(name, value)?;
        self.attributes.insert(KString::from_string(name.to_ascii_lowercase()),
                               KString::from_ref(value));
        Ok(())
    }

    pub fn remove(&mut self, name: &str) -> Option<KString> {
        self.node.remove_attribute(name);
        self.attributes.shift_remove(name)
    }

    /// In attribute order, added ones last.
    pub fn names(&self) -> Vec<KString> {
        self.attributes.keys().cloned().collect()
    }
}

/// What a `bind` hook gets to work with.
pub struct BindContext<'a> {
    /// The directive's node in the rendered tree: the element, or for
    /// scoped directives the placeholder comment.
    pub node: &'a Node,
    pub scope: &'a Observable,
    /// For scoped directives, the element as it was in the source
    /// (after preprocessing), detached.
    pub original: Option<&'a Node>,
    /// For compiling subtemplates.
    pub compiler: &'a Compiler,
    /// The name the directive was registered under.
    pub name: &'a str,
}

pub type PreprocessFn = Box<dyn Fn(&mut AttributeView) -> Result<()>>;
pub type BindFn = Box<dyn Fn(&BindContext) -> Result<()>>;
/// `(element, attribute expressions, body expression)` to the
/// expression for the whole element.
pub type TagExpressionFn = Box<dyn Fn(&Node, &[Expr], &Expr) -> Expr>;
/// `(element, attribute name, value expression)` to the expression
/// for the attribute (including its name).
pub type AttributeExpressionFn = Box<dyn Fn(&Node, &str, &Expr) -> Expr>;

macro_rules! def_handler {
    { $(#[$meta:meta])* $name:ident, $expression_fn:ty } => {
        $(#[$meta])*
        #[derive(Default)]
        pub struct $name {
            pub(crate) name: KString,
            pub(crate) scoped: bool,
            pub(crate) preprocess: Option<PreprocessFn>,
            pub(crate) bind: Option<BindFn>,
            pub(crate) expression: Option<$expression_fn>,
        }

        impl $name {
            pub fn new() -> Self {
                Self::default()
            }

            /// A scoped directive renders its element itself (via
            /// `bind`); the element is replaced by a placeholder
            /// comment at compile time.
            pub fn scoped(mut self, scoped: bool) -> Self {
                self.scoped = scoped;
                self
            }

            pub fn preprocess(
                mut self,
                f: impl Fn(&mut AttributeView) -> Result<()> + 'static
            ) -> Self {
                self.preprocess = Some(Box::new(f));
                self
            }

            pub fn bind(mut self, f: impl Fn(&BindContext) -> Result<()> + 'static) -> Self {
                self.bind = Some(Box::new(f));
                self
            }

            pub fn is_scoped(&self) -> bool {
                self.scoped
            }

            /// Empty until registered.
            pub fn name(&self) -> &str {
                &self.name
            }
        }

        impl Debug for $name {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                f.debug_struct(stringify!($name))
                    .field("name", &self.name)
                    .field("scoped", &self.scoped)
                    .field("preprocess", &self.preprocess.is_some())
                    .field("bind", &self.bind.is_some())
                    .field("expression", &self.expression.is_some())
                    .finish()
            }
        }
    }
}

def_handler!{
    /// A directive for a tag name.
    TagHandler, TagExpressionFn
}

def_handler!{
    /// A directive for an attribute name, for some or all tags.
    AttributeHandler, AttributeExpressionFn
}

impl TagHandler {
    pub fn expression(
        mut self,
        f: impl Fn(&Node, &[Expr], &Expr) -> Expr + 'static
    ) -> Self {
        self.expression = Some(Box::new(f));
        self
    }
}

impl AttributeHandler {
    pub fn expression(mut self, f: impl Fn(&Node, &str, &Expr) -> Expr + 'static) -> Self {
        self.expression = Some(Box::new(f));
        self
    }
}

/// A registered directive, as referenced from bindings.
#[derive(Debug, Clone)]
pub enum Handler {
    Tag(Rc<TagHandler>),
    Attribute(Rc<AttributeHandler>),
}

impl Handler {
    pub fn name(&self) -> &str {
        match self {
            Handler::Tag(h) => h.name(),
            Handler::Attribute(h) => h.name(),
        }
    }

    pub fn is_scoped(&self) -> bool {
        match self {
            Handler::Tag(h) => h.scoped,
            Handler::Attribute(h) => h.scoped,
        }
    }

    pub(crate) fn preprocess(&self, view: &mut AttributeView) -> Result<()> {
        let preprocess = match self {
            Handler::Tag(h) => &h.preprocess,
            Handler::Attribute(h) => &h.preprocess,
        };
        match preprocess {
            Some(f) => f(view),
            None => Ok(()),
        }
    }

    /// Runs the `bind` hook. Scoped directives must have one (nothing
    /// else would render their element), for others it is optional.
    pub(crate) fn bind(&self, context: &BindContext) -> Result<()> {
        let bind = match self {
            Handler::Tag(h) => &h.bind,
            Handler::Attribute(h) => &h.bind,
        };
        match bind {
            Some(f) => f(context),
            None if self.is_scoped() => Err(webi_error(
                WebiErrorKind::UnimplementedDirective(KString::from_ref(self.name())))),
            None => Ok(()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn t_attribute_view() {
        let node = wdom::element(r#"<p a="1" b="2"></p>"#, "div").unwrap();
        let mut view = AttributeView::new(&node);
        view.set("C", "3").unwrap();
        view.set("a", "x").unwrap();
        assert_eq!(view.remove("b").unwrap(), "2");
        assert_eq!(view.names(), ["a", "c"]);
        assert_eq!(view.get("a"), Some("x"));
        assert!(!view.contains("b"));
        assert_eq!(node.outer_html(), r#"<p a="x" c="3"></p>"#);
    }

    #[test]
    fn t_unimplemented_bind() {
        let node = Node::comment("scoped");
        let scope = Observable::new();
        let compiler = Compiler::detached();
        let context = BindContext {
            node: &node,
            scope: &scope,
            original: None,
            compiler: &compiler,
            name: "x",
        };
        let mut h = TagHandler::new().scoped(true);
        h.name = "x".into();
        let err = Handler::Tag(Rc::new(h)).bind(&context).unwrap_err();
        assert!(matches!(crate::error::webi_error_kind(&err),
                         Some(WebiErrorKind::UnimplementedDirective(n)) if n == "x"));
        let h = AttributeHandler::new();
        assert!(Handler::Attribute(Rc::new(h)).bind(&context).is_ok());
    }
}
