//! Compiled templates, and rendering them into live node trees.

use std::rc::Rc;
use anyhow::Result;
use kstring::KString;

use wdom::Node;
use webi_util::{trace, warn};

use crate::{compiler::Compiler,
            directive::{BindContext, Handler},
            expr::Expr,
            listeners::Unwatch,
            node_path::NodePath,
            observable::Observable,
            webi::WebiOptions};

/// Something to re-apply to the node at `path` of each rendered tree.
/// With an `expression`, it is re-evaluated whenever one of the
/// `variables` changes, and assigned to `attribute` (or for text
/// nodes, to the node content). With a `handler`, the directive's
/// `bind` hook is called once per render.
#[derive(Debug, Clone)]
pub struct Binding {
    pub path: NodePath,
    pub attribute: Option<KString>,
    pub expression: Option<Expr>,
    pub variables: Vec<KString>,
    pub handler: Option<Handler>,
    /// The source element of scoped directives.
    pub original: Option<Node>,
}

impl Binding {
    pub(crate) fn text(path: NodePath, expression: Expr) -> Binding {
        Binding {
            path,
            attribute: None,
            variables: expression.variables(),
            expression: Some(expression),
            handler: None,
            original: None,
        }
    }

    pub(crate) fn attribute(
        path: NodePath,
        name: KString,
        expression: Expr,
        handler: Option<Handler>
    ) -> Binding {
        Binding {
            path,
            attribute: Some(name),
            variables: expression.variables(),
            expression: Some(expression),
            handler,
            original: None,
        }
    }

    pub(crate) fn handler(path: NodePath, handler: Handler) -> Binding {
        Binding {
            path,
            attribute: None,
            expression: None,
            variables: Vec::new(),
            handler: Some(handler),
            original: None,
        }
    }

    pub(crate) fn scoped(path: NodePath, handler: Handler, original: Node) -> Binding {
        Binding {
            original: Some(original),
            ..Binding::handler(path, handler)
        }
    }

    fn is_text(&self) -> bool {
        self.expression.is_some() && self.attribute.is_none()
    }
}

#[derive(Debug)]
pub struct Template {
    generator: Expr,
    bindings: Vec<Binding>,
    compiler: Compiler,
    options: WebiOptions,
}

impl Template {
    pub fn new(
        generator: Expr,
        bindings: Vec<Binding>,
        compiler: Compiler,
        options: WebiOptions
    ) -> Template {
        Template { generator, bindings, compiler, options }
    }

    pub fn bindings(&self) -> &[Binding] {
        &self.bindings
    }

    /// The markup for `scope`.
    pub fn generate(&self, scope: &Observable) -> String {
        self.generator.render_markup(scope)
    }

    /// Locates the node for `binding` in `root`. A text node that
    /// renders to the empty string is not in the parsed markup; it is
    /// put back.
    fn resolve(&self, binding: &Binding, root: &Node, scope: &Observable) -> Result<Node> {
        match binding.path.find_node(root) {
            Ok(node) => Ok(node),
            Err(e) => match &binding.expression {
                Some(expression) if binding.is_text()
                    && expression.render_text(scope).is_empty() =>
                    binding.path.restore_text_node(root),
                _ => Err(e),
            }
        }
    }

    /// Watches the variables of an expression binding, keeping `node`
    /// updated. The watchers refer to `scope` weakly.
    fn attach(binding: &Binding, expression: &Expr, node: &Node, scope: &Observable) -> Unwatch {
        let weak_scope = scope.downgrade();
        let node = node.clone();
        let attribute = binding.attribute.clone();
        let expression = expression.clone();
        let update = Rc::new(move || {
            if let Some(scope) = weak_scope.upgrade() {
                let s = expression.render_text(&scope);
                let result = match &attribute {
                    Some(name) => node.set_attribute(name, &s),
                    None => node.set_node_value(&s),
                };
                if let Err(e) = result {
                    warn!("could not update {node:?}: {e:#}");
                }
            }
        });
        Unwatch::all(binding.variables.iter().map(|variable| {
            let update = update.clone();
            scope.watch_path(variable, move |_| update())
        }).collect())
    }

    /// Renders into a new tree, attaches the bindings, and returns the
    /// root plus a handle removing the expression watchers again.
    /// Directive `bind` hooks manage their own watchers.
    pub fn render_bound(&self, scope: &Observable) -> Result<(Node, Unwatch)> {
        let markup = self.generate(scope);
        trace!("render {markup:?}");
        let root = wdom::element(&markup, &self.options.wrapper_tag)?;
        // All nodes are located before anything is bound, as bind
        // hooks may insert siblings.
        let nodes = self.bindings.iter()
            .map(|binding| self.resolve(binding, &root, scope))
            .collect::<Result<Vec<_>>>()?;
        let mut unwatchers = Vec::new();
        for (binding, node) in self.bindings.iter().zip(&nodes) {
            trace!("binding at {}: {binding:?}", binding.path);
            if let Some(expression) = &binding.expression {
                unwatchers.push(Template::attach(binding, expression, node, scope));
            }
            if let Some(handler) = &binding.handler {
                handler.bind(&BindContext {
                    node,
                    scope,
                    original: binding.original.as_ref(),
                    compiler: &self.compiler,
                    name: handler.name(),
                })?;
            }
        }
        Ok((root, Unwatch::all(unwatchers)))
    }

    pub fn render(&self, scope: &Observable) -> Result<Node> {
        Ok(self.render_bound(scope)?.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::RefCell;
    use serde_json::json;
    use crate::{directive::{AttributeHandler, TagHandler},
                error::{webi_error_kind, WebiErrorKind},
                webi::Webi};

    fn scope(j: serde_json::Value) -> Observable {
        Observable::from_json(j).unwrap()
    }

    #[test]
    fn t_roundtrip() {
        let webi = Webi::new();
        let node = webi.render("<div>{{x}}</div>", &scope(json!({"x": "test"}))).unwrap();
        assert_eq!(node.outer_html(), "<div>test</div>");
    }

    #[test]
    fn t_reactivity() {
        let webi = Webi::new();
        let t = webi.compile("<p><span class=\"n{{n}}\">{{n}}</span>{{other.test}}</p>").unwrap();
        let s = scope(json!({"n": 1, "other": {"test": "a"}}));
        let root = t.render(&s).unwrap();
        let span = root.child(0).unwrap();
        assert_eq!(root.outer_html(), r#"<p><span class="n1">1</span>a</p>"#);
        s.set("n", 2);
        assert!(root.child(0).unwrap().ptr_eq(&span));
        s.get("other", "").as_observable().unwrap().set("test", "<b>");
        assert_eq!(root.outer_html(), r#"<p><span class="n2">2</span>&lt;b&gt;</p>"#);
    }

    #[test]
    fn t_independent_renders() {
        let webi = Webi::new();
        let t = webi.compile("<i>{{v}}</i>").unwrap();
        let (s1, s2) = (scope(json!({"v": "one"})), scope(json!({"v": "two"})));
        let (r1, r2) = (t.render(&s1).unwrap(), t.render(&s2).unwrap());
        s1.set("v", "uno");
        assert_eq!(r1.outer_html(), "<i>uno</i>");
        assert_eq!(r2.outer_html(), "<i>two</i>");
    }

    #[test]
    fn t_empty_text_restored() {
        let webi = Webi::new();
        let t = webi.compile("<p>{{a}}<b>x</b>{{c}}</p>").unwrap();
        let s = Observable::new();
        let root = t.render(&s).unwrap();
        assert_eq!(root.child_count(), 3);
        s.set("a", "A");
        s.set("c", "C");
        assert_eq!(root.outer_html(), "<p>A<b>x</b>C</p>");
    }

    #[test]
    fn t_unwatch_render() {
        let webi = Webi::new();
        let t = webi.compile("<i>{{v}}</i>").unwrap();
        let s = scope(json!({"v": 1}));
        let (root, unwatch) = t.render_bound(&s).unwrap();
        unwatch.unwatch();
        s.set("v", 2);
        assert_eq!(root.outer_html(), "<i>1</i>");
        assert_eq!(s.listener_count(), 0);
    }

    #[test]
    fn t_path_mismatch_is_fatal() {
        // an expression formatter that drops the children breaks the
        // recorded paths
        let webi = Webi::builder()
            .add_tag("x-empty", TagHandler::new().expression(
                |_, _, _| Expr::markup("<x-empty></x-empty>")))
            .build();
        let t = webi.compile("<div><x-empty><b>{{v}}</b></x-empty></div>").unwrap();
        let err = t.render(&scope(json!({"v": 1}))).unwrap_err();
        assert!(matches!(webi_error_kind(&err), Some(WebiErrorKind::NodeNotFound { .. })));
    }

    #[test]
    fn t_scoped_bind_gets_original() {
        let seen: Rc<RefCell<Vec<String>>> = Rc::new(RefCell::new(Vec::new()));
        let seen2 = seen.clone();
        let webi = Webi::builder()
            .add_tag("widget", TagHandler::new().scoped(true).bind(move |ctx| {
                seen2.borrow_mut().push(format!(
                    "{} {} {}", ctx.name, ctx.node.outer_html(),
                    ctx.original.map(|n| n.outer_html()).unwrap_or_default()));
                Ok(())
            }))
            .add_attribute("class", AttributeHandler::new().bind(|_| panic!("not reached")),
                           &["widget"])
            .build();
        let t = webi.compile(r#"<div><widget class="{{c}}">b</widget></div>"#).unwrap();
        t.render(&Observable::new()).unwrap();
        assert_eq!(*seen.borrow(),
                   [r#"widget <!--scoped--> <widget class="{{c}}">b</widget>"#]);
    }

    #[test]
    fn t_unimplemented_scoped() {
        let webi = Webi::builder()
            .add_tag("widget", TagHandler::new().scoped(true))
            .build();
        let err = webi.render("<p><widget/></p>", &Observable::new()).unwrap_err();
        assert!(matches!(webi_error_kind(&err),
                         Some(WebiErrorKind::UnimplementedDirective(_))));
    }
}
