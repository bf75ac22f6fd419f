//! Turns template markup into a `Template`: an expression generating
//! the markup for a scope, plus the bindings to attach to the parsed
//! result.
//!
//! Node paths are recorded against the tree being compiled, which is
//! kept structurally identical to what the generated markup parses
//! to: comments are dropped and adjacent text merged up front, scoped
//! elements are replaced by the placeholder comment that the markup
//! contains instead of them.

use std::{collections::HashSet, rc::{Rc, Weak}};
use anyhow::{Result, anyhow};
use kstring::KString;

use wdom::{Node, NodeKind};
use webi_util::trace;

use crate::{directive::{AttributeView, Handler},
            error::{webi_error, WebiErrorKind},
            expr::{default_attribute_expression, default_tag_expression,
                   placeholder_expression, text_expression, Expr},
            node_path::NodePath,
            template::{Binding, Template},
            webi::Webi};

#[derive(Debug, Clone)]
pub struct Compiler {
    webi: Weak<Webi>,
}

/// Removes comments and merges adjacent text nodes, recursively.
fn normalize(node: &Node) -> Result<()> {
    let mut previous_text: Option<Node> = None;
    for child in node.children() {
        match child.kind() {
            NodeKind::Comment => node.remove_child(&child)?,
            NodeKind::Text => {
                if let Some(previous) = &previous_text {
                    let mut s = previous.node_value().unwrap_or_default().to_string();
                    s.push_str(&child.node_value().unwrap_or_default());
                    previous.set_node_value(&s)?;
                    node.remove_child(&child)?;
                } else {
                    previous_text = Some(child);
                }
            }
            NodeKind::Element => {
                normalize(&child)?;
                previous_text = None;
            }
        }
    }
    Ok(())
}

impl Compiler {
    pub fn new(webi: &Rc<Webi>) -> Compiler {
        Compiler { webi: Rc::downgrade(webi) }
    }

    /// A compiler without registry; compiling fails with
    /// `MissingDependency`.
    pub fn detached() -> Compiler {
        Compiler { webi: Weak::new() }
    }

    pub fn webi(&self) -> Result<Rc<Webi>> {
        self.webi.upgrade().ok_or_else(
            || webi_error(WebiErrorKind::MissingDependency("the Webi registry has been dropped")))
    }

    pub fn compile(&self, src: &str) -> Result<Template> {
        let nodes = wdom::parse_fragment(src)?;
        self.compile_nodes(nodes)
    }

    /// Compiles an existing element, e.g. a copy of a scoped
    /// directive's original node. The node is modified (and detached
    /// from its parent).
    pub fn compile_node(&self, node: Node) -> Result<Template> {
        node.detach();
        self.compile_nodes(vec![node])
    }

    fn would_be_scoped(webi: &Webi, element: &Node) -> bool {
        let tag_name = element.node_name();
        webi.tag_handler(&tag_name).map_or(false, |h| h.is_scoped())
            || element.attributes().iter().any(
                |(name, _)| webi.attribute_handler(&tag_name, name)
                    .map_or(false, |h| h.is_scoped()))
    }

    fn compile_nodes(&self, nodes: Vec<Node>) -> Result<Template> {
        let webi = self.webi()?;
        let options = webi.options();
        let root = match wdom::single_root(&nodes) {
            Some(element) if !Compiler::would_be_scoped(&webi, &element) => element,
            _ => {
                let wrapper = Node::element(&options.wrapper_tag);
                for node in &nodes {
                    wrapper.append_child(node)?;
                }
                wrapper
            }
        };
        normalize(&root)?;
        let mut bindings = Vec::new();
        let generator = self.compile_element(&webi, &root, &root, &mut bindings)?;
        trace!("compiled {} with {} bindings", root.outer_html(), bindings.len());
        Ok(Template::new(generator, bindings, self.clone(), options.clone()))
    }

    /// Replaces `node` by the placeholder and records the binding for
    /// the handler.
    fn compile_scoped(
        &self,
        webi: &Webi,
        node: &Node,
        root: &Node,
        handler: Handler,
        bindings: &mut Vec<Binding>
    ) -> Result<Expr> {
        let placeholder_text = &webi.options().placeholder;
        let placeholder = Node::comment(placeholder_text);
        node.replace_with(&placeholder).map_err(
            |e| anyhow!("scoped directive {:?} on the template root: {e}", handler.name()))?;
        let path = NodePath::of(&placeholder, root)?;
        trace!("scoped binding for {:?} at {path}", handler.name());
        bindings.push(Binding::scoped(path, handler, node.clone()));
        Ok(placeholder_expression(placeholder_text))
    }

    fn compile_element(
        &self,
        webi: &Webi,
        node: &Node,
        root: &Node,
        bindings: &mut Vec<Binding>
    ) -> Result<Expr> {
        // bindings of this node are dropped again if it turns out to
        // be scoped
        let mark = bindings.len();
        let tag_name = node.node_name();
        let path = NodePath::of(node, root)?;
        let mut view = AttributeView::new(node);

        let tag_handler = webi.tag_handler(&tag_name);
        if let Some(handler) = &tag_handler {
            handler.preprocess(&mut view)?;
            if handler.is_scoped() {
                return self.compile_scoped(webi, node, root, handler.clone(), bindings)
            }
            bindings.push(Binding::handler(path.clone(), handler.clone()));
        }

        let mut attribute_expressions = Vec::new();
        let mut visited: HashSet<KString> = HashSet::new();
        while let Some(name) = view.names().into_iter().find(|n| !visited.contains(n)) {
            visited.insert(name.clone());
            let handler = webi.attribute_handler(&tag_name, &name);
            if let Some(handler) = &handler {
                handler.preprocess(&mut view)?;
                if handler.is_scoped() {
                    bindings.truncate(mark);
                    return self.compile_scoped(webi, node, root, handler.clone(), bindings)
                }
            }
            let value = match view.get(&name) {
                Some(value) => value.to_string(),
                // its own directive removed it
                None => continue,
            };
            let value_expression = text_expression(&value);
            if value_expression.has_lookups() {
                trace!("attribute binding {name:?} at {path}");
                bindings.push(Binding::attribute(path.clone(), name.clone(),
                                                 value_expression.clone(), handler.clone()));
            } else if let Some(handler) = &handler {
                bindings.push(Binding::handler(path.clone(), handler.clone()));
            }
            let custom = match &handler {
                Some(Handler::Attribute(h)) => h.expression.as_ref()
                    .map(|f| f(node, name.as_str(), &value_expression)),
                _ => None,
            };
            attribute_expressions.push(custom.unwrap_or_else(
                || default_attribute_expression(&name, &value_expression)));
        }

        let mut body = Expr::new();
        for child in node.children() {
            match child.kind() {
                NodeKind::Element =>
                    body.append(self.compile_element(webi, &child, root, bindings)?),
                NodeKind::Text =>
                    body.append(self.compile_text(&child, root, bindings)?),
                // only the placeholders of scoped siblings, which
                // contribute their markup already
                NodeKind::Comment => (),
            }
        }

        let custom = match &tag_handler {
            Some(Handler::Tag(h)) => h.expression.as_ref()
                .map(|f| f(node, &attribute_expressions[..], &body)),
            _ => None,
        };
        Ok(custom.unwrap_or_else(
            || default_tag_expression(&tag_name, &attribute_expressions, &body)))
    }

    fn compile_text(&self, node: &Node, root: &Node, bindings: &mut Vec<Binding>)
                    -> Result<Expr>
    {
        let expression = text_expression(&node.node_value().unwrap_or_default());
        if expression.has_lookups() {
            let path = NodePath::of(node, root)?;
            trace!("text binding at {path}");
            bindings.push(Binding::text(path, expression.clone()));
        }
        Ok(expression)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{directive::{AttributeHandler, TagHandler}, error::webi_error_kind,
                observable::Observable};
    use serde_json::json;

    fn paths(template: &Template) -> Vec<String> {
        template.bindings().iter().map(|b| b.path.to_string()).collect()
    }

    #[test]
    fn t_generated_markup() {
        let webi = Webi::new();
        let t = webi.compile("<div>\n <a href=\"/{{id}}\" title='x'>{{name}}</a><!-- c --> \n<br></div>")
            .unwrap();
        let scope = Observable::from_json(json!({"id": 3, "name": "A&B"})).unwrap();
        assert_eq!(t.generate(&scope),
                   "<div>\n <a href=\"/3\" title=\"x\">A&amp;B</a> \n<br/></div>");
        assert_eq!(paths(&t), ["a[1]", "a[1]/#text[0]"]);
        let b = &t.bindings()[0];
        assert_eq!(b.attribute.as_deref(), Some("href"));
        assert_eq!(b.variables, ["id"]);
    }

    #[test]
    fn t_wrapping() {
        let webi = Webi::new();
        let t = webi.compile("a <b>{{x}}</b>").unwrap();
        assert_eq!(t.generate(&Observable::new()), "<div>a <b></b></div>");
        assert_eq!(paths(&t), ["b[1]/#text[0]"]);
        let t = webi.compile(" <p>y</p> ").unwrap();
        assert_eq!(t.generate(&Observable::new()), "<p>y</p>");
        assert_eq!(webi.compile("").unwrap().generate(&Observable::new()), "<div/>");
    }

    #[test]
    fn t_scoped() {
        let webi = Webi::builder()
            .add_attribute("x-each", AttributeHandler::new().scoped(true), &[])
            .add_attribute("title", AttributeHandler::new(), &[])
            .build();
        // "title" is seen first, its binding must be dropped again
        let t = webi.compile(r#"<ul><li title="{{t}}" x-each="x">{{y}}</li><li>{{z}}</li></ul>"#)
            .unwrap();
        assert_eq!(t.generate(&Observable::new()), "<ul><!--scoped--><li></li></ul>");
        assert_eq!(paths(&t), ["#comment[0]", "li[1]/#text[0]"]);
        let original = t.bindings()[0].original.as_ref().unwrap();
        assert!(original.parent().is_none());
        assert_eq!(original.get_attribute("x-each").unwrap(), "x");
        // a scoped root gets wrapped
        let t = webi.compile(r#"<li x-each="x">y</li>"#).unwrap();
        assert_eq!(t.generate(&Observable::new()), "<div><!--scoped--></div>");
    }

    #[test]
    fn t_attribute_encounter_order() {
        let webi = Webi::builder()
            .add_attribute("z-first", AttributeHandler::new().scoped(true), &[])
            .add_attribute("a-second", AttributeHandler::new().scoped(true), &[])
            .build();
        let t = webi.compile(r#"<p><li z-first="1" a-second="2">x</li></p>"#).unwrap();
        assert_eq!(t.bindings().len(), 1);
        assert_eq!(t.bindings()[0].handler.as_ref().unwrap().name(), "z-first");
        let t = Webi::new().compile(r#"<a title="t" href="h{{x}}">x</a>"#).unwrap();
        assert_eq!(t.generate(&Observable::new()), r#"<a title="t" href="h">x</a>"#);
    }

    #[test]
    fn t_preprocess() {
        let webi = Webi::builder()
            .add_tag("card", TagHandler::new().preprocess(|view| {
                view.set("class", "card {{kind}}")?;
                view.remove("drop");
                Ok(())
            }))
            .add_attribute("data-x", AttributeHandler::new()
                           .expression(|_, name, value| {
                               let mut e = Expr::markup(&format!("{name}-wrapped=\""));
                               e.append(value.clone());
                               e.append(Expr::markup("\""));
                               e
                           }), &["card"])
            .build();
        let t = webi.compile(r#"<card drop="1" data-x="v{{n}}"></card>"#).unwrap();
        let scope = Observable::from_json(json!({"kind": "k", "n": 1})).unwrap();
        assert_eq!(t.generate(&scope),
                   r#"<card data-x-wrapped="v1" class="card k"/>"#);
        // tag handler, data-x (with its handler), class
        assert_eq!(t.bindings().len(), 3);
        assert!(t.bindings()[1].handler.is_some());
        assert_eq!(t.bindings()[2].attribute.as_deref(), Some("class"));
    }

    #[test]
    fn t_missing_dependency() {
        let webi = Webi::new();
        let compiler = webi.compiler();
        drop(webi);
        let err = compiler.compile("<p/>").unwrap_err();
        assert!(matches!(webi_error_kind(&err), Some(WebiErrorKind::MissingDependency(_))));
    }
}
