//! Ready-made directives.

use std::{cell::RefCell, rc::Rc};
use anyhow::{Result, anyhow};
use kstring::KString;

use wdom::{insert_node_before, Node};
use webi_util::{trace, warn};

use crate::{directive::{AttributeHandler, BindContext},
            observable::{Observable, WeakObservable},
            template::Template,
            value::Value};

/// Attribute naming the scope variable for each entry.
const ALIAS_ATTRIBUTE: &str = "as";
const DEFAULT_ALIAS: &str = "it";

struct Rendered {
    entry: Value,
    node: Node,
    // the rendered node's watchers refer to it weakly
    _scope: Observable,
}

struct EachState {
    template: Template,
    placeholder: Node,
    alias: KString,
    scope: WeakObservable,
    rendered: RefCell<Vec<Rendered>>,
}

impl EachState {
    /// Brings the rendered nodes in line with `list`. Nodes for the
    /// leading entries that are still the same are kept.
    fn update(&self, list: &Value) -> Result<()> {
        let scope = self.scope.upgrade().ok_or_else(|| anyhow!("each: scope is gone"))?;
        let entries = list.entries().unwrap_or_default();
        let mut rendered = self.rendered.borrow_mut();
        let keep = rendered.iter().zip(&entries)
            .take_while(|(r, entry)| r.entry.same(entry))
            .count();
        for r in rendered.drain(keep..) {
            r.node.detach();
        }
        trace!("each: keeping {keep}, rendering {}", entries.len() - keep);
        for entry in &entries[keep..] {
            let child_scope = Observable::with_parent(&scope);
            child_scope.set(&self.alias, entry.clone());
            let node = self.template.render(&child_scope)?;
            insert_node_before(&node, &self.placeholder)?;
            rendered.push(Rendered { entry: entry.clone(), node, _scope: child_scope });
        }
        Ok(())
    }
}

fn bind_each(context: &BindContext) -> Result<()> {
    let original = context.original.ok_or_else(
        || anyhow!("{:?} has to be registered as a scoped directive", context.name))?;
    let model = original.get_attribute(context.name).ok_or_else(
        || anyhow!("{:?} attribute missing on {original:?}", context.name))?;
    let alias = original.get_attribute(ALIAS_ATTRIBUTE)
        .unwrap_or_else(|| KString::from_static(DEFAULT_ALIAS));

    let item = original.deep_clone();
    item.remove_attribute(context.name);
    item.remove_attribute(ALIAS_ATTRIBUTE);
    let state = Rc::new(EachState {
        template: context.compiler.compile_node(item)?,
        placeholder: context.node.clone(),
        alias,
        scope: context.scope.downgrade(),
        rendered: RefCell::new(Vec::new()),
    });
    state.update(&context.scope.get(&model, Value::Null))?;

    // Lives as long as the scope does.
    let path = model.clone();
    let _ = context.scope.watch_path(&path, move |change| {
        if let Err(e) = state.update(change.value) {
            warn!("each {model:?}: {e:#}");
        }
    });
    Ok(())
}

/// A list directive (register it as scoped attribute, e.g. `each`):
/// `<li each="entries" as="entry">{{entry.name}}</li>` renders the
/// element once per entry of the list at `entries`, with a child scope
/// holding the entry under the `as` name (`it` by default), and keeps
/// the rendered elements in sync with the list.
pub fn each() -> AttributeHandler {
    AttributeHandler::new()
        .scoped(true)
        .bind(bind_each)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use crate::webi::Webi;

    fn webi() -> Rc<Webi> {
        Webi::builder().add_attribute("each", each(), &[]).build()
    }

    #[test]
    fn t_each() {
        let webi = webi();
        let scope = Observable::from_json(
            json!({"entries": [{"name": "A"}, {"name": "B"}]})).unwrap();
        let root = webi.render(
            r#"<ul class="x"><li each="entries" as="item">{{item.name}}</li></ul>"#,
            &scope).unwrap();
        assert_eq!(root.outer_html(),
                   r#"<ul class="x"><li>A</li><li>B</li><!--scoped--></ul>"#);
        let first = root.child(0).unwrap();
        let second = root.child(1).unwrap();
        let entries = scope.get("entries", Value::Null);
        entries.as_array().unwrap().push(json!({"name": "C"}));
        assert_eq!(root.outer_html(),
                   r#"<ul class="x"><li>A</li><li>B</li><li>C</li><!--scoped--></ul>"#);
        assert!(root.child(0).unwrap().ptr_eq(&first));
        assert!(root.child(1).unwrap().ptr_eq(&second));
    }

    #[test]
    fn t_each_replace_and_shrink() {
        let webi = webi();
        let scope = Observable::from_json(json!({"l": [1, 2, 3]})).unwrap();
        let root = webi.render(r#"<p><b each="l">{{it}}</b></p>"#, &scope).unwrap();
        assert_eq!(root.inner_html(), "<b>1</b><b>2</b><b>3</b><!--scoped-->");
        let arr = scope.get("l", Value::Null).as_array().unwrap().clone();
        arr.pop();
        assert_eq!(root.inner_html(), "<b>1</b><b>2</b><!--scoped-->");
        arr.reverse();
        assert_eq!(root.inner_html(), "<b>2</b><b>1</b><!--scoped-->");
        scope.set("l", json!(["x"]));
        assert_eq!(root.inner_html(), "<b>x</b><!--scoped-->");
        scope.set("l", Value::Null);
        assert_eq!(root.inner_html(), "<!--scoped-->");
    }

    #[test]
    fn t_each_entry_scope() {
        let webi = webi();
        let scope = Observable::from_json(json!({"l": [{"n": 1}], "suffix": "!"})).unwrap();
        let root = webi.render(r#"<p><i each="l" title="{{suffix}}">{{it.n}}</i></p>"#, &scope)
            .unwrap();
        // lookups stay within the entry's scope
        assert_eq!(root.inner_html(), r#"<i title="">1</i><!--scoped-->"#);
        scope.set("suffix", "?");
        assert_eq!(root.inner_html(), r#"<i title="">1</i><!--scoped-->"#);
    }

    #[test]
    fn t_each_requires_scoped() {
        let webi = Webi::builder()
            .add_attribute("each", AttributeHandler::new().bind(bind_each), &[])
            .build();
        assert!(webi.render(r#"<p each="l"></p>"#, &Observable::new()).is_err());
    }
}
