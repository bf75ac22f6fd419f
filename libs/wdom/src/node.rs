//! Mutable DOM nodes. A `Node` is a cheap handle (reference counted);
//! cloning it does not copy the tree, use `deep_clone` for that.
//! Parents are referenced weakly, children strongly.

use std::{cell::RefCell,
          fmt::Debug,
          rc::{Rc, Weak}};
use anyhow::{Result, bail, anyhow};
use kstring::KString;

use crate::print::Print;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NodeKind {
    Element,
    Text,
    Comment,
}

enum Content {
    Element {
        tag_name: KString,
        attributes: Vec<(KString, KString)>,
    },
    Text(KString),
    Comment(KString),
}

struct NodeData {
    parent: Option<Weak<RefCell<NodeData>>>,
    content: Content,
    children: Vec<Node>,
}

#[derive(Clone)]
pub struct Node(Rc<RefCell<NodeData>>);

impl Node {
    fn new(content: Content) -> Node {
        Node(Rc::new(RefCell::new(NodeData {
            parent: None,
            content,
            children: Vec::new(),
        })))
    }

    /// `tag_name` is lowercased.
    pub fn element(tag_name: &str) -> Node {
        Node::new(Content::Element {
            tag_name: KString::from_string(tag_name.to_ascii_lowercase()),
            attributes: Vec::new(),
        })
    }

    pub fn text(s: &str) -> Node {
        Node::new(Content::Text(KString::from_ref(s)))
    }

    pub fn comment(s: &str) -> Node {
        Node::new(Content::Comment(KString::from_ref(s)))
    }

    pub fn kind(&self) -> NodeKind {
        match &self.0.borrow().content {
            Content::Element { .. } => NodeKind::Element,
            Content::Text(_) => NodeKind::Text,
            Content::Comment(_) => NodeKind::Comment,
        }
    }

    pub fn is_element(&self) -> bool {
        self.kind() == NodeKind::Element
    }

    /// Lowercase tag name, for elements only.
    pub fn tag_name(&self) -> Option<KString> {
        match &self.0.borrow().content {
            Content::Element { tag_name, .. } => Some(tag_name.clone()),
            _ => None,
        }
    }

    /// The tag name for elements, "#text" or "#comment" otherwise.
    pub fn node_name(&self) -> KString {
        match &self.0.borrow().content {
            Content::Element { tag_name, .. } => tag_name.clone(),
            Content::Text(_) => KString::from_static("#text"),
            Content::Comment(_) => KString::from_static("#comment"),
        }
    }

    pub fn ptr_eq(&self, other: &Node) -> bool {
        Rc::ptr_eq(&self.0, &other.0)
    }

    // ------------------------------------------------------------------
    // Attributes

    /// In document order. Empty for non-elements.
    pub fn attributes(&self) -> Vec<(KString, KString)> {
        match &self.0.borrow().content {
            Content::Element { attributes, .. } => attributes.clone(),
            _ => Vec::new(),
        }
    }

    pub fn get_attribute(&self, name: &str) -> Option<KString> {
        match &self.0.borrow().content {
            Content::Element { attributes, .. } =>
                attributes.iter().find(|(k, _)| k.as_str() == name)
                .map(|(_, v)| v.clone()),
            _ => None,
        }
    }

    pub fn has_attribute(&self, name: &str) -> bool {
        self.get_attribute(name).is_some()
    }

    /// Replaces the value in place if the attribute exists, appends it
    /// otherwise. Names are lowercased.
    pub fn set_attribute(&self, name: &str, value: &str) -> Result<()> {
        let name = name.to_ascii_lowercase();
        match &mut self.0.borrow_mut().content {
            Content::Element { attributes, .. } => {
                if let Some(att) = attributes.iter_mut().find(
                    |(k, _)| k.as_str() == name)
                {
                    att.1 = KString::from_ref(value);
                } else {
                    attributes.push((KString::from_string(name),
                                     KString::from_ref(value)));
                }
                Ok(())
            }
            _ => bail!("set_attribute({name:?}): not an element node"),
        }
    }

    pub fn remove_attribute(&self, name: &str) -> Option<KString> {
        match &mut self.0.borrow_mut().content {
            Content::Element { attributes, .. } => {
                let i = attributes.iter().position(|(k, _)| k.as_str() == name)?;
                Some(attributes.remove(i).1)
            }
            _ => None,
        }
    }

    // ------------------------------------------------------------------
    // Character data

    /// The text of text and comment nodes, None for elements.
    pub fn node_value(&self) -> Option<KString> {
        match &self.0.borrow().content {
            Content::Element { .. } => None,
            Content::Text(s) | Content::Comment(s) => Some(s.clone()),
        }
    }

    pub fn set_node_value(&self, value: &str) -> Result<()> {
        match &mut self.0.borrow_mut().content {
            Content::Element { tag_name, .. } =>
                bail!("set_node_value: {tag_name:?} is an element node"),
            Content::Text(s) | Content::Comment(s) => {
                *s = KString::from_ref(value);
                Ok(())
            }
        }
    }

    /// Concatenation of all descendant text nodes (comments excluded).
    pub fn text_content(&self) -> String {
        let mut out = String::new();
        self.collect_text(&mut out);
        out
    }

    fn collect_text(&self, out: &mut String) {
        let data = self.0.borrow();
        match &data.content {
            Content::Text(s) => out.push_str(s),
            Content::Comment(_) => (),
            Content::Element { .. } => {
                for child in &data.children {
                    child.collect_text(out);
                }
            }
        }
    }

    // ------------------------------------------------------------------
    // Tree structure

    pub fn parent(&self) -> Option<Node> {
        self.0.borrow().parent.as_ref()
            .and_then(|w| w.upgrade())
            .map(Node)
    }

    /// A copy of the list of child handles.
    pub fn children(&self) -> Vec<Node> {
        self.0.borrow().children.clone()
    }

    pub fn child(&self, index: usize) -> Option<Node> {
        self.0.borrow().children.get(index).cloned()
    }

    pub fn child_count(&self) -> usize {
        self.0.borrow().children.len()
    }

    /// Position of self in the parent's child list.
    pub fn index_in_parent(&self) -> Option<usize> {
        let parent = self.parent()?;
        let data = parent.0.borrow();
        data.children.iter().position(|c| c.ptr_eq(self))
    }

    fn is_inclusive_ancestor_of(&self, node: &Node) -> bool {
        let mut current = Some(node.clone());
        while let Some(n) = current {
            if n.ptr_eq(self) {
                return true
            }
            current = n.parent();
        }
        false
    }

    fn check_can_contain(&self, child: &Node) -> Result<()> {
        if !self.is_element() {
            bail!("cannot add children to a {} node", self.node_name())
        }
        if child.is_inclusive_ancestor_of(self) {
            bail!("cannot insert a node into itself or its descendants")
        }
        Ok(())
    }

    /// Removes self from its parent, if any.
    pub fn detach(&self) {
        if let Some(parent) = self.parent() {
            parent.0.borrow_mut().children.retain(|c| !c.ptr_eq(self));
        }
        self.0.borrow_mut().parent = None;
    }

    /// Moves `child` to the end of the child list (detaching it from
    /// its previous parent first).
    pub fn append_child(&self, child: &Node) -> Result<()> {
        self.check_can_contain(child)?;
        child.detach();
        child.0.borrow_mut().parent = Some(Rc::downgrade(&self.0));
        self.0.borrow_mut().children.push(child.clone());
        Ok(())
    }

    /// Inserts `child` at position `index` (at most `child_count()`).
    pub fn insert_child(&self, index: usize, child: &Node) -> Result<()> {
        self.check_can_contain(child)?;
        child.detach();
        let len = self.child_count();
        if index > len {
            bail!("insert_child: index {index} out of range (have {len} children)")
        }
        child.0.borrow_mut().parent = Some(Rc::downgrade(&self.0));
        self.0.borrow_mut().children.insert(index, child.clone());
        Ok(())
    }

    pub fn insert_before(&self, child: &Node, reference: &Node) -> Result<()> {
        self.check_can_contain(child)?;
        child.detach();
        let index = reference.index_in_parent()
            .filter(|_| reference.parent().map_or(false, |p| p.ptr_eq(self)))
            .ok_or_else(|| anyhow!("insert_before: reference node is not a child"))?;
        self.insert_child(index, child)
    }

    pub fn remove_child(&self, child: &Node) -> Result<()> {
        match child.parent() {
            Some(p) if p.ptr_eq(self) => {
                child.detach();
                Ok(())
            }
            _ => bail!("remove_child: node is not a child")
        }
    }

    /// Puts `replacement` at self's position and detaches self.
    pub fn replace_with(&self, replacement: &Node) -> Result<()> {
        let parent = self.parent().ok_or_else(
            || anyhow!("replace_with: node has no parent"))?;
        parent.insert_before(replacement, self)?;
        parent.remove_child(self)
    }

    /// Copies the subtree; the copy has no parent.
    pub fn deep_clone(&self) -> Node {
        let data = self.0.borrow();
        let content = match &data.content {
            Content::Element { tag_name, attributes } => Content::Element {
                tag_name: tag_name.clone(),
                attributes: attributes.clone(),
            },
            Content::Text(s) => Content::Text(s.clone()),
            Content::Comment(s) => Content::Comment(s.clone()),
        };
        let copy = Node::new(content);
        for child in &data.children {
            let c = child.deep_clone();
            c.0.borrow_mut().parent = Some(Rc::downgrade(&copy.0));
            copy.0.borrow_mut().children.push(c);
        }
        copy
    }

    /// Calls `f` on self and all descendants, in document order.
    pub fn walk(&self, f: &mut impl FnMut(&Node)) {
        f(self);
        for child in self.children() {
            child.walk(f);
        }
    }

    pub fn outer_html(&self) -> String {
        self.to_html_fragment_string()
    }

    pub fn inner_html(&self) -> String {
        let mut s = String::new();
        for child in self.children() {
            s.push_str(&child.to_html_fragment_string());
        }
        s
    }
}

// The parent link would make derived Debug output recurse.
impl Debug for Node {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "Node({:?})", self.outer_html())
    }
}

/// Inserts `node` as the sibling right before `reference`.
pub fn insert_node_before(node: &Node, reference: &Node) -> Result<()> {
    let parent = reference.parent().ok_or_else(
        || anyhow!("insert_node_before: reference node has no parent"))?;
    parent.insert_before(node, reference)
}

/// Inserts `node` as the sibling right after `reference`.
pub fn insert_node_after(node: &Node, reference: &Node) -> Result<()> {
    let parent = reference.parent().ok_or_else(
        || anyhow!("insert_node_after: reference node has no parent"))?;
    let index = reference.index_in_parent()
        .expect("reference has a parent, hence an index");
    if node.parent().map_or(false, |p| p.ptr_eq(&parent))
        && node.index_in_parent().map_or(false, |i| i < index)
    {
        // detaching will shift the reference one to the left
        parent.insert_child(index, node)
    } else {
        parent.insert_child(index + 1, node)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn names(node: &Node) -> Vec<String> {
        node.children().iter().map(|c| c.node_name().to_string()).collect()
    }

    #[test]
    fn t_attributes() {
        let div = Node::element("DIV");
        assert_eq!(div.tag_name().unwrap().as_str(), "div");
        div.set_attribute("class", "a").unwrap();
        div.set_attribute("ID", "x").unwrap();
        div.set_attribute("class", "b").unwrap();
        assert_eq!(div.outer_html(), r#"<div class="b" id="x"></div>"#);
        assert_eq!(div.remove_attribute("class").unwrap().as_str(), "b");
        assert!(!div.has_attribute("class"));
        assert!(Node::text("t").set_attribute("a", "b").is_err());
    }

    #[test]
    fn t_tree_ops() {
        let ul = Node::element("ul");
        let a = Node::element("li");
        let b = Node::text("b");
        let c = Node::comment("c");
        ul.append_child(&a).unwrap();
        ul.append_child(&c).unwrap();
        ul.insert_before(&b, &c).unwrap();
        assert_eq!(names(&ul), ["li", "#text", "#comment"]);
        assert_eq!(b.index_in_parent(), Some(1));
        assert!(b.parent().unwrap().ptr_eq(&ul));

        let d = Node::element("li");
        insert_node_after(&d, &a).unwrap();
        assert_eq!(names(&ul), ["li", "li", "#text", "#comment"]);
        insert_node_before(&a, &c).unwrap();
        assert_eq!(names(&ul), ["li", "#text", "li", "#comment"]);
        assert!(ul.child(2).unwrap().ptr_eq(&a));

        ul.remove_child(&b).unwrap();
        assert!(b.parent().is_none());
        assert!(ul.remove_child(&b).is_err());

        let e = Node::text("e");
        c.replace_with(&e).unwrap();
        assert_eq!(names(&ul), ["li", "li", "#text"]);
        assert_eq!(ul.text_content(), "e");
    }

    #[test]
    fn t_no_cycles() {
        let outer = Node::element("div");
        let inner = Node::element("span");
        outer.append_child(&inner).unwrap();
        assert!(inner.append_child(&outer).is_err());
        assert!(inner.append_child(&inner).is_err());
        assert!(Node::text("x").append_child(&Node::text("y")).is_err());
    }

    #[test]
    fn t_deep_clone() {
        let p = Node::element("p");
        p.set_attribute("title", "t").unwrap();
        p.append_child(&Node::text("hi")).unwrap();
        let copy = p.deep_clone();
        assert!(!copy.ptr_eq(&p));
        copy.child(0).unwrap().set_node_value("ho").unwrap();
        assert_eq!(p.outer_html(), r#"<p title="t">hi</p>"#);
        assert_eq!(copy.outer_html(), r#"<p title="t">ho</p>"#);
        assert!(copy.child(0).unwrap().parent().unwrap().ptr_eq(&copy));
    }
}
