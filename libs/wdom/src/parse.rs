//! Parsing of HTML fragments into `Node` trees.

//! This is a plain tree builder on top of the html5gum tokenizer:
//! elements are closed by their matching end tag (or at the end of
//! input), a self-closing flag is honoured for every element, void
//! elements never get children. None of the HTML5 insertion mode
//! rules (implied end tags, foster parenting etc.) are applied, so
//! serialising a parsed tree and parsing the result again yields the
//! same structure.

use std::collections::VecDeque;
use anyhow::Result;
use html5gum::{DefaultEmitter, Emitter, Error, HtmlString, State, Token};
use kstring::KString;

use webi_util::{warn, nowarn as trace_token};

use crate::{meta::{is_void_element, is_raw_text_element}, node::{Node, NodeKind}};

fn kstring(s: HtmlString) -> Result<KString> {
    Ok(KString::from_string(String::from_utf8(s.0)?))
}

/// `DefaultEmitter` keeps the attributes of a start tag in a
/// `BTreeMap`; this records their names in source order alongside.
/// The order for each start tag is paired with the tag when it is
/// popped.
#[derive(Default)]
struct OrderedEmitter {
    inner: DefaultEmitter,
    in_start_tag: bool,
    // names of the current start tag, duplicates included
    names: Vec<HtmlString>,
    // in the same front-to-back order as the inner token queue
    pending: VecDeque<Vec<HtmlString>>,
}

impl Emitter for OrderedEmitter {
    type Token = (Token, Vec<HtmlString>);

    fn set_last_start_tag(&mut self, last_start_tag: Option<&[u8]>) {
        self.inner.set_last_start_tag(last_start_tag)
    }
    fn emit_eof(&mut self) {
        self.inner.emit_eof()
    }
    fn emit_error(&mut self, error: Error) {
        self.inner.emit_error(error)
    }
    fn pop_token(&mut self) -> Option<Self::Token> {
        let token = self.inner.pop_token()?;
        let names = match token {
            Token::StartTag(_) => self.pending.pop_back().unwrap_or_default(),
            _ => Vec::new(),
        };
        Some((token, names))
    }
    fn emit_string(&mut self, c: &[u8]) {
        self.inner.emit_string(c)
    }
    fn init_start_tag(&mut self) {
        self.in_start_tag = true;
        self.names.clear();
        self.inner.init_start_tag()
    }
    fn init_end_tag(&mut self) {
        self.in_start_tag = false;
        self.inner.init_end_tag()
    }
    fn init_comment(&mut self) {
        self.inner.init_comment()
    }
    fn emit_current_tag(&mut self) -> Option<State> {
        if self.in_start_tag {
            self.pending.push_front(std::mem::take(&mut self.names));
        }
        self.inner.emit_current_tag()
    }
    fn emit_current_comment(&mut self) {
        self.inner.emit_current_comment()
    }
    fn emit_current_doctype(&mut self) {
        self.inner.emit_current_doctype()
    }
    fn set_self_closing(&mut self) {
        self.inner.set_self_closing()
    }
    fn set_force_quirks(&mut self) {
        self.inner.set_force_quirks()
    }
    fn push_tag_name(&mut self, s: &[u8]) {
        self.inner.push_tag_name(s)
    }
    fn push_comment(&mut self, s: &[u8]) {
        self.inner.push_comment(s)
    }
    fn push_doctype_name(&mut self, s: &[u8]) {
        self.inner.push_doctype_name(s)
    }
    fn init_doctype(&mut self) {
        self.inner.init_doctype()
    }
    fn init_attribute(&mut self) {
        if self.in_start_tag {
            self.names.push(HtmlString::default());
        }
        self.inner.init_attribute()
    }
    fn push_attribute_name(&mut self, s: &[u8]) {
        if let (true, Some(name)) = (self.in_start_tag, self.names.last_mut()) {
            name.extend(s);
        }
        self.inner.push_attribute_name(s)
    }
    fn push_attribute_value(&mut self, s: &[u8]) {
        self.inner.push_attribute_value(s)
    }
    fn set_doctype_public_identifier(&mut self, value: &[u8]) {
        self.inner.set_doctype_public_identifier(value)
    }
    fn set_doctype_system_identifier(&mut self, value: &[u8]) {
        self.inner.set_doctype_system_identifier(value)
    }
    fn push_doctype_public_identifier(&mut self, s: &[u8]) {
        self.inner.push_doctype_public_identifier(s)
    }
    fn push_doctype_system_identifier(&mut self, s: &[u8]) {
        self.inner.push_doctype_system_identifier(s)
    }
    fn current_is_appropriate_end_tag_token(&mut self) -> bool {
        self.inner.current_is_appropriate_end_tag_token()
    }
}

struct Builder {
    toplevel: Vec<Node>,
    open: Vec<Node>,
}

impl Builder {
    fn append(&mut self, node: Node) -> Result<()> {
        if let Some(parent) = self.open.last() {
            parent.append_child(&node)
        } else {
            self.toplevel.push(node);
            Ok(())
        }
    }

    fn last_child(&self) -> Option<Node> {
        if let Some(parent) = self.open.last() {
            let n = parent.child_count();
            if n > 0 { parent.child(n - 1) } else { None }
        } else {
            self.toplevel.last().cloned()
        }
    }

    fn append_text(&mut self, s: &str) -> Result<()> {
        // The tokenizer may split character data into several tokens
        if let Some(last) = self.last_child() {
            if last.kind() == NodeKind::Text {
                let mut v = last.node_value().expect("is a text node").to_string();
                v.push_str(s);
                return last.set_node_value(&v)
            }
        }
        self.append(Node::text(s))
    }

    fn close(&mut self, tag_name: &str) {
        if let Some(pos) = self.open.iter().rposition(
            |n| n.tag_name().map_or(false, |t| t.as_str() == tag_name))
        {
            self.open.truncate(pos);
        } else {
            warn!("ignoring unmatched end tag </{tag_name}>");
        }
    }
}

/// Parse `src`, returning the top-level nodes (which have no parent).
pub fn parse_fragment(src: &str) -> Result<Vec<Node>> {
    let mut builder = Builder {
        toplevel: Vec::new(),
        open: Vec::new(),
    };
    let tokenizer = html5gum::Tokenizer::new_with_emitter(src, OrderedEmitter::default());
    for (token, attribute_order) in tokenizer.infallible() {
        trace_token!("token {token:?}");
        match token {
            Token::StartTag(mut starttag) => {
                let name = kstring(starttag.name)?.to_ascii_lowercase();
                if is_raw_text_element(&name) {
                    warn!("<{name}> content is parsed as markup, not as raw text");
                }
                let node = Node::element(&name);
                // first occurrence wins for duplicates, as with the map
                for k in attribute_order {
                    if let Some(v) = starttag.attributes.remove(&k) {
                        node.set_attribute(&kstring(k)?, &kstring(v)?)?;
                    }
                }
                for (k, v) in starttag.attributes {
                    node.set_attribute(&kstring(k)?, &kstring(v)?)?;
                }
                builder.append(node.clone())?;
                if !(starttag.self_closing || is_void_element(&name)) {
                    builder.open.push(node);
                }
            }
            Token::EndTag(endtag) => {
                let name = kstring(endtag.name)?.to_ascii_lowercase();
                if !is_void_element(&name) {
                    builder.close(&name);
                }
            }
            Token::String(s) => {
                builder.append_text(&kstring(s)?)?;
            }
            Token::Comment(s) => {
                builder.append(Node::comment(&kstring(s)?))?;
            }
            Token::Doctype(_) => (),
            Token::Error(e) => {
                // The tokenizer recovers by itself; the input is not
                // ours to validate.
                warn!("HTML5 parsing error: {e} in {src:?}");
            }
        }
    }
    Ok(builder.toplevel)
}

fn is_ignorable(node: &Node) -> bool {
    match node.kind() {
        NodeKind::Element => false,
        NodeKind::Comment => true,
        NodeKind::Text => node.node_value().map_or(true, |s| s.trim().is_empty()),
    }
}

/// Parses `src` into a single root: if the fragment consists of
/// exactly one element (possibly surrounded by whitespace and
/// comments, which are dropped), that element; otherwise a new
/// `wrapper_tag` element containing all top-level nodes.
pub fn element(src: &str, wrapper_tag: &str) -> Result<Node> {
    let nodes = parse_fragment(src)?;
    if let Some(single) = single_root(&nodes) {
        return Ok(single)
    }
    let wrapper = Node::element(wrapper_tag);
    for node in &nodes {
        wrapper.append_child(node)?;
    }
    Ok(wrapper)
}

/// The one element among `nodes` if all others are ignorable.
pub fn single_root(nodes: &[Node]) -> Option<Node> {
    let mut elements = nodes.iter().filter(|n| !is_ignorable(n));
    match (elements.next(), elements.next()) {
        (Some(e), None) if e.is_element() => Some(e.clone()),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::print::Print;

    fn roundtrip(s: &str) -> String {
        parse_fragment(s).unwrap()[..].to_html_fragment_string()
    }

    #[test]
    fn t_parse_fragment() {
        assert_eq!(roundtrip("<div>test</div>"), "<div>test</div>");
        assert_eq!(roundtrip("a<b>c</b>d"), "a<b>c</b>d");
        assert_eq!(roundtrip("<p>x<br>y</p>"), "<p>x<br>y</p>");
        assert_eq!(roundtrip("<ul><li/><li>2</li></ul>"), "<ul><li></li><li>2</li></ul>");
        assert_eq!(roundtrip("<i>unclosed"), "<i>unclosed</i>");
        assert_eq!(roundtrip("<!--c--><i>a &amp; b</i>"), "<!--c--><i>a &amp; b</i>");
        assert_eq!(roundtrip(r#"<A HREF="x">y</A>"#), r#"<a href="x">y</a>"#);
    }

    #[test]
    fn t_attribute_order() {
        assert_eq!(roundtrip(r#"<li z-first="1" a-second="2">x</li>"#),
                   r#"<li z-first="1" a-second="2">x</li>"#);
        assert_eq!(roundtrip(r#"<a title="t" href="h">x</a><b c="1" a="2" b="3"/>"#),
                   r#"<a title="t" href="h">x</a><b c="1" a="2" b="3"></b>"#);
        // the first of duplicate attributes is kept, at its position
        assert_eq!(roundtrip(r#"<i b="1" a="2" b="3"></i>"#), r#"<i b="1" a="2"></i>"#);
        let nodes = parse_fragment(r#"<p q="1" p="2"><i y="" x=""></i></p>"#).unwrap();
        let names: Vec<_> = nodes[0].attributes().into_iter().map(|(k, _)| k).collect();
        assert_eq!(names, ["q", "p"]);
    }

    #[test]
    fn t_structure() {
        let nodes = parse_fragment("<div class=\"c\">\n  <span>one</span>two<!-- x --></div>")
            .unwrap();
        assert_eq!(nodes.len(), 1);
        let div = &nodes[0];
        assert!(div.parent().is_none());
        assert_eq!(div.get_attribute("class").unwrap().as_str(), "c");
        let kinds: Vec<NodeKind> = div.children().iter().map(|n| n.kind()).collect();
        assert_eq!(kinds, [NodeKind::Text, NodeKind::Element, NodeKind::Text,
                           NodeKind::Comment]);
        assert_eq!(div.child(3).unwrap().node_value().unwrap().as_str(), " x ");
    }

    #[test]
    fn t_element() {
        let e = element("  <p>a</p>\n", "div").unwrap();
        assert_eq!(e.outer_html(), "<p>a</p>");
        let e = element("<p>a</p><p>b</p>", "div").unwrap();
        assert_eq!(e.outer_html(), "<div><p>a</p><p>b</p></div>");
        let e = element("text <b>x</b>", "section").unwrap();
        assert_eq!(e.outer_html(), "<section>text <b>x</b></section>");
        let e = element("", "div").unwrap();
        assert_eq!(e.outer_html(), "<div></div>");
        let e = element("<!--only-->", "div").unwrap();
        assert_eq!(e.outer_html(), "<div><!--only--></div>");
    }
}
