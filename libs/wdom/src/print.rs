//! HTML serialisation.

use std::io::Write;
use anyhow::Result;

use crate::{meta::is_void_element, node::{Node, NodeKind}};

/// Escape for use in text content and in double-quoted attribute
/// values.
pub fn html_escape(s: &str, out: &mut Vec<u8>) {
    for b in s.as_bytes() {
        match b {
            b'&' => out.extend_from_slice(b"&amp;"),
            b'<' => out.extend_from_slice(b"&lt;"),
            b'>' => out.extend_from_slice(b"&gt;"),
            b'"' => out.extend_from_slice(b"&quot;"),
            b'\'' => out.extend_from_slice(b"&#39;"),
            _=> out.push(*b)
        }
    }
}

pub fn html_escape_string(s: &str) -> String {
    let mut v = Vec::with_capacity(s.len());
    html_escape(s, &mut v);
    // Safe because only ASCII was inserted in between the bytes of a
    // str, at char boundaries.
    unsafe { String::from_utf8_unchecked(v) }
}

pub trait Print {
    /// Print serialized HTML.
    fn print_html_fragment(&self, out: &mut impl Write) -> Result<()>;

    fn to_html_fragment_string(&self) -> String {
        let mut s = Vec::new();
        self.print_html_fragment(&mut s).expect("no I/O errors can happen");
        // Everything written derives from str values and ASCII
        // literals.
        String::from_utf8(s).expect("serialisation yields UTF-8")
    }
}

impl Print for (&str, &str) {
    fn print_html_fragment(&self, out: &mut impl Write) -> Result<()> {
        out.write_all(self.0.as_bytes())?; // names come from the parser or set_attribute
        out.write_all(b"=\"")?;
        let mut v = Vec::new();
        html_escape(self.1, &mut v);
        out.write_all(&v)?;
        out.write_all(b"\"")?;
        Ok(())
    }
}

impl Print for Node {
    fn print_html_fragment(&self, out: &mut impl Write) -> Result<()> {
        match self.kind() {
            NodeKind::Element => {
                let tag_name = self.tag_name().expect("is an element");
                out.write_all(b"<")?;
                out.write_all(tag_name.as_bytes())?;
                for (k, v) in self.attributes() {
                    out.write_all(b" ")?;
                    (k.as_str(), v.as_str()).print_html_fragment(out)?;
                }
                out.write_all(b">")?;
                if is_void_element(&tag_name) {
                    return Ok(())
                }
                for child in self.children() {
                    child.print_html_fragment(out)?;
                }
                out.write_all(b"</")?;
                out.write_all(tag_name.as_bytes())?;
                out.write_all(b">")?;
            }
            NodeKind::Text => {
                let mut v = Vec::new();
                html_escape(&self.node_value().expect("is a text node"), &mut v);
                out.write_all(&v)?;
            }
            NodeKind::Comment => {
                out.write_all(b"<!--")?;
                out.write_all(self.node_value().expect("is a comment").as_bytes())?;
                out.write_all(b"-->")?;
            }
        }
        Ok(())
    }
}

impl Print for [Node] {
    fn print_html_fragment(&self, out: &mut impl Write) -> Result<()> {
        for node in self {
            node.print_html_fragment(out)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn t_html_escape() {
        assert_eq!(html_escape_string(r#"a<b & "c" 'd'>"#),
                   "a&lt;b &amp; &quot;c&quot; &#39;d&#39;&gt;");
        assert_eq!(html_escape_string("Zürich"), "Zürich");
    }

    #[test]
    fn t_print() {
        let div = Node::element("div");
        div.set_attribute("title", "1 < 2").unwrap();
        div.append_child(&Node::text("a & b")).unwrap();
        div.append_child(&Node::element("br")).unwrap();
        div.append_child(&Node::comment(" note ")).unwrap();
        assert_eq!(div.to_html_fragment_string(),
                   r#"<div title="1 &lt; 2">a &amp; b<br><!-- note --></div>"#);
        let nodes = [Node::text("x"), Node::element("i")];
        assert_eq!(nodes[..].to_html_fragment_string(), "x<i></i>");
    }
}
