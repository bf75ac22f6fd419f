//! Addresses of nodes relative to a root, valid across two parses of
//! equivalent markup.
//!
//! The string form is a `/`-separated list of `name[index]` segments,
//! where name is the lowercase tag name, `#text` or `#comment`, and
//! index is the position among all children of the parent. The root
//! itself has the empty path.

use std::{fmt::Display, str::FromStr};
use anyhow::Result;
use kstring::KString;

use wdom::{Node, NodeKind};

use crate::error::{webi_error, WebiError, WebiErrorKind};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SegmentKind {
    Element(KString),
    Text,
    Comment,
}

impl SegmentKind {
    pub fn of(node: &Node) -> SegmentKind {
        match node.kind() {
            NodeKind::Element => SegmentKind::Element(node.node_name()),
            NodeKind::Text => SegmentKind::Text,
            NodeKind::Comment => SegmentKind::Comment,
        }
    }

    pub fn matches(&self, node: &Node) -> bool {
        *self == SegmentKind::of(node)
    }

    pub fn name(&self) -> &str {
        match self {
            SegmentKind::Element(tag) => tag,
            SegmentKind::Text => "#text",
            SegmentKind::Comment => "#comment",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PathSegment {
    pub kind: SegmentKind,
    pub index: usize,
}

impl Display for PathSegment {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}[{}]", self.kind.name(), self.index)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct NodePath(Vec<PathSegment>);

impl NodePath {
    /// The path from `root` down to `node`; fails if `node` is not
    /// `root` or one of its descendants.
    pub fn of(node: &Node, root: &Node) -> Result<NodePath> {
        let mut segments = Vec::new();
        let mut current = node.clone();
        while !current.ptr_eq(root) {
            let index = current.index_in_parent().ok_or_else(
                || webi_error(WebiErrorKind::InvalidArgument(
                    format!("{current:?} is not inside the root node {root:?}"))))?;
            segments.push(PathSegment { kind: SegmentKind::of(&current), index });
            // index_in_parent succeeded, so there is a parent
            current = match current.parent() {
                Some(p) => p,
                None => break,
            };
        }
        segments.reverse();
        Ok(NodePath(segments))
    }

    pub fn segments(&self) -> &[PathSegment] {
        &self.0
    }

    pub fn is_root(&self) -> bool {
        self.0.is_empty()
    }

    pub fn last(&self) -> Option<&PathSegment> {
        self.0.last()
    }

    fn not_found(&self, segment: &PathSegment, reason: &'static str) -> anyhow::Error {
        webi_error(WebiErrorKind::NodeNotFound {
            path: self.to_string(),
            segment: segment.to_string(),
            index: segment.index,
            reason,
        })
    }

    fn find_from(&self, root: &Node, segments: &[PathSegment]) -> Result<Node> {
        let mut current = root.clone();
        for segment in segments {
            let child = current.child(segment.index).ok_or_else(
                || self.not_found(segment, "no child"))?;
            if !segment.kind.matches(&child) {
                return Err(self.not_found(segment, "different node kind or tag"))
            }
            current = child;
        }
        Ok(current)
    }

    /// Replays the path below `root`. Both a missing child and one of
    /// a different kind or tag are `NodeNotFound` errors.
    pub fn find_node(&self, root: &Node) -> Result<Node> {
        self.find_from(root, &self.0)
    }

    /// For a path ending in a text segment: inserts an empty text node
    /// at the recorded index of the (existing) parent and returns it.
    /// Parsing drops empty text, this puts it back.
    pub fn restore_text_node(&self, root: &Node) -> Result<Node> {
        let (last, init) = match self.0.split_last() {
            Some((last @ PathSegment { kind: SegmentKind::Text, .. }, init)) => (last, init),
            Some((last, _)) => return Err(self.not_found(last, "not a text node path")),
            None => return Err(webi_error(WebiErrorKind::InvalidArgument(
                "cannot restore the root as a text node".into()))),
        };
        let parent = self.find_from(root, init)?;
        if last.index > parent.child_count() {
            return Err(self.not_found(last, "no child"))
        }
        let text = Node::text("");
        parent.insert_child(last.index, &text)?;
        Ok(text)
    }
}

impl Display for NodePath {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        for (i, segment) in self.0.iter().enumerate() {
            if i > 0 {
                f.write_str("/")?;
            }
            Display::fmt(segment, f)?;
        }
        Ok(())
    }
}

fn parse_segment(path: &str, s: &str) -> Result<PathSegment, WebiError> {
    let malformed = || WebiError::from(WebiErrorKind::MalformedNodePath {
        path: path.into(),
        segment: s.into(),
    });
    let (name, rest) = s.split_once('[').ok_or_else(malformed)?;
    let index = rest.strip_suffix(']').ok_or_else(malformed)?;
    if index.is_empty() || !index.bytes().all(|b| b.is_ascii_digit()) {
        return Err(malformed())
    }
    let index: usize = index.parse().map_err(|_| malformed())?;
    let kind = match name {
        "#text" => SegmentKind::Text,
        "#comment" => SegmentKind::Comment,
        _ => {
            let mut cs = name.chars();
            let valid = cs.next().map_or(false, |c| c.is_ascii_alphabetic())
                && cs.all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_');
            if !valid {
                return Err(malformed())
            }
            SegmentKind::Element(KString::from_string(name.to_ascii_lowercase()))
        }
    };
    Ok(PathSegment { kind, index })
}

impl FromStr for NodePath {
    type Err = WebiError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if s.is_empty() {
            return Ok(NodePath::default())
        }
        s.split('/').map(|seg| parse_segment(s, seg)).collect::<Result<_, _>>().map(NodePath)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::webi_error_kind;

    #[test]
    fn t_roundtrip_through_reparse() {
        let src = "<div><p>a<b>x</b><!--c--></p>tail<i></i></div>";
        let root = wdom::element(src, "div").unwrap();
        let again = wdom::element(&root.outer_html(), "div").unwrap();
        let mut paths = Vec::new();
        root.walk(&mut |n| paths.push(NodePath::of(n, &root).unwrap()));
        assert_eq!(paths.len(), 8);
        for path in &paths {
            let a = path.find_node(&root).unwrap();
            let b = path.find_node(&again).unwrap();
            assert_eq!(a.outer_html(), b.outer_html());
            let reparsed: NodePath = path.to_string().parse().unwrap();
            assert_eq!(&reparsed, path);
        }
        assert_eq!(paths[5].to_string(), "p[0]/#comment[2]");
        assert!(paths[0].is_root());
    }

    #[test]
    fn t_malformed() {
        for bad in ["div", "div[x]", "div[1", "[1]", "div[1]/", "div[-1]", "#foo[0]"] {
            let err = bad.parse::<NodePath>().unwrap_err();
            assert!(matches!(err.kind(), WebiErrorKind::MalformedNodePath { .. }), "{bad}");
        }
        let p: NodePath = "DIV[0]/#text[2]".parse().unwrap();
        assert_eq!(p.to_string(), "div[0]/#text[2]");
    }

    #[test]
    fn t_not_found() {
        let root = wdom::element("<div><span>x</span></div>", "div").unwrap();
        for path in ["p[0]", "span[1]", "span[0]/#comment[0]"] {
            let p: NodePath = path.parse().unwrap();
            let err = p.find_node(&root).unwrap_err();
            assert!(matches!(webi_error_kind(&err), Some(WebiErrorKind::NodeNotFound { .. })),
                    "{path}");
        }
    }

    #[test]
    fn t_restore_text_node() {
        let root = wdom::element("<div><b>1</b><i>2</i></div>", "div").unwrap();
        let p: NodePath = "#text[1]".parse().unwrap();
        assert!(p.find_node(&root).is_err());
        let t = p.restore_text_node(&root).unwrap();
        assert!(p.find_node(&root).unwrap().ptr_eq(&t));
        assert_eq!(root.child_count(), 3);
        let p: NodePath = "b[0]".parse().unwrap();
        assert!(p.restore_text_node(&root).is_err());
    }
}
