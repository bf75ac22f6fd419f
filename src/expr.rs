//! Markup generating expressions: a list of literal markup, literal
//! text and path lookup segments, interpreted against a scope.

use itertools::Itertools;
use kstring::KString;

use wdom::html_escape_string;
use webi_util::nowarn as warn;

use crate::observable::Observable;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Segment {
    /// Emitted as is.
    Markup(KString),
    /// Escaped when generating markup.
    Text(KString),
    /// `scope.get(path, "")`, escaped when generating markup.
    Lookup(KString),
}

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Expr(Vec<Segment>);

impl Expr {
    pub fn new() -> Expr {
        Expr(Vec::new())
    }

    pub fn markup(s: &str) -> Expr {
        let mut e = Expr::new();
        e.push(Segment::Markup(KString::from_ref(s)));
        e
    }

    pub fn text(s: &str) -> Expr {
        let mut e = Expr::new();
        e.push(Segment::Text(KString::from_ref(s)));
        e
    }

    pub fn lookup(path: &str) -> Expr {
        Expr(vec![Segment::Lookup(KString::from_ref(path))])
    }

    /// Appends `segment`, dropping empty literals and merging a literal
    /// into a preceding one of the same kind.
    pub fn push(&mut self, segment: Segment) {
        match &segment {
            Segment::Markup(s) | Segment::Text(s) if s.is_empty() => return,
            _ => (),
        }
        if let Some(last) = self.0.last_mut() {
            match (last, &segment) {
                (Segment::Markup(a), Segment::Markup(b))
                    | (Segment::Text(a), Segment::Text(b)) =>
                {
                    let mut joined = a.to_string();
                    joined.push_str(b);
                    *a = KString::from_string(joined);
                    return
                }
                _ => (),
            }
        }
        self.0.push(segment);
    }

    pub fn append(&mut self, other: Expr) {
        for segment in other.0 {
            self.push(segment);
        }
    }

    pub fn concat(exprs: impl IntoIterator<Item = Expr>) -> Expr {
        let mut e = Expr::new();
        for other in exprs {
            e.append(other);
        }
        e
    }

    pub fn segments(&self) -> &[Segment] {
        &self.0
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn has_lookups(&self) -> bool {
        self.0.iter().any(|s| matches!(s, Segment::Lookup(_)))
    }

    /// The paths looked up, each once, in order of first use.
    pub fn variables(&self) -> Vec<KString> {
        self.0.iter().filter_map(|s| match s {
            Segment::Lookup(path) => Some(path.clone()),
            _ => None,
        }).unique().collect()
    }

    fn lookup_string(scope: &Observable, path: &str) -> String {
        scope.get(path, "").to_string()
    }

    /// The markup for `scope`.
    pub fn render_markup(&self, scope: &Observable) -> String {
        let mut out = String::new();
        for segment in &self.0 {
            match segment {
                Segment::Markup(s) => out.push_str(s),
                Segment::Text(s) => out.push_str(&html_escape_string(s)),
                Segment::Lookup(path) =>
                    out.push_str(&html_escape_string(&Self::lookup_string(scope, path))),
            }
        }
        out
    }

    /// The unescaped string for `scope`, as assigned to text nodes and
    /// attribute values on updates.
    pub fn render_text(&self, scope: &Observable) -> String {
        let mut out = String::new();
        for segment in &self.0 {
            match segment {
                Segment::Markup(s) | Segment::Text(s) => out.push_str(s),
                Segment::Lookup(path) => out.push_str(&Self::lookup_string(scope, path)),
            }
        }
        out
    }
}

fn find_from(s: &str, pos: usize, needle: &str) -> Option<usize> {
    (&s[pos..]).find(needle).map(|p| p + pos)
}

fn is_path_start(c: u8) -> bool {
    c.is_ascii_alphabetic() || c == b'_'
}

fn is_path_character(c: u8) -> bool {
    c.is_ascii_alphanumeric() || c == b'_' || c == b'-' || c == b'.'
}

/// If a `{{path}}` starts at `pos` in `s`, the path and the position
/// after the closing braces.
fn inline_expression_at(s: &str, pos: usize) -> Option<(&str, usize)> {
    let start = pos + 2;
    let bytes = s.as_bytes();
    if !is_path_start(*bytes.get(start)?) {
        return None
    }
    let len = bytes[start..].iter().take_while(|c| is_path_character(**c)).count();
    let end = start + len;
    if (&s[end..]).starts_with("}}") {
        Some((&s[start..end], end + 2))
    } else {
        None
    }
}

/// Splits `s` into text literals and `{{path}}` lookups.
pub fn text_expression(s: &str) -> Expr {
    let mut expr = Expr::new();
    let mut pos_done = 0;
    let mut pos_remainder = 0;
    while let Some(pos) = find_from(s, pos_remainder, "{{") {
        if let Some((path, pos_after)) = inline_expression_at(s, pos) {
            warn!("found lookup {path:?} at {pos}");
            expr.push(Segment::Text(KString::from_ref(&s[pos_done..pos])));
            expr.push(Segment::Lookup(KString::from_ref(path)));
            pos_done = pos_after;
            pos_remainder = pos_after;
        } else {
            // "{{{x}}}" still contains "{{x}}" one further
            pos_remainder = pos + 1;
        }
    }
    expr.push(Segment::Text(KString::from_ref(&s[pos_done..])));
    expr
}

/// `name="value"`
pub fn default_attribute_expression(name: &str, value: &Expr) -> Expr {
    let mut e = Expr::markup(name);
    e.push(Segment::Markup("=\"".into()));
    e.append(value.clone());
    e.push(Segment::Markup("\"".into()));
    e
}

/// `<tag attr...>body</tag>`, or `<tag attr.../>` for an empty body.
pub fn default_tag_expression(tag_name: &str, attributes: &[Expr], body: &Expr) -> Expr {
    let mut e = Expr::markup("<");
    e.push(Segment::Markup(KString::from_ref(tag_name)));
    for attribute in attributes {
        e.push(Segment::Markup(" ".into()));
        e.append(attribute.clone());
    }
    if body.is_empty() {
        e.push(Segment::Markup("/>".into()));
    } else {
        e.push(Segment::Markup(">".into()));
        e.append(body.clone());
        e.push(Segment::Markup(format!("</{tag_name}>").into()));
    }
    e
}

/// The comment standing in for a scoped node.
pub fn placeholder_expression(placeholder: &str) -> Expr {
    Expr::markup(&format!("<!--{placeholder}-->"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn lookups(s: &str) -> Vec<String> {
        text_expression(s).variables().iter().map(|v| v.to_string()).collect()
    }

    #[test]
    fn t_scan() {
        assert_eq!(lookups("{{a}} {{b.c-d_e.0}}{{a}}"), ["a", "b.c-d_e.0"]);
        assert!(lookups("{{ a }} {{0a}} {{a b}} {{}} {a} {{a}").is_empty());
        assert_eq!(lookups("{{{x}}}"), ["x"]);
        assert_eq!(lookups("{{Name}}"), ["Name"]);
        let e = text_expression("a {{x}}{{y}} b");
        assert_eq!(e.segments(), &[Segment::Text("a ".into()),
                                   Segment::Lookup("x".into()),
                                   Segment::Lookup("y".into()),
                                   Segment::Text(" b".into())]);
        assert!(!text_expression("plain {{ text").has_lookups());
        assert!(text_expression("").is_empty());
    }

    #[test]
    fn t_render() {
        let scope = Observable::from_json(json!({"x": "<b>", "n": 2})).unwrap();
        let e = Expr::concat([Expr::markup("<i>"), text_expression("{{x}} & {{n}}{{none}}"),
                              Expr::markup("</i>")]);
        assert_eq!(e.render_markup(&scope), "<i>&lt;b&gt; &amp; 2</i>");
        assert_eq!(e.render_text(&scope), "<i><b> & 2</i>");
    }

    #[test]
    fn t_default_formatters() {
        let scope = Observable::new();
        let att = default_attribute_expression("class", &text_expression("a\"b"));
        let tag = default_tag_expression("div", &[att.clone(), att], &Expr::new());
        assert_eq!(tag.render_markup(&scope), r#"<div class="a&quot;b" class="a&quot;b"/>"#);
        let tag = default_tag_expression("p", &[], &Expr::text("x"));
        assert_eq!(tag.render_markup(&scope), "<p>x</p>");
        // literals are merged
        assert_eq!(tag.segments().len(), 3);
        assert_eq!(placeholder_expression("scoped").render_markup(&scope), "<!--scoped-->");
    }
}
