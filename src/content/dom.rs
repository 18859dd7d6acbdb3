//! Owned, mutable element tree.
//!
//! `scraper`'s documents are read-only, but pruning removes subtrees and
//! needs per-node text and markup lengths computed on what remains. Pages are
//! copied once into this small tree, with comments and unwanted tags dropped
//! on the way in.

use scraper::{ElementRef, Html, Node, Selector};

#[derive(Debug, Clone, PartialEq)]
pub enum DomNode {
    Element(DomElement),
    Text(String),
}

#[derive(Debug, Clone, PartialEq)]
pub struct DomElement {
    pub name: String,
    pub attrs: Vec<(String, String)>,
    pub children: Vec<DomNode>,
}

/// Tags that never carry article text.
pub const NON_CONTENT_TAGS: &[&str] = &["script", "style", "noscript", "template", "head"];

/// Parse `html` and return its `<body>` (or the root element for fragments
/// without one). Elements named in `skip` are dropped along with their
/// subtrees; comments are always dropped.
pub fn parse_body(html: &str, skip: &[&str]) -> DomElement {
    let document = Html::parse_document(html);
    let body = Selector::parse("body")
        .ok()
        .and_then(|sel| document.select(&sel).next())
        .unwrap_or_else(|| document.root_element());
    convert(body, skip)
}

fn convert(el: ElementRef<'_>, skip: &[&str]) -> DomElement {
    let mut children = Vec::new();
    for child in el.children() {
        match child.value() {
            Node::Text(text) => {
                let text: &str = text;
                children.push(DomNode::Text(text.to_string()));
            }
            Node::Element(element) => {
                if skip.contains(&element.name()) {
                    continue;
                }
                if let Some(child_ref) = ElementRef::wrap(child) {
                    children.push(DomNode::Element(convert(child_ref, skip)));
                }
            }
            _ => {}
        }
    }

    DomElement {
        name: el.value().name().to_string(),
        attrs: el
            .value()
            .attrs()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect(),
        children,
    }
}

impl DomElement {
    pub fn attr(&self, name: &str) -> Option<&str> {
        self.attrs
            .iter()
            .find(|(k, _)| k == name)
            .map(|(_, v)| v.as_str())
    }

    /// Child elements, skipping text nodes.
    pub fn elements(&self) -> impl Iterator<Item = &DomElement> {
        self.children.iter().filter_map(|c| match c {
            DomNode::Element(e) => Some(e),
            DomNode::Text(_) => None,
        })
    }

    /// Concatenated descendant text.
    pub fn text(&self) -> String {
        let mut out = String::new();
        self.collect_text(&mut out);
        out
    }

    fn collect_text(&self, out: &mut String) {
        for child in &self.children {
            match child {
                DomNode::Text(t) => out.push_str(t),
                DomNode::Element(e) => e.collect_text(out),
            }
        }
    }

    /// Descendant text with every text node trimmed and joined without a
    /// separator.
    pub fn stripped_text(&self) -> String {
        let mut out = String::new();
        self.collect_stripped(&mut out);
        out
    }

    fn collect_stripped(&self, out: &mut String) {
        for child in &self.children {
            match child {
                DomNode::Text(t) => out.push_str(t.trim()),
                DomNode::Element(e) => e.collect_stripped(out),
            }
        }
    }

    /// Length in characters of the markup inside this element.
    pub fn inner_html_len(&self) -> usize {
        let mut out = String::new();
        for child in &self.children {
            child.write_html(&mut out);
        }
        out.chars().count()
    }

    pub fn to_html(&self) -> String {
        let mut out = String::new();
        self.write_html(&mut out);
        out
    }

    fn write_html(&self, out: &mut String) {
        out.push('<');
        out.push_str(&self.name);
        for (k, v) in &self.attrs {
            out.push(' ');
            out.push_str(k);
            out.push_str("=\"");
            out.push_str(&v.replace('&', "&amp;").replace('"', "&quot;"));
            out.push('"');
        }
        out.push('>');
        if is_void(&self.name) {
            return;
        }
        for child in &self.children {
            child.write_html(out);
        }
        out.push_str("</");
        out.push_str(&self.name);
        out.push('>');
    }
}

impl DomNode {
    fn write_html(&self, out: &mut String) {
        match self {
            DomNode::Text(t) => out.push_str(
                &t.replace('&', "&amp;")
                    .replace('<', "&lt;")
                    .replace('>', "&gt;"),
            ),
            DomNode::Element(e) => e.write_html(out),
        }
    }
}

fn is_void(name: &str) -> bool {
    matches!(
        name,
        "area" | "base" | "br" | "col" | "embed" | "hr" | "img" | "input" | "link" | "meta"
            | "source" | "track" | "wbr"
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_body_drops_comments_and_skipped_tags() {
        let body = parse_body(
            "<html><head><title>x</title></head><body><!-- note --><script>var a;</script><p>Hi <b>there</b></p></body></html>",
            NON_CONTENT_TAGS,
        );
        assert_eq!(body.name, "body");
        assert_eq!(body.elements().count(), 1);
        assert_eq!(body.text(), "Hi there");
        assert_eq!(body.to_html(), "<body><p>Hi <b>there</b></p></body>");
    }

    #[test]
    fn test_stripped_text_and_lengths() {
        let body = parse_body("<body><div>  a  <span> b </span></div></body>", &[]);
        let div = body.elements().next().unwrap();
        assert_eq!(div.stripped_text(), "ab");
        assert_eq!(div.inner_html_len(), "  a  <span> b </span>".chars().count());
    }
}
