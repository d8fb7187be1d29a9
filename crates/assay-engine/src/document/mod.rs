//! Span-retaining document trees for XML and JSON payloads.
//!
//! Both the path evaluator and the path generator work against the same
//! addressable tree: element/value nodes with ordered children, attributes,
//! and the byte span each node occupies in the source text. Ordered children
//! are what make positional predicates like `[2]` meaningful; spans are what
//! make offset-to-path synthesis possible.
//!
//! JSON documents are mapped onto the same shape the XML side produces:
//! an object member becomes a named child, and an array under a key becomes
//! a run of same-named siblings (the same duality XML-to-object converters
//! use for repeated tags). One tree walk then serves both formats.

mod json;
mod xml;

pub use json::parse_json;
pub use xml::parse_xml;

use serde::{Deserialize, Serialize};

/// Byte range `[start, end)` a node occupies in the source text.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Span {
    pub start: usize,
    pub end: usize,
}

impl Span {
    pub fn new(start: usize, end: usize) -> Self {
        Span { start, end }
    }

    pub fn contains(&self, offset: usize) -> bool {
        self.start <= offset && offset < self.end
    }
}

/// A node in the addressable tree.
///
/// For XML this is an element: `name` is the tag as written (prefix kept),
/// `text` is the concatenation of its trimmed direct text pieces. For JSON,
/// `name` is the member key (empty for items of an unkeyed array) and `text`
/// is the scalar rendering for leaves; objects and arrays carry no text.
#[derive(Debug, Clone)]
pub struct DocNode {
    pub name: String,
    pub text: Option<String>,
    pub attributes: Vec<(String, String)>,
    pub children: Vec<DocNode>,
    /// Full extent of the node in the source.
    pub span: Span,
    /// Extent of the node's own text content, when it has any.
    pub text_span: Option<Span>,
}

impl DocNode {
    pub(crate) fn new(name: impl Into<String>, span: Span) -> Self {
        DocNode {
            name: name.into(),
            text: None,
            attributes: Vec::new(),
            children: Vec::new(),
            span,
            text_span: None,
        }
    }

    /// Attribute lookup: exact name first, then local-name match.
    pub fn attribute(&self, name: &str) -> Option<&str> {
        if let Some((_, v)) = self.attributes.iter().find(|(k, _)| k == name) {
            return Some(v.as_str());
        }
        let local = local_name(name);
        self.attributes
            .iter()
            .find(|(k, _)| local_name(k) == local)
            .map(|(_, v)| v.as_str())
    }
}

/// Serialization format of a document body.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum DocumentKind {
    #[default]
    Xml,
    Json,
}

/// A parsed document: the format it came in plus a virtual root whose
/// children are the addressable top-level nodes (the root element for XML,
/// the root object's members for JSON).
#[derive(Debug, Clone)]
pub struct Document {
    pub kind: DocumentKind,
    pub root: DocNode,
}

impl Document {
    /// Parse with an explicit format. Returns None when the text is not a
    /// well-formed document of that format; resolution failures are always
    /// soft at this layer.
    pub fn parse_as(text: &str, kind: DocumentKind) -> Option<Document> {
        match kind {
            DocumentKind::Xml => parse_xml(text),
            DocumentKind::Json => parse_json(text),
        }
    }

    /// Parse, sniffing the format from the first significant byte.
    pub fn parse(text: &str) -> Option<Document> {
        match sniff_kind(text)? {
            DocumentKind::Xml => parse_xml(text),
            DocumentKind::Json => parse_json(text),
        }
    }
}

/// Guess the document format from its first significant character.
pub fn sniff_kind(text: &str) -> Option<DocumentKind> {
    match text.trim_start().bytes().next()? {
        b'<' => Some(DocumentKind::Xml),
        b'{' | b'[' | b'"' => Some(DocumentKind::Json),
        b't' | b'f' | b'n' | b'-' | b'0'..=b'9' => Some(DocumentKind::Json),
        _ => None,
    }
}

/// The part of a name after the last namespace prefix separator.
pub fn local_name(name: &str) -> &str {
    match name.rsplit_once(':') {
        Some((_, local)) => local,
        None => name,
    }
}

/// Namespace-agnostic name match, in the order the evaluator promises:
/// exact key, then bare local name, then any key ending in `:localName`.
pub fn name_matches(key: &str, step: &str) -> bool {
    if key == step {
        return true;
    }
    let local = local_name(step);
    key == local || (key.len() > local.len() && key.ends_with(local) && {
        let prefix_end = key.len() - local.len();
        key.as_bytes()[prefix_end - 1] == b':'
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn local_name_strips_prefix() {
        assert_eq!(local_name("soap:Body"), "Body");
        assert_eq!(local_name("Body"), "Body");
        assert_eq!(local_name("a:b:c"), "c");
    }

    #[test]
    fn name_matching_is_namespace_agnostic() {
        assert!(name_matches("soap:Body", "soap:Body"));
        assert!(name_matches("Body", "soap:Body"));
        assert!(name_matches("env:Body", "soap:Body"));
        assert!(name_matches("soap:Body", "Body"));
        assert!(name_matches("Body", "Body"));
        assert!(!name_matches("NotBody", "Body"));
        assert!(!name_matches("symBody", "Body"));
    }

    #[test]
    fn sniffs_format_from_leading_byte() {
        assert_eq!(sniff_kind("  <root/>"), Some(DocumentKind::Xml));
        assert_eq!(sniff_kind("{\"a\":1}"), Some(DocumentKind::Json));
        assert_eq!(sniff_kind("[1,2]"), Some(DocumentKind::Json));
        assert_eq!(sniff_kind("true"), Some(DocumentKind::Json));
        assert_eq!(sniff_kind("-12"), Some(DocumentKind::Json));
        assert_eq!(sniff_kind("plain text"), None);
        assert_eq!(sniff_kind(""), None);
    }

    #[test]
    fn span_containment_is_half_open() {
        let span = Span::new(2, 5);
        assert!(!span.contains(1));
        assert!(span.contains(2));
        assert!(span.contains(4));
        assert!(!span.contains(5));
    }
}
