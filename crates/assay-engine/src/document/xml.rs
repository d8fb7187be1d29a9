//! Hand-rolled XML reader that keeps source spans.
//!
//! Full XML libraries discard the byte offsets the path generator needs to
//! map a text selection back to a node, so this reader builds the tree
//! itself. It accepts the subset that SOAP/REST payloads actually use:
//! elements, attributes, text, CDATA, comments, prolog and DOCTYPE. Anything
//! it cannot make sense of fails the whole parse; callers treat that as a
//! soft miss.

use super::{DocNode, Document, DocumentKind, Span};

/// Parse an XML document, returning None when it is not well-formed.
pub fn parse_xml(text: &str) -> Option<Document> {
    let mut parser = Parser {
        src: text,
        bytes: text.as_bytes(),
        pos: 0,
    };
    parser.skip_misc();
    let root_element = parser.parse_element()?;
    // Trailing comments/whitespace after the root are tolerated.
    let mut root = DocNode::new("", Span::new(0, text.len()));
    root.children.push(root_element);
    Some(Document {
        kind: DocumentKind::Xml,
        root,
    })
}

struct Parser<'a> {
    src: &'a str,
    bytes: &'a [u8],
    pos: usize,
}

impl<'a> Parser<'a> {
    fn peek(&self) -> Option<u8> {
        self.bytes.get(self.pos).copied()
    }

    fn starts_with(&self, prefix: &str) -> bool {
        self.src[self.pos..].starts_with(prefix)
    }

    fn skip_whitespace(&mut self) {
        while matches!(self.peek(), Some(b' ' | b'\t' | b'\r' | b'\n')) {
            self.pos += 1;
        }
    }

    /// Skip prolog, DOCTYPE, comments and whitespace before the root element.
    fn skip_misc(&mut self) {
        loop {
            self.skip_whitespace();
            if self.starts_with("<?") {
                if !self.skip_until("?>") {
                    return;
                }
            } else if self.starts_with("<!--") {
                if !self.skip_until("-->") {
                    return;
                }
            } else if self.starts_with("<!DOCTYPE") || self.starts_with("<!doctype") {
                if !self.skip_until(">") {
                    return;
                }
            } else {
                return;
            }
        }
    }

    /// Advance past the next occurrence of `marker`. False at end of input.
    fn skip_until(&mut self, marker: &str) -> bool {
        match self.src[self.pos..].find(marker) {
            Some(rel) => {
                self.pos += rel + marker.len();
                true
            }
            None => {
                self.pos = self.src.len();
                false
            }
        }
    }

    fn read_name(&mut self) -> Option<&'a str> {
        let start = self.pos;
        while let Some(b) = self.peek() {
            let ok = b.is_ascii_alphanumeric() || matches!(b, b':' | b'_' | b'-' | b'.');
            if !ok {
                break;
            }
            self.pos += 1;
        }
        if self.pos == start {
            return None;
        }
        let first = self.bytes[start];
        if first.is_ascii_alphabetic() || first == b'_' {
            Some(&self.src[start..self.pos])
        } else {
            None
        }
    }

    fn parse_element(&mut self) -> Option<DocNode> {
        let start = self.pos;
        if self.peek() != Some(b'<') {
            return None;
        }
        self.pos += 1;
        let name = self.read_name()?;
        let mut node = DocNode::new(name, Span::new(start, start));
        self.parse_attributes(&mut node)?;
        self.skip_whitespace();

        if self.starts_with("/>") {
            self.pos += 2;
            node.span.end = self.pos;
            return Some(node);
        }
        if self.peek() != Some(b'>') {
            return None;
        }
        self.pos += 1;

        let mut text_pieces = String::new();
        let mut text_extent: Option<Span> = None;

        loop {
            if self.pos >= self.bytes.len() {
                // Unclosed element.
                return None;
            }
            if self.starts_with("</") {
                self.pos += 2;
                let close = self.read_name()?;
                if close != name {
                    return None;
                }
                self.skip_whitespace();
                if self.peek() != Some(b'>') {
                    return None;
                }
                self.pos += 1;
                node.span.end = self.pos;
                if !text_pieces.is_empty() {
                    node.text = Some(text_pieces);
                    node.text_span = text_extent;
                }
                return Some(node);
            } else if self.starts_with("<!--") {
                self.pos += 4;
                if !self.skip_until("-->") {
                    return None;
                }
            } else if self.starts_with("<![CDATA[") {
                self.pos += 9;
                let piece_start = self.pos;
                if !self.skip_until("]]>") {
                    return None;
                }
                let piece_end = self.pos - 3;
                let piece = &self.src[piece_start..piece_end];
                if !piece.is_empty() {
                    text_pieces.push_str(piece);
                    widen(&mut text_extent, Span::new(piece_start, piece_end));
                }
            } else if self.starts_with("<?") {
                self.pos += 2;
                if !self.skip_until("?>") {
                    return None;
                }
            } else if self.peek() == Some(b'<') {
                let child = self.parse_element()?;
                node.children.push(child);
            } else {
                let run_start = self.pos;
                while self.peek().is_some() && self.peek() != Some(b'<') {
                    self.pos += 1;
                }
                let run = &self.src[run_start..self.pos];
                let trimmed = run.trim();
                if !trimmed.is_empty() {
                    let lead = run.len() - run.trim_start().len();
                    let piece_start = run_start + lead;
                    let piece_end = piece_start + trimmed.len();
                    text_pieces.push_str(&decode_entities(trimmed));
                    widen(&mut text_extent, Span::new(piece_start, piece_end));
                }
            }
        }
    }

    fn parse_attributes(&mut self, node: &mut DocNode) -> Option<()> {
        loop {
            self.skip_whitespace();
            match self.peek() {
                Some(b'>') | Some(b'/') => return Some(()),
                Some(_) => {}
                None => return None,
            }
            let name = self.read_name()?;
            self.skip_whitespace();
            if self.peek() != Some(b'=') {
                return None;
            }
            self.pos += 1;
            self.skip_whitespace();
            let quote = self.peek()?;
            if quote != b'"' && quote != b'\'' {
                return None;
            }
            self.pos += 1;
            let value_start = self.pos;
            while self.peek().is_some() && self.peek() != Some(quote) {
                self.pos += 1;
            }
            if self.peek() != Some(quote) {
                return None;
            }
            let value = decode_entities(&self.src[value_start..self.pos]);
            self.pos += 1;
            node.attributes.push((name.to_string(), value));
        }
    }
}

fn widen(extent: &mut Option<Span>, piece: Span) {
    *extent = Some(match extent {
        Some(s) => Span::new(s.start.min(piece.start), s.end.max(piece.end)),
        None => piece,
    });
}

/// Decode the predefined XML entities plus numeric character references.
/// Unknown entities pass through untouched.
fn decode_entities(text: &str) -> String {
    if !text.contains('&') {
        return text.to_string();
    }
    let mut out = String::with_capacity(text.len());
    let mut rest = text;
    while let Some(amp) = rest.find('&') {
        out.push_str(&rest[..amp]);
        rest = &rest[amp..];
        let semi = match rest.find(';') {
            Some(i) if i <= 10 => i,
            _ => {
                out.push('&');
                rest = &rest[1..];
                continue;
            }
        };
        let entity = &rest[1..semi];
        let decoded = match entity {
            "lt" => Some('<'),
            "gt" => Some('>'),
            "amp" => Some('&'),
            "apos" => Some('\''),
            "quot" => Some('"'),
            _ => entity
                .strip_prefix("#x")
                .or_else(|| entity.strip_prefix("#X"))
                .and_then(|hex| u32::from_str_radix(hex, 16).ok())
                .or_else(|| entity.strip_prefix('#').and_then(|d| d.parse().ok()))
                .and_then(char::from_u32),
        };
        match decoded {
            Some(c) => {
                out.push(c);
                rest = &rest[semi + 1..];
            }
            None => {
                out.push('&');
                rest = &rest[1..];
            }
        }
    }
    out.push_str(rest);
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    fn root_element(doc: &Document) -> &DocNode {
        &doc.root.children[0]
    }

    #[test]
    fn parses_simple_document() {
        let xml = "<root><name>John</name><age>30</age></root>";
        let doc = parse_xml(xml).unwrap();
        let root = root_element(&doc);
        assert_eq!(root.name, "root");
        assert_eq!(root.children.len(), 2);
        assert_eq!(root.children[0].name, "name");
        assert_eq!(root.children[0].text.as_deref(), Some("John"));
        assert_eq!(root.children[1].text.as_deref(), Some("30"));
    }

    #[test]
    fn records_source_spans() {
        let xml = "<root><name>John</name></root>";
        let doc = parse_xml(xml).unwrap();
        let root = root_element(&doc);
        assert_eq!(root.span, Span::new(0, xml.len()));
        let name = &root.children[0];
        assert_eq!(&xml[name.span.start..name.span.end], "<name>John</name>");
        let text = name.text_span.unwrap();
        assert_eq!(&xml[text.start..text.end], "John");
    }

    #[test]
    fn text_span_trims_surrounding_whitespace() {
        let xml = "<a>\n   hello  \n</a>";
        let doc = parse_xml(xml).unwrap();
        let a = root_element(&doc);
        assert_eq!(a.text.as_deref(), Some("hello"));
        let span = a.text_span.unwrap();
        assert_eq!(&xml[span.start..span.end], "hello");
    }

    #[test]
    fn keeps_namespace_prefixes_in_names() {
        let xml = r#"<soap:Envelope xmlns:soap="http://schemas.xmlsoap.org/soap/envelope/"><soap:Body/></soap:Envelope>"#;
        let doc = parse_xml(xml).unwrap();
        let envelope = root_element(&doc);
        assert_eq!(envelope.name, "soap:Envelope");
        assert_eq!(envelope.children[0].name, "soap:Body");
        assert_eq!(
            envelope.attribute("xmlns:soap"),
            Some("http://schemas.xmlsoap.org/soap/envelope/")
        );
    }

    #[test]
    fn parses_attributes_and_self_closing() {
        let xml = r#"<item id="4" label='x &amp; y'/>"#;
        let doc = parse_xml(xml).unwrap();
        let item = root_element(&doc);
        assert_eq!(item.attribute("id"), Some("4"));
        assert_eq!(item.attribute("label"), Some("x & y"));
        assert!(item.children.is_empty());
    }

    #[test]
    fn skips_prolog_doctype_and_comments() {
        let xml = "<?xml version=\"1.0\"?>\n<!DOCTYPE root>\n<!-- hi -->\n<root><!-- inner -->ok</root>";
        let doc = parse_xml(xml).unwrap();
        assert_eq!(root_element(&doc).text.as_deref(), Some("ok"));
    }

    #[test]
    fn cdata_is_text() {
        let xml = "<a><![CDATA[<raw> & text]]></a>";
        let doc = parse_xml(xml).unwrap();
        assert_eq!(root_element(&doc).text.as_deref(), Some("<raw> & text"));
    }

    #[test]
    fn decodes_entities_in_text() {
        let xml = "<a>1 &lt; 2 &#65;&#x42;</a>";
        let doc = parse_xml(xml).unwrap();
        assert_eq!(root_element(&doc).text.as_deref(), Some("1 < 2 AB"));
    }

    #[test]
    fn mixed_text_is_concatenated() {
        let xml = "<a>one<b>mid</b>two</a>";
        let doc = parse_xml(xml).unwrap();
        let a = root_element(&doc);
        assert_eq!(a.text.as_deref(), Some("onetwo"));
        assert_eq!(a.children[0].text.as_deref(), Some("mid"));
    }

    #[test]
    fn rejects_malformed_documents() {
        assert!(parse_xml("<root><unclosed>").is_none());
        assert!(parse_xml("<a></b>").is_none());
        assert!(parse_xml("no markup").is_none());
        assert!(parse_xml("").is_none());
    }
}
