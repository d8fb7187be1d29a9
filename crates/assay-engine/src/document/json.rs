//! Hand-rolled JSON reader that keeps source spans.
//!
//! The tree it produces deliberately mirrors what XML-to-object conversion
//! does in reverse: an object member becomes a named child, and an array
//! under a key becomes a run of same-named siblings. Positional predicates
//! and the namespace-agnostic walk then behave identically for both
//! formats. Scalar leaves keep their raw lexeme as the node text (numbers
//! render exactly as written).

use super::{DocNode, Document, DocumentKind, Span};

/// Parse a JSON document, returning None when it is not well-formed.
pub fn parse_json(text: &str) -> Option<Document> {
    let mut parser = Parser {
        src: text,
        bytes: text.as_bytes(),
        pos: 0,
    };
    parser.skip_whitespace();
    let value = parser.parse_value()?;
    parser.skip_whitespace();
    if parser.pos != parser.bytes.len() {
        return None;
    }

    let mut root = DocNode::new("", Span::new(0, text.len()));
    match value {
        Parsed::Object { children, .. } => root.children = children,
        array @ Parsed::Array { .. } => attach("", array, None, &mut root.children),
        Parsed::Scalar {
            text: scalar,
            text_span,
            ..
        } => {
            root.text = scalar;
            root.text_span = text_span;
        }
    }
    Some(Document {
        kind: DocumentKind::Json,
        root,
    })
}

/// Intermediate value shape before it is flattened into `DocNode`s.
enum Parsed {
    Scalar {
        text: Option<String>,
        span: Span,
        text_span: Option<Span>,
    },
    Object {
        children: Vec<DocNode>,
        span: Span,
    },
    Array {
        items: Vec<Parsed>,
        span: Span,
    },
}

/// Flatten a parsed value into nodes named `name`.
///
/// `member_start` widens a scalar/object node's span back to the member key
/// so that a selection on the key addresses its value. Array items keep
/// their own spans; an item that is itself an array becomes one node whose
/// children are the anonymous inner items.
fn attach(name: &str, parsed: Parsed, member_start: Option<usize>, out: &mut Vec<DocNode>) {
    match parsed {
        Parsed::Scalar {
            text,
            mut span,
            text_span,
        } => {
            if let Some(start) = member_start {
                span.start = start;
            }
            let mut node = DocNode::new(name, span);
            node.text = text;
            node.text_span = text_span;
            out.push(node);
        }
        Parsed::Object { children, mut span } => {
            if let Some(start) = member_start {
                span.start = start;
            }
            let mut node = DocNode::new(name, span);
            node.children = children;
            out.push(node);
        }
        Parsed::Array { items, .. } => {
            for item in items {
                match item {
                    Parsed::Array {
                        items: inner,
                        span,
                    } => {
                        let mut node = DocNode::new(name, span);
                        attach("", Parsed::Array { items: inner, span }, None, &mut node.children);
                        out.push(node);
                    }
                    other => attach(name, other, None, out),
                }
            }
        }
    }
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

    fn skip_whitespace(&mut self) {
        while matches!(self.peek(), Some(b' ' | b'\t' | b'\r' | b'\n')) {
            self.pos += 1;
        }
    }

    fn parse_value(&mut self) -> Option<Parsed> {
        match self.peek()? {
            b'{' => self.parse_object(),
            b'[' => self.parse_array(),
            b'"' => {
                let start = self.pos;
                let (value, content) = self.parse_string()?;
                Some(Parsed::Scalar {
                    text: Some(value),
                    span: Span::new(start, self.pos),
                    text_span: Some(content),
                })
            }
            b't' => self.parse_literal("true", Some("true")),
            b'f' => self.parse_literal("false", Some("false")),
            b'n' => self.parse_literal("null", None),
            b'-' | b'0'..=b'9' => self.parse_number(),
            _ => None,
        }
    }

    fn parse_literal(&mut self, literal: &str, text: Option<&str>) -> Option<Parsed> {
        if !self.src[self.pos..].starts_with(literal) {
            return None;
        }
        let span = Span::new(self.pos, self.pos + literal.len());
        self.pos += literal.len();
        Some(Parsed::Scalar {
            text: text.map(str::to_string),
            span,
            text_span: text.map(|_| span),
        })
    }

    fn parse_number(&mut self) -> Option<Parsed> {
        let start = self.pos;
        if self.peek() == Some(b'-') {
            self.pos += 1;
        }
        let digits = self.consume_digits();
        if digits == 0 {
            return None;
        }
        if self.peek() == Some(b'.') {
            self.pos += 1;
            if self.consume_digits() == 0 {
                return None;
            }
        }
        if matches!(self.peek(), Some(b'e' | b'E')) {
            self.pos += 1;
            if matches!(self.peek(), Some(b'+' | b'-')) {
                self.pos += 1;
            }
            if self.consume_digits() == 0 {
                return None;
            }
        }
        let span = Span::new(start, self.pos);
        Some(Parsed::Scalar {
            text: Some(self.src[start..self.pos].to_string()),
            span,
            text_span: Some(span),
        })
    }

    fn consume_digits(&mut self) -> usize {
        let start = self.pos;
        while matches!(self.peek(), Some(b'0'..=b'9')) {
            self.pos += 1;
        }
        self.pos - start
    }

    /// Parse a string; returns (decoded value, span of the content between
    /// the quotes).
    fn parse_string(&mut self) -> Option<(String, Span)> {
        if self.peek() != Some(b'"') {
            return None;
        }
        self.pos += 1;
        let content_start = self.pos;
        let mut value = String::new();
        loop {
            match self.peek()? {
                b'"' => {
                    let content = Span::new(content_start, self.pos);
                    self.pos += 1;
                    return Some((value, content));
                }
                b'\\' => {
                    self.pos += 1;
                    let escaped = self.peek()?;
                    self.pos += 1;
                    match escaped {
                        b'"' => value.push('"'),
                        b'\\' => value.push('\\'),
                        b'/' => value.push('/'),
                        b'b' => value.push('\u{0008}'),
                        b'f' => value.push('\u{000C}'),
                        b'n' => value.push('\n'),
                        b'r' => value.push('\r'),
                        b't' => value.push('\t'),
                        b'u' => value.push(self.parse_unicode_escape()?),
                        _ => return None,
                    }
                }
                b if b < 0x20 => return None,
                _ => {
                    // Copy a run of plain bytes in one go.
                    let run_start = self.pos;
                    while let Some(b) = self.peek() {
                        if b == b'"' || b == b'\\' || b < 0x20 {
                            break;
                        }
                        self.pos += 1;
                    }
                    value.push_str(&self.src[run_start..self.pos]);
                }
            }
        }
    }

    /// Four hex digits after `\u`, with surrogate-pair handling.
    fn parse_unicode_escape(&mut self) -> Option<char> {
        let high = self.read_hex4()?;
        if (0xD800..=0xDBFF).contains(&high) {
            if self.peek() != Some(b'\\') {
                return None;
            }
            self.pos += 1;
            if self.peek() != Some(b'u') {
                return None;
            }
            self.pos += 1;
            let low = self.read_hex4()?;
            if !(0xDC00..=0xDFFF).contains(&low) {
                return None;
            }
            let code = 0x10000 + ((high - 0xD800) << 10) + (low - 0xDC00);
            return char::from_u32(code);
        }
        char::from_u32(high)
    }

    fn read_hex4(&mut self) -> Option<u32> {
        let hex = self.src.get(self.pos..self.pos + 4)?;
        let code = u32::from_str_radix(hex, 16).ok()?;
        self.pos += 4;
        Some(code)
    }

    fn parse_object(&mut self) -> Option<Parsed> {
        let start = self.pos;
        self.pos += 1; // '{'
        let mut children = Vec::new();
        self.skip_whitespace();
        if self.peek() == Some(b'}') {
            self.pos += 1;
            return Some(Parsed::Object {
                children,
                span: Span::new(start, self.pos),
            });
        }
        loop {
            self.skip_whitespace();
            let key_start = self.pos;
            let (key, _) = self.parse_string()?;
            self.skip_whitespace();
            if self.peek() != Some(b':') {
                return None;
            }
            self.pos += 1;
            self.skip_whitespace();
            let value = self.parse_value()?;
            attach(&key, value, Some(key_start), &mut children);
            self.skip_whitespace();
            match self.peek()? {
                b',' => self.pos += 1,
                b'}' => {
                    self.pos += 1;
                    return Some(Parsed::Object {
                        children,
                        span: Span::new(start, self.pos),
                    });
                }
                _ => return None,
            }
        }
    }

    fn parse_array(&mut self) -> Option<Parsed> {
        let start = self.pos;
        self.pos += 1; // '['
        let mut items = Vec::new();
        self.skip_whitespace();
        if self.peek() == Some(b']') {
            self.pos += 1;
            return Some(Parsed::Array {
                items,
                span: Span::new(start, self.pos),
            });
        }
        loop {
            self.skip_whitespace();
            items.push(self.parse_value()?);
            self.skip_whitespace();
            match self.peek()? {
                b',' => self.pos += 1,
                b']' => {
                    self.pos += 1;
                    return Some(Parsed::Array {
                        items,
                        span: Span::new(start, self.pos),
                    });
                }
                _ => return None,
            }
        }
    }
}
