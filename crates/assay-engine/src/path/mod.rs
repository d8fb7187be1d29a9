//! Path expressions over response documents.
//!
//! Two surface syntaxes address nodes in the `document` tree:
//!
//! - XPath-subset slash form: `/Envelope/Body/Order[2]/Id`, `//Name`,
//!   `/item/@id`, `count(//Order) > 0`. Positional predicates are 1-based.
//!   A leading `//` lets the first step match at any depth.
//! - Dotted accessor form for JSON: `$.data.items[1].id`, `$[0]`. Brackets
//!   are 0-based. The slash form also resolves against JSON documents; the
//!   tree walk is shared.
//!
//! Name steps match namespace-agnostically (exact key, then local name,
//! then `:localName` suffix). This is a deliberate subset of XPath, not an
//! approximation of the full language.
//!
//! Resolution misses are soft (`None`); only a malformed expression itself
//! raises [`PathSyntaxError`].

mod evaluator;
mod generator;

pub use evaluator::{evaluate, evaluate_document, resolve_count};
pub use generator::generate;

use thiserror::Error;

/// Error raised when a path expression is malformed. Never raised for a
/// well-formed path that simply fails to resolve.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum PathSyntaxError {
    #[error("empty path expression")]
    Empty,
    #[error("empty step in path expression '{0}'")]
    EmptyStep(String),
    #[error("malformed step '{0}'")]
    MalformedStep(String),
    #[error("unbalanced brackets in '{0}'")]
    UnbalancedBrackets(String),
    #[error("malformed count() comparison '{0}'")]
    MalformedCount(String),
}

/// One name step plus its positional predicates.
///
/// Indices are stored 0-based regardless of the surface syntax; a
/// slash-form `[0]` normalizes to -1 and can never match, mirroring the
/// 1-based XPath convention.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PathStep {
    pub name: String,
    pub indices: Vec<i64>,
}

/// What the path asks of its terminal node.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Terminal {
    /// The node's own text content (the default).
    Text,
    /// A trailing `@name` attribute step.
    Attribute(String),
}

/// Comparison operator in a `count(...)` form.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CountOp {
    Gt,
    Ge,
    Lt,
    Le,
    Eq,
    Ne,
}

impl CountOp {
    pub fn apply(self, count: usize, operand: u64) -> bool {
        let count = count as u64;
        match self {
            CountOp::Gt => count > operand,
            CountOp::Ge => count >= operand,
            CountOp::Lt => count < operand,
            CountOp::Le => count <= operand,
            CountOp::Eq => count == operand,
            CountOp::Ne => count != operand,
        }
    }
}

/// Node-selecting part of a path.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SelectPath {
    /// First step may match at any depth (leading `//`).
    pub descend: bool,
    pub steps: Vec<PathStep>,
    pub terminal: Terminal,
}

/// A parsed path expression.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PathExpression {
    /// Plain node selection; resolves to the matched node's value.
    Select(SelectPath),
    /// `count(<path>) <op> <n>`; resolves to `"true"` or `"false"`.
    Count {
        path: SelectPath,
        op: CountOp,
        operand: u64,
    },
}

impl PathExpression {
    /// Parse either surface syntax.
    pub fn parse(raw: &str) -> Result<PathExpression, PathSyntaxError> {
        let trimmed = raw.trim();
        if trimmed.is_empty() {
            return Err(PathSyntaxError::Empty);
        }
        if trimmed.starts_with("count(") {
            return parse_count(trimmed);
        }
        Ok(PathExpression::Select(parse_select(trimmed)?))
    }
}

fn parse_count(raw: &str) -> Result<PathExpression, PathSyntaxError> {
    let malformed = || PathSyntaxError::MalformedCount(raw.to_string());
    let close = raw.rfind(')').ok_or_else(malformed)?;
    let inner = &raw["count(".len()..close];
    if inner.trim().is_empty() {
        return Err(malformed());
    }
    let tail = raw[close + 1..].trim();
    let (op, rest) = if let Some(r) = tail.strip_prefix(">=") {
        (CountOp::Ge, r)
    } else if let Some(r) = tail.strip_prefix("<=") {
        (CountOp::Le, r)
    } else if let Some(r) = tail.strip_prefix("!=") {
        (CountOp::Ne, r)
    } else if let Some(r) = tail.strip_prefix("==") {
        (CountOp::Eq, r)
    } else if let Some(r) = tail.strip_prefix('=') {
        (CountOp::Eq, r)
    } else if let Some(r) = tail.strip_prefix('>') {
        (CountOp::Gt, r)
    } else if let Some(r) = tail.strip_prefix('<') {
        (CountOp::Lt, r)
    } else {
        return Err(malformed());
    };
    let operand: u64 = rest.trim().parse().map_err(|_| malformed())?;
    let path = parse_select(inner.trim())?;
    Ok(PathExpression::Count { path, op, operand })
}

fn parse_select(raw: &str) -> Result<SelectPath, PathSyntaxError> {
    if raw.starts_with('$') {
        parse_dotted(raw)
    } else if raw.contains('/') {
        parse_slashed(raw)
    } else if raw.contains('.') && raw.contains(['[', ']']) {
        // Bare dotted accessor without the `$` anchor, e.g. `data.items[0]`.
        parse_dotted(&format!("$.{raw}"))
    } else if raw.contains('.') && !raw.contains(':') {
        parse_dotted(&format!("$.{raw}"))
    } else {
        // Single bare name, e.g. `name` or `soap:Body`.
        parse_slashed(raw)
    }
}

// ===== Slash (XPath-subset) form =====

fn parse_slashed(raw: &str) -> Result<SelectPath, PathSyntaxError> {
    let (descend, rest) = if let Some(r) = raw.strip_prefix("//") {
        (true, r)
    } else if let Some(r) = raw.strip_prefix('/') {
        (false, r)
    } else {
        (false, raw)
    };
    if rest.is_empty() {
        return Err(PathSyntaxError::EmptyStep(raw.to_string()));
    }

    let mut steps = Vec::new();
    let mut terminal = Terminal::Text;
    let segments: Vec<&str> = rest.split('/').collect();
    let last = segments.len() - 1;

    for (i, segment) in segments.iter().enumerate() {
        if segment.is_empty() {
            return Err(PathSyntaxError::EmptyStep(raw.to_string()));
        }
        if let Some(attr) = segment.strip_prefix('@') {
            if i != last || attr.is_empty() || attr.contains(['[', ']']) {
                return Err(PathSyntaxError::MalformedStep(segment.to_string()));
            }
            terminal = Terminal::Attribute(attr.to_string());
            continue;
        }
        if *segment == "#text" {
            // Explicit text request; only meaningful as the final step.
            if i != last {
                return Err(PathSyntaxError::MalformedStep(segment.to_string()));
            }
            continue;
        }
        let step = parse_segment(segment, true)?;
        steps.push(step);
    }

    if steps.is_empty() {
        return Err(PathSyntaxError::EmptyStep(raw.to_string()));
    }
    Ok(SelectPath {
        descend,
        steps,
        terminal,
    })
}

/// Parse `name[i][j]...`; `one_based` shifts indices down by one.
fn parse_segment(segment: &str, one_based: bool) -> Result<PathStep, PathSyntaxError> {
    let opens = segment.matches('[').count();
    let closes = segment.matches(']').count();
    if opens != closes {
        return Err(PathSyntaxError::UnbalancedBrackets(segment.to_string()));
    }

    let name_end = segment.find('[').unwrap_or(segment.len());
    let name = &segment[..name_end];
    if name.is_empty() || name.contains(']') {
        return Err(PathSyntaxError::MalformedStep(segment.to_string()));
    }

    let mut indices = Vec::new();
    let mut rest = &segment[name_end..];
    while !rest.is_empty() {
        let inner_end = rest
            .find(']')
            .ok_or_else(|| PathSyntaxError::UnbalancedBrackets(segment.to_string()))?;
        if !rest.starts_with('[') {
            return Err(PathSyntaxError::MalformedStep(segment.to_string()));
        }
        let digits = &rest[1..inner_end];
        let n: u64 = digits
            .parse()
            .map_err(|_| PathSyntaxError::MalformedStep(segment.to_string()))?;
        indices.push(if one_based { n as i64 - 1 } else { n as i64 });
        rest = &rest[inner_end + 1..];
    }

    Ok(PathStep {
        name: name.to_string(),
        indices,
    })
}

// ===== Dotted (JSON accessor) form =====

fn parse_dotted(raw: &str) -> Result<SelectPath, PathSyntaxError> {
    let mut chars = raw.char_indices().peekable();
    match chars.next() {
        Some((_, '$')) => {}
        _ => return Err(PathSyntaxError::MalformedStep(raw.to_string())),
    }

    let mut steps: Vec<PathStep> = Vec::new();
    let bytes = raw.as_bytes();
    let mut pos = 1;

    while pos < bytes.len() {
        match bytes[pos] {
            b'.' => {
                pos += 1;
                let start = pos;
                while pos < bytes.len() && bytes[pos] != b'.' && bytes[pos] != b'[' {
                    pos += 1;
                }
                let name = &raw[start..pos];
                if name.is_empty() {
                    return Err(PathSyntaxError::EmptyStep(raw.to_string()));
                }
                if name.starts_with('@') {
                    return Err(PathSyntaxError::MalformedStep(name.to_string()));
                }
                steps.push(PathStep {
                    name: name.to_string(),
                    indices: Vec::new(),
                });
            }
            b'[' => {
                let close = raw[pos..]
                    .find(']')
                    .map(|i| pos + i)
                    .ok_or_else(|| PathSyntaxError::UnbalancedBrackets(raw.to_string()))?;
                let inner = raw[pos + 1..close].trim();
                if let Some(quoted) = inner
                    .strip_prefix('\'')
                    .and_then(|s| s.strip_suffix('\''))
                    .or_else(|| inner.strip_prefix('"').and_then(|s| s.strip_suffix('"')))
                {
                    // Bracketed name step: $['a key'].
                    steps.push(PathStep {
                        name: quoted.to_string(),
                        indices: Vec::new(),
                    });
                } else {
                    let n: u64 = inner
                        .parse()
                        .map_err(|_| PathSyntaxError::MalformedStep(raw.to_string()))?;
                    match steps.last_mut() {
                        Some(step) => step.indices.push(n as i64),
                        None => steps.push(PathStep {
                            // `$[0]`: anonymous root item.
                            name: String::new(),
                            indices: vec![n as i64],
                        }),
                    }
                }
                pos = close + 1;
            }
            b']' => return Err(PathSyntaxError::UnbalancedBrackets(raw.to_string())),
            _ => return Err(PathSyntaxError::MalformedStep(raw.to_string())),
        }
    }

    Ok(SelectPath {
        descend: false,
        steps,
        terminal: Terminal::Text,
    })
}
