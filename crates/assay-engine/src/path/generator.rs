//! Synthesizes a path expression from a character offset.
//!
//! Editors hand us a click position in the raw response body; we hand back
//! a path that the evaluator resolves to the node under that position.
//! XML offsets render in the slash form with local names, JSON offsets in
//! the dotted form. Positional predicates appear where siblings would
//! otherwise collide and on every hop into anonymous array items.

use crate::document::{local_name, DocNode, Document, DocumentKind};

/// Build a path expression addressing the deepest node whose source span
/// contains `offset`, or `None` when the document does not parse or the
/// offset falls outside any addressable node.
pub fn generate(document: &str, offset: usize) -> Option<String> {
    let parsed = Document::parse(document)?;
    if !parsed.root.span.contains(offset) {
        return None;
    }

    let mut chain: Vec<&DocNode> = Vec::new();
    let mut node = &parsed.root;
    while let Some(child) = node.children.iter().find(|c| c.span.contains(offset)) {
        chain.push(child);
        node = child;
    }

    if chain.is_empty() {
        // Only the virtual root covers the offset: a scalar JSON document
        // is addressable as `$`, anything else is punctuation or prolog.
        return match parsed.kind {
            DocumentKind::Json if parsed.root.text.is_some() => Some("$".to_string()),
            _ => None,
        };
    }

    match parsed.kind {
        DocumentKind::Xml => Some(render_slash(&parsed.root, &chain)),
        DocumentKind::Json => Some(render_dotted(&parsed.root, &chain)),
    }
}

fn render_slash(root: &DocNode, chain: &[&DocNode]) -> String {
    let mut out = String::new();
    let mut parent = root;
    for node in chain {
        let local = local_name(&node.name);
        let peers: Vec<&DocNode> = parent
            .children
            .iter()
            .filter(|c| local_name(&c.name) == local)
            .collect();
        out.push('/');
        out.push_str(local);
        if peers.len() > 1 {
            let position = position_of(&peers, node);
            out.push_str(&format!("[{}]", position + 1));
        }
        parent = node;
    }
    out
}

fn render_dotted(root: &DocNode, chain: &[&DocNode]) -> String {
    let mut out = String::from("$");
    let mut parent = root;
    for (i, node) in chain.iter().enumerate() {
        if node.name.is_empty() {
            // Anonymous nested-array item.
            let peers: Vec<&DocNode> = parent
                .children
                .iter()
                .filter(|c| c.name.is_empty())
                .collect();
            out.push_str(&format!("[{}]", position_of(&peers, node)));
        } else {
            let peers: Vec<&DocNode> = parent
                .children
                .iter()
                .filter(|c| c.name == node.name)
                .collect();
            if is_plain_key(&node.name) {
                out.push('.');
                out.push_str(&node.name);
            } else if node.name.contains('\'') {
                out.push_str(&format!("[\"{}\"]", node.name));
            } else {
                out.push_str(&format!("['{}']", node.name));
            }
            // A hop into anonymous items needs the enclosing index even
            // when the named run has a single member.
            let descends_into_items = chain
                .get(i + 1)
                .is_some_and(|next| next.name.is_empty());
            if peers.len() > 1 || descends_into_items {
                out.push_str(&format!("[{}]", position_of(&peers, node)));
            }
        }
        parent = node;
    }
    out
}

/// Sibling spans never overlap, so the span start identifies a node
/// within its peer run.
fn position_of(peers: &[&DocNode], node: &DocNode) -> usize {
    peers
        .iter()
        .position(|p| p.span.start == node.span.start)
        .unwrap_or(0)
}

fn is_plain_key(name: &str) -> bool {
    !name.is_empty()
        && name
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '-')
}
