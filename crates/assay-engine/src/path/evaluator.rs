//! Resolves parsed path expressions against a document tree.
//!
//! Every miss is soft: an element that does not exist, an index out of
//! range, an unparsable document all yield `None`. Only a malformed
//! expression raises an error, and only from the string entry point.

use crate::document::{name_matches, DocNode, Document, DocumentKind};

use super::{PathExpression, PathStep, PathSyntaxError, SelectPath, Terminal};

/// Evaluate a path expression against a raw response body.
///
/// Empty documents and empty paths resolve to `None` rather than erroring;
/// both come up constantly when steps run before a response arrives.
pub fn evaluate(document: &str, path: &str) -> Result<Option<String>, PathSyntaxError> {
    if document.trim().is_empty() || path.trim().is_empty() {
        return Ok(None);
    }
    let expr = PathExpression::parse(path)?;
    let parsed = match Document::parse(document) {
        Some(parsed) => parsed,
        None => return Ok(None),
    };
    Ok(evaluate_document(&parsed, &expr))
}

/// Evaluate an already-parsed expression against an already-parsed
/// document. Assertion and mock evaluation reuse one parse across many
/// expressions this way.
pub fn evaluate_document(document: &Document, expr: &PathExpression) -> Option<String> {
    match expr {
        PathExpression::Select(path) => {
            let matched = collect(document, path);
            match &path.terminal {
                Terminal::Text => {
                    let node = matched.first()?;
                    terminal_text(document.kind, node)
                }
                Terminal::Attribute(name) => matched
                    .iter()
                    .find_map(|node| node.attribute(name))
                    .map(str::to_string),
            }
        }
        PathExpression::Count { path, op, operand } => {
            let count = resolve_count(document, path);
            let verdict = if op.apply(count, *operand) {
                "true"
            } else {
                "false"
            };
            Some(verdict.to_string())
        }
    }
}

/// Number of nodes a select path matches. An attribute terminal counts
/// only the nodes carrying that attribute.
pub fn resolve_count(document: &Document, path: &SelectPath) -> usize {
    let matched = collect(document, path);
    match &path.terminal {
        Terminal::Attribute(name) => matched
            .iter()
            .filter(|node| node.attribute(name).is_some())
            .count(),
        Terminal::Text => matched.len(),
    }
}

fn collect<'a>(document: &'a Document, path: &SelectPath) -> Vec<&'a DocNode> {
    let (first, rest) = match path.steps.split_first() {
        Some(split) => split,
        // Bare `$` selects the document itself.
        None => return vec![&document.root],
    };

    let parents: Vec<&DocNode> = if path.descend {
        preorder(&document.root)
    } else {
        vec![&document.root]
    };

    let mut current = Vec::new();
    for parent in parents {
        select_children(parent, first, &mut current);
    }
    for step in rest {
        let mut next = Vec::new();
        for parent in &current {
            select_children(parent, step, &mut next);
        }
        current = next;
    }
    current
}

/// Matching children of one parent, with positional predicates applied
/// within that parent's run. Extra brackets step into anonymous
/// nested-array items.
fn select_children<'a>(parent: &'a DocNode, step: &PathStep, out: &mut Vec<&'a DocNode>) {
    let named: Vec<&DocNode> = parent
        .children
        .iter()
        .filter(|child| name_matches(&child.name, &step.name))
        .collect();
    if step.indices.is_empty() {
        out.extend(named);
        return;
    }

    let mut run = named;
    for (depth, &index) in step.indices.iter().enumerate() {
        if index < 0 {
            return;
        }
        let node = match run.get(index as usize) {
            Some(node) => *node,
            None => return,
        };
        if depth + 1 == step.indices.len() {
            out.push(node);
            return;
        }
        run = node
            .children
            .iter()
            .filter(|child| child.name.is_empty())
            .collect();
    }
}

fn preorder(root: &DocNode) -> Vec<&DocNode> {
    let mut out = Vec::new();
    let mut stack = vec![root];
    while let Some(node) = stack.pop() {
        out.push(node);
        for child in node.children.iter().rev() {
            stack.push(child);
        }
    }
    out
}

/// Text value of a resolved node. An XML element with no children and no
/// text renders as the empty string; a JSON `null` stays a miss so that
/// extractors fall through to their defaults.
fn terminal_text(kind: DocumentKind, node: &DocNode) -> Option<String> {
    match &node.text {
        Some(text) => Some(text.clone()),
        None if node.children.is_empty() && kind == DocumentKind::Xml => Some(String::new()),
        None => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SOAP_ENVELOPE: &str = r#"<?xml version="1.0"?>
<soap:Envelope xmlns:soap="http://schemas.xmlsoap.org/soap/envelope/">
  <soap:Body>
    <ns1:GetCustomerResponse xmlns:ns1="http://example.com/customers">
      <ns1:Name>Jane Doe</ns1:Name>
      <ns1:Status>active</ns1:Status>
    </ns1:GetCustomerResponse>
  </soap:Body>
</soap:Envelope>"#;

    const ORDERS: &str = r#"<Response>
  <Orders>
    <Order><Id>1001</Id></Order>
    <Order><Id>1002</Id></Order>
  </Orders>
</Response>"#;

    fn eval(document: &str, path: &str) -> Option<String> {
        evaluate(document, path).unwrap()
    }

    #[test]
    fn anchored_path_on_xml() {
        let xml = "<root><name>John</name><age>30</age></root>";
        assert_eq!(eval(xml, "/root/name"), Some("John".to_string()));
        assert_eq!(eval(xml, "/root/age"), Some("30".to_string()));
        assert_eq!(eval(xml, "/name"), None);
    }

    #[test]
    fn descent_finds_elements_at_any_depth() {
        assert_eq!(eval(SOAP_ENVELOPE, "//Name"), Some("Jane Doe".to_string()));
        assert_eq!(eval(SOAP_ENVELOPE, "//Status"), Some("active".to_string()));
        assert_eq!(eval(SOAP_ENVELOPE, "//Missing"), None);
    }

    #[test]
    fn namespace_prefixes_are_interchangeable() {
        assert_eq!(
            eval(
                SOAP_ENVELOPE,
                "/soap:Envelope/soap:Body/ns1:GetCustomerResponse/ns1:Name"
            ),
            Some("Jane Doe".to_string())
        );
        assert_eq!(
            eval(SOAP_ENVELOPE, "/Envelope/Body/GetCustomerResponse/Name"),
            Some("Jane Doe".to_string())
        );
        assert_eq!(
            eval(SOAP_ENVELOPE, "/other:Envelope/Body/GetCustomerResponse/Name"),
            Some("Jane Doe".to_string())
        );
    }

    #[test]
    fn positional_predicates_are_one_based() {
        assert_eq!(
            eval(ORDERS, "//Orders/Order[1]/Id"),
            Some("1001".to_string())
        );
        assert_eq!(
            eval(ORDERS, "//Orders/Order[2]/Id"),
            Some("1002".to_string())
        );
        assert_eq!(eval(ORDERS, "//Orders/Order[5]/Id"), None);
        assert_eq!(eval(ORDERS, "//Orders/Order[0]/Id"), None);
    }

    #[test]
    fn count_comparisons_render_booleans() {
        assert_eq!(eval(ORDERS, "count(//Order) > 0"), Some("true".to_string()));
        assert_eq!(eval(ORDERS, "count(//Order) = 2"), Some("true".to_string()));
        assert_eq!(eval(ORDERS, "count(//Order) > 5"), Some("false".to_string()));
        assert_eq!(
            eval(ORDERS, "count(//Missing) > 0"),
            Some("false".to_string())
        );
    }

    #[test]
    fn json_resolves_by_slash_and_dotted_paths() {
        let json = r#"{"data": {"id": 123}}"#;
        assert_eq!(eval(json, "//data/id"), Some("123".to_string()));
        assert_eq!(eval(json, "/data/id"), Some("123".to_string()));
        assert_eq!(eval(json, "$.data.id"), Some("123".to_string()));
    }

    #[test]
    fn json_array_indices_align_across_syntaxes() {
        let json = r#"{"items": [{"id": "a"}, {"id": "b"}, {"id": "c"}]}"#;
        assert_eq!(eval(json, "$.items[1].id"), Some("b".to_string()));
        assert_eq!(eval(json, "//items[2]/id"), Some("b".to_string()));
        assert_eq!(eval(json, "$.items[9].id"), None);
    }

    #[test]
    fn nested_json_arrays_take_double_indices() {
        let json = r#"{"m": [[1, 2], [3]]}"#;
        assert_eq!(eval(json, "$.m[0][1]"), Some("2".to_string()));
        assert_eq!(eval(json, "$.m[1][0]"), Some("3".to_string()));
        assert_eq!(eval(json, "$.m[1][5]"), None);
    }

    #[test]
    fn attribute_terminals() {
        let xml = r#"<order id="5"><item sku="abc"/><item/></order>"#;
        assert_eq!(eval(xml, "/order/@id"), Some("5".to_string()));
        assert_eq!(eval(xml, "//item/@sku"), Some("abc".to_string()));
        assert_eq!(eval(xml, "/order/@missing"), None);
        assert_eq!(
            eval(xml, "count(//item/@sku) = 1"),
            Some("true".to_string())
        );
    }

    #[test]
    fn empty_xml_element_renders_empty_string() {
        let xml = "<root><empty/><full>x</full></root>";
        assert_eq!(eval(xml, "/root/empty"), Some(String::new()));
        // A pure-element node has no text of its own.
        assert_eq!(eval(xml, "/root"), None);
    }

    #[test]
    fn json_null_is_a_miss() {
        let json = r#"{"a": null, "b": false}"#;
        assert_eq!(eval(json, "$.a"), None);
        assert_eq!(eval(json, "$.b"), Some("false".to_string()));
    }

    #[test]
    fn scalar_root_resolves_via_dollar() {
        assert_eq!(eval("42", "$"), Some("42".to_string()));
    }

    #[test]
    fn mixed_content_concatenates_direct_text() {
        let xml = "<a>one<b>x</b>two</a>";
        assert_eq!(eval(xml, "/a"), Some("onetwo".to_string()));
        assert_eq!(eval(xml, "/a/b"), Some("x".to_string()));
    }

    #[test]
    fn first_match_wins_in_document_order() {
        let xml = "<r><a>one</a><a>two</a></r>";
        assert_eq!(eval(xml, "//a"), Some("one".to_string()));
    }

    #[test]
    fn soft_misses_stay_none() {
        assert_eq!(evaluate("", "//a"), Ok(None));
        assert_eq!(evaluate("<a>x</a>", ""), Ok(None));
        assert_eq!(evaluate("   ", "//a"), Ok(None));
        assert_eq!(evaluate("not a document", "//a"), Ok(None));
        assert_eq!(evaluate("<unclosed>", "//a"), Ok(None));
    }

    #[test]
    fn malformed_paths_error() {
        assert!(evaluate("<a>x</a>", "/a//b").is_err());
        assert!(evaluate("<a>x</a>", "/a[").is_err());
        assert!(evaluate("<a>x</a>", "count(//a)").is_err());
    }
}
