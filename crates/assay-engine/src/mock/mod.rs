//! Mock service rules: canned responses selected by matching conditions
//! against an incoming request.
//!
//! Rules are ordered. Dispatch walks them first to last and takes the first
//! enabled rule whose conditions ALL hold, so a catch-all rule placed before
//! a specific one shadows it. A rule with no conditions never matches; the
//! explicit way to catch everything is a condition the traffic always
//! satisfies (for example a `url` condition with an empty pattern).

mod matcher;
mod recorder;

pub use matcher::{match_index, match_rules, rule_matches};
pub use recorder::rule_from_exchange;

use chrono::{DateTime, Utc};
use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::document::{local_name, Document};
use crate::exchange::RequestDescriptor;

/// What part of the request a condition inspects.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum ConditionKind {
    /// The effective SOAPAction (descriptor field, then header, unquoted).
    SoapAction,
    /// The operation name carried by the request body.
    Operation,
    /// The request URL.
    Url,
    /// The raw request body.
    Contains,
    /// `pattern` is a path expression evaluated against the body.
    #[serde(rename = "xpath")]
    XPath,
    /// The value of the header named by `headerName`.
    Header,
}

/// One condition of a rule. `pattern` is a substring by default and a
/// regular expression when `isRegex` is set; the `xpath` kind interprets
/// `pattern` as a path expression instead.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MockCondition {
    #[serde(rename = "type")]
    pub kind: ConditionKind,
    #[serde(default)]
    pub pattern: String,
    #[serde(default)]
    pub is_regex: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub header_name: Option<String>,
}

impl MockCondition {
    pub fn new(kind: ConditionKind, pattern: impl Into<String>) -> Self {
        MockCondition {
            kind,
            pattern: pattern.into(),
            is_regex: false,
            header_name: None,
        }
    }
}

/// A single mock rule: conditions plus the canned response played back on
/// a match. `delayMs` is honored by the listener, not the matcher.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MockRule {
    pub id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default = "default_true")]
    pub enabled: bool,
    #[serde(default)]
    pub conditions: Vec<MockCondition>,
    #[serde(default = "default_status")]
    pub status_code: u16,
    #[serde(default)]
    pub response_body: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub content_type: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub delay_ms: Option<u64>,
    #[serde(default)]
    pub hit_count: u64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub recorded_at: Option<DateTime<Utc>>,
}

impl MockRule {
    pub fn record_hit(&mut self) {
        self.hit_count += 1;
    }
}

fn default_true() -> bool {
    true
}

fn default_status() -> u16 {
    200
}

static OPERATION_ELEMENT: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"<(?:\w+:)?(\w+Request)\b").unwrap());

/// The operation a request carries: the explicit descriptor field when set,
/// otherwise the first `*Request` element in the body, otherwise the first
/// child of the SOAP Body.
pub fn detect_operation(request: &RequestDescriptor) -> Option<String> {
    if let Some(name) = request.operation_name.as_deref() {
        let name = name.trim();
        if !name.is_empty() {
            return Some(name.to_string());
        }
    }
    operation_in_body(&request.body)
}

fn operation_in_body(body: &str) -> Option<String> {
    if let Some(captures) = OPERATION_ELEMENT.captures(body) {
        return Some(captures[1].to_string());
    }
    let document = Document::parse(body)?;
    let mut stack = vec![&document.root];
    while let Some(node) = stack.pop() {
        if local_name(&node.name) == "Body" {
            return node
                .children
                .first()
                .map(|child| local_name(&child.name).to_string());
        }
        for child in node.children.iter().rev() {
            stack.push(child);
        }
    }
    None
}
