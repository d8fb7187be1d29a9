//! Variable extraction: pulling named values out of a captured response
//! for reuse in later steps.
//!
//! Extraction never fails a run. A value that cannot be resolved falls
//! back to the spec's `defaultValue`, and without one the variable is
//! omitted from the map entirely, so callers can tell "not extracted"
//! from "extracted an empty string".

use std::collections::{HashMap, HashSet};

use regex::Regex;
use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::exchange::ResponseDescriptor;
use crate::path::{self, PathExpression};

/// Where the value comes from.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ExtractorSource {
    #[default]
    Body,
    /// `path` names a header, looked up case-insensitively.
    Header,
    /// The decimal status code; `path` is ignored.
    Status,
}

/// How body extraction interprets `path`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum ExtractionMethod {
    #[default]
    #[serde(rename = "XPath")]
    XPath,
    #[serde(rename = "Regex")]
    Regex,
    #[serde(rename = "JSONPath")]
    JsonPath,
}

/// One configured extraction.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExtractorSpec {
    pub id: String,
    /// Context variable the value lands in.
    pub variable: String,
    #[serde(default)]
    pub source: ExtractorSource,
    #[serde(default)]
    pub method: ExtractionMethod,
    #[serde(default)]
    pub path: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub default_value: Option<String>,
}

/// Run every extractor against the response. Duplicate `variable` names
/// resolve last-write-wins in spec order.
pub fn evaluate(specs: &[ExtractorSpec], response: &ResponseDescriptor) -> HashMap<String, String> {
    let mut variables = HashMap::new();
    for spec in specs {
        let value = match resolve(spec, response) {
            Some(value) => value,
            None => match &spec.default_value {
                Some(default) => default.clone(),
                None => {
                    warn!(
                        variable = %spec.variable,
                        path = %spec.path,
                        "extractor resolved nothing; variable omitted"
                    );
                    continue;
                }
            },
        };
        if variables.insert(spec.variable.clone(), value).is_some() {
            warn!(
                variable = %spec.variable,
                "duplicate extractor variable; keeping the later value"
            );
        }
    }
    variables
}

/// Variable names configured more than once, in first-appearance order.
pub fn duplicate_variables(specs: &[ExtractorSpec]) -> Vec<String> {
    let mut seen = HashSet::new();
    let mut duplicates = Vec::new();
    for spec in specs {
        if !seen.insert(spec.variable.as_str())
            && !duplicates.contains(&spec.variable)
        {
            duplicates.push(spec.variable.clone());
        }
    }
    duplicates
}

/// Check that `path` parses under `method`, for tools that vet
/// definitions before anything runs.
pub fn validate_path(method: ExtractionMethod, path: &str) -> Result<(), String> {
    match method {
        ExtractionMethod::XPath => PathExpression::parse(path)
            .map(|_| ())
            .map_err(|err| err.to_string()),
        ExtractionMethod::Regex => Regex::new(path)
            .map(|_| ())
            .map_err(|err| err.to_string()),
        ExtractionMethod::JsonPath => serde_json_path::JsonPath::parse(path)
            .map(|_| ())
            .map_err(|err| err.to_string()),
    }
}

fn resolve(spec: &ExtractorSpec, response: &ResponseDescriptor) -> Option<String> {
    match spec.source {
        ExtractorSource::Status => Some(response.status_code.to_string()),
        ExtractorSource::Header => response.header(&spec.path).map(str::to_string),
        ExtractorSource::Body => resolve_body(spec, &response.raw_response),
    }
}

fn resolve_body(spec: &ExtractorSpec, body: &str) -> Option<String> {
    match spec.method {
        ExtractionMethod::XPath => match path::evaluate(body, &spec.path) {
            Ok(value) => value,
            Err(err) => {
                warn!(path = %spec.path, %err, "malformed extraction path");
                None
            }
        },
        ExtractionMethod::Regex => resolve_regex(&spec.path, body),
        ExtractionMethod::JsonPath => resolve_json_path(&spec.path, body),
    }
}

/// First capture group when the pattern has one, whole match otherwise.
fn resolve_regex(pattern: &str, body: &str) -> Option<String> {
    let regex = match Regex::new(pattern) {
        Ok(regex) => regex,
        Err(err) => {
            warn!(%pattern, %err, "invalid extraction regex");
            return None;
        }
    };
    let captures = regex.captures(body)?;
    let capture = captures.get(1).or_else(|| captures.get(0))?;
    Some(capture.as_str().to_string())
}

fn resolve_json_path(path: &str, body: &str) -> Option<String> {
    let json: serde_json::Value = serde_json::from_str(body).ok()?;
    let compiled = match serde_json_path::JsonPath::parse(path) {
        Ok(compiled) => compiled,
        Err(err) => {
            warn!(%path, %err, "invalid JSONPath expression");
            return None;
        }
    };
    let nodes = compiled.query(&json);
    let node = nodes.first()?;
    Some(match node {
        serde_json::Value::String(text) => text.clone(),
        other => other.to_string(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn body_response(body: &str) -> ResponseDescriptor {
        ResponseDescriptor {
            raw_response: body.to_string(),
            status_code: 200,
            ..Default::default()
        }
    }

    fn xpath_spec(variable: &str, path: &str) -> ExtractorSpec {
        ExtractorSpec {
            id: format!("x-{variable}"),
            variable: variable.to_string(),
            source: ExtractorSource::Body,
            method: ExtractionMethod::XPath,
            path: path.to_string(),
            default_value: None,
        }
    }

    #[test]
    fn extracts_json_value_by_slash_path() {
        let response = body_response(r#"{"data": {"id": 123}}"#);
        let variables = evaluate(&[xpath_spec("id", "//data/id")], &response);
        assert_eq!(variables.get("id").map(String::as_str), Some("123"));
    }

    #[test]
    fn extracts_xml_value() {
        let response = body_response("<root><name>Jane Doe</name></root>");
        let variables = evaluate(&[xpath_spec("name", "/root/name")], &response);
        assert_eq!(variables.get("name").map(String::as_str), Some("Jane Doe"));
    }

    #[test]
    fn miss_without_default_omits_the_variable() {
        let response = body_response(r#"{"a": 1}"#);
        let variables = evaluate(&[xpath_spec("missing", "//nope")], &response);
        assert!(!variables.contains_key("missing"));
        assert!(variables.is_empty());
    }

    #[test]
    fn miss_with_default_uses_it() {
        let mut spec = xpath_spec("region", "//region");
        spec.default_value = Some("eu-west".to_string());
        let variables = evaluate(&[spec], &body_response(r#"{"a": 1}"#));
        assert_eq!(variables.get("region").map(String::as_str), Some("eu-west"));
    }

    #[test]
    fn header_and_status_sources() {
        let mut response = body_response("");
        response
            .headers
            .insert("X-Request-Id".to_string(), "req-9".to_string());
        let specs = [
            ExtractorSpec {
                id: "h".to_string(),
                variable: "requestId".to_string(),
                source: ExtractorSource::Header,
                method: ExtractionMethod::XPath,
                path: "x-request-id".to_string(),
                default_value: None,
            },
            ExtractorSpec {
                id: "s".to_string(),
                variable: "status".to_string(),
                source: ExtractorSource::Status,
                method: ExtractionMethod::XPath,
                path: String::new(),
                default_value: None,
            },
        ];
        let variables = evaluate(&specs, &response);
        assert_eq!(variables.get("requestId").map(String::as_str), Some("req-9"));
        assert_eq!(variables.get("status").map(String::as_str), Some("200"));
    }

    #[test]
    fn regex_takes_first_group_then_whole_match() {
        let response = body_response("order id=42 confirmed");
        let grouped = ExtractorSpec {
            method: ExtractionMethod::Regex,
            path: r"id=(\d+)".to_string(),
            ..xpath_spec("id", "")
        };
        let whole = ExtractorSpec {
            method: ExtractionMethod::Regex,
            path: r"confirmed".to_string(),
            ..xpath_spec("word", "")
        };
        let variables = evaluate(&[grouped, whole], &response);
        assert_eq!(variables.get("id").map(String::as_str), Some("42"));
        assert_eq!(variables.get("word").map(String::as_str), Some("confirmed"));
    }

    #[test]
    fn invalid_regex_falls_back_to_default() {
        let spec = ExtractorSpec {
            method: ExtractionMethod::Regex,
            path: "(".to_string(),
            default_value: Some("none".to_string()),
            ..xpath_spec("broken", "")
        };
        let variables = evaluate(&[spec], &body_response("anything"));
        assert_eq!(variables.get("broken").map(String::as_str), Some("none"));
    }

    #[test]
    fn json_path_method_renders_bare_strings() {
        let response = body_response(r#"{"items": [{"id": "a"}, {"id": "b"}]}"#);
        let spec = ExtractorSpec {
            method: ExtractionMethod::JsonPath,
            path: "$.items[1].id".to_string(),
            ..xpath_spec("second", "")
        };
        let variables = evaluate(&[spec], &response);
        assert_eq!(variables.get("second").map(String::as_str), Some("b"));
    }

    #[test]
    fn malformed_path_is_isolated_to_its_spec() {
        let response = body_response(r#"{"data": {"id": 5}}"#);
        let specs = [xpath_spec("bad", "/a//b"), xpath_spec("good", "//data/id")];
        let variables = evaluate(&specs, &response);
        assert!(!variables.contains_key("bad"));
        assert_eq!(variables.get("good").map(String::as_str), Some("5"));
    }

    #[test]
    fn duplicate_variables_resolve_last_write_wins() {
        let response = body_response(r#"{"first": "1", "second": "2"}"#);
        let specs = [xpath_spec("value", "//first"), xpath_spec("value", "//second")];
        assert_eq!(duplicate_variables(&specs), vec!["value".to_string()]);
        let variables = evaluate(&specs, &response);
        assert_eq!(variables.get("value").map(String::as_str), Some("2"));
    }

    #[test]
    fn path_validation_tracks_the_method() {
        assert!(validate_path(ExtractionMethod::XPath, "//data/id").is_ok());
        assert!(validate_path(ExtractionMethod::XPath, "/a//b").is_err());
        assert!(validate_path(ExtractionMethod::Regex, r"id=(\d+)").is_ok());
        assert!(validate_path(ExtractionMethod::Regex, "(").is_err());
        assert!(validate_path(ExtractionMethod::JsonPath, "$.a[0]").is_ok());
        assert!(validate_path(ExtractionMethod::JsonPath, "$..[").is_err());
    }

    #[test]
    fn wire_shape_round_trips() {
        let spec: ExtractorSpec = serde_json::from_str(
            r#"{
                "id": "e-1",
                "variable": "token",
                "source": "body",
                "method": "JSONPath",
                "path": "$.auth.token",
                "defaultValue": "anonymous"
            }"#,
        )
        .unwrap();
        assert_eq!(spec.method, ExtractionMethod::JsonPath);
        assert_eq!(spec.default_value.as_deref(), Some("anonymous"));

        let minimal: ExtractorSpec =
            serde_json::from_str(r#"{"id": "e-2", "variable": "v", "path": "//x"}"#).unwrap();
        assert_eq!(minimal.source, ExtractorSource::Body);
        assert_eq!(minimal.method, ExtractionMethod::XPath);
    }
}
