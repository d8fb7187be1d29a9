//! Evaluation of assertion specs against a captured response.
//!
//! Specs are independent: one spec's error never aborts its siblings, and
//! the output always has exactly one result per spec, in spec order.

use std::collections::HashMap;

use once_cell::sync::Lazy;
use regex::Regex;
use tracing::debug;

use crate::exchange::ResponseDescriptor;
use crate::path;
use crate::scripting::{ScriptBindings, ScriptHost, ScriptVerdict};

use super::{
    AssertionCheck, AssertionResult, AssertionSpec, AssertionStatus, ContainsConfig, ScriptConfig,
    SlaConfig, SoapFaultConfig, StatusConfig, XPathConfig,
};

/// Fault element with any (or no) namespace prefix.
static FAULT_ELEMENT: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"<(?:\w+:)?Fault[\s>/]").unwrap());

/// Evaluate every spec against the response. Script specs run with an
/// empty context; use [`evaluate_with_context`] to thread one through.
pub fn evaluate(
    specs: &[AssertionSpec],
    response: &ResponseDescriptor,
    host: &dyn ScriptHost,
) -> Vec<AssertionResult> {
    let mut context = HashMap::new();
    evaluate_with_context(specs, response, host, &mut context)
}

/// Like [`evaluate`], with a caller-owned context map handed to Script
/// specs in order; each script sees the writes of the ones before it and
/// the final state is left in `context`.
pub fn evaluate_with_context(
    specs: &[AssertionSpec],
    response: &ResponseDescriptor,
    host: &dyn ScriptHost,
    context: &mut HashMap<String, String>,
) -> Vec<AssertionResult> {
    specs
        .iter()
        .map(|spec| {
            let (status, message) = match &spec.check {
                AssertionCheck::Contains(config) => {
                    check_contains(config, &response.raw_response, false)
                }
                AssertionCheck::NotContains(config) => {
                    check_contains(config, &response.raw_response, true)
                }
                AssertionCheck::ResponseSla(config) => check_sla(config, response),
                AssertionCheck::XPathMatch(config) => check_xpath(config, &response.raw_response),
                AssertionCheck::SoapFault(config) => {
                    check_soap_fault(config, &response.raw_response)
                }
                AssertionCheck::HttpStatus(config) => check_status(config, response.status_code),
                AssertionCheck::Script(config) => check_script(config, response, host, context),
            };
            AssertionResult {
                id: spec.id.clone(),
                name: spec.name.clone(),
                status,
                message,
            }
        })
        .collect()
}

fn check_contains(
    config: &ContainsConfig,
    body: &str,
    negate: bool,
) -> (AssertionStatus, Option<String>) {
    if config.token.is_empty() {
        return (
            AssertionStatus::Fail,
            Some("Assertion token is empty".to_string()),
        );
    }
    let found = if config.ignore_case {
        body.to_lowercase().contains(&config.token.to_lowercase())
    } else {
        body.contains(&config.token)
    };
    match (found, negate) {
        (true, false) | (false, true) => (AssertionStatus::Pass, None),
        (false, false) => (
            AssertionStatus::Fail,
            Some(format!("Response does not contain '{}'", config.token)),
        ),
        (true, true) => (
            AssertionStatus::Fail,
            Some(format!("Response contains '{}' but should not", config.token)),
        ),
    }
}

fn check_sla(config: &SlaConfig, response: &ResponseDescriptor) -> (AssertionStatus, Option<String>) {
    let Some(sla) = config.sla else {
        return (
            AssertionStatus::Error,
            Some("SLA value missing or not a number".to_string()),
        );
    };
    let Some(duration) = response.duration_ms else {
        return (
            AssertionStatus::Error,
            Some("Response duration not captured".to_string()),
        );
    };
    if duration <= sla {
        (AssertionStatus::Pass, None)
    } else {
        (
            AssertionStatus::Fail,
            Some(format!("Response time {duration}ms exceeded SLA of {sla}ms")),
        )
    }
}

fn check_xpath(config: &XPathConfig, body: &str) -> (AssertionStatus, Option<String>) {
    match path::evaluate(body, &config.xpath) {
        Err(err) => (
            AssertionStatus::Error,
            Some(format!("XPath '{}': {err}", config.xpath)),
        ),
        Ok(Some(value)) if value.trim() == config.expected_content.trim() => {
            (AssertionStatus::Pass, None)
        }
        Ok(value) => {
            let got = value.unwrap_or_default();
            (
                AssertionStatus::Fail,
                Some(format!(
                    "XPath '{}': got '{}', expected '{}'",
                    config.xpath, got, config.expected_content
                )),
            )
        }
    }
}

fn check_soap_fault(config: &SoapFaultConfig, body: &str) -> (AssertionStatus, Option<String>) {
    let has_fault = body.contains("<faultcode>") || FAULT_ELEMENT.is_match(body);
    match (config.expect_fault, has_fault) {
        (true, false) => (
            AssertionStatus::Fail,
            Some("Expected SOAP fault but none found".to_string()),
        ),
        (false, true) => (
            AssertionStatus::Fail,
            Some("Unexpected SOAP fault in response".to_string()),
        ),
        (false, false) => (AssertionStatus::Pass, None),
        (true, true) => match &config.fault_code {
            None => (AssertionStatus::Pass, None),
            Some(code) => {
                // SOAP 1.1 puts the code in <faultcode>, 1.2 in
                // Fault/Code/Value.
                let found = path::evaluate(body, "//faultcode")
                    .ok()
                    .flatten()
                    .or_else(|| path::evaluate(body, "//Fault/Code/Value").ok().flatten());
                match found {
                    Some(text) if text.contains(code.as_str()) => (AssertionStatus::Pass, None),
                    _ => (
                        AssertionStatus::Fail,
                        Some(format!("Fault does not carry code '{code}'")),
                    ),
                }
            }
        },
    }
}

fn check_status(config: &StatusConfig, status: u16) -> (AssertionStatus, Option<String>) {
    let matched = config
        .expected_status
        .split(',')
        .map(str::trim)
        .filter(|entry| !entry.is_empty())
        .any(|entry| status_entry_matches(entry, status));
    if matched {
        (AssertionStatus::Pass, None)
    } else {
        (
            AssertionStatus::Fail,
            Some(format!(
                "Status {} not in expected [{}]",
                status, config.expected_status
            )),
        )
    }
}

/// One comma-list entry: exact code, bare class digit, or `Nxx`.
fn status_entry_matches(entry: &str, status: u16) -> bool {
    let mut chars = entry.chars();
    let first = match chars.next() {
        Some(c) => c,
        None => return false,
    };
    let rest = chars.as_str();
    if let Some(class) = first.to_digit(10) {
        if rest.is_empty() || rest.eq_ignore_ascii_case("xx") {
            return u32::from(status) / 100 == class;
        }
    }
    entry == status.to_string()
}

fn check_script(
    config: &ScriptConfig,
    response: &ResponseDescriptor,
    host: &dyn ScriptHost,
    context: &mut HashMap<String, String>,
) -> (AssertionStatus, Option<String>) {
    let run = host.run(
        &config.script,
        ScriptBindings {
            response: response.raw_response.clone(),
            status_code: response.status_code,
            context: context.clone(),
        },
    );
    for line in &run.logs {
        debug!(script_log = %line);
    }
    *context = run.context;
    match run.verdict {
        ScriptVerdict::Pass => (AssertionStatus::Pass, None),
        ScriptVerdict::Fail(reason) => (AssertionStatus::Fail, reason),
        ScriptVerdict::Error(message) => (AssertionStatus::Error, Some(message)),
    }
}
