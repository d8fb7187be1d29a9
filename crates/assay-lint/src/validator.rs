//! Definition checks for suite and mock rule files.
//!
//! Validation works on the raw JSON value so one malformed assertion gets a
//! precise location without hiding the rest of the file from the other
//! checks.

use std::collections::HashSet;
use std::path::Path;

use assay_engine::assertion::{AssertionCheck, AssertionSpec};
use assay_engine::extractor::{self, ExtractionMethod, ExtractorSpec, ExtractorSource};
use assay_engine::mock::{ConditionKind, MockCondition, MockRule};
use assay_engine::path::PathExpression;
use assay_engine::suite::goto_targets;
use regex::Regex;
use serde_json::Value;

use crate::types::{LintIssue, LintResult};

/// Known assertion type tags, for suggestions.
const ASSERTION_TYPES: &str = "Simple Contains, Simple Not Contains, Response SLA, XPath Match, SOAP Fault, HTTP Status, Script";

/// Script syntax validation using the rhai engine.
#[cfg(feature = "scripts")]
mod script_validator {
    pub fn validate_script(script: &str) -> Result<(), String> {
        let mut engine = rhai::Engine::new();
        // The runtime host installs `goto <expr>` as custom syntax; the
        // parser here needs the same shape or every jump is a false alarm.
        engine
            .register_custom_syntax(["goto", "$expr$"], false, |_, _| Ok(rhai::Dynamic::UNIT))
            .map_err(|err| err.to_string())?;
        engine
            .compile(script)
            .map(|_| ())
            .map_err(|err| err.to_string())
    }
}

#[cfg(not(feature = "scripts"))]
mod script_validator {
    pub fn validate_script(_script: &str) -> Result<(), String> {
        Ok(())
    }
}

/// Validate one parsed definition file of either shape.
pub fn validate_definition(file: &Path, value: &Value, result: &mut LintResult) {
    if value.get("testCases").is_some() {
        validate_suite(file, value, result);
        return;
    }
    if let Some(rules) = rules_of(value) {
        validate_rules(file, rules, result);
        return;
    }
    result.add_issue(
        LintIssue::error(
            "E002",
            "Not a recognized definition: expected a suite or a rule set",
            file.to_path_buf(),
        )
        .with_suggestion(
            "Top level must be an object with 'testCases', an object with 'rules', or an array of rules",
        ),
    );
}

fn rules_of(value: &Value) -> Option<&Vec<Value>> {
    value
        .as_array()
        .or_else(|| value.get("rules").and_then(|v| v.as_array()))
}

/// Validate a suite definition.
pub fn validate_suite(file: &Path, suite: &Value, result: &mut LintResult) {
    let Some(cases) = suite.get("testCases").and_then(|v| v.as_array()) else {
        result.add_issue(
            LintIssue::error("E002", "'testCases' must be an array", file.to_path_buf()),
        );
        return;
    };
    for (case_index, case) in cases.iter().enumerate() {
        validate_case(file, case, case_index, result);
    }
}

fn validate_case(file: &Path, case: &Value, case_index: usize, result: &mut LintResult) {
    let case_location = format!("testCases[{case_index}]");
    let case_name = case.get("name").and_then(|v| v.as_str()).unwrap_or("");
    let Some(steps) = case.get("steps").and_then(|v| v.as_array()) else {
        return;
    };

    let step_names: Vec<&str> = steps
        .iter()
        .filter_map(|step| step.get("name").and_then(|v| v.as_str()))
        .collect();

    let mut seen = HashSet::new();
    for name in &step_names {
        if !seen.insert(*name) {
            result.add_issue(
                LintIssue::error(
                    "E007",
                    format!("Duplicate step name '{name}' in case '{case_name}'"),
                    file.to_path_buf(),
                )
                .with_location(case_location.clone())
                .with_suggestion("Step names must be unique within a case"),
            );
        }
    }

    let name_set: HashSet<&str> = step_names.iter().copied().collect();
    let mut case_extractors: Vec<ExtractorSpec> = Vec::new();

    for (step_index, step) in steps.iter().enumerate() {
        let step_location = format!("{case_location}.steps[{step_index}]");

        if step.get("name").and_then(|v| v.as_str()).is_none() {
            result.add_issue(
                LintIssue::error("E002", "Step has no name", file.to_path_buf())
                    .with_location(step_location.clone()),
            );
        }

        if let Some(script) = step.get("script").and_then(|v| v.as_str()) {
            check_script(file, script, &step_location, result);
            for target in goto_targets(script) {
                if !name_set.contains(target.as_str()) {
                    result.add_issue(
                        LintIssue::error(
                            "E006",
                            format!("Jump to unknown step '{target}'"),
                            file.to_path_buf(),
                        )
                        .with_location(step_location.clone())
                        .with_suggestion("goto targets must name a step in the same case"),
                    );
                }
            }
        }

        if let Some(assertions) = step.get("assertions").and_then(|v| v.as_array()) {
            for (index, assertion) in assertions.iter().enumerate() {
                let location = format!("{step_location}.assertions[{index}]");
                match serde_json::from_value::<AssertionSpec>(assertion.clone()) {
                    Ok(spec) => check_assertion(file, &spec, &location, result),
                    Err(err) => result.add_issue(
                        LintIssue::error(
                            "E002",
                            format!("Malformed assertion: {err}"),
                            file.to_path_buf(),
                        )
                        .with_location(location)
                        .with_suggestion(format!("Known types: {ASSERTION_TYPES}")),
                    ),
                }
            }
        }

        if let Some(extractors) = step.get("extractors").and_then(|v| v.as_array()) {
            for (index, value) in extractors.iter().enumerate() {
                let location = format!("{step_location}.extractors[{index}]");
                match serde_json::from_value::<ExtractorSpec>(value.clone()) {
                    Ok(spec) => {
                        check_extractor(file, &spec, &location, result);
                        case_extractors.push(spec);
                    }
                    Err(err) => result.add_issue(
                        LintIssue::error(
                            "E002",
                            format!("Malformed extractor: {err}"),
                            file.to_path_buf(),
                        )
                        .with_location(location),
                    ),
                }
            }
        }
    }

    for variable in extractor::duplicate_variables(&case_extractors) {
        result.add_issue(
            LintIssue::warning(
                "W001",
                format!("Variable '{variable}' is extracted more than once in case '{case_name}'"),
                file.to_path_buf(),
            )
            .with_location(case_location.clone())
            .with_suggestion("Later extractions overwrite earlier ones"),
        );
    }
}

fn check_assertion(file: &Path, spec: &AssertionSpec, location: &str, result: &mut LintResult) {
    match &spec.check {
        AssertionCheck::Contains(config) | AssertionCheck::NotContains(config) => {
            if config.token.is_empty() {
                result.add_issue(
                    LintIssue::warning(
                        "W002",
                        format!("Assertion '{}' has an empty token", spec.id),
                        file.to_path_buf(),
                    )
                    .with_location(location)
                    .with_suggestion("An empty token always fails at run time"),
                );
            }
        }
        AssertionCheck::XPathMatch(config) => {
            if let Err(err) = PathExpression::parse(&config.xpath) {
                result.add_issue(
                    LintIssue::error(
                        "E005",
                        format!("Assertion '{}': {err}", spec.id),
                        file.to_path_buf(),
                    )
                    .with_location(location),
                );
            }
        }
        AssertionCheck::ResponseSla(config) => {
            if config.sla.is_none() {
                result.add_issue(
                    LintIssue::error(
                        "E002",
                        format!("Assertion '{}' has a missing or non-numeric sla", spec.id),
                        file.to_path_buf(),
                    )
                    .with_location(location)
                    .with_suggestion("Set configuration.sla to a millisecond budget"),
                );
            }
        }
        AssertionCheck::HttpStatus(config) => {
            if config.expected_status.trim().is_empty() {
                result.add_issue(
                    LintIssue::warning(
                        "W002",
                        format!("Assertion '{}' has an empty expectedStatus", spec.id),
                        file.to_path_buf(),
                    )
                    .with_location(location)
                    .with_suggestion("An empty status list always fails at run time"),
                );
            }
        }
        AssertionCheck::Script(config) => check_script(file, &config.script, location, result),
        AssertionCheck::SoapFault(_) => {}
    }
}

fn check_script(file: &Path, script: &str, location: &str, result: &mut LintResult) {
    if let Err(err) = script_validator::validate_script(script) {
        result.add_issue(
            LintIssue::warning(
                "W003",
                format!("Script does not compile: {err}"),
                file.to_path_buf(),
            )
            .with_location(location),
        );
    }
}

fn check_extractor(file: &Path, spec: &ExtractorSpec, location: &str, result: &mut LintResult) {
    match spec.source {
        ExtractorSource::Body => {
            if let Err(err) = extractor::validate_path(spec.method, &spec.path) {
                let code = if spec.method == ExtractionMethod::Regex {
                    "E004"
                } else {
                    "E005"
                };
                result.add_issue(
                    LintIssue::error(
                        code,
                        format!("Extractor '{}': {err}", spec.id),
                        file.to_path_buf(),
                    )
                    .with_location(location),
                );
            }
        }
        ExtractorSource::Header => {
            if spec.path.trim().is_empty() {
                result.add_issue(
                    LintIssue::error(
                        "E002",
                        format!("Extractor '{}' reads a header but names none", spec.id),
                        file.to_path_buf(),
                    )
                    .with_location(location)
                    .with_suggestion("Set path to the header name"),
                );
            }
        }
        ExtractorSource::Status => {}
    }
}

/// Validate a mock rule list.
pub fn validate_rules(file: &Path, rules: &[Value], result: &mut LintResult) {
    for (index, value) in rules.iter().enumerate() {
        let location = format!("rules[{index}]");
        let rule: MockRule = match serde_json::from_value(value.clone()) {
            Ok(rule) => rule,
            Err(err) => {
                result.add_issue(
                    LintIssue::error("E002", format!("Malformed rule: {err}"), file.to_path_buf())
                        .with_location(location),
                );
                continue;
            }
        };
        let label = rule.name.as_deref().unwrap_or(&rule.id);

        if !rule.enabled {
            result.add_issue(
                LintIssue::info(
                    "I001",
                    format!("Rule '{label}' is disabled and never matches"),
                    file.to_path_buf(),
                )
                .with_location(location.clone()),
            );
        } else if rule.conditions.is_empty() {
            result.add_issue(
                LintIssue::error(
                    "E003",
                    format!("Rule '{label}' is enabled but has no conditions"),
                    file.to_path_buf(),
                )
                .with_location(location.clone())
                .with_suggestion("A rule with no conditions never matches; add one or disable the rule"),
            );
        }

        for (condition_index, condition) in rule.conditions.iter().enumerate() {
            let condition_location = format!("{location}.conditions[{condition_index}]");
            check_condition(file, condition, &condition_location, result);
        }
    }
}

fn check_condition(
    file: &Path,
    condition: &MockCondition,
    location: &str,
    result: &mut LintResult,
) {
    if condition.kind == ConditionKind::XPath {
        if let Err(err) = PathExpression::parse(&condition.pattern) {
            result.add_issue(
                LintIssue::error(
                    "E005",
                    format!("Invalid condition path: {err}"),
                    file.to_path_buf(),
                )
                .with_location(location),
            );
        }
        return;
    }
    if condition.is_regex {
        if let Err(err) = Regex::new(&condition.pattern) {
            result.add_issue(
                LintIssue::error(
                    "E004",
                    format!("Invalid condition regex: {err}"),
                    file.to_path_buf(),
                )
                .with_location(location),
            );
        }
    }
    if condition.kind == ConditionKind::Header
        && condition
            .header_name
            .as_deref()
            .map_or(true, |name| name.trim().is_empty())
    {
        result.add_issue(
            LintIssue::error("E002", "Header condition names no header", file.to_path_buf())
                .with_location(location)
                .with_suggestion("Set headerName"),
        );
    }
}
