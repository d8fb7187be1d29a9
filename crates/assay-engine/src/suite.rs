//! Test definition types: suites, cases, and steps, plus the structural
//! validation a definition must pass before a runner touches it.

use std::collections::HashSet;

use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::assertion::AssertionSpec;
use crate::exchange::RequestDescriptor;
use crate::extractor::{self, ExtractorSpec};

/// A named collection of test cases.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TestSuite {
    pub name: String,
    #[serde(default)]
    pub test_cases: Vec<TestCase>,
}

/// Steps that run in order, sharing one variable context.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TestCase {
    pub name: String,
    #[serde(default)]
    pub steps: Vec<TestStep>,
}

/// One step: optionally a request to send, then assertions, extractions,
/// and an optional script against the captured response.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TestStep {
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub request: Option<RequestDescriptor>,
    #[serde(default)]
    pub assertions: Vec<AssertionSpec>,
    #[serde(default)]
    pub extractors: Vec<ExtractorSpec>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub script: Option<String>,
    /// Pause before the step runs, in milliseconds.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub delay_ms: Option<u64>,
}

/// A structural problem in a definition.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DefinitionError {
    #[error("duplicate step name '{step}' in case '{case}'")]
    DuplicateStepName { case: String, step: String },
    #[error("step '{step}' jumps to unknown step '{target}'")]
    UnknownGotoTarget {
        case: String,
        step: String,
        target: String,
    },
    #[error("variable '{variable}' is extracted more than once in case '{case}'")]
    DuplicateVariable { case: String, variable: String },
}

static GOTO_LITERAL: Lazy<Regex> =
    Lazy::new(|| Regex::new(r#"goto\s*\(?\s*"([^"]+)""#).unwrap());

/// String-literal jump targets appearing in a script. Computed targets
/// cannot be seen statically and are not reported.
pub fn goto_targets(script: &str) -> Vec<String> {
    GOTO_LITERAL
        .captures_iter(script)
        .map(|caps| caps[1].to_string())
        .collect()
}

/// Every structural problem in one case: step names must be unique, literal
/// goto targets must name existing steps, and extractor variables must not
/// collide across steps.
pub fn validate_case(case: &TestCase) -> Vec<DefinitionError> {
    let mut problems = Vec::new();

    let mut seen = HashSet::new();
    for step in &case.steps {
        if !seen.insert(step.name.as_str()) {
            problems.push(DefinitionError::DuplicateStepName {
                case: case.name.clone(),
                step: step.name.clone(),
            });
        }
    }

    let step_names: HashSet<&str> = case.steps.iter().map(|s| s.name.as_str()).collect();
    for step in &case.steps {
        let Some(script) = step.script.as_deref() else {
            continue;
        };
        for target in goto_targets(script) {
            if !step_names.contains(target.as_str()) {
                problems.push(DefinitionError::UnknownGotoTarget {
                    case: case.name.clone(),
                    step: step.name.clone(),
                    target,
                });
            }
        }
    }

    let all_extractors: Vec<ExtractorSpec> = case
        .steps
        .iter()
        .flat_map(|step| step.extractors.iter().cloned())
        .collect();
    for variable in extractor::duplicate_variables(&all_extractors) {
        problems.push(DefinitionError::DuplicateVariable {
            case: case.name.clone(),
            variable,
        });
    }

    problems
}

/// [`validate_case`] over every case of a suite.
pub fn validate_suite(suite: &TestSuite) -> Vec<DefinitionError> {
    suite.test_cases.iter().flat_map(validate_case).collect()
}
