//! Static checks for suite and mock rule definition files.
//!
//! The linter parses each file (JSON, or YAML when the extension says so)
//! and reports the problems the engine would otherwise only surface at run
//! time: unknown assertion types, malformed path expressions, jumps to
//! steps that do not exist, rules that can never match.
//!
//! # Example
//!
//! ```
//! let result = assay_lint::lint_str(
//!     r#"{"testCases": [{"name": "smoke", "steps": [{"name": "call"}]}]}"#,
//!     "suite.json",
//! );
//! assert!(result.is_valid());
//! ```
//!
//! Issue codes are stable: `E...` entries block a run, `W...` entries are
//! worth a look, `I...` entries are informational.

mod types;
mod validator;

pub use types::{LintIssue, LintResult, Severity};
pub use validator::{validate_definition, validate_rules, validate_suite};

use std::path::Path;

use serde_json::Value;

/// Lint one definition file from disk.
pub fn lint_file(path: &Path) -> LintResult {
    let mut result = LintResult::new();
    result.files_checked = 1;
    match std::fs::read_to_string(path) {
        Ok(content) => lint_content(&content, path, result),
        Err(err) => {
            result.add_issue(LintIssue::error(
                "E001",
                format!("Cannot read file: {err}"),
                path.to_path_buf(),
            ));
            result
        }
    }
}

/// Lint definition content already in memory. `source_name` shows up in the
/// issues and picks the parser by extension.
pub fn lint_str(content: &str, source_name: &str) -> LintResult {
    let mut result = LintResult::new();
    result.files_checked = 1;
    lint_content(content, Path::new(source_name), result)
}

fn lint_content(content: &str, path: &Path, mut result: LintResult) -> LintResult {
    match parse_by_extension(content, path) {
        Ok(value) => validator::validate_definition(path, &value, &mut result),
        Err(err) => result.add_issue(LintIssue::error(
            "E001",
            format!("Cannot parse file: {err}"),
            path.to_path_buf(),
        )),
    }
    result
}

fn parse_by_extension(content: &str, path: &Path) -> Result<Value, String> {
    let extension = path.extension().and_then(|e| e.to_str()).unwrap_or("");
    if extension.eq_ignore_ascii_case("yaml") || extension.eq_ignore_ascii_case("yml") {
        serde_yaml::from_str(content).map_err(|err| err.to_string())
    } else {
        serde_json::from_str(content).map_err(|err| err.to_string())
    }
}
