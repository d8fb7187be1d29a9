//! Command line front end for the definition linter.
//!
//! Usage:
//!
//! ```text
//! assay-lint suites/
//! assay-lint suite.json --strict
//! assay-lint rules.yaml --output json
//! ```
//!
//! Exits non-zero when any error is found, or when `--strict` is set and
//! any warning is found.

use std::path::{Path, PathBuf};
use std::process;

use clap::Parser;

use assay_lint::{lint_file, LintResult, Severity};

const GREEN: &str = "\x1b[32m";
const RED: &str = "\x1b[31m";
const YELLOW: &str = "\x1b[33m";
const CYAN: &str = "\x1b[36m";
const BOLD: &str = "\x1b[1m";
const DIM: &str = "\x1b[2m";
const RESET: &str = "\x1b[0m";

#[derive(Parser, Debug)]
#[command(name = "assay-lint")]
#[command(author, version)]
#[command(about = "Lint suite and mock rule definition files", long_about = None)]
struct Args {
    /// Definition file or directory to lint
    path: PathBuf,

    /// Output format: text or json
    #[arg(short, long, default_value = "text")]
    output: String,

    /// Only show errors, not warnings or info
    #[arg(short, long)]
    errors_only: bool,

    /// Treat warnings as errors for the exit code
    #[arg(short, long)]
    strict: bool,

    /// Also list files that produced no issues
    #[arg(short, long)]
    verbose: bool,
}

fn main() {
    let args = Args::parse();

    let files = collect_files(&args.path);
    if files.is_empty() {
        eprintln!(
            "{RED}No definition files found under {}{RESET}",
            args.path.display()
        );
        process::exit(1);
    }

    let mut combined = LintResult::new();
    for file in &files {
        combined.merge(lint_file(file));
    }

    match args.output.as_str() {
        "json" => print_json(&combined),
        _ => print_text(&combined, &files, &args),
    }

    let failed = combined.has_errors() || (args.strict && combined.has_warnings());
    process::exit(if failed { 1 } else { 0 });
}

fn collect_files(path: &Path) -> Vec<PathBuf> {
    let mut files = Vec::new();
    collect_into(path, &mut files);
    files.sort();
    files
}

fn collect_into(path: &Path, files: &mut Vec<PathBuf>) {
    if path.is_file() {
        files.push(path.to_path_buf());
        return;
    }
    let Ok(entries) = std::fs::read_dir(path) else {
        return;
    };
    for entry in entries.flatten() {
        let entry_path = entry.path();
        if entry_path.is_dir() {
            collect_into(&entry_path, files);
        } else if is_definition_file(&entry_path) {
            files.push(entry_path);
        }
    }
}

fn is_definition_file(path: &Path) -> bool {
    matches!(
        path.extension().and_then(|e| e.to_str()),
        Some("json") | Some("yaml") | Some("yml")
    )
}

fn print_text(result: &LintResult, files: &[PathBuf], args: &Args) {
    println!("{BOLD}Assay definition lint{RESET}");
    println!();

    for file in files {
        let issues: Vec<_> = result
            .issues
            .iter()
            .filter(|issue| issue.file == *file)
            .filter(|issue| !args.errors_only || issue.severity == Severity::Error)
            .collect();

        if issues.is_empty() {
            if args.verbose {
                println!("{GREEN}✓{RESET} {}", file.display());
            }
            continue;
        }

        println!("{BOLD}{}{RESET}", file.display());
        for issue in issues {
            let (marker, color) = match issue.severity {
                Severity::Error => ("✗", RED),
                Severity::Warning => ("⚠", YELLOW),
                Severity::Info => ("ℹ", CYAN),
            };
            print!(
                "  {color}{marker} {}{RESET} [{}] {}",
                issue.severity.label(),
                issue.code,
                issue.message
            );
            if let Some(location) = &issue.location {
                print!(" {DIM}({location}){RESET}");
            }
            println!();
            if let Some(suggestion) = &issue.suggestion {
                println!("      {DIM}hint: {suggestion}{RESET}");
            }
        }
        println!();
    }

    print_summary(result, args.strict);
}

fn print_summary(result: &LintResult, strict: bool) {
    println!("{DIM}{}{RESET}", "━".repeat(46));
    let verdict = if result.has_errors() {
        format!("{RED}{BOLD}FAILED{RESET}")
    } else if strict && result.has_warnings() {
        format!("{YELLOW}{BOLD}FAILED (strict){RESET}")
    } else {
        format!("{GREEN}{BOLD}PASSED{RESET}")
    };
    println!(
        "{verdict}  {} file(s) checked, {RED}{} error(s){RESET}, {YELLOW}{} warning(s){RESET}",
        result.files_checked, result.errors, result.warnings
    );
    println!("{DIM}{}{RESET}", "━".repeat(46));
}

fn print_json(result: &LintResult) {
    match serde_json::to_string_pretty(result) {
        Ok(json) => println!("{json}"),
        Err(err) => {
            eprintln!("{RED}Failed to encode result: {err}{RESET}");
            process::exit(1);
        }
    }
}
