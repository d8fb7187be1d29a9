//! Assay CLI
//!
//! Offline evaluation of captured exchanges against test definitions:
//! resolve path expressions, run assertion and extractor specs, dry-run
//! mock rule dispatch, and validate suite files.
//!
//! Usage:
//!   assay eval --document response.xml "//Order/Id"
//!   assay assert --spec assertions.json --response captured.json

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use serde::de::DeserializeOwned;

use assay_engine::assertion::{self, AssertionSpec, AssertionStatus};
use assay_engine::exchange::{RequestDescriptor, ResponseDescriptor};
use assay_engine::extractor::{self, ExtractorSpec};
use assay_engine::mock::{self, MockRule};
use assay_engine::scripting::RhaiScriptHost;
use assay_engine::suite::{self, TestSuite};
use assay_engine::{path, vars};

// ANSI color codes
const GREEN: &str = "\x1b[32m";
const RED: &str = "\x1b[31m";
const YELLOW: &str = "\x1b[33m";
const CYAN: &str = "\x1b[36m";
const BOLD: &str = "\x1b[1m";
const DIM: &str = "\x1b[2m";
const RESET: &str = "\x1b[0m";

/// Offline evaluation of captured API exchanges
#[derive(Parser, Debug)]
#[command(name = "assay")]
#[command(author, version, about, long_about = None)]
struct Args {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Evaluate a path expression against a document file
    Eval {
        /// Document file (XML or JSON)
        #[arg(short, long)]
        document: PathBuf,
        /// Path expression, slash or dotted form
        expression: String,
    },
    /// Synthesize a path expression for a byte offset in a document
    Locate {
        /// Document file (XML or JSON)
        #[arg(short, long)]
        document: PathBuf,
        /// Byte offset into the document
        offset: usize,
    },
    /// Run assertion specs against a captured response
    Assert {
        /// Assertion list, JSON or YAML
        #[arg(short, long)]
        spec: PathBuf,
        /// Captured response descriptor, JSON or YAML
        #[arg(short, long)]
        response: PathBuf,
        /// Print results as JSON
        #[arg(long)]
        json: bool,
    },
    /// Run extractor specs against a captured response
    Extract {
        /// Extractor list, JSON or YAML
        #[arg(short, long)]
        spec: PathBuf,
        /// Captured response descriptor, JSON or YAML
        #[arg(short, long)]
        response: PathBuf,
        /// Print the variable map as JSON
        #[arg(long)]
        json: bool,
    },
    /// Dry-run mock dispatch: which rule answers a request
    Match {
        /// Rule list, JSON or YAML
        #[arg(short, long)]
        rules: PathBuf,
        /// Request descriptor, JSON or YAML
        #[arg(short = 'q', long)]
        request: PathBuf,
    },
    /// Validate a suite definition
    Check {
        /// Suite file, JSON or YAML
        suite: PathBuf,
    },
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive(tracing::Level::WARN.into()),
        )
        .with_writer(std::io::stderr)
        .init();

    let args = Args::parse();
    match args.command {
        Command::Eval {
            document,
            expression,
        } => run_eval(&document, &expression),
        Command::Locate { document, offset } => run_locate(&document, offset),
        Command::Assert {
            spec,
            response,
            json,
        } => run_assert(&spec, &response, json),
        Command::Extract {
            spec,
            response,
            json,
        } => run_extract(&spec, &response, json),
        Command::Match { rules, request } => run_match(&rules, &request),
        Command::Check { suite } => run_check(&suite),
    }
}

fn run_eval(document: &Path, expression: &str) -> Result<()> {
    let text = read(document)?;
    match path::evaluate(&text, expression)? {
        Some(value) => {
            println!("{value}");
            Ok(())
        }
        None => {
            eprintln!("{DIM}no match{RESET}");
            std::process::exit(1);
        }
    }
}

fn run_locate(document: &Path, offset: usize) -> Result<()> {
    let text = read(document)?;
    match path::generate(&text, offset) {
        Some(expression) => {
            println!("{expression}");
            Ok(())
        }
        None => {
            eprintln!("{DIM}offset {offset} is not addressable{RESET}");
            std::process::exit(1);
        }
    }
}

fn run_assert(spec: &Path, response: &Path, json: bool) -> Result<()> {
    let specs: Vec<AssertionSpec> = load(spec)?;
    let response: ResponseDescriptor = load(response)?;
    let results = assertion::evaluate(&specs, &response, &RhaiScriptHost);

    if json {
        println!("{}", serde_json::to_string_pretty(&results)?);
    } else {
        for result in &results {
            let status = match result.status {
                AssertionStatus::Pass => format!("{GREEN}PASS {RESET}"),
                AssertionStatus::Fail => format!("{RED}FAIL {RESET}"),
                AssertionStatus::Error => format!("{YELLOW}ERROR{RESET}"),
            };
            let label = result.name.as_deref().unwrap_or(&result.id);
            match &result.message {
                Some(message) => println!("{status} {BOLD}{label}{RESET}: {message}"),
                None => println!("{status} {BOLD}{label}{RESET}"),
            }
        }
    }

    let troubled = results
        .iter()
        .filter(|r| r.status != AssertionStatus::Pass)
        .count();
    if troubled > 0 {
        if !json {
            println!(
                "\n{RED}{BOLD}{troubled}{RESET}{RED} of {} assertion(s) did not pass{RESET}",
                results.len()
            );
        }
        std::process::exit(1);
    }
    if !json {
        println!("\n{GREEN}{BOLD}All {} assertion(s) passed{RESET}", results.len());
    }
    Ok(())
}

fn run_extract(spec: &Path, response: &Path, json: bool) -> Result<()> {
    let specs: Vec<ExtractorSpec> = load(spec)?;
    let response: ResponseDescriptor = load(response)?;
    let variables = extractor::evaluate(&specs, &response);

    if json {
        println!("{}", serde_json::to_string_pretty(&variables)?);
        return Ok(());
    }
    let mut pairs: Vec<_> = variables.iter().collect();
    pairs.sort();
    for (name, value) in pairs {
        println!("{CYAN}{name}{RESET}={value}");
    }
    Ok(())
}

fn run_match(rules: &Path, request: &Path) -> Result<()> {
    let rules: Vec<MockRule> = load(rules)?;
    let request: RequestDescriptor = load(request)?;
    match mock::match_rules(&rules, &request) {
        Some(rule) => {
            let label = rule.name.as_deref().unwrap_or(&rule.id);
            println!(
                "{GREEN}matched{RESET} {BOLD}{label}{RESET} -> status {}",
                rule.status_code
            );
            Ok(())
        }
        None => {
            eprintln!("{YELLOW}no rule matched{RESET}");
            std::process::exit(1);
        }
    }
}

fn run_check(path: &Path) -> Result<()> {
    let suite: TestSuite = load(path)?;
    let problems = suite::validate_suite(&suite);
    if problems.is_empty() {
        let steps: usize = suite.test_cases.iter().map(|c| c.steps.len()).sum();
        println!(
            "{GREEN}{BOLD}OK{RESET} {} case(s), {} step(s)",
            suite.test_cases.len(),
            steps
        );
        for case in &suite.test_cases {
            for step in &case.steps {
                if let Some(request) = &step.request {
                    if vars::has_variables(&request.body) {
                        println!(
                            "  {DIM}step '{}' substitutes variables into its request{RESET}",
                            step.name
                        );
                    }
                }
            }
        }
        return Ok(());
    }
    for problem in &problems {
        println!("{RED}error{RESET}: {problem}");
    }
    std::process::exit(1);
}

fn read(path: &Path) -> Result<String> {
    std::fs::read_to_string(path).with_context(|| format!("failed to read {}", path.display()))
}

/// JSON unless the extension says YAML.
fn load<T: DeserializeOwned>(path: &Path) -> Result<T> {
    let content = read(path)?;
    let yaml = matches!(
        path.extension().and_then(|e| e.to_str()),
        Some("yaml") | Some("yml")
    );
    if yaml {
        serde_yaml::from_str(&content).with_context(|| format!("failed to parse {}", path.display()))
    } else {
        serde_json::from_str(&content).with_context(|| format!("failed to parse {}", path.display()))
    }
}
