//! Script execution behind an injected capability.
//!
//! Script assertions run through a [`ScriptHost`], keeping the assertion
//! engine independent of the scripting runtime. The built-in host runs
//! rhai; embedders can substitute a subprocess or WASM host without
//! touching anything else.

mod rhai_host;
pub use rhai_host::RhaiScriptHost;

use std::collections::HashMap;

/// Inputs a script sees.
#[derive(Debug, Clone, Default)]
pub struct ScriptBindings {
    /// Raw response body, bound as `response`.
    pub response: String,
    /// Bound as `statusCode`.
    pub status_code: u16,
    /// Mutable key/value store shared across a test-case run; handed back
    /// in [`ScriptRun::context`] as the script left it.
    pub context: HashMap<String, String>,
}

/// Outcome of one script evaluation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ScriptVerdict {
    Pass,
    /// `fail(reason)` was called, or the script returned a falsy value
    /// (`None` reason).
    Fail(Option<String>),
    /// The script raised; the message is preserved.
    Error(String),
}

/// Everything one script run produces.
#[derive(Debug, Clone)]
pub struct ScriptRun {
    pub verdict: ScriptVerdict,
    /// `log(...)` lines in call order.
    pub logs: Vec<String>,
    /// Last `goto(...)` target. The engine records the request; acting on
    /// it, and rejecting unknown step names, is the step runner's job.
    pub goto_request: Option<String>,
    pub context: HashMap<String, String>,
}

/// Capability that executes Script assertions.
pub trait ScriptHost: Send + Sync {
    fn run(&self, script: &str, bindings: ScriptBindings) -> ScriptRun;
}

/// Host for callers that do not wire up scripting; every run errors.
pub struct NoScriptHost;

impl ScriptHost for NoScriptHost {
    fn run(&self, _script: &str, bindings: ScriptBindings) -> ScriptRun {
        ScriptRun {
            verdict: ScriptVerdict::Error("no script host configured".to_string()),
            logs: Vec::new(),
            goto_request: None,
            context: bindings.context,
        }
    }
}
