use std::sync::Arc;
use std::time::Duration;

use anyhow::{anyhow, Result};
use parking_lot::Mutex;
use rhai::{Dynamic, Engine, Map, Scope};
use tracing::debug;

use super::{ScriptBindings, ScriptHost, ScriptRun, ScriptVerdict};

/// Longest single `delay(ms)` the host honors.
const MAX_DELAY_MS: i64 = 10_000;

/// Operation budget guarding runaway scripts.
const MAX_OPERATIONS: u64 = 500_000;

/// Built-in [`ScriptHost`] running rhai.
///
/// Each run gets a fresh engine with `log`, `fail`, `delay` and `goto`
/// registered and the bindings pushed into scope. `goto` is a reserved
/// rhai token, so it is wired up as custom syntax; both `goto("Step")`
/// and `goto "Step"` parse.
#[derive(Debug, Default)]
pub struct RhaiScriptHost;

#[derive(Default)]
struct SideEffects {
    logs: Mutex<Vec<String>>,
    fail_reason: Mutex<Option<String>>,
    goto_request: Mutex<Option<String>>,
}

impl ScriptHost for RhaiScriptHost {
    fn run(&self, script: &str, bindings: ScriptBindings) -> ScriptRun {
        let effects = Arc::new(SideEffects::default());
        let engine = match build_engine(&effects) {
            Ok(engine) => engine,
            Err(err) => return aborted(format!("{err}"), bindings),
        };

        let ast = match engine.compile(script) {
            Ok(ast) => ast,
            Err(err) => return aborted(format!("failed to compile script: {err}"), bindings),
        };

        let mut scope = Scope::new();
        scope.push("response", bindings.response.clone());
        scope.push("statusCode", bindings.status_code as i64);
        let mut context_map = Map::new();
        for (key, value) in &bindings.context {
            context_map.insert(key.clone().into(), Dynamic::from(value.clone()));
        }
        scope.push("context", context_map);

        let outcome = engine.eval_ast_with_scope::<Dynamic>(&mut scope, &ast);
        let fail_reason = effects.fail_reason.lock().take();

        // An explicit fail() wins even when the script caught the raise
        // it triggers.
        let verdict = match (outcome, fail_reason) {
            (_, Some(reason)) => ScriptVerdict::Fail(Some(reason)),
            (Ok(value), None) => {
                if truthy(&value) {
                    ScriptVerdict::Pass
                } else {
                    ScriptVerdict::Fail(None)
                }
            }
            (Err(err), None) => ScriptVerdict::Error(err.to_string()),
        };

        let context = scope
            .get_value::<Map>("context")
            .map(|map| {
                map.into_iter()
                    .map(|(key, value)| (key.to_string(), plain_string(value)))
                    .collect()
            })
            .unwrap_or(bindings.context);

        let logs = std::mem::take(&mut *effects.logs.lock());
        let goto_request = effects.goto_request.lock().take();
        debug!(?verdict, logs = logs.len(), "script run complete");

        ScriptRun {
            verdict,
            logs,
            goto_request,
            context,
        }
    }
}

fn build_engine(effects: &Arc<SideEffects>) -> Result<Engine> {
    let mut engine = Engine::new();
    engine.set_max_operations(MAX_OPERATIONS);
    engine.set_max_call_levels(32);

    let sink = Arc::clone(effects);
    engine.register_fn("log", move |value: Dynamic| {
        sink.logs.lock().push(value.to_string());
    });

    let sink = Arc::clone(effects);
    engine.on_print(move |text| sink.logs.lock().push(text.to_string()));

    let sink = Arc::clone(effects);
    engine.register_fn(
        "fail",
        move |reason: &str| -> std::result::Result<(), Box<rhai::EvalAltResult>> {
            *sink.fail_reason.lock() = Some(reason.to_string());
            Err(format!("assertion failed: {reason}").into())
        },
    );

    engine.register_fn("delay", |ms: i64| {
        let ms = ms.clamp(0, MAX_DELAY_MS);
        std::thread::sleep(Duration::from_millis(ms as u64));
    });

    let sink = Arc::clone(effects);
    engine
        .register_custom_syntax(["goto", "$expr$"], false, move |context, inputs| {
            let target = context.eval_expression_tree(&inputs[0])?;
            *sink.goto_request.lock() = Some(target.to_string());
            Ok(Dynamic::UNIT)
        })
        .map_err(|err| anyhow!("failed to register goto syntax: {err}"))?;

    Ok(engine)
}

fn aborted(message: String, bindings: ScriptBindings) -> ScriptRun {
    ScriptRun {
        verdict: ScriptVerdict::Error(message),
        logs: Vec::new(),
        goto_request: None,
        context: bindings.context,
    }
}

fn truthy(value: &Dynamic) -> bool {
    if value.is_unit() {
        return false;
    }
    if let Ok(flag) = value.as_bool() {
        return flag;
    }
    if let Ok(int) = value.as_int() {
        return int != 0;
    }
    if let Ok(float) = value.as_float() {
        return float != 0.0;
    }
    if let Some(text) = value.clone().try_cast::<String>() {
        return !text.is_empty();
    }
    true
}

fn plain_string(value: Dynamic) -> String {
    match value.clone().try_cast::<String>() {
        Some(text) => text,
        None => value.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn run(script: &str, bindings: ScriptBindings) -> ScriptRun {
        RhaiScriptHost.run(script, bindings)
    }

    fn with_response(body: &str, status: u16) -> ScriptBindings {
        ScriptBindings {
            response: body.to_string(),
            status_code: status,
            context: HashMap::new(),
        }
    }

    #[test]
    fn truthy_return_passes() {
        let run = run("statusCode == 200", with_response("", 200));
        assert_eq!(run.verdict, ScriptVerdict::Pass);
    }

    #[test]
    fn falsy_and_unit_returns_fail() {
        assert_eq!(
            run("statusCode == 200", with_response("", 500)).verdict,
            ScriptVerdict::Fail(None)
        );
        assert_eq!(
            run("let x = 1;", with_response("", 200)).verdict,
            ScriptVerdict::Fail(None)
        );
    }

    #[test]
    fn explicit_fail_carries_the_reason() {
        let script = r#"
            if response.contains("fault") {
                fail("server reported a fault");
            }
            true
        "#;
        let run = run(script, with_response("<soap:Fault/>", 500));
        assert_eq!(
            run.verdict,
            ScriptVerdict::Fail(Some("server reported a fault".to_string()))
        );
    }

    #[test]
    fn fail_wins_even_when_caught() {
        let script = r#"
            try { fail("inner") } catch { }
            true
        "#;
        let run = run(script, with_response("", 200));
        assert_eq!(run.verdict, ScriptVerdict::Fail(Some("inner".to_string())));
    }

    #[test]
    fn logs_collect_in_call_order() {
        let script = r#"
            log("first");
            log(2);
            print("third");
            true
        "#;
        let run = run(script, with_response("", 200));
        assert_eq!(run.verdict, ScriptVerdict::Pass);
        assert_eq!(run.logs, vec!["first", "2", "third"]);
    }

    #[test]
    fn goto_records_the_last_target() {
        let script = r#"
            goto("Login");
            goto "Checkout";
            true
        "#;
        let run = run(script, with_response("", 200));
        assert_eq!(run.goto_request.as_deref(), Some("Checkout"));
        assert_eq!(run.verdict, ScriptVerdict::Pass);
    }

    #[test]
    fn context_mutations_come_back() {
        let mut context = HashMap::new();
        context.insert("orderId".to_string(), "1001".to_string());
        let script = r#"
            context.attempt = "2";
            context.orderId + "" != ""
        "#;
        let run = run(
            script,
            ScriptBindings {
                response: String::new(),
                status_code: 200,
                context,
            },
        );
        assert_eq!(run.verdict, ScriptVerdict::Pass);
        assert_eq!(run.context.get("orderId").map(String::as_str), Some("1001"));
        assert_eq!(run.context.get("attempt").map(String::as_str), Some("2"));
    }

    #[test]
    fn uncaught_errors_surface_as_error_verdict() {
        let run = run(r#"throw "kaput";"#, with_response("", 200));
        match run.verdict {
            ScriptVerdict::Error(message) => assert!(message.contains("kaput")),
            other => panic!("expected error verdict, got {other:?}"),
        }
    }

    #[test]
    fn compile_errors_surface_as_error_verdict() {
        let run = run("fn broken(", with_response("", 200));
        assert!(matches!(run.verdict, ScriptVerdict::Error(_)));
    }

    #[test]
    fn delay_accepts_small_pauses() {
        let run = run("delay(1); true", with_response("", 200));
        assert_eq!(run.verdict, ScriptVerdict::Pass);
    }
}
