//! Built-in commands bundled with every [`Engine`][crate::Engine]: the
//! registry accessors and the expression-evaluation commands the lowerer
//! targets when rewriting assignments (§4.5, §6).

use crate::eval::{evaluate, evaluate_numeric, is_boolean_expression};
use crate::runtime::{Command, CommandResult};
use crate::value::{parse_typed_value, Registry, Value};

/// Resolve a `setValue` raw argument against `registry` before type-parsing:
/// a literal (`5`, `"text"`, `true`) is used as-is, anything else is run
/// through the expression evaluator first (`counter+1`, `x*2`) so scripts can
/// pass an expression directly instead of pre-computing it with `Evaluate`.
fn resolve_raw(raw: &str, type_name: &str, registry: &Registry) -> String {
    match type_name {
        "Wint" => match raw.parse::<i64>() {
            Ok(_) => raw.to_string(),
            Err(_) => evaluate_numeric(raw, registry).map(|n| (n as i64).to_string()).unwrap_or_else(|_| raw.to_string()),
        },
        "Wdouble" => match raw.parse::<f64>() {
            Ok(_) => raw.to_string(),
            Err(_) => evaluate_numeric(raw, registry).map(|n| n.to_string()).unwrap_or_else(|_| raw.to_string()),
        },
        "Wbool" => match raw.parse::<bool>() {
            Ok(_) => raw.to_string(),
            Err(_) => evaluate(raw, registry).map(|b| b.to_string()).unwrap_or_else(|_| raw.to_string()),
        },
        _ => raw.to_string(),
    }
}

/// `setValue(key, raw, type)` — parse `raw` as `type` (`Wstring`/`Wint`/`Wdouble`/`Wbool`)
/// and store it under `key`, replacing any existing entry. `raw` may itself
/// be an expression (`counter+1`), evaluated against the registry first.
pub struct SetValue;

impl Command for SetValue {
    fn name(&self) -> &str {
        "setValue"
    }
    fn description(&self) -> &str {
        "parse and store a typed value under a key"
    }
    fn parameter_count(&self) -> usize {
        3
    }
    fn execute(&self, args: &[String], registry: &mut Registry) -> CommandResult {
        let [key, raw, type_name] = args else {
            return CommandResult::fail("setValue expects (key, value, type)");
        };
        let resolved = resolve_raw(raw, type_name, registry);
        match parse_typed_value(&resolved, type_name) {
            Ok(value) => {
                registry.set(key, value.clone());
                CommandResult::ok_with_value(format!("Registered {} = {}", key, value), value)
            }
            Err(err) => CommandResult::fail(err.message()),
        }
    }
    fn try_run(&self, args: &[String], _registry: &Registry) -> Option<CommandResult> {
        let [key, raw, type_name] = args else { return None };
        Some(CommandResult::ok(format!("would set {} to {} ({})", key, raw, type_name)))
    }
}

/// `getValue(key)` — fetch a value by key.
pub struct GetValue;

impl Command for GetValue {
    fn name(&self) -> &str {
        "getValue"
    }
    fn description(&self) -> &str {
        "read a value by key"
    }
    fn parameter_count(&self) -> usize {
        1
    }
    fn execute(&self, args: &[String], registry: &mut Registry) -> CommandResult {
        let [key] = args else {
            return CommandResult::fail("getValue expects (key)");
        };
        match registry.get_typed(key) {
            Some((value, _)) => {
                CommandResult::ok_with_value(format!("Retrieved key '{}' = {}", key, value), value.clone())
            }
            None => CommandResult::fail(format!("'{}' not found", key)),
        }
    }
}

/// `deleteValue(key)` — remove a key and its children, if any.
pub struct DeleteValue;

impl Command for DeleteValue {
    fn name(&self) -> &str {
        "deleteValue"
    }
    fn description(&self) -> &str {
        "remove a key from the registry"
    }
    fn parameter_count(&self) -> usize {
        1
    }
    fn execute(&self, args: &[String], registry: &mut Registry) -> CommandResult {
        let [key] = args else {
            return CommandResult::fail("deleteValue expects (key)");
        };
        if registry.remove(key) {
            CommandResult::ok(format!("Deleted '{}'", key))
        } else {
            CommandResult::fail(format!("'{}' not found", key))
        }
    }
    fn try_run(&self, args: &[String], registry: &Registry) -> Option<CommandResult> {
        let [key] = args else { return None };
        if registry.get_typed(key).is_some() {
            Some(CommandResult::ok(format!("would remove '{}'", key)))
        } else {
            Some(CommandResult::fail(format!("'{}' not found", key)))
        }
    }
}

/// `memory()` — dump every registered key/value, for debugging a running script.
pub struct Memory;

impl Command for Memory {
    fn name(&self) -> &str {
        "memory"
    }
    fn description(&self) -> &str {
        "dump the registry"
    }
    fn parameter_count(&self) -> usize {
        0
    }
    fn execute(&self, _args: &[String], registry: &mut Registry) -> CommandResult {
        CommandResult::ok(registry.dump())
    }
}

/// `Print(text)` — substitute registry variables into `text` and surface it as
/// the result message. Does not write to stdout itself; hosts decide what to
/// do with a successful result's message (see `weave-cli`).
pub struct Print;

impl Command for Print {
    fn name(&self) -> &str {
        "Print"
    }
    fn description(&self) -> &str {
        "render text with registry variables substituted"
    }
    fn parameter_count(&self) -> usize {
        1
    }
    fn execute(&self, args: &[String], registry: &mut Registry) -> CommandResult {
        let [text] = args else {
            return CommandResult::fail("Print expects (text)");
        };
        CommandResult::ok(registry.replace_variables(text))
    }
}

/// `Evaluate(expr[, key])` — evaluate an expression and, if a second argument
/// is given, store the result under that key. Resolves the §9 open question
/// of what type gets stored: a boolean-shaped expression stores a `Bool`,
/// anything else stores a `Double` (see DESIGN.md).
pub struct Evaluate;

impl Evaluate {
    fn run(args: &[String], registry: &mut Registry) -> CommandResult {
        let expr = match args.first() {
            Some(e) => e,
            None => return CommandResult::fail("Evaluate expects (expr[, key])"),
        };
        let value = if is_boolean_expression(expr) {
            match evaluate(expr, registry) {
                Ok(b) => Value::Bool(b),
                Err(err) => return CommandResult::fail(err.message()),
            }
        } else {
            match evaluate_numeric(expr, registry) {
                Ok(n) => Value::Double(n),
                Err(err) => return CommandResult::fail(err.message()),
            }
        };
        if let Some(key) = args.get(1) {
            registry.set(key, value.clone());
        }
        CommandResult::ok_with_value(value.to_string(), value)
    }
}

impl Command for Evaluate {
    fn name(&self) -> &str {
        "Evaluate"
    }
    fn description(&self) -> &str {
        "evaluate an expression, optionally storing the result"
    }
    fn parameter_count(&self) -> usize {
        0 // variadic: 1 or 2 args
    }
    fn execute(&self, args: &[String], registry: &mut Registry) -> CommandResult {
        Self::run(args, registry)
    }
}

/// `EvaluateCommand(expr, key)` — the lowerer's rewrite target for a plain
/// `key = expr;` assignment (§4.5). Behaves like `Evaluate` with a mandatory
/// target key; kept as a distinct registration so a host can tell the two
/// apart in traces.
pub struct EvaluateCommand;

impl Command for EvaluateCommand {
    fn name(&self) -> &str {
        "EvaluateCommand"
    }
    fn description(&self) -> &str {
        "evaluate an expression and store the result (assignment rewrite target)"
    }
    fn parameter_count(&self) -> usize {
        2
    }
    fn execute(&self, args: &[String], registry: &mut Registry) -> CommandResult {
        Evaluate::run(args, registry)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::runtime::CommandRuntime;

    fn runtime_with_builtins() -> CommandRuntime {
        let mut rt = CommandRuntime::new();
        rt.register(SetValue);
        rt.register(GetValue);
        rt.register(DeleteValue);
        rt.register(Memory);
        rt.register(Print);
        rt.register(Evaluate);
        rt.register(EvaluateCommand);
        rt
    }

    #[test]
    fn set_and_get_value_round_trip() {
        let mut rt = runtime_with_builtins();
        let mut reg = Registry::new();
        let result = rt.process_input("setValue(score, 42, Wint)", &mut reg);
        assert!(result.success);
        let result = rt.process_input("getValue(score)", &mut reg);
        assert_eq!(result.value, Some(Value::Int(42)));
    }

    #[test]
    fn evaluate_stores_boolean_result() {
        let mut rt = runtime_with_builtins();
        let mut reg = Registry::new();
        reg.set("x", Value::Int(5));
        let result = rt.process_input("Evaluate(x>0, flag)", &mut reg);
        assert!(result.success);
        assert_eq!(reg.get_bool("flag"), Some(true));
    }

    #[test]
    fn evaluate_command_matches_assignment_rewrite() {
        let mut rt = runtime_with_builtins();
        let mut reg = Registry::new();
        reg.set("x", Value::Int(10));
        let result = rt.process_input("EvaluateCommand(x * 2, doubled)", &mut reg);
        assert!(result.success);
        assert_eq!(reg.get_double("doubled"), Some(20.0));
    }

    #[test]
    fn delete_value_fails_on_unknown_key() {
        let mut rt = runtime_with_builtins();
        let mut reg = Registry::new();
        let result = rt.process_input("deleteValue(nope)", &mut reg);
        assert!(!result.success);
    }

    #[test]
    fn memory_dumps_registry() {
        let mut rt = runtime_with_builtins();
        let mut reg = Registry::new();
        reg.set("a", Value::Int(1));
        let result = rt.process_input("memory()", &mut reg);
        assert!(result.message.contains("a = 1"));
    }
}
