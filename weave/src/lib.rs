//! Weave: an embedded scripting engine for host applications that want a
//! small, auditable command language rather than a general-purpose VM.
//!
//! A script is lexed ([`lexer`]), parsed into an ordered node list
//! ([`parser`]), lowered into a flat, jump-addressable instruction list
//! ([`lower`]), and then walked one instruction at a time by an
//! [`exec::Executor`], which dispatches commands through a
//! [`runtime::CommandRuntime`] against a typed [`value::Registry`].
//! [`eval`] is the standalone expression evaluator both `If_Condition`/
//! `While_Condition` instructions and the `Evaluate` family of commands use.
//!
//! [`Engine`] wires these pieces together into the single type most callers
//! need.

pub mod ast;
pub mod cmd_syntax;
pub mod commands;
pub mod error;
pub mod eval;
pub mod exec;
pub mod lexer;
pub mod lower;
pub mod parser;
pub mod runtime;
pub mod value;

pub use error::{WeaveError, WeaveResult};
pub use exec::{Executor, StepOutcome};
pub use lower::LowerMode;
pub use runtime::{Command, CommandResult, CommandRuntime, FeedbackRequest};
pub use value::{Registry, Value, ValueKind};

use commands::{DeleteValue, Evaluate, EvaluateCommand, GetValue, Memory, Print, SetValue};

/// The top-level embedding handle: a [`CommandRuntime`] (pre-loaded with the
/// built-in commands) and a [`Registry`], bundled with a compiler from source
/// text to a runnable [`Executor`].
///
/// ```
/// use weave::Engine;
///
/// let mut engine = Engine::new();
/// let mut executor = engine.compile("setValue(x, 1, Wint);").unwrap();
/// engine.run_to_completion(&mut executor).unwrap();
/// assert_eq!(engine.registry().get_int("x"), Some(1));
/// ```
pub struct Engine {
    runtime: CommandRuntime,
    registry: Registry,
}

impl Default for Engine {
    fn default() -> Self {
        Self::new()
    }
}

impl Engine {
    /// Build an engine with the standard built-in commands registered:
    /// `setValue`, `getValue`, `deleteValue`, `memory`, `Print`, `Evaluate`,
    /// and the lowerer's `EvaluateCommand` rewrite target.
    #[must_use]
    pub fn new() -> Self {
        let mut runtime = CommandRuntime::new();
        runtime.register(SetValue);
        runtime.register(GetValue);
        runtime.register(DeleteValue);
        runtime.register(Memory);
        runtime.register(Print);
        runtime.register(Evaluate);
        runtime.register(EvaluateCommand);
        Self { runtime, registry: Registry::new() }
    }

    /// Register a host-provided command, extending the command surface
    /// beyond the built-ins (§6 embedding interface).
    pub fn register_command(&mut self, command: impl Command + 'static) {
        self.runtime.register(command);
    }

    /// Lex, parse and lower `source` into a runnable [`Executor`]. Constants
    /// are folded against this engine's current registry state, matching the
    /// lowerer's "fold at lowering time when a registry is available" rule (§4.5).
    pub fn compile(&self, source: &str) -> WeaveResult<Executor> {
        let tokens = lexer::Lexer::tokenize(source)?;
        let nodes = parser::parse_script(&tokens)?;
        let lowered = lower::lower(&nodes, LowerMode::Rewrite, Some(&self.registry))?;
        Ok(Executor::new(lowered))
    }

    #[must_use]
    pub fn registry(&self) -> &Registry {
        &self.registry
    }

    pub fn registry_mut(&mut self) -> &mut Registry {
        &mut self.registry
    }

    pub fn runtime_mut(&mut self) -> &mut CommandRuntime {
        &mut self.runtime
    }

    /// Borrow the runtime and registry simultaneously, for callers (such as a
    /// CLI host) that need to drive `Executor::execute_next` by hand.
    pub fn runtime_and_registry_mut(&mut self) -> (&mut CommandRuntime, &mut Registry) {
        (&mut self.runtime, &mut self.registry)
    }

    /// Run `executor` to completion against this engine's runtime and
    /// registry, returning the last command result (if any ran). Stops and
    /// returns `Ok(None)` if the script requires feedback input the caller
    /// didn't supply in advance; drive it manually with `execute_next` for
    /// interactive scripts.
    pub fn run_to_completion(&mut self, executor: &mut Executor) -> WeaveResult<Option<CommandResult>> {
        let mut last = None;
        loop {
            match executor.execute_next(&mut self.runtime, &mut self.registry, None)? {
                StepOutcome::Command(result) => last = Some(result),
                StepOutcome::AwaitingFeedback(result) => return Ok(Some(result)),
                StepOutcome::Finished | StepOutcome::SafetyExhausted => return Ok(last),
                StepOutcome::Advanced => {}
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn engine_runs_a_full_script() {
        let mut engine = Engine::new();
        let mut executor = engine
            .compile("setValue(x, 10, Wint); if (x > 5) { setValue(big, true, Wbool); } else { setValue(big, false, Wbool); }")
            .unwrap();
        engine.run_to_completion(&mut executor).unwrap();
        assert_eq!(engine.registry().get_bool("big"), Some(true));
    }

    #[test]
    fn engine_honours_host_registered_commands() {
        struct Double;
        impl Command for Double {
            fn name(&self) -> &str {
                "double"
            }
            fn description(&self) -> &str {
                "doubles a stored int"
            }
            fn parameter_count(&self) -> usize {
                1
            }
            fn execute(&self, args: &[String], registry: &mut Registry) -> CommandResult {
                match registry.get_int(&args[0]) {
                    Some(n) => {
                        registry.set(&args[0], Value::Int(n * 2));
                        CommandResult::ok(format!("{} doubled", args[0]))
                    }
                    None => CommandResult::fail("not an int"),
                }
            }
        }

        let mut engine = Engine::new();
        engine.register_command(Double);
        let mut executor = engine.compile("setValue(n, 21, Wint); double(n);").unwrap();
        engine.run_to_completion(&mut executor).unwrap();
        assert_eq!(engine.registry().get_int("n"), Some(42));
    }
}
