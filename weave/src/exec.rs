//! Module implementing the executor: walks a [`Lowered`] instruction list one
//! step at a time, dispatching `Command`/`Command_Rewrite` nodes to the
//! command runtime and `If_Condition`/`While_Condition` nodes to the
//! expression evaluator (§4.7).

use crate::ast::NodeCategory;
use crate::error::{WeaveError, WeaveResult};
use crate::eval::evaluate;
use crate::lower::Lowered;
use crate::runtime::{CommandResult, CommandRuntime};
use crate::value::Registry;

/// Default ceiling on executed steps before `ExecuteNext` refuses to continue
/// (§4.7); guards against a `goto`-induced infinite loop. Overridable per
/// [`Executor::with_safety_limit`].
pub const DEFAULT_SAFETY_LIMIT: u64 = 100_000;

/// One step's worth of observable effect, returned by [`Executor::execute_next`].
#[derive(Debug)]
pub enum StepOutcome {
    /// A command ran and produced this result.
    Command(CommandResult),
    /// A command is waiting on a feedback response; pass it as `input` on the
    /// next call to `execute_next`.
    AwaitingFeedback(CommandResult),
    /// A non-command instruction advanced the program counter with no result
    /// to surface (label, goto, condition check, block boundary).
    Advanced,
    /// The instruction list has been fully walked.
    Finished,
    /// The safety counter was exhausted before the program finished on its
    /// own (e.g. an unconditional `goto` loop). Terminal, like `Finished`,
    /// but distinguishable from a clean run for a host that wants to report it.
    SafetyExhausted,
}

/// Walks a [`Lowered`] program, one instruction at a time.
pub struct Executor {
    lowered: Lowered,
    ip: usize,
    finished: bool,
    steps_taken: u64,
    safety_limit: u64,
}

impl Executor {
    #[must_use]
    pub fn new(lowered: Lowered) -> Self {
        let finished = lowered.instructions.is_empty();
        Self { lowered, ip: 0, finished, steps_taken: 0, safety_limit: DEFAULT_SAFETY_LIMIT }
    }

    #[must_use]
    pub fn with_safety_limit(mut self, limit: u64) -> Self {
        self.safety_limit = limit;
        self
    }

    #[must_use]
    pub fn is_finished(&self) -> bool {
        self.finished
    }

    #[must_use]
    pub fn instruction_pointer(&self) -> usize {
        self.ip
    }

    fn jump_to_label(&mut self, label: &str) -> WeaveResult<()> {
        let target = *self
            .lowered
            .labels
            .get(label)
            .ok_or_else(|| WeaveError::ErrorLabelNotFound(label.to_string()))?;
        self.ip = target;
        Ok(())
    }

    /// Run exactly one instruction, driving the command runtime and registry
    /// forward. `input` is delivered to the runtime as a pending-feedback
    /// response when one is outstanding; it is ignored otherwise.
    pub fn execute_next(
        &mut self,
        runtime: &mut CommandRuntime,
        registry: &mut Registry,
        input: Option<&str>,
    ) -> WeaveResult<StepOutcome> {
        // A pending feedback must be drained even after the instruction that
        // raised it was the last one in the program; check this ahead of
        // `finished` or the response to a trailing `.tryrun()` would be lost.
        if runtime.has_pending_feedback() {
            let response = input.ok_or_else(|| {
                WeaveError::ErrorInvalidFeedbackResponse("no input supplied for pending feedback".to_string())
            })?;
            let result = runtime.process_input(response, registry);
            tracing::trace!(ip = self.ip, pending_feedback = true, success = result.success, "feedback response processed");
            return Ok(if result.requires_confirmation {
                StepOutcome::AwaitingFeedback(result)
            } else {
                StepOutcome::Command(result)
            });
        }

        if self.finished {
            return Ok(StepOutcome::Finished);
        }

        self.steps_taken += 1;
        if self.steps_taken > self.safety_limit {
            // §8 invariant 5 / S5: exhausting the safety counter finishes the
            // program, it does not raise an error.
            self.finished = true;
            return Ok(StepOutcome::SafetyExhausted);
        }

        let instr = self.lowered.instructions[self.ip].clone();
        let outcome = match instr.category {
            NodeCategory::Label => {
                self.ip += 1;
                StepOutcome::Advanced
            }
            NodeCategory::Goto => {
                self.jump_to_label(&instr.statement)?;
                StepOutcome::Advanced
            }
            NodeCategory::IfCondition => {
                let cond = evaluate(&instr.statement, registry)?;
                if cond {
                    self.ip += 1;
                } else {
                    let target = *self.lowered.matches.get(&self.ip).unwrap_or(&(self.ip + 1));
                    // `target` is either the matching Block_Close (no else: skip
                    // the whole if) or an Else_Open (enter its body directly,
                    // past the marker instruction itself).
                    self.ip = match self.lowered.instructions.get(target).map(|i| i.category) {
                        Some(NodeCategory::ElseOpen) => target + 1,
                        _ => target,
                    };
                }
                StepOutcome::Advanced
            }
            NodeCategory::ElseOpen => {
                // Reached only by falling through a true `if` body; skip past
                // the else block to its Block_Close.
                self.ip = *self.lowered.matches.get(&self.ip).unwrap_or(&(self.ip + 1));
                StepOutcome::Advanced
            }
            NodeCategory::BlockClose => {
                self.ip += 1;
                StepOutcome::Advanced
            }
            NodeCategory::DoOpen => {
                self.ip += 1;
                StepOutcome::Advanced
            }
            NodeCategory::DoEnd => {
                self.ip += 1;
                StepOutcome::Advanced
            }
            NodeCategory::WhileCondition => {
                let cond = evaluate(&instr.statement, registry)?;
                if cond {
                    let do_open = *self
                        .lowered
                        .matches
                        .get(&(self.ip - 1))
                        .ok_or_else(|| WeaveError::ErrorUnmatchedBlock("Do_End without Do_Open".into(), crate::lexer::Position::NONE))?;
                    self.ip = do_open + 1;
                } else {
                    self.ip += 1;
                }
                StepOutcome::Advanced
            }
            NodeCategory::Command | NodeCategory::CommandRewrite => {
                let result = runtime.process_input(&instr.statement, registry);
                self.ip += 1;
                if result.requires_confirmation {
                    StepOutcome::AwaitingFeedback(result)
                } else {
                    StepOutcome::Command(result)
                }
            }
            NodeCategory::Assignment => {
                return Err(WeaveError::ErrorSyntax(
                    "Assignment reached the executor unrewritten; lower with LowerMode::Rewrite".into(),
                    crate::lexer::Position::NONE,
                ));
            }
        };

        tracing::trace!(ip = self.ip, category = %instr.category, "instruction executed");

        if self.ip >= self.lowered.instructions.len() {
            self.finished = true;
        }
        Ok(outcome)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::commands::{DeleteValue, Evaluate, EvaluateCommand, GetValue, Memory, Print, SetValue};
    use crate::lower::{lower, LowerMode};
    use crate::parser::parse;

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

    fn run_to_completion(source: &str) -> (Registry, Vec<CommandResult>) {
        let nodes = parse(source).unwrap();
        let lowered = lower(&nodes, LowerMode::Rewrite, None).unwrap();
        let mut executor = Executor::new(lowered);
        let mut runtime = runtime_with_builtins();
        let mut registry = Registry::new();
        let mut results = Vec::new();
        loop {
            match executor.execute_next(&mut runtime, &mut registry, None).unwrap() {
                StepOutcome::Command(r) => results.push(r),
                StepOutcome::Finished | StepOutcome::SafetyExhausted => break,
                StepOutcome::Advanced | StepOutcome::AwaitingFeedback(_) => {}
            }
        }
        (registry, results)
    }

    #[test]
    fn runs_if_else_branch() {
        let (registry, _) = run_to_completion(
            "setValue(x,5,Wint); if(x>0){ setValue(sign,1,Wint); } else { setValue(sign,-1,Wint); }",
        );
        assert_eq!(registry.get_int("sign"), Some(1));
    }

    #[test]
    fn runs_do_while_loop_to_termination() {
        let (registry, _) = run_to_completion("setValue(i,0,Wint); do { i = i + 1; } while(i<3);");
        assert_eq!(registry.get_double("i"), Some(3.0));
    }

    #[test]
    fn goto_skips_to_label() {
        let (registry, _) = run_to_completion(
            "goto skip; setValue(x,1,Wint); label skip; setValue(y,2,Wint);",
        );
        assert_eq!(registry.get_typed("x"), None);
        assert_eq!(registry.get_int("y"), Some(2));
    }

    #[test]
    fn missing_label_is_a_runtime_error() {
        let nodes = parse("goto nowhere;").unwrap();
        let lowered = lower(&nodes, LowerMode::Rewrite, None).unwrap();
        let mut executor = Executor::new(lowered);
        let mut runtime = runtime_with_builtins();
        let mut registry = Registry::new();
        let err = executor.execute_next(&mut runtime, &mut registry, None).unwrap_err();
        assert!(matches!(err, WeaveError::ErrorLabelNotFound(_)));
    }

    #[test]
    fn safety_counter_halts_an_infinite_goto_loop() {
        let nodes = parse("label top; goto top;").unwrap();
        let lowered = lower(&nodes, LowerMode::Rewrite, None).unwrap();
        let mut executor = Executor::new(lowered).with_safety_limit(50);
        let mut runtime = runtime_with_builtins();
        let mut registry = Registry::new();
        let mut outcome = None;
        for _ in 0..100 {
            outcome = Some(executor.execute_next(&mut runtime, &mut registry, None).unwrap());
            if executor.is_finished() {
                break;
            }
        }
        assert!(matches!(outcome, Some(StepOutcome::SafetyExhausted)));
        assert!(executor.is_finished());
    }

    #[test]
    fn assignment_rewrite_executes_store_for_command_rhs() {
        let (registry, _) =
            run_to_completion("setValue(score,7,Wint); copy = getValue(score);");
        assert_eq!(registry.get_int("copy"), Some(7));
    }
}
