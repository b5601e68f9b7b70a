//! End-to-end scenarios driving the public `Engine` API the way a host would,
//! one test per documented scenario.

use weave::{CommandResult, Engine, StepOutcome};

fn run_all(engine: &mut Engine, source: &str) -> Vec<CommandResult> {
    let mut executor = engine.compile(source).unwrap();
    let (runtime, registry) = engine.runtime_and_registry_mut();
    let mut results = Vec::new();
    loop {
        match executor.execute_next(runtime, registry, None).unwrap() {
            StepOutcome::Command(result) | StepOutcome::AwaitingFeedback(result) => results.push(result),
            StepOutcome::Finished | StepOutcome::SafetyExhausted => break,
            StepOutcome::Advanced => {}
        }
    }
    results
}

#[test]
fn s1_registry_flow() {
    let mut engine = Engine::new();
    let results = run_all(
        &mut engine,
        "setValue(score, 100, Wint); getValue(score); memory(); deleteValue(score); memory();",
    );
    assert_eq!(results.len(), 5);
    assert!(results[0].success && results[0].message.contains("score"));
    assert!(results[1].success);
    assert_eq!(results[1].value, Some(weave::Value::Int(100)));
    assert!(results[2].success && results[2].message.contains("score"));
    assert!(results[3].success && (results[3].message.contains("emoved") || results[3].message.contains("eleted")));
    assert!(results[4].success && results[4].message.contains("empty"));
}

#[test]
fn s2_if_else_takes_the_false_branch() {
    let mut engine = Engine::new();
    run_all(
        &mut engine,
        "setValue(x,0,Wint); if(false){ setValue(x,1,Wint); } else { setValue(x,2,Wint); } getValue(x);",
    );
    assert_eq!(engine.registry().get_int("x"), Some(2));
}

#[test]
fn s3_nested_if_resolves_inner_else() {
    let mut engine = Engine::new();
    run_all(
        &mut engine,
        "setValue(x,0,Wint); if(true){ setValue(x,1,Wint); if(false){ setValue(x,2,Wint);} else { setValue(x,3,Wint);} } getValue(x);",
    );
    assert_eq!(engine.registry().get_int("x"), Some(3));
}

#[test]
fn s4_do_while_increments_to_three() {
    let mut engine = Engine::new();
    run_all(
        &mut engine,
        "setValue(counter,0,Wint); do { setValue(counter, counter+1, Wint); } while(counter < 3); getValue(counter);",
    );
    assert_eq!(engine.registry().get_int("counter"), Some(3));
}

#[test]
fn s5_goto_loop_runs_to_safety_limit_without_erroring() {
    let mut engine = Engine::new();
    let mut executor = engine
        .compile("label start; setValue(counter,1,Wint); goto start;")
        .unwrap()
        .with_safety_limit(1_000);
    let (runtime, registry) = engine.runtime_and_registry_mut();
    let mut saw_safety_exhausted = false;
    for _ in 0..2_000 {
        let outcome = executor.execute_next(runtime, registry, None).expect("must not throw");
        if matches!(outcome, StepOutcome::SafetyExhausted) {
            saw_safety_exhausted = true;
        }
        if executor.is_finished() {
            break;
        }
    }
    assert!(saw_safety_exhausted, "an infinite goto must report safety exhaustion, not throw");
    assert!(executor.is_finished());
}

#[test]
fn s6_goto_to_a_missing_label_is_a_reported_failure_not_a_panic() {
    let engine = Engine::new();
    let mut executor = engine.compile("goto nowhere;").unwrap();
    let mut runtime = weave::CommandRuntime::new();
    let mut registry = weave::Registry::new();
    let err = executor.execute_next(&mut runtime, &mut registry, None).unwrap_err();
    assert!(err.to_string().to_ascii_lowercase().contains("not found"));
}

#[test]
fn s7_rewrite_forms_are_lowered_but_not_yet_executed() {
    use weave::lower::{lower, LowerMode};
    use weave::parser::parse;

    let nodes = parse("x = getValue(score);").unwrap();
    let lowered = lower(&nodes, LowerMode::Rewrite, None).unwrap();
    assert_eq!(lowered.instructions.len(), 1);
    let stmt = &lowered.instructions[0].statement;
    assert!(stmt.contains("Store(x"));
    assert!(stmt.contains("getValue("));

    let nodes = parse("x = 2+3;").unwrap();
    let lowered = lower(&nodes, LowerMode::Rewrite, None).unwrap();
    assert_eq!(lowered.instructions.len(), 1);
    let stmt = &lowered.instructions[0].statement;
    assert!(stmt.contains("EvaluateCommand("));
    assert!(stmt.contains("2+3"));
    assert!(stmt.contains(", x"));
}

#[test]
fn s8_expression_evaluation_matches_literal_expected_values() {
    use weave::eval::{evaluate, evaluate_numeric};
    use weave::Registry;
    use weave::Value;

    let mut registry = Registry::new();
    registry.set("x", Value::Int(10));
    registry.set("y", Value::Double(2.5));
    let n = evaluate_numeric("x + y * 2", &registry).unwrap();
    assert!((n - 15.0).abs() < 1e-4);

    let mut registry = Registry::new();
    registry.set("x", Value::Int(5));
    registry.set("y", Value::Int(10));
    registry.set("z", Value::Bool(false));
    assert!(evaluate("(x<y) && not z", &registry).unwrap());
    assert!(!evaluate("(x>y) || z", &registry).unwrap());
}

#[test]
fn s9_tryrun_feedback_loop_accept() {
    let mut engine = Engine::new();
    engine.registry_mut().set("score", weave::Value::Int(5));
    let (runtime, registry) = engine.runtime_and_registry_mut();

    let preview = runtime.process_input("deleteValue(score).tryrun()", registry);
    assert!(!preview.success);
    assert!(preview.requires_confirmation);
    assert!(preview.feedback.is_some());
    let request_id = preview.feedback.as_ref().unwrap().request_id;

    let accepted = runtime.process_input("yes", registry);
    assert!(accepted.success);
    assert!(!accepted.requires_confirmation);
    assert_eq!(registry.get_typed("score"), None);
    let _ = request_id;
}

#[test]
fn s9_tryrun_feedback_loop_reject() {
    let mut engine = Engine::new();
    engine.registry_mut().set("score", weave::Value::Int(5));
    let (runtime, registry) = engine.runtime_and_registry_mut();

    runtime.process_input("deleteValue(score).tryrun()", registry);
    let rejected = runtime.process_input("no", registry);
    assert!(!rejected.success);
    assert_eq!(rejected.message, "cancelled");
    assert_eq!(registry.get_int("score"), Some(5));
}

#[test]
fn s9_tryrun_feedback_loop_unrecognized_input_reprompts_with_same_request_id() {
    let mut engine = Engine::new();
    engine.registry_mut().set("score", weave::Value::Int(5));
    let (runtime, registry) = engine.runtime_and_registry_mut();

    let preview = runtime.process_input("deleteValue(score).tryrun()", registry);
    let original_id = preview.feedback.unwrap().request_id;

    let confused = runtime.process_input("maybe", registry);
    assert!(!confused.success);
    assert!(confused.requires_confirmation);
    let retry = confused.feedback.expect("a reprompt must still carry a feedback request");
    assert_eq!(retry.request_id, original_id);

    let accepted = runtime.process_input("yes", registry);
    assert!(accepted.success);
    assert_eq!(registry.get_typed("score"), None);
}
