mod args;

use anyhow::{Context, Result};
use args::WeaveArgs;
use clap::Parser;
use std::io::{self, BufRead, Write};
use tracing_subscriber::EnvFilter;
use weave::{Engine, Executor, StepOutcome};

fn setup_logging(trace: bool) {
    let filter = if trace {
        EnvFilter::new("trace")
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"))
    };
    tracing_subscriber::fmt().with_env_filter(filter).init();
}

/// Drive `executor` to completion, printing each command's message to
/// stdout (or stderr on failure) and prompting stdin whenever a command
/// leaves a feedback request pending.
fn drive(engine: &mut Engine, executor: &mut Executor) -> Result<bool> {
    let mut all_succeeded = true;
    let mut pending_input: Option<String> = None;

    loop {
        let (runtime, registry) = engine.runtime_and_registry_mut();
        let outcome = executor
            .execute_next(runtime, registry, pending_input.as_deref())
            .context("script execution failed")?;
        pending_input = None;

        match outcome {
            StepOutcome::Command(result) => {
                if result.success {
                    println!("{}", result.message);
                } else {
                    eprintln!("{}", result.message);
                    all_succeeded = false;
                }
            }
            StepOutcome::AwaitingFeedback(result) => {
                print!("{} ", result.message);
                io::stdout().flush().ok();
                let mut line = String::new();
                io::stdin().read_line(&mut line).context("reading feedback response from stdin")?;
                pending_input = Some(line.trim().to_string());
            }
            StepOutcome::Advanced => {}
            StepOutcome::Finished => break,
            StepOutcome::SafetyExhausted => {
                eprintln!("warning: safety counter exhausted before the script finished on its own");
                break;
            }
        }
    }
    Ok(all_succeeded)
}

fn run_repl(engine: &mut Engine) -> Result<()> {
    println!("weave interactive mode; blank line to exit.");
    let stdin = io::stdin();
    loop {
        print!("> ");
        io::stdout().flush().ok();
        let mut line = String::new();
        if stdin.lock().read_line(&mut line)? == 0 || line.trim().is_empty() {
            break;
        }
        let (runtime, registry) = engine.runtime_and_registry_mut();
        let result = runtime.process_input(line.trim(), registry);
        if result.success {
            println!("{}", result.message);
        } else {
            eprintln!("{}", result.message);
        }
    }
    Ok(())
}

fn main() -> Result<()> {
    let args = WeaveArgs::parse();
    setup_logging(args.trace);

    let source = std::fs::read_to_string(&args.script)
        .with_context(|| format!("reading script '{}'", args.script.display()))?;

    let mut engine = Engine::new();
    let mut executor = engine.compile(&source).context("compiling script")?;
    if let Some(max_steps) = args.max_steps {
        executor = executor.with_safety_limit(max_steps);
    }

    let succeeded = drive(&mut engine, &mut executor)?;

    if args.interactive {
        run_repl(&mut engine)?;
    }

    if !succeeded {
        std::process::exit(1);
    }
    Ok(())
}
