//! Module implementing the command runtime: registration, overload
//! resolution, extension dispatch, and feedback continuations (§4.8).

use crate::cmd_syntax::{parse_invocation, ParsedInvocation};
use crate::error::WeaveError;
use crate::value::{Registry, Value};
use std::collections::HashMap;
use std::rc::Rc;

/// The result of running a command, an extension, or resuming a feedback.
///
/// Invariant: if `feedback` is `Some`, `requires_confirmation` is `true`.
#[derive(Clone)]
pub struct CommandResult {
    pub success: bool,
    pub message: String,
    pub value: Option<Value>,
    pub type_name: Option<String>,
    pub requires_confirmation: bool,
    pub feedback: Option<FeedbackRequest>,
}

impl std::fmt::Debug for CommandResult {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CommandResult")
            .field("success", &self.success)
            .field("message", &self.message)
            .field("value", &self.value)
            .field("type_name", &self.type_name)
            .field("requires_confirmation", &self.requires_confirmation)
            .field("feedback", &self.feedback.as_ref().map(|fb| &fb.prompt))
            .finish()
    }
}

impl CommandResult {
    #[must_use]
    pub fn ok(message: impl Into<String>) -> Self {
        Self {
            success: true,
            message: message.into(),
            value: None,
            type_name: None,
            requires_confirmation: false,
            feedback: None,
        }
    }

    #[must_use]
    pub fn ok_with_value(message: impl Into<String>, value: Value) -> Self {
        let type_name = value.kind().to_string();
        Self {
            success: true,
            message: message.into(),
            value: Some(value),
            type_name: Some(type_name),
            requires_confirmation: false,
            feedback: None,
        }
    }

    #[must_use]
    pub fn fail(message: impl Into<String>) -> Self {
        Self {
            success: false,
            message: message.into(),
            value: None,
            type_name: None,
            requires_confirmation: false,
            feedback: None,
        }
    }

    #[must_use]
    pub fn needs_feedback(message: impl Into<String>, feedback: FeedbackRequest) -> Self {
        Self {
            success: false,
            message: message.into(),
            value: None,
            type_name: None,
            requires_confirmation: true,
            feedback: Some(feedback),
        }
    }
}

type Responder = Rc<dyn Fn(&str, &mut Registry) -> CommandResult>;

/// A suspended confirmation interaction (§4.8.1). Exactly one may be pending
/// per [`CommandRuntime`] at any time.
#[derive(Clone)]
pub struct FeedbackRequest {
    pub request_id: u64,
    pub prompt: String,
    pub options: Vec<String>,
    responder: Responder,
}

impl FeedbackRequest {
    pub fn new(
        request_id: u64,
        prompt: impl Into<String>,
        options: Vec<String>,
        responder: impl Fn(&str, &mut Registry) -> CommandResult + 'static,
    ) -> Self {
        Self { request_id, prompt: prompt.into(), options, responder: Rc::new(responder) }
    }

    /// Normalise `input` (trim, lowercase) and delegate to the responder.
    pub fn respond(&self, input: &str, registry: &mut Registry) -> CommandResult {
        let normalized = input.trim().to_ascii_lowercase();
        (self.responder)(&normalized, registry)
    }
}

/// The embedding interface a host command implements (§6).
pub trait Command {
    fn name(&self) -> &str;
    fn namespace(&self) -> Option<&str> {
        None
    }
    fn description(&self) -> &str;
    /// `0` denotes variadic (matches any arity during resolution).
    fn parameter_count(&self) -> usize;
    /// Names of command-specific extensions this command exposes, beyond the
    /// global `help`/`tryrun`/`store` trio.
    fn extension_names(&self) -> &[&str] {
        &[]
    }
    fn execute(&self, args: &[String], registry: &mut Registry) -> CommandResult;
    /// Preview what `execute` would do, without doing it. `None` means this
    /// command has no preview and `.tryrun()` falls back to a generic prompt.
    fn try_run(&self, _args: &[String], _registry: &Registry) -> Option<CommandResult> {
        None
    }
    fn invoke_extension(
        &self,
        ext: &str,
        _ext_args: &[String],
        _args: &[String],
        _registry: &mut Registry,
    ) -> CommandResult {
        CommandResult::fail(format!("no extensions on this command: '{}'", ext))
    }
}

struct Registration {
    command: Rc<dyn Command>,
}

/// Registry of commands and extensions, dispatch, and feedback continuation
/// (§4.8). One [`CommandRuntime`] lives for the lifetime of an [`Engine`][crate::Engine].
#[derive(Default)]
pub struct CommandRuntime {
    // Keyed by `(namespace, name, parameter_count)`, in registration order so
    // later registrations of the same triple replace earlier ones (HashMap
    // insert already does this) while ambiguous-name resolution still prefers
    // whichever was registered first (tracked separately, see `order`).
    commands: HashMap<(Option<String>, String, usize), Registration>,
    order: Vec<(Option<String>, String, usize)>,
    pending: Option<FeedbackRequest>,
    next_request_id: u64,
}

impl CommandRuntime {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Register `command`. Idempotent per `(namespace, name, arity)`; a later
    /// registration of the same triple replaces the earlier one in place.
    pub fn register(&mut self, command: impl Command + 'static) {
        let key = (
            command.namespace().map(str::to_string),
            command.name().to_ascii_lowercase(),
            command.parameter_count(),
        );
        if !self.commands.contains_key(&key) {
            self.order.push(key.clone());
        }
        self.commands.insert(key, Registration { command: Rc::new(command) });
    }

    /// Resolve `(name, argc, namespace)` to a registered command (§4.8 rule 1/2).
    ///
    /// Ambiguous name-only lookups (same name registered under multiple
    /// namespaces at the same arity) are resolved to whichever was registered
    /// first — see DESIGN.md for why this policy was chosen over erroring.
    pub fn find_command(
        &self,
        name: &str,
        argc: usize,
        namespace: Option<&str>,
    ) -> Result<Rc<dyn Command>, WeaveError> {
        let name = name.to_ascii_lowercase();
        if let Some(ns) = namespace {
            let exact = (Some(ns.to_string()), name.clone(), argc);
            if let Some(reg) = self.commands.get(&exact) {
                return Ok(Rc::clone(&reg.command));
            }
            let variadic = (Some(ns.to_string()), name.clone(), 0);
            if let Some(reg) = self.commands.get(&variadic) {
                return Ok(Rc::clone(&reg.command));
            }
            return Err(WeaveError::ErrorCommandNotFound(format!("{}:{}", ns, name)));
        }

        let mut exact_match = None;
        let mut variadic_match = None;
        for key in &self.order {
            if key.1 != name {
                continue;
            }
            if key.2 == argc && exact_match.is_none() {
                exact_match = Some(key.clone());
            }
            if key.2 == 0 && variadic_match.is_none() {
                variadic_match = Some(key.clone());
            }
        }
        let resolved = exact_match.or(variadic_match);
        resolved
            .and_then(|key| self.commands.get(&key))
            .map(|reg| Rc::clone(&reg.command))
            .ok_or(WeaveError::ErrorCommandNotFound(name))
    }

    fn allocate_request_id(&mut self) -> u64 {
        self.next_request_id += 1;
        self.next_request_id
    }

    #[must_use]
    pub fn has_pending_feedback(&self) -> bool {
        self.pending.is_some()
    }

    /// Dispatch one line of surface syntax, or deliver it as a response to a
    /// pending feedback (§4.8 steps 1-5). Installs any feedback the result
    /// carries as the new pending slot.
    pub fn process_input(&mut self, raw: &str, registry: &mut Registry) -> CommandResult {
        if let Some(feedback) = self.pending.clone() {
            let result = feedback.respond(raw, registry);
            if result.requires_confirmation {
                self.pending = result.feedback.clone();
            } else {
                self.pending = None;
            }
            return result;
        }

        let invocation = match parse_invocation(raw) {
            Ok(inv) => inv,
            Err(err) => return CommandResult::fail(err.message()),
        };

        let result = self.dispatch(&invocation, registry);
        if result.requires_confirmation {
            self.pending = result.feedback.clone();
        }
        result
    }

    /// `Store(key, innerCall)` — the lowerer's rewrite target for `key = call(...);`
    /// (§4.5). Runs the inner invocation through this same runtime and binds
    /// its result value under `key`, matching what `.store()` would do if the
    /// inner call had been written directly with that extension.
    fn dispatch_store(&mut self, args: &[String], registry: &mut Registry) -> CommandResult {
        let [key, inner] = args else {
            return CommandResult::fail("Store expects (key, innerCall)");
        };
        let inner_invocation = match parse_invocation(inner) {
            Ok(inv) => inv,
            Err(err) => return CommandResult::fail(err.message()),
        };
        let result = self.dispatch(&inner_invocation, registry);
        if let Some(value) = result.value.clone() {
            registry.set(key, value);
        }
        result
    }

    /// `help()`/`list()` with no arguments: introspect every registered
    /// command rather than dispatching to one (§6).
    fn dispatch_introspection(&self) -> CommandResult {
        if self.order.is_empty() {
            return CommandResult::ok("(no commands registered)");
        }
        let mut lines: Vec<String> = self
            .order
            .iter()
            .filter_map(|key| self.commands.get(key))
            .map(|reg| {
                let ns = reg.command.namespace().map(|n| format!("{}:", n)).unwrap_or_default();
                format!("{}{} - {}", ns, reg.command.name(), reg.command.description())
            })
            .collect();
        lines.sort();
        lines.dedup();
        CommandResult::ok(lines.join("\n"))
    }

    fn dispatch(&mut self, invocation: &ParsedInvocation, registry: &mut Registry) -> CommandResult {
        if invocation.extension.is_none() {
            if invocation.name.eq_ignore_ascii_case("store") && invocation.args.len() == 2 {
                return self.dispatch_store(&invocation.args, registry);
            }
            if invocation.args.is_empty()
                && (invocation.name.eq_ignore_ascii_case("help") || invocation.name.eq_ignore_ascii_case("list"))
                && self.find_command(&invocation.name, 0, invocation.namespace.as_deref()).is_err()
            {
                return self.dispatch_introspection();
            }
        }

        let command = match self.find_command(&invocation.name, invocation.args.len(), invocation.namespace.as_deref()) {
            Ok(cmd) => cmd,
            Err(err) => return CommandResult::fail(err.message()),
        };

        match invocation.extension.as_deref() {
            None => command.execute(&invocation.args, registry),
            Some("help") => {
                let exts: Vec<&str> = command
                    .extension_names()
                    .iter()
                    .copied()
                    .chain(["help", "tryrun", "store"])
                    .collect();
                CommandResult::ok(format!(
                    "{}: {} (extensions: {})",
                    command.name(),
                    command.description(),
                    exts.join(", ")
                ))
            }
            Some("tryrun") => {
                let preview = command
                    .try_run(&invocation.args, registry)
                    .unwrap_or_else(|| CommandResult::ok(format!("would run '{}'", command.name())));
                let request_id = self.allocate_request_id();
                let args = invocation.args.clone();
                let command_for_feedback = Rc::clone(&command);
                let feedback = FeedbackRequest::new(
                    request_id,
                    format!("{} - proceed? (yes/no)", preview.message),
                    vec!["yes".to_string(), "no".to_string()],
                    move |input, registry| match input {
                        "yes" => command_for_feedback.execute(&args, registry),
                        "no" => CommandResult::fail("cancelled"),
                        _other => {
                            let retry = FeedbackRequest::new(
                                request_id,
                                "please answer yes or no".to_string(),
                                vec!["yes".to_string(), "no".to_string()],
                                {
                                    let command_for_retry = Rc::clone(&command_for_feedback);
                                    let args_for_retry = args.clone();
                                    move |retry_input, retry_registry| match retry_input {
                                        "yes" => command_for_retry.execute(&args_for_retry, retry_registry),
                                        "no" => CommandResult::fail("cancelled"),
                                        _ => CommandResult::fail("cancelled: no further retries"),
                                    }
                                },
                            );
                            CommandResult::needs_feedback(retry.prompt.clone(), retry)
                        }
                    },
                );
                CommandResult::needs_feedback(feedback.prompt.clone(), feedback)
            }
            Some("store") => {
                let target_key = invocation
                    .extension_args
                    .first()
                    .cloned()
                    .unwrap_or_else(|| "result".to_string());
                let result = command.execute(&invocation.args, registry);
                if let Some(value) = result.value.clone() {
                    registry.set(&target_key, value);
                }
                result
            }
            Some(other) => command.invoke_extension(other, &invocation.extension_args, &invocation.args, registry),
        }
    }
}
