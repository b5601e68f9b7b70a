//! Module parsing the command surface syntax: `[ns:]name(args).ext(args)`.

use crate::error::{WeaveError, WeaveResult};

/// A fully parsed command invocation, ready for resolution against the
/// command runtime's `(namespace, name, arity)` table.
#[derive(Debug, Clone, PartialEq)]
pub struct ParsedInvocation {
    pub namespace: Option<String>,
    pub name: String,
    pub args: Vec<String>,
    pub extension: Option<String>,
    pub extension_args: Vec<String>,
}

/// Split `text` on `delimiter` at parenthesis-depth 0 only, ignoring
/// occurrences of `delimiter` that appear inside a quoted argument or inside
/// nested parentheses.
fn split_at_depth_zero(text: &str, delimiter: char) -> Vec<String> {
    let mut parts = Vec::new();
    let mut depth = 0i32;
    let mut quote: Option<char> = None;
    let mut current = String::new();

    for c in text.chars() {
        match quote {
            Some(q) => {
                current.push(c);
                if c == q {
                    quote = None;
                }
            }
            None => match c {
                '"' | '\'' => {
                    quote = Some(c);
                    current.push(c);
                }
                '(' => {
                    depth += 1;
                    current.push(c);
                }
                ')' => {
                    depth -= 1;
                    current.push(c);
                }
                c if c == delimiter && depth == 0 => {
                    parts.push(current.clone());
                    current.clear();
                }
                c => current.push(c),
            },
        }
    }
    parts.push(current);
    parts
}

fn strip_quotes(arg: &str) -> String {
    let trimmed = arg.trim();
    let bytes = trimmed.as_bytes();
    if bytes.len() >= 2 {
        let first = bytes[0];
        let last = bytes[bytes.len() - 1];
        if (first == b'"' && last == b'"') || (first == b'\'' && last == b'\'') {
            return trimmed[1..trimmed.len() - 1].to_string();
        }
    }
    trimmed.to_string()
}

/// Parse the `(args)` portion of a call. A missing opening parenthesis means
/// the zero-arg form (`name` with no parens at all) and yields an empty list;
/// a present-but-mismatched parenthesis is an error.
fn parse_args(call: &str) -> WeaveResult<(String, Vec<String>)> {
    let call = call.trim();
    match call.find('(') {
        None => Ok((call.to_string(), Vec::new())),
        Some(open) => {
            if !call.ends_with(')') {
                return Err(WeaveError::ErrorUnmatchedParen(crate::lexer::Position::NONE));
            }
            let name = call[..open].trim().to_string();
            let inner = &call[open + 1..call.len() - 1];
            if inner.trim().is_empty() {
                return Ok((name, Vec::new()));
            }
            let args = split_at_depth_zero(inner, ',')
                .into_iter()
                .map(|a| strip_quotes(&a))
                .collect();
            Ok((name, args))
        }
    }
}

/// Parse a full surface-syntax invocation: `[ns:]name(args)[.ext(args)]`.
///
/// Exactly one extension is accepted; a second `.` at depth 0 is an error.
pub fn parse_invocation(input: &str) -> WeaveResult<ParsedInvocation> {
    let input = input.trim();
    if input.is_empty() {
        return Err(WeaveError::ErrorEmptyInput(crate::lexer::Position::NONE));
    }

    let dot_parts = split_at_depth_zero(input, '.');
    if dot_parts.len() > 2 {
        return Err(WeaveError::ErrorMultipleExtensions(crate::lexer::Position::NONE));
    }

    let command_part = dot_parts[0].trim();
    let extension_part = dot_parts.get(1).map(|s| s.trim().to_string());

    let colon_parts = split_at_depth_zero(command_part, ':');
    let (namespace, call) = match colon_parts.as_slice() {
        [single] => (None, single.as_str()),
        [ns, rest] => (Some(ns.trim().to_string()), rest.as_str()),
        _ => {
            return Err(WeaveError::ErrorSyntax(
                "too many ':' separators in command".to_string(),
                crate::lexer::Position::NONE,
            ))
        }
    };

    let (name, args) = parse_args(call)?;
    if name.is_empty() {
        return Err(WeaveError::ErrorEmptyInput(crate::lexer::Position::NONE));
    }

    let (extension, extension_args) = match extension_part {
        Some(ext) => {
            let (ext_name, ext_args) = parse_args(&ext)?;
            if ext_name.is_empty() {
                return Err(WeaveError::ErrorSyntax(
                    "extension name is empty".to_string(),
                    crate::lexer::Position::NONE,
                ));
            }
            (Some(ext_name), ext_args)
        }
        None => (None, Vec::new()),
    };

    Ok(ParsedInvocation { namespace, name, args, extension, extension_args })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_namespace_name_args_and_extension() {
        let inv = parse_invocation("fs:readFile(\"a.txt\", 10).tryrun()").unwrap();
        assert_eq!(inv.namespace.as_deref(), Some("fs"));
        assert_eq!(inv.name, "readFile");
        assert_eq!(inv.args, vec!["a.txt".to_string(), "10".to_string()]);
        assert_eq!(inv.extension.as_deref(), Some("tryrun"));
    }

    #[test]
    fn zero_arg_form_with_no_parens() {
        let inv = parse_invocation("memory").unwrap();
        assert_eq!(inv.name, "memory");
        assert!(inv.args.is_empty());
    }

    #[test]
    fn mismatched_parens_is_an_error() {
        assert!(parse_invocation("foo(1,2").is_err());
    }

    #[test]
    fn empty_input_is_an_error() {
        assert!(parse_invocation("").is_err());
    }

    #[test]
    fn multiple_extensions_is_an_error() {
        assert!(parse_invocation("foo().a().b()").is_err());
    }

    #[test]
    fn commas_inside_quotes_do_not_split_args() {
        let inv = parse_invocation("Print(\"a, b, c\")").unwrap();
        assert_eq!(inv.args, vec!["a, b, c".to_string()]);
    }
}
