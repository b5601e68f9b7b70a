//! Module implementing the expression evaluator: text -> RPN -> numeric/bool.

use crate::error::{WeaveError, WeaveResult};
use crate::lexer::{Lexer, TokenKind};
use crate::value::Registry;

/// An operator/operand token used internally by the RPN converter.
#[derive(Debug, Clone, PartialEq)]
enum ExprToken {
    Number(f64),
    Operator(Op),
    LeftParen,
    RightParen,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Op {
    Not,
    Mul,
    Div,
    Add,
    Sub,
    Gt,
    Lt,
    Ge,
    Le,
    Eq,
    Ne,
    And,
    Or,
}

impl Op {
    /// `(precedence, arity)`; higher precedence binds tighter (§4.6 table).
    fn info(self) -> (u8, u8) {
        match self {
            Self::Not => (5, 1),
            Self::Mul | Self::Div => (4, 2),
            Self::Add | Self::Sub => (3, 2),
            Self::Gt | Self::Lt | Self::Ge | Self::Le | Self::Eq | Self::Ne => (2, 2),
            Self::And => (1, 2),
            Self::Or => (0, 2),
        }
    }

    fn is_right_associative(self) -> bool {
        matches!(self, Self::Not)
    }
}

/// True iff `text` contains any comparison or logical operator symbol/word,
/// used by commands to decide between `Evaluate` (bool) and `EvaluateNumeric`.
#[must_use]
pub fn is_boolean_expression(text: &str) -> bool {
    const MARKERS: &[&str] = &["==", "!=", "<=", ">=", "<", ">", "&&", "||", "!", "not"];
    MARKERS.iter().any(|m| text.contains(m))
}

fn lex_expr(text: &str) -> WeaveResult<Vec<ExprToken>> {
    let tokens = Lexer::tokenize(text)?;
    let mut out = Vec::new();
    for tok in tokens {
        match tok.kind {
            TokenKind::Eof => break,
            TokenKind::IntegerLiteral(n) => out.push(ExprToken::Number(n as f64)),
            TokenKind::DoubleLiteral(n) => out.push(ExprToken::Number(n)),
            TokenKind::Identifier(ref s) if s == "true" => out.push(ExprToken::Number(1.0)),
            TokenKind::Identifier(ref s) if s == "false" => out.push(ExprToken::Number(0.0)),
            TokenKind::Identifier(s) => {
                return Err(WeaveError::ErrorUnknownIdentifier(s));
            }
            TokenKind::LeftParen => out.push(ExprToken::LeftParen),
            TokenKind::RightParen => out.push(ExprToken::RightParen),
            TokenKind::Plus => out.push(ExprToken::Operator(Op::Add)),
            TokenKind::Minus => out.push(ExprToken::Operator(Op::Sub)),
            TokenKind::Star => out.push(ExprToken::Operator(Op::Mul)),
            TokenKind::Slash => out.push(ExprToken::Operator(Op::Div)),
            TokenKind::Gt => out.push(ExprToken::Operator(Op::Gt)),
            TokenKind::Lt => out.push(ExprToken::Operator(Op::Lt)),
            TokenKind::Ge => out.push(ExprToken::Operator(Op::Ge)),
            TokenKind::Le => out.push(ExprToken::Operator(Op::Le)),
            TokenKind::Eq => out.push(ExprToken::Operator(Op::Eq)),
            TokenKind::NotEq => out.push(ExprToken::Operator(Op::Ne)),
            TokenKind::AndAnd => out.push(ExprToken::Operator(Op::And)),
            TokenKind::OrOr => out.push(ExprToken::Operator(Op::Or)),
            TokenKind::Not => out.push(ExprToken::Operator(Op::Not)),
            other => return Err(WeaveError::ErrorUnknownOperator(other.to_string())),
        }
    }
    Ok(out)
}

/// Shunting-yard: convert an infix token list into RPN order.
fn to_rpn(tokens: Vec<ExprToken>) -> WeaveResult<Vec<ExprToken>> {
    let mut output = Vec::new();
    let mut stack: Vec<ExprToken> = Vec::new();

    for tok in tokens {
        match tok {
            ExprToken::Number(_) => output.push(tok),
            ExprToken::LeftParen => stack.push(tok),
            ExprToken::RightParen => {
                loop {
                    match stack.pop() {
                        Some(ExprToken::LeftParen) => break,
                        Some(op) => output.push(op),
                        None => return Err(WeaveError::ErrorUnmatchedParen(crate::lexer::Position::NONE)),
                    }
                }
            }
            ExprToken::Operator(op) => {
                let (prec, _) = op.info();
                while let Some(ExprToken::Operator(top)) = stack.last() {
                    let (top_prec, _) = top.info();
                    let pops = if op.is_right_associative() {
                        top_prec > prec
                    } else {
                        top_prec >= prec
                    };
                    if pops {
                        output.push(stack.pop().unwrap());
                    } else {
                        break;
                    }
                }
                stack.push(tok);
            }
        }
    }
    while let Some(top) = stack.pop() {
        if matches!(top, ExprToken::LeftParen) {
            return Err(WeaveError::ErrorUnmatchedParen(crate::lexer::Position::NONE));
        }
        output.push(top);
    }
    Ok(output)
}

fn eval_rpn(rpn: &[ExprToken]) -> WeaveResult<f64> {
    let mut stack: Vec<f64> = Vec::new();
    for tok in rpn {
        match tok {
            ExprToken::Number(n) => stack.push(*n),
            ExprToken::Operator(op) => {
                let (_, arity) = op.info();
                if arity == 1 {
                    let a = stack.pop().ok_or_else(|| WeaveError::from("expression stack underflow"))?;
                    stack.push(if a != 0.0 { 0.0 } else { 1.0 });
                } else {
                    let b = stack.pop().ok_or_else(|| WeaveError::from("expression stack underflow"))?;
                    let a = stack.pop().ok_or_else(|| WeaveError::from("expression stack underflow"))?;
                    let result = match op {
                        Op::Add => a + b,
                        Op::Sub => a - b,
                        Op::Mul => a * b,
                        Op::Div => {
                            if b == 0.0 {
                                return Err(WeaveError::ErrorDivideByZero);
                            }
                            a / b
                        }
                        Op::Gt => bool_f64(a > b),
                        Op::Lt => bool_f64(a < b),
                        Op::Ge => bool_f64(a >= b),
                        Op::Le => bool_f64(a <= b),
                        Op::Eq => bool_f64(a == b),
                        Op::Ne => bool_f64(a != b),
                        Op::And => bool_f64(a != 0.0 && b != 0.0),
                        Op::Or => bool_f64(a != 0.0 || b != 0.0),
                        Op::Not => unreachable!("unary handled above"),
                    };
                    stack.push(result);
                }
            }
            ExprToken::LeftParen | ExprToken::RightParen => {
                return Err(WeaveError::from("unbalanced parentheses in RPN"))
            }
        }
    }
    stack.pop().ok_or(WeaveError::ErrorEmptyInput(crate::lexer::Position::NONE))
}

fn bool_f64(b: bool) -> f64 {
    if b {
        1.0
    } else {
        0.0
    }
}

/// Resolve `text` against `registry` and evaluate it to a number (§4.6).
///
/// Step order: trim and short-circuit on a literal `true`/`false`; if the
/// trimmed text is itself a single registry key, read and coerce it; otherwise
/// substitute all registry variables and evaluate the resulting RPN.
pub fn evaluate_numeric(text: &str, registry: &Registry) -> WeaveResult<f64> {
    let trimmed = text.trim();
    if trimmed.is_empty() {
        return Err(WeaveError::ErrorEmptyInput(crate::lexer::Position::NONE));
    }
    match trimmed {
        "true" => return Ok(1.0),
        "false" => return Ok(0.0),
        _ => {}
    }
    if is_single_identifier(trimmed) {
        if let Some((value, _)) = registry.get_typed(trimmed) {
            if let Some(n) = value.as_numeric() {
                return Ok(n);
            }
        }
    }
    let substituted = registry.replace_variables(trimmed);
    let tokens = lex_expr(&substituted)?;
    let rpn = to_rpn(tokens)?;
    eval_rpn(&rpn)
}

/// Resolve and evaluate `text`, returning a boolean (non-zero result is true).
pub fn evaluate(text: &str, registry: &Registry) -> WeaveResult<bool> {
    let trimmed = text.trim();
    if trimmed.is_empty() {
        return Err(WeaveError::ErrorEmptyInput(crate::lexer::Position::NONE));
    }
    match trimmed {
        "true" => return Ok(true),
        "false" => return Ok(false),
        _ => {}
    }
    if is_single_identifier(trimmed) {
        if let Some((value, _)) = registry.get_typed(trimmed) {
            if let Some(b) = value.as_bool_coerced() {
                return Ok(b);
            }
        }
    }
    Ok(evaluate_numeric(text, registry)? != 0.0)
}

fn is_single_identifier(text: &str) -> bool {
    !text.is_empty()
        && text.chars().next().is_some_and(|c| c.is_ascii_alphabetic() || c == '_')
        && text.chars().all(|c| c.is_ascii_alphanumeric() || c == '_')
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::value::Value;

    fn registry_with(pairs: &[(&str, Value)]) -> Registry {
        let mut reg = Registry::new();
        for (k, v) in pairs {
            reg.set(k, v.clone());
        }
        reg
    }

    #[test]
    fn evaluates_numeric_with_variable_substitution() {
        let reg = registry_with(&[("x", Value::Int(10)), ("y", Value::Double(2.5))]);
        let result = evaluate_numeric("x + y * 2", &reg).unwrap();
        assert!((result - 15.0).abs() < 1e-4);
    }

    #[test]
    fn evaluates_boolean_expressions() {
        let reg = registry_with(&[("x", Value::Int(5)), ("y", Value::Int(10)), ("z", Value::Bool(false))]);
        assert!(evaluate("(x<y) && not z", &reg).unwrap());
        assert!(!evaluate("(x>y) || z", &reg).unwrap());
    }

    #[test]
    fn single_key_coerces_by_table() {
        let reg = registry_with(&[("flag", Value::Bool(true)), ("count", Value::Int(0))]);
        assert!(evaluate("flag", &reg).unwrap());
        assert!(!evaluate("count", &reg).unwrap());
    }

    #[test]
    fn division_by_zero_is_an_error() {
        let reg = Registry::new();
        assert!(evaluate_numeric("1/0", &reg).is_err());
    }

    #[test]
    fn empty_expression_is_an_error() {
        let reg = Registry::new();
        assert!(evaluate_numeric("   ", &reg).is_err());
    }

    #[test]
    fn is_side_effect_free() {
        let reg = registry_with(&[("x", Value::Int(3))]);
        let a = evaluate_numeric("x * 2", &reg).unwrap();
        let b = evaluate_numeric("x * 2", &reg).unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn detects_boolean_expressions() {
        assert!(is_boolean_expression("x > 0"));
        assert!(is_boolean_expression("a && b"));
        assert!(!is_boolean_expression("a + b"));
    }
}
