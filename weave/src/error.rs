//! Module containing error definitions produced by every stage of the engine.

use crate::lexer::Position;
use std::error::Error;
use std::fmt;

/// All errors that can surface while lexing, parsing, lowering or running a script.
///
/// All wrapped [`Position`] values represent the location in the source where the
/// error occurred; they are [`Position::NONE`] for errors that have no script location
/// (e.g. a command-runtime resolution failure).
#[derive(Debug, Clone, PartialEq)]
#[non_exhaustive]
pub enum WeaveError {
    /// The input was empty where a non-empty token/expression/command was required.
    ErrorEmptyInput(Position),
    /// An unexpected character was encountered while lexing. Wrapped value is the character.
    ErrorUnexpectedChar(char, Position),
    /// A syntax error while parsing a script or a command invocation. Wrapped value is a message.
    ErrorSyntax(String, Position),
    /// Parentheses in a command invocation or expression do not match.
    ErrorUnmatchedParen(Position),
    /// More than one extension (`.ext(...)`) was present in a single invocation.
    ErrorMultipleExtensions(Position),
    /// A statement did not end with `;`.
    ErrorMissingSemicolon(Position),
    /// An `if`/`do` block is missing its matching closer.
    ErrorUnmatchedBlock(String, Position),
    /// The same `label` name was declared more than once.
    ErrorDuplicateLabel(String, Position),
    /// `goto` referenced a label that does not exist.
    ErrorLabelNotFound(String),
    /// A variable was looked up that does not exist in the registry.
    ErrorVariableNotFound(String),
    /// A value of the wrong kind was read from the registry. Wrapped values are
    /// the key and the kind that was actually stored.
    ErrorTypeMismatch(String, String),
    /// An expression referenced an identifier that is neither a literal nor a known variable.
    ErrorUnknownIdentifier(String),
    /// An unknown or malformed operator token appeared in an expression.
    ErrorUnknownOperator(String),
    /// Division (or modulo) by zero during numeric evaluation.
    ErrorDivideByZero,
    /// No command matches the given `(namespace, name, arity)`.
    ErrorCommandNotFound(String),
    /// No extension of that name exists on the resolved command.
    ErrorExtensionNotFound(String),
    /// The executor's safety counter was exhausted before the script finished.
    ErrorSafetyCounterExhausted,
    /// A pending feedback request received an input it does not recognise.
    ErrorInvalidFeedbackResponse(String),
}

impl Error for WeaveError {}

impl fmt::Display for WeaveError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::ErrorEmptyInput(_) => f.write_str("input is empty"),
            Self::ErrorUnexpectedChar(c, _) => write!(f, "unexpected character '{}'", c),
            Self::ErrorSyntax(s, _) => write!(f, "syntax error: {}", s),
            Self::ErrorUnmatchedParen(_) => f.write_str("unmatched parenthesis"),
            Self::ErrorMultipleExtensions(_) => f.write_str("only one extension is permitted"),
            Self::ErrorMissingSemicolon(_) => f.write_str("statement does not end with ';'"),
            Self::ErrorUnmatchedBlock(s, _) => write!(f, "unmatched block: {}", s),
            Self::ErrorDuplicateLabel(s, _) => write!(f, "label '{}' declared more than once", s),
            Self::ErrorLabelNotFound(s) => write!(f, "label '{}' not found", s),
            Self::ErrorVariableNotFound(s) => write!(f, "variable '{}' not found", s),
            Self::ErrorTypeMismatch(k, t) => write!(f, "'{}' is not of the expected type ({})", k, t),
            Self::ErrorUnknownIdentifier(s) => write!(f, "unknown identifier '{}'", s),
            Self::ErrorUnknownOperator(s) => write!(f, "unknown operator '{}'", s),
            Self::ErrorDivideByZero => f.write_str("division by zero"),
            Self::ErrorCommandNotFound(s) => write!(f, "command not found: {}", s),
            Self::ErrorExtensionNotFound(s) => write!(f, "extension not found: {}", s),
            Self::ErrorSafetyCounterExhausted => f.write_str("safety counter exhausted"),
            Self::ErrorInvalidFeedbackResponse(s) => {
                write!(f, "'{}' is not a valid response to the pending confirmation", s)
            }
        }?;

        if !self.position().is_none() {
            write!(f, " ({})", self.position())?;
        }
        Ok(())
    }
}

impl From<&str> for WeaveError {
    #[inline(always)]
    fn from(message: &str) -> Self {
        Self::ErrorSyntax(message.to_string(), Position::NONE)
    }
}

impl From<String> for WeaveError {
    #[inline(always)]
    fn from(message: String) -> Self {
        Self::ErrorSyntax(message, Position::NONE)
    }
}

impl WeaveError {
    /// Get the [position][Position] at which this error occurred, if any.
    #[must_use]
    pub const fn position(&self) -> Position {
        match self {
            Self::ErrorEmptyInput(pos)
            | Self::ErrorUnexpectedChar(_, pos)
            | Self::ErrorSyntax(_, pos)
            | Self::ErrorUnmatchedParen(pos)
            | Self::ErrorMultipleExtensions(pos)
            | Self::ErrorMissingSemicolon(pos)
            | Self::ErrorUnmatchedBlock(_, pos)
            | Self::ErrorDuplicateLabel(_, pos) => *pos,

            Self::ErrorLabelNotFound(_)
            | Self::ErrorVariableNotFound(_)
            | Self::ErrorTypeMismatch(_, _)
            | Self::ErrorUnknownIdentifier(_)
            | Self::ErrorUnknownOperator(_)
            | Self::ErrorDivideByZero
            | Self::ErrorCommandNotFound(_)
            | Self::ErrorExtensionNotFound(_)
            | Self::ErrorSafetyCounterExhausted
            | Self::ErrorInvalidFeedbackResponse(_) => Position::NONE,
        }
    }

    /// Render this error as a plain message, the way a failing [`CommandResult`][crate::runtime::CommandResult] does.
    #[must_use]
    pub fn message(&self) -> String {
        self.to_string()
    }
}

pub type WeaveResult<T> = Result<T, WeaveError>;
