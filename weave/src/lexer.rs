//! Module defining the [`Token`] stream and the [`Lexer`] that produces it.

use crate::error::{WeaveError, WeaveResult};
use std::fmt;

/// A location (line number + column) in the source text.
///
/// Lines and columns are both 1-based; [`Position::NONE`] (`0, 0`) marks the
/// absence of a known location.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub struct Position {
    line: u32,
    column: u32,
}

impl Position {
    /// A [`Position`] representing no position.
    pub const NONE: Self = Self { line: 0, column: 0 };

    /// Create a new [`Position`] from a 1-based line and column.
    #[must_use]
    pub const fn new(line: u32, column: u32) -> Self {
        Self { line, column }
    }

    #[must_use]
    pub const fn is_none(&self) -> bool {
        self.line == 0
    }

    #[must_use]
    pub const fn line(&self) -> u32 {
        self.line
    }

    #[must_use]
    pub const fn column(&self) -> u32 {
        self.column
    }
}

impl fmt::Display for Position {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_none() {
            f.write_str("?")
        } else {
            write!(f, "{}:{}", self.line, self.column)
        }
    }
}

/// The kind of a single lexical token.
#[derive(Debug, Clone, PartialEq)]
pub enum TokenKind {
    Identifier(String),
    IntegerLiteral(i64),
    DoubleLiteral(f64),
    StringLiteral(String),
    // Keywords
    If,
    Else,
    Do,
    While,
    Label,
    Goto,
    // Punctuation
    Semicolon,
    LeftParen,
    RightParen,
    LeftBrace,
    RightBrace,
    Comma,
    Colon,
    Dot,
    // Operators
    Plus,
    Minus,
    Star,
    Slash,
    Assign,
    Eq,
    NotEq,
    Lt,
    Gt,
    Le,
    Ge,
    AndAnd,
    OrOr,
    Not,
    Eof,
}

impl fmt::Display for TokenKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Identifier(s) => write!(f, "{}", s),
            Self::IntegerLiteral(n) => write!(f, "{}", n),
            Self::DoubleLiteral(n) => write!(f, "{}", n),
            Self::StringLiteral(s) => write!(f, "\"{}\"", s),
            Self::If => f.write_str("if"),
            Self::Else => f.write_str("else"),
            Self::Do => f.write_str("do"),
            Self::While => f.write_str("while"),
            Self::Label => f.write_str("label"),
            Self::Goto => f.write_str("goto"),
            Self::Semicolon => f.write_str(";"),
            Self::LeftParen => f.write_str("("),
            Self::RightParen => f.write_str(")"),
            Self::LeftBrace => f.write_str("{"),
            Self::RightBrace => f.write_str("}"),
            Self::Comma => f.write_str(","),
            Self::Colon => f.write_str(":"),
            Self::Dot => f.write_str("."),
            Self::Plus => f.write_str("+"),
            Self::Minus => f.write_str("-"),
            Self::Star => f.write_str("*"),
            Self::Slash => f.write_str("/"),
            Self::Assign => f.write_str("="),
            Self::Eq => f.write_str("=="),
            Self::NotEq => f.write_str("!="),
            Self::Lt => f.write_str("<"),
            Self::Gt => f.write_str(">"),
            Self::Le => f.write_str("<="),
            Self::Ge => f.write_str(">="),
            Self::AndAnd => f.write_str("&&"),
            Self::OrOr => f.write_str("||"),
            Self::Not => f.write_str("!"),
            Self::Eof => f.write_str("<eof>"),
        }
    }
}

/// A single lexical token: its [`TokenKind`], the exact source text it came from
/// (the *lexeme*), and its [`Position`].
#[derive(Debug, Clone, PartialEq)]
pub struct Token {
    pub kind: TokenKind,
    pub lexeme: String,
    pub position: Position,
}

/// Single-pass tokeniser for Weave scripts and expressions.
///
/// `lex` is deterministic: calling it twice on the same source produces
/// identical token streams, and lexemes appear in the same left-to-right
/// order as the source text.
pub struct Lexer<'a> {
    source: &'a str,
    chars: std::iter::Peekable<std::str::CharIndices<'a>>,
    line: u32,
    column: u32,
}

impl<'a> Lexer<'a> {
    #[must_use]
    pub fn new(source: &'a str) -> Self {
        Self {
            source,
            chars: source.char_indices().peekable(),
            line: 1,
            column: 1,
        }
    }

    /// Lex the whole source into a token list, always terminated by a single [`TokenKind::Eof`].
    pub fn tokenize(source: &'a str) -> WeaveResult<Vec<Token>> {
        let mut lexer = Self::new(source);
        let mut tokens = Vec::new();
        loop {
            let token = lexer.next_token()?;
            let is_eof = token.kind == TokenKind::Eof;
            tokens.push(token);
            if is_eof {
                break;
            }
        }
        Ok(tokens)
    }

    fn position(&self) -> Position {
        Position::new(self.line, self.column)
    }

    fn bump(&mut self) -> Option<char> {
        let (_, c) = self.chars.next()?;
        if c == '\n' {
            self.line += 1;
            self.column = 1;
        } else {
            self.column += 1;
        }
        Some(c)
    }

    fn peek(&mut self) -> Option<char> {
        self.chars.peek().map(|&(_, c)| c)
    }

    fn peek_at(&self, byte_offset: usize) -> Option<char> {
        self.source[byte_offset..].chars().next()
    }

    fn skip_whitespace_and_comments(&mut self) {
        loop {
            match self.peek() {
                Some(c) if c.is_whitespace() => {
                    self.bump();
                }
                Some('/') => {
                    let next_idx = self.chars.peek().map(|&(i, _)| i).unwrap_or(self.source.len());
                    if self.peek_at(next_idx + 1) == Some('/') {
                        while !matches!(self.peek(), Some('\n') | None) {
                            self.bump();
                        }
                    } else {
                        break;
                    }
                }
                _ => break,
            }
        }
    }

    /// Scan a single token. Unknown characters yield `ErrorUnexpectedChar` rather
    /// than panicking; the parser refuses to build a node out of an error.
    pub fn next_token(&mut self) -> WeaveResult<Token> {
        self.skip_whitespace_and_comments();
        let pos = self.position();

        let c = match self.bump() {
            Some(c) => c,
            None => {
                return Ok(Token {
                    kind: TokenKind::Eof,
                    lexeme: String::new(),
                    position: pos,
                })
            }
        };

        macro_rules! tok {
            ($kind:expr, $lexeme:expr) => {
                Ok(Token { kind: $kind, lexeme: $lexeme.to_string(), position: pos })
            };
        }

        match c {
            ';' => tok!(TokenKind::Semicolon, ";"),
            '(' => tok!(TokenKind::LeftParen, "("),
            ')' => tok!(TokenKind::RightParen, ")"),
            '{' => tok!(TokenKind::LeftBrace, "{"),
            '}' => tok!(TokenKind::RightBrace, "}"),
            ',' => tok!(TokenKind::Comma, ","),
            ':' => tok!(TokenKind::Colon, ":"),
            '.' => tok!(TokenKind::Dot, "."),
            '+' => tok!(TokenKind::Plus, "+"),
            '-' => tok!(TokenKind::Minus, "-"),
            '*' => tok!(TokenKind::Star, "*"),
            '/' => tok!(TokenKind::Slash, "/"),
            '=' => {
                if self.peek() == Some('=') {
                    self.bump();
                    tok!(TokenKind::Eq, "==")
                } else {
                    tok!(TokenKind::Assign, "=")
                }
            }
            '!' => {
                if self.peek() == Some('=') {
                    self.bump();
                    tok!(TokenKind::NotEq, "!=")
                } else {
                    tok!(TokenKind::Not, "!")
                }
            }
            '<' => {
                if self.peek() == Some('=') {
                    self.bump();
                    tok!(TokenKind::Le, "<=")
                } else {
                    tok!(TokenKind::Lt, "<")
                }
            }
            '>' => {
                if self.peek() == Some('=') {
                    self.bump();
                    tok!(TokenKind::Ge, ">=")
                } else {
                    tok!(TokenKind::Gt, ">")
                }
            }
            '&' if self.peek() == Some('&') => {
                self.bump();
                tok!(TokenKind::AndAnd, "&&")
            }
            '|' if self.peek() == Some('|') => {
                self.bump();
                tok!(TokenKind::OrOr, "||")
            }
            '"' => {
                let mut s = String::new();
                loop {
                    match self.bump() {
                        Some('"') => break,
                        Some(ch) => s.push(ch),
                        None => return Err(WeaveError::ErrorSyntax("unterminated string".into(), pos)),
                    }
                }
                Ok(Token { kind: TokenKind::StringLiteral(s.clone()), lexeme: s, position: pos })
            }
            c if c.is_ascii_digit() => {
                let mut s = String::new();
                s.push(c);
                let mut is_float = false;
                while let Some(next) = self.peek() {
                    if next.is_ascii_digit() {
                        s.push(next);
                        self.bump();
                    } else if next == '.' && !is_float {
                        is_float = true;
                        s.push(next);
                        self.bump();
                    } else {
                        break;
                    }
                }
                if is_float {
                    let value: f64 = s
                        .parse()
                        .map_err(|_| WeaveError::ErrorSyntax(format!("invalid number '{}'", s), pos))?;
                    Ok(Token { kind: TokenKind::DoubleLiteral(value), lexeme: s, position: pos })
                } else {
                    let value: i64 = s
                        .parse()
                        .map_err(|_| WeaveError::ErrorSyntax(format!("invalid number '{}'", s), pos))?;
                    Ok(Token { kind: TokenKind::IntegerLiteral(value), lexeme: s, position: pos })
                }
            }
            c if c.is_ascii_alphabetic() || c == '_' => {
                let mut s = String::new();
                s.push(c);
                while let Some(next) = self.peek() {
                    if next.is_ascii_alphanumeric() || next == '_' {
                        s.push(next);
                        self.bump();
                    } else {
                        break;
                    }
                }
                let kind = match s.as_str() {
                    "if" => TokenKind::If,
                    "else" => TokenKind::Else,
                    "do" => TokenKind::Do,
                    "while" => TokenKind::While,
                    "label" => TokenKind::Label,
                    "goto" => TokenKind::Goto,
                    "not" => TokenKind::Not,
                    _ => TokenKind::Identifier(s.clone()),
                };
                Ok(Token { kind, lexeme: s, position: pos })
            }
            other => Err(WeaveError::ErrorUnexpectedChar(other, pos)),
        }
    }
}

/// Convenience entry point: lex `source` and drop the trailing [`TokenKind::Eof`].
pub fn lex(source: &str) -> WeaveResult<Vec<Token>> {
    let mut tokens = Lexer::tokenize(source)?;
    if matches!(tokens.last(), Some(t) if t.kind == TokenKind::Eof) {
        tokens.pop();
    }
    Ok(tokens)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn lexes_operators_longest_match_first() {
        let tokens = lex("a == b != c <= d >= e && f || !g").unwrap();
        let kinds: Vec<_> = tokens.iter().map(|t| &t.kind).collect();
        assert!(kinds.contains(&&TokenKind::Eq));
        assert!(kinds.contains(&&TokenKind::NotEq));
        assert!(kinds.contains(&&TokenKind::Le));
        assert!(kinds.contains(&&TokenKind::Ge));
        assert!(kinds.contains(&&TokenKind::AndAnd));
        assert!(kinds.contains(&&TokenKind::OrOr));
        assert!(kinds.contains(&&TokenKind::Not));
    }

    #[test]
    fn not_is_synonym_for_bang() {
        let tokens = lex("not z").unwrap();
        assert_eq!(tokens[0].kind, TokenKind::Not);
        assert_eq!(tokens[1].kind, TokenKind::Identifier("z".into()));
    }

    #[test]
    fn preserves_left_to_right_order() {
        let tokens = lex("x = 1 + 2;").unwrap();
        let lexemes: Vec<_> = tokens.iter().map(|t| t.lexeme.clone()).collect();
        assert_eq!(lexemes, vec!["x", "=", "1", "+", "2", ";"]);
    }

    #[test]
    fn strings_are_unquoted() {
        let tokens = lex("\"hello world\"").unwrap();
        assert_eq!(tokens[0].kind, TokenKind::StringLiteral("hello world".into()));
    }

    #[test]
    fn comments_run_to_end_of_line() {
        let tokens = lex("x = 1; // trailing comment\ny = 2;").unwrap();
        let lexemes: Vec<_> = tokens.iter().map(|t| t.lexeme.clone()).collect();
        assert_eq!(lexemes, vec!["x", "=", "1", ";", "y", "=", "2", ";"]);
    }

    #[test]
    fn unknown_character_is_an_error() {
        assert!(lex("x = @;").is_err());
    }
}
