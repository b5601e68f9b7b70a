//! Module implementing the script parser: token stream -> ordered [`Node`]s.

use crate::ast::{Node, NodeCategory};
use crate::error::{WeaveError, WeaveResult};
use crate::lexer::{Token, TokenKind};

/// Render a run of tokens back into a single compact expression string: no
/// whitespace is kept except a single separating space between two
/// consecutive word-like tokens (identifiers/keywords), since running them
/// together would fuse them into a different identifier on re-lex (e.g.
/// `not` + `z` must not become `notz`). This is the parser's resolution of
/// the "whitespace is stripped" rule for conditions that mix keywords and
/// identifiers (see DESIGN.md).
fn render_tokens(tokens: &[Token]) -> String {
    let mut out = String::new();
    let mut prev_word_like = false;
    for tok in tokens {
        let word_like = matches!(
            tok.kind,
            TokenKind::Identifier(_) | TokenKind::Not | TokenKind::If | TokenKind::Else
        ) && tok.lexeme.chars().next().is_some_and(|c| c.is_ascii_alphabetic() || c == '_');
        if prev_word_like && word_like {
            out.push(' ');
        }
        match &tok.kind {
            TokenKind::StringLiteral(s) => {
                out.push('"');
                out.push_str(s);
                out.push('"');
            }
            _ => out.push_str(&tok.lexeme),
        }
        prev_word_like = word_like;
    }
    out
}

/// Token-stream cursor feeding the recursive-descent parser.
struct Parser<'t> {
    tokens: &'t [Token],
    pos: usize,
}

impl<'t> Parser<'t> {
    fn new(tokens: &'t [Token]) -> Self {
        Self { tokens, pos: 0 }
    }

    fn peek(&self) -> &Token {
        &self.tokens[self.pos.min(self.tokens.len() - 1)]
    }

    fn peek_kind(&self) -> &TokenKind {
        &self.peek().kind
    }

    fn at_eof(&self) -> bool {
        matches!(self.peek_kind(), TokenKind::Eof)
    }

    fn bump(&mut self) -> Token {
        let tok = self.tokens[self.pos.min(self.tokens.len() - 1)].clone();
        if self.pos < self.tokens.len() - 1 {
            self.pos += 1;
        }
        tok
    }

    fn expect(&mut self, kind: &TokenKind, what: &str) -> WeaveResult<Token> {
        if std::mem::discriminant(self.peek_kind()) == std::mem::discriminant(kind) {
            Ok(self.bump())
        } else {
            Err(WeaveError::ErrorSyntax(
                format!("expected {} but found '{}'", what, self.peek().lexeme),
                self.peek().position,
            ))
        }
    }

    fn expect_semicolon(&mut self) -> WeaveResult<()> {
        if matches!(self.peek_kind(), TokenKind::Semicolon) {
            self.bump();
            Ok(())
        } else {
            Err(WeaveError::ErrorMissingSemicolon(self.peek().position))
        }
    }

    /// Collect tokens strictly inside a balanced `( ... )`, consuming both
    /// parens, and render them into a compact expression string.
    fn parse_parenthesised_expr(&mut self) -> WeaveResult<String> {
        self.expect(&TokenKind::LeftParen, "'('")?;
        let mut depth = 1i32;
        let mut inner = Vec::new();
        loop {
            match self.peek_kind() {
                TokenKind::LeftParen => {
                    depth += 1;
                    inner.push(self.bump());
                }
                TokenKind::RightParen => {
                    depth -= 1;
                    if depth == 0 {
                        self.bump();
                        break;
                    }
                    inner.push(self.bump());
                }
                TokenKind::Eof => {
                    return Err(WeaveError::ErrorUnmatchedParen(self.peek().position))
                }
                _ => inner.push(self.bump()),
            }
        }
        Ok(render_tokens(&inner))
    }

    /// Consume a balanced `( ... )` onto `all`, if one is present at all (a
    /// bare `name` with no parens is the zero-arg form, see `cmd_syntax`).
    fn consume_optional_parens(&mut self, all: &mut Vec<Token>) -> WeaveResult<()> {
        if !matches!(self.peek_kind(), TokenKind::LeftParen) {
            return Ok(());
        }
        all.push(self.bump());
        let mut depth = 1i32;
        loop {
            match self.peek_kind() {
                TokenKind::LeftParen => {
                    depth += 1;
                    all.push(self.bump());
                }
                TokenKind::RightParen => {
                    depth -= 1;
                    all.push(self.bump());
                    if depth == 0 {
                        break;
                    }
                }
                TokenKind::Eof => return Err(WeaveError::ErrorUnmatchedParen(self.peek().position)),
                _ => all.push(self.bump()),
            }
        }
        Ok(())
    }

    /// Collect the full surface-syntax invocation `[ns:]name(args)[.ext(args)]`
    /// starting from an already-consumed leading token, and render it back to
    /// text for the executor's command dispatch.
    fn parse_call_text(&mut self, name_tokens: Vec<Token>) -> WeaveResult<String> {
        let mut all = name_tokens;
        if matches!(self.peek_kind(), TokenKind::Colon) {
            all.push(self.bump());
            let name_tok = self.expect(&TokenKind::Identifier(String::new()), "a command name")?;
            all.push(name_tok);
        }
        self.consume_optional_parens(&mut all)?;
        if matches!(self.peek_kind(), TokenKind::Dot) {
            all.push(self.bump());
            let ext_tok = self.expect(&TokenKind::Identifier(String::new()), "an extension name")?;
            all.push(ext_tok);
            self.consume_optional_parens(&mut all)?;
        }
        Ok(render_tokens(&all))
    }

    fn parse_block(&mut self, out: &mut Vec<Node>) -> WeaveResult<()> {
        self.expect(&TokenKind::LeftBrace, "'{'")?;
        while !matches!(self.peek_kind(), TokenKind::RightBrace) {
            if self.at_eof() {
                return Err(WeaveError::ErrorUnmatchedBlock("missing '}'".to_string(), self.peek().position));
            }
            self.parse_statement(out)?;
        }
        self.bump(); // consume '}'
        Ok(())
    }

    fn parse_statement(&mut self, out: &mut Vec<Node>) -> WeaveResult<()> {
        match self.peek_kind().clone() {
            TokenKind::Label => {
                self.bump();
                let name_tok = self.expect(&TokenKind::Identifier(String::new()), "a label name")?;
                self.expect_semicolon()?;
                out.push(Node::new(NodeCategory::Label, name_tok.lexeme));
            }
            TokenKind::Goto => {
                self.bump();
                let name_tok = self.expect(&TokenKind::Identifier(String::new()), "a label name")?;
                self.expect_semicolon()?;
                out.push(Node::new(NodeCategory::Goto, name_tok.lexeme));
            }
            TokenKind::If => {
                self.bump();
                let cond = self.parse_parenthesised_expr()?;
                out.push(Node::new(NodeCategory::IfCondition, cond));
                self.parse_block(out)?;
                if matches!(self.peek_kind(), TokenKind::Else) {
                    self.bump();
                    out.push(Node::new(NodeCategory::ElseOpen, ""));
                    self.parse_block(out)?;
                }
                out.push(Node::new(NodeCategory::BlockClose, ""));
            }
            TokenKind::Do => {
                self.bump();
                out.push(Node::new(NodeCategory::DoOpen, ""));
                self.parse_block(out)?;
                out.push(Node::new(NodeCategory::DoEnd, ""));
                self.expect(&TokenKind::While, "'while'")?;
                let cond = self.parse_parenthesised_expr()?;
                self.expect_semicolon()?;
                out.push(Node::new(NodeCategory::WhileCondition, cond));
            }
            TokenKind::Identifier(name) => {
                let name_tok = self.bump();
                match self.peek_kind() {
                    TokenKind::LeftParen | TokenKind::Colon => {
                        let text = self.parse_call_text(vec![name_tok])?;
                        self.expect_semicolon()?;
                        out.push(Node::new(NodeCategory::Command, text));
                    }
                    TokenKind::Assign => {
                        self.bump();
                        let mut rhs_tokens = Vec::new();
                        while !matches!(self.peek_kind(), TokenKind::Semicolon | TokenKind::Eof) {
                            rhs_tokens.push(self.bump());
                        }
                        self.expect_semicolon()?;
                        let rhs = render_tokens(&rhs_tokens);
                        out.push(Node::new(NodeCategory::Assignment, format!("{}={}", name, rhs)));
                    }
                    _ => {
                        return Err(WeaveError::ErrorSyntax(
                            format!("expected '(' or '=' after '{}'", name),
                            self.peek().position,
                        ))
                    }
                }
            }
            _ => {
                return Err(WeaveError::ErrorSyntax(
                    format!("unexpected token '{}'", self.peek().lexeme),
                    self.peek().position,
                ))
            }
        }
        Ok(())
    }

    fn parse_program(&mut self) -> WeaveResult<Vec<Node>> {
        let mut nodes = Vec::new();
        while !self.at_eof() {
            self.parse_statement(&mut nodes)?;
        }
        Ok(nodes)
    }
}

/// Parse the whole script into an ordered list of [`Node`]s (§4.4).
pub fn parse_script(tokens: &[Token]) -> WeaveResult<Vec<Node>> {
    let mut parser = Parser::new(tokens);
    parser.parse_program()
}

/// Lex and parse `source` in one call.
pub fn parse(source: &str) -> WeaveResult<Vec<Node>> {
    let tokens = crate::lexer::Lexer::tokenize(source)?;
    parse_script(&tokens)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_label_and_goto() {
        let nodes = parse("label start; goto start;").unwrap();
        assert_eq!(nodes[0].category, NodeCategory::Label);
        assert_eq!(nodes[0].statement, "start");
        assert_eq!(nodes[1].category, NodeCategory::Goto);
    }

    #[test]
    fn parses_if_else() {
        let nodes = parse("if(x>0){ setValue(a,1,Wint); } else { setValue(a,2,Wint); }").unwrap();
        let categories: Vec<_> = nodes.iter().map(|n| n.category).collect();
        assert_eq!(
            categories,
            vec![
                NodeCategory::IfCondition,
                NodeCategory::Command,
                NodeCategory::ElseOpen,
                NodeCategory::Command,
                NodeCategory::BlockClose,
            ]
        );
        assert_eq!(nodes[0].statement, "x>0");
    }

    #[test]
    fn parses_do_while() {
        let nodes = parse("do { setValue(x,1,Wint); } while(x<3);").unwrap();
        let categories: Vec<_> = nodes.iter().map(|n| n.category).collect();
        assert_eq!(
            categories,
            vec![
                NodeCategory::DoOpen,
                NodeCategory::Command,
                NodeCategory::DoEnd,
                NodeCategory::WhileCondition,
            ]
        );
        assert_eq!(nodes.last().unwrap().statement, "x<3");
    }

    #[test]
    fn parses_assignment() {
        let nodes = parse("x = 2+3;").unwrap();
        assert_eq!(nodes[0].category, NodeCategory::Assignment);
        assert_eq!(nodes[0].statement, "x=2+3");
    }

    #[test]
    fn missing_semicolon_is_an_error() {
        assert!(parse("goto start").is_err());
    }

    #[test]
    fn conditions_strip_surrounding_whitespace() {
        let nodes = parse("if ( x > 0 ) { Print(\"hi\"); }").unwrap();
        assert_eq!(nodes[0].statement, "x>0");
    }
}
