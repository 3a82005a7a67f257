//! Recursive-descent parser for filter text.
//!
//! ```text
//! expr  := term (("," | "|") term)*
//! term  := "(" expr ")" | field op value
//! field := identifier ["[" literal "]"] ["/i"]
//! value := literal ["/i"]
//! ```
//!
//! Binary expressions fold left; there is no precedence between `,` and `|`.
//! A flat chain of N terms is therefore N levels deep, and trees deeper than
//! the configured limit are rejected before anything walks them.

use super::ast::{ComparisonExpr, Expr, FieldExpr, LogicalOp, OperatorExpr, ValueExpr};
use super::lexer::{tokenize, Token, TokenKind};
use crate::operator::OperatorRegistry;
use crate::{Error, Result};

/// Deepest syntax tree accepted when no limit is configured.
pub const DEFAULT_MAX_DEPTH: usize = 256;

/// Parse filter text into a syntax tree, limited to [`DEFAULT_MAX_DEPTH`].
pub fn parse_filter(text: &str, operators: &OperatorRegistry) -> Result<Expr> {
    parse_filter_with_depth(text, operators, DEFAULT_MAX_DEPTH)
}

/// Parse filter text, rejecting trees more than `max_depth` levels deep.
pub fn parse_filter_with_depth(text: &str, operators: &OperatorRegistry, max_depth: usize) -> Result<Expr> {
    let tokens = tokenize(text, &operators.symbols())?;
    Parser::new(tokens, text.len(), max_depth).parse()
}

struct Parser {
    tokens: Vec<Token>,
    pos: usize,
    end: usize,
    max_depth: usize,
}

impl Parser {
    fn new(tokens: Vec<Token>, end: usize, max_depth: usize) -> Self {
        Self {
            tokens,
            pos: 0,
            end,
            max_depth,
        }
    }

    fn parse(mut self) -> Result<Expr> {
        let (expr, _) = self.parse_expr(0)?;
        match self.peek() {
            None => Ok(expr),
            Some(token) if token.kind == TokenKind::CloseParen => {
                Err(Error::syntax(token.position, "unbalanced ')'"))
            }
            Some(token) => Err(Error::syntax(
                token.position,
                format!("unexpected {}", describe(token)),
            )),
        }
    }

    fn peek(&self) -> Option<&Token> {
        self.tokens.get(self.pos)
    }

    fn peek_kind(&self) -> Option<TokenKind> {
        self.peek().map(|t| t.kind)
    }

    fn next(&mut self) -> Option<Token> {
        let token = self.tokens.get(self.pos).cloned();
        if token.is_some() {
            self.pos += 1;
        }
        token
    }

    fn position(&self) -> usize {
        self.peek().map(|t| t.position).unwrap_or(self.end)
    }

    fn expect(&mut self, kind: TokenKind, what: &str) -> Result<Token> {
        match self.next() {
            Some(token) if token.kind == kind => Ok(token),
            Some(token) => Err(Error::syntax(
                token.position,
                format!("expected {}, found {}", what, describe(&token)),
            )),
            None => Err(Error::syntax(
                self.end,
                format!("expected {}, found end of input", what),
            )),
        }
    }

    fn check_depth(&self, depth: usize, position: usize) -> Result<()> {
        if depth > self.max_depth {
            return Err(Error::syntax(
                position,
                format!("filter nests deeper than {} levels", self.max_depth),
            ));
        }
        Ok(())
    }

    /// Parse a chain of terms. `nesting` counts the enclosing parentheses.
    /// Returns the expression with its depth.
    fn parse_expr(&mut self, nesting: usize) -> Result<(Expr, usize)> {
        let (mut left, mut depth) = self.parse_term(nesting)?;
        loop {
            let op = match self.peek_kind() {
                Some(TokenKind::And) => LogicalOp::And,
                Some(TokenKind::Or) => LogicalOp::Or,
                _ => return Ok((left, depth)),
            };
            let position = self.position();
            self.pos += 1;
            let (right, right_depth) = self.parse_term(nesting)?;
            depth = depth.max(right_depth) + 1;
            self.check_depth(depth, position)?;
            left = Expr::binary(left, op, right);
        }
    }

    fn parse_term(&mut self, nesting: usize) -> Result<(Expr, usize)> {
        let position = self.position();
        match self.peek() {
            Some(token) if token.kind == TokenKind::OpenParen => {
                // Every open parenthesis adds a level, so this bounds recursion.
                self.check_depth(nesting + 1, position)?;
                self.pos += 1;
                let (inner, depth) = self.parse_expr(nesting + 1)?;
                self.expect(TokenKind::CloseParen, "')'")?;
                self.check_depth(depth + 1, position)?;
                Ok((Expr::Parenthesized(Box::new(inner)), depth + 1))
            }
            Some(token) if token.kind == TokenKind::Identifier => {
                self.parse_comparison().map(|leaf| (Expr::Comparison(leaf), 1))
            }
            Some(token) if token.kind == TokenKind::Operator => Err(Error::syntax(
                position,
                format!("operator '{}' without a preceding field", token.text),
            )),
            Some(token) => Err(Error::syntax(
                position,
                format!("expected a field or '(', found {}", describe(token)),
            )),
            None => Err(Error::syntax(position, "expected a field or '(', found end of input")),
        }
    }

    fn parse_comparison(&mut self) -> Result<ComparisonExpr> {
        let name = self.expect(TokenKind::Identifier, "field")?;

        let mut indexer = None;
        if self.peek_kind() == Some(TokenKind::IndexerOpen) {
            self.pos += 1;
            let key = self.expect(TokenKind::Literal, "indexer key")?;
            self.expect(TokenKind::IndexerClose, "']'")?;
            indexer = Some(key.text);
        }

        let field_ci = self.eat(TokenKind::CaseInsensitive);

        let op = match self.next() {
            Some(token) if token.kind == TokenKind::Operator => OperatorExpr {
                symbol: token.text,
                position: token.position,
            },
            Some(token) => {
                return Err(Error::syntax(
                    token.position,
                    format!("expected operator after field '{}', found {}", name.text, describe(&token)),
                ))
            }
            None => {
                return Err(Error::syntax(
                    self.end,
                    format!("expected operator after field '{}'", name.text),
                ))
            }
        };

        let value = self.expect(TokenKind::Literal, "value")?;
        let value_ci = self.eat(TokenKind::CaseInsensitive);

        Ok(ComparisonExpr {
            field: FieldExpr {
                name: name.text,
                indexer,
                case_insensitive: field_ci,
                position: name.position,
            },
            op,
            value: ValueExpr {
                text: value.text,
                case_insensitive: value_ci,
            },
        })
    }

    fn eat(&mut self, kind: TokenKind) -> bool {
        if self.peek_kind() == Some(kind) {
            self.pos += 1;
            true
        } else {
            false
        }
    }
}

fn describe(token: &Token) -> String {
    match token.kind {
        TokenKind::Identifier => format!("field '{}'", token.text),
        TokenKind::Literal => format!("value '{}'", token.text),
        TokenKind::Operator => format!("operator '{}'", token.text),
        _ => format!("'{}'", token.text),
    }
}
