//! Tokenizer for filter and ordering text.

use crate::{Error, Result};

/// Characters a backslash turns into literal text.
pub const ESCAPABLE: &[char] = &[
    ',', '|', '(', ')', '=', '!', '<', '>', '^', '$', '*', '/', '\\',
];

/// Token kinds shared by the filter and ordering grammars.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TokenKind {
    /// Field name
    Identifier,
    /// Value or indexer literal, unescaped
    Literal,
    /// Comparison operator symbol
    Operator,
    /// `,` between filter terms
    And,
    /// `|` between filter terms
    Or,
    OpenParen,
    CloseParen,
    IndexerOpen,
    IndexerClose,
    /// `/i`
    CaseInsensitive,
    /// `?` in ordering text
    HasValue,
    /// `!` in ordering text
    IsNull,
    Ascending,
    Descending,
    /// `,` between ordering entries
    Comma,
}

/// A lexed token. `position` is the byte offset of its first character.
#[derive(Debug, Clone, PartialEq)]
pub struct Token {
    pub kind: TokenKind,
    pub text: String,
    pub position: usize,
}

impl Token {
    fn new(kind: TokenKind, text: impl Into<String>, position: usize) -> Self {
        Self {
            kind,
            text: text.into(),
            position,
        }
    }
}

/// Built-in operator symbols, longest first so `!=` wins over `!`.
const BUILTIN_OPERATORS: &[&str] = &[
    "!=", ">=", "<=", "=*", "!*", "!^", "!$", "=", ">", "<", "^", "$", "*",
];

fn is_field_char(c: char) -> bool {
    c.is_alphanumeric() || c == '_' || c == '.'
}

fn is_operator_start(c: char) -> bool {
    matches!(c, '=' | '!' | '<' | '>' | '^' | '$' | '*' | '#')
}

/// Tokenize filter text.
///
/// `custom_symbols` is a snapshot of the registered custom operator symbols;
/// the longest one matching at a `#` is taken.
pub fn tokenize(text: &str, custom_symbols: &[String]) -> Result<Vec<Token>> {
    let mut lexer = Lexer::new(text);
    lexer.run_filter(custom_symbols)?;
    Ok(lexer.tokens)
}

/// Tokenize ordering text: `field [indexer] [?|!] [asc|desc]`, comma separated.
pub fn tokenize_ordering(text: &str) -> Result<Vec<Token>> {
    let mut lexer = Lexer::new(text);
    lexer.run_ordering()?;
    Ok(lexer.tokens)
}

/// Escape every grammar-special character of a raw value.
pub fn escape_value(value: &str) -> String {
    let mut escaped = String::with_capacity(value.len());
    for c in value.chars() {
        if ESCAPABLE.contains(&c) {
            escaped.push('\\');
        }
        escaped.push(c);
    }
    escaped
}

struct Lexer<'a> {
    text: &'a str,
    pos: usize,
    tokens: Vec<Token>,
}

impl<'a> Lexer<'a> {
    fn new(text: &'a str) -> Self {
        Self {
            text,
            pos: 0,
            tokens: Vec::new(),
        }
    }

    fn rest(&self) -> &'a str {
        &self.text[self.pos..]
    }

    fn peek(&self) -> Option<char> {
        self.rest().chars().next()
    }

    fn bump(&mut self) -> Option<char> {
        let c = self.peek()?;
        self.pos += c.len_utf8();
        Some(c)
    }

    fn skip_whitespace(&mut self) {
        while self.peek().is_some_and(char::is_whitespace) {
            self.bump();
        }
    }

    fn push(&mut self, kind: TokenKind, text: impl Into<String>, position: usize) {
        self.tokens.push(Token::new(kind, text, position));
    }

    fn unexpected(&self, c: char) -> Error {
        Error::lex(self.pos, format!("unexpected character '{}'", c))
    }

    fn run_filter(&mut self, custom_symbols: &[String]) -> Result<()> {
        loop {
            self.skip_whitespace();
            let Some(c) = self.peek() else {
                return Ok(());
            };
            let start = self.pos;

            match c {
                '(' => {
                    self.bump();
                    self.push(TokenKind::OpenParen, "(", start);
                }
                ')' => {
                    self.bump();
                    self.push(TokenKind::CloseParen, ")", start);
                }
                ',' => {
                    self.bump();
                    self.push(TokenKind::And, ",", start);
                }
                '|' => {
                    self.bump();
                    self.push(TokenKind::Or, "|", start);
                }
                c if is_field_char(c) => self.lex_field(custom_symbols)?,
                c if is_operator_start(c) => {
                    // Stray operator with no field; the parser reports it.
                    self.lex_operator(custom_symbols)?;
                    self.lex_value()?;
                }
                c => return Err(self.unexpected(c)),
            }
        }
    }

    /// Field, optional indexer, optional `/i`, operator, then the value.
    fn lex_field(&mut self, custom_symbols: &[String]) -> Result<()> {
        let start = self.pos;
        while self.peek().is_some_and(is_field_char) {
            self.bump();
        }
        let name = &self.text[start..self.pos];
        self.push(TokenKind::Identifier, name, start);

        self.skip_whitespace();
        if self.peek() == Some('[') {
            self.lex_indexer()?;
            self.skip_whitespace();
        }

        if self.peek() == Some('/') {
            if !self.ends_field_after_marker() {
                return Err(Error::lex(
                    self.pos,
                    format!("expected '/i' followed by an operator after field '{}'", name),
                ));
            }
            let at = self.pos;
            self.pos += 2;
            self.push(TokenKind::CaseInsensitive, "/i", at);
            self.skip_whitespace();
        }

        match self.peek() {
            // `name123,123`: a field without an operator is a syntax error.
            None | Some(',') | Some('|') | Some(')') | Some('(') => Ok(()),
            Some(c) if is_operator_start(c) => {
                self.lex_operator(custom_symbols)?;
                self.lex_value()
            }
            Some(c) => Err(self.unexpected(c)),
        }
    }

    fn lex_indexer(&mut self) -> Result<()> {
        let open = self.pos;
        self.bump();
        self.push(TokenKind::IndexerOpen, "[", open);

        let literal_start = self.pos;
        let mut key = String::new();
        loop {
            match self.bump() {
                None => return Err(Error::lex(open, "unterminated indexer")),
                Some(']') => break,
                Some('\\') => match self.peek() {
                    Some(next) if ESCAPABLE.contains(&next) || next == ']' || next == '[' => {
                        self.bump();
                        key.push(next);
                    }
                    _ => key.push('\\'),
                },
                Some(c) => key.push(c),
            }
        }

        self.push(TokenKind::Literal, key.trim(), literal_start);
        self.push(TokenKind::IndexerClose, "]", self.pos - 1);
        Ok(())
    }

    fn lex_operator(&mut self, custom_symbols: &[String]) -> Result<()> {
        let start = self.pos;
        let rest = self.rest();

        let symbol = if rest.starts_with('#') {
            custom_symbols
                .iter()
                .filter(|s| rest.starts_with(s.as_str()))
                .max_by_key(|s| s.len())
                .map(String::as_str)
                .ok_or_else(|| Error::lex(start, "unregistered custom operator"))?
        } else {
            BUILTIN_OPERATORS
                .iter()
                .copied()
                .find(|op| rest.starts_with(op))
                .ok_or_else(|| Error::lex(start, "unknown operator"))?
        };

        let symbol = symbol.to_string();
        self.pos += symbol.len();
        self.push(TokenKind::Operator, symbol, start);
        Ok(())
    }

    /// Value text runs to the next unescaped `,`, `|`, `)` or end of input.
    fn lex_value(&mut self) -> Result<()> {
        self.skip_whitespace();
        let start = self.pos;
        let mut value = String::new();
        // Length of `value` up to its last significant character.
        let mut kept = 0;
        let mut case_insensitive = None;

        while let Some(c) = self.peek() {
            match c {
                ',' | '|' | ')' => break,
                '(' => return Err(Error::lex(self.pos, "unescaped '(' in value")),
                '\\' => {
                    self.bump();
                    match self.peek() {
                        Some(next) if ESCAPABLE.contains(&next) => {
                            self.bump();
                            value.push(next);
                        }
                        Some(next) => {
                            self.bump();
                            value.push('\\');
                            value.push(next);
                        }
                        None => value.push('\\'),
                    }
                    kept = value.len();
                }
                '/' if self.ends_value_after_marker() => {
                    case_insensitive = Some(self.pos);
                    self.pos += 2;
                    self.skip_whitespace();
                    break;
                }
                c => {
                    self.bump();
                    value.push(c);
                    if !c.is_whitespace() {
                        kept = value.len();
                    }
                }
            }
        }

        value.truncate(kept);
        self.push(TokenKind::Literal, value, start);
        if let Some(at) = case_insensitive {
            self.push(TokenKind::CaseInsensitive, "/i", at);
        }
        Ok(())
    }

    /// `/i` at the cursor, followed by optional whitespace and a delimiter.
    fn ends_value_after_marker(&self) -> bool {
        self.rest()
            .strip_prefix("/i")
            .map(|after| after.trim_start())
            .is_some_and(|after| {
                after.is_empty() || after.starts_with([',', '|', ')'])
            })
    }

    /// A field-level `/i` must be followed by an operator.
    fn ends_field_after_marker(&self) -> bool {
        self.rest()
            .strip_prefix("/i")
            .is_some_and(|after| after.trim_start().starts_with(is_operator_start))
    }

    fn run_ordering(&mut self) -> Result<()> {
        loop {
            self.skip_whitespace();
            let Some(c) = self.peek() else {
                return Ok(());
            };
            let start = self.pos;

            match c {
                ',' => {
                    self.bump();
                    self.push(TokenKind::Comma, ",", start);
                }
                '?' => {
                    self.bump();
                    self.push(TokenKind::HasValue, "?", start);
                }
                '!' => {
                    self.bump();
                    self.push(TokenKind::IsNull, "!", start);
                }
                '[' => self.lex_indexer()?,
                c if is_field_char(c) => {
                    while self.peek().is_some_and(is_field_char) {
                        self.bump();
                    }
                    let word = &self.text[start..self.pos];
                    let kind = if word.eq_ignore_ascii_case("asc") {
                        TokenKind::Ascending
                    } else if word.eq_ignore_ascii_case("desc") {
                        TokenKind::Descending
                    } else {
                        TokenKind::Identifier
                    };
                    self.push(kind, word, start);
                }
                c => return Err(self.unexpected(c)),
            }
        }
    }
}
