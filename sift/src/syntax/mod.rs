//! Filter and ordering grammar.
//!
//! # Syntax Overview
//!
//! - **Comparison**: `field op value`, e.g. `name=John`, `age>=18`
//! - **Operators**: `=` `!=` `>` `>=` `<` `<=` `=*` (`*`) `!*` `^` `!^` `$` `!$`,
//!   plus registered `#...` symbols
//! - **Logic**: `,` is AND, `|` is OR, parentheses group
//! - **Case-insensitive**: `name=BOB/i` or `name/i=BOB`
//! - **Indexer**: `props[color]=red`
//! - **Escaping**: `\` before `, | ( ) = ! < > ^ $ * / \`
//! - **Ordering**: `field [asc|desc|?|!]`, comma separated

mod ast;
mod lexer;
mod parser;

pub use ast::{BinaryExpr, ComparisonExpr, Expr, FieldExpr, LogicalOp, OperatorExpr, ValueExpr};
pub use lexer::{escape_value, tokenize, tokenize_ordering, Token, TokenKind, ESCAPABLE};
pub use parser::{parse_filter, parse_filter_with_depth, DEFAULT_MAX_DEPTH};
