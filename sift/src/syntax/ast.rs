//! Filter syntax tree.
//!
//! Leaves are always `field op value`; binary nodes only ever combine
//! expressions, so an operator applied to a non-leaf cannot be represented.

use std::fmt;

/// `,` or `|`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogicalOp {
    And,
    Or,
}

impl fmt::Display for LogicalOp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LogicalOp::And => f.write_str(","),
            LogicalOp::Or => f.write_str("|"),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum Expr {
    Comparison(ComparisonExpr),
    Binary(BinaryExpr),
    /// Isolation boundary for the nested-collection merge.
    Parenthesized(Box<Expr>),
}

#[derive(Debug, Clone, PartialEq)]
pub struct BinaryExpr {
    pub left: Box<Expr>,
    pub op: LogicalOp,
    pub right: Box<Expr>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ComparisonExpr {
    pub field: FieldExpr,
    pub op: OperatorExpr,
    pub value: ValueExpr,
}

#[derive(Debug, Clone, PartialEq)]
pub struct FieldExpr {
    pub name: String,
    /// Raw indexer literal from `field[key]`.
    pub indexer: Option<String>,
    pub case_insensitive: bool,
    pub position: usize,
}

/// Operator symbol as written. Resolved against the registry at compile time.
#[derive(Debug, Clone, PartialEq)]
pub struct OperatorExpr {
    pub symbol: String,
    pub position: usize,
}

/// Literal text, unescaped but otherwise exactly as written.
#[derive(Debug, Clone, PartialEq)]
pub struct ValueExpr {
    pub text: String,
    pub case_insensitive: bool,
}

impl Expr {
    pub fn binary(left: Expr, op: LogicalOp, right: Expr) -> Expr {
        Expr::Binary(BinaryExpr {
            left: Box::new(left),
            op,
            right: Box::new(right),
        })
    }

    /// Visit every comparison leaf, left to right.
    pub fn comparisons(&self) -> Vec<&ComparisonExpr> {
        let mut out = Vec::new();
        self.collect_comparisons(&mut out);
        out
    }

    fn collect_comparisons<'a>(&'a self, out: &mut Vec<&'a ComparisonExpr>) {
        match self {
            Expr::Comparison(leaf) => out.push(leaf),
            Expr::Binary(bin) => {
                bin.left.collect_comparisons(out);
                bin.right.collect_comparisons(out);
            }
            Expr::Parenthesized(inner) => inner.collect_comparisons(out),
        }
    }
}
