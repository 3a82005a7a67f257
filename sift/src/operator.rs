//! Comparison operators: the built-in set plus user-registered ones.
//!
//! The registry is an explicit object owned by (or shared between)
//! `FieldMapper`s. Lookups take a read lock for the duration of one
//! symbol resolution and clone out an `Arc`, so registering or removing an
//! operator only affects leaves compiled after the change.

use std::collections::HashMap;
use std::fmt;
use std::sync::{Arc, PoisonError, RwLock};

use crate::value::Value;
use crate::{Error, Result};

/// Prefix every custom operator symbol must start with.
pub const CUSTOM_OPERATOR_PREFIX: char = '#';

/// A user-defined comparison.
///
/// `matches` is the in-memory semantics. Backends that render to another
/// representation consult their own hooks (e.g. `to_sql`) and may refuse an
/// operator they cannot express.
pub trait CustomOperator: Send + Sync {
    /// Symbol used in filter text, e.g. `#=`.
    fn symbol(&self) -> &str;

    /// Evaluate against a field value and the (coerced when possible) literal.
    fn matches(&self, field: &Value, value: &Value) -> bool;

    /// SQL rendering given the column expression and the literal as SQL text.
    fn to_sql(&self, _column: &str, _literal: &str) -> Option<String> {
        None
    }
}

/// A resolved operator.
#[derive(Clone)]
pub enum Operator {
    Equal,
    NotEqual,
    GreaterThan,
    GreaterOrEqual,
    LessThan,
    LessOrEqual,
    Contains,
    NotContains,
    StartsWith,
    NotStartsWith,
    EndsWith,
    NotEndsWith,
    Custom(Arc<dyn CustomOperator>),
}

impl Operator {
    /// Resolve a built-in symbol.
    pub fn builtin(symbol: &str) -> Option<Operator> {
        let op = match symbol {
            "=" => Operator::Equal,
            "!=" => Operator::NotEqual,
            ">" => Operator::GreaterThan,
            ">=" => Operator::GreaterOrEqual,
            "<" => Operator::LessThan,
            "<=" => Operator::LessOrEqual,
            "=*" | "*" => Operator::Contains,
            "!*" => Operator::NotContains,
            "^" => Operator::StartsWith,
            "!^" => Operator::NotStartsWith,
            "$" => Operator::EndsWith,
            "!$" => Operator::NotEndsWith,
            _ => return None,
        };
        Some(op)
    }

    /// Canonical symbol.
    pub fn symbol(&self) -> &str {
        match self {
            Operator::Equal => "=",
            Operator::NotEqual => "!=",
            Operator::GreaterThan => ">",
            Operator::GreaterOrEqual => ">=",
            Operator::LessThan => "<",
            Operator::LessOrEqual => "<=",
            Operator::Contains => "=*",
            Operator::NotContains => "!*",
            Operator::StartsWith => "^",
            Operator::NotStartsWith => "!^",
            Operator::EndsWith => "$",
            Operator::NotEndsWith => "!$",
            Operator::Custom(op) => op.symbol(),
        }
    }

    /// `=` or `!=`.
    pub fn is_equality(&self) -> bool {
        matches!(self, Operator::Equal | Operator::NotEqual)
    }

    /// The four ordering comparisons.
    pub fn is_ordering(&self) -> bool {
        matches!(
            self,
            Operator::GreaterThan
                | Operator::GreaterOrEqual
                | Operator::LessThan
                | Operator::LessOrEqual
        )
    }

    /// Substring operators, which compare against the field's text.
    pub fn is_textual(&self) -> bool {
        matches!(
            self,
            Operator::Contains
                | Operator::NotContains
                | Operator::StartsWith
                | Operator::NotStartsWith
                | Operator::EndsWith
                | Operator::NotEndsWith
        )
    }

    /// Operators that hold when their positive counterpart does not.
    pub fn is_negated(&self) -> bool {
        matches!(
            self,
            Operator::NotEqual
                | Operator::NotContains
                | Operator::NotStartsWith
                | Operator::NotEndsWith
        )
    }

    pub fn is_custom(&self) -> bool {
        matches!(self, Operator::Custom(_))
    }
}

impl fmt::Debug for Operator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Operator::Custom(op) => write!(f, "Custom({:?})", op.symbol()),
            other => write!(f, "{:?}", other.symbol()),
        }
    }
}

impl fmt::Display for Operator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.symbol())
    }
}

impl PartialEq for Operator {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Operator::Custom(a), Operator::Custom(b)) => Arc::ptr_eq(a, b),
            (Operator::Custom(_), _) | (_, Operator::Custom(_)) => false,
            (a, b) => a.symbol() == b.symbol(),
        }
    }
}

/// Thread-safe registry of custom operators.
#[derive(Default)]
pub struct OperatorRegistry {
    custom: RwLock<HashMap<String, Arc<dyn CustomOperator>>>,
}

impl OperatorRegistry {
    /// A registry holding only the built-in operators.
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a custom operator, replacing any with the same symbol.
    pub fn register(&self, op: Arc<dyn CustomOperator>) -> Result<()> {
        let symbol = op.symbol().to_string();
        validate_symbol(&symbol)?;

        let previous = self
            .custom
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(symbol.clone(), op);

        tracing::debug!(
            target: "sift::operators",
            symbol = %symbol,
            replaced = previous.is_some(),
            "registered custom operator"
        );
        Ok(())
    }

    /// Remove by symbol.
    pub fn remove(&self, symbol: &str) -> Option<Arc<dyn CustomOperator>> {
        let removed = self
            .custom
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(symbol);
        if removed.is_some() {
            tracing::debug!(target: "sift::operators", symbol = %symbol, "removed custom operator");
        }
        removed
    }

    /// Remove a specific registered instance. Returns false if that instance
    /// is not the one currently registered under its symbol.
    pub fn remove_instance(&self, op: &Arc<dyn CustomOperator>) -> bool {
        let mut custom = self.custom.write().unwrap_or_else(PoisonError::into_inner);
        let registered = custom
            .get(op.symbol())
            .is_some_and(|current| Arc::ptr_eq(current, op));
        if registered {
            custom.remove(op.symbol());
            tracing::debug!(
                target: "sift::operators",
                symbol = %op.symbol(),
                "removed custom operator instance"
            );
        }
        registered
    }

    /// Resolve a symbol to a built-in or registered operator.
    pub fn resolve(&self, symbol: &str) -> Option<Operator> {
        Operator::builtin(symbol).or_else(|| {
            self.custom
                .read()
                .unwrap_or_else(PoisonError::into_inner)
                .get(symbol)
                .cloned()
                .map(Operator::Custom)
        })
    }

    /// Snapshot of the registered custom operators.
    pub fn operators(&self) -> Vec<Arc<dyn CustomOperator>> {
        self.custom
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .values()
            .cloned()
            .collect()
    }

    /// Snapshot of the registered custom symbols, longest first.
    pub fn symbols(&self) -> Vec<String> {
        let mut symbols: Vec<String> = self
            .custom
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .keys()
            .cloned()
            .collect();
        symbols.sort_by(|a, b| b.len().cmp(&a.len()).then_with(|| a.cmp(b)));
        symbols
    }
}

impl fmt::Debug for OperatorRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("OperatorRegistry")
            .field("custom", &self.symbols())
            .finish()
    }
}

/// Characters allowed after the `#` of a custom symbol.
pub(crate) fn is_custom_symbol_char(c: char) -> bool {
    !c.is_whitespace() && !c.is_alphanumeric() && !matches!(c, ',' | '|' | '(' | ')' | '\\')
}

fn validate_symbol(symbol: &str) -> Result<()> {
    let mut chars = symbol.chars();
    let valid = chars.next() == Some(CUSTOM_OPERATOR_PREFIX)
        && symbol.len() > 1
        && chars.all(is_custom_symbol_char);
    if valid {
        Ok(())
    } else {
        Err(Error::Config(format!(
            "Custom operator '{}' must start with '{}' followed by symbol characters",
            symbol, CUSTOM_OPERATOR_PREFIX
        )))
    }
}
