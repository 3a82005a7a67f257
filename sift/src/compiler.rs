//! Compiles a filter syntax tree into a backend query.
//!
//! The compiler owns the semantics shared by every backend: field
//! resolution, literal coercion, null/absent handling, case folding,
//! indexer guards, null propagation, and the nested-collection merge.
//! Backends only decide how the resulting pieces are represented.

use crate::mapping::{FieldMap, FieldMapper, FieldPath};
use crate::operator::Operator;
use crate::syntax::{ComparisonExpr, Expr, LogicalOp};
use crate::value::{coerce, FieldType, Value};
use crate::{Error, Result};

/// A compiled predicate plus whether it is an existential over a collection.
#[derive(Debug, Clone, PartialEq)]
pub struct Compiled<Q> {
    pub query: Q,
    pub nested: bool,
}

/// Result of [`QueryBuilder::try_merge`].
#[derive(Debug)]
pub enum Merge<Q> {
    Merged(Q),
    /// Ownership of both sides handed back for ordinary combination.
    NotApplicable(Compiled<Q>, Compiled<Q>),
}

/// Guard kinds used for indexer and null-propagation rewrites.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NullCheck {
    HasValue,
    IsNull,
}

/// A terminal comparison, ready for a backend.
#[derive(Debug, Clone, PartialEq)]
pub struct Comparison {
    /// Path from the record (or the current collection element) to the field.
    pub path: FieldPath,
    pub field_type: FieldType,
    pub op: Operator,
    /// Coerced literal. `Text` when coercion was skipped or soft-failed.
    pub value: Value,
    /// Fold both sides to lowercase before comparing.
    pub case_insensitive: bool,
    /// Empty literal on `=`/`!=` against a string field: null and `""` are
    /// the same absent state.
    pub matches_absent: bool,
}

impl Comparison {
    /// What this comparison evaluates to when the field itself is null.
    pub fn outcome_on_null(&self) -> bool {
        match &self.op {
            Operator::Equal => self.matches_absent || self.value.is_null(),
            Operator::NotEqual => !self.matches_absent && !self.value.is_null(),
            op => op.is_negated() && op.is_textual(),
        }
    }
}

/// Per-element condition of a nested query.
#[derive(Debug, Clone, PartialEq)]
pub enum Condition {
    Compare(Comparison),
    /// The literal could not be coerced; no element matches.
    Never,
}

/// One existential level: "some element of `collection` satisfies `body`".
#[derive(Debug, Clone, PartialEq)]
pub struct CollectionScope {
    /// Path to the collection, relative to the enclosing scope's element.
    pub collection: FieldPath,
    /// Treat a null collection as non-matching before iterating.
    pub guarded: bool,
    pub body: ScopeBody,
}

#[derive(Debug, Clone, PartialEq)]
pub enum ScopeBody {
    Condition(Condition),
    Scope(Box<CollectionScope>),
}

/// A leaf on a nested-collection field.
#[derive(Debug, Clone)]
pub struct NestedQuery {
    pub map: FieldMap,
    pub raw_value: String,
    pub op: Operator,
    pub scope: CollectionScope,
}

/// Operations the compiler needs from a backend.
pub trait QueryBuilder {
    type Query;

    fn and(&self, left: Self::Query, right: Self::Query) -> Self::Query;

    fn or(&self, left: Self::Query, right: Self::Query) -> Self::Query;

    fn always_true(&self) -> Self::Query;

    /// Predicate for a leaf whose literal could not be coerced.
    fn always_false(&self, path: &FieldPath) -> Self::Query;

    /// `None` rejects the comparison as an invalid expression.
    fn build_leaf(&self, leaf: &Comparison) -> Option<Self::Query>;

    /// Existential predicate over a collection. `None` rejects it.
    fn build_nested(&self, nested: &NestedQuery) -> Option<Self::Query>;

    /// Merge two sides of a parenthesized binary expression into one
    /// existential when both quantify over the same collection.
    fn try_merge(
        &self,
        left: Compiled<Self::Query>,
        right: Compiled<Self::Query>,
        _op: LogicalOp,
    ) -> Merge<Self::Query> {
        Merge::NotApplicable(left, right)
    }

    /// True when the map at `map` holds `key`.
    fn has_key(&self, map: &FieldPath, key: &Value) -> Self::Query;

    fn null_check(&self, path: &FieldPath, check: NullCheck) -> Self::Query;
}

/// Walks a syntax tree against a mapper, emitting through a builder.
pub struct QueryCompiler<'a, B> {
    mapper: &'a FieldMapper,
    builder: &'a B,
}

/// Literal after the value pipeline.
enum Prepared {
    Ready {
        value: Value,
        matches_absent: bool,
        case_insensitive: bool,
    },
    Never,
}

impl<'a, B: QueryBuilder> QueryCompiler<'a, B> {
    pub fn new(mapper: &'a FieldMapper, builder: &'a B) -> Self {
        Self { mapper, builder }
    }

    pub fn compile(&self, expr: &Expr) -> Result<B::Query> {
        self.build(expr, false).map(|compiled| compiled.query)
    }

    fn build(&self, expr: &Expr, isolated: bool) -> Result<Compiled<B::Query>> {
        match expr {
            Expr::Comparison(leaf) => self.build_comparison(leaf),
            Expr::Parenthesized(inner) => self.build(inner, true),
            Expr::Binary(bin) => {
                let left = self.build(&bin.left, false)?;
                let right = self.build(&bin.right, false)?;

                let (left, right) = if isolated {
                    match self.builder.try_merge(left, right, bin.op) {
                        Merge::Merged(query) => {
                            tracing::debug!(target: "sift::compiler", op = %bin.op, "merged nested collection predicates");
                            return Ok(Compiled { query, nested: true });
                        }
                        Merge::NotApplicable(left, right) => (left, right),
                    }
                } else {
                    (left, right)
                };

                let query = match bin.op {
                    LogicalOp::And => self.builder.and(left.query, right.query),
                    LogicalOp::Or => self.builder.or(left.query, right.query),
                };
                Ok(Compiled {
                    query,
                    nested: false,
                })
            }
        }
    }

    fn build_comparison(&self, leaf: &ComparisonExpr) -> Result<Compiled<B::Query>> {
        let config = self.mapper.config();
        let name = leaf.field.name.trim();

        let map = match self.mapper.resolve(name) {
            Ok(map) => map,
            Err(err) if err.is_mapping_not_found() && config.ignore_unmapped_fields => {
                tracing::debug!(target: "sift::compiler", field = %name, "ignoring unmapped field");
                return Ok(Compiled {
                    query: self.builder.always_true(),
                    nested: false,
                });
            }
            Err(err) => return Err(err),
        };

        let op = self
            .mapper
            .operators()
            .resolve(&leaf.op.symbol)
            .ok_or_else(|| Error::UnknownOperator(leaf.op.symbol.clone()))?;

        let path = match self.bind_indexer(map, leaf.field.indexer.as_deref())? {
            Some(path) => path,
            None => {
                return Ok(Compiled {
                    query: self.builder.always_false(map.path()),
                    nested: false,
                })
            }
        };

        if map.is_nested_collection() {
            let nested = self.nested_query(map, &path, leaf, op)?;
            let query = self.builder.build_nested(&nested).ok_or_else(|| {
                Error::InvalidExpression(format!("cannot build nested query for '{}'", name))
            })?;
            return Ok(Compiled {
                query,
                nested: true,
            });
        }

        let comparison = match self.prepare(map, &op, leaf, false) {
            Prepared::Ready {
                value,
                matches_absent,
                case_insensitive,
            } => Comparison {
                path: path.clone(),
                field_type: map.field_type(),
                op,
                value,
                case_insensitive,
                matches_absent,
            },
            Prepared::Never => {
                return Ok(Compiled {
                    query: self.builder.always_false(&path),
                    nested: false,
                })
            }
        };

        let query = self.builder.build_leaf(&comparison).ok_or_else(|| {
            Error::InvalidExpression(format!(
                "cannot build '{}' comparison for '{}'",
                comparison.op, name
            ))
        })?;

        let query = if leaf.field.indexer.is_some() {
            self.add_indexer_guard(&path, query)
        } else {
            self.add_null_propagation(&comparison, query)
        };

        Ok(Compiled {
            query,
            nested: false,
        })
    }

    /// Bind the indexer literal into the map's key slot.
    ///
    /// Returns `Ok(None)` when the key cannot be coerced to the key type, in
    /// which case no entry can match.
    fn bind_indexer(&self, map: &FieldMap, indexer: Option<&str>) -> Result<Option<FieldPath>> {
        match (indexer, map.path().has_key_slot()) {
            (None, false) => Ok(Some(map.path().clone())),
            (None, true) => Err(Error::Mapping(format!(
                "Field '{}' requires an indexer",
                map.name()
            ))),
            (Some(_), false) => Err(Error::Mapping(format!(
                "Field '{}' does not support an indexer",
                map.name()
            ))),
            (Some(key), true) => match coerce(key, map.key_type(), None) {
                Ok(key) => Ok(map.path().bind_key(key)),
                Err(err) => {
                    tracing::debug!(target: "sift::compiler", field = %map.name(), error = %err, "indexer key not coercible");
                    Ok(None)
                }
            },
        }
    }

    fn nested_query(
        &self,
        map: &FieldMap,
        path: &FieldPath,
        leaf: &ComparisonExpr,
        op: Operator,
    ) -> Result<NestedQuery> {
        let guarded = !self.mapper.config().disable_collection_null_checks;

        let condition = |element: FieldPath| match self.prepare(map, &op, leaf, true) {
            Prepared::Ready {
                value,
                matches_absent,
                case_insensitive,
            } => Condition::Compare(Comparison {
                path: element,
                field_type: map.field_type(),
                op: op.clone(),
                value,
                case_insensitive,
                matches_absent,
            }),
            Prepared::Never => Condition::Never,
        };

        let scope = build_scope(path, guarded, &condition).ok_or_else(|| {
            Error::Mapping(format!("Field '{}' is not a nested collection", map.name()))
        })?;

        Ok(NestedQuery {
            map: map.clone(),
            raw_value: leaf.value.text.clone(),
            op,
            scope,
        })
    }

    /// Convert the literal text into the value a backend compares against.
    fn prepare(&self, map: &FieldMap, op: &Operator, leaf: &ComparisonExpr, nested: bool) -> Prepared {
        let config = self.mapper.config();
        let raw = leaf.value.text.as_str();
        let field_type = map.field_type();

        let mut value = match map.convertor() {
            Some(convert) => convert(raw),
            None => Value::Text(raw.to_string()),
        };

        if config.allow_null_search && op.is_equality() && value.as_str() == Some("null") {
            value = Value::Null;
        }

        let mut matches_absent = false;
        if let Value::Text(text) = &value {
            if field_type.is_text() {
                matches_absent = text.is_empty() && op.is_equality();
            } else if op.is_textual() {
                // Compared against the field's textual rendering.
            } else if text.is_empty() && op.is_equality() {
                value = if map.is_nullable() {
                    Value::Null
                } else {
                    field_type.default_value()
                };
            } else {
                match coerce(text, field_type, config.default_date_time_kind) {
                    Ok(coerced) => value = coerced,
                    Err(err) if op.is_custom() => {
                        tracing::debug!(target: "sift::compiler", field = %map.name(), error = %err, "passing raw literal to custom operator");
                    }
                    Err(err) => {
                        tracing::debug!(target: "sift::compiler", field = %map.name(), error = %err, "literal not coercible, leaf is always false");
                        return Prepared::Never;
                    }
                }
            }
        }

        let wants_folding = leaf.value.case_insensitive
            || leaf.field.case_insensitive
            || (config.case_insensitive_filtering && !nested && field_type.is_text());
        let case_insensitive = wants_folding && !op.is_ordering() && !value.is_null();
        if case_insensitive {
            value = value.fold_case();
        }

        Prepared::Ready {
            value,
            matches_absent,
            case_insensitive,
        }
    }

    fn add_indexer_guard(&self, path: &FieldPath, query: B::Query) -> B::Query {
        if self.mapper.config().disable_collection_null_checks {
            return query;
        }
        match path.split_key() {
            Some((map, key)) => {
                let guard = self.builder.has_key(&map, key);
                self.builder.and(guard, query)
            }
            None => query,
        }
    }

    /// Short-circuit the comparison when an intermediate hop is null.
    fn add_null_propagation(&self, comparison: &Comparison, query: B::Query) -> B::Query {
        if !self.mapper.config().avoid_null_reference {
            return query;
        }

        let guards = comparison.path.null_guards();
        let when_null = comparison.outcome_on_null();
        guards.iter().rev().fold(query, |query, prefix| {
            if when_null {
                let escape = self.builder.null_check(prefix, NullCheck::IsNull);
                self.builder.or(escape, query)
            } else {
                let guard = self.builder.null_check(prefix, NullCheck::HasValue);
                self.builder.and(guard, query)
            }
        })
    }
}

/// Split a collection path into nested scopes, innermost condition last.
fn build_scope<F>(path: &FieldPath, guarded: bool, condition: &F) -> Option<CollectionScope>
where
    F: Fn(FieldPath) -> Condition,
{
    let (collection, element) = path.split_collection()?;
    let body = if element.is_nested_collection() {
        ScopeBody::Scope(Box::new(build_scope(&element, guarded, condition)?))
    } else {
        ScopeBody::Condition(condition(element))
    };
    Some(CollectionScope {
        collection,
        guarded,
        body,
    })
}
