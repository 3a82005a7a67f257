//! In-memory backend: compiles to a `Predicate` tree evaluated against
//! `serde_json::Value` records. Any `T: Serialize` can be filtered, sorted
//! and paged.

use std::cmp::Ordering;

use serde::Serialize;
use serde_json::Value as Json;

use crate::compiler::{
    CollectionScope, Comparison, Compiled, Condition, Merge, NestedQuery, NullCheck,
    QueryBuilder, ScopeBody,
};
use crate::grid::{GridQuery, Paging};
use crate::mapping::{FieldMapper, FieldPath, Segment};
use crate::operator::Operator;
use crate::ordering::{compile_order, Direction, NullOrder, SortKey};
use crate::syntax::LogicalOp;
use crate::value::{FieldType, Value};
use crate::Result;

/// A compiled in-memory predicate.
#[derive(Debug, Clone, PartialEq)]
pub enum Predicate {
    True,
    False,
    And(Box<Predicate>, Box<Predicate>),
    Or(Box<Predicate>, Box<Predicate>),
    Compare(Comparison),
    /// Some element of the collection satisfies `inner`.
    Any {
        collection: FieldPath,
        guarded: bool,
        inner: Box<Predicate>,
    },
    HasKey {
        map: FieldPath,
        key: Value,
    },
    Null {
        path: FieldPath,
        check: NullCheck,
    },
}

impl Predicate {
    pub fn matches(&self, record: &Json) -> bool {
        match self {
            Predicate::True => true,
            Predicate::False => false,
            Predicate::And(left, right) => left.matches(record) && right.matches(record),
            Predicate::Or(left, right) => left.matches(record) || right.matches(record),
            Predicate::Compare(comparison) => evaluate(comparison, record),
            Predicate::Any {
                collection, inner, ..
            } => match resolve(record, collection) {
                Some(Json::Array(items)) => items.iter().any(|item| inner.matches(item)),
                _ => false,
            },
            Predicate::HasKey { map, key } => match (resolve(record, map), key.to_text()) {
                (Some(Json::Object(entries)), Some(key)) => entries.contains_key(&key),
                _ => false,
            },
            Predicate::Null { path, check } => {
                let present = resolve(record, path).is_some();
                match check {
                    NullCheck::HasValue => present,
                    NullCheck::IsNull => !present,
                }
            }
        }
    }
}

/// Builds [`Predicate`] trees.
#[derive(Debug, Clone, Copy, Default)]
pub struct MemoryBuilder;

impl MemoryBuilder {
    fn scope(scope: &CollectionScope) -> Predicate {
        let inner = match &scope.body {
            ScopeBody::Condition(Condition::Compare(comparison)) => {
                Predicate::Compare(comparison.clone())
            }
            ScopeBody::Condition(Condition::Never) => Predicate::False,
            ScopeBody::Scope(inner) => Self::scope(inner),
        };
        Predicate::Any {
            collection: scope.collection.clone(),
            guarded: scope.guarded,
            inner: Box::new(inner),
        }
    }
}

impl QueryBuilder for MemoryBuilder {
    type Query = Predicate;

    fn and(&self, left: Predicate, right: Predicate) -> Predicate {
        Predicate::And(Box::new(left), Box::new(right))
    }

    fn or(&self, left: Predicate, right: Predicate) -> Predicate {
        Predicate::Or(Box::new(left), Box::new(right))
    }

    fn always_true(&self) -> Predicate {
        Predicate::True
    }

    fn always_false(&self, _path: &FieldPath) -> Predicate {
        Predicate::False
    }

    fn build_leaf(&self, leaf: &Comparison) -> Option<Predicate> {
        Some(Predicate::Compare(leaf.clone()))
    }

    fn build_nested(&self, nested: &NestedQuery) -> Option<Predicate> {
        Some(Self::scope(&nested.scope))
    }

    fn try_merge(
        &self,
        left: Compiled<Predicate>,
        right: Compiled<Predicate>,
        op: LogicalOp,
    ) -> Merge<Predicate> {
        if !(left.nested && right.nested) {
            return Merge::NotApplicable(left, right);
        }
        match (left.query, right.query) {
            (
                Predicate::Any {
                    collection,
                    guarded,
                    inner: left_inner,
                },
                Predicate::Any {
                    collection: right_collection,
                    inner: right_inner,
                    ..
                },
            ) if collection == right_collection => {
                let inner = match op {
                    LogicalOp::And => self.and(*left_inner, *right_inner),
                    LogicalOp::Or => self.or(*left_inner, *right_inner),
                };
                Merge::Merged(Predicate::Any {
                    collection,
                    guarded,
                    inner: Box::new(inner),
                })
            }
            (left_query, right_query) => Merge::NotApplicable(
                Compiled {
                    query: left_query,
                    nested: true,
                },
                Compiled {
                    query: right_query,
                    nested: true,
                },
            ),
        }
    }

    fn has_key(&self, map: &FieldPath, key: &Value) -> Predicate {
        Predicate::HasKey {
            map: map.clone(),
            key: key.clone(),
        }
    }

    fn null_check(&self, path: &FieldPath, check: NullCheck) -> Predicate {
        Predicate::Null {
            path: path.clone(),
            check,
        }
    }
}

/// Walk a path from `node`. Missing members and JSON null resolve to `None`.
fn resolve<'a>(node: &'a Json, path: &FieldPath) -> Option<&'a Json> {
    let mut current = node;
    for segment in path.segments() {
        current = match segment {
            Segment::Member(name) => current.get(name)?,
            Segment::Key(Some(key)) => current.get(key.to_text()?.as_str())?,
            Segment::Key(None) | Segment::Each => return None,
        };
    }
    (!current.is_null()).then_some(current)
}

fn field_value(record: &Json, path: &FieldPath, field_type: FieldType) -> Value {
    Value::from_json(resolve(record, path), field_type)
}

fn evaluate(comparison: &Comparison, record: &Json) -> bool {
    let mut field = field_value(record, &comparison.path, comparison.field_type);

    if comparison.matches_absent {
        let absent = field.as_str().map_or(true, str::is_empty);
        return match comparison.op {
            Operator::NotEqual => !absent,
            _ => absent,
        };
    }

    if comparison.op.is_textual() {
        field = field.to_text().map(Value::Text).unwrap_or(Value::Null);
    }
    if comparison.case_insensitive {
        field = field.fold_case();
    }

    let value = &comparison.value;
    let equal = || match (&field, value) {
        (Value::Null, Value::Null) => true,
        (a, b) => a.compare(b) == Some(Ordering::Equal),
    };
    let ordered = |accept: fn(Ordering) -> bool| field.compare(value).is_some_and(accept);
    let text = |test: fn(&str, &str) -> bool| match (field.as_str(), value.as_str()) {
        (Some(f), Some(v)) => test(f, v),
        _ => false,
    };

    match &comparison.op {
        Operator::Equal => equal(),
        Operator::NotEqual => !equal(),
        Operator::GreaterThan => ordered(|o| o == Ordering::Greater),
        Operator::GreaterOrEqual => ordered(|o| o != Ordering::Less),
        Operator::LessThan => ordered(|o| o == Ordering::Less),
        Operator::LessOrEqual => ordered(|o| o != Ordering::Greater),
        Operator::Contains => text(|f, v| f.contains(v)),
        Operator::NotContains => !text(|f, v| f.contains(v)),
        Operator::StartsWith => text(|f, v| f.starts_with(v)),
        Operator::NotStartsWith => !text(|f, v| f.starts_with(v)),
        Operator::EndsWith => text(|f, v| f.ends_with(v)),
        Operator::NotEndsWith => !text(|f, v| f.ends_with(v)),
        Operator::Custom(custom) => custom.matches(&field, value),
    }
}

fn to_records<T: Serialize>(items: &[T]) -> Result<Vec<(&T, Json)>> {
    items
        .iter()
        .map(|item| Ok((item, serde_json::to_value(item)?)))
        .collect()
}

/// Items matching a compiled predicate, in their original order.
pub fn filter<'a, T: Serialize>(items: &'a [T], predicate: &Predicate) -> Result<Vec<&'a T>> {
    Ok(to_records(items)?
        .into_iter()
        .filter(|(_, json)| predicate.matches(json))
        .map(|(item, _)| item)
        .collect())
}

/// Stable sort by the given keys.
pub fn sort<T: Serialize>(items: &mut [&T], keys: &[SortKey]) -> Result<()> {
    if keys.is_empty() {
        return Ok(());
    }
    let mut records: Vec<(usize, Json)> = items
        .iter()
        .enumerate()
        .map(|(i, item)| Ok((i, serde_json::to_value(item)?)))
        .collect::<Result<_>>()?;
    records.sort_by(|(_, a), (_, b)| compare_records(a, b, keys));

    let sorted: Vec<&T> = records.iter().map(|(i, _)| items[*i]).collect();
    items.copy_from_slice(&sorted);
    Ok(())
}

fn compare_records(a: &Json, b: &Json, keys: &[SortKey]) -> Ordering {
    keys.iter()
        .map(|key| {
            let left = sort_value(a, key);
            let right = sort_value(b, key);
            let ordering = left.sort_cmp(&right);
            match key.direction {
                Direction::Ascending => ordering,
                Direction::Descending => ordering.reverse(),
            }
        })
        .find(|ordering| *ordering != Ordering::Equal)
        .unwrap_or(Ordering::Equal)
}

fn sort_value(record: &Json, key: &SortKey) -> Value {
    let value = field_value(record, &key.path, key.field_type);
    match key.null_order {
        NullOrder::Natural => value,
        NullOrder::HasValue => Value::Bool(!value.is_null()),
        NullOrder::IsNull => Value::Bool(value.is_null()),
    }
}

/// Filter, count, order and page a slice in one call.
pub fn apply_grid_query<'a, T: Serialize>(
    items: &'a [T],
    query: &GridQuery,
    mapper: &FieldMapper,
) -> Result<Paging<&'a T>> {
    let predicate = crate::compile_filter(query.filter_text(), mapper, &MemoryBuilder)?;
    let keys = compile_order(query.order_text(), mapper)?;

    let mut matched = filter(items, &predicate)?;
    let count = matched.len();
    sort(&mut matched, &keys)?;

    let config = mapper.config();
    let data = matched
        .into_iter()
        .skip(query.skip(config))
        .take(query.take(config))
        .collect();

    Ok(Paging { count, data })
}

#[cfg(test)]
mod tests;
