//! Renders compiled filters to DuckDB SQL.
//!
//! Paths map onto columns: `a.b` is struct field access, `props[k]` is a
//! MAP lookup, and collection scopes become `list_filter` lambdas over a
//! LIST column.

use sift::{
    CollectionScope, Comparison, Compiled, Condition, FieldPath, FieldType, LogicalOp, Merge,
    NestedQuery, NullCheck, Operator, QueryBuilder, ScopeBody, Segment, Value,
};

/// A SQL boolean expression.
#[derive(Debug, Clone, PartialEq)]
pub enum SqlCondition {
    True,
    False,
    Clause(String),
    And(Box<SqlCondition>, Box<SqlCondition>),
    Or(Box<SqlCondition>, Box<SqlCondition>),
    /// Some element of the LIST `collection` satisfies `inner`, where
    /// `inner` refers to the element as `element`.
    Exists {
        collection: String,
        element: String,
        guarded: bool,
        inner: Box<SqlCondition>,
    },
}

impl SqlCondition {
    pub fn to_sql(&self) -> String {
        match self {
            SqlCondition::True => "TRUE".to_string(),
            SqlCondition::False => "FALSE".to_string(),
            SqlCondition::Clause(sql) => sql.clone(),
            SqlCondition::And(left, right) => {
                format!("({} AND {})", left.to_sql(), right.to_sql())
            }
            SqlCondition::Or(left, right) => format!("({} OR {})", left.to_sql(), right.to_sql()),
            SqlCondition::Exists {
                collection,
                element,
                guarded,
                inner,
            } => {
                let exists = format!(
                    "len(list_filter({}, {} -> {})) > 0",
                    collection,
                    element,
                    inner.to_sql()
                );
                if *guarded {
                    format!("({} IS NOT NULL AND {})", collection, exists)
                } else {
                    exists
                }
            }
        }
    }
}

/// Builds [`SqlCondition`]s.
#[derive(Debug, Clone, Copy, Default)]
pub struct SqlBuilder;

impl SqlBuilder {
    pub fn new() -> Self {
        Self
    }

    fn scope(scope: &CollectionScope, root: Option<&str>, depth: usize) -> Option<SqlCondition> {
        let collection = column(root, &scope.collection);
        let element = format!("e{}", depth);
        let inner = match &scope.body {
            ScopeBody::Condition(Condition::Compare(comparison)) => {
                SqlCondition::Clause(render_comparison(comparison, Some(&element))?)
            }
            ScopeBody::Condition(Condition::Never) => SqlCondition::False,
            ScopeBody::Scope(inner) => Self::scope(inner, Some(&element), depth + 1)?,
        };
        Some(SqlCondition::Exists {
            collection,
            element,
            guarded: scope.guarded,
            inner: Box::new(inner),
        })
    }
}

impl QueryBuilder for SqlBuilder {
    type Query = SqlCondition;

    fn and(&self, left: SqlCondition, right: SqlCondition) -> SqlCondition {
        SqlCondition::And(Box::new(left), Box::new(right))
    }

    fn or(&self, left: SqlCondition, right: SqlCondition) -> SqlCondition {
        SqlCondition::Or(Box::new(left), Box::new(right))
    }

    fn always_true(&self) -> SqlCondition {
        SqlCondition::True
    }

    fn always_false(&self, _path: &FieldPath) -> SqlCondition {
        SqlCondition::False
    }

    fn build_leaf(&self, leaf: &Comparison) -> Option<SqlCondition> {
        render_comparison(leaf, None).map(SqlCondition::Clause)
    }

    fn build_nested(&self, nested: &NestedQuery) -> Option<SqlCondition> {
        Self::scope(&nested.scope, None, 0)
    }

    fn try_merge(
        &self,
        left: Compiled<SqlCondition>,
        right: Compiled<SqlCondition>,
        op: LogicalOp,
    ) -> Merge<SqlCondition> {
        if !(left.nested && right.nested) {
            return Merge::NotApplicable(left, right);
        }
        match (left.query, right.query) {
            (
                SqlCondition::Exists {
                    collection,
                    element,
                    guarded,
                    inner: left_inner,
                },
                SqlCondition::Exists {
                    collection: right_collection,
                    element: right_element,
                    inner: right_inner,
                    ..
                },
            ) if collection == right_collection && element == right_element => {
                let inner = match op {
                    LogicalOp::And => self.and(*left_inner, *right_inner),
                    LogicalOp::Or => self.or(*left_inner, *right_inner),
                };
                Merge::Merged(SqlCondition::Exists {
                    collection,
                    element,
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

    fn has_key(&self, map: &FieldPath, key: &Value) -> SqlCondition {
        SqlCondition::Clause(format!(
            "map_contains({}, {})",
            column(None, map),
            literal(key)
        ))
    }

    fn null_check(&self, path: &FieldPath, check: NullCheck) -> SqlCondition {
        let col = column(None, path);
        SqlCondition::Clause(match check {
            NullCheck::HasValue => format!("{} IS NOT NULL", col),
            NullCheck::IsNull => format!("{} IS NULL", col),
        })
    }
}

/// Double-quote an identifier.
pub fn quote_ident(name: &str) -> String {
    format!("\"{}\"", name.replace('"', "\"\""))
}

/// Single-quote a string literal.
pub fn quote_str(text: &str) -> String {
    format!("'{}'", text.replace('\'', "''"))
}

/// Column expression for a path, optionally rooted at a lambda variable.
pub fn column(root: Option<&str>, path: &FieldPath) -> String {
    let mut sql = root.map(str::to_string);
    for segment in path.segments() {
        sql = Some(match (sql, segment) {
            (None, Segment::Member(name)) => quote_ident(name),
            (Some(base), Segment::Member(name)) => format!("{}.{}", base, quote_ident(name)),
            (Some(base), Segment::Key(Some(key))) => {
                format!("map_extract({}, {})[1]", base, literal(key))
            }
            // Collection hops are split into scopes before rendering.
            (base, _) => base.unwrap_or_default(),
        });
    }
    sql.unwrap_or_default()
}

/// SQL literal for a value.
pub fn literal(value: &Value) -> String {
    match value {
        Value::Null => "NULL".to_string(),
        Value::Bool(true) => "TRUE".to_string(),
        Value::Bool(false) => "FALSE".to_string(),
        Value::Int(i) => i.to_string(),
        Value::Float(x) if x.is_finite() => format!("{:?}", x),
        Value::Float(x) => format!("'{}'::DOUBLE", x),
        Value::Text(s) => quote_str(s),
        Value::Uuid(u) => format!("'{}'::UUID", u),
        Value::DateTime(dt) => format!("TIMESTAMP '{}'", dt.format("%Y-%m-%d %H:%M:%S%.f")),
        Value::Date(d) => format!("DATE '{}'", d.format("%Y-%m-%d")),
    }
}

fn render_comparison(cmp: &Comparison, root: Option<&str>) -> Option<String> {
    let col = column(root, &cmp.path);

    if cmp.matches_absent {
        return Some(match cmp.op {
            Operator::NotEqual => format!("({} IS NOT NULL AND {} <> '')", col, col),
            _ => format!("({} IS NULL OR {} = '')", col, col),
        });
    }

    if cmp.value.is_null() {
        return Some(match cmp.op {
            Operator::Equal => format!("{} IS NULL", col),
            Operator::NotEqual => format!("{} IS NOT NULL", col),
            _ => "FALSE".to_string(),
        });
    }

    let textual = cmp.op.is_textual();
    let mut subject = if textual && cmp.field_type != FieldType::Text {
        format!("CAST({} AS VARCHAR)", col)
    } else {
        col.clone()
    };
    if cmp.case_insensitive && (textual || cmp.field_type == FieldType::Text) {
        subject = format!("lower({})", subject);
    }
    let value = literal(&cmp.value);

    let sql = match &cmp.op {
        Operator::Equal => format!("{} = {}", subject, value),
        Operator::NotEqual => format!("{} IS DISTINCT FROM {}", subject, value),
        Operator::GreaterThan => format!("{} > {}", subject, value),
        Operator::GreaterOrEqual => format!("{} >= {}", subject, value),
        Operator::LessThan => format!("{} < {}", subject, value),
        Operator::LessOrEqual => format!("{} <= {}", subject, value),
        Operator::Contains => format!("contains({}, {})", subject, value),
        Operator::NotContains => format!("({} IS NULL OR NOT contains({}, {}))", col, subject, value),
        Operator::StartsWith => format!("starts_with({}, {})", subject, value),
        Operator::NotStartsWith => {
            format!("({} IS NULL OR NOT starts_with({}, {}))", col, subject, value)
        }
        Operator::EndsWith => format!("suffix({}, {})", subject, value),
        Operator::NotEndsWith => format!("({} IS NULL OR NOT suffix({}, {}))", col, subject, value),
        Operator::Custom(custom) => custom.to_sql(&subject, &value)?,
    };
    Some(sql)
}
