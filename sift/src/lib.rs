//! Sift: filter, ordering and paging language compiler
//!
//! Turns text like `name=John,age>=18|(tag=*vip)` into a query for any
//! backend implementing [`QueryBuilder`].

pub mod backend;
pub mod compiler;
pub mod config;
pub mod error;
pub mod grid;
pub mod mapping;
pub mod operator;
pub mod ordering;
pub mod syntax;
pub mod value;

pub use compiler::{
    CollectionScope, Comparison, Compiled, Condition, Merge, NestedQuery, NullCheck, QueryBuilder,
    QueryCompiler, ScopeBody,
};
pub use config::{Config, DateTimeKind};
pub use error::{Error, Result};
pub use grid::{GridQuery, Paging};
pub use mapping::{Convertor, FieldMap, FieldMapper, FieldPath, Segment};
pub use operator::{CustomOperator, Operator, OperatorRegistry};
pub use ordering::{compile_order, Direction, NullOrder, SortKey};
pub use syntax::{escape_value, parse_filter, parse_filter_with_depth, Expr, LogicalOp};
pub use value::{FieldType, Value};

/// Compile filter text through a backend builder.
///
/// Empty or whitespace-only text compiles to `always_true`. Filters nested
/// deeper than the configured `max_depth` fail with a syntax error.
pub fn compile_filter<B: QueryBuilder>(text: &str, mapper: &FieldMapper, builder: &B) -> Result<B::Query> {
    if text.trim().is_empty() {
        return Ok(builder.always_true());
    }
    let expr = parse_filter_with_depth(text, mapper.operators(), mapper.config().max_depth)?;
    QueryCompiler::new(mapper, builder).compile(&expr)
}

/// True if the filter parses and every field it names is mapped and used
/// the way its mapping allows.
pub fn validate_filter(text: &str, mapper: &FieldMapper) -> bool {
    if text.trim().is_empty() {
        return true;
    }
    let Ok(expr) = parse_filter_with_depth(text, mapper.operators(), mapper.config().max_depth) else {
        return false;
    };
    expr.comparisons().iter().all(|leaf| {
        let Some(map) = mapper.get(leaf.field.name.trim()) else {
            return false;
        };
        let indexed = leaf.field.indexer.is_some();
        indexed == map.path().has_key_slot()
            && mapper.operators().resolve(&leaf.op.symbol).is_some()
    })
}

/// True if the ordering parses and every field is mapped and orderable.
pub fn validate_order(text: &str, mapper: &FieldMapper) -> bool {
    let Ok(entries) = ordering::parse_order(text) else {
        return false;
    };
    entries.iter().all(|entry| match mapper.get(&entry.name) {
        Some(map) => {
            !map.is_nested_collection() && entry.indexer.is_some() == map.path().has_key_slot()
        }
        None => false,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn mapper() -> FieldMapper {
        FieldMapper::with_config(Config::default().with_ignore_unmapped_fields(true))
            .map(FieldMap::new("id", "id", FieldType::Int).unwrap())
            .map(FieldMap::new("name", "name", FieldType::Text).unwrap())
            .map(FieldMap::new("tag", "tag", FieldType::Text).unwrap())
            .map(FieldMap::new("childName", "children[*].name", FieldType::Text).unwrap())
            .map(FieldMap::new("props", "props[]", FieldType::Text).unwrap())
    }

    #[test]
    fn test_validate_filter() {
        let mapper = mapper();
        assert!(validate_filter("", &mapper));
        assert!(validate_filter("(id=2,tag=someTag)", &mapper));
        assert!(validate_filter("props[a]=1|childName=*x", &mapper));
        assert!(!validate_filter("notExist=123", &mapper));
        assert!(!validate_filter("name123,123", &mapper));
        assert!(!validate_filter("!name<23", &mapper));
        assert!(!validate_filter("@name=john", &mapper));
        assert!(!validate_filter("props=1", &mapper));
    }

    #[test]
    fn test_validate_order() {
        let mapper = mapper();
        assert!(validate_order("", &mapper));
        assert!(validate_order("id desc, name", &mapper));
        assert!(!validate_order("name,", &mapper));
        assert!(!validate_order("!name", &mapper));
        assert!(!validate_order("name des", &mapper));
        assert!(!validate_order("id asc,name2 desc", &mapper));
        assert!(!validate_order("childName", &mapper));
    }

    #[test]
    fn test_empty_filter_is_always_true() {
        struct Count;
        impl QueryBuilder for Count {
            type Query = usize;
            fn and(&self, l: usize, r: usize) -> usize {
                l + r
            }
            fn or(&self, l: usize, r: usize) -> usize {
                l + r
            }
            fn always_true(&self) -> usize {
                0
            }
            fn always_false(&self, _: &FieldPath) -> usize {
                0
            }
            fn build_leaf(&self, _: &Comparison) -> Option<usize> {
                Some(1)
            }
            fn build_nested(&self, _: &NestedQuery) -> Option<usize> {
                Some(1)
            }
            fn has_key(&self, _: &FieldPath, _: &Value) -> usize {
                0
            }
            fn null_check(&self, _: &FieldPath, _: NullCheck) -> usize {
                0
            }
        }

        let mapper = mapper();
        assert_eq!(compile_filter("  ", &mapper, &Count).unwrap(), 0);
        assert_eq!(compile_filter("id=1,name=a", &mapper, &Count).unwrap(), 2);
    }
}
