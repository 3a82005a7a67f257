//! Ordering compiler: `field [indexer] [?|!] [asc|desc]`, comma separated.

use crate::mapping::{FieldMapper, FieldPath};
use crate::syntax::{tokenize_ordering, Token, TokenKind};
use crate::value::{coerce, FieldType};
use crate::{Error, Result};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Direction {
    #[default]
    Ascending,
    Descending,
}

/// What a sort key orders by.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum NullOrder {
    /// The field's own value, nulls first when ascending.
    #[default]
    Natural,
    /// `field?`: whether the field has a value.
    HasValue,
    /// `field!`: whether the field is null.
    IsNull,
}

#[derive(Debug, Clone, PartialEq)]
pub struct SortKey {
    pub field: String,
    pub path: FieldPath,
    pub field_type: FieldType,
    pub direction: Direction,
    pub null_order: NullOrder,
}

/// Compile ordering text against a mapper.
///
/// Empty text yields no keys. Unmapped fields follow the mapper's
/// `ignore_unmapped_fields` policy and are skipped when it is on.
pub fn compile_order(text: &str, mapper: &FieldMapper) -> Result<Vec<SortKey>> {
    let mut keys = Vec::new();
    for entry in parse_order(text)? {
        if let Some(key) = resolve_entry(entry, mapper)? {
            keys.push(key);
        }
    }
    Ok(keys)
}

/// One parsed ordering entry before field resolution.
#[derive(Debug, Clone, PartialEq)]
pub(crate) struct OrderEntry {
    pub name: String,
    pub indexer: Option<String>,
    pub direction: Direction,
    pub null_order: NullOrder,
    pub position: usize,
}

pub(crate) fn parse_order(text: &str) -> Result<Vec<OrderEntry>> {
    let tokens = tokenize_ordering(text)?;
    if tokens.is_empty() {
        return Ok(Vec::new());
    }

    let mut entries = Vec::new();
    for chunk in tokens.split(|t| t.kind == TokenKind::Comma) {
        entries.push(parse_entry(chunk, text.len())?);
    }
    Ok(entries)
}

fn parse_entry(tokens: &[Token], end: usize) -> Result<OrderEntry> {
    let mut iter = tokens.iter().peekable();

    let name = match iter.next() {
        Some(t) if t.kind == TokenKind::Identifier => t,
        Some(t) => {
            return Err(Error::syntax(
                t.position,
                format!("expected a field name, found '{}'", t.text),
            ))
        }
        None => return Err(Error::syntax(end, "empty ordering entry")),
    };

    let mut entry = OrderEntry {
        name: name.text.clone(),
        indexer: None,
        direction: Direction::Ascending,
        null_order: NullOrder::Natural,
        position: name.position,
    };

    if iter.peek().is_some_and(|t| t.kind == TokenKind::IndexerOpen) {
        iter.next();
        match (iter.next(), iter.next()) {
            (Some(key), Some(close))
                if key.kind == TokenKind::Literal && close.kind == TokenKind::IndexerClose =>
            {
                entry.indexer = Some(key.text.clone());
            }
            _ => return Err(Error::syntax(name.position, "malformed indexer")),
        }
    }

    if let Some(t) = iter.peek() {
        match t.kind {
            TokenKind::HasValue => entry.null_order = NullOrder::HasValue,
            TokenKind::IsNull => entry.null_order = NullOrder::IsNull,
            _ => {}
        }
        if entry.null_order != NullOrder::Natural {
            iter.next();
        }
    }

    if let Some(t) = iter.peek() {
        match t.kind {
            TokenKind::Ascending => entry.direction = Direction::Ascending,
            TokenKind::Descending => entry.direction = Direction::Descending,
            _ => {}
        }
        if matches!(t.kind, TokenKind::Ascending | TokenKind::Descending) {
            iter.next();
        }
    }

    match iter.next() {
        None => Ok(entry),
        Some(t) => Err(Error::syntax(
            t.position,
            format!("unexpected '{}' in ordering entry for '{}'", t.text, entry.name),
        )),
    }
}

fn resolve_entry(entry: OrderEntry, mapper: &FieldMapper) -> Result<Option<SortKey>> {
    let map = match mapper.resolve(&entry.name) {
        Ok(map) => map,
        Err(err) if err.is_mapping_not_found() && mapper.config().ignore_unmapped_fields => {
            tracing::debug!(target: "sift::compiler", field = %entry.name, "ignoring unmapped ordering field");
            return Ok(None);
        }
        Err(err) => return Err(err),
    };

    if map.is_nested_collection() {
        return Err(Error::Mapping(format!(
            "Cannot order by collection field '{}'",
            map.name()
        )));
    }

    let path = match (&entry.indexer, map.path().has_key_slot()) {
        (None, false) => map.path().clone(),
        (Some(key), true) => {
            let key = coerce(key, map.key_type(), None).map_err(|e| {
                Error::Mapping(format!("Invalid indexer for '{}': {}", map.name(), e))
            })?;
            map.path().bind_key(key).unwrap_or_else(|| map.path().clone())
        }
        (None, true) => {
            return Err(Error::Mapping(format!(
                "Field '{}' requires an indexer",
                map.name()
            )))
        }
        (Some(_), false) => {
            return Err(Error::Mapping(format!(
                "Field '{}' does not support an indexer",
                map.name()
            )))
        }
    };

    Ok(Some(SortKey {
        field: map.name().to_string(),
        path,
        field_type: map.field_type(),
        direction: entry.direction,
        null_order: entry.null_order,
    }))
}
