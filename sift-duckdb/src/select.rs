//! Full SELECT statements from a paging request.

use duckdb::{Connection, Row};
use sift::{compile_filter, compile_order, Direction, FieldMapper, GridQuery, NullOrder, SortKey};

use crate::builder::{column, quote_ident, SqlBuilder, SqlCondition};
use crate::{Error, Result};

/// `ORDER BY` body for the given keys, or `None` when there are none.
///
/// Natural ordering puts nulls first ascending and last descending.
pub fn order_by_sql(keys: &[SortKey]) -> Option<String> {
    if keys.is_empty() {
        return None;
    }
    let parts: Vec<String> = keys
        .iter()
        .map(|key| {
            let col = column(None, &key.path);
            let direction = match key.direction {
                Direction::Ascending => "ASC",
                Direction::Descending => "DESC",
            };
            match key.null_order {
                NullOrder::Natural => {
                    let nulls = match key.direction {
                        Direction::Ascending => "NULLS FIRST",
                        Direction::Descending => "NULLS LAST",
                    };
                    format!("{} {} {}", col, direction, nulls)
                }
                NullOrder::HasValue => format!("({} IS NOT NULL) {}", col, direction),
                NullOrder::IsNull => format!("({} IS NULL) {}", col, direction),
            }
        })
        .collect();
    Some(parts.join(", "))
}

/// A single-table SELECT with optional filter, ordering and paging.
#[derive(Debug, Clone, PartialEq)]
pub struct SelectQuery {
    pub table: String,
    pub columns: Vec<String>,
    pub filter: SqlCondition,
    pub order: Vec<SortKey>,
    pub limit: Option<usize>,
    pub offset: Option<usize>,
}

impl SelectQuery {
    pub fn new(table: impl Into<String>) -> Self {
        Self {
            table: table.into(),
            columns: Vec::new(),
            filter: SqlCondition::True,
            order: Vec::new(),
            limit: None,
            offset: None,
        }
    }

    /// Compile a paging request against `table`.
    pub fn from_grid(table: impl Into<String>, query: &GridQuery, mapper: &FieldMapper) -> Result<Self> {
        let config = mapper.config();
        let mut select = Self::new(table);
        select.filter = compile_filter(query.filter_text(), mapper, &SqlBuilder)?;
        select.order = compile_order(query.order_text(), mapper)?;
        select.limit = Some(query.take(config));
        select.offset = Some(query.skip(config));
        Ok(select)
    }

    pub fn with_columns<I, S>(mut self, columns: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.columns = columns.into_iter().map(Into::into).collect();
        self
    }

    /// `WHERE` clause text, empty when the filter is always true.
    fn where_clause(&self) -> String {
        match self.filter {
            SqlCondition::True => String::new(),
            ref filter => format!(" WHERE {}", filter.to_sql()),
        }
    }

    fn table_sql(&self) -> Result<String> {
        if self.table.trim().is_empty() {
            return Err(Error::InvalidIdentifier(self.table.clone()));
        }
        Ok(quote_ident(&self.table))
    }

    pub fn to_sql(&self) -> Result<String> {
        let columns = if self.columns.is_empty() {
            "*".to_string()
        } else {
            self.columns
                .iter()
                .map(|c| quote_ident(c))
                .collect::<Vec<_>>()
                .join(", ")
        };

        let mut sql = format!("SELECT {} FROM {}{}", columns, self.table_sql()?, self.where_clause());
        if let Some(order) = order_by_sql(&self.order) {
            sql.push_str(&format!(" ORDER BY {}", order));
        }
        if let Some(limit) = self.limit {
            sql.push_str(&format!(" LIMIT {}", limit));
        }
        if let Some(offset) = self.offset.filter(|o| *o > 0) {
            sql.push_str(&format!(" OFFSET {}", offset));
        }
        Ok(sql)
    }

    /// `SELECT COUNT(*)` over the filtered table, ignoring ordering and paging.
    pub fn count_sql(&self) -> Result<String> {
        Ok(format!(
            "SELECT COUNT(*) FROM {}{}",
            self.table_sql()?,
            self.where_clause()
        ))
    }
}

/// Run a SELECT and map each row.
pub fn query_rows<T, F>(conn: &Connection, query: &SelectQuery, map: F) -> Result<Vec<T>>
where
    F: FnMut(&Row<'_>) -> duckdb::Result<T>,
{
    let sql = query.to_sql()?;
    tracing::debug!(target: "sift::duckdb", sql = %sql, "running select");

    let mut stmt = conn.prepare(&sql)?;
    let rows = stmt.query_map([], map)?;

    let mut results = Vec::new();
    for row in rows {
        results.push(row?);
    }
    Ok(results)
}

/// Count rows matching the query's filter.
pub fn count_rows(conn: &Connection, query: &SelectQuery) -> Result<usize> {
    let sql = query.count_sql()?;
    let count: i64 = conn.query_row(&sql, [], |row| row.get(0))?;
    Ok(usize::try_from(count).unwrap_or(0))
}

#[cfg(test)]
mod tests {
    use super::*;
    use sift::{Config, FieldMap, FieldType};

    fn mapper() -> FieldMapper {
        FieldMapper::with_config(Config::default())
            .map(FieldMap::new("id", "id", FieldType::Int).unwrap())
            .map(FieldMap::new("name", "name", FieldType::Text).unwrap())
            .map(FieldMap::new("born", "born", FieldType::Date).unwrap().nullable())
    }

    #[test]
    fn test_order_by_sql() {
        let keys = compile_order("born desc, id, born?, born!", &mapper()).unwrap();
        assert_eq!(
            order_by_sql(&keys).unwrap(),
            "\"born\" DESC NULLS LAST, \"id\" ASC NULLS FIRST, (\"born\" IS NOT NULL) ASC, (\"born\" IS NULL) ASC"
        );
        assert!(order_by_sql(&[]).is_none());
    }

    #[test]
    fn test_select_from_grid() {
        let query = GridQuery::new()
            .with_filter("id>1")
            .with_order_by("name desc")
            .with_page(3, 10);
        let select = SelectQuery::from_grid("people", &query, &mapper())
            .unwrap()
            .with_columns(["id", "name"]);
        assert_eq!(
            select.to_sql().unwrap(),
            "SELECT \"id\", \"name\" FROM \"people\" WHERE \"id\" > 1 ORDER BY \"name\" DESC NULLS LAST LIMIT 10 OFFSET 20"
        );
        assert_eq!(
            select.count_sql().unwrap(),
            "SELECT COUNT(*) FROM \"people\" WHERE \"id\" > 1"
        );
    }

    #[test]
    fn test_select_defaults() {
        let select = SelectQuery::from_grid("people", &GridQuery::new(), &mapper()).unwrap();
        assert_eq!(select.to_sql().unwrap(), "SELECT * FROM \"people\" LIMIT 20");
    }

    #[test]
    fn test_compile_errors_surface() {
        let query = GridQuery::new().with_filter("nope=1");
        let err = SelectQuery::from_grid("people", &query, &mapper()).unwrap_err();
        assert_eq!(err.to_string(), "Mapping 'nope' not found");
    }

    #[test]
    fn test_blank_table_name() {
        assert!(matches!(
            SelectQuery::new(" ").to_sql(),
            Err(Error::InvalidIdentifier(_))
        ));
    }
}
