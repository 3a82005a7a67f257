//! DuckDB backend for sift
//!
//! Renders compiled filters and orderings as DuckDB SQL and runs them.

pub mod builder;
pub mod error;
pub mod select;

pub use builder::{literal, quote_ident, quote_str, SqlBuilder, SqlCondition};
pub use error::{Error, Result};
pub use select::{count_rows, order_by_sql, query_rows, SelectQuery};

use duckdb::Connection;
use sift::{FieldMapper, GridQuery, Paging};

/// Run a paging request against `table`, mapping each row.
pub fn query_page<T, F>(
    conn: &Connection,
    table: &str,
    query: &GridQuery,
    mapper: &FieldMapper,
    map: F,
) -> Result<Paging<T>>
where
    F: FnMut(&duckdb::Row<'_>) -> duckdb::Result<T>,
{
    let select = SelectQuery::from_grid(table, query, mapper)?;
    let count = count_rows(conn, &select)?;
    let data = query_rows(conn, &select, map)?;
    Ok(Paging { count, data })
}
