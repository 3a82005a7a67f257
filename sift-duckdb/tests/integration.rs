//! Runs rendered SQL against an in-memory DuckDB database.

use duckdb::Connection;
use sift::{Config, FieldMap, FieldMapper, FieldType, GridQuery};
use sift_duckdb::{query_page, query_rows, SelectQuery};

fn setup() -> Connection {
    let conn = Connection::open_in_memory().unwrap();
    conn.execute_batch(
        r#"
        CREATE TABLE people (
            id BIGINT,
            name VARCHAR,
            tag VARCHAR,
            active BOOLEAN,
            born DATE,
            guid UUID
        );
        INSERT INTO people VALUES
            (1, 'John',    'vip',     true,  DATE '1990-05-01', 'e2cec5dd-208d-4bb5-a852-50008f8ba366'),
            (2, 'Bob',     '',        false, DATE '1985-01-20', NULL),
            (3, 'bob',     NULL,      true,  NULL,              NULL),
            (4, '(LI,AM)', 'regular', false, DATE '2001-11-30', NULL),
            (5, 'Sara',    NULL,      false, NULL,              NULL),
            (12, 'O''Neil', 'vip',    true,  DATE '1999-09-09', NULL);
        "#,
    )
    .unwrap();
    conn
}

fn mapper(config: Config) -> FieldMapper {
    FieldMapper::with_config(config)
        .map(FieldMap::new("id", "id", FieldType::Int).unwrap())
        .map(FieldMap::new("name", "name", FieldType::Text).unwrap())
        .map(FieldMap::new("tag", "tag", FieldType::Text).unwrap())
        .map(FieldMap::new("isActive", "active", FieldType::Bool).unwrap())
        .map(FieldMap::new("born", "born", FieldType::Date).unwrap().nullable())
        .map(FieldMap::new("guid", "guid", FieldType::Uuid).unwrap().nullable())
}

fn ids(conn: &Connection, filter: &str, order: &str) -> Vec<i64> {
    let query = GridQuery::new()
        .with_filter(filter)
        .with_order_by(order)
        .with_page(1, 100);
    let select = SelectQuery::from_grid("people", &query, &mapper(Config::default()))
        .unwrap()
        .with_columns(["id"]);
    query_rows(conn, &select, |row| row.get(0)).unwrap()
}

#[test]
fn test_filter_and_order() {
    let conn = setup();
    assert_eq!(ids(&conn, "isActive=1", "id desc"), vec![12, 3, 1]);
    assert_eq!(ids(&conn, "id>=2,id<5", "id"), vec![2, 3, 4]);
    assert_eq!(ids(&conn, "name=John|tag=vip", "id"), vec![1, 12]);
}

#[test]
fn test_case_insensitive_marker() {
    let conn = setup();
    assert_eq!(ids(&conn, "name=BOB/i", "id"), vec![2, 3]);
    assert!(ids(&conn, "name=BOB", "id").is_empty());
}

#[test]
fn test_absent_text() {
    let conn = setup();
    assert_eq!(ids(&conn, "tag=", "id"), vec![2, 3, 5]);
    assert_eq!(ids(&conn, "tag!=", "id"), vec![1, 4, 12]);
}

#[test]
fn test_escaped_and_quoted_values() {
    let conn = setup();
    assert_eq!(ids(&conn, "name=\\(LI\\,AM\\)", "id"), vec![4]);
    assert_eq!(ids(&conn, "name=O'Neil", "id"), vec![12]);
}

#[test]
fn test_textual_operators() {
    let conn = setup();
    assert_eq!(ids(&conn, "id^1", "id"), vec![1, 12]);
    assert_eq!(ids(&conn, "name=*o", "id"), vec![1, 2, 3]);
    assert_eq!(ids(&conn, "name!*o", "id"), vec![4, 5, 12]);
    assert_eq!(ids(&conn, "name$b", "id"), vec![2, 3]);
}

#[test]
fn test_broken_guid_and_coercion_failures() {
    let conn = setup();
    assert!(ids(&conn, "guid=e2cec5dd-208d-4bb5-a852-", "id").is_empty());
    assert_eq!(ids(&conn, "guid=e2cec5dd-208d-4bb5-a852-50008f8ba366", "id"), vec![1]);
    assert_eq!(ids(&conn, "id=abc|id=2", "id"), vec![2]);
}

#[test]
fn test_dates_and_null_ordering() {
    let conn = setup();
    assert_eq!(ids(&conn, "born>=1990-01-01", "born"), vec![1, 12, 4]);
    assert_eq!(ids(&conn, "born=null", "id"), vec![3, 5]);
    assert_eq!(ids(&conn, "", "born, id"), vec![3, 5, 2, 1, 12, 4]);
    assert_eq!(ids(&conn, "", "born desc, id"), vec![4, 12, 1, 2, 3, 5]);
    assert_eq!(ids(&conn, "", "born!, id"), vec![1, 2, 4, 12, 3, 5]);
}

#[test]
fn test_query_page() {
    let conn = setup();
    let query = GridQuery::new()
        .with_filter("id>1")
        .with_order_by("id")
        .with_page(2, 2);
    let page = query_page(&conn, "people", &query, &mapper(Config::default()), |row| {
        row.get::<_, String>(1)
    })
    .unwrap();
    assert_eq!(page.count, 5);
    assert_eq!(page.data, vec!["(LI,AM)".to_string(), "Sara".to_string()]);
}
