//! Tests for the in-memory backend against a small sample dataset.

use std::collections::HashMap;
use std::sync::Arc;

use chrono::{Local, NaiveDate, NaiveDateTime, TimeZone, Utc};
use proptest::prelude::*;
use serde::Serialize;
use uuid::Uuid;

use super::*;
use crate::config::{Config, DateTimeKind};
use crate::mapping::FieldMap;
use crate::operator::CustomOperator;
use crate::{compile_filter, escape_value, Error};

#[derive(Debug, Clone, Serialize, PartialEq)]
struct Child {
    name: String,
}

#[derive(Debug, Clone, Serialize, PartialEq)]
struct Person {
    id: i64,
    name: Option<String>,
    tag: Option<String>,
    is_active: bool,
    my_guid: Uuid,
    my_date_time: Option<NaiveDateTime>,
    child: Option<Box<Person>>,
    children: Vec<Child>,
    props: HashMap<String, String>,
}

fn at(y: i32, m: u32, d: u32) -> NaiveDateTime {
    NaiveDate::from_ymd_opt(y, m, d).unwrap().and_hms_opt(0, 0, 0).unwrap()
}

fn person(id: i64, name: &str) -> Person {
    Person {
        id,
        name: Some(name.to_string()),
        tag: None,
        is_active: false,
        my_guid: Uuid::nil(),
        my_date_time: None,
        child: None,
        children: Vec::new(),
        props: HashMap::new(),
    }
}

fn dataset() -> Vec<Person> {
    let mut people = vec![
        person(1, "John"),
        person(2, "Bob"),
        person(3, "Jack"),
        person(4, "Sara"),
        person(5, "bob"),
        person(6, "(LI,AM)"),
        person(7, "John"),
        person(8, "jessi=ca"),
        person(9, "\\Liam"),
        person(10, "LI | AM"),
    ];

    people[0].tag = Some("vip".into());
    people[1].tag = Some(String::new());
    people[3].tag = Some("regular".into());

    people[0].is_active = true;
    people[4].is_active = true;

    people[2].my_guid = Uuid::parse_str("e2cec5dd-208d-4bb5-a852-50008f8ba366").unwrap();

    people[0].my_date_time = Some(at(2024, 1, 1));
    people[1].my_date_time = Some(at(2023, 6, 1));
    people[6].my_date_time = Some(at(2025, 3, 1));

    people[0].children = vec![Child { name: "Jane".into() }, Child { name: "Sam".into() }];
    people[1].children = vec![Child { name: "Jo".into() }];
    people[3].children = vec![Child { name: "Sue".into() }];
    people[7].children = vec![Child { name: "Jim".into() }];

    people[0].child = Some(Box::new(person(100, "Junior")));
    people[2].child = Some(Box::new(Person {
        name: None,
        ..person(101, "")
    }));

    people[0].props.insert("color".into(), "red".into());
    people[1].props.insert("color".into(), "blue".into());
    people[4].props.insert("size".into(), "large".into());

    people
}

fn mapper(config: Config) -> FieldMapper {
    FieldMapper::with_config(config)
        .map(FieldMap::new("id", "id", FieldType::Int).unwrap())
        .map(FieldMap::new("name", "name", FieldType::Text).unwrap())
        .map(FieldMap::new("tag", "tag", FieldType::Text).unwrap())
        .map(FieldMap::new("isActive", "is_active", FieldType::Bool).unwrap())
        .map(FieldMap::new("myGuid", "my_guid", FieldType::Uuid).unwrap())
        .map(FieldMap::new("MyDateTime", "my_date_time", FieldType::DateTime).unwrap().nullable())
        .map(FieldMap::new("childName", "child.name", FieldType::Text).unwrap())
        .map(FieldMap::new("childrenName", "children[*].name", FieldType::Text).unwrap())
        .map(FieldMap::new("props", "props[]", FieldType::Text).unwrap())
}

fn ids_with(text: &str, mapper: &FieldMapper) -> Result<Vec<i64>> {
    let people = dataset();
    let predicate = compile_filter(text, mapper, &MemoryBuilder)?;
    Ok(filter(&people, &predicate)?.into_iter().map(|p| p.id).collect())
}

fn ids(text: &str) -> Vec<i64> {
    ids_with(text, &mapper(Config::default())).unwrap()
}

fn ids_where(keep: impl Fn(&Person) -> bool) -> Vec<i64> {
    dataset().iter().filter(|p| keep(p)).map(|p| p.id).collect()
}

#[test]
fn test_matches_direct_condition() {
    assert_eq!(
        ids("name=John,id>=7"),
        ids_where(|p| p.name.as_deref() == Some("John") && p.id >= 7)
    );
    assert_eq!(
        ids("name=John|id<3"),
        ids_where(|p| p.name.as_deref() == Some("John") || p.id < 3)
    );
    assert_eq!(ids("id!=1,id<=3"), vec![2, 3]);
}

#[test]
fn test_escaped_values() {
    assert_eq!(ids(" name =\\(LI\\,AM\\)"), vec![6]);
    assert_eq!(ids("name=jessi=ca"), vec![8]);
    assert_eq!(ids("name =\\\\Liam"), vec![9]);
    assert_eq!(ids("name =LI \\| AM"), vec![10]);
}

#[test]
fn test_unescaped_special_characters_fail() {
    let err = ids_with("name=(LI,AM)", &mapper(Config::default())).unwrap_err();
    assert!(matches!(err, Error::Lex { .. }));
}

#[test]
fn test_redundant_parentheses_do_not_change_results() {
    assert_eq!(ids("(id>2),(name=*a)"), ids("id>2,name=*a"));
    assert_eq!(ids("((id>2)|(name^J))"), ids("id>2|name^J"));
    assert_eq!(ids("(name=John,id>=7)"), ids("name=John,id>=7"));
}

#[test]
fn test_case_insensitive_marker() {
    assert_eq!(ids("name=BOB/i"), vec![2, 5]);
    assert!(ids("name=BOB").is_empty());
    assert_eq!(ids("name/i=BOB"), vec![2, 5]);

    let mapper = mapper(Config::default().with_case_insensitive_filtering(true));
    assert_eq!(ids_with("name=BOB", &mapper).unwrap(), vec![2, 5]);
}

#[test]
fn test_empty_literal_means_absent() {
    let absent = ids_where(|p| p.tag.as_deref().map_or(true, str::is_empty));
    let present = ids_where(|p| p.tag.as_deref().is_some_and(|t| !t.is_empty()));
    assert_eq!(ids("tag="), absent);
    assert_eq!(ids("tag!="), present);
    assert_eq!(present, vec![1, 4]);
}

#[test]
fn test_null_keyword() {
    assert_eq!(ids("tag=null"), ids_where(|p| p.tag.is_none()));
    assert_eq!(ids("MyDateTime=null"), ids_where(|p| p.my_date_time.is_none()));
    assert_eq!(ids("MyDateTime!=null"), vec![1, 2, 7]);
}

#[test]
fn test_unmapped_field_policy() {
    let strict = FieldMapper::new().map(FieldMap::new("id", "id", FieldType::Int).unwrap());
    let err = ids_with("name=John,id>0", &strict).unwrap_err();
    assert_eq!(err.to_string(), "Mapping 'name' not found");

    let lenient = FieldMapper::with_config(Config::default().with_ignore_unmapped_fields(true))
        .map(FieldMap::new("id", "id", FieldType::Int).unwrap());
    assert_eq!(
        ids_with("name=John,id>0", &lenient).unwrap(),
        ids_with("id>0", &lenient).unwrap()
    );
}

#[test]
fn test_nested_collection_merge() {
    // One child must contain J or S, and the person's own id is below 5.
    let expected = ids_where(|p| {
        p.children.iter().any(|c| c.name.contains('J') || c.name.contains('S')) && p.id < 5
    });
    assert_eq!(ids("(childrenName=*J|childrenName=*S),(id<5)"), expected);
    assert_eq!(expected, vec![1, 2, 4]);
}

#[test]
fn test_nested_merge_requires_single_element() {
    // Person 1 has Jane and Sam: no single child contains both J and S.
    assert!(ids("(childrenName=*J,childrenName=*S)").is_empty());
    // Without parentheses each condition may be met by a different child.
    assert_eq!(ids("childrenName=*J,childrenName=*S"), vec![1]);
}

#[test]
fn test_broken_guid_literal() {
    assert!(ids("myGuid=e2cec5dd-208d-4bb5-a852-").is_empty());
    assert_eq!(
        ids("myGuid!=e2cec5dd-208d-4bb5-a852-"),
        ids_where(|_| true)
    );
    assert_eq!(ids("myGuid=e2cec5dd-208d-4bb5-a852-50008f8ba366"), vec![3]);
    assert_eq!(ids("myGuid="), ids_where(|p| p.my_guid.is_nil()));
}

#[test]
fn test_bool_digits() {
    assert_eq!(ids("isActive=1"), vec![1, 5]);
    assert_eq!(ids("isActive=false"), ids_where(|p| !p.is_active));
}

#[test]
fn test_coercion_failure_only_affects_its_leaf() {
    assert!(ids("id=abc").is_empty());
    assert_eq!(ids("id=abc|id=2"), vec![2]);
}

#[test]
fn test_textual_operator_on_number() {
    assert_eq!(ids("id^1"), vec![1, 10]);
    assert_eq!(ids("id$0"), vec![10]);
}

#[test]
fn test_date_comparisons() {
    assert_eq!(ids("MyDateTime>=2024-01-01"), vec![1, 7]);
    assert_eq!(ids("MyDateTime<2024-01-01T00:00:00"), vec![2]);
    assert!(ids("MyDateTime>tomorrow").is_empty());
}

#[test]
fn test_configured_date_time_kind_normalizes_literal() {
    let naive = NaiveDate::from_ymd_opt(2024, 1, 1)
        .unwrap()
        .and_hms_opt(10, 30, 0)
        .unwrap();
    let as_utc = Local.from_local_datetime(&naive).earliest().unwrap().naive_utc();
    let as_local = Utc.from_utc_datetime(&naive).with_timezone(&Local).naive_local();

    for (kind, expected) in [
        (DateTimeKind::Utc, as_utc),
        (DateTimeKind::Local, as_local),
        (DateTimeKind::Unspecified, naive),
    ] {
        let mapper = mapper(Config::default().with_default_date_time_kind(Some(kind)));
        let predicate = compile_filter("MyDateTime=2024-01-01T10:30:00", &mapper, &MemoryBuilder).unwrap();
        let Predicate::Compare(comparison) = predicate else {
            panic!("expected a comparison, got {:?}", predicate);
        };
        assert_eq!(comparison.value, Value::DateTime(expected), "{:?}", kind);
    }
}

#[test]
fn test_long_chains_and_deep_nesting_fail_cleanly() {
    let chain = (0..10_000).map(|i| format!("id={}", i)).collect::<Vec<_>>().join("|");
    assert!(matches!(
        ids_with(&chain, &mapper(Config::default())),
        Err(Error::Syntax { .. })
    ));

    let nested = format!("{}id=1{}", "(".repeat(10_000), ")".repeat(10_000));
    assert!(matches!(
        ids_with(&nested, &mapper(Config::default())),
        Err(Error::Syntax { .. })
    ));

    let chain = (1..=200).map(|i| format!("id={}", i)).collect::<Vec<_>>().join("|");
    assert_eq!(ids(&chain), (1..=10).collect::<Vec<_>>());

    let chain = (1..=300).map(|i| format!("id={}", i)).collect::<Vec<_>>().join(",");
    assert!(ids_with(&chain, &mapper(Config::default())).is_err());
    let raised = mapper(Config::default().with_max_depth(400));
    assert_eq!(ids_with(&chain, &raised).unwrap(), Vec::<i64>::new());

    let lowered = mapper(Config::default().with_max_depth(8));
    let nested = format!("{}id=1{}", "(".repeat(8), ")".repeat(8));
    assert!(matches!(ids_with(&nested, &lowered), Err(Error::Syntax { .. })));
    let nested = format!("{}id=1{}", "(".repeat(7), ")".repeat(7));
    assert_eq!(ids_with(&nested, &lowered).unwrap(), vec![1]);
}

#[test]
fn test_indexer() {
    assert_eq!(ids("props[color]=red"), vec![1]);
    assert_eq!(ids("props[color]!=red"), vec![2]);
    assert!(ids("props[missing]=x").is_empty());
}

#[test]
fn test_deep_chain_with_null_propagation() {
    let mapper = mapper(Config::default().with_avoid_null_reference(true));
    // Broken chains (no child, or a child without a name) count as absent.
    assert_eq!(
        ids_with("childName=", &mapper).unwrap(),
        ids_where(|p| p.child.as_ref().and_then(|c| c.name.as_deref()).is_none())
    );
    assert_eq!(ids_with("childName=Junior", &mapper).unwrap(), vec![1]);
    assert_eq!(
        ids_with("childName!=Junior", &mapper).unwrap(),
        ids_where(|p| p.id != 1)
    );
}

struct UpperEquals;

impl CustomOperator for UpperEquals {
    fn symbol(&self) -> &str {
        "#="
    }

    fn matches(&self, field: &Value, value: &Value) -> bool {
        match (field.as_str(), value.as_str()) {
            (Some(field), Some(value)) => field.to_uppercase() == value.to_uppercase(),
            _ => false,
        }
    }
}

#[test]
fn test_custom_operator() {
    let mapper = mapper(Config::default());
    mapper.operators().register(Arc::new(UpperEquals)).unwrap();
    assert_eq!(ids_with("name#=JOHN", &mapper).unwrap(), vec![1, 7]);

    mapper.operators().remove("#=");
    assert!(matches!(
        ids_with("name#=JOHN", &mapper),
        Err(Error::Lex { .. })
    ));
}

#[test]
fn test_sort_directions() {
    let people = dataset();
    let mapper = mapper(Config::default());
    let mut all: Vec<&Person> = people.iter().collect();

    sort(&mut all, &compile_order("MyDateTime desc, id", &mapper).unwrap()).unwrap();
    let order: Vec<i64> = all.iter().map(|p| p.id).collect();
    assert_eq!(order, vec![7, 1, 2, 3, 4, 5, 6, 8, 9, 10]);

    sort(&mut all, &compile_order("MyDateTime, id desc", &mapper).unwrap()).unwrap();
    let order: Vec<i64> = all.iter().map(|p| p.id).collect();
    assert_eq!(order, vec![10, 9, 8, 6, 5, 4, 3, 2, 1, 7]);
}

#[test]
fn test_sort_by_has_value() {
    let people = dataset();
    let mapper = mapper(Config::default());
    let mut all: Vec<&Person> = people.iter().collect();

    sort(&mut all, &compile_order("MyDateTime?, id", &mapper).unwrap()).unwrap();
    let order: Vec<i64> = all.iter().map(|p| p.id).collect();
    assert_eq!(order, vec![3, 4, 5, 6, 8, 9, 10, 1, 2, 7]);

    sort(&mut all, &compile_order("MyDateTime!, id", &mapper).unwrap()).unwrap();
    let order: Vec<i64> = all.iter().map(|p| p.id).collect();
    assert_eq!(order, vec![1, 2, 7, 3, 4, 5, 6, 8, 9, 10]);
}

#[test]
fn test_apply_grid_query() {
    let people = dataset();
    let mapper = mapper(Config::default());

    let query = GridQuery::new()
        .with_filter("id>2")
        .with_order_by("id desc")
        .with_page(2, 3);
    let page = apply_grid_query(&people, &query, &mapper).unwrap();
    assert_eq!(page.count, 8);
    let ids: Vec<i64> = page.data.iter().map(|p| p.id).collect();
    assert_eq!(ids, vec![7, 6, 5]);

    let page = apply_grid_query(&people, &GridQuery::new().with_page(0, 0), &mapper).unwrap();
    assert_eq!(page.count, 10);
    assert_eq!(page.data.len(), 10);
}

proptest! {
    #[test]
    fn prop_escaped_filter_selects_exact_value(
        value in "[a-zA-Z0-9,|()=!<>^$*/\\\\]([a-zA-Z0-9 ,|()=!<>^$*/\\\\]{0,12}[a-zA-Z0-9,|()=!<>^$*/\\\\])?"
    ) {
        // `null` is the null-search keyword, not a literal.
        prop_assume!(value != "null");
        let mut people = dataset();
        people.push(person(99, &value));
        let mapper = mapper(Config::default());

        let text = format!("name={}", escape_value(&value));
        let predicate = compile_filter(&text, &mapper, &MemoryBuilder).unwrap();
        let matched: Vec<i64> = filter(&people, &predicate).unwrap().into_iter().map(|p| p.id).collect();
        let expected: Vec<i64> = people
            .iter()
            .filter(|p| p.name.as_deref() == Some(value.as_str()))
            .map(|p| p.id)
            .collect();
        prop_assert_eq!(matched, expected);
    }
}
