//! Typed values and the default literal coercion table.

use std::cmp::Ordering;
use std::fmt;

use chrono::{DateTime, Local, NaiveDate, NaiveDateTime, TimeZone, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::config::DateTimeKind;

/// Declared type of a mapped field.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FieldType {
    Text,
    Int,
    Float,
    Bool,
    Uuid,
    DateTime,
    Date,
}

impl FieldType {
    pub fn is_text(self) -> bool {
        self == FieldType::Text
    }

    /// Value a non-nullable field holds when the filter gives empty text.
    pub fn default_value(self) -> Value {
        match self {
            FieldType::Text => Value::Text(String::new()),
            FieldType::Int => Value::Int(0),
            FieldType::Float => Value::Float(0.0),
            FieldType::Bool => Value::Bool(false),
            FieldType::Uuid => Value::Uuid(Uuid::nil()),
            FieldType::DateTime => first_day()
                .and_then(|d| d.and_hms_opt(0, 0, 0))
                .map(Value::DateTime)
                .unwrap_or(Value::Null),
            FieldType::Date => first_day().map(Value::Date).unwrap_or(Value::Null),
        }
    }
}

fn first_day() -> Option<NaiveDate> {
    NaiveDate::from_ymd_opt(1, 1, 1)
}

impl fmt::Display for FieldType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            FieldType::Text => "text",
            FieldType::Int => "int",
            FieldType::Float => "float",
            FieldType::Bool => "bool",
            FieldType::Uuid => "uuid",
            FieldType::DateTime => "date_time",
            FieldType::Date => "date",
        };
        f.write_str(name)
    }
}

/// A literal after coercion to a field's declared type.
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    Null,
    Bool(bool),
    Int(i64),
    Float(f64),
    Text(String),
    Uuid(Uuid),
    DateTime(NaiveDateTime),
    Date(NaiveDate),
}

impl Value {
    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::Text(s) => Some(s),
            _ => None,
        }
    }

    /// Textual rendering used by the textual operators on non-string fields.
    pub fn to_text(&self) -> Option<String> {
        match self {
            Value::Null => None,
            Value::Bool(b) => Some(b.to_string()),
            Value::Int(i) => Some(i.to_string()),
            Value::Float(x) => Some(x.to_string()),
            Value::Text(s) => Some(s.clone()),
            Value::Uuid(u) => Some(u.to_string()),
            Value::DateTime(dt) => Some(dt.format("%Y-%m-%dT%H:%M:%S%.f").to_string()),
            Value::Date(d) => Some(d.format("%Y-%m-%d").to_string()),
        }
    }

    /// Compare two values of the same kind. Mixed kinds and nulls do not compare.
    pub fn compare(&self, other: &Value) -> Option<Ordering> {
        match (self, other) {
            (Value::Bool(a), Value::Bool(b)) => Some(a.cmp(b)),
            (Value::Int(a), Value::Int(b)) => Some(a.cmp(b)),
            (Value::Float(a), Value::Float(b)) => a.partial_cmp(b),
            (Value::Int(a), Value::Float(b)) => (*a as f64).partial_cmp(b),
            (Value::Float(a), Value::Int(b)) => a.partial_cmp(&(*b as f64)),
            (Value::Text(a), Value::Text(b)) => Some(a.cmp(b)),
            (Value::Uuid(a), Value::Uuid(b)) => Some(a.cmp(b)),
            (Value::DateTime(a), Value::DateTime(b)) => Some(a.cmp(b)),
            (Value::Date(a), Value::Date(b)) => Some(a.cmp(b)),
            _ => None,
        }
    }

    /// Total order for sorting: nulls first, incomparable values tie.
    pub fn sort_cmp(&self, other: &Value) -> Ordering {
        match (self.is_null(), other.is_null()) {
            (true, true) => Ordering::Equal,
            (true, false) => Ordering::Less,
            (false, true) => Ordering::Greater,
            (false, false) => self.compare(other).unwrap_or(Ordering::Equal),
        }
    }

    /// Lowercase text values; other kinds are returned unchanged.
    pub fn fold_case(self) -> Value {
        match self {
            Value::Text(s) => Value::Text(s.to_lowercase()),
            other => other,
        }
    }

    /// Read a JSON node as a value of the declared type.
    ///
    /// Missing nodes, JSON null, and nodes that do not parse as the declared
    /// type all read as `Null`.
    pub fn from_json(node: Option<&serde_json::Value>, ty: FieldType) -> Value {
        use serde_json::Value as Json;

        let Some(node) = node else {
            return Value::Null;
        };

        match (ty, node) {
            (_, Json::Null) => Value::Null,
            (FieldType::Text, Json::String(s)) => Value::Text(s.clone()),
            (FieldType::Text, Json::Number(n)) => Value::Text(n.to_string()),
            (FieldType::Text, Json::Bool(b)) => Value::Text(b.to_string()),
            (FieldType::Int, Json::Number(n)) => n.as_i64().map(Value::Int).unwrap_or(Value::Null),
            (FieldType::Float, Json::Number(n)) => {
                n.as_f64().map(Value::Float).unwrap_or(Value::Null)
            }
            (FieldType::Bool, Json::Bool(b)) => Value::Bool(*b),
            (ty, Json::String(s)) => coerce(s, ty, None).unwrap_or(Value::Null),
            _ => Value::Null,
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.to_text() {
            Some(text) => f.write_str(&text),
            None => f.write_str("null"),
        }
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Value::Text(s.to_string())
    }
}

impl From<String> for Value {
    fn from(s: String) -> Self {
        Value::Text(s)
    }
}

impl From<i64> for Value {
    fn from(i: i64) -> Self {
        Value::Int(i)
    }
}

impl From<bool> for Value {
    fn from(b: bool) -> Self {
        Value::Bool(b)
    }
}

impl From<Uuid> for Value {
    fn from(u: Uuid) -> Self {
        Value::Uuid(u)
    }
}

/// Why a literal could not be coerced.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum CoercionError {
    #[error("'{text}' is not a valid {ty}")]
    Format { text: String, ty: FieldType },
}

/// Coerce literal text to a field type using the default conversion table.
///
/// A malformed uuid is not an error: it becomes a fresh random uuid that can
/// never equal a stored one.
pub fn coerce(text: &str, ty: FieldType, kind: Option<DateTimeKind>) -> Result<Value, CoercionError> {
    let trimmed = text.trim();
    let format_error = || CoercionError::Format {
        text: text.to_string(),
        ty,
    };

    match ty {
        FieldType::Text => Ok(Value::Text(text.to_string())),
        FieldType::Int => trimmed.parse().map(Value::Int).map_err(|_| format_error()),
        FieldType::Float => trimmed.parse().map(Value::Float).map_err(|_| format_error()),
        FieldType::Bool => match trimmed.to_ascii_lowercase().as_str() {
            "true" | "1" => Ok(Value::Bool(true)),
            "false" | "0" => Ok(Value::Bool(false)),
            _ => Err(format_error()),
        },
        FieldType::Uuid => Ok(Value::Uuid(
            Uuid::parse_str(trimmed).unwrap_or_else(|_| Uuid::now_v7()),
        )),
        FieldType::DateTime => parse_date_time(trimmed, kind)
            .map(Value::DateTime)
            .ok_or_else(format_error),
        FieldType::Date => parse_date(trimmed).map(Value::Date).ok_or_else(format_error),
    }
}

const DATE_TIME_FORMATS: &[&str] = &[
    "%Y-%m-%dT%H:%M:%S%.f",
    "%Y-%m-%d %H:%M:%S%.f",
    "%Y-%m-%dT%H:%M",
    "%Y-%m-%d %H:%M",
];

fn parse_date_time(text: &str, kind: Option<DateTimeKind>) -> Option<NaiveDateTime> {
    if let Ok(dt) = DateTime::parse_from_rfc3339(text) {
        return Some(dt.with_timezone(&Utc).naive_utc());
    }

    let naive = DATE_TIME_FORMATS
        .iter()
        .find_map(|fmt| NaiveDateTime::parse_from_str(text, fmt).ok())
        .or_else(|| parse_date(text).and_then(|d| d.and_hms_opt(0, 0, 0)))?;

    Some(normalize_date_time(naive, kind))
}

fn parse_date(text: &str) -> Option<NaiveDate> {
    NaiveDate::parse_from_str(text, "%Y-%m-%d").ok().or_else(|| {
        DATE_TIME_FORMATS
            .iter()
            .find_map(|fmt| NaiveDateTime::parse_from_str(text, fmt).ok())
            .map(|dt| dt.date())
    })
}

fn normalize_date_time(naive: NaiveDateTime, kind: Option<DateTimeKind>) -> NaiveDateTime {
    match kind {
        Some(DateTimeKind::Utc) => Local
            .from_local_datetime(&naive)
            .earliest()
            .map(|dt| dt.with_timezone(&Utc).naive_utc())
            .unwrap_or(naive),
        Some(DateTimeKind::Local) => Utc.from_utc_datetime(&naive).with_timezone(&Local).naive_local(),
        Some(DateTimeKind::Unspecified) | None => naive,
    }
}
