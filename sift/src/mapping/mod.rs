//! Field mapping: public filter/order names to typed accessor paths.
//!
//! A `FieldMapper` is built once and then shared read-only across compile
//! calls. Adding mappings while another thread compiles against the same
//! mapper is the caller's responsibility to serialize.

mod path;

use std::fmt;
use std::sync::Arc;

use serde::Deserialize;

pub use path::{FieldPath, Segment};

use crate::config::Config;
use crate::operator::OperatorRegistry;
use crate::value::{FieldType, Value};
use crate::{Error, Result};

/// User-supplied literal conversion, used instead of the default table.
pub type Convertor = Arc<dyn Fn(&str) -> Value + Send + Sync>;

/// One mapping entry.
#[derive(Clone)]
pub struct FieldMap {
    name: String,
    path: FieldPath,
    field_type: FieldType,
    nullable: bool,
    key_type: FieldType,
    convertor: Option<Convertor>,
}

impl FieldMap {
    /// Create an entry from a textual path (see [`FieldPath`] for syntax).
    pub fn new(name: impl Into<String>, path: &str, field_type: FieldType) -> Result<Self> {
        Ok(Self::from_path(name, path.parse()?, field_type))
    }

    pub fn from_path(name: impl Into<String>, path: FieldPath, field_type: FieldType) -> Self {
        Self {
            name: name.into(),
            path,
            field_type,
            nullable: false,
            key_type: FieldType::Text,
            convertor: None,
        }
    }

    /// Mark the target as optional: empty text then means null, not the default.
    pub fn nullable(mut self) -> Self {
        self.nullable = true;
        self
    }

    /// Type the indexer literal is coerced to for `props[]` style paths.
    pub fn with_key_type(mut self, key_type: FieldType) -> Self {
        self.key_type = key_type;
        self
    }

    pub fn with_convertor<F>(mut self, convertor: F) -> Self
    where
        F: Fn(&str) -> Value + Send + Sync + 'static,
    {
        self.convertor = Some(Arc::new(convertor));
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn path(&self) -> &FieldPath {
        &self.path
    }

    pub fn field_type(&self) -> FieldType {
        self.field_type
    }

    pub fn is_nullable(&self) -> bool {
        self.nullable
    }

    pub fn key_type(&self) -> FieldType {
        self.key_type
    }

    pub fn convertor(&self) -> Option<&Convertor> {
        self.convertor.as_ref()
    }

    pub fn is_nested_collection(&self) -> bool {
        self.path.is_nested_collection()
    }
}

impl fmt::Debug for FieldMap {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FieldMap")
            .field("name", &self.name)
            .field("path", &self.path.to_string())
            .field("field_type", &self.field_type)
            .field("nullable", &self.nullable)
            .field("key_type", &self.key_type)
            .field("convertor", &self.convertor.is_some())
            .finish()
    }
}

/// Resolves field names to mapping entries and carries compile options.
#[derive(Debug, Clone)]
pub struct FieldMapper {
    maps: Vec<FieldMap>,
    config: Config,
    operators: Arc<OperatorRegistry>,
}

impl Default for FieldMapper {
    fn default() -> Self {
        Self::new()
    }
}

impl FieldMapper {
    pub fn new() -> Self {
        Self::with_config(Config::default())
    }

    pub fn with_config(config: Config) -> Self {
        Self {
            maps: Vec::new(),
            config,
            operators: Arc::new(OperatorRegistry::new()),
        }
    }

    /// Share an operator registry with other mappers.
    pub fn with_operators(mut self, operators: Arc<OperatorRegistry>) -> Self {
        self.operators = operators;
        self
    }

    /// Add an entry. An entry with the same name is replaced.
    pub fn add(&mut self, map: FieldMap) -> &mut Self {
        let sensitive = self.config.case_sensitive_mapping;
        self.maps
            .retain(|existing| !names_match(existing.name(), map.name(), sensitive));
        self.maps.push(map);
        self
    }

    /// Add an entry from a textual path.
    pub fn add_map(&mut self, name: &str, path: &str, field_type: FieldType) -> Result<&mut Self> {
        let map = FieldMap::new(name, path, field_type)?;
        Ok(self.add(map))
    }

    /// Builder form of [`add`](Self::add).
    pub fn map(mut self, map: FieldMap) -> Self {
        self.add(map);
        self
    }

    pub fn remove(&mut self, name: &str) -> bool {
        let sensitive = self.config.case_sensitive_mapping;
        let before = self.maps.len();
        self.maps.retain(|m| !names_match(m.name(), name, sensitive));
        self.maps.len() != before
    }

    pub fn get(&self, name: &str) -> Option<&FieldMap> {
        let sensitive = self.config.case_sensitive_mapping;
        self.maps.iter().find(|m| names_match(m.name(), name, sensitive))
    }

    /// Look up a mapping, failing with `Mapping '<name>' not found`.
    pub fn resolve(&self, name: &str) -> Result<&FieldMap> {
        self.get(name)
            .ok_or_else(|| Error::MappingNotFound(name.to_string()))
    }

    pub fn contains(&self, name: &str) -> bool {
        self.get(name).is_some()
    }

    pub fn maps(&self) -> &[FieldMap] {
        &self.maps
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn operators(&self) -> &Arc<OperatorRegistry> {
        &self.operators
    }

    /// Build a mapper from a TOML schema.
    ///
    /// ```toml
    /// [[fields]]
    /// name = "childName"
    /// path = "children[*].name"
    /// type = "text"
    /// ```
    pub fn from_toml_str(contents: &str, config: Config) -> Result<Self> {
        let schema: SchemaFile = toml::from_str(contents)
            .map_err(|e| Error::Config(format!("Failed to parse mapping schema: {}", e)))?;

        let mut mapper = Self::with_config(config);
        for field in schema.fields {
            let mut map = FieldMap::new(field.name, &field.path, field.field_type)?;
            if field.nullable {
                map = map.nullable();
            }
            if let Some(key_type) = field.key_type {
                map = map.with_key_type(key_type);
            }
            mapper.add(map);
        }
        Ok(mapper)
    }
}

fn names_match(a: &str, b: &str, case_sensitive: bool) -> bool {
    if case_sensitive {
        a == b
    } else {
        a.eq_ignore_ascii_case(b)
    }
}

#[derive(Debug, Deserialize)]
struct SchemaFile {
    #[serde(default)]
    fields: Vec<SchemaField>,
}

#[derive(Debug, Deserialize)]
struct SchemaField {
    name: String,
    path: String,
    #[serde(rename = "type")]
    field_type: FieldType,
    #[serde(default)]
    nullable: bool,
    key_type: Option<FieldType>,
}
