//! Compiler configuration.
//!
//! Config resolution order for `Config::load()`:
//! 1. File named by the SIFT_CONFIG environment variable
//! 2. Built-in defaults

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::syntax::DEFAULT_MAX_DEPTH;
use crate::{Error, Result};

/// Environment variable naming a TOML config file.
pub const SIFT_CONFIG_VAR: &str = "SIFT_CONFIG";

/// How offset-less date-time literals are normalized before comparison.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DateTimeKind {
    /// Literal is local wall time, compared in UTC.
    Utc,
    /// Literal is UTC, compared as local wall time.
    Local,
    /// Literal is compared as written.
    Unspecified,
}

/// Options recognized by the filter and ordering compilers.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Treat leaves on unmapped fields as always-true instead of failing.
    pub ignore_unmapped_fields: bool,

    /// `field=null` / `field!=null` search for the typed null.
    pub allow_null_search: bool,

    /// Fold case on every string comparison, not only `/i` ones.
    pub case_insensitive_filtering: bool,

    /// Skip the null/has-key guards in front of collection and indexer access.
    pub disable_collection_null_checks: bool,

    /// Guard every intermediate hop of a deep accessor against null.
    pub avoid_null_reference: bool,

    /// Normalization applied to offset-less date-time literals.
    pub default_date_time_kind: Option<DateTimeKind>,

    /// Whether field names must match the mapping's case exactly.
    pub case_sensitive_mapping: bool,

    /// Page size used when a request does not carry one.
    pub default_page_size: usize,

    /// Deepest filter syntax tree accepted. A flat chain of N terms is N
    /// levels deep and each parenthesis adds one.
    pub max_depth: usize,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            ignore_unmapped_fields: false,
            allow_null_search: true,
            case_insensitive_filtering: false,
            disable_collection_null_checks: false,
            avoid_null_reference: false,
            default_date_time_kind: None,
            case_sensitive_mapping: true,
            default_page_size: default_page_size(),
            max_depth: DEFAULT_MAX_DEPTH,
        }
    }
}

fn default_page_size() -> usize {
    20
}

impl Config {
    /// Load config from the file named by SIFT_CONFIG, or use defaults.
    pub fn load() -> Result<Self> {
        match resolve_config_path() {
            Some(path) if path.exists() => Self::load_from(&path),
            _ => Ok(Self::default()),
        }
    }

    /// Load config from a specific TOML file.
    pub fn load_from(path: &Path) -> Result<Self> {
        let contents = std::fs::read_to_string(path)?;
        let config = Self::from_toml_str(&contents)?;
        tracing::debug!(
            target: "sift::config",
            path = %path.display(),
            "loaded compiler configuration"
        );
        Ok(config)
    }

    /// Parse config from TOML text. Missing keys keep their defaults.
    pub fn from_toml_str(contents: &str) -> Result<Self> {
        toml::from_str(contents)
            .map_err(|e| Error::Config(format!("Failed to parse config: {}", e)))
    }

    /// Save config as TOML.
    pub fn save_to(&self, path: &Path) -> Result<()> {
        let contents = toml::to_string_pretty(self)
            .map_err(|e| Error::Config(format!("Failed to serialize config: {}", e)))?;
        std::fs::write(path, contents)?;
        Ok(())
    }

    pub fn with_ignore_unmapped_fields(mut self, enabled: bool) -> Self {
        self.ignore_unmapped_fields = enabled;
        self
    }

    pub fn with_allow_null_search(mut self, enabled: bool) -> Self {
        self.allow_null_search = enabled;
        self
    }

    pub fn with_case_insensitive_filtering(mut self, enabled: bool) -> Self {
        self.case_insensitive_filtering = enabled;
        self
    }

    pub fn with_disable_collection_null_checks(mut self, disabled: bool) -> Self {
        self.disable_collection_null_checks = disabled;
        self
    }

    pub fn with_avoid_null_reference(mut self, enabled: bool) -> Self {
        self.avoid_null_reference = enabled;
        self
    }

    pub fn with_default_date_time_kind(mut self, kind: Option<DateTimeKind>) -> Self {
        self.default_date_time_kind = kind;
        self
    }

    pub fn with_case_sensitive_mapping(mut self, enabled: bool) -> Self {
        self.case_sensitive_mapping = enabled;
        self
    }

    pub fn with_max_depth(mut self, max_depth: usize) -> Self {
        self.max_depth = max_depth;
        self
    }
}

fn resolve_config_path() -> Option<PathBuf> {
    std::env::var(SIFT_CONFIG_VAR).ok().map(PathBuf::from)
}
