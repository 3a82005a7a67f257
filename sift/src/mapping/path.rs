//! Accessor paths.
//!
//! # Syntax
//!
//! - `name` - a member of the record
//! - `child.name` - a member of a member
//! - `children[*].name` - `name` of each element of the `children` collection
//! - `props[]` - the entry of the `props` map keyed by the filter's indexer

use std::fmt;
use std::str::FromStr;

use crate::value::Value;
use crate::{Error, Result};

/// One hop of an accessor path.
#[derive(Debug, Clone, PartialEq)]
pub enum Segment {
    /// Named member access.
    Member(String),
    /// Each element of the collection reached so far.
    Each,
    /// Map entry; `None` until the filter's indexer binds a key.
    Key(Option<Value>),
}

/// A typed accessor path from a record (or collection element) to a value.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct FieldPath {
    segments: Vec<Segment>,
}

impl FieldPath {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn member(mut self, name: impl Into<String>) -> Self {
        self.segments.push(Segment::Member(name.into()));
        self
    }

    pub fn each(mut self) -> Self {
        self.segments.push(Segment::Each);
        self
    }

    pub fn key(mut self) -> Self {
        self.segments.push(Segment::Key(None));
        self
    }

    pub fn segments(&self) -> &[Segment] {
        &self.segments
    }

    /// True if the path walks into the elements of a collection.
    pub fn is_nested_collection(&self) -> bool {
        self.segments.iter().any(|s| matches!(s, Segment::Each))
    }

    /// True if the path has a map entry slot, bound or not.
    pub fn has_key_slot(&self) -> bool {
        self.segments.iter().any(|s| matches!(s, Segment::Key(_)))
    }

    /// Bind the indexer key. Returns `None` when the path has no key slot.
    pub fn bind_key(&self, key: Value) -> Option<FieldPath> {
        let pos = self
            .segments
            .iter()
            .position(|s| matches!(s, Segment::Key(_)))?;
        let mut segments = self.segments.clone();
        segments[pos] = Segment::Key(Some(key));
        Some(FieldPath { segments })
    }

    /// Split off the first collection hop.
    ///
    /// Returns the path to the collection and the remainder, relative to one
    /// element of that collection.
    pub fn split_collection(&self) -> Option<(FieldPath, FieldPath)> {
        let pos = self.segments.iter().position(|s| matches!(s, Segment::Each))?;
        let collection = FieldPath {
            segments: self.segments[..pos].to_vec(),
        };
        let element = FieldPath {
            segments: self.segments[pos + 1..].to_vec(),
        };
        Some((collection, element))
    }

    /// Split a bound key path into the map's path and the key.
    pub fn split_key(&self) -> Option<(FieldPath, &Value)> {
        self.segments.iter().enumerate().find_map(|(i, s)| match s {
            Segment::Key(Some(key)) => Some((
                FieldPath {
                    segments: self.segments[..i].to_vec(),
                },
                key,
            )),
            _ => None,
        })
    }

    /// Intermediate hops that may be null before the final one is reached.
    ///
    /// `a.b.c` yields `a` and `a.b`; a single-hop path yields nothing.
    pub fn null_guards(&self) -> Vec<FieldPath> {
        (1..self.segments.len())
            .map(|end| FieldPath {
                segments: self.segments[..end].to_vec(),
            })
            .collect()
    }
}

impl FromStr for FieldPath {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        let invalid = |why: &str| Error::Mapping(format!("Invalid path '{}': {}", s, why));
        let mut path = FieldPath::new();

        for part in s.split('.') {
            let (name, mut rest) = match part.find('[') {
                Some(i) => (&part[..i], &part[i..]),
                None => (part, ""),
            };
            if name.is_empty() || !name.chars().all(|c| c.is_alphanumeric() || c == '_') {
                return Err(invalid("expected a member name"));
            }
            path = path.member(name);

            while !rest.is_empty() {
                if let Some(r) = rest.strip_prefix("[*]") {
                    path = path.each();
                    rest = r;
                } else if let Some(r) = rest.strip_prefix("[]") {
                    if path.has_key_slot() {
                        return Err(invalid("only one indexer slot is allowed"));
                    }
                    path = path.key();
                    rest = r;
                } else {
                    return Err(invalid("expected '[*]' or '[]'"));
                }
            }
        }

        Ok(path)
    }
}

impl fmt::Display for FieldPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, segment) in self.segments.iter().enumerate() {
            match segment {
                Segment::Member(name) if i == 0 => write!(f, "{}", name)?,
                Segment::Member(name) => write!(f, ".{}", name)?,
                Segment::Each => write!(f, "[*]")?,
                Segment::Key(None) => write!(f, "[]")?,
                Segment::Key(Some(key)) => write!(f, "[{}]", key)?,
            }
        }
        Ok(())
    }
}
