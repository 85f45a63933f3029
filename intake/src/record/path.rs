//! Dotted field paths into the aggregate record
//!
//! `applications.0.credit_detail.type_selector` parses into
//! `[Key("applications"), Index(0), Key("credit_detail"), Key("type_selector")]`.
//! All-digit segments are list indices.

use std::fmt;
use std::str::FromStr;

use itertools::Itertools;
use serde::{Deserialize, Deserializer, Serialize, Serializer};

use crate::error::Error;

/// One step of a [`FieldPath`]
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum PathSegment {
    Key(String),
    Index(usize),
}

impl fmt::Display for PathSegment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Key(key) => f.write_str(key),
            Self::Index(index) => write!(f, "{index}"),
        }
    }
}

/// Concrete storage location inside an aggregate record
#[derive(Debug, Clone, PartialEq, Eq, Hash, Default)]
pub struct FieldPath {
    segments: Vec<PathSegment>,
}

impl FieldPath {
    /// The record root
    pub const fn root() -> Self {
        Self {
            segments: Vec::new(),
        }
    }

    /// Append a key segment
    #[must_use]
    pub fn key(mut self, key: impl Into<String>) -> Self {
        self.segments.push(PathSegment::Key(key.into()));
        self
    }

    /// Append an index segment
    #[must_use]
    pub fn index(mut self, index: usize) -> Self {
        self.segments.push(PathSegment::Index(index));
        self
    }

    /// Append every segment of `other`
    #[must_use]
    pub fn join(mut self, other: &Self) -> Self {
        self.segments.extend(other.segments.iter().cloned());
        self
    }

    pub fn segments(&self) -> &[PathSegment] {
        &self.segments
    }

    pub const fn is_root(&self) -> bool {
        self.segments.is_empty()
    }

    /// Path without its last segment, `None` at the root
    pub fn parent(&self) -> Option<Self> {
        self.segments.split_last().map(|(_, rest)| Self {
            segments: rest.to_vec(),
        })
    }

    /// Last key segment, if the path ends in a key
    pub fn leaf_key(&self) -> Option<&str> {
        match self.segments.last() {
            Some(PathSegment::Key(key)) => Some(key),
            _ => None,
        }
    }

    pub fn starts_with(&self, prefix: &Self) -> bool {
        self.segments.starts_with(&prefix.segments)
    }
}

impl fmt::Display for FieldPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.segments.iter().join("."))
    }
}

impl FromStr for FieldPath {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if s.is_empty() {
            return Ok(Self::root());
        }
        s.split('.')
            .map(|part| {
                if part.is_empty() {
                    Err(Error::invalid_path(s, "empty segment"))
                } else if part.bytes().all(|b| b.is_ascii_digit()) {
                    part.parse::<usize>()
                        .map(PathSegment::Index)
                        .map_err(|e| Error::invalid_path(s, e))
                } else {
                    Ok(PathSegment::Key(part.to_string()))
                }
            })
            .collect::<Result<Vec<_>, _>>()
            .map(|segments| Self { segments })
    }
}

impl From<Vec<PathSegment>> for FieldPath {
    fn from(segments: Vec<PathSegment>) -> Self {
        Self { segments }
    }
}

impl Serialize for FieldPath {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for FieldPath {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let text = String::deserialize(deserializer)?;
        text.parse().map_err(serde::de::Error::custom)
    }
}
