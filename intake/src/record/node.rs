//! Persistent tree node backing the aggregate record
//!
//! Containers are reference counted so a copy-on-write edit only clones the
//! containers along the touched path. Untouched subtrees stay shared between
//! the old and the new snapshot.

use std::sync::Arc;

use indexmap::IndexMap;
use serde::ser::{SerializeMap, SerializeSeq};
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use serde_json::Value;

/// Key/child map of a container node, in the order the store sent the keys
pub type NodeMap = IndexMap<String, RecordNode>;

/// One node of the aggregate record tree
#[derive(Debug, Clone, PartialEq)]
pub enum RecordNode {
    /// Leaf value. Never holds a JSON object or array.
    Scalar(Value),
    /// Keyed container
    Map(Arc<NodeMap>),
    /// Indexed container
    List(Arc<Vec<RecordNode>>),
}

impl Default for RecordNode {
    fn default() -> Self {
        Self::Scalar(Value::Null)
    }
}

impl RecordNode {
    /// Empty keyed container
    pub fn empty_map() -> Self {
        Self::Map(Arc::new(NodeMap::new()))
    }

    /// Empty indexed container
    pub fn empty_list() -> Self {
        Self::List(Arc::new(Vec::new()))
    }

    pub fn as_map(&self) -> Option<&NodeMap> {
        match self {
            Self::Map(map) => Some(map),
            _ => None,
        }
    }

    pub fn as_list(&self) -> Option<&[Self]> {
        match self {
            Self::List(list) => Some(list),
            _ => None,
        }
    }

    pub const fn as_scalar(&self) -> Option<&Value> {
        match self {
            Self::Scalar(value) => Some(value),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        self.as_scalar().and_then(Value::as_str)
    }

    pub const fn is_null(&self) -> bool {
        matches!(self, Self::Scalar(Value::Null))
    }

    /// Child of a keyed container
    pub fn get(&self, key: &str) -> Option<&Self> {
        self.as_map().and_then(|map| map.get(key))
    }

    /// Child of an indexed container
    pub fn index(&self, index: usize) -> Option<&Self> {
        self.as_list().and_then(|list| list.get(index))
    }

    pub fn contains_key(&self, key: &str) -> bool {
        self.as_map().is_some_and(|map| map.contains_key(key))
    }

    /// Whether the node carries no user data: null, a blank string or an empty container
    pub fn is_empty_value(&self) -> bool {
        match self {
            Self::Scalar(Value::Null) => true,
            Self::Scalar(Value::String(text)) => text.trim().is_empty(),
            Self::Scalar(_) => false,
            Self::Map(map) => map.is_empty(),
            Self::List(list) => list.is_empty(),
        }
    }

    /// Whether two container nodes share the same allocation
    pub fn ptr_eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Self::Map(a), Self::Map(b)) => Arc::ptr_eq(a, b),
            (Self::List(a), Self::List(b)) => Arc::ptr_eq(a, b),
            _ => false,
        }
    }

    /// Convert back into a plain JSON value
    pub fn to_value(&self) -> Value {
        match self {
            Self::Scalar(value) => value.clone(),
            Self::Map(map) => Value::Object(
                map.iter()
                    .map(|(key, child)| (key.clone(), child.to_value()))
                    .collect(),
            ),
            Self::List(list) => Value::Array(list.iter().map(Self::to_value).collect()),
        }
    }
}

impl From<Value> for RecordNode {
    fn from(value: Value) -> Self {
        match value {
            Value::Object(map) => Self::Map(Arc::new(
                map.into_iter()
                    .map(|(key, child)| (key, Self::from(child)))
                    .collect(),
            )),
            Value::Array(items) => Self::List(Arc::new(items.into_iter().map(Self::from).collect())),
            scalar => Self::Scalar(scalar),
        }
    }
}

impl From<&RecordNode> for Value {
    fn from(node: &RecordNode) -> Self {
        node.to_value()
    }
}

impl Serialize for RecordNode {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        match self {
            Self::Scalar(value) => value.serialize(serializer),
            Self::Map(map) => {
                let mut out = serializer.serialize_map(Some(map.len()))?;
                for (key, child) in map.iter() {
                    out.serialize_entry(key, child)?;
                }
                out.end()
            }
            Self::List(list) => {
                let mut out = serializer.serialize_seq(Some(list.len()))?;
                for child in list.iter() {
                    out.serialize_element(child)?;
                }
                out.end()
            }
        }
    }
}

impl<'de> Deserialize<'de> for RecordNode {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        Value::deserialize(deserializer).map(Self::from)
    }
}
