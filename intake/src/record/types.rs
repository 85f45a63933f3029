use serde::{Deserialize, Deserializer, Serialize};
use serde_json::{Map, Value};
use tracing::warn;

use super::node::RecordNode;
use super::path::{FieldPath, PathSegment};
use crate::constants::{
    DEFAULT_REFERENCE_TYPE, EXTENSION, IDENTITY, LEGACY_IDENTITY_KEYS, REFERENCE_TYPE_FIELD,
    REFERENCES, TYPE_SELECTOR,
};
use crate::error::{Error, Result};
use crate::ids::ReferenceId;

/// Multi-entity record for one application in progress
///
/// The root is always a keyed container. Cloning is cheap: containers are
/// shared until a write touches them.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "Value", into = "Value")]
pub struct AggregateRecord {
    root: RecordNode,
}

impl Default for AggregateRecord {
    fn default() -> Self {
        Self::new()
    }
}

impl AggregateRecord {
    /// Empty record
    pub fn new() -> Self {
        Self {
            root: RecordNode::empty_map(),
        }
    }

    /// Build a record from the JSON returned by the aggregate fetch
    pub fn from_value(value: Value) -> Result<Self> {
        Self::from_root(RecordNode::from(value))
    }

    pub(crate) fn from_root(root: RecordNode) -> Result<Self> {
        match root {
            RecordNode::Map(_) => Ok(Self { root }),
            RecordNode::Scalar(Value::Null) => Ok(Self::new()),
            _ => Err(Error::invalid("aggregate record", "root must be an object").into()),
        }
    }

    pub const fn root(&self) -> &RecordNode {
        &self.root
    }

    pub fn to_value(&self) -> Value {
        self.root.to_value()
    }

    /// Node stored at `path`
    pub fn get(&self, path: &FieldPath) -> Option<&RecordNode> {
        path.segments()
            .iter()
            .try_fold(&self.root, |node, segment| match segment {
                PathSegment::Key(key) => node.get(key),
                PathSegment::Index(index) => node
                    .index(*index)
                    .or_else(|| node.get(&index.to_string())),
            })
    }

    /// JSON value stored at `path`
    pub fn get_value(&self, path: &FieldPath) -> Option<Value> {
        self.get(path).map(RecordNode::to_value)
    }

    pub fn contains(&self, path: &FieldPath) -> bool {
        self.get(path).is_some()
    }

    /// Top-level container by key
    pub fn section(&self, key: &str) -> Option<&RecordNode> {
        self.root.get(key)
    }

    /// References held in the record, normalized
    ///
    /// Items that cannot be read as a reference are skipped with a warning.
    pub fn references(&self) -> Vec<Reference> {
        let Some(items) = self.root.get(REFERENCES).and_then(RecordNode::as_list) else {
            return Vec::new();
        };
        items
            .iter()
            .enumerate()
            .filter_map(|(position, item)| {
                match serde_json::from_value::<Reference>(item.to_value()) {
                    Ok(reference) => Some(reference.normalized()),
                    Err(e) => {
                        warn!("Skipping unreadable reference at position {position}: {e}");
                        None
                    }
                }
            })
            .collect()
    }

    /// Replace the reference list
    pub fn with_references(&self, references: &[Reference]) -> Result<Self> {
        let items = serde_json::to_value(references)
            .map_err(|e| Error::failed_to("serialize references", e))?;
        super::editor::set_value(self, &FieldPath::root().key(REFERENCES), items)
    }
}

impl TryFrom<Value> for AggregateRecord {
    type Error = Error;

    fn try_from(value: Value) -> std::result::Result<Self, Self::Error> {
        Self::from_value(value).map_err(|report| match report.current_context() {
            Error::InvalidArgument(message) => Error::InvalidArgument(message.clone()),
            other => Error::General(other.to_string()),
        })
    }
}

impl From<AggregateRecord> for Value {
    fn from(record: AggregateRecord) -> Self {
        record.to_value()
    }
}

/// Personal or commercial reference attached to the applicant
///
/// `identity` is absent until the remote store assigns one. Zero is a valid
/// assigned identity.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct Reference {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub identity:      Option<ReferenceId>,
    #[serde(
        default,
        deserialize_with = "deserialize_selector",
        skip_serializing_if = "Option::is_none"
    )]
    pub type_selector: Option<String>,
    #[serde(default, deserialize_with = "deserialize_extension")]
    pub extension:     Map<String, Value>,
    /// Fixed top-level fields other than the ones above
    #[serde(flatten)]
    pub fixed:         Map<String, Value>,
}

impl Reference {
    /// Move legacy identity and type keys into their canonical slots
    #[must_use]
    pub fn normalized(mut self) -> Self {
        for key in LEGACY_IDENTITY_KEYS {
            if let Some(raw) = self.fixed.remove(*key)
                && self.identity.is_none()
            {
                self.identity = serde_json::from_value::<Option<ReferenceId>>(raw).ok().flatten();
            }
        }
        if let Some(raw) = self.fixed.remove(REFERENCE_TYPE_FIELD)
            && self.type_selector.is_none()
        {
            self.type_selector = selector_text(raw);
        }
        self.type_selector = self
            .type_selector
            .filter(|selector| !selector.trim().is_empty());
        self
    }

    /// Type selector with the default applied
    pub fn effective_type(&self) -> &str {
        self.type_selector
            .as_deref()
            .unwrap_or(DEFAULT_REFERENCE_TYPE)
    }

    /// Fixed fields and extension merged into one flat map
    ///
    /// Identity and type keys are excluded from both sources. Extension
    /// entries win over fixed fields with the same key.
    pub fn flatten(&self) -> Map<String, Value> {
        let mut flat: Map<String, Value> = self
            .fixed
            .iter()
            .filter(|(key, _)| !is_identity_or_type_key(key))
            .map(|(key, value)| (key.clone(), value.clone()))
            .collect();
        for (key, value) in &self.extension {
            if !is_identity_or_type_key(key) {
                flat.insert(key.clone(), value.clone());
            }
        }
        flat
    }
}

/// Stores send numeric type codes and nulls as often as strings
fn selector_text(raw: Value) -> Option<String> {
    match raw {
        Value::String(text) => Some(text),
        Value::Number(number) => Some(number.to_string()),
        Value::Bool(flag) => Some(flag.to_string()),
        _ => None,
    }
}

fn deserialize_selector<'de, D>(deserializer: D) -> std::result::Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    Value::deserialize(deserializer).map(selector_text)
}

/// A null or non-object extension reads as empty
fn deserialize_extension<'de, D>(
    deserializer: D,
) -> std::result::Result<Map<String, Value>, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(match Value::deserialize(deserializer)? {
        Value::Object(map) => map,
        Value::Null => Map::new(),
        other => {
            warn!("Ignoring non-object reference extension: {other}");
            Map::new()
        }
    })
}

fn is_identity_or_type_key(key: &str) -> bool {
    key == IDENTITY
        || key == TYPE_SELECTOR
        || key == REFERENCE_TYPE_FIELD
        || key == EXTENSION
        || LEGACY_IDENTITY_KEYS.contains(&key)
}
