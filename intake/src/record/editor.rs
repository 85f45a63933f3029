//! Copy-on-write writes into the aggregate record
//!
//! Every write returns a new snapshot. Only containers along the written
//! path are copied; siblings keep pointing at the previous allocation.

use std::sync::Arc;

use tracing::debug;

use super::node::{NodeMap, RecordNode};
use super::path::{FieldPath, PathSegment};
use super::types::AggregateRecord;
use crate::error::{Error, Result};

/// Write `value` at `path`, returning the new record
///
/// Missing or null intermediates are materialized: a map, or a list padded
/// with empty maps when the following segment is an index. The input record
/// is never mutated.
pub fn set_value(
    record: &AggregateRecord,
    path: &FieldPath,
    value: impl Into<RecordNode>,
) -> Result<AggregateRecord> {
    if path.is_root() {
        return Err(Error::invalid_path(path, "cannot replace the record root").into());
    }
    let root = set_node(Some(record.root()), path, path.segments(), value.into())?;
    AggregateRecord::from_root(root)
}

/// Remove the entry at `path` if present, returning the new record
///
/// Removing from a list shifts later items down.
pub fn remove_value(record: &AggregateRecord, path: &FieldPath) -> Result<AggregateRecord> {
    let Some(parent) = path.parent() else {
        return Err(Error::invalid_path(path, "cannot remove the record root").into());
    };
    let Some(container) = record.get(&parent) else {
        return Ok(record.clone());
    };
    let replacement = match (container, path.segments().last()) {
        (RecordNode::Map(map), Some(PathSegment::Key(key))) if map.contains_key(key) => {
            let mut map = NodeMap::clone(map);
            map.shift_remove(key);
            RecordNode::Map(Arc::new(map))
        }
        (RecordNode::List(list), Some(PathSegment::Index(index))) if *index < list.len() => {
            let mut list = Vec::clone(list);
            list.remove(*index);
            RecordNode::List(Arc::new(list))
        }
        _ => return Ok(record.clone()),
    };
    if parent.is_root() {
        return AggregateRecord::from_root(replacement);
    }
    set_value(record, &parent, replacement)
}

fn set_node(
    node: Option<&RecordNode>,
    full_path: &FieldPath,
    segments: &[PathSegment],
    value: RecordNode,
) -> Result<RecordNode> {
    let Some((segment, rest)) = segments.split_first() else {
        return Ok(value);
    };

    match segment {
        PathSegment::Key(key) => {
            let mut map = match node {
                Some(RecordNode::Map(map)) => NodeMap::clone(map),
                Some(RecordNode::List(_)) => {
                    return Err(Error::invalid_path(
                        full_path,
                        format!("key '{key}' applied to a list"),
                    )
                    .into());
                }
                Some(RecordNode::Scalar(scalar)) => {
                    if !scalar.is_null() {
                        debug!("set_value: replacing scalar with map at '{key}' of {full_path}");
                    }
                    NodeMap::new()
                }
                None => NodeMap::new(),
            };
            let child = set_node(map.get(key), full_path, rest, value)?;
            map.insert(key.clone(), child);
            Ok(RecordNode::Map(Arc::new(map)))
        }
        PathSegment::Index(index) => match node {
            // A keyed container addressed by index keeps its keyed shape
            Some(RecordNode::Map(map)) => {
                let mut map = NodeMap::clone(map);
                let key = index.to_string();
                let child = set_node(map.get(&key), full_path, rest, value)?;
                map.insert(key, child);
                Ok(RecordNode::Map(Arc::new(map)))
            }
            other => {
                let mut list = match other {
                    Some(RecordNode::List(list)) => Vec::clone(list),
                    Some(RecordNode::Scalar(scalar)) => {
                        if !scalar.is_null() {
                            debug!("set_value: replacing scalar with list at {index} of {full_path}");
                        }
                        Vec::new()
                    }
                    _ => Vec::new(),
                };
                if list.len() <= *index {
                    list.resize_with(*index + 1, RecordNode::empty_map);
                }
                let child = set_node(list.get(*index), full_path, rest, value)?;
                list[*index] = child;
                Ok(RecordNode::List(Arc::new(list)))
            }
        },
    }
}
