//! Writes the credit-type selector and keeps per-type detail containers

use std::sync::Arc;

use serde_json::Value;
use tracing::debug;

use super::table::CreditTypeTable;
use crate::constants::{
    APPLICATIONS, CREDIT_DETAIL, CREDIT_TYPE_FIELD, TYPE_CONTAINERS, TYPE_SELECTOR,
};
use crate::error::Result;
use crate::record::{AggregateRecord, FieldPath, RecordNode, set_value};

/// Canonical location of the credit-type selector
pub fn type_selector_path() -> FieldPath {
    credit_detail_path().key(TYPE_SELECTOR)
}

/// Map holding every per-type container of the first application
pub fn type_containers_path() -> FieldPath {
    credit_detail_path().key(TYPE_CONTAINERS)
}

/// Location of one per-type container on the first application
pub fn type_container_path(container: &str) -> FieldPath {
    type_containers_path().key(container)
}

fn credit_detail_path() -> FieldPath {
    FieldPath::root().key(APPLICATIONS).index(0).key(CREDIT_DETAIL)
}

fn legacy_type_path() -> FieldPath {
    FieldPath::root().key(APPLICATIONS).index(0).key(CREDIT_TYPE_FIELD)
}

/// Routes credit-type changes into the application's detail block
#[derive(Debug, Clone, Default)]
pub struct CreditRouter {
    table:         Arc<CreditTypeTable>,
    mirror_legacy: bool,
}

impl CreditRouter {
    /// Router over `table`; `mirror_legacy` also writes the old application-level field
    pub const fn new(table: Arc<CreditTypeTable>, mirror_legacy: bool) -> Self {
        Self {
            table,
            mirror_legacy,
        }
    }

    pub fn table(&self) -> &CreditTypeTable {
        &self.table
    }

    /// Select `new_type` on the first application
    ///
    /// Writes the selector, creates the matching container when absent and
    /// leaves every other container as it was, so switching back to an
    /// earlier type finds its values again.
    pub fn route(&self, record: &AggregateRecord, new_type: &str) -> Result<AggregateRecord> {
        let mut updated = set_value(record, &type_selector_path(), Value::from(new_type))?;
        if self.mirror_legacy {
            updated = set_value(&updated, &legacy_type_path(), Value::from(new_type))?;
        }
        if new_type.trim().is_empty() {
            return Ok(updated);
        }

        let container = self.table.container_for(new_type);
        let path = type_container_path(&container);
        if updated.get(&path).is_some_and(|node| node.as_map().is_some()) {
            debug!("Credit type '{new_type}' reuses container '{container}'");
        } else {
            debug!("Credit type '{new_type}' creates container '{container}'");
            updated = set_value(&updated, &path, RecordNode::empty_map())?;
        }
        Ok(updated)
    }

    /// Container key of the currently selected credit type
    pub fn active_container(&self, record: &AggregateRecord) -> Option<String> {
        active_type(record)
            .filter(|selector| !selector.trim().is_empty())
            .map(|selector| self.table.container_for(&selector))
    }
}

/// Currently selected credit type
///
/// Reads the canonical selector and falls back to the legacy application field.
pub fn active_type(record: &AggregateRecord) -> Option<String> {
    record
        .get(&type_selector_path())
        .and_then(RecordNode::as_str)
        .filter(|selector| !selector.is_empty())
        .or_else(|| record.get(&legacy_type_path()).and_then(RecordNode::as_str))
        .map(str::to_string)
}

/// Route `new_type` with the built-in table and no legacy mirror
pub fn route_type_selector(record: &AggregateRecord, new_type: &str) -> Result<AggregateRecord> {
    CreditRouter::default().route(record, new_type)
}
