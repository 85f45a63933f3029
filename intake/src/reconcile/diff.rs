use std::collections::HashMap;

use serde::Serialize;
use serde_json::{Map, Value};
use tracing::debug;

use crate::constants::TYPE_SELECTOR;
use crate::ids::ReferenceId;
use crate::record::Reference;

/// Reference to create remotely
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ReferenceAdd {
    /// Position of the reference in the edited list
    pub position: usize,
    /// `{type_selector, ...flattened fields}`
    pub payload:  Map<String, Value>,
}

/// Changes for an already persisted reference
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ReferenceUpdate {
    pub identity: ReferenceId,
    /// Changed type selector, if any, plus the full flattened field set
    pub changes:  Map<String, Value>,
}

/// Operations that bring the remote reference store in line with the edited list
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct ReconcilePlan {
    pub to_add:    Vec<ReferenceAdd>,
    pub to_update: Vec<ReferenceUpdate>,
}

impl ReconcilePlan {
    pub const fn is_empty(&self) -> bool {
        self.to_add.is_empty() && self.to_update.is_empty()
    }
}

/// Diff the edited reference list against the snapshot taken at edit start
///
/// Items without identity become adds. Items with identity become updates
/// when their type or flattened fields differ from the snapshot item of the
/// same identity. Items missing from `current` are left alone: deletion is
/// an explicit action, never inferred.
pub fn diff_references(original: &[Reference], current: &[Reference]) -> ReconcilePlan {
    let originals: HashMap<ReferenceId, &Reference> = original
        .iter()
        .filter_map(|reference| reference.identity.map(|identity| (identity, reference)))
        .collect();

    let mut plan = ReconcilePlan::default();
    for (position, reference) in current.iter().enumerate() {
        let Some(identity) = reference.identity else {
            let mut payload = Map::new();
            payload.insert(TYPE_SELECTOR.to_string(), Value::from(reference.effective_type()));
            payload.extend(reference.flatten());
            plan.to_add.push(ReferenceAdd { position, payload });
            continue;
        };

        let flattened = reference.flatten();
        let (type_changed, fields_changed) = match originals.get(&identity) {
            Some(previous) => (
                previous.effective_type() != reference.effective_type(),
                previous.flatten() != flattened,
            ),
            None => {
                debug!("Reference {identity} has no snapshot entry, sending it in full");
                (true, true)
            }
        };
        if !type_changed && !fields_changed {
            continue;
        }

        let mut changes = Map::new();
        if type_changed {
            changes.insert(TYPE_SELECTOR.to_string(), Value::from(reference.effective_type()));
        }
        changes.extend(flattened);
        plan.to_update.push(ReferenceUpdate { identity, changes });
    }

    debug!(
        "Reference diff: {} to add, {} to update",
        plan.to_add.len(),
        plan.to_update.len()
    );
    plan
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used, reason = "test code")]

    use serde_json::json;

    use super::*;

    fn reference(value: Value) -> Reference {
        serde_json::from_value::<Reference>(value).unwrap().normalized()
    }

    #[test]
    fn test_add_update_and_no_inferred_delete() {
        let original = vec![
            reference(json!({"identity": 1, "type_selector": "personal", "extension": {"name": "Ana"}})),
            reference(json!({"identity": 2, "type_selector": "family", "extension": {"name": "Luis"}})),
        ];
        let current = vec![
            reference(json!({"identity": 1, "type_selector": "personal", "extension": {"name": "Ana Maria"}})),
            reference(json!({"type_selector": "commercial", "extension": {"name": "Shop"}})),
        ];

        let plan = diff_references(&original, &current);
        assert_eq!(plan.to_add.len(), 1);
        assert_eq!(plan.to_add[0].position, 1);
        assert_eq!(
            Value::Object(plan.to_add[0].payload.clone()),
            json!({"type_selector": "commercial", "name": "Shop"})
        );
        assert_eq!(plan.to_update.len(), 1);
        assert_eq!(plan.to_update[0].identity, ReferenceId(1));
        assert_eq!(
            Value::Object(plan.to_update[0].changes.clone()),
            json!({"name": "Ana Maria"})
        );
    }

    #[test]
    fn test_identity_zero_is_persisted_not_new() {
        let original = vec![reference(json!({"identity": 0, "extension": {"name": "Ana"}}))];
        let current = vec![reference(json!({"identity": 0, "extension": {"name": "Eva"}}))];

        let plan = diff_references(&original, &current);
        assert!(plan.to_add.is_empty());
        assert_eq!(plan.to_update[0].identity, ReferenceId(0));
    }

    #[test]
    fn test_type_change_sends_type_and_full_fields() {
        let original = vec![reference(json!({
            "identity": 5, "type_selector": "personal",
            "extension": {"name": "Ana", "phone": "1"}
        }))];
        let current = vec![reference(json!({
            "identity": 5, "type_selector": "family",
            "extension": {"name": "Ana", "phone": "1"}
        }))];

        let plan = diff_references(&original, &current);
        assert_eq!(
            Value::Object(plan.to_update[0].changes.clone()),
            json!({"type_selector": "family", "name": "Ana", "phone": "1"})
        );
    }

    #[test]
    fn test_unchanged_and_default_type_produce_nothing() {
        let original = vec![reference(json!({"identity": 3, "extension": {"name": "Ana"}}))];
        let current = vec![reference(json!({
            "identity": 3, "type_selector": "personal", "extension": {"name": "Ana"}
        }))];
        assert!(diff_references(&original, &current).is_empty());
    }

    #[test]
    fn test_new_reference_defaults_type() {
        let plan = diff_references(&[], &[reference(json!({"extension": {"name": "X"}}))]);
        assert_eq!(plan.to_add[0].payload["type_selector"], json!("personal"));
    }
}
