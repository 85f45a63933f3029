//! Conditional field visibility and cleanup of hidden dependents
//!
//! A dynamic field with `conditional_on = {field, value}` is visible only
//! while `field` holds `value`. When the trigger changes, dependents that
//! become hidden are reset to the empty value of their type before the
//! trigger itself is written. Dependents that stay visible keep their data.

use serde_json::Value;
use tracing::debug;

use crate::constants::CREDIT_TYPE_FIELD;
use crate::credit::active_type;
use crate::error::Result;
use crate::record::{AggregateRecord, RecordNode, set_value};
use crate::resolve::FieldPathResolver;
use crate::schema::{FieldDefinition, SchemaDescriptor, SchemaSet};

/// Evaluates conditions against a record using one resolver and schema set
pub struct ConditionalEvaluator<'a> {
    resolver: &'a FieldPathResolver,
    schemas:  &'a SchemaSet,
}

impl<'a> ConditionalEvaluator<'a> {
    pub const fn new(resolver: &'a FieldPathResolver, schemas: &'a SchemaSet) -> Self {
        Self { resolver, schemas }
    }

    /// Keys of `trigger_field` dependents that `new_value` hides and that currently hold data
    pub fn compute_cleared(
        &self,
        schema: &SchemaDescriptor,
        trigger_field: &str,
        new_value: &Value,
        record: &AggregateRecord,
    ) -> Vec<String> {
        schema
            .dependents_of(trigger_field)
            .filter(|field| {
                field
                    .conditional_on
                    .as_ref()
                    .is_some_and(|condition| !condition.matches(new_value))
            })
            .filter(|field| {
                let resolved = self.resolver.resolve(record, &field.key, self.schemas);
                record
                    .get(&resolved.path)
                    .is_some_and(|node| !node.is_empty_value())
            })
            .map(|field| field.key.clone())
            .collect()
    }

    /// Reset every dependent hidden by `new_value`, returning the new record and the cleared keys
    ///
    /// Must run before `new_value` is committed to the trigger field.
    pub fn apply_cleanup(
        &self,
        schema: &SchemaDescriptor,
        trigger_field: &str,
        new_value: &Value,
        record: &AggregateRecord,
    ) -> Result<(AggregateRecord, Vec<String>)> {
        let cleared = self.compute_cleared(schema, trigger_field, new_value, record);
        let updated = self.clear_fields(schema, &cleared, record)?;
        Ok((updated, cleared))
    }

    /// Reset each of `keys` to the empty value of its declared type
    ///
    /// Keys `schema` does not declare are ignored.
    pub fn clear_fields(
        &self,
        schema: &SchemaDescriptor,
        keys: &[String],
        record: &AggregateRecord,
    ) -> Result<AggregateRecord> {
        let mut updated = record.clone();
        for key in keys {
            let Some((_, field)) = schema.field(key) else {
                continue;
            };
            let resolved = self.resolver.resolve(&updated, key, self.schemas);
            debug!("Clearing '{key}' at {}", resolved.path);
            updated = set_value(&updated, &resolved.path, field.data_type.empty_value())?;
        }
        Ok(updated)
    }

    /// Whether `field` is currently shown
    pub fn is_visible(&self, field: &FieldDefinition, record: &AggregateRecord) -> bool {
        let Some(condition) = &field.conditional_on else {
            return true;
        };
        condition.matches(&self.trigger_value(&condition.field, record))
    }

    /// Current value of a trigger field
    ///
    /// The credit type is read from its canonical selector location.
    pub fn trigger_value(&self, trigger_field: &str, record: &AggregateRecord) -> Value {
        if trigger_field == CREDIT_TYPE_FIELD {
            return active_type(record).map_or(Value::Null, Value::String);
        }
        let resolved = self.resolver.resolve(record, trigger_field, self.schemas);
        record
            .get(&resolved.path)
            .map_or(Value::Null, RecordNode::to_value)
    }
}

/// [`ConditionalEvaluator::compute_cleared`] with the built-in resolver
pub fn compute_cleared(
    schema: &SchemaDescriptor,
    trigger_field: &str,
    new_value: &Value,
    record: &AggregateRecord,
) -> Vec<String> {
    let resolver = FieldPathResolver::default();
    let schemas = SchemaSet::from(schema.clone());
    ConditionalEvaluator::new(&resolver, &schemas).compute_cleared(
        schema,
        trigger_field,
        new_value,
        record,
    )
}

/// [`ConditionalEvaluator::apply_cleanup`] with the built-in resolver
pub fn apply_conditional_cleanup(
    schema: &SchemaDescriptor,
    trigger_field: &str,
    new_value: &Value,
    record: &AggregateRecord,
) -> Result<AggregateRecord> {
    let resolver = FieldPathResolver::default();
    let schemas = SchemaSet::from(schema.clone());
    ConditionalEvaluator::new(&resolver, &schemas)
        .apply_cleanup(schema, trigger_field, new_value, record)
        .map(|(updated, _)| updated)
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used, reason = "test code")]

    use serde_json::json;

    use super::*;
    use crate::record::FieldPath;

    fn schema() -> SchemaDescriptor {
        serde_json::from_value(json!({
            "entity_name": "economic_activity",
            "fixed_fields": [{"key": "activity_type"}],
            "dynamic_fields": [
                {"key": "employer", "conditional_on": {"field": "activity_type", "value": "A"}},
                {"key": "business_name", "conditional_on": {"field": "activity_type", "value": "B"}},
                {"key": "employee_count", "data_type": "number",
                 "conditional_on": {"field": "activity_type", "value": "A"}},
                {"key": "notes"}
            ]
        }))
        .unwrap()
    }

    fn record() -> AggregateRecord {
        AggregateRecord::from_value(json!({
            "economic_activity": {
                "activity_type": "A",
                "detail_extension": {
                    "employer": "ACME",
                    "business_name": "Shop",
                    "employee_count": 12,
                    "notes": "keep"
                }
            }
        }))
        .unwrap()
    }

    fn value(record: &AggregateRecord, path: &str) -> Option<Value> {
        record.get_value(&path.parse::<FieldPath>().unwrap())
    }

    #[test]
    fn test_switching_trigger_clears_only_non_matching_dependents() {
        let cleared = compute_cleared(&schema(), "activity_type", &json!("B"), &record());
        assert_eq!(cleared, vec!["employer".to_string(), "employee_count".to_string()]);

        let updated =
            apply_conditional_cleanup(&schema(), "activity_type", &json!("B"), &record()).unwrap();
        assert_eq!(value(&updated, "economic_activity.detail_extension.employer"), Some(json!("")));
        assert_eq!(
            value(&updated, "economic_activity.detail_extension.employee_count"),
            Some(Value::Null)
        );
        assert_eq!(
            value(&updated, "economic_activity.detail_extension.business_name"),
            Some(json!("Shop"))
        );
        assert_eq!(value(&updated, "economic_activity.detail_extension.notes"), Some(json!("keep")));
        // cleanup runs before the trigger is committed
        assert_eq!(value(&updated, "economic_activity.activity_type"), Some(json!("A")));
    }

    #[test]
    fn test_reselecting_matching_value_keeps_data() {
        let cleared = compute_cleared(&schema(), "activity_type", &json!("A"), &record());
        assert_eq!(cleared, vec!["business_name".to_string()]);
    }

    #[test]
    fn test_empty_dependents_are_not_reported() {
        let sparse = AggregateRecord::from_value(json!({
            "economic_activity": {"detail_extension": {"employer": ""}}
        }))
        .unwrap();
        assert!(compute_cleared(&schema(), "activity_type", &json!("B"), &sparse).is_empty());
    }

    #[test]
    fn test_visibility_follows_trigger() {
        let resolver = FieldPathResolver::default();
        let schemas = SchemaSet::from(schema());
        let evaluator = ConditionalEvaluator::new(&resolver, &schemas);
        let schema = schema();
        let (_, employer) = schema.field("employer").unwrap();
        let (_, business) = schema.field("business_name").unwrap();
        assert!(evaluator.is_visible(employer, &record()));
        assert!(!evaluator.is_visible(business, &record()));
    }
}
