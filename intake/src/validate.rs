//! Client-side presence and type checks run before any save call
//!
//! Only schema-declared constraints are checked: required fields must hold
//! a non-empty value and typed fields must hold a value of their type.
//! Dynamic fields hidden by their condition are neither required nor checked.

use serde_json::Value;
use tracing::debug;

use crate::conditional::ConditionalEvaluator;
use crate::constants::{CREDIT_TYPE_FIELD, REFERENCE_TYPE_FIELD};
use crate::credit::type_selector_path;
use crate::error::{Error, Result, ValidationError};
use crate::record::{AggregateRecord, RecordNode};
use crate::resolve::FieldPathResolver;
use crate::schema::{DataType, EntityName, FieldDefinition, LeafField, SchemaDescriptor, SchemaSet};

const REQUIRED_MESSAGE: &str = "This field is required";

/// Validate `record` against every schema in `schemas`
///
/// Returns [`Error::Validation`] listing every offending field.
pub fn validate_record(
    record: &AggregateRecord,
    schemas: &SchemaSet,
    resolver: &FieldPathResolver,
) -> Result<()> {
    let errors = collect_errors(record, schemas, resolver);
    if errors.is_empty() {
        Ok(())
    } else {
        debug!("Validation found {} problem(s)", errors.len());
        Err(Error::Validation { errors }.into())
    }
}

/// Every validation problem in `record`, in schema order
pub fn collect_errors(
    record: &AggregateRecord,
    schemas: &SchemaSet,
    resolver: &FieldPathResolver,
) -> Vec<ValidationError> {
    let evaluator = ConditionalEvaluator::new(resolver, schemas);
    schemas
        .iter()
        .filter(|schema| section_present(record, schema.entity_name))
        .flat_map(|schema| schema_errors(record, schema, schemas, resolver, &evaluator))
        .collect()
}

/// List entities are only validated once they hold an item
fn section_present(record: &AggregateRecord, entity: EntityName) -> bool {
    if !entity.is_list() {
        return true;
    }
    record
        .section(entity.container_key())
        .and_then(RecordNode::as_list)
        .is_some_and(|items| !items.is_empty())
}

fn schema_errors(
    record: &AggregateRecord,
    schema: &SchemaDescriptor,
    schemas: &SchemaSet,
    resolver: &FieldPathResolver,
    evaluator: &ConditionalEvaluator<'_>,
) -> Vec<ValidationError> {
    schema
        .leaf_fields()
        .into_iter()
        .filter(|leaf| leaf_visible(schema, leaf, record, evaluator))
        .filter_map(|leaf| {
            let (path, value) = if leaf.key == CREDIT_TYPE_FIELD {
                (
                    type_selector_path().to_string(),
                    evaluator.trigger_value(CREDIT_TYPE_FIELD, record),
                )
            } else if leaf.key == REFERENCE_TYPE_FIELD {
                // Always set: references fall back to the default type
                return None;
            } else {
                let resolved = resolver.resolve(record, &leaf.key, schemas);
                let value = record
                    .get(&resolved.path)
                    .map_or(Value::Null, RecordNode::to_value);
                (resolved.path.to_string(), value)
            };
            check_value(leaf.definition, &value).map(|message| ValidationError { path, message })
        })
        .collect()
}

/// Leaves inherit the visibility of their parent object field
fn leaf_visible(
    schema: &SchemaDescriptor,
    leaf: &LeafField<'_>,
    record: &AggregateRecord,
    evaluator: &ConditionalEvaluator<'_>,
) -> bool {
    let owner = leaf
        .parent
        .and_then(|parent| schema.field(parent))
        .map_or(leaf.definition, |(_, definition)| definition);
    evaluator.is_visible(owner, record)
}

/// Problem with `value` for `field`, if any
pub fn check_value(field: &FieldDefinition, value: &Value) -> Option<String> {
    if is_blank(value) {
        return field.required.then(|| REQUIRED_MESSAGE.to_string());
    }
    match field.data_type {
        DataType::Number if !value.is_number() => Some("Must be a number".to_string()),
        DataType::Integer if !is_integer(value) => Some("Must be a whole number".to_string()),
        DataType::Boolean if !value.is_boolean() => Some("Must be true or false".to_string()),
        _ => None,
    }
}

fn is_blank(value: &Value) -> bool {
    match value {
        Value::Null => true,
        Value::String(text) => text.trim().is_empty(),
        Value::Array(items) => items.is_empty(),
        Value::Object(map) => map.is_empty(),
        Value::Bool(_) | Value::Number(_) => false,
    }
}

fn is_integer(value: &Value) -> bool {
    value.is_i64()
        || value.is_u64()
        || value
            .as_f64()
            .is_some_and(|number| number.is_finite() && number.fract() == 0.0)
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used, reason = "test code")]

    use serde_json::json;

    use super::*;
    use crate::schema::normalize_schema;

    fn schemas() -> SchemaSet {
        let applicant = normalize_schema(
            EntityName::Applicant,
            json!({
                "fixed_fields": [
                    {"key": "first_name", "type": "string", "required": true},
                    {"key": "dependents", "type": "integer"}
                ],
                "dynamic_fields": [
                    {"key": "has_vehicle", "type": "boolean"},
                    {"key": "plate", "type": "string", "required": true,
                     "conditional_on": {"field": "has_vehicle", "value": true}}
                ]
            }),
        )
        .unwrap();
        let financial = normalize_schema(
            EntityName::FinancialInfo,
            json!({"fixed_fields": [{"key": "monthly_income", "type": "number", "required": true}]}),
        )
        .unwrap();
        let location = normalize_schema(
            EntityName::Location,
            json!({"fixed_fields": [{"key": "city", "type": "string", "required": true}]}),
        )
        .unwrap();
        [applicant, financial, location]
            .into_iter()
            .map(std::sync::Arc::new)
            .collect()
    }

    fn paths(errors: &[ValidationError]) -> Vec<&str> {
        errors.iter().map(|error| error.path.as_str()).collect()
    }

    #[test]
    fn test_required_and_typed_fields() {
        let record = AggregateRecord::from_value(json!({
            "principal": {"first_name": "  ", "dependents": 1.5},
            "financial_info": {"monthly_income": "lots"}
        }))
        .unwrap();
        let errors = collect_errors(&record, &schemas(), &FieldPathResolver::default());
        assert_eq!(
            paths(&errors),
            vec!["principal.first_name", "principal.dependents", "financial_info.monthly_income"]
        );
        assert_eq!(errors[0].message, REQUIRED_MESSAGE);
    }

    #[test]
    fn test_hidden_conditional_fields_are_not_required() {
        let record = AggregateRecord::from_value(json!({
            "principal": {"first_name": "Ana", "extension": {"has_vehicle": false}},
            "financial_info": {"monthly_income": 100}
        }))
        .unwrap();
        assert!(validate_record(&record, &schemas(), &FieldPathResolver::default()).is_ok());

        let shown = AggregateRecord::from_value(json!({
            "principal": {"first_name": "Ana", "extension": {"has_vehicle": true}},
            "financial_info": {"monthly_income": 100}
        }))
        .unwrap();
        let error = validate_record(&shown, &schemas(), &FieldPathResolver::default()).unwrap_err();
        let errors = match error.current_context() {
            Error::Validation { errors } => errors.clone(),
            _ => Vec::new(),
        };
        assert_eq!(paths(&errors), vec!["principal.extension.plate"]);
    }

    #[test]
    fn test_empty_list_entities_are_skipped() {
        let record = AggregateRecord::from_value(json!({
            "principal": {"first_name": "Ana"},
            "financial_info": {"monthly_income": 0},
            "locations": []
        }))
        .unwrap();
        assert!(collect_errors(&record, &schemas(), &FieldPathResolver::default()).is_empty());

        let with_location = AggregateRecord::from_value(json!({
            "principal": {"first_name": "Ana"},
            "financial_info": {"monthly_income": 0},
            "locations": [{"city": ""}]
        }))
        .unwrap();
        let errors = collect_errors(&with_location, &schemas(), &FieldPathResolver::default());
        assert_eq!(paths(&errors), vec!["locations.0.city"]);
    }

    #[test]
    fn test_check_value_types() {
        let integer = FieldDefinition::new("n", DataType::Integer, false);
        assert_eq!(check_value(&integer, &json!(3)), None);
        assert_eq!(check_value(&integer, &json!(3.0)), None);
        assert!(check_value(&integer, &json!("3")).is_some());
        assert_eq!(check_value(&integer, &Value::Null), None);

        let flag = FieldDefinition::new("f", DataType::Boolean, true);
        assert!(check_value(&flag, &json!("yes")).is_some());
        assert_eq!(check_value(&flag, &json!(false)), None);
    }
}
