//! Cleanup of schemas as delivered by the schema endpoint
//!
//! Operators edit schemas by hand, so the raw payload is lenient:
//! `list_values` may arrive as a JSON string or a bare array, the type key
//! may be `type` or `data_type`, and well-known date fields are sometimes
//! declared as strings.

use std::str::FromStr;

use serde_json::{Map, Value};
use tracing::{debug, warn};

use super::types::{DataType, EntityName, FieldDefinition, SchemaDescriptor};
use crate::constants::{DATE_FIELD_KEYS, DEFAULT_ORDER_INDEX};
use crate::error::{Error, Result};
use crate::json_object::JsonObjectAccess;

const FIELD_TYPE_KEY: &str = "data_type";
const FIELD_TYPE_ALIAS: &str = "type";
const LIST_VALUES_KEY: &str = "list_values";
const ENUM_KEY: &str = "enum";
const OBJECT_STRUCTURE_KEY: &str = "object_structure";
const FILE_CONFIG_KEY: &str = "file_config";
const ORDER_INDEX_KEY: &str = "order_index";

/// Turn a raw schema payload into a [`SchemaDescriptor`]
///
/// A bare array is read as the entity's dynamic fields. Fields that cannot
/// be read are dropped with a warning; the rest are sorted by `order_index`.
pub fn normalize_schema(entity: EntityName, raw: Value) -> Result<SchemaDescriptor> {
    let (fixed, dynamic) = match raw {
        Value::Array(dynamic) => (Vec::new(), dynamic),
        Value::Object(mut object) => {
            if let Some(declared) = object.get_field_str("entity_name")
                && EntityName::from_str(declared).ok() != Some(entity)
            {
                warn!("Schema for '{entity}' declares entity '{declared}', keeping '{entity}'");
            }
            let fixed = take_field_list(&mut object, "fixed_fields");
            let dynamic = take_field_list(&mut object, "dynamic_fields");
            (fixed, dynamic)
        }
        other => {
            return Err(Error::schema_load(
                entity.as_ref(),
                format!("expected an object or array, got {other}"),
            )
            .into());
        }
    };

    let schema = SchemaDescriptor {
        entity_name:    entity,
        fixed_fields:   normalize_fields(entity, fixed),
        dynamic_fields: normalize_fields(entity, dynamic),
    };
    debug!(
        "Normalized schema '{entity}': {} fixed, {} dynamic",
        schema.fixed_fields.len(),
        schema.dynamic_fields.len()
    );
    Ok(schema)
}

fn take_field_list(object: &mut Map<String, Value>, key: &str) -> Vec<Value> {
    match object.remove(key) {
        Some(Value::Array(fields)) => fields,
        Some(Value::Null) | None => Vec::new(),
        Some(other) => {
            warn!("Schema '{key}' is not a list, ignoring: {other}");
            Vec::new()
        }
    }
}

fn normalize_fields(entity: EntityName, raw_fields: Vec<Value>) -> Vec<FieldDefinition> {
    let mut fields: Vec<FieldDefinition> = raw_fields
        .into_iter()
        .filter_map(|raw| {
            let cleaned = match raw {
                Value::Object(object) => normalize_field_object(object),
                other => {
                    warn!("Schema '{entity}': skipping non-object field {other}");
                    return None;
                }
            };
            match serde_json::from_value::<FieldDefinition>(Value::Object(cleaned)) {
                Ok(field) => Some(field),
                Err(e) => {
                    warn!("Schema '{entity}': skipping unreadable field: {e}");
                    None
                }
            }
        })
        .collect();
    fields.sort_by_key(|field| field.order_index);
    fields
}

fn normalize_field_object(mut object: Map<String, Value>) -> Map<String, Value> {
    let key = object.get_field_str("key").unwrap_or_default().to_string();

    let declared = object
        .remove(FIELD_TYPE_KEY)
        .or_else(|| object.remove(FIELD_TYPE_ALIAS));
    let mut data_type = match declared.as_ref().and_then(Value::as_str) {
        Some(text) => DataType::from_str(text.trim()).unwrap_or_else(|_| {
            warn!("Field '{key}': unknown type '{text}', treating as string");
            DataType::String
        }),
        None => DataType::default(),
    };
    if DATE_FIELD_KEYS.contains(&key.as_str()) && data_type != DataType::Date {
        debug!("Field '{key}': coercing type {data_type} to date");
        data_type = DataType::Date;
    }
    object.insert_field(FIELD_TYPE_KEY, data_type.as_ref());

    let list_values = object
        .remove(LIST_VALUES_KEY)
        .and_then(|raw| normalize_list_values(&key, data_type, raw));
    if let Some(list_values) = list_values {
        object.insert_field(LIST_VALUES_KEY, list_values);
    }

    let order = object
        .get_field(ORDER_INDEX_KEY)
        .and_then(Value::as_u64)
        .filter(|order| *order > 0)
        .and_then(|order| u32::try_from(order).ok())
        .unwrap_or(DEFAULT_ORDER_INDEX);
    object.insert_field(ORDER_INDEX_KEY, order);

    if object.get_field("required").is_some_and(Value::is_null) {
        object.remove("required");
    }

    object
}

fn normalize_list_values(key: &str, data_type: DataType, raw: Value) -> Option<Value> {
    let parsed = match raw {
        Value::Null => return None,
        Value::String(text) => match serde_json::from_str::<Value>(&text) {
            Ok(value) => value,
            Err(e) => {
                warn!("Field '{key}': list_values is not valid JSON: {e}");
                return None;
            }
        },
        other => other,
    };

    let mut object = match parsed {
        Value::Array(options) => {
            let mut object = Map::new();
            object.insert_field(ENUM_KEY, options);
            object
        }
        Value::Object(object) => object,
        other => {
            warn!("Field '{key}': ignoring list_values {other}");
            return None;
        }
    };

    if let Some(Value::Array(options)) = object.remove(ENUM_KEY) {
        let options: Vec<Value> = options
            .iter()
            .filter(|option| !option.is_null())
            .map(|option| match option {
                Value::String(text) => Value::String(text.clone()),
                other => Value::String(other.to_string()),
            })
            .collect();
        object.insert_field(ENUM_KEY, options);
    }

    if let Some(Value::Array(children)) = object.remove(OBJECT_STRUCTURE_KEY) {
        let children: Vec<Value> = children
            .into_iter()
            .filter_map(|child| match child {
                Value::Object(child) => Some(Value::Object(normalize_field_object(child))),
                _ => None,
            })
            .collect();
        object.insert_field(OBJECT_STRUCTURE_KEY, children);
    }

    match data_type {
        DataType::Array if !object.contains_key(ENUM_KEY) => {
            warn!("Field '{key}': array field without enum options, dropping list_values");
            None
        }
        DataType::Object if !object.contains_key(OBJECT_STRUCTURE_KEY) => {
            warn!("Field '{key}': object field without object_structure, dropping list_values");
            None
        }
        _ if [ENUM_KEY, OBJECT_STRUCTURE_KEY, FILE_CONFIG_KEY]
            .iter()
            .any(|known| object.contains_key(*known)) =>
        {
            Some(Value::Object(object))
        }
        _ => {
            debug!("Field '{key}': list_values has no recognized entry, dropping it");
            None
        }
    }
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used, reason = "test code")]

    use serde_json::json;

    use super::*;

    #[test]
    fn test_list_values_string_is_parsed() {
        let schema = normalize_schema(
            EntityName::Applicant,
            json!({
                "fixed_fields": [],
                "dynamic_fields": [
                    {"key": "marital_status", "type": "string",
                     "list_values": "[\"single\", \"married\"]"}
                ]
            }),
        )
        .unwrap();
        assert_eq!(
            schema.dynamic_fields[0].options(),
            Some(["single".to_string(), "married".to_string()].as_slice())
        );
    }

    #[test]
    fn test_array_without_enum_and_object_without_structure_lose_list_values() {
        let schema = normalize_schema(
            EntityName::Applicant,
            json!({"dynamic_fields": [
                {"key": "tags", "type": "array", "list_values": {"something": 1}},
                {"key": "spouse", "type": "object", "list_values": {"enum": ["a"]}}
            ]}),
        )
        .unwrap();
        assert!(schema.dynamic_fields.iter().all(|f| f.list_values.is_none()));
    }

    #[test]
    fn test_date_keys_are_coerced() {
        let schema = normalize_schema(
            EntityName::Applicant,
            json!({"fixed_fields": [{"key": "birth_date", "type": "string", "required": true}]}),
        )
        .unwrap();
        assert_eq!(schema.fixed_fields[0].data_type, DataType::Date);
        assert!(schema.fixed_fields[0].required);
    }

    #[test]
    fn test_fields_sorted_by_order_index_with_default() {
        let schema = normalize_schema(
            EntityName::Location,
            json!({"fixed_fields": [
                {"key": "unordered"},
                {"key": "second", "order_index": 2},
                {"key": "first", "order_index": 1}
            ]}),
        )
        .unwrap();
        let keys: Vec<_> = schema.fixed_fields.iter().map(|f| f.key.as_str()).collect();
        assert_eq!(keys, vec!["first", "second", "unordered"]);
        assert_eq!(schema.fixed_fields[2].order_index, DEFAULT_ORDER_INDEX);
    }

    #[test]
    fn test_object_structure_children_are_normalized() {
        let schema = normalize_schema(
            EntityName::CreditApplication,
            json!({"dynamic_fields": [
                {"key": "co_signer", "type": "object", "list_values": {"object_structure": [
                    {"key": "name", "type": "string"},
                    {"key": "birth_date", "type": "string"}
                ]}}
            ]}),
        )
        .unwrap();
        let children = schema.dynamic_fields[0].object_structure().unwrap();
        assert_eq!(children[1].data_type, DataType::Date);
    }

    #[test]
    fn test_bare_array_is_dynamic_fields() {
        let schema =
            normalize_schema(EntityName::Reference, json!([{"key": "relationship"}])).unwrap();
        assert!(schema.fixed_fields.is_empty());
        assert_eq!(schema.dynamic_fields[0].key, "relationship");
    }

    #[test]
    fn test_scalar_payload_is_a_schema_load_error() {
        let error = normalize_schema(EntityName::Reference, json!("oops")).unwrap_err();
        assert!(matches!(error.current_context(), Error::SchemaLoad { .. }));
    }
}
