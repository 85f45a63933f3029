//! Projections of the edited record into the aggregate update payload
//!
//! Each builder reads one section and returns `None` when the record has
//! no such section. References are never part of the aggregate payload:
//! they are persisted through the reconciler.

use serde_json::{Map, Value};

use crate::constants::{
    APPLICATIONS, CREDIT_DETAIL, CREDIT_TYPE_FIELD, DETAIL_EXTENSION, ECONOMIC_ACTIVITY, EXTENSION,
    FINANCIAL_INFO, LOCATIONS, PRINCIPAL, STRUCTURAL_KEYS, TYPE_CONTAINERS, TYPE_SELECTOR,
};
use crate::record::{AggregateRecord, NodeMap, RecordNode};

/// Full aggregate update payload for `record`
pub fn build_aggregate_payload(record: &AggregateRecord) -> Value {
    let mut payload = Map::new();
    let sections = [
        (PRINCIPAL, principal_payload(record)),
        (LOCATIONS, locations_payload(record)),
        (ECONOMIC_ACTIVITY, economic_activity_payload(record)),
        (FINANCIAL_INFO, financial_info_payload(record)),
        (APPLICATIONS, applications_payload(record)),
    ];
    for (key, section) in sections {
        if let Some(section) = section {
            payload.insert(key.to_string(), section);
        }
    }
    Value::Object(payload)
}

/// Principal fixed fields plus its extension
pub fn principal_payload(record: &AggregateRecord) -> Option<Value> {
    let principal = record.section(PRINCIPAL)?.as_map()?;
    Some(Value::Object(fixed_with_bag(principal, EXTENSION)))
}

/// Each location's fixed fields plus its detail extension
pub fn locations_payload(record: &AggregateRecord) -> Option<Value> {
    let locations = record.section(LOCATIONS)?.as_list()?;
    Some(Value::Array(
        locations
            .iter()
            .filter_map(RecordNode::as_map)
            .map(|location| Value::Object(fixed_with_bag(location, DETAIL_EXTENSION)))
            .collect(),
    ))
}

/// Economic activity detail extension and type containers
pub fn economic_activity_payload(record: &AggregateRecord) -> Option<Value> {
    let activity = record.section(ECONOMIC_ACTIVITY)?.as_map()?;
    let mut payload = Map::new();
    payload.insert(DETAIL_EXTENSION.to_string(), bag(activity, DETAIL_EXTENSION));
    payload.insert(TYPE_CONTAINERS.to_string(), bag(activity, TYPE_CONTAINERS));
    Some(Value::Object(payload))
}

/// Financial info fixed fields plus its detail extension
pub fn financial_info_payload(record: &AggregateRecord) -> Option<Value> {
    let financial = record.section(FINANCIAL_INFO)?.as_map()?;
    Some(Value::Object(fixed_with_bag(financial, DETAIL_EXTENSION)))
}

/// Each application's fixed fields, its credit type and its type containers
///
/// Type containers are lifted to top-level keys of the application payload.
pub fn applications_payload(record: &AggregateRecord) -> Option<Value> {
    let applications = record.section(APPLICATIONS)?.as_list()?;
    Some(Value::Array(
        applications
            .iter()
            .filter_map(RecordNode::as_map)
            .map(|application| Value::Object(application_payload(application)))
            .collect(),
    ))
}

fn application_payload(application: &NodeMap) -> Map<String, Value> {
    let mut payload = fixed_fields(application);
    let detail = application.get(CREDIT_DETAIL);

    let credit_type = detail
        .and_then(|detail| detail.get(TYPE_SELECTOR))
        .and_then(RecordNode::as_str)
        .filter(|selector| !selector.is_empty())
        .or_else(|| application.get(CREDIT_TYPE_FIELD).and_then(RecordNode::as_str));
    payload.insert(
        CREDIT_TYPE_FIELD.to_string(),
        credit_type.map_or(Value::Null, Value::from),
    );

    if let Some(containers) = detail
        .and_then(|detail| detail.get(TYPE_CONTAINERS))
        .and_then(RecordNode::as_map)
    {
        for (key, container) in containers {
            payload.insert(key.clone(), container.to_value());
        }
    }
    payload
}

fn fixed_fields(container: &NodeMap) -> Map<String, Value> {
    container
        .iter()
        .filter(|(key, _)| !STRUCTURAL_KEYS.contains(&key.as_str()))
        .map(|(key, child)| (key.clone(), child.to_value()))
        .collect()
}

fn fixed_with_bag(container: &NodeMap, bag_key: &str) -> Map<String, Value> {
    let mut payload = fixed_fields(container);
    payload.insert(bag_key.to_string(), bag(container, bag_key));
    payload
}

/// Named open map, or an empty object when absent or not a map
fn bag(container: &NodeMap, key: &str) -> Value {
    container
        .get(key)
        .filter(|node| node.as_map().is_some())
        .map_or_else(|| Value::Object(Map::new()), RecordNode::to_value)
}
