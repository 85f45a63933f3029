use std::collections::BTreeMap;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use serde_json::Value;
use strum::{AsRefStr, Display, EnumIter, EnumString, IntoStaticStr};

use crate::constants::{
    APPLICATIONS, DETAIL_EXTENSION, DEFAULT_ORDER_INDEX, ECONOMIC_ACTIVITY, EXTENSION,
    FINANCIAL_INFO, LOCATIONS, PRINCIPAL, REFERENCES,
};

/// Business entities that carry an operator-defined schema
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Hash,
    PartialOrd,
    Ord,
    Serialize,
    Deserialize,
    Display,
    EnumString,
    EnumIter,
    AsRefStr,
    IntoStaticStr,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum EntityName {
    Applicant,
    Location,
    EconomicActivity,
    FinancialInfo,
    Reference,
    CreditApplication,
}

impl EntityName {
    /// Top-level record container holding this entity
    pub const fn container_key(self) -> &'static str {
        match self {
            Self::Applicant => PRINCIPAL,
            Self::Location => LOCATIONS,
            Self::EconomicActivity => ECONOMIC_ACTIVITY,
            Self::FinancialInfo => FINANCIAL_INFO,
            Self::Reference => REFERENCES,
            Self::CreditApplication => APPLICATIONS,
        }
    }

    /// Whether the container is a list of items rather than a singleton
    pub const fn is_list(self) -> bool {
        matches!(self, Self::Location | Self::Reference | Self::CreditApplication)
    }

    /// Open map holding this entity's dynamic fields
    ///
    /// Credit applications keep dynamic fields in per-type containers instead.
    pub const fn extension_key(self) -> Option<&'static str> {
        match self {
            Self::Applicant | Self::Reference => Some(EXTENSION),
            Self::Location | Self::EconomicActivity | Self::FinancialInfo => Some(DETAIL_EXTENSION),
            Self::CreditApplication => None,
        }
    }
}

/// Declared value type of a field
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Hash,
    Default,
    Serialize,
    Deserialize,
    Display,
    EnumString,
    AsRefStr,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case", ascii_case_insensitive)]
pub enum DataType {
    #[default]
    String,
    Integer,
    Number,
    Boolean,
    Date,
    Array,
    Object,
    File,
}

impl DataType {
    /// Value a field of this type holds once cleared
    pub fn empty_value(self) -> Value {
        match self {
            Self::String | Self::Date | Self::File => Value::String(String::new()),
            Self::Integer | Self::Number | Self::Boolean => Value::Null,
            Self::Array => Value::Array(Vec::new()),
            Self::Object => Value::Object(serde_json::Map::new()),
        }
    }

    pub const fn is_numeric(self) -> bool {
        matches!(self, Self::Integer | Self::Number)
    }
}

/// Options or sub-structure attached to a field
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ListValues {
    /// Selectable options
    Enum {
        #[serde(rename = "enum")]
        options: Vec<String>,
    },
    /// Sub-fields of an object field
    ObjectStructure {
        object_structure: Vec<FieldDefinition>,
    },
    /// Upload constraints of a file field, passed through untouched
    FileConfig { file_config: Value },
}

/// Visibility condition: the field is shown only while `field` equals `value`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConditionalOn {
    pub field: String,
    pub value: Value,
}

impl ConditionalOn {
    /// Whether `candidate` satisfies the condition
    ///
    /// Values compare by their text form so `"1"` and `1` are equal.
    pub fn matches(&self, candidate: &Value) -> bool {
        value_text(&self.value) == value_text(candidate)
    }
}

/// Text form of a scalar used for selector comparisons
pub fn value_text(value: &Value) -> String {
    match value {
        Value::Null => String::new(),
        Value::String(text) => text.trim().to_string(),
        other => other.to_string(),
    }
}

fn default_order_index() -> u32 {
    DEFAULT_ORDER_INDEX
}

/// Operator-defined field
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FieldDefinition {
    pub key:            String,
    #[serde(default, alias = "type")]
    pub data_type:      DataType,
    #[serde(default)]
    pub required:       bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub default_value:  Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub list_values:    Option<ListValues>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub conditional_on: Option<ConditionalOn>,
    #[serde(default = "default_order_index")]
    pub order_index:    u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description:    Option<String>,
}

impl FieldDefinition {
    /// Minimal definition, mostly for built-in fallbacks
    pub fn new(key: impl Into<String>, data_type: DataType, required: bool) -> Self {
        Self {
            key: key.into(),
            data_type,
            required,
            default_value: None,
            list_values: None,
            conditional_on: None,
            order_index: DEFAULT_ORDER_INDEX,
            description: None,
        }
    }

    /// Declared sub-fields of an object field
    pub fn object_structure(&self) -> Option<&[Self]> {
        match &self.list_values {
            Some(ListValues::ObjectStructure { object_structure }) if self.data_type == DataType::Object => {
                Some(object_structure)
            }
            _ => None,
        }
    }

    /// Selectable options, if any
    pub fn options(&self) -> Option<&[String]> {
        match &self.list_values {
            Some(ListValues::Enum { options }) => Some(options),
            _ => None,
        }
    }
}

/// Whether a field is part of the entity's fixed columns or its open extension
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Display, AsRefStr)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum FieldKind {
    Fixed,
    Dynamic,
}

/// A field after object-structure expansion
#[derive(Debug, Clone, PartialEq)]
pub struct LeafField<'a> {
    /// Dotted key, `parent.sub` for object sub-fields
    pub key:        String,
    /// Owning object field, when this leaf came from an expansion
    pub parent:     Option<&'a str>,
    pub kind:       FieldKind,
    pub definition: &'a FieldDefinition,
}

/// Fixed and dynamic fields for one entity
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SchemaDescriptor {
    pub entity_name:    EntityName,
    #[serde(default)]
    pub fixed_fields:   Vec<FieldDefinition>,
    #[serde(default)]
    pub dynamic_fields: Vec<FieldDefinition>,
}

impl SchemaDescriptor {
    pub const fn empty(entity_name: EntityName) -> Self {
        Self {
            entity_name,
            fixed_fields: Vec::new(),
            dynamic_fields: Vec::new(),
        }
    }

    /// Fixed fields followed by dynamic fields, tagged with their kind
    pub fn fields(&self) -> impl Iterator<Item = (FieldKind, &FieldDefinition)> {
        self.fixed_fields
            .iter()
            .map(|field| (FieldKind::Fixed, field))
            .chain(self.dynamic_fields.iter().map(|field| (FieldKind::Dynamic, field)))
    }

    /// Look up a top-level field by key
    pub fn field(&self, key: &str) -> Option<(FieldKind, &FieldDefinition)> {
        self.fields().find(|(_, field)| field.key == key)
    }

    /// Dynamic fields whose visibility depends on `trigger`
    pub fn dependents_of<'a>(&'a self, trigger: &'a str) -> impl Iterator<Item = &'a FieldDefinition> {
        self.dynamic_fields.iter().filter(move |field| {
            field
                .conditional_on
                .as_ref()
                .is_some_and(|condition| condition.field == trigger)
        })
    }

    /// Dependents of `trigger` grouped by the trigger value that shows them
    pub fn conditional_groups(&self, trigger: &str) -> BTreeMap<String, Vec<&FieldDefinition>> {
        let mut groups: BTreeMap<String, Vec<&FieldDefinition>> = BTreeMap::new();
        for field in &self.dynamic_fields {
            if let Some(condition) = &field.conditional_on
                && condition.field == trigger
            {
                groups
                    .entry(value_text(&condition.value))
                    .or_default()
                    .push(field);
            }
        }
        groups
    }

    /// Every field with object structures expanded into `parent.sub` leaves
    pub fn leaf_fields(&self) -> Vec<LeafField<'_>> {
        let mut leaves = Vec::new();
        for (kind, field) in self.fields() {
            match field.object_structure() {
                Some(children) if !children.is_empty() => {
                    leaves.extend(children.iter().map(|child| LeafField {
                        key: format!("{}.{}", field.key, child.key),
                        parent: Some(field.key.as_str()),
                        kind,
                        definition: child,
                    }));
                }
                _ => leaves.push(LeafField {
                    key: field.key.clone(),
                    parent: None,
                    kind,
                    definition: field,
                }),
            }
        }
        leaves
    }
}

/// Schemas for every entity loaded in a session
#[derive(Debug, Clone, Default)]
pub struct SchemaSet {
    schemas: BTreeMap<EntityName, Arc<SchemaDescriptor>>,
}

/// Where a key was found in a [`SchemaSet`]
#[derive(Debug, Clone, Copy)]
pub struct SchemaMatch<'a> {
    pub entity:     EntityName,
    pub kind:       FieldKind,
    pub definition: &'a FieldDefinition,
}

impl SchemaSet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, schema: Arc<SchemaDescriptor>) {
        self.schemas.insert(schema.entity_name, schema);
    }

    pub fn get(&self, entity: EntityName) -> Option<&SchemaDescriptor> {
        self.schemas.get(&entity).map(AsRef::as_ref)
    }

    pub fn iter(&self) -> impl Iterator<Item = &SchemaDescriptor> {
        self.schemas.values().map(AsRef::as_ref)
    }

    pub fn is_empty(&self) -> bool {
        self.schemas.is_empty()
    }

    /// First schema declaring `key`, in entity order
    pub fn locate(&self, key: &str) -> Option<SchemaMatch<'_>> {
        self.iter().find_map(|schema| {
            schema.field(key).map(|(kind, definition)| SchemaMatch {
                entity: schema.entity_name,
                kind,
                definition,
            })
        })
    }
}

impl From<SchemaDescriptor> for SchemaSet {
    fn from(schema: SchemaDescriptor) -> Self {
        let mut set = Self::new();
        set.insert(Arc::new(schema));
        set
    }
}

impl FromIterator<Arc<SchemaDescriptor>> for SchemaSet {
    fn from_iter<T: IntoIterator<Item = Arc<SchemaDescriptor>>>(iter: T) -> Self {
        let mut set = Self::new();
        for schema in iter {
            set.insert(schema);
        }
        set
    }
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used, reason = "test code")]

    use std::str::FromStr;

    use serde_json::json;

    use super::*;

    fn credit_schema() -> SchemaDescriptor {
        serde_json::from_value(json!({
            "entity_name": "credit_application",
            "fixed_fields": [{"key": "credit_type", "type": "string", "required": true}],
            "dynamic_fields": [
                {"key": "property_value", "data_type": "number",
                 "conditional_on": {"field": "credit_type", "value": "mortgage"}},
                {"key": "vehicle_plate", "data_type": "string",
                 "conditional_on": {"field": "credit_type", "value": "vehicle"}},
                {"key": "down_payment", "data_type": "number",
                 "conditional_on": {"field": "credit_type", "value": "mortgage"}},
                {"key": "co_signer", "data_type": "object",
                 "list_values": {"object_structure": [
                     {"key": "name", "data_type": "string"},
                     {"key": "phone", "data_type": "string"}
                 ]}}
            ]
        }))
        .unwrap()
    }

    #[test]
    fn test_entity_names_round_trip_through_strum() {
        assert_eq!(EntityName::from_str("economic_activity").unwrap(), EntityName::EconomicActivity);
        assert_eq!(EntityName::CreditApplication.as_ref(), "credit_application");
        assert_eq!(EntityName::Location.container_key(), LOCATIONS);
    }

    #[test]
    fn test_conditional_groups_by_trigger_value() {
        let schema = credit_schema();
        let groups = {
            // Groups borrow the schema only, not the trigger name
            let trigger = String::from("credit_type");
            schema.conditional_groups(&trigger)
        };
        let mortgage: Vec<_> = groups["mortgage"].iter().map(|f| f.key.as_str()).collect();
        assert_eq!(mortgage, vec!["property_value", "down_payment"]);
        assert_eq!(groups["vehicle"].len(), 1);
    }

    #[test]
    fn test_leaf_fields_expand_object_structure() {
        let schema = credit_schema();
        let keys: Vec<_> = schema.leaf_fields().into_iter().map(|leaf| leaf.key).collect();
        assert!(keys.contains(&"co_signer.name".to_string()));
        assert!(keys.contains(&"co_signer.phone".to_string()));
        assert!(!keys.contains(&"co_signer".to_string()));
    }

    #[test]
    fn test_conditional_matches_by_text() {
        let condition = ConditionalOn {
            field: "stratum".into(),
            value: json!("3"),
        };
        assert!(condition.matches(&json!(3)));
        assert!(!condition.matches(&json!("4")));
    }

    #[test]
    fn test_schema_set_locates_keys() {
        let set = SchemaSet::from(credit_schema());
        let found = set.locate("vehicle_plate").unwrap();
        assert_eq!(found.entity, EntityName::CreditApplication);
        assert_eq!(found.kind, FieldKind::Dynamic);
        assert!(set.locate("unknown").is_none());
    }
}
