//! Credit-type selector to detail-container mapping

use std::collections::{BTreeSet, HashMap};

use tracing::debug;
use unicode_normalization::UnicodeNormalization;
use unicode_normalization::char::is_combining_mark;

use crate::constants::{CREDIT_TYPE_FIELD, GENERIC_DETAIL_CONTAINER};
use crate::schema::SchemaDescriptor;

/// Container for mortgage and housing credits
pub const MORTGAGE_CONTAINER: &str = "mortgage_credit";
/// Container for vehicle credits
pub const VEHICLE_CONTAINER: &str = "vehicle_credit";
/// Container for free-investment credits
pub const FREE_INVESTMENT_CONTAINER: &str = "free_investment_credit";
/// Container for consumer credits
pub const CONSUMER_CONTAINER: &str = "consumer_credit";

const EXACT_ENTRIES: &[(&str, &str)] = &[
    ("mortgage", MORTGAGE_CONTAINER),
    ("housing", MORTGAGE_CONTAINER),
    ("hipotecario", MORTGAGE_CONTAINER),
    ("credito_hipotecario", MORTGAGE_CONTAINER),
    ("vivienda", MORTGAGE_CONTAINER),
    ("credito_vivienda", MORTGAGE_CONTAINER),
    ("vehicle", VEHICLE_CONTAINER),
    ("vehicular", VEHICLE_CONTAINER),
    ("credito_vehicular", VEHICLE_CONTAINER),
    ("vehiculo", VEHICLE_CONTAINER),
    ("free_investment", FREE_INVESTMENT_CONTAINER),
    ("libre_inversion", FREE_INVESTMENT_CONTAINER),
    ("credito_libre_inversion", FREE_INVESTMENT_CONTAINER),
    ("consumer", CONSUMER_CONTAINER),
    ("consumo", CONSUMER_CONTAINER),
    ("credito_consumo", CONSUMER_CONTAINER),
];

/// Substring fallbacks consulted only after an exact miss
const SUBSTRING_SHIMS: &[(&str, &str)] = &[
    ("vivienda", MORTGAGE_CONTAINER),
    ("hipotecario", MORTGAGE_CONTAINER),
    ("mortgage", MORTGAGE_CONTAINER),
    ("vehicul", VEHICLE_CONTAINER),
    ("vehicle", VEHICLE_CONTAINER),
    ("auto", VEHICLE_CONTAINER),
    ("libre", FREE_INVESTMENT_CONTAINER),
    ("free", FREE_INVESTMENT_CONTAINER),
    ("consumo", CONSUMER_CONTAINER),
    ("consumer", CONSUMER_CONTAINER),
];

/// Case-fold, strip diacritics and collapse whitespace runs to `_`
pub fn normalize_selector(raw: &str) -> String {
    let folded: String = raw
        .nfd()
        .filter(|c| !is_combining_mark(*c))
        .collect::<String>()
        .to_lowercase();
    folded.split_whitespace().collect::<Vec<_>>().join("_")
}

/// Lookup table from credit-type selector to container key
#[derive(Debug, Clone)]
pub struct CreditTypeTable {
    exact:             HashMap<String, String>,
    default_container: String,
}

impl Default for CreditTypeTable {
    fn default() -> Self {
        let mut table = Self {
            exact:             HashMap::new(),
            default_container: GENERIC_DETAIL_CONTAINER.to_string(),
        };
        for (selector, container) in EXACT_ENTRIES {
            table.declare(selector, *container);
        }
        for container in [
            MORTGAGE_CONTAINER,
            VEHICLE_CONTAINER,
            FREE_INVESTMENT_CONTAINER,
            CONSUMER_CONTAINER,
        ] {
            table.declare(container, container);
        }
        table
    }
}

impl CreditTypeTable {
    /// Map `selector` to `container`, replacing any earlier mapping
    pub fn declare(&mut self, selector: &str, container: impl Into<String>) {
        self.exact.insert(normalize_selector(selector), container.into());
    }

    /// Declare every credit type the application schema knows about
    ///
    /// Types are taken from the options of the credit-type field and from the
    /// values dynamic fields are conditional on. A type that matches no known
    /// container gets a container of its own named after the type.
    pub fn extend_from_schema(&mut self, schema: &SchemaDescriptor) {
        let options = schema
            .field(CREDIT_TYPE_FIELD)
            .and_then(|(_, field)| field.options())
            .unwrap_or_default()
            .iter()
            .cloned();
        let grouped = schema.conditional_groups(CREDIT_TYPE_FIELD).into_keys();

        for selector in options.chain(grouped) {
            let normalized = normalize_selector(&selector);
            if normalized.is_empty() || self.exact.contains_key(&normalized) {
                continue;
            }
            let container = shim_lookup(&normalized).map_or_else(|| normalized.clone(), str::to_string);
            debug!("Declaring credit type '{selector}' -> '{container}' from schema");
            self.exact.insert(normalized, container);
        }
    }

    /// Container key for `selector`
    ///
    /// Exact lookup first, then the substring shim, then the generic container.
    pub fn container_for(&self, selector: &str) -> String {
        let normalized = normalize_selector(selector);
        if let Some(container) = self.exact.get(&normalized) {
            return container.clone();
        }
        if let Some(container) = shim_lookup(&normalized) {
            debug!("Credit type '{selector}' matched by substring -> '{container}'");
            return container.to_string();
        }
        self.default_container.clone()
    }

    /// Whether `key` names a known container
    pub fn is_container(&self, key: &str) -> bool {
        key == self.default_container || self.exact.values().any(|container| container == key)
    }

    /// Every known container key, sorted
    pub fn containers(&self) -> BTreeSet<&str> {
        self.exact
            .values()
            .map(String::as_str)
            .chain(std::iter::once(self.default_container.as_str()))
            .collect()
    }
}

fn shim_lookup(normalized: &str) -> Option<&'static str> {
    SUBSTRING_SHIMS
        .iter()
        .find(|(needle, _)| normalized.contains(needle))
        .map(|(_, container)| *container)
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used, reason = "test code")]

    use serde_json::json;

    use super::*;

    #[test]
    fn test_normalize_selector() {
        assert_eq!(normalize_selector("  Crédito   Vehícular "), "credito_vehicular");
        assert_eq!(normalize_selector("LIBRE INVERSIÓN"), "libre_inversion");
    }

    #[test]
    fn test_exact_then_shim_then_default() {
        let table = CreditTypeTable::default();
        assert_eq!(table.container_for("Crédito Hipotecario"), MORTGAGE_CONTAINER);
        assert_eq!(table.container_for("Compra de Vehículo usado"), VEHICLE_CONTAINER);
        assert_eq!(table.container_for("Microcredit"), GENERIC_DETAIL_CONTAINER);
    }

    #[test]
    fn test_schema_declared_types_get_their_own_container() {
        let schema: SchemaDescriptor = serde_json::from_value(json!({
            "entity_name": "credit_application",
            "fixed_fields": [{"key": "credit_type", "list_values": {"enum": ["Educativo", "Vivienda VIS"]}}],
            "dynamic_fields": [{"key": "school", "conditional_on": {"field": "credit_type", "value": "Educativo"}}]
        }))
        .unwrap();
        let mut table = CreditTypeTable::default();
        table.extend_from_schema(&schema);

        assert_eq!(table.container_for("educativo"), "educativo");
        assert_eq!(table.container_for("Vivienda VIS"), MORTGAGE_CONTAINER);
        assert!(table.is_container("educativo"));
    }
}
