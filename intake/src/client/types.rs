use std::collections::HashSet;

use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::warn;

use crate::constants::{IDENTITY, LEGACY_IDENTITY_KEYS, REFERENCES};
use crate::error::{Error, Result};
use crate::ids::ReferenceId;
use crate::json_object::JsonObjectAccess;
use crate::record::Reference;

const TYPE_SELECTORS_KEY: &str = "type_selectors";

/// Response envelope shared by every collaborator endpoint
#[derive(Debug, Clone, Deserialize)]
pub struct ApiEnvelope {
    #[serde(default = "default_ok")]
    pub ok:      bool,
    #[serde(default)]
    pub data:    Option<Value>,
    #[serde(default)]
    pub error:   Option<String>,
    #[serde(default)]
    pub message: Option<String>,
}

const fn default_ok() -> bool {
    true
}

impl ApiEnvelope {
    /// Payload of a successful envelope
    ///
    /// An `ok: false` envelope is a rejected write even when the HTTP
    /// `status` was a success, so it surfaces as a persistence failure.
    pub fn into_data(self, operation: &str, status: u16) -> Result<Value> {
        if self.ok {
            Ok(self.data.unwrap_or(Value::Null))
        } else {
            let message = self
                .error
                .or(self.message)
                .unwrap_or_else(|| "no error message".to_string());
            Err(error_stack::Report::new(Error::persistence(status, message))
                .attach(format!("Operation: {operation}")))
        }
    }
}

/// Identity assigned by the reference add endpoint
///
/// Accepts `{identity}` and the legacy aliases, or a bare id.
pub fn identity_from_response(data: &Value) -> Option<ReferenceId> {
    if data.is_object() {
        std::iter::once(IDENTITY)
            .chain(LEGACY_IDENTITY_KEYS.iter().copied())
            .find_map(|key| data.get_field(key))
            .and_then(|raw| serde_json::from_value::<ReferenceId>(raw.clone()).ok())
    } else {
        serde_json::from_value::<ReferenceId>(data.clone()).ok()
    }
}

/// Remote references of one subject
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct ReferenceListing {
    /// Type of each reference, paired by position
    pub type_selectors: Vec<String>,
    pub references:     Vec<Reference>,
}

impl ReferenceListing {
    /// Read a listing payload
    ///
    /// Identities are read from `identity` or the legacy aliases. A missing
    /// type selector is taken from `type_selectors` at the same position.
    pub fn from_value(raw: Value) -> Result<Self> {
        let (type_selectors, items) = match raw {
            Value::Array(items) => (Vec::new(), items),
            Value::Object(mut object) => {
                let type_selectors = match object.remove(TYPE_SELECTORS_KEY) {
                    Some(Value::Array(types)) => types
                        .into_iter()
                        .map(|selector| match selector {
                            Value::String(text) => text,
                            Value::Null => String::new(),
                            other => other.to_string(),
                        })
                        .collect(),
                    _ => Vec::new(),
                };
                let items = match object.remove(REFERENCES) {
                    Some(Value::Array(items)) => items,
                    Some(Value::Null) | None => Vec::new(),
                    Some(other) => {
                        return Err(Error::invalid("reference listing", other).into());
                    }
                };
                (type_selectors, items)
            }
            Value::Null => (Vec::new(), Vec::new()),
            other => return Err(Error::invalid("reference listing", other).into()),
        };

        let references = items
            .into_iter()
            .enumerate()
            .filter_map(|(position, item)| match serde_json::from_value::<Reference>(item) {
                Ok(reference) => {
                    let mut reference = reference.normalized();
                    if reference.type_selector.is_none() {
                        reference.type_selector = type_selectors
                            .get(position)
                            .filter(|selector| !selector.is_empty())
                            .cloned();
                    }
                    Some(reference)
                }
                Err(e) => {
                    warn!("Skipping unreadable listed reference at {position}: {e}");
                    None
                }
            })
            .collect();

        Ok(Self {
            type_selectors,
            references,
        })
    }

    pub fn identities(&self) -> HashSet<ReferenceId> {
        self.references
            .iter()
            .filter_map(|reference| reference.identity)
            .collect()
    }
}
