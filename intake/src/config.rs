//! Environment-driven configuration

use std::str::FromStr;
use std::time::Duration;

use crate::constants::{
    ACCESS_TOKEN_ENV_VAR, BASE_URL_ENV_VAR, CREDIT_TYPE_MIRROR_ENV_VAR, DEFAULT_BASE_URL,
    DEFAULT_FETCH_RETRIES, DEFAULT_REQUEST_TIMEOUT, DEFAULT_SCHEMA_TTL, DEFAULT_TENANT_ID,
    FETCH_RETRIES_ENV_VAR, LOG_FILTER_ENV_VAR, LOG_LEVEL_ENV_VAR, REQUEST_TIMEOUT_ENV_VAR, SCHEMA_TTL_ENV_VAR,
    TENANT_ID_ENV_VAR, USER_ID_ENV_VAR,
};
use crate::error::{Error, Result};
use crate::ids::TenantId;
use crate::support::TracingLevel;

/// Runtime settings for the engine and its collaborators
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IntakeConfig {
    pub base_url:           String,
    pub tenant_id:          TenantId,
    pub user_id:            Option<String>,
    pub access_token:       Option<String>,
    pub schema_ttl:         Duration,
    pub request_timeout:    Duration,
    /// Retries of the aggregate fetch while the record is not yet visible
    pub fetch_retries:      u32,
    /// Also write the legacy application-level credit type
    pub credit_type_mirror: bool,
    pub log_level:          TracingLevel,
    /// Extra per-module filter directives layered over `log_level`
    pub log_filter:         Option<String>,
}

impl Default for IntakeConfig {
    fn default() -> Self {
        Self {
            base_url:           DEFAULT_BASE_URL.to_string(),
            tenant_id:          TenantId(DEFAULT_TENANT_ID),
            user_id:            None,
            access_token:       None,
            schema_ttl:         DEFAULT_SCHEMA_TTL,
            request_timeout:    DEFAULT_REQUEST_TIMEOUT,
            fetch_retries:      DEFAULT_FETCH_RETRIES,
            credit_type_mirror: false,
            log_level:          TracingLevel::Warn,
            log_filter:         None,
        }
    }
}

impl IntakeConfig {
    /// Load from the process environment
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Load through `lookup`, falling back to defaults for unset or blank variables
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |name: &str| {
            lookup(name)
                .map(|value| value.trim().to_string())
                .filter(|value| !value.is_empty())
        };
        let defaults = Self::default();

        Ok(Self {
            base_url:           get(BASE_URL_ENV_VAR).unwrap_or(defaults.base_url),
            tenant_id:          parse_var(TENANT_ID_ENV_VAR, get(TENANT_ID_ENV_VAR))?
                .map_or(defaults.tenant_id, TenantId),
            user_id:            get(USER_ID_ENV_VAR),
            access_token:       get(ACCESS_TOKEN_ENV_VAR),
            schema_ttl:         parse_var(SCHEMA_TTL_ENV_VAR, get(SCHEMA_TTL_ENV_VAR))?
                .map_or(defaults.schema_ttl, Duration::from_secs),
            request_timeout:    parse_var(REQUEST_TIMEOUT_ENV_VAR, get(REQUEST_TIMEOUT_ENV_VAR))?
                .map_or(defaults.request_timeout, Duration::from_secs),
            fetch_retries:      parse_var(FETCH_RETRIES_ENV_VAR, get(FETCH_RETRIES_ENV_VAR))?
                .unwrap_or(defaults.fetch_retries),
            credit_type_mirror: get(CREDIT_TYPE_MIRROR_ENV_VAR)
                .map(|value| parse_flag(CREDIT_TYPE_MIRROR_ENV_VAR, &value))
                .transpose()?
                .unwrap_or(defaults.credit_type_mirror),
            log_level:          parse_var(LOG_LEVEL_ENV_VAR, get(LOG_LEVEL_ENV_VAR))?
                .unwrap_or(defaults.log_level),
            log_filter:         get(LOG_FILTER_ENV_VAR),
        })
    }
}

fn parse_var<T>(name: &str, value: Option<String>) -> Result<Option<T>>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    value
        .map(|raw| {
            raw.parse::<T>()
                .map_err(|e| {
                    error_stack::Report::new(Error::Configuration(format!("{name}='{raw}': {e}")))
                })
        })
        .transpose()
}

fn parse_flag(name: &str, value: &str) -> Result<bool> {
    match value.to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Ok(true),
        "0" | "false" | "no" | "off" => Ok(false),
        _ => Err(Error::Configuration(format!("{name}='{value}': expected a boolean")).into()),
    }
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used, reason = "test code")]

    use std::collections::HashMap;

    use super::*;

    fn load(vars: &[(&str, &str)]) -> Result<IntakeConfig> {
        let vars: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| ((*k).to_string(), (*v).to_string()))
            .collect();
        IntakeConfig::from_lookup(|name| vars.get(name).cloned())
    }

    #[test]
    fn test_defaults_when_unset() {
        assert_eq!(load(&[]).unwrap(), IntakeConfig::default());
    }

    #[test]
    fn test_values_are_read() {
        let config = load(&[
            (BASE_URL_ENV_VAR, "https://api.example.test"),
            (TENANT_ID_ENV_VAR, "12"),
            (USER_ID_ENV_VAR, "99"),
            (SCHEMA_TTL_ENV_VAR, "60"),
            (FETCH_RETRIES_ENV_VAR, "0"),
            (CREDIT_TYPE_MIRROR_ENV_VAR, "true"),
            (LOG_LEVEL_ENV_VAR, "debug"),
            (LOG_FILTER_ENV_VAR, "credit_intake::reconcile=trace"),
        ])
        .unwrap();
        assert_eq!(config.base_url, "https://api.example.test");
        assert_eq!(config.tenant_id, TenantId(12));
        assert_eq!(config.user_id.as_deref(), Some("99"));
        assert_eq!(config.schema_ttl, Duration::from_secs(60));
        assert_eq!(config.fetch_retries, 0);
        assert!(config.credit_type_mirror);
        assert_eq!(config.log_level, TracingLevel::Debug);
        assert_eq!(config.log_filter.as_deref(), Some("credit_intake::reconcile=trace"));
    }

    #[test]
    fn test_invalid_values_are_configuration_errors() {
        let error = load(&[(TENANT_ID_ENV_VAR, "acme")]).unwrap_err();
        assert!(matches!(error.current_context(), Error::Configuration(_)));
        assert!(load(&[(CREDIT_TYPE_MIRROR_ENV_VAR, "maybe")]).is_err());
        assert!(load(&[(LOG_LEVEL_ENV_VAR, "loud")]).is_err());
    }

    #[test]
    fn test_blank_values_use_defaults() {
        let config = load(&[(BASE_URL_ENV_VAR, "   ")]).unwrap();
        assert_eq!(config.base_url, DEFAULT_BASE_URL);
    }
}
