//! Identifier newtypes for subjects, tenants and remote references
//!
//! Remote collaborators are inconsistent about whether ids travel as JSON
//! numbers or numeric strings, so every id here deserializes from either.

use std::fmt;
use std::ops::Deref;

use serde::de::{self, Visitor};
use serde::{Deserialize, Deserializer, Serialize};

macro_rules! numeric_id {
    ($(#[$meta:meta])* $name:ident, $what:literal) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
        #[serde(transparent)]
        pub struct $name(pub u64);

        impl<'de> Deserialize<'de> for $name {
            fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
            where
                D: Deserializer<'de>,
            {
                deserialize_numeric_id(deserializer, $what).map(Self)
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}", self.0)
            }
        }

        impl Deref for $name {
            type Target = u64;

            fn deref(&self) -> &Self::Target {
                &self.0
            }
        }

        impl From<u64> for $name {
            fn from(value: u64) -> Self {
                Self(value)
            }
        }
    };
}

numeric_id!(
    /// Applicant whose aggregate record is being edited
    SubjectId,
    "subject id"
);

numeric_id!(
    /// Tenant (company) that owns schemas and records
    TenantId,
    "tenant id"
);

numeric_id!(
    /// Remote identity of a persisted reference
    ///
    /// Zero is a valid identity. It is never treated as "unassigned" and is
    /// sent to collaborators unchanged.
    ReferenceId,
    "reference identity"
);

/// Deserialize a non-negative integer id from a number or a numeric string
fn deserialize_numeric_id<'de, D>(deserializer: D, what: &'static str) -> Result<u64, D::Error>
where
    D: Deserializer<'de>,
{
    struct IdVisitor(&'static str);

    impl Visitor<'_> for IdVisitor {
        type Value = u64;

        fn expecting(&self, formatter: &mut fmt::Formatter) -> fmt::Result {
            write!(formatter, "a {} as a non-negative integer or string", self.0)
        }

        fn visit_u64<E>(self, value: u64) -> Result<u64, E>
        where
            E: de::Error,
        {
            Ok(value)
        }

        fn visit_i64<E>(self, value: i64) -> Result<u64, E>
        where
            E: de::Error,
        {
            u64::try_from(value).map_err(|_| E::custom(format!("{} {value} is negative", self.0)))
        }

        fn visit_f64<E>(self, value: f64) -> Result<u64, E>
        where
            E: de::Error,
        {
            if value.fract() == 0.0 && value >= 0.0 && value <= u64::MAX as f64 {
                #[allow(
                    clippy::cast_possible_truncation,
                    clippy::cast_sign_loss,
                    clippy::cast_precision_loss,
                    reason = "range and fraction checked above"
                )]
                let id = value as u64;
                Ok(id)
            } else {
                Err(E::custom(format!("{} {value} is not a whole number", self.0)))
            }
        }

        fn visit_str<E>(self, value: &str) -> Result<u64, E>
        where
            E: de::Error,
        {
            value
                .trim()
                .parse::<u64>()
                .map_err(|_| E::custom(format!("invalid {} string: {value}", self.0)))
        }
    }

    deserializer.deserialize_any(IdVisitor(what))
}
