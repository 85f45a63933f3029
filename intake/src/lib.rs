//! Schema-driven field resolution and reconciliation engine for credit-application intake
//!
//! Entity schemas declare fixed and dynamic fields. The engine maps a flat
//! field key onto a location in the nested aggregate record, clears fields
//! hidden by a conditional trigger, keeps per-credit-type detail containers
//! apart and reconciles the edited reference list against a remote store
//! that only offers per-item create, update and delete calls.
//!
//! [`EditSession`] ties these together for one subject. The free functions
//! re-exported here are the same operations with built-in defaults.

pub mod client;
pub mod conditional;
pub mod config;
pub mod constants;
pub mod credit;
pub mod error;
pub mod ids;
mod json_object;
pub mod payload;
pub mod reconcile;
pub mod record;
pub mod resolve;
pub mod schema;
pub mod session;
pub mod support;
#[cfg(test)]
mod testing;
pub mod validate;

pub use client::{IntakeBackend, IntakeHttpClient};
pub use conditional::{ConditionalEvaluator, apply_conditional_cleanup, compute_cleared};
pub use config::IntakeConfig;
pub use credit::route_type_selector;
pub use error::{Error, Result, ValidationError};
pub use ids::{ReferenceId, SubjectId, TenantId};
pub use payload::build_aggregate_payload;
pub use reconcile::{ReconcilePlan, ReconcileReport, diff_references, execute_plan};
pub use record::{AggregateRecord, FieldPath, Reference, set_value};
pub use resolve::{FieldPathResolver, ResolvedPath, resolve_path};
pub use schema::{EntityName, SchemaCache, SchemaDescriptor};
pub use session::{ChangeOutcome, EditSession, SaveReport};
pub use validate::validate_record;
