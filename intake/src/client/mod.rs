//! Collaborator endpoints: the backend seam and its HTTP implementation

mod http_client;
mod types;

use async_trait::async_trait;
use serde_json::{Map, Value};

pub use http_client::IntakeHttpClient;
pub use types::{ApiEnvelope, ReferenceListing, identity_from_response};

use crate::error::Result;
use crate::ids::{ReferenceId, SubjectId, TenantId};
use crate::schema::EntityName;

/// Remote operations the engine depends on
///
/// Every call is independent; nothing here is transactional across calls.
#[async_trait]
pub trait IntakeBackend: Send + Sync {
    /// Raw schema payload for `entity` under `tenant`
    async fn fetch_schema(&self, entity: EntityName, tenant: TenantId) -> Result<Value>;

    /// Full aggregate record of `subject`
    async fn fetch_aggregate(&self, subject: SubjectId, tenant: TenantId) -> Result<Value>;

    /// Aggregate-level update built by the payload builders
    async fn update_aggregate(&self, subject: SubjectId, payload: &Value) -> Result<Value>;

    /// Create a reference, returning the identity the store assigned if it reported one
    async fn add_reference(
        &self,
        subject: SubjectId,
        reference: &Map<String, Value>,
    ) -> Result<Option<ReferenceId>>;

    /// Update one persisted reference
    async fn update_reference(
        &self,
        subject: SubjectId,
        identity: ReferenceId,
        updates: &Map<String, Value>,
    ) -> Result<()>;

    /// Delete one persisted reference
    async fn delete_reference(&self, subject: SubjectId, identity: ReferenceId) -> Result<()>;

    /// Current remote references of `subject`
    async fn list_references(&self, subject: SubjectId) -> Result<ReferenceListing>;
}
