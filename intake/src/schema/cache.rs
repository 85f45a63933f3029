//! TTL cache of entity schemas
//!
//! Entries are keyed by `(entity, tenant)`. Each key owns an async slot;
//! the first caller to find the slot stale fetches while holding it, and
//! concurrent callers for the same key wait on the slot and read the fresh
//! entry instead of fetching again. Failed fetches leave the slot untouched.

use std::sync::Arc;
use std::time::Duration;

use dashmap::DashMap;
use error_stack::ResultExt;
use tokio::sync::Mutex;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use super::fallback::fallback_schema;
use super::normalize::normalize_schema;
use super::types::{EntityName, SchemaDescriptor};
use crate::client::IntakeBackend;
use crate::error::{Error, Result};
use crate::ids::TenantId;

type SchemaKey = (EntityName, TenantId);

#[derive(Debug, Clone)]
struct CachedSchema {
    schema:     Arc<SchemaDescriptor>,
    fetched_at: Instant,
}

/// Injected schema cache shared by every session of a process
pub struct SchemaCache {
    backend: Arc<dyn IntakeBackend>,
    ttl:     Duration,
    slots:   DashMap<SchemaKey, Arc<Mutex<Option<CachedSchema>>>>,
}

impl SchemaCache {
    /// Create an empty cache in front of `backend`
    pub fn new(backend: Arc<dyn IntakeBackend>, ttl: Duration) -> Self {
        Self {
            backend,
            ttl,
            slots: DashMap::new(),
        }
    }

    pub const fn ttl(&self) -> Duration {
        self.ttl
    }

    /// Schema for `entity` under `tenant`, fetched on miss or expiry
    pub async fn get(
        &self,
        entity: EntityName,
        tenant: TenantId,
        cancel: &CancellationToken,
    ) -> Result<Arc<SchemaDescriptor>> {
        tokio::select! {
            biased;
            () = cancel.cancelled() => Err(Error::cancelled("schema load").into()),
            result = self.get_inner(entity, tenant) => result,
        }
    }

    /// Like [`Self::get`], but serves the built-in fixed fields when loading fails
    ///
    /// The fallback is never cached, so the next call retries the fetch.
    /// Cancellation is still reported as an error.
    pub async fn get_or_fallback(
        &self,
        entity: EntityName,
        tenant: TenantId,
        cancel: &CancellationToken,
    ) -> Result<Arc<SchemaDescriptor>> {
        match self.get(entity, tenant, cancel).await {
            Ok(schema) => Ok(schema),
            Err(report) if matches!(report.current_context(), Error::Cancelled(_)) => Err(report),
            Err(report) => {
                warn!("Using built-in schema for '{entity}' (tenant {tenant}): {report:?}");
                Ok(Arc::new(fallback_schema(entity)))
            }
        }
    }

    async fn get_inner(&self, entity: EntityName, tenant: TenantId) -> Result<Arc<SchemaDescriptor>> {
        // Clone the slot out so no map guard is held across an await
        let slot = self
            .slots
            .entry((entity, tenant))
            .or_default()
            .value()
            .clone();

        let mut entry = slot.lock().await;
        if let Some(cached) = entry.as_ref()
            && cached.fetched_at.elapsed() < self.ttl
        {
            debug!("Schema cache hit for '{entity}' (tenant {tenant})");
            return Ok(Arc::clone(&cached.schema));
        }

        debug!("Schema cache miss for '{entity}' (tenant {tenant}), fetching");
        let raw = self
            .backend
            .fetch_schema(entity, tenant)
            .await
            .change_context(Error::schema_load(entity.as_ref(), "fetch failed"))
            .attach(format!("Tenant: {tenant}"))?;
        let schema = Arc::new(normalize_schema(entity, raw)?);

        *entry = Some(CachedSchema {
            schema:     Arc::clone(&schema),
            fetched_at: Instant::now(),
        });
        Ok(schema)
    }
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used, reason = "test code")]

    use serde_json::json;

    use super::*;
    use crate::testing::{BackendCall, MockBackend};

    const TTL: Duration = Duration::from_secs(300);

    fn cache_with(backend: &Arc<MockBackend>) -> SchemaCache {
        SchemaCache::new(Arc::clone(backend) as Arc<dyn IntakeBackend>, TTL)
    }

    fn applicant_schema() -> serde_json::Value {
        json!({"fixed_fields": [{"key": "first_name", "type": "string", "required": true}]})
    }

    #[tokio::test(start_paused = true)]
    async fn test_hit_before_ttl_and_refetch_after() {
        let backend = Arc::new(MockBackend::new());
        backend.set_schema(EntityName::Applicant, applicant_schema());
        let cache = cache_with(&backend);
        let cancel = CancellationToken::new();
        let tenant = TenantId(1);

        cache.get(EntityName::Applicant, tenant, &cancel).await.unwrap();
        assert_eq!(backend.schema_fetches(EntityName::Applicant), 1);

        tokio::time::advance(TTL - Duration::from_millis(1)).await;
        cache.get(EntityName::Applicant, tenant, &cancel).await.unwrap();
        assert_eq!(backend.schema_fetches(EntityName::Applicant), 1);

        tokio::time::advance(Duration::from_millis(2)).await;
        cache.get(EntityName::Applicant, tenant, &cancel).await.unwrap();
        assert_eq!(backend.schema_fetches(EntityName::Applicant), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_concurrent_callers_share_one_fetch() {
        let backend = Arc::new(MockBackend::new());
        backend.set_schema(EntityName::Applicant, applicant_schema());
        backend.set_schema_delay(Duration::from_millis(50));
        let cache = cache_with(&backend);
        let cancel = CancellationToken::new();

        let (a, b, c) = tokio::join!(
            cache.get(EntityName::Applicant, TenantId(1), &cancel),
            cache.get(EntityName::Applicant, TenantId(1), &cancel),
            cache.get(EntityName::Applicant, TenantId(1), &cancel),
        );
        assert!(Arc::ptr_eq(&a.unwrap(), &b.unwrap()));
        assert!(c.is_ok());
        assert_eq!(backend.schema_fetches(EntityName::Applicant), 1);
    }

    #[tokio::test]
    async fn test_tenants_are_cached_separately() {
        let backend = Arc::new(MockBackend::new());
        backend.set_schema(EntityName::Applicant, applicant_schema());
        let cache = cache_with(&backend);
        let cancel = CancellationToken::new();

        cache.get(EntityName::Applicant, TenantId(1), &cancel).await.unwrap();
        cache.get(EntityName::Applicant, TenantId(2), &cancel).await.unwrap();
        assert_eq!(backend.schema_fetches(EntityName::Applicant), 2);
    }

    #[tokio::test]
    async fn test_failures_are_not_cached() {
        let backend = Arc::new(MockBackend::new());
        let cache = cache_with(&backend);
        let cancel = CancellationToken::new();

        let error = cache
            .get(EntityName::Location, TenantId(1), &cancel)
            .await
            .unwrap_err();
        assert!(matches!(error.current_context(), Error::SchemaLoad { .. }));

        backend.set_schema(EntityName::Location, json!({"fixed_fields": [{"key": "city"}]}));
        let schema = cache.get(EntityName::Location, TenantId(1), &cancel).await.unwrap();
        assert_eq!(schema.fixed_fields[0].key, "city");
        assert_eq!(backend.schema_fetches(EntityName::Location), 2);
    }

    #[tokio::test]
    async fn test_fallback_served_on_failure() {
        let backend = Arc::new(MockBackend::new());
        let cache = cache_with(&backend);
        let cancel = CancellationToken::new();

        let schema = cache
            .get_or_fallback(EntityName::FinancialInfo, TenantId(1), &cancel)
            .await
            .unwrap();
        assert!(schema.fixed_fields.iter().any(|f| f.key == "monthly_income"));

        cache
            .get_or_fallback(EntityName::FinancialInfo, TenantId(1), &cancel)
            .await
            .unwrap();
        assert_eq!(backend.schema_fetches(EntityName::FinancialInfo), 2);
    }

    #[tokio::test]
    async fn test_cancelled_load() {
        let backend = Arc::new(MockBackend::new());
        backend.set_schema(EntityName::Applicant, applicant_schema());
        let cache = cache_with(&backend);
        let cancel = CancellationToken::new();
        cancel.cancel();

        let error = cache
            .get_or_fallback(EntityName::Applicant, TenantId(1), &cancel)
            .await
            .unwrap_err();
        assert!(matches!(error.current_context(), Error::Cancelled(_)));
        assert!(!backend.calls().contains(&BackendCall::FetchSchema(EntityName::Applicant)));
    }
}
