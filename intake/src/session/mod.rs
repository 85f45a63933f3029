//! Edit session: one subject's record from open to save or cancel
//!
//! A session holds the snapshot fetched at open and a working copy. Field
//! changes only touch the working copy. Saving validates, reconciles the
//! reference list, sends the aggregate update and then replaces both
//! copies with a fresh fetch.

use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;

use serde::Serialize;
use serde_json::Value;
use strum::IntoEnumIterator;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::client::IntakeBackend;
use crate::conditional::ConditionalEvaluator;
use crate::config::IntakeConfig;
use crate::constants::{CREDIT_TYPE_FIELD, MAX_FETCH_BACKOFF};
use crate::credit::{CreditRouter, CreditTypeTable, type_containers_path, type_selector_path};
use crate::error::Result;
use crate::ids::{ReferenceId, SubjectId, TenantId};
use crate::payload::build_aggregate_payload;
use crate::reconcile::{
    OperationKind, OperationOutcome, OutcomeStatus, ReconcileReport, cancellable, diff_references,
    execute_plan, is_cancelled,
};
use crate::record::{AggregateRecord, FieldPath, Reference, set_value};
use crate::resolve::{FieldPathResolver, ResolvedPath, RouteRegistry};
use crate::schema::{EntityName, SchemaCache, SchemaSet, value_text};
use crate::validate::validate_record;

/// Where a change landed and which dependents it cleared
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ChangeOutcome {
    pub path:    FieldPath,
    pub cleared: Vec<String>,
}

/// Result of a completed save
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct SaveReport {
    pub references: ReconcileReport,
}

/// Editing state for one subject
pub struct EditSession {
    backend:       Arc<dyn IntakeBackend>,
    subject:       SubjectId,
    tenant:        TenantId,
    fetch_retries: u32,
    schemas:       SchemaSet,
    resolver:      FieldPathResolver,
    original:      AggregateRecord,
    working:       AggregateRecord,
}

impl std::fmt::Debug for EditSession {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EditSession")
            .field("subject", &self.subject)
            .field("tenant", &self.tenant)
            .field("dirty", &self.is_dirty())
            .finish_non_exhaustive()
    }
}

impl EditSession {
    /// Load schemas and the subject's record
    ///
    /// Schemas that fail to load are replaced by the built-in fields. The
    /// record fetch is retried while the store reports it as not found.
    pub async fn open(
        backend: Arc<dyn IntakeBackend>,
        cache: &SchemaCache,
        config: &IntakeConfig,
        subject: SubjectId,
        cancel: &CancellationToken,
    ) -> Result<Self> {
        let tenant = config.tenant_id;
        let mut schemas = SchemaSet::new();
        for entity in EntityName::iter() {
            schemas.insert(cache.get_or_fallback(entity, tenant, cancel).await?);
        }

        let mut table = CreditTypeTable::default();
        if let Some(schema) = schemas.get(EntityName::CreditApplication) {
            table.extend_from_schema(schema);
        }
        let resolver = FieldPathResolver::new(
            RouteRegistry::default(),
            CreditRouter::new(Arc::new(table), config.credit_type_mirror),
        );

        let original =
            fetch_aggregate_with_retry(backend.as_ref(), subject, tenant, config.fetch_retries, cancel)
                .await?;
        info!("Opened edit session for subject {subject} (tenant {tenant})");

        Ok(Self {
            backend,
            subject,
            tenant,
            fetch_retries: config.fetch_retries,
            schemas,
            resolver,
            working: original.clone(),
            original,
        })
    }

    pub const fn subject(&self) -> SubjectId {
        self.subject
    }

    /// Working copy with every change applied so far
    pub const fn record(&self) -> &AggregateRecord {
        &self.working
    }

    /// Snapshot taken at open or at the last save
    pub const fn original(&self) -> &AggregateRecord {
        &self.original
    }

    pub const fn schemas(&self) -> &SchemaSet {
        &self.schemas
    }

    pub const fn resolver(&self) -> &FieldPathResolver {
        &self.resolver
    }

    pub fn is_dirty(&self) -> bool {
        self.working != self.original
    }

    /// Storage path of `key` in the working copy
    pub fn resolve(&self, key: &str) -> ResolvedPath {
        self.resolver.resolve(&self.working, key, &self.schemas)
    }

    /// Current value of `key` in the working copy
    pub fn value(&self, key: &str) -> Option<Value> {
        self.working.get_value(&self.resolve(key).path)
    }

    /// Apply one field change to the working copy
    ///
    /// Dependents hidden by the new value are cleared before the value
    /// itself is written. A credit-type change is routed into the
    /// application's detail block; dependents stored inside per-type
    /// containers are kept so switching back restores them.
    pub fn apply_change(&mut self, key: &str, value: Value) -> Result<ChangeOutcome> {
        let evaluator = ConditionalEvaluator::new(&self.resolver, &self.schemas);
        let mut record = self.working.clone();
        let mut cleared = Vec::new();

        if key == CREDIT_TYPE_FIELD {
            if let Some(schema) = self.schemas.get(EntityName::CreditApplication) {
                let containers = type_containers_path();
                let hidden: Vec<String> = evaluator
                    .compute_cleared(schema, key, &value, &record)
                    .into_iter()
                    .filter(|field| {
                        !self
                            .resolver
                            .resolve(&record, field, &self.schemas)
                            .path
                            .starts_with(&containers)
                    })
                    .collect();
                record = evaluator.clear_fields(schema, &hidden, &record)?;
                cleared.extend(hidden);
            }
            record = self.resolver.credit().route(&record, &value_text(&value))?;
            self.working = record;
            return Ok(ChangeOutcome {
                path: type_selector_path(),
                cleared,
            });
        }

        for schema in self.schemas.iter() {
            let (updated, keys) = evaluator.apply_cleanup(schema, key, &value, &record)?;
            record = updated;
            cleared.extend(keys);
        }

        let resolved = self.resolver.resolve(&record, key, &self.schemas);
        debug!("Setting '{key}' at {} ({})", resolved.path, resolved.source);
        self.working = set_value(&record, &resolved.path, value)?;
        Ok(ChangeOutcome {
            path: resolved.path,
            cleared,
        })
    }

    /// Persist the working copy
    ///
    /// Validation failures stop the save before any network call. Reference
    /// operations are then issued, and the aggregate update is sent once they
    /// have all completed, whatever their individual outcome. A failed
    /// aggregate update keeps the working copy and carries the reference
    /// report as an attachment.
    pub async fn save(&mut self, cancel: &CancellationToken) -> Result<SaveReport> {
        validate_record(&self.working, &self.schemas, &self.resolver)?;

        let plan = diff_references(&self.original.references(), &self.working.references());
        let references = execute_plan(self.backend.as_ref(), self.subject, &plan, cancel).await?;
        self.adopt_assigned_identities(&references)?;

        let payload = build_aggregate_payload(&self.working);
        let update = cancellable(
            cancel,
            "aggregate update",
            self.backend.update_aggregate(self.subject, &payload),
        )
        .await;
        if let Err(error) = update {
            warn!("Aggregate update for subject {} failed: {error:?}", self.subject);
            let summary = serde_json::to_string(&references).unwrap_or_default();
            return Err(error.attach(format!("Reference operations: {summary}")));
        }

        info!(
            "Saved subject {}: {} reference operation(s), {} failed",
            self.subject,
            references.outcomes.len(),
            references.count(OutcomeStatus::Failed)
        );
        self.reload(cancel).await?;
        Ok(SaveReport { references })
    }

    /// Delete one persisted reference right away, then refresh the reference list
    ///
    /// Unsaved edits to the remaining references and unsaved new references
    /// are kept. A rejected delete is a failed outcome and leaves both copies
    /// untouched; cancellation and a failed refresh are errors.
    pub async fn delete_reference(
        &mut self,
        identity: ReferenceId,
        cancel: &CancellationToken,
    ) -> Result<OperationOutcome> {
        let deleted = cancellable(
            cancel,
            "reference delete",
            self.backend.delete_reference(self.subject, identity),
        )
        .await;
        match deleted {
            Ok(()) => debug!("Deleted reference {identity} of subject {}", self.subject),
            Err(error) if is_cancelled(&error) => return Err(error),
            Err(error) => {
                warn!("Deleting reference {identity} failed: {error:?}");
                return Ok(OperationOutcome::failed(
                    OperationKind::Delete,
                    Some(identity),
                    error.current_context().to_string(),
                ));
            }
        }

        let listing = cancellable(
            cancel,
            "reference listing",
            self.backend.list_references(self.subject),
        )
        .await?;
        let remote = listing.identities();

        let mut working: Vec<Reference> = self
            .working
            .references()
            .into_iter()
            .filter(|reference| reference.identity.is_none_or(|id| remote.contains(&id)))
            .collect();
        let known: HashSet<ReferenceId> =
            working.iter().filter_map(|reference| reference.identity).collect();
        working.extend(
            listing
                .references
                .iter()
                .filter(|reference| reference.identity.is_some_and(|id| !known.contains(&id)))
                .cloned(),
        );

        self.original = self.original.with_references(&listing.references)?;
        self.working = self.working.with_references(&working)?;
        Ok(OperationOutcome::applied(OperationKind::Delete, Some(identity)))
    }

    /// Discard every unsaved change and refetch the record
    pub async fn cancel(&mut self, cancel: &CancellationToken) -> Result<()> {
        debug!("Discarding changes for subject {}", self.subject);
        self.reload(cancel).await
    }

    async fn reload(&mut self, cancel: &CancellationToken) -> Result<()> {
        let fresh = fetch_aggregate_with_retry(
            self.backend.as_ref(),
            self.subject,
            self.tenant,
            self.fetch_retries,
            cancel,
        )
        .await?;
        self.working = fresh.clone();
        self.original = fresh;
        Ok(())
    }

    /// Record identities assigned by applied adds so a retried save updates instead of re-adding
    fn adopt_assigned_identities(&mut self, report: &ReconcileReport) -> Result<()> {
        let mut references = self.working.references();
        let mut changed = false;
        for outcome in &report.outcomes {
            if outcome.kind == OperationKind::Add
                && outcome.status == OutcomeStatus::Applied
                && let (Some(position), Some(identity)) = (outcome.position, outcome.identity)
                && let Some(reference) = references.get_mut(position)
            {
                reference.identity = Some(identity);
                changed = true;
            }
        }
        if changed {
            self.working = self.working.with_references(&references)?;
        }
        Ok(())
    }
}

/// Fetch the aggregate, retrying while the store reports it as not found
///
/// Waits 1s, 2s, 3s, ... between attempts, capped at [`MAX_FETCH_BACKOFF`].
pub async fn fetch_aggregate_with_retry(
    backend: &dyn IntakeBackend,
    subject: SubjectId,
    tenant: TenantId,
    retries: u32,
    cancel: &CancellationToken,
) -> Result<AggregateRecord> {
    let mut attempt = 0;
    loop {
        let fetched = cancellable(
            cancel,
            "aggregate fetch",
            backend.fetch_aggregate(subject, tenant),
        )
        .await;
        match fetched {
            Ok(raw) => return AggregateRecord::from_value(raw),
            Err(error) if error.current_context().is_not_found() && attempt < retries => {
                attempt += 1;
                let delay = fetch_backoff(attempt);
                debug!("Record of subject {subject} not found yet, retry {attempt}/{retries} in {delay:?}");
                cancellable(cancel, "aggregate fetch", async {
                    tokio::time::sleep(delay).await;
                    Ok(())
                })
                .await?;
            }
            Err(error) => return Err(error),
        }
    }
}

fn fetch_backoff(attempt: u32) -> Duration {
    Duration::from_secs(u64::from(attempt)).min(MAX_FETCH_BACKOFF)
}
