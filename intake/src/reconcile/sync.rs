//! Issue a reconcile plan against the remote reference store
//!
//! Adds run first, one at a time. Identities targeted by updates are then
//! re-verified with a single listing call, and only identities that still
//! exist are updated. Each operation is independent: a failure is recorded
//! in the report and the remaining operations still run.

use std::future::Future;

use serde::Serialize;
use strum::{AsRefStr, Display};
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use super::diff::ReconcilePlan;
use crate::client::IntakeBackend;
use crate::error::{Error, Result};
use crate::ids::{ReferenceId, SubjectId};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Display, AsRefStr)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum OperationKind {
    Add,
    Update,
    Delete,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Display, AsRefStr)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum OutcomeStatus {
    Applied,
    /// Not attempted, e.g. the identity disappeared remotely
    Skipped,
    Failed,
}

/// Result of one remote reference operation
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct OperationOutcome {
    pub kind:     OperationKind,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub identity: Option<ReferenceId>,
    /// Position in the edited list, for adds
    #[serde(skip_serializing_if = "Option::is_none")]
    pub position: Option<usize>,
    pub status:   OutcomeStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message:  Option<String>,
}

impl OperationOutcome {
    pub const fn applied(kind: OperationKind, identity: Option<ReferenceId>) -> Self {
        Self {
            kind,
            identity,
            position: None,
            status: OutcomeStatus::Applied,
            message: None,
        }
    }

    pub fn failed(
        kind: OperationKind,
        identity: Option<ReferenceId>,
        message: impl Into<String>,
    ) -> Self {
        Self {
            kind,
            identity,
            position: None,
            status: OutcomeStatus::Failed,
            message: Some(message.into()),
        }
    }

    fn skipped(kind: OperationKind, identity: ReferenceId, message: impl Into<String>) -> Self {
        Self {
            kind,
            identity: Some(identity),
            position: None,
            status: OutcomeStatus::Skipped,
            message: Some(message.into()),
        }
    }

    #[must_use]
    const fn at(mut self, position: usize) -> Self {
        self.position = Some(position);
        self
    }
}

/// Per-operation outcomes of one reconcile run, in issue order
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ReconcileReport {
    pub outcomes: Vec<OperationOutcome>,
}

impl ReconcileReport {
    pub fn count(&self, status: OutcomeStatus) -> usize {
        self.outcomes
            .iter()
            .filter(|outcome| outcome.status == status)
            .count()
    }

    pub fn has_failures(&self) -> bool {
        self.count(OutcomeStatus::Failed) > 0
    }

    pub fn failures(&self) -> impl Iterator<Item = &OperationOutcome> {
        self.outcomes
            .iter()
            .filter(|outcome| outcome.status == OutcomeStatus::Failed)
    }

    pub fn push(&mut self, outcome: OperationOutcome) {
        self.outcomes.push(outcome);
    }
}

/// Run `future` unless `cancel` fires first
pub(crate) async fn cancellable<T, F>(
    cancel: &CancellationToken,
    operation: &str,
    future: F,
) -> Result<T>
where
    F: Future<Output = Result<T>>,
{
    tokio::select! {
        biased;
        () = cancel.cancelled() => Err(Error::cancelled(operation).into()),
        result = future => result,
    }
}

/// Issue `plan` for `subject`
///
/// Only cancellation is returned as an error; every other failure is an
/// outcome in the report. Operations that completed before cancellation
/// stay committed.
pub async fn execute_plan(
    backend: &dyn IntakeBackend,
    subject: SubjectId,
    plan: &ReconcilePlan,
    cancel: &CancellationToken,
) -> Result<ReconcileReport> {
    let mut report = ReconcileReport::default();

    for add in &plan.to_add {
        let result = cancellable(
            cancel,
            "reference add",
            backend.add_reference(subject, &add.payload),
        )
        .await;
        let outcome = match result {
            Ok(identity) => {
                debug!("Added reference at position {} as {identity:?}", add.position);
                OperationOutcome::applied(OperationKind::Add, identity)
            }
            Err(error) if is_cancelled(&error) => return Err(error),
            Err(error) => {
                warn!("Adding reference at position {} failed: {error:?}", add.position);
                OperationOutcome::failed(
                    OperationKind::Add,
                    None,
                    error.current_context().to_string(),
                )
            }
        };
        report.push(outcome.at(add.position));
    }

    if plan.to_update.is_empty() {
        return Ok(report);
    }

    let listing = cancellable(cancel, "reference listing", backend.list_references(subject)).await;
    let remote = match listing {
        Ok(listing) => listing.identities(),
        Err(error) if is_cancelled(&error) => return Err(error),
        Err(error) => {
            warn!("Could not verify reference identities, skipping updates: {error:?}");
            let message = format!("identity verification failed: {}", error.current_context());
            for update in &plan.to_update {
                report.push(OperationOutcome::failed(
                    OperationKind::Update,
                    Some(update.identity),
                    message.clone(),
                ));
            }
            return Ok(report);
        }
    };

    for update in &plan.to_update {
        if !remote.contains(&update.identity) {
            let error = Error::IdentityResolution {
                identity: update.identity,
            };
            warn!("Skipping update: {error}");
            report.push(OperationOutcome::skipped(
                OperationKind::Update,
                update.identity,
                error.to_string(),
            ));
            continue;
        }

        let result = cancellable(
            cancel,
            "reference update",
            backend.update_reference(subject, update.identity, &update.changes),
        )
        .await;
        let outcome = match result {
            Ok(()) => OperationOutcome::applied(OperationKind::Update, Some(update.identity)),
            Err(error) if is_cancelled(&error) => return Err(error),
            Err(error) => {
                warn!("Updating reference {} failed: {error:?}", update.identity);
                OperationOutcome::failed(
                    OperationKind::Update,
                    Some(update.identity),
                    error.current_context().to_string(),
                )
            }
        };
        report.push(outcome);
    }

    Ok(report)
}

pub(crate) fn is_cancelled(report: &error_stack::Report<Error>) -> bool {
    matches!(report.current_context(), Error::Cancelled(_))
}
