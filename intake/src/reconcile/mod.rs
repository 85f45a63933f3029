//! Reference list reconciliation: diff the edited list, then issue the plan

mod diff;
mod sync;

pub use diff::{ReconcilePlan, ReferenceAdd, ReferenceUpdate, diff_references};
pub(crate) use sync::{cancellable, is_cancelled};
pub use sync::{
    OperationKind, OperationOutcome, OutcomeStatus, ReconcileReport, execute_plan,
};
