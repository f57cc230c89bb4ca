use serde::{Serialize, Serializer};
use uuid::Uuid;

use crate::model::TripStatus;
use crate::rates::SettlementBreakdown;
use crate::store::StoreError;

use super::reconciliation::ReconciliationTask;
use super::steps::SettlementStep;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FailedStep {
    pub step: SettlementStep,
    pub attempts: u32,
    #[serde(serialize_with = "display")]
    pub error: StoreError,
}

/// Outcome of one saga run.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SettlementResult {
    pub trip_id: String,
    pub breakdown: SettlementBreakdown,
    /// Steps that succeeded in this run, in order.
    pub committed_steps: Vec<SettlementStep>,
    pub failed_step: Option<FailedStep>,
    /// Present whenever `failed_step` is.
    pub reconciliation: Option<ReconciliationTask>,
    /// Set when the reconciliation task itself could not be stored.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reconciliation_error: Option<String>,
}

impl SettlementResult {
    pub fn is_complete(&self) -> bool {
        self.failed_step.is_none()
    }
}

/// What resuming one reconciliation task did.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum ResumeOutcome {
    /// The trip was still ongoing and the remaining steps ran.
    Resumed(SettlementResult),
    /// Another run already completed the trip. Nothing was written and the
    /// task was resolved.
    AlreadySettled { task_id: Uuid, trip_id: String },
    /// The trip was ended manually or cancelled after the saga stopped.
    /// Nothing was written and the task was resolved; `skipped_steps` never
    /// ran.
    TripClosed {
        task_id: Uuid,
        trip_id: String,
        status: TripStatus,
        skipped_steps: Vec<SettlementStep>,
    },
    /// The trip could not be read. The task is left for a later run.
    Deferred {
        task_id: Uuid,
        trip_id: String,
        #[serde(serialize_with = "display")]
        error: StoreError,
    },
}

impl ResumeOutcome {
    /// Whether nothing is left to do for the task's trip.
    pub fn is_complete(&self) -> bool {
        match self {
            Self::Resumed(result) => result.is_complete(),
            Self::AlreadySettled { .. } => true,
            Self::TripClosed { .. } | Self::Deferred { .. } => false,
        }
    }

    pub fn settlement(&self) -> Option<&SettlementResult> {
        match self {
            Self::Resumed(result) => Some(result),
            _ => None,
        }
    }
}

fn display<S: Serializer>(error: &StoreError, ser: S) -> Result<S::Ok, S::Error> {
    ser.collect_str(error)
}
