use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::steps::{SettlementPlan, SettlementStep};

/// The unfinished remainder of a settlement saga.
///
/// `remaining_steps[0]` is the step that failed; the rest never ran.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReconciliationTask {
    pub id: Uuid,
    pub trip_id: String,
    pub plan: SettlementPlan,
    pub remaining_steps: Vec<SettlementStep>,
    pub last_error: String,
    /// Saga runs that have stopped on this task, including the first.
    pub attempts: u32,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl ReconciliationTask {
    pub fn new(
        plan: SettlementPlan,
        remaining_steps: Vec<SettlementStep>,
        last_error: impl Into<String>,
    ) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4(),
            trip_id: plan.trip_id.clone(),
            plan,
            remaining_steps,
            last_error: last_error.into(),
            attempts: 1,
            created_at: now,
            updated_at: now,
        }
    }

    /// Same task after another run stopped on it.
    pub fn rescheduled(
        self,
        remaining_steps: Vec<SettlementStep>,
        last_error: impl Into<String>,
    ) -> Self {
        Self {
            remaining_steps,
            last_error: last_error.into(),
            attempts: self.attempts + 1,
            updated_at: Utc::now(),
            ..self
        }
    }

    pub fn failed_step(&self) -> Option<SettlementStep> {
        self.remaining_steps.first().copied()
    }
}
