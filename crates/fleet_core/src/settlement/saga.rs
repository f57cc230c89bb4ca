use std::thread;
use std::time::Duration;

use crate::model::{ConsignmentStatus, DriverStatus, TripStatus, VehicleStatus};
use crate::store::{FleetStore, StoreError};

use super::outcome::{FailedStep, SettlementResult};
use super::reconciliation::ReconciliationTask;
use super::steps::{SettlementPlan, SettlementStep};

pub(super) struct SagaRunner<'a> {
    pub(super) store: &'a dyn FleetStore,
    pub(super) max_attempts: u32,
    pub(super) backoff: Duration,
}

impl SagaRunner<'_> {
    /// Run `steps` in order, stopping at the first step that exhausts its
    /// attempts. `existing` is the task being resumed, if any.
    pub(super) fn run(
        &self,
        plan: &SettlementPlan,
        steps: &[SettlementStep],
        existing: Option<ReconciliationTask>,
    ) -> SettlementResult {
        let mut committed = Vec::with_capacity(steps.len());

        for (idx, &step) in steps.iter().enumerate() {
            match self.attempt(plan, step) {
                Ok(attempts) => {
                    tracing::info!(
                        trip_id = %plan.trip_id,
                        step = %step,
                        attempts,
                        "settlement step committed"
                    );
                    committed.push(step);
                }
                Err((error, attempts)) => {
                    tracing::error!(
                        trip_id = %plan.trip_id,
                        step = %step,
                        attempts,
                        error = %error,
                        "settlement step failed; saga stopped"
                    );
                    let remaining = steps[idx..].to_vec();
                    let task = match existing {
                        Some(task) => task.rescheduled(remaining, error.to_string()),
                        None => ReconciliationTask::new(plan.clone(), remaining, error.to_string()),
                    };
                    let reconciliation_error = self.persist_task(&task);
                    return SettlementResult {
                        trip_id: plan.trip_id.clone(),
                        breakdown: plan.breakdown,
                        committed_steps: committed,
                        failed_step: Some(FailedStep {
                            step,
                            attempts,
                            error,
                        }),
                        reconciliation: Some(task),
                        reconciliation_error,
                    };
                }
            }
        }

        if let Some(task) = existing {
            self.resolve(&task);
        }

        tracing::info!(trip_id = %plan.trip_id, "settlement complete");
        SettlementResult {
            trip_id: plan.trip_id.clone(),
            breakdown: plan.breakdown,
            committed_steps: committed,
            failed_step: None,
            reconciliation: None,
            reconciliation_error: None,
        }
    }

    /// Delete a finished task. A task left behind is harmless: resuming it
    /// finds the trip completed and writes nothing.
    pub(super) fn resolve(&self, task: &ReconciliationTask) {
        match self.store.resolve_reconciliation_task(task.id) {
            Ok(()) => tracing::info!(
                task_id = %task.id,
                trip_id = %task.trip_id,
                "reconciliation task resolved"
            ),
            Err(error) => tracing::warn!(
                task_id = %task.id,
                error = %error,
                "reconciliation task could not be resolved"
            ),
        }
    }

    fn persist_task(&self, task: &ReconciliationTask) -> Option<String> {
        match self.store.save_reconciliation_task(task) {
            Ok(()) => {
                tracing::warn!(
                    task_id = %task.id,
                    trip_id = %task.trip_id,
                    remaining = task.remaining_steps.len(),
                    "reconciliation task recorded"
                );
                None
            }
            Err(error) => {
                tracing::error!(
                    task_id = %task.id,
                    trip_id = %task.trip_id,
                    error = %error,
                    "reconciliation task could not be recorded"
                );
                Some(error.to_string())
            }
        }
    }

    /// Returns the number of attempts used, with the last error on failure.
    fn attempt(
        &self,
        plan: &SettlementPlan,
        step: SettlementStep,
    ) -> Result<u32, (StoreError, u32)> {
        let mut attempt = 1;
        loop {
            match self.execute(plan, step) {
                Ok(()) => return Ok(attempt),
                Err(error) if attempt < self.max_attempts && error.is_transient() => {
                    tracing::warn!(
                        trip_id = %plan.trip_id,
                        step = %step,
                        attempt,
                        error = %error,
                        "settlement step failed; retrying"
                    );
                    if !self.backoff.is_zero() {
                        thread::sleep(self.backoff);
                    }
                    attempt += 1;
                }
                Err(error) => return Err((error, attempt)),
            }
        }
    }

    fn execute(&self, plan: &SettlementPlan, step: SettlementStep) -> Result<(), StoreError> {
        match step {
            SettlementStep::RecordRevenue => {
                if self.store.find_trip_revenue(&plan.trip_id)?.is_some() {
                    tracing::info!(
                        trip_id = %plan.trip_id,
                        "revenue already recorded; insert skipped"
                    );
                    return Ok(());
                }
                self.store.insert_trip_revenue(&plan.revenue()).map(|_| ())
            }
            SettlementStep::ReleaseVehicle => self
                .store
                .update_vehicle_status(&plan.vehicle_id, VehicleStatus::Available),
            SettlementStep::ReleaseDriver => self
                .store
                .update_driver_status(&plan.driver_id, DriverStatus::Available),
            SettlementStep::CompleteConsignment => self
                .store
                .update_consignment_status(&plan.consignment_id, ConsignmentStatus::Completed),
            SettlementStep::CompleteTrip => self.store.update_trip_status(
                &plan.trip_id,
                TripStatus::Ongoing,
                TripStatus::Completed,
            ),
        }
    }
}
