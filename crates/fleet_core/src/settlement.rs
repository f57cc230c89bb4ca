//! Trip settlement: price a finished trip, then close out every entity it
//! touched.
//!
//! Closing out is a saga of independent remote writes (see [`SettlementStep`]).
//! There is no transaction across them, so a run that stops part-way returns
//! the committed prefix, the failed step, and a [`ReconciliationTask`] that
//! [`TripSettlement::resume`] can finish later.

mod error;
mod outcome;
mod reconciliation;
mod saga;
mod session;
mod steps;


use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::geo::haversine_km;
use crate::geocoding::{resolve_pair, PlaceLookup};
use crate::model::{Trip, TripStatus};
use crate::rates::{parse_weight_kg, RateCard, VehicleClass};
use crate::store::{FleetStore, StoreError};

pub use error::SettlementError;
pub use outcome::{FailedStep, ResumeOutcome, SettlementResult};
pub use reconciliation::ReconciliationTask;
pub use session::DriverSession;
pub use steps::{SettlementPlan, SettlementStep};

use saga::SagaRunner;

/// Retry and pricing knobs for settlement.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SettlementConfig {
    pub rates: RateCard,
    /// Attempts per saga step before the run stops. Values below 1 act as 1.
    pub max_step_attempts: u32,
    /// Pause between attempts of the same step.
    pub retry_backoff_ms: u64,
}

impl Default for SettlementConfig {
    fn default() -> Self {
        Self {
            rates: RateCard::default(),
            max_step_attempts: 3,
            retry_backoff_ms: 200,
        }
    }
}

impl SettlementConfig {
    pub fn retry_backoff(&self) -> Duration {
        Duration::from_millis(self.retry_backoff_ms)
    }
}

/// The trip a driver is currently running, plus the class of the vehicle
/// assigned to it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ActiveTrip {
    pub trip: Trip,
    pub vehicle_type: String,
}

pub struct TripSettlement<'a> {
    store: &'a dyn FleetStore,
    places: &'a dyn PlaceLookup,
    config: SettlementConfig,
}

impl<'a> TripSettlement<'a> {
    pub fn new(
        store: &'a dyn FleetStore,
        places: &'a dyn PlaceLookup,
        config: SettlementConfig,
    ) -> Self {
        Self {
            store,
            places,
            config,
        }
    }

    /// Load the trip and its vehicle, then settle.
    pub fn settle_trip_by_id(&self, trip_id: &str) -> Result<SettlementResult, SettlementError> {
        let trip = self.store.get_trip(trip_id)?;
        reject_closed(&trip)?;
        let vehicle = self.store.get_vehicle(&trip.vehicle_id)?;
        let class: VehicleClass = vehicle.vehicle_type.parse()?;
        let plan = self.price(&trip, class)?;
        Ok(self.run(&plan))
    }

    /// Price `active` and run every saga step.
    ///
    /// Errors are returned only for problems found before the first write.
    /// Write failures are reported in the returned [`SettlementResult`].
    pub fn settle(&self, active: &ActiveTrip) -> Result<SettlementResult, SettlementError> {
        let plan = self.prepare(active)?;
        Ok(self.run(&plan))
    }

    fn run(&self, plan: &SettlementPlan) -> SettlementResult {
        tracing::info!(
            trip_id = %plan.trip_id,
            distance_km = plan.breakdown.distance_km,
            customer_charge = plan.breakdown.customer_charge,
            "settlement priced; closing out trip"
        );
        self.runner().run(plan, &SettlementStep::ALL, None)
    }

    /// Everything up to (not including) the first write: guard, class lookup,
    /// a fresh read of the trip's status, geocoding, weight parsing and
    /// pricing. The in-memory trip may be stale, so a trip closed elsewhere
    /// is refused here.
    pub fn prepare(&self, active: &ActiveTrip) -> Result<SettlementPlan, SettlementError> {
        let trip = &active.trip;
        reject_closed(trip)?;
        let class: VehicleClass = active.vehicle_type.parse()?;
        reject_closed(&self.store.get_trip(&trip.id)?)?;
        self.price(trip, class)
    }

    fn price(&self, trip: &Trip, class: VehicleClass) -> Result<SettlementPlan, SettlementError> {
        let (pickup, drop) = resolve_pair(self.places, &trip.pickup_address, &trip.drop_address);
        let pickup = pickup.map_err(|source| SettlementError::GeocodingFailed {
            address: trip.pickup_address.clone(),
            source,
        })?;
        let drop = drop.map_err(|source| SettlementError::GeocodingFailed {
            address: trip.drop_address.clone(),
            source,
        })?;

        let consignment = self.store.get_consignment(&trip.consignment_id)?;
        let weight_kg =
            parse_weight_kg(&consignment.weight).map_err(|source| SettlementError::InvalidWeight {
                consignment_id: consignment.id.clone(),
                source,
            })?;

        let distance_km = haversine_km(pickup, drop);
        Ok(SettlementPlan {
            trip_id: trip.id.clone(),
            driver_id: trip.driver_id.clone(),
            vehicle_id: trip.vehicle_id.clone(),
            consignment_id: trip.consignment_id.clone(),
            breakdown: self.config.rates.settle(distance_km, class, weight_kg),
        })
    }

    /// Continue a saga that previously stopped part-way.
    ///
    /// The trip is read first. Remaining steps only run while it is still
    /// ongoing; once it is closed by any path the task is dropped unwritten.
    pub fn resume(&self, task: ReconciliationTask) -> ResumeOutcome {
        let trip = match self.store.get_trip(&task.trip_id) {
            Ok(trip) => trip,
            Err(error) => {
                tracing::warn!(
                    task_id = %task.id,
                    trip_id = %task.trip_id,
                    error = %error,
                    "trip unreadable; resume deferred"
                );
                return ResumeOutcome::Deferred {
                    task_id: task.id,
                    trip_id: task.trip_id,
                    error,
                };
            }
        };

        match trip.status {
            TripStatus::Ongoing => {
                tracing::info!(
                    task_id = %task.id,
                    trip_id = %task.trip_id,
                    remaining = task.remaining_steps.len(),
                    "resuming settlement"
                );
                let plan = task.plan.clone();
                let steps = task.remaining_steps.clone();
                ResumeOutcome::Resumed(self.runner().run(&plan, &steps, Some(task)))
            }
            TripStatus::Completed => {
                tracing::info!(
                    task_id = %task.id,
                    trip_id = %task.trip_id,
                    "trip already settled; reconciliation task dropped"
                );
                self.runner().resolve(&task);
                ResumeOutcome::AlreadySettled {
                    task_id: task.id,
                    trip_id: task.trip_id,
                }
            }
            status => {
                tracing::error!(
                    task_id = %task.id,
                    trip_id = %task.trip_id,
                    status = %status,
                    skipped = ?task.remaining_steps,
                    "trip closed before settlement finished; remaining steps dropped"
                );
                self.runner().resolve(&task);
                ResumeOutcome::TripClosed {
                    task_id: task.id,
                    trip_id: task.trip_id,
                    status,
                    skipped_steps: task.remaining_steps,
                }
            }
        }
    }

    /// Resume every pending reconciliation task, oldest first.
    pub fn reconcile_pending(&self) -> Result<Vec<ResumeOutcome>, StoreError> {
        let tasks = self.store.pending_reconciliation_tasks()?;
        Ok(tasks.into_iter().map(|task| self.resume(task)).collect())
    }

    fn runner(&self) -> SagaRunner<'_> {
        SagaRunner {
            store: self.store,
            max_attempts: self.config.max_step_attempts.max(1),
            backoff: self.config.retry_backoff(),
        }
    }
}

fn reject_closed(trip: &Trip) -> Result<(), SettlementError> {
    if trip.status.is_terminal() {
        return Err(SettlementError::TripAlreadyClosed {
            trip_id: trip.id.clone(),
            status: trip.status,
        });
    }
    Ok(())
}
