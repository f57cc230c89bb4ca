//! Persistence boundary. Every method is one independent remote call; the
//! backend offers no transaction spanning several of them.

use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::deviation::AcknowledgingParty;
use crate::model::{
    Consignment, ConsignmentStatus, DriverStatus, RouteDeviationWarning, Trip, TripRevenue,
    TripStatus, Vehicle, VehicleStatus,
};
use crate::settlement::ReconciliationTask;

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum StoreError {
    #[error("{entity} '{id}' not found")]
    NotFound { entity: &'static str, id: String },
    #[error("backend request failed: {0}")]
    Request(String),
    #[error("backend response could not be decoded: {0}")]
    Decode(String),
    #[error("backend rejected request with status {status}: {body}")]
    Rejected { status: u16, body: String },
    /// A conditional write matched no row because the row moved on.
    #[error("{entity} '{id}' is no longer {expected}; write not applied")]
    Conflict {
        entity: &'static str,
        id: String,
        expected: String,
    },
}

impl StoreError {
    pub fn not_found(entity: &'static str, id: impl Into<String>) -> Self {
        Self::NotFound {
            entity,
            id: id.into(),
        }
    }

    /// Whether repeating the same call could plausibly succeed.
    pub fn is_transient(&self) -> bool {
        match self {
            Self::Request(_) => true,
            Self::Rejected { status, .. } => *status >= 500 || matches!(status, 408 | 429),
            Self::NotFound { .. } | Self::Decode(_) | Self::Conflict { .. } => false,
        }
    }
}

pub trait FleetStore: Send + Sync {
    fn get_trip(&self, trip_id: &str) -> Result<Trip, StoreError>;
    fn get_consignment(&self, consignment_id: &str) -> Result<Consignment, StoreError>;
    fn get_vehicle(&self, vehicle_id: &str) -> Result<Vehicle, StoreError>;

    fn find_trip_revenue(&self, trip_id: &str) -> Result<Option<TripRevenue>, StoreError>;
    fn insert_trip_revenue(&self, revenue: &TripRevenue) -> Result<TripRevenue, StoreError>;

    fn update_vehicle_status(&self, vehicle_id: &str, status: VehicleStatus)
        -> Result<(), StoreError>;
    fn update_driver_status(&self, driver_id: &str, status: DriverStatus)
        -> Result<(), StoreError>;
    fn update_consignment_status(
        &self,
        consignment_id: &str,
        status: ConsignmentStatus,
    ) -> Result<(), StoreError>;
    /// Move the trip from `from` to `to`. Fails with [`StoreError::Conflict`]
    /// when the stored status is no longer `from`.
    fn update_trip_status(
        &self,
        trip_id: &str,
        from: TripStatus,
        to: TripStatus,
    ) -> Result<(), StoreError>;
    fn update_trip_notes(&self, trip_id: &str, notes: &str) -> Result<(), StoreError>;

    fn insert_deviation_warning(
        &self,
        warning: &RouteDeviationWarning,
    ) -> Result<RouteDeviationWarning, StoreError>;
    fn get_deviation_warning(&self, warning_id: &str)
        -> Result<RouteDeviationWarning, StoreError>;
    /// Set `party`'s acknowledgement timestamp only if it is still empty,
    /// leaving the other party's column untouched. Returns the updated row,
    /// or `None` when nothing matched (already acknowledged, or no such
    /// warning).
    fn acknowledge_deviation_warning(
        &self,
        warning_id: &str,
        party: AcknowledgingParty,
        at: DateTime<Utc>,
    ) -> Result<Option<RouteDeviationWarning>, StoreError>;

    /// Insert or overwrite a reconciliation task by id.
    fn save_reconciliation_task(&self, task: &ReconciliationTask) -> Result<(), StoreError>;
    /// Pending tasks, oldest first.
    fn pending_reconciliation_tasks(&self) -> Result<Vec<ReconciliationTask>, StoreError>;
    fn resolve_reconciliation_task(&self, task_id: Uuid) -> Result<(), StoreError>;
}
