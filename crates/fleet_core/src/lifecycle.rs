//! Trip status state machine and the non-settlement ways a trip ends.
//!
//! ```text
//! ongoing ──► completed       (settlement)
//!        ├──► ended_manually
//!        └──► cancelled
//! ```
//! Terminal states accept no transition.

use crate::model::{Trip, TripStatus};
use crate::store::{FleetStore, StoreError};

#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
#[error("trip cannot move from {from} to {to}")]
pub struct TransitionError {
    pub from: TripStatus,
    pub to: TripStatus,
}

impl TripStatus {
    pub fn can_transition_to(self, next: TripStatus) -> bool {
        matches!(
            (self, next),
            (
                TripStatus::Ongoing,
                TripStatus::Completed | TripStatus::EndedManually | TripStatus::Cancelled
            )
        )
    }

    pub fn transition(self, next: TripStatus) -> Result<TripStatus, TransitionError> {
        if self.can_transition_to(next) {
            Ok(next)
        } else {
            Err(TransitionError {
                from: self,
                to: next,
            })
        }
    }
}

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum LifecycleError {
    #[error(transparent)]
    Transition(#[from] TransitionError),
    #[error(transparent)]
    Store(#[from] StoreError),
}

/// Close an ongoing trip without settling it. Vehicle, driver and
/// consignment are left as they are.
pub fn end_trip_manually(
    store: &dyn FleetStore,
    trip: &Trip,
    notes: Option<&str>,
) -> Result<TripStatus, LifecycleError> {
    close(store, trip, TripStatus::EndedManually, notes)
}

pub fn cancel_trip(
    store: &dyn FleetStore,
    trip: &Trip,
    reason: &str,
) -> Result<TripStatus, LifecycleError> {
    close(store, trip, TripStatus::Cancelled, Some(reason))
}

fn close(
    store: &dyn FleetStore,
    trip: &Trip,
    next: TripStatus,
    notes: Option<&str>,
) -> Result<TripStatus, LifecycleError> {
    let status = trip.status.transition(next)?;
    // Conditional on the status read by the caller; a stale copy changes nothing.
    store.update_trip_status(&trip.id, trip.status, status)?;
    if let Some(notes) = notes.map(str::trim).filter(|notes| !notes.is_empty()) {
        store.update_trip_notes(&trip.id, notes)?;
    }
    tracing::info!(trip_id = %trip.id, from = %trip.status, to = %status, "trip closed");
    Ok(status)
}
