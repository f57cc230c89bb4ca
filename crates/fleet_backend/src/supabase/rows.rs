use chrono::{DateTime, Utc};
use fleet_core::deviation::AcknowledgingParty;
use fleet_core::model::{ConsignmentStatus, DriverStatus, TripStatus, VehicleStatus};
use serde::Serialize;

#[derive(Debug, Serialize)]
pub(super) struct VehicleStatusPatch {
    pub(super) status: VehicleStatus,
}

#[derive(Debug, Serialize)]
pub(super) struct DriverStatusPatch {
    pub(super) status: DriverStatus,
}

#[derive(Debug, Serialize)]
pub(super) struct ConsignmentStatusPatch {
    pub(super) status: ConsignmentStatus,
}

/// Closing a trip also stamps its end time.
#[derive(Debug, Serialize)]
pub(super) struct TripStatusPatch {
    pub(super) status: TripStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub(super) end_time: Option<DateTime<Utc>>,
}

impl TripStatusPatch {
    pub(super) fn new(status: TripStatus, now: DateTime<Utc>) -> Self {
        Self {
            status,
            end_time: status.is_terminal().then_some(now),
        }
    }
}

#[derive(Debug, Serialize)]
pub(super) struct TripNotesPatch<'a> {
    pub(super) notes: &'a str,
}

/// Sets one party's acknowledgement; the other column is left out of the body.
#[derive(Debug, Serialize)]
pub(super) struct AcknowledgementPatch {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub(super) admin_acknowledged_at: Option<DateTime<Utc>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub(super) driver_acknowledged_at: Option<DateTime<Utc>>,
}

impl AcknowledgementPatch {
    pub(super) fn new(party: AcknowledgingParty, at: DateTime<Utc>) -> Self {
        match party {
            AcknowledgingParty::Admin => Self {
                admin_acknowledged_at: Some(at),
                driver_acknowledged_at: None,
            },
            AcknowledgingParty::Driver => Self {
                admin_acknowledged_at: None,
                driver_acknowledged_at: Some(at),
            },
        }
    }
}
