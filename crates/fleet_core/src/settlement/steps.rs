use std::fmt;

use serde::{Deserialize, Serialize};

use crate::model::TripRevenue;
use crate::rates::SettlementBreakdown;

/// One independent remote write in the close-out sequence, in execution order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SettlementStep {
    /// Insert the revenue row (skipped if one already exists for the trip).
    RecordRevenue,
    /// Vehicle → `available`.
    ReleaseVehicle,
    /// Driver → `Available`.
    ReleaseDriver,
    /// Consignment → `completed`.
    CompleteConsignment,
    /// Trip → `completed`.
    CompleteTrip,
}

impl SettlementStep {
    pub const ALL: [SettlementStep; 5] = [
        Self::RecordRevenue,
        Self::ReleaseVehicle,
        Self::ReleaseDriver,
        Self::CompleteConsignment,
        Self::CompleteTrip,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            Self::RecordRevenue => "record_revenue",
            Self::ReleaseVehicle => "release_vehicle",
            Self::ReleaseDriver => "release_driver",
            Self::CompleteConsignment => "complete_consignment",
            Self::CompleteTrip => "complete_trip",
        }
    }
}

impl fmt::Display for SettlementStep {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Everything the saga needs to run, independent of where it was computed.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SettlementPlan {
    pub trip_id: String,
    pub driver_id: String,
    pub vehicle_id: String,
    pub consignment_id: String,
    pub breakdown: SettlementBreakdown,
}

impl SettlementPlan {
    pub fn revenue(&self) -> TripRevenue {
        self.breakdown.to_revenue(&self.trip_id)
    }
}
