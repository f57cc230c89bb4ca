use crate::geocoding::LookupError;
use crate::model::TripStatus;
use crate::rates::{InvalidWeight, UnknownVehicleClass};
use crate::store::StoreError;

/// Reasons a settlement is refused before any write is issued.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum SettlementError {
    #[error("no trip is active in this session")]
    NoActiveTrip,
    #[error("trip '{trip_id}' is already {status}; settlement refused")]
    TripAlreadyClosed { trip_id: String, status: TripStatus },
    #[error(transparent)]
    UnknownVehicleClass(#[from] UnknownVehicleClass),
    #[error("could not resolve address '{address}': {source}")]
    GeocodingFailed {
        address: String,
        #[source]
        source: LookupError,
    },
    #[error("consignment '{consignment_id}': {source}")]
    InvalidWeight {
        consignment_id: String,
        #[source]
        source: InvalidWeight,
    },
    #[error(transparent)]
    Store(#[from] StoreError),
}
