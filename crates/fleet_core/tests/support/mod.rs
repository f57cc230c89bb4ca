#![allow(dead_code)]

use fleet_core::settlement::{ActiveTrip, SettlementConfig};
use fleet_core::test_helpers::{test_trip, TEST_TRIP_ID};
use h3o::LatLng;

/// Settlement config with no pause between retries.
pub fn fast_settlement_config() -> SettlementConfig {
    SettlementConfig {
        retry_backoff_ms: 0,
        ..SettlementConfig::default()
    }
}

pub fn active_trip(vehicle_type: &str) -> ActiveTrip {
    ActiveTrip {
        trip: test_trip(),
        vehicle_type: vehicle_type.to_string(),
    }
}

pub fn trip_id() -> &'static str {
    TEST_TRIP_ID
}

pub fn coordinate(lat: f64, lng: f64) -> LatLng {
    LatLng::new(lat, lng).expect("valid coordinate")
}
