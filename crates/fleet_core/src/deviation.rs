//! Route deviation warnings.
//!
//! A warning is raised when a driver's observed position lies further than
//! `threshold_m` from the planned pickup→drop route. The warning records the
//! nearest route point as the "optimal" position. Admin and driver each
//! acknowledge it once.

use chrono::{DateTime, Utc};
use h3o::LatLng;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::geo::nearest_point_on_route;
use crate::geocoding::{resolve_pair, LookupError, PlaceLookup};
use crate::model::{RouteDeviationWarning, Trip};
use crate::routing::{Route, RouteProvider};
use crate::store::{FleetStore, StoreError};

pub const DEFAULT_THRESHOLD_M: f64 = 500.0;

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DeviationConfig {
    /// Distance from the route, in metres, beyond which a warning is raised.
    pub threshold_m: f64,
}

impl Default for DeviationConfig {
    fn default() -> Self {
        Self {
            threshold_m: DEFAULT_THRESHOLD_M,
        }
    }
}

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum DeviationError {
    #[error("could not resolve address '{address}': {source}")]
    Geocoding {
        address: String,
        #[source]
        source: LookupError,
    },
    #[error("no route available for trip '{trip_id}'")]
    NoRoute { trip_id: String },
    #[error(transparent)]
    Store(#[from] StoreError),
}

/// Build a warning if `observed` is further than `threshold_m` from `route`.
pub fn evaluate_deviation(
    trip: &Trip,
    observed: LatLng,
    route: &Route,
    threshold_m: f64,
    now: DateTime<Utc>,
) -> Option<RouteDeviationWarning> {
    let nearest = nearest_point_on_route(&route.waypoints, observed)?;
    if nearest.distance_m <= threshold_m {
        return None;
    }

    Some(RouteDeviationWarning {
        id: Uuid::new_v4().to_string(),
        trip_id: trip.id.clone(),
        driver_id: trip.driver_id.clone(),
        consignment_id: trip.consignment_id.clone(),
        latitude: observed.lat(),
        longitude: observed.lng(),
        optimal_latitude: Some(nearest.coordinate.lat()),
        optimal_longitude: Some(nearest.coordinate.lng()),
        distance_from_route: nearest.distance_m,
        created_at: now,
        admin_acknowledged_at: None,
        driver_acknowledged_at: None,
        details: Some(format!(
            "{:.0} m off the planned route from '{}' to '{}'",
            nearest.distance_m, trip.pickup_address, trip.drop_address
        )),
    })
}

/// Checks live positions against a trip's planned route and stores warnings.
pub struct DeviationMonitor<'a> {
    store: &'a dyn FleetStore,
    places: &'a dyn PlaceLookup,
    routes: &'a dyn RouteProvider,
    config: DeviationConfig,
}

impl<'a> DeviationMonitor<'a> {
    pub fn new(
        store: &'a dyn FleetStore,
        places: &'a dyn PlaceLookup,
        routes: &'a dyn RouteProvider,
        config: DeviationConfig,
    ) -> Self {
        Self {
            store,
            places,
            routes,
            config,
        }
    }

    /// Returns the stored warning, or `None` when the driver is on route or
    /// the trip has already ended.
    pub fn check(
        &self,
        trip: &Trip,
        observed: LatLng,
    ) -> Result<Option<RouteDeviationWarning>, DeviationError> {
        if trip.status.is_terminal() {
            tracing::debug!(trip_id = %trip.id, status = %trip.status, "trip closed; deviation check skipped");
            return Ok(None);
        }

        let (pickup, drop) = resolve_pair(self.places, &trip.pickup_address, &trip.drop_address);
        let pickup = pickup.map_err(|source| DeviationError::Geocoding {
            address: trip.pickup_address.clone(),
            source,
        })?;
        let drop = drop.map_err(|source| DeviationError::Geocoding {
            address: trip.drop_address.clone(),
            source,
        })?;

        let route = self
            .routes
            .route(pickup, drop)
            .ok_or_else(|| DeviationError::NoRoute {
                trip_id: trip.id.clone(),
            })?;

        let Some(warning) =
            evaluate_deviation(trip, observed, &route, self.config.threshold_m, Utc::now())
        else {
            return Ok(None);
        };

        let stored = self.store.insert_deviation_warning(&warning)?;
        tracing::warn!(
            trip_id = %trip.id,
            driver_id = %trip.driver_id,
            distance_m = stored.distance_from_route,
            "route deviation recorded"
        );
        Ok(Some(stored))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AcknowledgingParty {
    Admin,
    Driver,
}

/// Record that `party` has seen the warning. A second acknowledgement by the
/// same party keeps the original timestamp and issues no write. Only the
/// party's own column is written, so concurrent admin and driver
/// acknowledgements both survive.
pub fn acknowledge_warning(
    store: &dyn FleetStore,
    warning_id: &str,
    party: AcknowledgingParty,
    at: DateTime<Utc>,
) -> Result<RouteDeviationWarning, StoreError> {
    let warning = store.get_deviation_warning(warning_id)?;
    if party.acknowledged_at(&warning).is_some() {
        return Ok(warning);
    }
    match store.acknowledge_deviation_warning(warning_id, party, at)? {
        Some(updated) => Ok(updated),
        // Acknowledged by another call since the read above.
        None => store.get_deviation_warning(warning_id),
    }
}

impl AcknowledgingParty {
    pub fn acknowledged_at(self, warning: &RouteDeviationWarning) -> Option<DateTime<Utc>> {
        match self {
            Self::Admin => warning.admin_acknowledged_at,
            Self::Driver => warning.driver_acknowledged_at,
        }
    }

    /// Column holding this party's acknowledgement timestamp.
    pub fn column(self) -> &'static str {
        match self {
            Self::Admin => "admin_acknowledged_at",
            Self::Driver => "driver_acknowledged_at",
        }
    }
}
