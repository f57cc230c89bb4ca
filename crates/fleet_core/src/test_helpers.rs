//! Test helpers: an in-memory store with failure injection, a fixed place
//! lookup, and sample rows.
//!
//! The sample pickup and drop lie on the equator exactly 100 km apart, so a
//! settlement of the sample trip has a known distance.

use std::collections::{BTreeMap, HashMap};
use std::fmt;
use std::sync::{Mutex, MutexGuard};

use chrono::{DateTime, Utc};
use h3o::LatLng;
use uuid::Uuid;

use crate::deviation::AcknowledgingParty;
use crate::geo::EARTH_RADIUS_KM;
use crate::geocoding::{normalize_query, LookupError, PlaceLookup};
use crate::model::{
    Consignment, ConsignmentStatus, ConsignmentType, DriverStatus, RouteDeviationWarning, Trip,
    TripRevenue, TripStatus, Vehicle, VehicleStatus,
};
use crate::settlement::ReconciliationTask;
use crate::store::{FleetStore, StoreError};

pub const TEST_TRIP_ID: &str = "trip-0001";
pub const TEST_DRIVER_ID: &str = "driver-0001";
pub const TEST_VEHICLE_ID: &str = "vehicle-0001";
pub const TEST_CONSIGNMENT_ID: &str = "CSG-0001";
pub const TEST_PICKUP: &str = "Equator Depot, Gate 1";
pub const TEST_DROP: &str = "Equator Warehouse, Dock 4";

/// Pickup coordinate of the sample trip.
pub fn test_pickup() -> LatLng {
    LatLng::new(0.0, 0.0).expect("origin is a valid coordinate")
}

/// Drop coordinate of the sample trip: 100 km due east of the pickup.
pub fn test_drop() -> LatLng {
    LatLng::new(0.0, (100.0 / EARTH_RADIUS_KM).to_degrees()).expect("valid coordinate")
}

pub fn test_trip() -> Trip {
    Trip {
        id: TEST_TRIP_ID.to_string(),
        consignment_id: TEST_CONSIGNMENT_ID.to_string(),
        driver_id: TEST_DRIVER_ID.to_string(),
        vehicle_id: TEST_VEHICLE_ID.to_string(),
        pickup_address: TEST_PICKUP.to_string(),
        drop_address: TEST_DROP.to_string(),
        start_time: None,
        end_time: None,
        status: TripStatus::Ongoing,
        notes: None,
    }
}

pub fn test_consignment(weight: &str) -> Consignment {
    Consignment {
        id: TEST_CONSIGNMENT_ID.to_string(),
        weight: weight.to_string(),
        consignment_type: ConsignmentType::Standard,
        status: ConsignmentStatus::Ongoing,
        pickup_address: TEST_PICKUP.to_string(),
        drop_address: TEST_DROP.to_string(),
    }
}

pub fn test_vehicle(vehicle_type: &str) -> Vehicle {
    Vehicle {
        id: TEST_VEHICLE_ID.to_string(),
        vehicle_type: vehicle_type.to_string(),
        status: VehicleStatus::OnDuty,
    }
}

/// A store holding the sample trip (2000 kg, MCV) with the driver on duty.
pub fn seeded_store() -> InMemoryFleetStore {
    let store = InMemoryFleetStore::new();
    store.insert_trip(test_trip());
    store.insert_consignment(test_consignment("2000"));
    store.insert_vehicle(test_vehicle("MCV"));
    store.insert_driver(TEST_DRIVER_ID, DriverStatus::Busy);
    store
}

/// A lookup that knows the sample pickup and drop.
pub fn test_places() -> FixedPlaceLookup {
    FixedPlaceLookup::new()
        .with_place(TEST_PICKUP, test_pickup())
        .with_place(TEST_DROP, test_drop())
}

/// Every [`FleetStore`] method, for call recording and failure injection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StoreOperation {
    GetTrip,
    GetConsignment,
    GetVehicle,
    FindTripRevenue,
    InsertTripRevenue,
    UpdateVehicleStatus,
    UpdateDriverStatus,
    UpdateConsignmentStatus,
    UpdateTripStatus,
    UpdateTripNotes,
    InsertDeviationWarning,
    GetDeviationWarning,
    AcknowledgeDeviationWarning,
    SaveReconciliationTask,
    PendingReconciliationTasks,
    ResolveReconciliationTask,
}

impl StoreOperation {
    pub fn is_write(self) -> bool {
        !matches!(
            self,
            Self::GetTrip
                | Self::GetConsignment
                | Self::GetVehicle
                | Self::FindTripRevenue
                | Self::GetDeviationWarning
                | Self::PendingReconciliationTasks
        )
    }
}

#[derive(Debug, Clone, Default)]
pub struct StoreState {
    pub trips: HashMap<String, Trip>,
    pub consignments: HashMap<String, Consignment>,
    pub vehicles: HashMap<String, Vehicle>,
    pub drivers: HashMap<String, DriverStatus>,
    pub revenues: Vec<TripRevenue>,
    pub warnings: BTreeMap<String, RouteDeviationWarning>,
    pub tasks: BTreeMap<Uuid, ReconciliationTask>,
    pub calls: Vec<StoreOperation>,
    failures: HashMap<StoreOperation, u32>,
}

type Interleaved = Box<dyn FnOnce(&mut StoreState) + Send>;

/// Thread-safe in-memory [`FleetStore`].
#[derive(Default)]
pub struct InMemoryFleetStore {
    state: Mutex<StoreState>,
    interleaved: Mutex<Vec<(StoreOperation, Interleaved)>>,
}

impl fmt::Debug for InMemoryFleetStore {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("InMemoryFleetStore")
            .field("state", &self.state)
            .finish_non_exhaustive()
    }
}

impl InMemoryFleetStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert_trip(&self, trip: Trip) {
        self.lock().trips.insert(trip.id.clone(), trip);
    }

    pub fn insert_consignment(&self, consignment: Consignment) {
        self.lock()
            .consignments
            .insert(consignment.id.clone(), consignment);
    }

    pub fn insert_vehicle(&self, vehicle: Vehicle) {
        self.lock().vehicles.insert(vehicle.id.clone(), vehicle);
    }

    pub fn remove_vehicle(&self, vehicle_id: &str) -> Option<Vehicle> {
        self.lock().vehicles.remove(vehicle_id)
    }

    pub fn insert_driver(&self, driver_id: &str, status: DriverStatus) {
        self.lock().drivers.insert(driver_id.to_string(), status);
    }

    pub fn insert_revenue(&self, revenue: TripRevenue) {
        self.lock().revenues.push(revenue);
    }

    /// Make the next `times` calls of `operation` fail with a transient error.
    pub fn fail_next(&self, operation: StoreOperation, times: u32) {
        self.lock().failures.insert(operation, times);
    }

    /// Apply `write` to the stored rows just before the next `operation`
    /// takes effect, as if another client had written in between.
    pub fn interleave(
        &self,
        operation: StoreOperation,
        write: impl FnOnce(&mut StoreState) + Send + 'static,
    ) {
        if let Ok(mut interleaved) = self.interleaved.lock() {
            interleaved.push((operation, Box::new(write)));
        }
    }

    pub fn calls(&self) -> Vec<StoreOperation> {
        self.lock().calls.clone()
    }

    pub fn write_calls(&self) -> Vec<StoreOperation> {
        self.calls().into_iter().filter(|op| op.is_write()).collect()
    }

    pub fn snapshot(&self) -> StoreState {
        self.lock().clone()
    }

    fn lock(&self) -> MutexGuard<'_, StoreState> {
        match self.state.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        }
    }

    fn begin(&self, operation: StoreOperation) -> Result<MutexGuard<'_, StoreState>, StoreError> {
        let mut state = self.lock();
        state.calls.push(operation);
        if let Some(remaining) = state.failures.get_mut(&operation) {
            if *remaining > 0 {
                *remaining -= 1;
                return Err(StoreError::Request(format!(
                    "injected failure for {operation:?}"
                )));
            }
        }
        let pending = match self.interleaved.lock() {
            Ok(mut interleaved) => interleaved
                .iter()
                .position(|(op, _)| *op == operation)
                .map(|idx| interleaved.remove(idx).1),
            Err(_) => None,
        };
        if let Some(write) = pending {
            write(&mut *state);
        }
        Ok(state)
    }
}

impl FleetStore for InMemoryFleetStore {
    fn get_trip(&self, trip_id: &str) -> Result<Trip, StoreError> {
        let state = self.begin(StoreOperation::GetTrip)?;
        state
            .trips
            .get(trip_id)
            .cloned()
            .ok_or_else(|| StoreError::not_found("trip", trip_id))
    }

    fn get_consignment(&self, consignment_id: &str) -> Result<Consignment, StoreError> {
        let state = self.begin(StoreOperation::GetConsignment)?;
        state
            .consignments
            .get(consignment_id)
            .cloned()
            .ok_or_else(|| StoreError::not_found("consignment", consignment_id))
    }

    fn get_vehicle(&self, vehicle_id: &str) -> Result<Vehicle, StoreError> {
        let state = self.begin(StoreOperation::GetVehicle)?;
        state
            .vehicles
            .get(vehicle_id)
            .cloned()
            .ok_or_else(|| StoreError::not_found("vehicle", vehicle_id))
    }

    fn find_trip_revenue(&self, trip_id: &str) -> Result<Option<TripRevenue>, StoreError> {
        let state = self.begin(StoreOperation::FindTripRevenue)?;
        Ok(state
            .revenues
            .iter()
            .find(|revenue| revenue.trip_id == trip_id)
            .cloned())
    }

    fn insert_trip_revenue(&self, revenue: &TripRevenue) -> Result<TripRevenue, StoreError> {
        let mut state = self.begin(StoreOperation::InsertTripRevenue)?;
        let mut stored = revenue.clone();
        stored.created_at = Some(Utc::now());
        state.revenues.push(stored.clone());
        Ok(stored)
    }

    fn update_vehicle_status(
        &self,
        vehicle_id: &str,
        status: VehicleStatus,
    ) -> Result<(), StoreError> {
        let mut state = self.begin(StoreOperation::UpdateVehicleStatus)?;
        let vehicle = state
            .vehicles
            .get_mut(vehicle_id)
            .ok_or_else(|| StoreError::not_found("vehicle", vehicle_id))?;
        vehicle.status = status;
        Ok(())
    }

    fn update_driver_status(&self, driver_id: &str, status: DriverStatus) -> Result<(), StoreError> {
        let mut state = self.begin(StoreOperation::UpdateDriverStatus)?;
        let driver = state
            .drivers
            .get_mut(driver_id)
            .ok_or_else(|| StoreError::not_found("driver", driver_id))?;
        *driver = status;
        Ok(())
    }

    fn update_consignment_status(
        &self,
        consignment_id: &str,
        status: ConsignmentStatus,
    ) -> Result<(), StoreError> {
        let mut state = self.begin(StoreOperation::UpdateConsignmentStatus)?;
        let consignment = state
            .consignments
            .get_mut(consignment_id)
            .ok_or_else(|| StoreError::not_found("consignment", consignment_id))?;
        consignment.status = status;
        Ok(())
    }

    fn update_trip_status(
        &self,
        trip_id: &str,
        from: TripStatus,
        to: TripStatus,
    ) -> Result<(), StoreError> {
        let mut state = self.begin(StoreOperation::UpdateTripStatus)?;
        let trip = state
            .trips
            .get_mut(trip_id)
            .ok_or_else(|| StoreError::not_found("trip", trip_id))?;
        if trip.status != from {
            return Err(StoreError::Conflict {
                entity: "trip",
                id: trip_id.to_string(),
                expected: from.to_string(),
            });
        }
        trip.status = to;
        Ok(())
    }

    fn update_trip_notes(&self, trip_id: &str, notes: &str) -> Result<(), StoreError> {
        let mut state = self.begin(StoreOperation::UpdateTripNotes)?;
        let trip = state
            .trips
            .get_mut(trip_id)
            .ok_or_else(|| StoreError::not_found("trip", trip_id))?;
        trip.notes = Some(notes.to_string());
        Ok(())
    }

    fn insert_deviation_warning(
        &self,
        warning: &RouteDeviationWarning,
    ) -> Result<RouteDeviationWarning, StoreError> {
        let mut state = self.begin(StoreOperation::InsertDeviationWarning)?;
        state.warnings.insert(warning.id.clone(), warning.clone());
        Ok(warning.clone())
    }

    fn get_deviation_warning(&self, warning_id: &str) -> Result<RouteDeviationWarning, StoreError> {
        let state = self.begin(StoreOperation::GetDeviationWarning)?;
        state
            .warnings
            .get(warning_id)
            .cloned()
            .ok_or_else(|| StoreError::not_found("route deviation warning", warning_id))
    }

    fn acknowledge_deviation_warning(
        &self,
        warning_id: &str,
        party: AcknowledgingParty,
        at: DateTime<Utc>,
    ) -> Result<Option<RouteDeviationWarning>, StoreError> {
        let mut state = self.begin(StoreOperation::AcknowledgeDeviationWarning)?;
        let Some(stored) = state.warnings.get_mut(warning_id) else {
            return Ok(None);
        };
        let slot = match party {
            AcknowledgingParty::Admin => &mut stored.admin_acknowledged_at,
            AcknowledgingParty::Driver => &mut stored.driver_acknowledged_at,
        };
        if slot.is_some() {
            return Ok(None);
        }
        *slot = Some(at);
        Ok(Some(stored.clone()))
    }

    fn save_reconciliation_task(&self, task: &ReconciliationTask) -> Result<(), StoreError> {
        let mut state = self.begin(StoreOperation::SaveReconciliationTask)?;
        state.tasks.insert(task.id, task.clone());
        Ok(())
    }

    fn pending_reconciliation_tasks(&self) -> Result<Vec<ReconciliationTask>, StoreError> {
        let state = self.begin(StoreOperation::PendingReconciliationTasks)?;
        let mut tasks: Vec<_> = state.tasks.values().cloned().collect();
        tasks.sort_by_key(|task| task.created_at);
        Ok(tasks)
    }

    fn resolve_reconciliation_task(&self, task_id: Uuid) -> Result<(), StoreError> {
        let mut state = self.begin(StoreOperation::ResolveReconciliationTask)?;
        state
            .tasks
            .remove(&task_id)
            .map(|_| ())
            .ok_or_else(|| StoreError::not_found("reconciliation task", task_id.to_string()))
    }
}

/// [`PlaceLookup`] backed by a fixed table. Records every query it receives.
#[derive(Debug, Default)]
pub struct FixedPlaceLookup {
    places: HashMap<String, LatLng>,
    queries: Mutex<Vec<String>>,
}

impl FixedPlaceLookup {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_place(mut self, address: &str, coordinate: LatLng) -> Self {
        self.places.insert(normalize_query(address), coordinate);
        self
    }

    pub fn queries(&self) -> Vec<String> {
        match self.queries.lock() {
            Ok(queries) => queries.clone(),
            Err(poisoned) => poisoned.into_inner().clone(),
        }
    }
}

impl PlaceLookup for FixedPlaceLookup {
    fn lookup_place(&self, query: &str) -> Result<LatLng, LookupError> {
        if let Ok(mut queries) = self.queries.lock() {
            queries.push(query.to_string());
        }
        self.places
            .get(&normalize_query(query))
            .copied()
            .ok_or_else(|| LookupError::NoResult(query.to_string()))
    }
}
