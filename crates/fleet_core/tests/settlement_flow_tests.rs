mod support;

use fleet_core::lifecycle::cancel_trip;
use fleet_core::model::{ConsignmentStatus, DriverStatus, TripStatus, VehicleStatus};
use fleet_core::settlement::{DriverSession, ResumeOutcome, SettlementStep, TripSettlement};
use fleet_core::test_helpers::{
    seeded_store, test_places, test_trip, test_vehicle, StoreOperation, TEST_CONSIGNMENT_ID,
    TEST_DRIVER_ID, TEST_VEHICLE_ID,
};
use support::{active_trip, fast_settlement_config, trip_id};

#[test]
fn driver_ends_trip_and_every_row_is_closed() {
    let store = seeded_store();
    let places = test_places();
    let settlement = TripSettlement::new(&store, &places, fast_settlement_config());
    let mut session = DriverSession::new();
    session.begin(active_trip("MCV"));

    let result = session.end_current_trip(&settlement).expect("settled");

    assert!(result.is_complete());
    assert!(session.current().is_none());
    let state = store.snapshot();
    assert_eq!(state.trips[trip_id()].status, TripStatus::Completed);
    assert_eq!(state.vehicles[TEST_VEHICLE_ID].status, VehicleStatus::Available);
    assert_eq!(state.drivers[TEST_DRIVER_ID], DriverStatus::Available);

    let revenue = &state.revenues[0];
    assert!((revenue.distance_covered - 100.0).abs() < 1e-6);
    assert!((revenue.driver_cost - 700.0).abs() < 1e-6);
}

#[test]
fn outage_mid_saga_is_recovered_by_reconcile() {
    let store = seeded_store();
    let places = test_places();
    let settlement = TripSettlement::new(&store, &places, fast_settlement_config());
    store.fail_next(StoreOperation::UpdateDriverStatus, 10);

    let partial = settlement.settle(&active_trip("MCV")).expect("priced");
    assert_eq!(
        partial.committed_steps,
        vec![SettlementStep::RecordRevenue, SettlementStep::ReleaseVehicle]
    );
    let state = store.snapshot();
    assert_eq!(state.drivers[TEST_DRIVER_ID], DriverStatus::Busy);
    assert_eq!(state.trips[trip_id()].status, TripStatus::Ongoing);
    assert_eq!(state.tasks.len(), 1);

    // Backend recovers.
    store.fail_next(StoreOperation::UpdateDriverStatus, 0);
    let results = settlement.reconcile_pending().expect("reconciled");

    assert_eq!(results.len(), 1);
    assert!(results[0].is_complete());
    assert_eq!(
        results[0].settlement().expect("steps ran").committed_steps,
        vec![
            SettlementStep::ReleaseDriver,
            SettlementStep::CompleteConsignment,
            SettlementStep::CompleteTrip,
        ]
    );
    let state = store.snapshot();
    assert!(state.tasks.is_empty());
    assert_eq!(state.revenues.len(), 1);
    assert_eq!(state.drivers[TEST_DRIVER_ID], DriverStatus::Available);
    assert_eq!(state.trips[trip_id()].status, TripStatus::Completed);
}

#[test]
fn settled_trip_cannot_be_settled_twice() {
    let store = seeded_store();
    let places = test_places();
    let settlement = TripSettlement::new(&store, &places, fast_settlement_config());

    settlement.settle_trip_by_id(trip_id()).expect("first settlement");
    let err = settlement
        .settle_trip_by_id(trip_id())
        .expect_err("second settlement");

    assert!(err.to_string().contains("already completed"));
    assert_eq!(store.snapshot().revenues.len(), 1);
}

#[test]
fn result_serializes_for_reporting() {
    let store = seeded_store();
    let places = test_places();
    store.fail_next(StoreOperation::UpdateTripStatus, 10);

    let result = TripSettlement::new(&store, &places, fast_settlement_config())
        .settle(&active_trip("MCV"))
        .expect("priced");
    let json = serde_json::to_value(&result).expect("json");

    assert_eq!(json["failed_step"]["step"], "complete_trip");
    assert_eq!(json["failed_step"]["attempts"], 3);
    assert!(json["failed_step"]["error"]
        .as_str()
        .unwrap_or_default()
        .contains("injected failure"));
    assert_eq!(json["reconciliation"]["remaining_steps"][0], "complete_trip");
    assert_eq!(json["breakdown"]["vehicle_class"], "MCV");
    assert!(json.get("reconciliation_error").is_none());
}

#[test]
fn cancelled_trip_stays_cancelled_through_reconcile() {
    let store = seeded_store();
    let places = test_places();
    let settlement = TripSettlement::new(&store, &places, fast_settlement_config());
    store.fail_next(StoreOperation::UpdateDriverStatus, 10);
    settlement.settle(&active_trip("MCV")).expect("priced");
    store.fail_next(StoreOperation::UpdateDriverStatus, 0);

    cancel_trip(&store, &test_trip(), "customer withdrew").expect("cancelled");
    let results = settlement.reconcile_pending().expect("reconciled");

    assert_eq!(results.len(), 1);
    assert!(!results[0].is_complete());
    assert!(results[0].settlement().is_none());
    let state = store.snapshot();
    assert_eq!(state.trips[trip_id()].status, TripStatus::Cancelled);
    assert_eq!(state.drivers[TEST_DRIVER_ID], DriverStatus::Busy);
    assert_eq!(
        state.consignments[TEST_CONSIGNMENT_ID].status,
        ConsignmentStatus::Ongoing
    );
    assert!(state.tasks.is_empty());
}

#[test]
fn stale_task_does_not_release_reassigned_driver() {
    let store = seeded_store();
    let places = test_places();
    let settlement = TripSettlement::new(&store, &places, fast_settlement_config());
    let mut session = DriverSession::new();
    session.begin(active_trip("MCV"));

    store.fail_next(StoreOperation::UpdateDriverStatus, 3);
    let partial = session.end_current_trip(&settlement).expect("priced");
    assert!(!partial.is_complete());
    let done = session.end_current_trip(&settlement).expect("settled");
    assert!(done.is_complete());
    assert_eq!(store.snapshot().tasks.len(), 1);

    // Driver and vehicle take the next job.
    store.insert_driver(TEST_DRIVER_ID, DriverStatus::Busy);
    store.insert_vehicle(test_vehicle("MCV"));
    let results = settlement.reconcile_pending().expect("reconciled");

    assert_eq!(results.len(), 1);
    assert!(matches!(results[0], ResumeOutcome::AlreadySettled { .. }));
    let state = store.snapshot();
    assert_eq!(state.drivers[TEST_DRIVER_ID], DriverStatus::Busy);
    assert_eq!(state.vehicles[TEST_VEHICLE_ID].status, VehicleStatus::OnDuty);
    assert_eq!(state.trips[trip_id()].status, TripStatus::Completed);
    assert!(state.tasks.is_empty());

    let json = serde_json::to_value(&results[0]).expect("json");
    assert_eq!(json["outcome"], "already_settled");
}
