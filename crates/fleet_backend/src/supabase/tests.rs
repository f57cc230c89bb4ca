use std::time::Duration;

use chrono::{TimeZone, Utc};
use fleet_core::deviation::AcknowledgingParty;
use fleet_core::model::{Consignment, Trip, TripRevenue, TripStatus, VehicleStatus};
use fleet_core::rates::{RateCard, VehicleClass};
use fleet_core::settlement::{ReconciliationTask, SettlementPlan, SettlementStep};
use fleet_core::store::StoreError;
use reqwest::{Method, StatusCode};

use super::client::{
    acknowledgement_filter, check_status, eq, parse_rows, table_url, transition_filter,
    SupabaseStore,
};
use super::rows::{AcknowledgementPatch, TripStatusPatch, VehicleStatusPatch};
use super::{ROUTE_DEVIATION_WARNINGS, TRIPS, TRIP_REVENUE};

fn store() -> SupabaseStore {
    SupabaseStore::new("https://fleet.supabase.co/", "anon-key", Duration::from_secs(5))
        .expect("client")
}

#[test]
fn table_url_encodes_postgrest_filters() {
    let url = table_url(
        "https://fleet.supabase.co",
        TRIPS,
        &[("id", eq("trip-1")), ("select", "*".to_string())],
    )
    .expect("url");

    assert_eq!(
        url.as_str(),
        "https://fleet.supabase.co/rest/v1/trips?id=eq.trip-1&select=*"
    );
}

#[test]
fn table_url_without_query_has_no_question_mark() {
    let url = table_url("https://fleet.supabase.co", TRIP_REVENUE, &[]).expect("url");
    assert_eq!(url.as_str(), "https://fleet.supabase.co/rest/v1/trip_revenue");
}

#[test]
fn requests_carry_anon_key_until_signed_in() {
    let anon = store();
    let url = anon.url(TRIPS, &[]).expect("url");
    let request = anon.request(Method::GET, url.clone()).build().expect("request");
    assert_eq!(request.headers()["apikey"], "anon-key");
    assert_eq!(request.headers()["authorization"], "Bearer anon-key");

    let signed_in = store().with_access_token("user-jwt");
    let request = signed_in
        .request(Method::PATCH, url)
        .build()
        .expect("request");
    assert_eq!(request.method(), &Method::PATCH);
    assert_eq!(request.headers()["apikey"], "anon-key");
    assert_eq!(request.headers()["authorization"], "Bearer user-jwt");
}

#[test]
fn invalid_base_url_is_rejected_at_construction() {
    let err = SupabaseStore::new("not a url", "anon", Duration::from_secs(1)).expect_err("invalid");
    assert!(err.to_string().contains("not a url"));
}

#[test]
fn error_status_keeps_body_and_classifies_transience() {
    let err = check_status(StatusCode::SERVICE_UNAVAILABLE, "upstream down".to_string())
        .expect_err("rejected");
    assert_eq!(
        err,
        StoreError::Rejected {
            status: 503,
            body: "upstream down".to_string(),
        }
    );
    assert!(err.is_transient());

    let err = check_status(StatusCode::CONFLICT, "duplicate key".to_string()).expect_err("409");
    assert!(!err.is_transient());

    assert_eq!(
        check_status(StatusCode::CREATED, "[]".to_string()).expect("ok"),
        "[]"
    );
}

#[test]
fn parses_trip_and_consignment_rows() {
    let trips: Vec<Trip> = parse_rows(
        r#"[{
            "id": "trip-1",
            "consignment_id": "CSG-1",
            "driver_id": "driver-1",
            "vehicle_id": "vehicle-1",
            "pickup_address": "Yard 3",
            "drop_address": "Dock 9",
            "start_time": "2024-03-01T08:00:00+00:00",
            "end_time": null,
            "status": "ongoing",
            "notes": null
        }]"#,
    )
    .expect("trips");
    assert_eq!(trips[0].status, TripStatus::Ongoing);
    assert_eq!(
        trips[0].start_time,
        Utc.with_ymd_and_hms(2024, 3, 1, 8, 0, 0).single()
    );

    let consignments: Vec<Consignment> = parse_rows(
        r#"[{
            "id": "CSG-1",
            "weight": 2000,
            "type": "priority",
            "status": "ongoing",
            "pickup_address": "Yard 3",
            "drop_address": "Dock 9"
        }]"#,
    )
    .expect("consignments");
    assert_eq!(consignments[0].weight, "2000");
}

#[test]
fn empty_body_parses_as_no_rows_and_garbage_is_decode_error() {
    let rows: Vec<TripRevenue> = parse_rows("  ").expect("empty");
    assert!(rows.is_empty());

    let err = parse_rows::<TripRevenue>("{\"message\":\"oops\"}").expect_err("not an array");
    assert!(matches!(err, StoreError::Decode(_)));
    assert!(!err.is_transient());
}

#[test]
fn status_patches_use_backend_spelling() {
    let vehicle = serde_json::to_value(VehicleStatusPatch {
        status: VehicleStatus::Available,
    })
    .expect("json");
    assert_eq!(vehicle, serde_json::json!({ "status": "available" }));

    let now = Utc.with_ymd_and_hms(2024, 3, 1, 12, 0, 0).single().expect("time");
    let closing = serde_json::to_value(TripStatusPatch::new(TripStatus::Completed, now))
        .expect("json");
    assert_eq!(closing["status"], "completed");
    assert_eq!(closing["end_time"], "2024-03-01T12:00:00Z");

    let reopening = serde_json::to_value(TripStatusPatch::new(TripStatus::Ongoing, now))
        .expect("json");
    assert!(reopening.get("end_time").is_none());
}

#[test]
fn reconciliation_row_keeps_plan_and_remaining_steps() {
    let plan = SettlementPlan {
        trip_id: "trip-1".to_string(),
        driver_id: "driver-1".to_string(),
        vehicle_id: "vehicle-1".to_string(),
        consignment_id: "CSG-1".to_string(),
        breakdown: RateCard::default().settle(10.0, VehicleClass::Lcv, 5.0),
    };
    let task = ReconciliationTask::new(
        plan,
        vec![SettlementStep::ReleaseDriver, SettlementStep::CompleteTrip],
        "backend request failed: timeout",
    );

    let row = serde_json::to_string(&task).expect("json");
    let parsed: Vec<ReconciliationTask> = parse_rows(&format!("[{row}]")).expect("rows");

    assert_eq!(parsed.len(), 1);
    assert_eq!(parsed[0].id, task.id);
    assert_eq!(parsed[0].plan.trip_id, "trip-1");
    assert_eq!(parsed[0].remaining_steps, task.remaining_steps);
    assert_eq!(parsed[0].failed_step(), Some(SettlementStep::ReleaseDriver));
    assert_eq!(parsed[0].created_at, task.created_at);
    assert!(row.contains("\"remaining_steps\":[\"release_driver\",\"complete_trip\"]"));
}

#[test]
fn trip_status_write_only_matches_expected_status() {
    let url = table_url(
        "https://fleet.supabase.co",
        TRIPS,
        &transition_filter("trip-1", TripStatus::Ongoing),
    )
    .expect("url");

    assert_eq!(
        url.as_str(),
        "https://fleet.supabase.co/rest/v1/trips?id=eq.trip-1&status=eq.ongoing"
    );
}

#[test]
fn acknowledgement_touches_only_the_party_column() {
    let url = table_url(
        "https://fleet.supabase.co",
        ROUTE_DEVIATION_WARNINGS,
        &acknowledgement_filter("w-1", AcknowledgingParty::Driver),
    )
    .expect("url");
    assert_eq!(
        url.as_str(),
        "https://fleet.supabase.co/rest/v1/route_deviation_warnings?id=eq.w-1&driver_acknowledged_at=is.null"
    );

    let at = Utc.with_ymd_and_hms(2024, 3, 1, 10, 0, 0).single().expect("time");
    let body = serde_json::to_value(AcknowledgementPatch::new(AcknowledgingParty::Admin, at))
        .expect("json");
    let fields = body.as_object().expect("object");
    assert_eq!(fields.len(), 1);
    assert_eq!(fields["admin_acknowledged_at"], "2024-03-01T10:00:00Z");
}

#[test]
fn conflict_is_not_retried() {
    let conflict = StoreError::Conflict {
        entity: "trip",
        id: "trip-1".to_string(),
        expected: TripStatus::Ongoing.to_string(),
    };
    assert!(!conflict.is_transient());
    assert_eq!(
        conflict.to_string(),
        "trip 'trip-1' is no longer ongoing; write not applied"
    );
}
