use std::time::Duration;

use chrono::{DateTime, Utc};
use fleet_core::deviation::AcknowledgingParty;
use fleet_core::model::{
    Consignment, ConsignmentStatus, DriverStatus, RouteDeviationWarning, Trip, TripRevenue,
    TripStatus, Vehicle, VehicleStatus,
};
use fleet_core::settlement::ReconciliationTask;
use fleet_core::store::{FleetStore, StoreError};
use reqwest::blocking::{Client, RequestBuilder};
use reqwest::{Method, StatusCode, Url};
use serde::de::DeserializeOwned;
use serde::Serialize;
use uuid::Uuid;

use super::rows::{
    AcknowledgementPatch, ConsignmentStatusPatch, DriverStatusPatch, TripNotesPatch,
    TripStatusPatch, VehicleStatusPatch,
};
use super::{
    CONSIGNMENTS, DRIVERS, ROUTE_DEVIATION_WARNINGS, SETTLEMENT_RECONCILIATION, TRIPS,
    TRIP_REVENUE, VEHICLES,
};
use crate::{endpoint, http_client, ClientError};

const PREFER: &str = "Prefer";
const RETURN_REPRESENTATION: &str = "return=representation";
const UPSERT: &str = "resolution=merge-duplicates,return=minimal";

type Query<'q> = [(&'q str, String)];

/// Blocking PostgREST client for the fleet tables.
#[derive(Debug, Clone)]
pub struct SupabaseStore {
    client: Client,
    base_url: String,
    anon_key: String,
    access_token: Option<String>,
}

impl SupabaseStore {
    pub fn new(base_url: &str, anon_key: &str, timeout: Duration) -> Result<Self, ClientError> {
        Ok(Self {
            client: http_client(timeout)?,
            base_url: endpoint(base_url)?,
            anon_key: anon_key.to_string(),
            access_token: None,
        })
    }

    /// Act as a signed-in user. Without a token requests carry the anon key.
    pub fn with_access_token(mut self, token: impl Into<String>) -> Self {
        self.access_token = Some(token.into());
        self
    }

    pub(super) fn url(&self, table: &str, query: &Query<'_>) -> Result<Url, StoreError> {
        table_url(&self.base_url, table, query)
    }

    pub(super) fn request(&self, method: Method, url: Url) -> RequestBuilder {
        let token = self.access_token.as_deref().unwrap_or(&self.anon_key);
        self.client
            .request(method, url)
            .header("apikey", &self.anon_key)
            .bearer_auth(token)
    }

    fn send(&self, request: RequestBuilder) -> Result<String, StoreError> {
        let response = request
            .send()
            .map_err(|err| StoreError::Request(err.to_string()))?;
        let status = response.status();
        let body = response
            .text()
            .map_err(|err| StoreError::Request(err.to_string()))?;
        check_status(status, body)
    }

    fn select<T: DeserializeOwned>(
        &self,
        table: &str,
        query: &Query<'_>,
    ) -> Result<Vec<T>, StoreError> {
        let url = self.url(table, query)?;
        let body = self.send(self.request(Method::GET, url))?;
        parse_rows(&body)
    }

    fn select_by_id<T: DeserializeOwned>(
        &self,
        table: &str,
        entity: &'static str,
        id: &str,
    ) -> Result<T, StoreError> {
        self.select(table, &[("id", eq(id)), ("select", "*".to_string())])?
            .into_iter()
            .next()
            .ok_or_else(|| StoreError::not_found(entity, id))
    }

    /// PATCH every row matching `filter`, returning the updated rows.
    fn patch_where<B: Serialize, T: DeserializeOwned>(
        &self,
        table: &str,
        filter: &Query<'_>,
        patch: &B,
    ) -> Result<Vec<T>, StoreError> {
        let url = self.url(table, filter)?;
        let request = self
            .request(Method::PATCH, url)
            .header(PREFER, RETURN_REPRESENTATION)
            .json(patch);
        parse_rows(&self.send(request)?)
    }

    fn patch_by_id<B: Serialize>(
        &self,
        table: &str,
        entity: &'static str,
        id: &str,
        patch: &B,
    ) -> Result<(), StoreError> {
        let rows: Vec<serde_json::Value> = self.patch_where(table, &[("id", eq(id))], patch)?;
        if rows.is_empty() {
            return Err(StoreError::not_found(entity, id));
        }
        Ok(())
    }

    fn insert<B: Serialize, T: DeserializeOwned>(
        &self,
        table: &str,
        row: &B,
    ) -> Result<T, StoreError> {
        let url = self.url(table, &[])?;
        let request = self
            .request(Method::POST, url)
            .header(PREFER, RETURN_REPRESENTATION)
            .json(row);
        parse_rows(&self.send(request)?)?
            .into_iter()
            .next()
            .ok_or_else(|| StoreError::Decode(format!("insert into {table} returned no row")))
    }
}

impl FleetStore for SupabaseStore {
    fn get_trip(&self, trip_id: &str) -> Result<Trip, StoreError> {
        self.select_by_id(TRIPS, "trip", trip_id)
    }

    fn get_consignment(&self, consignment_id: &str) -> Result<Consignment, StoreError> {
        self.select_by_id(CONSIGNMENTS, "consignment", consignment_id)
    }

    fn get_vehicle(&self, vehicle_id: &str) -> Result<Vehicle, StoreError> {
        self.select_by_id(VEHICLES, "vehicle", vehicle_id)
    }

    fn find_trip_revenue(&self, trip_id: &str) -> Result<Option<TripRevenue>, StoreError> {
        let rows: Vec<TripRevenue> = self.select(
            TRIP_REVENUE,
            &[
                ("trip_id", eq(trip_id)),
                ("select", "*".to_string()),
                ("limit", "1".to_string()),
            ],
        )?;
        Ok(rows.into_iter().next())
    }

    fn insert_trip_revenue(&self, revenue: &TripRevenue) -> Result<TripRevenue, StoreError> {
        self.insert(TRIP_REVENUE, revenue)
    }

    fn update_vehicle_status(
        &self,
        vehicle_id: &str,
        status: VehicleStatus,
    ) -> Result<(), StoreError> {
        self.patch_by_id(VEHICLES, "vehicle", vehicle_id, &VehicleStatusPatch { status })
    }

    fn update_driver_status(&self, driver_id: &str, status: DriverStatus) -> Result<(), StoreError> {
        self.patch_by_id(DRIVERS, "driver", driver_id, &DriverStatusPatch { status })
    }

    fn update_consignment_status(
        &self,
        consignment_id: &str,
        status: ConsignmentStatus,
    ) -> Result<(), StoreError> {
        self.patch_by_id(
            CONSIGNMENTS,
            "consignment",
            consignment_id,
            &ConsignmentStatusPatch { status },
        )
    }

    fn update_trip_status(
        &self,
        trip_id: &str,
        from: TripStatus,
        to: TripStatus,
    ) -> Result<(), StoreError> {
        let rows: Vec<serde_json::Value> = self.patch_where(
            TRIPS,
            &transition_filter(trip_id, from),
            &TripStatusPatch::new(to, Utc::now()),
        )?;
        if !rows.is_empty() {
            return Ok(());
        }
        // Nothing matched: a missing trip is NotFound, a moved one a conflict.
        self.get_trip(trip_id)?;
        Err(StoreError::Conflict {
            entity: "trip",
            id: trip_id.to_string(),
            expected: from.to_string(),
        })
    }

    fn update_trip_notes(&self, trip_id: &str, notes: &str) -> Result<(), StoreError> {
        self.patch_by_id(TRIPS, "trip", trip_id, &TripNotesPatch { notes })
    }

    fn insert_deviation_warning(
        &self,
        warning: &RouteDeviationWarning,
    ) -> Result<RouteDeviationWarning, StoreError> {
        self.insert(ROUTE_DEVIATION_WARNINGS, warning)
    }

    fn get_deviation_warning(&self, warning_id: &str) -> Result<RouteDeviationWarning, StoreError> {
        self.select_by_id(ROUTE_DEVIATION_WARNINGS, "route deviation warning", warning_id)
    }

    fn acknowledge_deviation_warning(
        &self,
        warning_id: &str,
        party: AcknowledgingParty,
        at: DateTime<Utc>,
    ) -> Result<Option<RouteDeviationWarning>, StoreError> {
        let rows: Vec<RouteDeviationWarning> = self.patch_where(
            ROUTE_DEVIATION_WARNINGS,
            &acknowledgement_filter(warning_id, party),
            &AcknowledgementPatch::new(party, at),
        )?;
        Ok(rows.into_iter().next())
    }

    fn save_reconciliation_task(&self, task: &ReconciliationTask) -> Result<(), StoreError> {
        let url = self.url(SETTLEMENT_RECONCILIATION, &[("on_conflict", "id".to_string())])?;
        let request = self
            .request(Method::POST, url)
            .header(PREFER, UPSERT)
            .json(task);
        self.send(request).map(|_| ())
    }

    fn pending_reconciliation_tasks(&self) -> Result<Vec<ReconciliationTask>, StoreError> {
        self.select(
            SETTLEMENT_RECONCILIATION,
            &[
                ("select", "*".to_string()),
                ("order", "created_at.asc".to_string()),
            ],
        )
    }

    fn resolve_reconciliation_task(&self, task_id: Uuid) -> Result<(), StoreError> {
        let id = task_id.to_string();
        let url = self.url(SETTLEMENT_RECONCILIATION, &[("id", eq(&id))])?;
        let request = self
            .request(Method::DELETE, url)
            .header(PREFER, RETURN_REPRESENTATION);
        let rows: Vec<serde_json::Value> = parse_rows(&self.send(request)?)?;
        if rows.is_empty() {
            return Err(StoreError::not_found("reconciliation task", id));
        }
        Ok(())
    }
}

/// PostgREST equality filter value.
pub(super) fn eq(value: &str) -> String {
    format!("eq.{value}")
}

/// Matches the trip only while it still has status `from`.
pub(super) fn transition_filter(trip_id: &str, from: TripStatus) -> Vec<(&'static str, String)> {
    vec![("id", eq(trip_id)), ("status", eq(from.as_str()))]
}

/// Matches the warning only while `party` has not acknowledged it.
pub(super) fn acknowledgement_filter(
    warning_id: &str,
    party: AcknowledgingParty,
) -> Vec<(&'static str, String)> {
    vec![("id", eq(warning_id)), (party.column(), "is.null".to_string())]
}

pub(super) fn table_url(base: &str, table: &str, query: &Query<'_>) -> Result<Url, StoreError> {
    let mut url = Url::parse(&format!("{base}/rest/v1/{table}"))
        .map_err(|err| StoreError::Decode(format!("invalid table URL for {table}: {err}")))?;
    if !query.is_empty() {
        url.query_pairs_mut()
            .extend_pairs(query.iter().map(|(key, value)| (*key, value.as_str())));
    }
    Ok(url)
}

pub(super) fn check_status(status: StatusCode, body: String) -> Result<String, StoreError> {
    if status.is_success() {
        Ok(body)
    } else {
        Err(StoreError::Rejected {
            status: status.as_u16(),
            body,
        })
    }
}

/// PostgREST answers with a JSON array; `return=minimal` writes answer with
/// an empty body.
pub(super) fn parse_rows<T: DeserializeOwned>(body: &str) -> Result<Vec<T>, StoreError> {
    if body.trim().is_empty() {
        return Ok(Vec::new());
    }
    serde_json::from_str(body).map_err(|err| StoreError::Decode(err.to_string()))
}
