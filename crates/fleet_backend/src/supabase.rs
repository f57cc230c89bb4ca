//! [`FleetStore`](fleet_core::store::FleetStore) over Supabase's PostgREST API.
//!
//! Each trait method maps to one HTTP request against `/rest/v1/{table}`.
//! Filters use PostgREST operators (`id=eq.{id}`); writes ask for
//! `return=representation` so a filter matching no row surfaces as
//! [`StoreError::NotFound`](fleet_core::store::StoreError::NotFound) instead
//! of a silent no-op.

mod client;
mod rows;

#[cfg(test)]
mod tests;

pub use client::SupabaseStore;

pub const TRIPS: &str = "trips";
pub const CONSIGNMENTS: &str = "consignments";
pub const VEHICLES: &str = "vehicles";
pub const DRIVERS: &str = "drivers";
pub const TRIP_REVENUE: &str = "trip_revenue";
pub const ROUTE_DEVIATION_WARNINGS: &str = "route_deviation_warnings";
pub const SETTLEMENT_RECONCILIATION: &str = "settlement_reconciliation";
