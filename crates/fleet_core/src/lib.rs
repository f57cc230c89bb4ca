//! Fleet trip settlement core.
//!
//! This crate owns pricing, the settlement saga, the trip status machine and
//! route deviation checks. Remote collaborators are reached only through the
//! [`store::FleetStore`], [`geocoding::PlaceLookup`] and
//! [`routing::RouteProvider`] traits; HTTP adapters live in `fleet_backend`.

pub mod deviation;
pub mod geo;
pub mod geocoding;
pub mod lifecycle;
pub mod model;
pub mod rates;
pub mod routing;
pub mod settlement;
pub mod store;

#[cfg(any(test, feature = "test-helpers"))]
pub mod test_helpers;
