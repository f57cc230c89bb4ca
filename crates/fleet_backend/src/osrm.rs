//! Road routes from an OSRM HTTP endpoint (`/route/v1/driving`).
//!
//! Failures are logged and reported as "no route"; callers wrap this provider
//! in [`CachedRouteProvider`](fleet_core::routing::CachedRouteProvider) with a
//! straight-line fallback.

use std::time::Duration;

use fleet_core::routing::{Route, RouteProvider};
use h3o::LatLng;
use reqwest::blocking::Client;
use reqwest::Url;
use serde::Deserialize;

use crate::{endpoint, http_client, ClientError};

pub struct OsrmRouteProvider {
    client: Client,
    endpoint: String,
}

impl OsrmRouteProvider {
    /// `endpoint` is the OSRM base URL, e.g. `http://localhost:5000`.
    pub fn new(endpoint_url: &str, timeout: Duration) -> Result<Self, ClientError> {
        Ok(Self {
            client: http_client(timeout)?,
            endpoint: endpoint(endpoint_url)?,
        })
    }

    fn fetch(&self, from: LatLng, to: LatLng) -> Result<Route, OsrmError> {
        let url = route_url(&self.endpoint, from, to)?;
        let response: OsrmRouteResponse = self
            .client
            .get(url)
            .send()
            .map_err(OsrmError::Http)?
            .json()
            .map_err(OsrmError::Json)?;
        parse_route_response(response)
    }
}

impl RouteProvider for OsrmRouteProvider {
    fn route(&self, from: LatLng, to: LatLng) -> Option<Route> {
        match self.fetch(from, to) {
            Ok(route) => Some(route),
            Err(error) => {
                tracing::warn!(error = %error, "OSRM route unavailable");
                None
            }
        }
    }
}

#[derive(Debug, thiserror::Error)]
enum OsrmError {
    #[error("request failed: {0}")]
    Http(#[source] reqwest::Error),
    #[error("response could not be decoded: {0}")]
    Json(#[source] reqwest::Error),
    #[error("OSRM answered {0}")]
    Api(String),
    #[error("no route in response")]
    NoRoute,
}

#[derive(Deserialize)]
struct OsrmRouteResponse {
    code: String,
    routes: Option<Vec<OsrmRoute>>,
}

#[derive(Deserialize)]
struct OsrmRoute {
    /// Metres.
    distance: f64,
    /// Seconds.
    duration: f64,
    geometry: OsrmGeometry,
}

#[derive(Deserialize)]
struct OsrmGeometry {
    /// GeoJSON order: `[lng, lat]`.
    coordinates: Vec<[f64; 2]>,
}

fn route_url(endpoint: &str, from: LatLng, to: LatLng) -> Result<Url, OsrmError> {
    let mut url = Url::parse(&format!(
        "{endpoint}/route/v1/driving/{:.6},{:.6};{:.6},{:.6}",
        from.lng(),
        from.lat(),
        to.lng(),
        to.lat(),
    ))
    .map_err(|err| OsrmError::Api(format!("invalid route URL: {err}")))?;
    url.query_pairs_mut()
        .append_pair("overview", "full")
        .append_pair("geometries", "geojson");
    Ok(url)
}

fn parse_route_response(response: OsrmRouteResponse) -> Result<Route, OsrmError> {
    if response.code != "Ok" {
        return Err(OsrmError::Api(response.code));
    }
    let route = response
        .routes
        .and_then(|routes| routes.into_iter().next())
        .ok_or(OsrmError::NoRoute)?;

    let waypoints: Vec<LatLng> = route
        .geometry
        .coordinates
        .iter()
        .filter_map(|&[lng, lat]| LatLng::new(lat, lng).ok())
        .collect();
    if waypoints.is_empty() {
        return Err(OsrmError::NoRoute);
    }

    Ok(Route {
        waypoints,
        distance_km: route.distance / 1000.0,
        duration_secs: route.duration,
    })
}
