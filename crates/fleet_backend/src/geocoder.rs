//! Free-text address search against a Nominatim-compatible `/search` API.

use std::time::Duration;

use fleet_core::geocoding::{LookupError, PlaceLookup};
use h3o::LatLng;
use reqwest::blocking::Client;
use reqwest::Url;
use serde::Deserialize;

use crate::{endpoint, http_client, ClientError};

pub struct NominatimPlaceLookup {
    client: Client,
    endpoint: String,
}

impl NominatimPlaceLookup {
    pub fn new(endpoint_url: &str, timeout: Duration) -> Result<Self, ClientError> {
        Ok(Self {
            client: http_client(timeout)?,
            endpoint: endpoint(endpoint_url)?,
        })
    }

    fn search_url(&self, query: &str) -> Result<Url, LookupError> {
        search_url(&self.endpoint, query)
    }
}

impl PlaceLookup for NominatimPlaceLookup {
    fn lookup_place(&self, query: &str) -> Result<LatLng, LookupError> {
        let url = self.search_url(query)?;
        let response = self
            .client
            .get(url)
            .send()
            .map_err(|err| LookupError::Request(err.to_string()))?;
        let status = response.status();
        if !status.is_success() {
            return Err(LookupError::Request(format!(
                "place search answered {status}"
            )));
        }
        let places: Vec<SearchResult> = response
            .json()
            .map_err(|err| LookupError::Decode(err.to_string()))?;
        tracing::debug!(query, results = places.len(), "place search");
        first_coordinate(query, places)
    }
}

#[derive(Debug, Deserialize)]
struct SearchResult {
    /// Nominatim sends coordinates as decimal strings.
    lat: String,
    lon: String,
}

fn search_url(endpoint: &str, query: &str) -> Result<Url, LookupError> {
    let mut url = Url::parse(&format!("{endpoint}/search"))
        .map_err(|err| LookupError::Request(format!("invalid search URL: {err}")))?;
    url.query_pairs_mut()
        .append_pair("q", query)
        .append_pair("format", "jsonv2")
        .append_pair("limit", "1");
    Ok(url)
}

fn first_coordinate(query: &str, places: Vec<SearchResult>) -> Result<LatLng, LookupError> {
    let place = places
        .into_iter()
        .next()
        .ok_or_else(|| LookupError::NoResult(query.to_string()))?;
    let lat = parse_degrees(&place.lat, 90.0)?;
    let lng = parse_degrees(&place.lon, 180.0)?;
    LatLng::new(lat, lng)
        .map_err(|err| LookupError::Decode(format!("invalid coordinate {lat},{lng}: {err}")))
}

fn parse_degrees(raw: &str, limit: f64) -> Result<f64, LookupError> {
    match raw.trim().parse::<f64>() {
        Ok(value) if value.abs() <= limit => Ok(value),
        _ => Err(LookupError::Decode(format!("'{raw}' is not a coordinate"))),
    }
}
