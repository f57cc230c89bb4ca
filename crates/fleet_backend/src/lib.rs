//! HTTP adapters and process wiring for the fleet settlement core.
//!
//! Every adapter implements one of the `fleet_core` collaborator traits with a
//! blocking `reqwest` client. Nothing here holds global state: the binary
//! builds each client from [`config::Settings`] and passes references down.

pub mod auth;
pub mod config;
pub mod geocoder;
pub mod logging;
pub mod osrm;
pub mod supabase;

use std::time::Duration;

use reqwest::blocking::Client;
use reqwest::Url;

/// Identifies this crate to public services that require a user agent.
pub const USER_AGENT: &str = concat!("fleetctl/", env!("CARGO_PKG_VERSION"));

pub(crate) fn http_client(timeout: Duration) -> Result<Client, reqwest::Error> {
    Client::builder()
        .timeout(timeout)
        .user_agent(USER_AGENT)
        .build()
}

/// Failure to construct an adapter.
#[derive(Debug, thiserror::Error)]
pub enum ClientError {
    #[error("invalid endpoint '{url}': {reason}")]
    InvalidEndpoint { url: String, reason: String },
    #[error("failed to build HTTP client: {0}")]
    Http(#[from] reqwest::Error),
}

/// Validate `url` as an absolute http(s) endpoint and strip trailing slashes.
pub(crate) fn endpoint(url: &str) -> Result<String, ClientError> {
    let trimmed = url.trim().trim_end_matches('/');
    let invalid = |reason: String| ClientError::InvalidEndpoint {
        url: url.to_string(),
        reason,
    };
    let parsed = Url::parse(trimmed).map_err(|err| invalid(err.to_string()))?;
    if !matches!(parsed.scheme(), "http" | "https") {
        return Err(invalid(format!("unsupported scheme '{}'", parsed.scheme())));
    }
    Ok(trimmed.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn endpoint_strips_trailing_slashes() {
        assert_eq!(
            endpoint(" https://example.supabase.co// ").expect("valid"),
            "https://example.supabase.co"
        );
    }

    #[test]
    fn endpoint_rejects_relative_and_foreign_schemes() {
        assert!(matches!(
            endpoint("example.supabase.co"),
            Err(ClientError::InvalidEndpoint { .. })
        ));
        assert!(matches!(
            endpoint("ftp://example.com"),
            Err(ClientError::InvalidEndpoint { .. })
        ));
    }
}
