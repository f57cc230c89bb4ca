//! Layered settings: built-in defaults, an optional TOML file, then `FLEET_*`
//! environment variables (`__` separates nested keys, e.g.
//! `FLEET_SETTLEMENT__MAX_STEP_ATTEMPTS=5`).

use std::path::Path;
use std::time::Duration;

use config::{Config, ConfigBuilder, ConfigError, Environment, File};
use fleet_core::deviation::DeviationConfig;
use fleet_core::rates::InvalidRateCard;
use fleet_core::settlement::SettlementConfig;
use serde::Deserialize;

pub const DEFAULT_CONFIG_FILE: &str = "fleet.toml";
pub const ENV_PREFIX: &str = "FLEET";

#[derive(Debug, thiserror::Error)]
pub enum SettingsError {
    #[error(transparent)]
    Load(#[from] ConfigError),
    #[error("setting '{0}' must not be empty")]
    Empty(&'static str),
    #[error("setting '{field}' is invalid: {reason}")]
    Invalid { field: &'static str, reason: String },
    #[error(transparent)]
    Rates(#[from] InvalidRateCard),
}

#[derive(Debug, Clone, Deserialize)]
pub struct Settings {
    pub supabase_url: String,
    pub supabase_anon_key: String,
    /// Pre-issued user token. When absent, `auth_email`/`auth_password` are
    /// used to sign in.
    pub access_token: Option<String>,
    pub auth_email: Option<String>,
    pub auth_password: Option<String>,
    pub geocoder_endpoint: String,
    /// Road routing for deviation checks. Straight lines are used without it.
    pub osrm_endpoint: Option<String>,
    pub request_timeout_secs: u64,
    pub geocode_cache_capacity: usize,
    pub route_cache_capacity: usize,
    #[serde(default)]
    pub settlement: SettlementConfig,
    #[serde(default)]
    pub deviation: DeviationConfig,
}

impl Settings {
    /// Load from `file` (or `fleet.toml` in the working directory when it
    /// exists) and the process environment.
    pub fn load(file: Option<&Path>) -> Result<Self, SettingsError> {
        Self::load_with(file, env_source())
    }

    /// Like [`Settings::load`] with an explicit environment source.
    pub fn load_with(file: Option<&Path>, env: Environment) -> Result<Self, SettingsError> {
        let file_source = match file {
            Some(path) => File::from(path).required(true),
            None => File::with_name(DEFAULT_CONFIG_FILE).required(false),
        };
        let settings: Settings = defaults()?
            .add_source(file_source)
            .add_source(env)
            .build()?
            .try_deserialize()?;
        settings.validate()?;
        Ok(settings)
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }

    pub fn validate(&self) -> Result<(), SettingsError> {
        for (field, value) in [
            ("supabase_url", &self.supabase_url),
            ("supabase_anon_key", &self.supabase_anon_key),
            ("geocoder_endpoint", &self.geocoder_endpoint),
        ] {
            if value.trim().is_empty() {
                return Err(SettingsError::Empty(field));
            }
        }
        if self.osrm_endpoint.as_deref().is_some_and(|url| url.trim().is_empty()) {
            return Err(SettingsError::Empty("osrm_endpoint"));
        }
        if self.request_timeout_secs == 0 {
            return Err(SettingsError::Invalid {
                field: "request_timeout_secs",
                reason: "must be at least 1".to_string(),
            });
        }
        if self.settlement.max_step_attempts == 0 {
            return Err(SettingsError::Invalid {
                field: "settlement.max_step_attempts",
                reason: "must be at least 1".to_string(),
            });
        }
        let threshold = self.deviation.threshold_m;
        if !threshold.is_finite() || threshold <= 0.0 {
            return Err(SettingsError::Invalid {
                field: "deviation.threshold_m",
                reason: format!("must be a positive distance, got {threshold}"),
            });
        }
        self.settlement.rates.validate()?;
        Ok(())
    }
}

fn env_source() -> Environment {
    Environment::with_prefix(ENV_PREFIX)
        .prefix_separator("_")
        .separator("__")
        .try_parsing(true)
}

fn defaults() -> Result<ConfigBuilder<config::builder::DefaultState>, ConfigError> {
    Config::builder()
        .set_default("geocoder_endpoint", "https://nominatim.openstreetmap.org")?
        .set_default("request_timeout_secs", 10)?
        .set_default("geocode_cache_capacity", 1024)?
        .set_default("route_cache_capacity", 256)
}
