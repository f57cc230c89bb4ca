use std::path::PathBuf;
use std::process::ExitCode;
use std::time::Duration;

use anyhow::{ensure, Context, Result};
use chrono::Utc;
use clap::{Parser, Subcommand, ValueEnum};
use fleet_backend::auth::AuthClient;
use fleet_backend::config::Settings;
use fleet_backend::geocoder::NominatimPlaceLookup;
use fleet_backend::logging;
use fleet_backend::osrm::OsrmRouteProvider;
use fleet_backend::supabase::SupabaseStore;
use fleet_core::deviation::{acknowledge_warning, AcknowledgingParty, DeviationMonitor};
use fleet_core::geocoding::CachedPlaceLookup;
use fleet_core::lifecycle::{cancel_trip, end_trip_manually};
use fleet_core::routing::{CachedRouteProvider, RouteProvider, StraightLineRouteProvider};
use fleet_core::settlement::TripSettlement;
use fleet_core::store::FleetStore;
use h3o::LatLng;
use serde::Serialize;
use serde_json::json;

#[derive(Parser)]
#[command(
    name = "fleetctl",
    about = "Settle trips and track route deviations against the fleet backend"
)]
struct Cli {
    /// Settings file; `fleet.toml` in the working directory is used when present
    #[arg(long, env = "FLEET_CONFIG")]
    config: Option<PathBuf>,
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Price a finished trip and release its vehicle, driver and consignment
    Settle {
        #[arg(long)]
        trip_id: String,
    },
    /// Close an ongoing trip without settling it
    EndTrip {
        #[arg(long)]
        trip_id: String,
        #[arg(long)]
        notes: Option<String>,
    },
    /// Cancel an ongoing trip
    CancelTrip {
        #[arg(long)]
        trip_id: String,
        #[arg(long)]
        reason: String,
    },
    /// Compare a live driver position against the trip's planned route
    CheckDeviation {
        #[arg(long)]
        trip_id: String,
        #[arg(long, allow_negative_numbers = true)]
        lat: f64,
        #[arg(long, allow_negative_numbers = true)]
        lng: f64,
    },
    /// Acknowledge a route deviation warning
    AckDeviation {
        #[arg(long)]
        warning_id: String,
        #[arg(long, value_enum)]
        party: Party,
    },
    /// Resume every settlement that stopped part-way
    Reconcile,
}

#[derive(Clone, Copy, ValueEnum)]
enum Party {
    Admin,
    Driver,
}

impl From<Party> for AcknowledgingParty {
    fn from(party: Party) -> Self {
        match party {
            Party::Admin => Self::Admin,
            Party::Driver => Self::Driver,
        }
    }
}

fn main() -> ExitCode {
    logging::init();
    let cli = Cli::parse();

    match run(cli) {
        Ok(true) => ExitCode::SUCCESS,
        // Ran, but left work behind (e.g. a reconciliation task).
        Ok(false) => ExitCode::from(2),
        Err(err) => {
            let message = format!("{err:#}");
            tracing::error!(error = %message, "fleetctl failed");
            println!("{}", json!({ "error": message }));
            ExitCode::FAILURE
        }
    }
}

fn run(cli: Cli) -> Result<bool> {
    let settings = Settings::load(cli.config.as_deref()).context("loading settings")?;
    let timeout = settings.request_timeout();
    let store = connect_store(&settings, timeout)?;

    match cli.command {
        Commands::Settle { trip_id } => {
            let places = place_lookup(&settings, timeout)?;
            let settlement = TripSettlement::new(&store, &places, settings.settlement.clone());
            let result = settlement
                .settle_trip_by_id(&trip_id)
                .with_context(|| format!("settling trip {trip_id}"))?;
            emit(&result)?;
            Ok(result.is_complete())
        }
        Commands::EndTrip { trip_id, notes } => {
            let trip = store.get_trip(&trip_id)?;
            let status = end_trip_manually(&store, &trip, notes.as_deref())?;
            emit(&json!({ "trip_id": trip_id, "status": status }))?;
            Ok(true)
        }
        Commands::CancelTrip { trip_id, reason } => {
            let trip = store.get_trip(&trip_id)?;
            let status = cancel_trip(&store, &trip, &reason)?;
            emit(&json!({ "trip_id": trip_id, "status": status }))?;
            Ok(true)
        }
        Commands::CheckDeviation { trip_id, lat, lng } => {
            ensure!(
                lat.abs() <= 90.0 && lng.abs() <= 180.0,
                "position {lat},{lng} is outside valid latitude/longitude ranges"
            );
            let observed = LatLng::new(lat, lng).context("invalid position")?;
            let places = place_lookup(&settings, timeout)?;
            let routes = route_provider(&settings, timeout)?;
            let trip = store.get_trip(&trip_id)?;
            let monitor = DeviationMonitor::new(&store, &places, &routes, settings.deviation);
            let warning = monitor.check(&trip, observed)?;
            emit(&json!({
                "trip_id": trip_id,
                "deviated": warning.is_some(),
                "warning": warning,
            }))?;
            Ok(true)
        }
        Commands::AckDeviation { warning_id, party } => {
            let warning = acknowledge_warning(&store, &warning_id, party.into(), Utc::now())?;
            emit(&warning)?;
            Ok(true)
        }
        Commands::Reconcile => {
            let places = place_lookup(&settings, timeout)?;
            let settlement = TripSettlement::new(&store, &places, settings.settlement.clone());
            let results = settlement.reconcile_pending()?;
            let complete = results.iter().filter(|result| result.is_complete()).count();
            emit(&json!({
                "pending": results.len(),
                "completed": complete,
                "results": results,
            }))?;
            Ok(complete == results.len())
        }
    }
}

fn connect_store(settings: &Settings, timeout: Duration) -> Result<SupabaseStore> {
    let store = SupabaseStore::new(&settings.supabase_url, &settings.supabase_anon_key, timeout)?;
    if let Some(token) = &settings.access_token {
        return Ok(store.with_access_token(token.clone()));
    }
    match (&settings.auth_email, &settings.auth_password) {
        (Some(email), Some(password)) => {
            let auth = AuthClient::new(&settings.supabase_url, &settings.supabase_anon_key, timeout)?;
            let session = auth
                .sign_in_with_password(email, password)
                .context("signing in")?;
            Ok(store.with_access_token(session.access_token))
        }
        _ => {
            tracing::warn!("no access token or credentials configured; using the anon key");
            Ok(store)
        }
    }
}

fn place_lookup(settings: &Settings, timeout: Duration) -> Result<CachedPlaceLookup> {
    let nominatim = NominatimPlaceLookup::new(&settings.geocoder_endpoint, timeout)?;
    Ok(CachedPlaceLookup::new(
        Box::new(nominatim),
        settings.geocode_cache_capacity,
    ))
}

fn route_provider(settings: &Settings, timeout: Duration) -> Result<CachedRouteProvider> {
    let inner: Box<dyn RouteProvider> = match &settings.osrm_endpoint {
        Some(url) => Box::new(OsrmRouteProvider::new(url, timeout)?),
        None => Box::new(StraightLineRouteProvider),
    };
    Ok(CachedRouteProvider::new(
        inner,
        settings.route_cache_capacity,
        true,
    ))
}

fn emit<T: Serialize>(value: &T) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}
