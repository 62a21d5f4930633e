//! Add a study spot to the location store.
//!
//! Looks up the address of the chosen position first so the user can check
//! they picked the right place.

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Result;
use clap::Parser;
use tracing::{info, warn};
use tracing_subscriber::{EnvFilter, FmtSubscriber};

use studyspot::config::Config;
use studyspot::geocode::GoogleGeocoder;
use studyspot::models::{CreateOutcome, NewStudySpot, ADDRESS_UNAVAILABLE};
use studyspot::store::{HttpLocationStore, LocationStore};
use studyspot::GeoAddressResolver;

#[derive(Parser, Debug)]
#[command(name = "add-spot")]
#[command(about = "Create a study spot in the location store")]
struct Args {
    /// Latitude of the spot
    #[arg(long, allow_hyphen_values = true)]
    lat: f64,

    /// Longitude of the spot
    #[arg(long, allow_hyphen_values = true)]
    long: f64,

    /// Display name
    #[arg(short, long)]
    name: String,

    /// Unique key (defaults to the name)
    #[arg(short, long)]
    key: Option<String>,

    /// Rating from 0 to 5
    #[arg(long, default_value_t = 0.0)]
    rating: f64,

    /// A student ID is needed to get in
    #[arg(long)]
    id_required: bool,

    /// The spot has silent areas
    #[arg(long)]
    silent_area: bool,

    /// Opening hours, e.g. "9:00 AM - 9:00 PM"
    #[arg(long, default_value = "")]
    open_hours: String,

    /// First comment on the spot
    #[arg(long, default_value = "")]
    comment: String,

    /// Path to a TOML config file
    #[arg(short, long)]
    config: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize logging
    let subscriber = FmtSubscriber::builder()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .finish();
    tracing::subscriber::set_global_default(subscriber)?;

    let args = Args::parse();
    let config = Config::load(args.config.as_deref())?;

    let resolver = GeoAddressResolver::new(
        Arc::new(GoogleGeocoder::new(&config.google)?),
        &config.geocode,
    );
    let address = match resolver.initialize().await {
        Ok(()) => resolver.resolve(args.lat, args.long).await,
        Err(e) => Err(e),
    };
    match &address {
        Ok(address) => info!("Address: {}", address),
        Err(e) => warn!("Address: {} ({})", ADDRESS_UNAVAILABLE, e),
    }

    let spot = NewStudySpot {
        key: args.key.unwrap_or_else(|| args.name.clone()),
        name: args.name,
        rating: args.rating,
        id_required: args.id_required,
        silent_area: args.silent_area,
        open_hours: args.open_hours,
        comment: args.comment,
        lat: args.lat,
        long: args.long,
    };

    let store = HttpLocationStore::new(&config.store)?;
    match store.create(&spot).await? {
        CreateOutcome::Created { message } => {
            info!("Created '{}' at {}: {}", spot.key, spot.coordinates(), message)
        }
        CreateOutcome::AlreadyExists { message } => {
            warn!("'{}' was not created: {}", spot.key, message)
        }
    }

    Ok(())
}
