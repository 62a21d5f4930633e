//! Study spot daemon.
//!
//! Keeps the enriched spot list in sync with the location store and serves
//! it over HTTP, together with the active route and proximity checks.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use axum::{
    extract::{Query, State},
    http::StatusCode,
    response::Json,
    routing::get,
    Router,
};
use clap::Parser;
use serde::{Deserialize, Serialize};
use tokio_util::sync::CancellationToken;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use tracing::{info, warn};
use tracing_subscriber::{EnvFilter, FmtSubscriber};

use studyspot::config::Config;
use studyspot::geocode::GoogleGeocoder;
use studyspot::models::{CreateOutcome, LocationRecord, NewStudySpot, Route};
use studyspot::routing::{GoogleDirections, MemoryViewport, RoutePhase};
use studyspot::store::{HttpLocationStore, LocationStore};
use studyspot::{
    Coordinates, GeoAddressResolver, LocationSyncEngine, ProximityGate, RouteCoordinator,
    SpotError, TravelMode,
};

const INIT_RETRY: Duration = Duration::from_secs(5);

#[derive(Parser, Debug)]
#[command(name = "spotd")]
#[command(about = "Study spot sync and routing daemon")]
struct Args {
    /// Listen address
    #[arg(short, long, default_value = "0.0.0.0:3002")]
    listen: String,

    /// Path to a TOML config file
    #[arg(short, long)]
    config: Option<PathBuf>,
}

/// Application state shared across handlers
struct AppState {
    engine: Arc<LocationSyncEngine>,
    store: Arc<dyn LocationStore>,
    coordinator: RouteCoordinator,
    viewport: Arc<MemoryViewport>,
    gate: ProximityGate,
    default_mode: TravelMode,
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

    info!("Studyspot daemon");
    info!("Location store at {}", config.store.base_url);

    let store: Arc<dyn LocationStore> = Arc::new(HttpLocationStore::new(&config.store)?);
    let geocoder = GoogleGeocoder::new(&config.google).context("Failed to build geocoder")?;
    let resolver = Arc::new(GeoAddressResolver::new(Arc::new(geocoder), &config.geocode));
    let directions =
        GoogleDirections::new(&config.google).context("Failed to build directions client")?;

    let engine = Arc::new(LocationSyncEngine::new(
        Arc::clone(&store),
        Arc::clone(&resolver),
        &config.sync,
    ));

    let viewport = Arc::new(MemoryViewport::new());
    let coordinator = RouteCoordinator::new(Arc::new(directions), viewport.clone(), &config.routing);
    coordinator.set_on_travel_time_change(|travel_time| info!("Travel time: {}", travel_time));

    let shutdown = CancellationToken::new();

    tokio::spawn(initialize_resolver(Arc::clone(&resolver), shutdown.clone()));
    let sync_task = tokio::spawn({
        let engine = Arc::clone(&engine);
        let shutdown = shutdown.clone();
        async move { engine.run(shutdown).await }
    });

    let state = Arc::new(AppState {
        engine,
        store,
        coordinator,
        viewport,
        gate: ProximityGate::new(config.proximity.threshold_m),
        default_mode: config.routing.default_mode,
    });

    // Build router
    let app = Router::new()
        .route("/health", get(health_handler))
        .route("/v1/spots", get(spots_handler).post(create_spot_handler))
        .route(
            "/v1/route",
            get(route_status_handler)
                .post(select_route_handler)
                .delete(clear_route_handler),
        )
        .route("/v1/proximity", get(proximity_handler))
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http())
        .with_state(Arc::clone(&state));

    info!("Starting server on {}", args.listen);

    let listener = tokio::net::TcpListener::bind(&args.listen).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown({
            let shutdown = shutdown.clone();
            async move {
                tokio::select! {
                    _ = tokio::signal::ctrl_c() => info!("Shutdown signal received"),
                    _ = shutdown.cancelled() => {}
                }
                shutdown.cancel();
            }
        })
        .await?;

    shutdown.cancel();
    resolver.shutdown();
    state.coordinator.teardown();
    sync_task.await?;

    Ok(())
}

/// Keep trying to acquire the geocoding provider until it is ready
async fn initialize_resolver(resolver: Arc<GeoAddressResolver>, shutdown: CancellationToken) {
    loop {
        match resolver.initialize().await {
            Ok(()) => return,
            Err(e) => warn!(
                "Geocoder not ready, addresses will be unavailable: {} (retrying in {:?})",
                e, INIT_RETRY
            ),
        }

        tokio::select! {
            _ = shutdown.cancelled() => return,
            _ = tokio::time::sleep(INIT_RETRY) => {}
        }
    }
}

/// Map library errors onto HTTP responses
fn error_response(err: SpotError) -> (StatusCode, String) {
    let status = match &err {
        SpotError::StoreRejected { status, .. } => {
            StatusCode::from_u16(*status).unwrap_or(StatusCode::BAD_GATEWAY)
        }
        SpotError::NotReady { .. } => StatusCode::SERVICE_UNAVAILABLE,
        SpotError::Timeout(_) => StatusCode::GATEWAY_TIMEOUT,
        _ => StatusCode::BAD_GATEWAY,
    };
    tracing::error!("Request failed: {}", err);
    (status, err.to_string())
}

#[derive(Serialize)]
struct HealthResponse {
    status: &'static str,
    snapshot_sequence: u64,
}

/// Health check endpoint
async fn health_handler(State(state): State<Arc<AppState>>) -> Json<HealthResponse> {
    let snapshot = state.engine.current_snapshot();
    Json(HealthResponse {
        // Nothing published yet means the store has not answered
        status: if snapshot.sequence > 0 { "ok" } else { "degraded" },
        snapshot_sequence: snapshot.sequence,
    })
}

#[derive(Serialize)]
struct SpotView {
    #[serde(flatten)]
    record: LocationRecord,
    address: String,
}

#[derive(Serialize)]
struct SpotsResponse {
    sequence: u64,
    published_at: chrono::DateTime<chrono::Utc>,
    spots: Vec<SpotView>,
}

#[derive(Deserialize)]
struct SpotsParams {
    /// Name filter
    #[serde(default)]
    q: String,
}

/// Current snapshot of enriched spots, optionally filtered by name
async fn spots_handler(
    State(state): State<Arc<AppState>>,
    Query(params): Query<SpotsParams>,
) -> Json<SpotsResponse> {
    let snapshot = state.engine.current_snapshot();
    Json(SpotsResponse {
        sequence: snapshot.sequence,
        published_at: snapshot.published_at,
        spots: snapshot
            .search(&params.q)
            .map(|r| SpotView {
                address: r.display_address().to_string(),
                record: r.clone(),
            })
            .collect(),
    })
}

/// Create a study spot in the store
async fn create_spot_handler(
    State(state): State<Arc<AppState>>,
    Json(spot): Json<NewStudySpot>,
) -> Result<(StatusCode, Json<CreateOutcome>), (StatusCode, String)> {
    let outcome = state.store.create(&spot).await.map_err(error_response)?;
    let status = match outcome {
        CreateOutcome::Created { .. } => StatusCode::CREATED,
        CreateOutcome::AlreadyExists { .. } => StatusCode::OK,
    };
    Ok((status, Json(outcome)))
}

#[derive(Deserialize)]
struct SelectRouteBody {
    /// Current user position
    origin: Coordinates,
    /// Key of the destination spot
    key: String,
    mode: Option<TravelMode>,
}

#[derive(Serialize)]
struct RouteStatusResponse {
    #[serde(flatten)]
    phase: RoutePhase,
    overlay: Option<Route>,
}

fn route_status(state: &AppState) -> RouteStatusResponse {
    RouteStatusResponse {
        phase: state.coordinator.phase(),
        overlay: state.viewport.overlay(),
    }
}

/// Route to a spot from the user's position
async fn select_route_handler(
    State(state): State<Arc<AppState>>,
    Json(body): Json<SelectRouteBody>,
) -> Result<Json<RouteStatusResponse>, (StatusCode, String)> {
    let snapshot = state.engine.current_snapshot();
    let destination = snapshot
        .find(&body.key)
        .map(|r| r.coordinates)
        .ok_or_else(|| (StatusCode::NOT_FOUND, format!("unknown spot '{}'", body.key)))?;

    state.coordinator.update(
        body.origin,
        Some(destination),
        body.mode.unwrap_or(state.default_mode),
    );

    Ok(Json(route_status(&state)))
}

async fn clear_route_handler(State(state): State<Arc<AppState>>) -> Json<RouteStatusResponse> {
    state.coordinator.clear_destination();
    Json(route_status(&state))
}

async fn route_status_handler(State(state): State<Arc<AppState>>) -> Json<RouteStatusResponse> {
    Json(route_status(&state))
}

#[derive(Deserialize)]
struct ProximityParams {
    lat: f64,
    long: f64,
    key: String,
}

#[derive(Serialize)]
struct ProximityResponse {
    distance_m: f64,
    threshold_m: f64,
    within: bool,
}

/// Whether the user is close enough to rate a spot
async fn proximity_handler(
    State(state): State<Arc<AppState>>,
    Query(params): Query<ProximityParams>,
) -> Result<Json<ProximityResponse>, (StatusCode, String)> {
    let snapshot = state.engine.current_snapshot();
    let spot = snapshot
        .find(&params.key)
        .ok_or_else(|| (StatusCode::NOT_FOUND, format!("unknown spot '{}'", params.key)))?;

    let user = Coordinates::new(params.lat, params.long);
    let distance_m = state.gate.distance(user, spot.coordinates);

    Ok(Json(ProximityResponse {
        distance_m,
        threshold_m: state.gate.threshold_m(),
        within: studyspot::proximity::within_threshold(distance_m, state.gate.threshold_m()),
    }))
}
