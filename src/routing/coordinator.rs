//! Lifecycle of the single active route overlay.

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use serde::Serialize;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use super::{DirectionsProvider, MapViewport};
use crate::config::RoutingConfig;
use crate::error::{SpotError, SpotResult};
use crate::models::{Coordinates, Route, RouteRequest, TravelMode};

/// Receives the travel time of each successfully rendered route
pub type TravelTimeCallback = Arc<dyn Fn(&str) + Send + Sync>;

/// Where the coordinator is in its lifecycle
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "phase", rename_all = "snake_case")]
pub enum RoutePhase {
    /// No destination, no overlay
    Idle,
    /// Waiting on the directions provider
    Computing { request: RouteRequest },
    /// The route for `request` is on the viewport
    Rendered {
        request: RouteRequest,
        travel_time: String,
    },
}

impl RoutePhase {
    /// The request this phase belongs to
    pub fn request(&self) -> Option<&RouteRequest> {
        match self {
            RoutePhase::Idle => None,
            RoutePhase::Computing { request } | RoutePhase::Rendered { request, .. } => {
                Some(request)
            }
        }
    }

    pub fn travel_time(&self) -> Option<&str> {
        match self {
            RoutePhase::Rendered { travel_time, .. } => Some(travel_time),
            _ => None,
        }
    }
}

struct CoordinatorState {
    phase: RoutePhase,
    /// Bumped whenever the desired route changes; results carry the value
    /// they were issued under
    generation: u64,
    pending: Vec<JoinHandle<()>>,
    on_travel_time: Option<TravelTimeCallback>,
    torn_down: bool,
}

struct CoordinatorCore {
    directions: Arc<dyn DirectionsProvider>,
    viewport: Arc<dyn MapViewport>,
    timeout: Duration,
    state: Mutex<CoordinatorState>,
}

impl CoordinatorCore {
    fn lock(&self) -> MutexGuard<'_, CoordinatorState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Apply a provider result, unless a newer request has taken over.
    fn complete(
        &self,
        generation: u64,
        request: RouteRequest,
        result: SpotResult<Route>,
    ) -> SpotResult<String> {
        let mut state = self.lock();

        let is_current = !state.torn_down
            && state.generation == generation
            && matches!(&state.phase, RoutePhase::Computing { request: active } if *active == request);
        if !is_current {
            return Err(SpotError::StaleResult);
        }

        let rendered = result.and_then(|route| {
            let travel_time = route
                .duration_text()
                .map(str::to_string)
                .ok_or_else(|| SpotError::InvalidResponse("route without legs".to_string()))?;
            Ok((travel_time, route))
        });

        match rendered {
            Ok((travel_time, route)) => {
                self.viewport.draw_route(&route);
                state.phase = RoutePhase::Rendered {
                    request,
                    travel_time: travel_time.clone(),
                };
                let callback = state.on_travel_time.clone();
                drop(state);

                // Unlocked, so listeners may query the coordinator
                if let Some(callback) = callback {
                    callback(&travel_time);
                }
                Ok(travel_time)
            }
            Err(e) => {
                self.viewport.clear_route();
                state.phase = RoutePhase::Idle;
                Err(e)
            }
        }
    }
}

/// Keeps exactly one route overlay on a [`MapViewport`], matching the latest
/// origin, destination and travel mode.
///
/// Requests run in the background. A result is applied only if its request
/// is still the current one when it arrives; anything else is dropped.
pub struct RouteCoordinator {
    core: Arc<CoordinatorCore>,
}

impl RouteCoordinator {
    pub fn new(
        directions: Arc<dyn DirectionsProvider>,
        viewport: Arc<dyn MapViewport>,
        config: &RoutingConfig,
    ) -> Self {
        Self {
            core: Arc::new(CoordinatorCore {
                directions,
                viewport,
                timeout: config.timeout(),
                state: Mutex::new(CoordinatorState {
                    phase: RoutePhase::Idle,
                    generation: 0,
                    pending: Vec::new(),
                    on_travel_time: None,
                    torn_down: false,
                }),
            }),
        }
    }

    /// Register the travel time listener. It runs on the task that applied
    /// the route, after the new phase is visible.
    pub fn set_on_travel_time_change<F>(&self, callback: F)
    where
        F: Fn(&str) + Send + Sync + 'static,
    {
        self.core.lock().on_travel_time = Some(Arc::new(callback));
    }

    /// Feed the latest inputs. A `None` destination clears the route.
    ///
    /// Must be called from within a Tokio runtime.
    pub fn update(&self, origin: Coordinates, destination: Option<Coordinates>, mode: TravelMode) {
        let Some(destination) = destination else {
            self.clear_destination();
            return;
        };
        let request = RouteRequest {
            origin,
            destination,
            mode,
        };

        let mut state = self.core.lock();
        if state.torn_down {
            warn!("Ignoring route update after teardown");
            return;
        }
        if state.phase.request() == Some(&request) {
            debug!("Route inputs unchanged");
            return;
        }

        if matches!(state.phase, RoutePhase::Rendered { .. }) {
            self.core.viewport.clear_route();
        }
        state.generation += 1;
        let generation = state.generation;
        state.phase = RoutePhase::Computing { request };

        let core = Arc::clone(&self.core);
        let task = tokio::spawn(async move {
            let result =
                match tokio::time::timeout(core.timeout, core.directions.compute_route(&request))
                    .await
                {
                    Ok(result) => result,
                    Err(_) => Err(SpotError::Timeout(core.timeout)),
                };

            match core.complete(generation, request, result) {
                Ok(travel_time) => info!(
                    "Route to {} ready: {} ({})",
                    request.destination, travel_time, request.mode
                ),
                Err(SpotError::StaleResult) => {
                    debug!("Discarding result for superseded route to {}", request.destination)
                }
                Err(e) => warn!("Route to {} failed: {}", request.destination, e),
            }
        });

        state.pending.retain(|t| !t.is_finished());
        state.pending.push(task);
    }

    /// Drop the destination: back to Idle with the overlay removed.
    pub fn clear_destination(&self) {
        let mut state = self.core.lock();
        if state.torn_down {
            return;
        }
        state.generation += 1;
        if state.phase != RoutePhase::Idle {
            debug!("Clearing route destination");
            self.core.viewport.clear_route();
            state.phase = RoutePhase::Idle;
        }
    }

    /// Stop for good: cancel pending requests and clear the overlay.
    pub fn teardown(&self) {
        let mut state = self.core.lock();
        if state.torn_down {
            return;
        }
        state.torn_down = true;
        state.generation += 1;
        for task in state.pending.drain(..) {
            task.abort();
        }
        self.core.viewport.clear_route();
        state.phase = RoutePhase::Idle;
        info!("Route coordinator torn down");
    }

    pub fn phase(&self) -> RoutePhase {
        self.core.lock().phase.clone()
    }

    /// Travel time of the rendered route, if any
    pub fn travel_time(&self) -> Option<String> {
        self.core.lock().phase.travel_time().map(str::to_string)
    }
}

impl Drop for RouteCoordinator {
    fn drop(&mut self) {
        self.teardown();
    }
}
