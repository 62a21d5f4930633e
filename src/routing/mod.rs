//! Route computation and the overlay lifecycle on a map viewport.

mod coordinator;
mod provider;
mod viewport;

pub use coordinator::{RouteCoordinator, RoutePhase, TravelTimeCallback};
pub use provider::{DirectionsProvider, GoogleDirections};
pub use viewport::{MapViewport, MemoryViewport};
