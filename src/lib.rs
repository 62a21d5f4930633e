//! Studyspot - location synchronization and route coordination for finding
//! study spots nearby.
//!
//! This library provides the core components shared by the `spotd` daemon
//! and the `add-spot` tool.

pub mod config;
pub mod error;
pub mod geocode;
pub mod models;
pub mod proximity;
pub mod routing;
pub mod store;
pub mod sync;

pub use error::{SpotError, SpotResult};
pub use geocode::GeoAddressResolver;
pub use models::{Coordinates, LocationRecord, Snapshot, TravelMode};
pub use proximity::ProximityGate;
pub use routing::RouteCoordinator;
pub use sync::LocationSyncEngine;
