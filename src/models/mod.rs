//! Core data models for study spots and routes.

pub mod location;
pub mod route;

pub use location::{
    Coordinates, CreateOutcome, LocationRecord, NewStudySpot, Snapshot, SpotAttributes,
    ADDRESS_UNAVAILABLE,
};
pub use route::{Route, RouteLeg, RouteRequest, TravelMode};
