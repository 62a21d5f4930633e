//! Error taxonomy shared by the sync, geocoding and routing components.
//!
//! Nothing here is fatal: every variant degrades one record or one route.

use std::time::Duration;
use thiserror::Error;

/// Errors surfaced by providers, the store and the coordinators.
///
/// `Clone` so that one coalesced lookup can hand its result to every waiter.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum SpotError {
    #[error("{provider} provider is not initialized")]
    NotReady { provider: &'static str },

    #[error("network error: {0}")]
    Network(String),

    #[error("geocoding failed with status {status}")]
    GeocodeFailed { status: String },

    #[error("directions request failed with status {status}")]
    RouteFailed { status: String },

    /// Result of a superseded request; discarded, never shown to users
    #[error("result belongs to a superseded request")]
    StaleResult,

    #[error("no response after {0:?}")]
    Timeout(Duration),

    #[error("operation cancelled")]
    Cancelled,

    #[error("store rejected request (HTTP {status}): {message}")]
    StoreRejected { status: u16, message: String },

    #[error("invalid response: {0}")]
    InvalidResponse(String),
}

pub type SpotResult<T> = std::result::Result<T, SpotError>;

impl From<reqwest::Error> for SpotError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_decode() {
            SpotError::InvalidResponse(err.to_string())
        } else if err.is_timeout() {
            SpotError::Network(format!("request timed out: {}", err))
        } else {
            SpotError::Network(err.to_string())
        }
    }
}
