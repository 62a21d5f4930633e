//! Access to the remote location store.

mod http;

use async_trait::async_trait;

use crate::error::SpotResult;
use crate::models::{CreateOutcome, LocationRecord, NewStudySpot};

pub use http::HttpLocationStore;

/// The store that owns the list of study spots.
#[async_trait]
pub trait LocationStore: Send + Sync {
    /// Fetch every known spot, without resolved addresses.
    async fn fetch_all(&self) -> SpotResult<Vec<LocationRecord>>;

    /// Create a new spot.
    async fn create(&self, spot: &NewStudySpot) -> SpotResult<CreateOutcome>;
}
