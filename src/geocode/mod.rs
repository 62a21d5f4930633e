//! Reverse geocoding: providers, the address cache and the resolver that
//! ties them together.

mod cache;
mod provider;
mod resolver;

pub use cache::{CoordKey, GeocodeCache};
pub use provider::{GeocodingProvider, GoogleGeocoder, NO_ADDRESS_FOUND};
pub use resolver::GeoAddressResolver;
