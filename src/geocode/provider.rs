//! Reverse geocoding providers.

use async_trait::async_trait;
use serde::Deserialize;
use tracing::debug;
use url::Url;

use crate::config::GoogleConfig;
use crate::error::{SpotError, SpotResult};

/// Returned when the provider answers OK but without an address
pub const NO_ADDRESS_FOUND: &str = "No address found";

/// A service that turns coordinates into a human-readable address.
#[async_trait]
pub trait GeocodingProvider: Send + Sync {
    /// Check that the provider can serve requests.
    async fn ready(&self) -> SpotResult<()> {
        Ok(())
    }

    /// Resolve a position to a formatted address.
    async fn reverse_geocode(&self, lat: f64, long: f64) -> SpotResult<String>;
}

#[derive(Debug, Deserialize)]
struct GeocodeResponse {
    status: String,
    #[serde(default)]
    results: Vec<GeocodeResult>,
}

#[derive(Debug, Deserialize)]
struct GeocodeResult {
    formatted_address: Option<String>,
}

/// Google Geocoding API client
pub struct GoogleGeocoder {
    client: reqwest::Client,
    endpoint: Url,
    api_key: String,
}

impl GoogleGeocoder {
    pub fn new(config: &GoogleConfig) -> anyhow::Result<Self> {
        let client = reqwest::Client::builder()
            .user_agent("studyspot/0.1")
            .timeout(config.timeout())
            .build()?;

        Ok(Self {
            client,
            endpoint: Url::parse(&config.geocode_url)?,
            api_key: config.api_key.clone(),
        })
    }

    fn request_url(&self, lat: f64, long: f64) -> Url {
        let mut url = self.endpoint.clone();
        url.query_pairs_mut()
            .append_pair("latlng", &format!("{},{}", lat, long))
            .append_pair("key", &self.api_key);
        url
    }
}

#[async_trait]
impl GeocodingProvider for GoogleGeocoder {
    async fn ready(&self) -> SpotResult<()> {
        if self.api_key.is_empty() {
            return Err(SpotError::NotReady {
                provider: "geocoding",
            });
        }
        Ok(())
    }

    async fn reverse_geocode(&self, lat: f64, long: f64) -> SpotResult<String> {
        debug!("Reverse geocoding ({}, {})", lat, long);

        let response = self.client.get(self.request_url(lat, long)).send().await?;

        if !response.status().is_success() {
            return Err(SpotError::Network(format!(
                "geocoding endpoint returned HTTP {}",
                response.status()
            )));
        }

        let body: GeocodeResponse = response.json().await?;
        address_from_response(body)
    }
}

fn address_from_response(response: GeocodeResponse) -> SpotResult<String> {
    if response.status != "OK" {
        return Err(SpotError::GeocodeFailed {
            status: response.status,
        });
    }

    Ok(response
        .results
        .into_iter()
        .next()
        .and_then(|r| r.formatted_address)
        .unwrap_or_else(|| NO_ADDRESS_FOUND.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(json: &str) -> SpotResult<String> {
        address_from_response(serde_json::from_str(json).unwrap())
    }

    #[test]
    fn test_ok_takes_first_result() {
        let address = parse(
            r#"{"status": "OK", "results": [
                {"formatted_address": "123 Main St"},
                {"formatted_address": "Surrey, BC"}
            ]}"#,
        );
        assert_eq!(address, Ok("123 Main St".to_string()));
    }

    #[test]
    fn test_ok_without_results() {
        assert_eq!(
            parse(r#"{"status": "OK", "results": []}"#),
            Ok(NO_ADDRESS_FOUND.to_string())
        );
    }

    #[test]
    fn test_non_ok_status_fails() {
        assert_eq!(
            parse(r#"{"status": "ZERO_RESULTS"}"#),
            Err(SpotError::GeocodeFailed {
                status: "ZERO_RESULTS".to_string()
            })
        );
    }

    #[test]
    fn test_request_url() {
        let config = GoogleConfig {
            api_key: "k3y".to_string(),
            ..GoogleConfig::default()
        };
        let geocoder = GoogleGeocoder::new(&config).unwrap();
        let url = geocoder.request_url(49.1, -122.8);
        assert_eq!(
            url.query(),
            Some("latlng=49.1%2C-122.8&key=k3y")
        );
    }

    #[tokio::test]
    async fn test_missing_key_is_not_ready() {
        let geocoder = GoogleGeocoder::new(&GoogleConfig::default()).unwrap();
        assert!(matches!(
            geocoder.ready().await,
            Err(SpotError::NotReady { .. })
        ));
    }
}
