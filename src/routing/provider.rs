//! Directions providers.

use async_trait::async_trait;
use serde::Deserialize;
use tracing::debug;
use url::Url;

use crate::config::GoogleConfig;
use crate::error::{SpotError, SpotResult};
use crate::models::{Coordinates, Route, RouteLeg, RouteRequest};

/// A service that computes travel routes.
#[async_trait]
pub trait DirectionsProvider: Send + Sync {
    async fn compute_route(&self, request: &RouteRequest) -> SpotResult<Route>;
}

#[derive(Debug, Deserialize)]
struct DirectionsResponse {
    status: String,
    #[serde(default)]
    routes: Vec<RouteDto>,
}

#[derive(Debug, Deserialize)]
struct RouteDto {
    #[serde(default)]
    legs: Vec<LegDto>,
    overview_polyline: Option<PolylineDto>,
}

#[derive(Debug, Deserialize)]
struct PolylineDto {
    points: String,
}

#[derive(Debug, Deserialize)]
struct LegDto {
    duration: TextValue,
    distance: Option<TextValue>,
    start_location: LatLng,
    end_location: LatLng,
}

#[derive(Debug, Deserialize)]
struct TextValue {
    text: String,
}

#[derive(Debug, Deserialize)]
struct LatLng {
    lat: f64,
    lng: f64,
}

impl From<LatLng> for Coordinates {
    fn from(p: LatLng) -> Self {
        Coordinates::new(p.lat, p.lng)
    }
}

/// Google Directions API client
pub struct GoogleDirections {
    client: reqwest::Client,
    endpoint: Url,
    api_key: String,
}

impl GoogleDirections {
    pub fn new(config: &GoogleConfig) -> anyhow::Result<Self> {
        let client = reqwest::Client::builder()
            .user_agent("studyspot/0.1")
            .timeout(config.timeout())
            .build()?;

        Ok(Self {
            client,
            endpoint: Url::parse(&config.directions_url)?,
            api_key: config.api_key.clone(),
        })
    }

    fn request_url(&self, request: &RouteRequest) -> Url {
        let mut url = self.endpoint.clone();
        url.query_pairs_mut()
            .append_pair("origin", &request.origin.to_string())
            .append_pair("destination", &request.destination.to_string())
            .append_pair("mode", request.mode.as_query())
            .append_pair("key", &self.api_key);
        url
    }
}

#[async_trait]
impl DirectionsProvider for GoogleDirections {
    async fn compute_route(&self, request: &RouteRequest) -> SpotResult<Route> {
        if self.api_key.is_empty() {
            return Err(SpotError::NotReady {
                provider: "directions",
            });
        }

        debug!(
            "Requesting {} route {} -> {}",
            request.mode, request.origin, request.destination
        );

        let response = self.client.get(self.request_url(request)).send().await?;

        if !response.status().is_success() {
            return Err(SpotError::Network(format!(
                "directions endpoint returned HTTP {}",
                response.status()
            )));
        }

        let body: DirectionsResponse = response.json().await?;
        route_from_response(body)
    }
}

fn route_from_response(response: DirectionsResponse) -> SpotResult<Route> {
    if response.status != "OK" {
        return Err(SpotError::RouteFailed {
            status: response.status,
        });
    }

    let route = response
        .routes
        .into_iter()
        .next()
        .ok_or_else(|| SpotError::InvalidResponse("OK response without routes".to_string()))?;

    if route.legs.is_empty() {
        return Err(SpotError::InvalidResponse("route without legs".to_string()));
    }

    Ok(Route {
        legs: route
            .legs
            .into_iter()
            .map(|leg| RouteLeg {
                duration_text: leg.duration.text,
                distance_text: leg.distance.map(|d| d.text),
                start: leg.start_location.into(),
                end: leg.end_location.into(),
            })
            .collect(),
        polyline: route.overview_polyline.map(|p| p.points),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::TravelMode;

    fn parse(json: &str) -> SpotResult<Route> {
        route_from_response(serde_json::from_str(json).unwrap())
    }

    #[test]
    fn test_ok_route() {
        let route = parse(
            r#"{
                "status": "OK",
                "routes": [{
                    "legs": [{
                        "duration": {"text": "12 mins", "value": 720},
                        "distance": {"text": "9.8 km", "value": 9800},
                        "start_location": {"lat": 49.0, "lng": -123.0},
                        "end_location": {"lat": 49.1, "lng": -123.1}
                    }],
                    "overview_polyline": {"points": "a~l~Fjk~uOwHJy@P"}
                }]
            }"#,
        )
        .unwrap();

        assert_eq!(route.duration_text(), Some("12 mins"));
        assert_eq!(route.legs[0].distance_text.as_deref(), Some("9.8 km"));
        assert_eq!(route.legs[0].end, Coordinates::new(49.1, -123.1));
        assert!(route.polyline.is_some());
    }

    #[test]
    fn test_non_ok_status() {
        assert_eq!(
            parse(r#"{"status": "ZERO_RESULTS", "routes": []}"#),
            Err(SpotError::RouteFailed {
                status: "ZERO_RESULTS".to_string()
            })
        );
    }

    #[test]
    fn test_ok_without_legs_is_invalid() {
        assert!(matches!(
            parse(r#"{"status": "OK", "routes": [{"legs": []}]}"#),
            Err(SpotError::InvalidResponse(_))
        ));
        assert!(matches!(
            parse(r#"{"status": "OK", "routes": []}"#),
            Err(SpotError::InvalidResponse(_))
        ));
    }

    #[test]
    fn test_request_url() {
        let directions = GoogleDirections::new(&GoogleConfig {
            api_key: "k3y".to_string(),
            ..GoogleConfig::default()
        })
        .unwrap();

        let url = directions.request_url(&RouteRequest {
            origin: Coordinates::new(49.0, -123.0),
            destination: Coordinates::new(49.1, -123.1),
            mode: TravelMode::Walking,
        });

        assert_eq!(
            url.query(),
            Some("origin=49%2C-123&destination=49.1%2C-123.1&mode=walking&key=k3y")
        );
    }
}
