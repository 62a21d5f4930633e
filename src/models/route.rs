//! Route requests and computed routes.

use serde::{Deserialize, Serialize};
use std::str::FromStr;

use super::Coordinates;

/// How the user intends to travel
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum TravelMode {
    #[default]
    Driving,
    Walking,
    Bicycling,
    Transit,
}

impl TravelMode {
    /// Value of the `mode` query parameter
    pub fn as_query(&self) -> &'static str {
        match self {
            TravelMode::Driving => "driving",
            TravelMode::Walking => "walking",
            TravelMode::Bicycling => "bicycling",
            TravelMode::Transit => "transit",
        }
    }
}

impl std::fmt::Display for TravelMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            TravelMode::Driving => write!(f, "DRIVING"),
            TravelMode::Walking => write!(f, "WALKING"),
            TravelMode::Bicycling => write!(f, "BICYCLING"),
            TravelMode::Transit => write!(f, "TRANSIT"),
        }
    }
}

impl FromStr for TravelMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_uppercase().as_str() {
            "DRIVING" => Ok(TravelMode::Driving),
            "WALKING" => Ok(TravelMode::Walking),
            "BICYCLING" => Ok(TravelMode::Bicycling),
            "TRANSIT" => Ok(TravelMode::Transit),
            other => Err(format!("unknown travel mode: {}", other)),
        }
    }
}

/// Inputs of a single route computation
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct RouteRequest {
    pub origin: Coordinates,
    pub destination: Coordinates,
    pub mode: TravelMode,
}

/// One leg of a computed route
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RouteLeg {
    /// Provider-formatted duration, e.g. "12 mins"
    pub duration_text: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub distance_text: Option<String>,
    pub start: Coordinates,
    pub end: Coordinates,
}

/// A computed route, ready to be drawn on a viewport
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Route {
    pub legs: Vec<RouteLeg>,
    /// Encoded overview polyline, if the provider sent one
    #[serde(skip_serializing_if = "Option::is_none")]
    pub polyline: Option<String>,
}

impl Route {
    /// Duration of the first leg
    pub fn duration_text(&self) -> Option<&str> {
        self.legs.first().map(|leg| leg.duration_text.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_travel_mode_parse() {
        assert_eq!("driving".parse::<TravelMode>(), Ok(TravelMode::Driving));
        assert_eq!("WALKING".parse::<TravelMode>(), Ok(TravelMode::Walking));
        assert!("teleport".parse::<TravelMode>().is_err());
    }

    #[test]
    fn test_travel_mode_wire_format() {
        let mode: TravelMode = serde_json::from_str("\"BICYCLING\"").unwrap();
        assert_eq!(mode, TravelMode::Bicycling);
        assert_eq!(mode.as_query(), "bicycling");
        assert_eq!(serde_json::to_string(&TravelMode::Transit).unwrap(), "\"TRANSIT\"");
    }
}
