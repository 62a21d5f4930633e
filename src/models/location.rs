//! Study spot records as served by the location store, and the enriched
//! snapshots published by the sync engine.

use chrono::{DateTime, Utc};
use geo::Point;
use serde::{Deserialize, Serialize};

/// Shown in place of an address whose lookup failed
pub const ADDRESS_UNAVAILABLE: &str = "Address unavailable";

/// Geographic position (lat/long), as used on the store wire format
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Coordinates {
    pub lat: f64,
    pub long: f64,
}

impl Coordinates {
    pub const fn new(lat: f64, long: f64) -> Self {
        Self { lat, long }
    }
}

impl From<Coordinates> for Point<f64> {
    fn from(c: Coordinates) -> Self {
        Point::new(c.long, c.lat)
    }
}

impl From<Point<f64>> for Coordinates {
    fn from(p: Point<f64>) -> Self {
        Self {
            lat: p.y(),
            long: p.x(),
        }
    }
}

impl std::fmt::Display for Coordinates {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{},{}", self.lat, self.long)
    }
}

/// Descriptive attributes of a spot. These may change between polls.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SpotAttributes {
    pub name: String,
    #[serde(default)]
    pub rating: f64,
    #[serde(rename = "requiresID", default)]
    pub requires_id: bool,
    #[serde(rename = "silentArea", default)]
    pub silent_area: bool,
    #[serde(rename = "openHours", default)]
    pub open_hours: String,
}

/// A single study spot.
///
/// `key` identifies the spot across polls. Coordinates are fixed once the
/// spot exists; only the attributes and the resolved address are refreshed.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LocationRecord {
    pub key: String,

    #[serde(rename = "location")]
    pub coordinates: Coordinates,

    #[serde(rename = "info")]
    pub attributes: SpotAttributes,

    /// Filled in by reverse geocoding; `None` when the lookup failed
    #[serde(
        rename = "resolvedAddress",
        default,
        skip_serializing_if = "Option::is_none"
    )]
    pub resolved_address: Option<String>,
}

impl LocationRecord {
    pub fn new(key: impl Into<String>, coordinates: Coordinates, attributes: SpotAttributes) -> Self {
        Self {
            key: key.into(),
            coordinates,
            attributes,
            resolved_address: None,
        }
    }

    /// Address for display, falling back to a sentinel
    pub fn display_address(&self) -> &str {
        self.resolved_address
            .as_deref()
            .unwrap_or(ADDRESS_UNAVAILABLE)
    }
}

/// The last fully enriched list of records.
///
/// Every record in a published snapshot has had its address lookup attempted.
#[derive(Debug, Clone, Serialize)]
pub struct Snapshot {
    /// Increments by one per publication; 0 is the empty startup snapshot
    pub sequence: u64,
    pub published_at: DateTime<Utc>,
    pub records: Vec<LocationRecord>,
}

impl Snapshot {
    pub fn empty() -> Self {
        Self {
            sequence: 0,
            published_at: Utc::now(),
            records: Vec::new(),
        }
    }

    /// Build the successor of this snapshot. Timestamps never go backwards,
    /// even if the wall clock does.
    pub fn next(&self, records: Vec<LocationRecord>) -> Self {
        Self {
            sequence: self.sequence + 1,
            published_at: Utc::now().max(self.published_at),
            records,
        }
    }

    pub fn find(&self, key: &str) -> Option<&LocationRecord> {
        self.records.iter().find(|r| r.key == key)
    }

    /// Records whose name contains `term`, ignoring case. An empty term
    /// matches everything.
    pub fn search<'a>(&'a self, term: &str) -> impl Iterator<Item = &'a LocationRecord> + 'a {
        let term = term.to_lowercase();
        self.records
            .iter()
            .filter(move |r| r.attributes.name.to_lowercase().contains(&term))
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}

impl Default for Snapshot {
    fn default() -> Self {
        Self::empty()
    }
}

/// Body of a spot creation request
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NewStudySpot {
    pub key: String,
    pub name: String,
    pub rating: f64,
    #[serde(rename = "IDRequired")]
    pub id_required: bool,
    #[serde(rename = "silentArea")]
    pub silent_area: bool,
    #[serde(rename = "openHours")]
    pub open_hours: String,
    pub comment: String,
    pub lat: f64,
    pub long: f64,
}

impl NewStudySpot {
    pub fn coordinates(&self) -> Coordinates {
        Coordinates::new(self.lat, self.long)
    }
}

/// Successful outcomes of a spot creation request
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum CreateOutcome {
    Created { message: String },
    /// The store already holds a spot with this key; nothing was written
    AlreadyExists { message: String },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_record_from_store_json() {
        let json = r#"{
            "_id": "66a1",
            "key": "X",
            "location": {"lat": 49.1, "long": -122.8},
            "info": {"name": "X", "rating": 4.5, "requiresID": false, "silentArea": true, "openHours": "9-5"}
        }"#;

        let record: LocationRecord = serde_json::from_str(json).unwrap();
        assert_eq!(record.key, "X");
        assert_eq!(record.coordinates, Coordinates::new(49.1, -122.8));
        assert!(record.attributes.silent_area);
        assert!(!record.attributes.requires_id);
        assert_eq!(record.attributes.open_hours, "9-5");
        assert!(record.resolved_address.is_none());
        assert_eq!(record.display_address(), ADDRESS_UNAVAILABLE);
    }

    #[test]
    fn test_snapshot_sequence_and_time_advance() {
        let first = Snapshot::empty();
        let second = first.next(Vec::new());
        let third = second.next(Vec::new());

        assert_eq!(second.sequence, 1);
        assert_eq!(third.sequence, 2);
        assert!(second.published_at >= first.published_at);
        assert!(third.published_at >= second.published_at);
    }

    fn named(key: &str, name: &str) -> LocationRecord {
        LocationRecord::new(
            key,
            Coordinates::new(49.0, -123.0),
            SpotAttributes {
                name: name.to_string(),
                rating: 0.0,
                requires_id: false,
                silent_area: false,
                open_hours: String::new(),
            },
        )
    }

    #[test]
    fn test_search_by_name() {
        let snapshot = Snapshot::empty().next(vec![
            named("lib", "Walter C. Koerner Library"),
            named("nest", "AMS Nest"),
            named("irving", "Irving K. Barber Learning Centre"),
        ]);

        assert_eq!(snapshot.search("").count(), 3);

        let keys: Vec<&str> = snapshot.search("koerner LIBRARY").map(|r| r.key.as_str()).collect();
        assert_eq!(keys, vec!["lib"]);

        let keys: Vec<&str> = snapshot.search("r").map(|r| r.key.as_str()).collect();
        assert_eq!(keys, vec!["lib", "irving"]);

        assert_eq!(snapshot.search("cafeteria").count(), 0);
    }

    #[test]
    fn test_new_spot_wire_names() {
        let spot = NewStudySpot {
            key: "Library".to_string(),
            name: "Library".to_string(),
            rating: 4.0,
            id_required: true,
            silent_area: false,
            open_hours: "8-8".to_string(),
            comment: "quiet upstairs".to_string(),
            lat: 49.0,
            long: -123.0,
        };

        let value = serde_json::to_value(&spot).unwrap();
        assert_eq!(value["IDRequired"], true);
        assert_eq!(value["silentArea"], false);
        assert_eq!(value["openHours"], "8-8");
        assert_eq!(value["long"], -123.0);
    }

    #[test]
    fn test_coordinates_point_axes() {
        let point: Point<f64> = Coordinates::new(49.0, -123.0).into();
        assert_eq!(point.x(), -123.0);
        assert_eq!(point.y(), 49.0);
        assert_eq!(Coordinates::from(point), Coordinates::new(49.0, -123.0));
    }
}
