use crate::types::GeoPoint;
use chrono::{DateTime, Utc};
use geo::{HaversineLength, LineString};
use serde::{Deserialize, Serialize};

/// A computed route
///
/// `metadata` is the routing service's payload, kept opaque.
#[derive(Clone, Debug, PartialEq)]
pub struct Route {
    pub waypoints: Vec<GeoPoint>,
    pub geometry: LineString<f64>,
    pub metadata: serde_json::Value,
}

impl Route {
    pub fn new(waypoints: Vec<GeoPoint>, path: Vec<GeoPoint>, metadata: serde_json::Value) -> Self {
        Route {
            waypoints,
            geometry: LineString::from_iter(path.into_iter().map(geo::Coord::from)),
            metadata,
        }
    }

    /// Geometry as ordered points
    pub fn path(&self) -> Vec<GeoPoint> {
        self.geometry.coords().map(|c| GeoPoint::from(*c)).collect()
    }

    /// Great-circle length of the geometry in meters
    pub fn length_m(&self) -> f64 {
        self.geometry.haversine_length()
    }

    /// Service-reported distance in meters, if present
    pub fn distance_m(&self) -> Option<f64> {
        self.metadata.get("distance").and_then(|v| v.as_f64())
    }

    /// Service-reported duration in seconds, if present
    pub fn duration_s(&self) -> Option<f64> {
        self.metadata.get("duration").and_then(|v| v.as_f64())
    }
}

/// Persisted form of a route (geo types don't derive Serialize)
///
/// Coordinates are stored as plain `(lat, lng)` pairs and rebuilt into
/// `GeoPoint`s and a `LineString` on load.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub(crate) struct StoredRoute {
    pub saved_at: DateTime<Utc>,
    pub waypoints: Vec<(f64, f64)>,
    pub geometry: Vec<(f64, f64)>,
    #[serde(default)]
    pub metadata: serde_json::Value,
}

impl StoredRoute {
    pub fn new(route: &Route, saved_at: DateTime<Utc>) -> Self {
        StoredRoute {
            saved_at,
            waypoints: route.waypoints.iter().map(|p| p.to_pair()).collect(),
            geometry: route.path().into_iter().map(GeoPoint::to_pair).collect(),
            metadata: route.metadata.clone(),
        }
    }
}

impl From<StoredRoute> for Route {
    fn from(stored: StoredRoute) -> Self {
        Route::new(
            stored.waypoints.into_iter().map(GeoPoint::from_pair).collect(),
            stored.geometry.into_iter().map(GeoPoint::from_pair).collect(),
            stored.metadata,
        )
    }
}
