use super::Route;
use crate::types::GeoPoint;
use async_trait::async_trait;
use serde::Deserialize;
use serde_json::json;
use std::time::Duration;
use thiserror::Error;

/// Live routing failures
#[derive(Error, Debug, Clone)]
pub enum RoutingError {
    #[error("Network error: {0}")]
    Network(String),

    #[error("HTTP error: {0}")]
    Http(u16),

    #[error("Routing service error {code}: {message}")]
    Service { code: String, message: String },

    #[error("Routing service returned no route")]
    NoRoute,

    #[error("Invalid routing response: {0}")]
    InvalidResponse(String),
}

/// Request options for the live service
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RouteOptions {
    /// Travel profile, e.g. `driving`
    pub profile: String,
    /// Let the service reorder intermediate stops (endpoints stay fixed)
    pub optimize_waypoints: bool,
}

impl Default for RouteOptions {
    fn default() -> Self {
        RouteOptions {
            profile: "driving".to_string(),
            optimize_waypoints: true,
        }
    }
}

/// Live route computation
#[async_trait]
pub trait LiveRouter: Send + Sync {
    /// Candidate routes for `waypoints`, best first
    async fn route(&self, waypoints: &[GeoPoint], options: &RouteOptions) -> Result<Vec<Route>, RoutingError>;
}

#[derive(Debug, Deserialize)]
struct OsrmResponse {
    code: String,
    #[serde(default)]
    message: Option<String>,
    #[serde(default)]
    routes: Vec<serde_json::Value>,
    #[serde(default)]
    trips: Vec<serde_json::Value>,
    #[serde(default)]
    waypoints: Vec<OsrmWaypoint>,
}

#[derive(Debug, Deserialize)]
struct OsrmWaypoint {
    #[serde(default)]
    waypoint_index: Option<usize>,
}

#[derive(Debug, Deserialize)]
struct OsrmRoute {
    geometry: OsrmGeometry,
    distance: f64,
    duration: f64,
}

#[derive(Debug, Deserialize)]
struct OsrmGeometry {
    coordinates: Vec<[f64; 2]>,
}

/// OSRM HTTP API client
///
/// # Services
/// - `route` for a fixed visiting order
/// - `trip` with `source=first&destination=last&roundtrip=false` when
///   waypoint optimisation is requested
///
/// Geometry is requested as GeoJSON with `overview=full`. Coordinates go on
/// the wire as `lng,lat` pairs separated by `;`.
pub struct OsrmRouter {
    client: reqwest::Client,
    base_url: String,
}

impl OsrmRouter {
    pub fn new(base_url: &str, timeout: Duration, user_agent: &str) -> Self {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .user_agent(user_agent)
            .build()
            .unwrap_or_else(|_| reqwest::Client::new());

        OsrmRouter {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
        }
    }

    fn request_url(&self, waypoints: &[GeoPoint], options: &RouteOptions) -> String {
        let coords = waypoints
            .iter()
            .map(|p| format!("{},{}", p.longitude, p.latitude))
            .collect::<Vec<_>>()
            .join(";");

        if options.optimize_waypoints {
            format!(
                "{}/trip/v1/{}/{}?roundtrip=false&source=first&destination=last&overview=full&geometries=geojson",
                self.base_url, options.profile, coords
            )
        } else {
            format!(
                "{}/route/v1/{}/{}?overview=full&geometries=geojson",
                self.base_url, options.profile, coords
            )
        }
    }

    fn parse_response(
        body: &str,
        waypoints: &[GeoPoint],
        options: &RouteOptions,
    ) -> Result<Vec<Route>, RoutingError> {
        let response: OsrmResponse =
            serde_json::from_str(body).map_err(|e| RoutingError::InvalidResponse(e.to_string()))?;

        if response.code != "Ok" {
            return Err(RoutingError::Service {
                message: response.message.unwrap_or_default(),
                code: response.code,
            });
        }

        let (service, candidates) = if options.optimize_waypoints {
            ("trip", response.trips)
        } else {
            ("route", response.routes)
        };

        // Trip results visit the input waypoints in `waypoint_index` order
        let mut ordered = waypoints.to_vec();
        if options.optimize_waypoints && response.waypoints.len() == waypoints.len() {
            let mut indexed: Vec<(usize, GeoPoint)> = Vec::with_capacity(waypoints.len());
            for (wp, point) in response.waypoints.iter().zip(waypoints) {
                match wp.waypoint_index {
                    Some(idx) => indexed.push((idx, *point)),
                    None => break,
                }
            }
            if indexed.len() == waypoints.len() {
                indexed.sort_by_key(|(idx, _)| *idx);
                ordered = indexed.into_iter().map(|(_, p)| p).collect();
            }
        }

        let mut routes = Vec::with_capacity(candidates.len());
        for mut raw in candidates {
            let parsed: OsrmRoute = serde_json::from_value(raw.clone())
                .map_err(|e| RoutingError::InvalidResponse(e.to_string()))?;

            let path: Vec<GeoPoint> = parsed
                .geometry
                .coordinates
                .iter()
                .map(|[lng, lat]| GeoPoint::new(*lat, *lng))
                .collect();

            if let Some(obj) = raw.as_object_mut() {
                obj.remove("geometry");
            }
            let metadata = json!({
                "service": service,
                "profile": options.profile,
                "distance": parsed.distance,
                "duration": parsed.duration,
                "raw": raw,
            });

            routes.push(Route::new(ordered.clone(), path, metadata));
        }

        if routes.is_empty() {
            return Err(RoutingError::NoRoute);
        }
        Ok(routes)
    }
}

#[async_trait]
impl LiveRouter for OsrmRouter {
    async fn route(&self, waypoints: &[GeoPoint], options: &RouteOptions) -> Result<Vec<Route>, RoutingError> {
        let url = self.request_url(waypoints, options);
        log::debug!("Routing request {}", url);

        let response = self
            .client
            .get(&url)
            .send()
            .await
            .map_err(|e| RoutingError::Network(e.to_string()))?;

        let status = response.status();
        let body = response
            .text()
            .await
            .map_err(|e| RoutingError::Network(e.to_string()))?;

        // OSRM reports NoRoute and friends as 400 with a JSON body
        match Self::parse_response(&body, waypoints, options) {
            Err(RoutingError::InvalidResponse(_)) if !status.is_success() => {
                Err(RoutingError::Http(status.as_u16()))
            }
            result => result,
        }
    }
}
