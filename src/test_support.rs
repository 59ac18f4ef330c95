//! Local HTTP doubles for the tile server, the probe endpoint and OSRM.

use crate::tiles::TileKey;
use axum::extract::{Path, State};
use axum::http::{StatusCode, Uri};
use axum::response::{IntoResponse, Response};
use axum::routing::get;
use axum::{Json, Router};
use serde_json::json;
use std::collections::HashSet;
use std::net::SocketAddr;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use tokio::task::JoinHandle;

#[derive(Default)]
pub struct ServerState {
    requests: Mutex<Vec<String>>,
    failing_tiles: Mutex<HashSet<TileKey>>,
    routing_down: AtomicBool,
}

impl ServerState {
    fn record(&self, uri: &Uri) {
        self.requests.lock().unwrap().push(uri.to_string());
    }
}

pub struct TestServer {
    addr: SocketAddr,
    state: Arc<ServerState>,
    handle: JoinHandle<()>,
}

impl TestServer {
    pub async fn start() -> Self {
        let state = Arc::new(ServerState::default());
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();

        let app = Router::new()
            .route("/generate_204", get(|| async { StatusCode::NO_CONTENT }))
            .route(
                "/stall",
                get(|| async {
                    tokio::time::sleep(std::time::Duration::from_secs(30)).await;
                    StatusCode::NO_CONTENT
                }),
            )
            .route("/tiles/:z/:x/:y", get(tile))
            .route("/route/v1/:profile/:coords", get(route))
            .route("/trip/v1/:profile/:coords", get(trip))
            .with_state(state.clone());

        let handle = tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });

        TestServer {
            addr,
            state,
            handle,
        }
    }

    pub fn url(&self, path: &str) -> String {
        format!("http://{}{}", self.addr, path)
    }

    pub fn tile_template(&self) -> String {
        self.url("/tiles/{z}/{x}/{y}")
    }

    pub fn fail_tile(&self, key: TileKey) {
        self.state.failing_tiles.lock().unwrap().insert(key);
    }

    pub fn set_routing_down(&self, down: bool) {
        self.state.routing_down.store(down, Ordering::SeqCst);
    }

    pub fn requests(&self) -> Vec<String> {
        self.state.requests.lock().unwrap().clone()
    }

    pub fn tile_requests(&self) -> Vec<String> {
        self.requests()
            .into_iter()
            .filter(|r| r.starts_with("/tiles/"))
            .collect()
    }
}

impl Drop for TestServer {
    fn drop(&mut self) {
        self.handle.abort();
    }
}

/// Body served for `key` by the test tile server
pub fn tile_image(key: TileKey) -> Vec<u8> {
    format!("PNG:{}", key).into_bytes()
}

/// URL on a port nothing listens on
pub fn unreachable_url() -> String {
    let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
    let addr = listener.local_addr().unwrap();
    drop(listener);
    format!("http://{}/generate_204", addr)
}

async fn tile(
    State(state): State<Arc<ServerState>>,
    Path((z, x, y)): Path<(u8, u32, u32)>,
    uri: Uri,
) -> Response {
    state.record(&uri);
    let key = TileKey::new(z, x, y);
    if state.failing_tiles.lock().unwrap().contains(&key) {
        return StatusCode::INTERNAL_SERVER_ERROR.into_response();
    }
    tile_image(key).into_response()
}

fn parse_coords(coords: &str) -> Vec<[f64; 2]> {
    coords
        .split(';')
        .filter_map(|pair| {
            let (lng, lat) = pair.split_once(',')?;
            Some([lng.parse().ok()?, lat.parse().ok()?])
        })
        .collect()
}

async fn route(
    State(state): State<Arc<ServerState>>,
    Path((_profile, coords)): Path<(String, String)>,
    uri: Uri,
) -> Response {
    state.record(&uri);
    if state.routing_down.load(Ordering::SeqCst) {
        return StatusCode::SERVICE_UNAVAILABLE.into_response();
    }
    let points = parse_coords(&coords);
    if points.len() < 2 {
        return (
            StatusCode::BAD_REQUEST,
            Json(json!({ "code": "InvalidQuery", "message": "need two coordinates" })),
        )
            .into_response();
    }

    Json(json!({
        "code": "Ok",
        "routes": [{
            "geometry": { "type": "LineString", "coordinates": points },
            "distance": 1234.5,
            "duration": 321.0,
            "legs": []
        }],
        "waypoints": points.iter().map(|p| json!({ "location": p, "name": "" })).collect::<Vec<_>>()
    }))
    .into_response()
}

async fn trip(
    State(state): State<Arc<ServerState>>,
    Path((_profile, coords)): Path<(String, String)>,
    uri: Uri,
) -> Response {
    state.record(&uri);
    if state.routing_down.load(Ordering::SeqCst) {
        return StatusCode::SERVICE_UNAVAILABLE.into_response();
    }
    let points = parse_coords(&coords);

    // Keep the endpoints, visit intermediate stops in reverse
    let mut order: Vec<usize> = (0..points.len()).collect();
    if points.len() > 3 {
        order[1..points.len() - 1].reverse();
    }
    let visit: Vec<[f64; 2]> = order.iter().map(|&i| points[i]).collect();

    let waypoints: Vec<_> = (0..points.len())
        .map(|i| {
            let position = order.iter().position(|&o| o == i).unwrap();
            json!({ "location": points[i], "waypoint_index": position, "trips_index": 0 })
        })
        .collect();

    Json(json!({
        "code": "Ok",
        "trips": [{
            "geometry": { "type": "LineString", "coordinates": visit },
            "distance": 2000.0,
            "duration": 400.0,
            "legs": []
        }],
        "waypoints": waypoints
    }))
    .into_response()
}
