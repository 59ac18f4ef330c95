//! Offline-first map tile cache and route fallback.
//!
//! Tiles are addressed with the slippy-map `(zoom, x, y)` scheme, downloaded
//! around a center point into a persistent store, and resolved per request
//! from the network or the store depending on connectivity. The most recent
//! live route is kept in a single durable slot and replayed when the routing
//! service cannot be reached.

pub mod config;
pub mod connectivity;
pub mod context;
pub mod error;
pub mod routing;
pub mod tiles;
pub mod types;

#[cfg(test)]
mod test_support;

pub use config::OfflineMapConfig;
pub use connectivity::{Connectivity, ConnectivityProbe, FixedConnectivity};
pub use context::{MapContext, MapLoad};
pub use error::{OfflineMapError, Result};
pub use routing::{Route, RouteCache, RouteOrigin, RoutingProxy};
pub use tiles::{TileKey, TileSource, TileStore};
pub use types::GeoPoint;
