pub mod cache;
pub mod osrm;
pub mod proxy;
pub mod route;

pub use cache::{CachedRoute, RouteCache};
pub use osrm::{LiveRouter, OsrmRouter, RouteOptions, RoutingError};
pub use proxy::{RouteOrigin, RoutingProxy};
pub use route::Route;
