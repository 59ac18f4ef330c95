use super::{LiveRouter, Route, RouteCache, RouteOptions};
use crate::connectivity::Connectivity;
use crate::error::{OfflineMapError, Result};
use crate::types::GeoPoint;
use std::fmt::{Display, Formatter};
use std::sync::Arc;

/// Whether a route came from the live service or the cache
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum RouteOrigin {
    Live,
    Cached,
}

impl Display for RouteOrigin {
    fn fmt(&self, f: &mut Formatter) -> std::fmt::Result {
        match self {
            RouteOrigin::Live => write!(f, "live"),
            RouteOrigin::Cached => write!(f, "cached"),
        }
    }
}

/// Live routing with a fallback to the last cached route
///
/// # Algorithm
/// 1. Probe connectivity
/// 2. Online: ask the live router once; on success cache and return the first candidate
/// 3. Offline, or the live call failed: return the cached route, whatever
///    waypoints it was computed for
/// 4. Nothing cached, or the slot no longer decodes: `NoCachedRoute`
pub struct RoutingProxy {
    connectivity: Arc<dyn Connectivity>,
    router: Arc<dyn LiveRouter>,
    cache: RouteCache,
    options: RouteOptions,
}

impl RoutingProxy {
    pub fn new(
        connectivity: Arc<dyn Connectivity>,
        router: Arc<dyn LiveRouter>,
        cache: RouteCache,
        options: RouteOptions,
    ) -> Self {
        RoutingProxy {
            connectivity,
            router,
            cache,
            options,
        }
    }

    pub async fn compute_route(&self, waypoints: &[GeoPoint]) -> Result<Route> {
        Ok(self.compute_route_with_origin(waypoints).await?.1)
    }

    pub async fn compute_route_with_origin(&self, waypoints: &[GeoPoint]) -> Result<(RouteOrigin, Route)> {
        if waypoints.len() < 2 {
            return Err(OfflineMapError::InvalidParameters(format!(
                "a route needs at least 2 waypoints, got {}",
                waypoints.len()
            )));
        }
        if let Some(bad) = waypoints.iter().find(|p| !p.is_valid()) {
            return Err(OfflineMapError::InvalidParameters(format!(
                "waypoint out of range: {}",
                bad
            )));
        }

        if self.connectivity.is_online().await {
            match self.router.route(waypoints, &self.options).await {
                Ok(routes) => {
                    if let Some(route) = routes.into_iter().next() {
                        if let Err(e) = self.cache.save(&route).await {
                            log::warn!("Failed to cache route: {}", e);
                        }
                        return Ok((RouteOrigin::Live, route));
                    }
                    log::warn!("Live routing returned no candidates, falling back to cache");
                }
                Err(e) => log::warn!("Live routing failed, falling back to cache: {}", e),
            }
        } else {
            log::info!("Offline, serving cached route");
        }

        match self.cache.load().await {
            Ok(Some(route)) => Ok((RouteOrigin::Cached, route)),
            Ok(None) => Err(OfflineMapError::NoCachedRoute),
            Err(OfflineMapError::Serialization(e)) => {
                log::warn!("Cached route at {} is unreadable: {}", self.cache.path().display(), e);
                Err(OfflineMapError::NoCachedRoute)
            }
            Err(e) => Err(e),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::connectivity::FixedConnectivity;
    use crate::routing::RoutingError;
    use async_trait::async_trait;
    use serde_json::json;
    use std::sync::atomic::{AtomicUsize, Ordering};

    /// Router double: answers with a straight line, or fails
    struct StubRouter {
        fail: bool,
        calls: AtomicUsize,
    }

    impl StubRouter {
        fn new(fail: bool) -> Arc<Self> {
            Arc::new(StubRouter {
                fail,
                calls: AtomicUsize::new(0),
            })
        }
    }

    #[async_trait]
    impl LiveRouter for StubRouter {
        async fn route(&self, waypoints: &[GeoPoint], _options: &RouteOptions) -> std::result::Result<Vec<Route>, RoutingError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            if self.fail {
                return Err(RoutingError::Http(502));
            }
            Ok(vec![Route::new(
                waypoints.to_vec(),
                waypoints.to_vec(),
                json!({ "distance": 42.0 }),
            )])
        }
    }

    fn request() -> Vec<GeoPoint> {
        vec![GeoPoint::new(-34.60, -58.38), GeoPoint::new(-34.591707, -58.372316)]
    }

    fn other_request() -> Vec<GeoPoint> {
        vec![GeoPoint::new(40.0, -3.7), GeoPoint::new(40.4, -3.6)]
    }

    fn proxy(online: bool, router: Arc<StubRouter>, cache: RouteCache) -> RoutingProxy {
        RoutingProxy::new(
            Arc::new(FixedConnectivity::new(online)),
            router,
            cache,
            RouteOptions::default(),
        )
    }

    #[tokio::test]
    async fn test_online_success_caches_route() {
        let cache_dir = tempfile::tempdir().unwrap();
        let cache = RouteCache::open(cache_dir.path()).await.unwrap();
        let p = proxy(true, StubRouter::new(false), cache.clone());

        let (origin, route) = p.compute_route_with_origin(&request()).await.unwrap();
        assert_eq!(origin, RouteOrigin::Live);
        assert_eq!(route.waypoints, request());
        assert_eq!(cache.load().await.unwrap(), Some(route));
    }

    #[tokio::test]
    async fn test_offline_empty_cache_fails() {
        let cache_dir = tempfile::tempdir().unwrap();
        let cache = RouteCache::open(cache_dir.path()).await.unwrap();
        let router = StubRouter::new(false);
        let p = proxy(false, router.clone(), cache);

        assert!(matches!(
            p.compute_route(&request()).await,
            Err(OfflineMapError::NoCachedRoute)
        ));
        assert_eq!(router.calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_undecodable_slot_counts_as_no_route() {
        let cache_dir = tempfile::tempdir().unwrap();
        let cache = RouteCache::open(cache_dir.path()).await.unwrap();
        // Record written without a timestamp
        std::fs::write(cache.path(), br#"{"waypoints": [[1.0, 2.0]]}"#).unwrap();

        let offline = proxy(false, StubRouter::new(false), cache.clone());
        assert!(matches!(
            offline.compute_route(&request()).await,
            Err(OfflineMapError::NoCachedRoute)
        ));

        std::fs::write(cache.path(), b"{ not json").unwrap();
        let failing = proxy(true, StubRouter::new(true), cache);
        assert!(matches!(
            failing.compute_route(&request()).await,
            Err(OfflineMapError::NoCachedRoute)
        ));
    }

    #[tokio::test]
    async fn test_offline_returns_cached_regardless_of_request() {
        let cache_dir = tempfile::tempdir().unwrap();
        let cache = RouteCache::open(cache_dir.path()).await.unwrap();

        let cached = proxy(true, StubRouter::new(false), cache.clone())
            .compute_route(&request())
            .await
            .unwrap();

        let offline = proxy(false, StubRouter::new(false), cache);
        let (origin, route) = offline.compute_route_with_origin(&other_request()).await.unwrap();
        assert_eq!(origin, RouteOrigin::Cached);
        assert_eq!(route, cached);
        assert_eq!(route.waypoints, request());
    }

    #[tokio::test]
    async fn test_live_failure_falls_back_once() {
        let cache_dir = tempfile::tempdir().unwrap();
        let cache = RouteCache::open(cache_dir.path()).await.unwrap();
        let router = StubRouter::new(true);
        let p = proxy(true, router.clone(), cache.clone());

        assert!(matches!(
            p.compute_route(&request()).await,
            Err(OfflineMapError::NoCachedRoute)
        ));
        assert_eq!(router.calls.load(Ordering::SeqCst), 1);

        let seeded = Route::new(other_request(), other_request(), json!({}));
        cache.save(&seeded).await.unwrap();

        let (origin, route) = p.compute_route_with_origin(&request()).await.unwrap();
        assert_eq!(origin, RouteOrigin::Cached);
        assert_eq!(route, seeded);
        assert_eq!(router.calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_rejects_short_waypoint_list() {
        let cache_dir = tempfile::tempdir().unwrap();
        let cache = RouteCache::open(cache_dir.path()).await.unwrap();
        let p = proxy(true, StubRouter::new(false), cache);

        assert!(matches!(
            p.compute_route(&request()[..1]).await,
            Err(OfflineMapError::InvalidParameters(_))
        ));
        assert!(matches!(
            p.compute_route(&[GeoPoint::new(91.0, 0.0), GeoPoint::new(0.0, 0.0)]).await,
            Err(OfflineMapError::InvalidParameters(_))
        ));
    }
}
