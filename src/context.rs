use crate::config::OfflineMapConfig;
use crate::connectivity::{Connectivity, ConnectivityProbe};
use crate::error::{OfflineMapError, Result};
use crate::routing::{LiveRouter, OsrmRouter, RouteCache, RoutingProxy};
use crate::tiles::{
    HttpTileFetcher, OfflineFirstTileSource, RefreshReport, TileDownloadManager, TileFetch,
    TileStore,
};
use crate::types::GeoPoint;
use std::sync::Arc;
use tokio::sync::OnceCell;

/// Result of a map load
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum MapLoad {
    /// Network reachable: store cleared and repopulated around the center
    Online(RefreshReport),
    /// Network unreachable: cached tiles left as they were
    Offline,
}

/// Shared handles for the cache subsystem
///
/// Built once and passed to whatever needs it. Storage is opened lazily on
/// first use and reused afterwards; the network collaborators can be swapped
/// for other implementations.
pub struct MapContext {
    config: OfflineMapConfig,
    connectivity: Arc<dyn Connectivity>,
    fetcher: Arc<dyn TileFetch>,
    router: Arc<dyn LiveRouter>,
    tile_store: OnceCell<TileStore>,
    route_cache: OnceCell<RouteCache>,
}

impl MapContext {
    /// Context backed by the HTTP probe, tile server and OSRM from `config`
    pub fn new(config: OfflineMapConfig) -> Result<Self> {
        config.validate()?;

        let connectivity = ConnectivityProbe::new(&config.probe_url, config.probe_timeout(), &config.user_agent);
        let fetcher = HttpTileFetcher::new(
            &config.tile_url_template,
            &config.subdomains,
            config.fetch_timeout(),
            &config.user_agent,
        );
        let router = OsrmRouter::new(&config.routing_url, config.fetch_timeout(), &config.user_agent);

        Ok(MapContext {
            config,
            connectivity: Arc::new(connectivity),
            fetcher: Arc::new(fetcher),
            router: Arc::new(router),
            tile_store: OnceCell::new(),
            route_cache: OnceCell::new(),
        })
    }

    pub fn with_connectivity(mut self, connectivity: Arc<dyn Connectivity>) -> Self {
        self.connectivity = connectivity;
        self
    }

    pub fn with_fetcher(mut self, fetcher: Arc<dyn TileFetch>) -> Self {
        self.fetcher = fetcher;
        self
    }

    pub fn with_router(mut self, router: Arc<dyn LiveRouter>) -> Self {
        self.router = router;
        self
    }

    pub fn config(&self) -> &OfflineMapConfig {
        &self.config
    }

    pub fn connectivity(&self) -> Arc<dyn Connectivity> {
        self.connectivity.clone()
    }

    /// Tile store, opened on first call
    pub async fn tile_store(&self) -> Result<&TileStore> {
        self.tile_store
            .get_or_try_init(|| TileStore::open(&self.config.cache_dir))
            .await
    }

    /// Route slot, opened on first call
    pub async fn route_cache(&self) -> Result<&RouteCache> {
        self.route_cache
            .get_or_try_init(|| RouteCache::open(&self.config.cache_dir))
            .await
    }

    pub async fn tile_source(&self) -> Result<OfflineFirstTileSource> {
        Ok(OfflineFirstTileSource::new(
            self.connectivity.clone(),
            self.fetcher.clone(),
            self.tile_store().await?.clone(),
        ))
    }

    pub async fn download_manager(&self) -> Result<TileDownloadManager> {
        Ok(TileDownloadManager::new(
            self.fetcher.clone(),
            self.tile_store().await?.clone(),
        ))
    }

    pub async fn routing_proxy(&self) -> Result<RoutingProxy> {
        Ok(RoutingProxy::new(
            self.connectivity.clone(),
            self.router.clone(),
            self.route_cache().await?.clone(),
            self.config.route_options(),
        ))
    }

    /// Clear the tile store, then download the configured area around `center`
    ///
    /// Fails with `NetworkUnreachable`, leaving the store untouched, when the
    /// probe reports offline. Not atomic: if interrupted, the store holds only
    /// the tiles fetched so far for the new center.
    pub async fn full_refresh(&self, center: GeoPoint) -> Result<RefreshReport> {
        if !self.connectivity.is_online().await {
            return Err(OfflineMapError::NetworkUnreachable(format!(
                "no response from {}",
                self.config.probe_url
            )));
        }
        self.replace_area(center).await
    }

    async fn replace_area(&self, center: GeoPoint) -> Result<RefreshReport> {
        let zoom = self.config.zoom_range()?;
        let store = self.tile_store().await?;

        let removed = store.clear().await?;
        log::info!("Cleared {} cached tiles before refresh", removed);

        Ok(self
            .download_manager()
            .await?
            .refresh(center, zoom, self.config.radius)
            .await)
    }

    /// Map load: full refresh when online, cached tiles untouched when offline
    pub async fn load_map(&self, center: GeoPoint) -> Result<MapLoad> {
        if self.connectivity.is_online().await {
            Ok(MapLoad::Online(self.replace_area(center).await?))
        } else {
            log::info!("Offline at map load, serving cached tiles");
            // Open eagerly so a broken store surfaces here, not per tile
            self.tile_store().await?;
            Ok(MapLoad::Offline)
        }
    }
}
