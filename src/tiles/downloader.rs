use super::{TileFetch, TileKey, TileStore, MAX_ZOOM};
use crate::error::{OfflineMapError, Result};
use crate::types::GeoPoint;
use std::ops::RangeInclusive;
use std::sync::Arc;

/// Inclusive zoom range `[min, max]`
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ZoomRange {
    min: u8,
    max: u8,
}

impl ZoomRange {
    pub fn new(min: u8, max: u8) -> Result<Self> {
        if min > max {
            return Err(OfflineMapError::InvalidParameters(format!(
                "min zoom {} exceeds max zoom {}",
                min, max
            )));
        }
        if max > MAX_ZOOM {
            return Err(OfflineMapError::InvalidParameters(format!(
                "max zoom {} exceeds {}",
                max, MAX_ZOOM
            )));
        }
        Ok(ZoomRange { min, max })
    }

    pub fn levels(&self) -> RangeInclusive<u8> {
        self.min..=self.max
    }
}

/// Outcome of one refresh pass
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct RefreshReport {
    /// Tiles requested from the network
    pub requested: usize,
    /// Tiles fetched and written to the store
    pub stored: usize,
    /// Tiles skipped after a fetch or write failure
    pub failed: Vec<TileKey>,
}

impl RefreshReport {
    pub fn is_complete(&self) -> bool {
        self.failed.is_empty()
    }
}

/// Populates the tile store around a center point
///
/// # Download Strategy
/// - For every zoom level in range, the bounding tile set around the center
/// - Strictly sequential: one fetch in flight, each tile written as soon as it arrives
/// - A failed tile is logged and skipped; no retries, nothing propagated
///
/// The store is not cleared here. A full refresh clears it first (see
/// `MapContext::load_map`); an interrupted refresh leaves only the tiles
/// written so far.
pub struct TileDownloadManager {
    fetcher: Arc<dyn TileFetch>,
    store: TileStore,
}

impl TileDownloadManager {
    pub fn new(fetcher: Arc<dyn TileFetch>, store: TileStore) -> Self {
        TileDownloadManager { fetcher, store }
    }

    pub async fn refresh(&self, center: GeoPoint, zoom: ZoomRange, radius: u32) -> RefreshReport {
        let mut report = RefreshReport::default();

        for level in zoom.levels() {
            let keys = TileKey::bounding_set(center, level, radius);
            log::info!("Refreshing {} tiles at zoom {} around {}", keys.len(), level, center);

            for key in keys {
                report.requested += 1;

                let image = match self.fetcher.fetch(key).await {
                    Ok(image) => image,
                    Err(e) => {
                        log::warn!("Skipping tile {}: {}", key, e);
                        report.failed.push(key);
                        continue;
                    }
                };

                match self.store.put(key, &image).await {
                    Ok(()) => report.stored += 1,
                    Err(e) => {
                        log::warn!("Failed to store tile {}: {}", key, e);
                        report.failed.push(key);
                    }
                }
            }
        }

        log::info!(
            "Refresh done: {}/{} tiles stored, {} failed",
            report.stored,
            report.requested,
            report.failed.len()
        );
        report
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::{tile_image, TestServer};
    use crate::tiles::HttpTileFetcher;
    use std::collections::HashSet;
    use std::time::Duration;

    const CENTER: GeoPoint = GeoPoint {
        latitude: -34.591707,
        longitude: -58.372316,
    };

    fn expected_keys(zoom: ZoomRange, radius: u32) -> HashSet<TileKey> {
        zoom.levels()
            .flat_map(|z| TileKey::bounding_set(CENTER, z, radius))
            .collect()
    }

    fn manager_for(server: &TestServer, store: TileStore) -> TileDownloadManager {
        let fetcher = HttpTileFetcher::new(&server.tile_template(), &[], Duration::from_secs(5), "test");
        TileDownloadManager::new(Arc::new(fetcher), store)
    }

    #[test]
    fn test_zoom_range_validation() {
        assert!(ZoomRange::new(13, 16).is_ok());
        assert!(ZoomRange::new(16, 13).is_err());
        assert!(ZoomRange::new(13, 20).is_err());
        assert_eq!(ZoomRange::new(13, 16).unwrap().levels().count(), 4);
    }

    #[tokio::test]
    async fn test_refresh_populates_union_of_bounding_sets() {
        let server = TestServer::start().await;
        let cache_dir = tempfile::tempdir().unwrap();
        let store = TileStore::open(cache_dir.path()).await.unwrap();

        // Unrelated tile from a previous center, removed by the clear
        store.put(TileKey::new(5, 1, 1), b"old").await.unwrap();
        store.clear().await.unwrap();

        let zoom = ZoomRange::new(13, 16).unwrap();
        let manager = manager_for(&server, store.clone());
        let report = manager.refresh(CENTER, zoom, 2).await;

        assert_eq!(report.requested, 100);
        assert_eq!(report.stored, 100);
        assert!(report.is_complete());

        let stored: HashSet<TileKey> = store.keys().await.unwrap().into_iter().collect();
        assert_eq!(stored, expected_keys(zoom, 2));

        for key in &stored {
            let image = store.get(*key).await.unwrap().unwrap();
            assert_eq!(image.as_ref(), tile_image(*key).as_slice());
        }
    }

    #[tokio::test]
    async fn test_refresh_requests_template_urls() {
        let server = TestServer::start().await;
        let cache_dir = tempfile::tempdir().unwrap();
        let store = TileStore::open(cache_dir.path()).await.unwrap();

        let zoom = ZoomRange::new(13, 16).unwrap();
        manager_for(&server, store).refresh(CENTER, zoom, 2).await;

        let requested: HashSet<String> = server.tile_requests().into_iter().collect();
        let expected: HashSet<String> = expected_keys(zoom, 2)
            .into_iter()
            .map(|k| format!("/tiles/{}/{}/{}", k.zoom, k.x, k.y))
            .collect();
        assert_eq!(requested, expected);
        assert_eq!(server.tile_requests().len(), 100);
    }

    #[tokio::test]
    async fn test_failed_tiles_are_skipped() {
        let server = TestServer::start().await;
        let cache_dir = tempfile::tempdir().unwrap();
        let store = TileStore::open(cache_dir.path()).await.unwrap();

        let center_tile = TileKey::from_point(CENTER, 14);
        server.fail_tile(center_tile);

        let zoom = ZoomRange::new(14, 14).unwrap();
        let report = manager_for(&server, store.clone()).refresh(CENTER, zoom, 1).await;

        assert_eq!(report.requested, 9);
        assert_eq!(report.stored, 8);
        assert_eq!(report.failed, vec![center_tile]);

        assert!(store.get(center_tile).await.unwrap().is_none());
        assert_eq!(store.len().await.unwrap(), 8);
        // Failed tile was requested exactly once
        let hits = server
            .tile_requests()
            .iter()
            .filter(|r| **r == format!("/tiles/14/{}/{}", center_tile.x, center_tile.y))
            .count();
        assert_eq!(hits, 1);
    }
}
