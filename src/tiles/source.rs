use super::{TileFetch, TileKey, TileStore};
use crate::connectivity::Connectivity;
use async_trait::async_trait;
use bytes::Bytes;
use std::fmt::{Display, Formatter};
use std::sync::Arc;

/// 1x1 grayscale PNG returned when a tile cannot be resolved
pub const PLACEHOLDER_TILE: &[u8] = &[
    0x89, 0x50, 0x4e, 0x47, 0x0d, 0x0a, 0x1a, 0x0a, 0x00, 0x00, 0x00, 0x0d, 0x49, 0x48, 0x44,
    0x52, 0x00, 0x00, 0x00, 0x01, 0x00, 0x00, 0x00, 0x01, 0x08, 0x00, 0x00, 0x00, 0x00, 0x3a,
    0x7e, 0x9b, 0x55, 0x00, 0x00, 0x00, 0x0a, 0x49, 0x44, 0x41, 0x54, 0x78, 0x9c, 0x63, 0xb8,
    0x0b, 0x00, 0x00, 0xdf, 0x00, 0xde, 0x29, 0x79, 0x70, 0xb6, 0x00, 0x00, 0x00, 0x00, 0x49,
    0x45, 0x4e, 0x44, 0xae, 0x42, 0x60, 0x82,
];

/// Where a resolved tile image came from
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum TileOrigin {
    Network,
    Cache,
    Placeholder,
}

impl Display for TileOrigin {
    fn fmt(&self, f: &mut Formatter) -> std::fmt::Result {
        match self {
            TileOrigin::Network => write!(f, "network"),
            TileOrigin::Cache => write!(f, "cache"),
            TileOrigin::Placeholder => write!(f, "placeholder"),
        }
    }
}

/// Per-tile image resolution, injected into whatever renders the map
///
/// `resolve` never fails: it yields real imagery or the placeholder.
#[async_trait]
pub trait TileSource: Send + Sync {
    async fn resolve_with_origin(&self, key: TileKey) -> (TileOrigin, Bytes);

    async fn resolve(&self, key: TileKey) -> Bytes {
        self.resolve_with_origin(key).await.1
    }
}

/// Network when reachable, tile store otherwise
///
/// Connectivity is checked on every call, so concurrent resolves each act on
/// their own snapshot. The online path neither reads nor writes the store.
pub struct OfflineFirstTileSource {
    connectivity: Arc<dyn Connectivity>,
    fetcher: Arc<dyn TileFetch>,
    store: TileStore,
    placeholder: Bytes,
}

impl OfflineFirstTileSource {
    pub fn new(connectivity: Arc<dyn Connectivity>, fetcher: Arc<dyn TileFetch>, store: TileStore) -> Self {
        OfflineFirstTileSource {
            connectivity,
            fetcher,
            store,
            placeholder: Bytes::from_static(PLACEHOLDER_TILE),
        }
    }

    /// Replace the default placeholder image
    pub fn with_placeholder(mut self, placeholder: Bytes) -> Self {
        self.placeholder = placeholder;
        self
    }

    fn placeholder(&self) -> (TileOrigin, Bytes) {
        (TileOrigin::Placeholder, self.placeholder.clone())
    }
}

#[async_trait]
impl TileSource for OfflineFirstTileSource {
    async fn resolve_with_origin(&self, key: TileKey) -> (TileOrigin, Bytes) {
        if !key.is_valid() {
            log::debug!("Tile {} outside the grid", key);
            return self.placeholder();
        }

        if self.connectivity.is_online().await {
            return match self.fetcher.fetch(key).await {
                Ok(image) => (TileOrigin::Network, image),
                Err(e) => {
                    log::warn!("Live fetch of tile {} failed: {}", key, e);
                    self.placeholder()
                }
            };
        }

        match self.store.get(key).await {
            Ok(Some(image)) => (TileOrigin::Cache, image),
            Ok(None) => {
                log::debug!("Tile {} not cached", key);
                self.placeholder()
            }
            Err(e) => {
                log::warn!("Tile store read of {} failed: {}", key, e);
                self.placeholder()
            }
        }
    }
}
