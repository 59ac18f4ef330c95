pub mod downloader;
pub mod fetcher;
pub mod source;
pub mod store;
pub mod tile_key;

pub use downloader::{RefreshReport, TileDownloadManager, ZoomRange};
pub use fetcher::{FetchError, HttpTileFetcher, TileFetch};
pub use source::{OfflineFirstTileSource, TileOrigin, TileSource, PLACEHOLDER_TILE};
pub use store::TileStore;
pub use tile_key::{TileKey, MAX_ZOOM};
