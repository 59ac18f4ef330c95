use crate::tiles::TileKey;
use thiserror::Error;

/// Offline map error types
#[derive(Error, Debug)]
pub enum OfflineMapError {
    /// Connectivity probe or a network call failed
    #[error("Network unreachable: {0}")]
    NetworkUnreachable(String),

    /// Tile absent from the local store
    #[error("Tile not found in cache: {0}")]
    TileNotFound(TileKey),

    /// Persistent store could not be opened or used
    #[error("Storage unavailable: {0}")]
    StorageUnavailable(String),

    /// Live routing failed and nothing was cached
    #[error("No route available: live routing failed and no cached route exists")]
    NoCachedRoute,

    #[error("Invalid parameters: {0}")]
    InvalidParameters(String),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Result type for cache and routing operations
pub type Result<T> = std::result::Result<T, OfflineMapError>;

/// I/O failure on one of the persistent stores
pub(crate) fn storage_error(action: &str, e: std::io::Error) -> OfflineMapError {
    OfflineMapError::StorageUnavailable(format!("Failed to {}: {}", action, e))
}
