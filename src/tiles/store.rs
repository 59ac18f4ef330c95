use super::TileKey;
use crate::error::{storage_error, OfflineMapError, Result};
use bytes::Bytes;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use tokio::fs;

const SCHEMA_FILE: &str = "SCHEMA";
const SCHEMA_VERSION: &str = "1";
const TILE_EXTENSION: &str = "tile";

/// Persistent key/value store of tile imagery
///
/// # File Format
/// Tile files: `{cache_dir}/tiles/{zoom}-{x}-{y}.tile`, raw image bytes as
/// served by the tile server. `{cache_dir}/tiles/SCHEMA` holds the layout
/// version and is written on first open.
///
/// At most one file exists per key; `put` replaces it through a temporary
/// sibling and a rename, so readers see either the old or the new image.
#[derive(Clone, Debug)]
pub struct TileStore {
    dir: PathBuf,
}

impl TileStore {
    /// Open (and on first use, initialise) the store under `cache_dir`
    pub async fn open(cache_dir: impl AsRef<Path>) -> Result<Self> {
        let dir = cache_dir.as_ref().join("tiles");

        fs::create_dir_all(&dir)
            .await
            .map_err(|e| storage_error(&format!("create {}", dir.display()), e))?;

        let schema_path = dir.join(SCHEMA_FILE);
        match fs::read_to_string(&schema_path).await {
            Ok(version) if version.trim() == SCHEMA_VERSION => {}
            Ok(version) => {
                return Err(OfflineMapError::StorageUnavailable(format!(
                    "unsupported tile store schema '{}' in {}",
                    version.trim(),
                    dir.display()
                )));
            }
            Err(e) if e.kind() == ErrorKind::NotFound => {
                fs::write(&schema_path, SCHEMA_VERSION)
                    .await
                    .map_err(|e| storage_error("write schema marker", e))?;
                log::info!("Initialised tile store at {}", dir.display());
            }
            Err(e) => return Err(storage_error("read schema marker", e)),
        }

        Ok(TileStore { dir })
    }

    /// Insert or overwrite the image for `key`
    pub async fn put(&self, key: TileKey, image: &[u8]) -> Result<()> {
        let path = self.tile_path(key);
        let tmp = path.with_extension("tmp");

        fs::write(&tmp, image)
            .await
            .map_err(|e| storage_error(&format!("write tile {}", key), e))?;
        fs::rename(&tmp, &path)
            .await
            .map_err(|e| storage_error(&format!("commit tile {}", key), e))?;

        Ok(())
    }

    /// Image for `key`, or `None` if it was never downloaded
    pub async fn get(&self, key: TileKey) -> Result<Option<Bytes>> {
        match fs::read(self.tile_path(key)).await {
            Ok(data) => Ok(Some(Bytes::from(data))),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(None),
            Err(e) => Err(storage_error(&format!("read tile {}", key), e)),
        }
    }

    /// Like `get`, but absence is an error
    pub async fn require(&self, key: TileKey) -> Result<Bytes> {
        self.get(key)
            .await?
            .ok_or(OfflineMapError::TileNotFound(key))
    }

    /// Remove every tile. Returns the number of tiles removed.
    pub async fn clear(&self) -> Result<usize> {
        let mut removed = 0;
        let mut entries = fs::read_dir(&self.dir)
            .await
            .map_err(|e| storage_error("list tile store", e))?;

        while let Some(entry) = entries
            .next_entry()
            .await
            .map_err(|e| storage_error("list tile store", e))?
        {
            let path = entry.path();
            let is_tile = path.extension().map(|e| e == TILE_EXTENSION).unwrap_or(false);
            let is_partial = path.extension().map(|e| e == "tmp").unwrap_or(false);
            if !is_tile && !is_partial {
                continue;
            }

            fs::remove_file(&path)
                .await
                .map_err(|e| storage_error(&format!("remove {}", path.display()), e))?;
            if is_tile {
                removed += 1;
            }
        }

        log::debug!("Cleared {} tiles from {}", removed, self.dir.display());
        Ok(removed)
    }

    /// Keys of all stored tiles, in no particular order
    pub async fn keys(&self) -> Result<Vec<TileKey>> {
        let mut keys = Vec::new();
        let mut entries = fs::read_dir(&self.dir)
            .await
            .map_err(|e| storage_error("list tile store", e))?;

        while let Some(entry) = entries
            .next_entry()
            .await
            .map_err(|e| storage_error("list tile store", e))?
        {
            let path = entry.path();
            if !path.extension().map(|e| e == TILE_EXTENSION).unwrap_or(false) {
                continue;
            }
            let stem = path.file_stem().and_then(|s| s.to_str()).unwrap_or_default();
            match stem.parse::<TileKey>() {
                Ok(key) => keys.push(key),
                Err(e) => log::warn!("Ignoring unrecognised file {}: {}", path.display(), e),
            }
        }

        Ok(keys)
    }

    pub async fn len(&self) -> Result<usize> {
        Ok(self.keys().await?.len())
    }

    pub async fn is_empty(&self) -> Result<bool> {
        Ok(self.len().await? == 0)
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn tile_path(&self, key: TileKey) -> PathBuf {
        self.dir
            .join(format!("{}.{}", key.storage_key(), TILE_EXTENSION))
    }
}
