use super::route::{Route, StoredRoute};
use crate::error::{storage_error, Result};
use chrono::{DateTime, Utc};
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use tokio::fs;

const ROUTE_FILE: &str = "last_route.json";

/// A route read back from the cache, with the time it was saved
#[derive(Clone, Debug, PartialEq)]
pub struct CachedRoute {
    pub route: Route,
    pub saved_at: DateTime<Utc>,
}

/// Single-slot durable store for the most recent route
///
/// The slot is `{cache_dir}/last_route.json`, pretty-printed JSON. `save`
/// replaces it unconditionally; the last writer wins.
#[derive(Clone, Debug)]
pub struct RouteCache {
    path: PathBuf,
}

impl RouteCache {
    pub async fn open(cache_dir: impl AsRef<Path>) -> Result<Self> {
        let dir = cache_dir.as_ref();
        fs::create_dir_all(dir)
            .await
            .map_err(|e| storage_error(&format!("create route cache dir {}", dir.display()), e))?;

        Ok(RouteCache {
            path: dir.join(ROUTE_FILE),
        })
    }

    pub async fn save(&self, route: &Route) -> Result<()> {
        let stored = StoredRoute::new(route, Utc::now());
        let json = serde_json::to_vec_pretty(&stored)?;

        let tmp = self.path.with_extension("json.tmp");
        fs::write(&tmp, json)
            .await
            .map_err(|e| storage_error(&format!("write {}", tmp.display()), e))?;
        fs::rename(&tmp, &self.path)
            .await
            .map_err(|e| storage_error(&format!("replace {}", self.path.display()), e))?;

        log::debug!(
            "Cached route with {} waypoints, {} geometry points",
            route.waypoints.len(),
            route.geometry.0.len()
        );
        Ok(())
    }

    /// The cached route, or `None` if nothing was ever saved
    pub async fn load(&self) -> Result<Option<Route>> {
        Ok(self.load_record().await?.map(|cached| cached.route))
    }

    pub async fn load_record(&self) -> Result<Option<CachedRoute>> {
        let json = match fs::read(&self.path).await {
            Ok(json) => json,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(storage_error(&format!("read {}", self.path.display()), e)),
        };

        let stored: StoredRoute = serde_json::from_slice(&json)?;
        let saved_at = stored.saved_at;
        Ok(Some(CachedRoute {
            route: stored.into(),
            saved_at,
        }))
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}
