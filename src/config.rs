use crate::error::{OfflineMapError, Result};
use crate::routing::RouteOptions;
use crate::tiles::ZoomRange;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Runtime configuration
///
/// Every field has a default, so a config file only lists what it overrides.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct OfflineMapConfig {
    /// Root of the tile store and route slot
    pub cache_dir: PathBuf,
    /// Tile URL with `{z}`, `{x}`, `{y}` (and optional `{s}`) placeholders
    pub tile_url_template: String,
    pub subdomains: Vec<String>,
    /// Content-free endpoint used for reachability checks
    pub probe_url: String,
    pub probe_timeout_secs: u64,
    pub fetch_timeout_secs: u64,
    /// OSRM base URL
    pub routing_url: String,
    pub routing_profile: String,
    pub optimize_waypoints: bool,
    pub min_zoom: u8,
    pub max_zoom: u8,
    pub radius: u32,
    pub user_agent: String,
}

impl Default for OfflineMapConfig {
    fn default() -> Self {
        OfflineMapConfig {
            cache_dir: PathBuf::from("offline_map_cache"),
            tile_url_template: "https://tile.openstreetmap.org/{z}/{x}/{y}.png".to_string(),
            subdomains: vec!["a".to_string(), "b".to_string(), "c".to_string()],
            probe_url: "https://www.google.com/generate_204".to_string(),
            probe_timeout_secs: 5,
            fetch_timeout_secs: 30,
            routing_url: "https://router.project-osrm.org".to_string(),
            routing_profile: "driving".to_string(),
            optimize_waypoints: true,
            min_zoom: 13,
            max_zoom: 16,
            radius: 2,
            user_agent: format!("offline_map/{}", env!("CARGO_PKG_VERSION")),
        }
    }
}

impl OfflineMapConfig {
    /// Read a JSON config file; a missing file yields the defaults
    pub fn load(path: &Path) -> Result<Self> {
        let text = match std::fs::read_to_string(path) {
            Ok(text) => text,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                log::info!("No config at {}, using defaults", path.display());
                return Ok(Self::default());
            }
            Err(e) => return Err(e.into()),
        };

        let config: OfflineMapConfig = serde_json::from_str(&text)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        ZoomRange::new(self.min_zoom, self.max_zoom)?;

        for placeholder in ["{z}", "{x}", "{y}"] {
            if !self.tile_url_template.contains(placeholder) {
                return Err(OfflineMapError::InvalidParameters(format!(
                    "tile_url_template is missing {}",
                    placeholder
                )));
            }
        }
        if self.tile_url_template.contains("{s}") && self.subdomains.is_empty() {
            return Err(OfflineMapError::InvalidParameters(
                "tile_url_template uses {s} but no subdomains are configured".to_string(),
            ));
        }
        if self.user_agent.trim().is_empty() {
            return Err(OfflineMapError::InvalidParameters(
                "user_agent must not be empty".to_string(),
            ));
        }

        Ok(())
    }

    pub fn zoom_range(&self) -> Result<ZoomRange> {
        ZoomRange::new(self.min_zoom, self.max_zoom)
    }

    pub fn route_options(&self) -> RouteOptions {
        RouteOptions {
            profile: self.routing_profile.clone(),
            optimize_waypoints: self.optimize_waypoints,
        }
    }

    pub fn probe_timeout(&self) -> Duration {
        Duration::from_secs(self.probe_timeout_secs)
    }

    pub fn fetch_timeout(&self) -> Duration {
        Duration::from_secs(self.fetch_timeout_secs)
    }
}
