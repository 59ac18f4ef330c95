use anyhow::{bail, Context, Result};
use chrono::Utc;
use clap::{Parser, Subcommand};
use offline_map::tiles::{TileKey, TileSource};
use offline_map::{Connectivity, FixedConnectivity, GeoPoint, MapContext, MapLoad, OfflineMapConfig};
use std::collections::BTreeMap;
use std::path::PathBuf;
use std::sync::Arc;

/// Intermediate stop of the demo route
const DEMO_STOP: GeoPoint = GeoPoint {
    latitude: -34.598374,
    longitude: -58.368144,
};

/// Destination of the demo route
const DEMO_DESTINATION: GeoPoint = GeoPoint {
    latitude: -34.591707,
    longitude: -58.372316,
};

#[derive(Parser, Debug)]
#[command(name = "offline_map")]
#[command(about = "Offline-first map tile cache and route fallback", long_about = None)]
struct Args {
    /// JSON config file (missing file = defaults)
    #[arg(long, default_value = "offline_map.json")]
    config: PathBuf,

    /// Cache directory (overrides config)
    #[arg(long)]
    cache_dir: Option<PathBuf>,

    /// Skip the connectivity probe and act as if offline
    #[arg(long)]
    offline: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Clear the tile cache and download the area around a point (when online)
    Refresh {
        #[arg(long, allow_negative_numbers = true)]
        lat: f64,
        #[arg(long, allow_negative_numbers = true)]
        lon: f64,
        #[arg(long)]
        min_zoom: Option<u8>,
        #[arg(long)]
        max_zoom: Option<u8>,
        #[arg(long)]
        radius: Option<u32>,
    },
    /// Resolve one tile through the offline-first source and write it to a file
    Tile {
        #[arg(long)]
        zoom: u8,
        #[arg(long)]
        x: u32,
        #[arg(long)]
        y: u32,
        #[arg(long)]
        out: PathBuf,
    },
    /// Compute a route, falling back to the cached one
    Route {
        /// Waypoint as "lat,lon" (repeat, in order)
        #[arg(long = "waypoint", allow_hyphen_values = true)]
        waypoints: Vec<GeoPoint>,
        /// Start of the demo route, used when no waypoints are given
        #[arg(long, allow_hyphen_values = true)]
        from: Option<GeoPoint>,
    },
    /// Show cache contents
    Status,
}

#[tokio::main]
async fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let args = Args::parse();

    let mut config = OfflineMapConfig::load(&args.config)
        .with_context(|| format!("Failed to load config {}", args.config.display()))?;
    if let Some(dir) = args.cache_dir {
        config.cache_dir = dir;
    }
    if let Command::Refresh {
        min_zoom,
        max_zoom,
        radius,
        ..
    } = &args.command
    {
        config.min_zoom = min_zoom.unwrap_or(config.min_zoom);
        config.max_zoom = max_zoom.unwrap_or(config.max_zoom);
        config.radius = radius.unwrap_or(config.radius);
    }

    let mut ctx = MapContext::new(config).context("Invalid configuration")?;
    if args.offline {
        ctx = ctx.with_connectivity(Arc::new(FixedConnectivity::new(false)));
    }

    match args.command {
        Command::Refresh { lat, lon, .. } => refresh(&ctx, GeoPoint::new(lat, lon)).await,
        Command::Tile { zoom, x, y, out } => tile(&ctx, TileKey::new(zoom, x, y), out).await,
        Command::Route { waypoints, from } => route(&ctx, waypoints, from).await,
        Command::Status => status(&ctx).await,
    }
}

async fn refresh(ctx: &MapContext, center: GeoPoint) -> Result<()> {
    if !center.is_valid() {
        bail!("Center out of range: {}", center);
    }

    println!("[{}] Map load at {}", ts_now(), center);
    match ctx.load_map(center).await? {
        MapLoad::Online(report) => {
            println!(
                "[{}] Stored {}/{} tiles ({} failed)",
                ts_now(),
                report.stored,
                report.requested,
                report.failed.len()
            );
            for key in &report.failed {
                println!("  failed: {}", key);
            }
        }
        MapLoad::Offline => {
            let cached = ctx.tile_store().await?.len().await?;
            println!("[{}] Offline, keeping {} cached tiles", ts_now(), cached);
        }
    }
    Ok(())
}

async fn tile(ctx: &MapContext, key: TileKey, out: PathBuf) -> Result<()> {
    if !key.is_valid() {
        bail!("Tile out of range: {}", key);
    }

    let source = ctx.tile_source().await?;
    let (origin, image) = source.resolve_with_origin(key).await;
    tokio::fs::write(&out, &image)
        .await
        .with_context(|| format!("Failed to write {}", out.display()))?;

    println!("[{}] Tile {} from {} ({} bytes) -> {}", ts_now(), key, origin, image.len(), out.display());
    Ok(())
}

async fn route(ctx: &MapContext, waypoints: Vec<GeoPoint>, from: Option<GeoPoint>) -> Result<()> {
    let waypoints = if waypoints.is_empty() {
        match from {
            Some(start) => vec![start, DEMO_STOP, DEMO_DESTINATION],
            None => bail!("Give at least two --waypoint values, or --from for the demo route"),
        }
    } else {
        waypoints
    };

    let proxy = ctx.routing_proxy().await?;
    let (origin, route) = proxy.compute_route_with_origin(&waypoints).await?;

    println!("[{}] Route ({})", ts_now(), origin);
    println!("  Waypoints: {}", route.waypoints.len());
    for wp in &route.waypoints {
        println!("    {}", wp);
    }
    println!("  Geometry points: {}", route.geometry.0.len());
    println!("  Path length: {:.0} m", route.length_m());
    if let Some(distance) = route.distance_m() {
        println!("  Service distance: {:.0} m", distance);
    }
    if let Some(duration) = route.duration_s() {
        println!("  Service duration: {:.0} s", duration);
    }
    Ok(())
}

async fn status(ctx: &MapContext) -> Result<()> {
    let store = ctx.tile_store().await?;
    let keys = store.keys().await?;

    println!("Tile store: {}", store.dir().display());
    println!("  Tiles: {}", keys.len());
    let mut per_zoom: BTreeMap<u8, usize> = BTreeMap::new();
    for key in &keys {
        *per_zoom.entry(key.zoom).or_default() += 1;
    }
    for (zoom, count) in per_zoom {
        println!("    z{}: {}", zoom, count);
    }

    let cache = ctx.route_cache().await?;
    match cache.load_record().await? {
        Some(record) => println!(
            "Cached route: {} waypoints, {} geometry points, saved {}",
            record.route.waypoints.len(),
            record.route.geometry.0.len(),
            record.saved_at.to_rfc3339()
        ),
        None => println!("Cached route: none"),
    }

    println!("Online: {}", ctx.connectivity().is_online().await);
    Ok(())
}

fn ts_now() -> String {
    Utc::now().format("%H:%M:%S").to_string()
}
