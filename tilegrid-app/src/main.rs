use anyhow::{bail, Context};
use clap::{Parser, ValueEnum};
use serde::Deserialize;
use std::path::PathBuf;
use std::time::{Duration, Instant};
use tilegrid::{
    CacheProfile, FilterConfig, GeoBounds, HeatmapSession, MemorySurface, TileGridOptions,
};

#[derive(Debug, Clone, Copy, ValueEnum)]
enum Profile {
    Balanced,
    LowResource,
    HighPerformance,
}

impl From<Profile> for CacheProfile {
    fn from(profile: Profile) -> Self {
        match profile {
            Profile::Balanced => CacheProfile::Balanced,
            Profile::LowResource => CacheProfile::LowResource,
            Profile::HighPerformance => CacheProfile::HighPerformance,
        }
    }
}

/// Replays viewports through a heatmap session and reports what got loaded
#[derive(Debug, Parser)]
#[command(version, about)]
struct Args {
    /// Directory serving metadata.json and tiles/
    #[arg(long)]
    base_url: Option<String>,

    /// JSON options file; overrides --profile
    #[arg(long)]
    config: Option<PathBuf>,

    #[arg(long, value_enum, default_value = "balanced")]
    profile: Profile,

    /// Viewport as west,south,east,north
    #[arg(long, value_parser = parse_bbox, allow_hyphen_values = true)]
    bbox: Option<GeoBounds>,

    #[arg(long, default_value_t = 10.0)]
    zoom: f64,

    /// JSON file with a list of `{ "bbox": [w, s, e, n], "zoom": z }`
    #[arg(long)]
    views: Option<PathBuf>,

    /// JSON filter configuration; the built-in tiers are used otherwise
    #[arg(long)]
    filter: Option<PathBuf>,

    /// How long to let each view load before moving on
    #[arg(long, default_value_t = 5_000)]
    wait_ms: u64,
}

#[derive(Debug, Deserialize)]
struct ScriptedView {
    bbox: [f64; 4],
    zoom: f64,
}

impl ScriptedView {
    fn bounds(&self) -> GeoBounds {
        let [west, south, east, north] = self.bbox;
        GeoBounds::new(west, east, south, north)
    }
}

fn parse_bbox(raw: &str) -> Result<GeoBounds, String> {
    let parts: Vec<f64> = raw
        .split(',')
        .map(|p| p.trim().parse::<f64>().map_err(|e| format!("{:?}: {}", p, e)))
        .collect::<Result<_, _>>()?;
    match parts.as_slice() {
        [west, south, east, north] => Ok(GeoBounds::new(*west, *east, *south, *north)),
        _ => Err(format!("expected west,south,east,north, got {:?}", raw)),
    }
}

fn load_options(args: &Args) -> anyhow::Result<TileGridOptions> {
    let mut options = match &args.config {
        Some(path) => TileGridOptions::from_file(path)
            .with_context(|| format!("reading options from {}", path.display()))?,
        None => CacheProfile::from(args.profile).resolve(),
    };
    if let Some(base_url) = &args.base_url {
        options.base_url = base_url.clone();
    }
    if options.base_url.is_empty() {
        bail!("no base URL: pass --base-url or set base_url in the config file");
    }
    options.validate()?;
    Ok(options)
}

fn load_views(args: &Args) -> anyhow::Result<Vec<ScriptedView>> {
    if let Some(path) = &args.views {
        let text = std::fs::read_to_string(path)
            .with_context(|| format!("reading views from {}", path.display()))?;
        return serde_json::from_str(&text).context("parsing views");
    }
    match args.bbox {
        Some(bounds) => Ok(vec![ScriptedView {
            bbox: [bounds.west, bounds.south, bounds.east, bounds.north],
            zoom: args.zoom,
        }]),
        None => bail!("nothing to replay: pass --bbox or --views"),
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    env_logger::init();
    let args = Args::parse();

    let options = load_options(&args)?;
    let views = load_views(&args)?;
    let tick = options.tick_interval();

    let mut session = HeatmapSession::with_http(options, MemorySurface::new());
    if let Some(path) = &args.filter {
        let text = std::fs::read_to_string(path)
            .with_context(|| format!("reading filter from {}", path.display()))?;
        session.set_filter(FilterConfig::from_json_str(&text)?);
    }

    let tiles = session
        .load_metadata()
        .await
        .context("loading grid metadata")?;
    println!("grid: {} tiles", tiles);

    for (index, view) in views.iter().enumerate() {
        session.on_move_end(view.bounds(), view.zoom);

        let deadline = Instant::now() + Duration::from_millis(args.wait_ms);
        while session.cache().has_loading() && Instant::now() < deadline {
            tokio::time::sleep(tick).await;
            session.tick();
        }

        let stats = session.cache().stats();
        println!(
            "view {} (zoom {}): {} visible, {} loaded, {} loading, {} failed",
            index,
            view.zoom,
            session.visible().len(),
            stats.loaded,
            stats.loading,
            stats.failed
        );
        for layer in session.surface().layer_ids() {
            println!("  {}", layer);
        }
    }

    println!("{}", serde_json::to_string_pretty(&session.cache().stats())?);
    if let Some(range) = session.cache().loaded_stats("kids_250k") {
        println!("kids_250k across loaded tiles: {} - {}", range.min, range.max);
    }

    log::debug!("evicted {} tiles on exit", session.clear());
    Ok(())
}
