use std::path::PathBuf;

use anyhow::Context;
use clap::{Parser, Subcommand};
use glam::DVec3;
use terrascape_chunk::{ChunkSystemConfig, LodGridChunkSystem, Zone};
use terrascape_common::TileCoordinates;
use terrascape_terrain::{
    Channel, ColorPart, Collector, Ground, GroundConfig, MemoryCollector, TexmapBuilder,
};
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "terrascape-cli", about = "CLI tool for terrascape operations")]
struct Cli {
    /// Enable verbose logging
    #[arg(short, long)]
    verbose: bool,

    /// Ground configuration (JSON); defaults are used when absent
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Print crate versions and the active ground configuration
    Info,
    /// Locate the LOD 0 zone containing a point and list its neighbours
    Zone {
        #[arg(long, allow_hyphen_values = true)]
        x: f64,
        #[arg(long, allow_hyphen_values = true)]
        y: f64,
        #[arg(long, allow_hyphen_values = true, default_value = "0")]
        z: f64,
        /// LOD 0 chunk size; defaults to the ground unit size
        #[arg(long)]
        base: Option<f64>,
    },
    /// Expand the LOD 0 zone containing a point and list its children
    Children {
        #[arg(long, allow_hyphen_values = true)]
        x: f64,
        #[arg(long, allow_hyphen_values = true)]
        y: f64,
        #[arg(long, allow_hyphen_values = true, default_value = "0")]
        z: f64,
        #[arg(long)]
        base: Option<f64>,
        /// Number of children to print
        #[arg(long, default_value = "8")]
        limit: usize,
    },
    /// Generate one terrain tile (and its ancestors) and print its stats
    Tile {
        #[arg(long, allow_hyphen_values = true)]
        x: i32,
        #[arg(long, allow_hyphen_values = true)]
        y: i32,
        #[arg(long, default_value = "0")]
        lod: i32,
        /// Print the heightfield as JSON
        #[arg(long)]
        json: bool,
    },
    /// Sample the altitude at a world position
    Sample {
        #[arg(long, allow_hyphen_values = true)]
        x: f64,
        #[arg(long, allow_hyphen_values = true)]
        y: f64,
        /// Sampling resolution in samples per metre
        #[arg(short, long, default_value = "0.1")]
        resolution: f64,
    },
    /// Collect terrain for the descendants of the zone containing a point
    Collect {
        #[arg(long, allow_hyphen_values = true)]
        x: f64,
        #[arg(long, allow_hyphen_values = true)]
        y: f64,
        #[arg(long, allow_hyphen_values = true, default_value = "0")]
        z: f64,
        /// Levels below the LOD 0 zone to descend
        #[arg(short, long, default_value = "1")]
        depth: u32,
        /// Also paint textures with a built-in palette
        #[arg(long)]
        textures: bool,
    },
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let filter = if cli.verbose { "debug" } else { "info" };
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::new(filter))
        .init();

    let config = match &cli.config {
        Some(path) => GroundConfig::from_json_file(path)
            .with_context(|| format!("loading ground config {}", path.display()))?,
        None => GroundConfig::default(),
    };

    match cli.command {
        Commands::Info => {
            println!("terrascape-cli v{}", env!("CARGO_PKG_VERSION"));
            println!("storage: {}", terrascape_storage::crate_info());
            println!("chunk: {}", terrascape_chunk::crate_info());
            println!("terrain: {}", terrascape_terrain::crate_info());
            println!("ground config: {}", serde_json::to_string_pretty(&config)?);
        }
        Commands::Zone { x, y, z, base } => {
            let mut chunks = chunk_system(&config, base)?;
            let zone = chunks.zone_at(DVec3::new(x, y, z))?;
            print_zone(&chunks, "zone", &zone)?;
            for neighbour in chunks.neighbour_zones(&zone)? {
                print_zone(&chunks, "  neighbour", &neighbour)?;
            }
        }
        Commands::Children {
            x,
            y,
            z,
            base,
            limit,
        } => {
            let mut chunks = chunk_system(&config, base)?;
            let zone = chunks.zone_at(DVec3::new(x, y, z))?;
            let children = chunks.children_zones(&zone)?;
            println!("{} children of {zone}", children.len());
            for child in children.iter().take(limit) {
                print_zone(&chunks, "  child", child)?;
            }
            println!("chunks materialised: {}", chunks.chunk_count());
        }
        Commands::Tile { x, y, lod, json } => {
            let mut ground = default_ground(config)?;
            let key = TileCoordinates::flat(x, y, lod);
            let terrain = ground.provide(key)?;
            if json {
                println!("{}", serde_json::to_string(terrain)?);
            } else {
                let (lo, hi) = terrain.height_range();
                let offset = terrain.offset();
                let size = terrain.size();
                println!("tile {key}: {0}x{0} samples", terrain.resolution());
                println!(
                    "  bounds: ({:.1}, {:.1}) + {:.1} m",
                    offset.x, offset.y, size.x
                );
                println!(
                    "  altitude: {:.1} .. {:.1} m",
                    offset.z + lo * size.z,
                    offset.z + hi * size.z
                );
            }
            println!("cache: {:?}", ground.stats());
        }
        Commands::Sample { x, y, resolution } => {
            let mut ground = default_ground(config)?;
            let lod = ground.level_for_resolution(resolution);
            let altitude = ground.altitude_at(x, y, resolution)?;
            println!("altitude at ({x}, {y}) [lod {lod}]: {altitude:.2} m");
        }
        Commands::Collect {
            x,
            y,
            z,
            depth,
            textures,
        } => {
            let mut chunks = chunk_system(&config, None)?;
            let mut ground = default_ground(config.clone())?;
            if textures {
                ground.set_texture_map(&default_palette(&config)?)?;
            }

            let mut zones = vec![chunks.zone_at(DVec3::new(x, y, z))?];
            for _ in 0..depth {
                let mut next = Vec::new();
                for zone in &zones {
                    next.extend(chunks.children_zones(zone)?);
                }
                zones = next;
            }

            let mut collector = MemoryCollector::new();
            let mut tiles = 0;
            for zone in &zones {
                let view = chunks.view(zone)?;
                tiles += ground.collect_zone(&view, &mut collector)?;
            }
            tracing::debug!(zones = zones.len(), tiles, "collection finished");
            println!("collected {tiles} tiles from {} zones", zones.len());
            for channel in Channel::ALL {
                if collector.wants(channel) {
                    let count = collector.keys().filter(|k| k.channel == channel).count();
                    println!("  {channel}: {count}");
                }
            }
            if let Some(first) = collector.keys().next() {
                println!("  first item: {first}");
            }
            println!("cache: {:?}", ground.stats());
        }
    }

    Ok(())
}

fn chunk_system(config: &GroundConfig, base: Option<f64>) -> anyhow::Result<LodGridChunkSystem> {
    let chunks = LodGridChunkSystem::with_config(ChunkSystemConfig {
        base_chunk_size: base.unwrap_or(config.unit_size),
        factor: config.factor,
        ..ChunkSystemConfig::default()
    })?;
    Ok(chunks)
}

fn default_ground(config: GroundConfig) -> anyhow::Result<Ground> {
    let mut ground = Ground::new(config)?;
    ground.set_default_worker_set();
    Ok(ground)
}

/// Water below sea level, grass and rock in between, snow on top.
fn default_palette(config: &GroundConfig) -> anyhow::Result<TexmapBuilder> {
    let min = config.min_altitude;
    let max = config.max_altitude;
    let mut builder = TexmapBuilder::new(min, max);
    builder.add_slice(min, vec![ColorPart::new(0.05, 0.15, 0.45, 1.0)])?;
    if min < 0.0 && max > 0.0 {
        builder.add_slice(
            0.0,
            vec![
                ColorPart::new(0.30, 0.55, 0.20, 2.0),
                ColorPart::new(0.45, 0.40, 0.30, 1.0),
            ],
        )?;
    }
    builder.add_slice(max, vec![ColorPart::new(0.95, 0.95, 0.97, 1.0)])?;
    Ok(builder)
}

fn print_zone(chunks: &LodGridChunkSystem, label: &str, zone: &Zone) -> anyhow::Result<()> {
    let view = chunks.view(zone)?;
    let offset = view.absolute_offset();
    println!(
        "{label} {zone}: offset ({:.1}, {:.1}, {:.1}), size {:.1}, resolution [{}, {})",
        offset.x,
        offset.y,
        offset.z,
        view.dimensions().x,
        view.min_resolution(),
        view.max_resolution()
    );
    Ok(())
}
