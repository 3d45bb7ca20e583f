//! GeoVerlay CLI - Command-line interface
//!
//! This binary provides inspection tools over the GeoVerlay library:
//! dump layer blob metadata and print tile plans.

use clap::{Parser, Subcommand};
use geoverlay::codec;
use geoverlay::geom::Rect;
use geoverlay::tiling;
use std::fs;
use std::path::PathBuf;
use std::process;

#[derive(Parser)]
#[command(name = "geoverlay")]
#[command(version = geoverlay::VERSION)]
#[command(about = "Inspect GeoVerlay layer blobs and tile plans", long_about = None)]
struct Args {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Print the header metadata of a layer blob without decoding features
    Inspect {
        /// Path to a `.bin` layer blob
        blob: PathBuf,
    },
    /// Print the tile grid planned over an extent
    Plan {
        /// Extent minimum x
        #[arg(long)]
        min_x: f64,
        /// Extent minimum y
        #[arg(long)]
        min_y: f64,
        /// Extent maximum x
        #[arg(long)]
        max_x: f64,
        /// Extent maximum y
        #[arg(long)]
        max_y: f64,
        /// Grid dimension: the extent splits into tiles² cells
        #[arg(long, default_value = "2")]
        tiles: u32,
    },
}

fn main() {
    let args = Args::parse();
    let _logging = geoverlay::logging::init_logging();

    let result = match args.command {
        Command::Inspect { blob } => inspect(&blob),
        Command::Plan {
            min_x,
            min_y,
            max_x,
            max_y,
            tiles,
        } => plan(Rect::new(min_x, min_y, max_x, max_y), tiles),
    };

    if let Err(message) = result {
        eprintln!("Error: {}", message);
        process::exit(1);
    }
}

fn inspect(path: &PathBuf) -> Result<(), String> {
    let bytes = fs::read(path).map_err(|e| format!("reading {}: {}", path.display(), e))?;
    let meta = codec::peek_metadata(&bytes).map_err(|e| e.to_string())?;

    println!("Layer blob: {}", path.display());
    println!("  Size: {} bytes", bytes.len());
    println!("  Geometry type: {}", meta.geometry_type);
    if meta.spatial_ref.is_empty() {
        println!("  Spatial ref: (none)");
    } else {
        println!("  Spatial ref: {}", meta.spatial_ref);
    }
    println!("  Fields: {}", meta.field_count);
    println!("  Features: {}", meta.feature_count);
    Ok(())
}

fn plan(extent: Rect, tiles: u32) -> Result<(), String> {
    let grid = tiling::plan(extent, tiles).map_err(|e| e.to_string())?;

    println!(
        "Plan: {}x{} tiles over [{}, {}] - [{}, {}]",
        tiles, tiles, extent.min_x, extent.min_y, extent.max_x, extent.max_y
    );
    for tile in &grid {
        println!(
            "  tile {:>4}: [{}, {}] - [{}, {}]",
            tile.index, tile.bounds.min_x, tile.bounds.min_y, tile.bounds.max_x, tile.bounds.max_y
        );
    }
    Ok(())
}
