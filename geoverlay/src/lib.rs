//! GeoVerlay - tiled geometric-overlay analysis
//!
//! This library runs binary overlay operations (clip, erase,
//! intersection, union, symmetric difference, identity, update) over
//! large feature collections by splitting the working extent into a
//! tile grid, overlaying the tiles concurrently, and stitching the
//! results back together. All geometry math is delegated to a caller
//! supplied [`engine::GeometryEngine`]; the core owns planning,
//! serialization, scheduling, and merging.
//!
//! # High-Level API
//!
//! ```ignore
//! use geoverlay::analysis::{intersection, AnalysisConfig};
//! use geoverlay::layer::FieldMergeStrategy;
//!
//! let config = AnalysisConfig::new()
//!     .with_tile_count(8)
//!     .with_merge_after_tiling(true);
//! let outcome = intersection(&engine, &parcels, &zones,
//!     FieldMergeStrategy::PrefixRight, &config)?;
//! println!("{} features", outcome.feature_count);
//! ```

pub mod analysis;
pub mod codec;
pub mod dissolve;
pub mod engine;
pub mod error;
pub mod geom;
pub mod layer;
pub mod logging;
pub mod tiling;

pub use analysis::{run_overlay, AnalysisConfig, AnalysisOutcome};
pub use error::{AnalysisError, TileFailure};

/// Version of the GeoVerlay library and CLI.
///
/// Synchronized across all workspace members; defined in `Cargo.toml`
/// and injected at compile time.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
