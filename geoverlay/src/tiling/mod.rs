//! Spatial partitioning: the tile planner, the per-job blob store, and
//! the materializer that clips both inputs into per-tile codec blobs.

mod materializer;
mod planner;
mod store;

pub use materializer::{materialize_pair, BlobSource, MaterializeError, TileTaskPair};
pub use planner::{plan, PartitionError};
pub use store::{JobWorkspace, LayerSlot};

use crate::geom::Rect;

/// One cell of the planned grid.
///
/// Indices are dense `0..n*n`, row-major, and stable for the lifetime
/// of a job; tile blobs and outcomes are keyed by them.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Tile {
    pub index: usize,
    pub bounds: Rect,
}
