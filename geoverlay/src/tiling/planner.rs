//! Tile grid planner.
//!
//! Splits the combined working extent into an `n`×`n` grid that covers
//! it exactly. Interior edges are computed as `min + i * step`, so a
//! cell's max edge and its neighbor's min edge are the same float; the
//! last row and column are pinned to the extent's true max instead of
//! `min + n * step`, which can round short and leave a sliver no tile
//! owns.

use super::Tile;
use crate::geom::Rect;
use thiserror::Error;

/// Invalid partitioning input; fails the job before any work starts.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum PartitionError {
    #[error("tile count must be positive, got {0}")]
    InvalidTileCount(u32),

    #[error("working extent is degenerate: [{0:?}]")]
    DegenerateExtent(Rect),
}

/// Plans the `n`×`n` grid over `extent`, row-major.
pub fn plan(extent: Rect, n: u32) -> Result<Vec<Tile>, PartitionError> {
    if n == 0 {
        return Err(PartitionError::InvalidTileCount(0));
    }
    if extent.is_degenerate() {
        return Err(PartitionError::DegenerateExtent(extent));
    }

    let n = n as usize;
    let tile_width = extent.width() / n as f64;
    let tile_height = extent.height() / n as f64;

    let mut tiles = Vec::with_capacity(n * n);
    for row in 0..n {
        for col in 0..n {
            let min_x = extent.min_x + col as f64 * tile_width;
            let min_y = extent.min_y + row as f64 * tile_height;
            let max_x = if col == n - 1 {
                extent.max_x
            } else {
                extent.min_x + (col + 1) as f64 * tile_width
            };
            let max_y = if row == n - 1 {
                extent.max_y
            } else {
                extent.min_y + (row + 1) as f64 * tile_height
            };

            tiles.push(Tile {
                index: row * n + col,
                bounds: Rect::new(min_x, min_y, max_x, max_y),
            });
        }
    }

    Ok(tiles)
}
