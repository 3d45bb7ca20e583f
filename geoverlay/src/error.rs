//! Top-level analysis errors.
//!
//! Errors are categorized by pipeline stage; tile-level failures carry
//! the tile index so a failed job names the exact unit of work that
//! broke.

use crate::codec::DecodeError;
use crate::engine::EngineError;
use crate::layer::MergeError;
use crate::tiling::{MaterializeError, PartitionError};
use std::io;
use thiserror::Error;

/// Why one tile's worker run failed.
#[derive(Debug, Error)]
pub enum TileFailure {
    /// A spilled blob could not be read back.
    #[error("blob load failed: {0}")]
    Load(#[source] io::Error),

    /// A blob read back from the store did not decode.
    #[error("{slot} blob corrupt: {source}")]
    Decode {
        slot: &'static str,
        #[source]
        source: DecodeError,
    },

    /// The geometry engine rejected or failed the overlay.
    #[error(transparent)]
    Engine(#[from] EngineError),
}

/// A whole analysis job failed.
///
/// Partial results are discarded; the first stage to fail names the
/// job's terminal error even though in-flight tiles drain to
/// completion behind it.
#[derive(Debug, Error)]
pub enum AnalysisError {
    #[error("partitioning failed: {0}")]
    Partition(#[from] PartitionError),

    #[error("materialization failed: {0}")]
    Materialize(#[from] MaterializeError),

    /// One tile's overlay failed; the index identifies it.
    #[error("tile {tile} failed: {source}")]
    Tile {
        tile: usize,
        #[source]
        source: TileFailure,
    },

    #[error("result merge failed: {0}")]
    Merge(#[from] MergeError),

    #[error("reassembly failed: {0}")]
    Dissolve(#[source] EngineError),

    /// The progress callback requested cancellation.
    #[error("analysis cancelled")]
    Cancelled,

    /// Workers stopped before every tile reported. Whatever was merged
    /// is discarded rather than returned as a complete result.
    #[error("incomplete analysis: {received} of {expected} tile results received")]
    Incomplete { received: usize, expected: usize },

    /// Not a single worker thread could be started.
    #[error("worker pool failed to start: {0}")]
    WorkerSpawn(#[source] io::Error),

    /// Spill workspace could not be created.
    #[error("workspace setup failed: {0}")]
    Workspace(#[from] io::Error),
}
