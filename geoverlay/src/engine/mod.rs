//! The geometry-engine seam.
//!
//! All geometric predicate and overlay math lives behind
//! [`GeometryEngine`]; the core plans, schedules, serializes, and
//! merges, but never interprets geometry bytes itself. An engine is a
//! pure function over feature collections: it must not retain
//! references to its inputs, and its outputs are exclusively owned by
//! the caller.

mod progress;

pub use progress::{CancelFlag, ProgressFn, ProgressHandle, ProgressReply};

use crate::geom::Rect;
use crate::layer::{FeatureCollection, Geometry};
use std::fmt;
use thiserror::Error;

/// Binary overlay operations the engine must support.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum OverlayOp {
    Clip,
    Erase,
    Intersection,
    Union,
    SymmetricDifference,
    Identity,
    Update,
}

impl fmt::Display for OverlayOp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            OverlayOp::Clip => "clip",
            OverlayOp::Erase => "erase",
            OverlayOp::Intersection => "intersection",
            OverlayOp::Union => "union",
            OverlayOp::SymmetricDifference => "symmetric-difference",
            OverlayOp::Identity => "identity",
            OverlayOp::Update => "update",
        };
        write!(f, "{}", name)
    }
}

/// Geometry precision handling applied inside the engine.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PrecisionOptions {
    /// Snap grid size; 0.0 leaves coordinates untouched.
    pub grid_size: f64,
    pub preserve_topology: bool,
    pub keep_collapsed: bool,
}

impl Default for PrecisionOptions {
    fn default() -> Self {
        Self {
            grid_size: 0.0,
            preserve_topology: true,
            keep_collapsed: false,
        }
    }
}

/// Per-call options passed to every overlay invocation.
#[derive(Debug, Clone, PartialEq)]
pub struct OverlayOptions {
    /// Skip invalid geometries instead of failing the whole call.
    pub skip_invalid: bool,
    /// Promote results to the multi-geometry variant.
    pub promote_to_multi: bool,
    /// Keep lower-dimension collapse products (points/lines from
    /// polygon overlays). The tiled pipeline always discards them.
    pub keep_lower_dimension: bool,
    pub precision: Option<PrecisionOptions>,
}

impl Default for OverlayOptions {
    fn default() -> Self {
        Self {
            skip_invalid: true,
            promote_to_multi: true,
            keep_lower_dimension: false,
            precision: None,
        }
    }
}

/// The engine rejected or failed an operation.
#[derive(Debug, Clone, Error)]
pub enum EngineError {
    #[error("{op} failed: {message}")]
    OperationFailed { op: OverlayOp, message: String },

    #[error("geometry payload rejected: {0}")]
    InvalidGeometry(String),

    #[error("operation cancelled by progress hook")]
    Cancelled,

    #[error("engine internal error: {0}")]
    Internal(String),
}

/// External geometry library boundary.
///
/// Implementations are invoked concurrently from worker threads, one
/// call per tile, and must be safe to share (`Send + Sync`). Native
/// resources acquired for a call must be released before it returns;
/// the scheduler relies on that to bound peak memory by worker count
/// rather than tile count.
pub trait GeometryEngine: Send + Sync {
    /// Runs one binary overlay over two collections.
    ///
    /// When `progress` is supplied the engine should report through it
    /// periodically and honor a cancel reply by abandoning the call
    /// with [`EngineError::Cancelled`].
    fn overlay(
        &self,
        op: OverlayOp,
        input: &FeatureCollection,
        method: &FeatureCollection,
        options: &OverlayOptions,
        progress: Option<&ProgressHandle>,
    ) -> Result<FeatureCollection, EngineError>;

    /// Selects the features of `input` intersecting `rect` and clips
    /// them to it. Used by tile materialization; the result carries
    /// `input`'s schema.
    fn clip_to_rect(
        &self,
        input: &FeatureCollection,
        rect: Rect,
    ) -> Result<FeatureCollection, EngineError>;

    /// Unions a set of geometries into one. The dissolve primitive:
    /// reassembly feeds it the fragments of one split feature.
    fn union_geometries(&self, geometries: &[&Geometry]) -> Result<Geometry, EngineError>;

    /// Bounding rectangle of a collection's features, `None` when the
    /// collection has no geometry to measure.
    fn collection_extent(&self, collection: &FeatureCollection) -> Option<Rect>;
}
