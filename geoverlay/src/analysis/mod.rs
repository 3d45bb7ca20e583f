//! The tiled overlay driver.
//!
//! One job runs: inject synthetic group ids, compute the working
//! extent, plan the tile grid, materialize per-tile blobs, overlay the
//! tiles on a worker pool, merge the results, optionally reassemble
//! split features, and strip the synthetic columns. Peak memory scales
//! with worker count and tile size rather than input size.

mod aggregator;
mod worker;

pub use aggregator::DurationStats;
pub use worker::TileOutcome;

use crate::dissolve::dissolve_by_marker;
use crate::engine::{
    CancelFlag, GeometryEngine, OverlayOp, OverlayOptions, PrecisionOptions, ProgressFn,
    ProgressHandle,
};
use crate::error::AnalysisError;
use crate::layer::{build_result_schema, FeatureCollection, FieldMergeStrategy};
use crate::tiling::{self, JobWorkspace};
use std::fmt;
use std::io;
use std::sync::mpsc;
use std::sync::{Arc, Mutex};
use std::thread;
use tracing::{info, warn};
use uuid::Uuid;
use worker::{worker_loop, WorkerContext};

/// Name of the synthetic int64 column used to reunite tile fragments.
pub const GROUP_FIELD: &str = "ovl_group_id";

/// Tunable knobs for one analysis job.
#[derive(Clone, Default)]
pub struct AnalysisConfig {
    /// Grid dimension: the extent splits into `tile_count`² tiles.
    /// 0 or 1 both mean a single tile.
    pub tile_count: u32,
    /// Worker thread count; 0 picks the available hardware concurrency.
    pub max_workers: usize,
    /// Reassemble features split across tile boundaries.
    pub merge_after_tiling: bool,
    /// Fail on tile-result fields missing from the output schema
    /// instead of dropping them with a warning.
    pub strict_schema: bool,
    /// Write tile blobs to a temporary workspace instead of holding
    /// them in memory.
    pub spill_to_disk: bool,
    pub precision: Option<PrecisionOptions>,
    /// Invoked after each merged tile with `(fraction, message)`;
    /// returning `false` cancels the job.
    pub progress: Option<Arc<ProgressFn>>,
}

impl AnalysisConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_tile_count(mut self, tile_count: u32) -> Self {
        self.tile_count = tile_count;
        self
    }

    pub fn with_max_workers(mut self, max_workers: usize) -> Self {
        self.max_workers = max_workers;
        self
    }

    pub fn with_merge_after_tiling(mut self, merge: bool) -> Self {
        self.merge_after_tiling = merge;
        self
    }

    pub fn with_strict_schema(mut self, strict: bool) -> Self {
        self.strict_schema = strict;
        self
    }

    pub fn with_spill_to_disk(mut self, spill: bool) -> Self {
        self.spill_to_disk = spill;
        self
    }

    pub fn with_precision(mut self, precision: PrecisionOptions) -> Self {
        self.precision = Some(precision);
        self
    }

    pub fn with_progress(mut self, progress: Arc<ProgressFn>) -> Self {
        self.progress = Some(progress);
        self
    }

    fn effective_tile_count(&self) -> u32 {
        self.tile_count.max(1)
    }

    fn effective_workers(&self) -> usize {
        if self.max_workers > 0 {
            self.max_workers
        } else {
            thread::available_parallelism().map(|n| n.get()).unwrap_or(4)
        }
    }
}

impl fmt::Debug for AnalysisConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AnalysisConfig")
            .field("tile_count", &self.tile_count)
            .field("max_workers", &self.max_workers)
            .field("merge_after_tiling", &self.merge_after_tiling)
            .field("strict_schema", &self.strict_schema)
            .field("spill_to_disk", &self.spill_to_disk)
            .field("precision", &self.precision)
            .field("progress", &self.progress.as_ref().map(|_| "<callback>"))
            .finish()
    }
}

/// Lifecycle of one job, traced at each transition.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum JobState {
    Created,
    Dispatching,
    Running,
    Draining,
    Completed,
    Failed,
}

impl fmt::Display for JobState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            JobState::Created => "created",
            JobState::Dispatching => "dispatching",
            JobState::Running => "running",
            JobState::Draining => "draining",
            JobState::Completed => "completed",
            JobState::Failed => "failed",
        };
        write!(f, "{}", name)
    }
}

/// Final product of a successful job.
#[derive(Debug, Clone, PartialEq)]
pub struct AnalysisOutcome {
    pub collection: FeatureCollection,
    pub feature_count: usize,
}

/// Runs one tiled overlay end to end.
pub fn run_overlay(
    engine: &dyn GeometryEngine,
    op: OverlayOp,
    left: &FeatureCollection,
    right: &FeatureCollection,
    strategy: FieldMergeStrategy,
    config: &AnalysisConfig,
) -> Result<AnalysisOutcome, AnalysisError> {
    let job_id = Uuid::new_v4();
    info!(
        job = %job_id,
        %op,
        %strategy,
        tiles = config.effective_tile_count(),
        workers = config.effective_workers(),
        state = %JobState::Created,
        "overlay job"
    );

    let result = drive(engine, op, left, right, strategy, config, job_id);
    match &result {
        Ok(outcome) => info!(
            job = %job_id,
            features = outcome.feature_count,
            state = %JobState::Completed,
            "overlay job"
        ),
        Err(e) => warn!(job = %job_id, error = %e, state = %JobState::Failed, "overlay job"),
    }
    result
}

fn drive(
    engine: &dyn GeometryEngine,
    op: OverlayOp,
    left: &FeatureCollection,
    right: &FeatureCollection,
    strategy: FieldMergeStrategy,
    config: &AnalysisConfig,
    job_id: Uuid,
) -> Result<AnalysisOutcome, AnalysisError> {
    // Nothing to overlay: hand back the configured result schema with
    // zero features, no pool spun up.
    if left.is_empty() && right.is_empty() {
        let schema = build_result_schema(left, right, strategy);
        let collection =
            FeatureCollection::with_schema(left.geometry_type, left.spatial_ref.clone(), schema);
        return Ok(AnalysisOutcome {
            feature_count: 0,
            collection,
        });
    }

    // Synthetic ids tie tile fragments of one feature back together.
    // The right side only needs them when its fields make the output.
    let mut next_id = 1i64;
    let left = left.with_identifier_field(GROUP_FIELD, &mut next_id);
    let right = if strategy == FieldMergeStrategy::RightOnly {
        right.with_identifier_field(GROUP_FIELD, &mut next_id)
    } else {
        right.clone()
    };

    let schema = build_result_schema(&left, &right, strategy);
    let mut output =
        FeatureCollection::with_schema(left.geometry_type, left.spatial_ref.clone(), schema);

    let extent = match (
        engine.collection_extent(&left),
        engine.collection_extent(&right),
    ) {
        (Some(a), Some(b)) => a.union(&b),
        (Some(a), None) => a,
        (None, Some(b)) => b,
        (None, None) => {
            output.drop_fields_containing(GROUP_FIELD);
            return Ok(AnalysisOutcome {
                feature_count: 0,
                collection: output,
            });
        }
    };

    let tiles = tiling::plan(extent, config.effective_tile_count())?;
    let workers = config.effective_workers().min(tiles.len());

    let workspace = if config.spill_to_disk {
        Some(JobWorkspace::create(&std::env::temp_dir())?)
    } else {
        None
    };

    info!(job = %job_id, tiles = tiles.len(), state = %JobState::Dispatching, "overlay job");
    let pairs = tiling::materialize_pair(engine, &left, &right, &tiles, workers, workspace.as_ref())?;

    let cancel = CancelFlag::new();
    let callback: Arc<ProgressFn> = config
        .progress
        .clone()
        .unwrap_or_else(|| Arc::new(|_, _| true));
    let progress = ProgressHandle::register(callback, cancel.clone());

    let options = OverlayOptions {
        precision: config.precision,
        ..OverlayOptions::default()
    };

    let input_schema = FeatureCollection::empty_like(&left);
    let method_schema = FeatureCollection::empty_like(&right);
    let ctx = WorkerContext {
        engine,
        op,
        options,
        input_schema: &input_schema,
        method_schema: &method_schema,
        cancel,
    };

    let expected = pairs.len();
    let (task_tx, task_rx) = mpsc::channel();
    let task_rx = Mutex::new(task_rx);
    let (result_tx, result_rx) = mpsc::channel();

    let stats = thread::scope(|scope| {
        let mut spawned = 0usize;
        let mut spawn_error = None;
        for i in 0..workers {
            let builder = thread::Builder::new().name(format!("overlay-worker-{}", i));
            let ctx = &ctx;
            let task_rx = &task_rx;
            let result_tx = result_tx.clone();
            match builder.spawn_scoped(scope, move || {
                worker_loop(ctx, task_rx, &result_tx);
            }) {
                Ok(_) => spawned += 1,
                Err(e) => {
                    warn!(worker = i, error = %e, "failed to spawn worker");
                    spawn_error = Some(e);
                }
            }
        }
        drop(result_tx);
        if spawned == 0 {
            let e = spawn_error
                .unwrap_or_else(|| io::Error::other("worker pool configured with zero threads"));
            return Err(AnalysisError::WorkerSpawn(e));
        }
        info!(job = %job_id, state = %JobState::Running, "overlay job");

        for pair in pairs {
            if task_tx.send(pair).is_err() {
                break;
            }
        }
        drop(task_tx);

        info!(job = %job_id, state = %JobState::Draining, "overlay job");
        aggregator::aggregate(
            &result_rx,
            expected,
            &mut output,
            config.strict_schema,
            &progress,
        )
    })?;

    info!(
        job = %job_id,
        tiles = stats.count,
        avg_ms = stats.avg().as_millis() as u64,
        "tiles aggregated"
    );

    let mut collection = if config.merge_after_tiling {
        dissolve_by_marker(engine, output, GROUP_FIELD).map_err(AnalysisError::Dissolve)?
    } else {
        output
    };
    collection.drop_fields_containing(GROUP_FIELD);

    Ok(AnalysisOutcome {
        feature_count: collection.feature_count(),
        collection,
    })
}

macro_rules! overlay_entry {
    ($(#[$doc:meta])* $name:ident, $op:expr) => {
        $(#[$doc])*
        pub fn $name(
            engine: &dyn GeometryEngine,
            left: &FeatureCollection,
            right: &FeatureCollection,
            strategy: FieldMergeStrategy,
            config: &AnalysisConfig,
        ) -> Result<AnalysisOutcome, AnalysisError> {
            run_overlay(engine, $op, left, right, strategy, config)
        }
    };
}

overlay_entry!(
    /// Keeps the parts of `left` inside `right`.
    clip,
    OverlayOp::Clip
);
overlay_entry!(
    /// Keeps the parts of `left` outside `right`.
    erase,
    OverlayOp::Erase
);
overlay_entry!(
    /// Keeps the parts common to both inputs.
    intersection,
    OverlayOp::Intersection
);
overlay_entry!(
    /// Combines both inputs.
    union,
    OverlayOp::Union
);
overlay_entry!(
    /// Keeps the parts in exactly one input.
    symmetric_difference,
    OverlayOp::SymmetricDifference
);
overlay_entry!(
    /// `left` split by `right`, keeping all of `left`.
    identity,
    OverlayOp::Identity
);
overlay_entry!(
    /// `left` with overlapping parts replaced by `right`.
    update,
    OverlayOp::Update
);

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_config_builder_defaults() {
        let config = AnalysisConfig::new();
        assert_eq!(config.effective_tile_count(), 1);
        assert!(config.effective_workers() >= 1);
        assert!(!config.merge_after_tiling);
        assert!(!config.strict_schema);
        assert!(!config.spill_to_disk);
    }

    #[test]
    fn test_config_builder_chains() {
        let config = AnalysisConfig::new()
            .with_tile_count(4)
            .with_max_workers(2)
            .with_merge_after_tiling(true)
            .with_strict_schema(true)
            .with_spill_to_disk(true);
        assert_eq!(config.effective_tile_count(), 4);
        assert_eq!(config.effective_workers(), 2);
        assert!(config.merge_after_tiling);
        assert!(config.strict_schema);
        assert!(config.spill_to_disk);
    }
}
