//! Worker side of the analysis pool.
//!
//! Workers pull tile task pairs from a shared queue, decode both blobs,
//! run the engine overlay, and emit an outcome per tile. They never
//! touch the shared output: merging is the aggregator's job. A failed
//! tile produces an error outcome and the worker moves on; only queue
//! exhaustion or job cancellation stops a worker.

use crate::codec;
use crate::engine::{
    CancelFlag, GeometryEngine, OverlayOp, OverlayOptions, ProgressHandle,
};
use crate::error::TileFailure;
use crate::layer::FeatureCollection;
use crate::tiling::TileTaskPair;
use std::sync::mpsc::{Receiver, Sender};
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};
use tracing::debug;

/// Result of one tile's overlay run.
#[derive(Debug)]
pub struct TileOutcome {
    pub tile_index: usize,
    pub result: Result<FeatureCollection, TileFailure>,
    pub elapsed: Duration,
}

/// Everything a worker needs besides the queue itself.
pub(crate) struct WorkerContext<'a> {
    pub engine: &'a dyn GeometryEngine,
    pub op: OverlayOp,
    pub options: OverlayOptions,
    /// Schema-only collections used when a tile blob is absent.
    pub input_schema: &'a FeatureCollection,
    pub method_schema: &'a FeatureCollection,
    pub cancel: CancelFlag,
}

/// Pulls tasks until the queue closes or the job is cancelled.
pub(crate) fn worker_loop(
    ctx: &WorkerContext<'_>,
    queue: &Mutex<Receiver<TileTaskPair>>,
    results: &Sender<TileOutcome>,
) {
    loop {
        if ctx.cancel.is_cancelled() {
            break;
        }

        let task = {
            let receiver = match queue.lock() {
                Ok(guard) => guard,
                Err(poisoned) => poisoned.into_inner(),
            };
            receiver.recv()
        };
        let task = match task {
            Ok(task) => task,
            Err(_) => break,
        };

        let started = Instant::now();
        let tile_index = task.tile_index;
        let result = process_tile(ctx, task);
        let outcome = TileOutcome {
            tile_index,
            result,
            elapsed: started.elapsed(),
        };
        if results.send(outcome).is_err() {
            break;
        }
    }
}

fn process_tile(
    ctx: &WorkerContext<'_>,
    task: TileTaskPair,
) -> Result<FeatureCollection, TileFailure> {
    let input = load_side(&task.input, "input", ctx.input_schema)?;
    let method = load_side(&task.method, "method", ctx.method_schema)?;
    debug!(
        tile = task.tile_index,
        input_features = input.feature_count(),
        method_features = method.feature_count(),
        "running tile overlay"
    );

    // Per-call registration so the engine's native hook can observe
    // the job-wide cancel flag.
    let handle = ProgressHandle::register(Arc::new(|_, _| true), ctx.cancel.clone());
    let result = ctx
        .engine
        .overlay(ctx.op, &input, &method, &ctx.options, Some(&handle))?;
    Ok(result)
}

/// Loads and decodes one side of a task pair. A missing blob stands in
/// for an empty collection with that side's schema.
fn load_side(
    source: &crate::tiling::BlobSource,
    slot: &'static str,
    schema: &FeatureCollection,
) -> Result<FeatureCollection, TileFailure> {
    match source.load().map_err(TileFailure::Load)? {
        Some(bytes) => {
            codec::decode(&bytes).map_err(|source| TileFailure::Decode { slot, source })
        }
        None => Ok(FeatureCollection::empty_like(schema)),
    }
}
