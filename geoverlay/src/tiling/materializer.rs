//! Tile materialization: clipping both inputs into per-tile blobs.
//!
//! The two collections are materialized concurrently, one thread per
//! collection, each clipping its tiles on a bounded worker pool. Blobs
//! stay in memory by default; a [`JobWorkspace`] spills them to disk
//! instead, trading allocation for file IO on very large jobs.

use super::store::{JobWorkspace, LayerSlot};
use super::Tile;
use crate::codec;
use crate::engine::{EngineError, GeometryEngine};
use crate::layer::FeatureCollection;
use std::io;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;
use std::thread;
use thiserror::Error;
use tracing::debug;

/// Where one tile's encoded blob lives.
#[derive(Debug)]
pub enum BlobSource {
    Inline(Vec<u8>),
    File(std::path::PathBuf),
}

impl BlobSource {
    /// Loads the blob bytes. `Ok(None)` for a spilled file that no
    /// longer exists; the executor treats that tile slot as empty.
    pub fn load(&self) -> io::Result<Option<Vec<u8>>> {
        match self {
            BlobSource::Inline(bytes) => Ok(Some(bytes.clone())),
            BlobSource::File(path) => match std::fs::read(path) {
                Ok(bytes) => Ok(Some(bytes)),
                Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(None),
                Err(e) => Err(e),
            },
        }
    }
}

/// Both inputs of one tile, ready for a worker.
#[derive(Debug)]
pub struct TileTaskPair {
    pub tile_index: usize,
    pub input: BlobSource,
    pub method: BlobSource,
}

/// Materialization failed for one tile.
#[derive(Debug, Error)]
pub enum MaterializeError {
    #[error("tile {tile}: clip failed: {source}")]
    Clip {
        tile: usize,
        #[source]
        source: EngineError,
    },

    #[error("tile {tile}: blob write failed: {source}")]
    Write {
        tile: usize,
        #[source]
        source: io::Error,
    },

    #[error("tile {tile}: blob encode failed: {source}")]
    Encode {
        tile: usize,
        #[source]
        source: codec::EncodeError,
    },
}

/// Clips both collections against every tile and returns one task pair
/// per tile, ordered by tile index.
pub fn materialize_pair(
    engine: &dyn GeometryEngine,
    input: &FeatureCollection,
    method: &FeatureCollection,
    tiles: &[Tile],
    workers: usize,
    workspace: Option<&JobWorkspace>,
) -> Result<Vec<TileTaskPair>, MaterializeError> {
    let (input_blobs, method_blobs) = thread::scope(|scope| {
        let input_side = scope.spawn(|| {
            materialize_collection(engine, input, tiles, workers, workspace, LayerSlot::Input)
        });
        let method_blobs =
            materialize_collection(engine, method, tiles, workers, workspace, LayerSlot::Method);
        // The spawned side cannot panic past its own Mutex guards.
        let input_blobs = match input_side.join() {
            Ok(result) => result,
            Err(panic) => std::panic::resume_unwind(panic),
        };
        (input_blobs, method_blobs)
    });

    let pairs = input_blobs?
        .into_iter()
        .zip(method_blobs?)
        .enumerate()
        .map(|(tile_index, (input, method))| TileTaskPair {
            tile_index,
            input,
            method,
        })
        .collect();

    Ok(pairs)
}

/// Clips one collection against every tile on up to `workers` threads.
fn materialize_collection(
    engine: &dyn GeometryEngine,
    collection: &FeatureCollection,
    tiles: &[Tile],
    workers: usize,
    workspace: Option<&JobWorkspace>,
    slot: LayerSlot,
) -> Result<Vec<BlobSource>, MaterializeError> {
    let workers = workers.max(1).min(tiles.len().max(1));
    let next = AtomicUsize::new(0);
    let slots: Mutex<Vec<Option<BlobSource>>> =
        Mutex::new((0..tiles.len()).map(|_| None).collect());
    let failure: Mutex<Option<MaterializeError>> = Mutex::new(None);

    thread::scope(|scope| {
        for _ in 0..workers {
            scope.spawn(|| loop {
                let i = next.fetch_add(1, Ordering::Relaxed);
                if i >= tiles.len() {
                    break;
                }
                match materialize_tile(engine, collection, &tiles[i], workspace, slot) {
                    Ok(source) => {
                        let mut slots = match slots.lock() {
                            Ok(g) => g,
                            Err(p) => p.into_inner(),
                        };
                        slots[i] = Some(source);
                    }
                    Err(e) => {
                        let mut failure = match failure.lock() {
                            Ok(g) => g,
                            Err(p) => p.into_inner(),
                        };
                        failure.get_or_insert(e);
                        break;
                    }
                }
            });
        }
    });

    if let Some(e) = failure.into_inner().unwrap_or_else(|p| p.into_inner()) {
        return Err(e);
    }

    let slots = slots.into_inner().unwrap_or_else(|p| p.into_inner());
    debug!(slot = slot.dir_name(), tiles = tiles.len(), "materialized collection");
    // Every slot is filled once no worker reported a failure.
    Ok(slots.into_iter().flatten().collect())
}

fn materialize_tile(
    engine: &dyn GeometryEngine,
    collection: &FeatureCollection,
    tile: &Tile,
    workspace: Option<&JobWorkspace>,
    slot: LayerSlot,
) -> Result<BlobSource, MaterializeError> {
    let clipped = engine
        .clip_to_rect(collection, tile.bounds)
        .map_err(|source| MaterializeError::Clip {
            tile: tile.index,
            source,
        })?;
    let blob = codec::encode(&clipped).map_err(|source| MaterializeError::Encode {
        tile: tile.index,
        source,
    })?;

    match workspace {
        Some(ws) => {
            ws.write_blob(slot, tile.index, &blob)
                .map_err(|source| MaterializeError::Write {
                    tile: tile.index,
                    source,
                })?;
            Ok(BlobSource::File(ws.blob_path(slot, tile.index)))
        }
        None => Ok(BlobSource::Inline(blob)),
    }
}
