//! Per-job tile blob storage on disk.
//!
//! Each analysis job that spills gets its own uuid-named directory with
//! one subdirectory per input slot; blobs inside are named by tile
//! index. The directory is removed when the workspace drops, whether
//! the job finished or failed.

use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use tracing::{debug, warn};
use uuid::Uuid;

/// Which of the two job inputs a blob belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum LayerSlot {
    /// The collection the operation is applied to.
    Input,
    /// The collection the operation is applied with.
    Method,
}

impl LayerSlot {
    /// On-disk subdirectory name for the slot.
    pub fn dir_name(&self) -> &'static str {
        match self {
            LayerSlot::Input => "layer1",
            LayerSlot::Method => "layer2",
        }
    }
}

/// Disk workspace for one job's tile blobs.
pub struct JobWorkspace {
    root: PathBuf,
    job_id: Uuid,
}

impl JobWorkspace {
    /// Creates `<base>/<uuid>/layer1` and `<base>/<uuid>/layer2`.
    pub fn create(base: &Path) -> io::Result<Self> {
        let job_id = Uuid::new_v4();
        let root = base.join(job_id.to_string());
        fs::create_dir_all(root.join(LayerSlot::Input.dir_name()))?;
        fs::create_dir_all(root.join(LayerSlot::Method.dir_name()))?;
        debug!(job_id = %job_id, path = %root.display(), "created tile workspace");
        Ok(Self { root, job_id })
    }

    pub fn job_id(&self) -> Uuid {
        self.job_id
    }

    /// Path of one tile's blob for one slot.
    pub fn blob_path(&self, slot: LayerSlot, tile_index: usize) -> PathBuf {
        self.root
            .join(slot.dir_name())
            .join(format!("{}.bin", tile_index))
    }

    pub fn write_blob(&self, slot: LayerSlot, tile_index: usize, bytes: &[u8]) -> io::Result<()> {
        fs::write(self.blob_path(slot, tile_index), bytes)
    }

    /// Reads one tile blob back. `Ok(None)` when the file does not
    /// exist; a tile with nothing to write is allowed to write nothing.
    pub fn read_blob(&self, slot: LayerSlot, tile_index: usize) -> io::Result<Option<Vec<u8>>> {
        match fs::read(self.blob_path(slot, tile_index)) {
            Ok(bytes) => Ok(Some(bytes)),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e),
        }
    }
}

impl Drop for JobWorkspace {
    fn drop(&mut self) {
        if let Err(e) = fs::remove_dir_all(&self.root) {
            warn!(
                job_id = %self.job_id,
                path = %self.root.display(),
                error = %e,
                "failed to remove tile workspace"
            );
        }
    }
}
