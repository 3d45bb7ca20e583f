//! Result aggregation: the sole writer of the shared output.
//!
//! The aggregator drains the results channel on the coordinating
//! thread. The first failure becomes the job's terminal error, but the
//! channel is still drained to completion so workers never block on a
//! full queue; later results are simply discarded.

use super::worker::TileOutcome;
use crate::engine::{ProgressHandle, ProgressReply};
use crate::error::AnalysisError;
use crate::layer::FeatureCollection;
use std::sync::mpsc::Receiver;
use std::time::Duration;
use tracing::{info, warn};

/// How often a progress summary line is logged, in tiles.
const PROGRESS_LOG_INTERVAL: usize = 50;

/// Per-tile duration statistics across one job.
#[derive(Debug, Clone, Default)]
pub struct DurationStats {
    pub count: usize,
    pub total: Duration,
    pub min: Option<Duration>,
    pub max: Duration,
}

impl DurationStats {
    fn record(&mut self, elapsed: Duration) {
        self.count += 1;
        self.total += elapsed;
        self.max = self.max.max(elapsed);
        self.min = Some(self.min.map_or(elapsed, |m| m.min(elapsed)));
    }

    pub fn avg(&self) -> Duration {
        if self.count == 0 {
            Duration::ZERO
        } else {
            self.total / self.count as u32
        }
    }
}

/// Drains `results` into `output`, merging successful tiles by field
/// name.
///
/// `expected` bounds the drain: the channel may close early when
/// workers bail out on cancellation. Progress is reported through
/// `progress` after every merge; a cancel reply stops merging and the
/// job finishes as cancelled once the drain completes. A channel that
/// closes short with no failure and no cancel fails the job too: a
/// partial merge is never returned as a complete result.
pub(crate) fn aggregate(
    results: &Receiver<TileOutcome>,
    expected: usize,
    output: &mut FeatureCollection,
    strict: bool,
    progress: &ProgressHandle,
) -> Result<DurationStats, AnalysisError> {
    let mut stats = DurationStats::default();
    let mut terminal: Option<AnalysisError> = None;
    let mut merged = 0usize;

    while stats.count < expected {
        let outcome = match results.recv() {
            Ok(outcome) => outcome,
            // Workers are gone; on a healthy run that means everything
            // arrived already.
            Err(_) => break,
        };
        stats.record(outcome.elapsed);

        match outcome.result {
            Ok(tile_result) if terminal.is_none() => {
                match output.merge_by_name(tile_result, strict) {
                    Ok(report) => {
                        merged += 1;
                        let fraction = merged as f64 / expected as f64;
                        let message =
                            format!("tile {} merged ({} features)", outcome.tile_index, report.merged_features);
                        if progress.report(fraction, &message) == ProgressReply::Cancel {
                            terminal = Some(AnalysisError::Cancelled);
                        }
                    }
                    Err(e) => terminal = Some(AnalysisError::Merge(e)),
                }
            }
            Ok(_) => {
                // Already failing or cancelled; drain and discard.
            }
            Err(failure) => {
                warn!(tile = outcome.tile_index, error = %failure, "tile failed");
                terminal.get_or_insert(AnalysisError::Tile {
                    tile: outcome.tile_index,
                    source: failure,
                });
            }
        }

        if stats.count % PROGRESS_LOG_INTERVAL == 0 {
            info!(
                tiles = stats.count,
                expected,
                min_ms = stats.min.unwrap_or_default().as_millis() as u64,
                avg_ms = stats.avg().as_millis() as u64,
                max_ms = stats.max.as_millis() as u64,
                "tile progress"
            );
        }
    }

    match terminal {
        Some(e) => Err(e),
        None if progress.is_cancelled() => Err(AnalysisError::Cancelled),
        // The channel closed short with no failure and no cancel:
        // workers vanished. A partial merge must not pass as complete.
        None if stats.count < expected => Err(AnalysisError::Incomplete {
            received: stats.count,
            expected,
        }),
        None => Ok(stats),
    }
}
