//! Pipeline progress reporting.

use serde::{Deserialize, Serialize};

/// Frame-level progress of one pipeline run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PipelineProgress {
    /// Frames decoded, blurred and written so far
    pub frames_processed: u64,
    /// Expected frame count (may be an estimate; 0 when unknown)
    pub total_frames: u64,
}

impl PipelineProgress {
    pub fn new(frames_processed: u64, total_frames: u64) -> Self {
        Self {
            frames_processed,
            total_frames,
        }
    }

    /// Whole-percent progress, capped at 99 until the run is finalized.
    ///
    /// Frame counts from the container can be estimates, so a run may see
    /// more frames than announced; 100 is reserved for completion.
    pub fn percent(&self) -> u8 {
        if self.total_frames == 0 {
            return 0;
        }
        let pct = self.frames_processed.saturating_mul(100) / self.total_frames;
        pct.min(99) as u8
    }
}

/// Callback type for progress updates.
pub type ProgressCallback = Box<dyn Fn(PipelineProgress) + Send + Sync + 'static>;
