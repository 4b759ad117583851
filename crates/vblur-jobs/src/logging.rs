//! Structured events for a blur job's lifecycle.

use std::fmt::Display;

use tracing::{error, info, warn, Span};
use vblur_media::{PipelineProgress, ProcessingSummary};
use vblur_models::{Job, JobId};

/// Progress is logged each time it crosses a multiple of this many percent.
pub const PROGRESS_LOG_STEP: u8 = 10;

/// Emits a job's lifecycle events with its `job_id` and `operation` attached.
#[derive(Debug, Clone)]
pub struct JobLogger {
    job_id: JobId,
    operation: &'static str,
}

impl JobLogger {
    /// Logger for a video blur run.
    pub fn blur(job_id: &JobId) -> Self {
        Self {
            job_id: job_id.clone(),
            operation: "blur",
        }
    }

    pub fn job_id(&self) -> &JobId {
        &self.job_id
    }

    /// Span that the job's background task runs in.
    pub fn span(&self) -> Span {
        tracing::info_span!("job", job_id = %self.job_id, operation = self.operation)
    }

    pub fn started(&self, job: &Job) {
        let words = job.parameters.words.as_ref().map_or(0, Vec::len);
        info!(
            job_id = %self.job_id,
            operation = self.operation,
            input = %job.input_file,
            sample_rate = job.parameters.sample_rate,
            blur_strength = job.parameters.blur_strength,
            target_words = words,
            "Job started"
        );
    }

    pub fn progress(&self, progress: PipelineProgress) {
        info!(
            job_id = %self.job_id,
            operation = self.operation,
            percent = progress.percent(),
            frames = progress.frames_processed,
            total_frames = progress.total_frames,
            "Job progress"
        );
    }

    /// The transcode failed and the intermediate encode became the result.
    pub fn fallback(&self, warning: &str) {
        warn!(
            job_id = %self.job_id,
            operation = self.operation,
            warning,
            "Job completed with unnormalized output"
        );
    }

    pub fn completed(&self, summary: &ProcessingSummary, elapsed_secs: f64) {
        info!(
            job_id = %self.job_id,
            operation = self.operation,
            frames = summary.frames_processed,
            frames_blurred = summary.frames_blurred,
            detection_passes = summary.detection_passes,
            elapsed_secs,
            "Job completed"
        );
    }

    pub fn failed(&self, error: &dyn Display) {
        error!(
            job_id = %self.job_id,
            operation = self.operation,
            error = %error,
            "Job failed"
        );
    }

    /// The job left the registry while its task was still running.
    pub fn vanished(&self, stage: &str) {
        warn!(
            job_id = %self.job_id,
            operation = self.operation,
            stage,
            "Job deleted while its task was running"
        );
    }
}

/// Whether moving from `previous` to `current` percent crosses a
/// [`PROGRESS_LOG_STEP`] boundary.
pub fn crosses_progress_step(previous: u8, current: u8) -> bool {
    current / PROGRESS_LOG_STEP > previous / PROGRESS_LOG_STEP
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_blur_logger() {
        let job_id = JobId::from_string("job-1");
        let logger = JobLogger::blur(&job_id);

        assert_eq!(logger.job_id(), &job_id);
    }

    #[test]
    fn test_crosses_progress_step() {
        assert!(!crosses_progress_step(0, 9));
        assert!(crosses_progress_step(9, 10));
        assert!(crosses_progress_step(8, 23));
        assert!(!crosses_progress_step(10, 19));
        assert!(!crosses_progress_step(42, 42));
        // Progress never goes backwards, but a reset must not log
        assert!(!crosses_progress_step(50, 10));
    }
}
