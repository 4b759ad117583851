//! Job service error types.

use thiserror::Error;
use vblur_models::{JobId, JobStatus};

pub type JobsResult<T> = Result<T, JobsError>;

#[derive(Debug, Error)]
pub enum JobsError {
    #[error("Job not found: {0}")]
    NotFound(JobId),

    #[error("Job is not completed yet (status: {status})")]
    ResultNotReady { status: JobStatus },

    #[error("Result file missing for job {0}")]
    ResultMissing(JobId),

    #[error("Media error: {0}")]
    Media(#[from] vblur_media::MediaError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl JobsError {
    pub fn is_not_found(&self) -> bool {
        matches!(self, JobsError::NotFound(_))
    }
}
