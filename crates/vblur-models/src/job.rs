//! Job records and their status lifecycle.

use chrono::{DateTime, Utc};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::PathBuf;
use uuid::Uuid;

use crate::parameters::JobParameters;

/// Unique identifier for a job.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize, JsonSchema)]
#[serde(transparent)]
pub struct JobId(pub String);

impl JobId {
    /// Generate a new random job ID.
    pub fn new() -> Self {
        Self(Uuid::new_v4().to_string())
    }

    /// Create from an existing string.
    pub fn from_string(s: impl Into<String>) -> Self {
        Self(s.into())
    }

    /// Get the inner string.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Default for JobId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for JobId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<String> for JobId {
    fn from(s: String) -> Self {
        Self(s)
    }
}

/// Job processing status.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, JsonSchema, Default)]
#[serde(rename_all = "snake_case")]
pub enum JobStatus {
    /// Job is waiting for an execution slot
    #[default]
    Queued,
    /// Job is actively being processed
    Processing,
    /// Job completed successfully
    Completed,
    /// Job failed with an error
    Failed,
}

impl JobStatus {
    /// Get string representation of the status.
    pub fn as_str(&self) -> &'static str {
        match self {
            JobStatus::Queued => "queued",
            JobStatus::Processing => "processing",
            JobStatus::Completed => "completed",
            JobStatus::Failed => "failed",
        }
    }

    /// Check if this is a terminal state (no more updates expected).
    pub fn is_terminal(&self) -> bool {
        matches!(self, JobStatus::Completed | JobStatus::Failed)
    }
}

impl fmt::Display for JobStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Everything needed to register a job.
#[derive(Debug, Clone)]
pub struct NewJob {
    /// Identifier reserved before the upload was stored
    pub id: JobId,
    /// Original (sanitized) upload file name
    pub input_file: String,
    /// Display name of the result file
    pub output_file: String,
    /// Uploaded video location
    pub input_path: PathBuf,
    /// Where the processed video will be written
    pub output_path: PathBuf,
    /// Validated parameters
    pub parameters: JobParameters,
}

/// A blur job tracked through its lifecycle.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct Job {
    /// Unique job ID
    #[serde(rename = "job_id")]
    pub id: JobId,

    /// Current status
    pub status: JobStatus,

    /// Creation timestamp
    pub created_at: DateTime<Utc>,

    /// When background execution began
    #[serde(skip_serializing_if = "Option::is_none")]
    pub started_at: Option<DateTime<Utc>>,

    /// When the job reached a terminal status
    #[serde(skip_serializing_if = "Option::is_none")]
    pub completed_at: Option<DateTime<Utc>>,

    /// Uploaded file name
    pub input_file: String,

    /// Result file name
    pub output_file: String,

    /// Uploaded video location
    #[serde(skip)]
    pub input_path: PathBuf,

    /// Result video location
    #[serde(skip)]
    pub output_path: PathBuf,

    /// Submission parameters
    pub parameters: JobParameters,

    /// Progress (0-100)
    pub progress: u8,

    /// Error message (if failed)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,

    /// Non-fatal warning (e.g. the final transcode fell back to the raw encode)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub warning: Option<String>,

    /// Download location of the result (set on completion)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub result_url: Option<String>,
}

impl Job {
    /// Create a queued job.
    pub fn new(new: NewJob) -> Self {
        Self {
            id: new.id,
            status: JobStatus::Queued,
            created_at: Utc::now(),
            started_at: None,
            completed_at: None,
            input_file: new.input_file,
            output_file: new.output_file,
            input_path: new.input_path,
            output_path: new.output_path,
            parameters: new.parameters,
            progress: 0,
            error: None,
            warning: None,
            result_url: None,
        }
    }

    /// Start processing the job.
    pub fn start(&mut self) {
        self.status = JobStatus::Processing;
        self.started_at = Some(Utc::now());
    }

    /// Update progress. Progress never moves backwards.
    pub fn set_progress(&mut self, progress: u8) {
        self.progress = self.progress.max(progress.min(100));
    }

    /// Mark job as completed.
    pub fn complete(&mut self, result_url: impl Into<String>, warning: Option<String>) {
        self.status = JobStatus::Completed;
        self.completed_at = Some(Utc::now());
        self.progress = 100;
        self.result_url = Some(result_url.into());
        self.warning = warning;
    }

    /// Mark job as failed.
    pub fn fail(&mut self, error: impl Into<String>) {
        self.status = JobStatus::Failed;
        self.completed_at = Some(Utc::now());
        self.error = Some(error.into());
    }

    /// Check if the job is in a terminal state.
    pub fn is_terminal(&self) -> bool {
        self.status.is_terminal()
    }

    /// Whether the job was created before `cutoff`.
    pub fn created_before(&self, cutoff: DateTime<Utc>) -> bool {
        self.created_at < cutoff
    }
}
