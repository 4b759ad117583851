//! Job lifecycle metrics.

use ::metrics::{counter, gauge, histogram};

/// Metric names as constants for consistency.
pub mod names {
    pub const JOBS_SUBMITTED_TOTAL: &str = "vblur_jobs_submitted_total";
    pub const JOBS_COMPLETED_TOTAL: &str = "vblur_jobs_completed_total";
    pub const JOBS_FAILED_TOTAL: &str = "vblur_jobs_failed_total";
    pub const JOBS_DELETED_TOTAL: &str = "vblur_jobs_deleted_total";
    pub const JOBS_EXPIRED_TOTAL: &str = "vblur_jobs_expired_total";
    pub const JOBS_RUNNING: &str = "vblur_jobs_running";
    pub const JOB_DURATION_SECONDS: &str = "vblur_job_duration_seconds";
}

pub fn record_job_submitted() {
    counter!(names::JOBS_SUBMITTED_TOTAL).increment(1);
}

/// `outcome` is `normalized` or `fallback`.
pub fn record_job_completed(outcome: &'static str, duration_secs: f64) {
    counter!(names::JOBS_COMPLETED_TOTAL, "outcome" => outcome).increment(1);
    histogram!(names::JOB_DURATION_SECONDS).record(duration_secs);
}

pub fn record_job_failed() {
    counter!(names::JOBS_FAILED_TOTAL).increment(1);
}

pub fn record_job_deleted() {
    counter!(names::JOBS_DELETED_TOTAL).increment(1);
}

pub fn record_jobs_expired(count: usize) {
    counter!(names::JOBS_EXPIRED_TOTAL).increment(count as u64);
}

pub fn job_started() {
    gauge!(names::JOBS_RUNNING).increment(1.0);
}

pub fn job_finished() {
    gauge!(names::JOBS_RUNNING).decrement(1.0);
}
