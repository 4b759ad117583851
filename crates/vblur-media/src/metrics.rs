//! Pipeline metrics.

use ::metrics::{counter, histogram};

/// Metric names as constants for consistency.
pub mod names {
    pub const FRAMES_PROCESSED_TOTAL: &str = "vblur_frames_processed_total";
    pub const DETECTION_PASSES_TOTAL: &str = "vblur_detection_passes_total";
    pub const REGIONS_BLURRED_TOTAL: &str = "vblur_regions_blurred_total";
    pub const TRANSCODE_FALLBACKS_TOTAL: &str = "vblur_transcode_fallbacks_total";
    pub const PIPELINE_DURATION_SECONDS: &str = "vblur_pipeline_duration_seconds";
}

/// Record frames written by a pipeline run.
pub fn record_frames_processed(frames: u64) {
    counter!(names::FRAMES_PROCESSED_TOTAL).increment(frames);
}

/// Record one detection engine invocation.
pub fn record_detection_pass(detector: &'static str) {
    counter!(names::DETECTION_PASSES_TOTAL, "detector" => detector).increment(1);
}

/// Record regions blurred on a frame.
pub fn record_regions_blurred(regions: usize) {
    counter!(names::REGIONS_BLURRED_TOTAL).increment(regions as u64);
}

/// Record a transcode that fell back to the intermediate artifact.
pub fn record_transcode_fallback() {
    counter!(names::TRANSCODE_FALLBACKS_TOTAL).increment(1);
}

/// Record wall time of a pipeline run.
pub fn record_pipeline_duration(outcome: &'static str, duration_secs: f64) {
    histogram!(names::PIPELINE_DURATION_SECONDS, "outcome" => outcome).record(duration_secs);
}
