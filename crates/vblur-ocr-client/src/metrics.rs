//! OCR client metrics.

use ::metrics::{counter, histogram};

/// Metric name constants for consistency.
pub mod names {
    /// Total OCR requests by status.
    pub const REQUESTS_TOTAL: &str = "vblur_ocr_requests_total";

    /// Total retry attempts.
    pub const RETRIES_TOTAL: &str = "vblur_ocr_retries_total";

    /// Request latency in seconds.
    pub const LATENCY_SECONDS: &str = "vblur_ocr_latency_seconds";
}

/// Record metrics for a completed OCR request. `status` is 0 when no
/// response was received.
pub fn record_request(status: u16, latency_secs: f64) {
    counter!(names::REQUESTS_TOTAL, "status" => status.to_string()).increment(1);
    histogram!(names::LATENCY_SECONDS).record(latency_secs);
}

/// Record a retry attempt.
pub fn record_retry() {
    counter!(names::RETRIES_TOTAL).increment(1);
}
