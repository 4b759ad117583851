//! OCR client error types.

use thiserror::Error;
use vblur_media::MediaError;

/// Result type for OCR client operations.
pub type OcrResult<T> = Result<T, OcrClientError>;

/// Errors that can occur while talking to the OCR service.
#[derive(Debug, Error)]
pub enum OcrClientError {
    #[error("Invalid configuration: {0}")]
    Config(String),

    #[error("OCR service returned HTTP {status}: {body}")]
    Http { status: u16, body: String },

    #[error("Invalid response: {0}")]
    InvalidResponse(String),

    #[error("Frame encoding failed: {0}")]
    Encode(String),

    #[error("Network error: {0}")]
    Network(#[from] reqwest::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl OcrClientError {
    /// Check if error is retryable.
    pub fn is_retryable(&self) -> bool {
        match self {
            OcrClientError::Network(_) => true,
            OcrClientError::Http { status, .. } => *status == 429 || *status >= 500,
            _ => false,
        }
    }
}

impl From<OcrClientError> for MediaError {
    fn from(e: OcrClientError) -> Self {
        MediaError::detection_failed(e.to_string())
    }
}
