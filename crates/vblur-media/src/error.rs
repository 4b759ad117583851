//! Error types for media operations.

use std::path::PathBuf;
use thiserror::Error;

/// Result type for media operations.
pub type MediaResult<T> = Result<T, MediaError>;

/// Errors that can occur during media processing.
#[derive(Debug, Error)]
pub enum MediaError {
    #[error("FFmpeg not found in PATH")]
    FfmpegNotFound,

    #[error("FFprobe not found in PATH")]
    FfprobeNotFound,

    #[error("Input video not found: {}", .0.display())]
    InputNotFound(PathBuf),

    #[error("Could not open video: {0}")]
    InputUnreadable(String),

    #[error("Could not create output video: {0}")]
    OutputCreateFailed(String),

    #[error("Frame I/O error: {0}")]
    FrameIo(String),

    #[error("Transcode failed: {0}")]
    TranscodeFailed(String),

    #[error("Text detection failed: {0}")]
    DetectionFailed(String),

    #[error("FFmpeg command failed: {message}")]
    FfmpegFailed {
        message: String,
        stderr: Option<String>,
        exit_code: Option<i32>,
    },

    #[error("FFprobe command failed: {message}")]
    FfprobeFailed {
        message: String,
        stderr: Option<String>,
    },

    #[error("Operation timed out after {0} seconds")]
    Timeout(u64),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON parse error: {0}")]
    JsonParse(#[from] serde_json::Error),

    #[error("Invalid video file: {0}")]
    InvalidVideo(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl MediaError {
    /// Create a detection failure error.
    pub fn detection_failed(message: impl Into<String>) -> Self {
        Self::DetectionFailed(message.into())
    }

    /// Create an FFmpeg failure error.
    pub fn ffmpeg_failed(
        message: impl Into<String>,
        stderr: Option<String>,
        exit_code: Option<i32>,
    ) -> Self {
        Self::FfmpegFailed {
            message: message.into(),
            stderr,
            exit_code,
        }
    }

    /// Create a frame I/O error.
    pub fn frame_io(message: impl Into<String>) -> Self {
        Self::FrameIo(message.into())
    }

    /// Create an internal error.
    pub fn internal(message: impl Into<String>) -> Self {
        Self::Internal(message.into())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_messages() {
        let err = MediaError::InputNotFound(PathBuf::from("/tmp/missing.mp4"));
        assert_eq!(err.to_string(), "Input video not found: /tmp/missing.mp4");

        let err = MediaError::frame_io("pipe closed");
        assert_eq!(err.to_string(), "Frame I/O error: pipe closed");
    }
}
