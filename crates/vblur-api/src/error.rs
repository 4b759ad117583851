//! API error types.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::Serialize;
use thiserror::Error;
use vblur_jobs::JobsError;
use vblur_models::ParameterError;

pub type ApiResult<T> = Result<T, ApiError>;

#[derive(Debug, Error)]
pub enum ApiError {
    #[error("Video file is required")]
    MissingFile,

    #[error("No file selected")]
    EmptyFilename,

    #[error("Only {0} files are supported")]
    InvalidFormat(String),

    #[error("{0}")]
    InvalidParameter(String),

    #[error("File size exceeds maximum limit of {0}MB")]
    FileTooLarge(u64),

    #[error("Job {0} not found")]
    JobNotFound(String),

    #[error("Job is {0}, result not available")]
    ResultNotReady(String),

    #[error("Result file not found")]
    ResultNotFound,

    #[error("Unauthorized: {0}")]
    Unauthorized(String),

    #[error("Rate limit exceeded. Please try again later.")]
    RateLimited,

    #[error("Internal error: {0}")]
    Internal(String),
}

impl ApiError {
    pub fn invalid_parameter(msg: impl Into<String>) -> Self {
        Self::InvalidParameter(msg.into())
    }

    pub fn unauthorized(msg: impl Into<String>) -> Self {
        Self::Unauthorized(msg.into())
    }

    pub fn internal(msg: impl Into<String>) -> Self {
        Self::Internal(msg.into())
    }

    /// Machine-readable error code.
    pub fn code(&self) -> &'static str {
        match self {
            ApiError::MissingFile => "MISSING_FILE",
            ApiError::EmptyFilename => "EMPTY_FILENAME",
            ApiError::InvalidFormat(_) => "INVALID_FORMAT",
            ApiError::InvalidParameter(_) => "INVALID_PARAMETER",
            ApiError::FileTooLarge(_) => "FILE_TOO_LARGE",
            ApiError::JobNotFound(_) => "JOB_NOT_FOUND",
            ApiError::ResultNotReady(_) => "RESULT_NOT_READY",
            ApiError::ResultNotFound => "RESULT_NOT_FOUND",
            ApiError::Unauthorized(_) => "UNAUTHORIZED",
            ApiError::RateLimited => "RATE_LIMITED",
            ApiError::Internal(_) => "INTERNAL_ERROR",
        }
    }

    pub fn status_code(&self) -> StatusCode {
        match self {
            ApiError::MissingFile | ApiError::EmptyFilename | ApiError::InvalidParameter(_) => {
                StatusCode::BAD_REQUEST
            }
            ApiError::InvalidFormat(_) => StatusCode::UNSUPPORTED_MEDIA_TYPE,
            ApiError::FileTooLarge(_) => StatusCode::PAYLOAD_TOO_LARGE,
            ApiError::JobNotFound(_) | ApiError::ResultNotFound => StatusCode::NOT_FOUND,
            ApiError::ResultNotReady(_) => too_early(),
            ApiError::Unauthorized(_) => StatusCode::UNAUTHORIZED,
            ApiError::RateLimited => StatusCode::TOO_MANY_REQUESTS,
            ApiError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

/// 425 Too Early.
fn too_early() -> StatusCode {
    StatusCode::from_u16(425).unwrap_or(StatusCode::CONFLICT)
}

impl From<ParameterError> for ApiError {
    fn from(err: ParameterError) -> Self {
        ApiError::InvalidParameter(err.message)
    }
}

impl From<JobsError> for ApiError {
    fn from(err: JobsError) -> Self {
        match err {
            JobsError::NotFound(id) => ApiError::JobNotFound(id.to_string()),
            JobsError::ResultNotReady { status } => ApiError::ResultNotReady(status.to_string()),
            JobsError::ResultMissing(_) => ApiError::ResultNotFound,
            other => ApiError::Internal(other.to_string()),
        }
    }
}

impl From<std::io::Error> for ApiError {
    fn from(err: std::io::Error) -> Self {
        ApiError::Internal(err.to_string())
    }
}

#[derive(Serialize)]
struct ErrorResponse {
    error: &'static str,
    message: String,
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status_code();

        // Don't expose internal error details in production
        let message = match &self {
            ApiError::Internal(detail) => {
                tracing::error!("Internal error: {}", detail);
                if std::env::var("ENVIRONMENT").unwrap_or_default() == "production" {
                    "An internal server error occurred".to_string()
                } else {
                    self.to_string()
                }
            }
            _ => self.to_string(),
        };

        let body = ErrorResponse {
            error: self.code(),
            message,
        };

        (status, Json(body)).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use vblur_models::{JobId, JobStatus};

    #[test]
    fn test_status_codes() {
        assert_eq!(ApiError::MissingFile.status_code(), StatusCode::BAD_REQUEST);
        assert_eq!(
            ApiError::InvalidFormat("mp4, mov".into()).status_code(),
            StatusCode::UNSUPPORTED_MEDIA_TYPE
        );
        assert_eq!(ApiError::FileTooLarge(500).status_code(), StatusCode::PAYLOAD_TOO_LARGE);
        assert_eq!(ApiError::ResultNotReady("processing".into()).status_code().as_u16(), 425);
    }

    #[test]
    fn test_from_jobs_error() {
        let err: ApiError = JobsError::NotFound(JobId::from_string("x")).into();
        assert_eq!(err.code(), "JOB_NOT_FOUND");
        assert_eq!(err.to_string(), "Job x not found");

        let err: ApiError = JobsError::ResultNotReady {
            status: JobStatus::Processing,
        }
        .into();
        assert_eq!(err.code(), "RESULT_NOT_READY");
        assert_eq!(err.to_string(), "Job is processing, result not available");

        let err: ApiError = JobsError::ResultMissing(JobId::from_string("x")).into();
        assert_eq!(err.code(), "RESULT_NOT_FOUND");
    }

    #[test]
    fn test_from_parameter_error() {
        let err: ApiError = ParameterError::new("blur_strength", "blur_strength must be an odd number").into();
        assert_eq!(err.code(), "INVALID_PARAMETER");
        assert_eq!(err.to_string(), "blur_strength must be an odd number");
    }
}
