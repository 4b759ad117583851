//! Blur job handlers.
//!
//! Provides REST API endpoints for:
//! - Submitting a video upload for blurring
//! - Polling job status
//! - Downloading the processed video
//! - Deleting a job and its files

use std::path::PathBuf;

use axum::body::Body;
use axum::extract::multipart::{Field, MultipartError, MultipartRejection};
use axum::extract::{Multipart, Path, State};
use axum::http::{header, StatusCode};
use axum::response::Response;
use axum::Json;
use chrono::{DateTime, Utc};
use serde::Serialize;
use tokio::io::AsyncWriteExt;
use tokio_util::io::ReaderStream;
use tracing::{debug, info, warn};

use vblur_jobs::artifacts::{file_extension, sanitize_filename};
use vblur_jobs::ArtifactStore;
use vblur_media::fs_utils::remove_if_exists;
use vblur_models::{Job, JobId, JobParameters, JobStatus, NewJob};

use crate::config::ALLOWED_EXTENSIONS;
use crate::error::{ApiError, ApiResult};
use crate::state::AppState;

// ============================================================================
// Types
// ============================================================================

/// Response to an accepted submission.
#[derive(Debug, Serialize)]
pub struct SubmitResponse {
    pub job_id: String,
    pub status: JobStatus,
    pub created_at: DateTime<Utc>,
    /// Rough processing time, in seconds
    pub estimated_duration: u64,
}

/// Upload written to disk while the form is read.
#[derive(Debug)]
struct StoredUpload {
    file_name: String,
    path: PathBuf,
}

/// Raw multipart form contents.
#[derive(Debug, Default)]
struct SubmissionForm {
    upload: Option<StoredUpload>,
    languages: Vec<String>,
    words: Vec<String>,
    blur_strength: Option<String>,
    confidence: Option<String>,
    sample_rate: Option<String>,
    padding: Option<String>,
}

// ============================================================================
// Handlers
// ============================================================================

/// Submit a video for text blurring.
///
/// POST /api/v1/videos/blur
///
/// Validation failures leave no job and no uploaded file behind.
pub async fn submit_blur(
    State(state): State<AppState>,
    multipart: Result<Multipart, MultipartRejection>,
) -> ApiResult<(StatusCode, Json<SubmitResponse>)> {
    let mut multipart = multipart.map_err(|e| {
        debug!("Rejected non-multipart submission: {}", e);
        ApiError::MissingFile
    })?;

    let job_id = JobId::new();
    let mut form = SubmissionForm::default();

    let prepared = match read_form(&state, &job_id, &mut multipart, &mut form).await {
        Ok(()) => prepare_job(&state, &job_id, &form),
        Err(e) => Err(e),
    };

    let new_job = match prepared {
        Ok(new_job) => new_job,
        Err(e) => {
            if let Some(upload) = &form.upload {
                if let Err(cleanup) = remove_if_exists(&upload.path).await {
                    warn!(path = %upload.path.display(), "Failed to remove rejected upload: {}", cleanup);
                }
            }
            return Err(e);
        }
    };

    let job = state.jobs.submit(new_job);
    info!(job_id = %job.id, file = %job.input_file, "Accepted blur submission");

    Ok((
        StatusCode::ACCEPTED,
        Json(SubmitResponse {
            job_id: job.id.to_string(),
            status: job.status,
            created_at: job.created_at,
            estimated_duration: state.jobs.config().estimated_duration_secs,
        }),
    ))
}

/// Get a job's current state.
///
/// GET /api/v1/jobs/:job_id
pub async fn get_job(
    State(state): State<AppState>,
    Path(job_id): Path<String>,
) -> ApiResult<Json<Job>> {
    let job = state.jobs.get_job(&JobId::from(job_id))?;
    Ok(Json(job))
}

/// Download the processed video.
///
/// GET /api/v1/jobs/:job_id/result
pub async fn get_job_result(
    State(state): State<AppState>,
    Path(job_id): Path<String>,
) -> ApiResult<Response> {
    let job = state.jobs.result_file(&JobId::from(job_id)).await?;

    // The job may have been deleted between the check and the open
    let file = tokio::fs::File::open(&job.output_path)
        .await
        .map_err(|e| match e.kind() {
            std::io::ErrorKind::NotFound => ApiError::ResultNotFound,
            _ => ApiError::internal(format!("Failed to open result: {}", e)),
        })?;
    let length = file.metadata().await.map(|m| m.len()).ok();

    let mut response = Response::builder()
        .status(StatusCode::OK)
        .header(header::CONTENT_TYPE, content_type_for(&job.output_file))
        .header(
            header::CONTENT_DISPOSITION,
            format!("attachment; filename=\"{}\"", job.output_file),
        );
    if let Some(length) = length {
        response = response.header(header::CONTENT_LENGTH, length);
    }

    response
        .body(Body::from_stream(ReaderStream::new(file)))
        .map_err(|e| ApiError::internal(format!("Failed to build response: {}", e)))
}

/// Delete a job and its files, whatever its status.
///
/// DELETE /api/v1/jobs/:job_id
pub async fn delete_job(
    State(state): State<AppState>,
    Path(job_id): Path<String>,
) -> ApiResult<StatusCode> {
    state.jobs.delete_job(&JobId::from(job_id)).await?;
    Ok(StatusCode::NO_CONTENT)
}

// ============================================================================
// Form handling
// ============================================================================

async fn read_form(
    state: &AppState,
    job_id: &JobId,
    multipart: &mut Multipart,
    form: &mut SubmissionForm,
) -> ApiResult<()> {
    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| multipart_error(state, e))?
    {
        let Some(name) = field.name().map(str::to_string) else {
            continue;
        };

        match name.as_str() {
            "video" => {
                if form.upload.is_some() {
                    debug!("Ignoring additional video field");
                    continue;
                }
                store_upload(state, job_id, field, form).await?;
            }
            "languages" | "languages[]" => {
                form.languages.extend(list_values(&read_text(state, field).await?));
            }
            "words" | "words[]" => {
                form.words.extend(list_values(&read_text(state, field).await?));
            }
            "blur_strength" => form.blur_strength = Some(read_text(state, field).await?),
            "confidence" => form.confidence = Some(read_text(state, field).await?),
            "sample_rate" => form.sample_rate = Some(read_text(state, field).await?),
            "padding" => form.padding = Some(read_text(state, field).await?),
            other => debug!(field = other, "Ignoring unknown form field"),
        }
    }

    Ok(())
}

/// Stream the video field to its upload path, enforcing the size limit.
async fn store_upload(
    state: &AppState,
    job_id: &JobId,
    mut field: Field<'_>,
    form: &mut SubmissionForm,
) -> ApiResult<()> {
    let original = field.file_name().unwrap_or_default().to_string();
    if original.trim().is_empty() {
        return Err(ApiError::EmptyFilename);
    }

    let file_name = sanitize_filename(&original).ok_or(ApiError::EmptyFilename)?;
    let allowed = file_extension(&file_name)
        .map(|ext| ALLOWED_EXTENSIONS.contains(&ext.as_str()))
        .unwrap_or(false);
    if !allowed {
        return Err(ApiError::InvalidFormat(ALLOWED_EXTENSIONS.join(", ")));
    }

    let path = state.jobs.artifacts().upload_path(job_id, &file_name);
    let mut file = tokio::fs::File::create(&path).await?;
    form.upload = Some(StoredUpload {
        file_name,
        path: path.clone(),
    });

    let limit = state.config.max_upload_size;
    let mut written: u64 = 0;
    while let Some(chunk) = field.chunk().await.map_err(|e| multipart_error(state, e))? {
        written += chunk.len() as u64;
        if written > limit {
            return Err(ApiError::FileTooLarge(state.config.max_upload_mb()));
        }
        file.write_all(&chunk).await?;
    }
    file.flush().await?;

    debug!(job_id = %job_id, path = %path.display(), bytes = written, "Stored upload");
    Ok(())
}

async fn read_text(state: &AppState, field: Field<'_>) -> ApiResult<String> {
    field.text().await.map_err(|e| multipart_error(state, e))
}

fn multipart_error(state: &AppState, err: MultipartError) -> ApiError {
    if err.status() == StatusCode::PAYLOAD_TOO_LARGE {
        ApiError::FileTooLarge(state.config.max_upload_mb())
    } else {
        ApiError::invalid_parameter(format!("Malformed form data: {}", err.body_text()))
    }
}

/// Repeated list fields may also carry comma-separated values.
fn list_values(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
        .collect()
}

fn parse_field<T: std::str::FromStr>(
    raw: Option<&str>,
    name: &str,
    kind: &str,
    default: T,
) -> ApiResult<T> {
    match raw.map(str::trim) {
        None | Some("") => Ok(default),
        Some(value) => value
            .parse()
            .map_err(|_| ApiError::invalid_parameter(format!("{} must be {}", name, kind))),
    }
}

fn parse_parameters(form: &SubmissionForm) -> ApiResult<JobParameters> {
    let defaults = JobParameters::default();

    let parameters = JobParameters {
        languages: if form.languages.is_empty() {
            defaults.languages
        } else {
            form.languages.clone()
        },
        blur_strength: parse_field(
            form.blur_strength.as_deref(),
            "blur_strength",
            "a positive odd integer",
            defaults.blur_strength,
        )?,
        confidence: parse_field(
            form.confidence.as_deref(),
            "confidence",
            "a number between 0 and 1",
            defaults.confidence,
        )?,
        sample_rate: parse_field(
            form.sample_rate.as_deref(),
            "sample_rate",
            "a positive integer",
            defaults.sample_rate,
        )?,
        padding: parse_field(
            form.padding.as_deref(),
            "padding",
            "a non-negative integer",
            defaults.padding,
        )?,
        words: if form.words.is_empty() {
            None
        } else {
            Some(form.words.clone())
        },
    };

    parameters.check()?;
    Ok(parameters)
}

fn prepare_job(state: &AppState, job_id: &JobId, form: &SubmissionForm) -> ApiResult<NewJob> {
    let upload = form.upload.as_ref().ok_or(ApiError::MissingFile)?;
    let parameters = parse_parameters(form)?;
    let artifacts = state.jobs.artifacts();

    Ok(NewJob {
        id: job_id.clone(),
        input_file: upload.file_name.clone(),
        output_file: ArtifactStore::output_file_name(&upload.file_name),
        input_path: upload.path.clone(),
        output_path: artifacts.output_path(job_id, &upload.file_name),
        parameters,
    })
}

fn content_type_for(file_name: &str) -> &'static str {
    match file_extension(file_name).as_deref() {
        Some("mov") => "video/quicktime",
        _ => "video/mp4",
    }
}
