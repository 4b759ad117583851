//! On-disk layout of uploaded and processed videos.

use std::path::{Path, PathBuf};
use tracing::{debug, warn};
use vblur_media::fs_utils::remove_if_exists;
use vblur_media::intermediate_path;
use vblur_models::{Job, JobId};

use crate::error::JobsResult;

/// Longest sanitized file name kept, in bytes.
const MAX_FILENAME_LEN: usize = 200;

/// Owns the upload and output directories.
#[derive(Debug, Clone)]
pub struct ArtifactStore {
    upload_dir: PathBuf,
    output_dir: PathBuf,
}

impl ArtifactStore {
    pub fn new(upload_dir: impl Into<PathBuf>, output_dir: impl Into<PathBuf>) -> Self {
        Self {
            upload_dir: upload_dir.into(),
            output_dir: output_dir.into(),
        }
    }

    pub fn upload_dir(&self) -> &Path {
        &self.upload_dir
    }

    pub fn output_dir(&self) -> &Path {
        &self.output_dir
    }

    /// Create both directories if missing.
    pub async fn ensure_dirs(&self) -> JobsResult<()> {
        tokio::fs::create_dir_all(&self.upload_dir).await?;
        tokio::fs::create_dir_all(&self.output_dir).await?;
        Ok(())
    }

    /// Whether both directories exist.
    pub async fn is_ready(&self) -> bool {
        is_dir(&self.upload_dir).await && is_dir(&self.output_dir).await
    }

    /// `<upload_dir>/<job_id>_<file_name>`
    pub fn upload_path(&self, id: &JobId, file_name: &str) -> PathBuf {
        self.upload_dir.join(format!("{}_{}", id, file_name))
    }

    /// Display name of the processed file.
    pub fn output_file_name(file_name: &str) -> String {
        format!("blurred_{}", file_name)
    }

    /// `<output_dir>/<job_id>_blurred_<file_name>`
    pub fn output_path(&self, id: &JobId, file_name: &str) -> PathBuf {
        self.output_dir
            .join(format!("{}_{}", id, Self::output_file_name(file_name)))
    }

    /// Remove a job's upload, output and any leftover intermediate.
    ///
    /// Files that are already gone are skipped. Returns the number of files
    /// actually removed.
    pub async fn remove_job_artifacts(&self, job: &Job) -> usize {
        let intermediate = intermediate_path(&job.output_path);
        let mut removed = 0;

        for path in [&job.input_path, &job.output_path, &intermediate] {
            match remove_if_exists(path).await {
                Ok(true) => {
                    debug!(job_id = %job.id, path = %path.display(), "Removed artifact");
                    removed += 1;
                }
                Ok(false) => {}
                Err(e) => warn!(job_id = %job.id, path = %path.display(), "Failed to remove artifact: {}", e),
            }
        }

        removed
    }
}

async fn is_dir(path: &Path) -> bool {
    tokio::fs::metadata(path)
        .await
        .map(|m| m.is_dir())
        .unwrap_or(false)
}

/// Reduce a client-supplied file name to a safe single path component.
///
/// Directory parts are dropped, characters outside `[A-Za-z0-9._-]` become
/// `_`, and leading dots are stripped. Returns `None` if nothing is left.
pub fn sanitize_filename(name: &str) -> Option<String> {
    let base = name
        .rsplit(['/', '\\'])
        .next()
        .unwrap_or_default()
        .trim();

    let cleaned: String = base
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || matches!(c, '.' | '-' | '_') {
                c
            } else {
                '_'
            }
        })
        .collect();
    let cleaned = cleaned.trim_start_matches('.');

    if cleaned.is_empty() || cleaned.chars().all(|c| c == '_') {
        return None;
    }

    // Keep the extension when truncating
    if cleaned.len() > MAX_FILENAME_LEN {
        let (stem, ext) = match cleaned.rsplit_once('.') {
            Some((stem, ext)) if ext.len() < 16 => (stem, Some(ext)),
            _ => (cleaned, None),
        };
        let keep = MAX_FILENAME_LEN - ext.map(|e| e.len() + 1).unwrap_or(0);
        let stem = &stem[..keep.min(stem.len())];
        return Some(match ext {
            Some(ext) => format!("{}.{}", stem, ext),
            None => stem.to_string(),
        });
    }

    Some(cleaned.to_string())
}

/// Lowercase extension of a file name, if any.
pub fn file_extension(name: &str) -> Option<String> {
    Path::new(name)
        .extension()
        .and_then(|e| e.to_str())
        .map(|e| e.to_ascii_lowercase())
}
