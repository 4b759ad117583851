//! Background execution of blur jobs.
//!
//! Each submitted job gets its own tokio task. Tasks talk to the rest of the
//! service only through the [`JobRegistry`]; callers observe completion by
//! polling it.

use std::sync::atomic::{AtomicU8, Ordering};
use std::sync::Arc;
use std::time::Instant;
use tokio::sync::Semaphore;
use tokio::task::JoinHandle;
use tracing::{info, Instrument};
use vblur_media::{BlurPipeline, PipelineOutcome, PipelineProgress, PipelineRequest, ProgressCallback};
use vblur_models::{Job, JobId, JobStatus, NewJob};

use crate::artifacts::ArtifactStore;
use crate::config::JobsConfig;
use crate::error::{JobsError, JobsResult};
use crate::logging::{crosses_progress_step, JobLogger};
use crate::metrics;
use crate::registry::JobRegistry;
use crate::retention::RetentionSweeper;

/// Download location of a job's result.
pub fn result_url(id: &JobId) -> String {
    format!("/api/v1/jobs/{}/result", id)
}

/// Owns the registry and runs submitted jobs in the background.
#[derive(Clone)]
pub struct JobOrchestrator {
    registry: Arc<JobRegistry>,
    artifacts: Arc<ArtifactStore>,
    pipeline: BlurPipeline,
    job_semaphore: Arc<Semaphore>,
    config: JobsConfig,
}

impl JobOrchestrator {
    pub fn new(config: JobsConfig, pipeline: BlurPipeline) -> Self {
        let artifacts = ArtifactStore::new(&config.upload_dir, &config.output_dir);
        let job_semaphore = Arc::new(Semaphore::new(config.max_concurrent_jobs.max(1)));

        Self {
            registry: Arc::new(JobRegistry::new()),
            artifacts: Arc::new(artifacts),
            pipeline,
            job_semaphore,
            config,
        }
    }

    pub fn registry(&self) -> &Arc<JobRegistry> {
        &self.registry
    }

    pub fn artifacts(&self) -> &Arc<ArtifactStore> {
        &self.artifacts
    }

    pub fn config(&self) -> &JobsConfig {
        &self.config
    }

    /// Register a queued job and start its background task.
    ///
    /// The upload must already be at `new.input_path`.
    pub fn submit(&self, new: NewJob) -> Job {
        let job = self.registry.create(new);
        metrics::record_job_submitted();
        info!(job_id = %job.id, input = %job.input_file, "Job submitted");

        let this = self.clone();
        let id = job.id.clone();
        let span = JobLogger::blur(&id).span();
        tokio::spawn(async move { this.execute(id).await }.instrument(span));

        job
    }

    async fn execute(&self, id: JobId) {
        let logger = JobLogger::blur(&id);

        // Queued jobs wait here for a free slot
        let _permit = match Arc::clone(&self.job_semaphore).acquire_owned().await {
            Ok(permit) => permit,
            Err(e) => {
                logger.failed(&format!("Job semaphore closed: {}", e));
                return;
            }
        };

        let Some(job) = self.registry.update(&id, |job| {
            job.start();
            job.clone()
        }) else {
            logger.vanished("queued");
            return;
        };

        logger.started(&job);
        metrics::job_started();
        let started = Instant::now();

        let policy = job.parameters.blur_policy();
        let request = PipelineRequest {
            input: &job.input_path,
            output: &job.output_path,
            policy: &policy,
            sample_rate: job.parameters.sample_rate,
            languages: &job.parameters.languages,
        };
        let progress = self.progress_reporter(&logger);

        let result = self.pipeline.run(&request, Some(&progress)).await;
        metrics::job_finished();
        let elapsed = started.elapsed().as_secs_f64();

        let recorded = match result {
            Ok(outcome) => {
                let warning = outcome.warning().map(str::to_string);
                if let Some(warning) = &warning {
                    logger.fallback(warning);
                }
                let recorded = self.registry.update(&id, |job| {
                    job.complete(result_url(&id), warning);
                });
                if recorded.is_some() {
                    let label = match &outcome {
                        PipelineOutcome::Normalized(_) => "normalized",
                        PipelineOutcome::Fallback { .. } => "fallback",
                    };
                    metrics::record_job_completed(label, elapsed);
                    logger.completed(outcome.summary(), elapsed);
                }
                recorded
            }
            Err(e) => {
                logger.failed(&e);
                let recorded = self.registry.update(&id, |job| job.fail(e.to_string()));
                if recorded.is_some() {
                    metrics::record_job_failed();
                }
                recorded
            }
        };

        // Deleted mid-flight: whatever the pipeline wrote is now orphaned
        if recorded.is_none() {
            logger.vanished("processing");
            self.artifacts.remove_job_artifacts(&job).await;
        }
    }

    /// Progress callback that writes to the registry only when the whole
    /// percentage changes, and logs every tenth of the run.
    fn progress_reporter(&self, logger: &JobLogger) -> ProgressCallback {
        let registry = Arc::clone(&self.registry);
        let logger = logger.clone();
        let last = AtomicU8::new(0);

        Box::new(move |progress: PipelineProgress| {
            let percent = progress.percent();
            let previous = last.swap(percent, Ordering::Relaxed);
            if previous != percent {
                registry.update(logger.job_id(), |job| job.set_progress(percent));
            }
            if crosses_progress_step(previous, percent) {
                logger.progress(progress);
            }
        })
    }

    /// Snapshot of a job.
    pub fn get_job(&self, id: &JobId) -> JobsResult<Job> {
        self.registry.get(id)
    }

    /// Remove a job and its artifacts regardless of status.
    ///
    /// A running pipeline is not interrupted; it notices on its next registry
    /// update and discards its output.
    pub async fn delete_job(&self, id: &JobId) -> JobsResult<Job> {
        let job = self.registry.delete(id)?;
        let removed = self.artifacts.remove_job_artifacts(&job).await;
        metrics::record_job_deleted();
        info!(job_id = %id, status = %job.status, files_removed = removed, "Job deleted");
        Ok(job)
    }

    /// Snapshot of a completed job whose output file exists.
    pub async fn result_file(&self, id: &JobId) -> JobsResult<Job> {
        let job = self.registry.get(id)?;
        if job.status != JobStatus::Completed {
            return Err(JobsError::ResultNotReady { status: job.status });
        }
        if !tokio::fs::try_exists(&job.output_path).await.unwrap_or(false) {
            return Err(JobsError::ResultMissing(job.id));
        }
        Ok(job)
    }

    /// Sweeper bound to this orchestrator's registry and storage.
    pub fn retention_sweeper(&self) -> RetentionSweeper {
        RetentionSweeper::new(
            Arc::clone(&self.registry),
            Arc::clone(&self.artifacts),
            self.config.retention,
            self.config.sweep_interval,
        )
    }

    /// Start the periodic retention sweep.
    pub fn spawn_retention_sweeper(&self) -> JoinHandle<()> {
        let sweeper = self.retention_sweeper();
        tokio::spawn(async move { sweeper.run().await })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;
    use tempfile::TempDir;
    use vblur_media::intermediate_path;
    use vblur_media::testing::{boxed_detection, checkerboard_frames, MemoryCodec, ScriptedDetector};
    use vblur_models::JobParameters;

    struct Harness {
        _dir: TempDir,
        orchestrator: JobOrchestrator,
    }

    async fn harness(codec: MemoryCodec, detector: ScriptedDetector, max_concurrent: usize) -> Harness {
        let dir = TempDir::new().unwrap();
        let config = JobsConfig {
            max_concurrent_jobs: max_concurrent,
            ..JobsConfig::in_dir(dir.path())
        };
        let pipeline = BlurPipeline::new(Arc::new(codec), Arc::new(detector));
        let orchestrator = JobOrchestrator::new(config, pipeline);
        orchestrator.artifacts().ensure_dirs().await.unwrap();
        Harness {
            _dir: dir,
            orchestrator,
        }
    }

    async fn submit(orchestrator: &JobOrchestrator, name: &str, parameters: JobParameters) -> Job {
        let id = JobId::new();
        let store = orchestrator.artifacts();
        let input_path = store.upload_path(&id, name);
        tokio::fs::write(&input_path, b"upload").await.unwrap();

        orchestrator.submit(NewJob {
            input_file: name.to_string(),
            output_file: ArtifactStore::output_file_name(name),
            output_path: store.output_path(&id, name),
            input_path,
            parameters,
            id,
        })
    }

    async fn wait_for(orchestrator: &JobOrchestrator, id: &JobId, status: JobStatus) -> Job {
        for _ in 0..500 {
            if let Ok(job) = orchestrator.get_job(id) {
                if job.status == status {
                    return job;
                }
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        panic!("job {} never reached {}", id, status);
    }

    #[tokio::test]
    async fn test_job_completes() {
        let h = harness(
            MemoryCodec::new(checkerboard_frames(5, 16, 12)),
            ScriptedDetector::always(vec![boxed_detection(2, 2, 8, 6, "secret", 0.9)]),
            2,
        )
        .await;

        let job = submit(&h.orchestrator, "clip.mp4", JobParameters::default()).await;
        assert_eq!(job.status, JobStatus::Queued);

        let done = wait_for(&h.orchestrator, &job.id, JobStatus::Completed).await;
        assert_eq!(done.progress, 100);
        assert_eq!(done.result_url.as_deref(), Some(result_url(&job.id).as_str()));
        assert!(done.started_at.is_some());
        assert!(done.warning.is_none());

        let ready = h.orchestrator.result_file(&job.id).await.unwrap();
        assert!(ready.output_path.exists());
        assert!(!intermediate_path(&ready.output_path).exists());
    }

    #[tokio::test]
    async fn test_transcode_failure_completes_with_warning() {
        let h = harness(
            MemoryCodec::new(checkerboard_frames(3, 8, 8)).failing_transcode(),
            ScriptedDetector::empty(),
            2,
        )
        .await;

        let job = submit(&h.orchestrator, "clip.mp4", JobParameters::default()).await;
        let done = wait_for(&h.orchestrator, &job.id, JobStatus::Completed).await;

        assert!(done.warning.unwrap().contains("libx264"));
        assert!(h.orchestrator.result_file(&job.id).await.is_ok());
    }

    #[tokio::test]
    async fn test_pipeline_failure_marks_job_failed() {
        let h = harness(
            MemoryCodec::new(checkerboard_frames(3, 8, 8)).failing_open(),
            ScriptedDetector::empty(),
            2,
        )
        .await;

        let job = submit(&h.orchestrator, "clip.mp4", JobParameters::default()).await;
        let failed = wait_for(&h.orchestrator, &job.id, JobStatus::Failed).await;

        assert!(!failed.error.unwrap_or_default().is_empty());
        assert!(failed.result_url.is_none());
        assert!(matches!(
            h.orchestrator.result_file(&job.id).await,
            Err(JobsError::ResultNotReady { status: JobStatus::Failed })
        ));
    }

    #[tokio::test]
    async fn test_languages_forwarded_to_detector() {
        let detector = ScriptedDetector::empty();
        let h = harness(
            MemoryCodec::new(checkerboard_frames(2, 8, 8)),
            detector.clone(),
            2,
        )
        .await;

        let parameters = JobParameters {
            languages: vec!["de".to_string(), "fr".to_string()],
            ..JobParameters::default()
        };
        let job = submit(&h.orchestrator, "clip.mp4", parameters).await;
        wait_for(&h.orchestrator, &job.id, JobStatus::Completed).await;

        assert!(detector
            .languages_seen()
            .iter()
            .all(|langs| langs == &["de".to_string(), "fr".to_string()]));
    }

    #[tokio::test]
    async fn test_delete_removes_job_and_files() {
        let h = harness(
            MemoryCodec::new(checkerboard_frames(2, 8, 8)),
            ScriptedDetector::empty(),
            2,
        )
        .await;

        let job = submit(&h.orchestrator, "clip.mp4", JobParameters::default()).await;
        let done = wait_for(&h.orchestrator, &job.id, JobStatus::Completed).await;
        assert!(done.output_path.exists());

        h.orchestrator.delete_job(&job.id).await.unwrap();

        assert!(h.orchestrator.get_job(&job.id).unwrap_err().is_not_found());
        assert!(!done.input_path.exists());
        assert!(!done.output_path.exists());
        assert!(h.orchestrator.delete_job(&job.id).await.unwrap_err().is_not_found());
    }

    #[tokio::test]
    async fn test_delete_during_processing_is_not_resurrected() {
        let h = harness(
            MemoryCodec::new(checkerboard_frames(20, 8, 8)).with_frame_delay(Duration::from_millis(10)),
            ScriptedDetector::empty(),
            2,
        )
        .await;

        let job = submit(&h.orchestrator, "clip.mp4", JobParameters::default()).await;
        wait_for(&h.orchestrator, &job.id, JobStatus::Processing).await;
        h.orchestrator.delete_job(&job.id).await.unwrap();

        // Let the pipeline run to completion
        tokio::time::sleep(Duration::from_millis(600)).await;

        assert!(h.orchestrator.get_job(&job.id).unwrap_err().is_not_found());
        assert!(h.orchestrator.registry().is_empty());
        assert!(!job.output_path.exists());
        assert!(!intermediate_path(&job.output_path).exists());
    }

    #[tokio::test]
    async fn test_concurrent_jobs_are_isolated() {
        let h = harness(
            MemoryCodec::new(checkerboard_frames(4, 8, 8)),
            ScriptedDetector::empty(),
            4,
        )
        .await;

        let params_b = JobParameters {
            blur_strength: 11,
            ..JobParameters::default()
        };
        let a = submit(&h.orchestrator, "a.mp4", JobParameters::default()).await;
        let b = submit(&h.orchestrator, "b.mov", params_b.clone()).await;

        let a_done = wait_for(&h.orchestrator, &a.id, JobStatus::Completed).await;
        let b_done = wait_for(&h.orchestrator, &b.id, JobStatus::Completed).await;

        assert_eq!(a_done.input_file, "a.mp4");
        assert_eq!(b_done.input_file, "b.mov");
        assert_eq!(b_done.parameters, params_b);
        assert_ne!(a_done.output_path, b_done.output_path);
    }

    #[tokio::test]
    async fn test_concurrency_limit_keeps_jobs_queued() {
        let h = harness(
            MemoryCodec::new(checkerboard_frames(30, 8, 8)).with_frame_delay(Duration::from_millis(10)),
            ScriptedDetector::empty(),
            1,
        )
        .await;

        let first = submit(&h.orchestrator, "a.mp4", JobParameters::default()).await;
        let second = submit(&h.orchestrator, "b.mp4", JobParameters::default()).await;

        wait_for(&h.orchestrator, &first.id, JobStatus::Processing).await;
        assert_eq!(h.orchestrator.get_job(&second.id).unwrap().status, JobStatus::Queued);

        wait_for(&h.orchestrator, &first.id, JobStatus::Completed).await;
        wait_for(&h.orchestrator, &second.id, JobStatus::Completed).await;
    }

    #[tokio::test]
    async fn test_result_file_not_found() {
        let h = harness(MemoryCodec::new(Vec::new()), ScriptedDetector::empty(), 1).await;
        let err = h.orchestrator.result_file(&JobId::new()).await.unwrap_err();
        assert!(err.is_not_found());
    }

    #[tokio::test]
    async fn test_result_file_missing_output() {
        let h = harness(
            MemoryCodec::new(checkerboard_frames(2, 8, 8)),
            ScriptedDetector::empty(),
            1,
        )
        .await;

        let job = submit(&h.orchestrator, "clip.mp4", JobParameters::default()).await;
        let done = wait_for(&h.orchestrator, &job.id, JobStatus::Completed).await;
        tokio::fs::remove_file(&done.output_path).await.unwrap();

        assert!(matches!(
            h.orchestrator.result_file(&job.id).await,
            Err(JobsError::ResultMissing(_))
        ));
    }
}
