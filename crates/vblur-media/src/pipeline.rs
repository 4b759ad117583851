//! End-to-end blur pipeline: decode → sample/detect → blur → encode → transcode.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, info, warn};
use vblur_models::{BlurPolicy, DetectedRegion};

use crate::codec::{FrameGeometry, FrameSink, FrameSource, TranscodeProfile, VideoCodec};
use crate::detection::{TextDetection, TextDetector};
use crate::error::{MediaError, MediaResult};
use crate::fs_utils::{move_file, remove_if_exists};
use crate::metrics;
use crate::progress::{PipelineProgress, ProgressCallback};
use crate::redaction::{FrameBlurCompositor, RegionMatcher, SampleController};

/// What to blur in one run.
#[derive(Debug, Clone)]
pub struct PipelineRequest<'a> {
    pub input: &'a Path,
    pub output: &'a Path,
    pub policy: &'a BlurPolicy,
    /// Run detection on every Nth frame
    pub sample_rate: u32,
    /// Languages forwarded to the detector
    pub languages: &'a [String],
}

/// Statistics of a completed run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProcessingSummary {
    pub frames_processed: u64,
    pub detection_passes: u64,
    /// Frames that had at least one region blurred
    pub frames_blurred: u64,
    pub width: u32,
    pub height: u32,
    pub fps: f64,
    pub elapsed_secs: f64,
}

/// Result of a successful run.
#[derive(Debug, Clone, PartialEq)]
pub enum PipelineOutcome {
    /// Output was normalized by the transcode step.
    Normalized(ProcessingSummary),
    /// Transcode failed; the intermediate encode was kept as the output.
    Fallback {
        summary: ProcessingSummary,
        warning: String,
    },
}

impl PipelineOutcome {
    pub fn summary(&self) -> &ProcessingSummary {
        match self {
            PipelineOutcome::Normalized(summary) => summary,
            PipelineOutcome::Fallback { summary, .. } => summary,
        }
    }

    pub fn warning(&self) -> Option<&str> {
        match self {
            PipelineOutcome::Normalized(_) => None,
            PipelineOutcome::Fallback { warning, .. } => Some(warning),
        }
    }
}

/// Location of the pre-transcode artifact for `output`: `<stem>.temp.mp4`
/// in the same directory.
pub fn intermediate_path(output: &Path) -> PathBuf {
    let stem = output
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_else(|| "output".to_string());
    output.with_file_name(format!("{}.temp.mp4", stem))
}

/// Drives a codec and a detector over a whole video.
#[derive(Clone)]
pub struct BlurPipeline {
    codec: Arc<dyn VideoCodec>,
    detector: Arc<dyn TextDetector>,
    profile: TranscodeProfile,
    matcher: RegionMatcher,
}

impl BlurPipeline {
    pub fn new(codec: Arc<dyn VideoCodec>, detector: Arc<dyn TextDetector>) -> Self {
        Self {
            codec,
            detector,
            profile: TranscodeProfile::default(),
            matcher: RegionMatcher::new(),
        }
    }

    pub fn with_profile(mut self, profile: TranscodeProfile) -> Self {
        self.profile = profile;
        self
    }

    /// Blur `input` into `output` with English detection and no progress reporting.
    pub async fn process(
        &self,
        input: &Path,
        output: &Path,
        policy: &BlurPolicy,
        sample_rate: u32,
    ) -> MediaResult<PipelineOutcome> {
        let languages = vec!["en".to_string()];
        let request = PipelineRequest {
            input,
            output,
            policy,
            sample_rate,
            languages: &languages,
        };
        self.run(&request, None).await
    }

    /// Run the pipeline.
    ///
    /// Failures before the frame loop leave no output behind. Failures in the
    /// loop release both decoder and encoder and remove the intermediate. A
    /// failed transcode is not an error: the intermediate becomes the output
    /// and the outcome carries a warning.
    pub async fn run(
        &self,
        request: &PipelineRequest<'_>,
        progress: Option<&ProgressCallback>,
    ) -> MediaResult<PipelineOutcome> {
        let started = Instant::now();
        let input = request.input;
        let output = request.output;

        if !tokio::fs::try_exists(input).await.unwrap_or(false) {
            return Err(MediaError::InputNotFound(input.to_path_buf()));
        }

        let mut source = self.codec.open_source(input).await.map_err(|e| match e {
            MediaError::InputNotFound(path) => MediaError::InputNotFound(path),
            other => MediaError::InputUnreadable(other.to_string()),
        })?;
        let geometry = *source.geometry();

        let intermediate = intermediate_path(output);
        let mut sink = match self.codec.open_sink(&intermediate, &geometry).await {
            Ok(sink) => sink,
            Err(e) => {
                source.close().await;
                discard(&intermediate).await;
                return Err(match e {
                    MediaError::OutputCreateFailed(msg) => MediaError::OutputCreateFailed(msg),
                    other => MediaError::OutputCreateFailed(other.to_string()),
                });
            }
        };

        info!(
            input = %input.display(),
            width = geometry.width,
            height = geometry.height,
            fps = geometry.fps,
            total_frames = geometry.total_frames,
            sample_rate = request.sample_rate,
            detector = self.detector.name(),
            codec = self.codec.name(),
            "Starting blur pipeline"
        );

        let looped = self
            .frame_loop(source.as_mut(), sink.as_mut(), &geometry, request, progress)
            .await;
        source.close().await;

        let mut summary = match looped {
            Ok(summary) => summary,
            Err(e) => {
                sink.abort().await;
                discard(&intermediate).await;
                metrics::record_pipeline_duration("failed", started.elapsed().as_secs_f64());
                return Err(e);
            }
        };

        if let Err(e) = sink.finish().await {
            discard(&intermediate).await;
            metrics::record_pipeline_duration("failed", started.elapsed().as_secs_f64());
            return Err(e);
        }

        let transcoded = self
            .codec
            .transcode(&intermediate, output, &self.profile, Some(input))
            .await;
        summary.elapsed_secs = started.elapsed().as_secs_f64();

        match transcoded {
            Ok(()) => {
                discard(&intermediate).await;
                metrics::record_pipeline_duration("normalized", summary.elapsed_secs);
                info!(
                    output = %output.display(),
                    frames = summary.frames_processed,
                    detection_passes = summary.detection_passes,
                    elapsed_secs = summary.elapsed_secs,
                    "Blur pipeline completed"
                );
                Ok(PipelineOutcome::Normalized(summary))
            }
            Err(e) => {
                warn!(
                    output = %output.display(),
                    error = %e,
                    "Transcode failed, keeping intermediate encode"
                );
                move_file(&intermediate, output).await?;
                metrics::record_transcode_fallback();
                metrics::record_pipeline_duration("fallback", summary.elapsed_secs);
                Ok(PipelineOutcome::Fallback {
                    summary,
                    warning: format!("Transcode failed, output was not normalized: {}", e),
                })
            }
        }
    }

    async fn frame_loop(
        &self,
        source: &mut dyn FrameSource,
        sink: &mut dyn FrameSink,
        geometry: &FrameGeometry,
        request: &PipelineRequest<'_>,
        progress: Option<&ProgressCallback>,
    ) -> MediaResult<ProcessingSummary> {
        let policy = request.policy;
        let compositor = Arc::new(FrameBlurCompositor::from_policy(policy));
        let mut sampler = SampleController::new(request.sample_rate);
        let mut summary = ProcessingSummary {
            frames_processed: 0,
            detection_passes: 0,
            frames_blurred: 0,
            width: geometry.width,
            height: geometry.height,
            fps: geometry.fps,
            elapsed_secs: 0.0,
        };

        let mut index = 0u64;
        while let Some(frame) = source.next_frame().await? {
            if sampler.observe(index) {
                let detections = self.detector.detect(&frame, request.languages).await?;
                summary.detection_passes += 1;
                metrics::record_detection_pass(self.detector.name());

                let regions = self.select_regions(&detections, policy, frame.width(), frame.height());
                debug!(
                    frame = index,
                    detected = detections.len(),
                    selected = regions.len(),
                    "Detection pass"
                );
                sampler.update(regions);
            }

            let visible = compositor.plan(
                sampler.regions(),
                policy.padding,
                frame.width(),
                frame.height(),
            );
            let frame = if visible.is_empty() {
                frame
            } else {
                let regions = sampler.regions().to_vec();
                let compositor = Arc::clone(&compositor);
                let padding = policy.padding;
                summary.frames_blurred += 1;
                metrics::record_regions_blurred(visible.len());
                tokio::task::spawn_blocking(move || compositor.apply(&frame, &regions, padding))
                    .await
                    .map_err(|e| MediaError::internal(format!("Blur task failed: {}", e)))?
            };

            sink.write_frame(&frame).await?;
            index += 1;
            summary.frames_processed = index;

            if let Some(report) = progress {
                report(PipelineProgress::new(index, geometry.total_frames));
            }
        }

        metrics::record_frames_processed(summary.frames_processed);
        Ok(summary)
    }

    /// Detections above the confidence threshold whose text the policy targets.
    fn select_regions(
        &self,
        detections: &[TextDetection],
        policy: &BlurPolicy,
        width: u32,
        height: u32,
    ) -> Vec<DetectedRegion> {
        detections
            .iter()
            .filter(|d| d.confidence >= policy.confidence_threshold)
            .filter(|d| self.matcher.matches(&d.text, policy))
            .filter_map(|d| d.to_region(width, height))
            .collect()
    }
}

async fn discard(path: &Path) {
    if let Err(e) = remove_if_exists(path).await {
        warn!("Failed to remove {}: {}", path.display(), e);
    }
}
