//! Application state.

use std::sync::Arc;

use vblur_jobs::{JobOrchestrator, JobsConfig};
use vblur_media::{BlurPipeline, TextDetector, VideoCodec};

use crate::config::ApiConfig;

/// Shared application state.
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<ApiConfig>,
    pub jobs: JobOrchestrator,
}

impl AppState {
    /// Create application state around a codec and a text detector.
    pub fn new(
        config: ApiConfig,
        jobs_config: JobsConfig,
        codec: Arc<dyn VideoCodec>,
        detector: Arc<dyn TextDetector>,
    ) -> Self {
        let pipeline = BlurPipeline::new(codec, detector);

        Self {
            config: Arc::new(config),
            jobs: JobOrchestrator::new(jobs_config, pipeline),
        }
    }
}
