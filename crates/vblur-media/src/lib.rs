#![deny(unreachable_patterns)]
//! Text blur pipeline for video files.
//!
//! This crate provides:
//! - Type-safe FFmpeg command building and FFprobe inspection
//! - Raw frame decode/encode through FFmpeg pipes
//! - Region matching, Gaussian compositing and temporal sampling
//! - The end-to-end blur pipeline with transcode fallback

pub mod codec;
pub mod command;
pub mod detection;
pub mod error;
pub mod fs_utils;
pub mod metrics;
pub mod pipeline;
pub mod probe;
pub mod progress;
pub mod redaction;

#[cfg(any(test, feature = "test-support"))]
pub mod testing;

pub use codec::{FfmpegCodec, FrameGeometry, FrameSink, FrameSource, TranscodeProfile, VideoCodec};
pub use command::{FfmpegCommand, FfmpegRunner};
pub use detection::{TextDetection, TextDetector};
pub use error::{MediaError, MediaResult};
pub use pipeline::{
    intermediate_path, BlurPipeline, PipelineOutcome, PipelineRequest, ProcessingSummary,
};
pub use probe::{probe_video, VideoInfo};
pub use progress::{PipelineProgress, ProgressCallback};
pub use redaction::{FrameBlurCompositor, RegionMatcher, SampleController};

/// Raster frame type handled by the pipeline (packed RGB, 8 bits per channel).
pub type Frame = image::RgbImage;
