//! Frame-level video decode/encode and final transcode.
//!
//! The pipeline only talks to these traits. [`FfmpegCodec`] is the
//! production implementation; tests use the in-memory codec from
//! `crate::testing`.

mod ffmpeg;

pub use ffmpeg::FfmpegCodec;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::path::Path;

use crate::error::MediaResult;
use crate::Frame;

/// Resolution, rate and length of a decoded stream.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct FrameGeometry {
    pub width: u32,
    pub height: u32,
    pub fps: f64,
    /// Frame count reported by the container (may be an estimate)
    pub total_frames: u64,
}

impl FrameGeometry {
    /// Bytes in one packed RGB frame.
    pub fn frame_len(&self) -> usize {
        self.width as usize * self.height as usize * 3
    }
}

/// Target profile for the final normalization step.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TranscodeProfile {
    pub video_codec: String,
    pub preset: String,
    pub crf: u8,
    pub pixel_format: String,
    /// Move the index to the file start for progressive playback
    pub faststart: bool,
    /// Codec for the remuxed source audio; `None` drops audio
    pub audio_codec: Option<String>,
}

impl Default for TranscodeProfile {
    fn default() -> Self {
        Self {
            video_codec: "libx264".to_string(),
            preset: "medium".to_string(),
            crf: 23,
            pixel_format: "yuv420p".to_string(),
            faststart: true,
            audio_codec: Some("aac".to_string()),
        }
    }
}

/// Ordered stream of decoded frames.
#[async_trait]
pub trait FrameSource: Send {
    /// Geometry of the frames this source yields.
    fn geometry(&self) -> &FrameGeometry;

    /// Next frame in presentation order, or `None` at end of stream.
    async fn next_frame(&mut self) -> MediaResult<Option<Frame>>;

    /// Release the decoder. Safe to call more than once.
    async fn close(&mut self);
}

/// Ordered consumer of encoded frames.
#[async_trait]
pub trait FrameSink: Send {
    async fn write_frame(&mut self, frame: &Frame) -> MediaResult<()>;

    /// Flush and finalize the artifact.
    async fn finish(&mut self) -> MediaResult<()>;

    /// Release the encoder without finalizing. Safe to call more than once.
    async fn abort(&mut self);
}

/// Decode/encode/transcode service used by the pipeline.
#[async_trait]
pub trait VideoCodec: Send + Sync {
    /// Short name for logs.
    fn name(&self) -> &'static str;

    async fn open_source(&self, input: &Path) -> MediaResult<Box<dyn FrameSource>>;

    async fn open_sink(
        &self,
        output: &Path,
        geometry: &FrameGeometry,
    ) -> MediaResult<Box<dyn FrameSink>>;

    /// Normalize `intermediate` into `output`, taking audio from
    /// `audio_source` when it has any.
    async fn transcode(
        &self,
        intermediate: &Path,
        output: &Path,
        profile: &TranscodeProfile,
        audio_source: Option<&Path>,
    ) -> MediaResult<()>;
}
