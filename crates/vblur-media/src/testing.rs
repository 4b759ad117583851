//! In-memory codec and scripted detector for exercising the pipeline
//! without FFmpeg or an OCR service.

use async_trait::async_trait;
use image::Rgb;
use std::collections::VecDeque;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use crate::codec::{FrameGeometry, FrameSink, FrameSource, TranscodeProfile, VideoCodec};
use crate::detection::{TextDetection, TextDetector};
use crate::error::{MediaError, MediaResult};
use crate::Frame;

/// Lifecycle events recorded by [`MemoryCodec`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CodecEvent {
    SourceOpened,
    SourceClosed,
    SinkOpened,
    SinkFinished,
    SinkAborted,
    Transcoded { audio_source: Option<PathBuf> },
}

/// Codec that "decodes" a fixed list of frames and records what is written.
#[derive(Clone)]
pub struct MemoryCodec {
    frames: Vec<Frame>,
    fps: f64,
    fail_open: bool,
    fail_sink: bool,
    fail_read_at: Option<u64>,
    fail_write_at: Option<u64>,
    fail_transcode: bool,
    frame_delay: Option<Duration>,
    written: Arc<Mutex<Vec<Frame>>>,
    events: Arc<Mutex<Vec<CodecEvent>>>,
}

impl MemoryCodec {
    pub fn new(frames: Vec<Frame>) -> Self {
        Self {
            frames,
            fps: 25.0,
            fail_open: false,
            fail_sink: false,
            fail_read_at: None,
            fail_write_at: None,
            fail_transcode: false,
            frame_delay: None,
            written: Arc::new(Mutex::new(Vec::new())),
            events: Arc::new(Mutex::new(Vec::new())),
        }
    }

    /// The decoder refuses to open the input.
    pub fn failing_open(mut self) -> Self {
        self.fail_open = true;
        self
    }

    /// The encoder refuses to open the output.
    pub fn failing_sink(mut self) -> Self {
        self.fail_sink = true;
        self
    }

    /// Reading frame `index` fails with an I/O error.
    pub fn failing_read_at(mut self, index: u64) -> Self {
        self.fail_read_at = Some(index);
        self
    }

    /// Writing frame `index` fails with an I/O error.
    pub fn failing_write_at(mut self, index: u64) -> Self {
        self.fail_write_at = Some(index);
        self
    }

    /// The final transcode fails.
    pub fn failing_transcode(mut self) -> Self {
        self.fail_transcode = true;
        self
    }

    /// Sleep before yielding each frame.
    pub fn with_frame_delay(mut self, delay: Duration) -> Self {
        self.frame_delay = Some(delay);
        self
    }

    /// Frames written to sinks so far, across all runs.
    pub fn written_frames(&self) -> Vec<Frame> {
        lock(&self.written).clone()
    }

    pub fn events(&self) -> Vec<CodecEvent> {
        lock(&self.events).clone()
    }

    fn geometry(&self) -> FrameGeometry {
        let (width, height) = self.frames.first().map(|f| f.dimensions()).unwrap_or((0, 0));
        FrameGeometry {
            width,
            height,
            fps: self.fps,
            total_frames: self.frames.len() as u64,
        }
    }

    fn record(&self, event: CodecEvent) {
        lock(&self.events).push(event);
    }
}

#[async_trait]
impl VideoCodec for MemoryCodec {
    fn name(&self) -> &'static str {
        "memory"
    }

    async fn open_source(&self, input: &Path) -> MediaResult<Box<dyn FrameSource>> {
        if self.fail_open {
            return Err(MediaError::InvalidVideo(format!(
                "{} is not a video",
                input.display()
            )));
        }
        self.record(CodecEvent::SourceOpened);

        Ok(Box::new(MemorySource {
            frames: self.frames.iter().cloned().collect(),
            geometry: self.geometry(),
            index: 0,
            fail_read_at: self.fail_read_at,
            frame_delay: self.frame_delay,
            events: Arc::clone(&self.events),
            closed: false,
        }))
    }

    async fn open_sink(
        &self,
        output: &Path,
        _geometry: &FrameGeometry,
    ) -> MediaResult<Box<dyn FrameSink>> {
        if self.fail_sink {
            return Err(MediaError::OutputCreateFailed(format!(
                "{} is read-only",
                output.display()
            )));
        }
        tokio::fs::write(output, b"")
            .await
            .map_err(|e| MediaError::OutputCreateFailed(e.to_string()))?;
        self.record(CodecEvent::SinkOpened);

        Ok(Box::new(MemorySink {
            path: output.to_path_buf(),
            written: Arc::clone(&self.written),
            events: Arc::clone(&self.events),
            count: 0,
            fail_write_at: self.fail_write_at,
            done: false,
        }))
    }

    async fn transcode(
        &self,
        intermediate: &Path,
        output: &Path,
        _profile: &TranscodeProfile,
        audio_source: Option<&Path>,
    ) -> MediaResult<()> {
        self.record(CodecEvent::Transcoded {
            audio_source: audio_source.map(Path::to_path_buf),
        });
        if self.fail_transcode {
            return Err(MediaError::TranscodeFailed("libx264 not available".to_string()));
        }
        let body = tokio::fs::read(intermediate).await?;
        let mut normalized = b"NORMALIZED\n".to_vec();
        normalized.extend(body);
        tokio::fs::write(output, normalized).await?;
        Ok(())
    }
}

struct MemorySource {
    frames: VecDeque<Frame>,
    geometry: FrameGeometry,
    index: u64,
    fail_read_at: Option<u64>,
    frame_delay: Option<Duration>,
    events: Arc<Mutex<Vec<CodecEvent>>>,
    closed: bool,
}

#[async_trait]
impl FrameSource for MemorySource {
    fn geometry(&self) -> &FrameGeometry {
        &self.geometry
    }

    async fn next_frame(&mut self) -> MediaResult<Option<Frame>> {
        if let Some(delay) = self.frame_delay {
            tokio::time::sleep(delay).await;
        }
        if self.fail_read_at == Some(self.index) {
            return Err(MediaError::frame_io(format!("corrupt packet at frame {}", self.index)));
        }
        let frame = self.frames.pop_front();
        if frame.is_some() {
            self.index += 1;
        }
        Ok(frame)
    }

    async fn close(&mut self) {
        if !self.closed {
            self.closed = true;
            lock(&self.events).push(CodecEvent::SourceClosed);
        }
    }
}

struct MemorySink {
    path: PathBuf,
    written: Arc<Mutex<Vec<Frame>>>,
    events: Arc<Mutex<Vec<CodecEvent>>>,
    count: u64,
    fail_write_at: Option<u64>,
    done: bool,
}

#[async_trait]
impl FrameSink for MemorySink {
    async fn write_frame(&mut self, frame: &Frame) -> MediaResult<()> {
        if self.fail_write_at == Some(self.count) {
            return Err(MediaError::frame_io(format!("encoder pipe closed at frame {}", self.count)));
        }
        lock(&self.written).push(frame.clone());
        self.count += 1;
        Ok(())
    }

    async fn finish(&mut self) -> MediaResult<()> {
        if !self.done {
            self.done = true;
            tokio::fs::write(&self.path, format!("frames={}\n", self.count)).await?;
            lock(&self.events).push(CodecEvent::SinkFinished);
        }
        Ok(())
    }

    async fn abort(&mut self) {
        if !self.done {
            self.done = true;
            lock(&self.events).push(CodecEvent::SinkAborted);
        }
    }
}

/// Detector that replays a fixed script, one entry per call.
///
/// Calls past the end of the script return no detections.
#[derive(Clone, Default)]
pub struct ScriptedDetector {
    script: Arc<Vec<Vec<TextDetection>>>,
    repeat: Option<Vec<TextDetection>>,
    fail: bool,
    calls: Arc<Mutex<Vec<Vec<String>>>>,
}

impl ScriptedDetector {
    pub fn new(script: Vec<Vec<TextDetection>>) -> Self {
        Self {
            script: Arc::new(script),
            ..Default::default()
        }
    }

    /// Return the same detections on every call.
    pub fn always(detections: Vec<TextDetection>) -> Self {
        Self {
            repeat: Some(detections),
            ..Default::default()
        }
    }

    /// Detector that never finds anything.
    pub fn empty() -> Self {
        Self::default()
    }

    /// Every call fails.
    pub fn failing() -> Self {
        Self {
            fail: true,
            ..Default::default()
        }
    }

    /// Number of detection passes so far.
    pub fn calls(&self) -> usize {
        lock(&self.calls).len()
    }

    /// Languages passed to each call.
    pub fn languages_seen(&self) -> Vec<Vec<String>> {
        lock(&self.calls).clone()
    }
}

#[async_trait]
impl TextDetector for ScriptedDetector {
    async fn detect(&self, _frame: &Frame, languages: &[String]) -> MediaResult<Vec<TextDetection>> {
        let call = {
            let mut calls = lock(&self.calls);
            calls.push(languages.to_vec());
            calls.len() - 1
        };

        if self.fail {
            return Err(MediaError::detection_failed("OCR engine unavailable"));
        }
        if let Some(repeat) = &self.repeat {
            return Ok(repeat.clone());
        }
        Ok(self.script.get(call).cloned().unwrap_or_default())
    }

    fn name(&self) -> &'static str {
        "scripted"
    }
}

/// `count` checkerboard frames whose phase alternates, so every frame is
/// distinct and any blur is visible.
pub fn checkerboard_frames(count: usize, width: u32, height: u32) -> Vec<Frame> {
    (0..count)
        .map(|i| {
            Frame::from_fn(width, height, |x, y| {
                let on = (x / 2 + y / 2 + i as u32) % 2 == 0;
                let shade = (i as u8).wrapping_mul(7);
                if on {
                    Rgb([255, 255 - shade, 255])
                } else {
                    Rgb([0, shade, 0])
                }
            })
        })
        .collect()
}

/// Detection covering the axis-aligned box `(x1, y1)..(x2, y2)`.
pub fn boxed_detection(x1: i32, y1: i32, x2: i32, y2: i32, text: &str, confidence: f64) -> TextDetection {
    TextDetection::new(vec![(x1, y1), (x2, y1), (x2, y2), (x1, y2)], text, confidence)
}

fn lock<T>(mutex: &Mutex<T>) -> std::sync::MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}
