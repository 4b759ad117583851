//! FFmpeg-backed codec: rawvideo rgb24 over stdin/stdout pipes.

use async_trait::async_trait;
use std::path::{Path, PathBuf};
use std::process::Stdio;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWriteExt, BufReader};
use tokio::process::{Child, ChildStdin, ChildStdout, Command};
use tokio::task::JoinHandle;
use tracing::{debug, warn};

use super::{FrameGeometry, FrameSink, FrameSource, TranscodeProfile, VideoCodec};
use crate::command::{check_ffmpeg, stderr_tail, FfmpegCommand, FfmpegRunner};
use crate::error::{MediaError, MediaResult};
use crate::probe::probe_video;
use crate::Frame;

/// Codec that shells out to `ffmpeg` and `ffprobe`.
#[derive(Debug, Clone, Default)]
pub struct FfmpegCodec {
    transcode_timeout_secs: Option<u64>,
}

impl FfmpegCodec {
    pub fn new() -> Self {
        Self::default()
    }

    /// Bound the final transcode's wall time.
    pub fn with_transcode_timeout(mut self, secs: u64) -> Self {
        self.transcode_timeout_secs = Some(secs);
        self
    }
}

#[async_trait]
impl VideoCodec for FfmpegCodec {
    fn name(&self) -> &'static str {
        "ffmpeg"
    }

    async fn open_source(&self, input: &Path) -> MediaResult<Box<dyn FrameSource>> {
        let info = probe_video(input).await?;
        let geometry = FrameGeometry {
            width: info.width,
            height: info.height,
            fps: info.fps,
            total_frames: info.frame_count,
        };

        // Frames come out in display orientation, matching the probed geometry
        let ffmpeg = check_ffmpeg()?;
        let mut child = Command::new(ffmpeg)
            .args(["-hide_banner", "-v", "error", "-autorotate", "-i"])
            .arg(input)
            .args(["-map", "0:v:0", "-f", "rawvideo", "-pix_fmt", "rgb24", "-"])
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()?;

        let stdout = child
            .stdout
            .take()
            .ok_or_else(|| MediaError::internal("Failed to capture FFmpeg stdout"))?;
        let stderr_task = drain_stderr(&mut child);

        debug!(
            "Opened decoder for {} ({}x{}, rotation {}, @ {:.3} fps, ~{} frames)",
            input.display(),
            geometry.width,
            geometry.height,
            info.rotation,
            geometry.fps,
            geometry.total_frames
        );

        Ok(Box::new(FfmpegFrameSource {
            child,
            stdout: BufReader::new(stdout),
            geometry,
            stderr_task,
            frames_read: 0,
            finished: false,
        }))
    }

    async fn open_sink(
        &self,
        output: &Path,
        geometry: &FrameGeometry,
    ) -> MediaResult<Box<dyn FrameSink>> {
        // Surface unwritable destinations now rather than at the first frame.
        tokio::fs::File::create(output)
            .await
            .map_err(|e| MediaError::OutputCreateFailed(format!("{}: {}", output.display(), e)))?;

        let ffmpeg = check_ffmpeg()?;
        let mut child = Command::new(ffmpeg)
            .args(["-hide_banner", "-y", "-v", "error"])
            .args(["-f", "rawvideo", "-pix_fmt", "rgb24"])
            .args(["-s", &format!("{}x{}", geometry.width, geometry.height)])
            .args(["-r", &format!("{:.6}", geometry.fps)])
            .args(["-i", "-"])
            .args(["-an", "-c:v", "mpeg4", "-q:v", "2", "-f", "mp4"])
            .arg(output)
            .stdin(Stdio::piped())
            .stdout(Stdio::null())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .map_err(|e| MediaError::OutputCreateFailed(format!("Failed to spawn FFmpeg: {}", e)))?;

        let stdin = child
            .stdin
            .take()
            .ok_or_else(|| MediaError::OutputCreateFailed("Failed to capture FFmpeg stdin".into()))?;
        let stderr_task = drain_stderr(&mut child);

        Ok(Box::new(FfmpegFrameSink {
            child,
            stdin: Some(stdin),
            geometry: *geometry,
            output: output.to_path_buf(),
            stderr_task,
            done: false,
        }))
    }

    async fn transcode(
        &self,
        intermediate: &Path,
        output: &Path,
        profile: &TranscodeProfile,
        audio_source: Option<&Path>,
    ) -> MediaResult<()> {
        let mut cmd = FfmpegCommand::new(intermediate, output);

        let audio_source = match audio_source {
            Some(source) if profile.audio_codec.is_some() => {
                source_has_audio(source).await.then_some(source)
            }
            _ => None,
        };

        match (audio_source, profile.audio_codec.as_deref()) {
            (Some(audio), Some(audio_codec)) => {
                cmd = cmd
                    .extra_input(audio)
                    .map("0:v:0")
                    .map("1:a:0?")
                    .audio_codec(audio_codec)
                    .output_arg("-shortest");
            }
            _ => {
                cmd = cmd.map("0:v:0").output_arg("-an");
            }
        }

        cmd = cmd
            .video_codec(profile.video_codec.clone())
            .preset(profile.preset.clone())
            .crf(profile.crf)
            .pixel_format(profile.pixel_format.clone());
        if profile.faststart {
            cmd = cmd.faststart();
        }

        let mut runner = FfmpegRunner::new();
        if let Some(secs) = self.transcode_timeout_secs {
            runner = runner.with_timeout(secs);
        }

        runner.run(&cmd).await.map_err(|e| match e {
            MediaError::FfmpegFailed {
                message, stderr, ..
            } => MediaError::TranscodeFailed(match stderr {
                Some(stderr) if !stderr.is_empty() => format!("{}: {}", message, stderr),
                _ => message,
            }),
            other => MediaError::TranscodeFailed(other.to_string()),
        })
    }
}

/// Whether `path` has an audio track worth remuxing. Sources ffprobe cannot read
/// count as silent.
async fn source_has_audio(path: &Path) -> bool {
    match probe_video(path).await {
        Ok(info) => info.has_audio,
        Err(e) => {
            warn!("Could not inspect {} for audio: {}", path.display(), e);
            false
        }
    }
}

struct FfmpegFrameSource {
    child: Child,
    stdout: BufReader<ChildStdout>,
    geometry: FrameGeometry,
    stderr_task: Option<JoinHandle<Vec<u8>>>,
    frames_read: u64,
    finished: bool,
}

#[async_trait]
impl FrameSource for FfmpegFrameSource {
    fn geometry(&self) -> &FrameGeometry {
        &self.geometry
    }

    async fn next_frame(&mut self) -> MediaResult<Option<Frame>> {
        if self.finished {
            return Ok(None);
        }

        let mut buf = vec![0u8; self.geometry.frame_len()];
        let read = read_full(&mut self.stdout, &mut buf)
            .await
            .map_err(|e| MediaError::frame_io(format!("Decoder read failed: {}", e)))?;

        if read == buf.len() {
            self.frames_read += 1;
            return Frame::from_raw(self.geometry.width, self.geometry.height, buf)
                .map(Some)
                .ok_or_else(|| MediaError::frame_io("Decoded frame has unexpected size"));
        }

        self.finished = true;
        let status = self.child.wait().await?;
        let stderr = take_stderr(&mut self.stderr_task).await;

        if read != 0 {
            return Err(MediaError::frame_io(format!(
                "Truncated frame {} ({} of {} bytes)",
                self.frames_read,
                read,
                buf.len()
            )));
        }

        if !status.success() {
            return Err(MediaError::frame_io(format!(
                "Decoder exited with {:?} after {} frames: {}",
                status.code(),
                self.frames_read,
                stderr
            )));
        }

        Ok(None)
    }

    async fn close(&mut self) {
        if !self.finished {
            self.finished = true;
            let _ = self.child.kill().await;
        }
        let _ = take_stderr(&mut self.stderr_task).await;
    }
}

struct FfmpegFrameSink {
    child: Child,
    stdin: Option<ChildStdin>,
    geometry: FrameGeometry,
    output: PathBuf,
    stderr_task: Option<JoinHandle<Vec<u8>>>,
    done: bool,
}

#[async_trait]
impl FrameSink for FfmpegFrameSink {
    async fn write_frame(&mut self, frame: &Frame) -> MediaResult<()> {
        if frame.width() != self.geometry.width || frame.height() != self.geometry.height {
            return Err(MediaError::frame_io(format!(
                "Frame is {}x{}, encoder expects {}x{}",
                frame.width(),
                frame.height(),
                self.geometry.width,
                self.geometry.height
            )));
        }

        let stdin = self
            .stdin
            .as_mut()
            .ok_or_else(|| MediaError::frame_io("Encoder already closed"))?;

        stdin
            .write_all(frame.as_raw())
            .await
            .map_err(|e| MediaError::frame_io(format!("Encoder write failed: {}", e)))
    }

    async fn finish(&mut self) -> MediaResult<()> {
        if self.done {
            return Ok(());
        }
        self.done = true;

        if let Some(mut stdin) = self.stdin.take() {
            stdin
                .shutdown()
                .await
                .map_err(|e| MediaError::frame_io(format!("Encoder flush failed: {}", e)))?;
        }

        let status = self.child.wait().await?;
        let stderr = take_stderr(&mut self.stderr_task).await;

        if status.success() {
            debug!("Finalized intermediate {}", self.output.display());
            Ok(())
        } else {
            Err(MediaError::frame_io(format!(
                "Encoder exited with {:?}: {}",
                status.code(),
                stderr
            )))
        }
    }

    async fn abort(&mut self) {
        if self.done {
            return;
        }
        self.done = true;
        self.stdin.take();
        if let Err(e) = self.child.kill().await {
            warn!("Failed to kill encoder for {}: {}", self.output.display(), e);
        }
        let _ = take_stderr(&mut self.stderr_task).await;
    }
}

fn drain_stderr(child: &mut Child) -> Option<JoinHandle<Vec<u8>>> {
    child.stderr.take().map(|mut stderr| {
        tokio::spawn(async move {
            let mut buf = Vec::new();
            let _ = stderr.read_to_end(&mut buf).await;
            buf
        })
    })
}

async fn take_stderr(task: &mut Option<JoinHandle<Vec<u8>>>) -> String {
    match task.take() {
        Some(handle) => stderr_tail(&handle.await.unwrap_or_default()),
        None => String::new(),
    }
}

/// Read until `buf` is full or the stream ends; returns bytes read.
async fn read_full<R: AsyncRead + Unpin>(reader: &mut R, buf: &mut [u8]) -> std::io::Result<usize> {
    let mut filled = 0;
    while filled < buf.len() {
        let n = reader.read(&mut buf[filled..]).await?;
        if n == 0 {
            break;
        }
        filled += n;
    }
    Ok(filled)
}
