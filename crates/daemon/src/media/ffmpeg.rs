use async_trait::async_trait;
use futures::StreamExt;
use serde::Deserialize;
use std::collections::VecDeque;
use std::path::{Path, PathBuf};
use std::process::Stdio;
use tokio::io::AsyncRead;
use tokio::process::Command;
use tokio_util::codec::{FramedRead, LinesCodec};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use super::{MediaInfo, MediaTool};
use crate::error::{RenderError, RenderResult};

/// Diagnostic lines kept from each stream for failure reports.
const TAIL_LINES: usize = 40;

#[derive(Debug, Deserialize)]
struct ProbeOutput {
    format: Option<FormatInfo>,
    #[serde(default)]
    streams: Vec<StreamInfo>,
}

#[derive(Debug, Deserialize)]
struct FormatInfo {
    duration: Option<String>,
}

#[derive(Debug, Deserialize)]
struct StreamInfo {
    codec_type: Option<String>,
    width: Option<u32>,
    height: Option<u32>,
}

/// ffmpeg/ffprobe as child processes.
#[derive(Debug, Clone)]
pub struct FfmpegTool {
    ffmpeg: PathBuf,
    ffprobe: PathBuf,
}

impl FfmpegTool {
    pub fn new(ffmpeg: impl Into<PathBuf>, ffprobe: impl Into<PathBuf>) -> Self {
        FfmpegTool {
            ffmpeg: ffmpeg.into(),
            ffprobe: ffprobe.into(),
        }
    }

    /// Resolve both binaries on `PATH`.
    pub fn check(&self) -> RenderResult<()> {
        for tool in [&self.ffmpeg, &self.ffprobe] {
            which::which(tool).map_err(|err| RenderError::ToolNotFound {
                tool: tool.display().to_string(),
                reason: err.to_string(),
            })?;
        }
        Ok(())
    }
}

/// Fold one `-progress` line into `frame`. Returns the frame count at each block boundary.
pub fn parse_progress_line(line: &str, frame: &mut u64) -> Option<u64> {
    let (key, value) = line.trim().split_once('=')?;
    match key {
        "frame" => {
            if let Ok(parsed) = value.trim().parse() {
                *frame = parsed;
            }
            None
        }
        "progress" => Some(*frame),
        _ => None,
    }
}

async fn collect_tail<R>(reader: R) -> String
where
    R: AsyncRead + Unpin,
{
    let mut lines = FramedRead::new(reader, LinesCodec::new());
    let mut tail = VecDeque::with_capacity(TAIL_LINES);
    while let Some(Ok(line)) = lines.next().await {
        if tail.len() == TAIL_LINES {
            tail.pop_front();
        }
        tail.push_back(line);
    }
    Vec::from(tail).join("\n")
}

#[async_trait]
impl MediaTool for FfmpegTool {
    async fn run(
        &self,
        args: &[String],
        on_frame: &(dyn Fn(u64) + Send + Sync),
        cancel: &CancellationToken,
    ) -> RenderResult<()> {
        debug!(tool = %self.ffmpeg.display(), args = ?args, "spawning ffmpeg");
        let mut child = Command::new(&self.ffmpeg)
            .args(args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()?;

        let (Some(stdout), Some(stderr)) = (child.stdout.take(), child.stderr.take()) else {
            return Err(RenderError::Internal("ffmpeg pipes were not captured".into()));
        };
        let stderr_tail = tokio::spawn(collect_tail(stderr));

        let mut progress = FramedRead::new(stdout, LinesCodec::new());
        let mut stdout_tail = VecDeque::with_capacity(TAIL_LINES);
        let mut frame = 0u64;
        loop {
            tokio::select! {
                _ = cancel.cancelled() => {
                    info!("cancelling ffmpeg");
                    let _ = child.kill().await;
                    return Err(RenderError::Cancelled);
                }
                line = progress.next() => match line {
                    Some(Ok(line)) => {
                        if let Some(frames) = parse_progress_line(&line, &mut frame) {
                            on_frame(frames);
                        }
                        if stdout_tail.len() == TAIL_LINES {
                            stdout_tail.pop_front();
                        }
                        stdout_tail.push_back(line);
                    }
                    Some(Err(err)) => {
                        warn!(error = %err, "unreadable ffmpeg progress output");
                        break;
                    }
                    None => break,
                },
            }
        }

        let status = tokio::select! {
            _ = cancel.cancelled() => {
                let _ = child.kill().await;
                return Err(RenderError::Cancelled);
            }
            status = child.wait() => status?,
        };
        let stderr = stderr_tail.await.unwrap_or_default();

        if status.success() {
            Ok(())
        } else {
            Err(RenderError::tool_failed(
                "ffmpeg exited with non-zero status",
                status.code(),
                Vec::from(stdout_tail).join("\n"),
                stderr,
            ))
        }
    }

    async fn probe(&self, path: &Path) -> RenderResult<MediaInfo> {
        let output = Command::new(&self.ffprobe)
            .arg("-v")
            .arg("error")
            .arg("-show_entries")
            .arg("format=duration:stream=codec_type,width,height")
            .arg("-of")
            .arg("json")
            .arg(path)
            .output()
            .await?;

        if !output.status.success() {
            return Err(RenderError::tool_failed(
                format!("ffprobe failed on {}", path.display()),
                output.status.code(),
                String::from_utf8_lossy(&output.stdout).into_owned(),
                String::from_utf8_lossy(&output.stderr).into_owned(),
            ));
        }

        let probe: ProbeOutput = serde_json::from_slice(&output.stdout).map_err(|err| {
            RenderError::tool_failed(
                format!("unreadable ffprobe output: {}", err),
                output.status.code(),
                String::from_utf8_lossy(&output.stdout).into_owned(),
                String::new(),
            )
        })?;
        Ok(media_info(probe))
    }
}

fn media_info(probe: ProbeOutput) -> MediaInfo {
    let duration = probe
        .format
        .and_then(|f| f.duration)
        .and_then(|d| d.parse::<f64>().ok())
        .unwrap_or(0.0);
    let video = probe
        .streams
        .iter()
        .find(|s| s.codec_type.as_deref() == Some("video"));
    MediaInfo {
        width: video.and_then(|v| v.width).unwrap_or(0),
        height: video.and_then(|v| v.height).unwrap_or(0),
        duration,
        has_audio: probe
            .streams
            .iter()
            .any(|s| s.codec_type.as_deref() == Some("audio")),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn progress_blocks_report_the_last_frame() {
        let mut frame = 0;
        assert_eq!(parse_progress_line("frame=12", &mut frame), None);
        assert_eq!(parse_progress_line("fps=25.0", &mut frame), None);
        assert_eq!(parse_progress_line("progress=continue", &mut frame), Some(12));
        assert_eq!(parse_progress_line("frame=garbage", &mut frame), None);
        assert_eq!(parse_progress_line("progress=end", &mut frame), Some(12));
        assert_eq!(parse_progress_line("not a progress line", &mut frame), None);
    }

    #[test]
    fn probe_json_maps_to_media_info() {
        let probe: ProbeOutput = serde_json::from_str(
            r#"{
                "format": {"duration": "4.500000"},
                "streams": [
                    {"codec_type": "audio"},
                    {"codec_type": "video", "width": 1920, "height": 1080}
                ]
            }"#,
        )
        .unwrap();
        assert_eq!(
            media_info(probe),
            MediaInfo {
                width: 1920,
                height: 1080,
                duration: 4.5,
                has_audio: true,
            }
        );
    }

    #[tokio::test]
    async fn tail_keeps_the_last_lines() {
        let text: String = (0..50).map(|i| format!("line {}\n", i)).collect();
        let tail = collect_tail(text.as_bytes()).await;
        assert!(tail.starts_with("line 10\n"));
        assert!(tail.ends_with("line 49"));
    }

    #[tokio::test]
    async fn missing_binary_fails_to_spawn() {
        let tool = FfmpegTool::new("/nonexistent/ffmpeg", "/nonexistent/ffprobe");
        assert!(tool.check().is_err());
        let cancel = CancellationToken::new();
        let err = tool.run(&["-version".to_string()], &|_| {}, &cancel).await.unwrap_err();
        assert!(matches!(err, RenderError::Io(_)));
    }
}
