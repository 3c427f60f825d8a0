use std::{
    ffi::{OsStr, OsString},
    io::Read as _,
    path::{Path, PathBuf},
    process::{Command, Stdio},
    time::{Duration, Instant},
};

use crate::foundation::error::{CaptionError, CaptionResult};

/// Frame sampled for content detection.
pub const FRAME_SAMPLE_INDEX: u32 = 10;
/// The overlay is never placed closer than this to the top edge.
pub const MIN_OVERLAY_Y: u32 = 10;
/// Content top used when no frame analysis is available.
pub const FALLBACK_TOP_Y: u32 = 390;

pub const EXTRACT_TIMEOUT: Duration = Duration::from_secs(30);
pub const OVERLAY_TIMEOUT: Duration = Duration::from_secs(60);

const POLL_INTERVAL: Duration = Duration::from_millis(20);

pub fn is_ffmpeg_on_path() -> bool {
    Command::new("ffmpeg")
        .arg("-version")
        .stdout(Stdio::null())
        .stderr(Stdio::null())
        .status()
        .map(|s| s.success())
        .unwrap_or(false)
}

pub fn ensure_parent_dir(path: &Path) -> CaptionResult<()> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        use anyhow::Context as _;
        std::fs::create_dir_all(parent)
            .with_context(|| format!("failed to create output directory '{}'", parent.display()))?;
    }
    Ok(())
}

/// Vertical offset of the caption: just above the content, but at least `MIN_OVERLAY_Y`.
pub fn overlay_y(top_content_y: u32, caption_height: u32, margin: u32) -> u32 {
    let y = i64::from(top_content_y) - i64::from(caption_height) - i64::from(margin);
    y.max(i64::from(MIN_OVERLAY_Y)) as u32
}

/// One `ffmpeg` invocation with its deadline.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct FfmpegJob {
    label: &'static str,
    args: Vec<OsString>,
    timeout: Duration,
    output: PathBuf,
}

impl FfmpegJob {
    pub fn label(&self) -> &'static str {
        self.label
    }

    pub fn args(&self) -> &[OsString] {
        &self.args
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    pub fn output(&self) -> &Path {
        &self.output
    }

    /// Run to completion. Spawn failures, a non-zero exit, a missing output file, and running
    /// past the deadline are all transcode errors; a timed-out child is killed.
    pub fn run(&self) -> CaptionResult<()> {
        ensure_parent_dir(&self.output)?;
        if !is_ffmpeg_on_path() {
            return Err(CaptionError::transcode(
                "ffmpeg is required for video captioning, but was not found on PATH",
            ));
        }

        tracing::debug!(job = self.label, args = ?self.args, "running ffmpeg");
        let mut child = Command::new("ffmpeg")
            .args(&self.args)
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::piped())
            .spawn()
            .map_err(|e| {
                CaptionError::transcode(format!(
                    "failed to spawn ffmpeg (is it installed and on PATH?): {e}"
                ))
            })?;

        // Drained on a side thread so a chatty ffmpeg cannot block on a full pipe.
        let stderr_reader = child.stderr.take().map(|mut stderr| {
            std::thread::spawn(move || {
                let mut buf = String::new();
                stderr.read_to_string(&mut buf).ok();
                buf
            })
        });
        let collect_stderr = |reader: Option<std::thread::JoinHandle<String>>| {
            reader
                .and_then(|r| r.join().ok())
                .unwrap_or_default()
                .trim()
                .to_string()
        };

        let started = Instant::now();
        let status = loop {
            match child.try_wait() {
                Ok(Some(status)) => break status,
                Ok(None) if started.elapsed() >= self.timeout => {
                    child.kill().ok();
                    child.wait().ok();
                    return Err(CaptionError::transcode(format!(
                        "ffmpeg {} timed out after {}s",
                        self.label,
                        self.timeout.as_secs()
                    )));
                }
                Ok(None) => std::thread::sleep(POLL_INTERVAL),
                Err(e) => {
                    child.kill().ok();
                    return Err(CaptionError::transcode(format!(
                        "failed to wait for ffmpeg {}: {e}",
                        self.label
                    )));
                }
            }
        };

        let stderr = collect_stderr(stderr_reader);
        if !status.success() {
            return Err(CaptionError::transcode(format!(
                "ffmpeg {} exited with status {status}: {stderr}",
                self.label
            )));
        }
        if !self.output.exists() {
            return Err(CaptionError::transcode(format!(
                "ffmpeg {} finished but '{}' was not produced",
                self.label,
                self.output.display()
            )));
        }
        Ok(())
    }
}

fn os_args<'a>(items: impl IntoIterator<Item = &'a OsStr>) -> Vec<OsString> {
    items.into_iter().map(OsStr::to_os_string).collect()
}

/// Grab frame `FRAME_SAMPLE_INDEX` of `video` as a still image.
pub fn extract_frame_job(video: &Path, frame_out: &Path) -> FfmpegJob {
    let select = format!("select=eq(n\\,{FRAME_SAMPLE_INDEX})");
    FfmpegJob {
        label: "frame extraction",
        args: os_args([
            OsStr::new("-loglevel"),
            OsStr::new("error"),
            OsStr::new("-i"),
            video.as_os_str(),
            OsStr::new("-vf"),
            OsStr::new(&select),
            OsStr::new("-vframes"),
            OsStr::new("1"),
            OsStr::new("-q:v"),
            OsStr::new("2"),
            frame_out.as_os_str(),
            OsStr::new("-y"),
        ]),
        timeout: EXTRACT_TIMEOUT,
        output: frame_out.to_path_buf(),
    }
}

/// Overlay `caption_png` on `video`, horizontally centered at row `y`. Audio is copied through.
pub fn overlay_job(video: &Path, caption_png: &Path, y: u32, out: &Path) -> FfmpegJob {
    let filter = format!("[0:v][1:v]overlay=x=(main_w-overlay_w)/2:y={y}");
    FfmpegJob {
        label: "overlay",
        args: os_args([
            OsStr::new("-loglevel"),
            OsStr::new("error"),
            OsStr::new("-i"),
            video.as_os_str(),
            OsStr::new("-i"),
            caption_png.as_os_str(),
            OsStr::new("-filter_complex"),
            OsStr::new(&filter),
            OsStr::new("-c:a"),
            OsStr::new("copy"),
            OsStr::new("-preset"),
            OsStr::new("ultrafast"),
            OsStr::new("-y"),
            out.as_os_str(),
        ]),
        timeout: OVERLAY_TIMEOUT,
        output: out.to_path_buf(),
    }
}
