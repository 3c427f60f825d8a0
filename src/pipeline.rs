use std::path::{Path, PathBuf};

use crate::{
    encode::ffmpeg::{FALLBACK_TOP_Y, extract_frame_job, overlay_job, overlay_y},
    foundation::{config::RenderConfig, error::CaptionResult},
    render::compositor::render_caption_to_path,
    text::font::FontCache,
};

/// Finds where the real picture starts in a sampled frame, e.g. below a white letterbox.
pub trait FrameAnalyzer {
    /// Topmost row, in frame pixels, that holds non-background content.
    fn top_content_y(&self, frame: &Path) -> CaptionResult<u32>;
}

/// Reports the same row for every frame.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct FixedContentTop(pub u32);

impl Default for FixedContentTop {
    fn default() -> Self {
        Self(FALLBACK_TOP_Y)
    }
}

impl FrameAnalyzer for FixedContentTop {
    fn top_content_y(&self, _frame: &Path) -> CaptionResult<u32> {
        Ok(self.0)
    }
}

#[derive(Clone, Debug)]
pub struct CaptionJob {
    pub video: PathBuf,
    pub caption: String,
    pub output: PathBuf,
    /// Holds the sample frame and the caption PNG while the job runs.
    pub work_dir: PathBuf,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct CaptionOutcome {
    pub output: PathBuf,
    pub top_content_y: u32,
    pub caption_height: u32,
    pub overlay_y: u32,
}

/// Caption a video: sample a frame, locate the content, render the caption, overlay it.
///
/// Intermediate files are removed afterwards whether or not the job succeeded; failure to remove
/// them is only logged.
pub fn caption_video(
    job: &CaptionJob,
    config: &RenderConfig,
    fonts: &FontCache,
    analyzer: &dyn FrameAnalyzer,
) -> CaptionResult<CaptionOutcome> {
    let stem = job
        .output
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_else(|| "caption".to_string());
    let tag = format!("{stem}_{}", std::process::id());
    let frame_path = job.work_dir.join(format!("{tag}_frame.jpg"));
    let caption_path = job.work_dir.join(format!("{tag}_caption.png"));

    let result = run_stages(job, config, fonts, analyzer, &frame_path, &caption_path);
    for path in [&frame_path, &caption_path] {
        cleanup(path);
    }
    result
}

fn run_stages(
    job: &CaptionJob,
    config: &RenderConfig,
    fonts: &FontCache,
    analyzer: &dyn FrameAnalyzer,
    frame_path: &Path,
    caption_path: &Path,
) -> CaptionResult<CaptionOutcome> {
    extract_frame_job(&job.video, frame_path).run()?;
    let top_content_y = analyzer.top_content_y(frame_path)?;

    let (caption_path, caption_height) =
        render_caption_to_path(&job.caption, caption_path, config, fonts)?;
    let y = overlay_y(top_content_y, caption_height, config.margin);
    tracing::info!(top_content_y, caption_height, y, "placing caption");

    overlay_job(&job.video, &caption_path, y, &job.output).run()?;
    Ok(CaptionOutcome {
        output: job.output.clone(),
        top_content_y,
        caption_height,
        overlay_y: y,
    })
}

fn cleanup(path: &Path) {
    if !path.exists() {
        return;
    }
    if let Err(e) = std::fs::remove_file(path) {
        tracing::warn!(path = %path.display(), error = %e, "could not remove intermediate file");
    }
}
