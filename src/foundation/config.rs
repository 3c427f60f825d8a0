use std::{
    fs::File,
    io::BufReader,
    path::{Path, PathBuf},
};

use anyhow::Context as _;
use serde::{Deserialize, Serialize};

use crate::foundation::error::{CaptionError, CaptionResult};

/// Words are wrapped to at most this many characters per line.
pub const WRAP_WIDTH_CHARS: usize = 40;

/// Largest surface edge the rasterizer can allocate.
pub const MAX_CANVAS_DIM: u32 = u16::MAX as u32;

#[derive(Clone, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
/// Where the caption font comes from.
pub enum FontAsset {
    /// A TrueType/OpenType file on disk.
    File(PathBuf),
    /// An installed system family, looked up by name.
    System(String),
    /// The first installed sans-serif face, or any non-emoji face if there is none.
    #[default]
    SystemDefault,
}

impl std::fmt::Display for FontAsset {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::File(p) => write!(f, "file '{}'", p.display()),
            Self::System(family) => write!(f, "system family '{family}'"),
            Self::SystemDefault => f.write_str("system default face"),
        }
    }
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
/// How caption text is split into glyph units before emoji classification.
pub enum EmojiGrouping {
    /// One unit per Unicode scalar. Multi-codepoint emoji (flags, skin tones, ZWJ sequences) are
    /// resolved piecewise.
    #[default]
    Codepoint,
    /// One unit per extended grapheme cluster, so composite emoji resolve as a single asset.
    Grapheme,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
/// Parameters for one caption render. Pixel values are at nominal (1x) scale.
pub struct RenderConfig {
    pub font: FontAsset,
    /// Font size in pixels.
    pub font_size: u32,
    pub emoji_dir: PathBuf,
    /// Output image width; normally the width of the target video.
    pub video_width: u32,
    pub scale_factor: u32,
    pub margin: u32,
    /// Extra spacing between adjacent glyphs. Negative values tighten.
    pub tracking: i32,
    pub max_width_ratio: f32,
    pub stroke_emphasis: bool,
    pub emoji_grouping: EmojiGrouping,
}

impl Default for RenderConfig {
    fn default() -> Self {
        Self {
            font: FontAsset::default(),
            font_size: 36,
            emoji_dir: PathBuf::from("emoji"),
            video_width: 1080,
            scale_factor: 4,
            margin: 10,
            tracking: 2,
            max_width_ratio: 0.85,
            stroke_emphasis: false,
            emoji_grouping: EmojiGrouping::default(),
        }
    }
}

impl RenderConfig {
    pub fn from_json_path(path: &Path) -> CaptionResult<Self> {
        let f = File::open(path).with_context(|| format!("open config '{}'", path.display()))?;
        let cfg: Self = serde_json::from_reader(BufReader::new(f))
            .with_context(|| format!("parse config JSON '{}'", path.display()))?;
        cfg.validate()?;
        Ok(cfg)
    }

    pub fn validate(&self) -> CaptionResult<()> {
        if self.font_size == 0 {
            return Err(CaptionError::validation("font_size must be > 0"));
        }
        if self.video_width == 0 {
            return Err(CaptionError::validation("video_width must be > 0"));
        }
        if self.scale_factor == 0 {
            return Err(CaptionError::validation("scale_factor must be >= 1"));
        }
        if !self.max_width_ratio.is_finite()
            || self.max_width_ratio <= 0.0
            || self.max_width_ratio > 1.0
        {
            return Err(CaptionError::validation(
                "max_width_ratio must be in (0, 1]",
            ));
        }
        let canvas_w = u64::from(self.video_width) * u64::from(self.scale_factor);
        if canvas_w > u64::from(MAX_CANVAS_DIM) {
            return Err(CaptionError::validation(format!(
                "supersampled width {canvas_w} exceeds {MAX_CANVAS_DIM}; lower scale_factor"
            )));
        }
        // Every supersampled length must fit on a canvas, which also keeps the `*_px` helpers
        // from overflowing.
        for (name, value) in [
            ("font_size", self.font_size),
            ("margin", self.margin),
            ("tracking", self.tracking.unsigned_abs()),
        ] {
            let scaled = u64::from(value) * u64::from(self.scale_factor);
            if scaled > u64::from(MAX_CANVAS_DIM) {
                return Err(CaptionError::validation(format!(
                    "supersampled {name} {scaled} exceeds {MAX_CANVAS_DIM}"
                )));
            }
        }
        Ok(())
    }

    pub fn font_size_px(&self) -> u32 {
        self.font_size.saturating_mul(self.scale_factor)
    }

    pub fn margin_px(&self) -> u32 {
        self.margin.saturating_mul(self.scale_factor)
    }

    pub fn tracking_px(&self) -> i32 {
        let scale = i32::try_from(self.scale_factor).unwrap_or(i32::MAX);
        self.tracking.saturating_mul(scale)
    }

    pub fn canvas_width_px(&self) -> u32 {
        self.video_width.saturating_mul(self.scale_factor)
    }

    pub fn stroke_width_px(&self) -> f32 {
        (self.scale_factor / 2).max(1) as f32
    }
}
