#![forbid(unsafe_code)]

pub mod encode;
pub mod foundation;
pub mod pipeline;
pub mod render;
pub mod text;

pub use foundation::{
    config::{EmojiGrouping, FontAsset, RenderConfig},
    error::{CaptionError, CaptionResult},
};
pub use pipeline::{CaptionJob, CaptionOutcome, FixedContentTop, FrameAnalyzer, caption_video};
pub use render::{
    compositor::{render_caption, render_caption_to_path, render_caption_with_font},
    downsample::CaptionImage,
};
pub use text::font::{FontCache, FontHandle};
