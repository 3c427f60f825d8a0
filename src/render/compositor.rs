use std::path::{Path, PathBuf};

use crate::{
    foundation::{config::RenderConfig, error::CaptionResult},
    render::{
        canvas::render_canvas,
        downsample::{CaptionImage, downsample},
    },
    text::{
        emoji::EmojiAssetDir,
        font::{FontCache, FontHandle},
        glyph::GlyphResolver,
        metrics::{Line, measure_line},
        wrap::wrap,
    },
};

/// Render `caption` to a transparent image `config.video_width` pixels wide.
///
/// The font is resolved through `fonts`; failing to load it is the only fatal error besides an
/// invalid config. Missing or unreadable emoji assets fall back to the font.
#[tracing::instrument(skip(config, fonts), fields(width = config.video_width, scale = config.scale_factor))]
pub fn render_caption(
    caption: &str,
    config: &RenderConfig,
    fonts: &FontCache,
) -> CaptionResult<CaptionImage> {
    config.validate()?;
    let font = fonts.get_or_load(&config.font)?;
    render_caption_with_font(caption, config, &font)
}

/// Same as [`render_caption`] with an already-loaded font.
pub fn render_caption_with_font(
    caption: &str,
    config: &RenderConfig,
    font: &FontHandle,
) -> CaptionResult<CaptionImage> {
    config.validate()?;
    let lines = layout_lines(caption, config, font)?;
    warn_on_overflow(&lines, config);

    let canvas = render_canvas(&lines, font, config)?;
    let image = downsample(&canvas, config.video_width, config.scale_factor)?;
    tracing::debug!(
        lines = lines.len(),
        canvas_h = canvas.height,
        height = image.height,
        "caption rendered"
    );
    Ok(image)
}

/// Render and write a PNG. Returns the written path and the final image height.
pub fn render_caption_to_path(
    caption: &str,
    out: &Path,
    config: &RenderConfig,
    fonts: &FontCache,
) -> CaptionResult<(PathBuf, u32)> {
    let image = render_caption(caption, config, fonts)?;
    image.save_png(out)?;
    Ok((out.to_path_buf(), image.height))
}

/// Wrap and measure every display line of `caption` at supersampled scale.
pub fn layout_lines(
    caption: &str,
    config: &RenderConfig,
    font: &FontHandle,
) -> CaptionResult<Vec<Line>> {
    let emoji = EmojiAssetDir::new(&config.emoji_dir);
    let stroke_px = if config.stroke_emphasis {
        config.stroke_width_px()
    } else {
        0.0
    };
    let mut resolver = GlyphResolver::new(font, &emoji, config.font_size_px())
        .with_scale(config.scale_factor)
        .with_stroke(stroke_px);
    wrap(caption)
        .iter()
        .map(|text| {
            measure_line(
                text,
                &mut resolver,
                config.emoji_grouping,
                config.tracking_px(),
            )
        })
        .collect()
}

fn warn_on_overflow(lines: &[Line], config: &RenderConfig) {
    let limit = f64::from(config.max_width_ratio) * f64::from(config.canvas_width_px());
    for (index, line) in lines.iter().enumerate() {
        if f64::from(line.width()) > limit {
            tracing::warn!(
                index,
                width = line.width(),
                limit,
                "caption line is wider than the allowed share of the frame"
            );
        }
    }
}
