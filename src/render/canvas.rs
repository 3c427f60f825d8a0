use std::sync::Arc;

use crate::{
    foundation::{
        config::{MAX_CANVAS_DIM, RenderConfig},
        error::{CaptionError, CaptionResult},
    },
    render::pixels::{premul_bytes_to_pixmap, premultiply_rgba8_in_place},
    text::{
        font::FontHandle,
        glyph::{EmojiGlyph, Glyph, TextGlyph},
        metrics::Line,
    },
};

const TEXT_RGBA: [u8; 4] = [0, 0, 0, 255];

/// The supersampled raster, in premultiplied RGBA8.
#[derive(Clone, Debug, PartialEq)]
pub struct SupersampledCanvas {
    pub width: u32,
    pub height: u32,
    pub rgba8_premul: Vec<u8>,
}

impl SupersampledCanvas {
    /// Fully transparent canvas.
    pub fn transparent(width: u32, height: u32) -> Self {
        Self {
            width,
            height,
            rgba8_premul: vec![0u8; width as usize * height as usize * 4],
        }
    }

    pub fn pixel(&self, x: u32, y: u32) -> [u8; 4] {
        let i = (y as usize * self.width as usize + x as usize) * 4;
        [
            self.rgba8_premul[i],
            self.rgba8_premul[i + 1],
            self.rgba8_premul[i + 2],
            self.rgba8_premul[i + 3],
        ]
    }

    pub fn is_fully_transparent(&self) -> bool {
        self.rgba8_premul.chunks_exact(4).all(|px| px[3] == 0)
    }
}

/// Canvas size and the top-left origin of every line, computed before any pixel is allocated.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct CanvasPlan {
    pub width: u32,
    pub height: u32,
    pub origins: Vec<(i32, i32)>,
}

/// Total supersampled height for lines of the given heights: the lines, one margin between each
/// pair, and a margin above and below. No lines leaves just the two outer margins.
pub fn canvas_height(line_heights: &[u32], margin_px: u32) -> u64 {
    let lines: u64 = line_heights.iter().map(|&h| u64::from(h)).sum();
    let gaps = line_heights.len().saturating_sub(1) as u64;
    lines + u64::from(margin_px) * gaps + 2 * u64::from(margin_px)
}

/// Left edge that centers a line; floors, so an odd remainder leaves the extra pixel on the
/// right.
pub fn centered_x(canvas_width: u32, line_width: i32) -> i32 {
    (canvas_width as i32 - line_width).div_euclid(2)
}

pub fn plan_canvas(lines: &[Line], config: &RenderConfig) -> CaptionResult<CanvasPlan> {
    let width = config.canvas_width_px();
    let margin_px = config.margin_px();
    let heights: Vec<u32> = lines.iter().map(Line::height).collect();
    let height = canvas_height(&heights, margin_px);
    if height > u64::from(MAX_CANVAS_DIM) {
        return Err(CaptionError::validation(format!(
            "caption canvas height {height} exceeds {MAX_CANVAS_DIM}; shorten the caption or lower scale_factor"
        )));
    }

    let mut origins = Vec::with_capacity(lines.len());
    let mut y = margin_px as i32;
    for line in lines {
        origins.push((centered_x(width, line.width()), y));
        y += line.height() as i32 + margin_px as i32;
    }

    Ok(CanvasPlan {
        width,
        height: height as u32,
        origins,
    })
}

/// Paint all lines onto a fresh transparent canvas at supersampled resolution.
pub fn render_canvas(
    lines: &[Line],
    font: &FontHandle,
    config: &RenderConfig,
) -> CaptionResult<SupersampledCanvas> {
    let plan = plan_canvas(lines, config)?;
    if plan.width == 0 || plan.height == 0 || lines.iter().all(Line::is_empty) {
        return Ok(SupersampledCanvas::transparent(plan.width, plan.height));
    }

    let w16 = plan.width as u16;
    let h16 = plan.height as u16;
    let tracking_px = config.tracking_px();
    let stroke_px = config.stroke_emphasis.then(|| config.stroke_width_px());

    let mut ctx = vello_cpu::RenderContext::new(w16, h16);
    for (line, &(x0, y)) in lines.iter().zip(&plan.origins) {
        let baseline_y = y + line.baseline() as i32;
        let mut x = x0;
        for glyph in line.glyphs() {
            match glyph {
                Glyph::Text(t) => paint_text(&mut ctx, font, t, x, baseline_y, stroke_px),
                Glyph::Emoji(e) => paint_emoji(&mut ctx, e, x, y)?,
            }
            x += glyph.advance_width() as i32 + tracking_px;
        }
    }
    ctx.flush();

    let mut pixmap = vello_cpu::Pixmap::new(w16, h16);
    ctx.render_to_pixmap(&mut pixmap);
    Ok(SupersampledCanvas {
        width: plan.width,
        height: plan.height,
        rgba8_premul: pixmap.data_as_u8_slice().to_vec(),
    })
}

fn translate(x: i32, y: i32) -> vello_cpu::kurbo::Affine {
    vello_cpu::kurbo::Affine::translate((f64::from(x), f64::from(y)))
}

/// `baseline_y` is the canvas row of the line's shared baseline.
fn paint_text(
    ctx: &mut vello_cpu::RenderContext,
    font: &FontHandle,
    glyph: &TextGlyph,
    x: i32,
    baseline_y: i32,
    stroke_px: Option<f32>,
) {
    if glyph.outline.is_empty() {
        return;
    }
    let [r, g, b, a] = TEXT_RGBA;
    ctx.set_paint_transform(vello_cpu::kurbo::Affine::IDENTITY);
    ctx.set_transform(translate(x, baseline_y));
    ctx.set_paint(vello_cpu::peniko::Color::from_rgba8(r, g, b, a));

    let outline = || {
        glyph.outline.iter().map(|g| vello_cpu::Glyph {
            id: g.id,
            x: g.x,
            y: g.y,
        })
    };
    // Unhinted, so painted outlines match the measured ink bounds.
    ctx.glyph_run(font.raster())
        .font_size(glyph.font_size_px)
        .hint(false)
        .fill_glyphs(outline());

    if let Some(width) = stroke_px {
        ctx.set_stroke(vello_cpu::kurbo::Stroke::new(f64::from(width)));
        ctx.glyph_run(font.raster())
            .font_size(glyph.font_size_px)
            .hint(false)
            .stroke_glyphs(outline());
    }
}

fn paint_emoji(
    ctx: &mut vello_cpu::RenderContext,
    glyph: &EmojiGlyph,
    x: i32,
    y: i32,
) -> CaptionResult<()> {
    let (w, h) = glyph.bitmap.dimensions();
    if w == 0 || h == 0 {
        return Ok(());
    }
    let mut premul = glyph.bitmap.as_raw().clone();
    premultiply_rgba8_in_place(&mut premul);
    let pixmap = premul_bytes_to_pixmap(&premul, w, h)?;
    let paint = vello_cpu::Image {
        image: vello_cpu::ImageSource::Pixmap(Arc::new(pixmap)),
        sampler: vello_cpu::peniko::ImageSampler::default(),
    };

    ctx.set_paint_transform(vello_cpu::kurbo::Affine::IDENTITY);
    ctx.set_transform(translate(x, y));
    ctx.set_paint(paint);
    ctx.fill_rect(&vello_cpu::kurbo::Rect::new(0.0, 0.0, f64::from(w), f64::from(h)));
    Ok(())
}
