use crate::{
    foundation::{config::EmojiGrouping, error::CaptionResult},
    text::glyph::{Glyph, GlyphResolver, glyph_units},
};

/// A measured display line. Widths and heights are supersampled pixels.
///
/// Text glyphs share one baseline, `baseline` pixels below the line top; emoji hang from the
/// line top.
#[derive(Clone, Debug, PartialEq)]
pub struct Line {
    glyphs: Vec<Glyph>,
    width: i32,
    height: u32,
    baseline: u32,
}

impl Line {
    pub fn from_glyphs(glyphs: Vec<Glyph>, tracking_px: i32) -> Self {
        let (width, height) = line_metrics(&glyphs, tracking_px);
        Self {
            baseline: baseline_offset(&glyphs),
            glyphs,
            width,
            height,
        }
    }

    pub fn glyphs(&self) -> &[Glyph] {
        &self.glyphs
    }

    /// Can be negative when tracking is tight enough to overlap glyphs.
    pub fn width(&self) -> i32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    pub fn baseline(&self) -> u32 {
        self.baseline
    }

    pub fn is_empty(&self) -> bool {
        self.glyphs.is_empty()
    }
}

/// Distance from the line top to the shared text baseline: the largest text ascent.
pub fn baseline_offset(glyphs: &[Glyph]) -> u32 {
    glyphs
        .iter()
        .filter_map(|g| match g {
            Glyph::Text(t) => Some(t.ascent),
            Glyph::Emoji(_) => None,
        })
        .max()
        .unwrap_or(0)
}

/// `(width, height)` of a glyph sequence: advances plus tracking between neighbours, and the
/// box enclosing every glyph once text is aligned on [`baseline_offset`]. An empty sequence
/// measures `(0, 0)`.
pub fn line_metrics(glyphs: &[Glyph], tracking_px: i32) -> (i32, u32) {
    if glyphs.is_empty() {
        return (0, 0);
    }
    let baseline = baseline_offset(glyphs);
    let mut width = 0i32;
    let mut height = 0u32;
    for glyph in glyphs {
        width = width
            .saturating_add(glyph.advance_width().min(i32::MAX as u32) as i32)
            .saturating_add(tracking_px);
        let bottom = match glyph {
            Glyph::Text(_) => baseline.saturating_add(glyph.descent()),
            Glyph::Emoji(e) => e.height,
        };
        height = height.max(bottom);
    }
    (width.saturating_sub(tracking_px), height)
}

pub fn measure_line(
    text: &str,
    resolver: &mut GlyphResolver<'_>,
    grouping: EmojiGrouping,
    tracking_px: i32,
) -> CaptionResult<Line> {
    let glyphs = glyph_units(text, grouping)
        .into_iter()
        .map(|unit| resolver.resolve(unit))
        .collect::<CaptionResult<Vec<_>>>()?;
    Ok(Line::from_glyphs(glyphs, tracking_px))
}
