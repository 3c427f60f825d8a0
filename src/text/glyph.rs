use image::RgbaImage;
use unicode_segmentation::UnicodeSegmentation as _;

use crate::{
    foundation::{config::EmojiGrouping, error::CaptionResult},
    text::{
        emoji::{EmojiAssetDir, is_emoji_unit},
        font::{FontHandle, ShapedGlyph, TextLayoutEngine},
    },
};

/// A font-rendered glyph unit.
///
/// The box runs from the ascender line (or the ink top, when ink rises above it) down to the
/// lowest ink. `ascent` is the distance from the box top to the baseline.
#[derive(Clone, Debug, PartialEq)]
pub struct TextGlyph {
    pub text: String,
    pub advance_width: u32,
    pub ascent: u32,
    pub height: u32,
    pub font_size_px: f32,
    pub outline: Vec<ShapedGlyph>,
}

/// A bitmap emoji, already scaled to the supersampled font size.
#[derive(Clone, Debug, PartialEq)]
pub struct EmojiGlyph {
    pub bitmap: RgbaImage,
    pub advance_width: u32,
    pub height: u32,
}

#[derive(Clone, Debug, PartialEq)]
pub enum Glyph {
    Text(TextGlyph),
    Emoji(EmojiGlyph),
}

impl Glyph {
    pub fn advance_width(&self) -> u32 {
        match self {
            Self::Text(g) => g.advance_width,
            Self::Emoji(g) => g.advance_width,
        }
    }

    pub fn height(&self) -> u32 {
        match self {
            Self::Text(g) => g.height,
            Self::Emoji(g) => g.height,
        }
    }

    pub fn is_emoji(&self) -> bool {
        matches!(self, Self::Emoji(_))
    }

    /// Height below the baseline; emoji sit on the line top and have none.
    pub fn descent(&self) -> u32 {
        match self {
            Self::Text(g) => g.height.saturating_sub(g.ascent),
            Self::Emoji(_) => 0,
        }
    }
}

/// Split a display line into the units that become glyphs.
pub fn glyph_units(line: &str, grouping: EmojiGrouping) -> Vec<&str> {
    match grouping {
        EmojiGrouping::Codepoint => line
            .char_indices()
            .map(|(i, c)| &line[i..i + c.len_utf8()])
            .collect(),
        EmojiGrouping::Grapheme => line.graphemes(true).collect(),
    }
}

/// Maps glyph units to [`Glyph`]s for one render call.
#[derive(Debug)]
pub struct GlyphResolver<'a> {
    engine: TextLayoutEngine,
    emoji: &'a EmojiAssetDir,
    size_px: u32,
    scale_factor: u32,
    ink_pad: f32,
}

impl<'a> GlyphResolver<'a> {
    /// `size_px` is the supersampled font size; emoji bitmaps are scaled to exactly this height.
    pub fn new(font: &FontHandle, emoji: &'a EmojiAssetDir, size_px: u32) -> Self {
        Self {
            engine: TextLayoutEngine::new(font),
            emoji,
            size_px,
            scale_factor: 1,
            ink_pad: 0.0,
        }
    }

    /// Snap text glyph heights to whole multiples of `scale_factor`, so a caption measured at
    /// k-times supersampling is exactly k times as tall as at 1x.
    pub fn with_scale(mut self, scale_factor: u32) -> Self {
        self.scale_factor = scale_factor.max(1);
        self
    }

    /// Reserve room for an outline stroke of `width_px` around every text glyph.
    pub fn with_stroke(mut self, width_px: f32) -> Self {
        self.ink_pad = width_px.max(0.0);
        self
    }

    pub fn size_px(&self) -> u32 {
        self.size_px
    }

    pub fn resolve(&mut self, unit: &str) -> CaptionResult<Glyph> {
        if is_emoji_unit(unit) {
            if let Some(bitmap) = self.emoji.load_scaled(unit, self.size_px) {
                let (advance_width, height) = bitmap.dimensions();
                return Ok(Glyph::Emoji(EmojiGlyph {
                    bitmap,
                    advance_width,
                    height,
                }));
            }
            tracing::debug!(
                unit,
                dir = %self.emoji.root().display(),
                "no emoji asset, falling back to font glyph"
            );
        }
        self.resolve_text(unit)
    }

    fn resolve_text(&mut self, unit: &str) -> CaptionResult<Glyph> {
        let font_size_px = self.size_px as f32;
        let shaped = self.engine.shape(unit, font_size_px)?;
        let (above, below) = shaped
            .ink
            .map_or((0.0, 0.0), |ink| (ink.above + self.ink_pad, ink.below + self.ink_pad));
        let ascent = self.snap(shaped.ascent.max(above));
        let descent = self.snap(below);
        Ok(Glyph::Text(TextGlyph {
            text: unit.to_string(),
            advance_width: shaped.advance.max(0.0).round() as u32,
            ascent,
            height: ascent + descent,
            font_size_px,
            outline: shaped.glyphs,
        }))
    }

    /// Round up to a whole multiple of the scale factor.
    fn snap(&self, px: f32) -> u32 {
        let scale = self.scale_factor as f32;
        (px.max(0.0) / scale).ceil() as u32 * self.scale_factor
    }
}
