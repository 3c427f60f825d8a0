//! Emoji classification and the on-disk emoji asset store.
//!
//! Assets are named after their codepoint sequence: lowercase hex scalars joined with `-`
//! (`1f600.png`, `1f1fa-1f1f8.png`). PNG is preferred; an SVG with the same stem is rasterized
//! when no PNG exists.

use std::path::{Path, PathBuf};

use anyhow::Context as _;
use image::{RgbaImage, imageops::FilterType};

use crate::foundation::error::{CaptionError, CaptionResult};

const VARIATION_SELECTOR_16: char = '\u{FE0F}';

/// Unicode `Emoji=Yes` property (emoji-data.txt, Unicode 15.1).
///
/// This is the property, not emoji presentation: ASCII digits, `#`, `*`, `©` and `®` are in it.
pub fn is_emoji(c: char) -> bool {
    let cp = c as u32;
    matches!(cp,
        0x23 | 0x2A | 0x30..=0x39 | 0xA9 | 0xAE |
        0x203C | 0x2049 | 0x2122 | 0x2139 |
        0x2194..=0x2199 | 0x21A9..=0x21AA |
        0x231A..=0x231B | 0x2328 | 0x23CF |
        0x23E9..=0x23F3 | 0x23F8..=0x23FA |
        0x24C2 | 0x25AA..=0x25AB | 0x25B6 | 0x25C0 | 0x25FB..=0x25FE |
        0x2600..=0x2604 | 0x260E | 0x2611 | 0x2614..=0x2615 | 0x2618 | 0x261D | 0x2620 |
        0x2622..=0x2623 | 0x2626 | 0x262A | 0x262E..=0x262F | 0x2638..=0x263A |
        0x2640 | 0x2642 | 0x2648..=0x2653 | 0x265F..=0x2660 | 0x2663 |
        0x2665..=0x2666 | 0x2668 | 0x267B | 0x267E..=0x267F |
        0x2692..=0x2697 | 0x2699 | 0x269B..=0x269C | 0x26A0..=0x26A1 | 0x26A7 |
        0x26AA..=0x26AB | 0x26B0..=0x26B1 | 0x26BD..=0x26BE | 0x26C4..=0x26C5 |
        0x26C8 | 0x26CE..=0x26CF | 0x26D1 | 0x26D3..=0x26D4 | 0x26E9..=0x26EA |
        0x26F0..=0x26F5 | 0x26F7..=0x26FA | 0x26FD |
        0x2702 | 0x2705 | 0x2708..=0x270D | 0x270F | 0x2712 | 0x2714 | 0x2716 |
        0x271D | 0x2721 | 0x2728 | 0x2733..=0x2734 | 0x2744 | 0x2747 | 0x274C |
        0x274E | 0x2753..=0x2755 | 0x2757 | 0x2763..=0x2764 | 0x2795..=0x2797 |
        0x27A1 | 0x27B0 | 0x27BF |
        0x2934..=0x2935 | 0x2B05..=0x2B07 | 0x2B1B..=0x2B1C | 0x2B50 | 0x2B55 |
        0x3030 | 0x303D | 0x3297 | 0x3299 |
        0x1F004 | 0x1F0CF | 0x1F170..=0x1F171 | 0x1F17E..=0x1F17F | 0x1F18E |
        0x1F191..=0x1F19A | 0x1F1E6..=0x1F1FF | 0x1F201..=0x1F202 | 0x1F21A |
        0x1F22F | 0x1F232..=0x1F23A | 0x1F250..=0x1F251 |
        0x1F300..=0x1F321 | 0x1F324..=0x1F393 | 0x1F396..=0x1F397 |
        0x1F399..=0x1F39B | 0x1F39E..=0x1F3F0 | 0x1F3F3..=0x1F3F5 |
        0x1F3F7..=0x1F4FD | 0x1F4FF..=0x1F53D | 0x1F549..=0x1F54E |
        0x1F550..=0x1F567 | 0x1F56F..=0x1F570 | 0x1F573..=0x1F57A | 0x1F587 |
        0x1F58A..=0x1F58D | 0x1F590 | 0x1F595..=0x1F596 | 0x1F5A4..=0x1F5A5 |
        0x1F5A8 | 0x1F5B1..=0x1F5B2 | 0x1F5BC | 0x1F5C2..=0x1F5C4 |
        0x1F5D1..=0x1F5D3 | 0x1F5DC..=0x1F5DE | 0x1F5E1 | 0x1F5E3 | 0x1F5E8 |
        0x1F5EF | 0x1F5F3 | 0x1F5FA..=0x1F64F |
        0x1F680..=0x1F6C5 | 0x1F6CB..=0x1F6D2 | 0x1F6D5..=0x1F6D7 |
        0x1F6DC..=0x1F6E5 | 0x1F6E9 | 0x1F6EB..=0x1F6EC | 0x1F6F0 |
        0x1F6F3..=0x1F6FC | 0x1F7E0..=0x1F7EB | 0x1F7F0 |
        0x1F90C..=0x1F93A | 0x1F93C..=0x1F945 | 0x1F947..=0x1F9FF |
        0x1FA70..=0x1FA7C | 0x1FA80..=0x1FA89 | 0x1FA8F..=0x1FAC6 |
        0x1FACE..=0x1FADC | 0x1FADF..=0x1FAE9 | 0x1FAF0..=0x1FAF8
    )
}

/// A glyph unit is an emoji candidate when its first scalar has the emoji property.
pub fn is_emoji_unit(unit: &str) -> bool {
    unit.chars().next().is_some_and(is_emoji)
}

/// `"😀"` -> `"1f600"`, `"🇺🇸"` -> `"1f1fa-1f1f8"`.
pub fn codepoint_stem(unit: &str) -> String {
    unit.chars()
        .map(|c| format!("{:x}", c as u32))
        .collect::<Vec<_>>()
        .join("-")
}

pub fn asset_file_name(unit: &str) -> String {
    format!("{}.png", codepoint_stem(unit))
}

/// Read-only directory of pre-rendered emoji glyphs.
#[derive(Clone, Debug)]
pub struct EmojiAssetDir {
    root: PathBuf,
}

impl EmojiAssetDir {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Candidate stems in lookup order: the exact sequence, then the sequence without VS16.
    fn candidate_stems(unit: &str) -> Vec<String> {
        let mut stems = vec![codepoint_stem(unit)];
        if unit.contains(VARIATION_SELECTOR_16) {
            let stripped: String = unit.chars().filter(|&c| c != VARIATION_SELECTOR_16).collect();
            if !stripped.is_empty() {
                stems.push(codepoint_stem(&stripped));
            }
        }
        stems
    }

    /// Find and load the bitmap for `unit`, scaled so its height is exactly `target_height`.
    ///
    /// Returns `None` when no asset exists or every candidate fails to decode; a broken asset
    /// must never fail the caption.
    pub fn load_scaled(&self, unit: &str, target_height: u32) -> Option<RgbaImage> {
        for stem in Self::candidate_stems(unit) {
            let png = self.root.join(format!("{stem}.png"));
            if png.is_file() {
                match decode_png_scaled(&png, target_height) {
                    Ok(img) => return Some(img),
                    Err(e) => {
                        tracing::warn!(path = %png.display(), error = %e, "unreadable emoji asset");
                    }
                }
            }

            let svg = self.root.join(format!("{stem}.svg"));
            if svg.is_file() {
                match rasterize_svg_scaled(&svg, target_height) {
                    Ok(img) => return Some(img),
                    Err(e) => {
                        tracing::warn!(path = %svg.display(), error = %e, "unreadable emoji asset");
                    }
                }
            }
        }
        None
    }
}

/// Width after uniformly scaling `(width, height)` to `target_height`, rounded to nearest.
pub fn scaled_width(width: u32, height: u32, target_height: u32) -> u32 {
    if height == 0 {
        return 0;
    }
    let w = f64::from(width) * f64::from(target_height) / f64::from(height);
    (w.round() as u32).max(1)
}

fn decode_png_scaled(path: &Path, target_height: u32) -> CaptionResult<RgbaImage> {
    let bytes = std::fs::read(path).with_context(|| format!("read '{}'", path.display()))?;
    let rgba = image::load_from_memory(&bytes)
        .with_context(|| format!("decode '{}'", path.display()))?
        .to_rgba8();
    let (w, h) = rgba.dimensions();
    if w == 0 || h == 0 {
        return Err(CaptionError::render("emoji image has zero size"));
    }
    let target_w = scaled_width(w, h, target_height);
    if (w, h) == (target_w, target_height) {
        return Ok(rgba);
    }
    Ok(image::imageops::resize(
        &rgba,
        target_w,
        target_height,
        FilterType::Lanczos3,
    ))
}

fn rasterize_svg_scaled(path: &Path, target_height: u32) -> CaptionResult<RgbaImage> {
    let bytes = std::fs::read(path).with_context(|| format!("read '{}'", path.display()))?;
    let tree = usvg::Tree::from_data(&bytes, &usvg::Options::default())
        .with_context(|| format!("parse svg '{}'", path.display()))?;

    let size = tree.size();
    if !size.width().is_finite() || !size.height().is_finite() || size.height() <= 0.0 {
        return Err(CaptionError::render("svg emoji has invalid width/height"));
    }
    let sy = target_height as f32 / size.height();
    let width = ((size.width() * sy).round() as u32).max(1);

    let mut pixmap = resvg::tiny_skia::Pixmap::new(width, target_height)
        .ok_or_else(|| CaptionError::render("failed to allocate svg pixmap"))?;
    resvg::render(
        &tree,
        resvg::tiny_skia::Transform::from_scale(sy, sy),
        &mut pixmap.as_mut(),
    );

    // tiny-skia pixels are premultiplied; glyph bitmaps carry straight alpha.
    let mut straight = pixmap.data().to_vec();
    crate::render::pixels::unpremultiply_in_place(&mut straight);
    RgbaImage::from_raw(width, target_height, straight)
        .ok_or_else(|| CaptionError::render("svg raster buffer size mismatch"))
}
