use std::{io::Cursor, path::Path};

use anyhow::Context as _;
use image::{ImageBuffer, Rgba, imageops::FilterType};

use crate::{
    foundation::error::{CaptionError, CaptionResult},
    render::{canvas::SupersampledCanvas, pixels::unpremultiply_in_place},
};

/// The finished caption image in straight-alpha RGBA8.
#[derive(Clone, Debug, PartialEq)]
pub struct CaptionImage {
    pub width: u32,
    pub height: u32,
    pub rgba8: Vec<u8>,
}

impl CaptionImage {
    pub fn pixel(&self, x: u32, y: u32) -> [u8; 4] {
        let i = (y as usize * self.width as usize + x as usize) * 4;
        [
            self.rgba8[i],
            self.rgba8[i + 1],
            self.rgba8[i + 2],
            self.rgba8[i + 3],
        ]
    }

    pub fn max_alpha(&self) -> u8 {
        self.rgba8.chunks_exact(4).map(|px| px[3]).max().unwrap_or(0)
    }

    pub fn encode_png(&self) -> CaptionResult<Vec<u8>> {
        if self.width == 0 || self.height == 0 {
            return Err(CaptionError::encode(format!(
                "cannot encode a {}x{} image as PNG",
                self.width, self.height
            )));
        }
        let img: ImageBuffer<Rgba<u8>, &[u8]> =
            ImageBuffer::from_raw(self.width, self.height, self.rgba8.as_slice())
                .ok_or_else(|| CaptionError::encode("image buffer size mismatch"))?;
        let mut out = Vec::new();
        img.write_to(&mut Cursor::new(&mut out), image::ImageFormat::Png)
            .map_err(|e| CaptionError::encode(format!("png encode failed: {e}")))?;
        Ok(out)
    }

    pub fn save_png(&self, path: &Path) -> CaptionResult<()> {
        let bytes = self.encode_png()?;
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent)
                .with_context(|| format!("create output dir '{}'", parent.display()))?;
        }
        std::fs::write(path, bytes).with_context(|| format!("write '{}'", path.display()))?;
        Ok(())
    }
}

/// Final height for a supersampled height; rounds up so no content row is lost.
pub fn target_height(canvas_height: u32, scale_factor: u32) -> u32 {
    canvas_height.div_ceil(scale_factor.max(1))
}

/// Resample the supersampled canvas to `target_width` x `ceil(height / scale)` with a Lanczos
/// filter.
///
/// Filtering runs on premultiplied pixels so fully transparent neighbours do not bleed colour
/// into glyph edges; the result is converted back to straight alpha.
pub fn downsample(
    canvas: &SupersampledCanvas,
    target_width: u32,
    scale_factor: u32,
) -> CaptionResult<CaptionImage> {
    let height = target_height(canvas.height, scale_factor);
    if canvas.width == 0 || canvas.height == 0 || target_width == 0 || height == 0 {
        return Ok(CaptionImage {
            width: target_width,
            height,
            rgba8: vec![0u8; target_width as usize * height as usize * 4],
        });
    }

    let src: ImageBuffer<Rgba<u8>, &[u8]> =
        ImageBuffer::from_raw(canvas.width, canvas.height, canvas.rgba8_premul.as_slice())
            .ok_or_else(|| CaptionError::render("canvas buffer size mismatch"))?;

    let mut rgba8 = if (canvas.width, canvas.height) == (target_width, height) {
        canvas.rgba8_premul.clone()
    } else {
        image::imageops::resize(&src, target_width, height, FilterType::Lanczos3).into_raw()
    };
    unpremultiply_in_place(&mut rgba8);

    Ok(CaptionImage {
        width: target_width,
        height,
        rgba8,
    })
}
