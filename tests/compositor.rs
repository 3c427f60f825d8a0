use std::{io::Cursor, path::Path, sync::Arc};

use captioner::{
    CaptionError, EmojiGrouping, FontAsset, FontCache, FontHandle, RenderConfig,
    render::{
        canvas::{centered_x, plan_canvas},
        compositor::layout_lines,
        downsample::target_height,
    },
    render_caption, render_caption_to_path, render_caption_with_font,
    text::{emoji::EmojiAssetDir, glyph::GlyphResolver},
};

fn temp_dir(name: &str) -> std::path::PathBuf {
    std::env::temp_dir().join(format!(
        "captioner_{name}_{}_{}",
        std::process::id(),
        std::time::SystemTime::now()
            .duration_since(std::time::UNIX_EPOCH)
            .unwrap()
            .as_nanos()
    ))
}

fn system_font() -> Option<FontHandle> {
    match FontHandle::load(&FontAsset::SystemDefault) {
        Ok(font) => Some(font),
        Err(e) => {
            eprintln!("skipping: no system font available ({e})");
            None
        }
    }
}

fn write_emoji_png(dir: &Path, file: &str, size: u32, rgba: [u8; 4]) {
    std::fs::create_dir_all(dir).unwrap();
    let img = image::RgbaImage::from_pixel(size, size, image::Rgba(rgba));
    let mut buf = Vec::new();
    image::DynamicImage::ImageRgba8(img)
        .write_to(&mut Cursor::new(&mut buf), image::ImageFormat::Png)
        .unwrap();
    std::fs::write(dir.join(file), &buf).unwrap();
}

fn config(emoji_dir: &Path) -> RenderConfig {
    RenderConfig {
        video_width: 400,
        emoji_dir: emoji_dir.to_path_buf(),
        ..RenderConfig::default()
    }
}

#[test]
fn hello_world_is_one_line_tall_and_inked_only_inside_the_line() {
    let Some(font) = system_font() else { return };
    let cfg = config(&temp_dir("no_emoji"));
    let k = cfg.scale_factor;

    let lines = layout_lines("Hello World", &cfg, &font).unwrap();
    assert_eq!(lines.len(), 1);
    let line = &lines[0];
    assert!(line.glyphs().iter().all(|g| !g.is_emoji()));

    let img = render_caption_with_font("Hello World", &cfg, &font).unwrap();
    assert_eq!(img.width, 400);
    assert_eq!(img.height, (line.height() + 2 * cfg.margin_px()).div_ceil(k));
    assert!(img.max_alpha() > 200);

    let x0 = centered_x(cfg.canvas_width_px(), line.width());
    let slack = 4;
    let left = (x0 / k as i32 - slack).max(0) as u32;
    let right = ((x0 + line.width()) / k as i32 + slack).min(img.width as i32 - 1) as u32;
    for y in 0..img.height {
        for x in (0..left).chain(right + 1..img.width) {
            assert_eq!(img.pixel(x, y)[3], 0, "ink outside line box at ({x}, {y})");
        }
    }
    for y in 0..(cfg.margin - slack as u32) {
        for x in 0..img.width {
            assert_eq!(img.pixel(x, y)[3], 0, "ink in top margin at ({x}, {y})");
        }
    }
}

#[test]
fn emoji_matches_font_height_and_follows_text_with_tracking() {
    let Some(font) = system_font() else { return };
    let dir = temp_dir("scenario_emoji");
    write_emoji_png(&dir, "1f600.png", 72, [255, 0, 0, 255]);
    let cfg = config(&dir);
    let k = cfg.scale_factor;

    let lines = layout_lines("Hi 😀", &cfg, &font).unwrap();
    assert_eq!(lines.len(), 1);
    let glyphs = lines[0].glyphs();
    assert_eq!(glyphs.len(), 4);
    assert!(glyphs[..3].iter().all(|g| !g.is_emoji()));
    assert!(glyphs[3].is_emoji());
    assert_eq!(glyphs[3].height(), cfg.font_size_px());
    assert_eq!(glyphs[3].advance_width(), cfg.font_size_px());

    let tracking = cfg.tracking_px();
    let text_advance: i32 = glyphs[..3]
        .iter()
        .map(|g| g.advance_width() as i32 + tracking)
        .sum();
    assert_eq!(
        lines[0].width(),
        text_advance + cfg.font_size_px() as i32
    );

    let img = render_caption_with_font("Hi 😀", &cfg, &font).unwrap();
    let x0 = centered_x(cfg.canvas_width_px(), lines[0].width());
    let emoji_x = x0 + text_advance;
    let half = cfg.font_size_px() as i32 / 2;
    let cx = ((emoji_x + half) / k as i32) as u32;
    let cy = (cfg.margin_px() + cfg.font_size_px() / 2) / k;
    let px = img.pixel(cx, cy);
    assert!(px[0] >= 250 && px[1] <= 5 && px[2] <= 5 && px[3] >= 250, "{px:?}");

    // Text sits to the left of the emoji and never gets its colour.
    let text_x = ((x0 + text_advance / 2) / k as i32) as u32;
    for y in 0..img.height {
        let p = img.pixel(text_x, y);
        assert!(p[3] == 0 || p[0] < 40, "{p:?}");
    }

    std::fs::remove_dir_all(&dir).ok();
}

#[test]
fn empty_caption_is_transparent_margins_only() {
    let Some(font) = system_font() else { return };
    let cfg = config(&temp_dir("empty"));
    for caption in ["", "\n", "   "] {
        let img = render_caption_with_font(caption, &cfg, &font).unwrap();
        assert_eq!((img.width, img.height), (400, 2 * cfg.margin));
        assert_eq!(img.max_alpha(), 0);
    }
}

#[test]
fn newline_stacks_two_independently_centered_lines() {
    let Some(font) = system_font() else { return };
    let cfg = config(&temp_dir("two_lines"));
    let lines = layout_lines("Line1\nLine2", &cfg, &font).unwrap();
    assert_eq!(lines.len(), 2);

    let plan = plan_canvas(&lines, &cfg).unwrap();
    let m = cfg.margin_px() as i32;
    assert_eq!(plan.origins[0].1, m);
    assert_eq!(plan.origins[1].1, m + lines[0].height() as i32 + m);
    for (line, origin) in lines.iter().zip(&plan.origins) {
        assert_eq!(origin.0, centered_x(plan.width, line.width()));
    }
    assert_eq!(
        plan.height,
        lines[0].height() + lines[1].height() + 3 * cfg.margin_px()
    );

    let img = render_caption_with_font("Line1\nLine2", &cfg, &font).unwrap();
    assert_eq!(img.height, target_height(plan.height, cfg.scale_factor));
}

#[test]
fn canvas_height_scales_exactly_with_scale_factor() {
    let Some(font) = system_font() else { return };
    let dir = temp_dir("scale_invariant");
    write_emoji_png(&dir, "1f600.png", 64, [10, 200, 10, 255]);

    for caption in ["😀😀", "😀\n😀 😀", "Caption with text\nand 😀", ""] {
        let base = RenderConfig {
            scale_factor: 1,
            ..config(&dir)
        };
        let lines_1x = layout_lines(caption, &base, &font).unwrap();
        let h1 = plan_canvas(&lines_1x, &base).unwrap().height;
        for k in 2..=4 {
            let cfg = RenderConfig {
                scale_factor: k,
                ..base.clone()
            };
            let lines = layout_lines(caption, &cfg, &font).unwrap();
            let hk = plan_canvas(&lines, &cfg).unwrap().height;
            assert_eq!(hk, k * h1, "caption {caption:?} at scale {k}");
        }
    }

    std::fs::remove_dir_all(&dir).ok();
}

#[test]
fn final_height_is_canvas_height_divided_rounding_up() {
    let Some(font) = system_font() else { return };
    let dir = temp_dir("downsample_height");
    for k in 1..=5 {
        let cfg = RenderConfig {
            scale_factor: k,
            ..config(&dir)
        };
        let lines = layout_lines("Some text, gy", &cfg, &font).unwrap();
        let plan = plan_canvas(&lines, &cfg).unwrap();
        let img = render_caption_with_font("Some text, gy", &cfg, &font).unwrap();
        assert_eq!(img.height, plan.height.div_ceil(k));
    }
}

#[test]
fn single_line_is_centered_within_a_pixel() {
    let Some(font) = system_font() else { return };
    let cfg = config(&temp_dir("centering"));
    for caption in ["a", "centered", "W i d e r  t e x t"] {
        let lines = layout_lines(caption, &cfg, &font).unwrap();
        let plan = plan_canvas(&lines, &cfg).unwrap();
        let w = lines[0].width();
        let left = plan.origins[0].0;
        let right = plan.width as i32 - w - left;
        assert!((left - right).abs() <= 1, "{caption:?}: {left} vs {right}");
    }
}

#[test]
fn emoji_resolution_is_deterministic() {
    let Some(font) = system_font() else { return };
    let dir = temp_dir("emoji_determinism");
    write_emoji_png(&dir, "1f389.png", 50, [30, 60, 90, 200]);
    let store = EmojiAssetDir::new(&dir);
    let mut resolver = GlyphResolver::new(&font, &store, 120);
    let a = resolver.resolve("🎉").unwrap();
    let b = resolver.resolve("🎉").unwrap();
    assert!(a.is_emoji());
    assert_eq!(a, b);
    std::fs::remove_dir_all(&dir).ok();
}

#[test]
fn removing_an_emoji_asset_falls_back_to_the_font() {
    let Some(font) = system_font() else { return };
    let dir = temp_dir("fallback");
    write_emoji_png(&dir, "1f600.png", 64, [255, 0, 0, 255]);
    let cfg = config(&dir);

    let with_asset = layout_lines("ok 😀", &cfg, &font).unwrap();
    assert!(with_asset[0].glyphs()[3].is_emoji());

    std::fs::remove_file(dir.join("1f600.png")).unwrap();
    let without = layout_lines("ok 😀", &cfg, &font).unwrap();
    assert!(!without[0].glyphs()[3].is_emoji());
    render_caption_with_font("ok 😀", &cfg, &font).unwrap();

    std::fs::write(dir.join("1f600.png"), b"definitely not a png").unwrap();
    let corrupt = layout_lines("ok 😀", &cfg, &font).unwrap();
    assert!(!corrupt[0].glyphs()[3].is_emoji());

    std::fs::remove_dir_all(&dir).ok();
}

#[test]
fn grapheme_grouping_resolves_a_flag_as_one_asset() {
    let Some(font) = system_font() else { return };
    let dir = temp_dir("flag_grapheme");
    write_emoji_png(&dir, "1f1fa-1f1f8.png", 64, [0, 40, 200, 255]);
    let flag = "\u{1F1FA}\u{1F1F8}";

    let grapheme = RenderConfig {
        emoji_grouping: EmojiGrouping::Grapheme,
        ..config(&dir)
    };
    let lines = layout_lines(flag, &grapheme, &font).unwrap();
    assert_eq!(lines.len(), 1);
    let glyphs = lines[0].glyphs();
    assert_eq!(glyphs.len(), 1);
    assert!(glyphs[0].is_emoji());
    assert_eq!(glyphs[0].height(), grapheme.font_size_px());
    assert_eq!(lines[0].width(), grapheme.font_size_px() as i32);

    // Per-codepoint lookup finds no single-indicator asset, so both halves fall back.
    let codepoint = RenderConfig {
        emoji_grouping: EmojiGrouping::Codepoint,
        ..config(&dir)
    };
    let lines = layout_lines(flag, &codepoint, &font).unwrap();
    let glyphs = lines[0].glyphs();
    assert_eq!(glyphs.len(), 2);
    assert!(glyphs.iter().all(|g| !g.is_emoji()));

    let img = render_caption_with_font(flag, &grapheme, &font).unwrap();
    assert!(img.max_alpha() >= 250);

    std::fs::remove_dir_all(&dir).ok();
}

#[test]
fn unreadable_font_is_fatal() {
    let dir = temp_dir("bad_font");
    std::fs::create_dir_all(&dir).unwrap();
    let garbage = dir.join("broken.ttf");
    std::fs::write(&garbage, b"not a font at all").unwrap();

    for font in [
        FontAsset::File(dir.join("missing.ttf")),
        FontAsset::File(garbage.clone()),
    ] {
        let cfg = RenderConfig {
            font,
            ..config(&dir)
        };
        let err = render_caption("hello", &cfg, &FontCache::new()).unwrap_err();
        assert!(matches!(err, CaptionError::Font(_)), "{err}");
    }

    std::fs::remove_dir_all(&dir).ok();
}

#[test]
fn render_to_path_writes_png_and_reports_height() {
    if system_font().is_none() {
        return;
    }
    let dir = temp_dir("to_path");
    let out = dir.join("nested").join("caption.png");
    let cfg = config(&dir);

    let (path, height) = render_caption_to_path("Hi there", &out, &cfg, &FontCache::new()).unwrap();
    assert_eq!(path, out);
    let decoded = image::open(&out).unwrap().to_rgba8();
    assert_eq!(decoded.dimensions(), (400, height));

    std::fs::remove_dir_all(&dir).ok();
}

#[test]
fn font_cache_is_shared_across_threads() {
    if system_font().is_none() {
        return;
    }
    let fonts = Arc::new(FontCache::new());
    let cfg = Arc::new(config(&temp_dir("threads")));

    let handles: Vec<_> = ["one", "two", "three", "four"]
        .into_iter()
        .map(|caption| {
            let fonts = Arc::clone(&fonts);
            let cfg = Arc::clone(&cfg);
            std::thread::spawn(move || render_caption(caption, &cfg, &fonts).unwrap())
        })
        .collect();
    let heights: Vec<u32> = handles
        .into_iter()
        .map(|h| h.join().unwrap().height)
        .collect();

    assert_eq!(fonts.len(), 1);
    assert!(heights.iter().all(|&h| h == heights[0]));
}
