use std::{
    collections::HashMap,
    path::Path,
    sync::{Arc, RwLock},
};

use skrifa::{
    GlyphId, MetadataProvider as _,
    instance::{LocationRef, Size},
    outline::{DrawSettings, OutlinePen},
};

use crate::foundation::{
    config::FontAsset,
    error::{CaptionError, CaptionResult},
};

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
/// RGBA8 brush color carried through Parley layouts.
pub struct TextBrushRgba8 {
    pub r: u8,
    pub g: u8,
    pub b: u8,
    pub a: u8,
}

impl TextBrushRgba8 {
    pub const BLACK: Self = Self {
        r: 0,
        g: 0,
        b: 0,
        a: 255,
    };
}

/// Loaded font face: bytes for shaping plus the rasterizer's view of the same face.
///
/// Immutable after construction, so one handle can serve any number of concurrent renders.
#[derive(Clone)]
pub struct FontHandle {
    family: String,
    index: u32,
    shaping_blob: parley::fontique::Blob<u8>,
    raster: vello_cpu::peniko::FontData,
    byte_len: usize,
}

impl std::fmt::Debug for FontHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FontHandle")
            .field("family", &self.family)
            .field("index", &self.index)
            .field("byte_len", &self.byte_len)
            .finish()
    }
}

impl FontHandle {
    /// Load a face. Every failure here is fatal for captioning.
    pub fn load(asset: &FontAsset) -> CaptionResult<Self> {
        match asset {
            FontAsset::File(path) => Self::from_file(path),
            FontAsset::System(family) => {
                let db = system_fontdb();
                let families = [usvg::fontdb::Family::Name(family.as_str())];
                let id = db.query(&face_query(&families)).ok_or_else(|| {
                    CaptionError::font(format!("system font family '{family}' is not installed"))
                })?;
                Self::from_fontdb_face(&db, id)
            }
            FontAsset::SystemDefault => {
                let db = system_fontdb();
                let families = [usvg::fontdb::Family::SansSerif];
                let id = db
                    .query(&face_query(&families))
                    .or_else(|| {
                        db.faces()
                            .find(|face| {
                                !face
                                    .families
                                    .iter()
                                    .any(|(name, _)| name.to_ascii_lowercase().contains("emoji"))
                            })
                            .map(|face| face.id)
                    })
                    .ok_or_else(|| CaptionError::font("no system fonts are installed"))?;
                Self::from_fontdb_face(&db, id)
            }
        }
    }

    pub fn from_file(path: &Path) -> CaptionResult<Self> {
        let bytes = std::fs::read(path).map_err(|e| {
            CaptionError::font(format!("read font file '{}': {e}", path.display()))
        })?;
        Self::from_bytes(bytes, 0, None)
    }

    /// Build a handle from raw font bytes. `family` picks among the families in a collection.
    pub fn from_bytes(bytes: Vec<u8>, index: u32, family: Option<String>) -> CaptionResult<Self> {
        let byte_len = bytes.len();
        let shaping_blob = parley::fontique::Blob::from(bytes.clone());

        let mut scratch = parley::FontContext::default();
        let registered = scratch.collection.register_fonts(shaping_blob.clone(), None);
        let names: Vec<String> = registered
            .iter()
            .filter_map(|(id, _)| scratch.collection.family_name(*id).map(str::to_string))
            .collect();
        if names.is_empty() {
            return Err(CaptionError::font(
                "no font families registered from font bytes",
            ));
        }
        // Shaping addresses the face by the name Parley registered, so a preferred name only
        // wins when Parley knows it too.
        let family = family
            .filter(|wanted| names.iter().any(|n| n == wanted))
            .unwrap_or_else(|| names[0].clone());

        skrifa::FontRef::from_index(&bytes, index)
            .map_err(|e| CaptionError::font(format!("font face {index} is unreadable: {e}")))?;

        let raster = vello_cpu::peniko::FontData::new(vello_cpu::peniko::Blob::from(bytes), index);
        Ok(Self {
            family,
            index,
            shaping_blob,
            raster,
            byte_len,
        })
    }

    fn from_fontdb_face(db: &usvg::fontdb::Database, id: usvg::fontdb::ID) -> CaptionResult<Self> {
        let family = db
            .face(id)
            .and_then(|face| face.families.first().map(|(name, _)| name.clone()));
        let (bytes, index) = db
            .with_face_data(id, |data, index| (data.to_vec(), index))
            .ok_or_else(|| CaptionError::font("system font face data is unavailable"))?;
        Self::from_bytes(bytes, index, family)
    }

    pub fn family(&self) -> &str {
        &self.family
    }

    pub(crate) fn raster(&self) -> &vello_cpu::peniko::FontData {
        &self.raster
    }
}

fn face_query<'a>(families: &'a [usvg::fontdb::Family<'a>]) -> usvg::fontdb::Query<'a> {
    usvg::fontdb::Query {
        families,
        weight: usvg::fontdb::Weight::NORMAL,
        stretch: usvg::fontdb::Stretch::Normal,
        style: usvg::fontdb::Style::Normal,
    }
}

fn system_fontdb() -> usvg::fontdb::Database {
    let mut db = usvg::fontdb::Database::new();
    db.load_system_fonts();
    db
}

/// Read-mostly cache of loaded faces keyed by asset. Handles are size independent; sizes are
/// applied at shaping time.
///
/// Entries are inserted once and never mutated, so lookups only need the read lock.
#[derive(Debug, Default)]
pub struct FontCache {
    entries: RwLock<HashMap<FontAsset, Arc<FontHandle>>>,
}

impl FontCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get_or_load(&self, asset: &FontAsset) -> CaptionResult<Arc<FontHandle>> {
        {
            let entries = self
                .entries
                .read()
                .map_err(|_| CaptionError::font("font cache lock poisoned"))?;
            if let Some(font) = entries.get(asset) {
                return Ok(Arc::clone(font));
            }
        }

        let loaded = Arc::new(FontHandle::load(asset)?);
        tracing::debug!(font = %asset, family = loaded.family(), "loaded caption font");

        let mut entries = self
            .entries
            .write()
            .map_err(|_| CaptionError::font("font cache lock poisoned"))?;
        Ok(Arc::clone(entries.entry(asset.clone()).or_insert(loaded)))
    }

    pub fn len(&self) -> usize {
        self.entries.read().map(|e| e.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// One shaped glyph. `x` is from the unit's left edge, `y` from its baseline (down is positive).
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct ShapedGlyph {
    pub id: u32,
    pub x: f32,
    pub y: f32,
}

/// Vertical extent of the inked outlines, in pixels from the baseline.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct InkExtent {
    /// How far ink rises above the baseline.
    pub above: f32,
    /// How far ink drops below the baseline.
    pub below: f32,
}

/// Shaping result for a single glyph unit.
///
/// `ascent` and `descent` are the face's ascender and descender as positive distances from the
/// baseline. `ink` is `None` when nothing is drawn, e.g. for a space.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct ShapedUnit {
    pub advance: f32,
    pub ascent: f32,
    pub descent: f32,
    pub ink: Option<InkExtent>,
    pub glyphs: Vec<ShapedGlyph>,
}

/// Tracks the vertical range of every point an outline emits. Control points are included, so
/// the range bounds the curve.
#[derive(Default)]
struct VerticalBounds {
    min: Option<f32>,
    max: Option<f32>,
}

impl VerticalBounds {
    fn add(&mut self, y: f32) {
        self.min = Some(self.min.map_or(y, |m| m.min(y)));
        self.max = Some(self.max.map_or(y, |m| m.max(y)));
    }
}

impl OutlinePen for VerticalBounds {
    fn move_to(&mut self, _x: f32, y: f32) {
        self.add(y);
    }

    fn line_to(&mut self, _x: f32, y: f32) {
        self.add(y);
    }

    fn quad_to(&mut self, _cx0: f32, cy0: f32, _x: f32, y: f32) {
        self.add(cy0);
        self.add(y);
    }

    fn curve_to(&mut self, _cx0: f32, cy0: f32, _cx1: f32, cy1: f32, _x: f32, y: f32) {
        self.add(cy0);
        self.add(cy1);
        self.add(y);
    }

    fn close(&mut self) {}
}

/// Per-call Parley contexts bound to one font.
///
/// Parley contexts are mutable scratch space, so each render owns its own engine.
pub struct TextLayoutEngine {
    font_ctx: parley::FontContext,
    layout_ctx: parley::LayoutContext<TextBrushRgba8>,
    family: String,
    face: vello_cpu::peniko::FontData,
}

impl TextLayoutEngine {
    pub fn new(font: &FontHandle) -> Self {
        let mut font_ctx = parley::FontContext::default();
        font_ctx
            .collection
            .register_fonts(font.shaping_blob.clone(), None);
        Self {
            font_ctx,
            layout_ctx: parley::LayoutContext::new(),
            family: font.family.clone(),
            face: font.raster.clone(),
        }
    }

    /// Shape `text` on a single unbroken line at `size_px` and measure its ink.
    ///
    /// Empty text shapes to nothing: no advance, no glyphs.
    pub fn shape(&mut self, text: &str, size_px: f32) -> CaptionResult<ShapedUnit> {
        if !size_px.is_finite() || size_px <= 0.0 {
            return Err(CaptionError::validation(
                "text size_px must be finite and > 0",
            ));
        }
        if text.is_empty() {
            return Ok(ShapedUnit::default());
        }

        let mut builder = self
            .layout_ctx
            .ranged_builder(&mut self.font_ctx, text, 1.0, true);
        builder.push_default(parley::style::StyleProperty::FontStack(
            parley::style::FontStack::Source(std::borrow::Cow::Owned(self.family.clone())),
        ));
        builder.push_default(parley::style::StyleProperty::FontSize(size_px));
        builder.push_default(parley::style::StyleProperty::Brush(TextBrushRgba8::BLACK));

        let mut layout: parley::Layout<TextBrushRgba8> = builder.build(text);
        layout.break_all_lines(None);

        let face = skrifa::FontRef::from_index(self.face.data.data(), self.face.index)
            .map_err(|e| CaptionError::font(format!("font face is unreadable: {e}")))?;
        let size = Size::new(size_px);
        let face_metrics = face.metrics(size, LocationRef::default());

        let mut out = ShapedUnit {
            ascent: face_metrics.ascent,
            descent: -face_metrics.descent,
            ..ShapedUnit::default()
        };
        let Some(line) = layout.lines().next() else {
            return Ok(out);
        };
        let m = line.metrics();
        out.advance = m.advance;

        for item in line.items() {
            let parley::layout::PositionedLayoutItem::GlyphRun(run) = item else {
                continue;
            };
            out.glyphs
                .extend(run.positioned_glyphs().map(|g| ShapedGlyph {
                    id: g.id,
                    x: g.x,
                    y: g.y - m.baseline,
                }));
        }

        let outlines = face.outline_glyphs();
        for g in &out.glyphs {
            let Some(outline) = outlines.get(GlyphId::new(g.id)) else {
                continue;
            };
            let mut bounds = VerticalBounds::default();
            let settings = DrawSettings::unhinted(size, LocationRef::default());
            if let Err(e) = outline.draw(settings, &mut bounds) {
                tracing::debug!(glyph = g.id, error = %e, "glyph outline could not be measured");
                continue;
            }
            let (Some(min), Some(max)) = (bounds.min, bounds.max) else {
                continue;
            };
            // Outlines are y-up, glyph offsets y-down.
            let ink = InkExtent {
                above: max - g.y,
                below: g.y - min,
            };
            out.ink = Some(match out.ink {
                Some(prev) => InkExtent {
                    above: prev.above.max(ink.above),
                    below: prev.below.max(ink.below),
                },
                None => ink,
            });
        }
        Ok(out)
    }
}

impl std::fmt::Debug for TextLayoutEngine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TextLayoutEngine")
            .field("family", &self.family)
            .finish()
    }
}
