pub mod emoji;
pub mod font;
pub mod glyph;
pub mod metrics;
pub mod wrap;
