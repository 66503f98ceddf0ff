//! Glyph metrics and the sources that provide them
//!
//! Metrics follow the FreeType conventions the layout relies on: `top` is the
//! distance from the baseline up to the bitmap's top row and advances are in
//! 26.6 fixed point (1/64 pixel).

use std::collections::HashMap;
use fontdue::{Font, FontSettings};
use crate::core::config::FontConfig;
use crate::render::text::{TextError, TextResult};

/// Rasterized glyph and its placement metrics
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct GlyphMetrics {
    /// Bitmap width in pixels
    pub width: u32,
    /// Bitmap height in pixels
    pub rows: u32,
    /// Horizontal offset from the pen to the bitmap's left edge
    pub left: i32,
    /// Vertical offset from the baseline to the bitmap's top edge
    pub top: i32,
    /// Pen advance in 1/64 pixel units
    pub advance: (i64, i64),
    /// Single channel coverage, `width * rows` bytes; empty once released
    pub bitmap: Vec<u8>,
}

impl GlyphMetrics {
    /// Whether the glyph has pixels that can be uploaded
    pub fn has_bitmap(&self) -> bool {
        self.width > 0 && self.rows > 0 && self.bitmap.len() == self.width as usize * self.rows as usize
    }

    /// Advance converted to whole pixels
    pub fn advance_pixels(&self) -> (i64, i64) {
        (self.advance.0 >> 6, self.advance.1 >> 6)
    }
}

/// Provider of glyph metrics and bitmaps
pub trait GlyphSource {
    /// Metrics for `ch`, if the font has it
    fn glyph(&self, ch: char) -> Option<&GlyphMetrics>;

    /// Drop bitmap storage once textures are uploaded; metrics stay available
    fn release_bitmaps(&mut self);

    /// Whether [`GlyphSource::release_bitmaps`] has run
    fn bitmaps_released(&self) -> bool;

    /// Release everything; returns false if the source was already released
    fn release(&mut self) -> bool;
}

/// In-memory glyph table
#[derive(Debug, Clone, Default)]
pub struct GlyphData {
    glyphs: HashMap<char, GlyphMetrics>,
    bitmaps_released: bool,
    released: bool,
}

impl GlyphData {
    /// Create an empty glyph table
    pub fn new() -> Self {
        Self::default()
    }

    /// Rasterize every character of `charset` from TrueType/OpenType bytes
    ///
    /// Characters are rasterized at `FontConfig::pixel_size`.
    pub fn rasterize(font_data: &[u8], font: &FontConfig, charset: &str) -> TextResult<Self> {
        let face = Font::from_bytes(font_data, FontSettings::default())
            .map_err(|e| TextError::FontLoad(format!("fontdue error: {e}")))?;

        let px = font.pixel_size();
        let mut data = Self::new();

        for ch in charset.chars() {
            if data.glyphs.contains_key(&ch) {
                continue;
            }
            if face.lookup_glyph_index(ch) == 0 && ch != ' ' {
                log::warn!("Font has no glyph for '{}'", ch);
                continue;
            }
            let (metrics, bitmap) = face.rasterize(ch, px);
            data.insert(ch, metrics_from_fontdue(&metrics, bitmap));
        }

        log::info!(
            "Rasterized {} glyphs at {}px ({}pt @ {} dpi)",
            data.len(),
            px,
            font.point_size,
            font.dpi
        );

        Ok(data)
    }

    /// Add or replace a glyph
    pub fn insert(&mut self, ch: char, metrics: GlyphMetrics) {
        self.glyphs.insert(ch, metrics);
    }

    /// Number of glyphs
    pub fn len(&self) -> usize {
        self.glyphs.len()
    }

    /// Whether the table is empty
    pub fn is_empty(&self) -> bool {
        self.glyphs.is_empty()
    }
}

impl GlyphSource for GlyphData {
    fn glyph(&self, ch: char) -> Option<&GlyphMetrics> {
        self.glyphs.get(&ch)
    }

    fn release_bitmaps(&mut self) {
        for metrics in self.glyphs.values_mut() {
            metrics.bitmap = Vec::new();
        }
        self.bitmaps_released = true;
    }

    fn bitmaps_released(&self) -> bool {
        self.bitmaps_released
    }

    fn release(&mut self) -> bool {
        if self.released {
            return false;
        }
        self.glyphs.clear();
        self.released = true;
        true
    }
}

/// Convert fontdue's bottom-up metrics to baseline/top metrics
fn metrics_from_fontdue(metrics: &fontdue::Metrics, bitmap: Vec<u8>) -> GlyphMetrics {
    GlyphMetrics {
        width: metrics.width as u32,
        rows: metrics.height as u32,
        left: metrics.xmin,
        top: metrics.ymin + metrics.height as i32,
        advance: (
            (metrics.advance_width * 64.0).round() as i64,
            (metrics.advance_height * 64.0).round() as i64,
        ),
        bitmap,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fontdue_conversion() {
        let metrics = fontdue::Metrics {
            xmin: 1,
            ymin: -3,
            width: 10,
            height: 14,
            advance_width: 12.5,
            advance_height: 0.0,
            ..Default::default()
        };

        let glyph = metrics_from_fontdue(&metrics, vec![0; 140]);

        assert_eq!(glyph.width, 10);
        assert_eq!(glyph.rows, 14);
        assert_eq!(glyph.left, 1);
        assert_eq!(glyph.top, 11);
        assert_eq!(glyph.advance, (800, 0));
        assert_eq!(glyph.advance_pixels(), (12, 0));
        assert!(glyph.has_bitmap());
    }

    #[test]
    fn test_release_bitmaps_keeps_metrics() {
        let mut data = GlyphData::new();
        data.insert('A', GlyphMetrics {
            width: 2,
            rows: 2,
            left: 0,
            top: 2,
            advance: (3 << 6, 0),
            bitmap: vec![255; 4],
        });

        assert!(!data.bitmaps_released());
        data.release_bitmaps();
        assert!(data.bitmaps_released());

        let glyph = data.glyph('A').unwrap();
        assert!(glyph.bitmap.is_empty());
        assert!(!glyph.has_bitmap());
        assert_eq!(glyph.advance_pixels(), (3, 0));
    }

    #[test]
    fn test_huge_glyph_size_does_not_overflow() {
        let glyph = GlyphMetrics {
            width: 70_000,
            rows: 70_000,
            ..Default::default()
        };

        assert!(!glyph.has_bitmap());
    }

    #[test]
    fn test_release_only_once() {
        let mut data = GlyphData::new();
        data.insert('x', GlyphMetrics::default());

        assert!(data.release());
        assert!(data.glyph('x').is_none());
        assert!(!data.release());
    }

    #[test]
    fn test_invalid_font_bytes() {
        let result = GlyphData::rasterize(b"not a font", &FontConfig::default(), "AB");
        assert!(matches!(result, Err(TextError::FontLoad(_))));
    }
}
