//! Text layout engine
//!
//! Converts text into two-triangle quads, one per visible glyph, written
//! directly into caller-provided vertex storage (the mapped vertex buffer at
//! runtime, a `Vec` in tests). Each quad is six vertices; no index buffer.
//!
//! # Layout Coordinate System
//!
//! - The pen starts at the `(x, y)` passed to [`DrawBufferState::append_text`]
//! - +X points right, +Y points up; a glyph's bitmap hangs `top` above the pen
//! - Quads sit at z = 1

use std::mem;
use ash::vk;
use bytemuck::{Pod, Zeroable};
use crate::render::text::{GlyphMetrics, GlyphSource, TextError, TextResult};

/// Pen advance for a space, in unscaled pixels
pub const SPACE_ADVANCE: f32 = 32.0;

/// Vertices emitted per glyph (two triangles)
pub const VERTICES_PER_GLYPH: usize = 6;

/// Vertex data for text rendering
#[derive(Debug, Clone, Copy, PartialEq, Default, Pod, Zeroable)]
#[repr(C)]
pub struct TextVertex {
    /// Screen-space position
    pub position: [f32; 3],
    /// Texture coordinates into the glyph's own texture
    pub uv: [f32; 2],
}

impl TextVertex {
    fn new(x: f32, y: f32, u: f32, v: f32) -> Self {
        Self {
            position: [x, y, 1.0],
            uv: [u, v],
        }
    }

    /// Vertex input binding for a tightly packed `TextVertex` stream
    pub fn binding_description() -> vk::VertexInputBindingDescription {
        vk::VertexInputBindingDescription {
            binding: 0,
            stride: mem::size_of::<Self>() as u32,
            input_rate: vk::VertexInputRate::VERTEX,
        }
    }

    /// Position (location 0) and texture coordinate (location 1) attributes
    pub fn attribute_descriptions() -> [vk::VertexInputAttributeDescription; 2] {
        [
            vk::VertexInputAttributeDescription {
                binding: 0,
                location: 0,
                format: vk::Format::R32G32B32_SFLOAT,
                offset: 0,
            },
            vk::VertexInputAttributeDescription {
                binding: 0,
                location: 1,
                format: vk::Format::R32G32_SFLOAT,
                offset: mem::size_of::<[f32; 3]>() as u32,
            },
        ]
    }
}

/// Build the six vertices of one glyph with the pen at `(x, y)`
///
/// Corner order is top-left, bottom-left, top-right, then top-right,
/// bottom-left, bottom-right. The paired shader depends on this order and on
/// the matching texture coordinates.
pub fn glyph_quad(x: f32, y: f32, scale_x: f32, scale_y: f32, glyph: &GlyphMetrics) -> [TextVertex; VERTICES_PER_GLYPH] {
    let vx = x + glyph.left as f32 * scale_x;
    let vy = y + glyph.top as f32 * scale_y;
    let w = glyph.width as f32 * scale_x;
    let h = glyph.rows as f32 * scale_y;

    [
        TextVertex::new(vx, vy, 0.0, 0.0),
        TextVertex::new(vx, vy - h, 0.0, 1.0),
        TextVertex::new(vx + w, vy, 1.0, 0.0),
        TextVertex::new(vx + w, vy, 1.0, 0.0),
        TextVertex::new(vx, vy - h, 0.0, 1.0),
        TextVertex::new(vx + w, vy - h, 1.0, 1.0),
    ]
}

/// One draw call: a glyph and where its quad starts in the vertex buffer
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GlyphDraw {
    /// Character whose descriptor set is bound
    pub character: char,
    /// First vertex of the quad
    pub first_vertex: u32,
}

/// Write cursor and bookkeeping for the current frame
#[derive(Debug, Clone, Default)]
pub struct DrawBufferState {
    quads: usize,
    text: String,
    draws: Vec<GlyphDraw>,
}

impl DrawBufferState {
    /// Create an empty state
    pub fn new() -> Self {
        Self::default()
    }

    /// Rewind the cursor and forget the frame's text
    pub fn reset(&mut self) {
        self.quads = 0;
        self.text.clear();
        self.draws.clear();
    }

    /// Lay out `text` starting at `(x, y)` and write the quads into `vertices`
    ///
    /// `vertices` is the whole frame buffer; the cursor says where writing
    /// resumes. Stops at the first character without a glyph, or when the
    /// next quad would not fit. Everything written before the failure stays
    /// consistent with [`Self::text`] and [`Self::draws`].
    ///
    /// Returns the pen position after the last character.
    pub fn append_text<G: GlyphSource + ?Sized>(
        &mut self,
        vertices: &mut [TextVertex],
        glyphs: &G,
        mut x: f32,
        mut y: f32,
        scale_x: f32,
        scale_y: f32,
        text: &str,
    ) -> TextResult<(f32, f32)> {
        let capacity = vertices.len() / VERTICES_PER_GLYPH;

        for ch in text.chars() {
            if ch == ' ' {
                x += SPACE_ADVANCE * scale_x;
                self.text.push(ch);
                continue;
            }

            let Some(glyph) = glyphs.glyph(ch) else {
                log::error!("Could not find char '{}'", ch);
                return Err(TextError::GlyphNotFound(ch));
            };

            if self.quads >= capacity {
                log::warn!("Text buffer full ({} glyphs), dropping '{}'", capacity, ch);
                return Err(TextError::CapacityExceeded { capacity });
            }

            let start = self.quads * VERTICES_PER_GLYPH;
            vertices[start..start + VERTICES_PER_GLYPH]
                .copy_from_slice(&glyph_quad(x, y, scale_x, scale_y, glyph));

            self.draws.push(GlyphDraw {
                character: ch,
                first_vertex: start as u32,
            });
            self.quads += 1;
            self.text.push(ch);

            let (advance_x, advance_y) = glyph.advance_pixels();
            x += advance_x as f32 * scale_x;
            y += advance_y as f32 * scale_y;
        }

        Ok((x, y))
    }

    /// Quads written since the last reset
    pub fn quad_count(&self) -> usize {
        self.quads
    }

    /// Vertices written since the last reset
    pub fn vertex_count(&self) -> usize {
        self.quads * VERTICES_PER_GLYPH
    }

    /// Text accumulated this frame, spaces included
    pub fn text(&self) -> &str {
        &self.text
    }

    /// One draw per written quad, in write order
    pub fn draws(&self) -> &[GlyphDraw] {
        &self.draws
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::render::text::GlyphData;
    use approx::assert_relative_eq;

    const EXPECTED_UVS: [[f32; 2]; 6] = [
        [0.0, 0.0],
        [0.0, 1.0],
        [1.0, 0.0],
        [1.0, 0.0],
        [0.0, 1.0],
        [1.0, 1.0],
    ];

    fn glyph(width: u32, rows: u32, left: i32, top: i32, advance: i64) -> GlyphMetrics {
        GlyphMetrics {
            width,
            rows,
            left,
            top,
            advance: (advance << 6, 0),
            bitmap: vec![0; (width * rows) as usize],
        }
    }

    fn font_ab() -> GlyphData {
        let mut data = GlyphData::new();
        data.insert('A', glyph(10, 12, 1, 10, 12));
        data.insert('B', glyph(8, 12, 0, 10, 9));
        data
    }

    fn buffer(quads: usize) -> Vec<TextVertex> {
        vec![TextVertex::default(); quads * VERTICES_PER_GLYPH]
    }

    #[test]
    fn test_text_vertex_layout() {
        assert_eq!(mem::size_of::<TextVertex>(), mem::size_of::<f32>() * 5);
        assert_eq!(TextVertex::binding_description().stride, 20);

        let attributes = TextVertex::attribute_descriptions();
        assert_eq!(attributes[0].format, vk::Format::R32G32B32_SFLOAT);
        assert_eq!(attributes[1].location, 1);
        assert_eq!(attributes[1].offset, 12);
    }

    #[test]
    fn test_quad_corners_and_uvs() {
        let g = glyph(10, 12, 1, 10, 12);
        let quad = glyph_quad(5.0, 20.0, 2.0, 0.5, &g);

        // left = 5 + 1*2, top = 20 + 10*0.5, w = 20, h = 6
        let (left, top, right, bottom) = (7.0, 25.0, 27.0, 19.0);
        let expected = [
            [left, top],
            [left, bottom],
            [right, top],
            [right, top],
            [left, bottom],
            [right, bottom],
        ];

        for (i, vertex) in quad.iter().enumerate() {
            assert_relative_eq!(vertex.position[0], expected[i][0]);
            assert_relative_eq!(vertex.position[1], expected[i][1]);
            assert_relative_eq!(vertex.position[2], 1.0);
            assert_eq!(vertex.uv, EXPECTED_UVS[i]);
        }
    }

    #[test]
    fn test_ab_scenario() {
        let font = font_ab();
        let mut vertices = buffer(256);
        let mut state = DrawBufferState::new();

        let pen = state.append_text(&mut vertices, &font, 0.0, 0.0, 1.0, 1.0, "AB").unwrap();

        assert_eq!(state.vertex_count(), 12);
        assert_eq!(state.quad_count(), 2);
        assert_relative_eq!(pen.0, 21.0);

        // A's top-left
        assert_eq!(vertices[0].position, [1.0, 10.0, 1.0]);
        // B's quad starts at A's advance
        assert_eq!(vertices[6].position, [12.0, 10.0, 1.0]);
        assert_eq!(vertices[11].position, [20.0, -2.0, 1.0]);

        assert_eq!(
            state.draws(),
            &[
                GlyphDraw { character: 'A', first_vertex: 0 },
                GlyphDraw { character: 'B', first_vertex: 6 },
            ]
        );
    }

    #[test]
    fn test_pen_advance_is_scaled_sum() {
        let font = font_ab();
        let mut vertices = buffer(16);
        let mut state = DrawBufferState::new();

        let pen = state.append_text(&mut vertices, &font, 3.0, 7.0, 0.5, 2.0, "ABBA").unwrap();

        assert_relative_eq!(pen.0, 3.0 + (12.0 + 9.0 + 9.0 + 12.0) * 0.5);
        assert_relative_eq!(pen.1, 7.0);
    }

    #[test]
    fn test_space_advances_without_vertices() {
        let font = font_ab();
        let mut vertices = buffer(16);
        let mut state = DrawBufferState::new();

        let pen = state.append_text(&mut vertices, &font, 0.0, 0.0, 1.5, 1.0, "A B").unwrap();

        assert_eq!(state.quad_count(), 2);
        assert_eq!(state.text(), "A B");
        assert_relative_eq!(pen.0, (12.0 + 32.0 + 9.0) * 1.5);

        // B follows directly after A's vertices even though a space came between
        assert_eq!(state.draws()[1].first_vertex, 6);
        assert_relative_eq!(vertices[6].position[0], (12.0 + 32.0) * 1.5);

        let mut only_spaces = DrawBufferState::new();
        let pen = only_spaces.append_text(&mut vertices, &font, 0.0, 0.0, 2.0, 1.0, "  ").unwrap();
        assert_eq!(only_spaces.quad_count(), 0);
        assert_relative_eq!(pen.0, 128.0);
    }

    #[test]
    fn test_missing_glyph_stops_without_corruption() {
        crate::foundation::logging::init_for_tests();

        let font = font_ab();
        let mut vertices = buffer(16);
        let mut state = DrawBufferState::new();

        let result = state.append_text(&mut vertices, &font, 0.0, 0.0, 1.0, 1.0, "AZB");

        assert!(matches!(result, Err(TextError::GlyphNotFound('Z'))));
        assert_eq!(state.quad_count(), 1);
        assert_eq!(state.text(), "A");
        assert_eq!(vertices[6], TextVertex::default());

        // The caller can carry on with the rest of the text
        state.append_text(&mut vertices, &font, 12.0, 0.0, 1.0, 1.0, "B").unwrap();
        assert_eq!(state.quad_count(), 2);
        assert_eq!(state.text(), "AB");
    }

    #[test]
    fn test_capacity_boundary() {
        let font = font_ab();
        let mut vertices = buffer(256);
        let mut state = DrawBufferState::new();

        let full = "A".repeat(256);
        state.append_text(&mut vertices, &font, 0.0, 0.0, 1.0, 1.0, &full).unwrap();
        assert_eq!(state.quad_count(), 256);

        let result = state.append_text(&mut vertices, &font, 0.0, 0.0, 1.0, 1.0, "B");
        assert!(matches!(result, Err(TextError::CapacityExceeded { capacity: 256 })));
        assert_eq!(state.quad_count(), 256);
        assert_eq!(state.draws().len(), 256);
        assert_eq!(state.draws().last().unwrap().first_vertex, 255 * 6);

        // Spaces still fit since they write nothing
        state.append_text(&mut vertices, &font, 0.0, 0.0, 1.0, 1.0, " ").unwrap();
    }

    #[test]
    fn test_capacity_hit_mid_string() {
        let font = font_ab();
        let mut vertices = buffer(2);
        let mut state = DrawBufferState::new();

        let result = state.append_text(&mut vertices, &font, 0.0, 0.0, 1.0, 1.0, "ABA");

        assert!(matches!(result, Err(TextError::CapacityExceeded { capacity: 2 })));
        assert_eq!(state.text(), "AB");
        assert_eq!(state.quad_count(), 2);
    }

    #[test]
    fn test_reset() {
        let font = font_ab();
        let mut vertices = buffer(4);
        let mut state = DrawBufferState::new();
        state.append_text(&mut vertices, &font, 0.0, 0.0, 1.0, 1.0, "AB").unwrap();

        state.reset();

        assert_eq!(state.quad_count(), 0);
        assert!(state.text().is_empty());
        assert!(state.draws().is_empty());

        state.append_text(&mut vertices, &font, 0.0, 0.0, 1.0, 1.0, "B").unwrap();
        assert_eq!(state.draws()[0].first_vertex, 0);
    }
}
