//! Text overlay rendering
//!
//! Glyph metrics come from a [`GlyphSource`], every glyph gets its own R8
//! texture and descriptor set, and text is laid out as screen-space quads
//! written straight into a persistently mapped vertex buffer.

pub mod error;
pub mod glyph;
pub mod layout;
pub mod renderer;
pub mod resources;

pub use error::{TextError, TextResult};
pub use glyph::{GlyphData, GlyphMetrics, GlyphSource};
pub use layout::{glyph_quad, DrawBufferState, GlyphDraw, TextVertex, SPACE_ADVANCE, VERTICES_PER_GLYPH};
pub use renderer::{TextRenderer, TextUniforms};
pub use resources::{GlyphResource, GlyphResources, TextureUploader, VulkanTextureLoader};
