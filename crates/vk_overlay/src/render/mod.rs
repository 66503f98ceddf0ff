//! Rendering
//!
//! - `vulkan`: RAII wrappers over the ash objects this crate owns
//! - `passes`: attachment-driven render pass construction and lifetime tracking
//! - `text`: glyph upload, quad layout and overlay command recording

pub mod passes;
pub mod text;
pub mod vulkan;
