//! # vk_overlay
//!
//! Vulkan text overlay rendering and render pass resource management.
//!
//! ## Features
//!
//! - **Text Overlay**: Per-glyph textures, screen-space quad layout and per-framebuffer
//!   command recording through a persistently mapped vertex buffer
//! - **Render Pass Manager**: Builds single-subpass render passes from ordered
//!   attachment descriptions and tracks their lifetime by handle
//! - **Configuration**: TOML/RON loadable settings for shaders and buffer capacities
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use vk_overlay::prelude::*;
//!
//! fn record_overlay(renderer: &mut TextRenderer, queue: ash::vk::Queue, image_index: usize) -> TextResult<()> {
//!     renderer.begin_frame()?;
//!     renderer.append_text(-0.9, -0.9, 0.002, 0.002, "FPS 60")?;
//!     renderer.end_frame()?;
//!     renderer.submit_frame(queue, image_index)?;
//!     Ok(())
//! }
//! ```

#![warn(missing_docs)]
#![warn(clippy::all, clippy::pedantic, clippy::nursery)]
#![allow(clippy::module_name_repetitions, clippy::similar_names, clippy::too_many_arguments)]

pub mod config;
pub mod core;
pub mod foundation;
pub mod render;

/// Common imports for crate users
pub mod prelude {
    pub use crate::{
        config::{Config, ConfigError},
        core::config::{FontConfig, ShaderConfig, TextRendererConfig},
        render::passes::{
            AttachmentDescription, AttachmentFlags, RenderPassDevice, RenderPassHandle,
            RenderPassLayout, RenderPassManager,
        },
        render::text::{
            GlyphData, GlyphMetrics, GlyphSource, TextError, TextRenderer, TextResult,
            TextVertex, TextureUploader, VulkanTextureLoader,
        },
        render::vulkan::{VulkanError, VulkanResult},
    };
}
