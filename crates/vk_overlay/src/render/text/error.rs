//! Text rendering errors

use crate::config::ConfigError;
use crate::render::vulkan::VulkanError;

/// Result type for text operations
pub type TextResult<T> = Result<T, TextError>;

/// Errors that can occur while uploading or laying out text
#[derive(Debug, thiserror::Error)]
pub enum TextError {
    /// Requested character has no glyph
    #[error("Character '{0}' not found in font")]
    GlyphNotFound(char),

    /// The per-frame vertex buffer is full
    #[error("Text vertex buffer full: capacity is {capacity} glyphs")]
    CapacityExceeded {
        /// Glyph quads the buffer holds
        capacity: usize,
    },

    /// The charset needs more descriptor sets than the pool was built with
    #[error("Descriptor pool too small: charset needs {requested} sets, pool holds {capacity}")]
    DescriptorPoolExhausted {
        /// Sets needed
        requested: usize,
        /// Pool capacity
        capacity: usize,
    },

    /// Glyph bitmaps were released by an earlier upload
    #[error("Glyph bitmaps already released; glyphs are uploaded once")]
    BitmapsReleased,

    /// `begin_frame` called while a frame is already being written
    #[error("Text frame already in progress")]
    FrameInProgress,

    /// Text written or frame ended without `begin_frame`
    #[error("No text frame in progress")]
    NoFrameInProgress,

    /// Font data could not be loaded
    #[error("Failed to load font: {0}")]
    FontLoad(String),

    /// Renderer configuration rejected
    #[error("Invalid text renderer configuration: {0}")]
    Config(#[from] ConfigError),

    /// Underlying Vulkan failure
    #[error(transparent)]
    Vulkan(#[from] VulkanError),
}
