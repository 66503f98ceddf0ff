//! # Text Renderer Configuration
//!
//! Settings for the text overlay: shader locations, glyph rasterization size,
//! the initialization charset and the fixed capacities of the GPU resources
//! (vertex buffer and descriptor pool).
//!
//! Loadable from TOML or RON through the [`Config`] trait.

use serde::{Serialize, Deserialize};
use std::path::Path;

pub use crate::config::{Config, ConfigError};

/// Printable ASCII, space through tilde
pub const PRINTABLE_ASCII: &str =
    " !\"#$%&'()*+,-./0123456789:;<=>?@ABCDEFGHIJKLMNOPQRSTUVWXYZ[\\]^_`abcdefghijklmnopqrstuvwxyz{|}~";

/// # Shader Configuration
///
/// Paths to the SPIR-V binaries of the font pipeline.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ShaderConfig {
    /// Path to the vertex shader SPIR-V file
    pub vertex_shader_path: String,
    /// Path to the fragment shader SPIR-V file
    pub fragment_shader_path: String,
}

impl ShaderConfig {
    /// Create a new shader configuration
    pub fn new(vertex_path: impl Into<String>, fragment_path: impl Into<String>) -> Self {
        Self {
            vertex_shader_path: vertex_path.into(),
            fragment_shader_path: fragment_path.into(),
        }
    }

    /// Create shader config with automatic path resolution
    ///
    /// Tries the usual build output and resource directories and falls back to
    /// `shaders/` when neither file is found.
    pub fn with_path_resolution(base_vertex: &str, base_fragment: &str) -> Self {
        let shader_dirs = [
            "target/shaders/",
            "shaders/",
            "resources/shaders/",
            "../shaders/",
            "./",
        ];

        let resolve = |name: &str| {
            shader_dirs
                .iter()
                .map(|dir| format!("{dir}{name}"))
                .find(|candidate| Path::new(candidate).exists())
                .unwrap_or_else(|| format!("shaders/{name}"))
        };

        Self {
            vertex_shader_path: resolve(base_vertex),
            fragment_shader_path: resolve(base_fragment),
        }
    }

    /// Validate that shader files exist
    pub fn validate(&self) -> Result<(), String> {
        if !Path::new(&self.vertex_shader_path).exists() {
            return Err(format!("Vertex shader not found: {}", self.vertex_shader_path));
        }
        if !Path::new(&self.fragment_shader_path).exists() {
            return Err(format!("Fragment shader not found: {}", self.fragment_shader_path));
        }
        Ok(())
    }
}

impl Default for ShaderConfig {
    fn default() -> Self {
        Self::with_path_resolution("text.vert.spv", "text.frag.spv")
    }
}

/// Glyph rasterization settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FontConfig {
    /// Nominal font size in points
    pub point_size: f32,
    /// Target display resolution in dots per inch
    pub dpi: u32,
}

impl FontConfig {
    /// Rasterization size in pixels (`point_size * dpi / 72`)
    pub fn pixel_size(&self) -> f32 {
        self.point_size * self.dpi as f32 / 72.0
    }
}

impl Default for FontConfig {
    fn default() -> Self {
        Self {
            point_size: 24.0,
            dpi: 96,
        }
    }
}

/// # Text Renderer Configuration
///
/// Everything [`crate::render::text::TextRenderer`] needs beyond the device handles.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TextRendererConfig {
    /// Font pipeline shaders
    pub shaders: ShaderConfig,
    /// Upper bound of glyph quads written between `begin_frame` and `end_frame`
    pub max_glyphs_per_frame: u32,
    /// Number of descriptor sets the glyph descriptor pool can hand out
    pub descriptor_pool_capacity: u32,
    /// Rasterization settings
    pub font: FontConfig,
    /// Characters uploaded at initialization
    pub charset: String,
}

impl TextRendererConfig {
    /// Create a configuration with default capacities
    pub fn new() -> Self {
        Self {
            shaders: ShaderConfig::default(),
            max_glyphs_per_frame: 256,
            descriptor_pool_capacity: 128,
            font: FontConfig::default(),
            charset: PRINTABLE_ASCII.to_string(),
        }
    }

    /// Set custom shader configuration
    pub fn with_shaders(mut self, shaders: ShaderConfig) -> Self {
        self.shaders = shaders;
        self
    }

    /// Set the per-frame glyph quad capacity
    pub fn with_max_glyphs_per_frame(mut self, glyphs: u32) -> Self {
        self.max_glyphs_per_frame = glyphs;
        self
    }

    /// Set the descriptor pool capacity
    pub fn with_descriptor_pool_capacity(mut self, capacity: u32) -> Self {
        self.descriptor_pool_capacity = capacity;
        self
    }

    /// Set rasterization size
    pub fn with_font(mut self, point_size: f32, dpi: u32) -> Self {
        self.font = FontConfig { point_size, dpi };
        self
    }

    /// Set the initialization charset
    pub fn with_charset(mut self, charset: impl Into<String>) -> Self {
        self.charset = charset.into();
        self
    }

    /// Number of distinct characters in the charset that can need a descriptor set
    ///
    /// Space never has a bitmap, so it is not counted.
    pub fn distinct_glyph_count(&self) -> usize {
        let mut chars: Vec<char> = self.charset.chars().filter(|&ch| ch != ' ').collect();
        chars.sort_unstable();
        chars.dedup();
        chars.len()
    }

    /// Validate capacities and font settings
    ///
    /// Shader paths are checked separately by [`ShaderConfig::validate`] since
    /// they depend on the working directory.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.max_glyphs_per_frame == 0 {
            return Err(ConfigError::Invalid("max_glyphs_per_frame must be at least 1".to_string()));
        }

        if self.descriptor_pool_capacity == 0 {
            return Err(ConfigError::Invalid("descriptor_pool_capacity must be at least 1".to_string()));
        }

        if self.font.point_size <= 0.0 || self.font.dpi == 0 {
            return Err(ConfigError::Invalid(format!(
                "font size must be positive (point_size = {}, dpi = {})",
                self.font.point_size, self.font.dpi
            )));
        }

        let glyphs = self.distinct_glyph_count();
        if glyphs > self.descriptor_pool_capacity as usize {
            return Err(ConfigError::Invalid(format!(
                "charset has {} glyphs but the descriptor pool holds {}",
                glyphs, self.descriptor_pool_capacity
            )));
        }

        Ok(())
    }
}

impl Default for TextRendererConfig {
    fn default() -> Self {
        Self::new()
    }
}

impl Config for TextRendererConfig {}

#[cfg(test)]
mod tests {
    use super::*;

    fn test_config() -> TextRendererConfig {
        TextRendererConfig::new().with_shaders(ShaderConfig::new("a.vert.spv", "a.frag.spv"))
    }

    #[test]
    fn test_defaults_are_valid() {
        let config = test_config();
        assert_eq!(config.max_glyphs_per_frame, 256);
        assert_eq!(config.distinct_glyph_count(), 94);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_pixel_size() {
        let font = FontConfig { point_size: 12.0, dpi: 144 };
        assert_eq!(font.pixel_size(), 24.0);
    }

    #[test]
    fn test_charset_larger_than_pool_is_rejected() {
        let config = test_config().with_descriptor_pool_capacity(4).with_charset("ABCDE");
        assert!(matches!(config.validate(), Err(ConfigError::Invalid(_))));

        // Duplicates only need one descriptor set each
        let config = test_config().with_descriptor_pool_capacity(4).with_charset("AABBCCDD");
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_space_does_not_need_a_descriptor_set() {
        let config = test_config().with_descriptor_pool_capacity(2).with_charset("AB ");
        assert_eq!(config.distinct_glyph_count(), 2);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_zero_capacity_is_rejected() {
        let config = test_config().with_max_glyphs_per_frame(0);
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_load_toml() {
        let text = r#"
            max_glyphs_per_frame = 512
            charset = "0123456789"

            [shaders]
            vertex_shader_path = "shaders/text.vert.spv"
            fragment_shader_path = "shaders/text.frag.spv"

            [font]
            point_size = 16.0
            dpi = 72
        "#;

        let config = TextRendererConfig::from_str_with_format(text, "overlay.toml").unwrap();
        assert_eq!(config.max_glyphs_per_frame, 512);
        assert_eq!(config.descriptor_pool_capacity, 128);
        assert_eq!(config.charset, "0123456789");
        assert_eq!(config.font.pixel_size(), 16.0);
        assert_eq!(config.shaders.vertex_shader_path, "shaders/text.vert.spv");
    }

    #[test]
    fn test_load_ron() {
        let text = r#"(
            max_glyphs_per_frame: 64,
            descriptor_pool_capacity: 32,
            charset: "AB",
        )"#;

        let config = TextRendererConfig::from_str_with_format(text, "overlay.ron").unwrap();
        assert_eq!(config.max_glyphs_per_frame, 64);
        assert_eq!(config.descriptor_pool_capacity, 32);
        assert_eq!(config.distinct_glyph_count(), 2);
    }

    #[test]
    fn test_unsupported_extension() {
        let result = TextRendererConfig::from_str_with_format("", "overlay.json");
        assert!(matches!(result, Err(ConfigError::UnsupportedFormat(_))));
    }
}
