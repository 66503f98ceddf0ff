//! Vulkan rendering backend
//!
//! Thin RAII wrappers over the ash objects owned by the overlay. Every wrapper
//! keeps a clone of the `ash::Device` and releases its handle in `Drop`.

use ash::vk;

/// Host-visible buffers and memory type lookup
pub mod buffer;
/// Command pools and type-safe command recording
pub mod commands;
/// Descriptor set layouts, pools and writes
pub mod descriptor_set;
/// Overlay render pass
pub mod render_pass;
/// Shader modules, pipeline cache and the font pipeline
pub mod shader;
/// Sampled textures and staging upload
pub mod texture;

pub use buffer::{Buffer, MappedBuffer, UniformBuffer, VertexBuffer};
pub use commands::{ActiveRenderPass, CommandPool, CommandRecorder};
pub use descriptor_set::{DescriptorPool, DescriptorSetLayout, DescriptorSetLayoutBuilder, DescriptorSetWriter};
pub use render_pass::RenderPass;
pub use shader::{GraphicsPipeline, PipelineCache, ShaderModule};
pub use texture::Texture;

/// Vulkan-specific error types
#[derive(Debug, thiserror::Error)]
pub enum VulkanError {
    /// General Vulkan API error with result code
    #[error("Vulkan API error: {0:?}")]
    Api(vk::Result),

    /// Resource with specified ID could not be found
    #[error("Resource not found: {id}")]
    ResourceNotFound {
        /// The unique identifier of the resource
        id: u64,
    },

    /// Invalid operation attempted
    #[error("Invalid operation: {reason}")]
    InvalidOperation {
        /// Description of why the operation is invalid
        reason: String,
    },

    /// Object creation failed outside of a plain API result
    #[error("Initialization failed: {0}")]
    InitializationFailed(String),

    /// No suitable memory type found for allocation
    #[error("No suitable memory type found")]
    NoSuitableMemoryType,
}

/// Result type for Vulkan operations
pub type VulkanResult<T> = Result<T, VulkanError>;
