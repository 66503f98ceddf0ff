//! Vulkan texture management
//!
//! Sampled 2D textures uploaded once through a host-visible staging buffer.

use ash::{vk, Device, Instance};
use crate::render::vulkan::buffer::{find_memory_type, Buffer};
use crate::render::vulkan::commands::CommandPool;
use crate::render::vulkan::{VulkanResult, VulkanError};

/// Bytes per texel for the uncompressed formats textures are uploaded in
pub fn texel_size(format: vk::Format) -> Option<usize> {
    match format {
        vk::Format::R8_UNORM | vk::Format::R8_SRGB => Some(1),
        vk::Format::R8G8_UNORM => Some(2),
        vk::Format::R8G8B8A8_UNORM
        | vk::Format::R8G8B8A8_SRGB
        | vk::Format::B8G8R8A8_UNORM
        | vk::Format::B8G8R8A8_SRGB => Some(4),
        _ => None,
    }
}

const COLOR_SUBRESOURCE: vk::ImageSubresourceRange = vk::ImageSubresourceRange {
    aspect_mask: vk::ImageAspectFlags::COLOR,
    base_mip_level: 0,
    level_count: 1,
    base_array_layer: 0,
    layer_count: 1,
};

/// Vulkan texture with image, image view, and sampler
///
/// Handles start out null and are filled in as creation proceeds, so a
/// partially built texture still releases what it created.
pub struct Texture {
    device: Device,
    image: vk::Image,
    image_view: vk::ImageView,
    sampler: vk::Sampler,
    memory: vk::DeviceMemory,
    extent: vk::Extent2D,
    format: vk::Format,
}

impl Texture {
    /// Create a sampled texture from tightly packed pixel data
    pub fn from_pixels(
        device: Device,
        instance: &Instance,
        physical_device: vk::PhysicalDevice,
        command_pool: &CommandPool,
        queue: vk::Queue,
        pixels: &[u8],
        format: vk::Format,
        extent: vk::Extent2D,
    ) -> VulkanResult<Self> {
        let texel = texel_size(format).ok_or_else(|| VulkanError::InvalidOperation {
            reason: format!("unsupported texture upload format {format:?}"),
        })?;

        let expected = extent.width as usize * extent.height as usize * texel;
        if extent.width == 0 || extent.height == 0 || pixels.len() != expected {
            return Err(VulkanError::InvalidOperation {
                reason: format!(
                    "texture {}x{} {:?} needs {} bytes, got {}",
                    extent.width, extent.height, format, expected, pixels.len()
                ),
            });
        }

        let mut texture = Self {
            device: device.clone(),
            image: vk::Image::null(),
            image_view: vk::ImageView::null(),
            sampler: vk::Sampler::null(),
            memory: vk::DeviceMemory::null(),
            extent,
            format,
        };

        let image_create_info = vk::ImageCreateInfo::builder()
            .image_type(vk::ImageType::TYPE_2D)
            .extent(vk::Extent3D {
                width: extent.width,
                height: extent.height,
                depth: 1,
            })
            .mip_levels(1)
            .array_layers(1)
            .format(format)
            .tiling(vk::ImageTiling::OPTIMAL)
            .initial_layout(vk::ImageLayout::UNDEFINED)
            .usage(vk::ImageUsageFlags::TRANSFER_DST | vk::ImageUsageFlags::SAMPLED)
            .sharing_mode(vk::SharingMode::EXCLUSIVE)
            .samples(vk::SampleCountFlags::TYPE_1);

        texture.image = unsafe {
            device.create_image(&image_create_info, None)
                .map_err(VulkanError::Api)?
        };

        let memory_requirements = unsafe { device.get_image_memory_requirements(texture.image) };
        let memory_type_index = find_memory_type(
            instance,
            physical_device,
            memory_requirements.memory_type_bits,
            vk::MemoryPropertyFlags::DEVICE_LOCAL,
        )?;

        let memory_allocate_info = vk::MemoryAllocateInfo::builder()
            .allocation_size(memory_requirements.size)
            .memory_type_index(memory_type_index);

        texture.memory = unsafe {
            device.allocate_memory(&memory_allocate_info, None)
                .map_err(VulkanError::Api)?
        };

        unsafe {
            device.bind_image_memory(texture.image, texture.memory, 0)
                .map_err(VulkanError::Api)?;
        }

        let staging = Buffer::new(
            device.clone(),
            instance,
            physical_device,
            pixels.len() as vk::DeviceSize,
            vk::BufferUsageFlags::TRANSFER_SRC,
            vk::MemoryPropertyFlags::HOST_VISIBLE | vk::MemoryPropertyFlags::HOST_COHERENT,
        )?;
        staging.write_data(pixels)?;

        texture.copy_from_staging(command_pool, queue, &staging)?;

        let image_view_create_info = vk::ImageViewCreateInfo::builder()
            .image(texture.image)
            .view_type(vk::ImageViewType::TYPE_2D)
            .format(format)
            .subresource_range(COLOR_SUBRESOURCE);

        texture.image_view = unsafe {
            device.create_image_view(&image_view_create_info, None)
                .map_err(VulkanError::Api)?
        };

        // Clamp so glyph edges never sample the opposite border
        let sampler_create_info = vk::SamplerCreateInfo::builder()
            .mag_filter(vk::Filter::LINEAR)
            .min_filter(vk::Filter::LINEAR)
            .address_mode_u(vk::SamplerAddressMode::CLAMP_TO_EDGE)
            .address_mode_v(vk::SamplerAddressMode::CLAMP_TO_EDGE)
            .address_mode_w(vk::SamplerAddressMode::CLAMP_TO_EDGE)
            .anisotropy_enable(false)
            .max_anisotropy(1.0)
            .border_color(vk::BorderColor::FLOAT_TRANSPARENT_BLACK)
            .unnormalized_coordinates(false)
            .compare_enable(false)
            .compare_op(vk::CompareOp::NEVER)
            .mipmap_mode(vk::SamplerMipmapMode::LINEAR);

        texture.sampler = unsafe {
            device.create_sampler(&sampler_create_info, None)
                .map_err(VulkanError::Api)?
        };

        Ok(texture)
    }

    /// Record and submit the staging copy with layout transitions around it
    fn copy_from_staging(&self, command_pool: &CommandPool, queue: vk::Queue, staging: &Buffer) -> VulkanResult<()> {
        let mut recorder = command_pool.begin_single_time()?;

        let to_transfer = vk::ImageMemoryBarrier::builder()
            .old_layout(vk::ImageLayout::UNDEFINED)
            .new_layout(vk::ImageLayout::TRANSFER_DST_OPTIMAL)
            .src_queue_family_index(vk::QUEUE_FAMILY_IGNORED)
            .dst_queue_family_index(vk::QUEUE_FAMILY_IGNORED)
            .image(self.image)
            .subresource_range(COLOR_SUBRESOURCE)
            .src_access_mask(vk::AccessFlags::empty())
            .dst_access_mask(vk::AccessFlags::TRANSFER_WRITE)
            .build();

        recorder.cmd_pipeline_barrier(
            vk::PipelineStageFlags::TOP_OF_PIPE,
            vk::PipelineStageFlags::TRANSFER,
            &[to_transfer],
        );

        let region = vk::BufferImageCopy::builder()
            .buffer_offset(0)
            .buffer_row_length(0)
            .buffer_image_height(0)
            .image_subresource(vk::ImageSubresourceLayers {
                aspect_mask: vk::ImageAspectFlags::COLOR,
                mip_level: 0,
                base_array_layer: 0,
                layer_count: 1,
            })
            .image_offset(vk::Offset3D { x: 0, y: 0, z: 0 })
            .image_extent(vk::Extent3D {
                width: self.extent.width,
                height: self.extent.height,
                depth: 1,
            })
            .build();

        recorder.cmd_copy_buffer_to_image(staging.handle(), self.image, &[region]);

        let to_shader_read = vk::ImageMemoryBarrier::builder()
            .old_layout(vk::ImageLayout::TRANSFER_DST_OPTIMAL)
            .new_layout(vk::ImageLayout::SHADER_READ_ONLY_OPTIMAL)
            .src_queue_family_index(vk::QUEUE_FAMILY_IGNORED)
            .dst_queue_family_index(vk::QUEUE_FAMILY_IGNORED)
            .image(self.image)
            .subresource_range(COLOR_SUBRESOURCE)
            .src_access_mask(vk::AccessFlags::TRANSFER_WRITE)
            .dst_access_mask(vk::AccessFlags::SHADER_READ)
            .build();

        recorder.cmd_pipeline_barrier(
            vk::PipelineStageFlags::TRANSFER,
            vk::PipelineStageFlags::FRAGMENT_SHADER,
            &[to_shader_read],
        );

        command_pool.end_single_time(recorder, queue)
    }

    /// Get the image view for descriptor set binding
    pub fn image_view(&self) -> vk::ImageView {
        self.image_view
    }

    /// Get the sampler for descriptor set binding
    pub fn sampler(&self) -> vk::Sampler {
        self.sampler
    }

    /// Layout the image is kept in after upload
    pub fn layout(&self) -> vk::ImageLayout {
        vk::ImageLayout::SHADER_READ_ONLY_OPTIMAL
    }

    /// Texture dimensions
    pub fn extent(&self) -> vk::Extent2D {
        self.extent
    }

    /// Texel format
    pub fn format(&self) -> vk::Format {
        self.format
    }
}

impl Drop for Texture {
    fn drop(&mut self) {
        unsafe {
            self.device.destroy_sampler(self.sampler, None);
            self.device.destroy_image_view(self.image_view, None);
            self.device.destroy_image(self.image, None);
            self.device.free_memory(self.memory, None);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_texel_sizes() {
        assert_eq!(texel_size(vk::Format::R8_UNORM), Some(1));
        assert_eq!(texel_size(vk::Format::R8G8B8A8_UNORM), Some(4));
        assert_eq!(texel_size(vk::Format::BC1_RGB_UNORM_BLOCK), None);
    }
}
