//! Command buffer management
//!
//! Type-safe command buffer recording following RAII patterns

use ash::{vk, Device};
use crate::render::vulkan::{VulkanResult, VulkanError};

/// Command pool wrapper with RAII cleanup
pub struct CommandPool {
    device: Device,
    command_pool: vk::CommandPool,
}

impl CommandPool {
    /// Create a new command pool whose buffers can be reset individually
    pub fn new(device: Device, queue_family_index: u32) -> VulkanResult<Self> {
        let pool_create_info = vk::CommandPoolCreateInfo::builder()
            .flags(vk::CommandPoolCreateFlags::RESET_COMMAND_BUFFER)
            .queue_family_index(queue_family_index);

        let command_pool = unsafe {
            device.create_command_pool(&pool_create_info, None)
                .map_err(VulkanError::Api)?
        };

        Ok(Self {
            device,
            command_pool,
        })
    }

    /// Allocate primary command buffers
    pub fn allocate_command_buffers(&self, count: u32) -> VulkanResult<Vec<vk::CommandBuffer>> {
        let alloc_info = vk::CommandBufferAllocateInfo::builder()
            .command_pool(self.command_pool)
            .level(vk::CommandBufferLevel::PRIMARY)
            .command_buffer_count(count);

        let command_buffers = unsafe {
            self.device.allocate_command_buffers(&alloc_info)
                .map_err(VulkanError::Api)?
        };

        Ok(command_buffers)
    }

    /// Return command buffers to the pool
    pub fn free_command_buffers(&self, command_buffers: &[vk::CommandBuffer]) {
        if command_buffers.is_empty() {
            return;
        }
        unsafe {
            self.device.free_command_buffers(self.command_pool, command_buffers);
        }
    }

    /// Get the command pool handle
    pub fn handle(&self) -> vk::CommandPool {
        self.command_pool
    }

    /// Begin a one-shot command buffer
    pub fn begin_single_time(&self) -> VulkanResult<CommandRecorder> {
        let command_buffers = self.allocate_command_buffers(1)?;
        let command_buffer = command_buffers[0];

        let mut recorder = CommandRecorder::new(command_buffer, self.device.clone());
        let begun = recorder.begin(vk::CommandBufferUsageFlags::ONE_TIME_SUBMIT).map(|_| ());
        release_on_error(begun, || self.free_command_buffers(&[command_buffer]))?;
        Ok(recorder)
    }

    /// End, submit and wait for a buffer from [`Self::begin_single_time`], then free it
    ///
    /// The buffer is returned to the pool whether or not ending or submitting fails.
    pub fn end_single_time(&self, recorder: CommandRecorder, queue: vk::Queue) -> VulkanResult<()> {
        let command_buffer = recorder.command_buffer;
        let result = recorder
            .end()
            .and_then(|ended| submit_and_wait(&self.device, queue, ended));
        self.free_command_buffers(&[command_buffer]);
        result
    }
}

impl Drop for CommandPool {
    fn drop(&mut self) {
        unsafe {
            // Destroying the pool frees every buffer allocated from it
            self.device.destroy_command_pool(self.command_pool, None);
        }
    }
}

/// Run `release` if `result` is an error, then pass `result` through
fn release_on_error<T>(result: VulkanResult<T>, release: impl FnOnce()) -> VulkanResult<T> {
    if result.is_err() {
        release();
    }
    result
}

/// Submit one command buffer and block until the queue is idle
pub fn submit_and_wait(device: &Device, queue: vk::Queue, command_buffer: vk::CommandBuffer) -> VulkanResult<()> {
    let command_buffers = [command_buffer];
    let submit_info = vk::SubmitInfo::builder()
        .command_buffers(&command_buffers)
        .build();

    unsafe {
        device.queue_submit(queue, &[submit_info], vk::Fence::null())
            .map_err(VulkanError::Api)?;
        device.queue_wait_idle(queue)
            .map_err(VulkanError::Api)?;
    }

    Ok(())
}

/// Type-safe command buffer recorder
pub struct CommandRecorder {
    command_buffer: vk::CommandBuffer,
    device: Device,
    recording: bool,
}

impl CommandRecorder {
    /// Create a new command recorder
    pub fn new(command_buffer: vk::CommandBuffer, device: Device) -> Self {
        Self {
            command_buffer,
            device,
            recording: false,
        }
    }

    /// Begin command recording
    ///
    /// Beginning a buffer from a `RESET_COMMAND_BUFFER` pool implicitly resets it.
    pub fn begin(&mut self, flags: vk::CommandBufferUsageFlags) -> VulkanResult<&mut Self> {
        if self.recording {
            return Err(VulkanError::InvalidOperation {
                reason: "Command buffer already recording".to_string()
            });
        }

        let begin_info = vk::CommandBufferBeginInfo::builder()
            .flags(flags);

        unsafe {
            self.device.begin_command_buffer(self.command_buffer, &begin_info)
                .map_err(VulkanError::Api)?;
        }

        self.recording = true;
        Ok(self)
    }

    /// Begin render pass
    pub fn begin_render_pass(
        &mut self,
        render_pass: vk::RenderPass,
        framebuffer: vk::Framebuffer,
        render_area: vk::Rect2D,
        clear_values: &[vk::ClearValue],
    ) -> VulkanResult<ActiveRenderPass<'_>> {
        if !self.recording {
            return Err(VulkanError::InvalidOperation {
                reason: "Command buffer not recording".to_string()
            });
        }

        let render_pass_begin = vk::RenderPassBeginInfo::builder()
            .render_pass(render_pass)
            .framebuffer(framebuffer)
            .render_area(render_area)
            .clear_values(clear_values);

        unsafe {
            self.device.cmd_begin_render_pass(
                self.command_buffer,
                &render_pass_begin,
                vk::SubpassContents::INLINE,
            );
        }

        Ok(ActiveRenderPass::new(self))
    }

    /// Record an image layout transition barrier
    pub fn cmd_pipeline_barrier(
        &mut self,
        src_stage: vk::PipelineStageFlags,
        dst_stage: vk::PipelineStageFlags,
        image_barriers: &[vk::ImageMemoryBarrier],
    ) {
        unsafe {
            self.device.cmd_pipeline_barrier(
                self.command_buffer,
                src_stage,
                dst_stage,
                vk::DependencyFlags::empty(),
                &[],
                &[],
                image_barriers,
            );
        }
    }

    /// Copy a buffer into an image in `TRANSFER_DST_OPTIMAL` layout
    pub fn cmd_copy_buffer_to_image(&mut self, buffer: vk::Buffer, image: vk::Image, regions: &[vk::BufferImageCopy]) {
        unsafe {
            self.device.cmd_copy_buffer_to_image(
                self.command_buffer,
                buffer,
                image,
                vk::ImageLayout::TRANSFER_DST_OPTIMAL,
                regions,
            );
        }
    }

    /// End command recording
    pub fn end(mut self) -> VulkanResult<vk::CommandBuffer> {
        if !self.recording {
            return Err(VulkanError::InvalidOperation {
                reason: "Command buffer not recording".to_string()
            });
        }

        unsafe {
            self.device.end_command_buffer(self.command_buffer)
                .map_err(VulkanError::Api)?;
        }

        self.recording = false;
        Ok(self.command_buffer)
    }
}

/// Active render pass, ended when dropped
pub struct ActiveRenderPass<'a> {
    recorder: &'a mut CommandRecorder,
}

impl<'a> ActiveRenderPass<'a> {
    fn new(recorder: &'a mut CommandRecorder) -> Self {
        Self { recorder }
    }

    /// Set viewport
    pub fn set_viewport(&mut self, viewport: &vk::Viewport) {
        unsafe {
            self.recorder.device.cmd_set_viewport(
                self.recorder.command_buffer,
                0,
                std::slice::from_ref(viewport),
            );
        }
    }

    /// Set scissor
    pub fn set_scissor(&mut self, scissor: &vk::Rect2D) {
        unsafe {
            self.recorder.device.cmd_set_scissor(
                self.recorder.command_buffer,
                0,
                std::slice::from_ref(scissor),
            );
        }
    }

    /// Bind graphics pipeline
    pub fn cmd_bind_pipeline(&mut self, bind_point: vk::PipelineBindPoint, pipeline: vk::Pipeline) {
        unsafe {
            self.recorder.device.cmd_bind_pipeline(self.recorder.command_buffer, bind_point, pipeline);
        }
    }

    /// Bind vertex buffers
    pub fn cmd_bind_vertex_buffers(&mut self, first_binding: u32, buffers: &[vk::Buffer], offsets: &[vk::DeviceSize]) {
        unsafe {
            self.recorder.device.cmd_bind_vertex_buffers(self.recorder.command_buffer, first_binding, buffers, offsets);
        }
    }

    /// Bind descriptor sets for the graphics bind point
    pub fn cmd_bind_descriptor_sets(
        &mut self,
        pipeline_layout: vk::PipelineLayout,
        first_set: u32,
        descriptor_sets: &[vk::DescriptorSet],
    ) {
        unsafe {
            self.recorder.device.cmd_bind_descriptor_sets(
                self.recorder.command_buffer,
                vk::PipelineBindPoint::GRAPHICS,
                pipeline_layout,
                first_set,
                descriptor_sets,
                &[],
            );
        }
    }

    /// Non-indexed draw
    pub fn cmd_draw(&mut self, vertex_count: u32, instance_count: u32, first_vertex: u32, first_instance: u32) {
        unsafe {
            self.recorder.device.cmd_draw(
                self.recorder.command_buffer,
                vertex_count,
                instance_count,
                first_vertex,
                first_instance,
            );
        }
    }
}

impl<'a> Drop for ActiveRenderPass<'a> {
    fn drop(&mut self) {
        unsafe {
            self.recorder.device.cmd_end_render_pass(self.recorder.command_buffer);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::Cell;

    #[test]
    fn test_release_runs_only_on_error() {
        let released = Cell::new(0);

        let ok: VulkanResult<u32> = Ok(3);
        assert_eq!(release_on_error(ok, || released.set(released.get() + 1)).unwrap(), 3);
        assert_eq!(released.get(), 0);

        let failed: VulkanResult<u32> = Err(VulkanError::Api(vk::Result::ERROR_OUT_OF_HOST_MEMORY));
        assert!(matches!(
            release_on_error(failed, || released.set(released.get() + 1)),
            Err(VulkanError::Api(vk::Result::ERROR_OUT_OF_HOST_MEMORY))
        ));
        assert_eq!(released.get(), 1);
    }
}
