//! Text overlay renderer
//!
//! Owns every GPU object the overlay needs and drives the per-frame cycle:
//!
//! 1. [`TextRenderer::begin_frame`] maps the vertex buffer
//! 2. [`TextRenderer::append_text`] lays out quads straight into the mapping
//! 3. [`TextRenderer::end_frame`] unmaps and records one command buffer per framebuffer
//! 4. [`TextRenderer::submit_frame`] submits the buffer for the acquired image
//!
//! The overlay pass loads the color attachment, so it is drawn on top of a
//! frame that has already been rendered into the same framebuffer.

use ash::{vk, Device, Instance};
use bytemuck::{Pod, Zeroable};
use nalgebra::{Matrix4, Vector3};
use crate::core::config::TextRendererConfig;
use crate::render::text::resources::{glyph_draws, upload_plan};
use crate::render::text::{
    DrawBufferState, GlyphResource, GlyphResources, GlyphSource, TextError, TextResult,
    TextVertex, TextureUploader, VERTICES_PER_GLYPH,
};
use crate::render::vulkan::commands::submit_and_wait;
use crate::render::vulkan::{
    CommandPool, CommandRecorder, DescriptorPool, DescriptorSetLayout, DescriptorSetLayoutBuilder,
    DescriptorSetWriter, GraphicsPipeline, MappedBuffer, PipelineCache, RenderPass, ShaderModule,
    UniformBuffer, VertexBuffer, VulkanError,
};

/// Vertical field of view in degrees
const FIELD_OF_VIEW: f32 = 60.0;
const Z_NEAR: f32 = 0.1;
const Z_FAR: f32 = 256.0;
/// Model translation along z
const MODEL_DEPTH: f32 = -1.5;

/// Uniform block bound at binding 0 of every glyph descriptor set
#[derive(Debug, Clone, Copy, PartialEq, Pod, Zeroable)]
#[repr(C)]
pub struct TextUniforms {
    /// Projection matrix (column-major)
    pub projection: [[f32; 4]; 4],
    /// View matrix (column-major)
    pub view: [[f32; 4]; 4],
    /// Model matrix (column-major)
    pub model: [[f32; 4]; 4],
}

impl TextUniforms {
    /// Matrices for a `width` x `height` target
    pub fn new(width: u32, height: u32) -> Self {
        let aspect = width.max(1) as f32 / height.max(1) as f32;
        let projection = Matrix4::new_perspective(aspect, FIELD_OF_VIEW.to_radians(), Z_NEAR, Z_FAR);
        let view = Matrix4::<f32>::identity();
        let model = view * Matrix4::new_translation(&Vector3::new(0.0, 0.0, MODEL_DEPTH));

        Self {
            projection: projection.into(),
            view: view.into(),
            model: model.into(),
        }
    }
}

/// Vulkan text overlay
///
/// Fields drop in declaration order: the vertex mapping before the vertex
/// buffer and glyph textures before the descriptor pool their sets came from.
pub struct TextRenderer {
    mapping: Option<MappedBuffer>,
    glyph_resources: GlyphResources,
    glyph_source: Box<dyn GlyphSource>,
    command_buffers: Vec<vk::CommandBuffer>,
    command_pool: CommandPool,
    pipeline: GraphicsPipeline,
    render_pass: RenderPass,
    descriptor_set_layout: DescriptorSetLayout,
    descriptor_pool: DescriptorPool,
    vertex_buffer: VertexBuffer<TextVertex>,
    uniform_buffer: UniformBuffer<TextUniforms>,
    _pipeline_cache: PipelineCache,
    draw_state: DrawBufferState,
    framebuffers: Vec<vk::Framebuffer>,
    extent: vk::Extent2D,
    device: Device,
}

impl TextRenderer {
    /// Create the overlay's pipeline, buffers and per-framebuffer command buffers
    ///
    /// `framebuffers` must have been created against a render pass compatible
    /// with one color attachment of `color_format` and one depth attachment of
    /// `depth_format`. Glyphs are not uploaded until [`Self::initialize`].
    pub fn new(
        device: Device,
        instance: &Instance,
        physical_device: vk::PhysicalDevice,
        queue_family_index: u32,
        framebuffers: Vec<vk::Framebuffer>,
        color_format: vk::Format,
        depth_format: vk::Format,
        extent: vk::Extent2D,
        glyph_source: Box<dyn GlyphSource>,
        config: &TextRendererConfig,
    ) -> TextResult<Self> {
        config.validate()?;

        let command_pool = CommandPool::new(device.clone(), queue_family_index)?;
        let command_buffers = if framebuffers.is_empty() {
            Vec::new()
        } else {
            command_pool.allocate_command_buffers(framebuffers.len() as u32)?
        };

        let vertex_capacity = config.max_glyphs_per_frame as usize * VERTICES_PER_GLYPH;
        let vertex_buffer = VertexBuffer::<TextVertex>::with_capacity(
            device.clone(),
            instance,
            physical_device,
            vertex_capacity,
        )?;

        let uniform_buffer = UniformBuffer::<TextUniforms>::new(device.clone(), instance, physical_device)?;
        uniform_buffer.update(&TextUniforms::new(extent.width, extent.height))?;

        let descriptor_pool = DescriptorPool::new(device.clone(), config.descriptor_pool_capacity)?;
        let descriptor_set_layout = DescriptorSetLayoutBuilder::new()
            .add_uniform_buffer(0, vk::ShaderStageFlags::VERTEX)
            .add_combined_image_sampler(1, vk::ShaderStageFlags::FRAGMENT)
            .build(&device)?;

        let pipeline_cache = PipelineCache::new(device.clone())?;
        let render_pass = RenderPass::new_overlay_pass(device.clone(), color_format, depth_format)?;

        let vertex_shader = ShaderModule::from_file(device.clone(), &config.shaders.vertex_shader_path)?;
        let fragment_shader = ShaderModule::from_file(device.clone(), &config.shaders.fragment_shader_path)?;

        let bindings = [TextVertex::binding_description()];
        let attributes = TextVertex::attribute_descriptions();
        let vertex_input_info = vk::PipelineVertexInputStateCreateInfo::builder()
            .vertex_binding_descriptions(&bindings)
            .vertex_attribute_descriptions(&attributes)
            .build();

        let pipeline = GraphicsPipeline::new_text_pipeline(
            device.clone(),
            render_pass.handle(),
            descriptor_set_layout.handle(),
            &pipeline_cache,
            &vertex_shader,
            &fragment_shader,
            &vertex_input_info,
        )?;

        log::info!(
            "Text renderer ready: {} framebuffers, {} glyphs per frame, {} descriptor sets",
            framebuffers.len(),
            config.max_glyphs_per_frame,
            config.descriptor_pool_capacity
        );

        Ok(Self {
            mapping: None,
            glyph_resources: GlyphResources::new(),
            glyph_source,
            command_buffers,
            command_pool,
            pipeline,
            render_pass,
            descriptor_set_layout,
            descriptor_pool,
            vertex_buffer,
            uniform_buffer,
            _pipeline_cache: pipeline_cache,
            draw_state: DrawBufferState::new(),
            framebuffers,
            extent,
            device,
        })
    }

    /// Upload a texture and descriptor set for every character of `charset`
    ///
    /// Characters the source has no glyph for, and glyphs without pixels
    /// (space), are logged and skipped without using a descriptor set. Glyph
    /// bitmaps are released afterwards, so glyphs are uploaded once: a second
    /// call fails with [`TextError::BitmapsReleased`]. Metrics stay available
    /// for layout.
    pub fn initialize<U: TextureUploader + ?Sized>(&mut self, charset: &str, uploader: &U) -> TextResult<()> {
        let plan = upload_plan(
            charset,
            self.glyph_source.as_ref(),
            self.descriptor_pool.remaining() as usize,
        )?;

        for ch in plan {
            let Some(glyph) = self.glyph_source.glyph(ch) else {
                continue;
            };

            let texture = uploader.generate_texture(
                &glyph.bitmap,
                vk::Format::R8_UNORM,
                vk::Extent2D {
                    width: glyph.width,
                    height: glyph.rows,
                },
            )?;

            let descriptor_set = self
                .descriptor_pool
                .allocate_descriptor_sets(&[self.descriptor_set_layout.handle()])?
                .pop()
                .ok_or_else(|| VulkanError::InitializationFailed(format!("no descriptor set returned for '{ch}'")))?;

            DescriptorSetWriter::new()
                .write_buffer(descriptor_set, 0, self.uniform_buffer.handle(), 0, self.uniform_buffer.range())
                .write_image(descriptor_set, 1, texture.image_view(), texture.sampler(), texture.layout())
                .update(&self.device);

            self.glyph_resources.insert(ch, GlyphResource { texture, descriptor_set });
        }

        self.glyph_source.release_bitmaps();

        log::info!(
            "Uploaded {} glyph textures, {} descriptor sets left",
            self.glyph_resources.len(),
            self.descriptor_pool.remaining()
        );

        Ok(())
    }

    /// Map the vertex buffer and start a new frame of text
    pub fn begin_frame(&mut self) -> TextResult<()> {
        if self.mapping.is_some() {
            return Err(TextError::FrameInProgress);
        }

        self.mapping = Some(self.vertex_buffer.map()?);
        self.draw_state.reset();
        Ok(())
    }

    /// Lay out `text` with the pen at `(x, y)`, scaling glyph metrics by `(scale_x, scale_y)`
    ///
    /// Returns the pen position after the last character written.
    pub fn append_text(&mut self, x: f32, y: f32, scale_x: f32, scale_y: f32, text: &str) -> TextResult<(f32, f32)> {
        let mapping = self.mapping.as_mut().ok_or(TextError::NoFrameInProgress)?;
        let vertices = mapping.as_slice_mut::<TextVertex>()?;
        let capacity = self.vertex_buffer.capacity().min(vertices.len());

        self.draw_state.append_text(
            &mut vertices[..capacity],
            self.glyph_source.as_ref(),
            x,
            y,
            scale_x,
            scale_y,
            text,
        )
    }

    /// Unmap the vertex buffer and record the draw commands for every framebuffer
    pub fn end_frame(&mut self) -> TextResult<()> {
        let mapping = self.mapping.take().ok_or(TextError::NoFrameInProgress)?;
        drop(mapping);

        self.record_command_buffers()?;

        log::debug!(
            "Recorded {} glyphs into {} command buffers",
            self.draw_state.quad_count(),
            self.command_buffers.len()
        );
        Ok(())
    }

    fn record_command_buffers(&self) -> TextResult<()> {
        let render_area = vk::Rect2D {
            offset: vk::Offset2D { x: 0, y: 0 },
            extent: self.extent,
        };

        let viewport = vk::Viewport {
            x: 0.0,
            y: 0.0,
            width: self.extent.width as f32,
            height: self.extent.height as f32,
            min_depth: 0.0,
            max_depth: 1.0,
        };

        for (&command_buffer, &framebuffer) in self.command_buffers.iter().zip(&self.framebuffers) {
            let mut recorder = CommandRecorder::new(command_buffer, self.device.clone());
            recorder.begin(vk::CommandBufferUsageFlags::empty())?;

            {
                // Nothing in the overlay pass is cleared
                let mut pass = recorder.begin_render_pass(self.render_pass.handle(), framebuffer, render_area, &[])?;

                pass.set_viewport(&viewport);
                pass.set_scissor(&render_area);
                pass.cmd_bind_pipeline(vk::PipelineBindPoint::GRAPHICS, self.pipeline.handle());
                pass.cmd_bind_vertex_buffers(0, &[self.vertex_buffer.handle()], &[0]);

                let draws = glyph_draws(self.draw_state.draws(), |ch| self.glyph_resources.descriptor_set(ch));
                for (descriptor_set, first_vertex) in draws {
                    pass.cmd_bind_descriptor_sets(self.pipeline.layout(), 0, &[descriptor_set]);
                    pass.cmd_draw(VERTICES_PER_GLYPH as u32, 1, first_vertex, 0);
                }
            }

            recorder.end()?;
        }

        Ok(())
    }

    /// Submit the command buffer recorded for framebuffer `index` and wait for the queue
    pub fn submit_frame(&self, queue: vk::Queue, index: usize) -> TextResult<()> {
        let command_buffer = *self.command_buffers.get(index).ok_or_else(|| VulkanError::InvalidOperation {
            reason: format!(
                "framebuffer index {} out of range ({} command buffers)",
                index,
                self.command_buffers.len()
            ),
        })?;

        submit_and_wait(&self.device, queue, command_buffer)?;
        Ok(())
    }

    /// Track a new target size
    ///
    /// Viewport and scissor pick the extent up at the next [`Self::end_frame`].
    /// The render pass and pipeline are kept, so the color and depth formats
    /// must not change.
    pub fn resize(&mut self, width: u32, height: u32) -> TextResult<()> {
        self.extent = vk::Extent2D { width, height };
        self.update_uniform_buffers(width, height)?;
        log::debug!("Text renderer resized to {}x{}", width, height);
        Ok(())
    }

    /// Upload projection, view and model matrices for a `width` x `height` target
    pub fn update_uniform_buffers(&self, width: u32, height: u32) -> TextResult<()> {
        self.uniform_buffer.update(&TextUniforms::new(width, height))?;
        Ok(())
    }

    /// Replace the framebuffer set, e.g. after swapchain recreation
    ///
    /// Command buffers are reallocated when the count changes. Either way they
    /// reference the old framebuffers until the next [`Self::end_frame`].
    pub fn set_framebuffers(&mut self, framebuffers: Vec<vk::Framebuffer>) -> TextResult<()> {
        if framebuffers.len() != self.command_buffers.len() {
            self.command_pool.free_command_buffers(&self.command_buffers);
            self.command_buffers = Vec::new();

            if !framebuffers.is_empty() {
                self.command_buffers = self.command_pool.allocate_command_buffers(framebuffers.len() as u32)?;
            }
        }

        log::debug!("Text renderer now targets {} framebuffers", framebuffers.len());
        self.framebuffers = framebuffers;
        Ok(())
    }

    /// Command buffer recorded for framebuffer `index`
    pub fn command_buffer(&self, index: usize) -> Option<vk::CommandBuffer> {
        self.command_buffers.get(index).copied()
    }

    /// Text written since the last `begin_frame`
    pub fn text(&self) -> &str {
        self.draw_state.text()
    }

    /// Glyph quads written since the last `begin_frame`
    pub fn glyph_count(&self) -> usize {
        self.draw_state.quad_count()
    }

    /// Characters with an uploaded texture
    pub fn uploaded_glyphs(&self) -> usize {
        self.glyph_resources.len()
    }

    /// Current target extent
    pub fn extent(&self) -> vk::Extent2D {
        self.extent
    }

    /// Whether a frame is between `begin_frame` and `end_frame`
    pub fn frame_in_progress(&self) -> bool {
        self.mapping.is_some()
    }
}

impl Drop for TextRenderer {
    fn drop(&mut self) {
        unsafe {
            if let Err(e) = self.device.device_wait_idle() {
                log::error!("Device wait failed during text renderer teardown: {:?}", e);
            }
        }

        self.mapping = None;
        self.glyph_resources.clear();

        let released = self.glyph_source.release();
        if !released {
            log::error!("Glyph source was already released");
        }
        debug_assert!(released, "glyph source released twice");
    }
}
